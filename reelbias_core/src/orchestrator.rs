//! Timed driver around a [`SlotMachine`].
//!
//! A spin here plays out the way the player sees it: a run of cosmetic shuffle
//! frames, one per tick, then the decision. Auto-replay runs in a spawned task that
//! waits out the replay delay against a stop signal, so a stopped auto-play never
//! fires its pending spin. Dropping every orchestrator handle closes the signal and
//! ends the task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{broadcast, watch};
use tokio::time;
use tracing::{info, warn};

use crate::{
    config::{AlgorithmConfig, AlgorithmConfigPatch, ConfigError, SpinTiming},
    ledger::SessionState,
    machine::{SlotMachine, SpinError, SpinReport},
    rng::{Draws, SeededDraws},
    symbols::ReelGrid,
};

pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum MachineEvent {
    ShuffleFrame(ReelGrid),
    SpinResolved(Box<SpinReport>),
    AutoPlayChanged(bool),
    SessionReset,
}

struct Shared<D> {
    machine: Mutex<SlotMachine<D>>,
    events: broadcast::Sender<MachineEvent>,
    timing: SpinTiming,
}

impl<D: Draws> Shared<D> {
    fn machine(&self) -> MutexGuard<'_, SlotMachine<D>> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: MachineEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn spin(&self, bet: f64) -> Result<SpinReport, SpinError> {
        let ticket = self.machine().begin_spin(bet)?;
        for _ in 0..self.timing.shuffle_ticks {
            time::sleep(self.timing.shuffle_tick).await;
            let frame = self.machine().shuffle_frame();
            self.publish(MachineEvent::ShuffleFrame(frame));
        }
        let report = self.machine().finish_spin(ticket)?;
        self.publish(MachineEvent::SpinResolved(Box::new(report.clone())));
        Ok(report)
    }
}

struct AutoPlay {
    id: u64,
    stop: watch::Sender<bool>,
}

type AutoPlaySlot = Mutex<Option<AutoPlay>>;

fn lock_slot(slot: &AutoPlaySlot) -> MutexGuard<'_, Option<AutoPlay>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SpinOrchestrator<D = SeededDraws> {
    shared: Arc<Shared<D>>,
    auto_play: Arc<AutoPlaySlot>,
    next_auto_id: Arc<Mutex<u64>>,
}

impl<D> Clone for SpinOrchestrator<D> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            auto_play: self.auto_play.clone(),
            next_auto_id: self.next_auto_id.clone(),
        }
    }
}

impl<D: Draws + Send + 'static> SpinOrchestrator<D> {
    pub fn new(machine: SlotMachine<D>, timing: SpinTiming) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                machine: Mutex::new(machine),
                events,
                timing,
            }),
            auto_play: Arc::new(Mutex::new(None)),
            next_auto_id: Arc::new(Mutex::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MachineEvent> {
        self.shared.events.subscribe()
    }

    pub fn session(&self) -> SessionState {
        self.shared.machine().session().clone()
    }

    pub fn config(&self) -> AlgorithmConfig {
        *self.shared.machine().config()
    }

    pub fn is_spinning(&self) -> bool {
        self.shared.machine().is_spinning()
    }

    pub fn is_auto_playing(&self) -> bool {
        lock_slot(&self.auto_play).is_some()
    }

    pub fn set_algorithm_config(
        &self,
        patch: &AlgorithmConfigPatch,
    ) -> Result<AlgorithmConfig, ConfigError> {
        self.shared.machine().set_algorithm_config(patch)
    }

    pub fn increase_bet(&self) -> f64 {
        self.shared.machine().increase_bet()
    }

    pub fn decrease_bet(&self) -> f64 {
        self.shared.machine().decrease_bet()
    }

    pub fn set_bet(&self, amount: f64) -> f64 {
        self.shared.machine().set_bet(amount)
    }

    /// Runs one animated spin at `bet`. The spin runs on its own task, so it
    /// resolves even if the returned future is dropped part way through.
    pub async fn spin(&self, bet: f64) -> Result<SpinReport, SpinError> {
        let shared = self.shared.clone();
        match tokio::spawn(async move { shared.spin(bet).await }).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            // runtime shutting down
            Err(_) => Err(SpinError::Cancelled),
        }
    }

    /// Runs one animated spin at the session's current bet.
    pub async fn spin_current(&self) -> Result<SpinReport, SpinError> {
        let bet = self.shared.machine().session().current_bet;
        self.spin(bet).await
    }

    /// Turns auto-replay on or off and returns whether it is now on. It will not
    /// start when the balance cannot cover the current bet. Starting spawns a task,
    /// so this must run inside a tokio runtime.
    pub fn set_auto_play(&self, enabled: bool) -> bool {
        if !enabled {
            self.stop_auto_play();
            return false;
        }
        let mut slot = lock_slot(&self.auto_play);
        if slot.is_some() {
            return true;
        }
        let session = self.session();
        if !session.can_cover(session.current_bet) {
            return false;
        }
        let id = {
            let mut next = self.next_auto_id.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        let (stop, stop_rx) = watch::channel(false);
        *slot = Some(AutoPlay { id, stop });
        drop(slot);

        tokio::spawn(auto_play_loop(
            self.shared.clone(),
            Arc::downgrade(&self.auto_play),
            id,
            stop_rx,
        ));
        info!(id, "auto play started");
        self.shared.publish(MachineEvent::AutoPlayChanged(true));
        true
    }

    fn stop_auto_play(&self) {
        if let Some(auto) = lock_slot(&self.auto_play).take() {
            let _ = auto.stop.send(true);
            info!(id = auto.id, "auto play stopped");
            self.shared.publish(MachineEvent::AutoPlayChanged(false));
        }
    }

    /// Stops auto-replay and starts a fresh session. A spin still animating is
    /// dropped with [`SpinError::Cancelled`].
    pub fn reset(&self) {
        self.stop_auto_play();
        self.shared.machine().reset();
        self.shared.publish(MachineEvent::SessionReset);
    }
}

async fn auto_play_loop<D: Draws>(
    shared: Arc<Shared<D>>,
    slot: Weak<AutoPlaySlot>,
    id: u64,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() {
                    // every orchestrator handle is gone
                    return;
                }
            }
            _ = time::sleep(shared.timing.auto_replay_delay) => {}
        }
        if *stop.borrow() {
            return;
        }

        let bet = shared.machine().session().current_bet;
        let covered = match shared.spin(bet).await {
            Ok(report) => report.session.can_cover(report.session.current_bet),
            // a manual spin holds the machine; try again after the next delay
            Err(SpinError::SpinInProgress) => true,
            Err(SpinError::InsufficientBalance { .. }) => false,
            Err(SpinError::Cancelled) => return,
            Err(err) => {
                warn!(?err, "auto play spin failed");
                false
            }
        };
        if !covered {
            break;
        }
    }

    // out of credit: switch ourselves off unless a newer auto-play replaced us
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut current = lock_slot(&slot);
    if current.as_ref().is_some_and(|auto| auto.id == id) {
        *current = None;
        drop(current);
        info!(id, "auto play stopped, balance cannot cover the bet");
        shared.publish(MachineEvent::AutoPlayChanged(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::INITIAL_BALANCE, policy::Rule, rng::ScriptedDraws};
    use std::time::Duration;
    use tokio::time::Instant;

    fn timing() -> SpinTiming {
        SpinTiming {
            shuffle_tick: Duration::from_millis(100),
            shuffle_ticks: 2,
            auto_replay_delay: Duration::from_millis(1_500),
        }
    }

    fn orchestrator(timing: SpinTiming) -> SpinOrchestrator {
        SpinOrchestrator::new(SlotMachine::new(SeededDraws::new("orch", "test", 0)), timing)
    }

    /// Every decision is a house edge loss.
    fn losing_orchestrator(timing: SpinTiming) -> SpinOrchestrator {
        let config = AlgorithmConfig {
            house_edge_percent: 50.0,
            false_hope_percent: 0.0,
            big_loss_protection_percent: 0.0,
            near_miss_rate_percent: 0.0,
        };
        let machine =
            SlotMachine::with_config(SeededDraws::new("orch", "loss", 0), config).unwrap();
        SpinOrchestrator::new(machine, timing)
    }

    #[tokio::test(start_paused = true)]
    async fn spin_plays_frames_then_resolves() {
        let orch = orchestrator(SpinTiming::default());
        let mut events = orch.subscribe();
        let started = Instant::now();
        let report = orch.spin(1_000.0).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));

        let mut frames = 0;
        loop {
            match events.recv().await.unwrap() {
                MachineEvent::ShuffleFrame(_) => frames += 1,
                MachineEvent::SpinResolved(resolved) => {
                    assert_eq!(*resolved, report);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(frames, 20);
        assert_eq!(orch.session().total_spins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_spin_is_rejected() {
        let orch = orchestrator(timing());
        let (first, second) = tokio::join!(orch.spin(1_000.0), orch.spin(1_000.0));
        let rejected: Vec<_> = [first, second].into_iter().filter_map(Result::err).collect();
        assert_eq!(rejected, vec![SpinError::SpinInProgress]);
        assert_eq!(orch.session().total_spins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_auto_play_cancels_pending_spin() {
        let orch = orchestrator(timing());
        assert!(orch.set_auto_play(true));
        assert!(orch.is_auto_playing());

        // spins resolve at 1.7s and 3.4s, the next would start at 4.9s
        time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(orch.session().total_spins, 2);

        assert!(!orch.set_auto_play(false));
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(orch.session().total_spins, 2);
        assert!(!orch.is_auto_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_play_stops_when_broke() {
        let orch = losing_orchestrator(timing());
        orch.set_bet(INITIAL_BALANCE / 2.0);
        let mut events = orch.subscribe();
        assert!(orch.set_auto_play(true));

        time::sleep(Duration::from_secs(30)).await;
        let session = orch.session();
        assert_eq!(session.total_spins, 2);
        assert_eq!(session.balance, 0.0);
        assert!(!orch.is_auto_playing());
        assert!(!orch.set_auto_play(true));

        let mut toggles = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let MachineEvent::AutoPlayChanged(on) = event {
                toggles.push(on);
            }
        }
        assert_eq!(toggles, vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_animating_spin() {
        let orch = orchestrator(timing());
        let (spin, ()) = tokio::join!(orch.spin(1_000.0), async {
            time::sleep(Duration::from_millis(50)).await;
            orch.reset();
        });
        assert_eq!(spin.unwrap_err(), SpinError::Cancelled);
        let session = orch.session();
        assert_eq!(session.total_spins, 0);
        assert_eq!(session.balance, INITIAL_BALANCE);
        assert!(!orch.is_spinning());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_auto_play() {
        let orch = orchestrator(timing());
        orch.set_auto_play(true);
        time::sleep(Duration::from_millis(1_800)).await;
        orch.reset();
        assert!(!orch.is_auto_playing());
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(orch.session().total_spins, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_spin_still_resolves() {
        let orch = orchestrator(SpinTiming::default());
        let abandoned = time::timeout(Duration::from_millis(500), orch.spin(1_000.0)).await;
        assert!(abandoned.is_err());
        assert!(orch.is_spinning());

        time::sleep(Duration::from_secs(60)).await;
        assert!(!orch.is_spinning());
        assert_eq!(orch.session().total_spins, 1);
        orch.spin(1_000.0).await.unwrap();
        assert_eq!(orch.session().total_spins, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn config_patch_waits_for_next_spin() {
        // 45 is a near miss under the default edge, a lucky win with no edge
        let machine = SlotMachine::new(ScriptedDraws::new([0.45]));
        let orch = SpinOrchestrator::new(machine, SpinTiming::default());
        let (spin, ()) = tokio::join!(orch.spin(1_000.0), async {
            time::sleep(Duration::from_millis(50)).await;
            orch.set_algorithm_config(&AlgorithmConfigPatch {
                house_edge_percent: Some(0.0),
                ..Default::default()
            })
            .unwrap();
        });
        assert_eq!(spin.unwrap().decision.rule, Rule::NearMiss);
        assert_eq!(orch.config().house_edge_percent, 0.0);
    }
}
