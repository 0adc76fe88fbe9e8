use std::collections::HashMap;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use reelbias_core::{
    AlgorithmConfig, MachineEvent, ReelGrid, Rule, SeededDraws, SessionState, SlotMachine,
    SpinOrchestrator, SpinReport, SpinTiming, DEFAULT_BET,
};

#[derive(Parser)]
#[command(name = "reelbias", about = "Biased slot machine simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run spins back to back with no animation
    Simulate {
        #[arg(long, default_value_t = 1_000)]
        spins: u64,
        /// Export every spin to a CSV file
        #[arg(long)]
        csv: Option<String>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Auto-play with the reel animation until the balance runs out
    Play {
        #[arg(long)]
        max_spins: Option<u64>,
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
        #[arg(long, default_value_t = 20)]
        ticks: u32,
        #[arg(long, default_value_t = 1_500)]
        replay_ms: u64,
        /// Print every shuffle frame, not just results
        #[arg(long)]
        frames: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    #[arg(long, default_value_t = DEFAULT_BET)]
    bet: f64,
    /// Server seed; random when omitted
    #[arg(long, env = "REELBIAS_SEED")]
    seed: Option<String>,
    #[arg(long, env = "REELBIAS_CLIENT_SEED", default_value = "reelbias")]
    client_seed: String,
    #[arg(long, env = "REELBIAS_HOUSE_EDGE", default_value_t = 15.0)]
    house_edge: f64,
    #[arg(long, env = "REELBIAS_FALSE_HOPE", default_value_t = 30.0)]
    false_hope: f64,
    #[arg(long, env = "REELBIAS_BIG_LOSS_PROTECTION", default_value_t = 80.0)]
    big_loss_protection: f64,
    #[arg(long, env = "REELBIAS_NEAR_MISS_RATE", default_value_t = 25.0)]
    near_miss_rate: f64,
}

impl EngineArgs {
    fn machine(&self) -> anyhow::Result<SlotMachine> {
        let draws = match &self.seed {
            Some(seed) => SeededDraws::new(seed.clone(), self.client_seed.clone(), 0),
            None => SeededDraws::from_entropy(),
        };
        info!(server_seed_hash = %draws.server_seed_hash_hex(), "session seeded");
        let config = AlgorithmConfig {
            house_edge_percent: self.house_edge,
            false_hope_percent: self.false_hope,
            big_loss_protection_percent: self.big_loss_protection,
            near_miss_rate_percent: self.near_miss_rate,
        };
        let mut machine = SlotMachine::with_config(draws, config)?;
        machine.set_bet(self.bet);
        Ok(machine)
    }
}

fn render_grid(grid: &ReelGrid) -> String {
    grid.payline()
        .iter()
        .map(|s| s.glyph())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn print_report(report: &SpinReport) {
    println!(
        "#{:>5} [{}] {:<20} {:<9} x{:<4} bet={} amount={} balance={}",
        report.entry.spin,
        render_grid(&report.decision.grid),
        report.decision.rule.label(),
        report.outcome.class.as_str(),
        report.outcome.multiplier,
        report.entry.bet,
        report.entry.amount,
        report.entry.balance
    );
}

fn print_summary(session: &SessionState, rules: &HashMap<Rule, u64>) {
    println!(
        "spins={} wins={} losses={}",
        session.total_spins, session.total_wins, session.total_losses
    );
    println!(
        "balance={} profit_loss={} win_rate={:.1}% near_misses={}",
        session.balance,
        session.profit_loss(),
        session.win_rate(),
        session.near_miss_count
    );
    for rule in Rule::ALL {
        println!("  {:<20} {}", rule.label(), rules.get(&rule).copied().unwrap_or(0));
    }
}

fn simulate(spins: u64, csv: Option<String>, engine: &EngineArgs) -> anyhow::Result<()> {
    let mut machine = engine.machine()?;
    let mut rules: HashMap<Rule, u64> = HashMap::new();
    let mut reports = Vec::new();
    for _ in 0..spins {
        let bet = machine.session().current_bet;
        match machine.spin(bet) {
            Ok(report) => {
                *rules.entry(report.decision.rule).or_default() += 1;
                reports.push(report);
            }
            Err(err) => {
                println!("stopped: {err}");
                break;
            }
        }
    }

    if let Some(path) = csv {
        let mut wtr = csv::Writer::from_path(&path)?;
        wtr.write_record([
            "spin", "bet", "rule", "class", "multiplier", "amount", "balance", "payline",
        ])?;
        for report in &reports {
            wtr.write_record(&[
                report.entry.spin.to_string(),
                report.entry.bet.to_string(),
                report.decision.rule.label().to_string(),
                report.outcome.class.as_str().to_string(),
                report.outcome.multiplier.to_string(),
                report.entry.amount.to_string(),
                report.entry.balance.to_string(),
                render_grid(&report.decision.grid),
            ])?;
        }
        wtr.flush()?;
        println!("Exported {} spins to {}", reports.len(), path);
    }

    print_summary(machine.session(), &rules);
    Ok(())
}

async fn play(
    max_spins: Option<u64>,
    timing: SpinTiming,
    frames: bool,
    engine: &EngineArgs,
) -> anyhow::Result<()> {
    let orch = SpinOrchestrator::new(engine.machine()?, timing);
    let mut events = orch.subscribe();
    if !orch.set_auto_play(true) {
        println!("balance cannot cover the bet");
        return Ok(());
    }

    let mut rules: HashMap<Rule, u64> = HashMap::new();
    let mut resolved = 0u64;
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                orch.set_auto_play(false);
                break;
            }
        };
        match event {
            Ok(MachineEvent::ShuffleFrame(grid)) if frames => {
                println!("        [{}]", render_grid(&grid))
            }
            Ok(MachineEvent::SpinResolved(report)) => {
                print_report(&report);
                *rules.entry(report.decision.rule).or_default() += 1;
                resolved += 1;
                if max_spins.is_some_and(|max| resolved >= max) {
                    orch.set_auto_play(false);
                    break;
                }
            }
            Ok(MachineEvent::AutoPlayChanged(false)) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => info!(skipped, "dropped frames"),
            Err(RecvError::Closed) => break,
        }
    }

    print_summary(&orch.session(), &rules);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { spins, csv, engine } => simulate(spins, csv, &engine)?,
        Commands::Play {
            max_spins,
            tick_ms,
            ticks,
            replay_ms,
            frames,
            engine,
        } => {
            let timing = SpinTiming {
                shuffle_tick: Duration::from_millis(tick_ms),
                shuffle_ticks: ticks,
                auto_replay_delay: Duration::from_millis(replay_ms),
            };
            play(max_spins, timing, frames, &engine).await?
        }
    }

    Ok(())
}
