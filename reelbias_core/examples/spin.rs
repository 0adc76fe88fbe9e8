use reelbias_core::{SeededDraws, SlotMachine};

fn main() {
    // A handful of spins from fixed seeds, showing which rule picked each grid
    let draws = SeededDraws::new("example-server-seed", "example-client-seed", 1);
    println!("server_seed_hash={}", draws.server_seed_hash_hex());
    let mut machine = SlotMachine::new(draws);
    for _ in 0..10 {
        match machine.spin(1_000.0) {
            Ok(report) => println!(
                "{:?} rule={} class={} balance={}",
                report.decision.grid.payline(),
                report.decision.rule.label(),
                report.outcome.class.as_str(),
                report.session.balance
            ),
            Err(err) => println!("rejected: {err}"),
        }
    }
}
