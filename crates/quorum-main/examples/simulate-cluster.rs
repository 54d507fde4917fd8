//
// Replay a few partition scenarios against in-process quorum engines.
//

use quorum_main::{
    rpc::set_up_logger, AdmissionPolicy, ClusterManager, MembershipConfiguration, MembershipView,
};

fn report(label: &str, manager: &ClusterManager) {
    let decision = manager.decide();
    println!("{:<40} primary={:<5} {}", label, decision.is_primary, decision.conclusion);
}

fn main() -> anyhow::Result<()> {
    set_up_logger("warn")?;

    // Three db members, one passive witness; we are cut off with "a" alone.
    let config = MembershipConfiguration::new("a", vec!["a", "b", "c"], vec![], vec!["d"]);
    let manager = ClusterManager::new(config, AdmissionPolicy::default());

    let view = manager.install_view(MembershipView::new(vec!["a", "b"], vec![]));
    manager.set_validated("a", true, view.epoch())?;
    report("view [a,b], a validated", &manager);
    manager.set_validated("b", true, view.epoch())?;
    report("view [a,b], a and b validated", &manager);

    let view = manager.install_view(MembershipView::new(vec!["a"], vec![]));
    manager.set_validated("a", true, view.epoch())?;
    report("view [a], a validated", &manager);
    manager.set_reachable("d", true);
    report("view [a], witness d reachable", &manager);

    if let Err(e) = manager.set_validated("zz", true, view.epoch()) {
        println!("{:<40} rejected: {}", "unknown member zz", e);
    }

    Ok(())
}
