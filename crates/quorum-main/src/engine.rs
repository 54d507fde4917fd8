// The quorum engine for a single view, and the cluster manager that
// replaces it whenever the group-communication layer reports a new view.

use std::collections::BTreeSet;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    membership::{known_members, validate, AdmissionPolicy, ConfigurationError, MemberName, MembershipConfiguration, MembershipView},
    quorum::{Majority, QuorumDecision, QuorumTally},
    validation::{MemberStates, ValidationError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuorumError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("report for view {reported} arrived after view {current} was installed")]
    StaleView { reported: u64, current: u64 },
}

/// Decision object for one view. Configuration and view never change;
/// validation facts accumulate under a single lock.
#[derive(Debug)]
pub struct QuorumEngine {
    epoch: u64,
    configuration: MembershipConfiguration,
    view: MembershipView,
    known: BTreeSet<MemberName>,
    majority: Majority,
    states: Mutex<MemberStates>,
}

impl QuorumEngine {
    pub fn new(epoch: u64, configuration: MembershipConfiguration, view: MembershipView, policy: AdmissionPolicy) -> Self {
        let known = known_members(&configuration, &view, policy);
        let majority = Majority::of(configuration.db_members.len());

        Self {
            epoch,
            configuration,
            view,
            known,
            majority,
            states: Mutex::new(MemberStates::new()),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn view(&self) -> &MembershipView {
        &self.view
    }

    // A panic elsewhere must not take the decision path down with it.
    fn states(&self) -> MutexGuard<'_, MemberStates> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn validate_configuration(&self) -> Result<(), ConfigurationError> {
        validate(&self.configuration, &self.view)
    }

    pub fn is_valid_configuration(&self) -> bool {
        self.validate_configuration().is_ok()
    }

    pub fn set_validated(&self, name: &str, value: bool) -> Result<(), ValidationError> {
        if !self.known.contains(name) {
            return Err(ValidationError::UnknownMember(name.to_string()));
        }
        if !self.view.contains(name) {
            return Err(ValidationError::NotInView(name.to_string()));
        }
        self.states().set_validated(name, value);
        Ok(())
    }

    pub fn is_validated(&self, name: &str) -> bool {
        self.states().is_validated(name)
    }

    pub fn set_reachable(&self, name: &str, value: bool) {
        self.states().set_reachable(name, value);
    }

    pub fn is_reachable(&self, name: &str) -> bool {
        self.states().is_reachable(name)
    }

    fn membership_is_validated(&self, states: &MemberStates) -> bool {
        self.view.members().iter().all(|name| states.is_validated(name))
    }

    /// True once every db member and active witness in the view has been
    /// validated. Passive witnesses are not part of the view.
    pub fn is_valid_membership(&self) -> bool {
        let states = self.states();
        self.membership_is_validated(&states)
    }

    fn tally(&self, states: &MemberStates) -> QuorumTally {
        let passive = &self.configuration.passive_witnesses;
        QuorumTally {
            majority: self.majority,
            validated_db: states.count_validated(&self.view.db_members),
            validated_active_witnesses: states.count_validated(&self.view.active_witnesses),
            passive_witnesses: passive.len(),
            all_passive_reachable: !passive.is_empty() && passive.iter().all(|name| states.is_reachable(name)),
        }
    }

    pub fn decide(&self) -> QuorumDecision {
        let states = self.states();
        let valid_membership = self.membership_is_validated(&states);
        self.tally(&states).decide(valid_membership)
    }

    /// Reads every status field under one lock. An incoherent
    /// configuration is never primary.
    pub fn snapshot(&self) -> EngineSnapshot {
        let configuration = self.validate_configuration();
        let states = self.states();
        let valid_membership = self.membership_is_validated(&states);
        let decision = match &configuration {
            Ok(()) => self.tally(&states).decide(valid_membership),
            Err(e) => QuorumDecision::refused(format!("CONFIGURATION IS INVALID: {}", e)),
        };

        EngineSnapshot {
            epoch: self.epoch,
            valid_configuration: configuration.is_ok(),
            valid_membership,
            required_majority: self.majority.size(),
            decision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub epoch: u64,
    pub valid_configuration: bool,
    pub valid_membership: bool,
    pub required_majority: usize,
    pub decision: QuorumDecision,
}

/// Owns the static configuration and the engine for the latest view.
/// Reports against older views are dropped, never applied.
pub struct ClusterManager {
    configuration: MembershipConfiguration,
    policy: AdmissionPolicy,
    epoch: AtomicU64,
    current: RwLock<Arc<QuorumEngine>>,
}

impl ClusterManager {
    /// Starts with a view holding only the local node.
    pub fn new(configuration: MembershipConfiguration, policy: AdmissionPolicy) -> Self {
        let view = MembershipView::new(vec![configuration.local_name.clone()], vec![]);
        let engine = QuorumEngine::new(0, configuration.clone(), view, policy);

        Self {
            configuration,
            policy,
            epoch: AtomicU64::new(0),
            current: RwLock::new(Arc::new(engine)),
        }
    }

    pub fn current(&self) -> Arc<QuorumEngine> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn epoch(&self) -> u64 {
        self.current().epoch()
    }

    /// Builds a fresh engine for `view` and swaps it in. Nothing recorded
    /// against the previous view is carried over.
    pub fn install_view(&self, view: MembershipView) -> Arc<QuorumEngine> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let engine = Arc::new(QuorumEngine::new(epoch, self.configuration.clone(), view, self.policy));

        match engine.validate_configuration() {
            Ok(()) => info!(
                "Installed view {} with db members {:?} and active witnesses {:?}",
                epoch, engine.view().db_members, engine.view().active_witnesses
            ),
            Err(e) => error!("View {} is not usable, refusing primary status: {}", epoch, e),
        }

        *current = engine.clone();
        engine
    }

    fn engine_for(&self, epoch: u64) -> Result<Arc<QuorumEngine>, QuorumError> {
        let engine = self.current();
        if epoch != engine.epoch() {
            return Err(QuorumError::StaleView { reported: epoch, current: engine.epoch() });
        }
        Ok(engine)
    }

    /// Records a handshake result produced for the view `epoch`. Results
    /// for any other view are rejected.
    pub fn set_validated(&self, name: &str, value: bool, epoch: u64) -> Result<(), QuorumError> {
        let result = self.engine_for(epoch).and_then(|engine| {
            engine.set_validated(name, value).map_err(QuorumError::from)
        });
        if let Err(e) = &result {
            warn!("Discarding validation of {}: {}", name, e);
        }
        result
    }

    pub fn set_reachable(&self, name: &str, value: bool) {
        self.current().set_reachable(name, value);
    }

    /// The verdict of the latest view.
    pub fn decide(&self) -> QuorumDecision {
        self.current().snapshot().decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(db: &[&str], pw: &[&str], view: &[&str]) -> QuorumEngine {
        let config = MembershipConfiguration::new("a", db.to_vec(), vec![], pw.to_vec());
        QuorumEngine::new(1, config, MembershipView::new(view.to_vec(), vec![]), AdmissionPolicy::default())
    }

    #[test]
    fn test_single_member_cluster() {
        let engine = engine(&["a"], &[], &["a"]);
        assert!(engine.is_valid_configuration());
        assert!(!engine.decide().is_primary);

        engine.set_validated("a", true).unwrap();
        let decision = engine.decide();
        assert!(decision.is_primary);
        assert_eq!(
            decision.conclusion,
            "I AM IN A PRIMARY PARTITION OF 1 DB MEMBERS OUT OF THE REQUIRED MAJORITY OF 1"
        );
    }

    #[test]
    fn test_unvalidated_view_member_invalidates_membership() {
        let engine = engine(&["a", "b", "c"], &[], &["a", "b"]);
        engine.set_validated("a", true).unwrap();
        assert!(!engine.is_valid_membership());
        assert_eq!(engine.decide().conclusion, "MEMBERSHIP IS INVALID");

        engine.set_validated("b", true).unwrap();
        assert!(engine.is_valid_membership());
        assert!(engine.decide().is_primary);

        engine.set_validated("b", false).unwrap();
        assert!(!engine.is_valid_membership());
        assert!(!engine.decide().is_primary);
    }

    #[test]
    fn test_single_passive_witness_rescues_minority() {
        let engine = engine(&["a", "b", "c"], &["d"], &["a"]);
        engine.set_validated("a", true).unwrap();
        assert!(engine.is_valid_membership());
        assert!(!engine.decide().is_primary);

        engine.set_reachable("d", true);
        let decision = engine.decide();
        assert!(decision.is_primary);
        assert!(decision.conclusion.contains("ALL (1) REACHABLE PASSIVE WITNESSES"));
    }

    #[test]
    fn test_partial_passive_witnesses_do_not_count() {
        let engine = engine(&["a", "b", "c"], &["d", "e"], &["a"]);
        engine.set_validated("a", true).unwrap();
        engine.set_reachable("d", true);
        assert!(!engine.decide().is_primary);

        engine.set_reachable("e", true);
        assert!(engine.decide().is_primary);
    }

    #[test]
    fn test_rejected_validation_leaves_state_unchanged() {
        let engine = engine(&["a", "b", "c"], &["d"], &["a"]);
        let before = engine.decide();

        assert_eq!(engine.set_validated("x", true), Err(ValidationError::UnknownMember("x".into())));
        assert_eq!(engine.set_validated("b", true), Err(ValidationError::NotInView("b".into())));
        assert!(!engine.is_validated("x"));
        assert!(!engine.is_validated("b"));
        assert_eq!(engine.decide(), before);
    }

    #[test]
    fn test_admission_policy_configured_only() {
        let config = MembershipConfiguration::new("a", vec!["a", "b"], vec![], vec![]);
        let view = MembershipView::new(vec!["a", "x"], vec![]);
        let engine = QuorumEngine::new(1, config.clone(), view.clone(), AdmissionPolicy::ConfiguredOnly);
        assert_eq!(engine.set_validated("x", true), Err(ValidationError::UnknownMember("x".into())));

        let engine = QuorumEngine::new(1, config, view, AdmissionPolicy::ConfiguredOrView);
        assert!(engine.set_validated("x", true).is_ok());
    }

    #[test]
    fn test_active_witness_in_view_must_be_validated() {
        let config = MembershipConfiguration::new("a", vec!["a", "b"], vec!["w"], vec![]);
        let engine = QuorumEngine::new(1, config, MembershipView::new(vec!["a"], vec!["w"]), AdmissionPolicy::default());
        engine.set_validated("a", true).unwrap();
        assert_eq!(engine.decide().conclusion, "MEMBERSHIP IS INVALID");

        engine.set_validated("w", true).unwrap();
        let decision = engine.decide();
        assert!(decision.is_primary);
        assert!(decision.conclusion.contains("1 VALIDATED ACTIVE WITNESSES"));
    }

    #[test]
    fn test_validations_only_raise_the_verdict() {
        let config = MembershipConfiguration::new("a", vec!["a", "b", "c"], vec!["w"], vec!["d", "e"]);
        let view = MembershipView::new(vec!["a", "b"], vec!["w"]);
        let engine = QuorumEngine::new(1, config, view, AdmissionPolicy::default());
        engine.set_validated("a", true).unwrap();
        engine.set_validated("b", true).unwrap();
        assert!(!engine.decide().is_primary);

        engine.set_validated("w", true).unwrap();
        let reached = engine.decide();
        assert!(reached.is_primary);

        engine.set_reachable("d", true);
        assert!(engine.decide().is_primary);
        engine.set_reachable("e", true);
        assert_eq!(engine.decide(), reached);
    }

    #[test]
    fn test_minority_without_passive_witnesses_is_refused() {
        let engine = engine(&["a", "b", "c"], &[], &["a"]);
        engine.set_validated("a", true).unwrap();
        assert!(engine.is_valid_membership());

        let decision = engine.decide();
        assert!(!decision.is_primary);
        assert_eq!(decision.conclusion, "NOT IN A PRIMARY PARTITION: 1 OF 2 REQUIRED DB MEMBERS VALIDATED");
    }

    #[test]
    fn test_snapshot_reads_one_view() {
        let config = MembershipConfiguration::new("a", vec!["a", "b", "c"], vec![], vec![]);
        let manager = ClusterManager::new(config, AdmissionPolicy::default());
        let first = manager.install_view(MembershipView::new(vec!["a", "b"], vec![]));
        manager.set_validated("a", true, first.epoch()).unwrap();
        manager.set_validated("b", true, first.epoch()).unwrap();

        manager.install_view(MembershipView::new(vec!["a"], vec![]));
        let snapshot = first.snapshot();
        assert_eq!(snapshot.epoch, first.epoch());
        assert!(snapshot.valid_configuration);
        assert!(snapshot.valid_membership);
        assert_eq!(snapshot.required_majority, 2);
        assert!(snapshot.decision.is_primary);

        let latest = manager.current().snapshot();
        assert_eq!(latest.epoch, first.epoch() + 1);
        assert!(!latest.decision.is_primary);
    }

    #[test]
    fn test_manager_starts_with_local_view() {
        let config = MembershipConfiguration::new("a", vec!["a"], vec![], vec![]);
        let manager = ClusterManager::new(config, AdmissionPolicy::default());
        assert_eq!(manager.epoch(), 0);
        manager.set_validated("a", true, manager.epoch()).unwrap();
        assert!(manager.decide().is_primary);
    }

    #[test]
    fn test_manager_discards_facts_on_new_view() {
        let config = MembershipConfiguration::new("a", vec!["a", "b", "c"], vec![], vec![]);
        let manager = ClusterManager::new(config, AdmissionPolicy::default());

        let first = manager.install_view(MembershipView::new(vec!["a", "b"], vec![]));
        manager.set_validated("a", true, first.epoch()).unwrap();
        manager.set_validated("b", true, first.epoch()).unwrap();
        assert!(manager.decide().is_primary);

        let second = manager.install_view(MembershipView::new(vec!["a", "b"], vec![]));
        assert_eq!(second.epoch(), first.epoch() + 1);
        assert!(!manager.decide().is_primary);

        let stale = manager.set_validated("a", true, first.epoch());
        assert_eq!(stale, Err(QuorumError::StaleView { reported: first.epoch(), current: second.epoch() }));
        assert!(!second.is_validated("a"));
    }

    #[test]
    fn test_manager_refuses_invalid_configuration() {
        let config = MembershipConfiguration::new("a", vec!["a", "b", "c"], vec![], vec![]);
        let manager = ClusterManager::new(config, AdmissionPolicy::default());
        manager.install_view(MembershipView::new(vec!["b", "c"], vec![]));
        let epoch = manager.epoch();
        manager.set_validated("b", true, epoch).unwrap();
        manager.set_validated("c", true, epoch).unwrap();

        let decision = manager.decide();
        assert!(!decision.is_primary);
        assert_eq!(decision.conclusion, "CONFIGURATION IS INVALID: local member a does not appear in the view");
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        let engine = Arc::new(engine(&["a", "b", "c"], &[], &["a", "b", "c"]));
        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.set_validated(name, true))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert!(engine.decide().is_primary);
    }
}
