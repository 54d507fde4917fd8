// Primary partition decisions for a replicated database cluster.
//
// Modules:
//   membership - configured sets, live view and their coherence checks
//   validation - handshake and reachability facts for one view
//   quorum     - majority arithmetic and the witness tie-break rules
//   engine     - per-view engine and the manager that swaps it
//   config     - cluster configuration file
//   prober     - passive witness reachability
//   rpc        - JSON-RPC management endpoint

pub mod config;
pub mod engine;
pub mod membership;
pub mod prober;
pub mod quorum;
pub mod rpc;
pub mod server;
pub mod validation;

pub mod messages {
    pub mod types;
}

pub use engine::{ClusterManager, QuorumEngine, QuorumError};
pub use membership::{AdmissionPolicy, ConfigurationError, MemberName, MembershipConfiguration, MembershipView};
pub use quorum::QuorumDecision;
pub use validation::ValidationError;
