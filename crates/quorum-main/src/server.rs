// The quorum node: cluster manager, witness prober and management endpoint.

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    config::ClusterConfig,
    engine::ClusterManager,
    prober::WitnessProber,
    quorum::QuorumDecision,
    rpc::QuorumRpc,
};

const DECISION_POLL: Duration = Duration::from_millis(500);

pub struct QuorumServer {
    pub config: ClusterConfig,
    pub manager: Arc<ClusterManager>,
}

impl QuorumServer {
    pub fn new(config: ClusterConfig) -> Arc<Self> {
        let manager = Arc::new(ClusterManager::new(config.membership(), config.admission));

        if let Err(e) = manager.current().validate_configuration() {
            warn!("Cluster configuration for {} is incoherent: {}", config.local_name, e);
        }

        Arc::new(QuorumServer {
            config,
            manager,
        })
    }

    // Spawns the prober and the decision watcher, then serves RPC.
    pub async fn start(self: Arc<Self>) -> anyhow::Result<SocketAddr> {
        let rpc = QuorumRpc::new(self.manager.clone())?;
        let server_address = rpc.run_server(self.config.rpc_port).await?;

        info!("Started quorum node {} with RPC address {:?}", self.config.local_name, server_address);

        let prober = WitnessProber::from_config(&self.config);
        tokio::spawn(prober.run(self.manager.clone()));

        let manager = self.manager.clone();
        tokio::spawn(async move {
            let mut last: Option<QuorumDecision> = None;
            loop {
                tokio::time::sleep(DECISION_POLL).await;
                last = Some(Self::report_decision(&manager, last.take()));
            }
        });

        Ok(server_address)
    }

    // Logs the verdict only when it changes.
    fn report_decision(manager: &ClusterManager, last: Option<QuorumDecision>) -> QuorumDecision {
        let snapshot = manager.current().snapshot();
        let decision = snapshot.decision;
        if last.as_ref() != Some(&decision) {
            info!(
                epoch = snapshot.epoch,
                is_primary = decision.is_primary,
                "{}", decision.conclusion
            );
        }
        decision
    }
}
