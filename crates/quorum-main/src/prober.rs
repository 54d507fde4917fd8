// Witness reachability prober.
// Passive witnesses do not speak the handshake protocol, so the only
// signal we get from them is whether their host answers a TCP connect.

use std::{sync::Arc, time::Duration};
use rand::Rng;
use tokio::{net::TcpStream, time::timeout};
use tracing::{debug, info};

use crate::{config::{ClusterConfig, MemberConfig}, engine::ClusterManager, membership::MemberName};

pub struct WitnessProber {
    witnesses: Vec<MemberConfig>,
    timeout: Duration,
    interval: Duration,
}

impl WitnessProber {
    pub fn new(witnesses: Vec<MemberConfig>, timeout: Duration, interval: Duration) -> Self {
        Self { witnesses, timeout, interval }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(config.passive_witnesses.clone(), config.probe_timeout(), config.probe_interval())
    }

    // Refused, timed out and unresolvable all mean unreachable.
    async fn probe_one(&self, witness: &MemberConfig) -> bool {
        let address = format!("{}:{}", witness.address, witness.port);
        match timeout(self.timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Witness {} at {} refused: {}", witness.name, address, e);
                false
            },
            Err(_) => {
                debug!("Witness {} at {} timed out after {:?}", witness.name, address, self.timeout);
                false
            },
        }
    }

    pub async fn probe_all(&self) -> Vec<(MemberName, bool)> {
        let mut results = Vec::with_capacity(self.witnesses.len());
        for witness in self.witnesses.iter() {
            results.push((witness.name.clone(), self.probe_one(witness).await));
        }
        results
    }

    // Probes forever, feeding results into whichever engine is current.
    pub async fn run(self, manager: Arc<ClusterManager>) {
        if self.witnesses.is_empty() {
            info!("No passive witnesses configured, prober idle");
            return;
        }

        loop {
            for (name, reachable) in self.probe_all().await {
                manager.set_reachable(&name, reachable);
            }

            let jitter = rand::thread_rng().gen_range(0..=self.interval.as_millis() as u64 / 10);
            tokio::time::sleep(self.interval + Duration::from_millis(jitter)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn witness(name: &str, port: u16) -> MemberConfig {
        MemberConfig { name: name.to_string(), address: "127.0.0.1".to_string(), port: port as u32 }
    }

    #[tokio::test]
    async fn test_probe_listening_and_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();

        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let prober = WitnessProber::new(
            vec![witness("up", open), witness("down", closed)],
            Duration::from_millis(500),
            Duration::from_millis(100),
        );

        let results = prober.probe_all().await;
        assert_eq!(results, vec![("up".to_string(), true), ("down".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_run_without_witnesses_returns() {
        use crate::membership::{AdmissionPolicy, MembershipConfiguration};

        let config = MembershipConfiguration::new("a", vec!["a"], vec![], vec![]);
        let manager = Arc::new(ClusterManager::new(config, AdmissionPolicy::default()));
        let prober = WitnessProber::new(vec![], Duration::from_millis(10), Duration::from_millis(10));
        prober.run(manager).await;
    }
}
