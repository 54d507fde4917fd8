// Cluster configuration file.
// One JSON document per node: who we are, the static member sets and
// where passive witnesses can be probed.

use std::{fs::File, io::Read, time::Duration};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::membership::{AdmissionPolicy, MemberName, MembershipConfiguration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub name: MemberName,
    pub address: String,
    pub port: u32,
}

fn default_probe_interval_ms() -> u64 { 2000 }
fn default_probe_timeout_ms() -> u64 { 500 }
fn default_log_level() -> String { "info".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub local_name: MemberName,
    pub db_members: Vec<MemberConfig>,
    #[serde(default)]
    pub active_witnesses: Vec<MemberConfig>,
    #[serde(default)]
    pub passive_witnesses: Vec<MemberConfig>,
    pub rpc_port: u32,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub admission: AdmissionPolicy,
}

impl ClusterConfig {
    pub fn from_file(file_path: &str) -> anyhow::Result<Self> {
        let mut file = File::open(file_path)
            .with_context(|| format!("opening cluster configuration {}", file_path))?;
        let mut file_content = String::new();
        file.read_to_string(&mut file_content)?;

        Self::from_json(&file_content)
            .with_context(|| format!("parsing cluster configuration {}", file_path))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn membership(&self) -> MembershipConfiguration {
        let names = |members: &[MemberConfig]| members.iter().map(|m| m.name.clone()).collect::<Vec<_>>();
        MembershipConfiguration::new(
            &self.local_name,
            names(&self.db_members),
            names(&self.active_witnesses),
            names(&self.passive_witnesses),
        )
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
