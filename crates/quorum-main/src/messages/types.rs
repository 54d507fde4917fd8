// Types of messages

// Allowing converting object to and from params object

use jsonrpsee::{rpc_params, types::Params};
use jsonrpsee_core::params::ArrayParams;
use serde::{Serialize, Deserialize};
use crate::membership::MemberName;

pub trait Message where Self: Sized + Clone {
    const COMMAND: &'static str;

    fn into_params(&self) -> ArrayParams;
    fn from_params(params: Params<'_>) -> anyhow::Result<Self>;
}

// Sent by the group-communication layer on every membership change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewChangeMessage {
    pub db_members: Vec<MemberName>,
    pub active_witnesses: Vec<MemberName>,
}

impl Message for ViewChangeMessage {
    const COMMAND: &'static str = "view_change";

    fn into_params(&self) -> ArrayParams {
        rpc_params![
            self.db_members.clone(),
            self.active_witnesses.clone()
        ]
    }

    fn from_params(params: Params<'_>) -> anyhow::Result<Self> {
        let mut params_sequence = params.sequence();
        let db_members = params_sequence.next()?;
        let active_witnesses = params_sequence.optional_next()?.unwrap_or_default();

        Ok(ViewChangeMessage { db_members, active_witnesses })
    }
}

// Sent by the handshake protocol; `epoch` names the view the handshake ran in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub name: MemberName,
    pub validated: bool,
    pub epoch: u64,
}

impl Message for ValidationMessage {
    const COMMAND: &'static str = "set_validated";

    fn into_params(&self) -> ArrayParams {
        rpc_params![
            self.name.clone(),
            self.validated,
            self.epoch
        ]
    }

    fn from_params(params: Params<'_>) -> anyhow::Result<Self> {
        let mut params_sequence = params.sequence();
        let name = params_sequence.next()?;
        let validated = params_sequence.next()?;
        let epoch = params_sequence.next()?;

        Ok(ValidationMessage { name, validated, epoch })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityMessage {
    pub name: MemberName,
    pub reachable: bool,
}

impl Message for ReachabilityMessage {
    const COMMAND: &'static str = "set_reachable";

    fn into_params(&self) -> ArrayParams {
        rpc_params![
            self.name.clone(),
            self.reachable
        ]
    }

    fn from_params(params: Params<'_>) -> anyhow::Result<Self> {
        let mut params_sequence = params.sequence();
        let name = params_sequence.next()?;
        let reachable = params_sequence.next()?;

        Ok(ReachabilityMessage { name, reachable })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub epoch: u64,
    pub is_primary: bool,
    pub conclusion: String,
    pub valid_configuration: bool,
    pub valid_membership: bool,
    pub required_majority: usize,
}

pub const STATUS_COMMAND: &str = "quorum_status";
