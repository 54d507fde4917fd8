use jsonrpsee::{
    server::Server,
    types::{error::INVALID_PARAMS_CODE, ErrorObject, ErrorObjectOwned, ResponsePayload},
    RpcModule,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, subscriber::set_global_default, Level};
use tracing_subscriber::FmtSubscriber;

use crate::engine::{ClusterManager, QuorumError};
use crate::membership::MembershipView;
use crate::messages::types::{
    Message, ReachabilityMessage, StatusResponse, ValidationMessage, ViewChangeMessage, STATUS_COMMAND,
};
use crate::validation::ValidationError;

pub const UNKNOWN_MEMBER_CODE: i32 = -32001;
pub const NOT_IN_VIEW_CODE: i32 = -32002;
pub const STALE_VIEW_CODE: i32 = -32003;

pub struct QuorumRpc {
    rpc_module: RpcModule<Arc<ClusterManager>>
}

pub fn set_up_logger(level: &str) -> anyhow::Result<()> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    set_global_default(subscriber)?;
    Ok(())
}

fn invalid_params(e: anyhow::Error) -> ErrorObjectOwned {
    ErrorObject::owned(INVALID_PARAMS_CODE, e.to_string(), None::<()>)
}

fn quorum_error(e: QuorumError) -> ErrorObjectOwned {
    let code = match &e {
        QuorumError::Validation(ValidationError::UnknownMember(_)) => UNKNOWN_MEMBER_CODE,
        QuorumError::Validation(ValidationError::NotInView(_)) => NOT_IN_VIEW_CODE,
        QuorumError::StaleView { .. } => STALE_VIEW_CODE,
    };
    ErrorObject::owned(code, e.to_string(), None::<()>)
}

// Every field comes from the same engine, even if a view change lands meanwhile.
pub fn status(manager: &ClusterManager) -> StatusResponse {
    let snapshot = manager.current().snapshot();
    StatusResponse {
        epoch: snapshot.epoch,
        is_primary: snapshot.decision.is_primary,
        conclusion: snapshot.decision.conclusion,
        valid_configuration: snapshot.valid_configuration,
        valid_membership: snapshot.valid_membership,
        required_majority: snapshot.required_majority,
    }
}

impl QuorumRpc {
    pub fn new(manager: Arc<ClusterManager>) -> anyhow::Result<Self> {
        let module = RpcModule::new(manager);
        let mut rpc_wrapper = Self {
            rpc_module: module
        };

        rpc_wrapper.register_status()?;
        rpc_wrapper.register_view_change()?;
        rpc_wrapper.register_set_validated()?;
        rpc_wrapper.register_set_reachable()?;

        Ok(rpc_wrapper)
    }

    pub fn register_status(&mut self) -> anyhow::Result<()> {
        self.rpc_module.register_method(
            STATUS_COMMAND,
            |_params: jsonrpsee::types::Params<'_>, manager| {
                ResponsePayload::success(status(manager))
            }
        )?;
        Ok(())
    }

    pub fn register_view_change(&mut self) -> anyhow::Result<()> {
        self.rpc_module.register_method(
            ViewChangeMessage::COMMAND,
            |params: jsonrpsee::types::Params<'_>, manager| {
                match ViewChangeMessage::from_params(params) {
                    Ok(ViewChangeMessage { db_members, active_witnesses }) => {
                        let engine = manager.install_view(MembershipView::new(db_members, active_witnesses));
                        ResponsePayload::success(engine.epoch())
                    },
                    Err(e) => ResponsePayload::error(invalid_params(e)),
                }
            }
        )?;
        Ok(())
    }

    pub fn register_set_validated(&mut self) -> anyhow::Result<()> {
        self.rpc_module.register_method(
            ValidationMessage::COMMAND,
            |params: jsonrpsee::types::Params<'_>, manager| {
                let ValidationMessage { name, validated, epoch } = match ValidationMessage::from_params(params) {
                    Ok(message) => message,
                    Err(e) => return ResponsePayload::error(invalid_params(e)),
                };
                match manager.set_validated(&name, validated, epoch) {
                    Ok(()) => ResponsePayload::success(true),
                    Err(e) => ResponsePayload::error(quorum_error(e)),
                }
            }
        )?;
        Ok(())
    }

    pub fn register_set_reachable(&mut self) -> anyhow::Result<()> {
        self.rpc_module.register_method(
            ReachabilityMessage::COMMAND,
            |params: jsonrpsee::types::Params<'_>, manager| {
                match ReachabilityMessage::from_params(params) {
                    Ok(ReachabilityMessage { name, reachable }) => {
                        manager.set_reachable(&name, reachable);
                        ResponsePayload::success(true)
                    },
                    Err(e) => ResponsePayload::error(invalid_params(e)),
                }
            }
        )?;
        Ok(())
    }

    pub async fn run_server(self, port: u32) -> anyhow::Result<SocketAddr> {
        let server = Server::builder().build(format!("127.0.0.1:{}", port).parse::<SocketAddr>()?).await?;
        let addr = server.local_addr()?;

        let handle = server.start(self.rpc_module);
        info!("Management endpoint listening on {}", addr);

        tokio::spawn(handle.stopped());

        Ok(addr)
    }
}
