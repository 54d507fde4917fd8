// Quorum node binary. Loads the cluster configuration, serves the
// management endpoint and probes passive witnesses until killed.
use quorum_main::{config::ClusterConfig, rpc::set_up_logger, server::QuorumServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [rpc_port]", args[0]);
        std::process::exit(1);
    }

    let mut config = ClusterConfig::from_file(&args[1])?;
    if let Some(port) = args.get(2) {
        config.rpc_port = port.parse::<u32>()
            .map_err(|e| anyhow::anyhow!("RPC port must be a valid integer: {}", e))?;
    }

    set_up_logger(&config.log_level)?;

    let server = QuorumServer::new(config);
    let address = server.start().await?;
    println!("RPC Server address {:?}", address);

    tokio::signal::ctrl_c().await?;
    Ok(())
}
