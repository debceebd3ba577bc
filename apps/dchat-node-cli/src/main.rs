//! CLI entry point: parses node identity and bootstrap peers, binds a real
//! TCP transport, and runs the node's event loop until the process is
//! signaled to stop.

use clap::Parser;

use dchat_core::SelfDescriptor;
use dchat_node::{LogSink, NodeConfig, NodeService, Severity};
use dchat_transport_tcp::TcpTransport;

#[derive(Debug, Parser)]
#[command(name = "dchat-node", about = "DChat peer-gossip node")]
struct Args {
    /// This node's own onion address, as advertised to peers.
    #[arg(long)]
    onion_id: String,

    /// TCP port to listen on, and the port advertised to peers.
    #[arg(long)]
    port: u16,

    /// Local bind address (defaults to all interfaces).
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Display name advertised to peers.
    #[arg(long, default_value = "")]
    name: String,

    /// A peer to dial at startup, as `onion_id:port`. May be repeated.
    #[arg(long = "bootstrap", value_parser = parse_bootstrap)]
    bootstrap: Vec<(String, u16)>,

    /// Minimum log severity (emerg, alert, crit, err, warning, notice, info, debug).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_bootstrap(s: &str) -> Result<(String, u16), String> {
    let (onion, port) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected onion_id:port, got {s:?}"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid port in bootstrap peer {s:?}"))?;
    Ok((onion.to_string(), port))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = Severity::parse(&args.log_level).unwrap_or_else(|| {
        eprintln!("unrecognized --log-level {:?}, defaulting to info", args.log_level);
        Severity::Info
    });
    LogSink::init(log_level);

    let me = SelfDescriptor {
        onion_id: args.onion_id.clone(),
        lport: args.port,
        name: args.name.clone(),
    };

    let mut builder = NodeConfig::builder(me).log_level(log_level);
    for (onion_id, port) in &args.bootstrap {
        builder = builder.bootstrap(onion_id.clone(), *port);
    }
    let config = builder.build();

    let bind_addr: std::net::SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .expect("--bind and --port must form a valid socket address");

    let transport = TcpTransport::bind(bind_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {bind_addr}: {err}"));

    tracing::info!(onion_id = %args.onion_id, port = args.port, "dchat node starting");

    let mut service = NodeService::new(config, transport);
    service.start();
    service.run().await;
}
