use anyhow::Context;
use backend_protocol::{
    protocol::{
        packet::{
            client::{LogoutRequest, PingRequest},
            server::PingResponse,
        },
        BUFFER_LIMIT,
    },
    Connection, ConnectionConfig, Directions, Dispatcher, DynPacket, Outbox, PacketHandler,
    Registry,
};
use clap::Parser;
use std::{net::SocketAddr, ops::ControlFlow, sync::Arc};
use tokio::net::TcpListener;

/// Backend node speaking the packet protocol.
#[derive(Debug, Parser)]
struct Args {
    /// Address to accept connections on.
    #[arg(long, default_value = "0.0.0.0:7777")]
    listen: SocketAddr,
    /// Largest accepted frame, in bytes.
    #[arg(long, default_value_t = BUFFER_LIMIT)]
    max_frame_length: usize,
    /// Also accept internal server-to-server packets on this listener.
    #[arg(long)]
    internal: bool,
    /// Keep connections open after malformed frames.
    #[arg(long)]
    lenient: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let registry = Arc::new(Registry::standard().context("invalid packet set")?);
    tracing::info!("Loaded {} packet types", registry.len());

    let accepted = if args.internal {
        Directions::SERVER_INBOUND
    } else {
        Directions::CLIENT_TO_SERVER
    };
    let dispatcher = Dispatcher::new(registry).accepting(accepted);
    let config = ConnectionConfig {
        max_frame_length: args.max_frame_length,
        disconnect_on_malformed: !args.lenient,
        ..ConnectionConfig::default()
    };

    let listener = TcpListener::bind(args.listen).await?;
    tracing::info!("Listening on {}", args.listen);

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!("Accepted connection from {peer}");

        let connection = Connection::new(stream, dispatcher.clone(), config.clone());
        tokio::spawn(async move {
            if let Err(e) = connection.run(NodeHandler { peer }).await {
                tracing::info!("Connection to {peer} lost: {e:?}");
            }
        });
    }
}

struct NodeHandler {
    peer: SocketAddr,
}

impl PacketHandler for NodeHandler {
    fn handle(
        &mut self,
        packet: Box<dyn DynPacket>,
        outbox: &mut Outbox,
    ) -> anyhow::Result<ControlFlow<()>> {
        if packet.is::<PingRequest>() {
            outbox.push(&PingResponse);
        } else if packet.is::<LogoutRequest>() {
            tracing::info!("{} logged out", self.peer);
            return Ok(ControlFlow::Break(()));
        } else {
            tracing::debug!("{} sent {:?}", self.peer, packet);
        }
        Ok(ControlFlow::Continue(()))
    }
}
