use backend_protocol::{
    protocol::{
        frame_codec::FrameCodec,
        packet::{
            client::{JoinLobby, LogoutRequest, PingRequest},
            server::{LobbyUpdate, PingResponse},
        },
    },
    Connection, ConnectionConfig, Directions, Dispatcher, DynPacket, Frame, Outbox, Packet,
    PacketId, Registry,
};
use futures::{SinkExt, StreamExt};
use std::{ops::ControlFlow, sync::Arc};
use tokio::io::{duplex, DuplexStream};
use tokio_util::codec::Framed;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(Registry::standard().unwrap())).accepting(Directions::SERVER_INBOUND)
}

fn ping_handler(
    packet: Box<dyn DynPacket>,
    outbox: &mut Outbox,
) -> anyhow::Result<ControlFlow<()>> {
    if packet.is::<PingRequest>() {
        outbox.push(&PingResponse);
    } else if packet.is::<LogoutRequest>() {
        return Ok(ControlFlow::Break(()));
    }
    Ok(ControlFlow::Continue(()))
}

fn peer(stream: DuplexStream) -> Framed<DuplexStream, FrameCodec> {
    Framed::new(stream, FrameCodec::default())
}

fn frame_of<P: Packet>(packet: &P) -> Frame {
    Frame::from_packet(packet)
}

#[tokio::test]
async fn ping_pong_then_logout() {
    let (server, client) = duplex(1024);
    let connection = Connection::new(server, dispatcher(), ConnectionConfig::default());
    let task = tokio::spawn(connection.run(ping_handler));

    let mut client = peer(client);
    client.send(frame_of(&PingRequest)).await.unwrap();
    let reply = client.next().await.unwrap().unwrap();
    assert_eq!(reply, Frame::new(PingResponse::ID, Vec::new()));

    client.send(frame_of(&LogoutRequest)).await.unwrap();
    task.await.unwrap().unwrap();
    assert!(client.next().await.is_none());
}

#[tokio::test]
async fn unknown_frames_are_skipped() {
    let (server, client) = duplex(1024);
    let connection = Connection::new(server, dispatcher(), ConnectionConfig::default());
    let task = tokio::spawn(connection.run(ping_handler));

    let mut client = peer(client);
    client
        .send(Frame::new(PacketId(999), vec![1, 2, 3]))
        .await
        .unwrap();
    client.send(frame_of(&PingRequest)).await.unwrap();
    let reply = client.next().await.unwrap().unwrap();
    assert_eq!(reply.id, PingResponse::ID);

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_frame_closes_connection() {
    let (server, client) = duplex(1024);
    let connection = Connection::new(server, dispatcher(), ConnectionConfig::default());
    let task = tokio::spawn(connection.run(ping_handler));

    let mut client = peer(client);
    // JoinLobby needs four payload bytes
    client
        .send(Frame::new(JoinLobby::ID, vec![0x01]))
        .await
        .unwrap();
    assert!(task.await.unwrap().is_err());
}

#[tokio::test]
async fn wrong_direction_is_skipped_when_lenient() {
    let (server, client) = duplex(1024);
    let config = ConnectionConfig {
        disconnect_on_malformed: false,
        ..ConnectionConfig::default()
    };
    let connection = Connection::new(server, dispatcher(), config);
    let task = tokio::spawn(connection.run(ping_handler));

    let mut client = peer(client);
    client.send(frame_of(&PingResponse)).await.unwrap();
    client.send(frame_of(&PingRequest)).await.unwrap();
    let reply = client.next().await.unwrap().unwrap();
    assert_eq!(reply.id, PingResponse::ID);

    client.send(frame_of(&LogoutRequest)).await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn queued_packets_are_written() {
    let (server, client) = duplex(1024);
    let connection = Connection::new(server, dispatcher(), ConnectionConfig::default());
    let sender = connection.sender();
    let task = tokio::spawn(connection.run(ping_handler));

    let update = LobbyUpdate {
        lobby_id: 2,
        players: Vec::new(),
    };
    sender.send(&update).await.unwrap();

    let mut client = peer(client);
    let frame = client.next().await.unwrap().unwrap();
    let decoded = Dispatcher::new(Arc::new(Registry::standard().unwrap()))
        .dispatch_frame(&frame, |packet| packet.downcast::<LobbyUpdate>().ok())
        .unwrap();
    assert_eq!(decoded, Some(update));

    client.send(frame_of(&LogoutRequest)).await.unwrap();
    task.await.unwrap().unwrap();
}
