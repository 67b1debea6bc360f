//! Drives one byte-stream connection: frames come in, get dispatched to
//! a [`PacketHandler`], and replies plus queued packets go back out.

use crate::{
    dispatcher::{DispatchError, Dispatcher, Frame},
    protocol::{
        frame_codec::FrameCodec,
        packet::{DynPacket, Packet},
        BUFFER_LIMIT,
    },
};
use anyhow::{anyhow, Context};
use futures::{SinkExt, StreamExt};
use std::ops::ControlFlow;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    select,
};
use tokio_util::codec::Framed;

/// Settings for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Largest accepted frame, in bytes.
    pub max_frame_length: usize,
    /// Close the connection on malformed or wrong-direction frames.
    /// When unset they are logged and skipped like unknown frames.
    pub disconnect_on_malformed: bool,
    /// Capacity of the outbound queue behind [`PacketSender`].
    pub send_queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_length: BUFFER_LIMIT,
            disconnect_on_malformed: true,
            send_queue_capacity: 64,
        }
    }
}

/// Packets a handler wants written back to the peer.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<Frame>,
}

impl Outbox {
    pub fn push<P: Packet>(&mut self, packet: &P) {
        self.push_dyn(packet);
    }

    pub fn push_dyn(&mut self, packet: &dyn DynPacket) {
        self.frames.push(Frame::from_packet(packet));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        self.frames.drain(..)
    }
}

/// Game or session logic receiving decoded packets.
pub trait PacketHandler: Send {
    /// Handles one packet. Returning `Break` closes the connection
    /// after the outbox has been flushed; returning an error closes it
    /// immediately.
    fn handle(
        &mut self,
        packet: Box<dyn DynPacket>,
        outbox: &mut Outbox,
    ) -> anyhow::Result<ControlFlow<()>>;
}

impl<F> PacketHandler for F
where
    F: FnMut(Box<dyn DynPacket>, &mut Outbox) -> anyhow::Result<ControlFlow<()>> + Send,
{
    fn handle(
        &mut self,
        packet: Box<dyn DynPacket>,
        outbox: &mut Outbox,
    ) -> anyhow::Result<ControlFlow<()>> {
        self(packet, outbox)
    }
}

/// Queues packets on a connection from outside its handler.
#[derive(Debug, Clone)]
pub struct PacketSender {
    frames: flume::Sender<Frame>,
}

impl PacketSender {
    pub async fn send<P: Packet>(&self, packet: &P) -> anyhow::Result<()> {
        self.send_dyn(packet).await
    }

    pub async fn send_dyn(&self, packet: &dyn DynPacket) -> anyhow::Result<()> {
        self.frames
            .send_async(Frame::from_packet(packet))
            .await
            .map_err(|_| anyhow!("connection closed"))
    }
}

/// A connection carrying framed packets over a byte stream.
pub struct Connection<S> {
    framed: Framed<S, FrameCodec>,
    dispatcher: Dispatcher,
    config: ConnectionConfig,
    sender: flume::Sender<Frame>,
    queued: flume::Receiver<Frame>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, dispatcher: Dispatcher, config: ConnectionConfig) -> Self {
        let (sender, queued) = flume::bounded(config.send_queue_capacity);
        Self {
            framed: Framed::new(stream, FrameCodec::new(config.max_frame_length)),
            dispatcher,
            config,
            sender,
            queued,
        }
    }

    /// Gets a handle to queue packets on this connection.
    pub fn sender(&self) -> PacketSender {
        PacketSender {
            frames: self.sender.clone(),
        }
    }

    /// Runs the connection until the peer hangs up, the handler asks to
    /// close it, or an error occurs.
    pub async fn run<H: PacketHandler>(mut self, mut handler: H) -> anyhow::Result<()> {
        let mut outbox = Outbox::default();
        loop {
            select! {
                frame = self.framed.next() => {
                    let Some(frame) = frame else {
                        tracing::debug!("Peer closed the connection");
                        return Ok(());
                    };
                    let frame = frame.context("failed to read frame")?;

                    let flow = match self.dispatcher.dispatch_frame(&frame, |packet| {
                        handler.handle(packet, &mut outbox)
                    }) {
                        Ok(flow) => flow?,
                        Err(e) => {
                            self.reject_frame(e)?;
                            ControlFlow::Continue(())
                        }
                    };

                    for frame in outbox.drain() {
                        self.framed.feed(frame).await?;
                    }
                    self.framed.flush().await?;

                    if flow.is_break() {
                        tracing::debug!("Handler closed the connection");
                        return Ok(());
                    }
                }
                frame = self.queued.recv_async() => {
                    // `self.sender` keeps the channel open, so this cannot fail.
                    if let Ok(frame) = frame {
                        self.framed.send(frame).await?;
                    }
                }
            }
        }
    }

    fn reject_frame(&self, error: DispatchError) -> anyhow::Result<()> {
        match error {
            DispatchError::UnknownProtocol(id) => {
                tracing::warn!("Skipping frame with unknown protocol identifier {id}");
                Ok(())
            }
            e if self.config.disconnect_on_malformed => Err(e.into()),
            e => {
                tracing::warn!("Skipping bad frame: {e}");
                Ok(())
            }
        }
    }
}
