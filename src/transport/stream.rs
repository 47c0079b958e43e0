//! Two-peer channel over a byte stream.
//!
//! Each message is MsgPack-encoded into a length-prefixed frame. A
//! dedicated writer task drains an mpsc queue and batches frames into a
//! single write; a reader task reassembles frames and forwards decoded
//! messages to the [`Inbox`].
//!
//! ```text
//! post() ─┐
//! post() ─┼─► mpsc::UnboundedSender<Bytes> ─► Writer Task ─► stream
//! post() ─┘
//!
//! stream ─► Reader Task ─► FrameBuffer ─► MsgPack ─► Inbox
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (reader, writer) = tokio::io::split(socket);
//! let (port, inbox, _tasks) = StreamPort::spawn(reader, writer, "worker", "parent");
//! let exchanger = Exchanger::builder(port).default_target("parent").build();
//! exchanger.init(inbox)?;
//! ```

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Channel, Inbound, Inbox, PeerId};
use crate::codec::MsgPackCodec;
use crate::error::{ExchangeError, Result};
use crate::protocol::{build_frame, FrameBuffer};

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Read buffer size for the reader task.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Background tasks driving a [`StreamPort`].
///
/// The writer ends once every port handle is dropped; the reader ends at
/// end-of-stream or when the inbox is dropped.
pub struct StreamTasks {
    /// Reader task.
    pub reader: JoinHandle<Result<()>>,
    /// Writer task.
    pub writer: JoinHandle<Result<()>>,
}

/// Channel to the single peer at the other end of a byte stream.
pub struct StreamPort {
    local: PeerId,
    remote: PeerId,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl StreamPort {
    /// Spawn reader and writer tasks over the given stream halves.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        local: impl Into<PeerId>,
        remote: impl Into<PeerId>,
    ) -> (StreamPort, Inbox, StreamTasks)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let remote = remote.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbox) = mpsc::unbounded_channel();

        let tasks = StreamTasks {
            reader: tokio::spawn(reader_loop(reader, inbound_tx, remote.clone())),
            writer: tokio::spawn(writer_loop(rx, writer)),
        };

        let port = StreamPort {
            local: local.into(),
            remote,
            tx,
        };
        (port, inbox, tasks)
    }

    /// Peer at the other end of the stream.
    pub fn remote_id(&self) -> &PeerId {
        &self.remote
    }
}

impl Channel for StreamPort {
    fn post(&self, target: &PeerId, message: Value) -> Result<()> {
        if *target != self.remote {
            return Err(ExchangeError::UnknownPeer(target.clone()));
        }
        let payload = MsgPackCodec::encode(&message)?;
        let frame = build_frame(&payload)?;
        self.tx
            .send(frame)
            .map_err(|_| ExchangeError::ConnectionClosed)
    }

    fn local_id(&self) -> &PeerId {
        &self.local
    }
}

/// Receives frames and writes them to the stream, batching ready frames.
async fn writer_loop<W>(mut rx: mpsc::UnboundedReceiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = BytesMut::new();
    while let Some(first) = rx.recv().await {
        batch.extend_from_slice(&first);

        let mut count = 1;
        while count < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    batch.extend_from_slice(&frame);
                    count += 1;
                }
                Err(_) => break,
            }
        }

        writer.write_all(&batch).await?;
        writer.flush().await?;
        batch.clear();
    }

    // All port handles dropped, clean shutdown
    writer.shutdown().await?;
    Ok(())
}

/// Reads frames from the stream and forwards decoded messages.
async fn reader_loop<R>(
    mut reader: R,
    inbound: mpsc::UnboundedSender<Inbound>,
    remote: PeerId,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!(peer = %remote, "stream closed");
            return Ok(());
        }

        for payload in frames.push(&buf[..n])? {
            let data: Value = match MsgPackCodec::decode(&payload) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(peer = %remote, error = %e, "skipping undecodable frame");
                    continue;
                }
            };

            let message = Inbound {
                data,
                source: remote.clone(),
            };
            if inbound.send(message).is_err() {
                tracing::debug!(peer = %remote, "inbox dropped, stopping reader");
                return Ok(());
            }
        }
    }
}
