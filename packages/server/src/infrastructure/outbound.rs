//! Outbound delivery
//!
//! Each connection gets one writer task that drains its bounded outbound
//! queue onto the socket. The broadcaster only ever enqueues, so a slow
//! reader stalls its own writer task and nothing else.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    domain::ConnectionId,
    infrastructure::{
        dto::wire::{MessageFrame, write_frame},
        registry::OutboundReceiver,
    },
};

/// Drain `rx` onto `writer` until the queue closes or a write fails.
///
/// A write that does not complete within `write_timeout` counts as a failure.
/// The write half is shut down on exit so the peer observes EOF.
pub async fn pusher_loop<W>(
    id: ConnectionId,
    mut rx: OutboundReceiver,
    mut writer: W,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let frame = MessageFrame::from(message.as_ref());
        match tokio::time::timeout(write_timeout, write_frame(&mut writer, &frame)).await {
            Ok(Ok(())) => {
                tracing::trace!("Delivered message to connection {}", id);
            }
            Ok(Err(e)) => {
                tracing::warn!("Unable to send message to connection {}: {}", id, e);
                break;
            }
            Err(_) => {
                tracing::warn!(
                    "Write to connection {} timed out after {:?}",
                    id,
                    write_timeout
                );
                break;
            }
        }
    }

    // later enqueues now fail with `Closed`
    rx.close();

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Unable to shut down writer of connection {}: {}", id, e);
    }
    tracing::debug!("Writer for connection {} finished", id);
}
