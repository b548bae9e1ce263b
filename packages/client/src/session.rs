//! Relay client session management.

use hiroba_server::{
    domain::MAX_BODY_BYTES,
    infrastructure::dto::wire::{
        DEFAULT_MAX_FRAME_LEN, MessageFrame, WireError, read_frame, write_frame,
    },
};
use hiroba_shared::time::now_millis;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, tcp::OwnedReadHalf},
    sync::mpsc,
};

use super::{error::ClientError, formatter::MessageFormatter, ui::redisplay_prompt};

/// Run one connection to the relay server
///
/// Lines arriving on `input` are sent as messages. Returns `Ok(())` once
/// `input` closes (the user quit) and an error if the connection ends first.
pub async fn run_client_session(
    addr: &str,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;

    tracing::info!("Connected to relay server at {}", addr);
    println!("\nType messages and press Enter to send. Press Ctrl+D to exit.\n");
    redisplay_prompt();

    let (reader, mut writer) = stream.into_split();

    // Spawn a task to handle incoming messages
    let mut read_task = tokio::spawn(read_messages(reader));

    loop {
        tokio::select! {
            read_result = &mut read_task => {
                return Err(read_result.unwrap_or(ClientError::ClosedByServer));
            }
            line = input.recv() => {
                let Some(line) = line else {
                    read_task.abort();
                    writer.shutdown().await.ok();
                    return Ok(());
                };

                if line.len() > MAX_BODY_BYTES {
                    print!("{}", MessageFormatter::format_body_too_long(line.len(), MAX_BODY_BYTES));
                    redisplay_prompt();
                    continue;
                }

                let frame = MessageFrame::outgoing(line, now_millis());
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    tracing::warn!("Failed to send message: {}", e);
                    read_task.abort();
                    return Err(e.into());
                }

                print!("{}", MessageFormatter::format_sent_confirmation(frame.client_timestamp));
                redisplay_prompt();
            }
        }
    }
}

/// Print relayed messages until the connection ends
async fn read_messages(mut reader: OwnedReadHalf) -> ClientError {
    loop {
        match read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await {
            Ok(Some(frame)) => {
                print!("{}", MessageFormatter::format_message(&frame));
                redisplay_prompt();
            }
            Ok(None) => {
                tracing::info!("Server closed the connection");
                return ClientError::ClosedByServer;
            }
            Err(WireError::Decode(e)) => {
                tracing::warn!("Received undecodable message: {}", e);
            }
            Err(e) => {
                tracing::warn!("Read error: {}", e);
                return ClientError::ConnectionLost(e);
            }
        }
    }
}
