// src/session/link.rs
//! Single writer for the client connection
//!
//! Both duties write to the same client. All lines go through one channel into
//! one task that owns the write half, so records never interleave.

use crate::{
    error::{BridgeError, Result},
    protocol::LINE_TERMINATOR,
};
use log::debug;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};

const LINK_QUEUE_DEPTH: usize = 64;

/// Cloneable handle for queueing outbound lines
#[derive(Debug, Clone)]
pub struct LinkSender {
    tx: mpsc::Sender<String>,
}

impl LinkSender {
    /// Queue one complete line. Fails once the client is gone.
    pub async fn send_line(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .send(line.into())
            .await
            .map_err(|_| BridgeError::ClientDisconnected)
    }
}

/// Spawn the writer task. It finishes, shutting the write half down, when
/// every `LinkSender` is dropped or the client stops accepting data.
pub fn spawn_writer<W>(writer: W) -> (LinkSender, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINK_QUEUE_DEPTH);
    let handle = tokio::spawn(write_lines(writer, rx));
    (LinkSender { tx }, handle)
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = rx.recv().await {
        line.push_str(LINE_TERMINATOR);
        if let Err(e) = write_record(&mut writer, line.as_bytes()).await {
            debug!("Client write failed: {}", e);
            return Err(BridgeError::ClientDisconnected);
        }
    }

    // Already closed by the peer is fine here
    let _ = writer.shutdown().await;
    Ok(())
}

async fn write_record<W: AsyncWrite + Unpin>(writer: &mut W, record: &[u8]) -> std::io::Result<()> {
    writer.write_all(record).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_lines_terminated_and_ordered() {
        let (client, server) = tokio::io::duplex(256);
        let (sender, writer) = spawn_writer(server);
        let other = sender.clone();

        sender.send_line("first").await.unwrap();
        other.send_line("second").await.unwrap();
        drop(sender);
        drop(other);
        writer.await.unwrap().unwrap();

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_client_reported() {
        let (client, server) = tokio::io::duplex(256);
        let (sender, writer) = spawn_writer(server);
        drop(client);

        sender.send_line("lost").await.unwrap();
        assert!(matches!(writer.await.unwrap(), Err(BridgeError::ClientDisconnected)));
        assert!(matches!(sender.send_line("again").await, Err(BridgeError::ClientDisconnected)));
    }
}
