//! Seams between the playback loop and the voice transport.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use okbot_core::{ChannelKey, Error, GuildKey, Result};
use tokio::sync::oneshot;

/// Opens voice connections.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join `channel` in `guild`, returning a ready connection.
    async fn join(&self, guild: GuildKey, channel: ChannelKey) -> Result<Arc<dyn VoiceConnection>>;
}

/// A live voice connection for one guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Start streaming an encoded audio file. The returned [`Completion`]
    /// resolves when the stream ends on its own or fails.
    async fn stream(&self, resource: &Path) -> Result<Completion>;

    /// Stop the active stream, if any.
    async fn abort(&self);

    /// Leave the voice channel.
    async fn leave(&self) -> Result<()>;
}

/// Resolves once the transport reports the end of a stream.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<()>>,
}

/// Transport-side half of a [`Completion`].
#[derive(Debug)]
pub struct CompletionSender {
    tx: oneshot::Sender<Result<()>>,
}

impl Completion {
    pub fn channel() -> (CompletionSender, Self) {
        let (tx, rx) = oneshot::channel();
        (CompletionSender { tx }, Self { rx })
    }

    /// Wait for the stream to end. A dropped sender counts as a failure.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.unwrap_or_else(|_| {
            Err(Error::TransportStream(
                "transport dropped the stream".to_string(),
            ))
        })
    }
}

impl CompletionSender {
    pub fn finished(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn failed(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(Error::TransportStream(reason.into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_outcomes() {
        let (tx, completion) = Completion::channel();
        tx.finished();
        assert!(completion.wait().await.is_ok());

        let (tx, completion) = Completion::channel();
        tx.failed("decoder error");
        let err = completion.wait().await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("decoder error"));

        let (tx, completion) = Completion::channel();
        drop(tx);
        assert!(completion.wait().await.is_err());
    }
}
