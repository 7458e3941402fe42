use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::message::Response;

/// Identity of a connected user as assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Delivers a response to one user.
#[async_trait]
pub trait Output: Send + Sync {
    async fn send(&self, user: &UserId, response: &Response) -> Result<()>;
}

/// Sends messages to the node's trusted peers.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    fn trusted(&self) -> &[String];

    async fn broadcast(&self, message: &[u8]) -> Result<()>;
}

/// Output that keeps every response in arrival order.
#[derive(Default)]
pub struct BufferedOutput {
    sent: Mutex<Vec<(UserId, Response)>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take(&self) -> Vec<(UserId, Response)> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    pub async fn responses_for(&self, user: &UserId) -> Vec<Response> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(to, _)| to == user)
            .map(|(_, response)| response.clone())
            .collect()
    }
}

#[async_trait]
impl Output for BufferedOutput {
    async fn send(&self, user: &UserId, response: &Response) -> Result<()> {
        self.sent.lock().await.push((user.clone(), response.clone()));
        Ok(())
    }
}
