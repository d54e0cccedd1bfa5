use async_trait::async_trait;

use crate::Result;

/// Side channel to the messaging platform's file API.
///
/// The API client only needs two capabilities: turn a file id into a
/// platform path, and download the bytes behind that path. Telegram is the
/// first implementation (see `hkm-telegram`).
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn resolve(&self, file_id: &str) -> Result<String>;

    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Release any underlying client. Must be a no-op when already closed.
    async fn close(&self) {}
}
