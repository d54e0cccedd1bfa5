use async_trait::async_trait;
use teloxide::{net::Download, prelude::*};
use tokio::sync::Mutex;

use hkm_core::{errors::Error, ports::FileSource, Result};

/// [`FileSource`] backed by the Telegram Bot API.
///
/// The `Bot` handle is created on first use and dropped by `close()`; a later
/// call creates a fresh one. Creation happens under a lock so concurrent
/// first callers share one instance.
pub struct TelegramFileSource {
    token: String,
    bot: Mutex<Option<Bot>>,
}

impl TelegramFileSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            bot: Mutex::new(None),
        }
    }

    async fn bot(&self) -> Bot {
        let mut guard = self.bot.lock().await;
        guard
            .get_or_insert_with(|| {
                tracing::debug!("telegram: file client created");
                Bot::new(self.token.clone())
            })
            .clone()
    }

    pub async fn is_open(&self) -> bool {
        self.bot.lock().await.is_some()
    }
}

#[async_trait]
impl FileSource for TelegramFileSource {
    async fn resolve(&self, file_id: &str) -> Result<String> {
        let file = self
            .bot()
            .await
            .get_file(file_id.to_string())
            .await
            .map_err(|e| Error::External(format!("telegram get_file failed: {e}")))?;
        Ok(file.path)
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        self.bot()
            .await
            .download_file(path, &mut buf)
            .await
            .map_err(|e| Error::External(format!("telegram download failed: {e}")))?;
        Ok(buf)
    }

    async fn close(&self) {
        if self.bot.lock().await.take().is_some() {
            tracing::debug!("telegram: file client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_is_lazy_and_close_is_idempotent() {
        let files = TelegramFileSource::new("123:test");
        assert!(!files.is_open().await);

        files.close().await;
        assert!(!files.is_open().await);

        let _ = files.bot().await;
        assert!(files.is_open().await);

        files.close().await;
        files.close().await;
        assert!(!files.is_open().await);
    }
}
