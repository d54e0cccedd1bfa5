use std::sync::Arc;

use hkm_core::{
    attachment::{file_name_from_path, guess_content_type, Attachment},
    cache::{MemoryCache, ResponseCache},
    config::ApiConfig,
    ports::FileSource,
    response::{ApiResponse, STATUS_UNKNOWN},
    retry::{retry, Retryable},
};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tokio::sync::{Mutex, Semaphore};

use crate::request::{api_url, ApiRequest, FormField, RequestBody};

/// Gateway statuses retried when the body is not a structured JSON answer.
const GATEWAY_STATUSES: &[u16] = &[502, 503, 504];

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request build error: {0}")]
    Build(String),

    #[error("Invalid response format")]
    Malformed { status: u16 },

    #[error("server unavailable: HTTP {status}")]
    Unavailable { status: u16, payload: Value },

    #[error("API client is closed")]
    Closed,
}

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::Build(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::Connection(_)
                | TransportError::Unavailable { .. }
        )
    }
}

impl From<TransportError> for ApiResponse {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => ApiResponse::failure(408, "Request timeout"),
            TransportError::Malformed { status } => ApiResponse::invalid_format(status),
            TransportError::Unavailable { status, payload } => ApiResponse::new(payload, status),
            TransportError::Closed => ApiResponse::failure(503, "API client is closed"),
            TransportError::Connection(msg) | TransportError::Build(msg) => {
                ApiResponse::failure(STATUS_UNKNOWN, msg)
            }
        }
    }
}

/// Shared HTTP connection pool plus the permits bounding in-flight requests.
#[derive(Clone, Debug)]
pub struct ConnectionPool {
    http: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl ConnectionPool {
    fn connect(cfg: &ApiConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .connect_timeout(cfg.connect_timeout)
            .pool_max_idle_per_host(cfg.pool_size)
            .pool_idle_timeout(cfg.pool_idle_timeout)
            .tcp_keepalive(cfg.pool_idle_timeout)
            .user_agent(cfg.user_agent.as_str())
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            http,
            permits: Arc::new(Semaphore::new(cfg.pool_size.max(1))),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Whether both handles refer to the same underlying pool.
    pub fn ptr_eq(&self, other: &ConnectionPool) -> bool {
        Arc::ptr_eq(&self.permits, &other.permits)
    }

    fn close(&self) {
        self.permits.close();
    }
}

struct Inner {
    cfg: ApiConfig,
    pool: Mutex<Option<ConnectionPool>>,
    cache: Arc<dyn ResponseCache>,
    files: Option<Arc<dyn FileSource>>,
}

/// Resilient client for the backend API.
///
/// Cheap to clone; every clone shares one pool, one cache and one file
/// source. Construct once in the host and pass it to every handler.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

pub struct ApiClientBuilder {
    cfg: ApiConfig,
    cache: Option<Arc<dyn ResponseCache>>,
    files: Option<Arc<dyn FileSource>>,
}

impl ApiClientBuilder {
    /// Replace the default in-memory cache.
    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn file_source(mut self, files: Arc<dyn FileSource>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn build(self) -> ApiClient {
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(MemoryCache::with_max_entries(self.cfg.cache.max_entries))
        });
        ApiClient {
            inner: Arc::new(Inner {
                cfg: self.cfg,
                pool: Mutex::new(None),
                cache,
                files: self.files,
            }),
        }
    }
}

impl ApiClient {
    pub fn new(cfg: ApiConfig) -> Self {
        Self::builder(cfg).build()
    }

    pub fn builder(cfg: ApiConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            cfg,
            cache: None,
            files: None,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.cfg
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.inner.cache
    }

    /// Get the shared pool, creating it on first use or after `close()`.
    ///
    /// Creation happens under the pool lock, so racing first callers all
    /// observe the same instance.
    pub async fn ensure_pool(&self) -> Result<ConnectionPool, TransportError> {
        let mut guard = self.inner.pool.lock().await;
        if let Some(pool) = guard.as_ref().filter(|p| !p.is_closed()) {
            return Ok(pool.clone());
        }

        let pool = ConnectionPool::connect(&self.inner.cfg)?;
        tracing::debug!(
            pool_size = self.inner.cfg.pool_size,
            "api: connection pool created"
        );
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Issue `req` with retries and fold the outcome into an [`ApiResponse`].
    pub async fn request(&self, req: ApiRequest) -> ApiResponse {
        tracing::debug!(method = %req.method, endpoint = %req.endpoint, "api: request");

        match retry(&self.inner.cfg.retry, |_| self.send_once(&req)).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(
                    method = %req.method,
                    endpoint = %req.endpoint,
                    error = %e,
                    "api: request failed"
                );
                ApiResponse::from(e)
            }
        }
    }

    async fn send_once(&self, req: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let pool = self.ensure_pool().await?;
        let _permit = pool
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;

        let url = api_url(&self.inner.cfg.base_url, &req.endpoint);
        let mut rb = pool.http.request(req.method.clone(), &url);
        if !req.query.is_empty() {
            rb = rb.query(&req.query);
        }
        match &req.body {
            Some(RequestBody::Json(body)) => rb = rb.json(body),
            Some(RequestBody::Form(fields)) => rb = rb.multipart(build_form(fields)?),
            None => {}
        }

        let resp = rb.send().await.map_err(TransportError::from_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(TransportError::from_reqwest)?;

        // A JSON body means the backend answered; only bare gateway errors are retried.
        if GATEWAY_STATUSES.contains(&status)
            && serde_json::from_slice::<Value>(&body).is_err()
        {
            return Err(TransportError::Unavailable {
                status,
                payload: json!({ "message": format!("HTTP {status}") }),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ApiResponse::new(json!({}), status));
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => Ok(ApiResponse::new(payload, status)),
            Err(_) => {
                let preview = String::from_utf8_lossy(&body)
                    .chars()
                    .take(200)
                    .collect::<String>();
                tracing::error!(status, %url, body = %preview, "api: invalid JSON response");
                Err(TransportError::Malformed { status })
            }
        }
    }

    /// Fetch a user-submitted file through the file side channel.
    ///
    /// Any failure is logged and yields `None`, so a multi-file submission
    /// can proceed without the missing file.
    pub async fn download_attachment(&self, file_id: &str) -> Option<Attachment> {
        let Some(files) = self.inner.files.as_ref() else {
            tracing::warn!(file_id, "attachment skipped: no file source configured");
            return None;
        };

        let path = match files.resolve(file_id).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(file_id, error = %e, "attachment skipped: resolve failed");
                return None;
            }
        };

        let Some(file_name) = file_name_from_path(&path).map(str::to_string) else {
            tracing::warn!(file_id, path = %path, "attachment skipped: path has no file name");
            return None;
        };

        let bytes = match files.fetch(&path).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(file_id, error = %e, "attachment skipped: download failed");
                return None;
            }
        };

        let content_type = guess_content_type(&file_name).to_string();
        Some(Attachment {
            bytes,
            file_name,
            content_type,
        })
    }

    /// Release the pool and the file side channel. Never fails; safe to
    /// call repeatedly or before first use.
    pub async fn close(&self) {
        if let Some(pool) = self.inner.pool.lock().await.take() {
            pool.close();
            tracing::debug!("api: connection pool closed");
        }
        if let Some(files) = self.inner.files.as_ref() {
            files.close().await;
        }
    }
}

fn build_form(fields: &[FormField]) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name.clone(), value.clone()),
            FormField::File { name, attachment } => {
                let part = Part::bytes(attachment.bytes.clone())
                    .file_name(attachment.file_name.clone())
                    .mime_str(&attachment.content_type)
                    .map_err(|e| TransportError::Build(format!("multipart error: {e}")))?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Connection("refused".into()).is_retryable());
        assert!(TransportError::Unavailable {
            status: 503,
            payload: json!({})
        }
        .is_retryable());

        assert!(!TransportError::Malformed { status: 200 }.is_retryable());
        assert!(!TransportError::Build("bad".into()).is_retryable());
        assert!(!TransportError::Closed.is_retryable());
    }

    #[test]
    fn terminal_errors_map_to_failed_responses() {
        let r = ApiResponse::from(TransportError::Timeout);
        assert_eq!(r.status_code(), 408);
        assert_eq!(r.message(), "Request timeout");

        let r = ApiResponse::from(TransportError::Malformed { status: 200 });
        assert_eq!(r.status_code(), 200);
        assert!(!r.success());
        assert_eq!(r.message(), "Invalid response format");

        let r = ApiResponse::from(TransportError::Connection("refused".into()));
        assert_eq!(r.status_code(), STATUS_UNKNOWN);
        assert_eq!(r.message(), "refused");

        let r = ApiResponse::from(TransportError::Unavailable {
            status: 503,
            payload: json!({ "message": "maintenance" }),
        });
        assert_eq!(r.status_code(), 503);
        assert_eq!(r.message(), "maintenance");
    }

    #[test]
    fn form_rejects_invalid_mime() {
        let fields = vec![FormField::file(
            "files[]",
            Attachment {
                bytes: vec![0],
                file_name: "x.bin".to_string(),
                content_type: "not a mime".to_string(),
            },
        )];
        assert!(matches!(
            build_form(&fields),
            Err(TransportError::Build(_))
        ));
    }

    #[tokio::test]
    async fn close_before_first_use_is_a_noop() {
        let client = ApiClient::new(ApiConfig::new("http://127.0.0.1:9"));
        client.close().await;
        client.close().await;
    }

    #[tokio::test]
    async fn pool_is_shared_and_recreated_after_close() {
        let client = ApiClient::new(ApiConfig::new("http://127.0.0.1:9"));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let c = client.clone();
            handles.push(tokio::spawn(async move { c.ensure_pool().await }));
        }
        let mut pools = Vec::new();
        for h in handles {
            pools.push(h.await.unwrap().unwrap());
        }
        assert!(pools.iter().all(|p| p.ptr_eq(&pools[0])));

        client.close().await;
        assert!(pools[0].is_closed());

        let fresh = client.ensure_pool().await.unwrap();
        assert!(!fresh.ptr_eq(&pools[0]));
        assert!(!fresh.is_closed());
    }
}
