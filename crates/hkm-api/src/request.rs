use hkm_core::attachment::Attachment;
use reqwest::Method;
use serde_json::Value;

/// A single multipart field.
#[derive(Clone, Debug)]
pub enum FormField {
    Text { name: String, value: String },
    File { name: String, attachment: Attachment },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, attachment: Attachment) -> Self {
        FormField::File {
            name: name.into(),
            attachment,
        }
    }
}

#[derive(Clone, Debug)]
pub enum RequestBody {
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(Value),
    /// Sent as `multipart/form-data`; no JSON header.
    Form(Vec<FormField>),
}

/// Description of one backend call.
///
/// Kept as plain data (rather than a `reqwest::RequestBuilder`) because
/// multipart bodies cannot be replayed: each retry attempt rebuilds the
/// request from this description.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below `<base>/api/`, e.g. `tasks/7/`.
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form(mut self, fields: Vec<FormField>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    /// Number of file parts in a multipart body.
    pub fn file_count(&self) -> usize {
        match &self.body {
            Some(RequestBody::Form(fields)) => fields
                .iter()
                .filter(|f| matches!(f, FormField::File { .. }))
                .count(),
            _ => 0,
        }
    }
}

/// Join `base` and `endpoint` as `<base>/api/<endpoint>`.
pub fn api_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/api/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
