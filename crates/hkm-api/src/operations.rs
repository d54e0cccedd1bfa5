//! Typed backend operations built on [`ApiClient`].
//!
//! Reads go through the cache interceptor with a per-operation TTL. Writes
//! are never cached and invalidate the reads they make stale.

use std::{future::Future, time::Duration};

use hkm_core::{
    cache::cache_key,
    domain::{FileRef, TaskId, TaskStatus, TelegramId},
    response::ApiResponse,
    validate::{NationalId, PhoneNumber},
};
use serde_json::{json, Value};

use crate::{
    request::{ApiRequest, FormField},
    transport::ApiClient,
};

const OP_USER_INFO: &str = "get_user_info";
const OP_USER_TASKS: &str = "get_user_tasks";
const OP_TASK_DETAIL: &str = "get_task_detail";
const OP_TASK_STATS: &str = "get_task_stats";

fn user_args(telegram_id: TelegramId) -> Value {
    json!({ "telegram_id": telegram_id.0 })
}

fn task_args(task_id: TaskId) -> Value {
    json!({ "task_id": task_id.0 })
}

impl ApiClient {
    /// Serve `operation(args)` from the cache while fresh; otherwise run
    /// `fetch` and cache the result if it succeeded.
    pub async fn cached<F, Fut>(
        &self,
        operation: &str,
        args: Value,
        ttl: Duration,
        fetch: F,
    ) -> ApiResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResponse>,
    {
        let key = cache_key(operation, &args);
        if let Some(hit) = self.cache().get(&key).await {
            tracing::debug!(operation, "cache hit");
            return hit;
        }

        let resp = fetch().await;
        if resp.success() {
            self.cache().put(key, resp.clone(), ttl).await;
        }
        resp
    }

    async fn invalidate(&self, operation: &str, args: Value) {
        self.cache().remove(&cache_key(operation, &args)).await;
    }

    /// Link a Telegram account to a backend user by phone + JSHIR.
    pub async fn verify_user(
        &self,
        phone: &str,
        national_id: &str,
        telegram_id: TelegramId,
    ) -> ApiResponse {
        let phone = match PhoneNumber::parse(phone) {
            Ok(p) => p,
            Err(e) => return ApiResponse::validation(e.to_string()),
        };
        let national_id = match NationalId::parse(national_id) {
            Ok(n) => n,
            Err(e) => return ApiResponse::validation(e.to_string()),
        };

        self.request(ApiRequest::post("verify-user/").json(json!({
            "phone": phone,
            "jshir": national_id,
            "telegram_id": telegram_id,
        })))
        .await
    }

    pub async fn get_user_info(&self, telegram_id: TelegramId) -> ApiResponse {
        let ttl = self.config().cache.user_ttl;
        self.cached(OP_USER_INFO, user_args(telegram_id), ttl, || {
            self.request(ApiRequest::get("user-info/").query("telegram_id", telegram_id))
        })
        .await
    }

    pub async fn get_user_tasks(&self, telegram_id: TelegramId) -> ApiResponse {
        let ttl = self.config().cache.task_ttl;
        self.cached(OP_USER_TASKS, user_args(telegram_id), ttl, || {
            self.request(ApiRequest::get("tasks/").query("telegram_id", telegram_id))
        })
        .await
    }

    pub async fn get_task_detail(&self, task_id: TaskId) -> ApiResponse {
        let ttl = self.config().cache.task_ttl;
        self.cached(OP_TASK_DETAIL, task_args(task_id), ttl, || {
            self.request(ApiRequest::get(format!("tasks/{task_id}/")))
        })
        .await
    }

    pub async fn get_task_stats(&self, task_id: TaskId) -> ApiResponse {
        let ttl = self.config().cache.task_ttl;
        self.cached(OP_TASK_STATS, task_args(task_id), ttl, || {
            self.request(ApiRequest::get(format!("tasks/{task_id}/stats/")))
        })
        .await
    }

    /// `rejection_reason` is sent only when present and non-empty.
    pub async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        telegram_id: TelegramId,
        rejection_reason: Option<&str>,
    ) -> ApiResponse {
        let mut body = json!({
            "status": status,
            "telegram_id": telegram_id,
        });
        if let Some(reason) = rejection_reason.filter(|r| !r.is_empty()) {
            body["rejection_reason"] = Value::String(reason.to_string());
        }

        let resp = self
            .request(ApiRequest::patch(format!("tasks/{task_id}/status/")).json(body))
            .await;
        if resp.success() {
            self.invalidate_task(task_id, telegram_id).await;
        }
        resp
    }

    /// Submit a progress report with optional attachments.
    ///
    /// Attachments that cannot be downloaded are left out; the report is
    /// still submitted with whatever files were available.
    pub async fn submit_task_progress(
        &self,
        task_id: TaskId,
        telegram_id: TelegramId,
        description: &str,
        files: &[FileRef],
    ) -> ApiResponse {
        let mut fields = vec![
            FormField::text("task_id", task_id.to_string()),
            FormField::text("telegram_id", telegram_id.to_string()),
            FormField::text("description", description),
        ];

        let mut skipped = 0usize;
        for file in files.iter().filter(|f| !f.file_id.trim().is_empty()) {
            match self.download_attachment(&file.file_id).await {
                Some(att) => fields.push(FormField::file("files[]", att)),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                task_id = task_id.0,
                skipped,
                "submitting progress without unavailable attachments"
            );
        }

        let resp = self
            .request(ApiRequest::post("submit-progress/").form(fields))
            .await;
        if resp.success() {
            self.invalidate_task(task_id, telegram_id).await;
        }
        resp
    }

    async fn invalidate_task(&self, task_id: TaskId, telegram_id: TelegramId) {
        self.invalidate(OP_TASK_DETAIL, task_args(task_id)).await;
        self.invalidate(OP_TASK_STATS, task_args(task_id)).await;
        self.invalidate(OP_USER_TASKS, user_args(telegram_id)).await;
    }
}
