use std::sync::Arc;

use anyhow::{bail, Context};

use hkm_api::ApiClient;
use hkm_core::{
    config::Config,
    domain::{FileRef, TaskId, TaskStatus, TelegramId},
    response::ApiResponse,
};
use hkm_telegram::TelegramFileSource;

const USAGE: &str = "usage: hkm <command> [args]

commands:
  user-info <telegram_id>
  tasks <telegram_id>
  task <task_id>
  stats <task_id>
  verify <phone> <jshir> <telegram_id>
  set-status <task_id> <status> <telegram_id> [rejection reason...]
  submit <task_id> <telegram_id> <description> [file_id...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hkm_core::logging::init("hkm")?;

    let cfg = Config::load()?;
    let mut builder = ApiClient::builder(cfg.api.clone());
    if let Some(token) = &cfg.telegram_bot_token {
        builder = builder.file_source(Arc::new(TelegramFileSource::new(token.clone())));
    }
    let client = builder.build();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = tokio::select! {
        r = run(&client, &args) => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(None)
        }
    };

    client.close().await;

    let Some(resp) = outcome? else {
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(&resp)?);
    if !resp.success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(client: &ApiClient, args: &[String]) -> anyhow::Result<Option<ApiResponse>> {
    let Some((cmd, rest)) = args.split_first() else {
        bail!("{USAGE}");
    };

    let resp = match (cmd.as_str(), rest) {
        ("user-info", [tg]) => client.get_user_info(telegram_id(tg)?).await,
        ("tasks", [tg]) => client.get_user_tasks(telegram_id(tg)?).await,
        ("task", [id]) => client.get_task_detail(task_id(id)?).await,
        ("stats", [id]) => client.get_task_stats(task_id(id)?).await,
        ("verify", [phone, jshir, tg]) => client.verify_user(phone, jshir, telegram_id(tg)?).await,
        ("set-status", [id, status, tg, reason @ ..]) => {
            let status = TaskStatus::parse(status)
                .with_context(|| format!("unknown task status: {status}"))?;
            let reason = reason.join(" ");
            client
                .update_task_status(
                    task_id(id)?,
                    status,
                    telegram_id(tg)?,
                    Some(reason.as_str()),
                )
                .await
        }
        ("submit", [id, tg, description, file_ids @ ..]) => {
            let files: Vec<FileRef> = file_ids.iter().map(FileRef::new).collect();
            client
                .submit_task_progress(task_id(id)?, telegram_id(tg)?, description, &files)
                .await
        }
        ("help" | "--help" | "-h", _) => {
            println!("{USAGE}");
            return Ok(None);
        }
        _ => bail!("{USAGE}"),
    };

    Ok(Some(resp))
}

fn telegram_id(s: &str) -> anyhow::Result<TelegramId> {
    let id = s
        .trim()
        .parse::<i64>()
        .with_context(|| format!("invalid telegram id: {s}"))?;
    Ok(TelegramId(id))
}

fn task_id(s: &str) -> anyhow::Result<TaskId> {
    let id = s
        .trim()
        .parse::<i64>()
        .with_context(|| format!("invalid task id: {s}"))?;
    Ok(TaskId(id))
}
