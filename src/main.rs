//! Flowbee 命令行入口
//!
//! 初始化日志与配置，组装编排器，处理一条请求（命令行参数或标准输入），
//! 打印结果 JSON；失败时额外打印面向用户的错误摘要。

use std::io::Read;

use anyhow::{bail, Context};
use flowbee::config::{load_config, AppConfig};
use flowbee::{create_orchestrator, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let input = if args.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        args.join(" ")
    };
    if input.trim().is_empty() {
        bail!("usage: flowbee <request>  (or pipe the request on stdin)");
    }

    let orchestrator = create_orchestrator(&cfg);
    let outcome = orchestrator.process_request(input.trim()).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
    );

    if let Some(ctx) = &outcome.error_context {
        eprintln!("\n{}", orchestrator.reporter().format_for_user(ctx));
        let retry = orchestrator.reporter().retry_recommendation(ctx.kind());
        if retry.should_retry {
            eprintln!("Retry recommended in {}ms: {}", retry.delay_ms, retry.reason);
        }
        std::process::exit(1);
    }

    Ok(())
}
