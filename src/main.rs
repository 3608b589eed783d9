//! Hive - Rust 多智能体协调系统
//!
//! 入口：初始化日志、加载并校验配置、创建 Orchestrator，处理命令行传入的单个任务并打印进度与最终结果。

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use hive::config::load_config;
use hive::core::{Orchestrator, OrchestratorEvent};
use hive::llm::OpenAiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: hive '<your task>'");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  hive 'What is the capital of France?'");
        eprintln!("  hive 'Calculate the factorial of 10'");
        std::process::exit(1);
    }
    let request = args.join(" ");

    let cfg = load_config(None).context("Failed to load config")?;
    let missing = cfg.validate();
    if !missing.is_empty() {
        eprintln!("Missing required configuration: {}", missing.join(", "));
        std::process::exit(2);
    }

    let api_key = cfg.llm_api_key();
    // Router 用温度 0 保证路由可复现，Worker 用配置的采样温度
    let router_llm = Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        api_key.as_deref(),
        0.0,
    ));
    let worker_llm = Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        api_key.as_deref(),
        cfg.llm.temperature,
    ));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let orchestrator =
        Orchestrator::from_config(&cfg, router_llm, worker_llm).with_event_tx(event_tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                OrchestratorEvent::RouteDecision { next, reasoning } => {
                    println!("[SUPERVISOR] Routing to: {}", next);
                    if !reasoning.is_empty() {
                        println!("  Reason: {}", reasoning);
                    }
                }
                OrchestratorEvent::WorkerMessage { worker, content } => {
                    let preview: String = content.chars().take(200).collect();
                    println!("[{}] {}", worker.as_str().to_uppercase(), preview);
                }
                OrchestratorEvent::Finished { .. } => {}
            }
            println!();
        }
    });

    let cancel = CancellationToken::new();
    let answer = orchestrator
        .run(&request, cancel)
        .await
        .context("Request failed")?;

    drop(orchestrator);
    let _ = printer.await;

    println!("{}", "=".repeat(60));
    println!("FINAL RESULT:");
    println!("{}", "=".repeat(60));
    println!("{}", answer);

    Ok(())
}
