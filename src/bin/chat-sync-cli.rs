//! 会话缓存回放 CLI
//!
//! 把 JSON Lines 格式的推送事件文件（或内置的演示场景）回放到一个新的同步器上，
//! 输出最终排好序的会话列表

use anyhow::{Context, Result};
use chat_sync_core_rust::{
    ConversationKind, ConversationSyncer, ConversationSyncerConfig, InProcessEventHub,
    LocalConversation, LocalMessage, PushEvent,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 会话缓存回放 CLI
#[derive(Parser, Debug)]
#[command(name = "chat-sync-cli")]
#[command(about = "回放推送事件并输出会话列表", long_about = None)]
struct Args {
    /// 推送事件文件（每行一个 JSON 事件），不指定时运行内置演示场景
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// 回放前先从服务器全量拉取会话
    #[arg(long)]
    fetch: bool,

    /// API 基础 URL
    #[arg(long, default_value = "http://localhost:10002")]
    api_base_url: String,

    /// 用户 ID
    #[arg(short, long, default_value = "cli-user")]
    user_id: String,

    /// Token
    #[arg(short, long, default_value = "")]
    token: String,

    /// 以 JSON 输出完整缓存快照
    #[arg(long)]
    json: bool,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, default_value = "warn,chat_sync_core_rust=info")]
    log_level: String,
}

/// 初始化日志（输出到 stderr，stdout 留给结果）
fn init_logger(log_level: &str) {
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stderr_layer)
        .init();
}

fn read_events(path: &Path) -> Result<Vec<PushEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取事件文件失败: {}", path.display()))?;

    let mut events = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<PushEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!("[CLI] 第 {} 行不是有效的推送事件，跳过: {}", line_no + 1, e),
        }
    }
    Ok(events)
}

fn demo_events() -> Vec<PushEvent> {
    let message = |id: &str, conv: &str, at: i64| {
        LocalMessage::new(id, conv, "alice", format!("hello from {conv}"), at)
    };
    vec![
        PushEvent::ConversationAdded {
            conversation: LocalConversation::new("A", "Alpha", ConversationKind::Private)
                .with_pinned(true),
        },
        PushEvent::ConversationAdded {
            conversation: LocalConversation::new("B", "Bravo", ConversationKind::Open),
        },
        PushEvent::ConversationAdded {
            conversation: LocalConversation::new("C", "Charlie", ConversationKind::Public)
                .with_pinned(true),
        },
        PushEvent::MessageCreated {
            message: message("m1", "B", 10),
        },
        PushEvent::MessageCreated {
            message: message("m2", "C", 5),
        },
        // 推送回显，不会重复写入
        PushEvent::MessageCreated {
            message: message("m2", "C", 5),
        },
        // 会话不在本地，丢弃
        PushEvent::MessageCreated {
            message: message("m3", "ghost", 30),
        },
    ]
}

fn print_conversation(index: usize, conv: &LocalConversation) {
    let latest = conv
        .latest_message
        .as_ref()
        .map(|m| format!("{} @{}", m.content, m.created_at))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>3}. {}{} [{:?}] {}  最新消息: {}",
        index + 1,
        if conv.is_pinned { "📌 " } else { "" },
        conv.conversation_id,
        conv.kind,
        conv.display_name,
        latest
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    let config = ConversationSyncerConfig::new(args.user_id.clone(), args.token.clone())
        .with_api_base_url(args.api_base_url.clone());
    let syncer = Arc::new(ConversationSyncer::from_config(config)?);

    if args.fetch {
        if let Err(e) = syncer.refresh_conversations().await {
            error!("[CLI] 全量拉取会话失败: {}", e);
        }
    }

    let events = match &args.events {
        Some(path) => read_events(path)?,
        None => {
            info!("[CLI] 未指定事件文件，运行内置演示场景");
            demo_events()
        }
    };

    let hub = Arc::new(InProcessEventHub::new());
    let session = syncer.attach(hub.clone());
    let total = events.len();
    for event in events {
        hub.publish(event);
    }
    session.close().await;
    info!("[CLI] 已回放 {} 个推送事件", total);

    if args.json {
        let snapshot = syncer.snapshot().await;
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("序列化快照失败")?
        );
    } else {
        for (index, conv) in syncer.get_conversations().await.iter().enumerate() {
            print_conversation(index, conv);
        }
    }
    Ok(())
}
