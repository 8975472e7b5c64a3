use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{info, warn};

use download_center::engine::HttpEngine;
use download_center::manager::DownloadManager;
use download_center::manager::task::TaskState;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    // 解析命令行参数
    let args = cli::Cli::parse();

    // 创建输出目录
    tokio::fs::create_dir_all(&args.output_dir).await?;

    let engine = Arc::new(HttpEngine::new());
    let manager = DownloadManager::new(args.concurrency, args.output_dir.clone(), engine);

    // 登记并发起全部任务
    for url in &args.urls {
        let task_id = manager.add_task(url).await?;
        manager.start_task(&task_id).await?;
    }
    info!("共发起 {} 个下载任务", args.urls.len());

    // 轮询注册表快照，驱动进度条显示
    let multi_pb = MultiProgress::new();
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}% ({prefix})",
    )?
    .progress_chars("#>-");

    let mut bars: HashMap<String, ProgressBar> = HashMap::new();
    loop {
        let snapshot = manager.tasks().await;

        for task in &snapshot {
            let pb = bars.entry(task.id.clone()).or_insert_with(|| {
                let pb = multi_pb.add(ProgressBar::new(100));
                pb.set_style(style.clone());
                pb.set_message(task.name.clone());
                pb
            });
            pb.set_position(task.progress as u64);
            pb.set_prefix(format!("{} {}", task.state.label(), task.format_speed()));

            match task.state {
                TaskState::Done => pb.finish(),
                TaskState::Error => pb.abandon(),
                _ => {}
            }
        }

        let finished = snapshot
            .iter()
            .all(|t| matches!(t.state, TaskState::Done | TaskState::Error));
        if finished {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    // 汇总结果
    let snapshot = manager.tasks().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for task in &snapshot {
            match task.state {
                TaskState::Done => println!("{} {}", "✓".green().bold(), task.name),
                TaskState::Error => println!("{} {}", "✗".red().bold(), task.name),
                _ => warn!("任务未结束: {} ({:?})", task.name, task.state),
            }
        }
        println!("{}", "全部任务处理完毕".green());
    }

    Ok(())
}
