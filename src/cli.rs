use clap::Parser;
use std::path::PathBuf;

use download_center::manager::DEFAULT_CONCURRENCY;

/// 多任务下载管理器
#[derive(Parser, Debug)]
#[command(name = "dlc")]
#[command(version = "0.1.0")]
#[command(about = "一个简单的多任务下载调度核心", long_about = None)]
pub struct Cli {
    /// 下载链接 (可一次指定多个)
    #[arg(value_name = "URL", required = true)]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub urls: Vec<String>,

    /// 文件保存目录
    #[arg(long, value_name = "DIR")]
    #[arg(default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    #[arg(long, value_name = "并发数", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// 结束后以JSON输出任务列表
    #[arg(long)]
    pub json: bool,
}
