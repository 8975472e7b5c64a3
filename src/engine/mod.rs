use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub mod http;

pub use http::HttpEngine;

/// 传输引擎上报的进度事件
///
/// 同一任务的事件按顺序投递，不同任务之间的顺序不做保证
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: String,
    /// 已传输字节数
    pub transferred: u64,
    /// 瞬时速率 (字节/秒)
    pub rate: f64,
    /// 进度百分比 (0~100)
    pub percentage: f64,
}

#[derive(Debug, Error)]
pub enum TransferError {
    /// 因暂停而取消，不算失败
    #[error("传输已取消")]
    Cancelled,
    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("无效的响应: {0}")]
    InvalidResponse(String),
}

/// 传输引擎边界
///
/// 调度核心只依赖这个接口：发起/取消传输，并通过进度通道接收事件。
/// 具体的字节搬运（分段、重试、断点续传）全部由实现方决定。
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// 发起一次传输，直到传输结束（成功、失败或被取消）才返回
    ///
    /// 被 `cancel` 取消时必须以 `TransferError::Cancelled` 结束，
    /// 以便调用方把它和真正的失败区分开
    async fn start(
        &self,
        task_id: &str,
        url: &str,
        destination: &Path,
        progress_tx: UnboundedSender<ProgressEvent>,
    ) -> Result<(), TransferError>;

    /// 请求取消指定任务的传输，不保证立即生效
    async fn cancel(&self, task_id: &str);
}
