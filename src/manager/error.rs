use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("任务未找到: {0}")]
    TaskNotFound(String),
    #[error("任务已存在: {0}")]
    TaskAlreadyExists(String),
    #[error("准入队列已关闭")]
    QueueClosed,
}
