pub mod engine;
pub mod manager;

pub use engine::{ProgressEvent, TransferEngine, TransferError};
pub use manager::DownloadManager;
pub use manager::task::{DownloadTask, TaskState};
pub use manager::view::TaskFilter;
