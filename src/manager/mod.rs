use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::{ProgressEvent, TransferEngine};

use error::DownloadError;
use queue::{AdmissionQueue, StartCommand};
use registry::TaskRegistry;
use task::{DownloadTask, TaskState};
use view::TaskFilter;

pub mod error;
pub mod registry;
pub mod task;
pub mod view;

mod queue;
mod reconciler;

/// 默认并发上限
pub const DEFAULT_CONCURRENCY: usize = 3;

/// 下载任务调度核心
///
/// 对外是展示层用的命令/查询接口；对内把任务注册表、
/// 准入队列、进度回灌循环粘在一起。字节搬运交给传输引擎。
#[derive(Clone)]
pub struct DownloadManager {
    registry: TaskRegistry,
    queue: AdmissionQueue,
    engine: Arc<dyn TransferEngine>,
    output_dir: PathBuf,
}

impl DownloadManager {
    pub fn new(max_concurrent: usize, output_dir: PathBuf, engine: Arc<dyn TransferEngine>) -> Self {
        let registry = TaskRegistry::new();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();

        // 单消费者回灌进度，保证同一任务事件按序生效
        tokio::spawn(reconciler::run(registry.clone(), progress_rx));

        let queue = AdmissionQueue::start(
            max_concurrent,
            registry.clone(),
            Arc::clone(&engine),
            progress_tx,
        );

        Self {
            registry,
            queue,
            engine,
            output_dir,
        }
    }

    /// 登记新任务，初始状态 Idle，任务名取 URL 最后一段路径
    pub async fn add_task(&self, url: &str) -> Result<String, DownloadError> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let task = DownloadTask::new(task_id.clone(), url.to_string());

        info!("登记下载任务: {} ({})", task.name, task_id);

        if !self.registry.insert(task).await {
            return Err(DownloadError::TaskAlreadyExists(task_id));
        }
        Ok(task_id)
    }

    /// 用户发起下载：仅 Idle 任务生效，其余状态静默忽略
    pub async fn start_task(&self, task_id: &str) -> Result<(), DownloadError> {
        match self.registry.state_of(task_id).await {
            None => Err(DownloadError::TaskNotFound(task_id.to_string())),
            Some(TaskState::Idle) => self.admit(task_id).await,
            Some(state) => {
                debug!("start_task 忽略状态 {:?} 的任务: {}", state, task_id);
                Ok(())
            }
        }
    }

    /// 用户暂停：状态立即变为 Paused，同时向引擎发出取消请求
    ///
    /// 取消是尽力而为的，引擎在途的 IO 可能还会持续一小会儿
    pub async fn pause_task(&self, task_id: &str) -> Result<(), DownloadError> {
        if self.registry.state_of(task_id).await.is_none() {
            return Err(DownloadError::TaskNotFound(task_id.to_string()));
        }
        if self.registry.mark_paused(task_id).await {
            info!("暂停任务: {}", task_id);
            // 取消请求按约定快速返回，这里等它发出去再返回，
            // 确保紧随其后的恢复不会被迟到的取消误伤
            self.engine.cancel(task_id).await;
        }
        Ok(())
    }

    /// 用户恢复：仅 Paused 任务生效，重新准入并发起新一轮传输
    pub async fn resume_task(&self, task_id: &str) -> Result<(), DownloadError> {
        match self.registry.state_of(task_id).await {
            None => Err(DownloadError::TaskNotFound(task_id.to_string())),
            Some(TaskState::Paused) => self.admit(task_id).await,
            Some(state) => {
                debug!("resume_task 忽略状态 {:?} 的任务: {}", state, task_id);
                Ok(())
            }
        }
    }

    /// 按插入顺序导出全部任务的快照
    pub async fn tasks(&self) -> Vec<DownloadTask> {
        self.registry.snapshot().await
    }

    /// 过滤 + 搜索后的任务列表（见 `view::project`）
    pub async fn filtered_tasks(&self, filter: TaskFilter, search_text: &str) -> Vec<DownloadTask> {
        let snapshot = self.registry.snapshot().await;
        view::project(&snapshot, filter, search_text)
    }

    pub async fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.registry.state_of(task_id).await
    }

    async fn admit(&self, task_id: &str) -> Result<(), DownloadError> {
        // 状态检查和乐观转移在注册表内一次完成，Running 任务不会重复入队
        let Some(task) = self.registry.begin_admission(task_id).await else {
            return Ok(());
        };
        let destination = self.output_dir.join(&task.name);
        self.queue.enqueue(StartCommand {
            task_id: task.id,
            url: task.url,
            destination,
            cycle: task.cycle,
        })
    }

    /// 进度事件的直接入口，供外接事件流把事件汇入注册表
    ///
    /// 不带周期信息的事件只受状态守卫约束（非下载中一律丢弃）
    pub async fn reconcile(&self, event: ProgressEvent) {
        self.registry.apply_progress(event, None).await;
    }
}
