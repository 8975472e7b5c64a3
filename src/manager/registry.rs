use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::engine::ProgressEvent;

use super::task::{DownloadTask, TaskState};

/// 任务注册表，所有任务状态的唯一数据源
///
/// 任务只增不减：删除（如果界面提供）属于外部协作方的职责。
/// 所有状态变更都经过这里的方法串行化，调用方不直接改字段。
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<DashMap<String, Arc<Mutex<DownloadTask>>>>>, // task_id -> Task
    order: Arc<Mutex<Vec<String>>>,                               // 插入顺序
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(DashMap::new())),
            order: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 登记新任务，id 重复时拒绝
    pub async fn insert(&self, task: DownloadTask) -> bool {
        let tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.id) {
            return false;
        }
        let id = task.id.clone();
        tasks.insert(id.clone(), Arc::new(Mutex::new(task)));
        self.order.lock().await.push(id);
        true
    }

    async fn get(&self, task_id: &str) -> Option<Arc<Mutex<DownloadTask>>> {
        let tasks = self.tasks.lock().await;
        tasks.get(task_id).map(|t| Arc::clone(&t))
    }

    /// 按插入顺序导出任务快照
    pub async fn snapshot(&self) -> Vec<DownloadTask> {
        let order = { self.order.lock().await.clone() };
        let mut result = Vec::with_capacity(order.len());
        for id in order {
            if let Some(task_lock) = self.get(&id).await {
                result.push(task_lock.lock().await.clone());
            }
        }
        result
    }

    pub async fn state_of(&self, task_id: &str) -> Option<TaskState> {
        let task_lock = self.get(task_id).await?;
        let state = task_lock.lock().await.state;
        Some(state)
    }

    /// 准入检查：Idle / Paused 的任务转入 Running 并开启新一轮下载周期
    ///
    /// 乐观转移：用户发起即显示下载中，真正的并发槽位由准入队列把控。
    /// 返回 None 表示任务不存在或状态不可准入（如已在下载中，防止重复入队）。
    pub async fn begin_admission(&self, task_id: &str) -> Option<DownloadTask> {
        let task_lock = self.get(task_id).await?;
        let mut task = task_lock.lock().await;
        match task.state {
            TaskState::Idle | TaskState::Paused => {
                task.state = TaskState::Running;
                // 重新准入意味着新一轮传输，进度从零开始，周期计数递增
                task.progress = 0.0;
                task.speed = 0.0;
                task.cycle += 1;
                Some(task.clone())
            }
            _ => {
                debug!("任务 {} 当前状态 {:?}，拒绝准入", task.id, task.state);
                None
            }
        }
    }

    /// 用户暂停：仅 Running 可暂停，返回是否需要向引擎发送取消
    pub async fn mark_paused(&self, task_id: &str) -> bool {
        let Some(task_lock) = self.get(task_id).await else {
            return false;
        };
        let mut task = task_lock.lock().await;
        if task.state == TaskState::Running {
            task.state = TaskState::Paused;
            task.speed = 0.0;
            true
        } else {
            false
        }
    }

    /// 某条启动命令是否仍然有效：任务在下载中且周期未被新一轮准入顶替
    pub async fn is_current(&self, task_id: &str, cycle: u64) -> bool {
        let Some(task_lock) = self.get(task_id).await else {
            return false;
        };
        let task = task_lock.lock().await;
        task.state == TaskState::Running && task.cycle == cycle
    }

    /// 引擎侧结束传输：取消原因映射为 Paused，其余失败映射为 Error
    ///
    /// 只结算仍处于同一准入周期且在下载中的任务。暂停后立刻恢复时，
    /// 上一轮传输的取消结算会带着旧周期号迟到，不能把新周期拽回 Paused
    pub async fn settle_failure(&self, task_id: &str, cycle: u64, cancelled: bool) {
        let Some(task_lock) = self.get(task_id).await else {
            return;
        };
        let mut task = task_lock.lock().await;
        if task.state != TaskState::Running || task.cycle != cycle {
            debug!("忽略过期的传输结算: {} (周期 {})", task_id, cycle);
            return;
        }
        task.state = if cancelled {
            TaskState::Paused
        } else {
            TaskState::Error
        };
        task.speed = 0.0;
    }

    /// 应用进度事件（幂等、乱序安全）
    ///
    /// - 未知任务：静默丢弃（可能来自上一轮会话的过期事件）
    /// - 非 Running 任务：静默丢弃，迟到事件不得复活已暂停/已结束的任务
    /// - 带周期号的事件要求周期匹配，上一轮传输的残留事件不落到新周期上
    /// - 进度只增不减，重放等值或更小的百分比不会回退
    /// - 百分比达到 100 时与本次更新一并原子地转入 Done
    pub async fn apply_progress(&self, event: ProgressEvent, cycle: Option<u64>) {
        let Some(task_lock) = self.get(&event.task_id).await else {
            debug!("丢弃未知任务的进度事件: {}", event.task_id);
            return;
        };
        let mut task = task_lock.lock().await;
        if task.state != TaskState::Running {
            debug!(
                "丢弃非下载中任务的进度事件: {} ({:?})",
                event.task_id, task.state
            );
            return;
        }
        if cycle.is_some_and(|c| c != task.cycle) {
            debug!("丢弃过期周期的进度事件: {}", event.task_id);
            return;
        }

        let percentage = event.percentage.clamp(0.0, 100.0);
        task.progress = task.progress.max(percentage);
        task.speed = event.rate;

        if event.percentage >= 100.0 {
            task.state = TaskState::Done;
            task.speed = 0.0;
        }
    }
}
