use serde::{Deserialize, Serialize};

use super::task::{DownloadTask, TaskState};

/// 展示层可选的过滤档位
///
/// 默认档位只有这四个，Idle / Paused 不单独成档
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    All,
    Running,
    Done,
    Error,
}

impl TaskFilter {
    fn matches(&self, state: TaskState) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Running => state == TaskState::Running,
            TaskFilter::Done => state == TaskState::Done,
            TaskFilter::Error => state == TaskState::Error,
        }
    }
}

/// 过滤 + 搜索的只读投影，纯函数
///
/// 搜索按任务名做大小写敏感的子串匹配；结果保持快照原有顺序，不重排
pub fn project(tasks: &[DownloadTask], filter: TaskFilter, search_text: &str) -> Vec<DownloadTask> {
    tasks
        .iter()
        .filter(|task| filter.matches(task.state) && task.name.contains(search_text))
        .cloned()
        .collect()
}
