use serde::{Deserialize, Serialize};
use url::Url;

/// 单个下载任务，注册表是它的唯一归属
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
    pub name: String,
    /// 下载进度百分比 (0~100)
    pub progress: f64,
    /// 瞬时速率 (字节/秒)，仅在下载中有意义
    pub speed: f64,
    pub state: TaskState,
    /// 准入周期计数，每次准入递增；用于识别上一轮传输的过期结算/事件
    #[serde(skip)]
    pub cycle: u64,
}

impl DownloadTask {
    pub fn new(id: String, url: String) -> Self {
        let name = derive_name(&url, &id);
        Self {
            id,
            url,
            name,
            progress: 0.0,
            speed: 0.0,
            state: TaskState::Idle,
            cycle: 0,
        }
    }

    /// 格式化速率显示，阈值为 1024 和 1024*1024 字节/秒
    pub fn format_speed(&self) -> String {
        format_speed(self.speed)
    }
}

/// 任务状态机：Idle -> Running -> {Paused, Done, Error}; Paused -> Running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Running,
    Paused,
    Done,
    Error,
}

impl TaskState {
    /// 展示用状态文案
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Idle => "等待中",
            TaskState::Running => "下载中",
            TaskState::Paused => "已暂停",
            TaskState::Done => "已完成",
            TaskState::Error => "下载失败",
        }
    }

    /// 展示用严重级别，交给外部界面渲染徽章颜色
    pub fn severity(&self) -> &'static str {
        match self {
            TaskState::Idle => "info",
            TaskState::Running => "primary",
            TaskState::Paused => "warning",
            TaskState::Done => "success",
            TaskState::Error => "danger",
        }
    }
}

/// 从 URL 的最后一段路径推导任务名，取不到时回退到任务 id
fn derive_name(url: &str, id: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty());

    segment.unwrap_or_else(|| id.to_string())
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    if bytes_per_sec < KB {
        format!("{:.0} B/s", bytes_per_sec)
    } else if bytes_per_sec < MB {
        format!("{:.1} KB/s", bytes_per_sec / KB)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / MB)
    }
}
