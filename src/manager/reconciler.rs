use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::engine::ProgressEvent;

use super::registry::TaskRegistry;

/// 进度事件加上所属的准入周期号，调度侧在中转时盖章
#[derive(Debug)]
pub(crate) struct TaggedEvent {
    pub cycle: u64,
    pub event: ProgressEvent,
}

/// 进度回灌循环：唯一的事件消费者
///
/// 引擎侧的事件先进通道再由这里逐条写入注册表，
/// 单消费者保证了同一任务的事件按到达顺序生效。
pub(crate) async fn run(registry: TaskRegistry, mut rx: UnboundedReceiver<TaggedEvent>) {
    while let Some(tagged) = rx.recv().await {
        registry.apply_progress(tagged.event, Some(tagged.cycle)).await;
    }
    debug!("进度通道已关闭，回灌循环退出");
}
