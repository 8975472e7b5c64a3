use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use crate::engine::{TransferEngine, TransferError};

use super::error::DownloadError;
use super::reconciler::TaggedEvent;
use super::registry::TaskRegistry;

/// 一条待执行的启动命令，带入队时的准入周期号
#[derive(Debug)]
pub(crate) struct StartCommand {
    pub task_id: String,
    pub url: String,
    pub destination: PathBuf,
    pub cycle: u64,
}

/// 准入队列：FIFO 排队 + 信号量限并发
///
/// 入队即表示任务已被乐观置为 Running；真正向引擎发起 start
/// 要等调度协程拿到空闲槽位，同时在执行的传输数不超过并发上限。
#[derive(Clone)]
pub(crate) struct AdmissionQueue {
    tx: UnboundedSender<StartCommand>,
}

impl AdmissionQueue {
    /// 启动调度协程并返回入队句柄
    pub fn start(
        max_concurrent: usize,
        registry: TaskRegistry,
        engine: Arc<dyn TransferEngine>,
        progress_tx: UnboundedSender<TaggedEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, max_concurrent, registry, engine, progress_tx));
        Self { tx }
    }

    pub fn enqueue(&self, command: StartCommand) -> Result<(), DownloadError> {
        self.tx
            .send(command)
            .map_err(|_| DownloadError::QueueClosed)
    }
}

/// 调度循环：按入队顺序领取命令，逐个等待并发槽位
async fn dispatch(
    mut rx: UnboundedReceiver<StartCommand>,
    max_concurrent: usize,
    registry: TaskRegistry,
    engine: Arc<dyn TransferEngine>,
    progress_tx: UnboundedSender<TaggedEvent>,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    while let Some(command) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let registry = registry.clone();
        let engine = Arc::clone(&engine);
        let progress_tx = progress_tx.clone();

        tokio::spawn(async move {
            // 槽位在传输结束前一直占用
            let _permit = permit;
            let StartCommand {
                task_id,
                url,
                destination,
                cycle,
            } = command;

            // 执行前复核：排队期间任务可能已被暂停，或经恢复进入了新周期，
            // 过期命令直接丢弃，避免为已暂停的任务发起传输
            if !registry.is_current(&task_id, cycle).await {
                debug!("丢弃过期的启动命令: {} (周期 {})", task_id, cycle);
                return;
            }

            info!("开始执行传输: {} -> {:?}", task_id, destination);

            // 引擎只认进度事件的原始形状，这里为本轮传输接一个中转通道，
            // 给每条事件盖上周期号后再汇入回灌循环；
            // 引擎收尾放掉发送端后中转自行退出
            let (engine_tx, mut engine_rx) = mpsc::unbounded_channel();
            let forward_tx = progress_tx;
            tokio::spawn(async move {
                while let Some(event) = engine_rx.recv().await {
                    let _ = forward_tx.send(TaggedEvent { cycle, event });
                }
            });

            match engine.start(&task_id, &url, &destination, engine_tx).await {
                Ok(()) => {
                    // 完成态由 100% 进度事件触达，这里无需改状态
                    debug!("传输正常结束: {}", task_id);
                }
                Err(TransferError::Cancelled) => {
                    // 用户主动暂停导致的取消，不是失败
                    info!("传输因暂停而取消: {}", task_id);
                    registry.settle_failure(&task_id, cycle, true).await;
                }
                Err(e) => {
                    error!("传输失败: {}, 错误: {}", task_id, e);
                    registry.settle_failure(&task_id, cycle, false).await;
                }
            }
        });
    }

    debug!("准入队列已关闭，调度循环退出");
}
