use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ProgressEvent, TransferEngine, TransferError};

/// 进度事件的最小上报间隔
const EMIT_INTERVAL: Duration = Duration::from_millis(50);

/// 基于 reqwest 的真实传输引擎
///
/// 每个任务持有一个取消 token，暂停时由 `cancel` 触发。
/// 恢复下载时从头重新拉取，不做断点续传。
pub struct HttpEngine {
    client: reqwest::Client,
    tokens: DashMap<String, CancellationToken>,
}

impl HttpEngine {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            tokens: DashMap::new(),
        }
    }

    async fn run_transfer(
        &self,
        task_id: &str,
        url: &str,
        destination: &Path,
        token: CancellationToken,
        progress_tx: UnboundedSender<ProgressEvent>,
    ) -> Result<(), TransferError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::InvalidResponse(format!(
                "HTTP 请求失败，状态码: {}，URL: {}",
                status, url
            )));
        }

        let total_size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|ct_len| ct_len.to_str().ok())
            .and_then(|ct_len| ct_len.parse().ok())
            .unwrap_or(0u64);

        debug!("开始传输: {}, 总大小: {} 字节", task_id, total_size);

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();

        let start_time = Instant::now();
        let mut last_emit = Instant::now();
        let mut transferred = 0u64;

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => {
                    debug!("传输被取消: {}", task_id);
                    return Err(TransferError::Cancelled);
                }
                next = stream.next() => match next {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            file.write_all(&chunk).await?;
            transferred += chunk.len() as u64;

            // 限流上报，避免刷爆事件通道
            if last_emit.elapsed() >= EMIT_INTERVAL {
                let elapsed = start_time.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    transferred as f64 / elapsed
                } else {
                    0.0
                };
                let percentage = if total_size > 0 {
                    transferred as f64 * 100.0 / total_size as f64
                } else {
                    0.0
                };
                let _ = progress_tx.send(ProgressEvent {
                    task_id: task_id.to_string(),
                    transferred,
                    rate,
                    percentage,
                });
                last_emit = Instant::now();
            }
        }

        file.flush().await?;

        // 结束时补发一条 100% 事件，保证完成态总是经由进度事件触达
        let _ = progress_tx.send(ProgressEvent {
            task_id: task_id.to_string(),
            transferred,
            rate: 0.0,
            percentage: 100.0,
        });

        debug!("传输完成: {}, 共 {} 字节", task_id, transferred);
        Ok(())
    }
}

#[async_trait]
impl TransferEngine for HttpEngine {
    async fn start(
        &self,
        task_id: &str,
        url: &str,
        destination: &Path,
        progress_tx: UnboundedSender<ProgressEvent>,
    ) -> Result<(), TransferError> {
        let token = CancellationToken::new();
        self.tokens.insert(task_id.to_string(), token.clone());

        let result = self
            .run_transfer(task_id, url, destination, token, progress_tx)
            .await;

        // 取消路径上 token 已被 cancel 摘除；此处不能再按 id 盲删，
        // 否则可能误删恢复下载后新一轮传输的 token
        if !matches!(result, Err(TransferError::Cancelled)) {
            self.tokens.remove(task_id);
        }
        result
    }

    async fn cancel(&self, task_id: &str) {
        if let Some((_, token)) = self.tokens.remove(task_id) {
            token.cancel();
        } else {
            warn!("取消请求未找到进行中的传输: {}", task_id);
        }
    }
}
