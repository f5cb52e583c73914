//! 推送事件挂载句柄

use crate::im::event::SubscriptionSet;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 关闭时等待事件循环排空的最长时间
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 一次挂载的生命周期：持有全部订阅和事件循环任务
///
/// 丢弃句柄会立即退订并终止事件循环；`close` 会先退订，再等待已入队的事件处理完
pub struct SyncSession {
    subscriptions: Option<SubscriptionSet>,
    task: Option<JoinHandle<()>>,
}

impl SyncSession {
    pub(crate) fn new(subscriptions: SubscriptionSet, task: JoinHandle<()>) -> Self {
        Self {
            subscriptions: Some(subscriptions),
            task: Some(task),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.as_ref().map_or(0, SubscriptionSet::len)
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// 退订全部事件并等待事件循环退出
    pub async fn close(mut self) {
        self.subscriptions.take();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                warn!("[ConvSync] 事件循环未在超时内退出，强制终止");
                task.abort();
            }
        }
        debug!("[ConvSync] 推送事件挂载已关闭");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.subscriptions.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
