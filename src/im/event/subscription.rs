//! 推送事件订阅
//!
//! 订阅句柄在析构时自动退订，保证同一个同步会话重复挂载时不会留下重复的订阅。

use super::{EventKind, PushEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type SubscriptionId = u64;

/// 推送事件来源（实时通道）
///
/// 退订后实现方必须丢弃对应的发送端，接收方据此判断事件流结束。
pub trait PushEventSource: Send + Sync {
    fn subscribe(
        &self,
        kind: EventKind,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> SubscriptionId;

    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId);
}

/// 单个事件类型的订阅句柄，析构时退订
pub struct Subscription {
    source: Arc<dyn PushEventSource>,
    kind: EventKind,
    id: SubscriptionId,
}

impl Subscription {
    pub fn new(
        source: Arc<dyn PushEventSource>,
        kind: EventKind,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> Self {
        let id = source.subscribe(kind, sink);
        debug!("[Subscription] 订阅 {:?}，ID: {}", kind, id);
        Self { source, kind, id }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!("[Subscription] 退订 {:?}，ID: {}", self.kind, self.id);
        self.source.unsubscribe(self.kind, self.id);
    }
}

/// 一次挂载持有的全部订阅
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// 为每种事件类型各订阅一次，全部投递到同一个通道
    pub fn subscribe_all(
        source: Arc<dyn PushEventSource>,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> Self {
        let subscriptions = EventKind::ALL
            .iter()
            .map(|kind| Subscription::new(Arc::clone(&source), *kind, sink.clone()))
            .collect();
        Self { subscriptions }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.subscriptions.iter().map(Subscription::kind).collect()
    }
}

type Subscribers = HashMap<EventKind, Vec<(SubscriptionId, mpsc::UnboundedSender<PushEvent>)>>;

/// 进程内事件中心，用于测试和本地回放
#[derive(Default)]
pub struct InProcessEventHub {
    next_id: AtomicU64,
    subscribers: Mutex<Subscribers>,
}

impl InProcessEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 向该类型的所有订阅者投递事件，返回成功投递的数量
    ///
    /// 接收端已关闭的订阅会被顺手清理
    pub fn publish(&self, event: PushEvent) -> usize {
        let kind = event.kind();
        let mut subscribers = self.lock();
        let Some(sinks) = subscribers.get_mut(&kind) else {
            debug!("[EventHub] 事件 {:?} 没有订阅者", kind);
            return 0;
        };

        let before = sinks.len();
        sinks.retain(|(_, sink)| sink.send(event.clone()).is_ok());
        if sinks.len() != before {
            warn!(
                "[EventHub] 清理了 {} 个已关闭的 {:?} 订阅",
                before - sinks.len(),
                kind
            );
        }
        sinks.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }
}

impl PushEventSource for InProcessEventHub {
    fn subscribe(
        &self,
        kind: EventKind,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().entry(kind).or_default().push((id, sink));
        id
    }

    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        if let Some(sinks) = self.lock().get_mut(&kind) {
            sinks.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}
