//! 事件分发：按事件类型路由到对应的修正处理器

use super::handlers;
use super::{PushEvent, ReconcileOutcome, SkipReason};
use crate::im::store::RecordStore;
use tracing::{debug, warn};

pub struct EventRouter;

impl EventRouter {
    /// 把一个推送事件应用到缓存
    pub fn dispatch(store: &mut RecordStore, event: PushEvent) -> ReconcileOutcome {
        let kind = event.kind();
        debug!("[Router] 分发事件: {:?}", kind);

        let outcome = match event {
            PushEvent::ConversationAdded { conversation } => {
                handlers::conversation_added(store, conversation)
            }
            PushEvent::ConversationDeleted { conversation_id } => {
                handlers::conversation_deleted(store, &conversation_id)
            }
            PushEvent::MessageCreated { message } => handlers::message_created(store, message),
            PushEvent::PinChanged {
                conversation_id,
                is_pinned,
            } => handlers::pin_changed(store, &conversation_id, is_pinned),
            PushEvent::MembershipChanged {
                conversation_id,
                delta,
            } => handlers::membership_changed(store, &conversation_id, &delta),
            PushEvent::BanChanged {
                conversation_id,
                delta,
            } => handlers::ban_changed(store, &conversation_id, &delta),
            PushEvent::PresenceChanged { user_id, status } => {
                handlers::presence_changed(store, &user_id, status)
            }
        };

        if let ReconcileOutcome::Skipped(reason) = &outcome {
            debug!("[Router] 事件 {:?} 未产生变化: {:?}", kind, reason);
        }
        outcome
    }

    /// 解析 JSON 格式的推送事件并分发；无法解析的事件记录日志后丢弃
    pub fn dispatch_json(store: &mut RecordStore, payload: &str) -> ReconcileOutcome {
        match serde_json::from_str::<PushEvent>(payload) {
            Ok(event) => Self::dispatch(store, event),
            Err(e) => {
                warn!("[Router] 解析推送事件失败: {}, 原始内容: {}", e, payload);
                ReconcileOutcome::Skipped(SkipReason::Malformed(e.to_string()))
            }
        }
    }
}
