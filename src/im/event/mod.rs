//! 推送事件模块
//!
//! 服务端推送的事件类型、分发器、各事件的缓存修正处理器以及订阅管理

pub mod handlers;
pub mod router;
pub mod subscription;

use crate::im::message::models::LocalMessage;
use crate::im::types::{BanDelta, LocalConversation, MembershipDelta, PresenceStatus};
use serde::{Deserialize, Serialize};

pub use router::EventRouter;
pub use subscription::{
    InProcessEventHub, PushEventSource, Subscription, SubscriptionId, SubscriptionSet,
};

/// 服务端推送事件（JSON 以 `type` 字段区分）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PushEvent {
    ConversationAdded {
        conversation: LocalConversation,
    },
    ConversationDeleted {
        #[serde(rename = "conversationID")]
        conversation_id: String,
    },
    MessageCreated {
        message: LocalMessage,
    },
    PinChanged {
        #[serde(rename = "conversationID")]
        conversation_id: String,
        #[serde(rename = "isPinned")]
        is_pinned: bool,
    },
    MembershipChanged {
        #[serde(rename = "conversationID")]
        conversation_id: String,
        delta: MembershipDelta,
    },
    BanChanged {
        #[serde(rename = "conversationID")]
        conversation_id: String,
        delta: BanDelta,
    },
    PresenceChanged {
        #[serde(rename = "userID")]
        user_id: String,
        status: PresenceStatus,
    },
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::ConversationAdded { .. } => EventKind::ConversationAdded,
            PushEvent::ConversationDeleted { .. } => EventKind::ConversationDeleted,
            PushEvent::MessageCreated { .. } => EventKind::MessageCreated,
            PushEvent::PinChanged { .. } => EventKind::PinChanged,
            PushEvent::MembershipChanged { .. } => EventKind::MembershipChanged,
            PushEvent::BanChanged { .. } => EventKind::BanChanged,
            PushEvent::PresenceChanged { .. } => EventKind::PresenceChanged,
        }
    }
}

/// 事件类型，每种类型独立订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConversationAdded,
    ConversationDeleted,
    MessageCreated,
    PinChanged,
    MembershipChanged,
    BanChanged,
    PresenceChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::ConversationAdded,
        EventKind::ConversationDeleted,
        EventKind::MessageCreated,
        EventKind::PinChanged,
        EventKind::MembershipChanged,
        EventKind::BanChanged,
        EventKind::PresenceChanged,
    ];
}

/// 一次修正对缓存造成的变化，用于触发监听器回调
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    ConversationAdded(LocalConversation),
    /// 已有会话仅被补入可发现列表
    DiscoverableAdded(LocalConversation),
    ConversationChanged(LocalConversation),
    ConversationDeleted(String),
    MessageAppended {
        message: LocalMessage,
        conversation: LocalConversation,
    },
    PresenceChanged {
        user_id: String,
        status: PresenceStatus,
    },
}

/// 跳过修正的原因（仅用于诊断，不会作为错误抛给调用方）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    DuplicateConversation(String),
    DuplicateMessage {
        conversation_id: String,
        message_id: String,
    },
    /// 事件引用的会话不在本地
    UnknownConversation(String),
    NoChange,
    Malformed(String),
}

/// 修正结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(Change),
    Skipped(SkipReason),
}

impl ReconcileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}
