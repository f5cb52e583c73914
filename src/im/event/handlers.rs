//! 各类推送事件对缓存的修正
//!
//! 每个处理器只做一件事，并且从不返回错误：引用了本地不存在记录的事件
//! 会被记录日志后丢弃。

use super::{Change, ReconcileOutcome, SkipReason};
use crate::im::dedup::DedupGuard;
use crate::im::message::models::LocalMessage;
use crate::im::store::RecordStore;
use crate::im::types::{BanDelta, LocalConversation, MembershipDelta, PresenceStatus};
use tracing::{debug, info, warn};

fn changed_conversation(store: &RecordStore, conversation_id: &str) -> ReconcileOutcome {
    match store.get_conversation(conversation_id) {
        Some(conv) => ReconcileOutcome::Applied(Change::ConversationChanged(conv.clone())),
        None => ReconcileOutcome::Skipped(SkipReason::UnknownConversation(
            conversation_id.to_string(),
        )),
    }
}

fn unknown(conversation_id: &str, event: &str) -> ReconcileOutcome {
    warn!(
        "[Router] {} 事件引用的会话 {} 不在本地，丢弃",
        event, conversation_id
    );
    ReconcileOutcome::Skipped(SkipReason::UnknownConversation(
        conversation_id.to_string(),
    ))
}

/// 新会话：不存在时插入；公开 / 开放会话同时进入可发现投影
///
/// 会话已在本地但尚未进入投影时，只补入投影并返回 `DiscoverableAdded`
pub fn conversation_added(store: &mut RecordStore, conv: LocalConversation) -> ReconcileOutcome {
    let id = conv.conversation_id.clone();
    let (admit, admit_projection) = {
        let guard = DedupGuard::new(store);
        (
            guard.admits_conversation(&id),
            conv.kind.is_discoverable() && guard.admits_discoverable(&id),
        )
    };

    if !admit {
        if !admit_projection {
            return ReconcileOutcome::Skipped(SkipReason::DuplicateConversation(id));
        }
        // 本地已有该会话，投影沿用本地记录
        let projected = store.get_conversation(&id).cloned().unwrap_or(conv);
        debug!("[Router] 已有会话 {} 补入可发现列表", id);
        store.upsert_discoverable(projected.clone());
        return ReconcileOutcome::Applied(Change::DiscoverableAdded(projected));
    }

    if admit_projection {
        debug!("[Router] 会话 {} 加入可发现列表", id);
        store.upsert_discoverable(conv.clone());
    }

    store.upsert_conversation(conv.clone());
    info!("[Router] 新增会话: {}", id);
    ReconcileOutcome::Applied(Change::ConversationAdded(conv))
}

/// 删除会话；不存在时为无操作
pub fn conversation_deleted(store: &mut RecordStore, conversation_id: &str) -> ReconcileOutcome {
    match store.remove_conversation(conversation_id) {
        Some(_) => {
            info!("[Router] 删除会话: {}", conversation_id);
            ReconcileOutcome::Applied(Change::ConversationDeleted(conversation_id.to_string()))
        }
        None => ReconcileOutcome::Skipped(SkipReason::NoChange),
    }
}

/// 新消息：追加到会话消息列表并推进 latestMessage
pub fn message_created(store: &mut RecordStore, message: LocalMessage) -> ReconcileOutcome {
    let conversation_id = message.conversation_id.clone();
    if !store.contains_conversation(&conversation_id) {
        return unknown(&conversation_id, "MessageCreated");
    }
    if !DedupGuard::new(store).admits_message(&message) {
        return ReconcileOutcome::Skipped(SkipReason::DuplicateMessage {
            conversation_id,
            message_id: message.message_id,
        });
    }

    store.upsert_message(message.clone());
    store.update_conversation(&conversation_id, |conv| {
        conv.advance_latest_message(&message)
    });

    match store.get_conversation(&conversation_id) {
        Some(conv) => ReconcileOutcome::Applied(Change::MessageAppended {
            message,
            conversation: conv.clone(),
        }),
        None => unknown(&conversation_id, "MessageCreated"),
    }
}

pub fn pin_changed(
    store: &mut RecordStore,
    conversation_id: &str,
    is_pinned: bool,
) -> ReconcileOutcome {
    let updated = store.update_conversation(conversation_id, |conv| {
        let changed = conv.is_pinned != is_pinned;
        conv.is_pinned = is_pinned;
        changed
    });
    match updated {
        None => unknown(conversation_id, "PinChanged"),
        Some(false) => ReconcileOutcome::Skipped(SkipReason::NoChange),
        Some(true) => changed_conversation(store, conversation_id),
    }
}

pub fn membership_changed(
    store: &mut RecordStore,
    conversation_id: &str,
    delta: &MembershipDelta,
) -> ReconcileOutcome {
    match store.update_conversation(conversation_id, |conv| conv.apply_membership(delta)) {
        None => unknown(conversation_id, "MembershipChanged"),
        Some(false) => ReconcileOutcome::Skipped(SkipReason::NoChange),
        Some(true) => changed_conversation(store, conversation_id),
    }
}

pub fn ban_changed(
    store: &mut RecordStore,
    conversation_id: &str,
    delta: &BanDelta,
) -> ReconcileOutcome {
    match store.update_conversation(conversation_id, |conv| conv.apply_ban(delta)) {
        None => unknown(conversation_id, "BanChanged"),
        Some(false) => ReconcileOutcome::Skipped(SkipReason::NoChange),
        Some(true) => changed_conversation(store, conversation_id),
    }
}

pub fn presence_changed(
    store: &mut RecordStore,
    user_id: &str,
    status: PresenceStatus,
) -> ReconcileOutcome {
    if store.set_presence(user_id, status) {
        ReconcileOutcome::Applied(Change::PresenceChanged {
            user_id: user_id.to_string(),
            status,
        })
    } else {
        ReconcileOutcome::Skipped(SkipReason::NoChange)
    }
}
