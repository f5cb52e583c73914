//! 会话排序规则
//!
//! 所有写路径（分页合并、推送事件、本地变更）共用这一个比较器，
//! 不允许在调用点各自实现排序。

use crate::im::types::LocalConversation;
use std::cmp::Ordering;

/// 会话全序比较：
/// 1. 置顶在前
/// 2. 有最新消息的在前
/// 3. 都没有最新消息时按 ID 升序（仅为确定性占位顺序）
/// 4. 都有最新消息时按最新消息时间降序，时间相同按 ID 升序
pub fn compare_conversations(a: &LocalConversation, b: &LocalConversation) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| match (a.latest_message_time(), b.latest_message_time()) {
            (Some(ta), Some(tb)) => tb.cmp(&ta),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.conversation_id.cmp(&b.conversation_id))
}

/// 按会话排序规则对列表原地排序
pub fn sort_conversations(list: &mut [LocalConversation]) {
    list.sort_by(compare_conversations);
}

/// 列表是否已按会话排序规则有序
pub fn is_sorted(list: &[LocalConversation]) -> bool {
    list.windows(2)
        .all(|w| compare_conversations(&w[0], &w[1]) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::message::models::LocalMessage;
    use crate::im::types::ConversationKind;

    fn conv(id: &str, pinned: bool, latest_at: Option<i64>) -> LocalConversation {
        let mut c = LocalConversation::new(id, id, ConversationKind::Private).with_pinned(pinned);
        if let Some(at) = latest_at {
            c = c.with_latest_message(LocalMessage::new(format!("m-{id}"), id, "u1", "x", at));
        }
        c
    }

    fn ids(list: &[LocalConversation]) -> Vec<&str> {
        list.iter().map(|c| c.conversation_id.as_str()).collect()
    }

    #[test]
    fn pinned_then_recency_then_id() {
        let mut list = vec![
            conv("A", true, None),
            conv("B", false, Some(10)),
            conv("C", true, Some(5)),
        ];
        sort_conversations(&mut list);
        assert_eq!(ids(&list), vec!["C", "A", "B"]);
    }

    #[test]
    fn conversations_without_messages_fall_back_to_id_order() {
        let mut list = vec![
            conv("z", false, None),
            conv("a", false, None),
            conv("m", false, Some(1)),
        ];
        sort_conversations(&mut list);
        assert_eq!(ids(&list), vec!["m", "a", "z"]);
    }

    #[test]
    fn equal_timestamps_are_still_totally_ordered() {
        let a = conv("a", false, Some(7));
        let b = conv("b", false, Some(7));
        assert_eq!(compare_conversations(&a, &b), Ordering::Less);
        assert_eq!(compare_conversations(&b, &a), Ordering::Greater);
        assert_eq!(compare_conversations(&a, &a), Ordering::Equal);
    }

    #[test]
    fn detects_unsorted_lists() {
        let list = vec![conv("B", false, Some(10)), conv("A", true, None)];
        assert!(!is_sorted(&list));
    }
}
