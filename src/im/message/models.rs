//! 消息本地模型定义

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 本地消息结构体（创建后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMessage {
    /// 消息 ID
    #[serde(rename = "messageID")]
    pub message_id: String,
    /// 所属会话 ID
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
    /// 发送者 ID
    #[serde(rename = "authorID")]
    pub author_id: String,
    /// 消息正文
    #[serde(default)]
    pub content: String,
    /// 创建时间（毫秒）
    pub created_at: i64,
}

impl LocalMessage {
    pub fn new(
        message_id: impl Into<String>,
        conversation_id: impl Into<String>,
        author_id: impl Into<String>,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            conversation_id: conversation_id.into(),
            author_id: author_id.into(),
            content: content.into(),
            created_at,
        }
    }

    /// 消息列表内的顺序：创建时间升序，时间相同按 ID 升序
    pub fn timeline_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.message_id.cmp(&other.message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_order_breaks_ties_by_id() {
        let a = LocalMessage::new("m1", "c1", "u1", "hi", 10);
        let b = LocalMessage::new("m2", "c1", "u1", "hey", 10);
        let c = LocalMessage::new("m0", "c1", "u1", "yo", 11);

        assert_eq!(a.timeline_cmp(&b), Ordering::Less);
        assert_eq!(c.timeline_cmp(&b), Ordering::Greater);
    }

    #[test]
    fn deserializes_server_field_names() {
        let json = r#"{
            "messageID": "m1",
            "conversationID": "c1",
            "authorID": "u9",
            "content": "hello",
            "createdAt": 1700000000000
        }"#;
        let msg: LocalMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.author_id, "u9");
        assert_eq!(msg.created_at, 1_700_000_000_000);
    }
}
