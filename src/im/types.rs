use crate::im::message::models::LocalMessage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ========== 会话相关结构体 ==========

/// 会话类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationKind {
    /// 私密会话，仅成员可见
    Private,
    /// 公开会话，可被发现
    Public,
    /// 开放会话，可被发现且任何人可加入
    Open,
}

impl ConversationKind {
    /// 是否出现在"可发现会话"列表中
    pub fn is_discoverable(self) -> bool {
        matches!(self, ConversationKind::Public | ConversationKind::Open)
    }
}

/// 会话封禁记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedUser {
    #[serde(rename = "userID")]
    pub user_id: String,
    /// 封禁到期时间（毫秒），None 表示永久
    #[serde(default)]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub reason: String,
}

impl BannedUser {
    /// 在 `now_ms` 时刻封禁是否仍然有效
    pub fn is_active(&self, now_ms: i64) -> bool {
        self.expiry.map_or(true, |expiry| expiry > now_ms)
    }
}

/// 成员变更增量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDelta {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

/// 封禁变更增量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BanDelta {
    Banned {
        ban: BannedUser,
    },
    Unbanned {
        #[serde(rename = "userID")]
        user_id: String,
    },
}

/// 用户在线状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    Online,
    Away,
    DoNotDisturb,
    #[default]
    Offline,
}

/// 本地会话数据结构
/// 可以直接从服务器返回的 JSON 反序列化，缺失的字段使用默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConversation {
    /// 会话 ID
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
    /// 显示名称
    #[serde(default)]
    pub display_name: String,
    /// 会话类型
    pub kind: ConversationKind,
    /// 是否置顶
    #[serde(default)]
    pub is_pinned: bool,
    /// 最新消息
    #[serde(default)]
    pub latest_message: Option<LocalMessage>,
    /// 成员 ID 集合
    #[serde(default, rename = "memberIDs")]
    pub member_ids: BTreeSet<String>,
    /// 创建者 ID
    #[serde(default, rename = "creatorID")]
    pub creator_id: Option<String>,
    /// 封禁列表，每个用户至多一条
    #[serde(default)]
    pub banned_users: Vec<BannedUser>,
}

impl LocalConversation {
    pub fn new(
        conversation_id: impl Into<String>,
        display_name: impl Into<String>,
        kind: ConversationKind,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            display_name: display_name.into(),
            kind,
            is_pinned: false,
            latest_message: None,
            member_ids: BTreeSet::new(),
            creator_id: None,
            banned_users: Vec::new(),
        }
    }

    pub fn with_pinned(mut self, is_pinned: bool) -> Self {
        self.is_pinned = is_pinned;
        self
    }

    pub fn with_latest_message(mut self, message: LocalMessage) -> Self {
        self.latest_message = Some(message);
        self
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.member_ids = members.into_iter().map(Into::into).collect();
        self
    }

    /// 最新消息的创建时间
    pub fn latest_message_time(&self) -> Option<i64> {
        self.latest_message.as_ref().map(|m| m.created_at)
    }

    /// 用新消息推进 latestMessage；较旧的消息不会回退已有值
    ///
    /// 返回是否发生了变化
    pub fn advance_latest_message(&mut self, message: &LocalMessage) -> bool {
        match &self.latest_message {
            Some(current) if current.message_id == message.message_id => false,
            Some(current) if current.created_at > message.created_at => false,
            _ => {
                self.latest_message = Some(message.clone());
                true
            }
        }
    }

    /// 应用成员增量，返回是否发生了变化
    pub fn apply_membership(&mut self, delta: &MembershipDelta) -> bool {
        let mut changed = false;
        for user_id in &delta.added {
            changed |= self.member_ids.insert(user_id.clone());
        }
        for user_id in &delta.removed {
            changed |= self.member_ids.remove(user_id);
        }
        changed
    }

    /// 应用封禁增量，返回是否发生了变化
    pub fn apply_ban(&mut self, delta: &BanDelta) -> bool {
        match delta {
            BanDelta::Banned { ban } => {
                match self
                    .banned_users
                    .iter_mut()
                    .find(|b| b.user_id == ban.user_id)
                {
                    Some(existing) if existing == ban => false,
                    Some(existing) => {
                        *existing = ban.clone();
                        true
                    }
                    None => {
                        self.banned_users.push(ban.clone());
                        true
                    }
                }
            }
            BanDelta::Unbanned { user_id } => {
                let before = self.banned_users.len();
                self.banned_users.retain(|b| &b.user_id != user_id);
                self.banned_users.len() != before
            }
        }
    }

    /// 用户在 `now_ms` 时刻是否处于封禁中（过期的封禁不算）
    pub fn is_user_banned(&self, user_id: &str, now_ms: i64) -> bool {
        self.banned_users
            .iter()
            .any(|b| b.user_id == user_id && b.is_active(now_ms))
    }

    /// 清理已过期的封禁，返回清理条数
    pub fn prune_expired_bans(&mut self, now_ms: i64) -> usize {
        let before = self.banned_users.len();
        self.banned_users.retain(|b| b.is_active(now_ms));
        before - self.banned_users.len()
    }
}
