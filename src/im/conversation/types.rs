//! 会话 API DTO（请求和响应结构体）

use crate::im::message::models::LocalMessage;
use crate::im::types::{ConversationKind, LocalConversation};
use serde::{Deserialize, Serialize};

/// 服务端统一响应包装（errCode、errMsg、data），data 可能缺失
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub err_code: i32,
    #[serde(default)]
    pub err_msg: String,
    pub data: Option<T>,
}

/// 分页会话响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPageResp {
    #[serde(default)]
    pub conversations: Vec<LocalConversation>,
}

/// 分页消息响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePageResp {
    #[serde(default)]
    pub messages: Vec<LocalMessage>,
}

/// 单个会话响应（创建 / 加入）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResp {
    pub conversation: LocalConversation,
}

/// 单条消息响应（发送）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResp {
    pub message: LocalMessage,
}

/// 创建会话请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationReq {
    pub display_name: String,
    pub kind: ConversationKind,
    #[serde(rename = "memberIDs")]
    pub member_ids: Vec<String>,
}
