//! 会话 HTTP API 客户端
//!
//! 查询接口和变更接口以 trait 形式定义，同步器只依赖 trait；
//! `ConversationApi` 是基于 reqwest 的默认实现。

use crate::im::conversation::types::{
    ApiEnvelope, ConversationPageResp, ConversationResp, CreateConversationReq, MessagePageResp,
    MessageResp,
};
use crate::im::message::models::LocalMessage;
use crate::im::types::{BannedUser, LocalConversation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use uuid::Uuid;

/// 分页查询接口
#[async_trait]
pub trait ConversationQuery: Send + Sync {
    async fn fetch_conversations_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LocalConversation>>;

    async fn fetch_messages_page(
        &self,
        conversation_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LocalMessage>>;
}

/// 变更接口，返回值按推送事件的同一路径合并进缓存
#[async_trait]
pub trait ConversationMutations: Send + Sync {
    async fn create_conversation(&self, req: &CreateConversationReq) -> Result<LocalConversation>;

    async fn join_conversation(&self, conversation_id: &str) -> Result<LocalConversation>;

    async fn create_message(&self, conversation_id: &str, content: &str) -> Result<LocalMessage>;

    async fn set_pinned(&self, conversation_id: &str, is_pinned: bool) -> Result<()>;

    async fn ban_user(&self, conversation_id: &str, ban: &BannedUser) -> Result<()>;

    async fn unban_user(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    async fn add_member(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    async fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<()>;
}

/// 会话相关的 HTTP API 客户端
pub struct ConversationApi {
    client: reqwest::Client,
    api_base_url: String,
    user_id: String,
}

impl ConversationApi {
    /// 创建新的会话 API 客户端
    ///
    /// `client` 应该已经在外部配置好认证头
    pub fn new(client: reqwest::Client, api_base_url: String, user_id: String) -> Self {
        Self {
            client,
            api_base_url,
            user_id,
        }
    }

    /// 创建带 token 默认请求头的 HTTP 客户端
    pub fn build_http_client(token: &str) -> Result<reqwest::Client> {
        reqwest::ClientBuilder::new()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::HeaderName::from_static("token"),
                    reqwest::header::HeaderValue::from_str(token).context("无效的 token")?,
                );
                headers
            })
            .build()
            .context("创建 HTTP 客户端失败")
    }

    /// 发送 POST 请求并解析统一响应包装，返回 data 字段
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        operation_name: &str,
    ) -> Result<Option<T>> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}{}", self.api_base_url, path);

        info!("[ConvAPI] 📡 请求{}", operation_name);
        debug!("[ConvAPI]   请求URL: {}", url);
        debug!(
            "[ConvAPI]   用户ID: {}, 操作ID: {}",
            self.user_id, operation_id
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("operationID", &operation_id)
            .json(&body)
            .send()
            .await
            .context("请求失败")?;

        let status = response.status();
        let body = response.text().await.context("读取响应 body 失败")?;
        debug!("[ConvAPI]   {}响应: {}", operation_name, body);
        decode_envelope(status, &body, operation_name)
    }

    async fn post_required<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        operation_name: &str,
    ) -> Result<T> {
        self.post(path, body, operation_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("响应中缺少 data 字段"))
    }
}

/// 校验 HTTP 状态和 errCode，取出 data 字段
fn decode_envelope<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    body: &str,
    operation_name: &str,
) -> Result<Option<T>> {
    if !status.is_success() {
        error!(
            "[ConvAPI] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name, status, body
        );
        anyhow::bail!("HTTP 错误 {}: {}", status, body);
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(body)
        .with_context(|| format!("{}响应反序列化失败", operation_name))?;
    if envelope.err_code != 0 {
        error!(
            "[ConvAPI] {}服务器错误，错误码: {}, 错误信息: {}",
            operation_name, envelope.err_code, envelope.err_msg
        );
        anyhow::bail!("服务器错误 {}: {}", envelope.err_code, envelope.err_msg);
    }
    Ok(envelope.data)
}

#[async_trait]
impl ConversationQuery for ConversationApi {
    async fn fetch_conversations_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LocalConversation>> {
        let resp: ConversationPageResp = self
            .post_required(
                "/conversation/get_conversations_page",
                serde_json::json!({
                    "userID": self.user_id,
                    "offset": offset,
                    "limit": limit,
                }),
                "分页会话",
            )
            .await?;

        info!(
            "[ConvAPI] ✅ 分页会话响应，偏移: {}, 会话数: {}",
            offset,
            resp.conversations.len()
        );
        debug!(
            "[ConvAPI]   会话详情: {:?}",
            resp.conversations
                .iter()
                .map(|c| &c.conversation_id)
                .collect::<Vec<_>>()
        );
        Ok(resp.conversations)
    }

    async fn fetch_messages_page(
        &self,
        conversation_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LocalMessage>> {
        let resp: MessagePageResp = self
            .post_required(
                "/msg/get_messages_page",
                serde_json::json!({
                    "userID": self.user_id,
                    "conversationID": conversation_id,
                    "offset": offset,
                    "limit": limit,
                }),
                "分页消息",
            )
            .await?;

        info!(
            "[ConvAPI] ✅ 分页消息响应，会话: {}, 消息数: {}",
            conversation_id,
            resp.messages.len()
        );
        Ok(resp.messages)
    }
}

#[async_trait]
impl ConversationMutations for ConversationApi {
    async fn create_conversation(&self, req: &CreateConversationReq) -> Result<LocalConversation> {
        let body = serde_json::to_value(req).context("序列化创建会话请求失败")?;
        let resp: ConversationResp = self
            .post_required("/conversation/create", body, "创建会话")
            .await?;
        info!(
            "[ConvAPI] ✅ 创建会话成功: {}",
            resp.conversation.conversation_id
        );
        Ok(resp.conversation)
    }

    async fn join_conversation(&self, conversation_id: &str) -> Result<LocalConversation> {
        let resp: ConversationResp = self
            .post_required(
                "/conversation/join",
                serde_json::json!({
                    "userID": self.user_id,
                    "conversationID": conversation_id,
                }),
                "加入会话",
            )
            .await?;
        Ok(resp.conversation)
    }

    async fn create_message(&self, conversation_id: &str, content: &str) -> Result<LocalMessage> {
        let resp: MessageResp = self
            .post_required(
                "/msg/send",
                serde_json::json!({
                    "authorID": self.user_id,
                    "conversationID": conversation_id,
                    "content": content,
                }),
                "发送消息",
            )
            .await?;
        info!("[ConvAPI] ✅ 发送消息成功: {}", resp.message.message_id);
        Ok(resp.message)
    }

    async fn set_pinned(&self, conversation_id: &str, is_pinned: bool) -> Result<()> {
        self.post::<serde_json::Value>(
            "/conversation/set_pinned",
            serde_json::json!({
                "userID": self.user_id,
                "conversationID": conversation_id,
                "isPinned": is_pinned,
            }),
            "设置置顶",
        )
        .await?;
        Ok(())
    }

    async fn ban_user(&self, conversation_id: &str, ban: &BannedUser) -> Result<()> {
        self.post::<serde_json::Value>(
            "/conversation/ban_user",
            serde_json::json!({
                "conversationID": conversation_id,
                "userID": ban.user_id,
                "expiry": ban.expiry,
                "reason": ban.reason,
            }),
            "封禁用户",
        )
        .await?;
        Ok(())
    }

    async fn unban_user(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.post::<serde_json::Value>(
            "/conversation/unban_user",
            serde_json::json!({
                "conversationID": conversation_id,
                "userID": user_id,
            }),
            "解除封禁",
        )
        .await?;
        Ok(())
    }

    async fn add_member(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.post::<serde_json::Value>(
            "/conversation/add_member",
            serde_json::json!({
                "conversationID": conversation_id,
                "userID": user_id,
            }),
            "添加成员",
        )
        .await?;
        Ok(())
    }

    async fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.post::<serde_json::Value>(
            "/conversation/remove_member",
            serde_json::json!({
                "conversationID": conversation_id,
                "userID": user_id,
            }),
            "移除成员",
        )
        .await?;
        Ok(())
    }
}
