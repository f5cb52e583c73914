//! 会话监听器回调接口

use crate::im::types::PresenceStatus;
use async_trait::async_trait;

/// 会话监听器回调接口
///
/// 会话列表参数均为 JSON 数组字符串
#[async_trait]
pub trait ConversationListener: Send + Sync {
    /// 同步服务器开始（`full_refresh` 表示全量快照拉取）
    async fn on_sync_server_start(&self, full_refresh: bool);

    /// 同步服务器完成
    async fn on_sync_server_finish(&self, full_refresh: bool);

    /// 同步服务器失败
    async fn on_sync_server_failed(&self, full_refresh: bool);

    /// 新会话
    async fn on_new_conversation(&self, conversation_list: String);

    /// 会话进入可发现列表（本地已有该会话）
    async fn on_discoverable_conversation_added(&self, conversation_list: String);

    /// 会话变更
    async fn on_conversation_changed(&self, conversation_list: String);

    /// 会话删除
    async fn on_conversation_deleted(&self, conversation_id: String);

    /// 用户在线状态变更
    async fn on_user_status_changed(&self, user_id: String, status: PresenceStatus);
}

/// 空实现（默认监听器）
pub struct EmptyConversationListener;

#[async_trait]
impl ConversationListener for EmptyConversationListener {
    async fn on_sync_server_start(&self, _full_refresh: bool) {}
    async fn on_sync_server_finish(&self, _full_refresh: bool) {}
    async fn on_sync_server_failed(&self, _full_refresh: bool) {}
    async fn on_new_conversation(&self, _conversation_list: String) {}
    async fn on_discoverable_conversation_added(&self, _conversation_list: String) {}
    async fn on_conversation_changed(&self, _conversation_list: String) {}
    async fn on_conversation_deleted(&self, _conversation_id: String) {}
    async fn on_user_status_changed(&self, _user_id: String, _status: PresenceStatus) {}
}
