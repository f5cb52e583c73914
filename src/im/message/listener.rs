//! 消息监听器（对应 AdvancedMsgListener 中与缓存相关的部分）

use async_trait::async_trait;

/// 消息监听器回调接口
#[async_trait]
pub trait MessageListener: Send + Sync {
    /// 收到新消息（推送或本地发送的回执）
    ///
    /// 参数 `message` 是消息的 JSON 字符串表示
    async fn on_recv_new_message(&self, message: String);

    /// 某会话分页拉取的消息已合并进本地缓存
    ///
    /// 参数 `conversation_id` 为会话 ID，`count` 为本次新增的消息数
    async fn on_messages_loaded(&self, conversation_id: String, count: usize);
}

/// 空的消息监听器实现（默认实现）
pub struct EmptyMessageListener;

#[async_trait]
impl MessageListener for EmptyMessageListener {
    async fn on_recv_new_message(&self, _message: String) {}
    async fn on_messages_loaded(&self, _conversation_id: String, _count: usize) {}
}
