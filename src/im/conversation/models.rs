//! 会话同步器配置

use crate::im::conversation::pagination::DEFAULT_FULL_SNAPSHOT_THRESHOLD;

/// 默认 API 地址
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:10002";
/// 默认每页会话数
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// 会话同步器配置
#[derive(Debug, Clone)]
pub struct ConversationSyncerConfig {
    /// 用户 ID
    pub user_id: String,
    /// API 基础 URL
    pub api_base_url: String,
    /// Token
    pub token: String,
    /// "加载更多"每页数量
    pub page_size: usize,
    /// limit 超过该值时分页结果按全量快照处理
    pub full_snapshot_threshold: usize,
}

impl ConversationSyncerConfig {
    /// 使用默认配置创建
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
            full_snapshot_threshold: DEFAULT_FULL_SNAPSHOT_THRESHOLD,
        }
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_full_snapshot_threshold(mut self, threshold: usize) -> Self {
        self.full_snapshot_threshold = threshold;
        self
    }
}
