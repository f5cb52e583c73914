//! 会话模块
//!
//! 会话缓存的分页合并、排序、变更接口以及同步服务

pub mod api;
pub mod listener;
pub mod models;
pub mod pagination;
pub mod service;
pub mod session;
pub mod sort;
pub mod types;

// 重新导出主要类型和函数
pub use api::{ConversationApi, ConversationMutations, ConversationQuery};
pub use listener::{ConversationListener, EmptyConversationListener};
pub use models::ConversationSyncerConfig;
pub use pagination::{MergeMode, MergeSummary, PageRequest, DEFAULT_FULL_SNAPSHOT_THRESHOLD};
pub use service::ConversationSyncer;
pub use session::SyncSession;
pub use sort::{compare_conversations, is_sorted, sort_conversations};
pub use types::CreateConversationReq;
