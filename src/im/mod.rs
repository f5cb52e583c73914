pub mod conversation;
pub mod dedup;
pub mod error;
pub mod event;
pub mod message;
pub mod store;
pub mod types;

// 重新导出会话同步相关类型
pub use conversation::{ConversationSyncer, ConversationSyncerConfig};
pub use error::SyncError;
pub use types::LocalConversation;
