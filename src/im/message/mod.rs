//! 消息模块
//!
//! 消息实体与消息相关回调

pub mod listener;
pub mod models;

// 重新导出主要类型
pub use listener::{EmptyMessageListener, MessageListener};
pub use models::LocalMessage;
