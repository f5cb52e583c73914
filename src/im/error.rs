//! 同步器对外暴露的错误类型

use thiserror::Error;

/// 同步器操作错误
///
/// 缓存修正（推送事件、分页合并）从不返回错误，只有与服务端交互失败才会
/// 返回给调用方，此时本地缓存保持调用前的状态。
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{operation}失败: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn transport(operation: &'static str, source: anyhow::Error) -> Self {
        SyncError::Transport { operation, source }
    }

    /// 失败的操作名称
    pub fn operation(&self) -> &'static str {
        match self {
            SyncError::Transport { operation, .. } => operation,
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
