pub mod im;

// 重新导出常用类型和函数，方便外部使用
pub use im::{
    conversation::{
        ConversationApi, ConversationListener, ConversationMutations, ConversationQuery,
        ConversationSyncer, ConversationSyncerConfig, CreateConversationReq, PageRequest,
        SyncSession,
    },
    error::{SyncError, SyncResult},
    event::{
        EventKind, EventRouter, InProcessEventHub, PushEvent, PushEventSource, ReconcileOutcome,
    },
    message::{LocalMessage, MessageListener},
    store::{CacheSnapshot, RecordStore},
    types::{BannedUser, ConversationKind, LocalConversation, PresenceStatus},
};
