mod common;

use chat_sync_core_rust::{
    BannedUser, ConversationKind, CreateConversationReq, PushEvent, SyncError,
};
use common::{conv, syncer, FakeServer, RecordingListener};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn transport_failure_leaves_cache_untouched() {
    let server = FakeServer::with_conversations(vec![conv("a"), conv("b")]);
    let listener = Arc::new(RecordingListener::default());
    let syncer = syncer(&server).with_listener(listener.clone());
    syncer.load_conversations(0, 2).await.unwrap();
    let before = syncer.snapshot().await;

    server.set_offline(true);
    let err = syncer.refresh_conversations().await.unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }));
    assert!(syncer.load_more_conversations().await.is_err());
    assert!(syncer.send_message("a", "hi").await.is_err());
    assert!(syncer.set_pinned("a", true).await.is_err());

    let after = syncer.snapshot().await;
    assert_eq!(after.conversations, before.conversations);
    assert_eq!(listener.sync_failed.load(Ordering::SeqCst), 2);
    assert_eq!(listener.sync_finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn created_conversation_is_deduplicated_against_its_push() {
    let server = FakeServer::with_conversations(vec![]);
    let listener = Arc::new(RecordingListener::default());
    let syncer = syncer(&server).with_listener(listener.clone());

    let created = syncer
        .create_conversation(CreateConversationReq {
            display_name: "lobby".into(),
            kind: ConversationKind::Open,
            member_ids: vec!["me".into()],
        })
        .await
        .unwrap();
    let echo = syncer
        .apply_event(PushEvent::ConversationAdded {
            conversation: created.clone(),
        })
        .await;

    assert!(!echo.is_applied());
    assert_eq!(syncer.get_conversations().await.len(), 1);
    assert_eq!(syncer.discoverable_conversations().await, vec![created]);
    assert_eq!(listener.new_conversations.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn membership_and_ban_round_trip_through_responses() {
    let server = FakeServer::with_conversations(vec![]);
    let syncer = syncer(&server);
    syncer.join_conversation("room").await.unwrap();

    syncer.add_member("room", "bob").await.unwrap();
    syncer
        .ban_user(
            "room",
            BannedUser {
                user_id: "bob".into(),
                expiry: None,
                reason: "spam".into(),
            },
        )
        .await
        .unwrap();
    assert!(syncer.is_user_banned("room", "bob").await);

    syncer.unban_user("room", "bob").await.unwrap();
    syncer.remove_member("room", "bob").await.unwrap();

    let room = syncer.get_conversation("room").await.unwrap();
    assert!(!room.member_ids.contains("bob"));
    assert!(room.member_ids.contains("me"));
    assert!(!syncer.is_user_banned("room", "bob").await);
}

#[tokio::test]
async fn expired_bans_are_pruned() {
    let server = FakeServer::with_conversations(vec![]);
    let syncer = syncer(&server);
    syncer.join_conversation("room").await.unwrap();
    syncer
        .ban_user(
            "room",
            BannedUser {
                user_id: "eve".into(),
                expiry: Some(1),
                reason: String::new(),
            },
        )
        .await
        .unwrap();

    assert!(!syncer.is_user_banned("room", "eve").await);
    assert_eq!(syncer.prune_expired_bans().await, 1);
    assert!(syncer
        .get_conversation("room")
        .await
        .unwrap()
        .banned_users
        .is_empty());
}

#[tokio::test]
async fn full_refresh_reports_deletions() {
    let server = FakeServer::with_conversations(vec![conv("a"), conv("b")]);
    let listener = Arc::new(RecordingListener::default());
    let syncer = syncer(&server).with_listener(listener.clone());
    syncer.refresh_conversations().await.unwrap();

    *server.conversations.lock().unwrap() = vec![conv("b")];
    syncer.refresh_conversations().await.unwrap();

    assert_eq!(*listener.deleted.lock().unwrap(), vec!["a".to_string()]);
}
