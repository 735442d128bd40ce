//! End-to-end behaviour of the community chat view against the loopback
//! broker and an in-process backend.

mod support;

use std::time::Duration;

use tokio::time::Instant;
use wellspring_community::{
    types::{MessageDeleted, UserStopTyping, UserTyping},
    CommunityError, ConnectionState, Identity, InboundEvent, Page, SendState,
};
use wellspring_safety::{Route, Severity};

use support::{message, FixedHandle, Harness, USER_ID};

async fn mounted_in_study_stress(prompt: FixedHandle) -> Harness {
    let mut harness = Harness::new(prompt);
    harness.chat.mount().await.expect("mount");
    harness
        .chat
        .select_community("study-stress")
        .await
        .expect("select community");
    harness
}

#[tokio::test]
async fn test_selecting_community_enters_first_channel() {
    let harness = mounted_in_study_stress(FixedHandle::declining()).await;

    assert_eq!(harness.chat.connection_state(), ConnectionState::Connected);
    assert_eq!(harness.chat.directory().communities().len(), 3);
    assert_eq!(harness.chat.active_channel(), Some("general"));
    assert_eq!(harness.rooms(), vec!["general"]);
}

#[tokio::test]
async fn test_switching_rooms_leaves_only_the_new_one_joined() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;

    harness.chat.select_channel("random").await.unwrap();

    assert_eq!(harness.rooms(), vec!["random"]);
}

#[tokio::test]
async fn test_general_random_general_ends_in_general() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;

    harness.chat.select_channel("Random").await.unwrap();
    harness.chat.select_channel("General").await.unwrap();

    assert_eq!(harness.rooms(), vec!["general"]);
    assert_eq!(harness.chat.active_channel(), Some("general"));
}

#[tokio::test]
async fn test_first_page_is_shown_oldest_first() {
    let mut harness = Harness::new(FixedHandle::declining());
    harness.backend.seed("general", "m-1", "first");
    harness.backend.seed("general", "m-2", "second");
    harness.backend.seed("general", "m-3", "third");

    harness.chat.mount().await.unwrap();
    harness.chat.select_community("study-stress").await.unwrap();

    let ids: Vec<&str> = harness.chat.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m-1", "m-2", "m-3"]);
}

#[tokio::test]
async fn test_member_send_appends_exactly_once() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;
    harness.backend.make_member("study-stress", "Sam");

    let report = harness.chat.submit("Hi everyone").await;
    assert!(report.is_sent());
    assert!(report.escalation.is_none());

    // the broker echoes our own message back to the room
    harness.drain_events().await;

    assert_eq!(harness.chat.messages().len(), 1);
    assert_eq!(harness.chat.messages()[0].body, "Hi everyone");
    assert_eq!(harness.chat.send_state(), SendState::Sent);
    assert_eq!(harness.backend.send_calls(), 1);
    assert_eq!(harness.prompt.times_asked(), 0);
}

#[tokio::test]
async fn test_non_member_joins_study_stress_and_retries() {
    let mut harness = mounted_in_study_stress(FixedHandle::answering("StudyBug42")).await;

    let report = harness.chat.submit("Hi all").await;

    let outcome = report.outcome.expect("sent after joining");
    assert_eq!(
        outcome.joined.map(|m| m.handle),
        Some("StudyBug42".to_string())
    );
    assert_eq!(outcome.message.author.handle, "StudyBug42");
    assert_eq!(harness.prompt.times_asked(), 1);
    assert_eq!(harness.backend.join_calls(), 1);
    assert_eq!(harness.backend.send_calls(), 2);

    harness.drain_events().await;
    assert_eq!(harness.chat.messages().len(), 1);
    assert!(harness.chat.notices().is_empty());
}

#[tokio::test]
async fn test_second_rejection_shows_one_notice_and_appends_nothing() {
    let mut harness = mounted_in_study_stress(FixedHandle::answering("StudyBug42")).await;
    harness.backend.reject_all_sends();

    let report = harness.chat.submit("Hi all").await;

    assert!(!report.is_sent());
    assert!(report.notice.is_some());
    assert_eq!(harness.backend.send_calls(), 2);
    assert!(harness.chat.messages().is_empty());
    assert_eq!(harness.chat.notices().len(), 1);
}

#[tokio::test]
async fn test_declined_join_does_not_retry() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;

    let report = harness.chat.submit("Hi all").await;

    assert!(!report.is_sent());
    assert_eq!(harness.backend.send_calls(), 1);
    assert_eq!(harness.backend.join_calls(), 0);
    assert_eq!(harness.chat.notices().len(), 1);
}

#[tokio::test]
async fn test_crisis_text_escalates_and_still_sends() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;
    harness.backend.make_member("study-stress", "Sam");

    let report = harness
        .chat
        .submit("I feel like giving up on this deadline")
        .await;

    let escalation = report.escalation.clone().expect("escalation");
    let routes: Vec<Route> = escalation.links.iter().map(|l| l.route).collect();
    assert_eq!(routes, vec![Route::CrisisResources, Route::UrgentBooking]);
    assert!(report.is_sent());
    assert!(harness.escalation.is_active());
}

#[tokio::test]
async fn test_crisis_text_escalates_even_when_send_fails() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;

    let report = harness.chat.submit("I want to kill myself").await;

    assert!(!report.is_sent());
    assert_eq!(
        report.escalation.map(|e| e.severity),
        Some(Severity::Critical)
    );
    assert!(harness.escalation.is_active());
}

#[tokio::test]
async fn test_duplicate_delete_is_a_noop() {
    let mut harness = Harness::new(FixedHandle::declining());
    harness.backend.seed("general", "m-1", "one");
    harness.backend.seed("general", "m-2", "two");
    harness.chat.mount().await.unwrap();
    harness.chat.select_community("study-stress").await.unwrap();

    let deleted = InboundEvent::MessageDeleted(MessageDeleted {
        id: "m-1".to_string(),
        channel_id: None,
    });
    let now = Instant::now();

    assert!(harness.chat.handle_event(deleted.clone(), now));
    let snapshot = harness.chat.messages().to_vec();
    assert!(!harness.chat.handle_event(deleted, now));
    assert_eq!(harness.chat.messages(), snapshot.as_slice());
}

#[tokio::test]
async fn test_events_for_other_channels_are_ignored() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;

    harness
        .broker
        .push(InboundEvent::NewMessage(message("m-9", "random", "Kit", "wrong room")));
    harness
        .broker
        .publish("general", InboundEvent::NewMessage(message("m-1", "general", "Kit", "hey")));

    harness.drain_events().await;

    let ids: Vec<&str> = harness.chat.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m-1"]);
}

#[tokio::test]
async fn test_remote_edit_replaces_body() {
    let mut harness = Harness::new(FixedHandle::declining());
    let original = harness.backend.seed("general", "m-1", "helo");
    harness.chat.mount().await.unwrap();
    harness.chat.select_community("study-stress").await.unwrap();

    let mut edited = original;
    edited.body = "hello".to_string();
    harness
        .broker
        .publish("general", InboundEvent::MessageUpdated(edited));
    harness.drain_events().await;

    assert_eq!(harness.chat.messages()[0].body, "hello");
}

#[tokio::test]
async fn test_superseded_page_is_discarded() {
    let mut harness = Harness::new(FixedHandle::declining());
    harness.chat.mount().await.unwrap();
    harness.chat.select_community("study-stress").await.unwrap();

    let stale = harness.chat.begin_channel_switch("random").await.unwrap();
    let current = harness.chat.begin_channel_switch("general").await.unwrap();

    let random_page = Page::new(vec![message("r-1", "random", "Kit", "old room")], 1, false);
    assert!(!harness.chat.apply_page(stale, random_page));

    let general_page = Page::new(vec![message("g-1", "general", "Kit", "current room")], 1, false);
    assert!(harness.chat.apply_page(current, general_page));

    let ids: Vec<&str> = harness.chat.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["g-1"]);
    assert_eq!(harness.rooms(), vec!["general"]);
}

#[tokio::test]
async fn test_remote_typing_expires_two_seconds_after_last_signal() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;
    let t0 = Instant::now();

    let typing = InboundEvent::UserTyping(UserTyping {
        user_id: "u-kit".to_string(),
        channel_id: Some("general".to_string()),
        username: Some("Kit".to_string()),
    });
    assert!(harness.chat.handle_event(typing.clone(), t0));
    harness
        .chat
        .handle_event(typing, t0 + Duration::from_millis(1000));

    harness.chat.tick(t0 + Duration::from_millis(2999)).await.unwrap();
    assert!(harness.chat.is_remote_typing());

    harness.chat.tick(t0 + Duration::from_millis(3000)).await.unwrap();
    assert!(!harness.chat.is_remote_typing());
}

#[tokio::test]
async fn test_own_typing_echo_and_stop_events() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;
    let now = Instant::now();

    let own = InboundEvent::UserTyping(UserTyping {
        user_id: USER_ID.to_string(),
        channel_id: None,
        username: None,
    });
    assert!(!harness.chat.handle_event(own, now));

    let other = InboundEvent::UserTyping(UserTyping {
        user_id: "u-kit".to_string(),
        channel_id: None,
        username: None,
    });
    harness.chat.handle_event(other, now);
    assert!(harness
        .chat
        .handle_event(InboundEvent::UserStopTyping(UserStopTyping::default()), now));
    assert!(!harness.chat.is_remote_typing());
}

#[tokio::test]
async fn test_anonymous_typing_echo_is_ignored() {
    let mut harness = Harness::with_identity(FixedHandle::declining(), Identity::anonymous());
    harness.chat.mount().await.expect("mount");
    harness.chat.select_community("study-stress").await.unwrap();

    let echo = InboundEvent::UserTyping(UserTyping {
        user_id: "anonymous".to_string(),
        channel_id: None,
        username: None,
    });

    assert!(!harness.chat.handle_event(echo, Instant::now()));
    assert!(!harness.chat.is_remote_typing());
}

#[tokio::test]
async fn test_local_typing_emits_start_then_one_stop() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;
    let t0 = Instant::now();

    harness.chat.keystroke(t0).await.unwrap();
    harness
        .chat
        .keystroke(t0 + Duration::from_millis(400))
        .await
        .unwrap();
    assert_eq!(
        harness.chat.next_deadline(),
        Some(t0 + Duration::from_millis(1400))
    );

    harness.chat.tick(t0 + Duration::from_millis(1400)).await.unwrap();
    harness.chat.tick(t0 + Duration::from_millis(5000)).await.unwrap();

    let names: Vec<&str> = harness
        .broker
        .outbound()
        .iter()
        .map(|e| e.event_type_name())
        .filter(|name| name.starts_with("typing"))
        .collect();
    assert_eq!(names, vec!["typing_start", "typing_start", "typing_stop"]);
}

#[tokio::test]
async fn test_reply_and_delete_reconcile_the_store() {
    let mut harness = Harness::new(FixedHandle::declining());
    harness.backend.seed("general", "m-1", "anyone else cramming?");
    harness.backend.make_member("study-stress", "Sam");
    harness.chat.mount().await.unwrap();
    harness.chat.select_community("study-stress").await.unwrap();

    let report = harness.chat.reply_to("m-1", "same here").await;
    let reply = report.outcome.expect("reply sent").message;
    assert_eq!(reply.reply_to.as_deref(), Some("m-1"));

    harness.chat.delete_message(&reply.id).await.unwrap();
    let ids: Vec<&str> = harness.chat.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m-1"]);
}

#[tokio::test]
async fn test_community_without_channels_drops_the_previous_room() {
    let mut harness = mounted_in_study_stress(FixedHandle::answering("StudyBug42")).await;
    harness.backend.seed("general", "m-1", "anyone up?");
    harness.chat.select_channel("general").await.unwrap();
    assert_eq!(harness.chat.messages().len(), 1);

    harness.chat.select_community("quiet-room").await.unwrap();

    assert!(harness.rooms().is_empty());
    assert!(harness.chat.messages().is_empty());
    assert_eq!(harness.chat.active_channel(), None);
    assert_eq!(harness.chat.directory().community().unwrap().id, "quiet-room");

    let report = harness.chat.submit("Hi all").await;
    assert!(!report.is_sent());
    assert_eq!(
        report.notice.map(|n| n.message),
        Some(CommunityError::NoActiveChannel.to_string())
    );
    assert_eq!(harness.backend.send_calls(), 0);
    assert_eq!(harness.backend.join_calls(), 0);
    assert_eq!(harness.prompt.times_asked(), 0);
}

#[tokio::test]
async fn test_leave_community_leaves_the_room() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;

    harness.chat.leave_community().await.unwrap();

    assert!(harness.rooms().is_empty());
    assert_eq!(harness.chat.active_channel(), None);
    assert!(harness.chat.directory().community().is_none());
}

#[tokio::test]
async fn test_unmount_tears_down_the_session() {
    let mut harness = mounted_in_study_stress(FixedHandle::declining()).await;
    harness.chat.keystroke(Instant::now()).await.unwrap();

    harness.chat.unmount().await;
    let sent_before = harness.broker.outbound().len();
    harness.chat.keystroke(Instant::now()).await.unwrap();

    assert_eq!(harness.broker.open_connections(), 0);
    assert!(harness.rooms().is_empty());
    assert_eq!(harness.broker.outbound().len(), sent_before);
    assert_eq!(harness.chat.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_mount_failure_is_a_notice_not_a_crash() {
    let mut harness = Harness::new(FixedHandle::declining());
    harness.broker.fail_next_connects(100);

    let result = harness.chat.mount().await;

    assert!(result.is_err());
    assert_eq!(harness.chat.notices().len(), 1);
    assert!(harness.chat.notices()[0].retryable);
}
