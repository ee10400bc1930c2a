use std::sync::Arc;
use std::time::Duration;

use spamguard::aggregate::{summarize, ThreadFilter, ThreadIndex, ThreadObserver};
use spamguard::storage::{MemoryStore, MessageStore};
use spamguard::types::{Direction, Message};

fn msg(id: i64, conversation_id: i64, timestamp: i64, read: bool, score: Option<f32>) -> Message {
    Message {
        id,
        conversation_id,
        address: format!("+90555000{:04}", conversation_id),
        body: format!("message {}", id),
        timestamp,
        direction: Direction::Inbound,
        read,
        seen: read,
        spam_score: score,
    }
}

#[test]
fn one_unread_legitimate_message_keeps_conversation_out_of_spam() {
    let views = summarize(&[msg(1, 7, 100, false, Some(0.9)), msg(2, 7, 200, false, Some(0.3))]);
    let summary = views.get(7).expect("conversation 7");

    assert!(!summary.is_spam_conversation);
    assert_eq!(summary.unread_count, 2);
    assert_eq!(summary.unread_spam_count, 1);
    assert_eq!(summary.unread_normal_count, 1);
}

#[test]
fn all_unread_spam_marks_conversation_spam() {
    let views = summarize(&[msg(1, 7, 100, true, Some(0.1)), msg(2, 7, 200, false, Some(0.95))]);
    assert!(views.get(7).unwrap().is_spam_conversation);
}

#[test]
fn fully_read_conversation_uses_any_spam() {
    let spam = summarize(&[msg(1, 1, 100, true, Some(0.85)), msg(2, 1, 200, true, Some(0.1))]);
    assert!(spam.get(1).unwrap().is_spam_conversation);

    let normal = summarize(&[msg(1, 1, 100, true, Some(0.5)), msg(2, 1, 200, true, None)]);
    assert!(!normal.get(1).unwrap().is_spam_conversation);
}

#[test]
fn unscored_and_threshold_scores_count_as_normal() {
    let views = summarize(&[msg(1, 1, 100, false, None), msg(2, 2, 100, false, Some(0.7))]);

    assert!(!views.get(1).unwrap().is_spam_conversation);
    assert!(!views.get(2).unwrap().is_spam_conversation);
    assert_eq!(views.get(2).unwrap().unread_normal_count, 1);
}

#[test]
fn summary_tracks_the_latest_message() {
    let mut latest = msg(3, 4, 300, false, None);
    latest.address = "BANKA".to_string();
    latest.body = "Hesabiniz".to_string();
    let views = summarize(&[msg(1, 4, 100, true, None), latest, msg(2, 4, 200, true, None)]);
    let summary = views.get(4).unwrap();

    assert_eq!(summary.last_message_id, 3);
    assert_eq!(summary.last_message_timestamp, 300);
    assert_eq!(summary.last_message_body, "Hesabiniz");
    assert_eq!(summary.peer_address, "BANKA");
    assert_eq!(summary.message_count, 3);
}

#[test]
fn equal_timestamps_pick_the_higher_message_id() {
    let mut older = msg(8, 5, 700, true, None);
    older.body = "first".to_string();
    let mut newer = msg(9, 5, 700, true, None);
    newer.body = "second".to_string();

    for messages in [vec![older.clone(), newer.clone()], vec![newer, older]] {
        let views = summarize(&messages);
        let summary = views.get(5).unwrap();
        assert_eq!(summary.last_message_id, 9);
        assert_eq!(summary.last_message_body, "second");
        assert_eq!(summary.last_message_timestamp, 700);
    }
}

#[test]
fn conversations_are_newest_first_and_counts_match_lists() {
    let views = summarize(&[
        msg(1, 1, 100, true, Some(0.9)),
        msg(2, 2, 300, false, Some(0.2)),
        msg(3, 3, 200, false, Some(0.8)),
        msg(4, 4, 400, true, None),
    ]);

    let order: Vec<i64> = views.all().iter().map(|s| s.conversation_id).collect();
    assert_eq!(order, vec![4, 2, 3, 1]);

    let spam: Vec<i64> = views.spam().iter().map(|s| s.conversation_id).collect();
    let normal: Vec<i64> = views.normal().iter().map(|s| s.conversation_id).collect();
    assert_eq!(spam, vec![3, 1]);
    assert_eq!(normal, vec![4, 2]);

    let counts = views.counts();
    assert_eq!(counts.all, views.filtered(ThreadFilter::All).len());
    assert_eq!(counts.spam, spam.len());
    assert_eq!(counts.normal, normal.len());
    assert_eq!(counts.all, counts.spam + counts.normal);
}

#[test]
fn empty_message_set_has_no_conversations() {
    let views = summarize(&[]);
    assert!(views.all().is_empty());
    assert_eq!(views.counts().all, 0);
}

#[test]
fn index_matches_full_recompute_across_changes() {
    let mut messages = vec![
        msg(1, 1, 100, false, None),
        msg(2, 1, 150, false, None),
        msg(3, 2, 120, true, Some(0.9)),
        msg(4, 3, 130, false, Some(0.1)),
    ];
    let mut index = ThreadIndex::new();

    let stats = index.apply(&messages);
    assert_eq!(stats.recomputed, 3);
    assert_eq!(index.views(), summarize(&messages));

    // Score one message in conversation 1.
    messages[1].spam_score = Some(0.95);
    let stats = index.apply(&messages);
    assert_eq!(stats.recomputed, 1);
    assert_eq!(stats.reused, 2);
    assert_eq!(index.views(), summarize(&messages));

    // Drop conversation 2, add a new one.
    messages.retain(|m| m.conversation_id != 2);
    messages.push(msg(5, 9, 500, false, Some(0.99)));
    let stats = index.apply(&messages);
    assert_eq!(stats.removed, 1);
    assert_eq!(stats.recomputed, 1);
    assert_eq!(index.views(), summarize(&messages));
    assert_eq!(index.len(), 3);
}

#[tokio::test]
async fn observer_republishes_on_store_change() {
    let store = Arc::new(MemoryStore::with_messages(vec![msg(1, 1, 100, false, None)]).await);
    let observer = ThreadObserver::spawn(store.subscribe());
    let mut views = observer.subscribe();

    assert_eq!(observer.latest().counts().normal, 1);

    assert!(store.write_score(1, 0.92).await.unwrap());
    tokio::time::timeout(Duration::from_secs(1), views.changed())
        .await
        .expect("views published")
        .expect("observer alive");

    let latest = observer.latest();
    assert_eq!(latest.counts().spam, 1);
    assert_eq!(*latest, summarize(&store.load_all().await));
}
