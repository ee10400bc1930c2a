use std::collections::HashSet;

use spamguard::storage::{Database, MessageStore};
use spamguard::types::{Direction, Message};

fn msg(id: i64, conversation_id: i64, timestamp: i64) -> Message {
    Message {
        id,
        conversation_id,
        address: format!("+90{}", conversation_id),
        body: format!("body {}", id),
        timestamp,
        direction: Direction::Inbound,
        read: false,
        seen: false,
        spam_score: None,
    }
}

async fn open_temp() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("messages.db"))
        .await
        .expect("open db");
    (dir, db)
}

#[tokio::test]
async fn fetch_unscored_is_newest_first_and_limited() {
    let (_dir, db) = open_temp().await;
    let mut scored = msg(4, 2, 400);
    scored.spam_score = Some(0.2);
    db.insert_messages(&[msg(1, 1, 100), msg(2, 1, 300), msg(3, 2, 200), scored])
        .await
        .unwrap();

    let batch = db.fetch_unscored(2).await.unwrap();
    let ids: Vec<i64> = batch.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(db.unscored_count().await.unwrap(), 3);
}

#[tokio::test]
async fn write_score_only_touches_unscored_existing_messages() {
    let (_dir, db) = open_temp().await;
    db.insert_messages(&[msg(1, 1, 100)]).await.unwrap();

    assert!(db.write_score(1, 0.81).await.unwrap());
    assert!(!db.write_score(1, 0.05).await.unwrap());
    assert!(!db.write_score(99, 0.5).await.unwrap());

    let stored = db.read(1).await.unwrap().expect("message 1");
    let score = stored.spam_score.expect("scored");
    assert!((score - 0.81).abs() < 1e-6);
    assert_eq!(db.read(99).await.unwrap(), None);
}

#[tokio::test]
async fn insert_ignores_existing_ids() {
    let (_dir, db) = open_temp().await;
    assert_eq!(db.insert_messages(&[msg(1, 1, 100), msg(2, 1, 200)]).await.unwrap(), 2);

    let mut changed = msg(1, 1, 100);
    changed.body = "rewritten".to_string();
    assert_eq!(db.insert_messages(&[changed, msg(3, 1, 300)]).await.unwrap(), 1);
    assert_eq!(db.read(1).await.unwrap().unwrap().body, "body 1");
}

#[tokio::test]
async fn messages_round_trip_through_sqlite() {
    let (_dir, db) = open_temp().await;
    let mut original = msg(5, 9, 1_700_000_000_000);
    original.direction = Direction::Outbound;
    original.read = true;
    original.seen = true;
    original.body = "Kampanya: %50 indirim! ğüşiöç".to_string();
    db.insert_messages(&[original.clone()]).await.unwrap();

    assert_eq!(db.read(5).await.unwrap(), Some(original));
}

#[tokio::test]
async fn subscribers_see_every_mutation() {
    let (_dir, db) = open_temp().await;
    let mut changes = db.subscribe();
    assert!(changes.borrow_and_update().is_empty());

    db.insert_messages(&[msg(1, 1, 100), msg(2, 2, 200)]).await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().len(), 2);

    db.write_score(1, 0.9).await.unwrap();
    assert!(changes.has_changed().unwrap());
    let snapshot = changes.borrow_and_update().clone();
    let first = snapshot.iter().find(|m| m.id == 1).unwrap();
    assert_eq!(first.spam_score, Some(0.9));

    // A write that changes nothing does not publish.
    db.write_score(1, 0.1).await.unwrap();
    assert!(!changes.has_changed().unwrap());

    db.delete(&[2]).await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().len(), 1);
}

#[tokio::test]
async fn conversation_operations() {
    let (_dir, db) = open_temp().await;
    db.insert_messages(&[msg(1, 1, 300), msg(2, 1, 100), msg(3, 2, 200), msg(4, 3, 50)])
        .await
        .unwrap();

    let thread: Vec<i64> = db
        .conversation_messages(1)
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(thread, vec![2, 1]);

    assert_eq!(db.mark_conversation_read(1).await.unwrap(), 2);
    assert_eq!(db.mark_conversation_read(1).await.unwrap(), 0);
    assert!(db.conversation_messages(1).await.unwrap().iter().all(|m| m.read));

    assert_eq!(db.delete_conversations(&[2, 3]).await.unwrap(), 2);
    assert_eq!(db.delete_conversations(&[]).await.unwrap(), 0);
    let remaining: Vec<i64> = db.load_all().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(remaining, vec![1, 2]);
}

#[tokio::test]
async fn reopening_keeps_scores() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("messages.db");
    {
        let db = Database::open(&path).await.unwrap();
        db.insert_messages(&[msg(1, 1, 100), msg(2, 1, 200)]).await.unwrap();
        db.write_score(2, 0.75).await.unwrap();
    }

    let db = Database::open(&path).await.unwrap();
    assert_eq!(db.unscored_count().await.unwrap(), 1);
    assert_eq!(db.subscribe().borrow().len(), 2);
}

#[tokio::test]
async fn in_memory_database_works() {
    let db = Database::open_in_memory().await.unwrap();
    db.insert_messages(&[msg(1, 1, 100)]).await.unwrap();
    assert_eq!(db.fetch_unscored(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn fetch_unscored_excluding_skips_given_ids() {
    let (_dir, db) = open_temp().await;
    db.insert_messages(&[msg(1, 1, 100), msg(2, 1, 200), msg(3, 2, 300), msg(4, 2, 400)])
        .await
        .unwrap();

    let exclude: HashSet<i64> = [4, 3].into_iter().collect();
    let ids: Vec<i64> = db
        .fetch_unscored_excluding(10, &exclude)
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![2, 1]);

    let first: Vec<i64> = db
        .fetch_unscored_excluding(1, &HashSet::new())
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(first, vec![4]);
}

#[tokio::test]
async fn score_writes_patch_the_snapshot_in_place() {
    let (_dir, db) = open_temp().await;
    let messages: Vec<Message> = (1..=20).map(|i| msg(i, i % 4, i * 10)).collect();
    db.insert_messages(&messages).await.unwrap();
    let changes = db.subscribe();

    for id in (1..=20).step_by(3) {
        assert!(db.write_score(id, id as f32 / 40.0).await.unwrap());
        let snapshot = changes.borrow().clone();
        assert_eq!(*snapshot, db.load_all().await.unwrap());
    }
}

#[tokio::test]
async fn score_for_message_written_by_another_connection_reloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("messages.db");
    let db = Database::open(&path).await.unwrap();
    let other = Database::open(&path).await.unwrap();

    other.insert_messages(&[msg(7, 1, 100)]).await.unwrap();
    assert!(db.subscribe().borrow().is_empty());

    assert!(db.write_score(7, 0.3).await.unwrap());
    let snapshot = db.subscribe().borrow().clone();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].spam_score, Some(0.3));
}
