use chrono::{NaiveTime, Utc};
use uuid::Uuid;

use broadcast_engine::domain::models::{
    Broadcast, BroadcastContact, BroadcastStatus, ContactStatus, MediaFile, MessagePayload,
};
use broadcast_engine::domain::repositories::{BroadcastRepository, ContactRepository};
use broadcast_engine::infrastructure::repositories::sqlite::{
    SqliteBroadcastRepository, SqliteContactRepository, connect,
};
use broadcast_engine::SmartPauseWindow;

async fn open_repos(dir: &tempfile::TempDir) -> (SqliteBroadcastRepository, SqliteContactRepository) {
    let path = dir.path().join("engine.db");
    let pool = connect(path.to_str().unwrap()).await.unwrap();
    (
        SqliteBroadcastRepository::new(pool.clone()),
        SqliteContactRepository::new(pool),
    )
}

fn sample_broadcast(message: MessagePayload) -> Broadcast {
    let now = Utc::now();
    Broadcast {
        id: Uuid::new_v4(),
        name: Some("launch wave".into()),
        message,
        is_typing: true,
        validate_numbers: true,
        scheduled_at: Some(now + chrono::Duration::minutes(30)),
        smart_pause: Some(SmartPauseWindow::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )),
        status: BroadcastStatus::Pending,
        delay_min_ms: 3_000,
        delay_max_ms: 9_000,
        created_at: now,
        updated_at: now,
    }
}

fn sample_contacts(broadcast_id: Uuid, count: u32) -> Vec<BroadcastContact> {
    let now = Utc::now();
    (0..count)
        .map(|position| BroadcastContact {
            id: Uuid::new_v4(),
            broadcast_id,
            position,
            number: format!("55119900{position:02}"),
            name: Some(format!("Contact {position}")),
            status: ContactStatus::Pending,
            error: None,
            scheduled_at: Some(now),
            send_at: None,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

#[tokio::test]
async fn broadcast_roundtrip_preserves_payload_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, _) = open_repos(&dir).await;

    let original = sample_broadcast(MessagePayload::Image {
        file: MediaFile {
            reference: "media/abc".into(),
            mime_type: "image/jpeg".into(),
            file_name: Some("flyer.jpg".into()),
        },
        caption: Some("Hi {name}".into()),
    });
    broadcasts.insert(&original).await.unwrap();

    let loaded = broadcasts.get(original.id).await.unwrap().unwrap();
    assert_eq!(loaded.message, original.message);
    assert_eq!(loaded.smart_pause, original.smart_pause);
    assert_eq!(loaded.status, BroadcastStatus::Pending);
    assert!(loaded.is_typing);
    assert!(loaded.validate_numbers);
    assert_eq!(loaded.delay_min_ms, 3_000);
    assert_eq!(loaded.delay_max_ms, 9_000);
}

#[tokio::test]
async fn conditional_transition_only_fires_from_expected_state() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, _) = open_repos(&dir).await;

    let broadcast = sample_broadcast(MessagePayload::Text { body: "hi".into() });
    broadcasts.insert(&broadcast).await.unwrap();

    assert!(
        broadcasts
            .transition(broadcast.id, BroadcastStatus::Pending, BroadcastStatus::Running)
            .await
            .unwrap()
    );
    // already Running, the Pending->Running edge no longer applies
    assert!(
        !broadcasts
            .transition(broadcast.id, BroadcastStatus::Pending, BroadcastStatus::Running)
            .await
            .unwrap()
    );

    let loaded = broadcasts.get(broadcast.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, BroadcastStatus::Running);
}

#[tokio::test]
async fn pending_batch_is_ordered_and_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, contacts) = open_repos(&dir).await;

    let broadcast = sample_broadcast(MessagePayload::Text { body: "hi".into() });
    broadcasts.insert(&broadcast).await.unwrap();
    contacts
        .insert_batch(&sample_contacts(broadcast.id, 5))
        .await
        .unwrap();

    let batch = contacts.pending_batch(broadcast.id, 3).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(
        batch.iter().map(|c| c.position).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn claim_running_is_atomic_per_contact() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, contacts) = open_repos(&dir).await;

    let broadcast = sample_broadcast(MessagePayload::Text { body: "hi".into() });
    broadcasts.insert(&broadcast).await.unwrap();
    let rows = sample_contacts(broadcast.id, 1);
    contacts.insert_batch(&rows).await.unwrap();

    assert!(contacts.claim_running(rows[0].id).await.unwrap());
    assert!(!contacts.claim_running(rows[0].id).await.unwrap());

    let send_at = Utc::now();
    contacts.mark_success(rows[0].id, send_at).await.unwrap();
    let loaded = contacts.get(rows[0].id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ContactStatus::Success);
    assert_eq!(
        loaded.send_at.map(|t| t.timestamp()),
        Some(send_at.timestamp())
    );
    // a resolved contact cannot be claimed again
    assert!(!contacts.claim_running(rows[0].id).await.unwrap());
}

#[tokio::test]
async fn orphan_sweep_reverts_running_rows_and_reports_owners() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, contacts) = open_repos(&dir).await;

    let broadcast = sample_broadcast(MessagePayload::Text { body: "hi".into() });
    broadcasts.insert(&broadcast).await.unwrap();
    let rows = sample_contacts(broadcast.id, 3);
    contacts.insert_batch(&rows).await.unwrap();

    contacts.claim_running(rows[0].id).await.unwrap();
    contacts.claim_running(rows[1].id).await.unwrap();
    contacts.mark_failed(rows[1].id, "boom").await.unwrap();

    let affected = contacts.reset_orphaned_running().await.unwrap();
    assert_eq!(affected, vec![broadcast.id]);

    let counts = contacts.status_counts(broadcast.id).await.unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.running, 0);

    // nothing left to sweep
    assert!(contacts.reset_orphaned_running().await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_failed_requeues_and_clears_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, contacts) = open_repos(&dir).await;

    let broadcast = sample_broadcast(MessagePayload::Text { body: "hi".into() });
    broadcasts.insert(&broadcast).await.unwrap();
    let rows = sample_contacts(broadcast.id, 2);
    contacts.insert_batch(&rows).await.unwrap();

    contacts.claim_running(rows[0].id).await.unwrap();
    contacts.mark_failed(rows[0].id, "no route").await.unwrap();
    contacts.claim_running(rows[1].id).await.unwrap();
    contacts.mark_success(rows[1].id, Utc::now()).await.unwrap();

    assert_eq!(contacts.reset_failed(broadcast.id).await.unwrap(), 1);

    let loaded = contacts.get(rows[0].id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ContactStatus::Pending);
    assert_eq!(loaded.error, None);
    assert!(contacts.has_unfinished(broadcast.id).await.unwrap());
}

#[tokio::test]
async fn dispatchable_and_most_recent_queries() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, _) = open_repos(&dir).await;

    let mut first = sample_broadcast(MessagePayload::Text { body: "first".into() });
    first.created_at = Utc::now() - chrono::Duration::minutes(5);
    let second = sample_broadcast(MessagePayload::Text { body: "second".into() });
    let mut done = sample_broadcast(MessagePayload::Text { body: "done".into() });
    done.status = BroadcastStatus::Success;
    done.created_at = Utc::now() + chrono::Duration::minutes(5);

    broadcasts.insert(&first).await.unwrap();
    broadcasts.insert(&second).await.unwrap();
    broadcasts.insert(&done).await.unwrap();

    let dispatchable = broadcasts.find_dispatchable().await.unwrap();
    assert_eq!(
        dispatchable.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let recent = broadcasts.find_most_recent().await.unwrap().unwrap();
    assert_eq!(recent.id, done.id);
}

#[tokio::test]
async fn deleting_a_broadcast_removes_its_contacts() {
    let dir = tempfile::tempdir().unwrap();
    let (broadcasts, contacts) = open_repos(&dir).await;

    let broadcast = sample_broadcast(MessagePayload::Text { body: "hi".into() });
    broadcasts.insert(&broadcast).await.unwrap();
    contacts
        .insert_batch(&sample_contacts(broadcast.id, 3))
        .await
        .unwrap();

    broadcasts.delete(broadcast.id).await.unwrap();

    assert!(broadcasts.get(broadcast.id).await.unwrap().is_none());
    assert!(contacts.list_by_broadcast(broadcast.id).await.unwrap().is_empty());
}
