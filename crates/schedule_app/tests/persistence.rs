use pretty_assertions::assert_eq;
use schedule_app::RonRecordStore;
use schedule_core::{ContentHash, ScheduleType};
use schedule_engine::{DocumentRecord, RecordKind, RecordStore};
use tempfile::TempDir;

const HASH: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

fn record() -> DocumentRecord {
    DocumentRecord {
        filename: "Dover_30DAY.pdf".to_string(),
        source_link: "https://example.com/Dover_30DAY.pdf".to_string(),
        content_hash: ContentHash::parse(HASH).unwrap(),
        first_seen_timestamp: "20240105101010".to_string(),
        cloud_path: "current/30_DAY/Dover_30DAY_1.pdf".to_string(),
        modify_timestamp: "20240104000000".to_string(),
        creation_timestamp: String::new(),
        kind: ScheduleType::ThirtyDay.into(),
        terminal_id: "dov".to_string(),
    }
}

#[tokio::test]
async fn records_survive_a_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.ron");

    let store = RonRecordStore::open(&path).expect("open empty");
    store
        .upsert("dov", ScheduleType::ThirtyDay, record())
        .await
        .expect("upsert");
    drop(store);

    let reopened = RonRecordStore::open(&path).expect("reopen");
    let hash = ContentHash::parse(HASH).unwrap();
    assert!(reopened.contains_hash(&hash).await.unwrap());
    assert_eq!(
        reopened
            .canonical("dov", ScheduleType::ThirtyDay)
            .await
            .unwrap(),
        Some(record())
    );
    assert_eq!(
        reopened.canonical("dov", ScheduleType::Rollcall).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn discarded_and_archived_records_keep_canonical_refs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.ron");
    let store = RonRecordStore::open(&path).expect("open empty");
    store
        .upsert("dov", ScheduleType::ThirtyDay, record())
        .await
        .expect("upsert");

    let archived = DocumentRecord {
        cloud_path: "archive/Dover_AFB/30_DAY/Dover_30DAY_1.pdf".to_string(),
        ..record()
    };
    store.put_record(archived.clone()).await.expect("archive");
    let notice = DocumentRecord {
        filename: "notice.pdf".to_string(),
        content_hash: ContentHash::parse(&"f".repeat(64)).unwrap(),
        cloud_path: String::new(),
        kind: RecordKind::Discard,
        ..record()
    };
    store.put_record(notice.clone()).await.expect("discard");
    drop(store);

    let reopened = RonRecordStore::open(&path).expect("reopen");
    let snapshot = reopened.snapshot();
    assert_eq!(snapshot.records, vec![archived.clone(), notice.clone()]);
    assert_eq!(
        snapshot.canonical("dov", ScheduleType::ThirtyDay),
        Some(archived)
    );
    assert_eq!(
        reopened.record(&notice.content_hash).await.unwrap(),
        Some(notice)
    );
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"DISCARD\""), "{text}");
}

#[tokio::test]
async fn corrupt_store_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.ron");
    std::fs::write(&path, "(records: [oops").unwrap();

    assert!(RonRecordStore::open(&path).is_err());
}
