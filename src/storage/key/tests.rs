use super::*;
use crate::wallet::types::{KeyRecord, KeyStatus};
use chrono::{Duration, Utc};
use tempfile::NamedTempFile;

async fn setup_test_db() -> (SqliteKeyStorage, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db_url = format!("sqlite:{}?mode=rwc", temp_file.path().display());
    let storage = SqliteKeyStorage::new(&db_url).await.unwrap();
    (storage, temp_file)
}

fn create_test_record(key_code: &str) -> KeyRecord {
    KeyRecord {
        key_code: key_code.to_string(),
        provider: "Groq".to_string(),
        balance_usd: 10.0,
        current_usage: 0.0,
        status: KeyStatus::New,
        user_id: None,
        created_at: Utc::now(),
        activated_at: None,
        depleted_at: None,
        last_used_at: None,
        expires_at: Some(Utc::now() + Duration::days(30)),
        last_provider: None,
    }
}

#[tokio::test]
async fn test_insert_and_get() {
    let (storage, _temp_file) = setup_test_db().await;
    let record = create_test_record("GROQ-AAAA1111");

    storage.insert(record.clone()).await.unwrap();

    let fetched = storage.get("GROQ-AAAA1111").await.unwrap().unwrap();
    assert_eq!(fetched.key_code, "GROQ-AAAA1111");
    assert_eq!(fetched.provider, "Groq");
    assert_eq!(fetched.balance_usd, 10.0);
    assert_eq!(fetched.current_usage, 0.0);
    assert_eq!(fetched.status, KeyStatus::New);
    assert!(fetched.user_id.is_none());
}

#[tokio::test]
async fn test_get_nonexistent_key() {
    let (storage, _temp_file) = setup_test_db().await;
    let result = storage.get("GROQ-MISSING0").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_bind_user_only_once() {
    let (storage, _temp_file) = setup_test_db().await;
    storage.insert(create_test_record("GROQ-BIND0001")).await.unwrap();

    let bound = storage.bind_user("GROQ-BIND0001", "alice", Utc::now()).await.unwrap();
    assert!(bound);

    // Second bind loses the user_id IS NULL predicate.
    let rebound = storage.bind_user("GROQ-BIND0001", "bob", Utc::now()).await.unwrap();
    assert!(!rebound);

    let fetched = storage.get("GROQ-BIND0001").await.unwrap().unwrap();
    assert_eq!(fetched.user_id.as_deref(), Some("alice"));
    assert_eq!(fetched.status, KeyStatus::Active);
    assert!(fetched.activated_at.is_some());
}

#[tokio::test]
async fn test_apply_debit_compare_and_swap() {
    let (storage, _temp_file) = setup_test_db().await;
    storage.insert(create_test_record("GROQ-CAS00001")).await.unwrap();
    storage.bind_user("GROQ-CAS00001", "alice", Utc::now()).await.unwrap();

    let update = DebitUpdate {
        new_usage: 4.0,
        new_status: KeyStatus::Active,
        last_used_at: Utc::now(),
        depleted_at: None,
        last_provider: "Groq/llama-3.1-8b-instant".to_string(),
    };

    let applied = storage.apply_debit("GROQ-CAS00001", 0.0, update.clone()).await.unwrap();
    assert!(applied);

    // Stale expectation: another debit already moved usage off 0.0.
    let stale = storage.apply_debit("GROQ-CAS00001", 0.0, update).await.unwrap();
    assert!(!stale);

    let fetched = storage.get("GROQ-CAS00001").await.unwrap().unwrap();
    assert_eq!(fetched.current_usage, 4.0);
    assert_eq!(fetched.last_provider.as_deref(), Some("Groq/llama-3.1-8b-instant"));
}

#[tokio::test]
async fn test_apply_debit_refuses_non_active_key() {
    let (storage, _temp_file) = setup_test_db().await;
    // Still NEW, never bound.
    storage.insert(create_test_record("GROQ-INACT001")).await.unwrap();

    let update = DebitUpdate {
        new_usage: 1.0,
        new_status: KeyStatus::Active,
        last_used_at: Utc::now(),
        depleted_at: None,
        last_provider: "Groq".to_string(),
    };
    let applied = storage.apply_debit("GROQ-INACT001", 0.0, update).await.unwrap();
    assert!(!applied);
}

#[tokio::test]
async fn test_list_by_user() {
    let (storage, _temp_file) = setup_test_db().await;

    for i in 1..=3 {
        let key = format!("GROQ-LIST000{}", i);
        storage.insert(create_test_record(&key)).await.unwrap();
        storage.bind_user(&key, "alice", Utc::now()).await.unwrap();
    }
    storage.insert(create_test_record("GROQ-OTHER001")).await.unwrap();
    storage.bind_user("GROQ-OTHER001", "bob", Utc::now()).await.unwrap();

    let keys = storage.list_by_user("alice").await.unwrap();
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|k| k.user_id.as_deref() == Some("alice")));
}

#[tokio::test]
async fn test_update_status() {
    let (storage, _temp_file) = setup_test_db().await;
    storage.insert(create_test_record("GROQ-STAT0001")).await.unwrap();

    storage.update_status("GROQ-STAT0001", KeyStatus::Expired).await.unwrap();

    let fetched = storage.get("GROQ-STAT0001").await.unwrap().unwrap();
    assert_eq!(fetched.status, KeyStatus::Expired);
}
