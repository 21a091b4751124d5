use chrono::DateTime;
use gymgate::attendance::{AttendanceManager, MemoryRecordStore};
use gymgate::auth::{AuthContext, DurableStorage, FileStorage, Subject, SubjectId, SUBJECT_KEY};
use gymgate::clock::FixedClock;
use gymgate::navigation::{
    Dispatcher, IdentitySource, IntentOutcome, IntentRegistry, NavigationRequest,
};
use gymgate::notify::MemoryNotifier;
use gymgate::routes::gym::TIME_IN;
use gymgate::routes::{gym_routes, RouteTable};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_login_visible_to_a_new_storage_instance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");

    Subject::new(SubjectId::new("U1").unwrap(), "tok")
        .store(&FileStorage::new(&path))
        .unwrap();

    let auth = AuthContext::load(&FileStorage::new(&path));
    assert!(auth.has_active_subject());
    assert_eq!(auth.subject_id().map(SubjectId::as_str), Some("U1"));
    assert_eq!(auth.subject().unwrap().token, "tok");
}

#[test]
fn test_logout_then_load_is_anonymous() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("session.json"));

    Subject::new(SubjectId::new("U1").unwrap(), "tok")
        .store(&storage)
        .unwrap();
    assert!(Subject::clear(&storage).unwrap());
    assert!(!Subject::clear(&storage).unwrap());
    assert_eq!(AuthContext::load(&storage), AuthContext::anonymous());
}

#[test]
fn test_tampered_session_file_signs_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    Subject::new(SubjectId::new("U1").unwrap(), "tok")
        .store(&FileStorage::new(&path))
        .unwrap();

    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("U1", "U2")).unwrap();

    let auth = AuthContext::load(&FileStorage::new(&path));
    assert!(!auth.has_active_subject());
}

#[test]
fn test_unreadable_storage_location_is_anonymous() {
    let dir = tempdir().unwrap();
    // A directory where the file should be
    let storage = FileStorage::new(dir.path());
    assert!(storage.get(SUBJECT_KEY).is_err());
    assert_eq!(AuthContext::load(&storage), AuthContext::anonymous());
}

#[tokio::test]
async fn test_unparseable_subject_passes_guard_but_cannot_record() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("session.json"));
    storage.set(SUBJECT_KEY, "not json at all").unwrap();
    let auth = AuthContext::load(&storage);

    let store = Arc::new(MemoryRecordStore::new());
    let manager = Arc::new(AttendanceManager::new(
        store.clone(),
        Arc::new(MemoryNotifier::new()),
    ));
    let dispatcher = Dispatcher::new(Arc::new(RouteTable::new(&gym_routes()).unwrap()))
        .with_intents(IntentRegistry::attendance(manager, IdentitySource::Session))
        .with_clock(Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z").unwrap(),
        )));

    let outcome = dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &auth)
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some(TIME_IN));
    assert!(matches!(
        &outcome.intents[0].outcome,
        IntentOutcome::Failed(reason) if reason.contains("no subject identifier")
    ));
    assert!(store.snapshot().await.is_empty());
}
