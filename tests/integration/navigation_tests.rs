use chrono::{DateTime, FixedOffset, NaiveDate};
use gymgate::attendance::{
    AttendanceManager, BoundedStore, ConsistencyMode, MemoryRecordStore, RecordFilter,
    RecordOrder, RecordStore, SessionState, SqliteRecordStore,
};
use gymgate::auth::{AuthContext, Subject, SubjectId};
use gymgate::clock::FixedClock;
use gymgate::navigation::{
    Dispatcher, IdentitySource, IntentOutcome, IntentRegistry, NavigationRequest, RedirectCause,
};
use gymgate::notify::{MemoryNotifier, NotificationKind};
use gymgate::routes::gym::{STAFF_TIME_IN, TIME_IN, TIME_OUT};
use gymgate::routes::{gym_routes, RouteTable};
use std::sync::Arc;
use std::time::Duration;

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn sid(s: &str) -> SubjectId {
    SubjectId::new(s).unwrap()
}

fn signed_in(id: &str) -> AuthContext {
    AuthContext::authenticated(Subject::new(sid(id), "token"))
}

struct Harness {
    dispatcher: Dispatcher,
    clock: Arc<FixedClock>,
    manager: Arc<AttendanceManager>,
    notifier: Arc<MemoryNotifier>,
}

fn harness(store: Arc<dyn RecordStore>, source: IdentitySource) -> Harness {
    let notifier = Arc::new(MemoryNotifier::new());
    let manager = Arc::new(AttendanceManager::new(store, notifier.clone()));
    let clock = Arc::new(FixedClock::new(at("2024-01-01T09:00:00Z")));
    let dispatcher = Dispatcher::new(Arc::new(RouteTable::new(&gym_routes()).unwrap()))
        .with_intents(IntentRegistry::attendance(manager.clone(), source))
        .with_clock(clock.clone());
    Harness {
        dispatcher,
        clock,
        manager,
        notifier,
    }
}

fn sqlite_harness() -> Harness {
    harness(
        Arc::new(SqliteRecordStore::open_in_memory().unwrap()),
        IdentitySource::Session,
    )
}

fn failure(outcome: &gymgate::navigation::NavigationOutcome) -> Option<String> {
    outcome.intents.iter().find_map(|r| match &r.outcome {
        IntentOutcome::Failed(reason) => Some(reason.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn test_full_day_through_navigation() {
    let h = sqlite_harness();
    let u1 = signed_in("U1");
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some(TIME_IN));
    assert!(!outcome.has_failures());
    assert_eq!(outcome.title, "Time In");
    assert!(matches!(
        h.manager.session_state(&sid("U1"), day).await.unwrap(),
        SessionState::Open(_)
    ));

    h.clock.set(at("2024-01-01T17:00:00Z"));
    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_OUT), &u1)
        .await
        .unwrap();
    assert!(!outcome.has_failures());
    assert_eq!(h.dispatcher.current_title(), "Time Out");

    match h.manager.session_state(&sid("U1"), day).await.unwrap() {
        SessionState::Closed(record) => {
            assert_eq!(record.duration(), Some(chrono::Duration::hours(8)));
        }
        other => panic!("expected closed session, got {:?}", other),
    }
}

#[tokio::test]
async fn test_anonymous_time_in_never_reaches_the_store() {
    let store = Arc::new(MemoryRecordStore::new());
    let h = harness(store.clone(), IdentitySource::Session);

    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &AuthContext::anonymous())
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some("login"));
    assert_eq!(outcome.redirects.len(), 1);
    assert_eq!(outcome.redirects[0].cause, RedirectCause::Guard);
    assert!(outcome.intents.is_empty());
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_second_time_in_fails_but_commits() {
    let h = sqlite_harness();
    let u1 = signed_in("U1");
    h.dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::minutes(5));
    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some(TIME_IN));
    assert!(failure(&outcome).unwrap().contains("already open"));
    assert_eq!(h.notifier.count(NotificationKind::Error), 1);
}

#[tokio::test]
async fn test_time_out_without_time_in_reports_and_commits() {
    let h = sqlite_harness();
    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_OUT), &signed_in("U1"))
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some(TIME_OUT));
    assert_eq!(failure(&outcome).as_deref(), Some("No time-in record found"));
    assert_eq!(outcome.title, "Time Out");
    assert_eq!(h.notifier.last().unwrap().message, "No time-in record found");
}

#[tokio::test]
async fn test_staff_route_records_for_path_subject() {
    let store = Arc::new(MemoryRecordStore::new());
    let h = harness(store.clone(), IdentitySource::PathParam);

    let outcome = h
        .dispatcher
        .navigate(
            &NavigationRequest::path("/application/attendance/U7/time-in"),
            &signed_in("ADMIN"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some(STAFF_TIME_IN));
    assert_eq!(outcome.destination.param("id"), Some("U7"));
    assert!(!outcome.has_failures());

    let records = store.snapshot().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject_id, sid("U7"));
}

#[tokio::test]
async fn test_session_source_ignores_path_subject() {
    let store = Arc::new(MemoryRecordStore::new());
    let h = harness(store.clone(), IdentitySource::Session);

    h.dispatcher
        .navigate(
            &NavigationRequest::named(STAFF_TIME_IN).with_param("id", "U7"),
            &signed_in("ADMIN"),
        )
        .await
        .unwrap();
    assert_eq!(store.snapshot().await[0].subject_id, sid("ADMIN"));
}

#[tokio::test]
async fn test_open_session_from_previous_day_does_not_block() {
    let h = sqlite_harness();
    let u1 = signed_in("U1");
    h.dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();

    h.clock.set(at("2024-01-02T09:00:00Z"));
    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();
    assert!(!outcome.has_failures());

    h.clock.set(at("2024-01-02T12:00:00Z"));
    h.dispatcher
        .navigate(&NavigationRequest::named(TIME_OUT), &u1)
        .await
        .unwrap();

    let records = h.manager.history(&sid("U1"), None).await.unwrap();
    assert_eq!(records.len(), 2);
    // The most recent open record is the one closed
    assert!(records[0].is_open());
    assert!(!records[1].is_open());
}

#[tokio::test(start_paused = true)]
async fn test_store_timeout_fails_intent_and_commits() {
    let slow = Arc::new(MemoryRecordStore::new().with_latency(Duration::from_secs(30)));
    let bounded = BoundedStore::new(slow.clone()).with_timeout(Duration::from_secs(2));
    let h = harness(Arc::new(bounded), IdentitySource::Session);

    let outcome = h
        .dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &signed_in("U1"))
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some(TIME_IN));
    assert!(failure(&outcome).unwrap().contains("did not respond"));
    assert!(slow.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_read_then_write_mode_through_navigation() {
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let manager = Arc::new(
        AttendanceManager::new(store.clone(), notifier).with_mode(ConsistencyMode::ReadThenWrite),
    );
    let dispatcher = Dispatcher::new(Arc::new(RouteTable::new(&gym_routes()).unwrap()))
        .with_intents(IntentRegistry::attendance(manager, IdentitySource::Session))
        .with_clock(Arc::new(FixedClock::new(at("2024-01-01T09:00:00Z"))));
    let u1 = signed_in("U1");

    dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();
    // No store-side check: a second time-in opens a second record
    dispatcher
        .navigate(&NavigationRequest::named(TIME_IN), &u1)
        .await
        .unwrap();

    let open = store
        .query(
            &RecordFilter::subject(sid("U1")).open(),
            RecordOrder::TimeInAsc,
            None,
        )
        .await
        .unwrap();
    assert_eq!(open.len(), 2);
}
