//! End-to-end sync scenarios against a mock provider.
//!
//! Real adapters, in-memory stores, and a wiremock server standing in for
//! Google Calendar / Microsoft Graph and their token endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use labsync_auth::{CredentialBundle, CredentialStore, SqliteCredentialStore};
use labsync_calendar::{
    CalendarAdapter, GoogleCalendarAdapter, RecordingSink, SkipReason, SyncOperation,
    SyncOutcome, SyncService,
};
use labsync_core::{ActorId, Config, Provider};
use labsync_services::{Actor, EventBackend, EventPatch, NewEvent, PipelineStage, SqliteEventStore};
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: i64 = 1;

struct Harness {
    server: MockServer,
    service: SyncService,
    events: Arc<SqliteEventStore>,
    credentials: Arc<SqliteCredentialStore>,
    sink: Arc<RecordingSink>,
    config: Config,
}

impl Harness {
    async fn start(provider: Provider) -> Self {
        let server = MockServer::start().await;

        let mut config = Config::default();
        config.sync.provider = provider;
        config.google.client_id = "google-client".to_string();
        config.google.client_secret = "google-secret".to_string();
        config.google.api_base = server.uri();
        config.google.token_url = format!("{}/token", server.uri());
        config.microsoft.client_id = "ms-client".to_string();
        config.microsoft.client_secret = "ms-secret".to_string();
        config.microsoft.authority = server.uri();
        config.microsoft.graph_base = server.uri();

        let events = Arc::new(SqliteEventStore::in_memory().unwrap());
        events.upsert_actor(&Actor::new(OWNER, "director", Some("director@lab.org"))).unwrap();
        events.upsert_actor(&Actor::new(2, "ra", Some("ra@lab.org"))).unwrap();
        events.upsert_actor(&Actor::new(3, "visitor", None)).unwrap();

        let credentials = Arc::new(SqliteCredentialStore::in_memory().unwrap());
        let sink = Arc::new(RecordingSink::new());

        let service =
            SyncService::build(&config, events.clone(), credentials.clone(), sink.clone()).unwrap();

        Self { server, service, events, credentials, sink, config }
    }

    fn connect(&self, provider: Provider, bundle: CredentialBundle) {
        self.credentials.save(ActorId(OWNER), provider, &bundle).unwrap();
    }

    fn connect_valid(&self, provider: Provider) {
        let expires = Utc::now().timestamp() + 3600;
        self.connect(
            provider,
            CredentialBundle::new("valid-token", Some("refresh".to_string()), "", vec![], Some(expires)),
        );
    }

    fn new_event(&self) -> NewEvent {
        let start = Utc.with_ymd_and_hms(2025, 9, 15, 10, 0, 0).unwrap();
        NewEvent {
            title: "Programme review".to_string(),
            description: "Quarterly programme review".to_string(),
            start,
            end: Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap(),
            location: "Board room".to_string(),
            category: "Review".to_string(),
            pipeline_stage: PipelineStage::Confirmed,
            owner: ActorId(OWNER),
            attendees: vec![ActorId(2), ActorId(3)],
            max_attendees: Some(5),
            linked_project: None,
        }
    }
}

fn google_event(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "id": id,
        "htmlLink": format!("https://calendar.google.com/event?eid={}", id)
    }))
}

#[tokio::test]
async fn test_created_event_gets_remote_identity_with_one_create_call() {
    let h = Harness::start(Provider::Google).await;
    h.connect_valid(Provider::Google);

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("Authorization", "Bearer valid-token"))
        .respond_with(google_event("g-100"))
        .expect(1)
        .mount(&h.server)
        .await;

    let synced = h.service.lifecycle.create(h.new_event()).await.unwrap();

    assert_eq!(synced.value.remote_event_id.as_deref(), Some("g-100"));
    assert!(!synced.value.remote_link.clone().unwrap().is_empty());

    let stored = h.events.get(synced.value.id).unwrap().unwrap();
    assert_eq!(stored.remote_event_id.as_deref(), Some("g-100"));
    assert!(!stored.remote_link.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconciling_created_twice_makes_one_remote_event() {
    let h = Harness::start(Provider::Google).await;
    h.connect_valid(Provider::Google);

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(google_event("g-1"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/calendars/primary/events/g-1"))
        .respond_with(google_event("g-1"))
        .expect(1)
        .mount(&h.server)
        .await;

    let event = h.events.create(h.new_event()).unwrap();

    // The caller keeps its copy without a remote id for both calls
    let first = h.service.orchestrator.reconcile(&event, SyncOperation::Created).await;
    let second = h.service.orchestrator.reconcile(&event, SyncOperation::Created).await;

    assert_eq!(first.remote_event_id(), Some("g-1"));
    assert_eq!(second.remote_event_id(), Some("g-1"));
    assert_eq!(
        h.events.get(event.id).unwrap().unwrap().remote_event_id.as_deref(),
        Some("g-1")
    );
}

#[tokio::test]
async fn test_stale_remote_id_is_replaced_on_update() {
    let h = Harness::start(Provider::Google).await;
    h.connect_valid(Provider::Google);

    let created = h.events.create(h.new_event()).unwrap();
    h.events.set_remote(created.id, "abc123", None).unwrap();

    Mock::given(method("PATCH"))
        .and(path("/calendars/primary/events/abc123"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(google_event("g-new"))
        .expect(1)
        .mount(&h.server)
        .await;

    let patch = EventPatch {
        title: Some("Programme review (moved)".to_string()),
        ..EventPatch::default()
    };
    let synced = h.service.lifecycle.update(created.id, patch).await.unwrap();

    let stored = h.events.get(created.id).unwrap().unwrap();
    assert_eq!(stored.remote_event_id.as_deref(), Some("g-new"));
    assert_ne!(stored.remote_event_id.as_deref(), Some("abc123"));
    assert_eq!(
        synced.sync,
        SyncOutcome::Synced {
            remote_event_id: "g-new".to_string(),
            remote_link: Some("https://calendar.google.com/event?eid=g-new".to_string()),
            replaced: Some("abc123".to_string()),
        }
    );
}

#[tokio::test]
async fn test_failing_provider_never_blocks_local_writes() {
    let h = Harness::start(Provider::Google).await;
    h.connect_valid(Provider::Google);

    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let created = h.service.lifecycle.create(h.new_event()).await.unwrap();
    assert!(created.sync.is_failed());
    assert!(created.value.remote_event_id.is_none());

    h.events.set_remote(created.value.id, "prior", Some("https://prior")).unwrap();
    let before = h.events.get(created.value.id).unwrap().unwrap();

    let outcome = h.service.orchestrator.reconcile(&before, SyncOperation::Updated).await;
    assert!(outcome.is_failed());

    let after = h.events.get(created.value.id).unwrap().unwrap();
    assert_eq!(after.remote_event_id.as_deref(), Some("prior"));
    assert_eq!(after.remote_link.as_deref(), Some("https://prior"));
    assert_eq!(after.title, before.title);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.attendees, before.attendees);
    assert_eq!(h.sink.failures().len(), 2);
}

#[tokio::test]
async fn test_unconnected_owner_is_skipped_without_network() {
    let h = Harness::start(Provider::Google).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;

    let synced = h.service.lifecycle.create(h.new_event()).await.unwrap();
    assert_eq!(synced.sync, SyncOutcome::Skipped(SkipReason::NotConnected));

    let deleted = h.service.lifecycle.delete(synced.value.id).await.unwrap();
    assert_eq!(deleted, SyncOutcome::NoOp);
    assert!(h.events.get(synced.value.id).unwrap().is_none());
}

#[tokio::test]
async fn test_delete_twice_is_successful_both_times() {
    let h = Harness::start(Provider::Google).await;

    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/g-9"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/g-9"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&h.server)
        .await;

    let adapter = GoogleCalendarAdapter::new(&h.config.google, reqwest::Client::new());
    let bundle = CredentialBundle::new("valid-token", None, "", vec![], None);

    assert!(adapter.delete_event(&bundle, "g-9").await);
    assert!(adapter.delete_event(&bundle, "g-9").await);
}

#[tokio::test]
async fn test_lifecycle_delete_removes_remote_then_local() {
    let h = Harness::start(Provider::Google).await;
    h.connect_valid(Provider::Google);

    let created = h.events.create(h.new_event()).unwrap();
    h.events.set_remote(created.id, "g-7", None).unwrap();

    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/g-7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.service.lifecycle.delete(created.id).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Deleted { remote_event_id: "g-7".to_string() });
    assert!(h.events.get(created.id).unwrap().is_none());
}

#[tokio::test]
async fn test_expired_token_is_renewed_and_persisted() {
    let h = Harness::start(Provider::Google).await;
    h.connect(
        Provider::Google,
        CredentialBundle::new("stale", Some("refresh-1".to_string()), "", vec![], Some(0)),
    );

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "renewed-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("Authorization", "Bearer renewed-token"))
        .respond_with(google_event("g-r"))
        .expect(1)
        .mount(&h.server)
        .await;

    let synced = h.service.lifecycle.create(h.new_event()).await.unwrap();
    assert_eq!(synced.value.remote_event_id.as_deref(), Some("g-r"));

    let stored = h.credentials.load(ActorId(OWNER), Provider::Google).unwrap().unwrap();
    assert_eq!(stored.access_token, "renewed-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_rejected_token_without_expiry_is_refreshed_and_retried() {
    let h = Harness::start(Provider::Google).await;
    h.connect(
        Provider::Google,
        CredentialBundle::new("stale", Some("refresh-1".to_string()), "", vec![], None),
    );

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(google_event("g-f"))
        .expect(1)
        .mount(&h.server)
        .await;

    let synced = h.service.lifecycle.create(h.new_event()).await.unwrap();

    assert_eq!(synced.value.remote_event_id.as_deref(), Some("g-f"));
    let stored = h.credentials.load(ActorId(OWNER), Provider::Google).unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh");
}

#[tokio::test]
async fn test_revoked_refresh_token_skips_sync() {
    let h = Harness::start(Provider::Google).await;
    h.connect(
        Provider::Google,
        CredentialBundle::new("stale", Some("revoked".to_string()), "", vec![], Some(0)),
    );

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(path("/calendars/primary/events"))
        .respond_with(google_event("never"))
        .expect(0)
        .mount(&h.server)
        .await;

    let synced = h.service.lifecycle.create(h.new_event()).await.unwrap();

    assert_eq!(synced.sync, SyncOutcome::Skipped(SkipReason::AuthExpired));
    assert!(synced.value.remote_event_id.is_none());
    // Bundle is left for the user to re-authorize, not deleted
    assert!(h.credentials.load(ActorId(OWNER), Provider::Google).unwrap().is_some());
}

#[tokio::test]
async fn test_microsoft_path_syncs_through_graph() {
    let h = Harness::start(Provider::Microsoft).await;
    h.connect_valid(Provider::Microsoft);

    Mock::given(method("POST"))
        .and(path("/me/events"))
        .and(header("Prefer", r#"outlook.timezone="UTC""#))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "AAMk-1",
            "webLink": "https://outlook.office365.com/owa/?itemid=AAMk-1"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let synced = h.service.lifecycle.create(h.new_event()).await.unwrap();

    assert_eq!(synced.value.remote_event_id.as_deref(), Some("AAMk-1"));
    let attempt = h.sink.last().unwrap();
    assert_eq!(attempt.provider, Provider::Microsoft);
    assert_eq!(attempt.operation, SyncOperation::Created);
}
