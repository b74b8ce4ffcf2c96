use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use importer_core::{
    FieldKey, FieldMapping, FormattedContact, ImportErrorKind, RawRow, SessionState,
};
use importer_engine::{
    run_import, AccountId, ApiError, ChannelProgressSink, ContactApi, ContactId,
    CreateContactOutcome, CreatedContact, EngineEvent, FailureKind, ImportFile, ImportJob,
    ImportTarget, Inbox, InboxId, LabelAttachment, ProgressSink, RunnerSettings,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// In-memory contact service. Behaviour is keyed on the contact name.
#[derive(Default)]
struct FakeApi {
    created: Mutex<Vec<String>>,
    attached: Mutex<Vec<(ContactId, Vec<String>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancel_on: Option<(String, CancellationToken)>,
}

impl FakeApi {
    fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContactApi for FakeApi {
    async fn list_inboxes(&self, _account_id: AccountId) -> Result<Vec<Inbox>, ApiError> {
        Ok(Vec::new())
    }

    async fn create_inbox(&self, _account_id: AccountId, name: &str) -> Result<Inbox, ApiError> {
        Ok(Inbox {
            id: 1,
            name: name.to_string(),
            channel_type: None,
        })
    }

    async fn create_contact(
        &self,
        _account_id: AccountId,
        _inbox_id: InboxId,
        contact: &FormattedContact,
    ) -> Result<CreateContactOutcome, ApiError> {
        let name = contact.name.clone().unwrap_or_default();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((trigger, token)) = &self.cancel_on {
            if *trigger == name {
                token.cancel();
            }
        }
        if let Some(delay) = name.strip_prefix("wait-") {
            let millis: u64 = delay.parse().unwrap();
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match name.as_str() {
            "taken" => Ok(CreateContactOutcome::Rejected {
                kind: ImportErrorKind::DuplicateEmail,
                message: "Email already exists".to_string(),
            }),
            "offline" => Err(ApiError {
                kind: FailureKind::Network,
                message: "connection refused".to_string(),
            }),
            _ => {
                let mut created = self.created.lock().unwrap();
                created.push(name.clone());
                Ok(CreateContactOutcome::Created(CreatedContact {
                    id: created.len() as ContactId,
                    name: Some(name),
                    email: None,
                    phone_number: None,
                }))
            }
        }
    }

    async fn attach_labels(
        &self,
        _account_id: AccountId,
        contact_id: ContactId,
        labels: &[String],
    ) -> Result<LabelAttachment, ApiError> {
        if labels.iter().any(|label| label == "broken") {
            return Err(ApiError {
                kind: FailureKind::HttpStatus(500),
                message: "label service down".to_string(),
            });
        }
        self.attached
            .lock()
            .unwrap()
            .push((contact_id, labels.to_vec()));
        Ok(LabelAttachment {
            added: labels.to_vec(),
        })
    }
}

fn row(value: Value) -> RawRow {
    value.as_object().unwrap().clone()
}

fn mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping::field("full_name", FieldKey::Name),
        FieldMapping::field("mail", FieldKey::Email),
        FieldMapping::field("tags", FieldKey::Labels),
    ]
}

fn job(rows: Vec<RawRow>) -> ImportJob {
    ImportJob {
        target: ImportTarget {
            account_id: 1,
            inbox_id: 3,
        },
        files: vec![ImportFile {
            name: "contacts.csv".to_string(),
            mappings: mappings(),
            rows,
        }],
    }
}

fn fast() -> RunnerSettings {
    RunnerSettings {
        max_concurrent_rows: 1,
        row_delay: Duration::ZERO,
        call_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn invalid_row_is_recorded_and_the_rest_import() {
    importer_logging::initialize_for_tests();
    let api = Arc::new(FakeApi::default());
    let sink = TestSink::default();
    let rows = vec![
        row(json!({ "full_name": "Ada", "mail": "ada@example.com" })),
        row(json!({ "full_name": "Bob", "mail": "not-an-email" })),
        row(json!({ "full_name": "Cy", "mail": "cy@example.com" })),
    ];

    let summary = run_import(
        api.clone(),
        job(rows),
        fast(),
        CancellationToken::new(),
        &sink,
    )
    .await;

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 2);
    assert_eq!(summary.errors[0].kind(), ImportErrorKind::Validation);
    assert_eq!(summary.errors[0].error.message, "Email is invalid");
    assert_eq!(summary.errors[0].data["full_name"], json!("Bob"));
    assert_eq!(api.created(), vec!["Ada".to_string(), "Cy".to_string()]);
    assert!(!summary.cancelled);

    let events = sink.take();
    let finished = events
        .iter()
        .filter(|event| matches!(event, EngineEvent::RowFinished(_)))
        .count();
    assert_eq!(finished, 3);
    match events.last() {
        Some(EngineEvent::Progress(view)) => {
            assert_eq!(view.session, SessionState::Finished);
            assert_eq!(view.processed_rows, 3);
        }
        other => panic!("expected final progress, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_required_name_is_a_validation_error() {
    let api = Arc::new(FakeApi::default());
    let (tx, rx) = std::sync::mpsc::channel();
    let summary = run_import(
        api.clone(),
        job(vec![row(json!({ "full_name": "  ", "mail": "bad" }))]),
        fast(),
        CancellationToken::new(),
        &ChannelProgressSink::new(tx),
    )
    .await;

    let reports: Vec<_> = rx
        .try_iter()
        .filter_map(|event| match event {
            EngineEvent::RowFinished(report) => Some(report),
            EngineEvent::Progress(_) => None,
        })
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].outcome.contact_created);

    assert_eq!(summary.success_count, 0);
    assert_eq!(
        summary.errors[0].error.message,
        "Name is required, Email is invalid"
    );
    assert!(api.created().is_empty());
}

#[tokio::test]
async fn remote_failures_are_classified_per_row() {
    let api = Arc::new(FakeApi::default());
    let rows = vec![
        row(json!({ "full_name": "taken" })),
        row(json!({ "full_name": "offline" })),
        row(json!({ "full_name": "Dee" })),
    ];

    let summary = run_import(
        api,
        job(rows),
        fast(),
        CancellationToken::new(),
        &TestSink::default(),
    )
    .await;

    assert_eq!(summary.success_count, 1);
    let kinds: Vec<_> = summary
        .errors
        .iter()
        .map(|err| (err.row, err.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (1, ImportErrorKind::DuplicateEmail),
            (2, ImportErrorKind::Other)
        ]
    );
    assert_eq!(summary.errors[1].error.message, "connection refused");
}

#[tokio::test]
async fn label_problems_do_not_undo_the_contact() {
    let api = Arc::new(FakeApi::default());
    let rows = vec![
        row(json!({ "full_name": "Ada", "tags": "vip, te$t" })),
        row(json!({ "full_name": "Bob", "tags": "broken" })),
    ];

    let summary = run_import(
        api.clone(),
        job(rows),
        fast(),
        CancellationToken::new(),
        &TestSink::default(),
    )
    .await;

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.partial_rows(), 1);
    assert_eq!(summary.rows_with_errors(), 2);
    assert_eq!(
        *api.attached.lock().unwrap(),
        vec![(1, vec!["vip".to_string()])]
    );

    assert_eq!(summary.errors[0].row, 1);
    assert_eq!(summary.errors[0].kind(), ImportErrorKind::Validation);
    assert_eq!(
        summary.errors[0].error.message,
        "Contact created successfully, but the following labels were skipped due to invalid format: te$t. Labels can only contain letters, numbers, hyphens and underscores."
    );
    assert_eq!(summary.errors[1].row, 2);
    assert_eq!(summary.errors[1].kind(), ImportErrorKind::Other);
    assert_eq!(
        summary.errors[1].error.message,
        "Contact created successfully, but failed to add labels: label service down"
    );

    assert_eq!(summary.outcomes[0].labels_attached, Some(true));
    assert_eq!(summary.outcomes[1].labels_attached, Some(false));
}

#[tokio::test]
async fn slow_calls_time_out_as_other() {
    let api = Arc::new(FakeApi::default());
    let settings = RunnerSettings {
        call_timeout: Duration::from_millis(50),
        ..fast()
    };

    let summary = run_import(
        api,
        job(vec![row(json!({ "full_name": "wait-2000" }))]),
        settings,
        CancellationToken::new(),
        &TestSink::default(),
    )
    .await;

    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.errors[0].kind(), ImportErrorKind::Other);
}

#[tokio::test]
async fn concurrent_rows_keep_their_row_numbers() {
    let api = Arc::new(FakeApi::default());
    let rows = (0..6)
        .map(|i| row(json!({ "full_name": format!("wait-{}", (6 - i) * 15), "mail": "x" })))
        .collect::<Vec<_>>();
    let settings = RunnerSettings {
        max_concurrent_rows: 3,
        ..fast()
    };

    let summary = run_import(
        api.clone(),
        job(rows.clone()),
        settings,
        CancellationToken::new(),
        &TestSink::default(),
    )
    .await;

    // Invalid email never reaches the service.
    assert_eq!(api.created().len(), 0);
    let numbers: Vec<_> = summary.errors.iter().map(|err| err.row).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);

    let valid_rows = rows
        .into_iter()
        .map(|mut row| {
            row.remove("mail");
            row
        })
        .collect();
    let summary = run_import(
        api.clone(),
        job(valid_rows),
        settings,
        CancellationToken::new(),
        &TestSink::default(),
    )
    .await;

    assert_eq!(summary.success_count, 6);
    let outcome_rows: Vec<_> = summary.outcomes.iter().map(|o| o.row).collect();
    assert_eq!(outcome_rows, vec![1, 2, 3, 4, 5, 6]);
    let max = api.max_in_flight.load(Ordering::SeqCst);
    assert!(max > 1 && max <= 3, "max in flight was {max}");
}

#[tokio::test]
async fn oversized_concurrency_is_capped() {
    let api = Arc::new(FakeApi::default());
    let settings = RunnerSettings {
        max_concurrent_rows: usize::MAX,
        ..fast()
    };

    let summary = run_import(
        api.clone(),
        job(vec![
            row(json!({ "full_name": "Ada" })),
            row(json!({ "full_name": "Bob" })),
        ]),
        settings,
        CancellationToken::new(),
        &TestSink::default(),
    )
    .await;

    assert_eq!(summary.success_count, 2);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn cancelling_stops_new_rows_but_keeps_results() {
    let cancel = CancellationToken::new();
    let api = Arc::new(FakeApi {
        cancel_on: Some(("Bob".to_string(), cancel.clone())),
        ..FakeApi::default()
    });
    let rows = vec![
        row(json!({ "full_name": "Ada" })),
        row(json!({ "full_name": "Bob" })),
        row(json!({ "full_name": "Cy" })),
    ];

    let summary = run_import(api.clone(), job(rows), fast(), cancel, &TestSink::default()).await;

    assert!(summary.cancelled);
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.processed_rows, 2);
    assert_eq!(summary.success_count, 2);
    assert_eq!(api.created(), vec!["Ada".to_string(), "Bob".to_string()]);
}

#[tokio::test]
async fn cancelled_before_start_imports_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let api = Arc::new(FakeApi::default());

    let summary = run_import(
        api.clone(),
        job(vec![row(json!({ "full_name": "Ada" }))]),
        fast(),
        cancel,
        &TestSink::default(),
    )
    .await;

    assert!(summary.cancelled);
    assert_eq!(summary.processed_rows, 0);
    assert!(api.created().is_empty());
}
