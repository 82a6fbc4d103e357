use enrich_jobs::{
    EnrichError, EnrichedPerson, EnrichmentJobClient, EnrichmentRequest, ErrorKind,
    HttpEnrichmentApi, IncludeOptions, JobStatus, PeopleEnrichment, PersonInput, PollPolicy,
    ProgressObserver,
};
use httpmock::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn client(server: &MockServer) -> EnrichmentJobClient<PeopleEnrichment, HttpEnrichmentApi> {
    let api = HttpEnrichmentApi::new(server.base_url(), Duration::from_secs(5))
        .unwrap()
        .with_api_key("test-key");

    // Short intervals keep the real-time tests fast
    EnrichmentJobClient::new(PeopleEnrichment::default(), api).with_poll_policy(PollPolicy {
        max_attempts: 3,
        interval: Duration::from_millis(20),
    })
}

fn jane() -> PersonInput {
    PersonInput {
        first_name: Some("Jane".to_string()),
        last_name: Some("Doe".to_string()),
        company_domain: Some("acme.com".to_string()),
        ..PersonInput::default()
    }
}

#[derive(Default)]
struct Events {
    progress: Mutex<Vec<u32>>,
    errors: Mutex<Vec<ErrorKind>>,
    completed: Mutex<usize>,
}

impl ProgressObserver<EnrichedPerson> for Events {
    fn on_progress(&self, attempt: u32, _max_attempts: u32) {
        self.progress.lock().unwrap().push(attempt);
    }

    fn on_complete(&self, results: &[EnrichedPerson]) {
        *self.completed.lock().unwrap() = results.len();
    }

    fn on_error(&self, kind: ErrorKind, _message: &str) {
        self.errors.lock().unwrap().push(kind);
    }
}

#[tokio::test]
async fn test_submit_and_poll_single_job() {
    let server = MockServer::start();

    let submit_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/people/enrich")
            .header("Authorization", "Bearer test-key")
            .body_contains("\"include\"")
            .body_contains("\"companyDomain\":\"acme.com\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "success": true,
                "data": {"enrichmentID": "enr-42"}
            }));
    });

    let status_mock = server.mock(|when, then| {
        when.method(GET).path("/v2/people/enrich/status/enr-42");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "success": true,
                "status": "completed",
                "data": [{
                    "first_name": "Jane",
                    "lastName": "Doe",
                    "companyName": "Acme",
                    "emails": [{"email": "jane@acme.com"}],
                    "mobilePhones": [{"mobilePhone": "+1 555 0100"}]
                }]
            }));
    });

    let events = Arc::new(Events::default());
    let client = client(&server).with_observer(events.clone());

    let request = EnrichmentRequest::new(vec![jane()]).with_include(IncludeOptions::default());
    let mut job = client.submit(&request).await.unwrap();
    assert_eq!(job.id, "enr-42");
    assert_eq!(job.status, JobStatus::Pending);

    let results = client.poll(&mut job).await.unwrap();

    submit_mock.assert();
    status_mock.assert();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].email.as_deref(), Some("jane@acme.com"));
    assert_eq!(results[0].mobile.as_deref(), Some("+1 555 0100"));
    assert_eq!(results[0].first_name.as_deref(), Some("Jane"));
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(*events.progress.lock().unwrap(), vec![1]);
    assert_eq!(*events.completed.lock().unwrap(), 1);

    // polling again must not hit the server
    let again = client.poll(&mut job).await.unwrap();
    assert_eq!(again, results);
    status_mock.assert_hits(1);
}

#[tokio::test]
async fn test_remote_failure_stops_polling() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/v2/people/enrich");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "data": {"enrichmentID": "enr-1"}
        }));
    });
    let status_mock = server.mock(|when, then| {
        when.method(GET).path("/v2/people/enrich/status/enr-1");
        then.status(200).json_body(serde_json::json!({
            "success": false,
            "status": "failed",
            "error": "enrichment failed"
        }));
    });

    let events = Arc::new(Events::default());
    let client = client(&server).with_observer(events.clone());

    let mut job = client
        .submit(&EnrichmentRequest::new(vec![jane()]))
        .await
        .unwrap();
    let err = client.poll(&mut job).await.unwrap_err();

    assert!(matches!(err, EnrichError::RemoteJobFailed { ref job_id, .. } if job_id == "enr-1"));
    status_mock.assert_hits(1);
    assert_eq!(*events.errors.lock().unwrap(), vec![ErrorKind::RemoteJobFailed]);
}

#[tokio::test]
async fn test_times_out_after_attempt_budget() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/v2/people/enrich");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "data": {"enrichmentID": "enr-slow"}
        }));
    });
    let status_mock = server.mock(|when, then| {
        when.method(GET).path("/v2/people/enrich/status/enr-slow");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "status": "in_progress"
        }));
    });

    let client = client(&server);
    let mut job = client
        .submit(&EnrichmentRequest::new(vec![jane()]))
        .await
        .unwrap();
    let err = client.poll(&mut job).await.unwrap_err();

    assert!(matches!(err, EnrichError::TimedOut { attempts: 3, .. }));
    assert_eq!(job.status, JobStatus::TimedOut);
    status_mock.assert_hits(3);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/v2/people/enrich");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "data": {"enrichmentID": "enr-flaky"}
        }));
    });
    let status_mock = server.mock(|when, then| {
        when.method(GET).path("/v2/people/enrich/status/enr-flaky");
        then.status(503).body("Service Unavailable");
    });

    let client = client(&server);
    let mut job = client
        .submit(&EnrichmentRequest::new(vec![jane()]))
        .await
        .unwrap();
    let err = client.poll(&mut job).await.unwrap_err();

    // only the last failed check is terminal
    assert!(matches!(err, EnrichError::PollError { .. }));
    status_mock.assert_hits(3);
}

#[tokio::test]
async fn test_submission_without_job_id() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/v2/people/enrich");
        then.status(200).json_body(serde_json::json!({"success": true, "data": {}}));
    });
    let status_mock = server.mock(|when, then| {
        when.method(GET);
        then.status(200);
    });

    let err = client(&server)
        .submit(&EnrichmentRequest::new(vec![jane()]))
        .await
        .unwrap_err();

    assert!(matches!(err, EnrichError::SubmissionError { .. }));
    status_mock.assert_hits(0);
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_server() {
    let server = MockServer::start();
    let submit_mock = server.mock(|when, then| {
        when.method(POST);
        then.status(200);
    });

    let client = client(&server);

    let nameless = PersonInput {
        company_name: Some("Acme".to_string()),
        ..PersonInput::default()
    };
    let err = client
        .submit(&EnrichmentRequest::new(vec![jane(), nameless]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Person 2"));

    let err = client
        .submit(&EnrichmentRequest::new(vec![jane()]).with_include(IncludeOptions::none()))
        .await
        .unwrap_err();
    assert!(matches!(err, EnrichError::ValidationError { .. }));

    submit_mock.assert_hits(0);
}
