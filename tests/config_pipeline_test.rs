use enrich_jobs::app::{company_client, people_client};
use enrich_jobs::utils::validation::Validate;
use enrich_jobs::{CompanyInput, EnrichConfig, EnrichmentRequest, LocalFiles, PersonInput};
use httpmock::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn write_config(server: &MockServer, extra: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let content = format!(
        r#"
[api]
base_url = "{}"
api_key = "${{ENRICH_JOBS_IT_API_KEY}}"
selected_key = "secondary"

[polling]
max_attempts = 5
interval_ms = 20

[batch_polling]
max_attempts = 5
interval_ms = 20
inter_check_delay_ms = 5

[batching]
base_delay_ms = 10
delay_step_ms = 5
max_delay_ms = 20
{}
"#,
        server.base_url(),
        extra
    );
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_people_from_csv_to_json_output() {
    std::env::set_var("ENRICH_JOBS_IT_API_KEY", "it-secret");

    let server = MockServer::start();
    let submit = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/people/enrich")
            .header("Authorization", "Bearer it-secret")
            .header("X-Selected-Key", "secondary")
            .body_contains("\"email\":\"jane@acme.com\"");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "data": {"enrichmentID": "it-1"}
        }));
    });
    let status = server.mock(|when, then| {
        when.method(GET).path("/v2/people/enrich/status/it-1");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "status": "completed",
            "data": [
                {"email": "jane@acme.com", "mobile": "+1 555 0100"},
                {"firstName": "John", "linkedin_url": "https://www.linkedin.com/in/john"}
            ]
        }));
    });

    let config_file = write_config(&server, "");
    let config = EnrichConfig::from_file(config_file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.api.api_key.as_deref(), Some("it-secret"));

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("people.csv"),
        "firstName,lastName,email,linkedinUrl,companyName\n\
         Jane,Doe,jane@acme.com,,\n\
         John,Roe,,https://www.linkedin.com/in/john,Roe Inc\n",
    )
    .unwrap();

    let files = LocalFiles::new(dir.path());
    let people: Vec<PersonInput> = files.read_entities("people.csv").await.unwrap();
    assert_eq!(people.len(), 2);

    let client = people_client(&config).unwrap();
    let outcome = client.enrich(&EnrichmentRequest::new(people)).await.unwrap();
    assert!(!outcome.is_incomplete());
    let results = outcome.results;

    submit.assert();
    status.assert();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|person| person.has_contact()));
    assert_eq!(
        results[1].linkedin_url.as_deref(),
        Some("https://www.linkedin.com/in/john")
    );

    let output = files
        .write_json("out/results.json", &serde_json::json!({"results": results}))
        .await
        .unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    assert_eq!(written["results"][0]["mobile"], "+1 555 0100");
    assert_eq!(
        written["results"][1]["linkedinUrl"],
        "https://www.linkedin.com/in/john"
    );
}

#[tokio::test]
async fn test_company_endpoints_and_batch_size_from_config() {
    let server = MockServer::start();

    let submit = server.mock(|when, then| {
        when.method(POST).path("/v3/companies/enrich");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "data": {"jobId": "c-1"}
        }));
    });
    let status = server.mock(|when, then| {
        when.method(GET).path("/v3/companies/status/c-1");
        then.status(200).json_body(serde_json::json!({
            "success": true,
            "status": "completed",
            "data": [{"name": "Acme", "domain": "acme.com"}]
        }));
    });

    let config_file = write_config(
        &server,
        r#"
[companies]
submit_path = "/v3/companies/enrich"
status_path = "/v3/companies/status"
job_id_field = "jobId"
max_batch_size = 1
"#,
    );
    let config = EnrichConfig::from_file(config_file.path()).unwrap();
    assert_eq!(config.companies.max_batch_size, Some(1));

    let client = company_client(&config).unwrap();
    assert_eq!(client.batch_size(), 1);

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("companies.json"),
        r#"[{"domain": "https://acme.com/about"}, {"domain": "www.acme.com"}]"#,
    )
    .unwrap();
    let companies: Vec<CompanyInput> = LocalFiles::new(dir.path())
        .read_entities("companies.json")
        .await
        .unwrap();

    // two entities over a batch size of one: both chunks get the same job id here
    let outcome = client
        .enrich(&EnrichmentRequest::new(companies))
        .await
        .unwrap();

    submit.assert_hits(2);
    assert!(status.hits() >= 1);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.total_batches, 2);
}
