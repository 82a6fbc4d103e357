use anyhow::Context;
use clap::Parser;
use enrich_jobs::app::{company_client, people_client};
use enrich_jobs::utils::{logger, validation::Validate};
use enrich_jobs::{
    CliConfig, CompanyInput, EnrichError, EnrichmentApi, EnrichmentJobClient, EnrichmentKind,
    EnrichmentRequest, EntityKind, ErrorKind, LocalFiles, PersonInput,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting enrich-jobs CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    match run(&config).await {
        Ok(Completion::Complete) => {}
        Ok(Completion::Partial) => std::process::exit(PARTIAL_EXIT_CODE),
        Err(e) => {
            let exit_code = match e.downcast_ref::<EnrichError>() {
                Some(err) => {
                    tracing::error!("❌ Enrichment failed ({:?}): {}", err.kind(), err);
                    tracing::error!("💡 Suggestion: {}", err.recovery_suggestion());
                    eprintln!("❌ {}", err);
                    eprintln!("💡 {}", err.recovery_suggestion());
                    exit_code_for(err.kind())
                }
                None => {
                    tracing::error!("❌ {:#}", e);
                    eprintln!("❌ {:#}", e);
                    1
                }
            };
            std::process::exit(exit_code);
        }
    }
}

/// 結果已寫出，但有批次失敗、被拒絕或逾時
const PARTIAL_EXIT_CODE: i32 = 4;

enum Completion {
    Complete,
    Partial,
}

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation | ErrorKind::Config => 1,
        ErrorKind::Submission | ErrorKind::BatchSubmission | ErrorKind::RemoteJobFailed => 2,
        ErrorKind::TimedOut | ErrorKind::Poll | ErrorKind::Transport => 3,
        ErrorKind::Cancelled => 130,
    }
}

async fn run(config: &CliConfig) -> anyhow::Result<Completion> {
    config.validate()?;
    let settings = config.load_enrich_config()?;
    let files = LocalFiles::new(".");

    match config.kind {
        EntityKind::People => {
            let mut client = people_client(&settings)?;
            if let Some(size) = config.batch_size {
                client = client.with_max_batch_size(size);
            }
            let people: Vec<PersonInput> = read(&files, &config.input).await?;
            let mut request = EnrichmentRequest::new(people);
            if let Some(include) = config.include_options() {
                request = request.with_include(include);
            }
            enrich_and_save(&client, request, &files, config).await
        }
        EntityKind::Companies => {
            let mut client = company_client(&settings)?;
            if let Some(size) = config.batch_size {
                client = client.with_max_batch_size(size);
            }
            let companies: Vec<CompanyInput> = read(&files, &config.input).await?;
            enrich_and_save(&client, EnrichmentRequest::new(companies), &files, config).await
        }
    }
}

async fn read<E: DeserializeOwned>(files: &LocalFiles, path: &str) -> anyhow::Result<Vec<E>> {
    files
        .read_entities(path)
        .await
        .with_context(|| format!("failed to read entities from {}", path))
}

async fn enrich_and_save<K, A>(
    client: &EnrichmentJobClient<K, A>,
    request: EnrichmentRequest<K::Entity>,
    files: &LocalFiles,
    config: &CliConfig,
) -> anyhow::Result<Completion>
where
    K: EnrichmentKind,
    K::Result: Serialize,
    A: EnrichmentApi,
{
    let request = match &config.webhook_url {
        Some(url) => request.with_webhook(url.clone()),
        None => request,
    };

    tracing::info!(
        "📥 Loaded {} {} entities from {}",
        request.entities.len(),
        client.kind().label(),
        config.input
    );

    let outcome = client.enrich(&request).await?;

    let output = serde_json::json!({
        "kind": client.kind().label(),
        "input_count": request.entities.len(),
        "result_count": outcome.results.len(),
        "partial": outcome.is_incomplete(),
        "summary": outcome.summary(),
        "total_batches": outcome.total_batches,
        "completed": outcome.completed,
        "failed": outcome.failed,
        "rejected": outcome.rejected,
        "timed_out": outcome.timed_out,
        "results": outcome.results,
    });
    let path = files.write_json(&config.output, &output).await?;

    if outcome.is_incomplete() {
        println!("⚠️ Enrichment finished with missing batches: {}", outcome.summary());
        println!("📁 Partial output saved to: {}", path.display());
        return Ok(Completion::Partial);
    }

    println!("✅ Enrichment completed: {} results", outcome.results.len());
    println!("📁 Output saved to: {}", path.display());
    Ok(Completion::Complete)
}
