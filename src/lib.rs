pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use app::companies::{CompanyEnrichment, EnrichedCompany};
pub use app::people::{EnrichedPerson, PeopleEnrichment};
pub use config::{cli::LocalFiles, CliConfig, EnrichConfig, EntityKind};
pub use core::http::HttpEnrichmentApi;
pub use core::job_client::EnrichmentJobClient;
pub use core::observer::{NoopObserver, TracingObserver};
pub use core::policy::{BackoffPolicy, BatchPollPolicy, PollPolicy};
pub use domain::model::{
    BatchOutcome, BatchPlan, CompanyInput, EnrichmentRequest, IncludeOptions, Job, JobStatus,
    PersonInput,
};
pub use domain::ports::{EnrichmentApi, EnrichmentKind, ProgressObserver};
pub use tokio_util::sync::CancellationToken;
pub use utils::error::{EnrichError, ErrorKind, Result};
