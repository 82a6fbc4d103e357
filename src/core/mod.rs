pub mod batch;
pub mod http;
pub mod job_client;
pub mod observer;
pub mod poller;
pub mod policy;

pub use crate::domain::model::{BatchOutcome, BatchPlan, EnrichmentRequest, Job, JobStatus};
pub use crate::domain::ports::{EnrichmentApi, EnrichmentKind, ProgressObserver};
pub use crate::utils::error::Result;
pub use job_client::EnrichmentJobClient;
