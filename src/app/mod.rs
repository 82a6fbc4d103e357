// Concrete enrichment kinds and the wiring that turns a config into a ready client.

pub mod companies;
pub mod people;

use crate::config::EnrichConfig;
use crate::core::http::HttpEnrichmentApi;
use crate::core::job_client::EnrichmentJobClient;
use crate::core::observer::TracingObserver;
use crate::utils::error::Result;
use companies::CompanyEnrichment;
use people::PeopleEnrichment;
use std::sync::Arc;

pub type PeopleClient = EnrichmentJobClient<PeopleEnrichment, HttpEnrichmentApi>;
pub type CompanyClient = EnrichmentJobClient<CompanyEnrichment, HttpEnrichmentApi>;

pub fn people_client(config: &EnrichConfig) -> Result<PeopleClient> {
    let api = HttpEnrichmentApi::from_config(&config.api)?;
    let kind = PeopleEnrichment::new(config.people.clone());
    Ok(EnrichmentJobClient::from_config(kind, api, config)
        .with_observer(Arc::new(TracingObserver::new("people"))))
}

pub fn company_client(config: &EnrichConfig) -> Result<CompanyClient> {
    let api = HttpEnrichmentApi::from_config(&config.api)?;
    let kind = CompanyEnrichment::new(config.companies.clone());
    Ok(EnrichmentJobClient::from_config(kind, api, config)
        .with_observer(Arc::new(TracingObserver::new("companies"))))
}
