use crate::config::KindConfig;
use crate::domain::mapping::{lenient_u64, normalize_fields, string_list, FieldAliases};
use crate::domain::model::CompanyInput;
use crate::domain::ports::EnrichmentKind;
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::{self, MAX_FIELD_LENGTH};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 單批公司數上限
pub const MAX_COMPANIES_PER_BATCH: usize = 500;

/// 遠端找不到公司時回傳的佔位名稱
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

const COMPANY_ALIASES: FieldAliases = &[
    ("name", &["name", "companyName", "company_name"]),
    ("domain", &["domain", "companyDomain", "company_domain"]),
    (
        "linkedInURL",
        &["linkedInURL", "linkedinUrl", "linkedin_url", "linkedIn"],
    ),
    (
        "employeeCount",
        &["employeeCount", "employee_count", "employees"],
    ),
    ("founded", &["founded", "founded_year", "foundedYear"]),
    ("hqAddress", &["hqAddress", "location", "headquarters"]),
    ("websites", &["websites", "website", "websiteUrl", "website_url"]),
    ("phones", &["phones", "phone", "phoneNumber"]),
    ("externalID", &["externalID", "externalId", "external_id"]),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCompany {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_industry: Option<String>,
    #[serde(default, rename = "linkedInURL", skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub employee_count: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub founded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hq_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hq_country: Option<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, rename = "externalID", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnrichedCompany {
    /// 遠端沒有名稱或回傳佔位名稱代表補全失敗
    pub fn is_enriched(&self) -> bool {
        self.name
            .as_deref()
            .map(str::trim)
            .is_some_and(|name| !name.is_empty() && name != UNKNOWN_COMPANY)
    }
}

/// 公司補全：以網域為識別，不使用 include 設定
#[derive(Debug, Clone)]
pub struct CompanyEnrichment {
    settings: KindConfig,
}

impl CompanyEnrichment {
    pub fn new(settings: KindConfig) -> Self {
        Self { settings }
    }
}

impl Default for CompanyEnrichment {
    fn default() -> Self {
        Self::new(KindConfig::companies())
    }
}

impl EnrichmentKind for CompanyEnrichment {
    type Entity = CompanyInput;
    type Result = EnrichedCompany;

    fn label(&self) -> &'static str {
        "company"
    }

    fn collection_key(&self) -> &'static str {
        "companies"
    }

    fn settings(&self) -> &KindConfig {
        &self.settings
    }

    fn max_entities(&self) -> usize {
        self.settings
            .max_batch_size
            .unwrap_or(MAX_COMPANIES_PER_BATCH)
            .min(MAX_COMPANIES_PER_BATCH)
    }

    fn normalize_entity(&self, company: CompanyInput) -> CompanyInput {
        CompanyInput {
            domain: validation::clean_domain(company.domain.trim()),
            external_id: company
                .external_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    fn validate_entity(&self, position: usize, company: &CompanyInput) -> Result<()> {
        let label = format!("Company {}", position);

        if company.domain.is_empty() {
            return Err(EnrichError::validation(format!(
                "{}: domain is required",
                label
            )));
        }

        validation::validate_max_length(&label, "domain", &company.domain, MAX_FIELD_LENGTH)?;

        if !validation::is_valid_domain(&company.domain) {
            return Err(EnrichError::validation(format!(
                "{}: invalid domain '{}'",
                label, company.domain
            )));
        }

        Ok(())
    }

    fn map_result(&self, raw: Value) -> Result<EnrichedCompany> {
        let Value::Object(record) = raw else {
            return Err(EnrichError::validation("company result is not a JSON object"));
        };

        let record = normalize_fields(record, COMPANY_ALIASES);
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}
