use crate::config::KindConfig;
use crate::domain::mapping::{normalize_fields, FieldAliases};
use crate::domain::model::PersonInput;
use crate::domain::ports::EnrichmentKind;
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::{self, MAX_FIELD_LENGTH};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 單一請求最多可送出的人員數
pub const MAX_PEOPLE: usize = 10_000;

const PERSON_ALIASES: FieldAliases = &[
    ("firstName", &["firstName", "first_name"]),
    ("lastName", &["lastName", "last_name"]),
    ("email", &["email"]),
    ("mobile", &["mobile", "mobilePhone", "phone"]),
    (
        "linkedinUrl",
        &["linkedinUrl", "linkedin_url", "linkedInUrl", "linkedIn"],
    ),
    ("companyName", &["companyName", "company_name"]),
    ("companyDomain", &["companyDomain", "company_domain"]),
    ("jobTitle", &["jobTitle", "job_title", "title"]),
    ("externalID", &["externalID", "externalId", "external_id"]),
];

/// 補全後的人員紀錄；未列出的欄位保留在 `extra`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, rename = "externalID", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnrichedPerson {
    pub fn full_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// 至少補到 email、手機或 LinkedIn 其中之一
    pub fn has_contact(&self) -> bool {
        [&self.email, &self.mobile, &self.linkedin_url]
            .iter()
            .any(|field| field.as_deref().is_some_and(|value| !value.is_empty()))
    }
}

/// 取出 `list[0].<field>` 的字串
fn first_nested(record: &Map<String, Value>, list: &str, field: &str) -> Option<Value> {
    record
        .get(list)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get(field))
        .filter(|value| value.as_str().is_some_and(|s| !s.trim().is_empty()))
        .cloned()
}

fn tidy(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 人員補全：`/v2/people/enrich`，需要 include 設定
#[derive(Debug, Clone)]
pub struct PeopleEnrichment {
    settings: KindConfig,
}

impl PeopleEnrichment {
    pub fn new(settings: KindConfig) -> Self {
        Self { settings }
    }
}

impl Default for PeopleEnrichment {
    fn default() -> Self {
        Self::new(KindConfig::people())
    }
}

impl EnrichmentKind for PeopleEnrichment {
    type Entity = PersonInput;
    type Result = EnrichedPerson;

    fn label(&self) -> &'static str {
        "people"
    }

    fn collection_key(&self) -> &'static str {
        "people"
    }

    fn settings(&self) -> &KindConfig {
        &self.settings
    }

    fn max_entities(&self) -> usize {
        MAX_PEOPLE
    }

    fn uses_include(&self) -> bool {
        true
    }

    fn normalize_entity(&self, person: PersonInput) -> PersonInput {
        PersonInput {
            first_name: tidy(person.first_name),
            last_name: tidy(person.last_name),
            email: tidy(person.email),
            linkedin_url: tidy(person.linkedin_url),
            company_name: tidy(person.company_name),
            company_domain: tidy(person.company_domain)
                .map(|domain| validation::clean_domain(&domain))
                .filter(|domain| !domain.is_empty()),
            external_id: tidy(person.external_id),
        }
    }

    fn validate_entity(&self, position: usize, person: &PersonInput) -> Result<()> {
        let label = format!("Person {}", position);

        let has_name = person.first_name.is_some() || person.last_name.is_some();
        let has_company = person.company_name.is_some() || person.company_domain.is_some();
        if person.linkedin_url.is_none() && person.email.is_none() && !(has_name && has_company) {
            return Err(EnrichError::validation(format!(
                "{}: provide a LinkedIn URL, an email, or a name together with a company name or domain",
                label
            )));
        }

        for (field, value) in [
            ("linkedinUrl", &person.linkedin_url),
            ("companyName", &person.company_name),
            ("companyDomain", &person.company_domain),
        ] {
            if let Some(value) = value {
                validation::validate_max_length(&label, field, value, MAX_FIELD_LENGTH)?;
            }
        }

        if let Some(email) = &person.email {
            if !validation::is_valid_email(email) {
                return Err(EnrichError::validation(format!(
                    "{}: invalid email address '{}'",
                    label, email
                )));
            }
        }

        if let Some(url) = &person.linkedin_url {
            if !validation::is_valid_linkedin_url(url) {
                return Err(EnrichError::validation(format!(
                    "{}: LinkedIn URL must look like https://www.linkedin.com/in/<profile>",
                    label
                )));
            }
        }

        if let Some(domain) = &person.company_domain {
            if !validation::is_valid_domain(domain) {
                return Err(EnrichError::validation(format!(
                    "{}: invalid company domain '{}'",
                    label, domain
                )));
            }
        }

        Ok(())
    }

    fn map_result(&self, raw: Value) -> Result<EnrichedPerson> {
        let Value::Object(record) = raw else {
            return Err(EnrichError::validation("person result is not a JSON object"));
        };

        let mut record = normalize_fields(record, PERSON_ALIASES);
        if !record.contains_key("email") {
            if let Some(email) = first_nested(&record, "emails", "email") {
                record.insert("email".to_string(), email);
            }
        }
        if !record.contains_key("mobile") {
            if let Some(mobile) = first_nested(&record, "mobilePhones", "mobilePhone") {
                record.insert("mobile".to_string(), mobile);
            }
        }

        Ok(serde_json::from_value(Value::Object(record))?)
    }
}
