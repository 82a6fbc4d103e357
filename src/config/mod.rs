pub mod cli;
pub mod toml_config;

pub use toml_config::{
    ApiConfig, BatchPollingConfig, BatchingConfig, EnrichConfig, KindConfig, PollingConfig,
};

use crate::app::companies::MAX_COMPANIES_PER_BATCH;
use crate::app::people::MAX_PEOPLE;
use crate::domain::model::IncludeOptions;
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    People,
    Companies,
}

impl EntityKind {
    /// 單一請求可送出的實體上限
    pub fn max_entities(self) -> usize {
        match self {
            EntityKind::People => MAX_PEOPLE,
            EntityKind::Companies => MAX_COMPANIES_PER_BATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum IncludeField {
    Email,
    Mobile,
    LinkedinUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "enrich-jobs"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Submit people/company enrichment jobs and collect the results")
)]
pub struct CliConfig {
    #[cfg_attr(feature = "cli", arg(long, help = "TOML configuration file"))]
    pub config: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, value_enum, default_value = "people"))]
    pub kind: EntityKind,

    #[cfg_attr(feature = "cli", arg(long, help = "Entity file (.json or .csv)"))]
    pub input: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = "./enrichment_results.json"))]
    pub output: String,

    #[cfg_attr(feature = "cli", arg(long, help = "Override the kind's batch size"))]
    pub batch_size: Option<usize>,

    #[cfg_attr(feature = "cli", arg(long))]
    pub webhook_url: Option<String>,

    #[cfg_attr(
        feature = "cli",
        arg(long, value_enum, value_delimiter = ',', help = "People only; defaults to email,mobile")
    )]
    pub include: Vec<IncludeField>,

    #[cfg_attr(feature = "cli", arg(long, help = "Emit JSON log lines"))]
    pub json_logs: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,
}

impl CliConfig {
    /// 沒有指定 --include 時回傳 None，交由預設值（email + mobile）
    pub fn include_options(&self) -> Option<IncludeOptions> {
        if self.include.is_empty() {
            return None;
        }
        let mut include = IncludeOptions::none();
        for field in &self.include {
            match field {
                IncludeField::Email => include.email = true,
                IncludeField::Mobile => include.mobile = true,
                IncludeField::LinkedinUrl => include.linkedin_url = true,
            }
        }
        Some(include)
    }

    /// 載入 --config 指定的檔案，未指定則使用預設配置
    pub fn load_enrich_config(&self) -> Result<EnrichConfig> {
        let config = match &self.config {
            Some(path) => EnrichConfig::from_file(path)?,
            None => EnrichConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.config {
            validation::validate_path("config", path)?;
            validation::validate_file_extension("config", path, &["toml"])?;
        }

        validation::validate_path("input", &self.input)?;
        validation::validate_file_extension("input", &self.input, &["json", "csv"])?;
        validation::validate_path("output", &self.output)?;
        validation::validate_file_extension("output", &self.output, &["json"])?;

        if let Some(size) = self.batch_size {
            validation::validate_range("batch_size", size, 1, self.kind.max_entities())?;
        }

        if let Some(url) = &self.webhook_url {
            validation::validate_url("webhook_url", url)?;
        }

        if self.kind == EntityKind::Companies && !self.include.is_empty() {
            return Err(EnrichError::InvalidConfigValueError {
                field: "include".to_string(),
                value: format!("{:?}", self.include),
                reason: "Include flags only apply to people enrichment".to_string(),
            });
        }

        Ok(())
    }
}
