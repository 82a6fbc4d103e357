use crate::config::EntityKind;
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "KindConfig::people")]
    pub people: KindConfig,
    #[serde(default = "KindConfig::companies")]
    pub companies: KindConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub batch_polling: BatchPollingConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// 多把金鑰輪替時指定使用哪一把（送出 X-Selected-Key）
    pub selected_key: Option<String>,
    pub request_timeout_seconds: u64,
}

/// 單一補全種類（人員 / 公司）的端點與批次設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindConfig {
    pub submit_path: String,
    pub status_path: String,
    #[serde(default = "default_job_id_field")]
    pub job_id_field: String,
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPollingConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub inter_check_delay_ms: u64,
}

/// 分批送出之間的遞增延遲：min(base + step * i, max)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub base_delay_ms: u64,
    pub delay_step_ms: u64,
    pub max_delay_ms: u64,
}

fn default_job_id_field() -> String {
    "enrichmentID".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.surfe.com".to_string(),
            api_key: None,
            selected_key: None,
            request_timeout_seconds: 30,
        }
    }
}

impl KindConfig {
    pub fn people() -> Self {
        Self {
            submit_path: "/v2/people/enrich".to_string(),
            status_path: "/v2/people/enrich/status".to_string(),
            job_id_field: default_job_id_field(),
            max_batch_size: None,
        }
    }

    pub fn companies() -> Self {
        Self {
            submit_path: "/v2/companies/enrich".to_string(),
            status_path: "/v2/companies/enrich/status".to_string(),
            job_id_field: default_job_id_field(),
            max_batch_size: Some(500),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval_ms: 2000,
        }
    }
}

impl Default for BatchPollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            interval_ms: 5000,
            inter_check_delay_ms: 200,
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 3000,
            delay_step_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            people: KindConfig::people(),
            companies: KindConfig::companies(),
            polling: PollingConfig::default(),
            batch_polling: BatchPollingConfig::default(),
            batching: BatchingConfig::default(),
        }
    }
}

impl EnrichConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnrichError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EnrichError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SURFE_API_KEY})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;
        validation::validate_range(
            "api.request_timeout_seconds",
            self.api.request_timeout_seconds,
            1,
            600,
        )?;

        if let Some(key) = &self.api.api_key {
            validation::validate_non_empty_string("api.api_key", key)?;
            if key.contains("${") {
                return Err(EnrichError::InvalidConfigValueError {
                    field: "api.api_key".to_string(),
                    value: key.clone(),
                    reason: "Environment variable is not set".to_string(),
                });
            }
        }

        for (section, kind, limit) in [
            ("people", &self.people, EntityKind::People.max_entities()),
            ("companies", &self.companies, EntityKind::Companies.max_entities()),
        ] {
            validation::validate_non_empty_string(&format!("{}.submit_path", section), &kind.submit_path)?;
            validation::validate_non_empty_string(&format!("{}.status_path", section), &kind.status_path)?;
            validation::validate_non_empty_string(&format!("{}.job_id_field", section), &kind.job_id_field)?;
            if let Some(size) = kind.max_batch_size {
                validation::validate_range(&format!("{}.max_batch_size", section), size, 1, limit)?;
            }
        }

        validation::validate_positive_number(
            "polling.max_attempts",
            self.polling.max_attempts as usize,
            1,
        )?;
        validation::validate_positive_number(
            "batch_polling.max_attempts",
            self.batch_polling.max_attempts as usize,
            1,
        )?;
        validation::validate_positive_number(
            "polling.interval_ms",
            self.polling.interval_ms as usize,
            1,
        )?;
        validation::validate_positive_number(
            "batch_polling.interval_ms",
            self.batch_polling.interval_ms as usize,
            1,
        )?;

        if self.batching.base_delay_ms > self.batching.max_delay_ms {
            return Err(EnrichError::InvalidConfigValueError {
                field: "batching.base_delay_ms".to_string(),
                value: self.batching.base_delay_ms.to_string(),
                reason: format!(
                    "Must not exceed batching.max_delay_ms ({})",
                    self.batching.max_delay_ms
                ),
            });
        }

        Ok(())
    }
}

impl Validate for EnrichConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
