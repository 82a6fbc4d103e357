use crate::utils::error::{EnrichError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 待補全的人員（至少需要一個識別欄位）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(
        default,
        rename = "externalID",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<String>,
}

/// 待補全的公司，以網域識別
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInput {
    pub domain: String,
    #[serde(
        default,
        rename = "externalID",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<String>,
}

impl CompanyInput {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            external_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeOptions {
    pub email: bool,
    pub mobile: bool,
    #[serde(rename = "linkedInUrl")]
    pub linkedin_url: bool,
}

impl Default for IncludeOptions {
    fn default() -> Self {
        Self {
            email: true,
            mobile: true,
            linkedin_url: false,
        }
    }
}

impl IncludeOptions {
    pub fn none() -> Self {
        Self {
            email: false,
            mobile: false,
            linkedin_url: false,
        }
    }

    pub fn has_any(&self) -> bool {
        self.email || self.mobile || self.linkedin_url
    }
}

/// 完成通知的 webhook，原樣轉送給遠端服務
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    #[serde(rename = "webhookUrl")]
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRequest<E> {
    pub entities: Vec<E>,
    pub include: Option<IncludeOptions>,
    pub notification_options: Option<NotificationOptions>,
}

impl<E: Clone> EnrichmentRequest<E> {
    pub fn new(entities: Vec<E>) -> Self {
        Self {
            entities,
            include: None,
            notification_options: None,
        }
    }

    pub fn with_include(mut self, include: IncludeOptions) -> Self {
        self.include = Some(include);
        self
    }

    pub fn with_webhook(mut self, webhook_url: impl Into<String>) -> Self {
        self.notification_options = Some(NotificationOptions {
            webhook_url: webhook_url.into(),
        });
        self
    }

    /// 以同樣的 include / 通知設定包裝另一組實體（批次切分用）
    pub fn with_entities(&self, entities: Vec<E>) -> Self {
        Self {
            entities,
            include: self.include,
            notification_options: self.notification_options.clone(),
        }
    }
}

/// 遠端回報的狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Pending,
    #[serde(alias = "in_progress", alias = "running")]
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// POST 送出後的回應信封
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SubmitEnvelope {
    /// 取出 data.<field> 的 job id，空字串視為缺少
    pub fn job_id(&self, field: &str) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|data| data.get(field))
            .and_then(|value| match value {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|id| !id.is_empty())
    }
}

/// GET 狀態查詢的回應信封
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<RemoteStatus>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// 僅存在於用戶端：輪詢預算用盡，遠端可能仍會完成
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

/// 終止狀態的失敗紀錄，讓重複輪詢能回傳相同錯誤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    Remote { message: String },
    TimedOut { attempts: u32 },
    Poll { message: String },
}

#[derive(Debug, Clone)]
pub struct Job<R> {
    pub id: String,
    pub batch_index: Option<usize>,
    pub input_count: usize,
    pub status: JobStatus,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<R>,
    pub failure: Option<JobFailure>,
}

impl<R: Clone> Job<R> {
    pub fn new(id: impl Into<String>, batch_index: Option<usize>, input_count: usize) -> Self {
        Self {
            id: id.into(),
            batch_index,
            input_count,
            status: JobStatus::Pending,
            attempts: 0,
            submitted_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn label(&self) -> String {
        match self.batch_index {
            Some(index) => format!("job {} (batch {})", self.id, index),
            None => format!("job {}", self.id),
        }
    }

    pub(crate) fn mark_waiting(&mut self, status: JobStatus) {
        if !self.is_terminal() {
            self.status = status;
        }
    }

    pub(crate) fn complete(&mut self, results: Vec<R>) {
        self.status = JobStatus::Completed;
        self.results = results;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail_remote(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.failure = Some(JobFailure::Remote {
            message: message.into(),
        });
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn time_out(&mut self) {
        self.status = JobStatus::TimedOut;
        self.failure = Some(JobFailure::TimedOut {
            attempts: self.attempts,
        });
        self.finished_at = Some(Utc::now());
    }

    /// 最後一次查詢發生網路錯誤：預算已用盡，但保留錯誤原因
    pub(crate) fn abort_with_poll_error(&mut self, message: impl Into<String>) {
        self.status = JobStatus::TimedOut;
        self.failure = Some(JobFailure::Poll {
            message: message.into(),
        });
        self.finished_at = Some(Utc::now());
    }

    /// 終止狀態的結果；非終止狀態回傳 None
    pub fn outcome(&self) -> Option<Result<Vec<R>>> {
        match self.status {
            JobStatus::Completed => Some(Ok(self.results.clone())),
            JobStatus::Failed | JobStatus::TimedOut => Some(Err(self.failure_error())),
            JobStatus::Pending | JobStatus::Processing => None,
        }
    }

    fn failure_error(&self) -> EnrichError {
        match &self.failure {
            Some(JobFailure::Remote { message }) => EnrichError::RemoteJobFailed {
                job_id: self.id.clone(),
                batch_index: self.batch_index,
                message: message.clone(),
            },
            Some(JobFailure::Poll { message }) => EnrichError::PollError {
                job_id: self.id.clone(),
                batch_index: self.batch_index,
                message: message.clone(),
            },
            Some(JobFailure::TimedOut { attempts }) => EnrichError::TimedOut {
                target: self.label(),
                attempts: *attempts,
            },
            None => EnrichError::TimedOut {
                target: self.label(),
                attempts: self.attempts,
            },
        }
    }
}

/// 被遠端拒絕的分批送出
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedChunk {
    pub batch_index: usize,
    pub input_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub job_id: String,
    pub message: String,
}

/// 大量輸入切分後的批次計畫；彙整結果由計畫本身持有
#[derive(Debug, Clone)]
pub struct BatchPlan<R> {
    pub jobs: Vec<Job<R>>,
    pub rejected: Vec<RejectedChunk>,
    pub total_input: usize,
    pub total_batches: usize,
    /// 依完成順序彙整，不保證與送出順序一致
    pub results: Vec<R>,
    pub attempts: u32,
}

impl<R: Clone> BatchPlan<R> {
    pub fn new(total_input: usize, total_batches: usize) -> Self {
        Self {
            jobs: Vec::with_capacity(total_batches),
            rejected: Vec::new(),
            total_input,
            total_batches,
            results: Vec::new(),
            attempts: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|job| job.is_terminal())
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.iter().filter(|job| !job.is_terminal()).count()
    }

    /// 所有 job 皆已終止時的最終結果
    pub fn conclude(&self) -> Result<BatchOutcome<R>> {
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut timed_out = Vec::new();

        for job in &self.jobs {
            let batch_index = job.batch_index.unwrap_or_default();
            match job.status {
                JobStatus::Completed => completed.push(batch_index),
                JobStatus::Failed => failed.push(BatchFailure {
                    batch_index,
                    job_id: job.id.clone(),
                    message: match &job.failure {
                        Some(JobFailure::Remote { message }) => message.clone(),
                        _ => "remote job failed".to_string(),
                    },
                }),
                JobStatus::TimedOut => timed_out.push(batch_index),
                JobStatus::Pending | JobStatus::Processing => {}
            }
        }

        if self.results.is_empty() && !timed_out.is_empty() {
            return Err(EnrichError::TimedOut {
                target: format!(
                    "batches {}",
                    timed_out
                        .iter()
                        .map(|index| index.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                attempts: self.attempts,
            });
        }

        if completed.is_empty() && !failed.is_empty() {
            let first = &failed[0];
            return Err(EnrichError::RemoteJobFailed {
                job_id: first.job_id.clone(),
                batch_index: Some(first.batch_index),
                message: format!(
                    "all {} submitted batches failed (first error: {})",
                    failed.len(),
                    first.message
                ),
            });
        }

        Ok(BatchOutcome {
            results: self.results.clone(),
            partial: !timed_out.is_empty(),
            completed,
            failed,
            timed_out,
            rejected: self.rejected.clone(),
            total_batches: self.total_batches,
            total_input: self.total_input,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome<R> {
    pub results: Vec<R>,
    pub completed: Vec<usize>,
    pub failed: Vec<BatchFailure>,
    pub timed_out: Vec<usize>,
    pub rejected: Vec<RejectedChunk>,
    pub total_batches: usize,
    pub total_input: usize,
    /// 全域逾時時仍有批次未完成
    pub partial: bool,
}

impl<R> BatchOutcome<R> {
    /// 單一 job 成功完成時，視為只有一個批次的結果
    pub fn single(results: Vec<R>, total_input: usize) -> Self {
        Self {
            results,
            completed: vec![1],
            failed: Vec::new(),
            timed_out: Vec::new(),
            rejected: Vec::new(),
            total_batches: 1,
            total_input,
            partial: false,
        }
    }

    /// 有批次失敗、被拒絕或逾時
    pub fn is_incomplete(&self) -> bool {
        self.partial || !self.failed.is_empty() || !self.rejected.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} of {} batches succeeded ({} results for {} inputs)",
            self.completed.len(),
            self.total_batches,
            self.results.len(),
            self.total_input
        );
        if !self.failed.is_empty() {
            let indices: Vec<String> = self
                .failed
                .iter()
                .map(|failure| failure.batch_index.to_string())
                .collect();
            summary.push_str(&format!("; failed: {}", indices.join(", ")));
        }
        if !self.rejected.is_empty() {
            let indices: Vec<String> = self
                .rejected
                .iter()
                .map(|chunk| chunk.batch_index.to_string())
                .collect();
            summary.push_str(&format!("; rejected: {}", indices.join(", ")));
        }
        if !self.timed_out.is_empty() {
            let indices: Vec<String> = self
                .timed_out
                .iter()
                .map(|index| index.to_string())
                .collect();
            summary.push_str(&format!("; timed out: {}", indices.join(", ")));
        }
        summary
    }
}
