use crate::config::EnrichConfig;
use crate::core::observer::NoopObserver;
use crate::core::policy::{BackoffPolicy, BatchPollPolicy, PollPolicy};
use crate::domain::model::{BatchOutcome, EnrichmentRequest, Job};
use crate::domain::ports::{EnrichmentApi, EnrichmentKind, ProgressObserver};
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation;
use std::sync::Arc;

/// 非同步補全 job 的用戶端：送出、輪詢、分批與彙整。
///
/// 種類 `K` 決定實體與結果的形狀、端點與驗證規則；
/// `A` 是實際打 API 的傳輸層（正式環境用 [`crate::core::http::HttpEnrichmentApi`]）。
pub struct EnrichmentJobClient<K: EnrichmentKind, A: EnrichmentApi> {
    pub(crate) kind: K,
    pub(crate) api: A,
    pub(crate) poll_policy: PollPolicy,
    pub(crate) batch_poll_policy: BatchPollPolicy,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) max_batch_size: Option<usize>,
    pub(crate) observer: Arc<dyn ProgressObserver<K::Result>>,
}

impl<K: EnrichmentKind, A: EnrichmentApi> EnrichmentJobClient<K, A> {
    pub fn new(kind: K, api: A) -> Self {
        Self {
            kind,
            api,
            poll_policy: PollPolicy::default(),
            batch_poll_policy: BatchPollPolicy::default(),
            backoff: BackoffPolicy::default(),
            max_batch_size: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// 套用設定檔中的輪詢與延遲參數
    pub fn from_config(kind: K, api: A, config: &EnrichConfig) -> Self {
        Self::new(kind, api)
            .with_poll_policy(PollPolicy::from(&config.polling))
            .with_batch_poll_policy(BatchPollPolicy::from(&config.batch_polling))
            .with_backoff(BackoffPolicy::from(&config.batching))
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn with_batch_poll_policy(mut self, policy: BatchPollPolicy) -> Self {
        self.batch_poll_policy = policy;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver<K::Result>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// enrich() 切換到分批模式的門檻，不超過單一請求的實體上限
    pub fn batch_size(&self) -> usize {
        self.max_batch_size
            .unwrap_or_else(|| self.kind.default_batch_size())
            .min(self.kind.max_entities())
    }

    /// 把錯誤回報給訂閱者後原樣回傳
    pub(crate) fn report<T>(&self, error: EnrichError) -> Result<T> {
        self.observer.on_error(error.kind(), &error.to_string());
        Err(error)
    }

    /// 正規化每個實體並做本地驗證；`limit` 為 None 時不檢查數量上限（分批模式）
    pub(crate) fn prepare(
        &self,
        request: &EnrichmentRequest<K::Entity>,
        limit: Option<usize>,
    ) -> Result<EnrichmentRequest<K::Entity>> {
        let label = self.kind.label();

        if request.entities.is_empty() {
            return Err(EnrichError::validation(format!(
                "At least one {} entity is required",
                label
            )));
        }

        if let Some(max) = limit {
            if request.entities.len() > max {
                return Err(EnrichError::validation(format!(
                    "Too many {} entities: {} exceeds the maximum of {} per request",
                    label,
                    request.entities.len(),
                    max
                )));
            }
        }

        if self.kind.uses_include() {
            if let Some(include) = &request.include {
                if !include.has_any() {
                    return Err(EnrichError::validation(
                        "At least one include option (email, mobile, linkedInUrl) must be selected",
                    ));
                }
            }
        }

        if let Some(notification) = &request.notification_options {
            if !validation::is_http_url(&notification.webhook_url) {
                return Err(EnrichError::validation(format!(
                    "Webhook URL must be an http(s) URL: {}",
                    notification.webhook_url
                )));
            }
        }

        let entities: Vec<K::Entity> = request
            .entities
            .iter()
            .cloned()
            .map(|entity| self.kind.normalize_entity(entity))
            .collect();

        for (index, entity) in entities.iter().enumerate() {
            self.kind.validate_entity(index + 1, entity)?;
        }

        Ok(request.with_entities(entities))
    }

    /// 驗證後送出單一 job，回傳 Pending 狀態的 job
    pub async fn submit(&self, request: &EnrichmentRequest<K::Entity>) -> Result<Job<K::Result>> {
        let prepared = match self.prepare(request, Some(self.kind.max_entities())) {
            Ok(prepared) => prepared,
            Err(e) => return self.report(e),
        };

        match self.submit_prepared(&prepared, None).await {
            Ok(job) => Ok(job),
            Err(e) => self.report(e),
        }
    }

    /// 已驗證過的請求直接送出；任何失敗都歸類為 SubmissionError
    pub(crate) async fn submit_prepared(
        &self,
        request: &EnrichmentRequest<K::Entity>,
        batch_index: Option<usize>,
    ) -> Result<Job<K::Result>> {
        let body = self.kind.build_payload(request)?;
        let count = request.entities.len();

        tracing::info!(
            "📡 Submitting {} {} entities{}",
            count,
            self.kind.label(),
            batch_index
                .map(|index| format!(" (batch {})", index))
                .unwrap_or_default()
        );

        let envelope = self
            .api
            .submit(self.kind.submit_path(), &body)
            .await
            .map_err(|e| EnrichError::SubmissionError {
                batch_index,
                message: e.to_string(),
            })?;

        if !envelope.success {
            return Err(EnrichError::SubmissionError {
                batch_index,
                message: envelope
                    .error
                    .clone()
                    .unwrap_or_else(|| "remote service did not report success".to_string()),
            });
        }

        let field = self.kind.job_id_field();
        let job_id = envelope
            .job_id(field)
            .ok_or_else(|| EnrichError::SubmissionError {
                batch_index,
                message: format!("response did not contain a job id in data.{}", field),
            })?;

        tracing::info!("✅ Job {} accepted for {} entities", job_id, count);
        Ok(Job::new(job_id, batch_index, count))
    }

    /// 依實體數量自動選擇單一 job 或分批模式。
    ///
    /// 單一 job 的結果包裝成只有一個批次的 [`BatchOutcome`]；
    /// 呼叫端以 `partial` / `failed` / `rejected` 分辨部分成功。
    pub async fn enrich(
        &self,
        request: &EnrichmentRequest<K::Entity>,
    ) -> Result<BatchOutcome<K::Result>> {
        let batch_size = self.batch_size();

        if request.entities.len() <= batch_size {
            let mut job = self.submit(request).await?;
            let results = self.poll(&mut job).await?;
            return Ok(BatchOutcome::single(results, request.entities.len()));
        }

        tracing::info!(
            "🔄 {} entities exceed the batch size of {}, switching to batched mode",
            request.entities.len(),
            batch_size
        );
        let mut plan = self.submit_batched(request, batch_size).await?;
        let outcome = self.poll_batch(&mut plan).await?;

        if outcome.is_incomplete() {
            tracing::warn!("⚠️ {}", outcome.summary());
        } else {
            tracing::info!("✅ {}", outcome.summary());
        }

        Ok(outcome)
    }
}
