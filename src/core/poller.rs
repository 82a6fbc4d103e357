use crate::core::job_client::EnrichmentJobClient;
use crate::domain::model::{Job, JobStatus, RemoteStatus, StatusEnvelope};
use crate::domain::ports::{EnrichmentApi, EnrichmentKind};
use crate::utils::error::{EnrichError, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 單次狀態查詢的判讀結果
#[derive(Debug)]
pub(crate) enum StatusCheck<R> {
    Completed(Vec<R>),
    Failed(String),
    /// 尚未完成（含未知或缺少的狀態值）
    Waiting(JobStatus),
}

/// 第一次 tick 在一個 interval 之後
pub(crate) fn ticker(interval: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl<K: EnrichmentKind, A: EnrichmentApi> EnrichmentJobClient<K, A> {
    /// 輪詢直到完成、失敗或用盡查詢次數。
    ///
    /// 已終止的 job 直接回傳先前的結果，不會再發出請求。
    pub async fn poll(&self, job: &mut Job<K::Result>) -> Result<Vec<K::Result>> {
        self.poll_until_cancelled(job, &CancellationToken::new())
            .await
    }

    /// 與 [`poll`](Self::poll) 相同，但可由 `cancel` 中止。
    ///
    /// 取消時進行中的狀態請求會被丟棄，job 維持非終止狀態。
    pub async fn poll_until_cancelled(
        &self,
        job: &mut Job<K::Result>,
        cancel: &CancellationToken,
    ) -> Result<Vec<K::Result>> {
        if let Some(outcome) = job.outcome() {
            tracing::debug!("{} is already {}, skipping status checks", job.label(), job.status);
            return outcome;
        }

        let policy = self.poll_policy;
        let path = self.kind.status_path(&job.id);
        let mut ticker = ticker(policy.interval);
        job.attempts = 0;

        tracing::info!(
            "🔄 Polling {} every {:?} (max {} checks)",
            job.label(),
            policy.interval,
            policy.max_attempts
        );

        while job.attempts < policy.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(job)),
                _ = ticker.tick() => {}
            }

            job.attempts += 1;
            let attempt = job.attempts;
            self.observer.on_progress(attempt, policy.max_attempts);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(job)),
                response = self.api.fetch_status(&path) => response,
            };

            match response {
                Ok(envelope) => match self.classify(envelope) {
                    StatusCheck::Completed(results) => {
                        tracing::info!(
                            "✅ {} completed with {} results after {} checks",
                            job.label(),
                            results.len(),
                            attempt
                        );
                        job.complete(results.clone());
                        self.observer.on_complete(&results);
                        return Ok(results);
                    }
                    StatusCheck::Failed(message) => {
                        tracing::error!("❌ {} failed remotely: {}", job.label(), message);
                        job.fail_remote(message);
                        return self.report_outcome(job);
                    }
                    StatusCheck::Waiting(status) => {
                        tracing::debug!(
                            "⏳ {} is {} ({}/{})",
                            job.label(),
                            status,
                            attempt,
                            policy.max_attempts
                        );
                        job.mark_waiting(status);
                    }
                },
                Err(e) if attempt >= policy.max_attempts || !e.is_transient() => {
                    tracing::error!("❌ Status check for {} failed: {}", job.label(), e);
                    job.abort_with_poll_error(e.to_string());
                    return self.report_outcome(job);
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Status check {}/{} for {} failed, retrying: {}",
                        attempt,
                        policy.max_attempts,
                        job.label(),
                        e
                    );
                }
            }
        }

        tracing::warn!(
            "⏰ {} still not finished after {} checks",
            job.label(),
            job.attempts
        );
        job.time_out();
        self.report_outcome(job)
    }

    fn report_outcome(&self, job: &Job<K::Result>) -> Result<Vec<K::Result>> {
        match job.outcome() {
            Some(Err(e)) => self.report(e),
            Some(Ok(results)) => Ok(results),
            None => Err(cancelled(job)),
        }
    }

    /// 判讀狀態回應；batch 與單一 job 共用
    pub(crate) fn classify(&self, envelope: StatusEnvelope) -> StatusCheck<K::Result> {
        match (envelope.success, envelope.status) {
            (true, Some(RemoteStatus::Completed)) => {
                StatusCheck::Completed(self.extract_results(envelope.data))
            }
            (_, Some(RemoteStatus::Failed)) => StatusCheck::Failed(
                envelope
                    .error
                    .unwrap_or_else(|| "remote service reported the job as failed".to_string()),
            ),
            (_, Some(RemoteStatus::Processing)) => StatusCheck::Waiting(JobStatus::Processing),
            (_, Some(RemoteStatus::Pending)) => StatusCheck::Waiting(JobStatus::Pending),
            (_, other) => {
                tracing::debug!(
                    "Unrecognized status response (success={}, status={:?}), waiting",
                    envelope.success,
                    other
                );
                StatusCheck::Waiting(JobStatus::Pending)
            }
        }
    }

    /// data 可能是結果陣列，或是以 collection key 包住的物件
    fn extract_results(&self, data: Option<Value>) -> Vec<K::Result> {
        let items = match data {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut object)) => match object.remove(self.kind.collection_key()) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match self.kind.map_result(item) {
                Ok(result) => results.push(result),
                Err(e) => {
                    let message = format!(
                        "Skipping unreadable {} result #{}: {}",
                        self.kind.label(),
                        index + 1,
                        e
                    );
                    tracing::warn!("⚠️ {}", message);
                    self.observer.on_warning(&message);
                }
            }
        }
        results
    }
}

fn cancelled<R: Clone>(job: &Job<R>) -> EnrichError {
    tracing::info!("🛑 Polling of {} cancelled", job.label());
    EnrichError::Cancelled {
        target: job.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job_client::testing::{RecordingObserver, ScriptedApi, TestKind};
    use crate::core::policy::PollPolicy;
    use crate::utils::error::ErrorKind;
    use serde_json::json;
    use std::sync::Arc;

    fn client(api: ScriptedApi) -> EnrichmentJobClient<TestKind, ScriptedApi> {
        EnrichmentJobClient::new(TestKind::new(10), api)
    }

    fn job(id: &str) -> Job<String> {
        Job::new(id, None, 1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_on_fifteenth_check_without_extra_request() {
        let api = ScriptedApi::new();
        api.pending("job-1", 14).completed("job-1", &["done"]);
        let observer = Arc::new(RecordingObserver::default());
        let client = client(api).with_observer(observer.clone());
        let mut job = job("job-1");

        let started = Instant::now();
        let results = client.poll(&mut job).await.unwrap();

        assert_eq!(results, vec!["done".to_string()]);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 15);
        assert_eq!(client.api.status_calls().len(), 15);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert_eq!(observer.progress.lock().unwrap().len(), 15);
        assert_eq!(
            observer.completed.lock().unwrap().clone(),
            Some(vec!["done".to_string()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_check_waits_one_interval() {
        let api = ScriptedApi::new();
        api.completed("job-1", &[]);
        let client = client(api);
        let mut job = job("job-1");

        let started = Instant::now();
        client.poll(&mut job).await.unwrap();

        let calls = client.api.status_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/items/enrich/status/job-1");
        assert_eq!(calls[0].at - started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_on_first_tick() {
        let api = ScriptedApi::new();
        api.status(
            "job-1",
            json!({"success": false, "status": "failed", "error": "invalid payload"}),
        );
        let observer = Arc::new(RecordingObserver::default());
        let client = client(api).with_observer(observer.clone());
        let mut job = job("job-1");

        let err = client.poll(&mut job).await.unwrap_err();

        match err {
            EnrichError::RemoteJobFailed {
                job_id, message, ..
            } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(message, "invalid payload");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(client.api.status_calls().len(), 1);
        assert_eq!(
            *observer.errors.lock().unwrap(),
            vec![ErrorKind::RemoteJobFailed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exactly_max_attempts() {
        let api = ScriptedApi::new();
        api.status("job-1", json!({"success": true, "status": "processing"}));
        let client = client(api).with_poll_policy(PollPolicy {
            max_attempts: 4,
            interval: Duration::from_millis(500),
        });
        let mut job = job("job-1");

        let started = Instant::now();
        let err = client.poll(&mut job).await.unwrap_err();

        assert!(matches!(err, EnrichError::TimedOut { attempts: 4, .. }));
        assert_eq!(job.status, JobStatus::TimedOut);
        assert_eq!(client.api.status_calls().len(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_job_is_not_polled_again() {
        let api = ScriptedApi::new();
        api.completed("job-1", &["a"]);
        let client = client(api);
        let mut job = job("job-1");

        let first = client.poll(&mut job).await.unwrap();
        let second = client.poll(&mut job).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.api.status_calls().len(), 1);

        let mut failed = Job::<String>::new("job-2", None, 1);
        failed.fail_remote("bad input");
        let err = client.poll(&mut failed).await.unwrap_err();
        assert!(matches!(err, EnrichError::RemoteJobFailed { .. }));
        assert_eq!(client.api.status_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_then_success() {
        let api = ScriptedApi::new();
        api.status_error("job-1")
            .status_error("job-1")
            .completed("job-1", &["a"]);
        let client = client(api);
        let mut job = job("job-1");

        let results = client.poll(&mut job).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(client.api.status_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_on_last_attempt_is_poll_error() {
        let api = ScriptedApi::new();
        api.pending("job-1", 2).status_error("job-1");
        let client = client(api).with_poll_policy(PollPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(100),
        });
        let mut job = job("job-1");

        let err = client.poll(&mut job).await.unwrap_err();

        assert!(matches!(err, EnrichError::PollError { .. }));
        assert_eq!(job.status, JobStatus::TimedOut);
        assert!(job.outcome().unwrap().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_stops_polling_immediately() {
        let api = ScriptedApi::new();
        api.pending("job-1", 1).status_not_found("job-1");
        let observer = Arc::new(RecordingObserver::default());
        let client = client(api).with_observer(observer.clone());
        let mut job = job("job-1");

        let err = client.poll(&mut job).await.unwrap_err();

        assert!(matches!(err, EnrichError::PollError { ref message, .. } if message.contains("404")));
        assert_eq!(job.status, JobStatus::TimedOut);
        assert_eq!(client.api.status_calls().len(), 2);
        assert_eq!(*observer.errors.lock().unwrap(), vec![ErrorKind::Poll]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_waiting() {
        let api = ScriptedApi::new();
        api.status("job-1", json!({"success": true, "status": "queued"}))
            .status("job-1", json!({"success": true}))
            .completed("job-1", &["a"]);
        let client = client(api);
        let mut job = job("job-1");

        assert_eq!(client.poll(&mut job).await.unwrap(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_inside_collection_object_and_bad_items_skipped() {
        let api = ScriptedApi::new();
        api.status(
            "job-1",
            json!({
                "success": true,
                "status": "completed",
                "data": {"items": [{"name": "a"}, {"other": 1}, {"name": "b"}]}
            }),
        );
        let observer = Arc::new(RecordingObserver::default());
        let client = client(api).with_observer(observer.clone());
        let mut job = job("job-1");

        let results = client.poll(&mut job).await.unwrap();

        assert_eq!(results, vec!["a", "b"]);
        assert_eq!(observer.warnings.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_request() {
        let api = ScriptedApi::new();
        api.completed("job-1", &["late"])
            .delay_status(Duration::from_secs(10));
        let client = client(api);
        let mut job = job("job-1");
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                cancel.cancel();
            }
        };

        let (result, _) = tokio::join!(client.poll_until_cancelled(&mut job, &cancel), canceller);

        assert!(matches!(result, Err(EnrichError::Cancelled { .. })));
        assert!(!job.is_terminal());
        assert!(job.results.is_empty());
        assert_eq!(client.api.status_calls().len(), 1);
    }
}
