use crate::core::job_client::EnrichmentJobClient;
use crate::core::poller::{ticker, StatusCheck};
use crate::domain::model::{BatchOutcome, BatchPlan, EnrichmentRequest, RejectedChunk};
use crate::domain::ports::{EnrichmentApi, EnrichmentKind};
use crate::utils::error::{EnrichError, Result};
use tokio_util::sync::CancellationToken;

/// 依序切成最多 `size` 筆的連續區塊（`size` 必須大於 0）
pub fn partition<E: Clone>(entities: &[E], size: usize) -> Vec<Vec<E>> {
    entities.chunks(size).map(|chunk| chunk.to_vec()).collect()
}

impl<K: EnrichmentKind, A: EnrichmentApi> EnrichmentJobClient<K, A> {
    /// 切分後依序送出每一批，批次之間依 backoff 等待。
    ///
    /// 個別批次被拒絕時記錄下來並繼續送出下一批；
    /// 只有全部被拒絕時才回傳 `BatchSubmissionError`。
    pub async fn submit_batched(
        &self,
        request: &EnrichmentRequest<K::Entity>,
        max_batch_size: usize,
    ) -> Result<BatchPlan<K::Result>> {
        if max_batch_size == 0 {
            return self.report(EnrichError::validation(
                "Batch size must be at least 1",
            ));
        }
        if max_batch_size > self.kind.max_entities() {
            return self.report(EnrichError::validation(format!(
                "Batch size {} exceeds the maximum of {} {} entities per request",
                max_batch_size,
                self.kind.max_entities(),
                self.kind.label()
            )));
        }

        let prepared = match self.prepare(request, None) {
            Ok(prepared) => prepared,
            Err(e) => return self.report(e),
        };

        let chunks = partition(&prepared.entities, max_batch_size);
        let total_batches = chunks.len();
        let mut plan = BatchPlan::new(prepared.entities.len(), total_batches);

        tracing::info!(
            "📦 Splitting {} {} entities into {} batches of up to {}",
            plan.total_input,
            self.kind.label(),
            total_batches,
            max_batch_size
        );

        for (index, chunk) in chunks.into_iter().enumerate() {
            let batch_index = index + 1;
            let input_count = chunk.len();
            let chunk_request = prepared.with_entities(chunk);

            match self.submit_prepared(&chunk_request, Some(batch_index)).await {
                Ok(job) => plan.jobs.push(job),
                Err(e) => {
                    let message = match e {
                        EnrichError::SubmissionError { message, .. } => message,
                        other => other.to_string(),
                    };
                    let warning = format!(
                        "Batch {}/{} was rejected: {}",
                        batch_index, total_batches, message
                    );
                    tracing::warn!("⚠️ {}", warning);
                    self.observer.on_warning(&warning);
                    plan.rejected.push(RejectedChunk {
                        batch_index,
                        input_count,
                        message,
                    });
                }
            }

            if batch_index < total_batches {
                let delay = self.backoff.delay_for(index);
                tracing::debug!("Waiting {:?} before submitting batch {}", delay, batch_index + 1);
                tokio::time::sleep(delay).await;
            }
        }

        if plan.jobs.is_empty() {
            let failures = plan
                .rejected
                .iter()
                .map(|chunk| format!("batch {}: {}", chunk.batch_index, chunk.message))
                .collect();
            return self.report(EnrichError::BatchSubmissionError {
                attempted: total_batches,
                failures,
            });
        }

        tracing::info!(
            "✅ {} of {} batches accepted",
            plan.jobs.len(),
            total_batches
        );
        Ok(plan)
    }

    /// 以單一 ticker 輪詢計畫中所有未終止的 job，直到全部終止或用盡預算
    pub async fn poll_batch(&self, plan: &mut BatchPlan<K::Result>) -> Result<BatchOutcome<K::Result>> {
        self.poll_batch_until_cancelled(plan, &CancellationToken::new())
            .await
    }

    pub async fn poll_batch_until_cancelled(
        &self,
        plan: &mut BatchPlan<K::Result>,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome<K::Result>> {
        if plan.is_finished() {
            tracing::debug!("Batch plan already finished, skipping status checks");
            return plan.conclude();
        }

        let policy = self.batch_poll_policy;
        let mut ticker = ticker(policy.interval);
        plan.attempts = 0;

        tracing::info!(
            "🔄 Polling {} batch jobs every {:?} (max {} rounds)",
            plan.pending_jobs(),
            policy.interval,
            policy.max_attempts
        );

        while plan.attempts < policy.max_attempts && !plan.is_finished() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled_plan(plan)),
                _ = ticker.tick() => {}
            }

            plan.attempts += 1;
            let round = plan.attempts;
            self.observer.on_progress(round, policy.max_attempts);

            let mut checked = 0;
            for index in 0..plan.jobs.len() {
                if plan.jobs[index].is_terminal() {
                    continue;
                }

                if checked > 0 {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled_plan(plan)),
                        _ = tokio::time::sleep(policy.inter_check_delay) => {}
                    }
                }
                checked += 1;

                let path = self.kind.status_path(&plan.jobs[index].id);
                let response = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled_plan(plan)),
                    response = self.api.fetch_status(&path) => response,
                };

                let job = &mut plan.jobs[index];
                job.attempts += 1;

                match response {
                    Ok(envelope) => match self.classify(envelope) {
                        StatusCheck::Completed(results) => {
                            tracing::info!(
                                "✅ {} completed with {} results",
                                job.label(),
                                results.len()
                            );
                            job.complete(results.clone());
                            plan.results.extend(results);
                            self.observer.on_partial(&plan.results);
                        }
                        StatusCheck::Failed(message) => {
                            let warning = format!("{} failed: {}", job.label(), message);
                            tracing::warn!("⚠️ {}", warning);
                            job.fail_remote(message);
                            self.observer.on_warning(&warning);
                        }
                        StatusCheck::Waiting(status) => job.mark_waiting(status),
                    },
                    Err(e) if !e.is_transient() => {
                        let warning =
                            format!("Giving up on {}: status check failed: {}", job.label(), e);
                        tracing::warn!("⚠️ {}", warning);
                        self.observer.on_warning(&warning);
                        job.abort_with_poll_error(e.to_string());
                    }
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Status check for {} failed (round {}/{}), will retry: {}",
                            job.label(),
                            round,
                            policy.max_attempts,
                            e
                        );
                    }
                }
            }

            tracing::debug!(
                "Round {}/{}: {} jobs still running",
                round,
                policy.max_attempts,
                plan.pending_jobs()
            );
        }

        if !plan.is_finished() {
            tracing::warn!(
                "⏰ {} batch jobs still running after {} rounds",
                plan.pending_jobs(),
                plan.attempts
            );
            for job in plan.jobs.iter_mut().filter(|job| !job.is_terminal()) {
                job.time_out();
            }
        }

        match plan.conclude() {
            Ok(outcome) => {
                self.observer.on_complete(&outcome.results);
                Ok(outcome)
            }
            Err(e) => self.report(e),
        }
    }
}

fn cancelled_plan<R: Clone>(plan: &BatchPlan<R>) -> EnrichError {
    tracing::info!("🛑 Batch polling cancelled with {} jobs running", plan.pending_jobs());
    EnrichError::Cancelled {
        target: format!("batch plan of {} jobs", plan.jobs.len()),
    }
}
