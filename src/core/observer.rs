use crate::domain::ports::ProgressObserver;
use crate::utils::error::ErrorKind;

/// 不做任何事的預設訂閱者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<R> ProgressObserver<R> for NoopObserver {}

/// 把進度事件寫進 tracing 日誌
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl<R> ProgressObserver<R> for TracingObserver {
    fn on_progress(&self, attempt: u32, max_attempts: u32) {
        tracing::info!("⏳ [{}] status check {}/{}", self.label, attempt, max_attempts);
    }

    fn on_partial(&self, results: &[R]) {
        tracing::info!("📦 [{}] {} results collected so far", self.label, results.len());
    }

    fn on_complete(&self, results: &[R]) {
        tracing::info!("✅ [{}] enrichment finished with {} results", self.label, results.len());
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        tracing::error!("❌ [{}] {:?}: {}", self.label, kind, message);
    }

    fn on_warning(&self, message: &str) {
        tracing::warn!("⚠️ [{}] {}", self.label, message);
    }
}
