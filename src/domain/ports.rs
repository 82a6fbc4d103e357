use crate::config::KindConfig;
use crate::domain::model::{EnrichmentRequest, StatusEnvelope, SubmitEnvelope};
use crate::utils::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

/// 只用來借 url 的 path segment 編碼
static SEGMENT_ENCODER: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://localhost/").expect("valid base url"));

/// 遠端補全服務的傳輸層（送出 / 查詢狀態）
#[async_trait]
pub trait EnrichmentApi: Send + Sync {
    async fn submit(&self, path: &str, body: &serde_json::Value) -> Result<SubmitEnvelope>;
    async fn fetch_status(&self, path: &str) -> Result<StatusEnvelope>;
}

/// 補全種類的策略物件：實體與結果型別、端點、驗證與欄位對應。
/// 輪詢流程只寫一次，人員與公司只差在這裡。
pub trait EnrichmentKind: Send + Sync {
    type Entity: Serialize + Clone + Send + Sync + 'static;
    type Result: Clone + Send + Sync + 'static;

    fn label(&self) -> &'static str;

    /// 請求 body 中實體陣列的欄位名
    fn collection_key(&self) -> &'static str;

    fn settings(&self) -> &KindConfig;

    /// 單一請求的實體上限
    fn max_entities(&self) -> usize;

    /// 設定的批次大小，不超過 max_entities
    fn default_batch_size(&self) -> usize {
        self.settings()
            .max_batch_size
            .unwrap_or_else(|| self.max_entities())
            .min(self.max_entities())
    }

    fn uses_include(&self) -> bool {
        false
    }

    fn normalize_entity(&self, entity: Self::Entity) -> Self::Entity {
        entity
    }

    /// position 從 1 開始，用於錯誤訊息
    fn validate_entity(&self, position: usize, entity: &Self::Entity) -> Result<()>;

    fn map_result(&self, raw: serde_json::Value) -> Result<Self::Result>;

    fn submit_path(&self) -> &str {
        &self.settings().submit_path
    }

    /// job id 以單一 path segment 編碼附加
    fn status_path(&self, job_id: &str) -> String {
        let mut encoded = SEGMENT_ENCODER.clone();
        if let Ok(mut segments) = encoded.path_segments_mut() {
            segments.clear().push(job_id);
        }
        format!(
            "{}{}",
            self.settings().status_path.trim_end_matches('/'),
            encoded.path()
        )
    }

    fn job_id_field(&self) -> &str {
        &self.settings().job_id_field
    }

    fn build_payload(&self, request: &EnrichmentRequest<Self::Entity>) -> Result<serde_json::Value> {
        let mut body = serde_json::Map::new();
        body.insert(
            self.collection_key().to_string(),
            serde_json::to_value(&request.entities)?,
        );
        if self.uses_include() {
            let include = request.include.unwrap_or_default();
            body.insert("include".to_string(), serde_json::to_value(include)?);
        }
        if let Some(notification) = &request.notification_options {
            body.insert(
                "notificationOptions".to_string(),
                serde_json::to_value(notification)?,
            );
        }
        Ok(serde_json::Value::Object(body))
    }
}

/// 進度訂閱；所有方法預設不做事
pub trait ProgressObserver<R>: Send + Sync {
    fn on_progress(&self, _attempt: u32, _max_attempts: u32) {}
    fn on_partial(&self, _results: &[R]) {}
    fn on_complete(&self, _results: &[R]) {}
    fn on_error(&self, _kind: ErrorKind, _message: &str) {}
    fn on_warning(&self, _message: &str) {}
}
