//! HTTP 전송 -- 배치를 수집기 엔드포인트로 POST
//!
//! [`HttpDelivery`]는 배치를 JSON 배열로 직렬화하여 단 한 번 전송합니다.
//! 재시도는 하지 않으며, 실패한 배치는 로그를 남기고 버립니다.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::{debug, warn};

use logcurator_core::config::StreamerConfig;
use logcurator_core::metrics as m;
use logcurator_core::types::Entry;

use crate::buffer::BatchSink;
use crate::error::LogPipelineError;

/// 구독 ID 헤더
pub const SUBSCRIPTION_HEADER: &str = "Mit-Subscription-ID";

/// 조직 ID 헤더
pub const ORGANISATION_HEADER: &str = "Mit-Org-ID";

/// 기본 요청 타임아웃
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// 전송 설정
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// 수집기 URL
    pub target_url: String,
    /// 구독 ID
    pub subscription_id: String,
    /// 조직 ID
    pub organisation_id: String,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl DeliveryConfig {
    /// 스트리머 설정에서 전송 설정을 만듭니다.
    pub fn from_streamer(config: &StreamerConfig) -> Self {
        Self {
            target_url: config.target_url.clone(),
            subscription_id: config.subscription_id.clone(),
            organisation_id: config.organisation_id.clone(),
            timeout: Duration::from_secs(config.delivery_timeout_secs),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            target_url: logcurator_core::config::DEFAULT_TARGET_URL.to_owned(),
            subscription_id: String::new(),
            organisation_id: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP 배치 전송기
// TODO: encrypt payloads with `encryption_key` and send `auth_token` once the collector accepts them.
pub struct HttpDelivery {
    client: reqwest::Client,
    config: DeliveryConfig,
}

impl HttpDelivery {
    /// 새 전송기를 생성합니다.
    pub fn new(config: DeliveryConfig) -> Result<Self, LogPipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LogPipelineError::Delivery(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    /// 수집기 URL
    pub fn target_url(&self) -> &str {
        &self.config.target_url
    }

    /// 배치를 전송합니다. 200 이외의 응답은 에러입니다.
    pub async fn send(&self, batch: &[Entry]) -> Result<(), LogPipelineError> {
        let response = self
            .client
            .post(&self.config.target_url)
            .header(SUBSCRIPTION_HEADER, &self.config.subscription_id)
            .header(ORGANISATION_HEADER, &self.config.organisation_id)
            .json(batch)
            .send()
            .await
            .map_err(|e| LogPipelineError::Delivery(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(LogPipelineError::Delivery(format!(
            "collector responded with status {status}: {body}"
        )))
    }
}

impl BatchSink for HttpDelivery {
    async fn deliver(&self, batch: Vec<Entry>) {
        if batch.is_empty() {
            return;
        }

        let started = Instant::now();
        let result = self.send(&batch).await;
        metrics::histogram!(m::DELIVERY_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::counter!(m::DELIVERY_BATCHES_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                metrics::counter!(m::DELIVERY_ENTRIES_SENT_TOTAL).increment(batch.len() as u64);
                debug!(entries = batch.len(), "batch delivered");
            }
            Err(e) => {
                metrics::counter!(m::DELIVERY_BATCHES_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                warn!(
                    entries = batch.len(),
                    target = %self.config.target_url,
                    error = %e,
                    "failed to deliver batch, dropping"
                );
            }
        }
    }
}
