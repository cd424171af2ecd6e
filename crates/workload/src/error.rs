//! 워크로드 에러 타입
//!
//! [`WorkloadError`]는 오케스트레이터 API 호출과 워치 구독에서 발생하는 에러를 표현합니다.
//! `From<WorkloadError> for LogcuratorError` 변환이 구현되어 있습니다.

use logcurator_core::error::{LogcuratorError, WorkloadApiError};

/// 워크로드 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// 오케스트레이터 API 연결 실패
    #[error("orchestrator connection error: {0}")]
    Connection(String),

    /// 오케스트레이터 API 호출 실패
    #[error("orchestrator api error: {0}")]
    Api(String),

    /// 워크로드를 찾을 수 없음
    #[error("workload not found: {namespace}/{name}")]
    NotFound {
        /// 네임스페이스
        namespace: String,
        /// 워크로드 이름
        name: String,
    },

    /// 워치 구독 실패
    #[error("watch error: {0}")]
    Watch(String),
}

impl From<WorkloadError> for LogcuratorError {
    fn from(err: WorkloadError) -> Self {
        match err {
            WorkloadError::NotFound { namespace, name } => {
                LogcuratorError::Workload(WorkloadApiError::NotFound(format!("{namespace}/{name}")))
            }
            other => LogcuratorError::Workload(WorkloadApiError::Api(other.to_string())),
        }
    }
}
