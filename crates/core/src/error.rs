//! 에러 타입 — 도메인별 에러 정의

/// logcurator 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogcuratorError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 워크로드(오케스트레이터) 에러
    #[error("workload error: {0}")]
    Workload(#[from] WorkloadApiError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 오케스트레이터 API 에러
#[derive(Debug, thiserror::Error)]
pub enum WorkloadApiError {
    /// API 호출 실패
    #[error("api call failed: {0}")]
    Api(String),

    /// 워크로드를 찾을 수 없음
    #[error("workload not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_display_names_field() {
        let err = ConfigError::InvalidValue {
            field: "streamer.operator".to_owned(),
            reason: "must be one of: or, and".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("streamer.operator"));
        assert!(msg.contains("or, and"));
    }

    #[test]
    fn config_error_converts_to_top_level() {
        let err: LogcuratorError = ConfigError::ParseFailed {
            reason: "bad toml".to_owned(),
        }
        .into();
        assert!(matches!(err, LogcuratorError::Config(_)));
    }
}
