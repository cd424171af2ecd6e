//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogcuratorError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logcurator_core::error::{LogcuratorError, PipelineError};

/// 로그 파이프라인 도메인 에러
///
/// 필터 구성, 파일 tail, 소스 발견, 전송 등 파이프라인 내부의
/// 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 필터 구성 실패
    #[error("filter error: keyword '{keyword}': {reason}")]
    Filter {
        /// 문제가 된 키워드
        keyword: String,
        /// 실패 사유
        reason: String,
    },

    /// tail 실패 (열기, 읽기)
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 소스 경로 해석 실패
    #[error("invalid source path: {0}")]
    SourcePath(String),

    /// 소스 발견 실패
    #[error("discovery error: {0}")]
    Discovery(String),

    /// 전송 실패
    #[error("delivery error: {0}")]
    Delivery(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for LogcuratorError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Io(e) => LogcuratorError::Io(e),
            other => LogcuratorError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_error_display() {
        let err = LogPipelineError::Tail {
            path: "/var/log/pods/a_b_c/app/0.log".to_owned(),
            reason: "permission denied".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0.log"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn filter_error_display() {
        let err = LogPipelineError::Filter {
            keyword: "  ".to_owned(),
            reason: "blank keyword".to_owned(),
        };
        assert!(err.to_string().contains("blank keyword"));
    }

    #[test]
    fn converts_to_logcurator_error() {
        let err = LogPipelineError::Discovery("walk failed".to_owned());
        let top: LogcuratorError = err.into();
        assert!(matches!(top, LogcuratorError::Pipeline(_)));
    }

    #[test]
    fn io_error_keeps_io_variant() {
        let err = LogPipelineError::Io(std::io::Error::other("disk"));
        let top: LogcuratorError = err.into();
        assert!(matches!(top, LogcuratorError::Io(_)));
    }
}
