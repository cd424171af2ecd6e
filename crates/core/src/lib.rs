//! logcurator 공통 크레이트
//!
//! 모든 크레이트가 공유하는 설정, 에러, 도메인 타입, 메트릭 이름,
//! 생명주기 trait을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogcuratorError, PipelineError, WorkloadApiError};

// 설정
pub use config::{FilterOperator, LogcuratorConfig, StreamerConfig};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 도메인 타입
pub use types::{Entry, SourceIdentity};
