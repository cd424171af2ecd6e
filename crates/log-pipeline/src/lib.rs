//! logcurator 로그 파이프라인
//!
//! 노드의 로그 파일을 발견하고 따라 읽으며, 키워드 필터를 통과한 라인을
//! 메타데이터와 함께 배치로 묶어 수집기로 전송합니다.
//!
//! # 모듈 구성
//!
//! - [`filter`]: 키워드 및 `4xx`/`5xx` 상태 코드 필터
//! - [`buffer`]: 공유 배치 누적기와 [`BatchSink`] trait
//! - [`delivery`]: 수집기 HTTP 전송
//! - [`collector`]: 파일 tail 기본 요소
//! - [`tailer`]: 파일 하나를 담당하는 소스 tailer
//! - [`discovery`]: 워크로드 이벤트 또는 디렉토리 탐색 기반 소스 발견
//! - [`streamer`]: 전체 흐름 관리 (Pipeline trait 구현)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Discovery -> SourceTailer -> FilterEngine -> BatchAccumulator -> HttpDelivery
//!     |             |
//!  Workload     MetadataCache
//!  events
//! ```

pub mod buffer;
pub mod delivery;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod streamer;
pub mod tailer;

pub mod collector;

#[cfg(test)]
mod test_support;

// --- 주요 타입 re-export ---

// 스트리머
pub use streamer::{SERVICE_ACCOUNT_TOKEN_PATH, SourceMode, Streamer, StreamerBuilder};

// 에러
pub use error::LogPipelineError;

// 필터
pub use filter::FilterEngine;

// 버퍼 및 전송
pub use buffer::{BatchAccumulator, BatchSink};
pub use delivery::{DeliveryConfig, HttpDelivery};

// 수집기
pub use collector::{FileTail, TailConfig};

// 발견 및 tail
pub use discovery::{Discovery, list_log_files};
pub use tailer::{RejectReason, SourceTailer, TailExit, strip_cri_prefix};

/// 쿠버네티스 API와 HTTP 전송을 사용하는 스트리머
pub type HttpStreamer = Streamer<logcurator_workload::KubeWorkloadClient, HttpDelivery>;
