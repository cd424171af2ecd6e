//! 로그 수집 모듈 -- 파일에서 원시 라인을 읽습니다.
//!
//! # 수집 소스
//! - [`FileTail`]: 파일 감시 (tail -F 방식, 로테이션/truncation 감지)
//!
//! 각 소스는 자체 tokio 태스크의 tailer가 소유하며, 읽은 라인은
//! 필터를 거쳐 공유 배치 누적기로 전달됩니다.

pub mod file;

pub use file::{FileTail, TailConfig};
