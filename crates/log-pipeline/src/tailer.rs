//! 소스 tailer -- 파일 하나를 따라 읽으며 필터를 통과한 라인을 누적기에 추가
//!
//! 상태 흐름:
//! ```text
//! Starting (식별자 해석, 시작 지연, 메타데이터 조회) -> Active (라인 읽기) -> Stopped (정리)
//! ```
//!
//! 정리 단계는 항상 같은 순서를 따릅니다. tail을 닫고, 자기 캐시 항목을 제거하고,
//! 누적기를 강제로 flush합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use logcurator_core::metrics as m;
use logcurator_core::types::{
    Entry, STANDALONE_IMAGE, STANDALONE_IMAGE_ID, STANDALONE_NAMESPACE, SourceIdentity,
};
use logcurator_workload::{MetadataCache, SourceHandle, SourcePolicy, WorkloadClient};

use crate::buffer::{BatchAccumulator, BatchSink};
use crate::collector::{FileTail, TailConfig};
use crate::error::LogPipelineError;
use crate::filter::FilterEngine;

/// 메타데이터 출처
pub enum MetadataSource<C: WorkloadClient> {
    /// 오케스트레이터 API와 캐시
    Orchestrated(Arc<MetadataCache<C>>),
    /// 호스트 파일 (고정 메타데이터)
    Standalone,
}

impl<C: WorkloadClient> Clone for MetadataSource<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Orchestrated(cache) => Self::Orchestrated(Arc::clone(cache)),
            Self::Standalone => Self::Standalone,
        }
    }
}

/// 모든 tailer가 공유하는 실행 문맥
pub struct TailContext<C: WorkloadClient, S: BatchSink> {
    pub filter: Arc<FilterEngine>,
    pub accumulator: Arc<BatchAccumulator<Arc<S>>>,
    pub metadata: MetadataSource<C>,
    pub policy: Arc<SourcePolicy>,
    pub hostname: String,
    pub tail: TailConfig,
    /// 오케스트레이터 모드에서 파일을 열기 전 대기 시간
    pub startup_delay: Duration,
    /// 동시 소스 상한 (`None`이면 무제한)
    pub limiter: Option<Arc<Semaphore>>,
}

impl<C: WorkloadClient, S: BatchSink> Clone for TailContext<C, S> {
    fn clone(&self) -> Self {
        Self {
            filter: Arc::clone(&self.filter),
            accumulator: Arc::clone(&self.accumulator),
            metadata: self.metadata.clone(),
            policy: Arc::clone(&self.policy),
            hostname: self.hostname.clone(),
            tail: self.tail.clone(),
            startup_delay: self.startup_delay,
            limiter: self.limiter.clone(),
        }
    }
}

impl<C: WorkloadClient, S: BatchSink> TailContext<C, S> {
    fn is_orchestrated(&self) -> bool {
        matches!(self.metadata, MetadataSource::Orchestrated(_))
    }
}

/// tailer가 시작하지 못한 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 동시 소스 상한 초과
    Capacity,
    /// 경로에서 식별자를 해석할 수 없음
    Path,
    /// 메타데이터 조회 실패
    Metadata,
    /// 네임스페이스/레이블 정책에 맞지 않음
    Policy,
}

impl RejectReason {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Path => "path",
            Self::Metadata => "metadata",
            Self::Policy => "policy",
        }
    }
}

/// tailer 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailExit {
    /// 핸들 취소
    Cancelled,
    /// 파일을 열기 전에 거부됨
    Rejected(RejectReason),
    /// 파일 열기 실패
    OpenFailed,
    /// 읽기 실패
    ReadFailed,
}

/// 해석된 소스 메타데이터
struct ResolvedSource {
    identity: SourceIdentity,
    image: String,
    image_id: String,
}

/// 파일 하나를 담당하는 tailer
pub struct SourceTailer<C: WorkloadClient, S: BatchSink> {
    ctx: TailContext<C, S>,
    path: PathBuf,
    handle: SourceHandle,
}

impl<C: WorkloadClient, S: BatchSink> SourceTailer<C, S> {
    /// 새 tailer를 생성합니다. 같은 컨테이너의 파일들은 `handle`을 공유합니다.
    pub fn new(ctx: TailContext<C, S>, path: impl Into<PathBuf>, handle: SourceHandle) -> Self {
        Self {
            ctx,
            path: path.into(),
            handle,
        }
    }

    /// 대상 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 취소되거나 실패할 때까지 tail합니다.
    pub async fn run(self) -> TailExit {
        if self.handle.is_cancelled() {
            self.release_entry();
            return TailExit::Cancelled;
        }

        let _permit = match self.acquire_permit() {
            Ok(permit) => permit,
            Err(exit) => {
                self.release_entry();
                return exit;
            }
        };

        let source = match self.resolve().await {
            Ok(source) => source,
            Err(exit) => {
                self.release_entry();
                return exit;
            }
        };

        let mut tail = match FileTail::open(&self.path, self.ctx.tail.clone()).await {
            Ok(tail) => tail,
            Err(e) => {
                warn!(source = %source.identity, error = %e, "failed to open log file");
                self.teardown(&source.identity, true).await;
                return TailExit::OpenFailed;
            }
        };

        info!(source = %source.identity, path = %self.path.display(), "tailing log file");
        metrics::gauge!(m::LOG_PIPELINE_SOURCES_ACTIVE).increment(1.0);

        let strip = self.ctx.is_orchestrated();
        let exit = loop {
            if self.handle.is_cancelled() {
                break TailExit::Cancelled;
            }

            let line = tokio::select! {
                biased;
                () = self.handle.cancelled() => break TailExit::Cancelled,
                line = tail.next_line() => line,
            };

            match line {
                Ok(line) => self.process_line(&source, &line, strip).await,
                Err(e) => {
                    warn!(source = %source.identity, error = %e, "failed to read log file");
                    break TailExit::ReadFailed;
                }
            }
        };

        drop(tail);
        metrics::gauge!(m::LOG_PIPELINE_SOURCES_ACTIVE).decrement(1.0);
        self.teardown(&source.identity, exit != TailExit::Cancelled).await;
        info!(source = %source.identity, path = %self.path.display(), ?exit, "tailer stopped");
        exit
    }

    fn acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>, TailExit> {
        let Some(limiter) = &self.ctx.limiter else {
            return Ok(None);
        };
        match Arc::clone(limiter).try_acquire_owned() {
            Ok(permit) => Ok(Some(permit)),
            Err(_) => {
                warn!(path = %self.path.display(), "source limit reached, not tailing");
                Err(reject(RejectReason::Capacity))
            }
        }
    }

    async fn resolve(&self) -> Result<ResolvedSource, TailExit> {
        match &self.ctx.metadata {
            MetadataSource::Orchestrated(cache) => {
                let identity = parse_pod_log_path(&self.path).map_err(|e| {
                    warn!(error = %e, "skipping log file");
                    reject(RejectReason::Path)
                })?;

                if !self.ctx.startup_delay.is_zero() {
                    tokio::select! {
                        () = self.handle.cancelled() => return Err(TailExit::Cancelled),
                        () = tokio::time::sleep(self.ctx.startup_delay) => {}
                    }
                }

                let Some((image, image_id)) = cache.lookup_or_fetch(&identity, &self.handle).await
                else {
                    debug!(source = %identity, "no metadata for source, not tailing");
                    return Err(reject(RejectReason::Metadata));
                };

                Ok(ResolvedSource {
                    identity,
                    image,
                    image_id,
                })
            }
            MetadataSource::Standalone => {
                let file_name = self
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        warn!(path = %self.path.display(), "log path has no file name");
                        reject(RejectReason::Path)
                    })?;

                if !self.ctx.policy.admits(STANDALONE_NAMESPACE, None) {
                    debug!(path = %self.path.display(), "standalone namespace excluded by policy");
                    return Err(reject(RejectReason::Policy));
                }

                Ok(ResolvedSource {
                    identity: SourceIdentity::standalone(&self.ctx.hostname, file_name),
                    image: STANDALONE_IMAGE.to_owned(),
                    image_id: STANDALONE_IMAGE_ID.to_owned(),
                })
            }
        }
    }

    async fn process_line(&self, source: &ResolvedSource, line: &str, strip: bool) {
        metrics::counter!(m::LOG_PIPELINE_LINES_READ_TOTAL).increment(1);
        if !self.ctx.filter.matches(line) {
            return;
        }

        let payload = if strip { strip_cri_prefix(line) } else { line };
        let entry = Entry::new(
            &source.identity,
            &source.image,
            &source.image_id,
            payload,
            &self.ctx.hostname,
        );
        metrics::counter!(m::LOG_PIPELINE_LINES_MATCHED_TOTAL).increment(1);
        self.ctx.accumulator.append(entry).await;
    }

    /// 시작하지 못한 tailer의 캐시 항목을 제거합니다.
    ///
    /// 항목을 제거했다면 핸들을 취소하여 같은 컨테이너의 다른 tailer도 멈춥니다.
    /// 이후 `Added` 이벤트가 컨테이너를 다시 추적할 수 있습니다.
    fn release_entry(&self) {
        let MetadataSource::Orchestrated(cache) = &self.ctx.metadata else {
            return;
        };
        let Ok(identity) = parse_pod_log_path(&self.path) else {
            return;
        };
        if cache.remove_if_owned(&identity, &self.handle) {
            debug!(source = %identity, "released cache entry of tailer that did not start");
            self.handle.cancel();
        }
    }

    /// 자기 캐시 항목을 제거하고 누적기를 flush합니다.
    ///
    /// 에러로 종료하면서 항목을 제거했다면 같은 컨테이너의 다른 tailer도 멈추도록
    /// 핸들을 취소합니다.
    async fn teardown(&self, identity: &SourceIdentity, failed: bool) {
        if let MetadataSource::Orchestrated(cache) = &self.ctx.metadata {
            if cache.remove_if_owned(identity, &self.handle) && failed {
                self.handle.cancel();
            }
        }
        self.ctx.accumulator.flush().await;
    }
}

fn reject(reason: RejectReason) -> TailExit {
    metrics::counter!(m::LOG_PIPELINE_SOURCES_REJECTED_TOTAL, m::LABEL_REASON => reason.as_str())
        .increment(1);
    TailExit::Rejected(reason)
}

/// CRI 로그 접두사(`<time> <stream> <tag> `)를 제거합니다.
///
/// 공백으로 네 부분 이상 나뉘지 않으면 원본을 그대로 반환합니다.
pub fn strip_cri_prefix(line: &str) -> &str {
    let mut parts = line.splitn(4, ' ');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(_), Some(payload)) => payload,
        _ => line,
    }
}

/// `<root>/<ns>_<pod>_<uid>/<container>/<n>.log` 경로에서 식별자를 해석합니다.
pub fn parse_pod_log_path(path: &Path) -> Result<SourceIdentity, LogPipelineError> {
    let invalid = || LogPipelineError::SourcePath(path.display().to_string());

    let container_dir = path.parent().ok_or_else(invalid)?;
    let pod_dir = container_dir.parent().ok_or_else(invalid)?;
    let container = container_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    let pod = pod_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;

    let mut parts = pod.splitn(3, '_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ns), Some(name), Some(_uid))
            if !ns.is_empty() && !name.is_empty() && !container.is_empty() =>
        {
            Ok(SourceIdentity::new(ns, name, container))
        }
        _ => Err(invalid()),
    }
}
