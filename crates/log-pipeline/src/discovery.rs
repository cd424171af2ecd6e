//! 소스 발견 -- 워크로드 이벤트 또는 디렉토리 탐색으로 tailer 생성
//!
//! - [`OrchestratedDiscovery`]: 워크로드 추가/삭제 이벤트를 받아 컨테이너별 로그 파일에 tailer를 붙입니다.
//! - [`StaticDiscovery`]: 설정된 루트를 한 번 재귀 탐색하여 `*.log` 파일마다 tailer를 붙입니다.
//!
//! 두 변형 모두 나중에 생긴 파일은 다시 탐색하지 않습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use logcurator_core::metrics as m;
use logcurator_core::types::SourceIdentity;
use logcurator_workload::{MetadataCache, SourceHandle, WorkloadClient, WorkloadEvent, WorkloadInfo};

use crate::buffer::BatchSink;
use crate::error::LogPipelineError;
use crate::tailer::{SourceTailer, TailContext};

/// 로그 파일 확장자
const LOG_EXTENSION: &str = "log";

/// tailer 태스크 생성기
pub struct TailerSpawner<C: WorkloadClient, S: BatchSink> {
    tracker: TaskTracker,
    ctx: TailContext<C, S>,
}

impl<C: WorkloadClient, S: BatchSink> Clone for TailerSpawner<C, S> {
    fn clone(&self) -> Self {
        Self {
            tracker: self.tracker.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: WorkloadClient, S: BatchSink> TailerSpawner<C, S> {
    /// 새 생성기를 만듭니다.
    pub fn new(tracker: TaskTracker, ctx: TailContext<C, S>) -> Self {
        Self { tracker, ctx }
    }

    /// 파일 하나에 대한 tailer를 추적 태스크로 생성합니다.
    pub fn spawn(&self, path: PathBuf, handle: SourceHandle) {
        debug!(path = %path.display(), "spawning tailer");
        let tailer = SourceTailer::new(self.ctx.clone(), path, handle);
        self.tracker.spawn(async move {
            tailer.run().await;
        });
    }

    /// 태스크 추적기
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}

/// `root` 아래의 `*.log` 파일을 재귀적으로 찾아 정렬된 목록으로 반환합니다.
///
/// 읽을 수 없는 디렉토리는 로그를 남기고 건너뜁니다.
pub async fn list_log_files(root: &Path) -> Vec<PathBuf> {
    let root = root.to_path_buf();
    match tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        walk(&root, &mut files);
        files.sort();
        files
    })
    .await
    {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "log file walk aborted");
            Vec::new()
        }
    }
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "directory does not exist");
            return;
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read directory, skipping");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            walk(&path, files);
            continue;
        }

        // 심볼릭 링크 파일은 따라가고 디렉토리는 따라가지 않음
        let is_file = file_type.is_file()
            || (file_type.is_symlink() && std::fs::metadata(&path).is_ok_and(|m| m.is_file()));
        if is_file && path.extension().is_some_and(|ext| ext == LOG_EXTENSION) {
            files.push(path);
        }
    }
}

/// 소스 발견 방식
pub enum Discovery<C: WorkloadClient, S: BatchSink> {
    /// 워크로드 이벤트 기반
    Orchestrated(OrchestratedDiscovery<C, S>),
    /// 디렉토리 일회 탐색
    Standalone(StaticDiscovery<C, S>),
}

impl<C: WorkloadClient, S: BatchSink> Discovery<C, S> {
    /// 루트 토큰이 취소되거나 이벤트 스트림이 끝날 때까지 실행합니다.
    pub async fn run(self, root: CancellationToken) -> Result<(), LogPipelineError> {
        match self {
            Self::Orchestrated(discovery) => discovery.run(root).await,
            Self::Standalone(discovery) => {
                discovery.run(&root).await;
                Ok(())
            }
        }
    }

    /// 변형 이름
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Orchestrated(_) => "orchestrated",
            Self::Standalone(_) => "standalone",
        }
    }
}

/// 워크로드 이벤트 기반 발견
pub struct OrchestratedDiscovery<C: WorkloadClient, S: BatchSink> {
    cache: Arc<MetadataCache<C>>,
    pods_root: PathBuf,
    sync_timeout: Duration,
    spawner: TailerSpawner<C, S>,
}

impl<C: WorkloadClient, S: BatchSink> OrchestratedDiscovery<C, S> {
    /// 새 컨트롤러를 생성합니다.
    pub fn new(
        cache: Arc<MetadataCache<C>>,
        pods_root: impl Into<PathBuf>,
        sync_timeout: Duration,
        spawner: TailerSpawner<C, S>,
    ) -> Self {
        Self {
            cache,
            pods_root: pods_root.into(),
            sync_timeout,
            spawner,
        }
    }

    async fn run(self, root: CancellationToken) -> Result<(), LogPipelineError> {
        let mut events = self
            .cache
            .client()
            .watch(root.clone())
            .await
            .map_err(|e| LogPipelineError::Discovery(e.to_string()))?;

        let sync_deadline = tokio::time::sleep(self.sync_timeout);
        tokio::pin!(sync_deadline);
        let mut synced = false;
        let mut sync_overdue = false;

        loop {
            tokio::select! {
                () = root.cancelled() => {
                    debug!("discovery cancelled");
                    break;
                }
                () = &mut sync_deadline, if !synced && !sync_overdue => {
                    warn!(
                        timeout_secs = self.sync_timeout.as_secs(),
                        "initial workload sync not complete, continuing"
                    );
                    sync_overdue = true;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &root, &mut synced).await,
                    None => {
                        info!("workload event stream closed");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    async fn handle_event(&self, event: WorkloadEvent, root: &CancellationToken, synced: &mut bool) {
        metrics::counter!(m::WORKLOAD_EVENTS_TOTAL, m::LABEL_EVENT_KIND => event.kind())
            .increment(1);

        match event {
            WorkloadEvent::Added(workload) => self.on_added(&workload, root).await,
            WorkloadEvent::Removed(workload) => {
                let cancelled = self.cache.untrack_workload(&workload);
                debug!(workload = %workload, cancelled, "workload removed");
            }
            WorkloadEvent::Synced => {
                if !*synced {
                    info!(sources = self.cache.len(), "initial sync complete");
                    *synced = true;
                }
            }
        }
    }

    async fn on_added(&self, workload: &WorkloadInfo, root: &CancellationToken) {
        if !self
            .cache
            .policy()
            .admits(&workload.namespace, Some(&workload.labels))
        {
            debug!(workload = %workload, "workload rejected by source policy");
            return;
        }

        let pod_dir = self.pods_root.join(format!(
            "{}_{}_{}",
            workload.namespace, workload.name, workload.uid
        ));

        for container in &workload.containers {
            let files = list_log_files(&pod_dir.join(&container.name)).await;
            if files.is_empty() {
                debug!(workload = %workload, container = %container.name, "no log files yet");
                continue;
            }

            let identity = SourceIdentity::new(&workload.namespace, &workload.name, &container.name);
            let Some(handle) = self.cache.try_track(identity, container, root) else {
                continue;
            };

            info!(
                workload = %workload,
                container = %container.name,
                files = files.len(),
                "tracking container logs"
            );
            for path in files {
                self.spawner.spawn(path, handle.clone());
            }
        }
    }
}

/// 디렉토리 일회 탐색 발견
pub struct StaticDiscovery<C: WorkloadClient, S: BatchSink> {
    root: PathBuf,
    spawner: TailerSpawner<C, S>,
}

impl<C: WorkloadClient, S: BatchSink> StaticDiscovery<C, S> {
    /// 새 탐색기를 생성합니다.
    pub fn new(root: impl Into<PathBuf>, spawner: TailerSpawner<C, S>) -> Self {
        Self {
            root: root.into(),
            spawner,
        }
    }

    async fn run(self, root: &CancellationToken) {
        let files = list_log_files(&self.root).await;
        info!(root = %self.root.display(), files = files.len(), "discovered log files");
        for path in files {
            self.spawner
                .spawn(path, SourceHandle::new(root.child_token()));
        }
    }
}
