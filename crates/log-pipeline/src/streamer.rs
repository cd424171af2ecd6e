//! 스트리머 -- 발견/tail/필터/배치/전송의 전체 흐름을 관리합니다.
//!
//! [`Streamer`]는 core의 [`Pipeline`] trait을 구현하여
//! `logcurator-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! Discovery -> SourceTailer (파일당 1개) -> FilterEngine -> BatchAccumulator -> BatchSink
//!                   |
//!             MetadataCache (오케스트레이터 모드)
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use logcurator_core::config::StreamerConfig;
use logcurator_core::error::{LogcuratorError, PipelineError};
use logcurator_core::pipeline::{HealthStatus, Pipeline};
use logcurator_workload::{MetadataCache, SourcePolicy, WorkloadClient};

use crate::buffer::{BatchAccumulator, BatchSink};
use crate::collector::TailConfig;
use crate::discovery::{Discovery, OrchestratedDiscovery, StaticDiscovery, TailerSpawner};
use crate::error::LogPipelineError;
use crate::filter::FilterEngine;
use crate::tailer::{MetadataSource, TailContext};

/// 서비스 계정 토큰 경로 (오케스트레이터 모드 감지용)
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// 호스트 이름을 알 수 없을 때 사용하는 값
const UNKNOWN_HOSTNAME: &str = "unknown";

/// 소스 발견 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// 오케스트레이터 워크로드 이벤트 기반
    Orchestrated,
    /// 호스트 디렉토리 탐색
    Standalone,
}

impl SourceMode {
    /// 서비스 계정 토큰이 있으면 오케스트레이터 모드입니다.
    pub fn detect() -> Self {
        Self::detect_at(Path::new(SERVICE_ACCOUNT_TOKEN_PATH))
    }

    /// 주어진 토큰 경로로 모드를 판정합니다.
    pub fn detect_at(token_path: &Path) -> Self {
        if token_path.is_file() {
            Self::Orchestrated
        } else {
            Self::Standalone
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orchestrated => write!(f, "orchestrated"),
            Self::Standalone => write!(f, "standalone"),
        }
    }
}

/// 스트리머 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 스트리머
///
/// # 사용 예시
/// ```ignore
/// use logcurator_log_pipeline::{HttpDelivery, StreamerBuilder};
///
/// let mut streamer = StreamerBuilder::new()
///     .config(config.streamer.clone())
///     .client(kube_client)
///     .sink(delivery)
///     .build()?;
///
/// streamer.start().await?;
/// ```
pub struct Streamer<C: WorkloadClient, S: BatchSink> {
    config: StreamerConfig,
    state: StreamerState,
    mode: SourceMode,
    accumulator: Arc<BatchAccumulator<Arc<S>>>,
    cache: Option<Arc<MetadataCache<C>>>,
    ctx: TailContext<C, S>,
    root: CancellationToken,
    tracker: TaskTracker,
    /// 발견 태스크가 에러로 종료되었는지 여부
    discovery_failed: Arc<AtomicBool>,
}

impl<C: WorkloadClient, S: BatchSink> Streamer<C, S> {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            StreamerState::Initialized => "initialized",
            StreamerState::Running => "running",
            StreamerState::Stopped => "stopped",
        }
    }

    /// 발견 모드
    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// 실행 중인 tailer 및 발견 태스크 수
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// 메타데이터 캐시 (오케스트레이터 모드)
    pub fn cache(&self) -> Option<&Arc<MetadataCache<C>>> {
        self.cache.as_ref()
    }

    /// 배치 누적기
    pub fn accumulator(&self) -> &Arc<BatchAccumulator<Arc<S>>> {
        &self.accumulator
    }

    fn discovery(&self) -> Discovery<C, S> {
        let spawner = TailerSpawner::new(self.tracker.clone(), self.ctx.clone());
        match &self.cache {
            Some(cache) => Discovery::Orchestrated(OrchestratedDiscovery::new(
                Arc::clone(cache),
                &self.config.pods_root,
                Duration::from_secs(self.config.sync_timeout_secs),
                spawner,
            )),
            None => Discovery::Standalone(StaticDiscovery::new(&self.config.path, spawner)),
        }
    }
}

impl<C: WorkloadClient, S: BatchSink> Pipeline for Streamer<C, S> {
    async fn start(&mut self) -> Result<(), LogcuratorError> {
        if self.state == StreamerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(mode = %self.mode, "starting log streamer");

        self.root = CancellationToken::new();
        self.tracker = TaskTracker::new();
        self.discovery_failed.store(false, Ordering::Relaxed);

        let discovery = self.discovery();
        let root = self.root.clone();
        let failed = Arc::clone(&self.discovery_failed);
        self.tracker.spawn(async move {
            let mode = discovery.mode_name();
            if let Err(e) = discovery.run(root).await {
                tracing::error!(mode, error = %e, "source discovery failed");
                failed.store(true, Ordering::Relaxed);
            }
        });

        self.state = StreamerState::Running;
        tracing::info!("log streamer started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogcuratorError> {
        if self.state != StreamerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log streamer");

        // 1. 모든 소스 취소
        self.root.cancel();
        self.tracker.close();

        // 2. tailer 종료 대기 (상한 있음)
        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                timeout_secs = timeout.as_secs(),
                "tailers did not stop in time"
            );
        }

        // 3. 남은 엔트리 전송
        self.accumulator.flush().await;
        if let Some(cache) = &self.cache {
            cache.cancel_all();
        }

        self.state = StreamerState::Stopped;
        tracing::info!("log streamer stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            StreamerState::Running if self.discovery_failed.load(Ordering::Relaxed) => {
                HealthStatus::Degraded("source discovery stopped".to_owned())
            }
            StreamerState::Running => HealthStatus::Healthy,
            StreamerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            StreamerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 스트리머 빌더
pub struct StreamerBuilder<C: WorkloadClient, S: BatchSink> {
    config: StreamerConfig,
    client: Option<Arc<C>>,
    sink: Option<Arc<S>>,
    mode: Option<SourceMode>,
    hostname: Option<String>,
}

impl<C: WorkloadClient, S: BatchSink> StreamerBuilder<C, S> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: StreamerConfig::default(),
            client: None,
            sink: None,
            mode: None,
            hostname: None,
        }
    }

    /// 스트리머 설정을 지정합니다.
    pub fn config(mut self, config: StreamerConfig) -> Self {
        self.config = config;
        self
    }

    /// 워크로드 클라이언트를 지정합니다. 오케스트레이터 모드에서 필수입니다.
    pub fn client(mut self, client: Arc<C>) -> Self {
        self.client = Some(client);
        self
    }

    /// 배치 전달 대상을 지정합니다.
    pub fn sink(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 발견 모드를 지정합니다. 지정하지 않으면 서비스 계정 토큰으로 감지합니다.
    pub fn mode(mut self, mode: SourceMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// 엔트리의 호스트 이름을 지정합니다. 지정하지 않으면 시스템 호스트 이름을 사용합니다.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// 스트리머를 빌드합니다.
    pub fn build(self) -> Result<Streamer<C, S>, LogPipelineError> {
        self.config.validate().map_err(|e| LogPipelineError::Config {
            field: "streamer".to_owned(),
            reason: e.to_string(),
        })?;

        let sink = self.sink.ok_or_else(|| LogPipelineError::Config {
            field: "sink".to_owned(),
            reason: "a batch sink is required".to_owned(),
        })?;

        let mode = self.mode.unwrap_or_else(SourceMode::detect);
        let policy = Arc::new(SourcePolicy::from_config(&self.config));

        let (metadata, cache) = match mode {
            SourceMode::Orchestrated => {
                let client = self.client.ok_or_else(|| LogPipelineError::Config {
                    field: "client".to_owned(),
                    reason: "orchestrated mode requires a workload client".to_owned(),
                })?;
                let cache = Arc::new(MetadataCache::new(client, Arc::clone(&policy)));
                (MetadataSource::Orchestrated(Arc::clone(&cache)), Some(cache))
            }
            SourceMode::Standalone => (MetadataSource::Standalone, None),
        };

        let hostname = self.hostname.unwrap_or_else(system_hostname);
        let accumulator = Arc::new(BatchAccumulator::new(
            self.config.effective_batch_size(),
            sink,
        ));
        let limiter = (self.config.max_sources > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_sources)));
        let startup_delay = match mode {
            SourceMode::Orchestrated => Duration::from_secs(self.config.startup_delay_secs),
            SourceMode::Standalone => Duration::ZERO,
        };

        let ctx = TailContext {
            filter: Arc::new(FilterEngine::from_config(&self.config)?),
            accumulator: Arc::clone(&accumulator),
            metadata,
            policy,
            hostname,
            tail: TailConfig::from_streamer(&self.config),
            startup_delay,
            limiter,
        };

        tracing::debug!(
            %mode,
            host = %ctx.hostname,
            batch_size = accumulator.batch_size(),
            "log streamer built"
        );

        Ok(Streamer {
            config: self.config,
            state: StreamerState::Initialized,
            mode,
            accumulator,
            cache,
            ctx,
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            discovery_failed: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl<C: WorkloadClient, S: BatchSink> Default for StreamerBuilder<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

fn system_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read hostname");
            UNKNOWN_HOSTNAME.to_owned()
        }
    }
}
