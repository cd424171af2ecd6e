//! Streamer orchestration -- assembly, lifecycle and shutdown.
//!
//! The [`Orchestrator`] picks the discovery mode once at startup, builds the
//! delivery client and (in orchestrated mode) the workload client, then runs
//! the streamer until SIGTERM or SIGINT.
//!
//! # Shutdown
//!
//! 1. The root token is cancelled and every tailer stops.
//! 2. Tailers are awaited up to `shutdown_timeout_secs`.
//! 3. A final flush ships whatever is still buffered.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use logcurator_core::config::LogcuratorConfig;
use logcurator_core::metrics as m;
use logcurator_core::pipeline::Pipeline;
use logcurator_log_pipeline::{
    BatchSink, DeliveryConfig, HttpDelivery, HttpStreamer, SourceMode, Streamer, StreamerBuilder,
};
use logcurator_workload::{KubeWorkloadClient, WorkloadClient};

use crate::metrics_server;

/// Interval between uptime gauge updates.
const UPTIME_INTERVAL: Duration = Duration::from_secs(15);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogcuratorConfig,
    /// Discovery mode, decided once.
    mode: SourceMode,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    ///
    /// Validates the configuration, installs the metrics recorder when enabled
    /// and probes the discovery mode.
    pub fn build_from_config(config: LogcuratorConfig) -> Result<Self> {
        Self::build_with_mode(config, SourceMode::detect())
    }

    /// Build with an explicit discovery mode.
    pub fn build_with_mode(config: LogcuratorConfig, mode: SourceMode) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        tracing::info!(
            %mode,
            target_url = %config.streamer.target_url,
            keywords = config.streamer.keywords.len(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            mode,
            start_time: Instant::now(),
        })
    }

    /// Discovery mode.
    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogcuratorConfig {
        &self.config
    }

    /// Build the production streamer and run it until a shutdown signal arrives.
    pub async fn run(&self) -> Result<()> {
        let mut streamer = self.build_streamer().await?;
        self.drive(&mut streamer, wait_for_shutdown_signal()).await
    }

    async fn build_streamer(&self) -> Result<HttpStreamer> {
        let delivery = HttpDelivery::new(DeliveryConfig::from_streamer(&self.config.streamer))
            .map_err(|e| anyhow::anyhow!("failed to build delivery client: {e}"))?;

        let mut builder = StreamerBuilder::new()
            .config(self.config.streamer.clone())
            .sink(Arc::new(delivery))
            .mode(self.mode);

        if self.mode == SourceMode::Orchestrated {
            let client = KubeWorkloadClient::connect()
                .await
                .map_err(|e| anyhow::anyhow!("failed to connect to cluster api: {e}"))?;
            builder = builder.client(Arc::new(client));
        }

        builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build streamer: {e}"))
    }

    /// Start the streamer, wait for `shutdown`, then stop it.
    pub async fn drive<C, S, F>(&self, streamer: &mut Streamer<C, S>, shutdown: F) -> Result<()>
    where
        C: WorkloadClient,
        S: BatchSink,
        F: Future<Output = Result<&'static str>>,
    {
        streamer
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start streamer: {e}"))?;

        let stop_uptime = CancellationToken::new();
        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, stop_uptime.clone()));

        tracing::info!("logcurator-daemon running");
        let waited = shutdown.await;
        match &waited {
            Ok(signal) => tracing::info!(signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "failed to wait for shutdown signal"),
        }

        stop_uptime.cancel();
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        streamer
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop streamer: {e}"))?;

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "logcurator-daemon shut down"
        );
        waited.map(|_| ())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Periodically publish the daemon uptime gauge until `stop` is cancelled.
fn spawn_uptime_updater(
    start_time: Instant,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    let uptime = start_time.elapsed().as_secs() as f64;
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime);
                }
                () = stop.cancelled() => break,
            }
        }
    })
}
