//! Orchestrator API abstraction for testability.
//!
//! The [`WorkloadClient`] trait covers the two calls the streamer needs from
//! the orchestrator: a point lookup of one workload and a subscription to
//! workload lifecycle events. Production code uses [`KubeWorkloadClient`];
//! unit tests use `MockWorkloadClient`.
//!
//! ```text
//!   ┌────────────────────┐
//!   │ discovery / cache  │
//!   └─────────┬──────────┘
//!             ▼
//!     ┌───────────────┐
//!     │WorkloadClient │ (trait)
//!     └───────────────┘
//!         │       │
//!         ▼       ▼
//!     ┌──────┐ ┌──────┐
//!     │ Kube │ │ Mock │
//!     └──┬───┘ └──────┘
//!        ▼
//!   API server (pods, all namespaces)
//! ```

use std::future::Future;
use std::pin::pin;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::WorkloadError;
use crate::event::{ContainerMeta, InformerState, WorkloadEvent, WorkloadInfo};

/// Watch channel capacity.
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Trait abstracting orchestrator API operations.
///
/// The trait is `Send + Sync + 'static` so one client can be shared through
/// `Arc` by the discovery controller and every tailer.
pub trait WorkloadClient: Send + Sync + 'static {
    /// Fetches one workload by namespace and name.
    ///
    /// # Errors
    ///
    /// - `WorkloadError::NotFound`: the workload does not exist (404)
    /// - `WorkloadError::Api`: any other API failure
    fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<WorkloadInfo, WorkloadError>> + Send;

    /// Subscribes to workload lifecycle events across all namespaces.
    ///
    /// The returned channel yields `Added` for every existing workload, then
    /// `Synced`, then live add/remove events. It closes once `shutdown` is
    /// cancelled.
    fn watch(
        &self,
        shutdown: CancellationToken,
    ) -> impl Future<Output = Result<mpsc::Receiver<WorkloadEvent>, WorkloadError>> + Send;
}

/// Production client backed by `kube`.
///
/// Uses in-cluster service account credentials when running inside a pod,
/// and the local kubeconfig otherwise.
#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
}

impl KubeWorkloadClient {
    /// Connects using the inferred configuration.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadError::Connection` when no usable configuration is found.
    pub async fn connect() -> Result<Self, WorkloadError> {
        let client = Client::try_default().await.map_err(|e| {
            WorkloadError::Connection(format!("failed to build orchestrator client: {e}"))
        })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl WorkloadClient for KubeWorkloadClient {
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadInfo, WorkloadError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = api.get(name).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => WorkloadError::NotFound {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            },
            other => WorkloadError::Api(format!("get pod {namespace}/{name} failed: {other}")),
        })?;
        Ok(workload_from_pod(&pod))
    }

    async fn watch(
        &self,
        shutdown: CancellationToken,
    ) -> Result<mpsc::Receiver<WorkloadEvent>, WorkloadError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut stream = pin!(watcher(api, watcher::Config::default()).default_backoff());
            let mut state = InformerState::new();

            loop {
                let next = tokio::select! {
                    () = shutdown.cancelled() => break,
                    next = stream.next() => next,
                };
                let Some(result) = next else { break };

                let events = match result {
                    Ok(watcher::Event::Init) => {
                        state.begin_relist();
                        Vec::new()
                    }
                    Ok(watcher::Event::InitApply(pod) | watcher::Event::Apply(pod)) => {
                        state.observe(workload_from_pod(&pod)).into_iter().collect()
                    }
                    Ok(watcher::Event::Delete(pod)) => {
                        state.forget(workload_from_pod(&pod)).into_iter().collect()
                    }
                    Ok(watcher::Event::InitDone) => state.finish_relist(),
                    Err(e) => {
                        warn!(error = %e, "workload watch error, retrying with backoff");
                        Vec::new()
                    }
                };

                for event in events {
                    if tx.send(event).await.is_err() {
                        debug!("workload watch receiver dropped");
                        return;
                    }
                }
            }
            debug!("workload watch stopped");
        });

        Ok(rx)
    }
}

/// Converts a pod object into a [`WorkloadInfo`] snapshot.
pub fn workload_from_pod(pod: &Pod) -> WorkloadInfo {
    let meta = &pod.metadata;
    let containers = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|c| ContainerMeta {
                    name: c.name.clone(),
                    image: c.image.clone(),
                    image_id: c.image_id.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    WorkloadInfo {
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
        labels: meta.labels.clone().unwrap_or_default(),
        containers,
    }
}

/// Mock workload client for tests.
///
/// Serves a fixed workload list and replays a scripted event sequence.
#[cfg(test)]
#[derive(Default)]
pub struct MockWorkloadClient {
    /// Workloads served by `get_workload`.
    pub workloads: Vec<WorkloadInfo>,
    /// Events replayed in order on `watch`.
    pub events: Vec<WorkloadEvent>,
    /// Whether lookups fail with an API error.
    pub fail_lookups: bool,
    lookups: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockWorkloadClient {
    /// Creates an empty mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the workloads served by lookups.
    pub fn with_workloads(mut self, workloads: Vec<WorkloadInfo>) -> Self {
        self.workloads = workloads;
        self
    }

    /// Sets the scripted watch events.
    pub fn with_events(mut self, events: Vec<WorkloadEvent>) -> Self {
        self.events = events;
        self
    }

    /// Makes every lookup fail.
    pub fn with_failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Number of `get_workload` calls.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
impl WorkloadClient for MockWorkloadClient {
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadInfo, WorkloadError> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if self.fail_lookups {
            return Err(WorkloadError::Api("mock failure".to_owned()));
        }
        self.workloads
            .iter()
            .find(|w| w.namespace == namespace && w.name == name)
            .cloned()
            .ok_or_else(|| WorkloadError::NotFound {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            })
    }

    async fn watch(
        &self,
        shutdown: CancellationToken,
    ) -> Result<mpsc::Receiver<WorkloadEvent>, WorkloadError> {
        let (tx, rx) = mpsc::channel(self.events.len().max(1));
        for event in &self.events {
            let _ = tx.try_send(event.clone());
        }
        // Keep the channel open until shutdown, like a live watch.
        tokio::spawn(async move {
            shutdown.cancelled().await;
            drop(tx);
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};
    use kube::api::ObjectMeta;

    use super::*;

    fn sample_pod() -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some("prod".to_owned()),
                name: Some("web-0".to_owned()),
                uid: Some("1234-abcd".to_owned()),
                labels: Some(BTreeMap::from([("app".to_owned(), "web".to_owned())])),
                ..Default::default()
            },
            status: Some(PodStatus {
                container_statuses: Some(vec![ContainerStatus {
                    name: "nginx".to_owned(),
                    image: "nginx:1.27".to_owned(),
                    image_id: "docker-pullable://nginx@sha256:abc".to_owned(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn converts_pod_metadata_and_statuses() {
        let info = workload_from_pod(&sample_pod());
        assert_eq!(info.namespace, "prod");
        assert_eq!(info.name, "web-0");
        assert_eq!(info.uid, "1234-abcd");
        assert_eq!(info.labels.get("app").map(String::as_str), Some("web"));
        let container = info.container("nginx").unwrap();
        assert_eq!(container.image, "nginx:1.27");
        assert_eq!(container.image_id, "docker-pullable://nginx@sha256:abc");
    }

    #[test]
    fn pending_pod_has_no_containers() {
        let mut pod = sample_pod();
        pod.status = None;
        let info = workload_from_pod(&pod);
        assert!(info.containers.is_empty());
    }

    #[tokio::test]
    async fn mock_lookup_not_found() {
        let client = MockWorkloadClient::new();
        let result = client.get_workload("prod", "missing").await;
        assert!(matches!(result, Err(WorkloadError::NotFound { .. })));
        assert_eq!(client.lookup_count(), 1);
    }

    #[tokio::test]
    async fn mock_watch_replays_events_and_closes_on_shutdown() {
        let client = MockWorkloadClient::new().with_events(vec![WorkloadEvent::Synced]);
        let token = CancellationToken::new();
        let mut rx = client.watch(token.clone()).await.unwrap();

        assert_eq!(rx.recv().await, Some(WorkloadEvent::Synced));
        token.cancel();
        assert_eq!(rx.recv().await, None);
    }
}
