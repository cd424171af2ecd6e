//! 통합 테스트 -- 발견부터 수집기 전송까지의 전체 흐름 검증
//!
//! 실제 파일(tempfile)과 모의 수집기(mockito)를 사용하여
//! 독립 실행 모드와 오케스트레이터 모드의 스트리머를 공개 API만으로 테스트합니다.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Mock, Server};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use logcurator_core::config::StreamerConfig;
use logcurator_core::pipeline::{HealthStatus, Pipeline};
use logcurator_core::types::SourceIdentity;
use logcurator_log_pipeline::{DeliveryConfig, HttpDelivery, SourceMode, StreamerBuilder};
use logcurator_workload::{
    ContainerMeta, WorkloadClient, WorkloadError, WorkloadEvent, WorkloadInfo,
};

// 상태를 바꿀 수 있는 테스트 클라이언트
mod mock {
    use super::*;

    pub struct TestWorkloadClient {
        workloads: Arc<Mutex<Vec<WorkloadInfo>>>,
        events: Arc<Mutex<Option<mpsc::Receiver<WorkloadEvent>>>>,
    }

    impl TestWorkloadClient {
        pub fn new(events: mpsc::Receiver<WorkloadEvent>) -> Self {
            Self {
                workloads: Arc::new(Mutex::new(Vec::new())),
                events: Arc::new(Mutex::new(Some(events))),
            }
        }

        pub async fn add_workload(&self, workload: WorkloadInfo) {
            self.workloads.lock().await.push(workload);
        }
    }

    impl WorkloadClient for TestWorkloadClient {
        async fn get_workload(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<WorkloadInfo, WorkloadError> {
            self.workloads
                .lock()
                .await
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
            _shutdown: CancellationToken,
        ) -> Result<mpsc::Receiver<WorkloadEvent>, WorkloadError> {
            self.events
                .lock()
                .await
                .take()
                .ok_or_else(|| WorkloadError::Watch("already subscribed".to_owned()))
        }
    }
}

use mock::TestWorkloadClient;

fn streamer_config(collector: &str, batch_size: usize) -> StreamerConfig {
    StreamerConfig {
        target_url: format!("{collector}/ingest"),
        keywords: vec!["error".to_owned(), "5xx".to_owned()],
        batch_size,
        subscription_id: "sub-42".to_owned(),
        organisation_id: "org-7".to_owned(),
        startup_delay_secs: 0,
        poll_interval_ms: 10,
        shutdown_timeout_secs: 2,
        ..Default::default()
    }
}

fn delivery(config: &StreamerConfig) -> Arc<HttpDelivery> {
    Arc::new(HttpDelivery::new(DeliveryConfig::from_streamer(config)).unwrap())
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

async fn wait_until_matched(mock: &Mock) {
    for _ in 0..300 {
        if mock.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// 독립 실행 모드: 호스트 파일 → 수집기
#[tokio::test]
async fn standalone_streamer_ships_matching_lines() {
    let mut server = Server::new_async().await;
    let collector = server
        .mock("POST", "/ingest")
        .match_header("Mit-Subscription-ID", "sub-42")
        .match_header("Mit-Org-ID", "org-7")
        .match_body(Matcher::Json(serde_json::json!([{
            "namespace": "non-k8s",
            "pod": "node-a",
            "container": "payments.log",
            "image": "os-native",
            "imageId": "n/a",
            "logs": "charge declined: gateway error",
            "host": "node-a"
        }])))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("payments.log");
    std::fs::write(&log, "historic error is not shipped\n").unwrap();

    let mut config = streamer_config(&server.url(), 1);
    config.path = dir.path().display().to_string();
    let mut streamer = StreamerBuilder::<TestWorkloadClient, HttpDelivery>::new()
        .sink(delivery(&config))
        .config(config)
        .mode(SourceMode::Standalone)
        .hostname("node-a")
        .build()
        .unwrap();

    streamer.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    append(&log, "charge accepted\ncharge declined: gateway error\n");
    wait_until_matched(&collector).await;

    streamer.stop().await.unwrap();
    collector.assert_async().await;
}

/// 오케스트레이터 모드: 워크로드 추가 → tail → 배치 전송 → 삭제 시 정리
#[tokio::test]
async fn orchestrated_streamer_follows_workload_lifecycle() {
    let mut server = Server::new_async().await;
    let collector = server
        .mock("POST", "/ingest")
        .match_body(Matcher::Json(serde_json::json!([
            {
                "namespace": "shop",
                "pod": "api-0",
                "container": "app",
                "image": "registry/api:2.1",
                "imageId": "sha256:feed",
                "logs": "upstream returned 502 failed",
                "host": "node-b"
            },
            {
                "namespace": "shop",
                "pod": "api-0",
                "container": "app",
                "image": "registry/api:2.1",
                "imageId": "sha256:feed",
                "logs": "query error: deadlock detected",
                "host": "node-b"
            }
        ])))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let pods_root = tempfile::tempdir().unwrap();
    let container_dir = pods_root.path().join("shop_api-0_uid-7").join("app");
    std::fs::create_dir_all(&container_dir).unwrap();
    let log = container_dir.join("0.log");
    std::fs::write(&log, "").unwrap();

    let workload = WorkloadInfo {
        namespace: "shop".to_owned(),
        name: "api-0".to_owned(),
        uid: "uid-7".to_owned(),
        labels: BTreeMap::from([("tier".to_owned(), "backend".to_owned())]),
        containers: vec![ContainerMeta {
            name: "app".to_owned(),
            image: "registry/api:2.1".to_owned(),
            image_id: "sha256:feed".to_owned(),
        }],
    };

    let (tx, rx) = mpsc::channel(8);
    let client = Arc::new(TestWorkloadClient::new(rx));
    client.add_workload(workload.clone()).await;

    let mut config = streamer_config(&server.url(), 2);
    config.pods_root = pods_root.path().display().to_string();
    config.pod_labels_to_include = vec!["tier=backend".to_owned()];
    let mut streamer = StreamerBuilder::new()
        .sink(delivery(&config))
        .config(config)
        .client(Arc::clone(&client))
        .mode(SourceMode::Orchestrated)
        .hostname("node-b")
        .build()
        .unwrap();

    streamer.start().await.unwrap();
    tx.send(WorkloadEvent::Added(workload.clone())).await.unwrap();
    tx.send(WorkloadEvent::Synced).await.unwrap();

    let cache = Arc::clone(streamer.cache().unwrap());
    let identity = SourceIdentity::new("shop", "api-0", "app");
    for _ in 0..200 {
        if cache.contains(&identity) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(cache.contains(&identity));
    tokio::time::sleep(Duration::from_millis(200)).await;

    append(
        &log,
        "2024-05-01T10:00:00Z stdout F request served\n\
         2024-05-01T10:00:01Z stderr F upstream returned 502 failed\n\
         2024-05-01T10:00:02Z stderr F query error: deadlock detected\n",
    );
    wait_until_matched(&collector).await;

    let handle = cache.get(&identity).unwrap().handle;
    tx.send(WorkloadEvent::Removed(workload)).await.unwrap();
    for _ in 0..200 {
        if handle.is_cancelled() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(handle.is_cancelled());
    assert!(!cache.contains(&identity));

    streamer.stop().await.unwrap();
    collector.assert_async().await;
}

/// 수집기 실패 시에도 다음 배치는 계속 전송
#[tokio::test]
async fn collector_failures_do_not_stop_streaming() {
    let mut server = Server::new_async().await;
    let collector = server
        .mock("POST", "/ingest")
        .with_status(500)
        .with_body("collector unavailable")
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("worker.log");
    std::fs::write(&log, "").unwrap();

    let mut config = streamer_config(&server.url(), 1);
    config.path = dir.path().display().to_string();
    let mut streamer = StreamerBuilder::<TestWorkloadClient, HttpDelivery>::new()
        .sink(delivery(&config))
        .config(config)
        .mode(SourceMode::Standalone)
        .hostname("node-a")
        .build()
        .unwrap();

    streamer.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    append(&log, "job 1 error\n");
    tokio::time::sleep(Duration::from_millis(200)).await;
    append(&log, "job 2 error\n");
    tokio::time::sleep(Duration::from_millis(300)).await;

    streamer.stop().await.unwrap();
    collector.assert_async().await;
}

/// 제외 네임스페이스의 워크로드는 tail하지 않음
#[tokio::test]
async fn excluded_namespace_is_never_tailed() {
    let mut server = Server::new_async().await;
    let collector = server
        .mock("POST", "/ingest")
        .expect(0)
        .create_async()
        .await;

    let pods_root = tempfile::tempdir().unwrap();
    let container_dir = pods_root.path().join("kube-system_dns-0_uid-1").join("dns");
    std::fs::create_dir_all(&container_dir).unwrap();
    std::fs::write(container_dir.join("0.log"), "").unwrap();

    let workload = WorkloadInfo {
        namespace: "kube-system".to_owned(),
        name: "dns-0".to_owned(),
        uid: "uid-1".to_owned(),
        labels: BTreeMap::new(),
        containers: vec![ContainerMeta {
            name: "dns".to_owned(),
            image: "coredns:1.11".to_owned(),
            image_id: "sha256:dns".to_owned(),
        }],
    };

    let (tx, rx) = mpsc::channel(8);
    let client = Arc::new(TestWorkloadClient::new(rx));
    client.add_workload(workload.clone()).await;

    let mut config = streamer_config(&server.url(), 1);
    config.pods_root = pods_root.path().display().to_string();
    config.namespaces_to_exclude = vec!["kube-system".to_owned()];
    let mut streamer = StreamerBuilder::new()
        .sink(delivery(&config))
        .config(config)
        .client(client)
        .mode(SourceMode::Orchestrated)
        .hostname("node-b")
        .build()
        .unwrap();

    streamer.start().await.unwrap();
    tx.send(WorkloadEvent::Added(workload)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(streamer.cache().unwrap().is_empty());
    streamer.stop().await.unwrap();
    collector.assert_async().await;
}

/// 워크로드 감시 실패 시 상태 점검은 Degraded
#[tokio::test]
async fn failed_watch_reports_degraded_health() {
    let server = Server::new_async().await;
    let pods_root = tempfile::tempdir().unwrap();

    let (_tx, rx) = mpsc::channel(8);
    let client = Arc::new(TestWorkloadClient::new(rx));

    let mut config = streamer_config(&server.url(), 1);
    config.pods_root = pods_root.path().display().to_string();
    let mut streamer = StreamerBuilder::new()
        .sink(delivery(&config))
        .config(config)
        .client(client)
        .mode(SourceMode::Orchestrated)
        .hostname("node-b")
        .build()
        .unwrap();

    // 첫 구독은 성공, 재시작 후 두 번째 구독은 실패
    streamer.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(streamer.health_check().await.is_healthy());
    streamer.stop().await.unwrap();

    streamer.start().await.unwrap();
    let mut health = streamer.health_check().await;
    for _ in 0..100 {
        if !health.is_healthy() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        health = streamer.health_check().await;
    }
    assert!(matches!(health, HealthStatus::Degraded(_)));

    streamer.stop().await.unwrap();
}
