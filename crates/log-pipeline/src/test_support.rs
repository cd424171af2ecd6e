//! 단위 테스트 공용 도우미

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use logcurator_core::types::Entry;
use logcurator_workload::{WorkloadClient, WorkloadError, WorkloadEvent, WorkloadInfo};

use crate::buffer::BatchSink;

/// 전달된 배치를 기록하는 sink
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Entry>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<Entry>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.batches().into_iter().flatten().collect()
    }
}

impl BatchSink for RecordingSink {
    async fn deliver(&self, batch: Vec<Entry>) {
        self.batches.lock().unwrap().push(batch);
    }
}

/// 고정된 워크로드 목록과 이벤트 스크립트를 가진 클라이언트
#[derive(Default)]
pub struct StaticWorkloadClient {
    workloads: Vec<WorkloadInfo>,
    events: Mutex<Vec<WorkloadEvent>>,
}

impl StaticWorkloadClient {
    pub fn with_workloads(mut self, workloads: Vec<WorkloadInfo>) -> Self {
        self.workloads = workloads;
        self
    }

    pub fn with_events(self, events: Vec<WorkloadEvent>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }
}

impl WorkloadClient for StaticWorkloadClient {
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadInfo, WorkloadError> {
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
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        let (tx, rx) = mpsc::channel(events.len().max(1));
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            shutdown.cancelled().await;
        });
        Ok(rx)
    }
}
