//! 배치 버퍼링 -- 엔트리 누적 및 배치 단위 전달
//!
//! [`BatchAccumulator`]는 모든 tailer가 공유하는 단일 버퍼입니다.
//! 엔트리 수가 배치 크기에 도달하면 버퍼를 새 `Vec`으로 교체하고,
//! 꺼낸 배치는 락을 해제한 뒤 [`BatchSink`]로 전달합니다.
//!
//! # 순서
//! 소스 간 전역 순서는 보장하지 않습니다. 한 소스 안에서는 파일 순서를 유지합니다.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use logcurator_core::types::Entry;

/// 배치를 받아 처리하는 대상
///
/// 전송 실패는 구현체 내부에서 기록하고 삼킵니다.
pub trait BatchSink: Send + Sync + 'static {
    /// 배치 하나를 전달합니다.
    fn deliver(&self, batch: Vec<Entry>) -> impl Future<Output = ()> + Send;
}

impl<S: BatchSink> BatchSink for Arc<S> {
    fn deliver(&self, batch: Vec<Entry>) -> impl Future<Output = ()> + Send {
        (**self).deliver(batch)
    }
}

/// 공유 배치 누적기
pub struct BatchAccumulator<S: BatchSink> {
    /// 현재 배치
    entries: Mutex<Vec<Entry>>,
    /// 배치 크기
    batch_size: usize,
    /// 전달 대상
    sink: S,
}

impl<S: BatchSink> BatchAccumulator<S> {
    /// 새 누적기를 생성합니다. 배치 크기 0은 1로 취급합니다.
    pub fn new(batch_size: usize, sink: S) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            entries: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size,
            sink,
        }
    }

    /// 엔트리를 추가합니다.
    ///
    /// 배치가 가득 차면 이 호출자가 배치를 꺼내 전달합니다.
    pub async fn append(&self, entry: Entry) {
        let full = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.push(entry);
            if entries.len() >= self.batch_size {
                Some(std::mem::replace(
                    &mut *entries,
                    Vec::with_capacity(self.batch_size),
                ))
            } else {
                None
            }
        };

        if let Some(batch) = full {
            tracing::debug!(entries = batch.len(), "batch full, delivering");
            self.sink.deliver(batch).await;
        }
    }

    /// 버퍼에 남은 엔트리를 모두 전달합니다. 비어있으면 아무것도 하지 않습니다.
    pub async fn flush(&self) {
        let pending = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.is_empty() {
                return;
            }
            std::mem::replace(&mut *entries, Vec::with_capacity(self.batch_size))
        };

        tracing::debug!(entries = pending.len(), "flushing partial batch");
        self.sink.deliver(pending).await;
    }

    /// 현재 버퍼된 엔트리 수
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 배치 크기
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 전달 대상
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
