//! 메타데이터 캐시 -- 소스별 이미지 정보와 취소 핸들 관리
//!
//! [`MetadataCache`]는 오케스트레이터 모드에서 컨테이너 단위 소스의
//! 이미지 메타데이터와 [`SourceHandle`]을 보관합니다.
//!
//! - 디스커버리 컨트롤러가 새 워크로드를 발견하면 [`MetadataCache::try_track`]으로 선등록
//! - 테일러는 [`MetadataCache::lookup_or_fetch`]로 조회하고, 없으면 API에서 가져와 등록
//! - 워크로드가 삭제되면 [`MetadataCache::remove_and_cancel`]로 제거 후 테일러 취소
//! - 테일러가 스스로 종료하면 [`MetadataCache::remove_if_owned`]로 자기 항목만 제거

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logcurator_core::metrics as m;
use logcurator_core::types::SourceIdentity;

use crate::client::WorkloadClient;
use crate::event::{ContainerMeta, WorkloadInfo};
use crate::policy::SourcePolicy;

/// 한 소스의 모든 tailer가 공유하는 취소 핸들
///
/// 복제해도 같은 핸들을 공유합니다. `cancel`은 최대 한 번만 동작합니다.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    token: CancellationToken,
    fired: AtomicBool,
}

impl SourceHandle {
    /// 주어진 토큰을 감싸는 핸들을 생성합니다.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                token,
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// 소스를 취소합니다. 처음 호출일 때만 `true`를 반환합니다.
    pub fn cancel(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.token.cancel();
        true
    }

    /// 취소되었는지 확인합니다 (부모 토큰 취소 포함).
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// 취소될 때까지 대기합니다.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// 내부 토큰 참조
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// 두 핸들이 같은 소스를 가리키는지 확인합니다.
    pub fn same_source(&self, other: &SourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// 캐시 항목
#[derive(Debug, Clone)]
pub struct CachedMetadata {
    /// 소스 식별자
    pub identity: SourceIdentity,
    /// 이미지 참조
    pub image: String,
    /// 이미지 다이제스트
    pub image_id: String,
    /// 소스 취소 핸들
    pub handle: SourceHandle,
}

/// 소스별 메타데이터 캐시
///
/// 키는 [`SourceIdentity::key`] 형식(`namespace/workload/container`)입니다.
pub struct MetadataCache<C: WorkloadClient> {
    entries: DashMap<String, CachedMetadata>,
    client: Arc<C>,
    policy: Arc<SourcePolicy>,
}

impl<C: WorkloadClient> MetadataCache<C> {
    /// 새 캐시를 생성합니다.
    pub fn new(client: Arc<C>, policy: Arc<SourcePolicy>) -> Self {
        Self {
            entries: DashMap::new(),
            client,
            policy,
        }
    }

    /// 워크로드 클라이언트
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// 소스 정책
    pub fn policy(&self) -> &Arc<SourcePolicy> {
        &self.policy
    }

    /// 이미지 정보를 조회하고, 없으면 API에서 가져와 등록합니다.
    ///
    /// 새로 등록하는 경우 호출자의 `handle`이 저장됩니다.
    /// 워크로드가 정책에 맞지 않거나 컨테이너가 없거나 API 호출이 실패하면 `None`을 반환합니다.
    pub async fn lookup_or_fetch(
        &self,
        identity: &SourceIdentity,
        handle: &SourceHandle,
    ) -> Option<(String, String)> {
        let key = identity.key();
        let cached = self
            .entries
            .get(&key)
            .map(|entry| (entry.image.clone(), entry.image_id.clone()));
        if cached.is_some() {
            return cached;
        }

        let workload = match self
            .client
            .get_workload(&identity.namespace, &identity.workload)
            .await
        {
            Ok(workload) => {
                metrics::counter!(m::WORKLOAD_METADATA_FETCHES_TOTAL, m::LABEL_RESULT => "ok")
                    .increment(1);
                workload
            }
            Err(e) => {
                metrics::counter!(m::WORKLOAD_METADATA_FETCHES_TOTAL, m::LABEL_RESULT => "error")
                    .increment(1);
                warn!(source = %identity, error = %e, "failed to fetch workload metadata");
                return None;
            }
        };

        if !self
            .policy
            .admits(&workload.namespace, Some(&workload.labels))
        {
            debug!(source = %identity, "workload rejected by source policy");
            return None;
        }

        let Some(container) = workload.container(&identity.container) else {
            debug!(source = %identity, "container not present in workload status");
            return None;
        };

        let entry = self.entries.entry(key).or_insert_with(|| CachedMetadata {
            identity: identity.clone(),
            image: container.image.clone(),
            image_id: container.image_id.clone(),
            handle: handle.clone(),
        });
        let found = (entry.image.clone(), entry.image_id.clone());
        drop(entry);
        self.record_size();
        Some(found)
    }

    /// 항목을 등록합니다. 기존 항목이 있으면 교체하고 이전 항목을 반환합니다.
    pub fn insert(&self, metadata: CachedMetadata) -> Option<CachedMetadata> {
        let previous = self.entries.insert(metadata.identity.key(), metadata);
        self.record_size();
        previous
    }

    /// 컨테이너 소스를 등록하고 새 핸들을 반환합니다.
    ///
    /// 이미 추적 중이면 `None`을 반환하고 기존 항목을 그대로 둡니다.
    /// 새 핸들의 토큰은 `parent`의 자식 토큰입니다.
    pub fn try_track(
        &self,
        identity: SourceIdentity,
        container: &ContainerMeta,
        parent: &CancellationToken,
    ) -> Option<SourceHandle> {
        let handle = match self.entries.entry(identity.key()) {
            Entry::Occupied(_) => {
                debug!(source = %identity, "source already tracked");
                return None;
            }
            Entry::Vacant(slot) => {
                let handle = SourceHandle::new(parent.child_token());
                slot.insert(CachedMetadata {
                    identity,
                    image: container.image.clone(),
                    image_id: container.image_id.clone(),
                    handle: handle.clone(),
                });
                handle
            }
        };
        self.record_size();
        Some(handle)
    }

    /// 항목을 제거하고 핸들을 취소합니다.
    pub fn remove_and_cancel(&self, identity: &SourceIdentity) -> bool {
        let removed = self.entries.remove(&identity.key());
        self.record_size();
        match removed {
            Some((_, metadata)) => {
                metadata.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// 워크로드의 모든 컨테이너 항목을 제거하고 취소합니다.
    pub fn untrack_workload(&self, workload: &WorkloadInfo) -> usize {
        workload
            .containers
            .iter()
            .filter(|c| {
                self.remove_and_cancel(&SourceIdentity::new(
                    &workload.namespace,
                    &workload.name,
                    &c.name,
                ))
            })
            .count()
    }

    /// 항목이 `handle` 소유일 때만 제거합니다.
    pub fn remove_if_owned(&self, identity: &SourceIdentity, handle: &SourceHandle) -> bool {
        let removed = self
            .entries
            .remove_if(&identity.key(), |_, metadata| {
                metadata.handle.same_source(handle)
            })
            .is_some();
        if removed {
            self.record_size();
        }
        removed
    }

    /// 항목이 있는지 확인합니다.
    pub fn contains(&self, identity: &SourceIdentity) -> bool {
        self.entries.contains_key(&identity.key())
    }

    /// 항목을 복제하여 반환합니다.
    pub fn get(&self, identity: &SourceIdentity) -> Option<CachedMetadata> {
        self.entries.get(&identity.key()).map(|e| e.value().clone())
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 모든 항목을 제거하고 취소합니다.
    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, metadata)) = self.entries.remove(&key) {
                metadata.handle.cancel();
            }
        }
        self.record_size();
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_size(&self) {
        metrics::gauge!(m::WORKLOAD_CACHED_SOURCES).set(self.entries.len() as f64);
    }
}
