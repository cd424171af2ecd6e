//! 소스 정책 -- 네임스페이스 및 레이블 기반 수집 대상 판정
//!
//! [`SourcePolicy`]는 어떤 워크로드의 로그를 수집할지 결정합니다.
//! 제외 목록이 포함 목록보다 먼저 평가됩니다.

use std::collections::BTreeMap;

use logcurator_core::config::StreamerConfig;

/// 수집 대상 판정 정책
///
/// - `namespaces_to_exclude`에 있는 네임스페이스는 항상 거부
/// - `namespaces_to_include`가 비어있지 않으면 그 안에 있어야 허용
/// - `pod_labels_to_include`가 비어있지 않으면 하나 이상의 `key=value`가 일치해야 허용
///   (레이블이 하나도 없는 워크로드는 레이블 판정을 건너뜀)
#[derive(Debug, Clone, Default)]
pub struct SourcePolicy {
    include: Vec<String>,
    exclude: Vec<String>,
    labels: Vec<(String, String)>,
}

impl SourcePolicy {
    /// 설정에서 정책을 생성합니다.
    ///
    /// `key=value` 형식이 아닌 레이블 항목은 무시됩니다. 설정 검증 단계에서 이미 걸러집니다.
    pub fn from_config(config: &StreamerConfig) -> Self {
        Self::new(
            config.namespaces_to_include.clone(),
            config.namespaces_to_exclude.clone(),
            &config.pod_labels_to_include,
        )
    }

    /// 목록에서 직접 정책을 생성합니다.
    pub fn new(include: Vec<String>, exclude: Vec<String>, labels: &[String]) -> Self {
        let labels = labels
            .iter()
            .filter_map(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
            })
            .collect();
        Self {
            include,
            exclude,
            labels,
        }
    }

    /// 네임스페이스만으로 판정합니다.
    pub fn admits_namespace(&self, namespace: &str) -> bool {
        if self.exclude.iter().any(|ns| ns == namespace) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|ns| ns == namespace)
    }

    /// 레이블로 판정합니다.
    ///
    /// 레이블이 없는 워크로드는 레이블 필터와 무관하게 허용됩니다.
    pub fn admits_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.labels.is_empty() || labels.is_empty() {
            return true;
        }
        self.labels
            .iter()
            .any(|(key, value)| labels.get(key).is_some_and(|v| v == value))
    }

    /// 네임스페이스와 레이블을 모두 판정합니다.
    ///
    /// `labels`가 `None`이면 레이블 개념이 없는 소스(단독 호스트)로 보고 레이블 판정을 건너뜁니다.
    pub fn admits(&self, namespace: &str, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.admits_namespace(namespace) && labels.is_none_or(|l| self.admits_labels(l))
    }

    /// 레이블 필터가 설정되어 있는지 확인합니다.
    pub fn has_label_filter(&self) -> bool {
        !self.labels.is_empty()
    }
}
