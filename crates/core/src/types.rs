//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 소스 식별자([`SourceIdentity`])와 전송 단위 레코드([`Entry`])를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 오케스트레이터 밖에서 수집되는 소스에 붙는 합성 네임스페이스
pub const STANDALONE_NAMESPACE: &str = "non-k8s";

/// 오케스트레이터 밖 소스의 이미지 참조
pub const STANDALONE_IMAGE: &str = "os-native";

/// 오케스트레이터 밖 소스의 이미지 다이제스트
pub const STANDALONE_IMAGE_ID: &str = "n/a";

/// 로그 소스 식별자
///
/// 오케스트레이터 모드에서는 (namespace, workload, container),
/// 독립 실행 모드에서는 (`non-k8s`, hostname, 파일 이름) 삼중항입니다.
/// 메타데이터 캐시의 키로 사용되며 `namespace/workload/container` 형식으로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentity {
    /// 네임스페이스
    pub namespace: String,
    /// 워크로드(pod) 이름
    pub workload: String,
    /// 컨테이너 이름
    pub container: String,
}

impl SourceIdentity {
    /// 새 식별자를 생성합니다.
    pub fn new(
        namespace: impl Into<String>,
        workload: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            workload: workload.into(),
            container: container.into(),
        }
    }

    /// 독립 실행 모드 식별자를 생성합니다.
    pub fn standalone(hostname: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(STANDALONE_NAMESPACE, hostname, file_name)
    }

    /// 캐시 키 (`namespace/workload/container`)
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.workload, self.container)
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.workload, self.container)
    }
}

/// 수집기로 전송되는 로그 레코드 한 건
///
/// 필터를 통과한 라인마다 하나씩 생성되며, 생성 이후 변경되지 않습니다.
/// 직렬화 필드명은 수집기의 와이어 포맷을 따릅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// 네임스페이스
    pub namespace: String,
    /// 워크로드(pod) 이름
    pub pod: String,
    /// 컨테이너 이름
    pub container: String,
    /// 이미지 참조
    pub image: String,
    /// 이미지 다이제스트
    #[serde(rename = "imageId")]
    pub image_id: String,
    /// 원본 로그 페이로드
    pub logs: String,
    /// 수집 호스트
    pub host: String,
}

impl Entry {
    /// 식별자와 메타데이터 스냅샷으로 엔트리를 생성합니다.
    pub fn new(
        identity: &SourceIdentity,
        image: &str,
        image_id: &str,
        logs: impl Into<String>,
        host: &str,
    ) -> Self {
        Self {
            namespace: identity.namespace.clone(),
            pod: identity.workload.clone(),
            container: identity.container.clone(),
            image: image.to_owned(),
            image_id: image_id.to_owned(),
            logs: logs.into(),
            host: host.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_format() {
        let id = SourceIdentity::new("payments", "api-7d9f", "server");
        assert_eq!(id.key(), "payments/api-7d9f/server");
        assert_eq!(id.to_string(), id.key());
    }

    #[test]
    fn standalone_identity_uses_synthetic_namespace() {
        let id = SourceIdentity::standalone("node-1", "syslog.log");
        assert_eq!(id.namespace, STANDALONE_NAMESPACE);
        assert_eq!(id.workload, "node-1");
        assert_eq!(id.container, "syslog.log");
    }

    #[test]
    fn entry_serializes_with_wire_field_names() {
        let id = SourceIdentity::new("default", "web-0", "nginx");
        let entry = Entry::new(&id, "nginx:1.27", "sha256:abc", "GET / 500 error", "node-1");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["namespace"], "default");
        assert_eq!(json["pod"], "web-0");
        assert_eq!(json["container"], "nginx");
        assert_eq!(json["image"], "nginx:1.27");
        assert_eq!(json["imageId"], "sha256:abc");
        assert_eq!(json["logs"], "GET / 500 error");
        assert_eq!(json["host"], "node-1");
        assert!(json.get("image_id").is_none());
    }
}
