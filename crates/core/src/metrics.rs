//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logcurator_`
//! - 모듈명: `log_pipeline_`, `delivery_`, `workload_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 워크로드 이벤트 종류 레이블 키 (added, removed, synced)
pub const LABEL_EVENT_KIND: &str = "kind";

/// 소스 거부 사유 레이블 키 (policy, metadata, open, capacity)
pub const LABEL_REASON: &str = "reason";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// Log Pipeline: tail로 읽은 전체 라인 수 (counter)
pub const LOG_PIPELINE_LINES_READ_TOTAL: &str = "logcurator_log_pipeline_lines_read_total";

/// Log Pipeline: 필터를 통과한 라인 수 (counter)
pub const LOG_PIPELINE_LINES_MATCHED_TOTAL: &str = "logcurator_log_pipeline_lines_matched_total";

/// Log Pipeline: 현재 tail 중인 소스 수 (gauge)
pub const LOG_PIPELINE_SOURCES_ACTIVE: &str = "logcurator_log_pipeline_sources_active";

/// Log Pipeline: 시작 전에 거부된 소스 수 (counter, label: reason)
pub const LOG_PIPELINE_SOURCES_REJECTED_TOTAL: &str =
    "logcurator_log_pipeline_sources_rejected_total";

// ─── Delivery 메트릭 ────────────────────────────────────────────────

/// Delivery: 전송 시도한 배치 수 (counter, label: result)
pub const DELIVERY_BATCHES_TOTAL: &str = "logcurator_delivery_batches_total";

/// Delivery: 수집기가 수락한 엔트리 수 (counter)
pub const DELIVERY_ENTRIES_SENT_TOTAL: &str = "logcurator_delivery_entries_sent_total";

/// Delivery: 배치 전송 지연 시간 (histogram, 초)
pub const DELIVERY_DURATION_SECONDS: &str = "logcurator_delivery_duration_seconds";

// ─── Workload 메트릭 ────────────────────────────────────────────────

/// Workload: 수신한 워크로드 이벤트 수 (counter, label: kind)
pub const WORKLOAD_EVENTS_TOTAL: &str = "logcurator_workload_events_total";

/// Workload: 메타데이터 캐시 미스로 인한 API 조회 수 (counter, label: result)
pub const WORKLOAD_METADATA_FETCHES_TOTAL: &str = "logcurator_workload_metadata_fetches_total";

/// Workload: 캐시된 소스 수 (gauge)
pub const WORKLOAD_CACHED_SOURCES: &str = "logcurator_workload_cached_sources";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logcurator_daemon_uptime_seconds";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        LOG_PIPELINE_LINES_READ_TOTAL,
        "Total number of lines read from all tailed sources"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_MATCHED_TOTAL,
        "Total number of lines accepted by the filter"
    );
    describe_gauge!(
        LOG_PIPELINE_SOURCES_ACTIVE,
        "Number of sources currently being tailed"
    );
    describe_counter!(
        LOG_PIPELINE_SOURCES_REJECTED_TOTAL,
        "Sources skipped before tailing, by reason"
    );

    describe_counter!(
        DELIVERY_BATCHES_TOTAL,
        "Batches posted to the collector, by result"
    );
    describe_counter!(
        DELIVERY_ENTRIES_SENT_TOTAL,
        "Entries accepted by the collector"
    );
    describe_histogram!(
        DELIVERY_DURATION_SECONDS,
        "Time to post a single batch in seconds"
    );

    describe_counter!(
        WORKLOAD_EVENTS_TOTAL,
        "Workload watch events received, by kind"
    );
    describe_counter!(
        WORKLOAD_METADATA_FETCHES_TOTAL,
        "Workload metadata point lookups after a cache miss, by result"
    );
    describe_gauge!(
        WORKLOAD_CACHED_SOURCES,
        "Number of sources held in the metadata cache"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "logcurator daemon uptime in seconds");
}
