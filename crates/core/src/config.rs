//! 설정 관리 — logcurator.toml 파싱 및 런타임 설정
//!
//! [`LogcuratorConfig`]는 데몬의 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGCURATOR_STREAMER_BATCH_SIZE=50` 형식)
//! 3. 설정 파일 (`logcurator.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logcurator_core::error::LogcuratorError> {
//! use logcurator_core::config::LogcuratorConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogcuratorConfig::load("logcurator.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogcuratorConfig::parse("[streamer]\nkeywords = [\"error\"]")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogcuratorError};

/// 배치 크기가 0으로 설정된 경우 사용하는 값
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// 기본 수집기 엔드포인트
pub const DEFAULT_TARGET_URL: &str = "https://dev.api.manifestit.tech/curated_log_streamer";

/// kubelet이 pod 로그를 남기는 고정 루트
pub const DEFAULT_PODS_ROOT: &str = "/var/log/pods";

/// logcurator 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogcuratorConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스트리머 설정
    #[serde(default)]
    pub streamer: StreamerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogcuratorConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogcuratorError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    ///
    /// 키워드 등은 CLI나 환경변수로 채워질 수 있으므로 검증은 병합이 끝난 뒤 수행합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogcuratorError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogcuratorError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogcuratorError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogcuratorError> {
        toml::from_str(toml_str).map_err(|e| {
            LogcuratorError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGCURATOR_{SECTION}_{FIELD}`
    /// 목록 필드는 쉼표로 구분합니다 (`LOGCURATOR_STREAMER_KEYWORDS=error,5xx`).
    /// 항목 안의 쉼표는 `\,`로 씁니다 (`connection refused\, retrying`).
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGCURATOR_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGCURATOR_GENERAL_LOG_FORMAT");

        // Streamer
        let s = &mut self.streamer;
        override_string(&mut s.target_url, "LOGCURATOR_STREAMER_TARGET_URL");
        override_string(&mut s.operator, "LOGCURATOR_STREAMER_OPERATOR");
        override_csv(
            &mut s.namespaces_to_include,
            "LOGCURATOR_STREAMER_NAMESPACES_TO_INCLUDE",
        );
        override_csv(
            &mut s.namespaces_to_exclude,
            "LOGCURATOR_STREAMER_NAMESPACES_TO_EXCLUDE",
        );
        override_csv(
            &mut s.pod_labels_to_include,
            "LOGCURATOR_STREAMER_POD_LABELS_TO_INCLUDE",
        );
        override_csv(&mut s.keywords, "LOGCURATOR_STREAMER_KEYWORDS");
        override_usize(&mut s.batch_size, "LOGCURATOR_STREAMER_BATCH_SIZE");
        override_string(
            &mut s.configuration_id,
            "LOGCURATOR_STREAMER_CONFIGURATION_ID",
        );
        override_string(&mut s.organisation_id, "LOGCURATOR_STREAMER_ORGANISATION_ID");
        override_string(&mut s.subscription_id, "LOGCURATOR_STREAMER_SUBSCRIPTION_ID");
        override_string(&mut s.encryption_key, "LOGCURATOR_STREAMER_ENCRYPTION_KEY");
        override_string(&mut s.auth_token, "LOGCURATOR_STREAMER_AUTH_TOKEN");
        override_string(&mut s.path, "LOGCURATOR_STREAMER_PATH");
        override_string(&mut s.pods_root, "LOGCURATOR_STREAMER_PODS_ROOT");
        override_u64(
            &mut s.startup_delay_secs,
            "LOGCURATOR_STREAMER_STARTUP_DELAY_SECS",
        );
        override_u64(&mut s.poll_interval_ms, "LOGCURATOR_STREAMER_POLL_INTERVAL_MS");
        override_u64(
            &mut s.sync_timeout_secs,
            "LOGCURATOR_STREAMER_SYNC_TIMEOUT_SECS",
        );
        override_u64(
            &mut s.shutdown_timeout_secs,
            "LOGCURATOR_STREAMER_SHUTDOWN_TIMEOUT_SECS",
        );
        override_u64(
            &mut s.delivery_timeout_secs,
            "LOGCURATOR_STREAMER_DELIVERY_TIMEOUT_SECS",
        );
        override_usize(&mut s.max_sources, "LOGCURATOR_STREAMER_MAX_SOURCES");
        override_usize(
            &mut s.max_line_length,
            "LOGCURATOR_STREAMER_MAX_LINE_LENGTH",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGCURATOR_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGCURATOR_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGCURATOR_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogcuratorError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.streamer.validate()?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "port must be non-zero when metrics are enabled",
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 키워드 결합 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOperator {
    /// 하나라도 일치하면 수락
    #[default]
    Or,
    /// 모두 일치해야 수락
    And,
}

impl FromStr for FilterOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "or" => Ok(Self::Or),
            "and" => Ok(Self::And),
            other => Err(ConfigError::InvalidValue {
                field: "streamer.operator".to_owned(),
                reason: format!("unknown operator '{other}', must be one of: or, and"),
            }),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Or => write!(f, "or"),
            Self::And => write!(f, "and"),
        }
    }
}

/// 스트리머 설정
///
/// 소스 발견, 필터, 배치, 전송에 필요한 모든 값을 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// 수집기 엔드포인트 (scheme, host 포함 절대 URL)
    pub target_url: String,
    /// 키워드 결합 연산자 (or, and)
    pub operator: String,
    /// 수집할 네임스페이스 (비어있으면 전체)
    pub namespaces_to_include: Vec<String>,
    /// 제외할 네임스페이스 (포함 목록보다 우선)
    pub namespaces_to_exclude: Vec<String>,
    /// 수집할 pod 레이블 (`key=value`, 하나라도 일치하면 수집)
    pub pod_labels_to_include: Vec<String>,
    /// 키워드 목록 (`4xx`, `5xx`는 상태 코드 탐지기)
    pub keywords: Vec<String>,
    /// 배치 크기 (0이면 기본값 10)
    pub batch_size: usize,
    /// 설정 ID
    pub configuration_id: String,
    /// 조직 ID (`Mit-Org-ID` 헤더)
    pub organisation_id: String,
    /// 구독 ID (`Mit-Subscription-ID` 헤더)
    pub subscription_id: String,
    /// 페이로드 암호화 키 (예약됨)
    pub encryption_key: String,
    /// 인증 토큰 (예약됨)
    pub auth_token: String,
    /// 독립 실행 모드의 탐색 루트
    pub path: String,
    /// 오케스트레이터 모드의 pod 로그 루트
    pub pods_root: String,
    /// 오케스트레이터 모드에서 파일을 열기 전 대기 시간 (초)
    pub startup_delay_secs: u64,
    /// tail 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 초기 워크로드 동기화 대기 시간 (초)
    pub sync_timeout_secs: u64,
    /// 종료 시 tailer 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
    /// 배치 전송 타임아웃 (초)
    pub delivery_timeout_secs: u64,
    /// 동시 tail 소스 상한 (0이면 무제한)
    pub max_sources: usize,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_owned(),
            operator: "or".to_owned(),
            namespaces_to_include: Vec::new(),
            namespaces_to_exclude: Vec::new(),
            pod_labels_to_include: Vec::new(),
            keywords: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            configuration_id: String::new(),
            organisation_id: String::new(),
            subscription_id: String::new(),
            encryption_key: String::new(),
            auth_token: String::new(),
            path: "/var/log".to_owned(),
            pods_root: DEFAULT_PODS_ROOT.to_owned(),
            startup_delay_secs: 5,
            poll_interval_ms: 250,
            sync_timeout_secs: 60,
            shutdown_timeout_secs: 10,
            delivery_timeout_secs: 10,
            max_sources: 0,
            max_line_length: 64 * 1024,
        }
    }
}

impl StreamerConfig {
    /// 0을 기본값으로 치환한 배치 크기
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }

    /// 검증된 연산자
    pub fn filter_operator(&self) -> Result<FilterOperator, ConfigError> {
        self.operator.parse()
    }

    /// 스트리머 섹션을 검증합니다.
    pub fn validate(&self) -> Result<(), LogcuratorError> {
        if self.keywords.is_empty() {
            return Err(invalid(
                "streamer.keywords",
                "nothing to look for in logs, at least one keyword is required",
            ));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(invalid("streamer.keywords", "keywords must not be blank"));
        }

        self.filter_operator()?;

        let url = url::Url::parse(&self.target_url)
            .map_err(|e| invalid("streamer.target_url", format!("invalid url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(
                "streamer.target_url",
                format!("unsupported scheme '{}', expected http or https", url.scheme()),
            ));
        }

        for label in &self.pod_labels_to_include {
            match label.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(invalid(
                        "streamer.pod_labels_to_include",
                        format!("'{label}' must have the form key=value"),
                    ));
                }
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid(
                "streamer.poll_interval_ms",
                "poll interval must be greater than 0",
            ));
        }
        if self.max_line_length == 0 {
            return Err(invalid(
                "streamer.max_line_length",
                "max line length must be greater than 0",
            ));
        }
        if self.delivery_timeout_secs == 0 {
            return Err(invalid(
                "streamer.delivery_timeout_secs",
                "delivery timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LogcuratorError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = split_list(&val);
    }
}

/// 쉼표로 구분된 목록을 나눕니다. `\,`는 항목 안의 쉼표입니다.
fn split_list(val: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = val.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
