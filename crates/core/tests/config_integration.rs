//! logcurator.toml 통합 설정 테스트
//!
//! - logcurator.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use logcurator_core::config::{FilterOperator, LogcuratorConfig, StreamerConfig};
use logcurator_core::error::{ConfigError, LogcuratorError};

// =============================================================================
// logcurator.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let content = include_str!("../../../logcurator.toml.example");
    let config = LogcuratorConfig::parse(content).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");

    assert_eq!(config.streamer.keywords, vec!["error", "5xx"]);
    assert_eq!(config.streamer.namespaces_to_exclude, vec!["kube-system"]);
    assert_eq!(
        config.streamer.filter_operator().unwrap(),
        FilterOperator::Or
    );
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../logcurator.toml.example");
    let config = LogcuratorConfig::parse(content).expect("should parse");
    let defaults = StreamerConfig::default();

    assert_eq!(config.streamer.target_url, defaults.target_url);
    assert_eq!(config.streamer.batch_size, defaults.batch_size);
    assert_eq!(config.streamer.path, defaults.path);
    assert_eq!(config.streamer.pods_root, defaults.pods_root);
    assert_eq!(
        config.streamer.startup_delay_secs,
        defaults.startup_delay_secs
    );
    assert_eq!(config.streamer.max_line_length, defaults.max_line_length);
    assert_eq!(config.metrics.port, 9464);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_streamer_only() {
    let toml = r#"
[streamer]
keywords = ["timeout", "error"]
operator = "and"
batch_size = 3
"#;
    let config = LogcuratorConfig::parse(toml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.general.log_level, "info");
    assert_eq!(
        config.streamer.filter_operator().unwrap(),
        FilterOperator::And
    );
    assert_eq!(config.streamer.effective_batch_size(), 3);
    assert_eq!(config.streamer.path, "/var/log");
}

#[test]
fn empty_string_parses_with_defaults() {
    let config = LogcuratorConfig::parse("").unwrap();
    assert_eq!(config.general.log_format, "json");
    assert!(config.streamer.keywords.is_empty());
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = LogcuratorConfig::parse("[streamer\nkeywords = ");
    assert!(matches!(
        result,
        Err(LogcuratorError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let result = LogcuratorConfig::parse("[streamer]\nbatch_size = \"ten\"");
    assert!(result.is_err());
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[streamer]
keywords = ["error"]

[unknown]
foo = "bar"
"#;
    let config = LogcuratorConfig::parse(toml).unwrap();
    config.validate().unwrap();
}

// =============================================================================
// 환경변수 오버라이드 테스트
// =============================================================================

#[tokio::test]
#[serial_test::serial]
async fn env_override_takes_precedence_over_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logcurator.toml");
    std::fs::write(
        &path,
        "[streamer]\nkeywords = [\"error\"]\nbatch_size = 5\noperator = \"or\"\n",
    )
    .unwrap();

    unsafe {
        std::env::set_var("LOGCURATOR_STREAMER_BATCH_SIZE", "50");
        std::env::set_var("LOGCURATOR_STREAMER_OPERATOR", "and");
        std::env::set_var("LOGCURATOR_STREAMER_KEYWORDS", "error,timeout");
    }

    let result = LogcuratorConfig::load(&path).await;

    unsafe {
        std::env::remove_var("LOGCURATOR_STREAMER_BATCH_SIZE");
        std::env::remove_var("LOGCURATOR_STREAMER_OPERATOR");
        std::env::remove_var("LOGCURATOR_STREAMER_KEYWORDS");
    }

    let config = result.unwrap();
    assert_eq!(config.streamer.batch_size, 50);
    assert_eq!(config.streamer.operator, "and");
    assert_eq!(config.streamer.keywords, vec!["error", "timeout"]);
}

#[tokio::test]
#[serial_test::serial]
async fn load_rejects_invalid_operator_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logcurator.toml");
    std::fs::write(&path, "[streamer]\nkeywords = [\"error\"]\n").unwrap();

    unsafe { std::env::set_var("LOGCURATOR_STREAMER_OPERATOR", "nand") };
    let result = LogcuratorConfig::load(&path).await;
    unsafe { std::env::remove_var("LOGCURATOR_STREAMER_OPERATOR") };

    assert!(matches!(
        result,
        Err(LogcuratorError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[test]
#[serial_test::serial]
fn env_override_namespace_lists() {
    let mut config = LogcuratorConfig::default();
    unsafe {
        std::env::set_var("LOGCURATOR_STREAMER_NAMESPACES_TO_INCLUDE", "prod, staging");
        std::env::set_var("LOGCURATOR_STREAMER_NAMESPACES_TO_EXCLUDE", "kube-system");
    }
    config.apply_env_overrides();
    unsafe {
        std::env::remove_var("LOGCURATOR_STREAMER_NAMESPACES_TO_INCLUDE");
        std::env::remove_var("LOGCURATOR_STREAMER_NAMESPACES_TO_EXCLUDE");
    }

    assert_eq!(config.streamer.namespaces_to_include, vec!["prod", "staging"]);
    assert_eq!(config.streamer.namespaces_to_exclude, vec!["kube-system"]);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = LogcuratorConfig::from_file("/nonexistent/logcurator.toml").await;
    assert!(matches!(
        result,
        Err(LogcuratorError::Config(ConfigError::FileNotFound { .. }))
    ));
}

#[test]
fn serialize_and_reparse_roundtrip() {
    let mut original = LogcuratorConfig::default();
    original.streamer.keywords = vec!["4xx".to_owned(), "error".to_owned()];
    original.streamer.pod_labels_to_include = vec!["app=web".to_owned()];

    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let reparsed = LogcuratorConfig::parse(&toml_str).expect("should reparse");

    assert_eq!(reparsed.streamer.keywords, original.streamer.keywords);
    assert_eq!(
        reparsed.streamer.pod_labels_to_include,
        original.streamer.pod_labels_to_include
    );
}
