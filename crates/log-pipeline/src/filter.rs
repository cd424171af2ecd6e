//! 키워드 필터 -- 라인 수용 여부 판정 및 정규식 사전 컴파일
//!
//! [`FilterEngine`]은 설정된 키워드와 연산자로 한 라인을 전송할지 결정합니다.
//! 모든 정규식은 생성 시 한 번만 컴파일합니다.
//!
//! # 예약 키워드
//! - `4xx`: 400-418, 421, 423-429, 431, 451 상태 코드 탐지
//! - `5xx`: 500-508, 511 상태 코드 탐지
//!
//! 상태 코드는 구분된 토큰이어야 합니다. 앞에 공백이 있고 뒤에 공백이나 쉼표가 오는 경우,
//! 작은따옴표나 큰따옴표로 감싼 경우, `: ` 뒤에 오는 경우만 인정합니다.
//! 상태 코드가 `failed` 또는 `error`와 함께 나타나면 연산자와 무관하게 수용합니다.

use regex::{Regex, RegexBuilder};

use logcurator_core::config::{FilterOperator, StreamerConfig};

use crate::error::LogPipelineError;

/// 4xx 상태 코드 (400-418, 421, 423-429, 431, 451)
const CLIENT_ERROR_CODES: &str = "4(?:0[0-9]|1[0-8]|2[13-9]|31|51)";

/// 5xx 상태 코드 (500-508, 511)
const SERVER_ERROR_CODES: &str = "5(?:0[0-8]|11)";

/// 예약 키워드
const RESERVED_4XX: &str = "4xx";
const RESERVED_5XX: &str = "5xx";

/// 구분된 상태 코드 토큰 패턴을 만듭니다.
fn status_token_pattern(codes: &str) -> String {
    format!(r#"(?: {codes}[ ,]|'{codes}'|"{codes}"|: {codes},?)"#)
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// 키워드 필터 엔진
///
/// 생성 후에는 불변이며 여러 tailer가 `Arc`로 공유합니다.
#[derive(Debug)]
pub struct FilterEngine {
    operator: FilterOperator,
    failed: Regex,
    error: Regex,
    client_errors: Option<Regex>,
    server_errors: Option<Regex>,
    keywords: Vec<Regex>,
    combined: Regex,
}

impl FilterEngine {
    /// 키워드 목록과 연산자로 필터를 생성합니다.
    ///
    /// 키워드가 없거나 공백뿐인 키워드가 있으면 에러를 반환합니다.
    pub fn new<S: AsRef<str>>(
        keywords: &[S],
        operator: FilterOperator,
    ) -> Result<Self, LogPipelineError> {
        if keywords.is_empty() {
            return Err(LogPipelineError::Filter {
                keyword: String::new(),
                reason: "nothing to look for in logs, at least one keyword is required".to_owned(),
            });
        }

        let mut client_errors = None;
        let mut server_errors = None;
        let mut plain = Vec::new();
        let mut alternatives = Vec::new();

        for keyword in keywords {
            let keyword = keyword.as_ref();
            if keyword.trim().is_empty() {
                return Err(LogPipelineError::Filter {
                    keyword: keyword.to_owned(),
                    reason: "blank keyword".to_owned(),
                });
            }

            if keyword.eq_ignore_ascii_case(RESERVED_4XX) {
                if client_errors.is_none() {
                    let pattern = status_token_pattern(CLIENT_ERROR_CODES);
                    client_errors = Some(Regex::new(&pattern)?);
                    alternatives.push(pattern);
                }
                continue;
            }
            if keyword.eq_ignore_ascii_case(RESERVED_5XX) {
                if server_errors.is_none() {
                    let pattern = status_token_pattern(SERVER_ERROR_CODES);
                    server_errors = Some(Regex::new(&pattern)?);
                    alternatives.push(pattern);
                }
                continue;
            }

            let escaped = regex::escape(keyword);
            plain.push(case_insensitive(&escaped)?);
            alternatives.push(format!("(?i:{escaped})"));
        }

        let combined = Regex::new(&alternatives.join("|"))?;

        Ok(Self {
            operator,
            failed: case_insensitive("failed")?,
            error: case_insensitive("error")?,
            client_errors,
            server_errors,
            keywords: plain,
            combined,
        })
    }

    /// 스트리머 설정에서 필터를 생성합니다.
    pub fn from_config(config: &StreamerConfig) -> Result<Self, LogPipelineError> {
        let operator = config
            .filter_operator()
            .map_err(|e| LogPipelineError::Config {
                field: "streamer.operator".to_owned(),
                reason: e.to_string(),
            })?;
        Self::new(config.keywords.as_slice(), operator)
    }

    /// 라인을 수용할지 판정합니다.
    pub fn matches(&self, line: &str) -> bool {
        if line.is_empty() || !self.combined.is_match(line) {
            return false;
        }

        if self.status_with_failure(self.client_errors.as_ref(), line)
            || self.status_with_failure(self.server_errors.as_ref(), line)
        {
            return true;
        }

        match self.operator {
            FilterOperator::And => {
                !self.keywords.is_empty() && self.keywords.iter().all(|re| re.is_match(line))
            }
            FilterOperator::Or => self.keywords.iter().any(|re| re.is_match(line)),
        }
    }

    /// 상태 코드가 있고 `failed` 또는 `error`도 함께 있는지 확인합니다.
    fn status_with_failure(&self, detector: Option<&Regex>, line: &str) -> bool {
        detector.is_some_and(|re| re.is_match(line))
            && (self.failed.is_match(line) || self.error.is_match(line))
    }

    /// 연산자
    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    /// 예약 키워드를 제외한 키워드 수
    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    /// 4xx 탐지기가 활성화되어 있는지 확인합니다.
    pub fn detects_client_errors(&self) -> bool {
        self.client_errors.is_some()
    }

    /// 5xx 탐지기가 활성화되어 있는지 확인합니다.
    pub fn detects_server_errors(&self) -> bool {
        self.server_errors.is_some()
    }
}
