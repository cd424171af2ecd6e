#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logcurator_core::config::FilterOperator;
use logcurator_log_pipeline::FilterEngine;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 키워드 목록 (최대 16개로 제한)
    keywords: Vec<String>,
    and: bool,
    lines: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    let operator = if input.and {
        FilterOperator::And
    } else {
        FilterOperator::Or
    };
    let keywords: Vec<&String> = input.keywords.iter().take(16).collect();

    // 잘못된 키워드는 에러로 거절되어야 하며 패닉하면 안 됨
    let Ok(engine) = FilterEngine::new(&keywords, operator) else {
        return;
    };

    for line in input.lines.iter().take(32) {
        let _ = engine.matches(line);
    }
});
