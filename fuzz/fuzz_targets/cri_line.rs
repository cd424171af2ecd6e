#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;

use logcurator_log_pipeline::tailer::parse_pod_log_path;
use logcurator_log_pipeline::strip_cri_prefix;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // 결과는 항상 입력의 접미사
    let payload = strip_cri_prefix(text);
    assert!(text.ends_with(payload));

    let _ = parse_pod_log_path(Path::new(text));
});
