//! 파일 tail -- 추가되는 라인을 폴링으로 따라 읽기
//!
//! [`FileTail`]은 파일 끝에서 시작하여 새로 기록되는 라인을 하나씩 반환합니다.
//! `tail -F`와 유사한 동작을 비동기 방식으로 구현합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate, kubelet 로그 교체 등): 새 파일을 처음부터 다시 읽음
//! - 파일 크기 축소 감지 (truncation): 처음으로 되감음
//! - 경로가 잠시 사라져도 다시 나타날 때까지 대기

use std::collections::VecDeque;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::debug;

use logcurator_core::config::StreamerConfig;

use crate::error::LogPipelineError;

/// tail 설정
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// EOF에서 파일 상태를 다시 확인하는 주기
    pub poll_interval: Duration,
    /// 최대 라인 길이 (바이트). 초과하는 라인은 나뉘어 반환됩니다.
    pub max_line_length: usize,
}

impl TailConfig {
    /// 스트리머 설정에서 tail 설정을 만듭니다.
    pub fn from_streamer(config: &StreamerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_line_length: config.max_line_length,
        }
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            max_line_length: 64 * 1024,
        }
    }
}

/// 파일 tail
pub struct FileTail {
    path: PathBuf,
    config: TailConfig,
    reader: Option<BufReader<File>>,
    /// 현재 파일에서의 읽기 위치 (바이트 오프셋)
    position: u64,
    /// 현재 파일의 inode (Unix 전용)
    inode: Option<u64>,
    /// 아직 개행을 만나지 못한 바이트
    partial: Vec<u8>,
    /// 반환 대기 중인 완성 라인
    ready: VecDeque<String>,
}

impl FileTail {
    /// 파일을 열고 끝으로 이동합니다.
    ///
    /// 파일이 없거나 열 수 없으면 에러를 반환합니다.
    pub async fn open(path: impl AsRef<Path>, config: TailConfig) -> Result<Self, LogPipelineError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await.map_err(|e| tail_error(&path, &e))?;
        let metadata = file.metadata().await.map_err(|e| tail_error(&path, &e))?;
        let position = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| tail_error(&path, &e))?;

        debug!(path = %path.display(), position, "tail opened at end of file");

        Ok(Self {
            path,
            config,
            reader: Some(BufReader::new(file)),
            position,
            inode: inode_of(&metadata),
            partial: Vec::new(),
            ready: VecDeque::new(),
        })
    }

    /// 대상 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 읽기 위치
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 다음 라인을 반환합니다. 새 라인이 기록될 때까지 대기합니다.
    ///
    /// 반환되는 라인에는 끝의 `\n`, `\r\n`이 포함되지 않습니다.
    /// 유효하지 않은 UTF-8 바이트는 대체 문자로 바뀝니다.
    pub async fn next_line(&mut self) -> Result<String, LogPipelineError> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(line);
            }

            let Some(reader) = self.reader.as_mut() else {
                self.reopen_when_present().await?;
                continue;
            };

            let max = self.config.max_line_length.max(1);
            let limit = (max + 1).saturating_sub(self.partial.len()).max(1) as u64;
            let read = (&mut *reader)
                .take(limit)
                .read_until(b'\n', &mut self.partial)
                .await
                .map_err(|e| tail_error(&self.path, &e))?;
            self.position += read as u64;

            if self.partial.last() == Some(&b'\n') {
                self.complete_line();
                continue;
            }
            if self.partial.len() >= max {
                let rest = self.partial.split_off(max);
                self.complete_line();
                self.partial = rest;
                continue;
            }
            if read > 0 {
                continue;
            }

            self.check_rotation().await?;
        }
    }

    /// 버퍼된 바이트를 완성 라인으로 옮깁니다.
    fn complete_line(&mut self) {
        let mut bytes = std::mem::take(&mut self.partial);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        self.ready
            .push_back(String::from_utf8_lossy(&bytes).into_owned());
    }

    /// EOF에서 로테이션과 truncation을 확인하고, 변화가 없으면 폴링 주기만큼 대기합니다.
    async fn check_rotation(&mut self) -> Result<(), LogPipelineError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => {
                let inode = inode_of(&metadata);
                if inode.is_some() && inode != self.inode {
                    debug!(path = %self.path.display(), "file replaced, reopening from start");
                    if !self.partial.is_empty() {
                        self.complete_line();
                    }
                    self.reader = None;
                    return self.reopen_when_present().await;
                }
                if metadata.len() < self.position {
                    debug!(
                        path = %self.path.display(),
                        size = metadata.len(),
                        position = self.position,
                        "file truncated, rewinding"
                    );
                    self.partial.clear();
                    if let Some(reader) = self.reader.as_mut() {
                        reader
                            .seek(SeekFrom::Start(0))
                            .await
                            .map_err(|e| tail_error(&self.path, &e))?;
                    }
                    self.position = 0;
                    return Ok(());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(tail_error(&self.path, &e)),
        }

        tokio::time::sleep(self.config.poll_interval).await;
        Ok(())
    }

    /// 경로가 존재하면 처음부터 다시 열고, 없으면 폴링 주기만큼 대기합니다.
    async fn reopen_when_present(&mut self) -> Result<(), LogPipelineError> {
        match File::open(&self.path).await {
            Ok(file) => {
                let metadata = file
                    .metadata()
                    .await
                    .map_err(|e| tail_error(&self.path, &e))?;
                self.inode = inode_of(&metadata);
                self.position = 0;
                self.partial.clear();
                self.reader = Some(BufReader::new(file));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tokio::time::sleep(self.config.poll_interval).await;
                Ok(())
            }
            Err(e) => Err(tail_error(&self.path, &e)),
        }
    }
}

fn tail_error(path: &Path, err: &io::Error) -> LogPipelineError {
    LogPipelineError::Tail {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config() -> TailConfig {
        TailConfig {
            poll_interval: Duration::from_millis(10),
            max_line_length: 1024,
        }
    }

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    async fn next(tail: &mut FileTail) -> String {
        tokio::time::timeout(WAIT, tail.next_line())
            .await
            .expect("timed out waiting for line")
            .unwrap()
    }

    #[tokio::test]
    async fn starts_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old line\n").unwrap();

        let mut tail = FileTail::open(&path, fast_config()).await.unwrap();
        assert_eq!(tail.position(), 9);
        append(&path, "new line\n");
        assert_eq!(next(&mut tail).await, "new line");
    }

    #[tokio::test]
    async fn waits_for_line_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let mut tail = FileTail::open(&path, fast_config()).await.unwrap();
        append(&path, "par");
        let early = tokio::time::timeout(Duration::from_millis(100), tail.next_line()).await;
        assert!(early.is_err());
        append(&path, "tial\r\nsecond\n");
        assert_eq!(next(&mut tail).await, "partial");
        assert_eq!(next(&mut tail).await, "second");
    }

    #[tokio::test]
    async fn rewinds_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "first entry\n").unwrap();

        let mut tail = FileTail::open(&path, fast_config()).await.unwrap();
        append(&path, "second entry\n");
        assert_eq!(next(&mut tail).await, "second entry");

        std::fs::write(&path, "b\n").unwrap();
        assert_eq!(next(&mut tail).await, "b");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn follows_rotation_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        std::fs::write(&path, "").unwrap();

        let mut tail = FileTail::open(&path, fast_config()).await.unwrap();
        append(&path, "before rotation\n");
        assert_eq!(next(&mut tail).await, "before rotation");

        std::fs::rename(&path, dir.path().join("0.log.20240101")).unwrap();
        std::fs::write(&path, "after rotation\n").unwrap();
        assert_eq!(next(&mut tail).await, "after rotation");
    }

    #[tokio::test]
    async fn tolerates_temporary_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let mut tail = FileTail::open(&path, fast_config()).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::write(&writer_path, "back again\n").unwrap();
        });
        assert_eq!(next(&mut tail).await, "back again");
    }

    #[tokio::test]
    async fn splits_overlong_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let config = TailConfig {
            max_line_length: 8,
            ..fast_config()
        };
        let mut tail = FileTail::open(&path, config).await.unwrap();
        append(&path, "abcdefghijkl\n");
        assert_eq!(next(&mut tail).await, "abcdefgh");
        assert_eq!(next(&mut tail).await, "ijkl");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let mut tail = FileTail::open(&path, fast_config()).await.unwrap();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(b"bad \xff byte\n").unwrap();
        assert_eq!(next(&mut tail).await, "bad \u{FFFD} byte");
    }

    #[tokio::test]
    async fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileTail::open(dir.path().join("missing.log"), fast_config()).await;
        assert!(matches!(result, Err(LogPipelineError::Tail { .. })));
    }
}
