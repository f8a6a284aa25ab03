//! 파일 수집기 -- 로그 파일을 폴링으로 추적합니다 (`tail -f` 방식)
//!
//! 새로 추가된 바이트만 읽어 완성된 라인 단위로 채널에 전달합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등, Unix 전용)
//! - 파일 크기 축소 감지 (truncation)
//! - 새 파일 자동 열기

use std::io::SeekFrom;
use std::path::PathBuf;

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::metrics::{COLLECTOR_LINES_READ_TOTAL, COLLECTOR_ROTATIONS_TOTAL};

use crate::error::TriageError;

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct FileCollectorConfig {
    /// 감시할 파일 경로
    pub path: PathBuf,
    /// true면 EOF 이후 새 라인을 계속 대기, false면 EOF에서 채널을 닫고 종료
    pub follow: bool,
    /// 파일 상태 체크 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트). 초과분은 별도 라인으로 분할됩니다.
    pub max_line_length: usize,
}

impl Default for FileCollectorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/log/syslog"),
            follow: true,
            poll_interval_ms: 1000,
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 정상 종료됨
    Stopped,
}

/// 파일 수집기
///
/// 지정된 파일을 주기적으로 폴링하여 새 라인을 `mpsc::Sender<String>`으로
/// 전달합니다. 파일 로테이션(inode 변경, truncation)을 자동 감지하며,
/// CancellationToken으로 graceful shutdown을 지원합니다.
pub struct FileCollector {
    config: FileCollectorConfig,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    status: CollectorStatus,
    /// 마지막 읽기 위치 (바이트 오프셋)
    offset: u64,
    /// 현재 파일의 inode (Unix 전용)
    #[cfg(unix)]
    inode: Option<u64>,
    /// 아직 개행을 만나지 못한 라인 조각
    pending: BytesMut,
}

impl FileCollector {
    /// 새 파일 수집기를 생성합니다.
    pub fn new(
        config: FileCollectorConfig,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            tx,
            cancel,
            status: CollectorStatus::Idle,
            offset: 0,
            #[cfg(unix)]
            inode: None,
            pending: BytesMut::new(),
        }
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 수집기를 시작합니다.
    ///
    /// 취소 또는 (non-follow 모드에서) EOF까지 실행됩니다.
    /// `tokio::spawn`으로 별도 태스크에서 호출하세요.
    pub async fn run(&mut self) -> Result<(), TriageError> {
        self.status = CollectorStatus::Running;
        info!(path = %self.config.path.display(), follow = self.config.follow, "starting file collector");

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.poll_once().await? {
                PollOutcome::Progress => {
                    // 새 데이터를 읽었으면 즉시 다음 폴링으로
                    continue;
                }
                PollOutcome::Eof if !self.config.follow => {
                    self.flush_remainder().await?;
                    break;
                }
                PollOutcome::Eof | PollOutcome::Missing => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
            }
        }

        self.status = CollectorStatus::Stopped;
        info!(path = %self.config.path.display(), "file collector stopped");
        Ok(())
    }

    /// 파일 상태를 한 번 확인하고, 새 바이트가 있으면 읽어 라인으로 내보냅니다.
    async fn poll_once(&mut self) -> Result<PollOutcome, TriageError> {
        let metadata = match tokio::fs::metadata(&self.config.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.config.follow {
                    // 로테이션 직후 새 파일이 아직 없을 수 있음
                    debug!(path = %self.config.path.display(), "file not found, waiting");
                    return Ok(PollOutcome::Missing);
                }
                return Err(TriageError::Collector {
                    path: self.config.path.display().to_string(),
                    reason: "log file does not exist".to_owned(),
                });
            }
            Err(e) => return Err(TriageError::Io(e)),
        };

        if self.detect_rotation(&metadata) {
            metrics::counter!(COLLECTOR_ROTATIONS_TOTAL).increment(1);
            self.offset = 0;
            self.pending.clear();
        }

        let len = metadata.len();
        if len <= self.offset {
            return Ok(PollOutcome::Eof);
        }

        let mut file = File::open(&self.config.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut chunk = vec![0u8; 64 * 1024];
        let mut remaining = len - self.offset;
        while remaining > 0 {
            let want = chunk.len().min(remaining as usize);
            let read = file.read(&mut chunk[..want]).await?;
            if read == 0 {
                break;
            }
            self.offset += read as u64;
            remaining -= read as u64;
            self.pending.extend_from_slice(&chunk[..read]);
            self.emit_complete_lines().await?;
        }

        Ok(PollOutcome::Progress)
    }

    /// inode 변경 또는 파일 절단을 감지합니다.
    fn detect_rotation(&mut self, metadata: &std::fs::Metadata) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let inode = metadata.ino();
            match self.inode {
                Some(prev) if prev != inode => {
                    warn!(path = %self.config.path.display(), "file rotation detected (inode changed)");
                    self.inode = Some(inode);
                    return true;
                }
                None => {
                    self.inode = Some(inode);
                }
                _ => {}
            }
        }

        if metadata.len() < self.offset {
            warn!(path = %self.config.path.display(), "file truncation detected");
            return true;
        }
        false
    }

    /// 누적 버퍼에서 완성된 라인을 전부 채널로 내보냅니다.
    async fn emit_complete_lines(&mut self) -> Result<(), TriageError> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line = self.pending.split_to(pos + 1);
                line.truncate(line.len() - 1); // \n 제거
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                self.send_line(&line).await?;
            } else if self.pending.len() >= self.config.max_line_length {
                // 개행 없는 초장문 라인은 최대 길이에서 분할
                let line = self.pending.split_to(self.config.max_line_length);
                warn!(
                    max = self.config.max_line_length,
                    "line exceeds max length, splitting"
                );
                self.send_line(&line).await?;
            } else {
                return Ok(());
            }
        }
    }

    /// EOF 종료 시 개행 없이 끝난 마지막 조각을 내보냅니다.
    async fn flush_remainder(&mut self) -> Result<(), TriageError> {
        if !self.pending.is_empty() {
            let line = self.pending.split_to(self.pending.len());
            self.send_line(&line).await?;
        }
        Ok(())
    }

    async fn send_line(&self, bytes: &[u8]) -> Result<(), TriageError> {
        let line = String::from_utf8_lossy(bytes).into_owned();
        metrics::counter!(COLLECTOR_LINES_READ_TOTAL).increment(1);
        self.tx
            .send(line)
            .await
            .map_err(|e| TriageError::Channel(e.to_string()))
    }
}

enum PollOutcome {
    /// 새 바이트를 읽음
    Progress,
    /// 읽을 새 바이트 없음
    Eof,
    /// 파일이 아직 존재하지 않음 (follow 모드)
    Missing,
}
