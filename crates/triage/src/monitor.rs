//! 모니터 -- 분류/버퍼링/번들링 상태 기계와 생명주기 관리
//!
//! [`Monitor`]는 core의 [`Pipeline`](vigil_core::pipeline::Pipeline) trait을
//! 구현하여 `vigil-daemon`에서 수집기/디스패처와 동일한 생명주기로
//! 관리됩니다.
//!
//! # 상태 기계
//! ```text
//! SCANNING: 라인 수신 -> 분류 -> (제외면 폐기) -> 버퍼 append
//!            └─ 트리거(!filtered && triggered) 시 BUNDLING 진입
//! BUNDLING: 절대 타임아웃 안에서 후속 라인을 흡수
//!            ├─ catch-all 매칭 또는 (같은 파서 && 트리거) -> 계속 append
//!            ├─ 그 외 -> 인시던트 닫고 해당 라인을 재분류 큐로
//!            └─ 타임아웃/소스 소진 -> 인시던트 닫음
//! ```
//!
//! 라인 소비는 단일 태스크가 담당하며 버퍼를 독점 소유합니다. 닫힌
//! 인시던트는 채널로 넘겨 디스패처가 병렬로 처리합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use vigil_core::config::MonitorConfig;
use vigil_core::error::{MonitorError, VigilError};
use vigil_core::metrics::{
    MONITOR_INCIDENTS_TOTAL, MONITOR_LINES_EXCLUDED_TOTAL, MONITOR_LINES_REQUEUED_TOTAL,
    MONITOR_LINES_TOTAL,
};
use vigil_core::pipeline::{HealthStatus, Pipeline};
use vigil_core::types::{Incident, LogEntry};

use crate::buffer::LogBuffer;
use crate::collector::{FileCollector, FileCollectorConfig};
use crate::error::TriageError;
use crate::parser::{Parser, classify};

/// 모니터 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum MonitorState {
    Initialized,
    Running,
    Stopped,
}

/// 번들링 루프 파라미터
#[derive(Debug, Clone)]
pub struct MonitorParams {
    /// 인시던트 source 필드에 기록할 로그 소스 식별자
    pub source: String,
    /// 링 버퍼 슬롯 수
    pub buffer_capacity: usize,
    /// 컨텍스트 토큰 예산
    pub token_budget: usize,
    /// 번들링 타임아웃 (트리거 시점부터의 절대 시간)
    pub bundling_timeout: Duration,
}

/// 분류/번들링 루프를 실행합니다.
///
/// `line_rx`에서 라인을 소비하고 닫힌 인시던트를 `incident_tx`로 내보냅니다.
/// 소스가 소진되거나(채널 닫힘) 취소되면 정상 종료합니다.
///
/// # Errors
/// 어떤 파서도 라인에 매칭되지 않으면 [`TriageError::NoParserMatched`]로
/// 즉시 종료합니다. 이는 catch-all 파서가 없는 설정 결함이며, 라인을
/// 조용히 버리는 것보다 중단이 안전합니다.
pub async fn run_monitor_loop(
    parsers: Arc<Vec<Parser>>,
    mut line_rx: mpsc::Receiver<String>,
    incident_tx: mpsc::Sender<Incident>,
    params: MonitorParams,
    cancel: CancellationToken,
) -> Result<(), TriageError> {
    let mut buffer = LogBuffer::new(params.buffer_capacity, params.token_budget);
    let mut line_no: u64 = 0;
    // 번들링 중 자격을 잃은 라인은 소스에서 다시 읽지 않고 여기로 되돌립니다.
    let mut pending: Option<(LogEntry, usize)> = None;

    'scanning: loop {
        let (entry, matched) = match pending.take() {
            Some(requeued) => requeued,
            None => {
                let line = tokio::select! {
                    maybe = line_rx.recv() => match maybe {
                        Some(line) => line,
                        None => break 'scanning,
                    },
                    _ = cancel.cancelled() => break 'scanning,
                };
                line_no += 1;
                metrics::counter!(MONITOR_LINES_TOTAL).increment(1);
                classify(&parsers, &line, line_no)?
            }
        };

        if entry.excluded {
            metrics::counter!(MONITOR_LINES_EXCLUDED_TOTAL).increment(1);
            continue;
        }

        buffer.append(entry.clone());

        if !entry.should_diagnose() {
            continue;
        }

        // BUNDLING: 트리거 엔트리를 기억하고 후속 컨텍스트를 흡수
        let trigger = entry;
        let trigger_parser = matched;
        info!(line_no = trigger.line_no, "trigger detected, bundling context");

        let deadline = tokio::time::sleep(params.bundling_timeout);
        tokio::pin!(deadline);
        let mut source_closed = false;

        'bundling: loop {
            let line = tokio::select! {
                _ = &mut deadline => {
                    debug!("bundling timeout reached");
                    break 'bundling;
                }
                _ = cancel.cancelled() => {
                    source_closed = true;
                    break 'bundling;
                }
                maybe = line_rx.recv() => match maybe {
                    Some(line) => line,
                    None => {
                        debug!("line source closed during bundling");
                        source_closed = true;
                        break 'bundling;
                    }
                },
            };

            line_no += 1;
            metrics::counter!(MONITOR_LINES_TOTAL).increment(1);
            let (next, next_parser) = classify(&parsers, &line, line_no)?;

            if next.excluded {
                metrics::counter!(MONITOR_LINES_EXCLUDED_TOTAL).increment(1);
                continue;
            }

            let is_catch_all = next_parser == parsers.len() - 1;
            let same_trigger = next_parser == trigger_parser && next.should_diagnose();
            if is_catch_all || same_trigger {
                buffer.append(next);
            } else {
                // 이 라인은 현재 인시던트에 속하지 않음: 인시던트를 닫고
                // 라인을 SCANNING의 다음 입력으로 되돌림
                debug!(line_no = next.line_no, "disqualifying line, closing incident");
                metrics::counter!(MONITOR_LINES_REQUEUED_TOTAL).increment(1);
                pending = Some((next, next_parser));
                break 'bundling;
            }
        }

        let context = buffer.dump();
        buffer.clear();
        metrics::counter!(MONITOR_INCIDENTS_TOTAL).increment(1);

        let incident = Incident::new(params.source.clone(), trigger, context);
        info!(incident_id = %incident.id, location = %incident.location(), "incident closed");
        if incident_tx.send(incident).await.is_err() {
            return Err(TriageError::Channel(
                "incident receiver dropped".to_owned(),
            ));
        }

        if source_closed {
            break 'scanning;
        }
    }

    info!(lines = line_no, "monitor loop finished");
    Ok(())
}

/// 모니터 -- 파일 수집기와 분류/번들링 루프의 생명주기를 관리합니다.
pub struct Monitor {
    config: MonitorConfig,
    token_budget: usize,
    parsers: Option<Arc<Vec<Parser>>>,
    state: MonitorState,
    cancel: CancellationToken,
    // start() 시점에 루프 태스크로 이동: 루프가 끝나면 송신단이 모두
    // 드랍되어 하류(디스패처)가 채널 종료를 관측할 수 있음
    incident_tx: Option<mpsc::Sender<Incident>>,
    collector_task: Option<tokio::task::JoinHandle<()>>,
    // 루프의 치명적 에러(NoParserMatched 등)는 stop()에서 회수해 반환
    loop_task: Option<tokio::task::JoinHandle<Result<(), TriageError>>>,
}

impl Monitor {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            MonitorState::Initialized => "initialized",
            MonitorState::Running => "running",
            MonitorState::Stopped => "stopped",
        }
    }
}

impl Pipeline for Monitor {
    async fn start(&mut self) -> Result<(), VigilError> {
        if self.state == MonitorState::Running {
            return Err(MonitorError::AlreadyRunning.into());
        }

        let parsers = self
            .parsers
            .take()
            .ok_or_else(|| MonitorError::InitFailed("monitor cannot be restarted".to_owned()))?;
        let incident_tx = self
            .incident_tx
            .take()
            .ok_or_else(|| MonitorError::InitFailed("monitor cannot be restarted".to_owned()))?;

        info!(
            log_file = %self.config.log_file,
            parsers = parsers.len(),
            "starting monitor"
        );

        let (line_tx, line_rx) = mpsc::channel(self.config.channel_capacity);

        // 수집기 태스크
        let collector_config = FileCollectorConfig {
            path: self.config.log_file.clone().into(),
            follow: self.config.follow,
            poll_interval_ms: self.config.poll_interval_ms,
            max_line_length: self.config.max_line_length,
        };
        let mut collector = FileCollector::new(collector_config, line_tx, self.cancel.clone());
        self.collector_task = Some(tokio::spawn(async move {
            if let Err(e) = collector.run().await {
                error!(error = %e, "file collector failed");
            }
        }));

        // 분류/번들링 루프 태스크
        let params = MonitorParams {
            source: self.config.log_file.clone(),
            buffer_capacity: self.config.buffer_capacity,
            token_budget: self.token_budget,
            bundling_timeout: Duration::from_secs(self.config.bundling_timeout_secs),
        };
        let cancel = self.cancel.clone();
        self.loop_task = Some(tokio::spawn(run_monitor_loop(
            parsers,
            line_rx,
            incident_tx,
            params,
            cancel,
        )));

        self.state = MonitorState::Running;
        info!("monitor started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), VigilError> {
        if self.state != MonitorState::Running {
            return Err(MonitorError::NotRunning.into());
        }

        info!("stopping monitor");
        self.cancel.cancel();
        if let Some(task) = self.collector_task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!(error = %e, "collector task panicked during shutdown");
                }
            }
        }

        // 루프가 치명적 에러(예: catch-all 파서 누락)로 끝났다면
        // 조용한 종료로 위장하지 않고 호출자에게 전달
        let mut loop_result = Ok(());
        if let Some(task) = self.loop_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "monitor loop failed");
                    loop_result = Err(e.into());
                }
                Err(e) => {
                    if !e.is_cancelled() {
                        error!(error = %e, "monitor loop task panicked during shutdown");
                    }
                }
            }
        }

        self.state = MonitorState::Stopped;
        info!("monitor stopped");
        loop_result
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            MonitorState::Running => HealthStatus::Healthy,
            MonitorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            MonitorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 모니터 빌더
///
/// 파서 체인과 설정을 받아 모니터와 인시던트 수신 채널을 조립합니다.
pub struct MonitorBuilder {
    config: MonitorConfig,
    token_budget: usize,
    parsers: Vec<Parser>,
    incident_tx: Option<mpsc::Sender<Incident>>,
    incident_channel_capacity: usize,
}

impl MonitorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            token_budget: 8000,
            parsers: Vec::new(),
            incident_tx: None,
            incident_channel_capacity: 64,
        }
    }

    /// 모니터 설정을 지정합니다.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// 컨텍스트 토큰 예산을 지정합니다
    /// (보통 [`DiagnosisConfig::token_budget`](vigil_core::config::DiagnosisConfig::token_budget)).
    pub fn token_budget(mut self, budget: usize) -> Self {
        self.token_budget = budget;
        self
    }

    /// 파서 체인을 지정합니다. 마지막 파서는 catch-all이어야 합니다.
    pub fn parsers(mut self, parsers: Vec<Parser>) -> Self {
        self.parsers = parsers;
        self
    }

    /// 외부 인시던트 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn incident_sender(mut self, tx: mpsc::Sender<Incident>) -> Self {
        self.incident_tx = Some(tx);
        self
    }

    /// 인시던트 채널 용량을 설정합니다 (외부 채널 미사용 시).
    pub fn incident_channel_capacity(mut self, capacity: usize) -> Self {
        self.incident_channel_capacity = capacity;
        self
    }

    /// 모니터를 빌드합니다.
    ///
    /// # Returns
    /// - `Monitor`: 모니터 인스턴스
    /// - `Option<mpsc::Receiver<Incident>>`: 인시던트 수신 채널
    ///   (외부 incident_sender를 설정한 경우 None)
    pub fn build(self) -> Result<(Monitor, Option<mpsc::Receiver<Incident>>), TriageError> {
        if self.parsers.is_empty() {
            return Err(TriageError::SpecLoad {
                path: String::new(),
                reason: "monitor requires at least one parser".to_owned(),
            });
        }

        let (incident_tx, incident_rx) = if let Some(tx) = self.incident_tx {
            (tx, None)
        } else {
            let (tx, rx) = mpsc::channel(self.incident_channel_capacity);
            (tx, Some(rx))
        };

        let monitor = Monitor {
            config: self.config,
            token_budget: self.token_budget,
            parsers: Some(Arc::new(self.parsers)),
            state: MonitorState::Initialized,
            cancel: CancellationToken::new(),
            incident_tx: Some(incident_tx),
            collector_task: None,
            loop_task: None,
        };

        Ok((monitor, incident_rx))
    }
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
