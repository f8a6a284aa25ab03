//! 에러 타입 — 도메인별 에러 정의

/// Vigil 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 모니터 루프 / 생명주기 에러
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 모니터 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 이미 실행 중인 모니터를 다시 시작함
    #[error("monitor is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 모니터를 정지함
    #[error("monitor is not running")]
    NotRunning,

    /// 모니터 초기화 실패
    #[error("monitor init failed: {0}")]
    InitFailed(String),

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}
