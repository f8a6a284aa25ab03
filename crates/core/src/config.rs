//! 설정 관리 — vigil.toml 파싱 및 런타임 설정
//!
//! [`VigilConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VIGIL_MONITOR_LOG_FILE=/var/log/app.log` 형식)
//! 3. 설정 파일 (`vigil.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vigil_core::error::VigilError> {
//! use vigil_core::config::VigilConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = VigilConfig::load("vigil.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = VigilConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, VigilError};

/// 진단 프롬프트 내 에러 컨텍스트 자리표시자
///
/// 사용자 프롬프트에서 이 문자열이 덤프된 로그 컨텍스트로 치환됩니다.
pub const ERROR_PLACEHOLDER: &str = "$ERROR";

/// 기본 시스템 프롬프트
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ErrorDebuggingGPT. Your sole purpose in this \
world is to help software engineers by diagnosing software system errors and bugs that can occur \
in any type of computer system. The message following the first line containing \"ERROR:\" up \
until the end of the prompt is a computer error no more and no less. It is your job to try to \
diagnose and fix what went wrong. Ready?";

/// 기본 사용자 프롬프트 (`$ERROR` 자리표시자 포함)
pub const DEFAULT_USER_PROMPT: &str = "ERROR:\n$ERROR";

/// Vigil 통합 설정
///
/// `vigil.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 모니터(분류/번들링) 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 진단 핸들러 설정
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
}

impl VigilConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VigilError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VigilError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VigilError> {
        toml::from_str(toml_str).map_err(|e| {
            VigilError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VIGIL_{SECTION}_{FIELD}`
    /// 예: `VIGIL_MONITOR_LOG_FILE=/var/log/app.log`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VIGIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VIGIL_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.log_file, "VIGIL_MONITOR_LOG_FILE");
        override_bool(&mut self.monitor.follow, "VIGIL_MONITOR_FOLLOW");
        override_string(&mut self.monitor.parser_file, "VIGIL_MONITOR_PARSER_FILE");
        override_usize(
            &mut self.monitor.buffer_capacity,
            "VIGIL_MONITOR_BUFFER_CAPACITY",
        );
        override_u64(
            &mut self.monitor.bundling_timeout_secs,
            "VIGIL_MONITOR_BUNDLING_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.monitor.poll_interval_ms,
            "VIGIL_MONITOR_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.monitor.max_line_length,
            "VIGIL_MONITOR_MAX_LINE_LENGTH",
        );
        override_usize(
            &mut self.monitor.channel_capacity,
            "VIGIL_MONITOR_CHANNEL_CAPACITY",
        );

        // Diagnosis
        override_bool(&mut self.diagnosis.enabled, "VIGIL_DIAGNOSIS_ENABLED");
        override_string(&mut self.diagnosis.output_dir, "VIGIL_DIAGNOSIS_OUTPUT_DIR");
        override_string(&mut self.diagnosis.model, "VIGIL_DIAGNOSIS_MODEL");
        override_string(&mut self.diagnosis.api_base, "VIGIL_DIAGNOSIS_API_BASE");
        override_string(&mut self.diagnosis.api_key_env, "VIGIL_DIAGNOSIS_API_KEY_ENV");
        override_usize(&mut self.diagnosis.max_tokens, "VIGIL_DIAGNOSIS_MAX_TOKENS");
        override_u32(
            &mut self.diagnosis.retry_max_attempts,
            "VIGIL_DIAGNOSIS_RETRY_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.diagnosis.retry_delay_secs,
            "VIGIL_DIAGNOSIS_RETRY_DELAY_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), VigilError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증 (LogFormat 파싱으로 위임)
        self.general.log_format()?;

        if self.monitor.log_file.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "monitor.log_file".to_owned(),
                reason: "log file path must not be empty".to_owned(),
            }
            .into());
        }

        if self.monitor.parser_file.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "monitor.parser_file".to_owned(),
                reason: "parser file path must not be empty".to_owned(),
            }
            .into());
        }

        if self.monitor.buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.buffer_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.monitor.bundling_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.bundling_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.monitor.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.monitor.max_line_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.max_line_length".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.diagnosis.enabled {
            if self.diagnosis.output_dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "diagnosis.output_dir".to_owned(),
                    reason: "output dir must not be empty when diagnosis is enabled".to_owned(),
                }
                .into());
            }

            if self.diagnosis.model.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "diagnosis.model".to_owned(),
                    reason: "model must not be empty when diagnosis is enabled".to_owned(),
                }
                .into());
            }
        }

        if !self.diagnosis.prompt.contains(ERROR_PLACEHOLDER) {
            return Err(ConfigError::InvalidValue {
                field: "diagnosis.prompt".to_owned(),
                reason: format!("prompt must contain the '{ERROR_PLACEHOLDER}' placeholder"),
            }
            .into());
        }

        if self.diagnosis.token_budget() == 0 {
            return Err(ConfigError::InvalidValue {
                field: "diagnosis.max_tokens".to_owned(),
                reason: "max_tokens leaves no room for log context after prompt overhead"
                    .to_owned(),
            }
            .into());
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

impl GeneralConfig {
    /// `log_format` 문자열을 [`LogFormat`]으로 파싱합니다.
    ///
    /// `validate()`가 먼저 통과했다면 실패하지 않습니다.
    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        self.log_format.parse()
    }
}

/// 로그 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 기계 파싱용 JSON 라인 (운영 기본값)
    Json,
    /// 사람이 읽기 쉬운 출력 (개발용)
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("unknown format '{other}', must be one of: json, pretty"),
            }),
        }
    }
}

/// 모니터 설정 — 분류/버퍼링/번들링 엔진
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 감시할 로그 파일 경로
    pub log_file: String,
    /// true면 파일 끝에서 새 라인을 계속 대기 (tail -f), false면 EOF에서 종료
    pub follow: bool,
    /// 파서 정의 YAML 파일 경로
    pub parser_file: String,
    /// 링 버퍼 슬롯 수
    pub buffer_capacity: usize,
    /// 번들링 타임아웃 (초, 트리거 시점부터의 절대 시간)
    pub bundling_timeout_secs: u64,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트, 초과분은 분할)
    pub max_line_length: usize,
    /// 수집기 -> 모니터 라인 채널 용량
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_file: "/var/log/syslog".to_owned(),
            follow: true,
            parser_file: "/etc/vigil/parsers.yaml".to_owned(),
            buffer_capacity: 100,
            bundling_timeout_secs: 5,
            poll_interval_ms: 1000,
            max_line_length: 64 * 1024,
            channel_capacity: 1024,
        }
    }
}

/// 진단 설정 — 외부 LLM API 호출 및 결과 아티팩트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// 진단 활성화 여부 (false면 인시던트는 로그만 남김)
    pub enabled: bool,
    /// 진단 결과 파일 출력 디렉토리
    pub output_dir: String,
    /// 사용할 모델명
    pub model: String,
    /// OpenAI 호환 API 베이스 URL
    pub api_base: String,
    /// API 키를 읽을 환경변수 이름
    pub api_key_env: String,
    /// 요청당 최대 토큰 수 (컨텍스트 예산 산정 기준)
    pub max_tokens: usize,
    /// 핸들러 재시도 최대 횟수
    pub retry_max_attempts: u32,
    /// 재시도 간 고정 지연 (초)
    pub retry_delay_secs: u64,
    /// 시스템 프롬프트 (기본값 오버라이드 가능)
    pub system_prompt: String,
    /// 사용자 프롬프트 (`$ERROR` 자리표시자 필수)
    pub prompt: String,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: "/var/lib/vigil/diagnoses".to_owned(),
            model: "gpt-4".to_owned(),
            api_base: "https://api.openai.com/v1".to_owned(),
            api_key_env: "OPENAI_KEY".to_owned(),
            max_tokens: 8000,
            retry_max_attempts: 3,
            retry_delay_secs: 2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            prompt: DEFAULT_USER_PROMPT.to_owned(),
        }
    }
}

impl DiagnosisConfig {
    /// 컨텍스트 토큰 예산을 계산합니다.
    ///
    /// 모델의 최대 토큰에서 프롬프트 오버헤드(시스템 + 사용자 프롬프트 길이)를
    /// 차감합니다. 원 구현과 동일하게 문자 길이를 그대로 차감합니다.
    pub fn token_budget(&self) -> usize {
        self.max_tokens
            .saturating_sub(self.system_prompt.len() + self.prompt.len())
    }
}

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

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
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
