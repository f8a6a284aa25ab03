#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 파일 tail 수집기 (폴링 기반, 회전/절단 감지)
//! - [`parser`]: 정규식 파서 체인 및 filter/trigger/exclude 분류
//! - [`matcher`]: 변수 단위 정규식 매처
//! - [`buffer`]: 토큰 예산이 적용되는 컨텍스트 링 버퍼
//! - [`monitor`]: 분류/번들링 상태 기계 (Pipeline trait 구현)
//! - [`diagnose`]: 인시던트 디스패처와 진단 핸들러 (LLM 진단, 아티팩트 기록)
//! - [`config`]: YAML 파서 정의 파일 로더
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileCollector -> Monitor(classify + bundle) -> Dispatcher -> DiagnosisHandler
//!     |                |                           |
//!  tail + rotation  ring buffer + timeout      fire-and-forget
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod monitor;

pub mod collector;
pub mod diagnose;
pub mod matcher;
pub mod parser;

// --- 주요 타입 re-export ---

// 모니터
pub use monitor::{Monitor, MonitorBuilder, MonitorParams, run_monitor_loop};

// 설정
pub use config::{MatcherSpec, ParserSpec, ParserSpecFile};

// 에러
pub use error::TriageError;

// 파서
pub use parser::{LINENO_VARIABLE, Parser, classify};

// 수집기
pub use collector::{CollectorStatus, FileCollector, FileCollectorConfig};

// 진단
pub use diagnose::{DiagnosisHandler, LoggingHandler, OpenAiDiagnoser, spawn_dispatcher};

// 버퍼
pub use buffer::LogBuffer;
