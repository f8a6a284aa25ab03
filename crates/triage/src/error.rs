//! 트리아지 엔진 에러 타입
//!
//! [`TriageError`]는 분류/번들링/수집/진단 디스패치 전 과정의 에러를 표현합니다.
//! `From<TriageError> for VigilError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use vigil_core::error::{MonitorError, VigilError};

/// 트리아지 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// 파서 또는 매처의 정규식 컴파일 실패
    #[error("invalid pattern ({pattern}): {reason}")]
    InvalidPattern {
        /// 문제가 된 정규식 패턴
        pattern: String,
        /// 컴파일 실패 사유
        reason: String,
    },

    /// filter/trigger/exclude가 선언되지 않은 캡처 변수를 참조함
    #[error("variable ({variable}) in {kind} is not a capture group of the parser")]
    UnknownVariable {
        /// 참조된 변수 이름
        variable: String,
        /// 매처 종류 (filter, trigger, exclude)
        kind: String,
    },

    /// 어떤 파서도 라인에 매칭되지 않음 (catch-all 파서 누락)
    #[error("no parser matched line {line_no} ({line})")]
    NoParserMatched {
        /// 스트림 기준 라인 번호
        line_no: u64,
        /// 원본 라인
        line: String,
    },

    /// 파서 정의 파일 로딩 실패
    #[error("parser spec load error: {path}: {reason}")]
    SpecLoad {
        /// 정의 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 수집기 에러 (파일 I/O 등)
    #[error("collector error: {path}: {reason}")]
    Collector {
        /// 감시 대상 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 진단 핸들러 에러 (API 응답, 아티팩트 파일 등)
    #[error("diagnosis error: {0}")]
    Diagnosis(String),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP 클라이언트 에러
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<TriageError> for VigilError {
    fn from(err: TriageError) -> Self {
        VigilError::Monitor(MonitorError::InitFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_display() {
        let err = TriageError::InvalidPattern {
            pattern: "[unclosed".to_owned(),
            reason: "unclosed character class".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[unclosed"));
        assert!(msg.contains("unclosed character class"));
    }

    #[test]
    fn unknown_variable_display() {
        let err = TriageError::UnknownVariable {
            variable: "SEVERITY".to_owned(),
            kind: "trigger".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SEVERITY"));
        assert!(msg.contains("trigger"));
    }

    #[test]
    fn no_parser_matched_display() {
        let err = TriageError::NoParserMatched {
            line_no: 17,
            line: "garbage".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("17"));
        assert!(msg.contains("garbage"));
    }

    #[test]
    fn converts_to_vigil_error() {
        let err = TriageError::Channel("receiver closed".to_owned());
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Monitor(_)));
        assert!(vigil_err.to_string().contains("receiver closed"));
    }
}
