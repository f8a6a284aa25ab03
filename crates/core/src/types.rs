//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 분류 엔진과 진단 핸들러가 교환하는 데이터 구조를 정의합니다.

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 분류된 로그 엔트리
///
/// 설정된 파서 목록 중 정확히 하나가 구조 매칭에 성공하여 생성합니다.
/// `variables`에는 파서의 이름 있는 캡처 그룹과 합성 변수 `LINENO`가
/// 항상 포함됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 원본 라인 텍스트
    pub text: String,
    /// 스트림 전체 기준 1부터 증가하는 라인 번호 (제외 라인도 카운트)
    pub line_no: u64,
    /// 이 엔트리를 생성한 파서의 목록 내 인덱스
    pub parser_index: usize,
    /// 캡처 변수명 -> 캡처 문자열
    pub variables: HashMap<String, String>,
    /// 필터 매칭 여부 (트리거 억제, 컨텍스트에는 유지)
    pub filtered: bool,
    /// 트리거 매칭 여부 (진단 대상 후보)
    pub triggered: bool,
    /// 제외 매칭 여부 (버퍼링/트리거 모두 배제)
    pub excluded: bool,
}

impl LogEntry {
    /// 캡처 변수 값을 조회합니다.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// 진단을 열어야 하는 엔트리인지 여부 (`!filtered && triggered`)
    pub fn should_diagnose(&self) -> bool {
        !self.filtered && self.triggered
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.line_no, self.text)
    }
}

/// 진단 인시던트
///
/// 번들링이 종료된 하나의 에러 사건을 나타냅니다.
/// 트리거 엔트리와 주변 컨텍스트(토큰 예산으로 절단된 시간순 엔트리)를
/// 진단 핸들러에 전달하는 단위입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// 인시던트 ID
    pub id: String,
    /// 로그 소스 (모니터링 중인 파일 경로)
    pub source: String,
    /// 진단을 연 트리거 엔트리
    pub entry: LogEntry,
    /// 시간순(오래된 것 먼저) 컨텍스트. 트리거 엔트리를 포함합니다.
    pub context: Vec<LogEntry>,
    /// 생성 시각
    pub created_at: SystemTime,
}

impl Incident {
    /// 새 인시던트를 생성합니다.
    pub fn new(source: impl Into<String>, entry: LogEntry, context: Vec<LogEntry>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            entry,
            context,
            created_at: SystemTime::now(),
        }
    }

    /// 트리거 위치를 `<source>:<line_no>` 형식으로 반환합니다.
    pub fn location(&self) -> String {
        format!("{}:{}", self.source, self.entry.line_no)
    }

    /// 컨텍스트 엔트리의 원본 텍스트를 개행으로 이어붙입니다.
    ///
    /// 각 라인 뒤에 개행이 붙으므로 결과는 항상 개행으로 끝납니다
    /// (컨텍스트가 비어있지 않은 경우).
    pub fn context_text(&self) -> String {
        let mut result = String::new();
        for entry in &self.context {
            result.push_str(&entry.text);
            result.push('\n');
        }
        result
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "incident {} at {} ({} context entries)",
            self.id,
            self.location(),
            self.context.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line_no: u64, text: &str) -> LogEntry {
        LogEntry {
            text: text.to_owned(),
            line_no,
            variables: HashMap::from([("LINENO".to_owned(), line_no.to_string())]),
            ..LogEntry::default()
        }
    }

    #[test]
    fn entry_variable_lookup() {
        let e = entry(3, "hello");
        assert_eq!(e.variable("LINENO"), Some("3"));
        assert_eq!(e.variable("MESSAGE"), None);
    }

    #[test]
    fn should_diagnose_requires_trigger_without_filter() {
        let mut e = entry(1, "boom");
        assert!(!e.should_diagnose());
        e.triggered = true;
        assert!(e.should_diagnose());
        e.filtered = true;
        assert!(!e.should_diagnose());
    }

    #[test]
    fn incident_location_and_context_text() {
        let incident = Incident::new(
            "/var/log/app.log",
            entry(2, "ERROR broken"),
            vec![entry(1, "starting"), entry(2, "ERROR broken")],
        );
        assert_eq!(incident.location(), "/var/log/app.log:2");
        assert_eq!(incident.context_text(), "starting\nERROR broken\n");
    }

    #[test]
    fn incident_ids_are_unique() {
        let a = Incident::new("f", entry(1, "x"), vec![]);
        let b = Incident::new("f", entry(1, "x"), vec![]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn entry_serialize_roundtrip() {
        let e = entry(7, "[ERROR] it broke");
        let json = serde_json::to_string(&e).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn entry_display_includes_line_number() {
        let e = entry(42, "something happened");
        let display = e.to_string();
        assert!(display.contains("42"));
        assert!(display.contains("something happened"));
    }
}
