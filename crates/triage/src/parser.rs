//! 라인 파서 및 분류기
//!
//! [`Parser`]는 이름 있는 캡처 그룹을 가진 구조 매칭 정규식과
//! filter/trigger/exclude 매처 목록으로 구성됩니다. 구성 시점에 정규식을
//! 컴파일하고 매처가 참조하는 변수를 전부 검증하므로, 런타임 분류는
//! 실패 없이 순수하게 동작합니다.
//!
//! [`classify`]는 파서 체인을 순서대로 시도하여 첫 구조 매칭을 채택합니다.
//! 어떤 파서도 매칭되지 않으면 설정 결함(catch-all 누락)이므로 에러입니다.

use std::collections::HashSet;

use regex::Regex;

use vigil_core::types::LogEntry;

use crate::config::{MatcherSpec, ParserSpec};
use crate::error::TriageError;
use crate::matcher::Matcher;

/// 합성 라인 번호 변수 이름
///
/// 모든 엔트리의 `variables`에 항상 포함되며, 매처에서 참조할 수 있습니다.
pub const LINENO_VARIABLE: &str = "LINENO";

/// 라인 파서 -- 구성 후 불변
#[derive(Debug, Clone)]
pub struct Parser {
    pattern: String,
    regex: Regex,
    filters: Vec<Matcher>,
    triggers: Vec<Matcher>,
    excludes: Vec<Matcher>,
}

impl Parser {
    /// 새 파서를 생성합니다.
    ///
    /// # Errors
    /// - 구조 매칭 정규식 또는 매처 정규식이 유효하지 않은 경우
    /// - 매처가 캡처 그룹에 없는 변수를 참조하는 경우
    pub fn new(
        pattern: &str,
        filters: &[MatcherSpec],
        triggers: &[MatcherSpec],
        excludes: &[MatcherSpec],
    ) -> Result<Self, TriageError> {
        let regex = Regex::new(pattern).map_err(|e| TriageError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;

        // 선언된 변수 집합: 이름 있는 캡처 그룹 + 합성 LINENO
        let mut declared: HashSet<&str> = regex.capture_names().flatten().collect();
        declared.insert(LINENO_VARIABLE);

        let filters = Self::build_matchers("filter", filters, &declared)?;
        let triggers = Self::build_matchers("trigger", triggers, &declared)?;
        let excludes = Self::build_matchers("exclude", excludes, &declared)?;

        tracing::debug!(pattern, "compiled parser");

        Ok(Self {
            pattern: pattern.to_owned(),
            regex,
            filters,
            triggers,
            excludes,
        })
    }

    /// 정의 목록에서 파서 체인을 구성합니다. 정의 순서를 보존합니다.
    pub fn from_specs(specs: &[ParserSpec]) -> Result<Vec<Self>, TriageError> {
        specs
            .iter()
            .map(|spec| Self::new(&spec.regex, &spec.filters, &spec.triggers, &spec.excludes))
            .collect()
    }

    fn build_matchers(
        kind: &str,
        specs: &[MatcherSpec],
        declared: &HashSet<&str>,
    ) -> Result<Vec<Matcher>, TriageError> {
        specs
            .iter()
            .map(|spec| {
                if !declared.contains(spec.variable.as_str()) {
                    return Err(TriageError::UnknownVariable {
                        variable: spec.variable.clone(),
                        kind: kind.to_owned(),
                    });
                }
                Matcher::new(&spec.variable, &spec.regex)
            })
            .collect()
    }

    /// 구조 매칭 정규식 패턴 텍스트를 반환합니다.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 라인을 파싱하여 분류된 엔트리를 생성합니다.
    ///
    /// 구조 매칭에 실패하면 `None`을 반환합니다. 호출자는 이를
    /// "다음 파서를 시도하라"는 신호로 해석합니다.
    pub fn parse(&self, line: &str, line_no: u64) -> Option<LogEntry> {
        let captures = self.regex.captures(line)?;

        let mut variables: std::collections::HashMap<String, String> = self
            .regex
            .capture_names()
            .flatten()
            .map(|name| {
                // 매칭에 참여하지 않은 그룹은 빈 문자열로 기록
                let value = captures
                    .name(name)
                    .map(|m| m.as_str().to_owned())
                    .unwrap_or_default();
                (name.to_owned(), value)
            })
            .collect();
        variables.insert(LINENO_VARIABLE.to_owned(), line_no.to_string());

        let mut entry = LogEntry {
            text: line.to_owned(),
            line_no,
            variables,
            ..LogEntry::default()
        };

        // 각 매처 목록은 독립적인 OR 결합, 첫 매칭에서 단락 평가
        entry.filtered = self.filters.iter().any(|m| m.is_match(&entry));
        entry.triggered = self.triggers.iter().any(|m| m.is_match(&entry));
        entry.excluded = self.excludes.iter().any(|m| m.is_match(&entry));

        Some(entry)
    }
}

/// 파서 체인을 순서대로 시도하여 라인을 분류합니다.
///
/// 첫 구조 매칭에 성공한 파서의 엔트리와 그 파서의 인덱스를 반환합니다.
/// 반환된 엔트리의 `parser_index`는 해당 인덱스로 설정됩니다.
///
/// # Errors
/// 어떤 파서도 매칭되지 않으면 [`TriageError::NoParserMatched`]를 반환합니다.
/// 체인 마지막에 catch-all 패턴을 두는 것이 전제이므로, 이 에러는 설정
/// 결함이며 모니터 루프는 이를 치명적 에러로 다룹니다.
pub fn classify(
    parsers: &[Parser],
    line: &str,
    line_no: u64,
) -> Result<(LogEntry, usize), TriageError> {
    for (index, parser) in parsers.iter().enumerate() {
        if let Some(mut entry) = parser.parse(line, line_no) {
            entry.parser_index = index;
            tracing::trace!(
                index,
                line_no,
                filtered = entry.filtered,
                triggered = entry.triggered,
                excluded = entry.excluded,
                "line classified"
            );
            return Ok((entry, index));
        }
    }
    Err(TriageError::NoParserMatched {
        line_no,
        line: line.to_owned(),
    })
}
