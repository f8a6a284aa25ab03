//! 변수 매처 -- 캡처 변수 하나에 대한 정규식 검사
//!
//! [`Matcher`]는 파서가 추출한 변수 맵에서 값 하나를 꺼내 정규식으로
//! 검사합니다. filter/trigger/exclude 판정의 최소 단위입니다.

use regex::Regex;

use vigil_core::types::LogEntry;

use crate::error::TriageError;

/// 변수 매처
///
/// 엔트리의 `variables`에서 `variable` 키를 조회하여 값이 정규식에
/// 매칭되는지 평가합니다. 키가 없으면 에러가 아니라 불일치로 처리합니다.
#[derive(Debug, Clone)]
pub struct Matcher {
    variable: String,
    regex: Regex,
}

impl Matcher {
    /// 새 매처를 생성합니다. 정규식이 유효하지 않으면 에러를 반환합니다.
    pub fn new(variable: impl Into<String>, pattern: &str) -> Result<Self, TriageError> {
        let regex = Regex::new(pattern).map_err(|e| TriageError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            variable: variable.into(),
            regex,
        })
    }

    /// 대상 변수 이름을 반환합니다.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// 엔트리의 변수 값이 정규식에 매칭되는지 평가합니다.
    pub fn is_match(&self, entry: &LogEntry) -> bool {
        match entry.variable(&self.variable) {
            Some(value) => self.regex.is_match(value),
            None => false,
        }
    }
}
