//! 파서 정의 파일 로더 -- YAML 파서 정의를 디스크에서 로드합니다.
//!
//! 정의 파일 하나가 파서 체인 전체(순서 보장)와 선택적 프롬프트 오버라이드를
//! 담습니다. 체인의 마지막 파서는 모든 라인에 매칭되는 catch-all 패턴이어야
//! 합니다 (예: `^(?P<MESSAGE>.*)$`).
//!
//! # 정의 파일 예시
//! ```yaml
//! prompt: "ERROR:\n$ERROR"
//! parsers:
//!   - regex: '^\[(?P<LEVEL>\w+)\]\s+(?P<MESSAGE>.*)$'
//!     triggers:
//!       - variable: LEVEL
//!         regex: ERROR
//!   - regex: '^(?P<MESSAGE>.*)$'
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// 정의 파일 최대 크기 (바이트)
const MAX_SPEC_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 체인당 최대 파서 수
const MAX_PARSER_COUNT: usize = 1_000;

/// 파서 정의 파일 전체
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserSpecFile {
    /// 시스템 프롬프트 오버라이드 (선택)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// 사용자 프롬프트 오버라이드 (선택, `$ERROR` 자리표시자 필수)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// 순서 있는 파서 정의 목록
    pub parsers: Vec<ParserSpec>,
}

/// 단일 파서 정의
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserSpec {
    /// 이름 있는 캡처 그룹을 포함한 구조 매칭 정규식
    pub regex: String,
    /// 트리거 매처 목록 (OR 결합)
    #[serde(default)]
    pub triggers: Vec<MatcherSpec>,
    /// 필터 매처 목록 (OR 결합)
    #[serde(default)]
    pub filters: Vec<MatcherSpec>,
    /// 제외 매처 목록 (OR 결합)
    #[serde(default)]
    pub excludes: Vec<MatcherSpec>,
}

/// 변수 매처 정의 -- 캡처 변수 하나에 대한 정규식 검사
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherSpec {
    /// 대상 캡처 변수 이름 (합성 변수 `LINENO` 포함 가능)
    pub variable: String,
    /// 변수 값에 적용할 정규식
    pub regex: String,
}

impl ParserSpecFile {
    /// YAML 파일에서 파서 정의를 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TriageError> {
        let path = path.as_ref();

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| TriageError::SpecLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_SPEC_FILE_SIZE {
            return Err(TriageError::SpecLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_SPEC_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TriageError::SpecLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let spec = Self::parse_yaml(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            count = spec.parsers.len(),
            "loaded parser specs"
        );

        Ok(spec)
    }

    /// YAML 문자열을 파싱하여 정의를 생성합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Self, TriageError> {
        let spec: ParserSpecFile =
            serde_yaml::from_str(yaml_str).map_err(|e| TriageError::SpecLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        spec.validate(source)?;

        Ok(spec)
    }

    /// 정의의 유효성을 검증합니다.
    ///
    /// 정규식 컴파일과 변수 참조 검증은 파서 구성 단계
    /// ([`Parser::new`](crate::parser::Parser::new))에서 수행됩니다.
    fn validate(&self, source: &str) -> Result<(), TriageError> {
        if self.parsers.is_empty() {
            return Err(TriageError::SpecLoad {
                path: source.to_owned(),
                reason: "parser list must not be empty".to_owned(),
            });
        }

        if self.parsers.len() > MAX_PARSER_COUNT {
            return Err(TriageError::SpecLoad {
                path: source.to_owned(),
                reason: format!("too many parsers: max {MAX_PARSER_COUNT}"),
            });
        }

        for (idx, parser) in self.parsers.iter().enumerate() {
            if parser.regex.is_empty() {
                return Err(TriageError::SpecLoad {
                    path: source.to_owned(),
                    reason: format!("parser[{idx}] regex must not be empty"),
                });
            }
        }

        Ok(())
    }
}
