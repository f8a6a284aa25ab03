//! 진단 핸들러 -- 인시던트를 외부 LLM API로 진단하고 아티팩트를 남깁니다.
//!
//! [`DiagnosisHandler`]는 닫힌 인시던트 하나를 처리하는 확장 포인트입니다.
//! [`OpenAiDiagnoser`]는 OpenAI 호환 chat completions API를 호출하고
//! 진행 중/완료 상태를 파일 이름으로 구분되는 아티팩트로 기록합니다.
//!
//! # 아티팩트 수명주기
//! ```text
//! <output_dir>/<safe(location)>.diagnosing   (진행 중)
//!                    └── rename ──> <safe(location)>.diagnosed  (완료)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use vigil_core::config::{DiagnosisConfig, ERROR_PLACEHOLDER};
use vigil_core::metrics::{DIAGNOSIS_DISPATCHED_TOTAL, DIAGNOSIS_DURATION_SECONDS, LABEL_RESULT};
use vigil_core::pipeline::BoxFuture;
use vigil_core::types::Incident;

use crate::error::TriageError;

/// 진단 핸들러 trait
///
/// 모니터 루프는 인시던트가 닫힐 때마다 핸들러를 fire-and-forget으로
/// 호출합니다. 재시도 정책은 핸들러 자신의 책임입니다.
pub trait DiagnosisHandler: Send + Sync {
    /// 인시던트 하나를 진단합니다.
    fn handle<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, Result<(), TriageError>>;
}

/// 디스패처 태스크를 스폰합니다.
///
/// 인시던트 채널을 소비하며 인시던트마다 독립 태스크를 띄웁니다.
/// 핸들러 실패는 로그와 메트릭으로만 기록합니다. 채널이 닫히면 종료됩니다.
pub fn spawn_dispatcher(
    handler: Arc<dyn DiagnosisHandler>,
    mut incident_rx: mpsc::Receiver<Incident>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(incident) = incident_rx.recv().await {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let started = std::time::Instant::now();
                let result = handler.handle(&incident).await;
                metrics::histogram!(DIAGNOSIS_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                match result {
                    Ok(()) => {
                        metrics::counter!(DIAGNOSIS_DISPATCHED_TOTAL, LABEL_RESULT => "success")
                            .increment(1);
                    }
                    Err(e) => {
                        metrics::counter!(DIAGNOSIS_DISPATCHED_TOTAL, LABEL_RESULT => "failure")
                            .increment(1);
                        error!(location = %incident.location(), error = %e, "diagnosis handler failed");
                    }
                }
            });
        }
        info!("diagnosis dispatcher stopped");
    })
}

/// 진단 비활성화 시 사용하는 핸들러 -- 인시던트를 로그로만 남깁니다.
pub struct LoggingHandler;

impl DiagnosisHandler for LoggingHandler {
    fn handle<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, Result<(), TriageError>> {
        Box::pin(async move {
            info!(
                location = %incident.location(),
                context_lines = incident.context.len(),
                "incident detected (diagnosis disabled)"
            );
            Ok(())
        })
    }
}

/// OpenAI 호환 API 기반 진단 핸들러
pub struct OpenAiDiagnoser {
    config: DiagnosisConfig,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiDiagnoser {
    /// 새 진단 핸들러를 생성합니다.
    ///
    /// API 키는 `config.api_key_env`가 가리키는 환경변수에서 읽습니다.
    pub fn new(config: DiagnosisConfig) -> Result<Self, TriageError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            TriageError::Diagnosis(format!(
                "API key env var '{}' is not set",
                config.api_key_env
            ))
        })?;
        if api_key.is_empty() {
            return Err(TriageError::Diagnosis(format!(
                "API key env var '{}' is empty",
                config.api_key_env
            )));
        }

        Ok(Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    /// 진단 한 회차를 수행합니다: 아티팩트 생성 → API 호출 → 결과 기록 → 완료 rename
    async fn diagnose_once(&self, incident: &Incident) -> Result<(), TriageError> {
        let location = incident.location();
        let diagnosing = self.artifact_path(&location, "diagnosing");
        let diagnosed = self.artifact_path(&location, "diagnosed");

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let context = incident.context_text();
        let header = format!(
            "LOG LINE:\n{location}\n\nSYSTEM PROMPT:\n{}\n\nPROMPT:\n{}\n\nCONTEXT:\n{context}\n\n",
            self.config.system_prompt, self.config.prompt,
        );
        tokio::fs::write(&diagnosing, &header).await?;

        let suggestion = self.suggestion(&context).await?;
        info!(location = %location, "diagnosis received");

        let full = format!("{header}DIAGNOSIS:\n{suggestion}\n");
        tokio::fs::write(&diagnosing, &full).await?;
        tokio::fs::rename(&diagnosing, &diagnosed).await?;

        Ok(())
    }

    /// 컨텍스트로 `$ERROR` 자리표시자를 치환하여 API에 진단을 요청합니다.
    async fn suggestion(&self, context: &str) -> Result<String, TriageError> {
        let prompt = self.config.prompt.replacen(ERROR_PLACEHOLDER, context, 1);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_owned(),
                    content: self.config.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_owned(),
                    content: prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.config.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::Diagnosis(format!(
                "API request failed with status {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| TriageError::Diagnosis(format!("failed to parse response: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TriageError::Diagnosis("API returned no choices".to_owned()))
    }

    fn artifact_path(&self, location: &str, extension: &str) -> PathBuf {
        PathBuf::from(&self.config.output_dir)
            .join(format!("{}.{extension}", safe_file_name(location)))
    }
}

impl DiagnosisHandler for OpenAiDiagnoser {
    fn handle<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, Result<(), TriageError>> {
        Box::pin(async move {
            // 고정 지연 재시도: 시도 횟수 = 1 + retry_max_attempts
            let delay = Duration::from_secs(self.config.retry_delay_secs);
            let mut last_err = None;
            for attempt in 0..=self.config.retry_max_attempts {
                if attempt > 0 {
                    tokio::time::sleep(delay).await;
                }
                match self.diagnose_once(incident).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!(
                            location = %incident.location(),
                            attempt,
                            error = %e,
                            "diagnosis attempt failed"
                        );
                        last_err = Some(e);
                    }
                }
            }
            Err(last_err
                .unwrap_or_else(|| TriageError::Diagnosis("retries exhausted".to_owned())))
        })
    }
}

/// 인시던트 위치를 파일 이름으로 안전하게 변환합니다.
///
/// 공백은 `-`, 경로 구분자는 `::`로 치환하고 200자로 절단합니다.
fn safe_file_name(s: &str) -> String {
    let mut result = s.replace(' ', "-").replace('/', "::");
    if result.len() > 200 {
        // 멀티바이트 경계 보정
        let mut cut = 200;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::types::LogEntry;

    fn incident() -> Incident {
        let entry = LogEntry {
            text: "[ERROR] broke".to_owned(),
            line_no: 2,
            triggered: true,
            ..LogEntry::default()
        };
        Incident::new(
            "/var/log/app.log",
            entry.clone(),
            vec![
                LogEntry {
                    text: "starting up".to_owned(),
                    line_no: 1,
                    ..LogEntry::default()
                },
                entry,
            ],
        )
    }

    #[test]
    fn safe_file_name_replaces_separators() {
        assert_eq!(
            safe_file_name("/var/log/app.log:42"),
            "::var::log::app.log:42"
        );
        assert_eq!(safe_file_name("with space:1"), "with-space:1");
    }

    #[test]
    fn safe_file_name_truncates_long_input() {
        let long = "a".repeat(500);
        assert_eq!(safe_file_name(&long).len(), 200);
    }

    #[test]
    fn artifact_path_uses_output_dir() {
        let diagnoser = OpenAiDiagnoser {
            config: DiagnosisConfig {
                output_dir: "/tmp/diag".to_owned(),
                ..DiagnosisConfig::default()
            },
            api_key: "test".to_owned(),
            client: reqwest::Client::new(),
        };
        let path = diagnoser.artifact_path("/var/log/app.log:2", "diagnosing");
        assert_eq!(
            path,
            PathBuf::from("/tmp/diag/::var::log::app.log:2.diagnosing")
        );
    }

    #[test]
    fn new_requires_api_key_env() {
        let config = DiagnosisConfig {
            api_key_env: "VIGIL_TEST_MISSING_KEY_VAR".to_owned(),
            ..DiagnosisConfig::default()
        };
        let result = OpenAiDiagnoser::new(config);
        assert!(matches!(result, Err(TriageError::Diagnosis(_))));
    }

    #[tokio::test]
    async fn logging_handler_always_succeeds() {
        let handler = LoggingHandler;
        assert!(handler.handle(&incident()).await.is_ok());
    }

    #[tokio::test]
    async fn dispatcher_invokes_handler_per_incident() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingHandler(AtomicUsize);
        impl DiagnosisHandler for CountingHandler {
            fn handle<'a>(
                &'a self,
                _incident: &'a Incident,
            ) -> BoxFuture<'a, Result<(), TriageError>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            }
        }

        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = spawn_dispatcher(handler.clone(), rx);

        tx.send(incident()).await.unwrap();
        tx.send(incident()).await.unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        // 핸들러 태스크가 끝나도록 잠시 양보
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispatcher_survives_handler_failure() {
        struct FailingHandler;
        impl DiagnosisHandler for FailingHandler {
            fn handle<'a>(
                &'a self,
                _incident: &'a Incident,
            ) -> BoxFuture<'a, Result<(), TriageError>> {
                Box::pin(async { Err(TriageError::Diagnosis("synthetic failure".to_owned())) })
            }
        }

        let (tx, rx) = mpsc::channel(8);
        let dispatcher = spawn_dispatcher(Arc::new(FailingHandler), rx);

        tx.send(incident()).await.unwrap();
        drop(tx);
        // 핸들러 실패에도 디스패처는 정상 종료
        dispatcher.await.unwrap();
    }
}
