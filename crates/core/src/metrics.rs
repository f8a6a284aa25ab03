//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `vigil_`
//! - 모듈명: `monitor_`, `collector_`, `diagnosis_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Monitor 메트릭 ────────────────────────────────────────────────

/// Monitor: 분류된 전체 라인 수 (counter)
pub const MONITOR_LINES_TOTAL: &str = "vigil_monitor_lines_total";

/// Monitor: 제외(exclude)된 라인 수 (counter)
pub const MONITOR_LINES_EXCLUDED_TOTAL: &str = "vigil_monitor_lines_excluded_total";

/// Monitor: 닫힌 인시던트 수 (counter)
pub const MONITOR_INCIDENTS_TOTAL: &str = "vigil_monitor_incidents_total";

/// Monitor: 번들링 중 재분류를 위해 되돌린 라인 수 (counter)
pub const MONITOR_LINES_REQUEUED_TOTAL: &str = "vigil_monitor_lines_requeued_total";

// ─── Collector 메트릭 ──────────────────────────────────────────────

/// Collector: 파일에서 읽은 라인 수 (counter)
pub const COLLECTOR_LINES_READ_TOTAL: &str = "vigil_collector_lines_read_total";

/// Collector: 감지된 파일 로테이션/절단 수 (counter)
pub const COLLECTOR_ROTATIONS_TOTAL: &str = "vigil_collector_rotations_total";

// ─── Diagnosis 메트릭 ──────────────────────────────────────────────

/// Diagnosis: 디스패치된 인시던트 수 (counter, label: result)
pub const DIAGNOSIS_DISPATCHED_TOTAL: &str = "vigil_diagnosis_dispatched_total";

/// Diagnosis: 핸들러 수행 시간 (histogram, 초)
pub const DIAGNOSIS_DURATION_SECONDS: &str = "vigil_diagnosis_duration_seconds";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `vigil-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        MONITOR_LINES_TOTAL,
        "Total number of log lines classified by the monitor loop"
    );
    describe_counter!(
        MONITOR_LINES_EXCLUDED_TOTAL,
        "Total number of log lines discarded by exclude matchers"
    );
    describe_counter!(
        MONITOR_INCIDENTS_TOTAL,
        "Total number of incidents closed and dispatched for diagnosis"
    );
    describe_counter!(
        MONITOR_LINES_REQUEUED_TOTAL,
        "Total number of lines re-classified after disqualifying a bundle"
    );
    describe_counter!(
        COLLECTOR_LINES_READ_TOTAL,
        "Total number of raw lines read from the monitored file"
    );
    describe_counter!(
        COLLECTOR_ROTATIONS_TOTAL,
        "Total number of file rotations or truncations detected"
    );
    describe_counter!(
        DIAGNOSIS_DISPATCHED_TOTAL,
        "Total number of diagnosis handler invocations by result"
    );
    describe_histogram!(
        DIAGNOSIS_DURATION_SECONDS,
        "Diagnosis handler duration in seconds, including retries"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        MONITOR_LINES_TOTAL,
        MONITOR_LINES_EXCLUDED_TOTAL,
        MONITOR_INCIDENTS_TOTAL,
        MONITOR_LINES_REQUEUED_TOTAL,
        COLLECTOR_LINES_READ_TOTAL,
        COLLECTOR_ROTATIONS_TOTAL,
        DIAGNOSIS_DISPATCHED_TOTAL,
        DIAGNOSIS_DURATION_SECONDS,
    ];

    #[test]
    fn all_metrics_start_with_vigil_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("vigil_"),
                "Metric '{}' does not start with 'vigil_' prefix",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }
}
