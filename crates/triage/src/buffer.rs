//! 컨텍스트 링 버퍼 -- 토큰 예산이 적용되는 고정 슬롯 순환 버퍼
//!
//! [`LogBuffer`]는 최근 분류된 엔트리를 고정 개수의 슬롯에 유지합니다.
//! `dump()`는 시간순(오래된 것 먼저) 시퀀스를 토큰 예산으로 절단하여
//! 반환하며, 버퍼 상태를 변경하지 않습니다.

use vigil_core::types::LogEntry;

/// 대략적인 토큰 비용 환산 (4문자당 1토큰)
fn token_cost(text: &str) -> usize {
    text.len() / 4
}

/// 컨텍스트 링 버퍼
///
/// - `cursor`: 다음 쓰기 인덱스 (capacity 모듈로 순환)
/// - `filled`: 마지막 clear 이후 쓰인 엔트리 수 (상한 없음, capacity 초과는
///   "버퍼가 한 바퀴 이상 돌았다"는 정보로만 사용)
#[derive(Debug)]
pub struct LogBuffer {
    slots: Vec<Option<LogEntry>>,
    cursor: usize,
    filled: usize,
    capacity: usize,
    token_budget: usize,
}

impl LogBuffer {
    /// 새 링 버퍼를 생성합니다.
    ///
    /// `capacity`는 0보다 커야 합니다 (설정 검증에서 보장).
    pub fn new(capacity: usize, token_budget: usize) -> Self {
        tracing::debug!(capacity, token_budget, "initializing ring buffer");
        Self {
            slots: vec![None; capacity],
            cursor: 0,
            filled: 0,
            capacity,
            token_budget,
        }
    }

    /// 엔트리를 커서 위치에 기록하고 커서를 전진시킵니다.
    ///
    /// 버퍼가 가득 차면 가장 오래된 엔트리를 덮어씁니다.
    pub fn append(&mut self, entry: LogEntry) {
        self.slots[self.cursor] = Some(entry);
        self.cursor = (self.cursor + 1) % self.capacity;
        self.filled += 1;
    }

    /// 현재 상주 중인 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.filled.min(self.capacity)
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// 버퍼 사용률 (0.0 ~ 1.0)
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// 시간순 컨텍스트를 토큰 예산으로 절단하여 반환합니다.
    ///
    /// 순수 읽기 연산으로 버퍼 상태를 변경하지 않습니다. 절단은 최신
    /// 엔트리부터 역방향으로 누적하며, 예산을 넘기는 시점 이전의 오래된
    /// 엔트리들을 버립니다. 최신 엔트리 하나가 단독으로 예산을 초과해도
    /// 그 엔트리는 항상 유지됩니다.
    pub fn dump(&self) -> Vec<LogEntry> {
        // 커서 기준 회전 시퀀스: 아직 한 바퀴 돌지 않았으면 앞쪽 슬롯은
        // 전부 None이므로, 세 가지 충전 상태가 모두 같은 식으로 풀립니다.
        let mut entries: Vec<LogEntry> = self.slots[self.cursor..]
            .iter()
            .chain(&self.slots[..self.cursor])
            .filter_map(|slot| slot.clone())
            .collect();

        let mut kept = 0;
        let mut tokens = 0usize;
        for entry in entries.iter().rev() {
            let cost = token_cost(&entry.text);
            if kept > 0 && tokens + cost > self.token_budget {
                tracing::debug!(dropped = entries.len() - kept, "token budget reached");
                break;
            }
            tokens += cost;
            kept += 1;
        }

        entries.split_off(entries.len() - kept)
    }

    /// 버퍼를 비우고 커서와 카운터를 초기화합니다.
    pub fn clear(&mut self) {
        self.slots = vec![None; self.capacity];
        self.cursor = 0;
        self.filled = 0;
    }
}
