//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 주기의 수집 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 대상 심볼 수
    pub total: usize,
    /// 성공한 심볼 수
    pub success: usize,
    /// 실패한 심볼 수
    pub errors: usize,
    /// 건너뛴 심볼 수 (이미 초기화됨 등)
    pub skipped: usize,
    /// 새로 저장된 캔들 수
    pub candles_inserted: usize,
    /// 발견한 갭 수
    pub gaps_found: usize,
    /// 다시 채운 갭 수
    pub gaps_repaired: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            candles_inserted = self.candles_inserted,
            gaps_found = self.gaps_found,
            gaps_repaired = self.gaps_repaired,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
