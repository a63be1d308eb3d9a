// ==========================================
// 钢卷纵剪排产系统 - 急单钢卷推荐
// ==========================================
// 职责: 为急单需求行挑选最合适的库存钢卷
// 依据: 钢卷宽度对候选宽度取余 (余宽越小越好),兼顾尾卷消耗与牌号一致
// ==========================================

use crate::domain::coil::Coil;
use crate::domain::material::DemandLine;
use crate::engine::compatibility::CompatibilityCore;
use serde::Serialize;

/// 已消耗超过此重量的钢卷视为尾卷 (kg)
const TAIL_COIL_CONSUMED_KG: f64 = 100.0;

const PERFECT_REMAINDER_MM: f64 = 10.0;
const HIGH_UTILIZATION_REMAINDER_MM: f64 = 50.0;

/// 推荐结果
#[derive(Debug, Clone, Serialize)]
pub struct CoilRecommendation {
    pub coil: Option<Coil>,
    pub reason: String,
    pub remainder_mm: Option<f64>,
    pub score: u32,
}

#[derive(Debug)]
struct ScoredCoil<'a> {
    coil: &'a Coil,
    score: u32,
    reason: &'static str,
    remainder_mm: f64,
}

pub struct CoilMatcher;

impl CoilMatcher {
    /// 为急单需求行推荐钢卷
    ///
    /// # 规则
    /// - 候选: 兼容 且 剩余 > 10kg
    /// - 余宽 = min(钢卷宽度 mod 候选宽度)
    /// - 余宽 < 10mm: 100 分;< 50mm: 50 分;已消耗 > 100kg 的尾卷: 10 分;其他: 5 分
    /// - 牌号完全一致 +2 分
    /// - 按 分数降序、余宽升序 取第一
    pub fn recommend(demand: &DemandLine, coils: &[Coil]) -> CoilRecommendation {
        let mut scored: Vec<ScoredCoil<'_>> = coils
            .iter()
            .filter(|c| c.is_available() && CompatibilityCore::is_compatible(c, demand))
            .map(|c| Self::score_coil(c, demand))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.remainder_mm.total_cmp(&b.remainder_mm))
        });

        match scored.first() {
            Some(best) => CoilRecommendation {
                coil: Some(best.coil.clone()),
                reason: format!("{} (余宽{:.0}mm)", best.reason, best.remainder_mm),
                remainder_mm: Some(best.remainder_mm),
                score: best.score,
            },
            None => CoilRecommendation {
                coil: None,
                reason: "无兼容钢卷".to_string(),
                remainder_mm: None,
                score: 0,
            },
        }
    }

    fn score_coil<'a>(coil: &'a Coil, demand: &DemandLine) -> ScoredCoil<'a> {
        let mut remainder = coil.width_mm;
        for candidate in demand.candidate_widths() {
            if candidate.width_mm > 0.0 {
                remainder = remainder.min(coil.width_mm % candidate.width_mm);
            }
        }

        let (mut score, reason) = if remainder < PERFECT_REMAINDER_MM {
            (100, "完美宽度匹配")
        } else if remainder < HIGH_UTILIZATION_REMAINDER_MM {
            (50, "高利用率匹配")
        } else if coil.consumed_weight_kg() > TAIL_COIL_CONSUMED_KG {
            (10, "优先消耗尾卷")
        } else {
            (5, "兼容库存")
        };

        if coil.grade == demand.grade {
            score += 2;
        }

        ScoredCoil {
            coil,
            score,
            reason,
            remainder_mm: remainder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::material::CandidateWidth;
    use crate::domain::types::{Coating, SteelGrade, SurfaceType};
    use chrono::NaiveDate;

    fn coil(code: &str, grade: SteelGrade, width: f64, total: f64, remaining: f64) -> Coil {
        let mut c = Coil::new(
            code,
            grade,
            Coating::Z80,
            SurfaceType::Oiled,
            0.8,
            width,
            total,
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        );
        c.remaining_weight_kg = remaining;
        c
    }

    fn urgent_line() -> DemandLine {
        DemandLine {
            demand_id: "U1".to_string(),
            material_code: "M-U1".to_string(),
            grade: SteelGrade::Dx51d,
            thickness_mm: 0.8,
            spec1: CandidateWidth::new(312.0),
            spec2: CandidateWidth::new(400.0),
            quota_kg: 10.0,
            balance_kg: -500.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_perfect_width_preferred() {
        let coils = vec![
            coil("MC-A", SteelGrade::Dx51d, 1100.0, 5000.0, 5000.0), // 1100 % 312 = 164, 1100 % 400 = 300
            coil("MC-B", SteelGrade::Dx51d, 1250.0, 5000.0, 5000.0), // 1250 % 312 = 2
        ];
        let rec = CoilMatcher::recommend(&urgent_line(), &coils);
        assert_eq!(rec.coil.unwrap().mother_coil_id, "MC-B");
        assert_eq!(rec.score, 102);
        assert_eq!(rec.reason, "完美宽度匹配 (余宽2mm)");
    }

    #[test]
    fn test_tail_coil_preferred_over_fresh() {
        let coils = vec![
            coil("MC-FRESH", SteelGrade::Dx51d, 1100.0, 5000.0, 5000.0),
            coil("MC-TAIL", SteelGrade::Dx51d, 1100.0, 5000.0, 2000.0),
        ];
        let rec = CoilMatcher::recommend(&urgent_line(), &coils);
        assert_eq!(rec.coil.unwrap().mother_coil_id, "MC-TAIL");
        assert!(rec.reason.starts_with("优先消耗尾卷"));
    }

    #[test]
    fn test_exact_grade_breaks_tie() {
        let coils = vec![
            coil("MC-HIGH", SteelGrade::Dx53d, 1250.0, 5000.0, 5000.0),
            coil("MC-EXACT", SteelGrade::Dx51d, 1250.0, 5000.0, 5000.0),
        ];
        let rec = CoilMatcher::recommend(&urgent_line(), &coils);
        assert_eq!(rec.coil.unwrap().mother_coil_id, "MC-EXACT");
    }

    #[test]
    fn test_no_compatible_coil() {
        let coils = vec![
            coil("MC-EMPTY", SteelGrade::Dx51d, 1250.0, 5000.0, 5.0),
            coil("MC-LOW", SteelGrade::Dx51d, 1250.0, 5000.0, 5000.0),
        ];
        let mut line = urgent_line();
        line.grade = SteelGrade::Dx54d;
        let rec = CoilMatcher::recommend(&line, &coils);
        assert!(rec.coil.is_none());
        assert_eq!(rec.reason, "无兼容钢卷");
    }
}
