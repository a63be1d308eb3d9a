// ==========================================
// 钢卷纵剪排产系统 - 兼容性与定额纯函数库
// ==========================================
// 职责: 判定钢卷能否满足需求行、按实际厚度折算单件定额、按重量折算件数
// 红线: 无状态、无副作用、无 I/O 操作
// 红线: 求解器与投产台账共用本模块,算术口径不得分叉
// ==========================================

use crate::domain::coil::Coil;
use crate::domain::material::DemandLine;
use crate::domain::types::SteelGrade;

/// 厚度允许偏差 (mm)。0.05 取 0.0501,避免浮点误差把恰好 0.05 判为超差
pub const THICKNESS_TOLERANCE_MM: f64 = 0.0501;

/// 件数折算的浮点修正量
pub const PIECE_EPSILON: f64 = 1e-6;

// ==========================================
// CompatibilityCore - 纯函数工具类
// ==========================================
pub struct CompatibilityCore;

impl CompatibilityCore {
    /// 牌号兼容: 高牌号可代用低牌号,反之不可
    ///
    /// # 规则
    /// - rank(coil_grade) >= rank(required_grade)
    pub fn is_grade_compatible(coil_grade: SteelGrade, required_grade: SteelGrade) -> bool {
        coil_grade.rank() >= required_grade.rank()
    }

    /// 判定钢卷与需求行是否兼容
    ///
    /// # 规则 (按顺序,命中即返回)
    /// 1. 牌号: 钢卷牌号等级不得低于需求
    /// 2. 锌层: 必须一致
    /// 3. 表面处理: 必须一致
    /// 4. 厚度: |差值| <= 0.05mm
    ///
    /// # 返回
    /// - None: 兼容
    /// - Some(reason): 不兼容原因 (面向操作员)
    pub fn check(coil: &Coil, demand: &DemandLine) -> Option<String> {
        if !Self::is_grade_compatible(coil.grade, demand.grade) {
            return Some(format!(
                "牌号不兼容: 钢卷{} 无法满足 物料{} 的要求",
                coil.grade, demand.grade
            ));
        }

        if coil.coating != demand.coating {
            return Some(format!(
                "锌层不匹配: 钢卷{} vs 物料{}",
                coil.coating, demand.coating
            ));
        }

        if coil.surface != demand.surface {
            return Some(format!(
                "表面处理不匹配: 钢卷{} vs 物料{}",
                coil.surface, demand.surface
            ));
        }

        let thickness_diff = (coil.thickness_mm - demand.thickness_mm).abs();
        if thickness_diff > THICKNESS_TOLERANCE_MM {
            return Some(format!(
                "厚度差异过大: 钢卷{}mm vs 物料{}mm (允许偏差 ±0.05mm)",
                coil.thickness_mm, demand.thickness_mm
            ));
        }

        None
    }

    pub fn is_compatible(coil: &Coil, demand: &DemandLine) -> bool {
        Self::check(coil, demand).is_none()
    }

    /// 按实际厚度折算单件定额
    ///
    /// # 规则
    /// - adjusted = std_quota × (actual_thickness / std_thickness)
    /// - std_thickness = 0 → 0 (视为无定额)
    pub fn adjusted_quota(std_quota: f64, std_thickness: f64, actual_thickness: f64) -> f64 {
        if std_thickness == 0.0 {
            return 0.0;
        }
        std_quota * (actual_thickness / std_thickness)
    }

    /// 按重量折算整件数,不计零头
    ///
    /// # 规则
    /// - pieces = floor(weight / quota + ε)
    /// - quota <= 0 或 weight <= 0 → 0
    pub fn pieces_from_weight(weight_kg: f64, quota_kg: f64) -> u64 {
        if quota_kg <= 0.0 || weight_kg <= 0.0 || !weight_kg.is_finite() {
            return 0;
        }
        (weight_kg / quota_kg + PIECE_EPSILON).floor() as u64
    }
}

/// 按小数位四舍五入 (入账时统一精度)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Coating, SurfaceType};
    use chrono::NaiveDate;

    fn coil(grade: SteelGrade, thickness: f64) -> Coil {
        Coil::new(
            "MC-001",
            grade,
            Coating::Z80,
            SurfaceType::Oiled,
            thickness,
            1250.0,
            5000.0,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        )
    }

    fn demand(grade: SteelGrade, thickness: f64) -> DemandLine {
        DemandLine {
            demand_id: "D1".to_string(),
            material_code: "M-001".to_string(),
            grade,
            coating: Coating::Z80,
            surface: SurfaceType::Oiled,
            thickness_mm: thickness,
            quota_kg: 10.0,
            balance_kg: -1000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_grade_substitution_is_monotonic() {
        for g1 in SteelGrade::all() {
            for g2 in SteelGrade::all() {
                let high_serves_low = CompatibilityCore::is_compatible(&coil(g1, 0.8), &demand(g2, 0.8));
                assert_eq!(high_serves_low, g1.rank() >= g2.rank(), "coil {} demand {}", g1, g2);
            }
        }
    }

    #[test]
    fn test_thickness_boundary() {
        let c = coil(SteelGrade::Dx51d, 0.80);
        assert!(CompatibilityCore::check(&c, &demand(SteelGrade::Dx51d, 0.85)).is_none());
        assert!(CompatibilityCore::check(&c, &demand(SteelGrade::Dx51d, 0.75)).is_none());
        assert!(CompatibilityCore::check(&c, &demand(SteelGrade::Dx51d, 0.851)).is_some());
    }

    #[test]
    fn test_coating_and_surface_mismatch() {
        let c = coil(SteelGrade::Dx53d, 0.8);
        let mut d = demand(SteelGrade::Dx51d, 0.8);
        d.coating = Coating::Z180;
        let reason = CompatibilityCore::check(&c, &d).unwrap();
        assert!(reason.contains("锌层不匹配"));

        let mut d = demand(SteelGrade::Dx51d, 0.8);
        d.surface = SurfaceType::Passivated;
        let reason = CompatibilityCore::check(&c, &d).unwrap();
        assert!(reason.contains("表面处理不匹配"));
    }

    #[test]
    fn test_adjusted_quota() {
        assert!((CompatibilityCore::adjusted_quota(10.0, 0.8, 0.8) - 10.0).abs() < 1e-9);
        assert!((CompatibilityCore::adjusted_quota(10.0, 0.8, 1.0) - 12.5).abs() < 1e-9);
        assert_eq!(CompatibilityCore::adjusted_quota(10.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_pieces_from_weight_never_fractional() {
        assert_eq!(CompatibilityCore::pieces_from_weight(4992.0, 10.0), 499);
        assert_eq!(CompatibilityCore::pieces_from_weight(4992.0, 12.5), 399);
        assert_eq!(CompatibilityCore::pieces_from_weight(30.0, 10.0), 3);
        assert_eq!(CompatibilityCore::pieces_from_weight(0.3 * 3.0 * 100.0, 90.0), 1);
        assert_eq!(CompatibilityCore::pieces_from_weight(100.0, 0.0), 0);
        assert_eq!(CompatibilityCore::pieces_from_weight(-100.0, 10.0), 0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3990.004, 2), 3990.0);
        assert_eq!(round_to(1234.56, 1), 1234.6);
    }
}
