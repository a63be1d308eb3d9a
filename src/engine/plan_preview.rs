// ==========================================
// 钢卷纵剪排产系统 - 方案明细预览
// ==========================================
// 职责: 把方案展开为逐段逐分条的明细行 (生产单/执行确认用)
// 口径: 件数与标准重量折算与投产入账一致
// ==========================================

use crate::domain::coil::Coil;
use crate::domain::material::DemandLine;
use crate::domain::plan::CuttingPlan;
use crate::domain::types::UsageType;
use crate::engine::compatibility::CompatibilityCore;
use serde::Serialize;
use std::collections::HashMap;

/// 需求行缺失时的显示编码
pub const UNKNOWN_MATERIAL_LABEL: &str = "未知物料";

/// 方案明细行
#[derive(Debug, Clone, Serialize)]
pub struct PlanPreviewRow {
    pub segment_ordinal: u8,
    pub demand_id: Option<String>,
    pub material_code: String,
    pub material_name: String,
    pub width_label: String,
    pub count: u32,
    pub usage: UsageType,
    pub weight_per_strip_kg: f64,
    pub total_weight_kg: f64,
    pub expected_pieces: u64,
    pub balance_before_kg: f64, // 投产前余额
    pub balance_after_kg: f64,  // 整个方案投产后的余额
}

pub struct PlanPreview;

impl PlanPreview {
    /// 展开方案明细
    ///
    /// # 规则
    /// - 每条分条重量 = 段重量 × 宽度 / 钢卷宽度
    /// - 预计件数 = floor(分条总重 / 实际定额)
    /// - 投产后余额 = 投产前余额 + 该需求行在全部分段的标准重量之和
    pub fn build(plan: &CuttingPlan, coil: &Coil, demands: &[DemandLine]) -> Vec<PlanPreviewRow> {
        let lookup: HashMap<&str, &DemandLine> =
            demands.iter().map(|d| (d.demand_id.as_str(), d)).collect();
        let coil_width = coil.width_mm;

        // 第一遍: 按需求行汇总整方案的标准重量
        let mut produced_std: HashMap<&str, f64> = HashMap::new();
        for segment in &plan.segments {
            for strip in segment.strips.iter().filter(|s| s.is_product()) {
                let demand = match strip.demand_id.as_deref().and_then(|id| lookup.get(id)) {
                    Some(d) => *d,
                    None => continue,
                };
                let total = segment.processing_weight_kg * strip.width_ratio(coil_width);
                let quota = CompatibilityCore::adjusted_quota(
                    demand.quota_kg,
                    demand.thickness_mm,
                    coil.thickness_mm,
                );
                let pieces = CompatibilityCore::pieces_from_weight(total, quota);
                *produced_std.entry(demand.demand_id.as_str()).or_insert(0.0) +=
                    pieces as f64 * demand.quota_kg;
            }
        }

        // 第二遍: 生成明细行
        let mut rows = Vec::new();
        for segment in &plan.segments {
            for strip in &segment.strips {
                let weight_per_strip = if coil_width > 0.0 {
                    segment.processing_weight_kg * strip.width_mm / coil_width
                } else {
                    0.0
                };
                let total_weight = weight_per_strip * strip.count as f64;
                let demand = strip.demand_id.as_deref().and_then(|id| lookup.get(id)).copied();

                let row = match demand {
                    Some(d) => {
                        let quota =
                            CompatibilityCore::adjusted_quota(d.quota_kg, d.thickness_mm, coil.thickness_mm);
                        let produced = produced_std.get(d.demand_id.as_str()).copied().unwrap_or(0.0);
                        PlanPreviewRow {
                            segment_ordinal: segment.ordinal,
                            demand_id: Some(d.demand_id.clone()),
                            material_code: d.material_code.clone(),
                            material_name: d.name.clone(),
                            width_label: d.width_label(strip.width_mm),
                            count: strip.count,
                            usage: strip.usage,
                            weight_per_strip_kg: weight_per_strip,
                            total_weight_kg: total_weight,
                            expected_pieces: CompatibilityCore::pieces_from_weight(total_weight, quota),
                            balance_before_kg: d.balance_kg,
                            balance_after_kg: d.balance_kg + produced,
                        }
                    }
                    None => PlanPreviewRow {
                        segment_ordinal: segment.ordinal,
                        demand_id: strip.demand_id.clone(),
                        material_code: if strip.usage == UsageType::Product {
                            UNKNOWN_MATERIAL_LABEL.to_string()
                        } else {
                            strip.material_code.clone()
                        },
                        material_name: String::new(),
                        width_label: format!("{}", strip.width_mm),
                        count: strip.count,
                        usage: strip.usage,
                        weight_per_strip_kg: weight_per_strip,
                        total_weight_kg: total_weight,
                        expected_pieces: 0,
                        balance_before_kg: 0.0,
                        balance_after_kg: 0.0,
                    },
                };
                rows.push(row);
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::material::CandidateWidth;
    use crate::domain::plan::{PlanSegment, Strip};
    use crate::domain::types::{Coating, SteelGrade, SurfaceType};
    use chrono::NaiveDate;

    fn coil() -> Coil {
        Coil::new(
            "MC-PV",
            SteelGrade::Dx51d,
            Coating::Z80,
            SurfaceType::Oiled,
            0.8,
            1250.0,
            5000.0,
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        )
    }

    fn plan() -> CuttingPlan {
        let segment = |ordinal: u8, weight: f64| PlanSegment {
            ordinal,
            strips: vec![
                Strip::product("D1", "M-258", 258.0, 4),
                Strip::product("GONE", "M-X", 200.0, 1),
                Strip::scrap(18.0),
            ],
            processing_weight_kg: weight,
            efficiency_pct: 98.56,
            used_width_mm: 1232.0,
        };
        CuttingPlan {
            plan_id: "P".to_string(),
            name: "方案 A".to_string(),
            description: "综合最优".to_string(),
            efficiency_pct: 98.56,
            processing_weight_kg: 2500.0,
            remaining_coil_weight_kg: 2500.0,
            segments: vec![segment(1, 1250.0), segment(2, 1250.0)],
        }
    }

    fn demand() -> DemandLine {
        DemandLine {
            demand_id: "D1".to_string(),
            material_code: "M-258".to_string(),
            name: "底板".to_string(),
            thickness_mm: 0.8,
            spec1: CandidateWidth::with_note(258.0, "*C"),
            quota_kg: 10.0,
            balance_kg: -2000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_rows_per_strip_per_segment() {
        let rows = PlanPreview::build(&plan(), &coil(), &[demand()]);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].segment_ordinal, 1);
        assert_eq!(rows[3].segment_ordinal, 2);
    }

    #[test]
    fn test_product_row_values() {
        let rows = PlanPreview::build(&plan(), &coil(), &[demand()]);
        let first = &rows[0];
        assert_eq!(first.width_label, "258*C");
        assert!((first.weight_per_strip_kg - 258.0).abs() < 1e-9);
        assert!((first.total_weight_kg - 1032.0).abs() < 1e-9);
        assert_eq!(first.expected_pieces, 103);
        // 两段共 206 件 → 2060kg
        assert!((first.balance_after_kg - 60.0).abs() < 1e-9);
        assert_eq!(first.balance_before_kg, -2000.0);
    }

    #[test]
    fn test_unknown_and_scrap_rows() {
        let rows = PlanPreview::build(&plan(), &coil(), &[demand()]);
        assert_eq!(rows[1].material_code, UNKNOWN_MATERIAL_LABEL);
        assert_eq!(rows[1].expected_pieces, 0);
        assert_eq!(rows[2].material_code, "余边");
        assert_eq!(rows[2].usage, UsageType::Scrap);
    }
}
