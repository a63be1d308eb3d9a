// ==========================================
// 钢卷纵剪排产系统 - 投产入账计算
// ==========================================
// 职责: 由方案计算每个需求行的实际件数与标准重量抵扣,以及撤销时的逆运算
// 红线: 件数只取整件,抵扣按 件数 × 标准定额 (标准厚度口径)
// 红线: 撤销只使用 PlanImpact 快照
// 红线: 入账时即按精度取整 (余额 2 位,钢卷重量 1 位)
// ==========================================

use crate::domain::coil::Coil;
use crate::domain::ledger::PlanImpact;
use crate::domain::material::DemandLine;
use crate::domain::plan::CuttingPlan;
use crate::engine::compatibility::{round_to, CompatibilityCore};

/// 抵扣重量低于此值且无整件产出时不入账 (kg)
pub const NEGLIGIBLE_DEDUCTION_KG: f64 = 0.001;

/// 钢卷剩余重量低于此值时清零 (kg)
pub const COIL_ZERO_TOLERANCE_KG: f64 = 0.1;

/// 单个需求行的入账结果
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    pub impact: PlanImpact,
    pub new_balance_kg: f64,
}

// ==========================================
// LedgerEngine - 入账纯函数
// ==========================================
pub struct LedgerEngine;

impl LedgerEngine {
    /// 方案中某需求行的物理产出重量
    ///
    /// # 规则
    /// - Σ 段重量 × (分条宽度 / 钢卷宽度) × 条数,仅计成品分条
    pub fn physical_output_kg(plan: &CuttingPlan, coil_width_mm: f64, demand_id: &str) -> f64 {
        if coil_width_mm <= 0.0 {
            return 0.0;
        }
        plan.segments
            .iter()
            .map(|segment| {
                segment
                    .strips
                    .iter()
                    .filter(|s| s.is_product() && s.demand_id.as_deref() == Some(demand_id))
                    .map(|s| segment.processing_weight_kg * s.width_ratio(coil_width_mm))
                    .sum::<f64>()
            })
            .sum()
    }

    /// 计算方案对全部需求行的入账影响
    ///
    /// # 规则
    /// 1. 实际定额 = 标准定额按钢卷厚度折算
    /// 2. 实际定额 > 0: 件数 = floor(物理产出 / 实际定额),抵扣 = 件数 × 标准定额
    /// 3. 实际定额 = 0: 抵扣物理产出,件数记 0
    /// 4. 抵扣 > 0.001 或 件数 > 0 时入账,新余额 = round2(余额 + round2(抵扣))
    ///
    /// # 返回
    /// 按 `demands` 顺序排列的入账结果 (未受影响的需求行不出现)
    pub fn compute_impacts(
        plan: &CuttingPlan,
        coil: &Coil,
        demands: &[DemandLine],
    ) -> Vec<BalanceChange> {
        let mut changes = Vec::new();

        for demand in demands {
            let physical = Self::physical_output_kg(plan, coil.width_mm, &demand.demand_id);
            if physical <= 0.0 {
                continue;
            }

            let actual_quota =
                CompatibilityCore::adjusted_quota(demand.quota_kg, demand.thickness_mm, coil.thickness_mm);

            let (pieces, deduction) = if actual_quota > 0.0 {
                let pieces = CompatibilityCore::pieces_from_weight(physical, actual_quota);
                (pieces, pieces as f64 * demand.quota_kg)
            } else {
                tracing::warn!(
                    demand_id = %demand.demand_id,
                    quota_kg = demand.quota_kg,
                    thickness_mm = demand.thickness_mm,
                    "实际定额不可用,按物理重量抵扣"
                );
                (0, physical)
            };

            if deduction > NEGLIGIBLE_DEDUCTION_KG || pieces > 0 {
                let deducted = round_to(deduction, 2);
                changes.push(BalanceChange {
                    impact: PlanImpact {
                        demand_id: demand.demand_id.clone(),
                        material_code: demand.material_code.clone(),
                        material_name: demand.name.clone(),
                        weight_deducted_kg: deducted,
                        pieces_deducted: pieces,
                    },
                    new_balance_kg: round_to(demand.balance_kg + deducted, 2),
                });
            }
        }

        changes
    }

    /// 投产后的钢卷剩余重量 (接近 0 时清零,保留 1 位)
    pub fn remaining_after_execution(remaining_kg: f64, consumed_kg: f64) -> f64 {
        let next = remaining_kg - consumed_kg;
        if next < COIL_ZERO_TOLERANCE_KG {
            return 0.0;
        }
        round_to(next, 1)
    }

    /// 撤销后的钢卷剩余重量
    pub fn remaining_after_revoke(remaining_kg: f64, consumed_kg: f64) -> f64 {
        round_to(remaining_kg + consumed_kg, 1)
    }

    /// 撤销后的需求行余额 (回放快照)
    pub fn balance_after_revoke(balance_kg: f64, impact: &PlanImpact) -> f64 {
        round_to(balance_kg - impact.weight_deducted_kg, 2)
    }
}
