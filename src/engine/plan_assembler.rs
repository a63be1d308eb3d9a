// ==========================================
// 钢卷纵剪排产系统 - 多段方案组装器
// ==========================================
// 职责: 以前 3 个单段模式为种子,模拟整卷 1~3 段投产,输出完整方案
// 红线: 每段重量受欠料上限约束,不得把需求行推过允许产出上限
// 红线: 方案总重量 <= 钢卷剩余重量
// 红线: 模拟只作用于需求行副本,不修改输入
// ==========================================

use crate::config::SolverConfig;
use crate::domain::coil::Coil;
use crate::domain::material::DemandLine;
use crate::domain::plan::{CuttingPlan, PlanSegment, Strip};
use crate::domain::types::{NoPlanReason, PlanMode};
use crate::engine::compatibility::{round_to, CompatibilityCore};
use crate::engine::pattern_solver::{PatternSolver, SegmentPattern};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// 种子数量 (即最多输出的方案数)
const SEED_COUNT: usize = 3;

const PLAN_NAMES: [&str; SEED_COUNT] = ["方案 A", "方案 B", "方案 C"];

// ==========================================
// AssemblyReport - 组装结果
// ==========================================
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub plans: Vec<CuttingPlan>, // 已过门槛,按利用率降序
    pub compatible_count: usize, // 兼容且需要生产的需求行数
    pub generated_count: usize,  // 过滤前生成的方案数
    pub threshold_pct: f64,
}

impl AssemblyReport {
    /// 无方案时的原因
    ///
    /// # 返回
    /// - None: 至少有一个方案
    /// - NoViableDemand: 没有可生产的兼容需求行,或一个方案都没生成
    /// - EfficiencyBelowThreshold: 生成了方案但都未达门槛
    pub fn no_plan_reason(&self) -> Option<NoPlanReason> {
        if !self.plans.is_empty() {
            return None;
        }
        if self.compatible_count == 0 || self.generated_count == 0 {
            Some(NoPlanReason::NoViableDemand)
        } else {
            Some(NoPlanReason::EfficiencyBelowThreshold)
        }
    }
}

// ==========================================
// PlanAssembler - 多段方案组装器
// ==========================================
pub struct PlanAssembler {
    config: SolverConfig,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl PlanAssembler {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            cancel_flag: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    fn solver(&self) -> PatternSolver {
        let solver = PatternSolver::new(self.config.clone());
        match &self.cancel_flag {
            Some(flag) => solver.with_cancel_flag(flag.clone()),
            None => solver,
        }
    }

    /// 为指定钢卷生成候选方案
    ///
    /// # 参数
    /// - `coil`: 目标钢卷
    /// - `demands`: 全部需求行 (内部做兼容性过滤)
    /// - `mode`: 备库 / 急单
    /// - `urgent_demand_id`: 急单需求行,仅在急单模式下生效
    ///
    /// # 返回
    /// 利用率达到门槛的方案 (最多 3 个),按利用率降序
    #[instrument(skip(self, coil, demands), fields(
        coil_id = %coil.coil_id,
        mother_coil_id = %coil.mother_coil_id,
        mode = %mode
    ))]
    pub fn assemble(
        &self,
        coil: &Coil,
        demands: &[DemandLine],
        mode: PlanMode,
        urgent_demand_id: Option<&str>,
    ) -> AssemblyReport {
        let urgent = match mode {
            PlanMode::Urgent => urgent_demand_id,
            PlanMode::Stock => None,
        };

        let compatible: Vec<DemandLine> = demands
            .iter()
            .filter(|d| CompatibilityCore::is_compatible(coil, d))
            .cloned()
            .collect();
        let compatible_count = compatible
            .iter()
            .filter(|d| d.needs_production(self.config.shortage_epsilon_kg))
            .count();

        let solver = self.solver();
        let seed_patterns = solver.solve(coil, &compatible, urgent);

        // 急单模式只保留含急单的种子,一个都没有时退回全部
        let seeds: Vec<&SegmentPattern> = if urgent.is_some() && seed_patterns.iter().any(|p| p.has_urgent) {
            seed_patterns.iter().filter(|p| p.has_urgent).collect()
        } else {
            seed_patterns.iter().collect()
        };

        let mut generated: Vec<CuttingPlan> = Vec::new();
        for (index, seed) in seeds.into_iter().take(SEED_COUNT).enumerate() {
            if let Some(plan) = self.simulate_plan(&solver, coil, &compatible, seed, urgent, index) {
                generated.push(plan);
            }
        }
        let generated_count = generated.len();

        let threshold = self.config.efficiency_threshold_pct;
        let mut plans: Vec<CuttingPlan> = generated
            .into_iter()
            .filter(|p| p.efficiency_pct >= threshold)
            .collect();
        plans.sort_by(|a, b| b.efficiency_pct.total_cmp(&a.efficiency_pct));

        tracing::info!(
            compatible_count,
            generated_count,
            accepted_count = plans.len(),
            threshold_pct = threshold,
            "切分方案生成完成"
        );

        AssemblyReport {
            plans,
            compatible_count,
            generated_count,
            threshold_pct: threshold,
        }
    }

    /// 从一个种子模式出发模拟整卷投产
    fn simulate_plan(
        &self,
        solver: &PatternSolver,
        coil: &Coil,
        compatible: &[DemandLine],
        seed: &SegmentPattern,
        urgent: Option<&str>,
        index: usize,
    ) -> Option<CuttingPlan> {
        let mut simulated: Vec<DemandLine> = compatible.to_vec();
        let mut remaining = coil.remaining_weight_kg;
        let mut segments: Vec<PlanSegment> = Vec::new();
        let mut pattern = seed.clone();

        loop {
            let weight = self.segment_weight(&pattern.strips, coil.width_mm, remaining, &simulated);
            if weight <= 0.0 {
                break;
            }

            segments.push(PlanSegment {
                ordinal: segments.len() as u8 + 1,
                strips: pattern.strips.clone(),
                processing_weight_kg: weight,
                efficiency_pct: pattern.efficiency_pct,
                used_width_mm: pattern.used_width_mm,
            });
            remaining -= weight;
            apply_simulated_output(&pattern.strips, weight, coil.width_mm, &mut simulated);

            if remaining <= self.config.min_tail_weight_kg
                || segments.len() >= self.config.max_segments_per_plan
            {
                break;
            }
            match solver.solve(coil, &simulated, urgent).into_iter().next() {
                Some(next) => pattern = next,
                None => break,
            }
        }

        if segments.is_empty() {
            return None;
        }

        let total_weight: f64 = segments.iter().map(|s| s.processing_weight_kg).sum();
        let weighted: f64 = segments
            .iter()
            .map(|s| s.efficiency_pct * s.processing_weight_kg)
            .sum();
        let divisor = if total_weight > 0.0 { total_weight } else { 1.0 };

        Some(CuttingPlan {
            plan_id: Uuid::new_v4().to_string(),
            name: PLAN_NAMES[index.min(SEED_COUNT - 1)].to_string(),
            description: describe_plan(coil, compatible, seed, urgent, index),
            efficiency_pct: round_to(weighted / divisor, 2),
            processing_weight_kg: total_weight,
            remaining_coil_weight_kg: remaining.max(0.0),
            segments,
        })
    }

    /// 计算分段重量 (瓶颈重量)
    ///
    /// # 规则
    /// - 宽度占比 ratio = 宽度 × 条数 / 钢卷宽度
    /// - 欠料行允许产出 = max(欠料 × overstock_ratio, 欠料 + overstock_buffer_kg)
    /// - 备库行允许产出 = stock_cap_kg;其他行为 0
    /// - 段重量 = min(可用重量, 允许产出 / ratio),向下取整到 weight_step_kg
    /// - 取整后剩余 < min_tail_weight_kg 时,整卷投完
    pub fn segment_weight(
        &self,
        strips: &[Strip],
        coil_width_mm: f64,
        available_kg: f64,
        demands: &[DemandLine],
    ) -> f64 {
        let mut max_input = available_kg;

        for strip in strips.iter().filter(|s| s.is_product()) {
            let demand = match demands
                .iter()
                .find(|d| Some(d.demand_id.as_str()) == strip.demand_id.as_deref())
            {
                Some(d) => d,
                None => continue,
            };
            let ratio = strip.width_ratio(coil_width_mm);
            if ratio <= 0.0 {
                continue;
            }

            let allowed_output = if demand.is_short(self.config.shortage_epsilon_kg) {
                let shortage = demand.shortage_kg();
                (shortage * self.config.overstock_ratio).max(shortage + self.config.overstock_buffer_kg)
            } else if demand.allow_over_production {
                self.config.stock_cap_kg
            } else {
                0.0
            };

            max_input = max_input.min(allowed_output / ratio);
        }

        let step = self.config.weight_step_kg;
        let weight = ((max_input / step).floor() * step).max(0.0);
        if available_kg - weight < self.config.min_tail_weight_kg {
            return available_kg.max(0.0);
        }
        weight
    }
}

/// 把本段产出计入模拟余额 (欠料向 0 靠拢)
fn apply_simulated_output(
    strips: &[Strip],
    segment_weight_kg: f64,
    coil_width_mm: f64,
    demands: &mut [DemandLine],
) {
    for strip in strips.iter().filter(|s| s.is_product()) {
        if let Some(demand) = demands
            .iter_mut()
            .find(|d| Some(d.demand_id.as_str()) == strip.demand_id.as_deref())
        {
            demand.balance_kg += segment_weight_kg * strip.width_ratio(coil_width_mm);
        }
    }
}

/// 方案说明: 综合最优/备选方案 + 急单标记 + 同级匹配标记
fn describe_plan(
    coil: &Coil,
    demands: &[DemandLine],
    seed: &SegmentPattern,
    urgent: Option<&str>,
    index: usize,
) -> String {
    let mut description = if index == 0 {
        "综合最优".to_string()
    } else {
        "备选方案".to_string()
    };

    if urgent.is_some() && seed.has_urgent {
        description.push_str(" · 包含急单");
    }

    let dominant = seed
        .dominant_demand_id
        .as_deref()
        .and_then(|id| demands.iter().find(|d| d.demand_id == id));
    if let Some(d) = dominant {
        if d.grade == coil.grade {
            description.push_str(&format!(" · 同级匹配 ({})", d.grade));
        }
    }

    description
}
