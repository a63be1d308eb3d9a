// ==========================================
// 钢卷纵剪排产系统 - 排产方案 API
// ==========================================
// 职责: 选卷、生成切分方案、急单推荐钢卷、方案明细预览
// 说明: 方案为临时提案,不落库;投产时由调用方回传选中的方案
// ==========================================

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::coil::Coil;
use crate::domain::plan::CuttingPlan;
use crate::domain::types::{NoPlanReason, PlanMode};
use crate::engine::{CoilMatcher, CoilRecommendation, PlanAssembler, PlanPreview, PlanPreviewRow};
use crate::repository::{CoilRepository, DemandLineRepository};

// ==========================================
// 请求/响应
// ==========================================

/// 方案生成请求
///
/// - 备库模式: 必须指定 coil_id
/// - 急单模式: 必须指定 urgent_demand_id;未指定 coil_id 时自动推荐钢卷
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningRequest {
    pub coil_id: Option<String>,
    pub mode: PlanMode,
    pub urgent_demand_id: Option<String>,
}

/// 方案生成结果
#[derive(Debug, Clone, Serialize)]
pub struct PlanningOutcome {
    pub coil: Option<Coil>,
    pub plans: Vec<CuttingPlan>,
    pub compatible_count: usize,
    pub no_plan_reason: Option<NoPlanReason>,
    pub message: String,
    pub coil_recommendation: Option<String>, // 急单自动选卷时的推荐理由
}

// ==========================================
// PlanningApi - 排产方案 API
// ==========================================
pub struct PlanningApi {
    coil_repo: Arc<CoilRepository>,
    demand_repo: Arc<DemandLineRepository>,
    config_manager: Arc<ConfigManager>,
}

impl PlanningApi {
    pub fn new(
        coil_repo: Arc<CoilRepository>,
        demand_repo: Arc<DemandLineRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            coil_repo,
            demand_repo,
            config_manager,
        }
    }

    /// 生成切分方案
    pub fn generate_plans(&self, request: &PlanningRequest) -> ApiResult<PlanningOutcome> {
        self.generate_plans_inner(request, None)
    }

    /// 生成切分方案 (可取消)
    ///
    /// 取消标记置位后,穷举搜索立即结束并采用已找到的最优组合
    pub fn generate_plans_with_cancel(
        &self,
        request: &PlanningRequest,
        cancel_flag: Arc<AtomicBool>,
    ) -> ApiResult<PlanningOutcome> {
        self.generate_plans_inner(request, Some(cancel_flag))
    }

    #[instrument(skip(self, cancel_flag), fields(mode = %request.mode))]
    fn generate_plans_inner(
        &self,
        request: &PlanningRequest,
        cancel_flag: Option<Arc<AtomicBool>>,
    ) -> ApiResult<PlanningOutcome> {
        let demands = self.demand_repo.list_all()?;

        let urgent_demand_id = match request.mode {
            PlanMode::Urgent => {
                let id = request
                    .urgent_demand_id
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| ApiError::InvalidInput("急单模式必须指定急单物料".to_string()))?;
                if !demands.iter().any(|d| d.demand_id == id) {
                    return Err(ApiError::NotFound(format!("物料{}不存在", id)));
                }
                Some(id)
            }
            PlanMode::Stock => None,
        };

        // 选卷
        let mut recommendation_reason = None;
        let coil = match request.coil_id.as_deref() {
            Some(coil_id) => self
                .coil_repo
                .find_by_id(coil_id)?
                .ok_or_else(|| ApiError::NotFound(format!("钢卷{}不存在", coil_id)))?,
            None => {
                let urgent_id = urgent_demand_id
                    .ok_or_else(|| ApiError::InvalidInput("备库模式必须指定钢卷".to_string()))?;
                let recommendation = self.recommend_coil(urgent_id)?;
                match recommendation.coil {
                    Some(coil) => {
                        recommendation_reason = Some(recommendation.reason);
                        coil
                    }
                    None => {
                        tracing::info!(urgent_demand_id = urgent_id, "急单无兼容钢卷");
                        let reason = NoPlanReason::NoViableDemand;
                        return Ok(PlanningOutcome {
                            coil: None,
                            plans: Vec::new(),
                            compatible_count: 0,
                            no_plan_reason: Some(reason),
                            message: recommendation.reason,
                            coil_recommendation: None,
                        });
                    }
                }
            }
        };

        if !coil.is_available() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "钢卷{}剩余重量{}kg,不足以排产",
                coil.mother_coil_id, coil.remaining_weight_kg
            )));
        }

        let config = self.config_manager.load_solver_config()?;
        let threshold = config.efficiency_threshold_pct;
        let mut assembler = PlanAssembler::new(config);
        if let Some(flag) = cancel_flag {
            assembler = assembler.with_cancel_flag(flag);
        }

        let report = assembler.assemble(&coil, &demands, request.mode, urgent_demand_id);
        let no_plan_reason = report.no_plan_reason();
        let message = match no_plan_reason {
            Some(reason) => reason.advice(report.compatible_count, threshold),
            None => format!("已生成 {} 个方案", report.plans.len()),
        };

        Ok(PlanningOutcome {
            coil: Some(coil),
            plans: report.plans,
            compatible_count: report.compatible_count,
            no_plan_reason,
            message,
            coil_recommendation: recommendation_reason,
        })
    }

    /// 为急单物料推荐钢卷
    #[instrument(skip(self))]
    pub fn recommend_coil(&self, urgent_demand_id: &str) -> ApiResult<CoilRecommendation> {
        let demand = self
            .demand_repo
            .find_by_id(urgent_demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("物料{}不存在", urgent_demand_id)))?;
        let coils = self.coil_repo.list_available()?;
        let recommendation = CoilMatcher::recommend(&demand, &coils);
        tracing::debug!(reason = %recommendation.reason, "钢卷推荐完成");
        Ok(recommendation)
    }

    /// 方案明细预览 (逐段逐分条)
    pub fn preview_plan(&self, plan: &CuttingPlan, coil_id: &str) -> ApiResult<Vec<PlanPreviewRow>> {
        let coil = self
            .coil_repo
            .find_by_id(coil_id)?
            .ok_or_else(|| ApiError::NotFound(format!("钢卷{}不存在", coil_id)))?;
        let demands = self.demand_repo.list_all()?;
        Ok(PlanPreview::build(plan, &coil, &demands))
    }
}
