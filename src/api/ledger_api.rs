// ==========================================
// 钢卷纵剪排产系统 - 投产台账 API
// ==========================================
// 职责: 方案投产入账、撤销回滚、投产历史查询
// 红线: 投产/撤销各自在单个 SQLite 事务内完成,任一步失败整体回滚
// 红线: 投产/撤销持有共享连接锁,同一时刻只有一个入账操作
// 红线: 撤销只回放 PlanImpact 快照
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, Utc};
use rusqlite::Connection;
use tracing::instrument;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::coil::Coil;
use crate::domain::ledger::{ExecutionReceipt, ExecutionRecord, RevokeOutcome};
use crate::domain::plan::CuttingPlan;
use crate::engine::{round_to, LedgerEngine};
use crate::repository::{coil_repo, demand_repo, execution_repo, ExecutionRecordRepository};

/// 单方案最大分段数
const MAX_PLAN_SEGMENTS: usize = 3;

/// 重量校验容差 (kg)
const WEIGHT_TOLERANCE_KG: f64 = 0.1;

/// 宽度校验容差 (mm)
const WIDTH_TOLERANCE_MM: f64 = 1e-6;

// ==========================================
// LedgerApi - 投产台账 API
// ==========================================
pub struct LedgerApi {
    conn: Arc<Mutex<Connection>>,
    record_repo: Arc<ExecutionRecordRepository>,
}

impl LedgerApi {
    pub fn new(conn: Arc<Mutex<Connection>>, record_repo: Arc<ExecutionRecordRepository>) -> Self {
        Self { conn, record_repo }
    }

    fn get_conn(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    // ==========================================
    // 投产
    // ==========================================

    /// 方案投产入账
    ///
    /// # 参数
    /// - `plan`: 选中的切分方案
    /// - `coil_id`: 投产钢卷
    ///
    /// # 规则
    /// 1. 按需求行汇总物理产出,折算整件数与标准重量抵扣
    /// 2. 抵扣写入需求行余额 (2 位小数)
    /// 3. 钢卷剩余重量扣减方案总重 (接近 0 清零,1 位小数),记录最近使用时间
    /// 4. 写入不可变投产记录
    ///
    /// # 返回
    /// - Ok(ExecutionReceipt): 投产记录 + 总件数 + 钢卷剩余
    /// - Err: 校验失败或存储失败,不产生任何修改
    #[instrument(skip(self, plan), fields(plan_name = %plan.name, segments = plan.segments.len()))]
    pub fn execute_plan(&self, plan: &CuttingPlan, coil_id: &str) -> ApiResult<ExecutionReceipt> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let coil = coil_repo::find_in(&tx, coil_id)?
            .ok_or_else(|| ApiError::NotFound(format!("钢卷{}不存在", coil_id)))?;
        validate_plan(plan, &coil)?;

        // 1~2. 需求行余额
        let demands = demand_repo::list_in(&tx)?;
        let changes = LedgerEngine::compute_impacts(plan, &coil, &demands);
        for change in &changes {
            demand_repo::update_balance_in(&tx, &change.impact.demand_id, change.new_balance_kg)?;
        }

        // 3. 钢卷剩余重量
        let new_remaining =
            LedgerEngine::remaining_after_execution(coil.remaining_weight_kg, plan.processing_weight_kg);
        let consumed = round_to(coil.remaining_weight_kg - new_remaining, 2);
        coil_repo::update_usage_in(&tx, coil_id, new_remaining, Some(Local::now().naive_local()))?;

        // 4. 投产记录
        let record = ExecutionRecord {
            record_id: Uuid::new_v4().to_string(),
            executed_at: Utc::now(),
            plan_name: plan.name.clone(),
            coil_id: coil.coil_id.clone(),
            mother_coil_id: coil.mother_coil_id.clone(),
            total_consumed_kg: consumed,
            efficiency_pct: plan.efficiency_pct,
            segments: plan.segments.clone(),
            impacts: changes.into_iter().map(|c| c.impact).collect(),
        };
        execution_repo::insert_in(&tx, &record)?;

        tx.commit()?;

        let receipt = ExecutionReceipt {
            total_pieces: record.total_pieces(),
            coil_remaining_kg: new_remaining,
            record,
        };
        tracing::info!(
            record_id = %receipt.record.record_id,
            coil_id = %coil.coil_id,
            consumed_kg = consumed,
            coil_remaining_kg = new_remaining,
            impacts = receipt.record.impacts.len(),
            total_pieces = receipt.total_pieces,
            "方案投产入账完成"
        );
        Ok(receipt)
    }

    // ==========================================
    // 撤销
    // ==========================================

    /// 撤销投产记录
    ///
    /// 以库中保存的记录为准回放,传入记录只用于定位
    pub fn revoke(&self, record: &ExecutionRecord) -> ApiResult<RevokeOutcome> {
        self.revoke_record(&record.record_id)
    }

    /// 按记录ID撤销投产
    ///
    /// # 规则
    /// - 钢卷存在: 剩余重量 += 记录消耗 (1 位小数);钢卷已删除: 跳过并告警
    /// - 每个影响快照: 余额 -= 抵扣重量 (2 位小数);需求行已删除: 跳过并告警
    /// - 最后删除记录;任一步失败整体回滚
    #[instrument(skip(self))]
    pub fn revoke_record(&self, record_id: &str) -> ApiResult<RevokeOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let record = execution_repo::find_in(&tx, record_id)?
            .ok_or_else(|| ApiError::NotFound(format!("投产记录{}不存在", record_id)))?;

        // 钢卷
        let coil_restored = match coil_repo::find_in(&tx, &record.coil_id)? {
            Some(coil) => {
                let mut restored =
                    LedgerEngine::remaining_after_revoke(coil.remaining_weight_kg, record.total_consumed_kg);
                if restored > coil.total_weight_kg + WEIGHT_TOLERANCE_KG {
                    tracing::warn!(
                        coil_id = %coil.coil_id,
                        restored_kg = restored,
                        total_kg = coil.total_weight_kg,
                        "恢复后剩余重量超过总重,按总重截断"
                    );
                    restored = coil.total_weight_kg;
                }
                coil_repo::update_usage_in(&tx, &coil.coil_id, restored, None)?;
                true
            }
            None => {
                tracing::warn!(
                    coil_id = %record.coil_id,
                    mother_coil_id = %record.mother_coil_id,
                    "原钢卷已删除,跳过重量恢复"
                );
                false
            }
        };

        // 需求行余额
        let mut restored_impacts = 0usize;
        let mut skipped_demand_ids = Vec::new();
        for impact in &record.impacts {
            match demand_repo::find_in(&tx, &impact.demand_id)? {
                Some(demand) => {
                    let balance = LedgerEngine::balance_after_revoke(demand.balance_kg, impact);
                    demand_repo::update_balance_in(&tx, &demand.demand_id, balance)?;
                    restored_impacts += 1;
                }
                None => {
                    tracing::warn!(
                        demand_id = %impact.demand_id,
                        material_code = %impact.material_code,
                        "需求行已删除,跳过余额恢复"
                    );
                    skipped_demand_ids.push(impact.demand_id.clone());
                }
            }
        }

        execution_repo::delete_in(&tx, &record.record_id)?;
        tx.commit()?;

        let outcome = RevokeOutcome {
            record_id: record.record_id.clone(),
            coil_restored,
            restored_weight_kg: if coil_restored { record.total_consumed_kg } else { 0.0 },
            restored_impacts,
            skipped_demand_ids,
        };
        tracing::info!(
            record_id = %outcome.record_id,
            coil_restored,
            restored_impacts,
            skipped = outcome.skipped_demand_ids.len(),
            "投产记录已撤销"
        );
        Ok(outcome)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 投产历史 (最新在前)
    pub fn list_records(&self, limit: Option<usize>) -> ApiResult<Vec<ExecutionRecord>> {
        Ok(self.record_repo.list_recent(limit)?)
    }

    pub fn get_record(&self, record_id: &str) -> ApiResult<ExecutionRecord> {
        self.record_repo
            .find_by_id(record_id)?
            .ok_or_else(|| ApiError::NotFound(format!("投产记录{}不存在", record_id)))
    }
}

// ==========================================
// 方案校验
// ==========================================

/// 投产前校验方案结构
///
/// # 规则
/// - 分段数 1~3,总重 > 0
/// - 总重与分段重量之和一致,且不超过钢卷剩余重量
/// - 每段分条总宽不超过钢卷宽度
fn validate_plan(plan: &CuttingPlan, coil: &Coil) -> ApiResult<()> {
    if plan.segments.is_empty() || plan.segments.len() > MAX_PLAN_SEGMENTS {
        return Err(ApiError::InvalidInput(format!(
            "方案分段数必须在 1~{} 之间,实际 {}",
            MAX_PLAN_SEGMENTS,
            plan.segments.len()
        )));
    }
    if !plan.processing_weight_kg.is_finite() || plan.processing_weight_kg <= 0.0 {
        return Err(ApiError::InvalidInput("方案总重必须大于 0".to_string()));
    }
    if plan
        .segments
        .iter()
        .any(|s| !s.processing_weight_kg.is_finite() || s.processing_weight_kg < 0.0)
    {
        return Err(ApiError::InvalidInput("分段重量非法".to_string()));
    }
    if (plan.segments_weight_kg() - plan.processing_weight_kg).abs() > WEIGHT_TOLERANCE_KG {
        return Err(ApiError::InvalidInput(format!(
            "方案总重{}kg与分段重量之和{}kg不一致",
            plan.processing_weight_kg,
            plan.segments_weight_kg()
        )));
    }
    if plan.processing_weight_kg > coil.remaining_weight_kg + WEIGHT_TOLERANCE_KG {
        return Err(ApiError::BusinessRuleViolation(format!(
            "方案总重{}kg超过钢卷{}剩余重量{}kg",
            plan.processing_weight_kg, coil.mother_coil_id, coil.remaining_weight_kg
        )));
    }
    for segment in &plan.segments {
        if segment.total_strip_width_mm() > coil.width_mm + WIDTH_TOLERANCE_MM {
            return Err(ApiError::InvalidInput(format!(
                "第{}段分条总宽{}mm超过钢卷宽度{}mm",
                segment.ordinal,
                segment.total_strip_width_mm(),
                coil.width_mm
            )));
        }
    }
    Ok(())
}
