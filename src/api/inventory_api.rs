// ==========================================
// 钢卷纵剪排产系统 - 库存与欠料 API
// ==========================================
// 职责: 母卷库存、欠料需求的录入/查询/删除,备库标记切换
// 说明: 解析与导入格式由外部协作方负责,此处只接收结构化记录
// ==========================================

use std::sync::Arc;
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::coil::{Coil, CoilSpec};
use crate::domain::material::DemandLine;
use crate::repository::{CoilRepository, DemandLineRepository};

// ==========================================
// InventoryApi - 库存 API
// ==========================================
pub struct InventoryApi {
    coil_repo: Arc<CoilRepository>,
    demand_repo: Arc<DemandLineRepository>,
}

impl InventoryApi {
    pub fn new(coil_repo: Arc<CoilRepository>, demand_repo: Arc<DemandLineRepository>) -> Self {
        Self {
            coil_repo,
            demand_repo,
        }
    }

    // ==========================================
    // 母卷
    // ==========================================

    /// 批量录入母卷 (同 coil_id 覆盖)
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    /// - Err(ApiError::InvalidInput): 任一记录校验失败时整批拒绝
    #[instrument(skip(self, coils), fields(count = coils.len()))]
    pub fn import_coils(&self, coils: Vec<Coil>) -> ApiResult<usize> {
        for coil in &coils {
            validate_coil(coil)?;
        }
        let count = self.coil_repo.batch_upsert(&coils)?;
        tracing::info!(count, "母卷录入完成");
        Ok(count)
    }

    pub fn add_coil(&self, coil: Coil) -> ApiResult<()> {
        validate_coil(&coil)?;
        self.coil_repo.upsert(&coil)?;
        Ok(())
    }

    pub fn get_coil(&self, coil_id: &str) -> ApiResult<Coil> {
        self.coil_repo
            .find_by_id(coil_id)?
            .ok_or_else(|| ApiError::NotFound(format!("钢卷{}不存在", coil_id)))
    }

    pub fn list_coils(&self) -> ApiResult<Vec<Coil>> {
        Ok(self.coil_repo.list_all()?)
    }

    /// 可用钢卷规格 (剩余 > 10kg)
    pub fn list_available_specs(&self) -> ApiResult<Vec<CoilSpec>> {
        Ok(self.coil_repo.list_available_specs()?)
    }

    /// 指定规格下的可用钢卷
    pub fn list_coils_by_spec(&self, spec: &CoilSpec) -> ApiResult<Vec<Coil>> {
        let coils = self
            .coil_repo
            .list_available()?
            .into_iter()
            .filter(|c| spec.matches(c))
            .collect();
        Ok(coils)
    }

    /// 删除母卷 (已投产记录保留,撤销时跳过重量恢复)
    #[instrument(skip(self))]
    pub fn delete_coil(&self, coil_id: &str) -> ApiResult<()> {
        if !self.coil_repo.delete(coil_id)? {
            return Err(ApiError::NotFound(format!("钢卷{}不存在", coil_id)));
        }
        tracing::info!(coil_id, "母卷已删除");
        Ok(())
    }

    pub fn clear_coils(&self) -> ApiResult<usize> {
        let count = self.coil_repo.clear_all()?;
        tracing::warn!(count, "母卷库存已清空");
        Ok(count)
    }

    // ==========================================
    // 欠料需求
    // ==========================================

    #[instrument(skip(self, demands), fields(count = demands.len()))]
    pub fn import_demand_lines(&self, demands: Vec<DemandLine>) -> ApiResult<usize> {
        for demand in &demands {
            validate_demand_line(demand)?;
        }
        let count = self.demand_repo.batch_upsert(&demands)?;
        tracing::info!(count, "欠料需求录入完成");
        Ok(count)
    }

    pub fn get_demand_line(&self, demand_id: &str) -> ApiResult<DemandLine> {
        self.demand_repo
            .find_by_id(demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("物料{}不存在", demand_id)))
    }

    pub fn list_demand_lines(&self) -> ApiResult<Vec<DemandLine>> {
        Ok(self.demand_repo.list_all()?)
    }

    /// 切换备库生产标记
    ///
    /// # 返回
    /// 切换后的标记值
    #[instrument(skip(self))]
    pub fn toggle_over_production(&self, demand_id: &str) -> ApiResult<bool> {
        let flag = self.demand_repo.toggle_over_production(demand_id)?;
        tracing::info!(demand_id, allow_over_production = flag, "备库标记已切换");
        Ok(flag)
    }

    pub fn delete_demand_line(&self, demand_id: &str) -> ApiResult<()> {
        if !self.demand_repo.delete(demand_id)? {
            return Err(ApiError::NotFound(format!("物料{}不存在", demand_id)));
        }
        Ok(())
    }

    pub fn clear_demand_lines(&self) -> ApiResult<usize> {
        let count = self.demand_repo.clear_all()?;
        tracing::warn!(count, "欠料清单已清空");
        Ok(count)
    }
}

// ==========================================
// 输入校验
// ==========================================

fn validate_coil(coil: &Coil) -> ApiResult<()> {
    if coil.coil_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("钢卷ID不能为空".to_string()));
    }
    if coil.width_mm <= 0.0 || coil.thickness_mm <= 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "钢卷{}宽度/厚度必须大于0",
            coil.mother_coil_id
        )));
    }
    if coil.remaining_weight_kg < 0.0 || coil.remaining_weight_kg > coil.total_weight_kg + 0.1 {
        return Err(ApiError::InvalidInput(format!(
            "钢卷{}剩余重量{}kg超出范围 (0~{}kg)",
            coil.mother_coil_id, coil.remaining_weight_kg, coil.total_weight_kg
        )));
    }
    Ok(())
}

fn validate_demand_line(demand: &DemandLine) -> ApiResult<()> {
    if demand.demand_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("物料ID不能为空".to_string()));
    }
    if demand.quota_kg < 0.0 || !demand.balance_kg.is_finite() {
        return Err(ApiError::InvalidInput(format!(
            "物料{}定额/余额非法",
            demand.material_code
        )));
    }
    if demand.spec1.width_mm < 0.0 || demand.spec2.width_mm < 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "物料{}规格宽度不能为负",
            demand.material_code
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;
    use crate::domain::types::{Coating, SteelGrade, SurfaceType};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn api() -> InventoryApi {
        let conn = Arc::new(Mutex::new(open_in_memory_connection().unwrap()));
        InventoryApi::new(
            Arc::new(CoilRepository::from_connection(conn.clone())),
            Arc::new(DemandLineRepository::from_connection(conn)),
        )
    }

    fn coil(remaining: f64) -> Coil {
        let mut c = Coil::new(
            "MC-INV",
            SteelGrade::Dx51d,
            Coating::Z80,
            SurfaceType::Oiled,
            0.8,
            1250.0,
            5000.0,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        );
        c.remaining_weight_kg = remaining;
        c
    }

    #[test]
    fn test_reject_remaining_above_total() {
        let api = api();
        let result = api.import_coils(vec![coil(4000.0), coil(6000.0)]);
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
        assert!(api.list_coils().unwrap().is_empty());
    }

    #[test]
    fn test_specs_and_filter() {
        let api = api();
        api.import_coils(vec![coil(5000.0), coil(5.0)]).unwrap();
        let specs = api.list_available_specs().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(api.list_coils_by_spec(&specs[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_coil() {
        let api = api();
        assert!(matches!(api.delete_coil("nope"), Err(ApiError::NotFound(_))));
    }
}
