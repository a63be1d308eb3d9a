// ==========================================
// 钢卷纵剪排产系统 - 欠料需求仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 余额只由投产/撤销在事务内修改 (update_balance_in)
// ==========================================

use crate::domain::material::{CandidateWidth, DemandLine};
use crate::domain::types::{Coating, SteelGrade, SurfaceType};
use crate::repository::error::{invalid_column, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const DEMAND_COLUMNS: &str = "demand_id, batch_id, client, model, material_code, sheet_metal_code, name, \
     grade, coating, surface, thickness_mm, spec1_width_mm, spec1_note, spec2_width_mm, spec2_note, \
     is_special, quota_kg, balance_kg, allow_over_production";

// ==========================================
// DemandLineRepository - 欠料需求仓储
// ==========================================
pub struct DemandLineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DemandLineRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或替换需求行
    pub fn upsert(&self, demand: &DemandLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_in(&conn, demand)
    }

    /// 批量新增或替换 (单事务)
    pub fn batch_upsert(&self, demands: &[DemandLine]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for demand in demands {
            upsert_in(&tx, demand)?;
        }
        tx.commit()?;
        Ok(demands.len())
    }

    pub fn find_by_id(&self, demand_id: &str) -> RepositoryResult<Option<DemandLine>> {
        let conn = self.get_conn()?;
        find_in(&conn, demand_id)
    }

    /// 全部需求行 (按导入顺序)
    pub fn list_all(&self) -> RepositoryResult<Vec<DemandLine>> {
        let conn = self.get_conn()?;
        list_in(&conn)
    }

    /// 切换备库生产标记
    ///
    /// # 返回
    /// - Ok(bool): 切换后的标记值
    /// - Err(NotFound): 需求行不存在
    pub fn toggle_over_production(&self, demand_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE demand_line SET allow_over_production = 1 - allow_over_production WHERE demand_id = ?1",
            params![demand_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "DemandLine".to_string(),
                id: demand_id.to_string(),
            });
        }
        let flag: bool = conn.query_row(
            "SELECT allow_over_production FROM demand_line WHERE demand_id = ?1",
            params![demand_id],
            |row| row.get(0),
        )?;
        Ok(flag)
    }

    pub fn delete(&self, demand_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM demand_line WHERE demand_id = ?1",
            params![demand_id],
        )?;
        Ok(affected > 0)
    }

    pub fn clear_all(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM demand_line", [])?;
        Ok(affected)
    }
}

// ==========================================
// 连接级函数 (事务内复用)
// ==========================================

pub(crate) fn upsert_in(conn: &Connection, demand: &DemandLine) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO demand_line (
            demand_id, batch_id, client, model, material_code, sheet_metal_code, name,
            grade, coating, surface, thickness_mm,
            spec1_width_mm, spec1_note, spec2_width_mm, spec2_note,
            is_special, quota_kg, balance_kg, allow_over_production
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
        params![
            demand.demand_id,
            demand.batch_id,
            demand.client,
            demand.model,
            demand.material_code,
            demand.sheet_metal_code,
            demand.name,
            demand.grade.as_str(),
            demand.coating.grams(),
            demand.surface.as_str(),
            demand.thickness_mm,
            demand.spec1.width_mm,
            demand.spec1.note,
            demand.spec2.width_mm,
            demand.spec2.note,
            demand.is_special,
            demand.quota_kg,
            demand.balance_kg,
            demand.allow_over_production,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_in(conn: &Connection, demand_id: &str) -> RepositoryResult<Option<DemandLine>> {
    let sql = format!("SELECT {} FROM demand_line WHERE demand_id = ?1", DEMAND_COLUMNS);
    let demand = conn
        .query_row(&sql, params![demand_id], map_demand_row)
        .optional()?;
    Ok(demand)
}

pub(crate) fn list_in(conn: &Connection) -> RepositoryResult<Vec<DemandLine>> {
    let sql = format!("SELECT {} FROM demand_line ORDER BY rowid", DEMAND_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_demand_row)?;
    let demands = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(demands)
}

/// 写入新余额
///
/// # 返回
/// - Ok(true): 已更新
/// - Ok(false): 需求行不存在
pub(crate) fn update_balance_in(
    conn: &Connection,
    demand_id: &str,
    balance_kg: f64,
) -> RepositoryResult<bool> {
    let affected = conn.execute(
        "UPDATE demand_line SET balance_kg = ?2 WHERE demand_id = ?1",
        params![demand_id, balance_kg],
    )?;
    Ok(affected > 0)
}

fn map_demand_row(row: &Row<'_>) -> rusqlite::Result<DemandLine> {
    let grade_raw: String = row.get(7)?;
    let grade = SteelGrade::parse(&grade_raw).ok_or_else(|| invalid_column(7, "grade", &grade_raw))?;
    let coating_raw: i64 = row.get(8)?;
    let coating = Coating::from_grams(coating_raw)
        .ok_or_else(|| invalid_column(8, "coating", &coating_raw.to_string()))?;
    let surface_raw: String = row.get(9)?;
    let surface =
        SurfaceType::parse(&surface_raw).ok_or_else(|| invalid_column(9, "surface", &surface_raw))?;

    Ok(DemandLine {
        demand_id: row.get(0)?,
        batch_id: row.get(1)?,
        client: row.get(2)?,
        model: row.get(3)?,
        material_code: row.get(4)?,
        sheet_metal_code: row.get(5)?,
        name: row.get(6)?,
        grade,
        coating,
        surface,
        thickness_mm: row.get(10)?,
        spec1: CandidateWidth {
            width_mm: row.get(11)?,
            note: row.get(12)?,
        },
        spec2: CandidateWidth {
            width_mm: row.get(13)?,
            note: row.get(14)?,
        },
        is_special: row.get(15)?,
        quota_kg: row.get(16)?,
        balance_kg: row.get(17)?,
        allow_over_production: row.get(18)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    fn repo() -> DemandLineRepository {
        let conn = open_in_memory_connection().unwrap();
        DemandLineRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn demand(id: &str) -> DemandLine {
        DemandLine {
            demand_id: id.to_string(),
            batch_id: Some("B-0701".to_string()),
            client: "华东客户".to_string(),
            model: "KX-9".to_string(),
            material_code: format!("M-{}", id),
            sheet_metal_code: "SM-01".to_string(),
            name: "背板".to_string(),
            grade: SteelGrade::Dx53d,
            coating: Coating::Z180,
            surface: SurfaceType::Passivated,
            thickness_mm: 0.6,
            spec1: CandidateWidth::new(258.0),
            spec2: CandidateWidth::with_note(262.0, "*L"),
            is_special: true,
            quota_kg: 3.25,
            balance_kg: -820.5,
            allow_over_production: false,
        }
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let repo = repo();
        let d = demand("D1");
        repo.upsert(&d).unwrap();
        assert_eq!(repo.find_by_id("D1").unwrap().unwrap(), d);
    }

    #[test]
    fn test_list_keeps_import_order() {
        let repo = repo();
        repo.batch_upsert(&[demand("Z"), demand("A"), demand("M")]).unwrap();
        let ids: Vec<String> = repo.list_all().unwrap().into_iter().map(|d| d.demand_id).collect();
        assert_eq!(ids, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_toggle_over_production() {
        let repo = repo();
        repo.upsert(&demand("D1")).unwrap();
        assert!(repo.toggle_over_production("D1").unwrap());
        assert!(!repo.toggle_over_production("D1").unwrap());
        assert!(matches!(
            repo.toggle_over_production("missing"),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_balance_missing_line() {
        let repo = repo();
        repo.upsert(&demand("D1")).unwrap();
        let conn = repo.get_conn().unwrap();
        assert!(update_balance_in(&conn, "D1", 100.0).unwrap());
        assert!(!update_balance_in(&conn, "D2", 100.0).unwrap());
    }
}
