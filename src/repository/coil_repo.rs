// ==========================================
// 钢卷纵剪排产系统 - 母卷库存仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: `*_in` 系列函数接收 &Connection,供 API 层在同一事务中组合调用
// ==========================================

use crate::domain::coil::{Coil, CoilSpec, MIN_AVAILABLE_COIL_WEIGHT_KG};
use crate::domain::types::{Coating, SteelGrade, SurfaceType};
use crate::repository::error::{invalid_column, RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const COIL_COLUMNS: &str = "coil_id, mother_coil_id, grade, coating, surface, thickness_mm, width_mm, \
     total_weight_kg, remaining_weight_kg, entry_date, last_used_at";

// ==========================================
// CoilRepository - 母卷仓储
// ==========================================
pub struct CoilRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CoilRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或替换母卷
    pub fn upsert(&self, coil: &Coil) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_in(&conn, coil)
    }

    /// 批量新增或替换 (单事务)
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    pub fn batch_upsert(&self, coils: &[Coil]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for coil in coils {
            upsert_in(&tx, coil)?;
        }
        tx.commit()?;
        Ok(coils.len())
    }

    /// 按 coil_id 查询
    pub fn find_by_id(&self, coil_id: &str) -> RepositoryResult<Option<Coil>> {
        let conn = self.get_conn()?;
        find_in(&conn, coil_id)
    }

    /// 全部母卷 (按入库顺序)
    pub fn list_all(&self) -> RepositoryResult<Vec<Coil>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM coil ORDER BY rowid", COIL_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_coil_row)?;
        let coils = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(coils)
    }

    /// 可排产母卷 (剩余 > 10kg)
    pub fn list_available(&self) -> RepositoryResult<Vec<Coil>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM coil WHERE remaining_weight_kg > ?1 ORDER BY rowid",
            COIL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![MIN_AVAILABLE_COIL_WEIGHT_KG], map_coil_row)?;
        let coils = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(coils)
    }

    /// 可排产母卷中出现过的规格 (去重,按首次出现顺序)
    pub fn list_available_specs(&self) -> RepositoryResult<Vec<CoilSpec>> {
        let mut specs: Vec<CoilSpec> = Vec::new();
        for coil in self.list_available()? {
            let spec = coil.spec();
            if !specs.contains(&spec) {
                specs.push(spec);
            }
        }
        Ok(specs)
    }

    /// 删除母卷
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 记录不存在
    pub fn delete(&self, coil_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM coil WHERE coil_id = ?1", params![coil_id])?;
        Ok(affected > 0)
    }

    /// 清空母卷库存
    pub fn clear_all(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM coil", [])?;
        Ok(affected)
    }
}

// ==========================================
// 连接级函数 (事务内复用)
// ==========================================

pub(crate) fn upsert_in(conn: &Connection, coil: &Coil) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO coil (
            coil_id, mother_coil_id, grade, coating, surface, thickness_mm, width_mm,
            total_weight_kg, remaining_weight_kg, entry_date, last_used_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            coil.coil_id,
            coil.mother_coil_id,
            coil.grade.as_str(),
            coil.coating.grams(),
            coil.surface.as_str(),
            coil.thickness_mm,
            coil.width_mm,
            coil.total_weight_kg,
            coil.remaining_weight_kg,
            coil.entry_date,
            coil.last_used_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_in(conn: &Connection, coil_id: &str) -> RepositoryResult<Option<Coil>> {
    let sql = format!("SELECT {} FROM coil WHERE coil_id = ?1", COIL_COLUMNS);
    let coil = conn
        .query_row(&sql, params![coil_id], map_coil_row)
        .optional()?;
    Ok(coil)
}

/// 更新剩余重量与最近使用时间
pub(crate) fn update_usage_in(
    conn: &Connection,
    coil_id: &str,
    remaining_weight_kg: f64,
    last_used_at: Option<NaiveDateTime>,
) -> RepositoryResult<()> {
    let affected = conn.execute(
        "UPDATE coil SET remaining_weight_kg = ?2, last_used_at = COALESCE(?3, last_used_at) WHERE coil_id = ?1",
        params![coil_id, remaining_weight_kg, last_used_at],
    )?;
    if affected == 0 {
        return Err(RepositoryError::NotFound {
            entity: "Coil".to_string(),
            id: coil_id.to_string(),
        });
    }
    Ok(())
}

fn map_coil_row(row: &Row<'_>) -> rusqlite::Result<Coil> {
    let grade_raw: String = row.get(2)?;
    let grade = SteelGrade::parse(&grade_raw).ok_or_else(|| invalid_column(2, "grade", &grade_raw))?;
    let coating_raw: i64 = row.get(3)?;
    let coating = Coating::from_grams(coating_raw)
        .ok_or_else(|| invalid_column(3, "coating", &coating_raw.to_string()))?;
    let surface_raw: String = row.get(4)?;
    let surface =
        SurfaceType::parse(&surface_raw).ok_or_else(|| invalid_column(4, "surface", &surface_raw))?;

    Ok(Coil {
        coil_id: row.get(0)?,
        mother_coil_id: row.get(1)?,
        grade,
        coating,
        surface,
        thickness_mm: row.get(5)?,
        width_mm: row.get(6)?,
        total_weight_kg: row.get(7)?,
        remaining_weight_kg: row.get(8)?,
        entry_date: row.get(9)?,
        last_used_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;
    use chrono::NaiveDate;

    fn repo() -> CoilRepository {
        let conn = open_in_memory_connection().unwrap();
        CoilRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn coil(code: &str, remaining: f64) -> Coil {
        let mut c = Coil::new(
            code,
            SteelGrade::Dx52d,
            Coating::Z180,
            SurfaceType::Passivated,
            0.6,
            1219.0,
            6000.0,
            NaiveDate::from_ymd_opt(2026, 7, 12).unwrap(),
        );
        c.remaining_weight_kg = remaining;
        c
    }

    #[test]
    fn test_upsert_and_find_roundtrip() {
        let repo = repo();
        let c = coil("MC-R1", 6000.0);
        repo.upsert(&c).unwrap();
        let found = repo.find_by_id(&c.coil_id).unwrap().unwrap();
        assert_eq!(found, c);
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_available_filters_empty_coils() {
        let repo = repo();
        repo.batch_upsert(&[coil("MC-A", 6000.0), coil("MC-B", 8.0), coil("MC-C", 10.5)])
            .unwrap();
        let available: Vec<String> = repo
            .list_available()
            .unwrap()
            .into_iter()
            .map(|c| c.mother_coil_id)
            .collect();
        assert_eq!(available, vec!["MC-A", "MC-C"]);
        assert_eq!(repo.list_available_specs().unwrap().len(), 1);
    }

    #[test]
    fn test_update_usage() {
        let repo = repo();
        let c = coil("MC-U", 6000.0);
        repo.upsert(&c).unwrap();
        let used_at = NaiveDate::from_ymd_opt(2026, 7, 13)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        {
            let conn = repo.get_conn().unwrap();
            update_usage_in(&conn, &c.coil_id, 4800.0, Some(used_at)).unwrap();
            assert!(matches!(
                update_usage_in(&conn, "missing", 1.0, None),
                Err(RepositoryError::NotFound { .. })
            ));
        }
        let found = repo.find_by_id(&c.coil_id).unwrap().unwrap();
        assert_eq!(found.remaining_weight_kg, 4800.0);
        assert_eq!(found.last_used_at, Some(used_at));
    }

    #[test]
    fn test_delete_and_clear() {
        let repo = repo();
        let c = coil("MC-D", 6000.0);
        repo.batch_upsert(&[c.clone(), coil("MC-E", 100.0)]).unwrap();
        assert!(repo.delete(&c.coil_id).unwrap());
        assert!(!repo.delete(&c.coil_id).unwrap());
        assert_eq!(repo.clear_all().unwrap(), 1);
        assert!(repo.list_all().unwrap().is_empty());
    }
}
