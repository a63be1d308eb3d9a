// ==========================================
// 钢卷纵剪排产系统 - 投产记录仓储
// ==========================================
// 红线: 记录只增不改,撤销时整条删除
// 存储: 分段与影响快照以 JSON 存储 (segments_json / impacts_json)
// ==========================================

use crate::domain::ledger::ExecutionRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const RECORD_COLUMNS: &str = "record_id, executed_at, plan_name, coil_id, mother_coil_id, \
     total_consumed_kg, efficiency_pct, segments_json, impacts_json";

// ==========================================
// ExecutionRecordRepository - 投产记录仓储
// ==========================================
pub struct ExecutionRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExecutionRecordRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<ExecutionRecord>> {
        let conn = self.get_conn()?;
        find_in(&conn, record_id)
    }

    /// 投产历史 (最新在前)
    pub fn list_recent(&self, limit: Option<usize>) -> RepositoryResult<Vec<ExecutionRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM execution_record ORDER BY executed_at DESC, rowid DESC LIMIT ?1",
            RECORD_COLUMNS
        );
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], read_raw_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

// ==========================================
// 连接级函数 (事务内复用)
// ==========================================

pub(crate) fn insert_in(conn: &Connection, record: &ExecutionRecord) -> RepositoryResult<()> {
    let segments_json = serde_json::to_string(&record.segments)?;
    let impacts_json = serde_json::to_string(&record.impacts)?;
    conn.execute(
        r#"
        INSERT INTO execution_record (
            record_id, executed_at, plan_name, coil_id, mother_coil_id,
            total_consumed_kg, efficiency_pct, segments_json, impacts_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            record.record_id,
            record.executed_at,
            record.plan_name,
            record.coil_id,
            record.mother_coil_id,
            record.total_consumed_kg,
            record.efficiency_pct,
            segments_json,
            impacts_json,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_in(conn: &Connection, record_id: &str) -> RepositoryResult<Option<ExecutionRecord>> {
    let sql = format!("SELECT {} FROM execution_record WHERE record_id = ?1", RECORD_COLUMNS);
    let raw = conn
        .query_row(&sql, params![record_id], read_raw_row)
        .optional()?;
    raw.map(RawRecord::into_record).transpose()
}

pub(crate) fn delete_in(conn: &Connection, record_id: &str) -> RepositoryResult<bool> {
    let affected = conn.execute(
        "DELETE FROM execution_record WHERE record_id = ?1",
        params![record_id],
    )?;
    Ok(affected > 0)
}

/// 行数据 (JSON 列尚未解析)
struct RawRecord {
    record: ExecutionRecord,
    segments_json: String,
    impacts_json: String,
}

impl RawRecord {
    fn into_record(self) -> RepositoryResult<ExecutionRecord> {
        let mut record = self.record;
        record.segments = serde_json::from_str(&self.segments_json)?;
        record.impacts = serde_json::from_str(&self.impacts_json)?;
        Ok(record)
    }
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        record: ExecutionRecord {
            record_id: row.get(0)?,
            executed_at: row.get(1)?,
            plan_name: row.get(2)?,
            coil_id: row.get(3)?,
            mother_coil_id: row.get(4)?,
            total_consumed_kg: row.get(5)?,
            efficiency_pct: row.get(6)?,
            segments: Vec::new(),
            impacts: Vec::new(),
        },
        segments_json: row.get(7)?,
        impacts_json: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;
    use crate::domain::ledger::PlanImpact;
    use crate::domain::plan::{PlanSegment, Strip};
    use chrono::{Duration, Utc};

    fn repo() -> ExecutionRecordRepository {
        let conn = open_in_memory_connection().unwrap();
        ExecutionRecordRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn record(id: &str, minutes_ago: i64) -> ExecutionRecord {
        ExecutionRecord {
            record_id: id.to_string(),
            executed_at: Utc::now() - Duration::minutes(minutes_ago),
            plan_name: "方案 A".to_string(),
            coil_id: "C1".to_string(),
            mother_coil_id: "MC-1".to_string(),
            total_consumed_kg: 1200.0,
            efficiency_pct: 99.84,
            segments: vec![PlanSegment {
                ordinal: 1,
                strips: vec![Strip::product("D1", "M-1", 312.0, 4), Strip::scrap(2.0)],
                processing_weight_kg: 1200.0,
                efficiency_pct: 99.84,
                used_width_mm: 1248.0,
            }],
            impacts: vec![PlanImpact {
                demand_id: "D1".to_string(),
                material_code: "M-1".to_string(),
                material_name: "侧板".to_string(),
                weight_deducted_kg: 1190.0,
                pieces_deducted: 119,
            }],
        }
    }

    #[test]
    fn test_insert_find_delete() {
        let repo = repo();
        let r = record("R1", 0);
        {
            let conn = repo.get_conn().unwrap();
            insert_in(&conn, &r).unwrap();
        }
        let found = repo.find_by_id("R1").unwrap().unwrap();
        assert_eq!(found.segments, r.segments);
        assert_eq!(found.impacts, r.impacts);
        assert_eq!(found.executed_at, r.executed_at);

        let conn = repo.get_conn().unwrap();
        assert!(delete_in(&conn, "R1").unwrap());
        assert!(!delete_in(&conn, "R1").unwrap());
    }

    #[test]
    fn test_list_newest_first() {
        let repo = repo();
        {
            let conn = repo.get_conn().unwrap();
            insert_in(&conn, &record("OLD", 30)).unwrap();
            insert_in(&conn, &record("NEW", 1)).unwrap();
            insert_in(&conn, &record("MID", 10)).unwrap();
        }
        let ids: Vec<String> = repo
            .list_recent(None)
            .unwrap()
            .into_iter()
            .map(|r| r.record_id)
            .collect();
        assert_eq!(ids, vec!["NEW", "MID", "OLD"]);
        assert_eq!(repo.list_recent(Some(1)).unwrap().len(), 1);
        assert_eq!(repo.list_recent(None).unwrap().len(), 3);
    }
}
