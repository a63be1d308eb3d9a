// ==========================================
// 钢卷纵剪排产系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有连接的 PRAGMA 行为
// - 建表幂等,内存库与文件库共用同一套 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 文件库,应用统一配置并建表
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 打开内存库 (默认进程内存储)
pub fn open_in_memory_connection() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等）
///
/// 说明：
/// - execution_record 不对 coil 建外键：钢卷可在投产后被删除，撤销时跳过重量恢复
/// - segments_json / impacts_json 保存投产时的完整快照
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS coil (
            coil_id TEXT PRIMARY KEY,
            mother_coil_id TEXT NOT NULL,
            grade TEXT NOT NULL,
            coating INTEGER NOT NULL,
            surface TEXT NOT NULL,
            thickness_mm REAL NOT NULL,
            width_mm REAL NOT NULL,
            total_weight_kg REAL NOT NULL,
            remaining_weight_kg REAL NOT NULL,
            entry_date TEXT NOT NULL,
            last_used_at TEXT
        );

        CREATE TABLE IF NOT EXISTS demand_line (
            demand_id TEXT PRIMARY KEY,
            batch_id TEXT,
            client TEXT NOT NULL DEFAULT '',
            model TEXT NOT NULL DEFAULT '',
            material_code TEXT NOT NULL,
            sheet_metal_code TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            grade TEXT NOT NULL,
            coating INTEGER NOT NULL,
            surface TEXT NOT NULL,
            thickness_mm REAL NOT NULL,
            spec1_width_mm REAL NOT NULL DEFAULT 0,
            spec1_note TEXT,
            spec2_width_mm REAL NOT NULL DEFAULT 0,
            spec2_note TEXT,
            is_special INTEGER NOT NULL DEFAULT 0,
            quota_kg REAL NOT NULL,
            balance_kg REAL NOT NULL,
            allow_over_production INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS execution_record (
            record_id TEXT PRIMARY KEY,
            executed_at TEXT NOT NULL,
            plan_name TEXT NOT NULL,
            coil_id TEXT NOT NULL,
            mother_coil_id TEXT NOT NULL,
            total_consumed_kg REAL NOT NULL,
            efficiency_pct REAL NOT NULL,
            segments_json TEXT NOT NULL,
            impacts_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_execution_record_coil ON execution_record(coil_id);
        CREATE INDEX IF NOT EXISTS idx_execution_record_ts ON execution_record(executed_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
