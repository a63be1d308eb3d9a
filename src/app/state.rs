// ==========================================
// 钢卷纵剪排产系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储与台账共用同一个连接,连接锁即投产/撤销的全局临界区
// ==========================================

use std::sync::{Arc, Mutex};
use rusqlite::Connection;

use crate::api::{InventoryApi, LedgerApi, PlanningApi};
use crate::config::ConfigManager;
use crate::db::{open_in_memory_connection, open_sqlite_connection};
use crate::repository::{CoilRepository, DemandLineRepository, ExecutionRecordRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径 (内存库为 ":memory:")
    pub db_path: String,

    /// 库存与欠料API
    pub inventory_api: Arc<InventoryApi>,

    /// 排产方案API
    pub planning_api: Arc<PlanningApi>,

    /// 投产台账API
    pub ledger_api: Arc<LedgerApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 基于文件库创建AppState
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        Ok(Self::from_connection(db_path, conn))
    }

    /// 基于内存库创建AppState (进程内存储)
    pub fn in_memory() -> Result<Self, String> {
        let conn = open_in_memory_connection()
            .map_err(|e| format!("无法创建内存数据库: {}", e))?;
        Ok(Self::from_connection(":memory:".to_string(), conn))
    }

    fn from_connection(db_path: String, conn: Connection) -> Self {
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let coil_repo = Arc::new(CoilRepository::from_connection(conn.clone()));
        let demand_repo = Arc::new(DemandLineRepository::from_connection(conn.clone()));
        let record_repo = Arc::new(ExecutionRecordRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(ConfigManager::new(conn.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let inventory_api = Arc::new(InventoryApi::new(coil_repo.clone(), demand_repo.clone()));
        let planning_api = Arc::new(PlanningApi::new(
            coil_repo,
            demand_repo,
            config_manager.clone(),
        ));
        let ledger_api = Arc::new(LedgerApi::new(conn, record_repo));

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            inventory_api,
            planning_api,
            ledger_api,
            config_manager,
        }
    }
}

/// 获取默认数据库路径
///
/// # 规则
/// - 环境变量 COIL_SLITTING_DB_PATH 优先
/// - 否则使用用户数据目录下的 coil-slitting/coil_slitting.db
/// - 无法获取数据目录时回退到当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("COIL_SLITTING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./coil_slitting.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("coil-slitting");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("coil_slitting.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_in_memory_state() {
        let state = AppState::in_memory().unwrap();
        assert_eq!(state.db_path, ":memory:");
        assert!(state.inventory_api.list_coils().unwrap().is_empty());
        assert!(state.ledger_api.list_records(None).unwrap().is_empty());
    }
}
