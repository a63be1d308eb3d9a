// ==========================================
// 钢卷纵剪排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::solver_config::SolverConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从共享连接创建 ConfigManager
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取数值型配置，缺失或格式错误时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(format!("配置快照序列化失败: {}", e)))
    }

    // ===== 切分求解配置 =====

    /// 加载切分求解参数
    ///
    /// # 说明
    /// - 每个键单独回退默认值
    /// - 组合后校验失败（例如加分顺序被破坏）时整体回退默认值并告警
    pub fn load_solver_config(&self) -> RepositoryResult<SolverConfig> {
        let d = SolverConfig::default();
        let config = SolverConfig {
            max_strips_per_segment: self
                .get_parsed_or_default(config_keys::MAX_STRIPS_PER_SEGMENT, d.max_strips_per_segment)?,
            max_segments_per_plan: self
                .get_parsed_or_default(config_keys::MAX_SEGMENTS_PER_PLAN, d.max_segments_per_plan)?,
            search_time_budget_ms: self
                .get_parsed_or_default(config_keys::SEARCH_TIME_BUDGET_MS, d.search_time_budget_ms)?,
            greedy_seed_limit: self
                .get_parsed_or_default(config_keys::GREEDY_SEED_LIMIT, d.greedy_seed_limit)?,
            overstock_ratio: self.get_parsed_or_default(config_keys::OVERSTOCK_RATIO, d.overstock_ratio)?,
            overstock_buffer_kg: self
                .get_parsed_or_default(config_keys::OVERSTOCK_BUFFER_KG, d.overstock_buffer_kg)?,
            stock_cap_kg: self.get_parsed_or_default(config_keys::STOCK_CAP_KG, d.stock_cap_kg)?,
            efficiency_threshold_pct: self
                .get_parsed_or_default(config_keys::EFFICIENCY_THRESHOLD_PCT, d.efficiency_threshold_pct)?,
            min_tail_weight_kg: self
                .get_parsed_or_default(config_keys::MIN_TAIL_WEIGHT_KG, d.min_tail_weight_kg)?,
            weight_step_kg: self.get_parsed_or_default(config_keys::WEIGHT_STEP_KG, d.weight_step_kg)?,
            urgent_bonus: self.get_parsed_or_default(config_keys::URGENT_BONUS, d.urgent_bonus)?,
            grade_match_bonus: self
                .get_parsed_or_default(config_keys::GRADE_MATCH_BONUS, d.grade_match_bonus)?,
            shortage_epsilon_kg: self
                .get_parsed_or_default(config_keys::SHORTAGE_EPSILON_KG, d.shortage_epsilon_kg)?,
        };

        if let Err(reason) = config.validate() {
            tracing::warn!(reason = %reason, "切分求解配置不合法，使用默认配置");
            return Ok(d);
        }
        Ok(config)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分条/分段限制
    pub const MAX_STRIPS_PER_SEGMENT: &str = "max_strips_per_segment";
    pub const MAX_SEGMENTS_PER_PLAN: &str = "max_segments_per_plan";

    // 搜索
    pub const SEARCH_TIME_BUDGET_MS: &str = "search_time_budget_ms";
    pub const GREEDY_SEED_LIMIT: &str = "greedy_seed_limit";

    // 超产控制
    pub const OVERSTOCK_RATIO: &str = "overstock_ratio";
    pub const OVERSTOCK_BUFFER_KG: &str = "overstock_buffer_kg";
    pub const STOCK_CAP_KG: &str = "stock_cap_kg";

    // 方案门槛
    pub const EFFICIENCY_THRESHOLD_PCT: &str = "efficiency_threshold_pct";

    // 分段重量
    pub const MIN_TAIL_WEIGHT_KG: &str = "min_tail_weight_kg";
    pub const WEIGHT_STEP_KG: &str = "weight_step_kg";

    // 评分
    pub const URGENT_BONUS: &str = "urgent_bonus";
    pub const GRADE_MATCH_BONUS: &str = "grade_match_bonus";
    pub const SHORTAGE_EPSILON_KG: &str = "shortage_epsilon_kg";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    fn manager() -> ConfigManager {
        let conn = open_in_memory_connection().unwrap();
        ConfigManager::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = manager().load_solver_config().unwrap();
        assert_eq!(config, SolverConfig::default());
    }

    #[test]
    fn test_override_threshold() {
        let mgr = manager();
        mgr.set_config_value(config_keys::EFFICIENCY_THRESHOLD_PCT, "97.5").unwrap();
        let config = mgr.load_solver_config().unwrap();
        assert_eq!(config.efficiency_threshold_pct, 97.5);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let mgr = manager();
        mgr.set_config_value(config_keys::MAX_STRIPS_PER_SEGMENT, "nine").unwrap();
        let config = mgr.load_solver_config().unwrap();
        assert_eq!(config.max_strips_per_segment, 9);
    }

    #[test]
    fn test_broken_bonus_order_falls_back_to_defaults() {
        let mgr = manager();
        mgr.set_config_value(config_keys::URGENT_BONUS, "10").unwrap();
        mgr.set_config_value(config_keys::EFFICIENCY_THRESHOLD_PCT, "90").unwrap();
        let config = mgr.load_solver_config().unwrap();
        assert_eq!(config, SolverConfig::default());
    }

    #[test]
    fn test_snapshot_contains_keys() {
        let mgr = manager();
        mgr.set_config_value(config_keys::STOCK_CAP_KG, "1200").unwrap();
        let snapshot = mgr.get_config_snapshot().unwrap();
        assert!(snapshot.contains("stock_cap_kg"));
    }
}
