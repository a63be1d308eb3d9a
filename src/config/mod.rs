// ==========================================
// 钢卷纵剪排产系统 - 配置层
// ==========================================
// 职责: 切分求解参数管理,支持运行时覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod solver_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use solver_config::SolverConfig;
