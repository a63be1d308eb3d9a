// ==========================================
// 钢卷纵剪排产系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 纵剪切分方案求解 + 可精确回滚的投产台账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 兼容性/求解/入账规则
pub mod engine;

// 配置层 - 求解参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Coating, NoPlanReason, PlanMode, SteelGrade, SurfaceType, UsageType};

// 领域实体
pub use domain::{
    CandidateWidth, Coil, CoilSpec, CuttingPlan, DemandLine, ExecutionReceipt, ExecutionRecord,
    PlanImpact, PlanSegment, RevokeOutcome, Strip,
};

// 引擎
pub use engine::{CoilMatcher, CompatibilityCore, LedgerEngine, PatternSolver, PlanAssembler, PlanPreview};

// 配置
pub use config::SolverConfig;

// API
pub use api::{ApiError, ApiResult, InventoryApi, LedgerApi, PlanningApi, PlanningOutcome, PlanningRequest};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "钢卷纵剪排产系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
