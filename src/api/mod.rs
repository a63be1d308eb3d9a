// ==========================================
// 钢卷纵剪排产系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供宿主进程 (CLI/服务/界面) 调用
// ==========================================

pub mod error;
pub mod inventory_api;
pub mod ledger_api;
pub mod planning_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use inventory_api::InventoryApi;
pub use ledger_api::LedgerApi;
pub use planning_api::{PlanningApi, PlanningOutcome, PlanningRequest};
