// ==========================================
// 钢卷纵剪排产系统 - 领域模型层
// ==========================================
// 职责: 定义母卷、欠料需求、切分方案、投产台账等实体
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod coil;
pub mod ledger;
pub mod material;
pub mod plan;
pub mod types;

// 重导出核心类型
pub use coil::{Coil, CoilSpec, MIN_AVAILABLE_COIL_WEIGHT_KG};
pub use ledger::{ExecutionReceipt, ExecutionRecord, PlanImpact, RevokeOutcome};
pub use material::{CandidateWidth, DemandLine};
pub use plan::{CuttingPlan, PlanSegment, Strip, SCRAP_MATERIAL_CODE};
pub use types::{Coating, NoPlanReason, PlanMode, SteelGrade, SurfaceType, UsageType};
