// ==========================================
// 钢卷纵剪排产系统 - 引擎层
// ==========================================
// 职责: 兼容性判定、切分求解、方案组装、入账计算
// 红线: Engine 不拼 SQL,不持有连接
// 红线: 求解器与入账共用 compatibility 中的定额/件数口径
// ==========================================

pub mod coil_matcher;
pub mod compatibility;
pub mod ledger;
pub mod pattern_solver;
pub mod plan_assembler;
pub mod plan_preview;

// 重导出核心引擎
pub use coil_matcher::{CoilMatcher, CoilRecommendation};
pub use compatibility::{round_to, CompatibilityCore, PIECE_EPSILON, THICKNESS_TOLERANCE_MM};
pub use ledger::{BalanceChange, LedgerEngine};
pub use pattern_solver::{PatternSolver, SearchBudget, SearchOutcome, SegmentPattern};
pub use plan_assembler::{AssemblyReport, PlanAssembler};
pub use plan_preview::{PlanPreview, PlanPreviewRow};
