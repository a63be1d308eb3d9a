// ==========================================
// 钢卷纵剪排产系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod coil_repo;
pub mod demand_repo;
pub mod error;
pub mod execution_repo;

// 重导出核心仓储
pub use coil_repo::CoilRepository;
pub use demand_repo::DemandLineRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use execution_repo::ExecutionRecordRepository;
