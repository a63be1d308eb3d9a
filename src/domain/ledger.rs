// ==========================================
// 钢卷纵剪排产系统 - 投产台账领域模型
// ==========================================
// 红线: 投产记录创建后不可修改
// 红线: 撤销只回放 PlanImpact 快照,不做重新计算
// ==========================================

use crate::domain::plan::PlanSegment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PlanImpact - 单个需求行的投产影响快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanImpact {
    pub demand_id: String,
    pub material_code: String, // 快照
    pub material_name: String, // 快照
    pub weight_deducted_kg: f64, // 标准重量口径
    pub pieces_deducted: u64,    // 实际产出件数
}

// ==========================================
// ExecutionRecord - 投产记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub record_id: String,
    pub executed_at: DateTime<Utc>,
    pub plan_name: String,

    // ===== 钢卷快照 =====
    pub coil_id: String,
    pub mother_coil_id: String,

    pub total_consumed_kg: f64,
    pub efficiency_pct: f64,

    pub segments: Vec<PlanSegment>,
    pub impacts: Vec<PlanImpact>,
}

impl ExecutionRecord {
    /// 产出总件数
    pub fn total_pieces(&self) -> u64 {
        self.impacts.iter().map(|i| i.pieces_deducted).sum()
    }

    /// 记录短号 (末 6 位),用于提示信息
    pub fn short_id(&self) -> &str {
        let len = self.record_id.len();
        if len > 6 {
            &self.record_id[len - 6..]
        } else {
            &self.record_id
        }
    }
}

// ==========================================
// ExecutionReceipt - 投产回执
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub record: ExecutionRecord,
    pub total_pieces: u64,
    pub coil_remaining_kg: f64,
}

impl ExecutionReceipt {
    pub fn summary(&self) -> String {
        format!(
            "投产成功 (精确入账)\n单号: #{}\n实耗库存: {} kg\n产出总件数: {} 件\n抵扣欠料: {} 项",
            self.record.short_id(),
            self.record.total_consumed_kg,
            self.total_pieces,
            self.record.impacts.len()
        )
    }
}

// ==========================================
// RevokeOutcome - 撤销结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeOutcome {
    pub record_id: String,
    pub coil_restored: bool, // 原钢卷已删除时为 false
    pub restored_weight_kg: f64,
    pub restored_impacts: usize,
    pub skipped_demand_ids: Vec<String>, // 已删除的需求行
}

impl RevokeOutcome {
    pub fn summary(&self) -> String {
        let coil_line = if self.coil_restored {
            format!("1. 钢卷库存：已恢复 +{}kg", self.restored_weight_kg)
        } else {
            "1. 钢卷库存：原钢卷已删除，无法恢复 (跳过)".to_string()
        };
        format!(
            "撤销成功\n{}\n2. 欠料数据：已回滚 {} 项记录",
            coil_line, self.restored_impacts
        )
    }
}
