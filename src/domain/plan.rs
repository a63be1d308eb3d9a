// ==========================================
// 钢卷纵剪排产系统 - 切分方案领域模型
// ==========================================
// 结构: 方案(CuttingPlan) → 分段(PlanSegment, 1~3段) → 分条(Strip)
// 方案为临时提案,只有被选中的一个会投产入账
// ==========================================

use crate::domain::types::UsageType;
use serde::{Deserialize, Serialize};

/// 余边分条的物料编码
pub const SCRAP_MATERIAL_CODE: &str = "余边";

// ==========================================
// Strip - 分条
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strip {
    pub demand_id: Option<String>, // 余边为 None
    pub material_code: String,
    pub width_mm: f64,
    pub count: u32,
    pub usage: UsageType,
}

impl Strip {
    pub fn product(demand_id: &str, material_code: &str, width_mm: f64, count: u32) -> Self {
        Self {
            demand_id: Some(demand_id.to_string()),
            material_code: material_code.to_string(),
            width_mm,
            count,
            usage: UsageType::Product,
        }
    }

    pub fn scrap(width_mm: f64) -> Self {
        Self {
            demand_id: None,
            material_code: SCRAP_MATERIAL_CODE.to_string(),
            width_mm,
            count: 1,
            usage: UsageType::Scrap,
        }
    }

    pub fn is_product(&self) -> bool {
        self.usage == UsageType::Product && self.demand_id.is_some()
    }

    /// 该分条占用的总宽度
    pub fn total_width_mm(&self) -> f64 {
        self.width_mm * self.count as f64
    }

    /// 宽度占比 (width × count / 钢卷宽度)
    pub fn width_ratio(&self, coil_width_mm: f64) -> f64 {
        if coil_width_mm <= 0.0 {
            return 0.0;
        }
        self.total_width_mm() / coil_width_mm
    }
}

// ==========================================
// PlanSegment - 分段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSegment {
    pub ordinal: u8, // 1, 2, 3
    pub strips: Vec<Strip>,
    pub processing_weight_kg: f64, // 本段消耗的母卷重量
    pub efficiency_pct: f64,       // 宽度利用率 (%)
    pub used_width_mm: f64,
}

impl PlanSegment {
    /// 成品分条数量 (余边不计)
    pub fn product_strip_count(&self) -> u32 {
        self.strips
            .iter()
            .filter(|s| s.usage == UsageType::Product)
            .map(|s| s.count)
            .sum()
    }

    /// 全部分条占用宽度 (含余边)
    pub fn total_strip_width_mm(&self) -> f64 {
        self.strips.iter().map(|s| s.total_width_mm()).sum()
    }

    /// 成品分条占用宽度
    pub fn product_width_mm(&self) -> f64 {
        self.strips
            .iter()
            .filter(|s| s.usage == UsageType::Product)
            .map(|s| s.total_width_mm())
            .sum()
    }
}

// ==========================================
// CuttingPlan - 切分方案
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuttingPlan {
    pub plan_id: String,
    pub name: String,        // 例: "方案 A"
    pub description: String, // 例: "综合最优 · 包含急单"
    pub efficiency_pct: f64, // 按分段重量加权的利用率
    pub processing_weight_kg: f64,
    pub remaining_coil_weight_kg: f64,
    pub segments: Vec<PlanSegment>,
}

impl CuttingPlan {
    /// 分段重量之和
    pub fn segments_weight_kg(&self) -> f64 {
        self.segments.iter().map(|s| s.processing_weight_kg).sum()
    }

    /// 方案中出现的成品需求行 (去重,按出现顺序)
    pub fn product_demand_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for strip in self.segments.iter().flat_map(|s| s.strips.iter()) {
            if let (UsageType::Product, Some(id)) = (strip.usage, strip.demand_id.as_ref()) {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }
}
