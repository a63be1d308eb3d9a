// ==========================================
// 钢卷纵剪排产系统 - 母卷领域模型
// ==========================================
// 红线: 0 ≤ remaining_weight_kg ≤ total_weight_kg
// 红线: 剩余重量只允许由投产(扣减)与撤销(恢复)修改
// ==========================================

use crate::domain::types::{Coating, SteelGrade, SurfaceType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 可排产钢卷的最小剩余重量 (kg)
pub const MIN_AVAILABLE_COIL_WEIGHT_KG: f64 = 10.0;

// ==========================================
// Coil - 母卷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coil {
    pub coil_id: String,        // 系统ID
    pub mother_coil_id: String, // 母卷号 (人工可读)
    pub grade: SteelGrade,
    pub coating: Coating,
    pub surface: SurfaceType,
    pub thickness_mm: f64,
    pub width_mm: f64,
    pub total_weight_kg: f64,
    pub remaining_weight_kg: f64,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub last_used_at: Option<NaiveDateTime>,
}

impl Coil {
    /// 新入库母卷 (剩余重量 = 总重)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mother_coil_id: &str,
        grade: SteelGrade,
        coating: Coating,
        surface: SurfaceType,
        thickness_mm: f64,
        width_mm: f64,
        weight_kg: f64,
        entry_date: NaiveDate,
    ) -> Self {
        Self {
            coil_id: uuid::Uuid::new_v4().to_string(),
            mother_coil_id: mother_coil_id.to_string(),
            grade,
            coating,
            surface,
            thickness_mm,
            width_mm,
            total_weight_kg: weight_kg,
            remaining_weight_kg: weight_kg,
            entry_date,
            last_used_at: None,
        }
    }

    pub fn spec(&self) -> CoilSpec {
        CoilSpec {
            grade: self.grade,
            coating: self.coating,
            surface: self.surface,
            thickness_mm: self.thickness_mm,
        }
    }

    /// 剩余重量 > 10kg 才可参与排产
    pub fn is_available(&self) -> bool {
        self.remaining_weight_kg > MIN_AVAILABLE_COIL_WEIGHT_KG
    }

    /// 已消耗重量
    pub fn consumed_weight_kg(&self) -> f64 {
        (self.total_weight_kg - self.remaining_weight_kg).max(0.0)
    }
}

// ==========================================
// CoilSpec - 钢卷规格 (牌号+锌层+表面+厚度)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoilSpec {
    pub grade: SteelGrade,
    pub coating: Coating,
    pub surface: SurfaceType,
    pub thickness_mm: f64,
}

impl CoilSpec {
    pub fn matches(&self, coil: &Coil) -> bool {
        coil.grade == self.grade
            && coil.coating == self.coating
            && coil.surface == self.surface
            && (coil.thickness_mm - self.thickness_mm).abs() < 1e-9
    }
}

impl fmt::Display for CoilSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 例: DX51D+Z80-Y (0.8mm)
        write!(
            f,
            "{}+{}-{} ({}mm)",
            self.grade, self.coating, self.surface, self.thickness_mm
        )
    }
}
