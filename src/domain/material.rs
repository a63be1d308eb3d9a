// ==========================================
// 钢卷纵剪排产系统 - 欠料需求领域模型
// ==========================================
// 口径: balance_kg 为带符号的标准重量余额
//   负数 = 仍欠料 (需生产), 正数 = 已有库存
// 红线: 余额始终以标准厚度口径记账,与实际投产钢卷厚度无关
// ==========================================

use crate::domain::types::{Coating, SteelGrade, SurfaceType};
use serde::{Deserialize, Serialize};

// ==========================================
// CandidateWidth - 候选宽度
// ==========================================
// width_mm = 0 表示该候选宽度不存在
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateWidth {
    pub width_mm: f64,
    #[serde(default)]
    pub note: Option<String>, // 例: "*C" / "*L"
}

impl CandidateWidth {
    pub fn new(width_mm: f64) -> Self {
        Self {
            width_mm,
            note: None,
        }
    }

    pub fn with_note(width_mm: f64, note: &str) -> Self {
        Self {
            width_mm,
            note: Some(note.to_string()),
        }
    }

    pub fn is_present(&self) -> bool {
        self.width_mm > 0.0
    }

    /// 带 *C / *L 标记的宽度为特殊规格,不可被普通宽度替代
    pub fn is_strict(&self) -> bool {
        self.note
            .as_deref()
            .map(|n| {
                let upper = n.to_uppercase();
                upper.contains("*C") || upper.contains("*L")
            })
            .unwrap_or(false)
    }

    /// 宽度是否可放入给定钢卷宽度
    pub fn fits(&self, coil_width_mm: f64) -> bool {
        self.is_present() && self.width_mm <= coil_width_mm
    }
}

// ==========================================
// DemandLine - 欠料需求行 (BOM 欠料/库存行)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandLine {
    // ===== 标识与展示 =====
    pub demand_id: String,
    #[serde(default)]
    pub batch_id: Option<String>, // 导入批次
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub model: String,
    pub material_code: String, // 物料编码
    #[serde(default)]
    pub sheet_metal_code: String,
    #[serde(default)]
    pub name: String, // 物料名称

    // ===== 材质要求 =====
    pub grade: SteelGrade,
    pub coating: Coating,
    pub surface: SurfaceType,
    pub thickness_mm: f64, // 标准厚度

    // ===== 规格 =====
    pub spec1: CandidateWidth,
    #[serde(default)]
    pub spec2: CandidateWidth,
    #[serde(default)]
    pub is_special: bool,
    pub quota_kg: f64, // 标准单件重量 (kg/件)

    // ===== 余额 =====
    pub balance_kg: f64,
    #[serde(default)]
    pub allow_over_production: bool, // 允许备库生产 (有上限)
}

impl DemandLine {
    /// 是否仍欠料 (余额 < -epsilon)
    pub fn is_short(&self, epsilon_kg: f64) -> bool {
        self.balance_kg < -epsilon_kg
    }

    /// 是否需要生产: 欠料 或 允许备库
    pub fn needs_production(&self, epsilon_kg: f64) -> bool {
        self.is_short(epsilon_kg) || self.allow_over_production
    }

    /// 欠料量 (正数),无欠料时为 0
    pub fn shortage_kg(&self) -> f64 {
        (-self.balance_kg).max(0.0)
    }

    pub fn candidate_widths(&self) -> [&CandidateWidth; 2] {
        [&self.spec1, &self.spec2]
    }

    /// 是否含特殊规格标记 (任一宽度带 *C/*L)
    pub fn has_strict_width(&self) -> bool {
        self.spec1.is_strict() || self.spec2.is_strict()
    }

    /// 宽度标签: 命中带标记的候选宽度时附加标记,例 "258*C"
    pub fn width_label(&self, width_mm: f64) -> String {
        let note = self
            .candidate_widths()
            .into_iter()
            .find(|c| c.is_present() && (c.width_mm - width_mm).abs() < 1e-9)
            .and_then(|c| c.note.clone())
            .unwrap_or_default();
        format!("{}{}", width_mm, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_marker_case_insensitive() {
        assert!(CandidateWidth::with_note(258.0, "*c").is_strict());
        assert!(CandidateWidth::with_note(258.0, "*L").is_strict());
        assert!(!CandidateWidth::with_note(258.0, "*X").is_strict());
        assert!(!CandidateWidth::new(258.0).is_strict());
    }

    #[test]
    fn test_needs_production() {
        let mut line = DemandLine {
            balance_kg: -0.05,
            ..Default::default()
        };
        assert!(!line.needs_production(0.1));
        line.allow_over_production = true;
        assert!(line.needs_production(0.1));
        line.balance_kg = -500.0;
        line.allow_over_production = false;
        assert!(line.is_short(0.1));
        assert_eq!(line.shortage_kg(), 500.0);
    }

    #[test]
    fn test_width_label() {
        let line = DemandLine {
            spec1: CandidateWidth::with_note(258.0, "*C"),
            spec2: CandidateWidth::new(300.0),
            ..Default::default()
        };
        assert_eq!(line.width_label(258.0), "258*C");
        assert_eq!(line.width_label(300.0), "300");
    }
}
