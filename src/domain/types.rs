// ==========================================
// 钢卷纵剪排产系统 - 领域类型定义
// ==========================================
// 职责: 牌号/锌层/表面处理/用途/排产模式等固定取值
// 红线: 牌号替代只允许高代低,不允许低代高
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 钢种牌号 (Steel Grade)
// ==========================================
// 顺序: DX51D < DX52D < DX53D < DX54D
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum SteelGrade {
    #[default]
    #[serde(rename = "DX51D")]
    Dx51d,
    #[serde(rename = "DX52D")]
    Dx52d,
    #[serde(rename = "DX53D")]
    Dx53d,
    #[serde(rename = "DX54D")]
    Dx54d,
}

impl SteelGrade {
    /// 牌号等级 (1~4),用于高代低判定
    pub fn rank(&self) -> u8 {
        match self {
            SteelGrade::Dx51d => 1,
            SteelGrade::Dx52d => 2,
            SteelGrade::Dx53d => 3,
            SteelGrade::Dx54d => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SteelGrade::Dx51d => "DX51D",
            SteelGrade::Dx52d => "DX52D",
            SteelGrade::Dx53d => "DX53D",
            SteelGrade::Dx54d => "DX54D",
        }
    }

    /// 从数据库字符串解析,未知值返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DX51D" => Some(SteelGrade::Dx51d),
            "DX52D" => Some(SteelGrade::Dx52d),
            "DX53D" => Some(SteelGrade::Dx53d),
            "DX54D" => Some(SteelGrade::Dx54d),
            _ => None,
        }
    }

    pub fn all() -> [SteelGrade; 4] {
        [
            SteelGrade::Dx51d,
            SteelGrade::Dx52d,
            SteelGrade::Dx53d,
            SteelGrade::Dx54d,
        ]
    }
}

impl fmt::Display for SteelGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 锌层等级 (Coating Class)
// ==========================================
// 序列化格式: 整数 80 / 180 (与导入数据一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Coating {
    #[default]
    Z80,
    Z180,
}

impl Coating {
    pub fn grams(&self) -> u16 {
        match self {
            Coating::Z80 => 80,
            Coating::Z180 => 180,
        }
    }

    pub fn from_grams(value: i64) -> Option<Self> {
        match value {
            80 => Some(Coating::Z80),
            180 => Some(Coating::Z180),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Coating {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Coating::from_grams(value as i64).ok_or_else(|| format!("无效锌层: {}", value))
    }
}

impl From<Coating> for u16 {
    fn from(value: Coating) -> Self {
        value.grams()
    }
}

impl fmt::Display for Coating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Z{}", self.grams())
    }
}

// ==========================================
// 表面处理 (Surface Treatment)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SurfaceType {
    #[default]
    #[serde(rename = "Y")]
    Oiled, // 涂油/未钝化
    #[serde(rename = "FY")]
    Passivated, // 钝化
}

impl SurfaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceType::Oiled => "Y",
            SurfaceType::Passivated => "FY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "Y" => Some(SurfaceType::Oiled),
            "FY" => Some(SurfaceType::Passivated),
            _ => None,
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 分条用途 (Strip Usage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageType {
    Product, // 成品
    Scrap,   // 余边
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageType::Product => write!(f, "PRODUCT"),
            UsageType::Scrap => write!(f, "SCRAP"),
        }
    }
}

// ==========================================
// 排产模式 (Plan Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    #[default]
    Stock, // 按库存选卷
    Urgent, // 急单优先
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanMode::Stock => write!(f, "stock"),
            PlanMode::Urgent => write!(f, "urgent"),
        }
    }
}

// ==========================================
// 无方案原因 (No Plan Reason)
// ==========================================
// 区分"数据问题"与"钢卷不合适",供上层给出不同建议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoPlanReason {
    NoViableDemand,           // 无兼容欠料
    EfficiencyBelowThreshold, // 有方案但利用率不达标
}

impl NoPlanReason {
    /// 面向操作员的建议文案
    pub fn advice(&self, compatible_count: usize, threshold_pct: f64) -> String {
        match self {
            NoPlanReason::NoViableDemand => "没有找到任何兼容的欠料。请检查：\n\
                 1. 欠料清单中是否有欠重 < 0 的物料？\n\
                 2. 牌号/锌层是否匹配？\n\
                 3. 厚度差异是否 > 0.05mm？"
                .to_string(),
            NoPlanReason::EfficiencyBelowThreshold => format!(
                "找到 {} 个兼容物料，但未能生成满足 >{}% 利用率的方案。\n请尝试更换宽度更合适的钢卷。",
                compatible_count, threshold_pct
            ),
        }
    }
}

impl fmt::Display for NoPlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoPlanReason::NoViableDemand => write!(f, "NO_VIABLE_DEMAND"),
            NoPlanReason::EfficiencyBelowThreshold => write!(f, "EFFICIENCY_BELOW_THRESHOLD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_rank_order() {
        let ranks: Vec<u8> = SteelGrade::all().iter().map(|g| g.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert!(SteelGrade::Dx54d > SteelGrade::Dx51d);
    }

    #[test]
    fn test_coating_serde_as_integer() {
        let json = serde_json::to_string(&Coating::Z180).unwrap();
        assert_eq!(json, "180");
        let parsed: Coating = serde_json::from_str("80").unwrap();
        assert_eq!(parsed, Coating::Z80);
        assert!(serde_json::from_str::<Coating>("120").is_err());
    }

    #[test]
    fn test_surface_parse() {
        assert_eq!(SurfaceType::parse("fy"), Some(SurfaceType::Passivated));
        assert_eq!(SurfaceType::parse("Y"), Some(SurfaceType::Oiled));
        assert_eq!(SurfaceType::parse("X"), None);
    }
}
