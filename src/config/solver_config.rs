use serde::{Deserialize, Serialize};

/// 切分求解参数
///
/// 存储位置：config_kv（scope_id='global'），缺失键使用默认值。
/// 加分项为经验值，只要求保持 急单 > 同级匹配 > 欠料量 的相对顺序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// 单段最大分条数
    pub max_strips_per_segment: u32,

    /// 单方案最大分段数
    pub max_segments_per_plan: usize,

    /// 穷举搜索时间预算（毫秒）
    pub search_time_budget_ms: u64,

    /// 贪心种子数量（按评分取前 N 个宽度选项）
    pub greedy_seed_limit: usize,

    /// 欠料超产比例上限（1.10 = 允许超产 10%）
    pub overstock_ratio: f64,

    /// 欠料超产绝对缓冲（kg）
    pub overstock_buffer_kg: f64,

    /// 备库物料产出上限（kg）
    pub stock_cap_kg: f64,

    /// 方案利用率门槛（%）
    pub efficiency_threshold_pct: f64,

    /// 尾料阈值：剩余低于此值时整卷投完（kg）
    pub min_tail_weight_kg: f64,

    /// 分段重量取整步长（kg）
    pub weight_step_kg: f64,

    /// 急单加分
    pub urgent_bonus: f64,

    /// 牌号完全匹配加分
    pub grade_match_bonus: f64,

    /// 欠料判定阈值（余额 < -epsilon 视为欠料）
    pub shortage_epsilon_kg: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_strips_per_segment: 9,
            max_segments_per_plan: 3,
            search_time_budget_ms: 3_000,
            greedy_seed_limit: 40,
            overstock_ratio: 1.10,
            overstock_buffer_kg: 200.0,
            stock_cap_kg: 1_500.0,
            efficiency_threshold_pct: 96.0,
            min_tail_weight_kg: 50.0,
            weight_step_kg: 10.0,
            urgent_bonus: 10_000_000.0,
            grade_match_bonus: 5_000.0,
            shortage_epsilon_kg: 0.1,
        }
    }
}

impl SolverConfig {
    /// 校验参数合法性
    ///
    /// # 返回
    /// - Ok(()): 参数合法
    /// - Err(String): 第一个不合法项的说明
    pub fn validate(&self) -> Result<(), String> {
        if self.max_strips_per_segment == 0 {
            return Err("max_strips_per_segment 必须大于 0".to_string());
        }
        if !(1..=3).contains(&self.max_segments_per_plan) {
            return Err(format!(
                "max_segments_per_plan 必须在 1~3 之间: {}",
                self.max_segments_per_plan
            ));
        }
        if self.weight_step_kg <= 0.0 {
            return Err("weight_step_kg 必须大于 0".to_string());
        }
        if self.overstock_ratio < 1.0 {
            return Err(format!("overstock_ratio 不能小于 1.0: {}", self.overstock_ratio));
        }
        if !(0.0..=100.0).contains(&self.efficiency_threshold_pct) {
            return Err(format!(
                "efficiency_threshold_pct 必须在 0~100 之间: {}",
                self.efficiency_threshold_pct
            ));
        }
        // 加分相对顺序: 急单 > 同级匹配 > 0
        if !(self.urgent_bonus > self.grade_match_bonus && self.grade_match_bonus > 0.0) {
            return Err(format!(
                "加分顺序必须满足 urgent_bonus({}) > grade_match_bonus({}) > 0",
                self.urgent_bonus, self.grade_match_bonus
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bonus_order_violation() {
        let config = SolverConfig {
            urgent_bonus: 100.0,
            grade_match_bonus: 5_000.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SolverConfig =
            serde_json::from_str(r#"{"efficiency_threshold_pct": 97.5}"#).unwrap();
        assert_eq!(config.efficiency_threshold_pct, 97.5);
        assert_eq!(config.max_strips_per_segment, 9);
    }
}
