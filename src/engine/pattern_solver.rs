// ==========================================
// 钢卷纵剪排产系统 - 单段切分模式求解器
// ==========================================
// 职责: 给定钢卷宽度与候选需求行,生成排序后的单段切分模式
// 策略: 贪心铺排 + 限时穷举搜索,合并去重后统一排序
// 红线: 单段成品分条数 <= max_strips_per_segment
// 红线: Σ(宽度 × 条数) <= 钢卷宽度
// 红线: 穷举超时视为正常结束,返回已找到的最优组合
// ==========================================

use crate::config::SolverConfig;
use crate::domain::coil::Coil;
use crate::domain::material::DemandLine;
use crate::domain::plan::Strip;
use crate::domain::types::UsageType;
use crate::engine::compatibility::round_to;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// 宽度比较容差 (mm)
const WIDTH_EPSILON: f64 = 1e-6;

/// 穷举利用率达到此值即不再加深
const SEARCH_SATURATION_RATIO: f64 = 0.999;

/// 排序时视为效率相同的容差 (百分点)
const EFFICIENCY_TIE_PCT: f64 = 0.1;

/// 穷举结果含急单时的评分
const EXHAUSTIVE_URGENT_SCORE: f64 = 1_000_000.0;

// ==========================================
// SegmentPattern - 单段切分模式
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPattern {
    pub strips: Vec<Strip>,
    pub efficiency_pct: f64,
    pub used_width_mm: f64,
    pub priority_score: f64,
    pub dominant_demand_id: Option<String>, // 贪心种子对应的需求行
    pub has_urgent: bool,
}

impl SegmentPattern {
    pub fn product_strip_count(&self) -> u32 {
        self.strips
            .iter()
            .filter(|s| s.usage == UsageType::Product)
            .map(|s| s.count)
            .sum()
    }
}

/// 宽度选项: 一条需求行的一个候选宽度
#[derive(Debug, Clone)]
struct WidthOption<'a> {
    width_mm: f64,
    demand: &'a DemandLine,
    score: f64,
}

// ==========================================
// SearchBudget - 穷举搜索预算
// ==========================================
/// 穷举搜索的终止条件: 时间预算 + 外部取消标记
#[derive(Debug, Clone)]
pub struct SearchBudget {
    pub time_limit: Duration,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl SearchBudget {
    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            cancel_flag: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|f| f.load(AtomicOrdering::Relaxed))
            .unwrap_or(false)
    }
}

/// 穷举搜索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub widths: Vec<f64>, // 最优组合 (每个元素为一条分条)
    pub used_width_mm: f64,
    pub expanded_nodes: usize,
    pub timed_out: bool,
}

// ==========================================
// PatternSolver - 单段切分模式求解器
// ==========================================
pub struct PatternSolver {
    config: SolverConfig,
    budget: SearchBudget,
}

impl PatternSolver {
    pub fn new(config: SolverConfig) -> Self {
        let budget = SearchBudget::new(Duration::from_millis(config.search_time_budget_ms));
        Self { config, budget }
    }

    /// 附加外部取消标记 (请求超时等场景)
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.budget = self.budget.with_cancel_flag(flag);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 生成排序后的单段切分模式
    ///
    /// # 参数
    /// - `coil`: 目标钢卷 (使用宽度与牌号)
    /// - `demands`: 已通过兼容性过滤的需求行
    /// - `urgent_demand_id`: 急单需求行 (可选)
    ///
    /// # 返回
    /// 排序规则: 含急单优先 → 利用率降序 (0.1 个百分点内视为相同) → 评分降序
    #[instrument(skip(self, coil, demands), fields(
        coil_id = %coil.coil_id,
        coil_width_mm = coil.width_mm,
        demand_count = demands.len()
    ))]
    pub fn solve(
        &self,
        coil: &Coil,
        demands: &[DemandLine],
        urgent_demand_id: Option<&str>,
    ) -> Vec<SegmentPattern> {
        let coil_width = coil.width_mm;
        if coil_width <= 0.0 {
            return Vec::new();
        }

        let candidates = self.eligible_candidates(coil_width, demands);
        if candidates.is_empty() {
            tracing::debug!("无可生产的候选需求行");
            return Vec::new();
        }

        let options = self.width_options(coil, &candidates, urgent_demand_id);
        if options.is_empty() {
            return Vec::new();
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut results = self.greedy_patterns(coil_width, &options, urgent_demand_id, &mut seen);

        if let Some(pattern) = self.exhaustive_pattern(coil_width, &options, urgent_demand_id) {
            if seen.insert(pattern_signature(&pattern.strips)) {
                results.push(pattern);
            }
        }

        rank_patterns(&mut results, urgent_demand_id.is_some());

        tracing::debug!(pattern_count = results.len(), "单段切分模式生成完成");
        results
    }

    /// 过滤候选需求行: 需要生产 且 至少一个候选宽度可放入钢卷
    pub fn eligible_candidates<'d>(
        &self,
        coil_width_mm: f64,
        demands: &'d [DemandLine],
    ) -> Vec<&'d DemandLine> {
        demands
            .iter()
            .filter(|d| d.needs_production(self.config.shortage_epsilon_kg))
            .filter(|d| d.spec1.fits(coil_width_mm) || d.spec2.fits(coil_width_mm))
            .collect()
    }

    /// 展开宽度选项并评分
    ///
    /// # 规则
    /// - 基础分 = 欠料量 (无欠料的备库行为 1)
    /// - 急单 + urgent_bonus
    /// - 牌号与钢卷完全一致 + grade_match_bonus
    /// - 需求行任一宽度带 *C/*L 标记时,只保留带标记的宽度
    /// - 按 评分降序、宽度降序 排列 (稳定排序)
    fn width_options<'d>(
        &self,
        coil: &Coil,
        candidates: &[&'d DemandLine],
        urgent_demand_id: Option<&str>,
    ) -> Vec<WidthOption<'d>> {
        let mut options = Vec::new();

        for &demand in candidates {
            let is_urgent = urgent_demand_id == Some(demand.demand_id.as_str());

            let mut score = if demand.balance_kg < 0.0 {
                demand.balance_kg.abs()
            } else {
                1.0
            };
            if is_urgent {
                score += self.config.urgent_bonus;
            }
            if demand.grade == coil.grade {
                score += self.config.grade_match_bonus;
            }

            let strict_only = demand.has_strict_width();
            for candidate in demand.candidate_widths() {
                if strict_only && !candidate.is_strict() {
                    continue;
                }
                if candidate.fits(coil.width_mm) {
                    options.push(WidthOption {
                        width_mm: candidate.width_mm,
                        demand,
                        score,
                    });
                }
            }
        }

        options.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.width_mm.total_cmp(&a.width_mm))
        });
        options
    }

    // ==========================================
    // 策略 A: 贪心铺排
    // ==========================================

    /// 以前 N 个宽度选项为种子,先铺满种子宽度,再用高分选项填补余宽
    fn greedy_patterns(
        &self,
        coil_width: f64,
        options: &[WidthOption<'_>],
        urgent_demand_id: Option<&str>,
        seen: &mut HashSet<String>,
    ) -> Vec<SegmentPattern> {
        let max_strips = self.config.max_strips_per_segment;
        let mut results = Vec::new();

        for seed in options.iter().take(self.config.greedy_seed_limit) {
            let max_possible = fit_count(coil_width, seed.width_mm);
            let count = max_possible.min(max_strips);
            if count == 0 {
                continue;
            }

            let mut strips = vec![Strip::product(
                &seed.demand.demand_id,
                &seed.demand.material_code,
                seed.width_mm,
                count,
            )];
            let mut remainder = coil_width - seed.width_mm * count as f64;
            let mut strip_count = count;

            for filler in options {
                if strip_count >= max_strips {
                    break;
                }
                if filler.width_mm <= remainder + WIDTH_EPSILON {
                    let take = fit_count(remainder, filler.width_mm).min(max_strips - strip_count);
                    if take > 0 {
                        strips.push(Strip::product(
                            &filler.demand.demand_id,
                            &filler.demand.material_code,
                            filler.width_mm,
                            take,
                        ));
                        remainder -= filler.width_mm * take as f64;
                        strip_count += take;
                    }
                }
            }

            let pattern = build_pattern(
                coil_width,
                strips,
                seed.score,
                Some(seed.demand.demand_id.clone()),
                urgent_demand_id,
            );
            if seen.insert(pattern_signature(&pattern.strips)) {
                results.push(pattern);
            }
        }

        results
    }

    // ==========================================
    // 策略 B: 限时穷举
    // ==========================================

    /// 穷举最优宽度组合,每个宽度映射回提供该宽度的最高分需求行
    fn exhaustive_pattern(
        &self,
        coil_width: f64,
        options: &[WidthOption<'_>],
        urgent_demand_id: Option<&str>,
    ) -> Option<SegmentPattern> {
        let mut unique_widths: Vec<f64> = Vec::new();
        for opt in options {
            if !unique_widths.iter().any(|w| (w - opt.width_mm).abs() < WIDTH_EPSILON) {
                unique_widths.push(opt.width_mm);
            }
        }
        unique_widths.sort_by(|a, b| b.total_cmp(a));

        let outcome = self.search_best_combination(coil_width, &unique_widths);
        if outcome.timed_out {
            tracing::debug!(
                expanded_nodes = outcome.expanded_nodes,
                "穷举搜索达到时间预算,采用当前最优组合"
            );
        }
        if outcome.widths.is_empty() {
            return None;
        }

        let mut strips = Vec::new();
        for width in &outcome.widths {
            // options 已按评分降序,首个匹配即最高分
            if let Some(best) = options
                .iter()
                .find(|o| (o.width_mm - width).abs() < WIDTH_EPSILON)
            {
                strips.push(Strip::product(
                    &best.demand.demand_id,
                    &best.demand.material_code,
                    *width,
                    1,
                ));
            }
        }

        let mut pattern = build_pattern(coil_width, strips, 0.0, None, urgent_demand_id);
        pattern.priority_score = if pattern.has_urgent {
            EXHAUSTIVE_URGENT_SCORE
        } else {
            0.0
        };
        Some(pattern)
    }

    /// 有界深度优先搜索 (显式栈)
    ///
    /// # 规则
    /// - 每个宽度可重复使用,组合按宽度索引非递减展开 (避免排列重复)
    /// - 分条数达到上限 或 利用率 >= 99.9% 时不再加深
    /// - 每次展开前检查时间预算与取消标记,触发后返回已找到的最优组合
    pub fn search_best_combination(&self, coil_width: f64, widths: &[f64]) -> SearchOutcome {
        let started = Instant::now();
        let max_depth = self.config.max_strips_per_segment as usize;

        let mut best: Vec<usize> = Vec::new();
        let mut best_used = 0.0_f64;
        let mut expanded_nodes = 0usize;
        let mut timed_out = false;

        let mut path: Vec<usize> = Vec::new();
        let mut used = 0.0_f64;
        // cursors[d]: 第 d 层下一个待尝试的宽度索引
        let mut cursors: Vec<usize> = Vec::new();
        if !widths.is_empty() && coil_width > 0.0 {
            cursors.push(0);
        }

        while let Some(cursor) = cursors.last_mut() {
            if self.budget.is_cancelled() || started.elapsed() > self.budget.time_limit {
                timed_out = true;
                break;
            }

            let index = *cursor;
            if index >= widths.len() {
                cursors.pop();
                path.pop();
                used = path.iter().map(|&k| widths[k]).sum();
                continue;
            }
            *cursor += 1;

            let width = widths[index];
            if used + width > coil_width + WIDTH_EPSILON {
                continue;
            }

            path.push(index);
            used += width;
            expanded_nodes += 1;

            if used > best_used {
                best_used = used;
                best = path.clone();
            }

            if path.len() < max_depth && used / coil_width < SEARCH_SATURATION_RATIO {
                cursors.push(index);
            } else {
                path.pop();
                used = path.iter().map(|&k| widths[k]).sum();
            }
        }

        SearchOutcome {
            widths: best.iter().map(|&k| widths[k]).collect(),
            used_width_mm: best_used,
            expanded_nodes,
            timed_out,
        }
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 给定宽度可放入的最大条数
fn fit_count(available_mm: f64, width_mm: f64) -> u32 {
    if width_mm <= 0.0 || available_mm <= 0.0 {
        return 0;
    }
    ((available_mm + WIDTH_EPSILON) / width_mm).floor() as u32
}

/// 合并分条、补余边、计算利用率
fn build_pattern(
    coil_width: f64,
    strips: Vec<Strip>,
    priority_score: f64,
    dominant_demand_id: Option<String>,
    urgent_demand_id: Option<&str>,
) -> SegmentPattern {
    let used: f64 = strips.iter().map(|s| s.total_width_mm()).sum();
    let waste = coil_width - used;

    // 余边向下取整到 0.1mm,分条总宽不得超过钢卷宽度
    let scrap_width = ((waste + WIDTH_EPSILON) * 10.0).floor() / 10.0;
    let mut strips = strips;
    if scrap_width > WIDTH_EPSILON {
        strips.push(Strip::scrap(scrap_width));
    }
    let strips = consolidate_strips(strips);

    let has_urgent = urgent_demand_id
        .map(|id| strips.iter().any(|s| s.demand_id.as_deref() == Some(id)))
        .unwrap_or(false);

    SegmentPattern {
        strips,
        efficiency_pct: round_to(used / coil_width * 100.0, 2),
        used_width_mm: used,
        priority_score,
        dominant_demand_id,
        has_urgent,
    }
}

/// 合并相同 (需求行, 宽度, 用途) 的分条
pub fn consolidate_strips(strips: Vec<Strip>) -> Vec<Strip> {
    let mut merged: Vec<Strip> = Vec::with_capacity(strips.len());
    for strip in strips {
        match merged.iter_mut().find(|m| {
            m.demand_id == strip.demand_id
                && m.usage == strip.usage
                && (m.width_mm - strip.width_mm).abs() < WIDTH_EPSILON
        }) {
            Some(existing) => existing.count += strip.count,
            None => merged.push(strip),
        }
    }
    merged
}

/// 模式签名: 成品分条的 (需求行, 宽度, 条数) 排序后拼接
pub fn pattern_signature(strips: &[Strip]) -> String {
    let mut parts: Vec<String> = strips
        .iter()
        .filter(|s| s.usage == UsageType::Product)
        .map(|s| {
            format!(
                "{}-{}-{}",
                s.demand_id.as_deref().unwrap_or(""),
                s.width_mm,
                s.count
            )
        })
        .collect();
    parts.sort();
    parts.join("|")
}

/// 模式排序比较
fn compare_patterns(a: &SegmentPattern, b: &SegmentPattern, urgent_requested: bool) -> Ordering {
    if urgent_requested && a.has_urgent != b.has_urgent {
        return if a.has_urgent {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if (b.efficiency_pct - a.efficiency_pct).abs() > EFFICIENCY_TIE_PCT {
        return b.efficiency_pct.total_cmp(&a.efficiency_pct);
    }
    b.priority_score.total_cmp(&a.priority_score)
}

/// 稳定插入排序
///
/// 利用率带容差比较,不满足全序,不能交给 sort_by
fn rank_patterns(patterns: &mut [SegmentPattern], urgent_requested: bool) {
    for i in 1..patterns.len() {
        let mut j = i;
        while j > 0
            && compare_patterns(&patterns[j], &patterns[j - 1], urgent_requested) == Ordering::Less
        {
            patterns.swap(j, j - 1);
            j -= 1;
        }
    }
}
