//! 洞察池：有界的设计原则（tip）缓存
//!
//! - 准入：与已有 tip 的词重叠度 > 0.7 时拒绝，保证语义多样性
//! - 淘汰：使用次数 < 3 的 tip 处于试用期，不参与打分；其余按 effectiveness − 0.01 × 闲置代数 取最低者；
//!   全部处于试用期时淘汰 last_used_generation 最早者
//! - 检索：random / recent / effective / balanced / adaptive，返回的 tip 会被标记为已使用
//! - 反馈：effectiveness 以 α=0.3 的指数滑动平均更新并截断到 [-1, 1]

use std::collections::{HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::evolution::types::TipStrategy;

pub const DEFAULT_MAX_SIZE: usize = 30;
const SIMILARITY_THRESHOLD: f64 = 0.7;
const PROBATION_USAGE_COUNT: u32 = 3;
/// 摘要统计里的试用期门槛，比淘汰门槛宽
const SUMMARY_PROBATION_COUNT: u32 = 5;
const IDLE_DECAY_RATE: f64 = 0.01;
const EMA_ALPHA: f64 = 0.3;

/// 默认初始洞察
pub const DEFAULT_INITIAL_TIPS: &[&str] = &[
    "Design adaptive hybrid meta-heuristics synergistically fusing multiple search paradigms and dynamically tune operator parameters based on search stage or problem features",
    "Employ machine learning or pattern recognition to mine deep problem structures and optimal solution patterns then use learned insights to intelligently bias towards promising search regions or constructive choices",
    "Explore objective function engineering by introducing auxiliary or surrogate objectives or by dynamically adjusting weights to reshape the search landscape aiding escape from local optima or guiding diverse exploration",
    "Construct problem specialized efficient solution representations and co design dedicated core operators to fully leverage representation structure for powerful solution space exploration",
    "Implement intelligent diversification and restart strategies based on solution feature space analysis systematically targeting uncovered feature regions to promote global search coverage and escape deep local optima",
];

/// 单条 tip 的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipStats {
    pub used_count: u32,
    /// 指数滑动平均，范围 [-1, 1]
    pub effectiveness: f64,
    /// 累计值，仅用于诊断
    pub total_effectiveness: f64,
    pub last_used_generation: u64,
    pub tags: Vec<String>,
}

/// 洞察池统计摘要（日志用）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolSummary {
    pub total_tips: usize,
    pub probation_tips: usize,
    pub mature_tips: usize,
    pub avg_effectiveness: f64,
    pub max_effectiveness: f64,
    pub min_effectiveness: f64,
    pub avg_usage: f64,
    pub most_used_count: u32,
    pub best_tip: Option<String>,
    pub most_used_tip: Option<String>,
}

/// 洞察池。tips 保存插入顺序，stats 以 tip 文本为键，二者总是同步增删。
pub struct InsightPool {
    max_size: usize,
    tips: VecDeque<String>,
    stats: HashMap<String, TipStats>,
    current_generation: u64,
    rng: StdRng,
}

impl InsightPool {
    /// 空池（不含默认 tip）
    pub fn empty(max_size: usize, rng: StdRng) -> Self {
        Self {
            max_size: max_size.max(1),
            tips: VecDeque::new(),
            stats: HashMap::new(),
            current_generation: 0,
            rng,
        }
    }

    /// 使用给定初始 tip 建池；initial 为空时使用默认 tip
    pub fn new(max_size: usize, initial: &[String], rng: StdRng) -> Self {
        let mut pool = Self::empty(max_size, rng);
        if initial.is_empty() {
            for tip in DEFAULT_INITIAL_TIPS {
                pool.add_tip(tip, Vec::new());
            }
        } else {
            for tip in initial {
                pool.add_tip(tip, Vec::new());
            }
        }
        pool
    }

    pub fn with_seed(max_size: usize, seed: u64) -> Self {
        Self::new(max_size, &[], StdRng::seed_from_u64(seed))
    }

    pub fn len(&self) -> usize {
        self.tips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn current_generation(&self) -> u64 {
        self.current_generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        self.current_generation = generation;
    }

    pub fn tips(&self) -> impl Iterator<Item = &str> {
        self.tips.iter().map(String::as_str)
    }

    pub fn stats(&self, tip: &str) -> Option<&TipStats> {
        self.stats.get(tip)
    }

    pub fn contains(&self, tip: &str) -> bool {
        self.stats.contains_key(tip)
    }

    /// 最近加入的 n 条（按插入顺序）
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.tips.len().saturating_sub(n);
        self.tips.iter().skip(skip).cloned().collect()
    }

    /// 准入新 tip；与现有 tip 过于相似时返回 false
    pub fn add_tip(&mut self, tip: &str, tags: Vec<String>) -> bool {
        let tip = tip.trim();
        if tip.is_empty() || self.stats.contains_key(tip) {
            return false;
        }
        if self
            .tips
            .iter()
            .any(|existing| similarity(tip, existing) > SIMILARITY_THRESHOLD)
        {
            return false;
        }

        if self.tips.len() >= self.max_size {
            self.evict();
        }

        self.tips.push_back(tip.to_string());
        self.stats.insert(
            tip.to_string(),
            TipStats {
                used_count: 0,
                effectiveness: 0.0,
                total_effectiveness: 0.0,
                last_used_generation: self.current_generation,
                tags,
            },
        );
        true
    }

    fn eviction_score(&self, stats: &TipStats) -> f64 {
        if stats.used_count < PROBATION_USAGE_COUNT {
            return f64::INFINITY;
        }
        let idle = self.current_generation.saturating_sub(stats.last_used_generation);
        stats.effectiveness - IDLE_DECAY_RATE * idle as f64
    }

    /// 淘汰一条 tip；池满时总能腾出一个位置
    fn evict(&mut self) {
        if self.tips.len() < self.max_size {
            return;
        }

        let victim = self
            .tips
            .iter()
            .enumerate()
            .filter_map(|(idx, tip)| {
                let score = self.eviction_score(&self.stats[tip]);
                score.is_finite().then_some((idx, score))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
            .or_else(|| {
                self.tips
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, tip)| self.stats[*tip].last_used_generation)
                    .map(|(idx, _)| idx)
            });

        if let Some(idx) = victim {
            if let Some(tip) = self.tips.remove(idx) {
                tracing::debug!(tip = %tip, "evicted insight");
                self.stats.remove(&tip);
            }
        }
    }

    /// 取至多 k 条 tip，并把返回的 tip 标记为本代已使用
    pub fn get_tips(&mut self, k: usize, strategy: TipStrategy) -> Vec<String> {
        if self.tips.is_empty() || k == 0 {
            return Vec::new();
        }

        let selected: Vec<String> = if self.tips.len() <= k {
            self.tips.iter().cloned().collect()
        } else {
            match strategy {
                TipStrategy::Random => self.sample_random(k),
                TipStrategy::Recent => {
                    self.top_k(k, |s| s.last_used_generation as f64)
                }
                TipStrategy::Effective => self.top_k(k, |s| s.effectiveness),
                TipStrategy::Balanced => {
                    if self.rng.gen::<f64>() < 0.6 {
                        self.top_k(k, |s| s.effectiveness)
                    } else {
                        self.top_k(k, |s| -(s.used_count as f64))
                    }
                }
                TipStrategy::Adaptive => {
                    let generation = self.current_generation;
                    self.top_k(k, |s| adaptive_score(s, generation))
                }
            }
        };

        for tip in &selected {
            if let Some(stats) = self.stats.get_mut(tip) {
                stats.used_count += 1;
                stats.last_used_generation = self.current_generation;
            }
        }
        selected
    }

    fn sample_random(&mut self, k: usize) -> Vec<String> {
        let all: Vec<&String> = self.tips.iter().collect();
        all.choose_multiple(&mut self.rng, k)
            .map(|tip| (*tip).clone())
            .collect()
    }

    /// 按 key 降序取前 k 条（稳定排序，平分时保持插入顺序）
    fn top_k<F>(&self, k: usize, key: F) -> Vec<String>
    where
        F: Fn(&TipStats) -> f64,
    {
        let mut scored: Vec<(&String, f64)> = self
            .tips
            .iter()
            .map(|tip| (tip, key(&self.stats[tip])))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(k).map(|(tip, _)| tip.clone()).collect()
    }

    /// 反馈一次效果样本；tip 不存在（已被淘汰）时返回 false
    pub fn update_tip_stats(&mut self, tip: &str, effectiveness: f64) -> bool {
        let generation = self.current_generation;
        match self.stats.get_mut(tip) {
            Some(stats) => {
                stats.total_effectiveness += effectiveness;
                let blended = (1.0 - EMA_ALPHA) * stats.effectiveness + EMA_ALPHA * effectiveness;
                stats.effectiveness = blended.clamp(-1.0, 1.0);
                stats.last_used_generation = generation;
                true
            }
            None => false,
        }
    }

    /// 统计摘要；使用次数 < 5 记为试用期。best / most-used 平分时取较早加入的 tip
    pub fn summary(&self) -> PoolSummary {
        if self.tips.is_empty() {
            return PoolSummary::default();
        }

        let all: Vec<(&String, &TipStats)> =
            self.tips.iter().map(|t| (t, &self.stats[t])).collect();
        let n = all.len() as f64;
        let probation = all
            .iter()
            .filter(|(_, s)| s.used_count < SUMMARY_PROBATION_COUNT)
            .count();

        PoolSummary {
            total_tips: all.len(),
            probation_tips: probation,
            mature_tips: all.len() - probation,
            avg_effectiveness: all.iter().map(|(_, s)| s.effectiveness).sum::<f64>() / n,
            max_effectiveness: all
                .iter()
                .map(|(_, s)| s.effectiveness)
                .fold(f64::NEG_INFINITY, f64::max),
            min_effectiveness: all
                .iter()
                .map(|(_, s)| s.effectiveness)
                .fold(f64::INFINITY, f64::min),
            avg_usage: all.iter().map(|(_, s)| s.used_count as f64).sum::<f64>() / n,
            most_used_count: all.iter().map(|(_, s)| s.used_count).max().unwrap_or(0),
            best_tip: all
                .iter()
                .rev()
                .max_by(|a, b| a.1.effectiveness.total_cmp(&b.1.effectiveness))
                .map(|(t, _)| (*t).clone()),
            most_used_tip: all
                .iter()
                .rev()
                .max_by_key(|(_, s)| s.used_count)
                .map(|(t, _)| (*t).clone()),
        }
    }
}

fn adaptive_score(stats: &TipStats, generation: u64) -> f64 {
    let usage_penalty = -0.1 * ((stats.used_count as f64) + 1.0).ln();
    let idle = generation.saturating_sub(stats.last_used_generation);
    let recency_bonus = if idle <= 2 { 0.2 } else { 0.0 };
    stats.effectiveness + usage_penalty + recency_bonus
}

/// 词重叠度：小写词集合的交集大小 / 较大集合的大小
pub fn similarity(a: &str, b: &str) -> f64 {
    let lower_a = a.to_lowercase();
    let lower_b = b.to_lowercase();
    let words_a: HashSet<&str> = lower_a.split_whitespace().collect();
    let words_b: HashSet<&str> = lower_b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let common = words_a.intersection(&words_b).count();
    common as f64 / words_a.len().max(words_b.len()) as f64
}
