//! 进化导航器：根据适应度 / 多样性趋势选择搜索模式（探索 / 利用 / 平衡）及设计指令
//!
//! 规则（至少两个 best 样本后，按优先级）：
//! 1. 更新趋势计数：previous_best − current_best ≤ 1e-4 视为停滞；每个新样本只计一次，
//!    同一代内的多次调用沿用计数，只重新抽取模式与指令
//! 2. 连续停滞 ≥ 3 → 探索
//! 3. 最新多样性 < 0.3 → 探索
//! 4. 连续改进 ≥ 2 → 利用
//! 5. 否则按 {0.25, 0.25, 0.5} 权重随机

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::evolution::history::History;
use crate::evolution::types::{Guidance, Regime};

const IMPROVEMENT_EPSILON: f64 = 1e-4;
const STAGNATION_LIMIT: u32 = 3;
const IMPROVEMENT_STREAK: u32 = 2;
const LOW_DIVERSITY: f64 = 0.3;

pub const GENERAL_DIRECTIVES: &[&str] = &[
    "optimizing objective function evaluation criteria",
    "considering long-term impact of current decisions",
    "balancing local optimality with global search strategies",
    "improving algorithm robustness across different problem instances",
    "managing computational complexity and time efficiency",
];

pub const EXPLOITATION_DIRECTIVES: &[&str] = &[
    "refining core evaluation and scoring functions",
    "fine-tuning critical algorithm parameters and thresholds",
    "optimizing established successful strategies and patterns",
    "reducing unnecessary computational overhead and redundancy",
    "improving precision of existing heuristics and rules",
];

pub const EXPLORATION_DIRECTIVES: &[&str] = &[
    "exploring novel solution construction methodologies",
    "investigating alternative problem decomposition approaches",
    "introducing new randomization or adaptive mechanisms",
    "considering completely different algorithmic paradigms",
    "experimenting with hybrid strategy combinations",
];

/// 导航器状态；只在 guidance() 内部修改
pub struct Navigator {
    stagnation_count: u32,
    improvement_count: u32,
    last_best_fitness: Option<f64>,
    /// 已消费的 best 样本数
    seen_samples: usize,
    last_guidance: Option<Guidance>,
    rng: StdRng,
}

impl Navigator {
    pub fn new(rng: StdRng) -> Self {
        Self {
            stagnation_count: 0,
            improvement_count: 0,
            last_best_fitness: None,
            seen_samples: 0,
            last_guidance: None,
            rng,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn stagnation_count(&self) -> u32 {
        self.stagnation_count
    }

    pub fn improvement_count(&self) -> u32 {
        self.improvement_count
    }

    pub fn last_best_fitness(&self) -> Option<f64> {
        self.last_best_fitness
    }

    pub fn last_guidance(&self) -> Option<&Guidance> {
        self.last_guidance.as_ref()
    }

    /// 根据历史序列给出本次生成的 (regime, directive)
    pub fn guidance(&mut self, history: &History) -> Guidance {
        let best = history.best();
        if best.len() < 2 {
            return Guidance {
                regime: Regime::Balanced,
                directive: self.pick(GENERAL_DIRECTIVES),
            };
        }

        let samples = history.best_samples();
        if samples > self.seen_samples {
            self.seen_samples = samples;
            let current_best = best[best.len() - 1];
            let previous_best = best[best.len() - 2];
            if previous_best - current_best <= IMPROVEMENT_EPSILON {
                self.stagnation_count += 1;
                self.improvement_count = 0;
            } else {
                self.improvement_count += 1;
                self.stagnation_count = 0;
            }
            self.last_best_fitness = Some(current_best);
        }

        let low_diversity = history
            .diversity()
            .last()
            .is_some_and(|d| *d < LOW_DIVERSITY);

        let regime = if self.stagnation_count >= STAGNATION_LIMIT || low_diversity {
            Regime::Exploration
        } else if self.improvement_count >= IMPROVEMENT_STREAK {
            Regime::Exploitation
        } else {
            self.weighted_regime()
        };

        let directive = match regime {
            Regime::Exploration => self.pick(EXPLORATION_DIRECTIVES),
            Regime::Exploitation => self.pick(EXPLOITATION_DIRECTIVES),
            Regime::Balanced => {
                let pool: Vec<&str> = GENERAL_DIRECTIVES
                    .iter()
                    .chain(EXPLOITATION_DIRECTIVES)
                    .chain(EXPLORATION_DIRECTIVES)
                    .copied()
                    .collect();
                self.pick(&pool)
            }
        };

        let guidance = Guidance { regime, directive };
        self.last_guidance = Some(guidance.clone());
        guidance
    }

    fn weighted_regime(&mut self) -> Regime {
        let roll: f64 = self.rng.gen();
        if roll < 0.25 {
            Regime::Exploration
        } else if roll < 0.5 {
            Regime::Exploitation
        } else {
            Regime::Balanced
        }
    }

    fn pick(&mut self, catalog: &[&str]) -> String {
        catalog
            .choose(&mut self.rng)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(best: &[f64], diversity: &[f64]) -> History {
        let mut history = History::new(50);
        for (i, b) in best.iter().enumerate() {
            history.record(Some((*b, *b)), diversity.get(i).copied());
        }
        history
    }

    #[test]
    fn test_short_history_is_balanced_general() {
        let mut nav = Navigator::with_seed(1);
        let g = nav.guidance(&history_of(&[5.0], &[]));
        assert_eq!(g.regime, Regime::Balanced);
        assert!(GENERAL_DIRECTIVES.contains(&g.directive.as_str()));
        assert!(nav.last_guidance().is_none());
    }

    #[test]
    fn test_stagnation_triggers_exploration() {
        let mut nav = Navigator::with_seed(2);
        let mut history = History::new(50);
        let mut counts = Vec::new();
        let mut last = None;
        for _ in 0..4 {
            history.record(Some((10.0, 10.0)), Some(0.9));
            last = Some(nav.guidance(&history));
            counts.push(nav.stagnation_count());
        }
        let g = last.unwrap();
        assert_eq!(counts, vec![0, 1, 2, 3]);
        assert_eq!(g.regime, Regime::Exploration);
        assert!(EXPLORATION_DIRECTIVES.contains(&g.directive.as_str()));
        assert_eq!(nav.last_guidance(), Some(&g));
    }

    #[test]
    fn test_repeated_calls_on_same_history_keep_counters() {
        let mut nav = Navigator::with_seed(7);
        let history = history_of(&[10.0, 9.0], &[0.9, 0.9]);
        for _ in 0..6 {
            nav.guidance(&history);
        }
        assert_eq!(nav.improvement_count(), 1);
        assert_eq!(nav.stagnation_count(), 0);
        assert_eq!(nav.last_best_fitness(), Some(9.0));
    }

    #[test]
    fn test_counters_follow_samples_past_history_cap() {
        let mut nav = Navigator::with_seed(8);
        let mut history = History::new(2);
        for b in [10.0, 9.0, 8.0, 7.0] {
            history.record(Some((b, b)), Some(0.9));
            nav.guidance(&history);
            nav.guidance(&history);
        }
        assert_eq!(nav.improvement_count(), 3);
        assert_eq!(nav.last_guidance().map(|g| g.regime), Some(Regime::Exploitation));
    }

    #[test]
    fn test_low_diversity_triggers_exploration() {
        let mut nav = Navigator::with_seed(3);
        let g = nav.guidance(&history_of(&[3.0, 2.0], &[0.8, 0.1]));
        assert_eq!(g.regime, Regime::Exploration);
    }

    #[test]
    fn test_improvement_streak_triggers_exploitation() {
        let mut nav = Navigator::with_seed(4);
        let mut history = History::new(50);
        history.record(Some((10.0, 10.0)), Some(0.9));
        history.record(Some((9.0, 9.0)), Some(0.9));
        nav.guidance(&history);
        history.record(Some((8.0, 8.0)), Some(0.9));
        nav.guidance(&history);
        history.record(Some((7.0, 7.0)), Some(0.9));
        let g = nav.guidance(&history);
        assert_eq!(nav.improvement_count(), 3);
        assert_eq!(g.regime, Regime::Exploitation);
        assert!(EXPLOITATION_DIRECTIVES.contains(&g.directive.as_str()));
    }

    #[test]
    fn test_improvement_resets_stagnation() {
        let mut nav = Navigator::with_seed(5);
        let mut history = history_of(&[4.0, 4.0], &[0.9, 0.9]);
        nav.guidance(&history);
        nav.guidance(&history);
        assert_eq!(nav.stagnation_count(), 1);
        history.record(Some((1.0, 1.0)), Some(0.9));
        nav.guidance(&history);
        assert_eq!(nav.stagnation_count(), 0);
        assert_eq!(nav.improvement_count(), 1);
    }

    #[test]
    fn test_seeded_navigator_is_deterministic() {
        let history = history_of(&[3.0, 2.5], &[0.9, 0.9]);
        let mut a = Navigator::with_seed(42);
        let mut b = Navigator::with_seed(42);
        for _ in 0..5 {
            assert_eq!(a.guidance(&history), b.guidance(&history));
        }
    }
}
