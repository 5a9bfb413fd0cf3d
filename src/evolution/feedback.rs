//! 洞察反馈：由子代实际目标值相对种群的位置计算 tip 的效果分

use crate::evolution::history::valid_objectives;
use crate::evolution::types::Individual;

/// 评估失败（超时、异常、代码不合法）时施加给相关 tip 的负反馈
pub const FAILURE_EFFECTIVENESS: f64 = -0.8;

/// 计算效果分，范围 [-1, 1]
///
/// - 子代无目标值 → −0.5；种群无有效目标值 → 0.0；种群退化（best == worst）→ 0.1
/// - 否则 norm = (worst − obj) / (worst − best)，按 obj 落在 best / avg 哪一侧分段线性映射
pub fn insight_effectiveness(objective: Option<f64>, population: &[Individual]) -> f64 {
    let Some(objective) = objective else {
        return -0.5;
    };

    let objectives = valid_objectives(population);
    if objectives.is_empty() {
        return 0.0;
    }

    let best = objectives.iter().copied().fold(f64::INFINITY, f64::min);
    let worst = objectives.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = objectives.iter().sum::<f64>() / objectives.len() as f64;

    if worst == best {
        return 0.1;
    }

    let norm = (worst - objective) / (worst - best);
    let effectiveness = if objective <= best {
        0.8 + 0.2 * norm
    } else if objective <= avg {
        0.2 + 0.6 * norm
    } else {
        -0.3 + 0.5 * norm
    };
    effectiveness.clamp(-1.0, 1.0)
}

/// 目标值保留 5 位小数；放大后溢出的极大值原样返回
pub fn round_objective(value: f64) -> f64 {
    let scaled = value * 1e5;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 1e5
}
