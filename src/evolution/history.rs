//! 历史序列：best / avg 目标值与多样性，各自有界，超出上限时丢弃最旧样本

use serde::Serialize;

use crate::evolution::types::Individual;

pub const DEFAULT_HISTORY_LEN: usize = 50;

#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    max_len: usize,
    best: Vec<f64>,
    avg: Vec<f64>,
    diversity: Vec<f64>,
    /// 累计记录过的 best 样本数（不受上限截断影响）
    #[serde(skip)]
    best_samples: usize,
}

impl History {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            ..Default::default()
        }
    }

    pub fn best(&self) -> &[f64] {
        &self.best
    }

    pub fn avg(&self) -> &[f64] {
        &self.avg
    }

    pub fn diversity(&self) -> &[f64] {
        &self.diversity
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn best_samples(&self) -> usize {
        self.best_samples
    }

    /// 追加一次样本；无有效目标值时不记录 best/avg，种群不足两个时不记录多样性
    pub fn record(&mut self, best_avg: Option<(f64, f64)>, diversity: Option<f64>) {
        if let Some((best, avg)) = best_avg {
            push_capped(&mut self.best, best, self.max_len);
            push_capped(&mut self.avg, avg, self.max_len);
            self.best_samples += 1;
        }
        if let Some(d) = diversity {
            push_capped(&mut self.diversity, d, self.max_len);
        }
    }

    pub fn record_population(&mut self, population: &[Individual]) {
        self.record(objective_summary(population), diversity(population));
    }
}

fn push_capped(series: &mut Vec<f64>, value: f64, max_len: usize) {
    series.push(value);
    if series.len() > max_len {
        let excess = series.len() - max_len;
        series.drain(..excess);
    }
}

/// 种群中所有有效目标值
pub fn valid_objectives(population: &[Individual]) -> Vec<f64> {
    population.iter().filter_map(|ind| ind.objective).collect()
}

/// (best, avg)；没有有效目标值时为 None
pub fn objective_summary(population: &[Individual]) -> Option<(f64, f64)> {
    let objectives = valid_objectives(population);
    if objectives.is_empty() {
        return None;
    }
    let best = objectives.iter().copied().fold(f64::INFINITY, f64::min);
    let avg = objectives.iter().sum::<f64>() / objectives.len() as f64;
    Some((best, avg))
}

/// 两两比较算法描述，不同的比例；少于两个个体时为 None
pub fn diversity(population: &[Individual]) -> Option<f64> {
    let n = population.len();
    if n < 2 {
        return None;
    }
    let mut distinct = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            if population[i].algorithm != population[j].algorithm {
                distinct += 1;
            }
        }
    }
    let pairs = n * (n - 1) / 2;
    Some(distinct as f64 / pairs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind(algorithm: &str, objective: Option<f64>) -> Individual {
        Individual {
            algorithm: Some(algorithm.to_string()),
            code: Some(format!("def f():\n    return '{algorithm}'")),
            objective,
            ..Default::default()
        }
    }

    #[test]
    fn test_series_fifo_capped() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.record(Some((i as f64, i as f64)), Some(0.5));
        }
        assert_eq!(history.best(), &[2.0, 3.0, 4.0]);
        assert_eq!(history.avg().len(), 3);
        assert_eq!(history.diversity().len(), 3);
        assert_eq!(history.best_samples(), 5);
    }

    #[test]
    fn test_series_are_independent() {
        let mut history = History::new(10);
        history.record(None, Some(1.0));
        history.record(Some((1.0, 2.0)), None);
        assert_eq!(history.best().len(), 1);
        assert_eq!(history.diversity().len(), 1);
    }

    #[test]
    fn test_objective_summary_skips_nulls() {
        let pop = vec![ind("a", Some(1.0)), ind("b", None), ind("c", Some(3.0))];
        assert_eq!(objective_summary(&pop), Some((1.0, 2.0)));
        assert_eq!(objective_summary(&[Individual::null()]), None);
    }

    #[test]
    fn test_diversity() {
        let pop = vec![ind("a", None), ind("a", None), ind("b", None)];
        // pairs: (a,a) same, (a,b), (a,b) differ
        let d = diversity(&pop).unwrap();
        assert!((d - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(diversity(&pop[..1]), None);
    }

    #[test]
    fn test_record_population() {
        let mut history = History::new(DEFAULT_HISTORY_LEN);
        history.record_population(&[ind("x", Some(4.0)), ind("y", Some(2.0))]);
        assert_eq!(history.best(), &[2.0]);
        assert_eq!(history.avg(), &[3.0]);
        assert_eq!(history.diversity(), &[1.0]);
    }
}
