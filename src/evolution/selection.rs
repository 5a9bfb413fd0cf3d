//! 默认的生存者选择与父代选择

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::core::EvolutionError;
use crate::evolution::collaborators::{ParentSelector, SurvivorSelector};
use crate::evolution::types::Individual;

/// 贪心截断：去掉无目标值与目标值重复的个体，按目标值升序保留前 target_size 个
#[derive(Debug, Default, Clone, Copy)]
pub struct TruncationSelector;

impl SurvivorSelector for TruncationSelector {
    fn select_survivors(&self, population: Vec<Individual>, target_size: usize) -> Vec<Individual> {
        let mut unique: Vec<Individual> = Vec::with_capacity(population.len());
        for ind in population.into_iter().filter(|ind| ind.objective.is_some()) {
            if !unique.iter().any(|u| u.objective == ind.objective) {
                unique.push(ind);
            }
        }
        unique.sort_by(|a, b| {
            let (a, b) = (a.objective.unwrap_or(f64::INFINITY), b.objective.unwrap_or(f64::INFINITY));
            a.total_cmp(&b)
        });
        unique.truncate(target_size);
        unique
    }
}

/// 按排名加权抽样（不放回），第 r 名的权重为 1 / (r + 1 + n)
#[derive(Debug, Default, Clone, Copy)]
pub struct RankParentSelector;

impl ParentSelector for RankParentSelector {
    fn select_parents(
        &self,
        population: &[Individual],
        arity: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Individual>, EvolutionError> {
        let mut ranked: Vec<&Individual> = population.iter().filter(|i| i.objective.is_some()).collect();
        if ranked.len() < arity {
            return Err(EvolutionError::InvalidArity {
                operator: "parent selection".to_string(),
                needed: arity,
                available: ranked.len(),
            });
        }
        ranked.sort_by(|a, b| {
            let (a, b) = (a.objective.unwrap_or(f64::INFINITY), b.objective.unwrap_or(f64::INFINITY));
            a.total_cmp(&b)
        });

        let n = ranked.len() as f64;
        let indexed: Vec<(usize, &Individual)> = ranked.into_iter().enumerate().collect();
        let chosen = indexed
            .choose_multiple_weighted(rng, arity, |(rank, _)| 1.0 / (*rank as f64 + 1.0 + n))
            .map_err(|e| EvolutionError::Config(format!("parent weights: {}", e)))?;
        Ok(chosen.map(|(_, ind)| (*ind).clone()).collect())
    }
}
