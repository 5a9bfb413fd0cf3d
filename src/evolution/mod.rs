//! 进化编排核心：洞察池、导航器、子代流水线、代际循环及默认协作者

pub mod collaborators;
pub mod engine;
pub mod feedback;
pub mod generator;
pub mod history;
pub mod insight;
pub mod jit;
pub mod loop_;
pub mod navigator;
pub mod pipeline;
pub mod selection;
pub mod snapshot;
pub mod types;

pub use collaborators::{
    Evaluator, GenerationRequest, Generated, Generator, NullSink, ParentSelector, SnapshotSink,
    SurvivorSelector,
};
pub use engine::{EvolutionConfig, EvolutionEngine, SeedAlgorithm};
pub use generator::LlmGenerator;
pub use history::History;
pub use insight::{InsightPool, PoolSummary, TipStats};
pub use loop_::{EvolutionLoop, GuidanceRecord, InitialPopulation};
pub use navigator::Navigator;
pub use pipeline::{OffspringPipeline, PipelineSettings, SlotOutcome};
pub use selection::{RankParentSelector, TruncationSelector};
pub use snapshot::JsonSnapshotSink;
pub use types::{
    CrossoverKind, DuplicateObjectivePolicy, Guidance, Individual, Metadata, MutationKind, Operator,
    Regime, TipStrategy,
};
