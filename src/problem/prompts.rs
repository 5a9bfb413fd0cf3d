//! 问题描述与各算子的生成 prompt
//!
//! 每个 prompt 由四部分组成：任务描述、算子指令（含父代算法）、洞察与导航指令、函数签名约束。

use std::fmt::Write;

use crate::config::ProblemSection;
use crate::evolution::collaborators::GenerationRequest;
use crate::evolution::types::{CrossoverKind, Individual, MutationKind, Operator};

/// 目标函数的描述
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemPrompts {
    pub task: String,
    pub func_name: String,
    pub func_inputs: Vec<String>,
    pub func_outputs: Vec<String>,
    pub inout_inf: String,
    pub other_inf: String,
}

impl From<&ProblemSection> for ProblemPrompts {
    fn from(section: &ProblemSection) -> Self {
        Self {
            task: section.task.clone(),
            func_name: section.func_name.clone(),
            func_inputs: section.func_inputs.clone(),
            func_outputs: section.func_outputs.clone(),
            inout_inf: section.inout_inf.clone(),
            other_inf: section.other_inf.clone(),
        }
    }
}

impl Default for ProblemPrompts {
    fn default() -> Self {
        Self::from(&ProblemSection::default())
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ProblemPrompts {
    /// 函数签名约束
    fn signature_hint(&self) -> String {
        format!(
            "Next, implement it in Python as a function named {}. This function should accept {} input(s): {}. \
             The function should return {} output(s): {}. {} {}",
            self.func_name,
            self.func_inputs.len(),
            quoted(&self.func_inputs),
            self.func_outputs.len(),
            quoted(&self.func_outputs),
            self.inout_inf,
            self.other_inf
        )
    }

    fn parents_block(parents: &[Individual]) -> String {
        let mut out = String::new();
        for (i, p) in parents.iter().enumerate() {
            let _ = write!(
                out,
                "No.{} algorithm and the corresponding code are: \n{}\n{}\n",
                i + 1,
                p.algorithm.as_deref().unwrap_or(""),
                p.code.as_deref().unwrap_or("")
            );
        }
        out
    }

    fn operator_instruction(&self, operator: Operator, parents: &[Individual]) -> String {
        const DESCRIBE: &str = "First, describe your new algorithm and main steps in one sentence. \
                                The description must be inside a brace.";
        match operator {
            Operator::Initialize => format!("{}\n{}", self.task, DESCRIBE),
            Operator::Crossover(CrossoverKind::E1) => format!(
                "{}\nI have {} existing algorithms with their codes as follows: \n{}\
                 Please help me create a new algorithm that has a totally different form from the given ones. \n{}",
                self.task,
                parents.len(),
                Self::parents_block(parents),
                DESCRIBE
            ),
            Operator::Crossover(CrossoverKind::E2) => format!(
                "{}\nI have {} existing algorithms with their codes as follows: \n{}\
                 Please help me create a new algorithm that has a totally different form from the given ones \
                 but can be motivated from them. \nFirstly, identify the common backbone idea in the provided \
                 algorithms. Secondly, based on the backbone idea describe your new algorithm in one sentence. \
                 The description must be inside a brace.",
                self.task,
                parents.len(),
                Self::parents_block(parents)
            ),
            Operator::Mutate(kind) => {
                let instruction = match kind {
                    MutationKind::M1 => {
                        "Please assist me in creating a new algorithm that has a different form but can be a \
                         modified version of the algorithm provided."
                    }
                    MutationKind::M2 => {
                        "Please identify the main algorithm parameters and assist me in creating a new algorithm \
                         that has a different parameter settings of the score function provided."
                    }
                    MutationKind::M3 => {
                        "First, you need to identify the main components in the function above. Next, analyze \
                         whether any of these components can be overfit to the in-distribution instances. Then, \
                         based on your analysis, simplify the components to enhance the generalization to \
                         potential out-of-distribution instances. Finally, provide the revised code, keeping the \
                         function name, inputs, and outputs unchanged."
                    }
                };
                format!(
                    "{}\nI have one algorithm with its code as follows. \n{}{}\n{}",
                    self.task,
                    Self::parents_block(parents),
                    instruction,
                    DESCRIBE
                )
            }
        }
    }

    /// 为一次生成构造完整 prompt
    pub fn operator_prompt(&self, request: &GenerationRequest<'_>) -> String {
        let mut prompt = self.operator_instruction(request.operator, request.parents);

        if !request.insights.is_empty() {
            prompt.push_str("\nConsider the following design principles when creating the algorithm:\n");
            for tip in request.insights {
                let _ = writeln!(prompt, "- {}", tip);
            }
        }
        if !request.directive.is_empty() {
            let _ = write!(
                prompt,
                "\nSearch regime: {}. Design directive: focus on {}.",
                request.regime, request.directive
            );
        }

        let _ = write!(prompt, "\n{}\nDo not give additional explanations.", self.signature_hint());
        prompt
    }

    /// 提炼设计原则的 prompt；描述过短时改用（截断后的）代码
    pub fn principles_prompt(elites: &[Individual]) -> String {
        let mut prompt = String::from(
            "The following are core descriptions of high-performance optimization algorithms evolved recently:\n",
        );
        for (i, ind) in elites.iter().enumerate() {
            let description = ind.algorithm.as_deref().unwrap_or("").trim();
            let content = if description.len() > 8 {
                description.to_string()
            } else {
                let code = ind.code.as_deref().unwrap_or("");
                if code.len() > 1000 {
                    let cut = code.char_indices().nth(800).map_or(code.len(), |(idx, _)| idx);
                    format!("{}...\n# (truncated for brevity)", &code[..cut])
                } else {
                    code.to_string()
                }
            };
            let _ = writeln!(prompt, "{}. Algorithm: {}", i + 1, content);
        }
        prompt.push_str(
            "\nPlease extract 1-2 concise, generic, and performance-positive [design principles] or \
             [effective patterns] from the above algorithms.\
             \nThese principles should be applicable to various combinatorial optimization problems, \
             not just the specific problem domain.\
             \nDraw insights from both the natural language descriptions and their code implementations, \
             focusing on strategic design choices rather than implementation minutiae.\
             \nEach principle/pattern should be expressed as an independent sentence in the following format:\
             \n- Balance local optimization with global solution structure when making decisions.\
             \n- Prioritize choices that maintain flexibility for future decision-making steps.",
        );
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::types::Regime;

    fn parent(i: usize) -> Individual {
        Individual {
            algorithm: Some(format!("parent algorithm {i}")),
            code: Some(format!("def score(item, bins):\n    return bins * {i}")),
            objective: Some(i as f64),
            ..Default::default()
        }
    }

    #[test]
    fn test_initialize_prompt_has_signature_and_insights() {
        let prompts = ProblemPrompts::default();
        let insights = vec!["Use residual capacity".to_string()];
        let prompt = prompts.operator_prompt(&GenerationRequest {
            operator: Operator::Initialize,
            parents: &[],
            insights: &insights,
            directive: "solution space exploration",
            regime: Regime::Exploration,
        });
        assert!(prompt.contains("function named score"));
        assert!(prompt.contains("2 input(s): 'item', 'bins'"));
        assert!(prompt.contains("- Use residual capacity"));
        assert!(prompt.contains("Search regime: exploration"));
    }

    #[test]
    fn test_crossover_prompt_lists_parents() {
        let prompts = ProblemPrompts::default();
        let parents = vec![parent(1), parent(2)];
        let prompt = prompts.operator_prompt(&GenerationRequest {
            operator: Operator::Crossover(CrossoverKind::E2),
            parents: &parents,
            insights: &[],
            directive: "",
            regime: Regime::Balanced,
        });
        assert!(prompt.contains("I have 2 existing algorithms"));
        assert!(prompt.contains("No.2 algorithm"));
        assert!(prompt.contains("backbone idea"));
        assert!(!prompt.contains("Search regime"));
    }

    #[test]
    fn test_principles_prompt_falls_back_to_code() {
        let short = Individual {
            algorithm: Some("tiny".into()),
            code: Some("def score(item, bins):\n    return bins".into()),
            objective: Some(1.0),
            ..Default::default()
        };
        let prompt = ProblemPrompts::principles_prompt(&[parent(1), short]);
        assert!(prompt.contains("1. Algorithm: parent algorithm 1"));
        assert!(prompt.contains("2. Algorithm: def score"));
        assert!(prompt.contains("design principles"));
    }
}
