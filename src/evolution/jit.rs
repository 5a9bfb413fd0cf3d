//! JIT 标注：为生成的 Python 打分函数加上 numba 装饰器

use std::sync::OnceLock;

use regex::Regex;

use crate::core::EvolutionError;

const JIT_IMPORT: &str = "from numba import jit";
const JIT_DECORATOR: &str = "@jit(nopython=True)";

fn function_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"def\s+(\w+)\s*\(.*\):").expect("static regex"))
}

/// 第一个函数定义的名字
pub fn function_name(code: &str) -> Option<&str> {
    function_pattern()
        .captures(code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// 在代码顶部加入 numba 导入，并在目标函数定义前插入装饰器；找不到函数时报错
pub fn annotate(code: &str) -> Result<String, EvolutionError> {
    let name = function_name(code).ok_or(EvolutionError::FunctionNameNotFound)?;
    let header = format!("def {}", name);

    let mut out = Vec::new();
    if !code.contains(JIT_IMPORT) {
        out.push(JIT_IMPORT.to_string());
    }
    let mut decorated = false;
    for line in code.lines() {
        let trimmed = line.trim_start();
        if !decorated && trimmed.starts_with(&header) {
            let indent = &line[..line.len() - trimmed.len()];
            out.push(format!("{}{}", indent, JIT_DECORATOR));
            decorated = true;
        }
        out.push(line.to_string());
    }
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "import numpy as np\n\ndef score(item, bins):\n    return bins - item\n";

    #[test]
    fn test_function_name() {
        assert_eq!(function_name(CODE), Some("score"));
        assert_eq!(function_name("x = 1"), None);
    }

    #[test]
    fn test_annotate_inserts_decorator() {
        let out = annotate(CODE).unwrap();
        assert!(out.starts_with("from numba import jit\n"));
        assert!(out.contains("@jit(nopython=True)\ndef score(item, bins):"));
    }

    #[test]
    fn test_annotate_missing_function() {
        assert!(matches!(
            annotate("print('no function here')"),
            Err(EvolutionError::FunctionNameNotFound)
        ));
    }
}
