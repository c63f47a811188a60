//! Scalar transforms applied to each valid cell value.

use std::fmt;

use evalexpr::{build_operator_tree, ContextWithMutableVariables, HashMapContext, Node, Value};

use crate::error::{ProcessorError, Result};

/// Name the cell value is bound to inside an expression.
pub const VALUE_VARIABLE: &str = "self";

/// A per-cell value transform.
///
/// `None` means the transform produced no number for this input; the
/// encoder writes NaN in that case.
pub trait ValueTransform: Send + Sync + fmt::Debug {
    fn apply(&self, value: f64) -> Option<f64>;
}

/// Arithmetic expression over the cell value, e.g. `self * 0.1 - 273.15`.
#[derive(Debug, Clone)]
pub struct ExpressionTransform {
    source: String,
    tree: Node,
}

impl ExpressionTransform {
    /// Compile an expression. Syntax errors are configuration errors.
    pub fn compile(expression: &str) -> Result<Self> {
        let tree = build_operator_tree(expression).map_err(|e| ProcessorError::InvalidTransform {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: expression.to_string(),
            tree,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl ValueTransform for ExpressionTransform {
    fn apply(&self, value: f64) -> Option<f64> {
        let mut context = HashMapContext::new();
        context
            .set_value(VALUE_VARIABLE.to_string(), Value::Float(value))
            .ok()?;

        match self.tree.eval_with_context(&context).ok()? {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_linear_expression() {
        let t = ExpressionTransform::compile("self * 0.5 + 1").unwrap();
        assert_approx_eq!(t.apply(4.0).unwrap(), 3.0, 1e-12);
        assert_eq!(t.source(), "self * 0.5 + 1");
    }

    #[test]
    fn test_integer_result_is_number() {
        let t = ExpressionTransform::compile("42").unwrap();
        assert_eq!(t.apply(1.0), Some(42.0));
    }

    #[test]
    fn test_non_numeric_result() {
        let t = ExpressionTransform::compile("self > 10").unwrap();
        assert_eq!(t.apply(12.0), None);
    }

    #[test]
    fn test_evaluation_error_is_none() {
        let t = ExpressionTransform::compile("self + unknown_variable").unwrap();
        assert_eq!(t.apply(1.0), None);
    }

    #[test]
    fn test_syntax_error() {
        let err = ExpressionTransform::compile("self * (").unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidTransform { .. }));
    }
}
