//! Parameterized formulas
//!
//! A `Formula` is an expression kept together with its source text so it
//! can be written to and read from TOML as a plain string.

pub mod expression;
pub mod parser;

pub use expression::{BinOp, EvalError, Expr, ParseError, UnaryOp};

use serde::{Deserialize, Serialize};
use ahash::AHashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("formula '{formula}': {source}")]
    Eval { formula: String, source: EvalError },

    #[error("formula '{formula}' references unknown parameter '{param}'")]
    UnexpectedParam { formula: String, param: String },
}

/// Named parameter values for one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaParams {
    values: AHashMap<String, f32>,
}

impl FormulaParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f32) -> Self {
        self.set(name, value);
        self
    }

    /// Boolean parameters are 1.0 / 0.0
    pub fn with_flag(self, name: &str, flag: bool) -> Self {
        self.with(name, if flag { 1.0 } else { 0.0 })
    }

    pub fn set(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn as_map(&self) -> &AHashMap<String, f32> {
        &self.values
    }
}

/// A parsed expression plus its source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let expr = Expr::parse(source)?;
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// A formula that always evaluates to `value` (non-negative)
    pub fn constant(value: f32) -> Self {
        Self {
            source: format!("{}", value),
            expr: Expr::Literal(value),
        }
    }

    /// Parse a formula compiled into the crate.
    ///
    /// Only for string literals shipped with the crate. A literal that fails
    /// to parse is logged and evaluates to zero; the config default tests
    /// parse every shipped literal.
    pub fn builtin(source: &'static str) -> Self {
        match Self::parse(source) {
            Ok(formula) => formula,
            Err(e) => {
                tracing::error!("built-in formula {:?} does not parse: {}", source, e);
                Self::constant(0.0)
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, params: &FormulaParams) -> Result<f32, FormulaError> {
        self.expr
            .evaluate(params.as_map())
            .map_err(|source| FormulaError::Eval {
                formula: self.source.clone(),
                source,
            })
    }

    /// Reject formulas that reference anything outside `allowed`
    pub fn check_params(&self, allowed: &[&str]) -> Result<(), FormulaError> {
        for param in self.expr.referenced_params() {
            if !allowed.contains(&param.as_str()) {
                return Err(FormulaError::UnexpectedParam {
                    formula: self.source.clone(),
                    param,
                });
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Formula::parse(&value)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_evaluates_with_params() {
        let formula = Formula::parse("quality * 2 + degree").unwrap();
        let params = FormulaParams::new().with("quality", 4.0).with("degree", 1.0);
        assert_eq!(formula.evaluate(&params).unwrap(), 9.0);
    }

    #[test]
    fn test_flag_params() {
        let formula = Formula::parse("if melee then 3 else 1").unwrap();
        let params = FormulaParams::new().with_flag("melee", true);
        assert_eq!(formula.evaluate(&params).unwrap(), 3.0);
    }

    #[test]
    fn test_missing_param_reports_formula() {
        let formula = Formula::parse("range * 2").unwrap();
        let err = formula.evaluate(&FormulaParams::new()).unwrap_err();
        match err {
            FormulaError::Eval { formula, source } => {
                assert_eq!(formula, "range * 2");
                assert_eq!(source, EvalError::UnknownParam("range".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_check_params() {
        let formula = Formula::parse("quality + bogus").unwrap();
        assert!(formula.check_params(&["quality", "bogus"]).is_ok());
        assert!(matches!(
            formula.check_params(&["quality"]),
            Err(FormulaError::UnexpectedParam { .. })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            damage: Formula,
        }
        let holder: Holder = toml::from_str("damage = \"quality + 1\"").unwrap();
        assert_eq!(holder.damage.source(), "quality + 1");
        let out = toml::to_string(&holder).unwrap();
        assert!(out.contains("quality + 1"));
    }

    #[test]
    fn test_invalid_formula_fails_deserialization() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Holder {
            damage: Formula,
        }
        let result: Result<Holder, _> = toml::from_str("damage = \"quality +\"");
        assert!(result.is_err());
    }
}
