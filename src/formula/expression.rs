//! Expression types and AST for parameterized weapon formulas.
//!
//! Damage, pain, stun, weapon bonus, misfire and jam chances are all written
//! as expressions over named parameters. Expressions can include literals,
//! parameters, binary/unary operations, conditionals, and function calls.

use ahash::AHashMap;
use std::collections::BTreeSet;

/// Binary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal (e.g., 42.5)
    Literal(f32),
    /// A parameter reference (e.g., "quality")
    Param(String),
    /// A binary operation (e.g., left + right)
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A unary operation (e.g., -x, !condition)
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    /// A conditional expression (if condition then true_expr else false_expr)
    Conditional {
        condition: Box<Expr>,
        true_expr: Box<Expr>,
        false_expr: Box<Expr>,
    },
    /// A function call (e.g., min(a, b))
    Function { name: String, args: Vec<Expr> },
}

/// Error type for expression evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Referenced a parameter that doesn't exist in the context
    UnknownParam(String),
    /// Called a function that doesn't exist
    UnknownFunction(String),
    /// Attempted to divide by zero
    DivisionByZero,
    /// Function called with wrong number of arguments
    InvalidArgCount {
        func: String,
        expected: usize,
        got: usize,
    },
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::UnknownParam(name) => write!(f, "Unknown parameter: {}", name),
            EvalError::UnknownFunction(name) => write!(f, "Unknown function: {}", name),
            EvalError::DivisionByZero => write!(f, "Division by zero"),
            EvalError::InvalidArgCount {
                func,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Function {} expected {} args, got {}",
                    func, expected, got
                )
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Error type for expression parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

fn truthy(value: f32) -> bool {
    value != 0.0
}

fn from_bool(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Expr {
    /// Parse an expression from source text
    pub fn parse(input: &str) -> Result<Expr, ParseError> {
        super::parser::parse_expression(input)
    }

    /// Build a binary node
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate against a parameter context
    pub fn evaluate(&self, params: &AHashMap<String, f32>) -> Result<f32, EvalError> {
        match self {
            Expr::Literal(value) => Ok(*value),
            Expr::Param(name) => params
                .get(name)
                .copied()
                .ok_or_else(|| EvalError::UnknownParam(name.clone())),
            Expr::BinOp { op, left, right } => {
                let l = left.evaluate(params)?;
                // Short-circuit logical operators
                match op {
                    BinOp::And if !truthy(l) => return Ok(0.0),
                    BinOp::Or if truthy(l) => return Ok(1.0),
                    _ => {}
                }
                let r = right.evaluate(params)?;
                match op {
                    BinOp::Add => Ok(l + r),
                    BinOp::Sub => Ok(l - r),
                    BinOp::Mul => Ok(l * r),
                    BinOp::Div => {
                        if r == 0.0 {
                            Err(EvalError::DivisionByZero)
                        } else {
                            Ok(l / r)
                        }
                    }
                    BinOp::Mod => {
                        if r == 0.0 {
                            Err(EvalError::DivisionByZero)
                        } else {
                            Ok(l % r)
                        }
                    }
                    BinOp::Gt => Ok(from_bool(l > r)),
                    BinOp::Lt => Ok(from_bool(l < r)),
                    BinOp::Gte => Ok(from_bool(l >= r)),
                    BinOp::Lte => Ok(from_bool(l <= r)),
                    BinOp::Eq => Ok(from_bool(l == r)),
                    BinOp::Neq => Ok(from_bool(l != r)),
                    BinOp::And | BinOp::Or => Ok(from_bool(truthy(r))),
                }
            }
            Expr::UnaryOp { op, operand } => {
                let value = operand.evaluate(params)?;
                match op {
                    UnaryOp::Neg => Ok(-value),
                    UnaryOp::Not => Ok(from_bool(!truthy(value))),
                }
            }
            Expr::Conditional {
                condition,
                true_expr,
                false_expr,
            } => {
                if truthy(condition.evaluate(params)?) {
                    true_expr.evaluate(params)
                } else {
                    false_expr.evaluate(params)
                }
            }
            Expr::Function { name, args } => {
                let values = args
                    .iter()
                    .map(|a| a.evaluate(params))
                    .collect::<Result<Vec<f32>, EvalError>>()?;
                call_function(name, &values)
            }
        }
    }

    /// Every parameter name referenced anywhere in the expression
    pub fn referenced_params(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Param(name) => {
                out.insert(name.clone());
            }
            Expr::BinOp { left, right, .. } => {
                left.collect_params(out);
                right.collect_params(out);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_params(out),
            Expr::Conditional {
                condition,
                true_expr,
                false_expr,
            } => {
                condition.collect_params(out);
                true_expr.collect_params(out);
                false_expr.collect_params(out);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_params(out);
                }
            }
        }
    }
}

fn expect_args(func: &str, values: &[f32], expected: usize) -> Result<(), EvalError> {
    if values.len() != expected {
        return Err(EvalError::InvalidArgCount {
            func: func.to_string(),
            expected,
            got: values.len(),
        });
    }
    Ok(())
}

fn call_function(name: &str, values: &[f32]) -> Result<f32, EvalError> {
    match name {
        "min" => {
            expect_args(name, values, 2)?;
            Ok(values[0].min(values[1]))
        }
        "max" => {
            expect_args(name, values, 2)?;
            Ok(values[0].max(values[1]))
        }
        "abs" => {
            expect_args(name, values, 1)?;
            Ok(values[0].abs())
        }
        "floor" => {
            expect_args(name, values, 1)?;
            Ok(values[0].floor())
        }
        "ceil" => {
            expect_args(name, values, 1)?;
            Ok(values[0].ceil())
        }
        "round" => {
            expect_args(name, values, 1)?;
            Ok(values[0].round())
        }
        "sqrt" => {
            expect_args(name, values, 1)?;
            Ok(values[0].max(0.0).sqrt())
        }
        "pow" => {
            expect_args(name, values, 2)?;
            Ok(values[0].powf(values[1]))
        }
        "clamp" => {
            expect_args(name, values, 3)?;
            Ok(values[0].max(values[1]).min(values[2]))
        }
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}
