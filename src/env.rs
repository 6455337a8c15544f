//! Shell environment: variable storage, `$var` resolution, and arithmetic.
//!
//! The environment owns the mapping from variable names to string values.
//! Values are always strings; arithmetic parses them to `i64` at evaluation
//! time only. Resolution supports:
//! - `$name` and `${name}` references, expanded transitively to a fixed point
//! - `$$` as a literal-dollar escape, collapsed after expansion converges
//!
//! Arithmetic (`eval_ll`) evaluates `+ - * / %` over integer literals with
//! parentheses and positional unary `+`/`-`, using an operand/operator stack
//! pair.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExprError {
    #[error("Unrecognized symbol: {0:?}")]
    UnrecognizedSymbol(char),
    #[error("Invalid expression: {0}")]
    InvalidExpression(&'static str),
    #[error("Missing bracket")]
    MissingBracket,
    #[error("Division by zero")]
    DivisionByZero,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Variable resolution did not converge within {0} passes")]
    DidNotConverge(usize),
}

/// Variable table and resolver for one shell session.
///
/// A session owns exactly one `Environment`; it is deliberately not `Clone`.
pub struct Environment {
    vars: BTreeMap<String, String>,
    var_pattern: Regex,
    resolve_limit: Option<usize>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            // One alternation covers the escape and both reference forms,
            // so a left-to-right scan never mistakes the `$` inside `$$`
            // for the start of a reference.
            var_pattern: Regex::new(r"\$\$|\$\{(\w+)\}|\$(\w+)")
                .expect("variable pattern is valid"),
            vars: BTreeMap::new(),
            resolve_limit: None,
        }
    }

    /// Set a variable, inserting or overwriting. Chainable.
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Get a variable's value, or the empty string if absent. Never fails.
    pub fn get_value(&self, name: &str) -> String {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    /// Snapshot copy of the full variable table.
    pub fn get_values(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }

    /// Bound the number of substitution passes `resolve` may make.
    ///
    /// Unset by default: a variable whose value references itself (directly
    /// or transitively) then makes `resolve` loop forever, matching the
    /// behavior batch scripts may rely on. With a limit set, such input
    /// fails with [`ResolveError::DidNotConverge`] instead.
    pub fn set_resolve_limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.resolve_limit = limit;
        self
    }

    /// Expand every `$name`/`${name}` reference in `text`, transitively,
    /// until no reference remains, then collapse `$$` to a literal `$`.
    ///
    /// Each pass substitutes all references present in the current string;
    /// substituted values are inserted literally, so references they contain
    /// are picked up by the next pass rather than reparsed in place. Missing
    /// variables expand to the empty string.
    pub fn resolve(&self, text: &str) -> Result<String, ResolveError> {
        let mut result = text.to_string();
        let mut passes = 0usize;

        loop {
            if let Some(limit) = self.resolve_limit {
                if passes > limit {
                    return Err(ResolveError::DidNotConverge(limit));
                }
            }

            let next = {
                let mut substituted = false;
                let replaced = self.var_pattern.replace_all(&result, |caps: &Captures| {
                    match caps.get(1).or_else(|| caps.get(2)) {
                        Some(name) => {
                            substituted = true;
                            self.get_value(name.as_str())
                        }
                        // `$$` survives every pass and collapses at the end.
                        None => caps[0].to_string(),
                    }
                });
                if substituted {
                    Some(replaced.into_owned())
                } else {
                    None
                }
            };

            match next {
                Some(replaced) => result = replaced,
                None => break,
            }
            passes += 1;
        }

        Ok(result.replace("$$", "$"))
    }

    /// Evaluate an integer arithmetic expression.
    ///
    /// Grammar: non-negative integer literals, binary `+ - * / %` with
    /// standard precedence, positional unary `+`/`-`, parentheses, and
    /// ignored spaces. Any other character fails validation up front.
    /// Division and modulo truncate toward zero; an empty expression
    /// evaluates to 0.
    pub fn eval_ll(&self, expression: &str) -> Result<i64, ExprError> {
        if let Some(bad) = expression.chars().find(|&c| !is_math_symbol(c)) {
            return Err(ExprError::UnrecognizedSymbol(bad));
        }

        let mut operands: Vec<i64> = Vec::new();
        let mut operators: Vec<Op> = Vec::new();
        // An operator is unary iff it appears where an operand is expected:
        // start of expression, after `(`, or after another operator.
        let mut expect_operand = true;

        let bytes = expression.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b' ' => {}
                b'(' => {
                    operators.push(Op::LParen);
                    expect_operand = true;
                }
                b')' => {
                    loop {
                        match operators.pop() {
                            Some(Op::LParen) => break,
                            Some(op) => apply(op, &mut operands)?,
                            None => return Err(ExprError::MissingBracket),
                        }
                    }
                    expect_operand = false;
                }
                c @ (b'+' | b'-' | b'*' | b'/' | b'%') => {
                    let op = match (c, expect_operand) {
                        (b'+', true) => Op::Pos,
                        (b'-', true) => Op::Neg,
                        (b'+', false) => Op::Add,
                        (b'-', false) => Op::Sub,
                        (b'*', false) => Op::Mul,
                        (b'/', false) => Op::Div,
                        (b'%', false) => Op::Mod,
                        _ => {
                            return Err(ExprError::InvalidExpression(
                                "operator where an operand was expected",
                            ))
                        }
                    };
                    // Left-associative binary operators reduce everything of
                    // equal or higher priority; unary operators bind tighter
                    // and reduce only strictly higher.
                    let min = if op.is_unary() {
                        op.priority() + 1
                    } else {
                        op.priority()
                    };
                    reduce(&mut operators, &mut operands, min)?;
                    operators.push(op);
                    expect_operand = true;
                }
                b'0'..=b'9' => {
                    let mut value: i64 = 0;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        value = value.wrapping_mul(10).wrapping_add((bytes[i] - b'0') as i64);
                        i += 1;
                    }
                    operands.push(value);
                    expect_operand = false;
                    continue;
                }
                other => return Err(ExprError::UnrecognizedSymbol(other as char)),
            }
            i += 1;
        }

        while let Some(op) = operators.pop() {
            apply(op, &mut operands)?;
        }

        Ok(operands.pop().unwrap_or(0))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn is_math_symbol(c: char) -> bool {
    matches!(c, '0'..='9' | '+' | '-' | '*' | '/' | '%' | '(' | ')' | ' ')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pos,
    Neg,
    LParen,
}

impl Op {
    fn priority(self) -> i32 {
        match self {
            Op::Pos | Op::Neg => 3,
            Op::Mul | Op::Div | Op::Mod => 2,
            Op::Add | Op::Sub => 1,
            Op::LParen => 0,
        }
    }

    fn is_unary(self) -> bool {
        matches!(self, Op::Pos | Op::Neg)
    }
}

/// Pop stacked operators of priority `min` or higher and apply them.
/// A `(` always stops the reduction.
fn reduce(operators: &mut Vec<Op>, operands: &mut Vec<i64>, min: i32) -> Result<(), ExprError> {
    while let Some(&top) = operators.last() {
        if top == Op::LParen || top.priority() < min {
            break;
        }
        operators.pop();
        apply(top, operands)?;
    }
    Ok(())
}

fn apply(op: Op, operands: &mut Vec<i64>) -> Result<(), ExprError> {
    match op {
        Op::Pos | Op::Neg => {
            let value = operands
                .pop()
                .ok_or(ExprError::InvalidExpression("unary operator without an operand"))?;
            operands.push(if op == Op::Neg { value.wrapping_neg() } else { value });
        }
        // A `(` still on the stack at end of input was never closed.
        Op::LParen => return Err(ExprError::MissingBracket),
        _ => {
            let rhs = operands
                .pop()
                .ok_or(ExprError::InvalidExpression("binary operator missing an operand"))?;
            let lhs = operands
                .pop()
                .ok_or(ExprError::InvalidExpression("binary operator missing an operand"))?;
            let value = match op {
                Op::Add => lhs.wrapping_add(rhs),
                Op::Sub => lhs.wrapping_sub(rhs),
                Op::Mul => lhs.wrapping_mul(rhs),
                Op::Div | Op::Mod if rhs == 0 => return Err(ExprError::DivisionByZero),
                Op::Div => lhs.wrapping_div(rhs),
                Op::Mod => lhs.wrapping_rem(rhs),
                Op::Pos | Op::Neg | Op::LParen => unreachable!("handled above"),
            };
            operands.push(value);
        }
    }
    Ok(())
}
