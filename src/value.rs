use std::fmt;

use crate::lower::LowerError;
use crate::slot::{DeclaredType, Slot};

/// Textual capabilities every operand provides to the lowering engine.
pub trait Render {
    /// Target of a change instruction (`stat x`). Only slots have one.
    fn assign_left(&self) -> Result<String, LowerError>;
    /// Value side of a change or comparison.
    fn assign_right(&self) -> String;
    /// Form used when interpolated inside a quoted message.
    fn in_string(&self) -> String;
    fn declared(&self) -> DeclaredType;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Long(i64),
    Double(f64),
    Text(String),
}

impl Literal {
    pub fn declared(&self) -> DeclaredType {
        match self {
            Literal::Long(_) => DeclaredType::Long,
            Literal::Double(_) => DeclaredType::Double,
            Literal::Text(_) => DeclaredType::String,
        }
    }

    pub fn validate(&self) -> Result<(), LowerError> {
        match self {
            Literal::Double(value) if !value.is_finite() => Err(LowerError::InvalidInput {
                message: format!("non-finite literal `{value}`"),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Long(value) => write!(f, "{value}"),
            Literal::Double(value) if value.fract() == 0.0 => write!(f, "{value:.1}"),
            Literal::Double(value) => write!(f, "{value}"),
            Literal::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

/// Operations that produce a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow(u32),
    Sign,
    Abs,
}

impl ExprOp {
    pub fn name(&self) -> &'static str {
        match self {
            ExprOp::Add => "add",
            ExprOp::Sub => "sub",
            ExprOp::Mul => "mul",
            ExprOp::Div => "div",
            ExprOp::Mod => "mod",
            ExprOp::Pow(_) => "pow",
            ExprOp::Sign => "sign",
            ExprOp::Abs => "abs",
        }
    }
}

/// A value already lowered into its own temp slot, plus the chain of operations that led there.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    temp: Slot,
    chain: Vec<ExprOp>,
}

impl Expression {
    pub fn new(temp: Slot, op: ExprOp, operands: &[&Operand]) -> Self {
        let mut chain: Vec<ExprOp> = operands
            .iter()
            .filter_map(|operand| match operand {
                Operand::Computed(expr) => Some(expr.chain.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect();
        chain.push(op);
        Self { temp, chain }
    }

    pub fn temp(&self) -> &Slot {
        &self.temp
    }

    pub fn chain(&self) -> &[ExprOp] {
        &self.chain
    }
}

/// Anything usable as an operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Slot(Slot),
    Literal(Literal),
    Computed(Expression),
    /// Read-only runtime value such as `%player.health%`.
    Placeholder { text: String, declared: DeclaredType },
}

impl Operand {
    pub fn placeholder(text: impl Into<String>, declared: DeclaredType) -> Self {
        Operand::Placeholder {
            text: text.into(),
            declared,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Literal(_))
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Operand::Literal(Literal::Long(value)) => Some(*value),
            _ => None,
        }
    }

    /// Slot backing this operand, if any.
    pub fn slot(&self) -> Option<&Slot> {
        match self {
            Operand::Slot(slot) => Some(slot),
            Operand::Computed(expr) => Some(expr.temp()),
            _ => None,
        }
    }
}

impl Render for Operand {
    fn assign_left(&self) -> Result<String, LowerError> {
        match self.slot() {
            Some(slot) => Ok(slot.assign_left()),
            None => Err(LowerError::InvalidInput {
                message: format!("`{}` cannot be assigned to", self.assign_right()),
            }),
        }
    }

    fn assign_right(&self) -> String {
        match self {
            Operand::Slot(slot) => slot.assign_right(),
            Operand::Computed(expr) => expr.temp().assign_right(),
            Operand::Literal(literal) => literal.to_string(),
            Operand::Placeholder { text, .. } => text.clone(),
        }
    }

    fn in_string(&self) -> String {
        match self {
            Operand::Literal(Literal::Text(text)) => text.clone(),
            other => other.assign_right(),
        }
    }

    fn declared(&self) -> DeclaredType {
        match self {
            Operand::Slot(slot) => slot.declared(),
            Operand::Computed(expr) => expr.temp().declared(),
            Operand::Literal(literal) => literal.declared(),
            Operand::Placeholder { declared, .. } => *declared,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Slot(slot) => write!(f, "{slot}"),
            Operand::Computed(expr) => write!(f, "{}", expr.temp()),
            Operand::Literal(literal) => write!(f, "{literal}"),
            Operand::Placeholder { text, .. } => f.write_str(text),
        }
    }
}

impl From<Slot> for Operand {
    fn from(slot: Slot) -> Self {
        Operand::Slot(slot)
    }
}

impl From<&Slot> for Operand {
    fn from(slot: &Slot) -> Self {
        Operand::Slot(slot.clone())
    }
}

impl From<Expression> for Operand {
    fn from(expr: Expression) -> Self {
        Operand::Computed(expr)
    }
}

impl From<Literal> for Operand {
    fn from(literal: Literal) -> Self {
        Operand::Literal(literal)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Literal(Literal::Long(value))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Literal(Literal::Double(value))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Literal(Literal::Text(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
        }
    }

    /// Operator to use when the operands swap sides.
    pub fn flipped(&self) -> CompareOp {
        match self {
            CompareOp::Less => CompareOp::Greater,
            CompareOp::LessEqual => CompareOp::GreaterEqual,
            CompareOp::Greater => CompareOp::Less,
            CompareOp::GreaterEqual => CompareOp::LessEqual,
            other => *other,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(CompareOp::Equal),
            "!=" => Some(CompareOp::NotEqual),
            "<" => Some(CompareOp::Less),
            "<=" => Some(CompareOp::LessEqual),
            ">" => Some(CompareOp::Greater),
            ">=" => Some(CompareOp::GreaterEqual),
            _ => None,
        }
    }
}

/// One rendered condition for an `if and (...)` / `if or (...)` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    text: String,
}

impl Condition {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
