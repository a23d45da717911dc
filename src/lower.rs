//! Expression lowering: every operation is emitted eagerly into the active stream, each
//! compound subexpression landing in its own fresh temp slot.
use thiserror::Error;
use tracing::debug;

use crate::slot::{DeclaredType, Scope, Slot, SlotCache, TempAllocator};
use crate::stream::{ChangeKind, Instruction, InstructionStream, Tag};
use crate::value::{CompareOp, Condition, ExprOp, Expression, Literal, Operand, Render};

/// 2^62, the saturation constant used by `sign`.
const SIGN_PIVOT: i64 = 1 << 62;
/// Larger exponents overflow 64-bit arithmetic for any base other than -1, 0 and 1.
pub const MAX_EXPONENT: i64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn mode(self) -> &'static str {
        match self {
            BinaryOp::Add => "inc",
            BinaryOp::Sub => "dec",
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
        }
    }

    fn expr_op(self) -> ExprOp {
        match self {
            BinaryOp::Add => ExprOp::Add,
            BinaryOp::Sub => ExprOp::Sub,
            BinaryOp::Mul => ExprOp::Mul,
            BinaryOp::Div => ExprOp::Div,
        }
    }

    fn is_commutative(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Mul)
    }
}

/// Compound assignment operators applied directly to a user slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowStrategy {
    /// Try both strategies and keep the strictly shorter one; ties keep `Multiply`.
    #[default]
    Auto,
    Multiply,
    Divide,
}

/// State shared by every lowering call of one compilation unit.
#[derive(Debug, Default)]
pub struct LoweringContext {
    temps: TempAllocator,
    slots: SlotCache,
}

impl LoweringContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical slot for this identity, registering it on first use.
    pub fn declare(&mut self, slot: Slot) -> Result<Slot, LowerError> {
        self.slots.intern(slot)
    }

    pub fn temps_allocated(&self) -> u64 {
        self.temps.allocated()
    }

    pub fn slots(&self) -> &SlotCache {
        &self.slots
    }
}

/// Lowers operations into one container's stream.
pub struct Lowerer<'a> {
    ctx: &'a mut LoweringContext,
    stream: &'a mut InstructionStream,
}

impl<'a> Lowerer<'a> {
    pub fn new(ctx: &'a mut LoweringContext, stream: &'a mut InstructionStream) -> Self {
        Self { ctx, stream }
    }

    pub fn add(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        self.binary(BinaryOp::Add, left, right)
    }

    pub fn sub(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        self.binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        self.binary(BinaryOp::Mul, left, right)
    }

    pub fn div(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        self.binary(BinaryOp::Div, left, right)
    }

    /// Division already truncates on the target, so floor division is the same instruction pair.
    pub fn floordiv(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        self.binary(BinaryOp::Div, left, right)
    }

    /// `T = left; T <op>= right`.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: &Operand,
        right: &Operand,
    ) -> Result<Operand, LowerError> {
        check_compatible(op.expr_op().name(), left, right)?;
        self.atomic(|this| this.emit_binary(op, left, right))
    }

    /// Operator invoked on `this` with the host value `other` on the left, e.g. `5 - x`.
    pub fn reflected(
        &mut self,
        op: BinaryOp,
        this: &Operand,
        other: &Operand,
    ) -> Result<Operand, LowerError> {
        if op.is_commutative() {
            self.binary(op, this, other)
        } else {
            self.binary(op, other, this)
        }
    }

    /// Exponentiation by squaring with the cheaper of the two strategies.
    pub fn pow(&mut self, base: &Operand, exponent: i64) -> Result<Operand, LowerError> {
        self.pow_with(base, exponent, PowStrategy::Auto)
    }

    pub fn pow_with(
        &mut self,
        base: &Operand,
        exponent: i64,
        strategy: PowStrategy,
    ) -> Result<Operand, LowerError> {
        if exponent < 0 {
            return Err(LowerError::InvalidInput {
                message: format!("negative exponent {exponent} for `{base}`"),
            });
        }
        if exponent > MAX_EXPONENT {
            return Err(LowerError::InvalidInput {
                message: format!("exponent {exponent} exceeds {MAX_EXPONENT}"),
            });
        }
        require_numeric("pow", base)?;
        let exponent = exponent as u32;
        self.atomic(|this| this.emit_pow(base, exponent, strategy))
    }

    /// Euclidean modulo: result lies in `[0, right)` even for negative `left`.
    pub fn modulo(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        check_compatible("mod", left, right)?;
        require_numeric("mod", left)?;
        require_numeric("mod", right)?;
        self.atomic(|this| this.emit_safe_mod(left, right))
    }

    pub fn reflected_modulo(
        &mut self,
        this: &Operand,
        other: &Operand,
    ) -> Result<Operand, LowerError> {
        self.modulo(other, this)
    }

    /// `±scale` depending on the sign of `value`. Zero maps to `+scale`.
    pub fn sign(
        &mut self,
        value: &Operand,
        scale: i64,
        greater_than_2_62: bool,
    ) -> Result<Operand, LowerError> {
        require_numeric("sign", value)?;
        self.atomic(|this| this.emit_sign(value, scale, greater_than_2_62))
    }

    /// `value * sign(value)`; pass an already lowered sign to skip recomputing it.
    pub fn abs(
        &mut self,
        value: &Operand,
        precomputed_sign: Option<&Operand>,
    ) -> Result<Operand, LowerError> {
        require_numeric("abs", value)?;
        self.atomic(|this| {
            let sign = match precomputed_sign {
                Some(sign) => sign.clone(),
                None => this.emit_sign(value, 1, false)?,
            };
            let product = this.emit_binary(BinaryOp::Mul, value, &sign)?;
            Ok(relabel(product, ExprOp::Abs, &[value]))
        })
    }

    /// `target = value`.
    pub fn assign(&mut self, target: &Slot, value: &Operand) -> Result<(), LowerError> {
        let target_operand = Operand::from(target);
        check_compatible("assign", &target_operand, value)?;
        validate_operand(value)?;
        self.change(target, "set", value, false);
        Ok(())
    }

    /// `target <op>= value`, changing the slot directly.
    pub fn assign_op(
        &mut self,
        target: &Slot,
        op: AssignOp,
        value: &Operand,
    ) -> Result<(), LowerError> {
        let target_operand = Operand::from(target);
        check_compatible("assign", &target_operand, value)?;
        validate_operand(value)?;
        let mode = match op {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Mod => {
                require_numeric("mod", &target_operand)?;
                require_numeric("mod", value)?;
                return self.atomic(|this| this.emit_mod_in_place(target, value));
            }
        };
        self.change(target, mode.mode(), value, false);
        Ok(())
    }

    /// Renders a comparison for an `if` header. A literal on the left is moved to the right.
    pub fn compare(
        &mut self,
        left: &Operand,
        op: CompareOp,
        right: &Operand,
    ) -> Result<Condition, LowerError> {
        check_compatible(op.symbol(), left, right)?;
        validate_operand(left)?;
        validate_operand(right)?;
        let (left, op, right) = match (left.is_literal(), right.is_literal()) {
            (true, true) => {
                return Err(LowerError::InvalidInput {
                    message: format!("comparison between two literals `{left}` and `{right}`"),
                })
            }
            (true, false) => (right, op.flipped(), left),
            _ => (left, op, right),
        };
        let subject = match left {
            Operand::Placeholder { text, .. } => format!("placeholder {text}"),
            other => other.assign_left()?,
        };
        Ok(Condition::new(format!(
            "{subject} {} {}",
            op.symbol(),
            right.assign_right()
        )))
    }

    fn atomic<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        let mark = self.stream.mark();
        let result = body(self);
        if result.is_err() {
            self.stream.truncate(mark);
        }
        result
    }

    fn emit_binary(
        &mut self,
        op: BinaryOp,
        left: &Operand,
        right: &Operand,
    ) -> Result<Operand, LowerError> {
        validate_operand(left)?;
        validate_operand(right)?;
        let declared = match (left.is_literal(), right.is_literal()) {
            (true, false) => right.declared(),
            (false, true) => left.declared(),
            _ => left.declared().join(right.declared()),
        };
        let temp = self.define(left, declared);
        self.change(&temp, op.mode(), right, false);
        Ok(Operand::Computed(Expression::new(
            temp,
            op.expr_op(),
            &[left, right],
        )))
    }

    /// Allocates a temp and emits its defining `set`.
    fn define(&mut self, value: &Operand, declared: DeclaredType) -> Slot {
        let temp = self.ctx.temps.allocate(declared);
        self.change(&temp, "set", value, true);
        temp
    }

    fn change(&mut self, target: &Slot, mode: &str, value: &Operand, defines_temp: bool) {
        let text = format!("{} {mode} {}", target.assign_left(), value.assign_right());
        let mut instruction = Instruction::new(text, Tag::VarChange(change_kind(target)));
        if defines_temp && target.is_auto_unset() {
            instruction = instruction.auto_unset();
        }
        self.stream.push(instruction);
    }

    fn self_change(&mut self, temp: &Slot, mode: &str) {
        let operand = Operand::from(temp);
        self.change(temp, mode, &operand, false);
    }

    fn emit_pow(
        &mut self,
        base: &Operand,
        exponent: u32,
        strategy: PowStrategy,
    ) -> Result<Operand, LowerError> {
        if exponent == 0 {
            return Ok(Operand::Literal(Literal::Long(1)));
        }
        match strategy {
            PowStrategy::Multiply => self.pow_by_multiply(base, exponent),
            PowStrategy::Divide => self.pow_by_divide(base, exponent),
            PowStrategy::Auto => {
                let mark = self.stream.mark();
                let by_multiply = self.pow_by_multiply(base, exponent)?;
                let multiply_cost = self.stream.mark() - mark;
                if multiply_cost <= 1 {
                    return Ok(by_multiply);
                }
                let multiply_lines = self.stream.drain_from(mark);
                let by_divide = self.pow_by_divide(base, exponent)?;
                let divide_cost = self.stream.mark() - mark;
                debug!(exponent, multiply_cost, divide_cost, "pow strategies compared");
                if divide_cost < multiply_cost {
                    Ok(by_divide)
                } else {
                    self.stream.truncate(mark);
                    self.stream.extend(multiply_lines);
                    Ok(by_multiply)
                }
            }
        }
    }

    /// Square up to `x^(2^k)` with `k = floor(log2 n)`, then multiply the remainder in.
    fn pow_by_multiply(&mut self, base: &Operand, exponent: u32) -> Result<Operand, LowerError> {
        let squarings = floor_log2(exponent);
        let temp = self.define(base, base.declared());
        for _ in 0..squarings {
            self.self_change(&temp, "multiply");
        }
        match exponent - (1 << squarings) {
            0 => {}
            1 => self.change(&temp, "multiply", base, false),
            remainder => {
                let part = self.emit_pow(base, remainder, PowStrategy::Auto)?;
                self.change(&temp, "multiply", &part, false);
            }
        }
        Ok(Operand::Computed(Expression::new(
            temp,
            ExprOp::Pow(exponent),
            &[base],
        )))
    }

    /// Square once past the target to `x^(2^(k+1))`, then divide the excess back out.
    fn pow_by_divide(&mut self, base: &Operand, exponent: u32) -> Result<Operand, LowerError> {
        let squarings = floor_log2(exponent) + 1;
        let excess = ((1u64 << squarings) - u64::from(exponent)) as u32;
        let temp = self.define(base, base.declared());
        for _ in 0..squarings {
            self.self_change(&temp, "multiply");
        }
        match excess {
            1 => self.change(&temp, "divide", base, false),
            2 => {
                self.change(&temp, "divide", base, false);
                self.change(&temp, "divide", base, false);
            }
            power if power.is_power_of_two() => {
                let divisor = self.pow_by_multiply(base, power)?;
                self.change(&temp, "divide", &divisor, false);
            }
            other => {
                let divisor = self.emit_pow(base, other, PowStrategy::Auto)?;
                self.change(&temp, "divide", &divisor, false);
            }
        }
        Ok(Operand::Computed(Expression::new(
            temp,
            ExprOp::Pow(exponent),
            &[base],
        )))
    }

    /// `a - b * trunc(a / b)`; keeps the sign of `a`.
    fn emit_unsafe_mod(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        let quotient = self.emit_binary(BinaryOp::Div, left, right)?;
        let product = self.emit_binary(BinaryOp::Mul, &quotient, right)?;
        self.emit_binary(BinaryOp::Sub, left, &product)
    }

    fn emit_safe_mod(&mut self, left: &Operand, right: &Operand) -> Result<Operand, LowerError> {
        let raw = self.emit_unsafe_mod(left, right)?;
        let shifted = self.emit_binary(BinaryOp::Add, &raw, right)?;
        let result = self.emit_unsafe_mod(&shifted, right)?;
        Ok(relabel(result, ExprOp::Mod, &[left, right]))
    }

    fn emit_mod_in_place(&mut self, target: &Slot, value: &Operand) -> Result<(), LowerError> {
        let target_operand = Operand::from(target);
        let result = self.emit_safe_mod(&target_operand, value)?;
        self.change(target, "set", &result, false);
        if value.as_long().is_some_and(|divisor| divisor > 0) {
            return Ok(());
        }
        // A negative divisor leaves the result in (right, 0]; subtract right once more when
        // the target is negative: x -= right * ((1 - sign(x)) / 2).
        let sign = self.emit_sign(&target_operand, 1, false)?;
        let negative = self.emit_binary(BinaryOp::Sub, &Operand::from(1), &sign)?;
        let negative = self.emit_binary(BinaryOp::Div, &negative, &Operand::from(2))?;
        let correction = self.emit_binary(BinaryOp::Mul, &negative, value)?;
        self.change(target, "dec", &correction, false);
        Ok(())
    }

    fn emit_sign(
        &mut self,
        value: &Operand,
        scale: i64,
        greater_than_2_62: bool,
    ) -> Result<Operand, LowerError> {
        validate_operand(value)?;
        let doubled = scale.checked_mul(2).ok_or_else(|| LowerError::InvalidInput {
            message: format!("sign scale {scale} overflows when doubled"),
        })?;
        let temp = self.define(value, DeclaredType::Long);
        if greater_than_2_62 {
            self.change(&temp, "divide", &Operand::from(2), false);
        }
        self.change(&temp, "inc", &Operand::from(SIGN_PIVOT), false);
        self.change(&temp, "divide", &Operand::from(SIGN_PIVOT), false);
        self.change(&temp, "multiply", &Operand::from(doubled), false);
        self.change(&temp, "dec", &Operand::from(scale), false);
        Ok(Operand::Computed(Expression::new(temp, ExprOp::Sign, &[value])))
    }
}

fn floor_log2(value: u32) -> u32 {
    31 - value.leading_zeros()
}

fn relabel(result: Operand, op: ExprOp, operands: &[&Operand]) -> Operand {
    match result {
        Operand::Computed(expr) => {
            Operand::Computed(Expression::new(expr.temp().clone(), op, operands))
        }
        other => other,
    }
}

fn change_kind(slot: &Slot) -> ChangeKind {
    match slot.scope() {
        Scope::Player | Scope::Temp => ChangeKind::Player,
        Scope::Global => ChangeKind::Global,
        Scope::Team => ChangeKind::Team,
    }
}

fn validate_operand(operand: &Operand) -> Result<(), LowerError> {
    match operand {
        Operand::Literal(literal) => literal.validate(),
        _ => Ok(()),
    }
}

/// Lattice check on the effective operand order. Literal coercion applies to either side.
fn check_compatible(
    operation: &'static str,
    left: &Operand,
    right: &Operand,
) -> Result<(), LowerError> {
    let (left_type, right_type) = (left.declared(), right.declared());
    if left_type.accepts(right_type, left.is_literal() || right.is_literal()) {
        Ok(())
    } else {
        Err(LowerError::TypeIncompatible {
            operation,
            left: format!("{left}: {left_type}"),
            right: format!("{right}: {right_type}"),
        })
    }
}

fn require_numeric(operation: &'static str, operand: &Operand) -> Result<(), LowerError> {
    if operand.declared() == DeclaredType::String {
        Err(LowerError::TypeIncompatible {
            operation,
            left: format!("{operand}: {}", operand.declared()),
            right: String::from("number"),
        })
    } else {
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LowerError {
    #[error("`{operation}` cannot combine `{left}` with `{right}`")]
    TypeIncompatible {
        operation: &'static str,
        left: String,
        right: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}
