//! Symbolic-to-numeric bytecode compiler
//!
//! Expressions are compiled once to stack-based bytecode and then evaluated
//! at many sample points. The evaluator is generic over [`Scalar`] so the
//! same program samples signals on a real time grid and transfer functions
//! on the imaginary axis.

use crate::expr::{SymExpr, SymExprKind, DIRAC_DELTA, HEAVISIDE};
use crate::{Result, SymbolicError};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Numeric domain the bytecode can run in
pub trait Scalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn from_f64(value: f64) -> Self;
    fn pow(self, exp: Self) -> Self;
    fn is_finite(self) -> bool;
    /// Apply a built-in function. `None` when the function is unknown or
    /// undefined for this argument.
    fn call(name: &str, arg: Self) -> Option<Self>;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn pow(self, exp: Self) -> Self {
        if exp.fract() == 0.0 && exp.abs() <= i32::MAX as f64 {
            self.powi(exp as i32)
        } else {
            self.powf(exp)
        }
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn call(name: &str, x: Self) -> Option<Self> {
        let value = match name {
            "sin" => x.sin(),
            "cos" => x.cos(),
            "tan" => x.tan(),
            "exp" => x.exp(),
            "log" => x.ln(),
            "sqrt" => x.sqrt(),
            "abs" => x.abs(),
            HEAVISIDE => step(x),
            DIRAC_DELTA => impulse(x),
            _ => return None,
        };
        Some(value)
    }
}

impl Scalar for Complex64 {
    fn from_f64(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    fn pow(self, exp: Self) -> Self {
        if exp.im == 0.0 && exp.re.fract() == 0.0 && exp.re.abs() <= i32::MAX as f64 {
            self.powi(exp.re as i32)
        } else {
            self.powc(exp)
        }
    }

    fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }

    fn call(name: &str, z: Self) -> Option<Self> {
        let value = match name {
            "sin" => z.sin(),
            "cos" => z.cos(),
            "tan" => z.tan(),
            "exp" => z.exp(),
            "log" => z.ln(),
            "sqrt" => z.sqrt(),
            "abs" => Complex64::new(z.norm(), 0.0),
            // Step and impulse are only defined on the real line
            HEAVISIDE if z.im == 0.0 => Complex64::new(step(z.re), 0.0),
            DIRAC_DELTA if z.im == 0.0 => Complex64::new(impulse(z.re), 0.0),
            _ => return None,
        };
        Some(value)
    }
}

/// Unit step with H(0) = 1
fn step(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Impulse sampled pointwise: infinite at the origin, zero elsewhere
fn impulse(x: f64) -> f64 {
    if x == 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Bytecode instruction for the expression evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BytecodeOp {
    /// Push a constant onto the stack
    PushConst(usize),
    /// Load a variable onto the stack
    LoadVar(usize),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    /// Apply a one-argument built-in
    Call(String),
}

/// Compiled bytecode representation of a symbolic expression
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ops: Vec<BytecodeOp>,
    pub constants: Vec<f64>,
    /// Variable names in binding order
    pub variables: Vec<String>,
    pub max_stack: usize,
}

impl CompiledExpr {
    /// Evaluate with one value per variable, in binding order
    pub fn eval<T: Scalar>(&self, var_values: &[T]) -> Result<T> {
        if var_values.len() != self.variables.len() {
            return Err(SymbolicError::Evaluation(format!(
                "expected {} variable values, got {}",
                self.variables.len(),
                var_values.len()
            )));
        }

        let mut stack: Vec<T> = Vec::with_capacity(self.max_stack);
        let underflow = || SymbolicError::Evaluation("stack underflow".to_string());

        for op in &self.ops {
            match op {
                BytecodeOp::PushConst(idx) => stack.push(T::from_f64(self.constants[*idx])),
                BytecodeOp::LoadVar(idx) => stack.push(var_values[*idx]),
                BytecodeOp::Neg => {
                    let a = stack.pop().ok_or_else(underflow)?;
                    stack.push(-a);
                }
                BytecodeOp::Call(name) => {
                    let a = stack.pop().ok_or_else(underflow)?;
                    let value = T::call(name, a).ok_or_else(|| {
                        SymbolicError::Evaluation(format!("cannot evaluate {name} at {a:?}"))
                    })?;
                    stack.push(value);
                }
                binary => {
                    let b = stack.pop().ok_or_else(underflow)?;
                    let a = stack.pop().ok_or_else(underflow)?;
                    stack.push(match binary {
                        BytecodeOp::Add => a + b,
                        BytecodeOp::Sub => a - b,
                        BytecodeOp::Mul => a * b,
                        BytecodeOp::Div => a / b,
                        _ => a.pow(b),
                    });
                }
            }
        }

        stack
            .pop()
            .ok_or_else(|| SymbolicError::Evaluation("empty stack at end".to_string()))
    }

    /// Evaluate a single-variable (or constant) expression at every point.
    /// Each sample succeeds or fails independently.
    pub fn eval_range<T: Scalar>(&self, values: &[T]) -> Vec<Result<T>> {
        match self.variables.len() {
            0 => {
                let value = self.eval::<T>(&[]);
                values.iter().map(|_| value.clone()).collect()
            }
            1 => values
                .iter()
                .map(|v| self.eval(std::slice::from_ref(v)))
                .collect(),
            n => {
                let err = SymbolicError::Evaluation(format!(
                    "range evaluation needs at most one variable, got {n}"
                ));
                values.iter().map(|_| Err(err.clone())).collect()
            }
        }
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }
}

/// Compiler from SymExpr to bytecode
pub struct BytecodeCompiler {
    constants: Vec<f64>,
    const_map: HashMap<u64, usize>,
    variables: Vec<String>,
    var_map: HashMap<String, usize>,
}

impl BytecodeCompiler {
    pub fn new() -> Self {
        BytecodeCompiler {
            constants: Vec::new(),
            const_map: HashMap::new(),
            variables: Vec::new(),
            var_map: HashMap::new(),
        }
    }

    fn add_constant(&mut self, value: f64) -> usize {
        let key = value.to_bits();
        if let Some(&idx) = self.const_map.get(&key) {
            return idx;
        }
        let idx = self.constants.len();
        self.constants.push(value);
        self.const_map.insert(key, idx);
        idx
    }

    fn add_variable(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.var_map.get(name) {
            return idx;
        }
        let idx = self.variables.len();
        self.variables.push(name.to_string());
        self.var_map.insert(name.to_string(), idx);
        idx
    }

    /// Compile with variables bound in order of first occurrence
    pub fn compile(mut self, expr: &SymExpr) -> Result<CompiledExpr> {
        let mut program = Program::default();
        self.compile_expr(expr, &mut program)?;
        Ok(self.finish(program))
    }

    /// Compile with an explicit binding order; extra variables found in the
    /// tree are appended after `var_order`.
    pub fn compile_with_vars(mut self, expr: &SymExpr, var_order: &[&str]) -> Result<CompiledExpr> {
        for name in var_order {
            self.add_variable(name);
        }
        self.compile(expr)
    }

    fn finish(self, program: Program) -> CompiledExpr {
        CompiledExpr {
            ops: program.ops,
            constants: self.constants,
            variables: self.variables,
            max_stack: program.max_stack,
        }
    }

    fn compile_expr(&mut self, expr: &SymExpr, program: &mut Program) -> Result<()> {
        match expr.kind.as_ref() {
            SymExprKind::Num(c) => {
                let idx = self.add_constant(c.to_f64());
                program.push(BytecodeOp::PushConst(idx));
            }
            SymExprKind::Const(c) => {
                let idx = self.add_constant(c.value());
                program.push(BytecodeOp::PushConst(idx));
            }
            SymExprKind::Var(sym) => {
                let idx = self.add_variable(&sym.name);
                program.push(BytecodeOp::LoadVar(idx));
            }
            SymExprKind::Add(terms) => {
                let Some((first, rest)) = terms.split_first() else {
                    let idx = self.add_constant(0.0);
                    program.push(BytecodeOp::PushConst(idx));
                    return Ok(());
                };
                self.compile_expr(first, program)?;
                for term in rest {
                    // a + (-b) compiles to a - b
                    if let SymExprKind::Neg(inner) = term.kind.as_ref() {
                        self.compile_expr(inner, program)?;
                        program.binary(BytecodeOp::Sub);
                    } else {
                        self.compile_expr(term, program)?;
                        program.binary(BytecodeOp::Add);
                    }
                }
            }
            SymExprKind::Mul(factors) => {
                let Some((first, rest)) = factors.split_first() else {
                    let idx = self.add_constant(1.0);
                    program.push(BytecodeOp::PushConst(idx));
                    return Ok(());
                };
                self.compile_expr(first, program)?;
                for factor in rest {
                    // a * b^-1 compiles to a / b
                    if let Some(base) = factor.reciprocal_base() {
                        self.compile_expr(base, program)?;
                        program.binary(BytecodeOp::Div);
                    } else {
                        self.compile_expr(factor, program)?;
                        program.binary(BytecodeOp::Mul);
                    }
                }
            }
            SymExprKind::Pow(base, exp) => {
                self.compile_expr(base, program)?;
                self.compile_expr(exp, program)?;
                program.binary(BytecodeOp::Pow);
            }
            SymExprKind::Neg(inner) => {
                self.compile_expr(inner, program)?;
                program.ops.push(BytecodeOp::Neg);
            }
            SymExprKind::Func(name, args) => {
                let [arg] = args.as_slice() else {
                    return Err(SymbolicError::InvalidOperation(format!(
                        "{name} expects 1 argument, got {}",
                        args.len()
                    )));
                };
                self.compile_expr(arg, program)?;
                program.ops.push(BytecodeOp::Call(name.clone()));
            }
            SymExprKind::Signal(name, ..) => {
                return Err(SymbolicError::InvalidOperation(format!(
                    "signal reference {name} has no numeric value"
                )));
            }
        }
        Ok(())
    }
}

impl Default for BytecodeCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Instruction buffer with stack-depth tracking
#[derive(Default)]
struct Program {
    ops: Vec<BytecodeOp>,
    depth: usize,
    max_stack: usize,
}

impl Program {
    fn push(&mut self, op: BytecodeOp) {
        self.ops.push(op);
        self.depth += 1;
        self.max_stack = self.max_stack.max(self.depth);
    }

    fn binary(&mut self, op: BytecodeOp) {
        self.ops.push(op);
        self.depth -= 1;
    }
}

/// Convenience function to compile an expression
pub fn compile(expr: &SymExpr) -> Result<CompiledExpr> {
    BytecodeCompiler::new().compile(expr)
}

/// Compile with explicit variable ordering
pub fn compile_with_vars(expr: &SymExpr, var_order: &[&str]) -> Result<CompiledExpr> {
    BytecodeCompiler::new().compile_with_vars(expr, var_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Indexing;

    #[test]
    fn test_compile_constant() {
        let compiled = compile(&SymExpr::int(42)).unwrap();
        assert_eq!(compiled.constants, vec![42.0]);
        assert!(compiled.variables.is_empty());
        let result: f64 = compiled.eval(&[]).unwrap();
        assert!((result - 42.0).abs() < 1e-10);
    }

    #[test]
    fn test_compile_polynomial() {
        // t^2 - 2*t + 1
        let t = SymExpr::var("t");
        let expr = SymExpr::add(vec![
            SymExpr::pow(t.clone(), SymExpr::int(2)),
            SymExpr::neg(SymExpr::mul(vec![SymExpr::int(2), t.clone()])),
            SymExpr::int(1),
        ]);
        let compiled = compile(&expr).unwrap();
        assert!(compiled.ops.contains(&BytecodeOp::Sub));
        let result: f64 = compiled.eval(&[3.0]).unwrap();
        assert!((result - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_quotient_uses_div() {
        let s = SymExpr::var("s");
        let expr = SymExpr::int(1) / (s + SymExpr::int(2));
        let compiled = compile(&expr).unwrap();
        assert!(compiled.ops.contains(&BytecodeOp::Div));
        let h: Complex64 = compiled.eval(&[Complex64::new(0.0, 2.0)]).unwrap();
        // 1/(2+2j) = 0.25 - 0.25j
        assert!((h - Complex64::new(0.25, -0.25)).norm() < 1e-12);
    }

    #[test]
    fn test_step_and_impulse_sampling() {
        let t = SymExpr::var("t");
        let step = compile(&SymExpr::heaviside(t.clone())).unwrap();
        let values = step.eval_range(&[-1.0, 0.0, 1.0]);
        let values: Vec<f64> = values.into_iter().map(|v| v.unwrap()).collect();
        assert_eq!(values, vec![0.0, 1.0, 1.0]);

        let delta = compile(&SymExpr::dirac_delta(t)).unwrap();
        let at_zero: f64 = delta.eval(&[0.0]).unwrap();
        assert!(at_zero.is_infinite());
        let away: f64 = delta.eval(&[0.5]).unwrap();
        assert_eq!(away, 0.0);
    }

    #[test]
    fn test_step_rejects_complex_argument() {
        let s = SymExpr::var("s");
        let compiled = compile(&SymExpr::heaviside(s)).unwrap();
        assert!(compiled.eval(&[Complex64::new(0.0, 1.0)]).is_err());
    }

    #[test]
    fn test_constant_range_repeats_value() {
        let compiled = compile(&SymExpr::constant(crate::expr::Constant::Pi)).unwrap();
        let values = compiled.eval_range(&[0.0_f64, 1.0]);
        assert_eq!(values.len(), 2);
        assert!(values
            .iter()
            .all(|v| (*v.as_ref().unwrap() - std::f64::consts::PI).abs() < 1e-12));
    }

    #[test]
    fn test_signal_reference_does_not_compile() {
        let expr = SymExpr::signal("x", SymExpr::var("t"), Indexing::Call);
        assert!(compile(&expr).is_err());
    }

    #[test]
    fn test_compile_with_var_order() {
        let s = SymExpr::var("s");
        let t = SymExpr::var("t");
        let expr = t - s;
        let compiled = compile_with_vars(&expr, &["s", "t"]).unwrap();
        assert_eq!(compiled.variables, vec!["s", "t"]);
        let result: f64 = compiled.eval(&[1.0, 5.0]).unwrap();
        assert!((result - 4.0).abs() < 1e-10);
    }
}
