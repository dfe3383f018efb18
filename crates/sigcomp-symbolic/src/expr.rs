//! Immutable expression trees.
//!
//! Nodes are reference counted, so cloning a [`SymExpr`] is cheap and
//! rewrites always build new trees. The `Display` impl produces compact
//! canonical text (`exp(-2*t)*Heaviside(t)`, `1/(s+2)`, `x[n-1]`) that the
//! parser reads back into the same tree.

use crate::coeff::Coefficient;
use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops;
use std::sync::Arc;

pub const HEAVISIDE: &str = "Heaviside";
pub const DIRAC_DELTA: &str = "DiracDelta";

/// Named mathematical constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "e",
        }
    }
}

/// How a signal reference was written: `x(t)` or `x[n]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indexing {
    Call,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymExprKind {
    Num(Coefficient),
    Var(Symbol),
    Const(Constant),
    Add(Vec<SymExpr>),
    Mul(Vec<SymExpr>),
    Pow(Box<SymExpr>, Box<SymExpr>),
    Neg(Box<SymExpr>),
    Func(String, Vec<SymExpr>),
    /// Reference to an input/output signal at some time or sample index
    Signal(String, Box<SymExpr>, Indexing),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymExpr {
    pub kind: Arc<SymExprKind>,
}

impl SymExpr {
    fn from_kind(kind: SymExprKind) -> Self {
        SymExpr {
            kind: Arc::new(kind),
        }
    }

    pub fn num(c: Coefficient) -> Self {
        Self::from_kind(SymExprKind::Num(c))
    }

    pub fn int(n: i64) -> Self {
        Self::num(Coefficient::int(n))
    }

    pub fn float(f: f64) -> Self {
        Self::num(Coefficient::float(f))
    }

    pub fn var(name: &str) -> Self {
        Self::from_kind(SymExprKind::Var(Symbol::new(name)))
    }

    pub fn symbol(sym: Symbol) -> Self {
        Self::from_kind(SymExprKind::Var(sym))
    }

    pub fn constant(c: Constant) -> Self {
        Self::from_kind(SymExprKind::Const(c))
    }

    /// Sum of `terms`; an empty sum is 0 and a single term is returned as is.
    pub fn add(mut terms: Vec<SymExpr>) -> Self {
        match terms.len() {
            0 => Self::int(0),
            1 => terms.remove(0),
            _ => Self::from_kind(SymExprKind::Add(terms)),
        }
    }

    /// Product of `factors`; an empty product is 1 and a single factor is
    /// returned as is.
    pub fn mul(mut factors: Vec<SymExpr>) -> Self {
        match factors.len() {
            0 => Self::int(1),
            1 => factors.remove(0),
            _ => Self::from_kind(SymExprKind::Mul(factors)),
        }
    }

    pub fn pow(base: SymExpr, exp: SymExpr) -> Self {
        Self::from_kind(SymExprKind::Pow(Box::new(base), Box::new(exp)))
    }

    /// `1/x`, represented as `x^-1`
    pub fn recip(x: SymExpr) -> Self {
        Self::pow(x, Self::int(-1))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(x: SymExpr) -> Self {
        Self::from_kind(SymExprKind::Neg(Box::new(x)))
    }

    pub fn func(name: impl Into<String>, args: Vec<SymExpr>) -> Self {
        Self::from_kind(SymExprKind::Func(name.into(), args))
    }

    pub fn signal(name: impl Into<String>, index: SymExpr, indexing: Indexing) -> Self {
        Self::from_kind(SymExprKind::Signal(name.into(), Box::new(index), indexing))
    }

    pub fn exp(x: SymExpr) -> Self {
        Self::func("exp", vec![x])
    }

    pub fn sin(x: SymExpr) -> Self {
        Self::func("sin", vec![x])
    }

    pub fn cos(x: SymExpr) -> Self {
        Self::func("cos", vec![x])
    }

    pub fn log(x: SymExpr) -> Self {
        Self::func("log", vec![x])
    }

    pub fn heaviside(x: SymExpr) -> Self {
        Self::func(HEAVISIDE, vec![x])
    }

    pub fn dirac_delta(x: SymExpr) -> Self {
        Self::func(DIRAC_DELTA, vec![x])
    }

    pub fn as_coeff(&self) -> Option<&Coefficient> {
        match self.kind.as_ref() {
            SymExprKind::Num(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Symbol> {
        match self.kind.as_ref() {
            SymExprKind::Var(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<(&str, &[SymExpr])> {
        match self.kind.as_ref() {
            SymExprKind::Func(name, args) => Some((name.as_str(), args.as_slice())),
            _ => None,
        }
    }

    pub fn is_num(&self) -> bool {
        matches!(self.kind.as_ref(), SymExprKind::Num(_))
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind.as_ref(), SymExprKind::Var(_))
    }

    pub fn is_zero(&self) -> bool {
        self.as_coeff().is_some_and(Coefficient::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_coeff().is_some_and(Coefficient::is_one)
    }

    /// True for `x^-1`, the node produced by division
    pub fn is_reciprocal(&self) -> bool {
        self.reciprocal_base().is_some()
    }

    pub fn reciprocal_base(&self) -> Option<&SymExpr> {
        match self.kind.as_ref() {
            SymExprKind::Pow(base, exp) if exp.as_coeff().is_some_and(Coefficient::is_neg_one) => {
                Some(base.as_ref())
            }
            _ => None,
        }
    }

    /// Immediate children in left-to-right order
    pub fn children(&self) -> Vec<&SymExpr> {
        match self.kind.as_ref() {
            SymExprKind::Num(_) | SymExprKind::Var(_) | SymExprKind::Const(_) => Vec::new(),
            SymExprKind::Add(xs) | SymExprKind::Mul(xs) | SymExprKind::Func(_, xs) => {
                xs.iter().collect()
            }
            SymExprKind::Pow(b, e) => vec![b.as_ref(), e.as_ref()],
            SymExprKind::Neg(x) | SymExprKind::Signal(_, x, _) => vec![x.as_ref()],
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(SymExpr::node_count)
            .sum::<usize>()
    }

    /// Names of the variables occurring in the expression
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        if let SymExprKind::Var(s) = self.kind.as_ref() {
            out.insert(s.name.clone());
        }
        for child in self.children() {
            child.collect_vars(out);
        }
    }

    pub fn depends_on(&self, name: &str) -> bool {
        match self.kind.as_ref() {
            SymExprKind::Var(s) => s.name == name,
            _ => self.children().into_iter().any(|c| c.depends_on(name)),
        }
    }

    /// True when the tree contains a signal reference
    pub fn has_signal(&self) -> bool {
        matches!(self.kind.as_ref(), SymExprKind::Signal(..))
            || self.children().into_iter().any(SymExpr::has_signal)
    }

    /// Replace every occurrence of variable `name` with `replacement`
    pub fn substitute(&self, name: &str, replacement: &SymExpr) -> SymExpr {
        self.map_children_or(|e| match e.kind.as_ref() {
            SymExprKind::Var(s) if s.name == name => Some(replacement.clone()),
            _ => None,
        })
    }

    fn map_children_or(&self, f: impl Fn(&SymExpr) -> Option<SymExpr> + Copy) -> SymExpr {
        if let Some(replaced) = f(self) {
            return replaced;
        }
        let map = |xs: &Vec<SymExpr>| -> Vec<SymExpr> {
            xs.iter().map(|x| x.map_children_or(f)).collect()
        };
        match self.kind.as_ref() {
            SymExprKind::Num(_) | SymExprKind::Var(_) | SymExprKind::Const(_) => self.clone(),
            SymExprKind::Add(xs) => Self::from_kind(SymExprKind::Add(map(xs))),
            SymExprKind::Mul(xs) => Self::from_kind(SymExprKind::Mul(map(xs))),
            SymExprKind::Func(name, xs) => Self::func(name.clone(), map(xs)),
            SymExprKind::Pow(b, e) => Self::pow(b.map_children_or(f), e.map_children_or(f)),
            SymExprKind::Neg(x) => Self::neg(x.map_children_or(f)),
            SymExprKind::Signal(name, x, indexing) => {
                Self::signal(name.clone(), x.map_children_or(f), *indexing)
            }
        }
    }

    /// Multiply by `factor`, appending to an existing product instead of
    /// nesting one
    pub fn times(&self, factor: SymExpr) -> SymExpr {
        if self.is_one() {
            return factor;
        }
        match self.kind.as_ref() {
            SymExprKind::Mul(factors) => {
                let mut factors = factors.clone();
                factors.push(factor);
                Self::mul(factors)
            }
            _ => Self::mul(vec![self.clone(), factor]),
        }
    }
}

impl From<i64> for SymExpr {
    fn from(n: i64) -> Self {
        SymExpr::int(n)
    }
}

impl ops::Add for SymExpr {
    type Output = SymExpr;

    fn add(self, rhs: SymExpr) -> SymExpr {
        SymExpr::add(vec![self, rhs])
    }
}

impl ops::Sub for SymExpr {
    type Output = SymExpr;

    fn sub(self, rhs: SymExpr) -> SymExpr {
        SymExpr::add(vec![self, SymExpr::neg(rhs)])
    }
}

impl ops::Mul for SymExpr {
    type Output = SymExpr;

    fn mul(self, rhs: SymExpr) -> SymExpr {
        SymExpr::mul(vec![self, rhs])
    }
}

impl ops::Div for SymExpr {
    type Output = SymExpr;

    fn div(self, rhs: SymExpr) -> SymExpr {
        SymExpr::mul(vec![self, SymExpr::recip(rhs)])
    }
}

impl ops::Neg for SymExpr {
    type Output = SymExpr;

    fn neg(self) -> SymExpr {
        SymExpr::neg(self)
    }
}

// Binding strength of the rendered text, loosest first.
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_UNARY: u8 = 3;
const PREC_POW: u8 = 4;
const PREC_ATOM: u8 = 5;

fn render(expr: &SymExpr) -> (String, u8) {
    match expr.kind.as_ref() {
        SymExprKind::Num(c) => render_coeff(c),
        SymExprKind::Var(s) => (s.name.clone(), PREC_ATOM),
        SymExprKind::Const(c) => (c.name().to_string(), PREC_ATOM),
        SymExprKind::Func(name, args) => {
            let args: Vec<String> = args.iter().map(|a| render(a).0).collect();
            (format!("{}({})", name, args.join(",")), PREC_ATOM)
        }
        SymExprKind::Signal(name, index, indexing) => {
            let index = render(index).0;
            let text = match indexing {
                Indexing::Call => format!("{name}({index})"),
                Indexing::Index => format!("{name}[{index}]"),
            };
            (text, PREC_ATOM)
        }
        SymExprKind::Pow(base, exp) => (
            format!("{}^{}", wrap(base, PREC_ATOM), wrap(exp, PREC_POW)),
            PREC_POW,
        ),
        SymExprKind::Neg(inner) => (format!("-{}", wrap(inner, PREC_POW)), PREC_UNARY),
        SymExprKind::Mul(factors) => render_product(factors),
        SymExprKind::Add(terms) => render_sum(terms),
    }
}

fn render_coeff(c: &Coefficient) -> (String, u8) {
    let text = c.to_string();
    let prec = match c {
        Coefficient::Rational(_, 1) | Coefficient::Float(_) if c.is_negative() => PREC_UNARY,
        Coefficient::Rational(_, 1) | Coefficient::Float(_) => PREC_ATOM,
        Coefficient::Rational(..) => PREC_MUL,
    };
    (text, prec)
}

fn wrap(expr: &SymExpr, min: u8) -> String {
    let (text, prec) = render(expr);
    if prec < min {
        format!("({text})")
    } else {
        text
    }
}

fn render_product(factors: &[SymExpr]) -> (String, u8) {
    match factors {
        [] => return ("1".to_string(), PREC_ATOM),
        [only] => return render(only),
        _ => {}
    }
    let mut out = String::new();
    for (i, factor) in factors.iter().enumerate() {
        match (i, factor.reciprocal_base()) {
            (0, Some(base)) => {
                out.push_str("1/");
                out.push_str(&wrap(base, PREC_POW));
            }
            // `a*b/c` already reads as `(a*b)/c`
            (0, None) if matches!(factor.kind.as_ref(), SymExprKind::Mul(_)) => {
                out.push_str(&render(factor).0)
            }
            (0, None) => out.push_str(&wrap(factor, PREC_UNARY)),
            (_, Some(base)) => {
                out.push('/');
                out.push_str(&wrap(base, PREC_POW));
            }
            (_, None) => {
                out.push('*');
                out.push_str(&wrap(factor, PREC_POW));
            }
        }
    }
    (out, PREC_MUL)
}

fn render_sum(terms: &[SymExpr]) -> (String, u8) {
    match terms {
        [] => return ("0".to_string(), PREC_ATOM),
        [only] => return render(only),
        _ => {}
    }
    let mut out = wrap(&terms[0], PREC_MUL);
    for term in &terms[1..] {
        let subtracted = match term.kind.as_ref() {
            SymExprKind::Neg(inner) => Some(inner.as_ref().clone()),
            _ => negated_literal(term),
        };
        match subtracted {
            Some(inner) => {
                let (text, prec) = render(&inner);
                if prec < PREC_MUL || text.starts_with('-') {
                    out.push_str(&format!("-({text})"));
                } else {
                    out.push('-');
                    out.push_str(&text);
                }
            }
            None => {
                out.push('+');
                out.push_str(&wrap(term, PREC_MUL));
            }
        }
    }
    (out, PREC_ADD)
}

/// For a negative numeric literal or a product led by one, the same term
/// with the sign flipped. Lets computed sums print as `s^2-2*s+5`.
fn negated_literal(term: &SymExpr) -> Option<SymExpr> {
    match term.kind.as_ref() {
        SymExprKind::Num(c) if c.is_negative() => Some(SymExpr::num(-c.clone())),
        SymExprKind::Mul(factors) => {
            let lead = factors.first()?.as_coeff()?;
            if !lead.is_negative() {
                return None;
            }
            let flipped = -lead.clone();
            let mut rest: Vec<SymExpr> = factors[1..].to_vec();
            if !flipped.is_one() || rest.is_empty() {
                rest.insert(0, SymExpr::num(flipped));
            }
            Some(SymExpr::mul(rest))
        }
        _ => None,
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> SymExpr {
        SymExpr::var("t")
    }

    fn s() -> SymExpr {
        SymExpr::var("s")
    }

    #[test]
    fn test_display_decaying_step() {
        let expr = SymExpr::mul(vec![
            SymExpr::exp(SymExpr::mul(vec![SymExpr::int(-2), t()])),
            SymExpr::heaviside(t()),
        ]);
        assert_eq!(expr.to_string(), "exp(-2*t)*Heaviside(t)");
    }

    #[test]
    fn test_display_quotient() {
        let expr = SymExpr::int(1) / SymExpr::add(vec![s(), SymExpr::int(2)]);
        assert_eq!(expr.to_string(), "1/(s+2)");

        let expr = SymExpr::mul(vec![SymExpr::recip(s())]);
        assert_eq!(expr.to_string(), "s^(-1)");

        let four_s = SymExpr::mul(vec![SymExpr::int(4), s()]);
        let s_plus_2 = SymExpr::add(vec![s(), SymExpr::int(2)]);
        let expr = SymExpr::mul(vec![four_s, SymExpr::recip(s_plus_2)]);
        assert_eq!(expr.to_string(), "4*s/(s+2)");

        let half_t = SymExpr::mul(vec![SymExpr::num(Coefficient::rational(-1, 2)), t()]);
        let expr = SymExpr::mul(vec![half_t, SymExpr::recip(s())]);
        assert_eq!(expr.to_string(), "(-1/2)*t/s");
    }

    #[test]
    fn test_display_signed_sum() {
        let expr = SymExpr::add(vec![
            SymExpr::pow(s(), SymExpr::int(2)),
            SymExpr::mul(vec![SymExpr::int(-2), s()]),
            SymExpr::int(5),
        ]);
        assert_eq!(expr.to_string(), "s^2-2*s+5");

        let expr = SymExpr::add(vec![t(), SymExpr::int(-1)]);
        assert_eq!(expr.to_string(), "t-1");
    }

    #[test]
    fn test_display_parenthesization() {
        let a = SymExpr::var("a");
        let b = SymExpr::var("b");
        let neg_prod = SymExpr::neg(a.clone() * b.clone());
        assert_eq!(neg_prod.to_string(), "-(a*b)");

        let pow_of_neg = SymExpr::pow(SymExpr::neg(a.clone()), SymExpr::int(2));
        assert_eq!(pow_of_neg.to_string(), "(-a)^2");

        let nested_pow = SymExpr::pow(a.clone(), SymExpr::pow(b.clone(), SymExpr::int(2)));
        assert_eq!(nested_pow.to_string(), "a^b^2");

        let diff = a.clone() - (b.clone() - a.clone());
        assert_eq!(diff.to_string(), "a-(b-a)");

        let times_neg = SymExpr::mul(vec![a.clone(), SymExpr::neg(b)]);
        assert_eq!(times_neg.to_string(), "a*(-b)");
    }

    #[test]
    fn test_display_signals() {
        let n = SymExpr::var("n");
        let past = SymExpr::signal("x", n.clone() - SymExpr::int(1), Indexing::Index);
        assert_eq!(past.to_string(), "x[n-1]");
        let now = SymExpr::signal("y", t(), Indexing::Call);
        assert_eq!(now.to_string(), "y(t)");
    }

    #[test]
    fn test_substitute_and_free_vars() {
        let expr = SymExpr::exp(SymExpr::neg(t())) * SymExpr::sin(t());
        let shifted = expr.substitute("t", &(t() + SymExpr::int(2)));
        assert_eq!(shifted.to_string(), "exp(-(t+2))*sin(t+2)");
        assert_eq!(
            shifted.free_vars().into_iter().collect::<Vec<_>>(),
            vec!["t".to_string()]
        );
        assert!(shifted.depends_on("t"));
        assert!(!shifted.depends_on("s"));
    }

    #[test]
    fn test_times_appends_factor() {
        let base = SymExpr::int(3) * t();
        let prod = base.times(SymExpr::heaviside(t()));
        assert_eq!(prod.to_string(), "3*t*Heaviside(t)");
        assert_eq!(SymExpr::int(1).times(t()), t());
    }

    #[test]
    fn test_node_count() {
        let expr = SymExpr::add(vec![t(), SymExpr::int(1)]);
        assert_eq!(expr.node_count(), 3);
    }
}
