//! Staged normalization of expression trees
//!
//! The transform engine normalizes its input before pattern matching so
//! that products are flat, constants are folded and products of sums are
//! distributed. Every pass is a local rule applied bottom-up: by the time a
//! rule sees a node, all of its children have already been rewritten.

use crate::coeff::Coefficient;
use crate::expr::{SymExpr, SymExprKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Largest power of a binomial that [`NormPass::Distribute`] multiplies out.
const MAX_BINOMIAL_POWER: i64 = 4;

/// One rewrite stage of a [`StagedNormalizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormPass {
    /// Splice nested sums into sums and nested products into products
    Flatten,
    /// Fold numeric terms, numeric factors and constant powers
    FoldConstants,
    /// `x^0`, `x^1`, `0^n`, `1^n` and `(x^a)^b` with integer exponents
    SimplifyPowers,
    /// Drop zero terms and unit factors
    DropIdentities,
    /// Cancel double negation and push signs into numbers
    SimplifySigns,
    /// Multiply products of sums and small binomial powers out
    Distribute,
    /// Merge terms that differ only in their numeric coefficient
    CollectTerms,
    /// Order operands so equal expressions print the same way
    Canonicalize,
}

impl NormPass {
    fn rule(self) -> fn(SymExpr) -> SymExpr {
        match self {
            NormPass::Flatten => flatten,
            NormPass::FoldConstants => fold_constants,
            NormPass::SimplifyPowers => simplify_powers,
            NormPass::DropIdentities => drop_identities,
            NormPass::SimplifySigns => simplify_signs,
            NormPass::Distribute => distribute,
            NormPass::CollectTerms => collect_terms,
            NormPass::Canonicalize => canonicalize,
        }
    }
}

/// An ordered list of passes run over a whole tree, one after another
#[derive(Debug, Clone)]
pub struct StagedNormalizer {
    passes: Vec<NormPass>,
}

impl StagedNormalizer {
    pub fn new(passes: Vec<NormPass>) -> Self {
        StagedNormalizer { passes }
    }

    /// Clean a tree up without reordering or expanding it.
    pub fn tidy() -> Self {
        Self::new(vec![
            NormPass::SimplifySigns,
            NormPass::Flatten,
            NormPass::FoldConstants,
            NormPass::DropIdentities,
            NormPass::SimplifyPowers,
        ])
    }

    /// [`tidy`](Self::tidy), then distribute, collect and order. This is the
    /// form the transform tables match against.
    pub fn aggressive() -> Self {
        Self::new(vec![
            NormPass::SimplifySigns,
            NormPass::Flatten,
            NormPass::FoldConstants,
            NormPass::DropIdentities,
            NormPass::SimplifyPowers,
            NormPass::Distribute,
            NormPass::Flatten,
            NormPass::SimplifySigns,
            NormPass::CollectTerms,
            NormPass::FoldConstants,
            NormPass::DropIdentities,
            NormPass::Canonicalize,
        ])
    }

    pub fn apply(&self, expr: SymExpr) -> SymExpr {
        self.passes
            .iter()
            .fold(expr, |current, pass| bottom_up(&current, pass.rule()))
    }
}

/// Rewrite every child of `expr` first, then hand the rebuilt node to `rule`.
fn bottom_up(expr: &SymExpr, rule: fn(SymExpr) -> SymExpr) -> SymExpr {
    let each = |items: &[SymExpr]| -> Vec<SymExpr> {
        items.iter().map(|item| bottom_up(item, rule)).collect()
    };
    let rebuilt = match expr.kind.as_ref() {
        SymExprKind::Add(terms) => SymExpr::add(each(terms)),
        SymExprKind::Mul(factors) => SymExpr::mul(each(factors)),
        SymExprKind::Pow(base, exp) => SymExpr::pow(bottom_up(base, rule), bottom_up(exp, rule)),
        SymExprKind::Neg(inner) => SymExpr::neg(bottom_up(inner, rule)),
        SymExprKind::Func(name, args) => SymExpr::func(name.clone(), each(args)),
        SymExprKind::Signal(name, index, indexing) => {
            SymExpr::signal(name.clone(), bottom_up(index, rule), *indexing)
        }
        SymExprKind::Num(_) | SymExprKind::Var(_) | SymExprKind::Const(_) => expr.clone(),
    };
    rule(rebuilt)
}

fn flatten(expr: SymExpr) -> SymExpr {
    match expr.kind.as_ref() {
        SymExprKind::Add(terms) => SymExpr::add(
            terms
                .iter()
                .flat_map(|t| match t.kind.as_ref() {
                    SymExprKind::Add(inner) => inner.clone(),
                    _ => vec![t.clone()],
                })
                .collect(),
        ),
        SymExprKind::Mul(factors) => SymExpr::mul(
            factors
                .iter()
                .flat_map(|f| match f.kind.as_ref() {
                    SymExprKind::Mul(inner) => inner.clone(),
                    _ => vec![f.clone()],
                })
                .collect(),
        ),
        _ => expr,
    }
}

/// Separate numeric operands from the rest, combining the numbers with `op`.
fn split_numbers(
    operands: &[SymExpr],
    unit: Coefficient,
    op: fn(Coefficient, Coefficient) -> Coefficient,
) -> (Coefficient, Vec<SymExpr>) {
    let mut acc = unit;
    let mut rest = Vec::with_capacity(operands.len());
    for operand in operands {
        match operand.as_coeff() {
            Some(c) => acc = op(acc, c.clone()),
            None => rest.push(operand.clone()),
        }
    }
    (acc, rest)
}

fn fold_constants(expr: SymExpr) -> SymExpr {
    match expr.kind.as_ref() {
        SymExprKind::Add(terms) => {
            let (sum, mut rest) = split_numbers(terms, Coefficient::int(0), |a, b| a + b);
            if !sum.is_zero() || rest.is_empty() {
                rest.push(SymExpr::num(sum));
            }
            SymExpr::add(rest)
        }
        SymExprKind::Mul(factors) => {
            let (product, mut rest) = split_numbers(factors, Coefficient::int(1), |a, b| a * b);
            if product.is_zero() {
                return SymExpr::int(0);
            }
            // The numeric factor leads so it prints as a coefficient
            if !product.is_one() || rest.is_empty() {
                rest.insert(0, SymExpr::num(product));
            }
            SymExpr::mul(rest)
        }
        SymExprKind::Pow(base, exp) => match (base.as_coeff(), exp.as_coeff()) {
            (Some(b), Some(e)) => match e.as_integer() {
                Some(k) => SymExpr::num(b.powi(k)),
                // Fractional powers of negative numbers stay symbolic
                None if !b.is_negative() => SymExpr::float(b.to_f64().powf(e.to_f64())),
                None => expr,
            },
            _ => expr,
        },
        _ => expr,
    }
}

fn simplify_powers(expr: SymExpr) -> SymExpr {
    let SymExprKind::Pow(base, exp) = expr.kind.as_ref() else {
        return expr;
    };
    if exp.is_zero() || base.is_one() {
        return SymExpr::int(1);
    }
    if exp.is_one() {
        return base.as_ref().clone();
    }
    if base.is_zero() && exp.as_coeff().is_some_and(|c| !c.is_negative()) {
        return SymExpr::int(0);
    }
    if let SymExprKind::Pow(inner_base, inner_exp) = base.kind.as_ref() {
        let a = inner_exp.as_coeff().and_then(Coefficient::as_integer);
        let b = exp.as_coeff().and_then(Coefficient::as_integer);
        if let (Some(a), Some(b)) = (a, b) {
            let product = Coefficient::int(a) * Coefficient::int(b);
            return SymExpr::pow(inner_base.as_ref().clone(), SymExpr::num(product));
        }
    }
    expr
}

fn drop_identities(expr: SymExpr) -> SymExpr {
    match expr.kind.as_ref() {
        SymExprKind::Add(terms) => {
            SymExpr::add(terms.iter().filter(|t| !t.is_zero()).cloned().collect())
        }
        SymExprKind::Mul(factors) if factors.iter().any(SymExpr::is_zero) => SymExpr::int(0),
        SymExprKind::Mul(factors) => {
            SymExpr::mul(factors.iter().filter(|f| !f.is_one()).cloned().collect())
        }
        SymExprKind::Neg(inner) if inner.is_zero() => SymExpr::int(0),
        _ => expr,
    }
}

fn simplify_signs(expr: SymExpr) -> SymExpr {
    let SymExprKind::Neg(inner) = expr.kind.as_ref() else {
        return expr;
    };
    match inner.kind.as_ref() {
        SymExprKind::Neg(x) => x.as_ref().clone(),
        SymExprKind::Num(c) => SymExpr::num(-c.clone()),
        SymExprKind::Mul(factors) => match factors.first().and_then(SymExpr::as_coeff) {
            Some(c) => {
                let mut negated = factors.clone();
                negated[0] = SymExpr::num(-c.clone());
                SymExpr::mul(negated)
            }
            None => expr,
        },
        _ => expr,
    }
}

fn distribute(expr: SymExpr) -> SymExpr {
    match expr.kind.as_ref() {
        SymExprKind::Mul(factors) => {
            let first_sum = factors.iter().enumerate().find_map(|(i, f)| match f.kind.as_ref() {
                SymExprKind::Add(terms) => Some((i, terms)),
                _ => None,
            });
            let Some((idx, terms)) = first_sum else {
                return expr;
            };
            let products = terms
                .iter()
                .map(|term| {
                    let mut product = factors.clone();
                    product[idx] = term.clone();
                    bottom_up(&SymExpr::mul(product), distribute)
                })
                .collect();
            SymExpr::add(products)
        }
        SymExprKind::Neg(inner) => match inner.kind.as_ref() {
            SymExprKind::Add(terms) => {
                SymExpr::add(terms.iter().cloned().map(SymExpr::neg).collect())
            }
            _ => expr,
        },
        SymExprKind::Pow(base, exp) => {
            let power = exp.as_coeff().and_then(Coefficient::as_integer);
            match (base.kind.as_ref(), power) {
                (SymExprKind::Add(terms), Some(n))
                    if terms.len() == 2 && (0..=MAX_BINOMIAL_POWER).contains(&n) =>
                {
                    bottom_up(&binomial_expansion(&terms[0], &terms[1], n), distribute)
                }
                _ => expr,
            }
        }
        _ => expr,
    }
}

/// `(a + b)^n` as a sum of `C(n, k) * a^(n-k) * b^k`
fn binomial_expansion(a: &SymExpr, b: &SymExpr, n: i64) -> SymExpr {
    let power = |x: &SymExpr, k: i64| match k {
        0 => SymExpr::int(1),
        1 => x.clone(),
        _ => SymExpr::pow(x.clone(), SymExpr::int(k)),
    };
    match n {
        0 => SymExpr::int(1),
        1 => SymExpr::add(vec![a.clone(), b.clone()]),
        _ => {
            let mut choose = 1;
            let mut terms = Vec::with_capacity(n as usize + 1);
            for k in 0..=n {
                let term = vec![SymExpr::int(choose), power(a, n - k), power(b, k)];
                terms.push(SymExpr::mul(term));
                choose = choose * (n - k) / (k + 1);
            }
            SymExpr::add(terms)
        }
    }
}

/// Split a term into its numeric coefficient and what it multiplies.
fn coefficient_of(term: &SymExpr) -> (Coefficient, SymExpr) {
    match term.kind.as_ref() {
        SymExprKind::Num(c) => (c.clone(), SymExpr::int(1)),
        SymExprKind::Neg(inner) => {
            let (c, rest) = coefficient_of(inner);
            (-c, rest)
        }
        SymExprKind::Mul(factors) => {
            let (c, rest) = split_numbers(factors, Coefficient::int(1), |a, b| a * b);
            (c, SymExpr::mul(rest))
        }
        _ => (Coefficient::int(1), term.clone()),
    }
}

fn collect_terms(expr: SymExpr) -> SymExpr {
    let SymExprKind::Add(terms) = expr.kind.as_ref() else {
        return expr;
    };
    let (constant, symbolic) = split_numbers(terms, Coefficient::int(0), |a, b| a + b);

    // First-seen order of each distinct monomial
    let mut monomials: Vec<SymExpr> = Vec::new();
    let mut weights: HashMap<SymExpr, Coefficient> = HashMap::new();
    for term in &symbolic {
        let (c, monomial) = coefficient_of(term);
        match weights.get_mut(&monomial) {
            Some(w) => *w = w.clone() + c,
            None => {
                monomials.push(monomial.clone());
                weights.insert(monomial, c);
            }
        }
    }

    let mut collected: Vec<SymExpr> = monomials
        .into_iter()
        .filter_map(|monomial| {
            let w = weights.remove(&monomial)?;
            if w.is_zero() {
                None
            } else if w.is_one() {
                Some(monomial)
            } else {
                Some(SymExpr::mul(vec![SymExpr::num(w), monomial]))
            }
        })
        .collect();
    if !constant.is_zero() || collected.is_empty() {
        collected.push(SymExpr::num(constant));
    }
    SymExpr::add(collected)
}

fn canonicalize(expr: SymExpr) -> SymExpr {
    match expr.kind.as_ref() {
        SymExprKind::Add(terms) => {
            let mut sorted = terms.clone();
            sorted.sort_by(operand_order);
            SymExpr::add(sorted)
        }
        SymExprKind::Mul(factors) => {
            let mut sorted = factors.clone();
            sorted.sort_by(operand_order);
            SymExpr::mul(sorted)
        }
        _ => expr,
    }
}

/// Numbers first, then constants, variables, powers, products, sums,
/// negations, function calls and signal samples. Within a kind, numbers
/// compare by value, variables by name and powers by base then exponent;
/// everything else falls back to the printed form.
fn operand_order(a: &SymExpr, b: &SymExpr) -> Ordering {
    fn rank(e: &SymExpr) -> u8 {
        match e.kind.as_ref() {
            SymExprKind::Num(_) => 0,
            SymExprKind::Const(_) => 1,
            SymExprKind::Var(_) => 2,
            SymExprKind::Pow(..) => 3,
            SymExprKind::Mul(_) => 4,
            SymExprKind::Add(_) => 5,
            SymExprKind::Neg(_) => 6,
            SymExprKind::Func(..) => 7,
            SymExprKind::Signal(..) => 8,
        }
    }

    rank(a).cmp(&rank(b)).then_with(|| match (a.kind.as_ref(), b.kind.as_ref()) {
        (SymExprKind::Num(x), SymExprKind::Num(y)) => x.cmp(y),
        (SymExprKind::Var(x), SymExprKind::Var(y)) => x.name.cmp(&y.name),
        (SymExprKind::Pow(xb, xe), SymExprKind::Pow(yb, ye)) => {
            operand_order(xb, yb).then_with(|| operand_order(xe, ye))
        }
        _ => a.to_string().cmp(&b.to_string()),
    })
}
