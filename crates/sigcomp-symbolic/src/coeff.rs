//! Numeric coefficients carried by expression trees.
//!
//! Literals typed by the user stay exact where possible; values that come
//! out of numeric root finding or partial fractions are snapped back to small
//! rationals with [`Coefficient::approximate`] before they are shown.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Largest denominator tried when snapping a float to a rational.
const MAX_SNAP_DENOMINATOR: i64 = 64;

/// Exact rational when the arithmetic fits in `i64`, float otherwise.
///
/// Rationals are kept reduced with a positive denominator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Coefficient {
    Rational(i64, i64),
    Float(f64),
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

/// Reduce `num/den` and narrow it back to `i64`, degrading to a float when it
/// does not fit.
fn reduced(num: i128, den: i128) -> Coefficient {
    if den == 0 {
        return Coefficient::Float(num as f64 / 0.0);
    }
    let sign = if den < 0 { -1 } else { 1 };
    let g = gcd(num, den).max(1);
    let (num, den) = (sign * num / g, sign * den / g);
    match (i64::try_from(num), i64::try_from(den)) {
        (Ok(n), Ok(d)) => Coefficient::Rational(n, d),
        _ => Coefficient::Float(num as f64 / den as f64),
    }
}

impl Coefficient {
    pub fn int(n: i64) -> Self {
        Coefficient::Rational(n, 1)
    }

    pub fn rational(num: i64, den: i64) -> Self {
        reduced(num as i128, den as i128)
    }

    /// Integral values become exact integers; everything else stays a float.
    pub fn float(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Coefficient::int(value as i64)
        } else {
            Coefficient::Float(value)
        }
    }

    /// Snap a computed value to an integer or a small rational when it lies
    /// within `tol` of one; otherwise keep it as a float.
    pub fn approximate(value: f64, tol: f64) -> Self {
        if !value.is_finite() {
            return Coefficient::Float(value);
        }
        (1..=MAX_SNAP_DENOMINATOR)
            .find_map(|den| {
                let num = (value * den as f64).round();
                let close = num.abs() < i64::MAX as f64 && (value - num / den as f64).abs() <= tol;
                close.then(|| Coefficient::rational(num as i64, den))
            })
            .unwrap_or(Coefficient::Float(value))
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Coefficient::Rational(n, d) => *n as f64 / *d as f64,
            Coefficient::Float(v) => *v,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Coefficient::Rational(n, 1) => Some(*n),
            Coefficient::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                Some(*v as i64)
            }
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.as_integer().is_some()
    }

    pub fn is_zero(&self) -> bool {
        self.to_f64() == 0.0
    }

    pub fn is_one(&self) -> bool {
        match self {
            Coefficient::Rational(n, d) => *n == 1 && *d == 1,
            Coefficient::Float(v) => *v == 1.0,
        }
    }

    pub fn is_neg_one(&self) -> bool {
        (-self.clone()).is_one()
    }

    pub fn is_negative(&self) -> bool {
        self.to_f64() < 0.0
    }

    /// `self^exp`, exact for rational bases and small integer exponents.
    pub fn powi(&self, exp: i64) -> Self {
        if let (Coefficient::Rational(n, d), Ok(k)) = (self, u32::try_from(exp.unsigned_abs())) {
            let (n, d) = (*n as i128, *d as i128);
            if let (Some(pn), Some(pd)) = (n.checked_pow(k), d.checked_pow(k)) {
                return if exp < 0 { reduced(pd, pn) } else { reduced(pn, pd) };
            }
        }
        Coefficient::Float(self.to_f64().powf(exp as f64))
    }
}

impl PartialEq for Coefficient {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Coefficient::Rational(n1, d1), Coefficient::Rational(n2, d2)) => n1 == n2 && d1 == d2,
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

impl Eq for Coefficient {}

impl PartialOrd for Coefficient {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coefficient {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_f64().total_cmp(&other.to_f64())
    }
}

impl Hash for Coefficient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Coefficient::Rational(n, d) => (0u8, n, d).hash(state),
            Coefficient::Float(v) => (1u8, v.to_bits()).hash(state),
        }
    }
}

impl Neg for Coefficient {
    type Output = Coefficient;

    fn neg(self) -> Coefficient {
        match self {
            Coefficient::Rational(n, d) => reduced(-(n as i128), d as i128),
            Coefficient::Float(v) => Coefficient::Float(-v),
        }
    }
}

impl Add for Coefficient {
    type Output = Coefficient;

    fn add(self, rhs: Coefficient) -> Coefficient {
        match (self, rhs) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                let (a, b, c, d) = (a as i128, b as i128, c as i128, d as i128);
                reduced(a * d + c * b, b * d)
            }
            (x, y) => Coefficient::Float(x.to_f64() + y.to_f64()),
        }
    }
}

impl Sub for Coefficient {
    type Output = Coefficient;

    fn sub(self, rhs: Coefficient) -> Coefficient {
        self + (-rhs)
    }
}

impl Mul for Coefficient {
    type Output = Coefficient;

    fn mul(self, rhs: Coefficient) -> Coefficient {
        match (self, rhs) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                reduced(a as i128 * c as i128, b as i128 * d as i128)
            }
            (x, y) => Coefficient::Float(x.to_f64() * y.to_f64()),
        }
    }
}

impl Div for Coefficient {
    type Output = Coefficient;

    fn div(self, rhs: Coefficient) -> Coefficient {
        match (self, rhs) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                reduced(a as i128 * d as i128, b as i128 * c as i128)
            }
            (x, y) => Coefficient::Float(x.to_f64() / y.to_f64()),
        }
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Rational(n, 1) => write!(f, "{n}"),
            Coefficient::Rational(n, d) => write!(f, "{n}/{d}"),
            Coefficient::Float(v) => write!(f, "{v}"),
        }
    }
}
