//! Cardinality modes: lower/upper bounds on the size of a multiset.

use std::fmt;
use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

/// One bound of a cardinality mode.
///
/// The derived ordering is `Zero < One < Inf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    /// No elements.
    Zero,
    /// Exactly one element.
    One,
    /// Unbounded.
    Inf,
}

impl Mul for Cardinal {
    type Output = Cardinal;

    fn mul(self, rhs: Cardinal) -> Cardinal {
        match (self, rhs) {
            (Cardinal::Zero, _) | (_, Cardinal::Zero) => Cardinal::Zero,
            (Cardinal::One, other) | (other, Cardinal::One) => other,
            (Cardinal::Inf, Cardinal::Inf) => Cardinal::Inf,
        }
    }
}

impl Add for Cardinal {
    type Output = Cardinal;

    fn add(self, rhs: Cardinal) -> Cardinal {
        match (self, rhs) {
            (Cardinal::Zero, other) | (other, Cardinal::Zero) => other,
            _ => Cardinal::Inf,
        }
    }
}

impl fmt::Display for Cardinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinal::Zero => write!(f, "0"),
            Cardinal::One => write!(f, "1"),
            Cardinal::Inf => write!(f, "inf"),
        }
    }
}

/// A (lower, upper) bound on multiset size.
///
/// Invariant: `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CMMode {
    pub lower: Cardinal,
    pub upper: Cardinal,
}

/// Exactly one value.
pub const CARD_ONE: CMMode = CMMode {
    lower: Cardinal::One,
    upper: Cardinal::One,
};

/// Any number of values.
pub const CARD_ANY: CMMode = CMMode {
    lower: Cardinal::Zero,
    upper: Cardinal::Inf,
};

/// Zero or one value.
pub const CARD_AT_MOST_ONE: CMMode = CMMode {
    lower: Cardinal::Zero,
    upper: Cardinal::One,
};

/// One or more values.
pub const CARD_AT_LEAST_ONE: CMMode = CMMode {
    lower: Cardinal::One,
    upper: Cardinal::Inf,
};

/// The empty set.
pub const CARD_ZERO: CMMode = CMMode {
    lower: Cardinal::Zero,
    upper: Cardinal::Zero,
};

impl CMMode {
    /// Create a mode, swapping the bounds if they are given out of order.
    pub fn new(lower: Cardinal, upper: Cardinal) -> Self {
        if lower <= upper {
            Self { lower, upper }
        } else {
            Self {
                lower: upper,
                upper: lower,
            }
        }
    }

    /// Pairwise maximum of both bounds, as used by the coalescing operator.
    pub fn max(self, other: CMMode) -> CMMode {
        CMMode::new(self.lower.max(other.lower), self.upper.max(other.upper))
    }

    /// The mode of a value produced by either of two branches.
    pub fn widen(self, other: CMMode) -> CMMode {
        CMMode::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    /// Same upper bound, lower bound dropped to zero.
    pub fn make_optional(self) -> CMMode {
        CMMode::new(Cardinal::Zero, self.upper)
    }

    /// Whether a multiset of `n` values satisfies this mode.
    pub fn admits(&self, n: usize) -> bool {
        let lower_ok = match self.lower {
            Cardinal::Zero => true,
            Cardinal::One => n >= 1,
            Cardinal::Inf => n >= 1,
        };
        let upper_ok = match self.upper {
            Cardinal::Zero => n == 0,
            Cardinal::One => n <= 1,
            Cardinal::Inf => true,
        };
        lower_ok && upper_ok
    }
}

impl Mul for CMMode {
    type Output = CMMode;

    fn mul(self, rhs: CMMode) -> CMMode {
        CMMode::new(self.lower * rhs.lower, self.upper * rhs.upper)
    }
}

/// Bag union. Lower bounds saturate at one since two guaranteed values are
/// still only "at least one" in this lattice.
impl Add for CMMode {
    type Output = CMMode;

    fn add(self, rhs: CMMode) -> CMMode {
        let lower = (self.lower + rhs.lower).min(Cardinal::One);
        CMMode::new(lower, self.upper + rhs.upper)
    }
}

impl fmt::Display for CMMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
