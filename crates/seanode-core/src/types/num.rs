//! Integer and float sub-lattices
//!
//! Both share one shape, parameterized over the constant:
//!
//! ```text
//!   ~int64 > ~int32 > ... > ~int1
//!          constants (self-dual)
//!    int1  >  int8  > ... >  int64
//! ```
//!
//! A high width class sits above every constant that fits in it, a low
//! width class below every constant that fits in it.

use std::fmt::Debug;
use std::hash::Hash;

/// Integer width classes, narrowest first.
pub const INT_WIDTHS: [u8; 5] = [1, 8, 16, 32, 64];
/// Float width classes, narrowest first.
pub const FLT_WIDTHS: [u8; 2] = [32, 64];

/// A constant that knows the narrowest width class holding it.
pub trait NumCon: Copy + Eq + Hash + Debug {
    fn min_width(self) -> u8;
}

impl NumCon for i64 {
    fn min_width(self) -> u8 {
        if self == 0 || self == 1 {
            1
        } else if i8::try_from(self).is_ok() {
            8
        } else if i16::try_from(self).is_ok() {
            16
        } else if i32::try_from(self).is_ok() {
            32
        } else {
            64
        }
    }
}

/// A float constant stored by bit pattern so it can be hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FltCon(u64);

impl FltCon {
    pub fn new(f: f64) -> Self {
        Self(f.to_bits())
    }

    pub fn get(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl NumCon for FltCon {
    fn min_width(self) -> u8 {
        let f = self.get();
        if f.is_nan() || f64::from(f as f32) == f {
            32
        } else {
            64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Num<C> {
    /// Any value of the width class, chosen optimistically.
    High(u8),
    Con(C),
    /// Some value of the width class.
    Low(u8),
}

impl<C: NumCon> Num<C> {
    pub fn meet(self, other: Self) -> Self {
        use Num::*;
        match (self, other) {
            (High(a), High(b)) => High(a.min(b)),
            (Low(a), Low(b)) => Low(a.max(b)),
            (High(_), Low(w)) | (Low(w), High(_)) => Low(w),
            (High(w), Con(c)) | (Con(c), High(w)) => {
                if c.min_width() <= w {
                    Con(c)
                } else {
                    Low(c.min_width())
                }
            }
            (Low(w), Con(c)) | (Con(c), Low(w)) => Low(w.max(c.min_width())),
            (Con(a), Con(b)) if a == b => Con(a),
            (Con(a), Con(b)) => Low(a.min_width().max(b.min_width())),
        }
    }

    pub fn dual(self) -> Self {
        match self {
            Num::High(w) => Num::Low(w),
            Num::Low(w) => Num::High(w),
            con => con,
        }
    }

    pub fn above_center(self) -> bool {
        matches!(self, Num::High(_))
    }

    pub fn con(self) -> Option<C> {
        match self {
            Num::Con(c) => Some(c),
            _ => None,
        }
    }
}
