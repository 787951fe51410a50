//! Unit-tagged quantities.
//!
//! Load, generation, branch flow and branch capacity are all real power in
//! [`Megawatts`]; bus angles written by the power-flow solve are [`Radians`].
//! Both are transparent wrappers that serialize as bare numbers.
//!
//! ```
//! use cascade_core::units::Megawatts;
//!
//! let total: Megawatts = [Megawatts(40.0), Megawatts(60.0)].into_iter().sum();
//! assert_eq!(total.value(), 100.0);
//! assert_eq!((total * 0.5).value(), 50.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! unit_type {
    ($(#[$meta:meta])* $name:ident, $symbol:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub f64);

        impl $name {
            pub const ZERO: Self = Self(0.0);

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $name {
            type Output = Self;
            fn div(self, rhs: f64) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $symbol)
            }
        }
    };
}

unit_type!(
    /// Real power (MW)
    Megawatts,
    "MW"
);

unit_type!(
    /// Bus voltage angle
    Radians,
    "rad"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megawatts_arithmetic() {
        let p1 = Megawatts(100.0);
        let p2 = Megawatts(50.0);

        assert_eq!((p1 + p2).value(), 150.0);
        assert_eq!((p1 - p2).value(), 50.0);
        assert_eq!((-p1).value(), -100.0);
        assert_eq!((p1 / 4.0).value(), 25.0);
        assert_eq!(Megawatts(-3.0).abs(), Megawatts(3.0));
        assert!(!Megawatts(f64::INFINITY).is_finite());
        assert!(p2 < p1);
    }

    #[test]
    fn test_serializes_as_bare_number() {
        let json = serde_json::to_string(&Megawatts(12.5)).unwrap();
        assert_eq!(json, "12.5");
        let back: Megawatts = serde_json::from_str("7").unwrap();
        assert_eq!(back, Megawatts(7.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Megawatts(100.0).to_string(), "100.0000 MW");
        assert_eq!(Radians(0.5).to_string(), "0.5000 rad");
    }
}
