use std::{
    fmt::Display,
    ops::{Add, AddAssign, Sub},
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

/// A rupee amount, stored internally as whole paisa.
///
/// Amounts cross the wire as rupee numbers (the gateway accepts `500` or `499.5`), but are stored
/// and compared as integral paisa so that arithmetic is exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Type)]
#[sqlx(transparent)]
pub struct Money(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a rupee amount: {0}")]
pub struct MoneyConversionError(String);

impl Money {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn from_paisa(paisa: i64) -> Self {
        Self(paisa)
    }

    pub fn from_rupees(rupees: f64) -> Result<Self, MoneyConversionError> {
        let paisa = rupees * 100.0;
        if !paisa.is_finite() || paisa.abs() > i64::MAX as f64 {
            return Err(MoneyConversionError(format!("{rupees}")));
        }
        Ok(Self(paisa.round() as i64))
    }

    /// The amount in paisa.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn rupees(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// The rupee amount as the gateway expects it: `"500"` for whole amounts, `"499.50"` otherwise.
    pub fn to_rupee_string(&self) -> String {
        if self.0 % 100 == 0 {
            format!("{}", self.0 / 100)
        } else {
            format!("{:.2}", self.rupees())
        }
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₹{:.2}", self.rupees())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.rupees())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RupeeVisitor;

        impl de::Visitor<'_> for RupeeVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a rupee amount as a number")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                v.checked_mul(100).map(Money).ok_or_else(|| E::custom("amount is too large"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Money)
                    .ok_or_else(|| E::custom("amount is too large"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                Money::from_rupees(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(RupeeVisitor)
    }
}
