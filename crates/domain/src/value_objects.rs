//! Identifiers and money shared by the cart, stock and order aggregates.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

uuid_id!(
    /// A registered buyer (marketplace member).
    BuyerId
);

uuid_id!(
    /// Owner of a product listing.
    SellerId
);

uuid_id!(
    /// Addresses one line of a cart for set-quantity and delete.
    CartLineId
);

uuid_id!(
    /// External reference handed to the payment gateway for
    /// payment-mediated orders. Never equal to the order's stream id.
    OrderToken
);

impl OrderToken {
    /// Stream id of the order this token was issued for.
    pub fn order_id(&self) -> AggregateId {
        AggregateId::derived("order", &self.0.to_string())
    }
}

string_id!(
    /// Catalog key of a product.
    ProductId
);

string_id!(
    /// Catalog key of a product option (size, colour, ...).
    OptionId
);

/// An amount in integer minor units of the store currency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn amount(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self * quantity`, saturating at the numeric bounds.
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Price after a percentage discount. Rates above 100 are treated as 100;
    /// the discount is truncated towards zero.
    pub fn discounted(&self, rate_percent: u8) -> Self {
        let rate = i64::from(rate_percent.min(100));
        if rate == 0 {
            return *self;
        }
        Self(self.0 - self.0 * rate / 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_truncates_towards_zero() {
        assert_eq!(Money::new(10_000).discounted(15), Money::new(8_500));
        assert_eq!(Money::new(999).discounted(10), Money::new(900));
        assert_eq!(Money::new(5_000).discounted(0), Money::new(5_000));
        assert_eq!(Money::new(5_000).discounted(250), Money::zero());
    }

    #[test]
    fn times_and_sum() {
        let total: Money = [Money::new(1_500).times(2), Money::new(700).times(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::new(5_100));
    }

    #[test]
    fn money_serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&Money::new(50_000)).unwrap(), "50000");
        let parsed: Money = serde_json::from_str("49000").unwrap();
        assert_eq!(parsed.amount(), 49_000);
    }

    #[test]
    fn ids_round_trip_through_strings() {
        let buyer = BuyerId::new();
        assert_eq!(buyer.to_string().parse::<BuyerId>().unwrap(), buyer);
        assert!("nope".parse::<SellerId>().is_err());
        assert_eq!(ProductId::from("P-1").as_str(), "P-1");
        assert_eq!(OptionId::new("OPT-9").to_string(), "OPT-9");
    }

    #[test]
    fn order_token_maps_to_a_stable_order_stream() {
        let token = OrderToken::new();
        assert_eq!(token.order_id(), token.order_id());
        assert_ne!(token.order_id().as_uuid(), token.as_uuid());
        assert_ne!(token.order_id(), OrderToken::new().order_id());
    }
}
