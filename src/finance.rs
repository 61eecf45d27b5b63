//! General functions related to finance.
use crate::units::{Capacity, Dimensionless, Money, MoneyPerCapacity};

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualise capital costs over the lifetime of an asset. It is the same
/// quantity as the fixed-charge rate `d / ((1 + d)^L - 1) + d`.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let exponent = i32::try_from(lifetime).unwrap_or(i32::MAX);
    let factor = (Dimensionless(1.0) + discount_rate).powi(exponent);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// Calculates the annual capital cost per unit of capacity
pub fn annual_capital_cost(
    capital_cost: MoneyPerCapacity,
    lifetime: u32,
    discount_rate: Dimensionless,
) -> MoneyPerCapacity {
    let crf = capital_recovery_factor(lifetime, discount_rate);
    capital_cost * crf
}

/// Calculates the annualised repayment for building the given capacity
pub fn annualised_build_cost(
    capital_cost: MoneyPerCapacity,
    capacity: Capacity,
    lifetime: u32,
    discount_rate: Dimensionless,
) -> Money {
    annual_capital_cost(capital_cost, lifetime, discount_rate) * capacity
}
