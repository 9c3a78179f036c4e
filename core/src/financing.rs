//! Consortium financing calculator.
//!
//! Turns a product's terms into a flat payment schedule and cost
//! breakdown. The credit letter is repaid in equal installments; the
//! administration fee is spread evenly; the index adjustment uses the
//! average-balance approximation (balance declines linearly from the
//! credit letter to zero, so the average exposure is half the credit
//! letter, charged at the annual index rate for the contract's length
//! in years). Nothing compounds and nothing is rounded.
//!
//! RULE: `calculate()` is pure. Validation happens once, when
//! `FinancingTerms` is constructed.

use crate::{
    error::{CoreError, CoreResult},
    types::{Money, PaymentCount, Percent},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinancingTerms {
    asset_value:        Money,
    installments:       PaymentCount,
    down_payment:       Money,
    admin_rate_percent: Percent,
    index_rate_percent: Percent,
}

impl FinancingTerms {
    /// Terms with no down payment and no index adjustment.
    pub fn new(
        asset_value: Money,
        installments: PaymentCount,
        admin_rate_percent: Percent,
    ) -> CoreResult<Self> {
        Self {
            asset_value,
            installments,
            down_payment: 0.0,
            admin_rate_percent,
            index_rate_percent: 0.0,
        }
        .validated()
    }

    pub fn with_down_payment(self, down_payment: Money) -> CoreResult<Self> {
        Self { down_payment, ..self }.validated()
    }

    /// Annualized index (INCC-style) rate, in percent.
    pub fn with_index_rate(self, index_rate_percent: Percent) -> CoreResult<Self> {
        Self { index_rate_percent, ..self }.validated()
    }

    fn validated(self) -> CoreResult<Self> {
        if !self.asset_value.is_finite() || self.asset_value < 0.0 {
            return Err(CoreError::validation(
                "asset_value",
                format!("must be a non-negative amount, got {}", self.asset_value),
            ));
        }
        if self.installments == 0 {
            return Err(CoreError::validation("installments", "must be at least 1"));
        }
        if !self.down_payment.is_finite() || self.down_payment < 0.0 {
            return Err(CoreError::validation(
                "down_payment",
                format!("must be a non-negative amount, got {}", self.down_payment),
            ));
        }
        if self.down_payment > self.asset_value {
            return Err(CoreError::validation(
                "down_payment",
                format!(
                    "{:.2} exceeds asset value {:.2}",
                    self.down_payment, self.asset_value
                ),
            ));
        }
        if !self.admin_rate_percent.is_finite() || self.admin_rate_percent < 0.0 {
            return Err(CoreError::validation(
                "admin_rate_percent",
                format!("must be non-negative, got {}", self.admin_rate_percent),
            ));
        }
        if !self.index_rate_percent.is_finite() || self.index_rate_percent < 0.0 {
            return Err(CoreError::validation(
                "index_rate_percent",
                format!("must be non-negative, got {}", self.index_rate_percent),
            ));
        }
        Ok(self)
    }

    pub fn asset_value(&self)        -> Money        { self.asset_value }
    pub fn installments(&self)       -> PaymentCount { self.installments }
    pub fn down_payment(&self)       -> Money        { self.down_payment }
    pub fn admin_rate_percent(&self) -> Percent      { self.admin_rate_percent }
    pub fn index_rate_percent(&self) -> Percent      { self.index_rate_percent }
}

// Deserialization goes through the same validation as the constructors.
#[derive(Deserialize)]
struct RawTerms {
    asset_value:        Money,
    installments:       PaymentCount,
    #[serde(default)]
    down_payment:       Money,
    admin_rate_percent: Percent,
    #[serde(default)]
    index_rate_percent: Percent,
}

impl<'de> Deserialize<'de> for FinancingTerms {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawTerms::deserialize(deserializer)?;
        FinancingTerms {
            asset_value:        raw.asset_value,
            installments:       raw.installments,
            down_payment:       raw.down_payment,
            admin_rate_percent: raw.admin_rate_percent,
            index_rate_percent: raw.index_rate_percent,
        }
        .validated()
        .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinancingBreakdown {
    pub credit_letter_value:   Money,
    pub total_admin_cost:      Money,
    pub index_adjustment:      Money,
    pub total_with_adjustment: Money,
    pub monthly_payment:       Money,
    pub monthly_amortization:  Money,
    pub monthly_admin_fee:     Money,
    pub installments:          PaymentCount,
}

/// One row of the expanded payment schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstallmentLine {
    pub number:           PaymentCount,
    pub amortization:     Money,
    pub admin_fee:        Money,
    pub index_adjustment: Money,
    pub payment:          Money,
}

/// Compute the cost breakdown for `terms`.
pub fn calculate(terms: &FinancingTerms) -> FinancingBreakdown {
    let installments = terms.installments as f64;

    let credit_letter_value = terms.asset_value - terms.down_payment;
    let total_admin_cost = credit_letter_value * terms.admin_rate_percent / 100.0;
    let index_adjustment = (credit_letter_value / 2.0)
        * (terms.index_rate_percent / 100.0)
        * (installments / 12.0);
    let total_with_adjustment = credit_letter_value + total_admin_cost + index_adjustment;

    FinancingBreakdown {
        credit_letter_value,
        total_admin_cost,
        index_adjustment,
        total_with_adjustment,
        monthly_payment:      total_with_adjustment / installments,
        monthly_amortization: credit_letter_value / installments,
        monthly_admin_fee:    total_admin_cost / installments,
        installments:         terms.installments,
    }
}

impl FinancingBreakdown {
    /// Index adjustment charged with each installment.
    pub fn monthly_index_adjustment(&self) -> Money {
        self.index_adjustment / self.installments as f64
    }

    /// Expand into one line per installment. Every line is identical;
    /// the schedule is flat.
    pub fn schedule(&self) -> Vec<InstallmentLine> {
        let index_adjustment = self.monthly_index_adjustment();
        (1..=self.installments)
            .map(|number| InstallmentLine {
                number,
                amortization: self.monthly_amortization,
                admin_fee:    self.monthly_admin_fee,
                index_adjustment,
                payment:      self.monthly_payment,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_rejects_down_payment_above_asset() {
        let json = r#"{"asset_value": 1000.0, "installments": 10,
                       "down_payment": 2000.0, "admin_rate_percent": 10.0}"#;
        let err = serde_json::from_str::<FinancingTerms>(json).unwrap_err();
        assert!(err.to_string().contains("down_payment"), "got: {err}");
    }

    #[test]
    fn deserialize_defaults_optional_fields() {
        let json = r#"{"asset_value": 1000.0, "installments": 10, "admin_rate_percent": 10.0}"#;
        let terms: FinancingTerms = serde_json::from_str(json).unwrap();
        assert_eq!(terms.down_payment(), 0.0);
        assert_eq!(terms.index_rate_percent(), 0.0);
    }
}
