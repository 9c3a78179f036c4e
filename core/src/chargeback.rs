//! Chargeback (commission clawback) schedule lookup.
//!
//! A schedule is a set of thresholds: "if the sale is cancelled by
//! payment N, reverse P% of the commission". The applicable rule is the
//! nearest threshold at or above the number of payments made. A sale that
//! survived past every threshold owes nothing.

use crate::{
    error::{CoreError, CoreResult},
    types::{PaymentCount, Percent, ProductId, TenantId},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargebackRule {
    pub max_payment_number: PaymentCount,
    pub percentage:         Percent,
}

/// Percentage to claw back after `payments_made` installments, if any.
///
/// Rules may arrive in any order; a sorted copy is scanned. Equal
/// thresholds keep their input order, so the first one listed wins.
pub fn resolve(rules: &[ChargebackRule], payments_made: PaymentCount) -> Option<Percent> {
    applicable(rules, payments_made).map(|rule| rule.percentage)
}

fn applicable(rules: &[ChargebackRule], payments_made: PaymentCount) -> Option<ChargebackRule> {
    let mut sorted = rules.to_vec();
    sorted.sort_by_key(|rule| rule.max_payment_number);
    sorted
        .into_iter()
        .find(|rule| rule.max_payment_number >= payments_made)
}

/// A validated rule set for one tenant's product.
///
/// Thresholds are unique and at least 1; percentages lie in 0–100.
/// Rules are kept sorted ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargebackSchedule {
    tenant_id:  TenantId,
    product_id: ProductId,
    rules:      Vec<ChargebackRule>,
}

impl ChargebackSchedule {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        product_id: impl Into<ProductId>,
        mut rules: Vec<ChargebackRule>,
    ) -> CoreResult<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if rule.max_payment_number == 0 {
                return Err(CoreError::validation(
                    "max_payment_number",
                    "thresholds start at payment 1",
                ));
            }
            if !(0.0..=100.0).contains(&rule.percentage) {
                return Err(CoreError::validation(
                    "percentage",
                    format!(
                        "{} at payment {} is outside 0-100",
                        rule.percentage, rule.max_payment_number
                    ),
                ));
            }
            if !seen.insert(rule.max_payment_number) {
                return Err(CoreError::validation(
                    "max_payment_number",
                    format!("duplicate threshold {}", rule.max_payment_number),
                ));
            }
        }
        rules.sort_by_key(|rule| rule.max_payment_number);

        Ok(Self {
            tenant_id: tenant_id.into(),
            product_id: product_id.into(),
            rules,
        })
    }

    pub fn tenant_id(&self)  -> &str               { &self.tenant_id }
    pub fn product_id(&self) -> &str               { &self.product_id }
    pub fn rules(&self)      -> &[ChargebackRule]  { &self.rules }
    pub fn is_empty(&self)   -> bool               { self.rules.is_empty() }

    pub fn resolve(&self, payments_made: PaymentCount) -> Option<Percent> {
        let pct = resolve(&self.rules, payments_made);
        log::debug!(
            "chargeback: {}/{} payments_made={payments_made} -> {pct:?}",
            self.tenant_id, self.product_id
        );
        pct
    }

    /// The rule that decides the outcome, for audit display.
    pub fn applicable_rule(&self, payments_made: PaymentCount) -> Option<ChargebackRule> {
        applicable(&self.rules, payments_made)
    }

    /// Highest threshold; past it the sale is clear of clawback.
    pub fn last_threshold(&self) -> Option<PaymentCount> {
        self.rules.last().map(|rule| rule.max_payment_number)
    }
}
