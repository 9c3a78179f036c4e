//! Sale quotes: a catalog product priced for one asset value.

use crate::{
    clock::Clock,
    config::ConsortiumProduct,
    error::{CoreError, CoreResult},
    financing::{self, FinancingBreakdown, FinancingTerms},
    types::{Money, ProductId, TenantId, Timestamp},
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub quote_id:   Uuid,
    pub tenant_id:  TenantId,
    pub product_id: ProductId,
    pub terms:      FinancingTerms,
    pub breakdown:  FinancingBreakdown,
    pub created_at: Timestamp,
}

impl Quote {
    pub fn build(
        tenant_id: &str,
        product: &ConsortiumProduct,
        asset_value: Money,
        down_payment: Money,
        clock: &dyn Clock,
    ) -> CoreResult<Self> {
        if !product.active {
            return Err(CoreError::validation(
                "product_id",
                format!("product '{}' is not active", product.product_id),
            ));
        }

        let terms = product.terms_for(asset_value, down_payment)?;
        let breakdown = financing::calculate(&terms);

        log::debug!(
            "financing: quote {}/{} credit={:.2} monthly={:.2} over {} installments",
            tenant_id,
            product.product_id,
            breakdown.credit_letter_value,
            breakdown.monthly_payment,
            breakdown.installments
        );

        Ok(Self {
            quote_id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            product_id: product.product_id.clone(),
            terms,
            breakdown,
            created_at: clock.now(),
        })
    }
}
