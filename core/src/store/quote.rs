//! Store methods for sale quotes.

use crate::{
    error::CoreResult,
    financing::{self, FinancingTerms},
    quote::Quote,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{corrupt_row, CoreStore};

struct QuoteRow {
    quote_id:           String,
    tenant_id:          String,
    product_id:         String,
    asset_value:        f64,
    installments:       u32,
    down_payment:       f64,
    admin_rate_percent: f64,
    index_rate_percent: f64,
    created_at:         String,
}

impl QuoteRow {
    fn into_quote(self) -> CoreResult<Quote> {
        let quote_id = Uuid::parse_str(&self.quote_id)
            .map_err(|e| corrupt_row("quote_id", e))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt_row("created_at", e))?
            .with_timezone(&Utc);
        let terms = FinancingTerms::new(self.asset_value, self.installments, self.admin_rate_percent)?
            .with_down_payment(self.down_payment)?
            .with_index_rate(self.index_rate_percent)?;
        // The stored breakdown JSON is for audit; the calculator is the source of truth.
        let breakdown = financing::calculate(&terms);

        Ok(Quote {
            quote_id,
            tenant_id: self.tenant_id,
            product_id: self.product_id,
            terms,
            breakdown,
            created_at,
        })
    }
}

impl CoreStore {
    pub fn insert_quote(&self, quote: &Quote) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO quote (quote_id, tenant_id, product_id, asset_value, installments,
                                down_payment, admin_rate_percent, index_rate_percent,
                                breakdown_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                quote.quote_id.to_string(),
                quote.tenant_id,
                quote.product_id,
                quote.terms.asset_value(),
                quote.terms.installments(),
                quote.terms.down_payment(),
                quote.terms.admin_rate_percent(),
                quote.terms.index_rate_percent(),
                serde_json::to_string(&quote.breakdown)?,
                quote.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    /// Most recent quotes first.
    pub fn quotes_for_product(
        &self,
        tenant_id:  &str,
        product_id: &str,
        limit:      usize,
    ) -> CoreResult<Vec<Quote>> {
        let mut stmt = self.conn.prepare(
            "SELECT quote_id, tenant_id, product_id, asset_value, installments, down_payment,
                    admin_rate_percent, index_rate_percent, created_at
             FROM quote WHERE tenant_id = ?1 AND product_id = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![tenant_id, product_id, limit as i64], |row| {
                Ok(QuoteRow {
                    quote_id:           row.get(0)?,
                    tenant_id:          row.get(1)?,
                    product_id:         row.get(2)?,
                    asset_value:        row.get(3)?,
                    installments:       row.get(4)?,
                    down_payment:       row.get(5)?,
                    admin_rate_percent: row.get(6)?,
                    index_rate_percent: row.get(7)?,
                    created_at:         row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(QuoteRow::into_quote).collect()
    }

    pub fn quote_count(&self, tenant_id: &str) -> CoreResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quote WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
