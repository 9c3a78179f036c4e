//! Store methods for chargeback schedules.

use crate::{
    chargeback::{ChargebackRule, ChargebackSchedule},
    error::CoreResult,
};
use rusqlite::params;

use super::CoreStore;

impl CoreStore {
    /// Replace every rule of the schedule's tenant/product in one transaction.
    pub fn replace_chargeback_schedule(&self, schedule: &ChargebackSchedule) -> CoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM chargeback_rule WHERE tenant_id = ?1 AND product_id = ?2",
            params![schedule.tenant_id(), schedule.product_id()],
        )?;
        for rule in schedule.rules() {
            tx.execute(
                "INSERT INTO chargeback_rule (tenant_id, product_id, max_payment_number, percentage)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    schedule.tenant_id(),
                    schedule.product_id(),
                    rule.max_payment_number,
                    rule.percentage,
                ],
            )?;
        }
        tx.commit()?;
        log::debug!(
            "store: saved {} chargeback rules for {}/{}",
            schedule.rules().len(),
            schedule.tenant_id(),
            schedule.product_id()
        );
        Ok(())
    }

    /// Add one threshold to an existing schedule.
    /// Fails with a validation error if the threshold is already taken.
    pub fn insert_chargeback_rule(
        &self,
        tenant_id:  &str,
        product_id: &str,
        rule:       ChargebackRule,
    ) -> CoreResult<ChargebackSchedule> {
        let mut rules = self.chargeback_schedule(tenant_id, product_id)?.rules().to_vec();
        rules.push(rule);
        let schedule = ChargebackSchedule::new(tenant_id, product_id, rules)?;

        self.conn.execute(
            "INSERT INTO chargeback_rule (tenant_id, product_id, max_payment_number, percentage)
             VALUES (?1, ?2, ?3, ?4)",
            params![tenant_id, product_id, rule.max_payment_number, rule.percentage],
        )?;
        Ok(schedule)
    }

    /// Load the schedule for a tenant's product. Empty if none is configured.
    pub fn chargeback_schedule(
        &self,
        tenant_id:  &str,
        product_id: &str,
    ) -> CoreResult<ChargebackSchedule> {
        let mut stmt = self.conn.prepare(
            "SELECT max_payment_number, percentage FROM chargeback_rule
             WHERE tenant_id = ?1 AND product_id = ?2
             ORDER BY max_payment_number ASC",
        )?;
        let rules = stmt
            .query_map(params![tenant_id, product_id], |row| {
                Ok(ChargebackRule {
                    max_payment_number: row.get(0)?,
                    percentage:         row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        ChargebackSchedule::new(tenant_id, product_id, rules)
    }
}
