//! Financial core for consortium sales: financing quotes, commission
//! chargeback schedules, and a fixed-window rate governor for expensive
//! operations.

pub mod chargeback;
pub mod clock;
pub mod config;
pub mod error;
pub mod financing;
pub mod quote;
pub mod rate_limit;
pub mod store;
pub mod types;

pub use chargeback::{ChargebackRule, ChargebackSchedule};
pub use error::{CoreError, CoreResult};
pub use financing::{calculate, FinancingBreakdown, FinancingTerms};
pub use rate_limit::{RateGovernor, RateLimitContext, RateLimitDecision, RateLimitPolicy};
