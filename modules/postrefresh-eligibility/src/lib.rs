//! Outlet eligibility: composable predicates deciding which media outlets take
//! part in a refresh cycle.

pub mod filters;
pub mod whitelist;

pub use filters::{FilterChain, OutletFilter, Verdict, NEVER_UPDATED_EPOCH};
pub use whitelist::{load_whitelist, Whitelist};
