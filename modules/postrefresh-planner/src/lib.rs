//! Candidate-post selection: converts a [`SelectionRequest`] into a typed
//! [`QueryPlan`] and renders it as bound-parameter Postgres SQL.
//!
//! [`SelectionRequest`]: postrefresh_common::SelectionRequest

pub mod plan;
pub mod render;
pub mod users;
pub mod window;

pub use plan::{
    backlog_share, BatchPlan, OutletScope, QueryMode, QueryPlan, SinglePostPlan, SuggestedMax,
};
pub use render::CANDIDATE_COLUMNS;
pub use users::upsert_user;
pub use window::HourWindows;
