use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use postrefresh_common::{RefreshError, RefreshResult, SelectionRequest};

use crate::window::HourWindows;

/// Suggested max reported when a single post is targeted.
pub const SINGLE_POST_SUGGESTED_MAX: i64 = 100;

/// Each cycle proposes roughly one eighth of the outstanding backlog.
pub const BACKLOG_DIVISOR: u64 = 8;

static RE_POST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)_([0-9]+)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    SinglePost,
    WithoutInteractions,
    SingleOutlet,
    MultiOutlet,
}

/// Outlets a batch query is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutletScope {
    /// Equality on one outlet id.
    Single(i64),
    /// Set-membership join over several ids.
    Set(Vec<i64>),
}

/// How the `max_sugerido` column is produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedMax {
    Fixed(i64),
    /// Equal to the page size.
    Limit(i64),
    /// `ceil(backlog / 8)`, with the backlog counted over the diagnosis window.
    Backlog { diagnosis_until_hours: f64 },
}

impl SuggestedMax {
    /// The value for a known backlog count. Fixed and limit-based values ignore it.
    pub fn resolve(&self, backlog: u64) -> i64 {
        match *self {
            SuggestedMax::Fixed(n) | SuggestedMax::Limit(n) => n,
            SuggestedMax::Backlog { .. } => backlog_share(backlog),
        }
    }
}

/// Share of the backlog proposed for one cycle, rounded up.
pub fn backlog_share(backlog: u64) -> i64 {
    i64::try_from(backlog.div_ceil(BACKLOG_DIVISOR)).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SinglePostPlan {
    pub media_id: i64,
    pub post_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPlan {
    pub outlets: OutletScope,
    pub windows: HourWindows,
    pub limit: i64,
    pub offset: i64,
    /// Only posts whose reaction or comment count is still unknown (-1).
    pub without_interactions: bool,
}

impl BatchPlan {
    pub fn mode(&self) -> QueryMode {
        match (&self.outlets, self.without_interactions) {
            (_, true) => QueryMode::WithoutInteractions,
            (OutletScope::Single(_), false) => QueryMode::SingleOutlet,
            (OutletScope::Set(_), false) => QueryMode::MultiOutlet,
        }
    }

    pub fn suggested_max(&self) -> SuggestedMax {
        if self.without_interactions {
            SuggestedMax::Limit(self.limit)
        } else {
            SuggestedMax::Backlog {
                diagnosis_until_hours: self.windows.diagnosis_until,
            }
        }
    }
}

/// A validated candidate-selection query, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryPlan {
    SinglePost(SinglePostPlan),
    Batch(BatchPlan),
}

impl QueryPlan {
    /// Pick the query mode for a request. A `post_id` of the form `<media>_<post>`
    /// wins over everything else; any other `post_id` is ignored.
    pub fn from_request(request: &SelectionRequest) -> RefreshResult<Self> {
        if let Some(single) = request.post_id.as_deref().and_then(parse_post_id) {
            debug!(
                media_id = single.media_id,
                post_id = single.post_id,
                "Will retrieve only one post"
            );
            return Ok(QueryPlan::SinglePost(single));
        }

        let batch = plan_batch(request)?;
        debug!(
            mode = ?batch.mode(),
            windows = ?batch.windows,
            limit = batch.limit,
            offset = batch.offset,
            "Planned candidate query"
        );
        Ok(QueryPlan::Batch(batch))
    }

    pub fn mode(&self) -> QueryMode {
        match self {
            QueryPlan::SinglePost(_) => QueryMode::SinglePost,
            QueryPlan::Batch(batch) => batch.mode(),
        }
    }

    pub fn suggested_max(&self) -> SuggestedMax {
        match self {
            QueryPlan::SinglePost(_) => SuggestedMax::Fixed(SINGLE_POST_SUGGESTED_MAX),
            QueryPlan::Batch(batch) => batch.suggested_max(),
        }
    }
}

fn parse_post_id(raw: &str) -> Option<SinglePostPlan> {
    let caps = RE_POST_ID.captures(raw)?;
    let parsed = caps[1].parse::<i64>().ok().zip(caps[2].parse::<i64>().ok());
    if parsed.is_none() {
        debug!(post_id = raw, "Post id out of range, falling back to batch selection");
    }
    parsed.map(|(media_id, post_id)| SinglePostPlan { media_id, post_id })
}

fn plan_batch(request: &SelectionRequest) -> RefreshResult<BatchPlan> {
    if request.limit < 1 {
        return Err(RefreshError::InvalidRequest(format!(
            "limit must be at least 1, got {}",
            request.limit
        )));
    }
    if request.offset < 0 {
        return Err(RefreshError::InvalidRequest(format!(
            "offset must not be negative, got {}",
            request.offset
        )));
    }
    if let Some(bad) = request.media_ids.iter().find(|id| **id <= 0) {
        return Err(RefreshError::InvalidRequest(format!(
            "media ids must be positive, got {bad}"
        )));
    }

    let mut media_ids: Vec<i64> = Vec::with_capacity(request.media_ids.len());
    for id in &request.media_ids {
        if !media_ids.contains(id) {
            media_ids.push(*id);
        }
    }

    let outlets = match media_ids.len() {
        0 => {
            return Err(RefreshError::InvalidRequest(
                "batch selection needs at least one media id".to_string(),
            ))
        }
        1 => OutletScope::Single(media_ids[0]),
        _ => OutletScope::Set(media_ids),
    };

    let windows = HourWindows::from_days(
        request.created_since,
        request.created_until,
        request.updated_until,
        request.diagnosis_until,
    )?;

    Ok(BatchPlan {
        outlets,
        windows,
        limit: request.limit,
        offset: request.offset,
        without_interactions: request.without_interactions,
    })
}
