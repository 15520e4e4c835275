use tracing::{debug, info};

use postrefresh_common::config::DEFAULT_STALE_AFTER_SECS;
use postrefresh_common::{FilterConfig, MediaOutlet, ReferenceClock, RefreshError, RefreshResult};

use crate::whitelist::Whitelist;

/// Stand-in update time for outlets that never reported one, so they always look stale.
pub const NEVER_UPDATED_EPOCH: i64 = 1_100_000_000;

/// One eligibility predicate with its bound parameters. `accepts` returning
/// true means the outlet may be processed.
#[derive(Debug, Clone, PartialEq)]
pub enum OutletFilter {
    /// Outlet id equals this text.
    ById(String),
    ByCategory(String),
    IsActive,
    /// Active, and last updated more than `threshold_secs` before `clock`.
    RecentlyStale {
        clock: ReferenceClock,
        threshold_secs: i64,
    },
    /// Local audience at least `min_percentage` and home country equal to `country`.
    LocalEnough { min_percentage: f64, country: String },
    Whitelisted(Whitelist),
}

impl OutletFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        OutletFilter::ById(id.into())
    }

    pub fn by_category(category: impl Into<String>) -> Self {
        OutletFilter::ByCategory(category.into())
    }

    pub fn is_active() -> Self {
        OutletFilter::IsActive
    }

    pub fn recently_stale(clock: ReferenceClock) -> Self {
        Self::stale_after(clock, DEFAULT_STALE_AFTER_SECS)
    }

    pub fn stale_after(clock: ReferenceClock, threshold_secs: i64) -> Self {
        OutletFilter::RecentlyStale {
            clock,
            threshold_secs,
        }
    }

    pub fn local_enough(min_percentage: f64, country: impl Into<String>) -> Self {
        OutletFilter::LocalEnough {
            min_percentage,
            country: country.into(),
        }
    }

    pub fn whitelisted(allowed: impl IntoIterator<Item = i64>) -> Self {
        OutletFilter::Whitelisted(allowed.into_iter().collect())
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutletFilter::ById(_) => "by_id",
            OutletFilter::ByCategory(_) => "by_category",
            OutletFilter::IsActive => "is_active",
            OutletFilter::RecentlyStale { .. } => "recently_stale",
            OutletFilter::LocalEnough { .. } => "local_enough",
            OutletFilter::Whitelisted(_) => "whitelisted",
        }
    }

    pub fn accepts(&self, outlet: &MediaOutlet) -> bool {
        match self {
            OutletFilter::ById(id) => outlet.id == *id,
            OutletFilter::ByCategory(category) => {
                outlet.category.as_deref() == Some(category.as_str())
            }
            OutletFilter::IsActive => outlet.is_active,
            OutletFilter::RecentlyStale {
                clock,
                threshold_secs,
            } => {
                let updated = outlet.updated_time.unwrap_or(NEVER_UPDATED_EPOCH);
                let seconds_since_update = clock.epoch_secs().saturating_sub(updated);
                outlet.is_active && seconds_since_update > *threshold_secs
            }
            OutletFilter::LocalEnough {
                min_percentage,
                country,
            } => {
                outlet.effective_local_percentage() >= *min_percentage
                    && outlet.effective_country() == Some(country.as_str())
            }
            OutletFilter::Whitelisted(whitelist) => outlet
                .numeric_id()
                .is_some_and(|id| whitelist.contains(id)),
        }
    }
}

/// Outcome of running a chain over one outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Names the first filter that said no.
    Rejected { filter: &'static str },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Conjunction of filters. An empty chain accepts everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<OutletFilter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: OutletFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[OutletFilter] {
        &self.filters
    }

    /// Build the chain a run asks for. Cheap equality checks go first and the
    /// clock-based check last.
    pub fn from_config(
        config: &FilterConfig,
        clock: ReferenceClock,
        whitelist: Option<Whitelist>,
    ) -> RefreshResult<Self> {
        let mut chain = FilterChain::new();

        if let Some(id) = &config.media_id {
            chain = chain.and(OutletFilter::by_id(id.clone()));
        }
        if let Some(category) = &config.category {
            chain = chain.and(OutletFilter::by_category(category.clone()));
        }
        if config.require_active {
            chain = chain.and(OutletFilter::is_active());
        }
        if config.whitelist_only {
            let whitelist = whitelist.ok_or_else(|| {
                RefreshError::Config("whitelist_only is set but no whitelist was loaded".to_string())
            })?;
            chain = chain.and(OutletFilter::Whitelisted(whitelist));
        }
        if let Some(min_percentage) = config.local_percentage {
            if !min_percentage.is_finite() {
                return Err(RefreshError::Config(format!(
                    "local_percentage must be finite, got {min_percentage}"
                )));
            }
            let country = config.country.clone().ok_or_else(|| {
                RefreshError::Config("local_percentage needs a country to compare against".to_string())
            })?;
            chain = chain.and(OutletFilter::local_enough(min_percentage, country));
        }
        if let Some(threshold_secs) = config.stale_after_secs {
            if threshold_secs < 0 {
                return Err(RefreshError::Config(format!(
                    "stale_after_secs must not be negative, got {threshold_secs}"
                )));
            }
            chain = chain.and(OutletFilter::stale_after(clock, threshold_secs));
        }

        debug!(
            filters = ?chain.filters.iter().map(OutletFilter::name).collect::<Vec<_>>(),
            "Built outlet filter chain"
        );
        Ok(chain)
    }

    pub fn evaluate(&self, outlet: &MediaOutlet) -> Verdict {
        match self.filters.iter().find(|f| !f.accepts(outlet)) {
            Some(filter) => {
                debug!(
                    outlet = outlet.id.as_str(),
                    name = outlet.name.as_str(),
                    filter = filter.name(),
                    "Rejecting outlet"
                );
                Verdict::Rejected {
                    filter: filter.name(),
                }
            }
            None => Verdict::Accepted,
        }
    }

    pub fn accepts(&self, outlet: &MediaOutlet) -> bool {
        self.evaluate(outlet).is_accepted()
    }

    /// Accepted outlets, in input order.
    pub fn retain<'a>(&self, outlets: &'a [MediaOutlet]) -> Vec<&'a MediaOutlet> {
        let accepted: Vec<&MediaOutlet> = outlets.iter().filter(|o| self.accepts(o)).collect();
        info!(
            total = outlets.len(),
            accepted = accepted.len(),
            rejected = outlets.len() - accepted.len(),
            "Outlet filtering complete"
        );
        accepted
    }

    /// Numeric ids of the accepted outlets, ready to become a request's media ids.
    /// Accepted outlets whose id is not an integer are skipped.
    pub fn media_ids(&self, outlets: &[MediaOutlet]) -> Vec<i64> {
        self.retain(outlets)
            .into_iter()
            .filter_map(|outlet| {
                let id = outlet.numeric_id();
                if id.is_none() {
                    debug!(outlet = outlet.id.as_str(), "Skipping outlet with non-numeric id");
                }
                id
            })
            .collect()
    }
}
