use chrono::{DateTime, TimeZone, Utc};
use schemars::JsonSchema;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use typed_builder::TypedBuilder;

// --- Selection Request ---

/// One refresh batch: which outlets to look at, how far back, and how many rows.
///
/// Day counts are fractional; the planner converts them to hours. When `post_id`
/// has the `<media_id>_<post_id>` shape every other field is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    #[serde(default)]
    #[builder(default)]
    pub media_ids: Vec<i64>,
    pub limit: i64,
    #[serde(default)]
    #[builder(default)]
    pub offset: i64,
    pub created_since: f64,
    pub created_until: f64,
    pub updated_until: f64,
    pub diagnosis_until: f64,
    #[serde(default)]
    #[builder(default)]
    pub without_interactions: bool,
    #[serde(default)]
    #[builder(default, setter(strip_option, into))]
    pub post_id: Option<String>,
}

// --- Media Outlets ---

/// Nested options block some outlet records carry (`mediumOptions` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutletOptions {
    #[serde(default, deserialize_with = "lenient_number")]
    pub local_percentage: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A media outlet as read from the outlet source. Read-only input to the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct MediaOutlet {
    #[serde(rename = "id_medio", deserialize_with = "id_as_text")]
    #[builder(setter(into))]
    pub id: String,
    #[serde(default)]
    #[builder(default, setter(into))]
    pub name: String,
    #[serde(default, rename = "schema")]
    #[builder(default, setter(strip_option, into))]
    pub category: Option<String>,
    #[serde(default)]
    #[builder(default, setter(strip_option, into))]
    pub country: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub is_active: bool,
    /// Epoch seconds of the outlet's last reported update.
    #[serde(default, deserialize_with = "lenient_epoch_secs")]
    #[builder(default, setter(strip_option))]
    pub updated_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[builder(default, setter(strip_option))]
    pub local_percentage: Option<f64>,
    #[serde(default, rename = "mediumOptions")]
    #[builder(default, setter(strip_option))]
    pub options: Option<OutletOptions>,
}

impl MediaOutlet {
    /// The outlet id parsed as an integer, if it is one.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.trim().parse().ok()
    }

    /// Local-audience percentage: direct field, then options, then unbounded.
    /// Non-finite values are skipped at each level.
    pub fn effective_local_percentage(&self) -> f64 {
        let nested = self.options.as_ref().and_then(|o| o.local_percentage);
        [self.local_percentage, nested]
            .into_iter()
            .flatten()
            .find(|p| p.is_finite())
            .unwrap_or(f64::INFINITY)
    }

    /// Home country: direct field unless empty, then options.
    pub fn effective_country(&self) -> Option<&str> {
        let nested = self.options.as_ref().and_then(|o| o.country.as_deref());
        [self.country.as_deref(), nested]
            .into_iter()
            .flatten()
            .find(|c| !c.is_empty())
    }
}

fn id_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Other(IgnoredAny),
}

/// Any JSON number; strings, nulls and the rest decode as missing.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawNumber::deserialize(deserializer)? {
        RawNumber::Int(n) => Some(n as f64),
        RawNumber::Float(f) => Some(f),
        RawNumber::Other(_) => None,
    })
}

/// Epoch seconds, truncating fractional values. Anything else decodes as missing.
fn lenient_epoch_secs<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawNumber::deserialize(deserializer)? {
        RawNumber::Int(n) => Some(n),
        RawNumber::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => {
            Some(f.trunc() as i64)
        }
        RawNumber::Float(_) | RawNumber::Other(_) => None,
    })
}

// --- Reference Clock ---

/// The instant a batch started. Captured once by the caller and passed to any
/// time-relative filter so evaluation never reads the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceClock(DateTime<Utc>);

impl ReferenceClock {
    /// Capture the current wall-clock time.
    pub fn capture() -> Self {
        Self(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn from_epoch_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// Whole seconds since the epoch, truncated.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }
}
