use serde::Serialize;

use postrefresh_common::{RefreshError, RefreshResult};

const HOURS_PER_DAY: f64 = 24.0;

/// Request windows converted from days to hours.
///
/// `created_since` is rounded up so a batch never looks further back than asked;
/// the other bounds are plain multiplications and may be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourWindows {
    pub created_since: i64,
    pub created_until: f64,
    pub updated_until: f64,
    pub diagnosis_until: f64,
}

impl HourWindows {
    pub fn from_days(
        created_since: f64,
        created_until: f64,
        updated_until: f64,
        diagnosis_until: f64,
    ) -> RefreshResult<Self> {
        let since_hours = to_hours("createdSince", created_since)?.ceil();
        if since_hours >= i64::MAX as f64 {
            return Err(RefreshError::InvalidRequest(format!(
                "createdSince is too large: {created_since}"
            )));
        }

        Ok(Self {
            created_since: since_hours as i64,
            created_until: to_hours("createdUntil", created_until)?,
            updated_until: to_hours("updatedUntil", updated_until)?,
            diagnosis_until: to_hours("diagnosisUntil", diagnosis_until)?,
        })
    }
}

fn to_hours(field: &str, days: f64) -> RefreshResult<f64> {
    if !days.is_finite() || days < 0.0 {
        return Err(RefreshError::InvalidRequest(format!(
            "{field} must be a non-negative number of days, got {days}"
        )));
    }
    let hours = days * HOURS_PER_DAY;
    if !hours.is_finite() {
        return Err(RefreshError::InvalidRequest(format!(
            "{field} is too large: {days} days"
        )));
    }
    Ok(hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_rounds_up_others_do_not() {
        let w = HourWindows::from_days(2.1, 2.1, 2.1, 2.1).unwrap();
        assert_eq!(w.created_since, 51);
        assert!((w.created_until - 50.4).abs() < 1e-9);
        assert!((w.updated_until - 50.4).abs() < 1e-9);
        assert!((w.diagnosis_until - 50.4).abs() < 1e-9);
    }

    #[test]
    fn whole_days_convert_exactly() {
        let w = HourWindows::from_days(1.0, 30.0, 7.0, 14.0).unwrap();
        assert_eq!(w.created_since, 24);
        assert_eq!(w.created_until, 720.0);
        assert_eq!(w.updated_until, 168.0);
        assert_eq!(w.diagnosis_until, 336.0);
    }

    #[test]
    fn zero_days_is_allowed() {
        let w = HourWindows::from_days(0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(w.created_since, 0);
    }

    #[test]
    fn negative_days_rejected() {
        let err = HourWindows::from_days(1.0, -0.5, 7.0, 14.0).unwrap_err();
        assert!(matches!(err, RefreshError::InvalidRequest(msg) if msg.contains("createdUntil")));
    }

    #[test]
    fn non_finite_days_rejected() {
        assert!(HourWindows::from_days(f64::NAN, 1.0, 1.0, 1.0).is_err());
        assert!(HourWindows::from_days(1.0, 1.0, f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn huge_since_rejected() {
        assert!(HourWindows::from_days(1e300, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn window_overflowing_to_infinite_hours_rejected() {
        let err = HourWindows::from_days(1.0, 1e308, 7.0, 14.0).unwrap_err();
        assert!(matches!(err, RefreshError::InvalidRequest(msg) if msg.contains("createdUntil")));
        assert!(HourWindows::from_days(1.0, 30.0, 7.0, f64::MAX).is_err());
    }
}
