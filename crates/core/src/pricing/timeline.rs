use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::material::MonthKey;
use crate::errors::ValidationError;

/// The five months governing one quarterly adjustment round: three data
/// months feeding the formula, the month the change is communicated, and
/// the month it takes effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub data_months: [MonthKey; 3],
    pub communication_month: MonthKey,
    pub effective_month: MonthKey,
}

/// Explicit caller-supplied months. Only ordering is validated; business
/// intent beyond ordering is the caller's to judge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineOverride {
    pub data_months: [MonthKey; 3],
    pub communication_month: MonthKey,
    pub effective_month: MonthKey,
}

/// Derive the adjustment timeline for a reference date, or validate an
/// explicit override.
///
/// Default rule: the data months are the three calendar months immediately
/// preceding the reference month (oldest first), the communication month is
/// the reference month, and the effective month follows it.
pub fn compute_timeline(
    reference_date: NaiveDate,
    timeline_override: Option<TimelineOverride>,
) -> Result<Timeline, ValidationError> {
    let timeline = match timeline_override {
        Some(explicit) => Timeline {
            data_months: explicit.data_months,
            communication_month: explicit.communication_month,
            effective_month: explicit.effective_month,
        },
        None => {
            let communication = MonthKey::from_date(reference_date);
            let m3 = communication.pred();
            let m2 = m3.pred();
            let m1 = m2.pred();
            Timeline {
                data_months: [m1, m2, m3],
                communication_month: communication,
                effective_month: communication.succ(),
            }
        }
    };

    validate_ordering(
        &timeline.data_months,
        timeline.communication_month,
        timeline.effective_month,
    )?;
    Ok(timeline)
}

/// Ordering invariants shared by the calculator and the lifecycle manager:
/// strictly increasing data months, communication no earlier than the last
/// data month, effective strictly after communication.
pub fn validate_ordering(
    data_months: &[MonthKey; 3],
    communication_month: MonthKey,
    effective_month: MonthKey,
) -> Result<(), ValidationError> {
    for pair in data_months.windows(2) {
        if pair[0] >= pair[1] {
            return Err(ValidationError::InvalidTimeline {
                reason: format!(
                    "data months must be strictly increasing, got {} before {}",
                    pair[0], pair[1]
                ),
            });
        }
    }

    if communication_month < data_months[2] {
        return Err(ValidationError::InvalidTimeline {
            reason: format!(
                "communication month {} precedes last data month {}",
                communication_month, data_months[2]
            ),
        });
    }

    if effective_month <= communication_month {
        return Err(ValidationError::InvalidTimeline {
            reason: format!(
                "effective month {effective_month} must follow communication month {communication_month}"
            ),
        });
    }

    Ok(())
}
