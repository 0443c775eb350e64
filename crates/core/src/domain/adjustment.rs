use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::material::{Material, MonthKey};
use crate::errors::{ConflictError, ValidationError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjustmentId(pub String);

/// Lifecycle of a pricing adjustment. `Applied` and `Cancelled` are
/// terminal; nothing transitions out of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Draft,
    Applied,
    Cancelled,
}

impl AdjustmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Applied => "applied",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied | Self::Cancelled)
    }
}

impl fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "applied" => Ok(Self::Applied),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError::InvalidAdjustment {
                field: "status".to_string(),
                reason: format!("unknown status `{other}` (expected draft|applied|cancelled)"),
            }),
        }
    }
}

/// A proposed or committed material price change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingAdjustment {
    pub id: AdjustmentId,
    pub name: String,
    pub material: Material,
    pub data_months: [MonthKey; 3],
    pub communication_month: MonthKey,
    pub effective_month: MonthKey,
    pub formula: String,
    pub old_average_price: Decimal,
    pub new_average_price: Decimal,
    pub status: AdjustmentStatus,
    /// Snapshot figures frozen at apply time; `None` while in draft.
    pub parts_affected: Option<u32>,
    pub total_cost_impact: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
}

impl PricingAdjustment {
    pub fn price_change_usd(&self) -> Decimal {
        self.new_average_price - self.old_average_price
    }

    pub fn price_change_percent(&self) -> Decimal {
        if self.old_average_price.is_zero() {
            return Decimal::ZERO;
        }
        self.price_change_usd() / self.old_average_price * Decimal::from(100)
    }

    pub fn can_transition_to(&self, next: AdjustmentStatus) -> bool {
        matches!(
            (self.status, next),
            (AdjustmentStatus::Draft, AdjustmentStatus::Applied)
                | (AdjustmentStatus::Draft, AdjustmentStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: AdjustmentStatus) -> Result<(), ConflictError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(ConflictError::AlreadyApplied {
            adjustment_id: self.id.0.clone(),
            status: self.status,
        })
    }
}

/// Creation payload validated by the lifecycle manager before persisting
/// as a draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentDraft {
    pub name: String,
    pub material: Material,
    pub data_months: Vec<MonthKey>,
    pub communication_month: MonthKey,
    pub effective_month: MonthKey,
    pub formula: String,
    pub old_average_price: Decimal,
    pub new_average_price: Decimal,
}

/// Result summary returned by a successful apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub parts_updated: u32,
    pub total_cost_impact: Decimal,
    pub price_changes_recorded: u32,
}
