use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ValidationError;

/// Raw materials tracked by the commodity index. The set is extensible:
/// adding a variant only requires a row format and a display name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Aluminum,
    Steel,
    StainlessSteel,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aluminum => "aluminum",
            Self::Steel => "steel",
            Self::StainlessSteel => "stainless_steel",
        }
    }

    pub const ALL: [Material; 3] = [Self::Aluminum, Self::Steel, Self::StainlessSteel];
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Material {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "aluminum" => Ok(Self::Aluminum),
            "steel" => Ok(Self::Steel),
            "stainless_steel" => Ok(Self::StainlessSteel),
            other => Err(ValidationError::InvalidIndexEntry {
                field: "material".to_string(),
                reason: format!(
                    "unsupported material `{other}` (expected aluminum|steel|stainless_steel)"
                ),
            }),
        }
    }
}

/// Calendar month at `YYYY-MM` granularity. Index lookups and adjustment
/// timelines never see day-of-month precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidIndexEntry {
                field: "price_month".to_string(),
                reason: format!("month `{month}` out of range 1..=12"),
            });
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month immediately after this one.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// The month immediately before this one.
    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidIndexEntry {
            field: "price_month".to_string(),
            reason: format!("`{value}` is not a YYYY-MM month key"),
        };

        let (year_part, month_part) = value.trim().split_once('-').ok_or_else(invalid)?;
        if year_part.len() != 4 || month_part.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year_part.parse().map_err(|_| invalid())?;
        let month: u32 = month_part.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|error: ValidationError| de::Error::custom(error.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntryId(pub String);

/// One observed commodity price point. Immutable once written; corrections
/// insert a new entry and the latest `recorded_at` per (material, month)
/// wins as the canonical value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialIndexEntry {
    pub id: IndexEntryId,
    pub material: Material,
    pub price_usd_per_mt: Decimal,
    pub price_month: MonthKey,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

/// Payload for appending a new index observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewIndexEntry {
    pub material: Material,
    pub price_usd_per_mt: Decimal,
    pub price_month: MonthKey,
    pub source: String,
}

impl NewIndexEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price_usd_per_mt <= Decimal::ZERO {
            return Err(ValidationError::InvalidIndexEntry {
                field: "price_usd_per_mt".to_string(),
                reason: format!("price must be positive, got {}", self.price_usd_per_mt),
            });
        }
        if self.source.trim().is_empty() {
            return Err(ValidationError::InvalidIndexEntry {
                field: "source".to_string(),
                reason: "index provenance must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{Material, MonthKey, NewIndexEntry};

    #[test]
    fn month_key_round_trips_through_display_and_parse() {
        let key: MonthKey = "2024-06".parse().expect("parse");
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 6);
        assert_eq!(key.to_string(), "2024-06");
    }

    #[test]
    fn month_key_rejects_malformed_input() {
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("2024".parse::<MonthKey>().is_err());
        assert!("24-06".parse::<MonthKey>().is_err());
        assert!("2024-6".parse::<MonthKey>().is_err());
    }

    #[test]
    fn month_key_succ_and_pred_wrap_year_boundaries() {
        let december = MonthKey::new(2023, 12).expect("valid month");
        assert_eq!(december.succ().to_string(), "2024-01");

        let january = MonthKey::new(2024, 1).expect("valid month");
        assert_eq!(january.pred().to_string(), "2023-12");
    }

    #[test]
    fn month_key_orders_chronologically() {
        let earlier = MonthKey::new(2023, 12).expect("valid month");
        let later = MonthKey::new(2024, 1).expect("valid month");
        assert!(earlier < later);
    }

    #[test]
    fn month_key_from_date_truncates_day() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");
        assert_eq!(MonthKey::from_date(date).to_string(), "2024-06");
    }

    #[test]
    fn material_parses_case_insensitively() {
        assert_eq!("Aluminum".parse::<Material>().expect("parse"), Material::Aluminum);
        assert_eq!("stainless_steel".parse::<Material>().expect("parse"), Material::StainlessSteel);
        assert!("copper".parse::<Material>().is_err());
    }

    #[test]
    fn new_entry_rejects_non_positive_price() {
        let entry = NewIndexEntry {
            material: Material::Steel,
            price_usd_per_mt: Decimal::ZERO,
            price_month: MonthKey::new(2024, 3).expect("valid month"),
            source: "LME".to_string(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn new_entry_rejects_blank_source() {
        let entry = NewIndexEntry {
            material: Material::Steel,
            price_usd_per_mt: Decimal::new(280_000, 2),
            price_month: MonthKey::new(2024, 3).expect("valid month"),
            source: "  ".to_string(),
        };
        assert!(entry.validate().is_err());
    }
}
