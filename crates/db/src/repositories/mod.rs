use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use ftzadjust_core::domain::adjustment::{AdjustmentDraft, AdjustmentId, AdjustmentStatus, PricingAdjustment};
use ftzadjust_core::domain::material::{Material, MaterialIndexEntry, MonthKey, NewIndexEntry};
use ftzadjust_core::domain::part::{Part, PartId};
use ftzadjust_core::errors::EngineError;

pub mod adjustment;
pub mod material_index;
pub mod parts;

pub use adjustment::SqlAdjustmentRepository;
pub use material_index::SqlMaterialIndexRepository;
pub use parts::SqlPartsCatalog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for EngineError {
    fn from(value: RepositoryError) -> Self {
        EngineError::Persistence(value.to_string())
    }
}

/// Append-only ledger of monthly commodity prices.
#[async_trait]
pub trait MaterialIndexRepository: Send + Sync {
    async fn insert(&self, entry: NewIndexEntry) -> Result<MaterialIndexEntry, RepositoryError>;

    async fn insert_batch(
        &self,
        entries: Vec<NewIndexEntry>,
    ) -> Result<Vec<MaterialIndexEntry>, RepositoryError>;

    async fn list(
        &self,
        material: Option<Material>,
        from: Option<MonthKey>,
        to: Option<MonthKey>,
    ) -> Result<Vec<MaterialIndexEntry>, RepositoryError>;

    /// Canonical entry for a (material, month): the latest recorded
    /// observation wins, so corrections supersede without overwriting.
    async fn latest_for_month(
        &self,
        material: Material,
        month: MonthKey,
    ) -> Result<Option<MaterialIndexEntry>, RepositoryError>;
}

#[async_trait]
pub trait AdjustmentRepository: Send + Sync {
    async fn insert_draft(
        &self,
        draft: &AdjustmentDraft,
    ) -> Result<PricingAdjustment, RepositoryError>;

    async fn find_by_id(
        &self,
        id: &AdjustmentId,
    ) -> Result<Option<PricingAdjustment>, RepositoryError>;

    async fn list(
        &self,
        status: Option<AdjustmentStatus>,
        material: Option<Material>,
    ) -> Result<Vec<PricingAdjustment>, RepositoryError>;
}

/// Collaborator interface onto the parts catalog. `apply()` performs its
/// reads and writes inside its own transaction; this trait serves the
/// non-transactional paths (previews, fixtures, listings).
#[async_trait]
pub trait PartsCatalog: Send + Sync {
    async fn parts_by_material(&self, material: Material) -> Result<Vec<Part>, RepositoryError>;

    async fn update_standard_value(
        &self,
        part_id: &PartId,
        new_value: Decimal,
    ) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("{field} `{raw}`: {error}")))
}

pub(crate) fn parse_datetime(field: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field} `{raw}`: {error}")))
}

pub(crate) fn parse_month(field: &str, raw: &str) -> Result<MonthKey, RepositoryError> {
    raw.parse().map_err(|error| RepositoryError::Decode(format!("{field} `{raw}`: {error}")))
}

pub(crate) fn parse_material(raw: &str) -> Result<Material, RepositoryError> {
    raw.parse().map_err(|error| RepositoryError::Decode(format!("material `{raw}`: {error}")))
}
