use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use ftzadjust_core::domain::adjustment::{
    AdjustmentDraft, AdjustmentId, AdjustmentStatus, ApplyOutcome, PricingAdjustment,
};
use ftzadjust_core::domain::material::{Material, MonthKey};
use ftzadjust_core::errors::{ConflictError, EngineError, ValidationError};
use ftzadjust_core::pricing::formula::FormulaRegistry;
use ftzadjust_core::pricing::impact::compute_impact;
use ftzadjust_core::pricing::timeline;

use crate::repositories::parts::row_to_part;
use crate::repositories::{
    AdjustmentRepository, MaterialIndexRepository, SqlAdjustmentRepository,
    SqlMaterialIndexRepository,
};
use crate::DbPool;

/// Owner of the `PricingAdjustment` state machine. Drafts are validated
/// against the live index before persisting; `apply` recomputes the impact
/// against the current catalog inside one transaction and is the only
/// writer of part standard values.
pub struct AdjustmentLifecycle {
    pool: DbPool,
    adjustments: SqlAdjustmentRepository,
    index: SqlMaterialIndexRepository,
    formulas: Arc<FormulaRegistry>,
}

impl AdjustmentLifecycle {
    pub fn new(pool: DbPool, formulas: Arc<FormulaRegistry>) -> Self {
        Self {
            adjustments: SqlAdjustmentRepository::new(pool.clone()),
            index: SqlMaterialIndexRepository::new(pool.clone()),
            pool,
            formulas,
        }
    }

    /// Validate a draft and persist it. The client-computed
    /// `new_average_price` is never trusted: it must reproduce from the
    /// formula over the canonical index prices for the data months.
    pub async fn create(&self, draft: AdjustmentDraft) -> Result<PricingAdjustment, EngineError> {
        if draft.data_months.len() != 3 {
            return Err(ValidationError::InvalidAdjustment {
                field: "data_months".to_string(),
                reason: format!("expected exactly 3 data months, got {}", draft.data_months.len()),
            }
            .into());
        }
        let data_months = [draft.data_months[0], draft.data_months[1], draft.data_months[2]];

        timeline::validate_ordering(
            &data_months,
            draft.communication_month,
            draft.effective_month,
        )?;

        if !self.formulas.contains(&draft.formula) {
            return Err(ValidationError::UnknownFormula { formula_id: draft.formula.clone() }.into());
        }

        if draft.old_average_price <= Decimal::ZERO {
            return Err(ValidationError::InvalidAdjustment {
                field: "old_average_price".to_string(),
                reason: format!("must be positive, got {}", draft.old_average_price),
            }
            .into());
        }

        let expected = self
            .rederive_new_average(draft.material, &data_months, &draft.formula)
            .await?;
        if draft.new_average_price != expected {
            return Err(ValidationError::InvalidAdjustment {
                field: "new_average_price".to_string(),
                reason: format!(
                    "not reproducible from formula `{}`: expected {expected}, got {}",
                    draft.formula, draft.new_average_price
                ),
            }
            .into());
        }

        let adjustment = self.adjustments.insert_draft(&draft).await?;
        info!(
            event_name = "pricing.adjustment.drafted",
            adjustment_id = %adjustment.id.0,
            material = %adjustment.material,
            formula = %adjustment.formula,
            "pricing adjustment draft created"
        );
        Ok(adjustment)
    }

    /// Commit a draft adjustment: flip the status, recompute the impact
    /// against the current part catalog, update standard values, and write
    /// one price-history record per affected part. All-or-nothing.
    pub async fn apply(&self, id: &AdjustmentId) -> Result<ApplyOutcome, EngineError> {
        let adjustment = self
            .adjustments
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound { adjustment_id: id.0.clone() })?;

        if adjustment.status != AdjustmentStatus::Draft {
            return Err(ConflictError::AlreadyApplied {
                adjustment_id: id.0.clone(),
                status: adjustment.status,
            }
            .into());
        }

        // The draft was validated at create time; if the index has been
        // corrected since, the stored average no longer reproduces and the
        // draft must be recreated, not silently applied.
        let expected = self
            .rederive_new_average(adjustment.material, &adjustment.data_months, &adjustment.formula)
            .await
            .map_err(|error| match error {
                EngineError::Validation(inner) => EngineError::Conflict(
                    ConflictError::StaleAdjustment {
                        adjustment_id: id.0.clone(),
                        reason: inner.to_string(),
                    },
                ),
                other => other,
            })?;
        if expected != adjustment.new_average_price {
            return Err(ConflictError::StaleAdjustment {
                adjustment_id: id.0.clone(),
                reason: format!(
                    "index has been corrected: formula `{}` now yields {expected}, draft holds {}",
                    adjustment.formula, adjustment.new_average_price
                ),
            }
            .into());
        }

        let applied_at = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

        let outcome = match Self::apply_in_tx(&mut tx, &adjustment, applied_at).await {
            Ok(outcome) => outcome,
            Err(error) => {
                // Explicit for clarity; dropping the transaction rolls back
                // just the same.
                let _ = tx.rollback().await;
                return Err(error);
            }
        };

        tx.commit()
            .await
            .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

        info!(
            event_name = "pricing.adjustment.applied",
            adjustment_id = %id.0,
            parts_updated = outcome.parts_updated,
            total_cost_impact = %outcome.total_cost_impact,
            "pricing adjustment applied"
        );
        Ok(outcome)
    }

    async fn apply_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        adjustment: &PricingAdjustment,
        applied_at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, EngineError> {
        // The guarded flip is the concurrency gate: of two racing applies,
        // exactly one sees a draft row here.
        let flipped = sqlx::query(
            "UPDATE pricing_adjustment
             SET status = 'applied', applied_at = ?, updated_at = ?
             WHERE id = ? AND status = 'draft'",
        )
        .bind(applied_at.to_rfc3339())
        .bind(applied_at.to_rfc3339())
        .bind(&adjustment.id.0)
        .execute(&mut **tx)
        .await
        .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

        if flipped.rows_affected() == 0 {
            let status_raw: Option<String> =
                sqlx::query_scalar("SELECT status FROM pricing_adjustment WHERE id = ?")
                    .bind(&adjustment.id.0)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(|error| EngineError::Persistence(error.to_string()))?;

            return Err(match status_raw {
                Some(raw) => match raw.parse::<AdjustmentStatus>() {
                    Ok(status) => ConflictError::AlreadyApplied {
                        adjustment_id: adjustment.id.0.clone(),
                        status,
                    }
                    .into(),
                    Err(_) => {
                        EngineError::Persistence(format!("unknown adjustment status `{raw}`"))
                    }
                },
                None => EngineError::NotFound { adjustment_id: adjustment.id.0.clone() },
            });
        }

        // Fresh read inside the transaction: part weights and values may
        // have changed since the draft preview.
        let rows = sqlx::query(
            "SELECT id, part_number, material, material_weight_kg, standard_value
             FROM part WHERE material = ?
             ORDER BY part_number ASC",
        )
        .bind(adjustment.material.as_str())
        .fetch_all(&mut **tx)
        .await
        .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

        let parts = rows
            .iter()
            .map(row_to_part)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

        let report = compute_impact(
            &parts,
            adjustment.old_average_price,
            adjustment.new_average_price,
        );

        for impact in &report.parts {
            sqlx::query("UPDATE part SET standard_value = ?, updated_at = ? WHERE id = ?")
                .bind(impact.new_standard_value.to_string())
                .bind(applied_at.to_rfc3339())
                .bind(&impact.part_id.0)
                .execute(&mut **tx)
                .await
                .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

            sqlx::query(
                "INSERT INTO part_price_history
                     (id, adjustment_id, part_id, old_standard_value, new_standard_value,
                      price_impact, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&adjustment.id.0)
            .bind(&impact.part_id.0)
            .bind(impact.old_standard_value.to_string())
            .bind(impact.new_standard_value.to_string())
            .bind(impact.price_impact_per_part.to_string())
            .bind(applied_at.to_rfc3339())
            .execute(&mut **tx)
            .await
            .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;
        }

        // Freeze the snapshot figures from the just-computed report.
        sqlx::query(
            "UPDATE pricing_adjustment SET parts_affected = ?, total_cost_impact = ? WHERE id = ?",
        )
        .bind(i64::from(report.parts_affected))
        .bind(report.total_cost_impact.to_string())
        .bind(&adjustment.id.0)
        .execute(&mut **tx)
        .await
        .map_err(|error| EngineError::ApplyFailed { reason: error.to_string() })?;

        Ok(ApplyOutcome {
            parts_updated: report.parts_affected,
            total_cost_impact: report.total_cost_impact,
            price_changes_recorded: report.parts_affected,
        })
    }

    /// Abandon a draft. No catalog mutation occurs on this path.
    pub async fn cancel(&self, id: &AdjustmentId) -> Result<PricingAdjustment, EngineError> {
        let changed = sqlx::query(
            "UPDATE pricing_adjustment
             SET status = 'cancelled', updated_at = ?
             WHERE id = ? AND status = 'draft'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(|error| EngineError::Persistence(error.to_string()))?;

        if changed.rows_affected() == 0 {
            let existing = self.adjustments.find_by_id(id).await?;
            return Err(match existing {
                Some(adjustment) => ConflictError::AlreadyApplied {
                    adjustment_id: id.0.clone(),
                    status: adjustment.status,
                }
                .into(),
                None => EngineError::NotFound { adjustment_id: id.0.clone() },
            });
        }

        let cancelled = self
            .adjustments
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound { adjustment_id: id.0.clone() })?;

        info!(
            event_name = "pricing.adjustment.cancelled",
            adjustment_id = %id.0,
            "pricing adjustment cancelled"
        );
        Ok(cancelled)
    }

    async fn rederive_new_average(
        &self,
        material: Material,
        data_months: &[MonthKey; 3],
        formula: &str,
    ) -> Result<Decimal, EngineError> {
        let mut prices = Vec::with_capacity(data_months.len());
        for month in data_months {
            let entry = self.index.latest_for_month(material, *month).await?.ok_or_else(|| {
                ValidationError::InvalidAdjustment {
                    field: "data_months".to_string(),
                    reason: format!("no index entry for {material} in {month}"),
                }
            })?;
            prices.push(entry.price_usd_per_mt);
        }

        let output = self.formulas.calculate(formula, &prices)?;
        Ok(output.result)
    }
}
