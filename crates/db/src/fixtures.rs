use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical demo seeds and verification contract per material.
const SEED_MATERIALS: &[SeedMaterialContract] = &[
    SeedMaterialContract {
        material: "aluminum",
        expected_index_entries: 6,
        expected_parts: 3,
        description: "Six months of SHSPI observations and three demo parts",
    },
    SeedMaterialContract {
        material: "steel",
        expected_index_entries: 3,
        expected_parts: 2,
        description: "One quarter of LME observations and two demo parts",
    },
    SeedMaterialContract {
        material: "stainless_steel",
        expected_index_entries: 3,
        expected_parts: 1,
        description: "One quarter of LME observations and one demo part",
    },
];

const SEED_ADJUSTMENT_ID: &str = "adj-demo-001";

const SEED_INDEX_ENTRY_IDS: &[&str] = &[
    "idx-al-2024-01",
    "idx-al-2024-02",
    "idx-al-2024-03",
    "idx-al-2024-04",
    "idx-al-2024-05",
    "idx-al-2024-06",
    "idx-st-2024-03",
    "idx-st-2024-04",
    "idx-st-2024-05",
    "idx-ss-2024-03",
    "idx-ss-2024-04",
    "idx-ss-2024-05",
];

const SEED_PART_IDS: &[&str] = &[
    "part-demo-001",
    "part-demo-002",
    "part-demo-003",
    "part-demo-004",
    "part-demo-005",
    "part-demo-006",
];

/// Deterministic demo dataset for local development and walkthroughs.
///
/// Seeds an index history for all three materials, a small parts
/// catalog, and one draft adjustment that is ready to apply.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset into the database. Idempotent: reloading
    /// restores the seeded rows to their canonical state.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let materials_seeded = SEED_MATERIALS
            .iter()
            .map(|contract| MaterialSeedInfo {
                material: contract.material,
                description: contract.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { materials_seeded })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_MATERIALS {
            let index_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM material_index_entry WHERE material = ?1",
            )
            .bind(contract.material)
            .fetch_one(pool)
            .await?;
            checks.push((contract.index_label(), index_count >= contract.expected_index_entries));

            let part_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM part WHERE material = ?1")
                .bind(contract.material)
                .fetch_one(pool)
                .await?;
            checks.push((contract.parts_label(), part_count >= contract.expected_parts));
        }

        let draft_exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pricing_adjustment WHERE id = ?1)",
        )
        .bind(SEED_ADJUSTMENT_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("demo-adjustment", draft_exists == 1));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Clean up seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_entries = sql_array_from_ids(SEED_INDEX_ENTRY_IDS);
        let quoted_parts = sql_array_from_ids(SEED_PART_IDS);

        sqlx::query("DELETE FROM part_price_history WHERE adjustment_id = ?1")
            .bind(SEED_ADJUSTMENT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pricing_adjustment WHERE id = ?1")
            .bind(SEED_ADJUSTMENT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM material_index_entry WHERE id IN {quoted_entries}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM part WHERE id IN {quoted_parts}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedMaterialContract {
    material: &'static str,
    expected_index_entries: i64,
    expected_parts: i64,
    description: &'static str,
}

impl SeedMaterialContract {
    fn index_label(&self) -> &'static str {
        match self.material {
            "aluminum" => "aluminum-index-entries",
            "steel" => "steel-index-entries",
            _ => "stainless-index-entries",
        }
    }

    fn parts_label(&self) -> &'static str {
        match self.material {
            "aluminum" => "aluminum-parts",
            "steel" => "steel-parts",
            _ => "stainless-parts",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub materials_seeded: Vec<MaterialSeedInfo>,
}

#[derive(Debug)]
pub struct MaterialSeedInfo {
    pub material: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present);
        assert_eq!(first.materials_seeded.len(), 3);

        let second = DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoSeedDataset::verify(&pool).await.expect("re-verify");
        assert!(second_verification.all_present);
        assert_eq!(second.materials_seeded.len(), 3);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn seeded_draft_is_reproducible_and_applies() {
        use std::sync::Arc;

        use ftzadjust_core::domain::adjustment::AdjustmentId;
        use ftzadjust_core::pricing::formula::FormulaRegistry;

        use crate::lifecycle::AdjustmentLifecycle;

        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        let lifecycle =
            AdjustmentLifecycle::new(pool.clone(), Arc::new(FormulaRegistry::with_builtins()));
        let outcome = lifecycle
            .apply(&AdjustmentId("adj-demo-001".to_string()))
            .await
            .expect("seeded draft should apply cleanly");

        // Two aluminum parts carry weight; the third is zero-weight.
        assert_eq!(outcome.parts_updated, 2);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        DemoSeedDataset::clean(&pool).await.expect("clean seed fixtures");

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM material_index_entry")
            .fetch_one(&pool)
            .await
            .expect("count index entries");
        assert_eq!(remaining, 0);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
    }
}
