use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use ftzadjust_core::domain::adjustment::{
    AdjustmentDraft, AdjustmentId, AdjustmentStatus, PricingAdjustment,
};
use ftzadjust_core::domain::material::{Material, MonthKey};

use super::{
    parse_datetime, parse_decimal, parse_material, parse_month, AdjustmentRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlAdjustmentRepository {
    pool: DbPool,
}

impl SqlAdjustmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, name, material, data_month_1, data_month_2, data_month_3,
       communication_month, effective_month, formula, old_average_price,
       new_average_price, status, parts_affected, total_cost_impact,
       created_at, updated_at, applied_at";

pub(crate) fn row_to_adjustment(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PricingAdjustment, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let material: String =
        row.try_get("material").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let month_1: String =
        row.try_get("data_month_1").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let month_2: String =
        row.try_get("data_month_2").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let month_3: String =
        row.try_get("data_month_3").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let communication_month: String =
        row.try_get("communication_month").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let effective_month: String =
        row.try_get("effective_month").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let formula: String =
        row.try_get("formula").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let old_average_price: String =
        row.try_get("old_average_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let new_average_price: String =
        row.try_get("new_average_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let parts_affected: Option<i64> =
        row.try_get("parts_affected").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_cost_impact: Option<String> =
        row.try_get("total_cost_impact").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let applied_at: Option<String> =
        row.try_get("applied_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status: AdjustmentStatus = status
        .parse()
        .map_err(|_| RepositoryError::Decode(format!("unknown adjustment status `{status}`")))?;

    let parts_affected = match parts_affected {
        Some(raw) => Some(u32::try_from(raw).map_err(|_| {
            RepositoryError::Decode(format!("parts_affected `{raw}` does not fit in u32"))
        })?),
        None => None,
    };

    let total_cost_impact = total_cost_impact
        .as_deref()
        .map(|raw| parse_decimal("total_cost_impact", raw))
        .transpose()?;

    let applied_at =
        applied_at.as_deref().map(|raw| parse_datetime("applied_at", raw)).transpose()?;

    Ok(PricingAdjustment {
        id: AdjustmentId(id),
        name,
        material: parse_material(&material)?,
        data_months: [
            parse_month("data_month_1", &month_1)?,
            parse_month("data_month_2", &month_2)?,
            parse_month("data_month_3", &month_3)?,
        ],
        communication_month: parse_month("communication_month", &communication_month)?,
        effective_month: parse_month("effective_month", &effective_month)?,
        formula,
        old_average_price: parse_decimal("old_average_price", &old_average_price)?,
        new_average_price: parse_decimal("new_average_price", &new_average_price)?,
        status,
        parts_affected,
        total_cost_impact,
        created_at: parse_datetime("created_at", &created_at)?,
        updated_at: parse_datetime("updated_at", &updated_at)?,
        applied_at,
    })
}

#[async_trait]
impl AdjustmentRepository for SqlAdjustmentRepository {
    async fn insert_draft(
        &self,
        draft: &AdjustmentDraft,
    ) -> Result<PricingAdjustment, RepositoryError> {
        if draft.data_months.len() != 3 {
            return Err(RepositoryError::Decode(format!(
                "expected 3 data months, got {}",
                draft.data_months.len()
            )));
        }

        let now = Utc::now();
        let data_months: [MonthKey; 3] = [
            draft.data_months[0],
            draft.data_months[1],
            draft.data_months[2],
        ];
        let adjustment = PricingAdjustment {
            id: AdjustmentId(Uuid::new_v4().to_string()),
            name: draft.name.clone(),
            material: draft.material,
            data_months,
            communication_month: draft.communication_month,
            effective_month: draft.effective_month,
            formula: draft.formula.clone(),
            old_average_price: draft.old_average_price,
            new_average_price: draft.new_average_price,
            status: AdjustmentStatus::Draft,
            parts_affected: None,
            total_cost_impact: None,
            created_at: now,
            updated_at: now,
            applied_at: None,
        };

        sqlx::query(
            "INSERT INTO pricing_adjustment
                 (id, name, material, data_month_1, data_month_2, data_month_3,
                  communication_month, effective_month, formula, old_average_price,
                  new_average_price, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&adjustment.id.0)
        .bind(&adjustment.name)
        .bind(adjustment.material.as_str())
        .bind(adjustment.data_months[0].to_string())
        .bind(adjustment.data_months[1].to_string())
        .bind(adjustment.data_months[2].to_string())
        .bind(adjustment.communication_month.to_string())
        .bind(adjustment.effective_month.to_string())
        .bind(&adjustment.formula)
        .bind(adjustment.old_average_price.to_string())
        .bind(adjustment.new_average_price.to_string())
        .bind(adjustment.status.as_str())
        .bind(adjustment.created_at.to_rfc3339())
        .bind(adjustment.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(adjustment)
    }

    async fn find_by_id(
        &self,
        id: &AdjustmentId,
    ) -> Result<Option<PricingAdjustment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM pricing_adjustment WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_adjustment(r)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        status: Option<AdjustmentStatus>,
        material: Option<Material>,
    ) -> Result<Vec<PricingAdjustment>, RepositoryError> {
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {SELECT_COLUMNS} FROM pricing_adjustment WHERE 1 = 1"
        ));
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(material) = material {
            builder.push(" AND material = ").push_bind(material.as_str());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_adjustment).collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use ftzadjust_core::domain::adjustment::{AdjustmentDraft, AdjustmentStatus};
    use ftzadjust_core::domain::material::{Material, MonthKey};

    use super::SqlAdjustmentRepository;
    use crate::repositories::AdjustmentRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn month(spec: &str) -> MonthKey {
        spec.parse().expect("valid month key")
    }

    fn draft(name: &str, material: Material) -> AdjustmentDraft {
        AdjustmentDraft {
            name: name.to_string(),
            material,
            data_months: vec![month("2024-03"), month("2024-04"), month("2024-05")],
            communication_month: month("2024-06"),
            effective_month: month("2024-07"),
            formula: "simple_average".to_string(),
            old_average_price: Decimal::new(280_000, 2),
            new_average_price: Decimal::new(285_000, 2),
        }
    }

    #[tokio::test]
    async fn insert_draft_and_find_by_id() {
        let pool = setup().await;
        let repo = SqlAdjustmentRepository::new(pool);

        let created = repo.insert_draft(&draft("Q3 aluminum", Material::Aluminum)).await.expect("insert");
        assert_eq!(created.status, AdjustmentStatus::Draft);
        assert!(created.parts_affected.is_none());

        let found = repo.find_by_id(&created.id).await.expect("find").expect("exists");
        assert_eq!(found.name, "Q3 aluminum");
        assert_eq!(found.material, Material::Aluminum);
        assert_eq!(found.data_months[0].to_string(), "2024-03");
        assert_eq!(found.new_average_price, Decimal::new(285_000, 2));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_material() {
        let pool = setup().await;
        let repo = SqlAdjustmentRepository::new(pool.clone());

        let aluminum = repo.insert_draft(&draft("aluminum", Material::Aluminum)).await.expect("insert");
        repo.insert_draft(&draft("steel", Material::Steel)).await.expect("insert");

        sqlx::query("UPDATE pricing_adjustment SET status = 'applied' WHERE id = ?")
            .bind(&aluminum.id.0)
            .execute(&pool)
            .await
            .expect("mark applied");

        let drafts = repo.list(Some(AdjustmentStatus::Draft), None).await.expect("list drafts");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "steel");

        let aluminum_only =
            repo.list(None, Some(Material::Aluminum)).await.expect("list aluminum");
        assert_eq!(aluminum_only.len(), 1);
        assert_eq!(aluminum_only[0].name, "aluminum");

        let all = repo.list(None, None).await.expect("list all");
        assert_eq!(all.len(), 2);
    }
}
