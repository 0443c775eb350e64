use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use ftzadjust_core::domain::material::Material;
use ftzadjust_core::domain::part::{Part, PartId};

use super::{parse_decimal, parse_material, PartsCatalog, RepositoryError};
use crate::DbPool;

pub struct SqlPartsCatalog {
    pool: DbPool,
}

impl SqlPartsCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_part(row: &sqlx::sqlite::SqliteRow) -> Result<Part, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let part_number: String =
        row.try_get("part_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let material: String =
        row.try_get("material").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let weight: String =
        row.try_get("material_weight_kg").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let standard_value: String =
        row.try_get("standard_value").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Part {
        id: PartId(id),
        part_number,
        material: parse_material(&material)?,
        material_weight_kg: parse_decimal("material_weight_kg", &weight)?,
        standard_value: parse_decimal("standard_value", &standard_value)?,
    })
}

#[async_trait]
impl PartsCatalog for SqlPartsCatalog {
    async fn parts_by_material(&self, material: Material) -> Result<Vec<Part>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, part_number, material, material_weight_kg, standard_value
             FROM part WHERE material = ?
             ORDER BY part_number ASC",
        )
        .bind(material.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_part).collect()
    }

    async fn update_standard_value(
        &self,
        part_id: &PartId,
        new_value: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE part SET standard_value = ?, updated_at = ? WHERE id = ?")
            .bind(new_value.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(&part_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use ftzadjust_core::domain::material::Material;
    use ftzadjust_core::domain::part::PartId;

    use super::SqlPartsCatalog;
    use crate::repositories::PartsCatalog;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_part(
        pool: &sqlx::SqlitePool,
        id: &str,
        material: Material,
        weight: Decimal,
        standard_value: Decimal,
    ) {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO part
                 (id, part_number, material, material_weight_kg, standard_value,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("FTZ-{id}"))
        .bind(material.as_str())
        .bind(weight.to_string())
        .bind(standard_value.to_string())
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .expect("insert part");
    }

    #[tokio::test]
    async fn parts_by_material_filters_and_orders() {
        let pool = setup().await;
        insert_part(&pool, "p1", Material::Aluminum, Decimal::new(25, 1), Decimal::new(4_500, 2))
            .await;
        insert_part(&pool, "p2", Material::Steel, Decimal::new(10, 1), Decimal::new(1_200, 2))
            .await;
        insert_part(&pool, "p3", Material::Aluminum, Decimal::new(5, 1), Decimal::new(900, 2))
            .await;

        let catalog = SqlPartsCatalog::new(pool);
        let aluminum = catalog.parts_by_material(Material::Aluminum).await.expect("query");

        assert_eq!(aluminum.len(), 2);
        assert_eq!(aluminum[0].part_number, "FTZ-p1");
        assert_eq!(aluminum[1].part_number, "FTZ-p3");
    }

    #[tokio::test]
    async fn update_standard_value_touches_only_that_part() {
        let pool = setup().await;
        insert_part(&pool, "p1", Material::Aluminum, Decimal::new(25, 1), Decimal::new(4_500, 2))
            .await;
        insert_part(&pool, "p2", Material::Aluminum, Decimal::new(10, 1), Decimal::new(1_200, 2))
            .await;

        let catalog = SqlPartsCatalog::new(pool);
        catalog
            .update_standard_value(&PartId("p1".to_string()), Decimal::new(45_125, 3))
            .await
            .expect("update");

        let parts = catalog.parts_by_material(Material::Aluminum).await.expect("query");
        let p1 = parts.iter().find(|part| part.id.0 == "p1").expect("p1");
        let p2 = parts.iter().find(|part| part.id.0 == "p2").expect("p2");

        assert_eq!(p1.standard_value, Decimal::new(45_125, 3));
        assert_eq!(p2.standard_value, Decimal::new(1_200, 2));
    }
}
