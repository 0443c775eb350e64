use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use ftzadjust_core::domain::material::{
    IndexEntryId, Material, MaterialIndexEntry, MonthKey, NewIndexEntry,
};

use super::{
    parse_datetime, parse_decimal, parse_material, parse_month, MaterialIndexRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlMaterialIndexRepository {
    pool: DbPool,
}

impl SqlMaterialIndexRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<MaterialIndexEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let material: String =
        row.try_get("material").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_month: String =
        row.try_get("price_month").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String =
        row.try_get("price_usd_per_mt").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source: String =
        row.try_get("source").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recorded_at: String =
        row.try_get("recorded_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(MaterialIndexEntry {
        id: IndexEntryId(id),
        material: parse_material(&material)?,
        price_usd_per_mt: parse_decimal("price_usd_per_mt", &price)?,
        price_month: parse_month("price_month", &price_month)?,
        source,
        recorded_at: parse_datetime("recorded_at", &recorded_at)?,
    })
}

#[async_trait]
impl MaterialIndexRepository for SqlMaterialIndexRepository {
    async fn insert(&self, entry: NewIndexEntry) -> Result<MaterialIndexEntry, RepositoryError> {
        let persisted = MaterialIndexEntry {
            id: IndexEntryId(Uuid::new_v4().to_string()),
            material: entry.material,
            price_usd_per_mt: entry.price_usd_per_mt,
            price_month: entry.price_month,
            source: entry.source,
            recorded_at: Utc::now(),
        };

        // Append-only: plain INSERT, corrections add rows rather than
        // overwrite.
        sqlx::query(
            "INSERT INTO material_index_entry
                 (id, material, price_month, price_usd_per_mt, source, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&persisted.id.0)
        .bind(persisted.material.as_str())
        .bind(persisted.price_month.to_string())
        .bind(persisted.price_usd_per_mt.to_string())
        .bind(&persisted.source)
        .bind(persisted.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(persisted)
    }

    async fn insert_batch(
        &self,
        entries: Vec<NewIndexEntry>,
    ) -> Result<Vec<MaterialIndexEntry>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut persisted = Vec::with_capacity(entries.len());

        for entry in entries {
            let record = MaterialIndexEntry {
                id: IndexEntryId(Uuid::new_v4().to_string()),
                material: entry.material,
                price_usd_per_mt: entry.price_usd_per_mt,
                price_month: entry.price_month,
                source: entry.source,
                recorded_at: Utc::now(),
            };

            sqlx::query(
                "INSERT INTO material_index_entry
                     (id, material, price_month, price_usd_per_mt, source, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id.0)
            .bind(record.material.as_str())
            .bind(record.price_month.to_string())
            .bind(record.price_usd_per_mt.to_string())
            .bind(&record.source)
            .bind(record.recorded_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            persisted.push(record);
        }

        tx.commit().await?;
        Ok(persisted)
    }

    async fn list(
        &self,
        material: Option<Material>,
        from: Option<MonthKey>,
        to: Option<MonthKey>,
    ) -> Result<Vec<MaterialIndexEntry>, RepositoryError> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT id, material, price_month, price_usd_per_mt, source, recorded_at
             FROM material_index_entry WHERE 1 = 1",
        );
        if let Some(material) = material {
            builder.push(" AND material = ").push_bind(material.as_str());
        }
        if let Some(from) = from {
            builder.push(" AND price_month >= ").push_bind(from.to_string());
        }
        if let Some(to) = to {
            builder.push(" AND price_month <= ").push_bind(to.to_string());
        }
        builder.push(" ORDER BY price_month ASC, recorded_at ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn latest_for_month(
        &self,
        material: Material,
        month: MonthKey,
    ) -> Result<Option<MaterialIndexEntry>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, material, price_month, price_usd_per_mt, source, recorded_at
             FROM material_index_entry
             WHERE material = ? AND price_month = ?
             ORDER BY recorded_at DESC, id DESC
             LIMIT 1",
        )
        .bind(material.as_str())
        .bind(month.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }
}
