//! Local Projection Store.
//!
//! User-entered "no/low risk" and "high risk" quantities keyed by
//! (so_number, part_number, risk_type). The MRP engine reads these; only the
//! scheduling endpoint writes them. Rows survive runs; missing rows imply a
//! quantity of zero and are never auto-created.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Index;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, Schema, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::entities::schedule_projection::{self, Entity as ScheduleProjection};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RiskType {
    NoLowRisk,
    HighRisk,
}

impl RiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::NoLowRisk => "NoLowRisk",
            RiskType::HighRisk => "HighRisk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NoLowRisk" => Some(RiskType::NoLowRisk),
            "HighRisk" => Some(RiskType::HighRisk),
            _ => None,
        }
    }
}

/// One stored projection row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProjection {
    pub so_number: String,
    pub part_number: String,
    pub risk_type: RiskType,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

pub struct ProjectionStore {
    db: Arc<DatabaseConnection>,
}

impl ProjectionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates the projections table and its natural-key index if absent.
    /// Safe to call on every startup.
    pub async fn ensure_schema(&self) -> Result<(), ServiceError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(ScheduleProjection);
        table.if_not_exists();
        self.db
            .execute(backend.build(&table))
            .await
            .map_err(ServiceError::local_store)?;

        let mut index = Index::create();
        index
            .name("uq_schedule_projections_key")
            .table(ScheduleProjection)
            .col(schedule_projection::Column::SoNumber)
            .col(schedule_projection::Column::PartNumber)
            .col(schedule_projection::Column::RiskType)
            .unique()
            .if_not_exists();
        self.db
            .execute(backend.build(&index))
            .await
            .map_err(ServiceError::local_store)?;

        info!("projection store schema ensured");
        Ok(())
    }

    /// Bulk read for the given SO set.
    #[instrument(skip(self, so_numbers), fields(so_count = so_numbers.len()))]
    pub async fn read_for_so_numbers(
        &self,
        so_numbers: &[String],
    ) -> Result<Vec<UserProjection>, ServiceError> {
        if so_numbers.is_empty() {
            return Ok(Vec::new());
        }
        let models = ScheduleProjection::find()
            .filter(schedule_projection::Column::SoNumber.is_in(so_numbers.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::local_store)?;

        let mut projections = Vec::with_capacity(models.len());
        for model in models {
            let Some(risk_type) = RiskType::parse(&model.risk_type) else {
                warn!(
                    so_number = %model.so_number,
                    part_number = %model.part_number,
                    risk_type = %model.risk_type,
                    "skipping projection row with unknown risk type"
                );
                continue;
            };
            projections.push(UserProjection {
                so_number: model.so_number,
                part_number: model.part_number,
                risk_type,
                quantity: model.quantity,
                updated_at: model.updated_at,
                updated_by: model.updated_by,
            });
        }
        Ok(projections)
    }

    /// Inserts or updates the row for the natural key. Idempotent on an
    /// identical payload: the quantity is unchanged, `updated_at` refreshes.
    /// The transaction serializes concurrent writers on the key.
    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        so_number: &str,
        part_number: &str,
        risk_type: RiskType,
        quantity: Decimal,
        actor: &str,
    ) -> Result<UserProjection, ServiceError> {
        if quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "projection quantity must not be negative".into(),
            ));
        }
        if so_number.trim().is_empty() || part_number.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "so_number and part_number are required".into(),
            ));
        }

        let now = Utc::now();
        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::local_store)?;

        let existing = ScheduleProjection::find()
            .filter(schedule_projection::Column::SoNumber.eq(so_number))
            .filter(schedule_projection::Column::PartNumber.eq(part_number))
            .filter(schedule_projection::Column::RiskType.eq(risk_type.as_str()))
            .one(&txn)
            .await
            .map_err(ServiceError::local_store)?;

        match existing {
            Some(model) => {
                let mut active = model.into_active_model();
                active.quantity = Set(quantity);
                active.updated_by = Set(actor.to_string());
                active.updated_at = Set(now);
                active
                    .update(&txn)
                    .await
                    .map_err(ServiceError::local_store)?;
            }
            None => {
                let active = schedule_projection::ActiveModel {
                    so_number: Set(so_number.to_string()),
                    part_number: Set(part_number.to_string()),
                    risk_type: Set(risk_type.as_str().to_string()),
                    quantity: Set(quantity),
                    updated_by: Set(actor.to_string()),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active
                    .insert(&txn)
                    .await
                    .map_err(ServiceError::local_store)?;
            }
        }

        txn.commit().await.map_err(ServiceError::local_store)?;

        Ok(UserProjection {
            so_number: so_number.to_string(),
            part_number: part_number.to_string(),
            risk_type,
            quantity,
            updated_at: now,
            updated_by: actor.to_string(),
        })
    }
}
