use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, MySqlPool};
use utoipa::ToSchema;

/// Entry of the `AutospaPricing` price list.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ServicePrice {
    pub id: i64,
    #[schema(example = "Full Detail")]
    pub service: String,
    #[schema(value_type = String, example = "249.99")]
    pub cost: Decimal,
}

/// A pre-approved purchase-order line.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PurchaseOrder {
    #[schema(example = "PO-7781")]
    pub po: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_in: Option<NaiveDateTime>,
    pub service: Option<String>,
    pub status: Option<String>,
}

impl ServicePrice {
    /// Full price list ordered by service name.
    pub async fn list(pool: &MySqlPool) -> Result<Vec<ServicePrice>, sqlx::Error> {
        sqlx::query_as::<_, ServicePrice>(
            "SELECT id, service, cost FROM AutospaPricing ORDER BY service",
        )
        .fetch_all(pool)
        .await
    }
}
