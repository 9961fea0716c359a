use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A row of `test_db`. Several rows may share a stock number; the highest
/// `id` is the current one.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Unit {
    #[schema(example = 42)]
    pub id: i64,
    #[schema(example = "A1234")]
    pub stock_number: String,
    #[schema(example = "1HGCM82633A004352", nullable = true)]
    pub vin: Option<String>,
    #[schema(example = 2021, nullable = true)]
    pub year: Option<i32>,
    #[schema(example = "Honda", nullable = true)]
    pub make: Option<String>,
    #[schema(example = "Accord", nullable = true)]
    pub model: Option<String>,
    #[schema(example = "Detail", nullable = true)]
    pub location: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_in: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub promise_date: Option<NaiveDate>,
    #[schema(nullable = true)]
    pub access2: Option<String>,
}

/// Dashboard list entry with its location colour resolved.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UnitListRow {
    pub id: i64,
    pub stock_number: String,
    pub vin: Option<String>,
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub location: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_in: Option<NaiveDateTime>,
    /// `#rrggbb` / `#rgb`, or null when the stored colour is unusable.
    #[schema(example = "#3B82F6", nullable = true)]
    pub location_color: Option<String>,
    #[sqlx(skip)]
    #[schema(example = "#FFFFFF")]
    pub text_color: String,
}

/// Latest `unitInventory` checklist. `*_in` fields are set at stock-in,
/// `*_out` at check-out.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct InventoryChecklist {
    pub stock_number: String,
    pub locking_nuts_in: i32,
    pub manuals_in: i32,
    pub jacks_in: i32,
    pub tunneau_cover_in: i32,
    pub floor_mats_in: i32,
    pub cargo_mats_in: i32,
    pub block_heater_cord_in: i32,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub changed: Option<NaiveDateTime>,
    pub locking_nuts_out: Option<i32>,
    pub manuals_out: Option<i32>,
    pub jacks_out: Option<i32>,
    pub tunneau_cover_out: Option<i32>,
    pub floor_mats_out: Option<i32>,
    pub cargo_mats_out: Option<i32>,
    pub block_heater_cord_out: Option<i32>,
    pub check_out: Option<i32>,
}

impl InventoryChecklist {
    pub fn checkout_complete(&self) -> bool {
        self.check_out == Some(1)
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LocationCount {
    #[schema(nullable = true)]
    pub location: Option<String>,
    pub count: i64,
}
