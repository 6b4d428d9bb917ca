use axum::extract::{Json, Query, State};
use told_core::error::AppError;

use crate::dtos::varesatser::{VaresatserQuery, VaresatserResponse};
use crate::AppState;

/// Tariff table in force on a date, with its selector options and rates.
pub async fn varesatser(
    State(state): State<AppState>,
    Query(query): Query<VaresatserQuery>,
) -> Result<Json<VaresatserResponse>, AppError> {
    let catalog = state.engine.catalog();
    let table = catalog
        .select_table(query.dato)
        .map_err(|e| AppError::NotFound(e.into()))?;

    tracing::debug!(table = table.id, dato = %query.dato, "Tariff table resolved");

    Ok(Json(VaresatserResponse {
        afgiftstabel: table.clone(),
        valgmuligheder: catalog.rate_options(table.id),
        varesatser: catalog.rates_by_code(table.id).into_values().cloned().collect(),
    }))
}
