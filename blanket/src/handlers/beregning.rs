//! Server-side duty calculation for a whole declaration.

use axum::extract::{Json, State};
use told_core::error::AppError;
use validator::Validate;

use crate::dtos::beregning::{BeregningRequest, BeregningResponse, LineResult};
use crate::models::{LineItem, TableId};
use crate::services::metrics::CALCULATIONS_TOTAL;
use crate::services::tariff::{LineDerived, TariffCatalog};
use crate::services::validation::{validate_import_permit, validate_line, FieldError};
use crate::AppState;

#[tracing::instrument(skip_all)]
pub async fn beregning(
    State(state): State<AppState>,
    Json(payload): Json<BeregningRequest>,
) -> Result<Json<BeregningResponse>, AppError> {
    payload.validate()?;

    let catalog = state.engine.catalog();
    let table = match payload.indleveringsdato {
        Some(date) => match catalog.select_table(date) {
            Ok(table) => Some(table.id),
            Err(e) => {
                CALCULATIONS_TOTAL.with_label_values(&["no_table"]).inc();
                return Err(AppError::Unprocessable(e.into()));
            }
        },
        None => None,
    };

    let lines: Vec<LineItem> = payload
        .varelinjer
        .into_iter()
        .map(|line| move_to_table(catalog, line, table))
        .collect();
    let derived: Vec<LineDerived> = lines.iter().map(|line| state.engine.derive_line(line)).collect();

    let mut errors: Vec<FieldError> = lines
        .iter()
        .enumerate()
        .flat_map(|(index, line)| validate_line(catalog, index, line))
        .collect();
    errors.extend(validate_import_permit(
        catalog,
        payload.import_permit.as_deref(),
        &lines,
    ));

    let totals = state.engine.totals(&derived);
    let outcome = if errors.is_empty() { "ok" } else { "invalid" };
    CALCULATIONS_TOTAL.with_label_values(&[outcome]).inc();
    tracing::info!(
        lines = lines.len(),
        table = ?table,
        errors = errors.len(),
        total = %totals.grand_total,
        "Declaration calculated"
    );

    Ok(Json(BeregningResponse {
        afgiftstabel: table,
        varelinjer: lines
            .iter()
            .zip(&derived)
            .map(|(line, derived)| LineResult::new(line.rate_id, derived))
            .collect(),
        fejl: errors,
        summer: totals.formatted(),
    }))
}

fn move_to_table(catalog: &TariffCatalog, mut line: LineItem, table: Option<TableId>) -> LineItem {
    if let (Some(table), Some(current)) = (table, line.selected_rate()) {
        line.rate_id = Some(catalog.rate_for_table(current, table));
    }
    line
}
