pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use std::sync::Arc;

use crate::config::Settings;
use crate::models::{PageData, PageDataError};
use crate::services::tariff::TariffEngine;

/// Shared application state: the engine built from the page data snapshot.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TariffEngine>,
}

impl AppState {
    pub fn new(page: PageData, code_width: usize) -> Self {
        Self {
            engine: Arc::new(TariffEngine::from_page(&page, code_width)),
        }
    }

    /// Load the configured page data and apply constant overrides.
    pub fn from_settings(settings: &Settings) -> Result<Self, PageDataError> {
        let mut page = PageData::load(&settings.data.page_data_path)?;
        if let Some(factor) = settings.konstanter.surcharge_factor {
            page.constants.surcharge_factor = factor;
        }
        if let Some(fee) = settings.konstanter.handling_fee {
            page.constants.handling_fee = fee;
        }
        tracing::info!(
            rates = page.rates.len(),
            tables = page.tables.len(),
            roles = page.roles.len(),
            "Page data loaded"
        );
        Ok(Self::new(page, settings.form.varekode_bredde))
    }
}
