use told_core::error::AppError;

pub async fn metrics() -> Result<String, AppError> {
    crate::services::metrics::gather_metrics().map_err(AppError::InternalError)
}
