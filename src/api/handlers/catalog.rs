use axum::extract::{Path, State};

use super::{ok, ApiResult};
use crate::errors::AppError;
use crate::models::{ServiceType, ServiceTypeCatalog};
use crate::AppState;

pub async fn for_service_type(
    State(state): State<AppState>,
    Path(service_type): Path<String>,
) -> ApiResult<ServiceTypeCatalog> {
    let service_type = ServiceType::from_str(&service_type)
        .ok_or_else(|| AppError::NotFound(format!("service type {service_type}")))?;
    ok(state
        .services
        .orders
        .catalog()
        .for_service_type(service_type)
        .clone())
}
