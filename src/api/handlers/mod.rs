pub mod catalog;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod offers;
pub mod orders;
pub mod payments;
pub mod tracking;
pub mod wallet;

use axum::Json;
use serde::Serialize;

use crate::errors::AppError;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    }))
}
