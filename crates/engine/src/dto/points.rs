use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PointsRequest {
    #[validate(length(min = 1, max = 255, message = "Category name is required"))]
    pub category_name: String,

    pub points: Vec<PointsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PointsEntry {
    pub vehicle_id: String,
    pub points: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ResetPointsQuery {
    pub category: String,
}
