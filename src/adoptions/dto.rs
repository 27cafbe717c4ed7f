use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{pets::dto::PetSummary, users::dto::OwnerSummary};

/// Adoption with owner and pet resolved. Either side is `null` if it was
/// deleted after the adoption was recorded.
#[derive(Debug, Serialize)]
pub struct AdoptionView {
    pub id: Uuid,
    pub owner: Option<OwnerSummary>,
    pub pet: Option<PetSummary>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct AdoptionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub adoption: AdoptionView,
}

#[derive(Debug, Serialize)]
pub struct AdoptionsResponse {
    pub adoptions: Vec<AdoptionView>,
}
