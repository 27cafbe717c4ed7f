use serde::{Deserialize, Deserializer, Serialize};
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::Pet;
use crate::users::dto::OwnerSummary;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Accepts `YYYY-MM-DD`, or a full RFC 3339 timestamp of which only the date is kept.
pub fn parse_birth_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|dt| dt.date()))
}

/// Pet embedded in users and adoptions.
#[derive(Debug, Clone, Serialize)]
pub struct PetSummary {
    pub id: Uuid,
    pub name: String,
    pub specie: String,
    pub breed: Option<String>,
    #[serde(rename = "birthDate", with = "iso_date")]
    pub birth_date: Date,
    pub image: Option<String>,
    pub adopted: bool,
    pub location: Option<String>,
}

impl From<&Pet> for PetSummary {
    fn from(p: &Pet) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            specie: p.specie.clone(),
            breed: p.breed.clone(),
            birth_date: p.birth_date,
            image: p.image.clone(),
            adopted: p.adopted,
            location: p.location.clone(),
        }
    }
}

/// Pet with its owner resolved.
#[derive(Debug, Serialize)]
pub struct PetView {
    pub id: Uuid,
    pub name: String,
    pub specie: String,
    pub breed: Option<String>,
    #[serde(rename = "birthDate", with = "iso_date")]
    pub birth_date: Date,
    pub adopted: bool,
    pub owner: Option<OwnerSummary>,
    pub image: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PetView {
    pub fn new(p: Pet, owner: Option<OwnerSummary>) -> Self {
        Self {
            id: p.id,
            name: p.name,
            specie: p.specie,
            breed: p.breed,
            birth_date: p.birth_date,
            adopted: p.adopted,
            owner,
            image: p.image,
            location: p.location,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePetRequest {
    pub name: Option<String>,
    pub specie: Option<String>,
    pub breed: Option<String>,
    pub birth_date: Option<String>,
    pub image: Option<String>,
    pub location: Option<String>,
}

/// Absent fields are kept; an explicit `null` clears a nullable field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePetRequest {
    pub name: Option<String>,
    pub specie: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub breed: Option<Option<String>>,
    pub birth_date: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct PetResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub pet: PetView,
}

#[derive(Debug, Serialize)]
pub struct PetsResponse {
    pub pets: Vec<PetView>,
}
