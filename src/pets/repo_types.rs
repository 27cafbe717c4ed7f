use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Pet record. `adopted` and `owner` only change together, through claim/release.
#[derive(Debug, Clone, FromRow)]
pub struct Pet {
    pub id: Uuid,
    pub name: String,
    pub specie: String,
    pub breed: Option<String>,
    pub birth_date: Date,
    pub adopted: bool,
    #[sqlx(rename = "owner_id")]
    pub owner: Option<Uuid>,
    pub image: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPet {
    pub name: String,
    pub specie: String,
    pub breed: Option<String>,
    pub birth_date: Date,
    pub image: Option<String>,
    pub location: Option<String>,
}

impl NewPet {
    pub fn into_pet(self, now: OffsetDateTime) -> Pet {
        Pet {
            id: Uuid::new_v4(),
            name: self.name,
            specie: self.specie,
            breed: self.breed,
            birth_date: self.birth_date,
            adopted: false,
            owner: None,
            image: self.image,
            location: self.location,
            created_at: now,
            updated_at: now,
        }
    }
}
