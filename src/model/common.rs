use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = Uuid;

pub fn generate_id() -> Id {
    Uuid::new_v4()
}

/// Use the client-supplied id when present, otherwise mint a fresh one
pub fn id_or_generate(id: Option<Id>) -> Id {
    id.unwrap_or_else(generate_id)
}

/// Response body for create endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Id,
}

/// Response body for the count endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}
