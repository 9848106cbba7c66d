use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: i64,
    pub task: String,
    pub completed: bool,
}

/// Partial update for a [`Todo`]. A field left out of the payload
/// deserializes to `None` and keeps its stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}
