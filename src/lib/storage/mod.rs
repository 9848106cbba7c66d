pub mod sqlite;

use async_trait::async_trait;

use crate::core::{AppError, Todo, TodoPatch};

/// Owns every todo record. Handlers receive this behind an `Arc` and hold
/// no state of their own between requests.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Todo>, AppError>;
    async fn create(&self, task: String, completed: bool) -> Result<Todo, AppError>;
    async fn get(&self, id: i64) -> Result<Todo, AppError>;
    async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo, AppError>;
    async fn delete(&self, id: i64) -> Result<(), AppError>;
}
