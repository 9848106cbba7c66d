use async_trait::async_trait;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool};

use crate::core::{AppError, Todo, TodoPatch};
use crate::storage::TodoStore;

pub struct SqliteTodoStore {
    pool: SqlitePool,
}

impl SqliteTodoStore {
    /// Opens the database at `url`, creating the file and the schema on
    /// first run.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            tracing::info!(url, "creating database");
            Sqlite::create_database(url).await?;
        }
        let pool = SqlitePool::connect(url).await?;
        migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Fresh store on a single-connection in-memory pool. A second
    /// connection would see its own empty database, so the pool is capped
    /// at one.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        migrate(&pool).await?;
        Ok(Self { pool })
    }
}

// AUTOINCREMENT keeps ids of deleted rows from ever being handed out again.
async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS todos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task TEXT NOT NULL,
            completed BOOLEAN NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl TodoStore for SqliteTodoStore {
    async fn list_all(&self) -> Result<Vec<Todo>, AppError> {
        let todos = sqlx::query_as::<_, Todo>("SELECT id, task, completed FROM todos")
            .fetch_all(&self.pool)
            .await?;
        Ok(todos)
    }

    async fn create(&self, task: String, completed: bool) -> Result<Todo, AppError> {
        let result = sqlx::query("INSERT INTO todos (task, completed) VALUES (?, ?)")
            .bind(&task)
            .bind(completed)
            .execute(&self.pool)
            .await?;
        Ok(Todo {
            id: result.last_insert_rowid(),
            task,
            completed,
        })
    }

    async fn get(&self, id: i64) -> Result<Todo, AppError> {
        sqlx::query_as::<_, Todo>("SELECT id, task, completed FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(id))
    }

    async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo, AppError> {
        let mut todo = self.get(id).await?;
        if let Some(task) = patch.task {
            todo.task = task;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        sqlx::query("UPDATE todos SET task = ?, completed = ? WHERE id = ?")
            .bind(&todo.task)
            .bind(todo.completed)
            .bind(todo.id)
            .execute(&self.pool)
            .await?;
        Ok(todo)
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_all_on_empty_store_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        assert!(store.list_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn create_assigns_fresh_ids_and_lists_back() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let first = store.create("buy milk".into(), false).await?;
        let second = store.create("walk dog".into(), true).await?;
        assert_ne!(first.id, second.id);

        let todos = store.list_all().await?;
        assert_eq!(todos.len(), 2);
        assert!(todos.contains(&Todo {
            id: first.id,
            task: "buy milk".into(),
            completed: false,
        }));
        assert!(todos.contains(&Todo {
            id: second.id,
            task: "walk dog".into(),
            completed: true,
        }));
        Ok(())
    }

    #[tokio::test]
    async fn create_permits_empty_task() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let todo = store.create(String::new(), false).await?;
        assert_eq!(store.get(todo.id).await?.task, "");
        Ok(())
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        assert!(matches!(store.get(999).await, Err(AppError::NotFound(999))));
        Ok(())
    }

    #[tokio::test]
    async fn update_patches_each_field_independently() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let todo = store.create("x".into(), false).await?;

        let patched = store
            .update(
                todo.id,
                TodoPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(patched.task, "x");
        assert!(patched.completed);

        let patched = store
            .update(
                todo.id,
                TodoPatch {
                    task: Some("y".into()),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(patched.task, "y");
        assert!(patched.completed);
        Ok(())
    }

    #[tokio::test]
    async fn update_with_empty_patch_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let todo = store.create("unchanged".into(), true).await?;
        let after = store.update(todo.id, TodoPatch::default()).await?;
        assert_eq!(after, todo);
        assert_eq!(store.get(todo.id).await?, todo);
        Ok(())
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let result = store.update(7, TodoPatch::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(7))));
        Ok(())
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let todo = store.create("gone".into(), false).await?;
        store.delete(todo.id).await?;
        assert!(matches!(
            store.get(todo.id).await,
            Err(AppError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        assert!(matches!(
            store.delete(999).await,
            Err(AppError::NotFound(999))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn deleted_ids_are_never_reused() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteTodoStore::in_memory().await?;
        let first = store.create("first".into(), false).await?;
        store.delete(first.id).await?;
        let second = store.create("second".into(), false).await?;
        assert!(second.id > first.id);
        Ok(())
    }
}
