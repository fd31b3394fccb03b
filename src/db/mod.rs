use crate::pipeline::DictionaryEntry;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = SqlitePool;

pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_DONE: &str = "done";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct TranscriptionRow {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub final_text: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SliceRow {
    pub id: i64,
    pub transcription_id: i64,
    pub slice_index: i64,
    pub partial_text: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DictionaryRow {
    pub id: i64,
    pub user_id: i64,
    pub phrase: String,
    pub replacement: String,
    pub created_at: String,
}

impl From<DictionaryRow> for DictionaryEntry {
    fn from(row: DictionaryRow) -> Self {
        DictionaryEntry { phrase: row.phrase, replacement: row.replacement }
    }
}

pub async fn init_db(database_url: &str) -> Result<DbPool, sqlx::Error> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub async fn get_or_create_user(
    pool: &DbPool,
    name: &str,
    email: &str,
) -> Result<UserRow, sqlx::Error> {
    sqlx::query("INSERT INTO users (name, email) VALUES (?, ?) ON CONFLICT(email) DO NOTHING")
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;

    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await
}

pub async fn create_transcription(pool: &DbPool, user_id: i64) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO transcriptions (user_id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_transcription(
    pool: &DbPool,
    id: i64,
) -> Result<Option<TranscriptionRow>, sqlx::Error> {
    sqlx::query_as::<_, TranscriptionRow>("SELECT * FROM transcriptions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_transcriptions(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<TranscriptionRow>, sqlx::Error> {
    sqlx::query_as::<_, TranscriptionRow>(
        "SELECT * FROM transcriptions WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Store the final text and flip the status to done.
pub async fn mark_transcription_done(
    pool: &DbPool,
    id: i64,
    final_text: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE transcriptions
         SET final_text = ?, status = ?, updated_at = datetime('now')
         WHERE id = ?",
    )
    .bind(final_text)
    .bind(STATUS_DONE)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a transcription; slices go with it via cascade.
pub async fn delete_transcription(pool: &DbPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM transcriptions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_slice(
    pool: &DbPool,
    transcription_id: i64,
    slice_index: u32,
    partial_text: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO slices (transcription_id, slice_index, partial_text) VALUES (?, ?, ?)")
        .bind(transcription_id)
        .bind(slice_index as i64)
        .bind(partial_text)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn slices_for_transcription(
    pool: &DbPool,
    transcription_id: i64,
) -> Result<Vec<SliceRow>, sqlx::Error> {
    sqlx::query_as::<_, SliceRow>(
        "SELECT * FROM slices WHERE transcription_id = ? ORDER BY slice_index",
    )
    .bind(transcription_id)
    .fetch_all(pool)
    .await
}

pub async fn add_dictionary_entry(
    pool: &DbPool,
    user_id: i64,
    phrase: &str,
    replacement: &str,
) -> Result<DictionaryRow, sqlx::Error> {
    let result =
        sqlx::query("INSERT INTO dictionary (user_id, phrase, replacement) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(phrase)
            .bind(replacement)
            .execute(pool)
            .await?;

    sqlx::query_as::<_, DictionaryRow>("SELECT * FROM dictionary WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

/// Dictionary entries in insertion order; order matters because substitution
/// is sequential.
pub async fn dictionary_for_user(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<DictionaryRow>, sqlx::Error> {
    sqlx::query_as::<_, DictionaryRow>("SELECT * FROM dictionary WHERE user_id = ? ORDER BY id")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn get_dictionary_entry(
    pool: &DbPool,
    id: i64,
) -> Result<Option<DictionaryRow>, sqlx::Error> {
    sqlx::query_as::<_, DictionaryRow>("SELECT * FROM dictionary WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_dictionary_entry(pool: &DbPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM dictionary WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let pool = init_db(&url).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn user_creation_is_idempotent_per_email() {
        let (_dir, pool) = test_pool().await;

        let a = get_or_create_user(&pool, "Ada", "ada@example.com").await.unwrap();
        let b = get_or_create_user(&pool, "Ada again", "ada@example.com").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name, "Ada");
    }

    #[tokio::test]
    async fn transcription_lifecycle() {
        let (_dir, pool) = test_pool().await;
        let user = get_or_create_user(&pool, "Ada", "ada@example.com").await.unwrap();

        let id = create_transcription(&pool, user.id).await.unwrap();
        let row = get_transcription(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status, STATUS_PROCESSING);
        assert!(row.final_text.is_none());

        insert_slice(&pool, id, 1, "world").await.unwrap();
        insert_slice(&pool, id, 0, "hello").await.unwrap();
        let slices = slices_for_transcription(&pool, id).await.unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].slice_index, 0);

        mark_transcription_done(&pool, id, "Hello world.").await.unwrap();
        let row = get_transcription(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status, STATUS_DONE);
        assert_eq!(row.final_text.as_deref(), Some("Hello world."));
    }

    #[tokio::test]
    async fn deleting_a_transcription_removes_its_slices() {
        let (_dir, pool) = test_pool().await;
        let user = get_or_create_user(&pool, "Ada", "ada@example.com").await.unwrap();

        let id = create_transcription(&pool, user.id).await.unwrap();
        insert_slice(&pool, id, 0, "hello").await.unwrap();
        delete_transcription(&pool, id).await.unwrap();

        assert!(get_transcription(&pool, id).await.unwrap().is_none());
        assert!(slices_for_transcription(&pool, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dictionary_preserves_insertion_order() {
        let (_dir, pool) = test_pool().await;
        let user = get_or_create_user(&pool, "Ada", "ada@example.com").await.unwrap();

        add_dictionary_entry(&pool, user.id, "btw", "by the way").await.unwrap();
        add_dictionary_entry(&pool, user.id, "AI", "artificial intelligence").await.unwrap();

        let rows = dictionary_for_user(&pool, user.id).await.unwrap();
        let phrases: Vec<_> = rows.iter().map(|r| r.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["btw", "AI"]);
    }
}
