use chrono::{DateTime, Utc};
use content_model::ChatMessage;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatRow {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
}

impl From<ChatRow> for ChatMessage {
    fn from(row: ChatRow) -> Self {
        ChatMessage {
            id: row.id,
            author: row.author,
            content: row.content,
            created_at: row.created_at,
            edit_count: row.edit_count,
        }
    }
}

pub async fn insert_message(
    pool: &PgPool,
    author: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<ChatRow, sqlx::Error> {
    sqlx::query_as::<_, ChatRow>(
        r#"
        INSERT INTO chat_messages (author, content, created_at)
        VALUES ($1, $2, $3)
        RETURNING id, author, content, created_at, edit_count
        "#,
    )
    .bind(author)
    .bind(content)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub async fn find_message(pool: &PgPool, id: i64) -> Result<Option<ChatRow>, sqlx::Error> {
    sqlx::query_as::<_, ChatRow>(
        "SELECT id, author, content, created_at, edit_count FROM chat_messages WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_message_content(
    pool: &PgPool,
    id: i64,
    content: &str,
    increment: i32,
    expected_edit_count: Option<i32>,
) -> Result<Option<ChatRow>, sqlx::Error> {
    sqlx::query_as::<_, ChatRow>(
        r#"
        UPDATE chat_messages
        SET content = $1, edit_count = edit_count + $2
        WHERE id = $3 AND ($4::INTEGER IS NULL OR edit_count = $4)
        RETURNING id, author, content, created_at, edit_count
        "#,
    )
    .bind(content)
    .bind(increment)
    .bind(id)
    .bind(expected_edit_count)
    .fetch_optional(pool)
    .await
}

pub async fn delete_message(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Newest first.
pub async fn recent_messages(pool: &PgPool, limit: i64) -> Result<Vec<ChatRow>, sqlx::Error> {
    sqlx::query_as::<_, ChatRow>(
        r#"
        SELECT id, author, content, created_at, edit_count
        FROM chat_messages
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
