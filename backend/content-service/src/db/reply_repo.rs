use chrono::{DateTime, Utc};
use content_model::Reply;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReplyRow {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
}

impl From<ReplyRow> for Reply {
    fn from(row: ReplyRow) -> Self {
        Reply {
            id: row.id,
            post_id: row.post_id,
            author: row.author,
            content: row.content,
            created_at: row.created_at,
            edit_count: row.edit_count,
        }
    }
}

/// Insert a reply. A missing parent surfaces as a foreign key violation.
pub async fn insert_reply(
    pool: &PgPool,
    post_id: i64,
    author: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<ReplyRow, sqlx::Error> {
    sqlx::query_as::<_, ReplyRow>(
        r#"
        INSERT INTO replies (post_id, author, content, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, post_id, author, content, created_at, edit_count
        "#,
    )
    .bind(post_id)
    .bind(author)
    .bind(content)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub async fn find_reply(pool: &PgPool, id: i64) -> Result<Option<ReplyRow>, sqlx::Error> {
    sqlx::query_as::<_, ReplyRow>(
        r#"
        SELECT id, post_id, author, content, created_at, edit_count
        FROM replies
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_reply_content(
    pool: &PgPool,
    id: i64,
    content: &str,
    increment: i32,
    expected_edit_count: Option<i32>,
) -> Result<Option<ReplyRow>, sqlx::Error> {
    sqlx::query_as::<_, ReplyRow>(
        r#"
        UPDATE replies
        SET content = $1, edit_count = edit_count + $2
        WHERE id = $3 AND ($4::INTEGER IS NULL OR edit_count = $4)
        RETURNING id, post_id, author, content, created_at, edit_count
        "#,
    )
    .bind(content)
    .bind(increment)
    .bind(id)
    .bind(expected_edit_count)
    .fetch_optional(pool)
    .await
}

pub async fn delete_reply(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM replies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replies of one post, oldest first.
pub async fn replies_for_post(pool: &PgPool, post_id: i64) -> Result<Vec<ReplyRow>, sqlx::Error> {
    sqlx::query_as::<_, ReplyRow>(
        r#"
        SELECT id, post_id, author, content, created_at, edit_count
        FROM replies
        WHERE post_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Replies of several posts in one round trip, oldest first.
pub async fn replies_for_posts(
    pool: &PgPool,
    post_ids: &[i64],
) -> Result<Vec<ReplyRow>, sqlx::Error> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, ReplyRow>(
        r#"
        SELECT id, post_id, author, content, created_at, edit_count
        FROM replies
        WHERE post_id = ANY($1)
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await
}

/// Newest first, across all posts.
pub async fn recent_replies(pool: &PgPool, limit: i64) -> Result<Vec<ReplyRow>, sqlx::Error> {
    sqlx::query_as::<_, ReplyRow>(
        r#"
        SELECT id, post_id, author, content, created_at, edit_count
        FROM replies
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
