use chrono::{DateTime, Utc};
use content_model::{MediaKind, MediaRef, Post, Reply};
use sqlx::PgPool;

/// Row of the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
    pub media_url: Option<String>,
    pub media_kind: Option<String>,
}

impl PostRow {
    pub fn into_post(self, replies: Vec<Reply>) -> Post {
        let media = match (self.media_url, self.media_kind) {
            (Some(url), Some(kind)) => kind
                .parse::<MediaKind>()
                .ok()
                .map(|kind| MediaRef { url, kind }),
            _ => None,
        };
        Post {
            id: self.id,
            author: self.author,
            content: self.content,
            created_at: self.created_at,
            edit_count: self.edit_count,
            media,
            replies,
        }
    }
}

/// Insert a post
pub async fn insert_post(
    pool: &PgPool,
    author: &str,
    content: &str,
    media: Option<&MediaRef>,
    created_at: DateTime<Utc>,
) -> Result<PostRow, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(
        r#"
        INSERT INTO posts (author, content, created_at, media_url, media_kind)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, author, content, created_at, edit_count, media_url, media_kind
        "#,
    )
    .bind(author)
    .bind(content)
    .bind(created_at)
    .bind(media.map(|m| m.url.as_str()))
    .bind(media.map(|m| m.kind.as_str()))
    .fetch_one(pool)
    .await
}

pub async fn find_post(pool: &PgPool, id: i64) -> Result<Option<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(
        r#"
        SELECT id, author, content, created_at, edit_count, media_url, media_kind
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Conditional content update; `None` when the row is gone or the edit
/// count no longer matches `expected_edit_count`.
pub async fn update_post_content(
    pool: &PgPool,
    id: i64,
    content: &str,
    increment: i32,
    expected_edit_count: Option<i32>,
) -> Result<Option<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(
        r#"
        UPDATE posts
        SET content = $1, edit_count = edit_count + $2
        WHERE id = $3 AND ($4::INTEGER IS NULL OR edit_count = $4)
        RETURNING id, author, content, created_at, edit_count, media_url, media_kind
        "#,
    )
    .bind(content)
    .bind(increment)
    .bind(id)
    .bind(expected_edit_count)
    .fetch_optional(pool)
    .await
}

/// Replies go with the post (`ON DELETE CASCADE`).
pub async fn delete_post(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Newest first.
pub async fn recent_posts(pool: &PgPool, limit: i64) -> Result<Vec<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(
        r#"
        SELECT id, author, content, created_at, edit_count, media_url, media_kind
        FROM posts
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
