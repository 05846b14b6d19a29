//! Keyword database operations

use crate::db::models::Keyword;
use crate::db::DbPool;
use crate::error::Result;

/// Get a live (not soft-deleted) keyword by ID
pub async fn get_keyword(pool: &DbPool, keyword_id: i64) -> Result<Option<Keyword>> {
    let keyword = sqlx::query_as::<_, Keyword>(
        r#"
        SELECT id, word, status, created_at
        FROM keywords
        WHERE id = $1
          AND deleted_at IS NULL
        "#,
    )
    .bind(keyword_id)
    .fetch_optional(pool)
    .await?;

    Ok(keyword)
}

/// Insert a keyword, or return the existing one with the same word
pub async fn upsert_keyword(pool: &DbPool, word: &str) -> Result<Keyword> {
    let keyword = sqlx::query_as::<_, Keyword>(
        r#"
        INSERT INTO keywords (word, status, created_at, updated_at)
        VALUES ($1, 'active', NOW(), NOW())
        ON CONFLICT (word) DO UPDATE SET updated_at = NOW()
        RETURNING id, word, status, created_at
        "#,
    )
    .bind(word)
    .fetch_one(pool)
    .await?;

    Ok(keyword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool_from_env;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_upsert_then_get() {
        dotenvy::dotenv().ok();
        let pool = create_pool_from_env().await.unwrap();

        let word = format!("test-keyword-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let first = upsert_keyword(&pool, &word).await.unwrap();
        let again = upsert_keyword(&pool, &word).await.unwrap();
        assert_eq!(first.id, again.id);

        let fetched = get_keyword(&pool, first.id).await.unwrap().unwrap();
        assert_eq!(fetched.word, word);

        sqlx::query("DELETE FROM keywords WHERE id = $1")
            .bind(first.id)
            .execute(&pool)
            .await
            .unwrap();
    }
}
