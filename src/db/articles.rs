//! Article database operations

use crate::db::models::ArticleCommit;
use crate::db::DbPool;
use crate::error::Result;
use tracing::debug;

/// Check whether a live article already uses `slug`
pub async fn slug_exists(pool: &DbPool, slug: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM articles
            WHERE slug = $1
              AND deleted_at IS NULL
        )
        "#,
    )
    .bind(slug)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Persist an assembled article with its links and generation record
///
/// Runs in one transaction: the article row, the keyword link, links to the
/// categories that exist, and a `completed` generation_tasks row naming the
/// provider. Returns the new article ID.
pub async fn commit_article(pool: &DbPool, commit: &ArticleCommit) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let article = &commit.article;

    let article_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO articles (
            title, slug, content, summary, meta_title, meta_desc,
            status, user_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING id
        "#,
    )
    .bind(&article.title)
    .bind(&article.slug)
    .bind(&article.body)
    .bind(&article.summary)
    .bind(&article.meta_title)
    .bind(&article.meta_description)
    .bind(&article.status)
    .bind(commit.user_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO article_keywords (article_id, keyword_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(article_id)
    .bind(commit.keyword_id)
    .execute(&mut *tx)
    .await?;

    if !commit.category_ids.is_empty() {
        let linked = sqlx::query(
            r#"
            INSERT INTO article_categories (article_id, category_id)
            SELECT $1, id FROM categories
            WHERE id = ANY($2)
              AND deleted_at IS NULL
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(commit.category_ids.as_slice())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        debug!(
            "Linked article {} to {}/{} categories",
            article_id,
            linked,
            commit.category_ids.len()
        );
    }

    sqlx::query(
        r#"
        INSERT INTO generation_tasks (
            keyword_id, article_id, status, prompt, model_used, created_at, updated_at
        )
        VALUES ($1, $2, 'completed', $3, $4, NOW(), NOW())
        "#,
    )
    .bind(commit.keyword_id)
    .bind(article_id)
    .bind(&commit.prompt)
    .bind(&commit.model_used)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(article_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{assemble, SanitizeMode};
    use crate::db::{create_pool_from_env, keywords};

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_commit_article_links_and_records() {
        dotenvy::dotenv().ok();
        let pool = create_pool_from_env().await.unwrap();

        let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let keyword = keywords::upsert_keyword(&pool, &format!("commit-test-{}", stamp))
            .await
            .unwrap();

        let raw = format!("# Commit Test {}\n\nBody text.", stamp);
        let article = assemble(raw.as_bytes(), SanitizeMode::Unicode, chrono::Utc::now());
        let slug = article.slug.clone();

        let commit = ArticleCommit {
            article,
            keyword_id: keyword.id,
            category_ids: vec![i64::MAX],
            user_id: None,
            prompt: "prompt".to_string(),
            model_used: "deepseek".to_string(),
        };

        let article_id = commit_article(&pool, &commit).await.unwrap();
        assert!(slug_exists(&pool, &slug).await.unwrap());

        let links: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM article_categories WHERE article_id = $1")
                .bind(article_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(links, 0, "unknown categories are skipped");

        let model: String =
            sqlx::query_scalar("SELECT model_used FROM generation_tasks WHERE article_id = $1")
                .bind(article_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(model, "deepseek");

        // Cleanup
        for sql in [
            "DELETE FROM generation_tasks WHERE article_id = $1",
            "DELETE FROM article_keywords WHERE article_id = $1",
            "DELETE FROM articles WHERE id = $1",
        ] {
            sqlx::query(sql).bind(article_id).execute(&pool).await.unwrap();
        }
        sqlx::query("DELETE FROM keywords WHERE id = $1")
            .bind(keyword.id)
            .execute(&pool)
            .await
            .unwrap();
    }
}
