//! Persistence seam used by the worker

use crate::db::models::{ArticleCommit, Keyword};
use crate::db::{articles, keywords, DbPool};
use crate::error::Result;
use async_trait::async_trait;

/// Where finished articles go
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn get_keyword(&self, keyword_id: i64) -> Result<Option<Keyword>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Commit article, links and generation record atomically; returns the article ID
    async fn commit_article(&self, commit: &ArticleCommit) -> Result<i64>;
}

/// PostgreSQL-backed store
pub struct PgArticleStore {
    pool: DbPool,
}

impl PgArticleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn get_keyword(&self, keyword_id: i64) -> Result<Option<Keyword>> {
        keywords::get_keyword(&self.pool, keyword_id).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        articles::slug_exists(&self.pool, slug).await
    }

    async fn commit_article(&self, commit: &ArticleCommit) -> Result<i64> {
        articles::commit_article(&self.pool, commit).await
    }
}
