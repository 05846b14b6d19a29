//! Row types and write models for the article schema

use crate::assembler::AssembledArticle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Keywords
// ============================================================================

/// Keyword - Matches keywords table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub word: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Articles
// ============================================================================

/// Everything written by one successful task, committed as a unit
#[derive(Debug, Clone)]
pub struct ArticleCommit {
    pub article: AssembledArticle,
    pub keyword_id: i64,
    /// Ids missing from `categories` are skipped, not rejected
    pub category_ids: Vec<i64>,
    /// Author; `None` for anonymous tasks
    pub user_id: Option<i64>,
    pub prompt: String,
    /// Provider that produced the text (`deepseek`, `ollama`)
    pub model_used: String,
}
