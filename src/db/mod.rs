//! Database module for article-builder
//!
//! PostgreSQL operations for keywords, articles and their links. The worker
//! only talks to the `ArticleStore` trait.

pub mod articles;
pub mod connection;
pub mod keywords;
pub mod models;
pub mod store;

pub use connection::{create_pool, create_pool_from_env, DbPool};
pub use models::*;
pub use store::{ArticleStore, PgArticleStore};
