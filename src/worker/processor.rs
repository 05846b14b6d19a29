//! Task processor for handling individual generation tasks

use crate::assembler::{assemble, disambiguate_slug};
use crate::db::models::ArticleCommit;
use crate::db::ArticleStore;
use crate::error::{PipelineError, Result};
use crate::orchestrator::GenerationOrchestrator;
use crate::prompt::article_request;
use crate::queue::TaskRecord;
use crate::worker::WorkerConfig;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// What a successful task produced
#[derive(Debug, Clone)]
pub struct ProcessedArticle {
    pub article_id: i64,
    pub slug: String,
    pub provider: String,
}

/// Task processor: keyword -> prompt -> generation -> assembly -> commit
pub struct TaskProcessor {
    store: Arc<dyn ArticleStore>,
    orchestrator: GenerationOrchestrator,
    config: WorkerConfig,
}

impl TaskProcessor {
    /// Create a new task processor
    pub fn new(
        store: Arc<dyn ArticleStore>,
        orchestrator: GenerationOrchestrator,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    /// Process a single task
    ///
    /// Generated text is not regenerated if the commit fails.
    pub async fn process(&self, task: &TaskRecord) -> Result<ProcessedArticle> {
        // Step 1: Resolve keyword
        let keyword = self
            .store
            .get_keyword(task.keyword_id)
            .await?
            .ok_or(PipelineError::KeywordNotFound(task.keyword_id))?;
        info!("Generating article for keyword: {}", keyword.word);

        // Step 2: Generate
        let request = article_request(
            &keyword.word,
            self.config.article_min_length,
            self.config.article_max_length,
            self.config.temperature,
            self.config.max_tokens,
        );
        let generation = self.orchestrator.generate(&request).await?;
        info!(
            "Generated {} chars with {} ({} attempt(s))",
            generation.text.chars().count(),
            generation.provider,
            generation.attempts.len()
        );

        // Step 3: Assemble
        let mut article = assemble(generation.text.as_bytes(), self.config.sanitize, Utc::now());
        article.slug = self.unique_slug(&article.slug, &task.id).await?;
        debug!("Assembled article '{}' -> {}", article.title, article.slug);

        // Step 4: Commit article, links and generation record
        let slug = article.slug.clone();
        let commit = ArticleCommit {
            article,
            keyword_id: task.keyword_id,
            category_ids: task.category_ids.clone(),
            user_id: task.user_id,
            prompt: request.prompt,
            model_used: generation.provider.clone(),
        };
        let article_id = self.store.commit_article(&commit).await?;
        info!("Stored article {} ({})", article_id, slug);

        Ok(ProcessedArticle {
            article_id,
            slug,
            provider: generation.provider,
        })
    }

    /// First free slug among the base and its disambiguated variants
    async fn unique_slug(&self, base: &str, seed: &str) -> Result<String> {
        if !self.store.slug_exists(base).await? {
            return Ok(base.to_string());
        }

        for attempt in 1..=self.config.slug_attempts {
            let candidate = disambiguate_slug(base, &format!("{}:{}", seed, attempt));
            if !self.store.slug_exists(&candidate).await? {
                debug!("Slug {} taken, using {}", base, candidate);
                return Ok(candidate);
            }
        }

        Err(PipelineError::SlugExhausted(base.to_string()))
    }
}
