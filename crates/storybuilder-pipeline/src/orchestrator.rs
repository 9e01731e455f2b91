//! Batch orchestration: drives every headline through
//! dedup, analysis, research, drafting, imaging and publishing.
//!
//! Each headline's stages run strictly in order. With `concurrency > 1`
//! several headlines may be in flight at once; the history store sits behind
//! a single async mutex so additions and their writes never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storybuilder_feeds::FeedAggregator;
use storybuilder_llm::LlmClient;
use storybuilder_publish::{PostPayload, PostStatus, Publisher};
use storybuilder_search::SearchProvider;
use storybuilder_types::{Headline, Personality, PublishResult, Result, StoryError};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::analyzer::HeadlineAnalyzer;
use crate::events::{BatchEvent, EventEmitter};
use crate::generator::StoryGenerator;
use crate::history::HistoryStore;
use crate::image::ImageDirector;
use crate::research::{format_citations, ResearchRetriever, DEFAULT_RESULTS_PER_QUERY};
use crate::retry::RetryPolicy;

const PREVIEW_CHARS: usize = 200;
const LOG_HEADLINE_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Generate everything but never publish or touch history.
    pub dry_run: bool,
    pub post_status: PostStatus,
    pub research_results_per_query: usize,
    pub dedup_research_urls: bool,
    /// Headlines in flight at once. 1 keeps the batch strictly sequential.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            post_status: PostStatus::Draft,
            research_results_per_query: DEFAULT_RESULTS_PER_QUERY,
            dedup_research_urls: false,
            concurrency: 1,
            retry: RetryPolicy::none(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Terminal state reached by one headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HeadlineOutcome {
    Deduped,
    DraftFailed {
        reason: String,
    },
    Previewed {
        title: String,
        content_chars: usize,
        preview: String,
        image_url: Option<String>,
    },
    Published {
        title: String,
        permalink: String,
        featured_media: Option<u64>,
    },
    PublishFailed {
        title: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadlineReport {
    /// 1-based position within the batch.
    pub index: usize,
    pub headline: Headline,
    pub outcome: HeadlineOutcome,
    pub findings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: String,
    pub personality: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub headlines_found: usize,
    pub reports: Vec<HeadlineReport>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&HeadlineOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Headlines that reached a live publish attempt and were recorded in
    /// history, whether or not the backend accepted them.
    pub fn processed_count(&self) -> usize {
        self.published_count() + self.publish_failed_count()
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, HeadlineOutcome::Deduped))
    }

    pub fn draft_failed_count(&self) -> usize {
        self.count(|o| matches!(o, HeadlineOutcome::DraftFailed { .. }))
    }

    pub fn previewed_count(&self) -> usize {
        self.count(|o| matches!(o, HeadlineOutcome::Previewed { .. }))
    }

    pub fn published_count(&self) -> usize {
        self.count(|o| matches!(o, HeadlineOutcome::Published { .. }))
    }

    pub fn publish_failed_count(&self) -> usize {
        self.count(|o| matches!(o, HeadlineOutcome::PublishFailed { .. }))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Orchestrator {
    analyzer: Arc<HeadlineAnalyzer>,
    retriever: Arc<ResearchRetriever>,
    generator: Arc<StoryGenerator>,
    images: Arc<ImageDirector>,
    /// `None` in dry-run mode.
    publisher: Option<Arc<dyn Publisher>>,
    history: Arc<Mutex<HistoryStore>>,
    config: BatchConfig,
    events: EventEmitter,
}

impl Orchestrator {
    /// Wire the stage components. A live batch without a publisher is a
    /// configuration error; in dry-run mode any publisher is ignored.
    pub fn new(
        llm: Arc<LlmClient>,
        search: Arc<dyn SearchProvider>,
        publisher: Option<Arc<dyn Publisher>>,
        history: HistoryStore,
        config: BatchConfig,
    ) -> Result<Self> {
        let publisher = if config.dry_run {
            None
        } else {
            Some(publisher.ok_or_else(|| {
                StoryError::ConfigError("live batch requires a publisher".into())
            })?)
        };

        let retry = config.retry.clone();
        let retriever = ResearchRetriever::new(search, retry.clone())
            .with_results_per_query(config.research_results_per_query)
            .with_url_dedup(config.dedup_research_urls);

        Ok(Self {
            analyzer: Arc::new(HeadlineAnalyzer::new(llm.clone(), retry.clone())),
            retriever: Arc::new(retriever),
            generator: Arc::new(StoryGenerator::new(llm.clone(), retry.clone())),
            images: Arc::new(ImageDirector::new(llm, retry)),
            publisher,
            history: Arc::new(Mutex::new(history)),
            config,
            events: EventEmitter::default(),
        })
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    pub fn history(&self) -> Arc<Mutex<HistoryStore>> {
        self.history.clone()
    }

    /// Collect headlines from the personality's feeds (or the default list)
    /// and run a batch over them.
    pub async fn run_from_feeds(
        &self,
        personality: &Personality,
        aggregator: &FeedAggregator,
    ) -> Result<BatchReport> {
        let headlines = aggregator.collect(personality.feed_urls()).await;
        self.run(personality, headlines).await
    }

    pub async fn run(
        &self,
        personality: &Personality,
        headlines: Vec<Headline>,
    ) -> Result<BatchReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = headlines.len();

        tracing::info!(
            run_id = %run_id,
            personality = %personality.id,
            headlines = total,
            dry_run = self.config.dry_run,
            "Starting batch"
        );
        self.events.emit(BatchEvent::BatchStarted {
            run_id: run_id.clone(),
            personality: personality.id.clone(),
            headline_count: total,
            dry_run: self.config.dry_run,
        });

        let reports = if headlines.is_empty() {
            tracing::warn!(personality = %personality.id, "No headlines found");
            Vec::new()
        } else if self.config.concurrency <= 1 {
            let mut reports = Vec::with_capacity(total);
            for (i, headline) in headlines.into_iter().enumerate() {
                reports.push(self.process(i + 1, total, personality, headline).await);
            }
            reports
        } else {
            self.run_concurrent(personality, headlines).await?
        };

        let report = BatchReport {
            run_id: run_id.clone(),
            personality: personality.id.clone(),
            dry_run: self.config.dry_run,
            started_at,
            finished_at: Utc::now(),
            headlines_found: total,
            reports,
        };

        let duration_ms = clock.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run_id,
            processed = report.processed_count(),
            skipped = report.skipped_count(),
            draft_failed = report.draft_failed_count(),
            duration_ms,
            "Batch complete"
        );
        self.events.emit(BatchEvent::BatchCompleted {
            run_id,
            processed: report.processed_count(),
            duration_ms,
        });

        Ok(report)
    }

    /// Copies of the same headline share one task and run in batch order,
    /// so the later copy sees whatever the earlier one wrote to history.
    async fn run_concurrent(
        &self,
        personality: &Personality,
        headlines: Vec<Headline>,
    ) -> Result<Vec<HeadlineReport>> {
        let total = headlines.len();
        let mut groups: Vec<(Headline, Vec<usize>)> = Vec::new();
        let mut slot: HashMap<Headline, usize> = HashMap::new();
        for (i, headline) in headlines.into_iter().enumerate() {
            match slot.get(&headline) {
                Some(&g) => groups[g].1.push(i + 1),
                None => {
                    slot.insert(headline.clone(), groups.len());
                    groups.push((headline, vec![i + 1]));
                }
            }
        }

        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let personality = Arc::new(personality.clone());
        let mut tasks = JoinSet::new();

        for (headline, indices) in groups {
            let this = self.clone();
            let permits = permits.clone();
            let personality = personality.clone();
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let mut reports = Vec::with_capacity(indices.len());
                for index in indices {
                    reports.push(
                        this.process(index, total, &personality, headline.clone())
                            .await,
                    );
                }
                reports
            });
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let group = joined
                .map_err(|e| StoryError::Other(format!("headline task aborted: {e}")))?;
            reports.extend(group);
        }
        reports.sort_by_key(|r| r.index);
        Ok(reports)
    }

    async fn process(
        &self,
        index: usize,
        total: usize,
        personality: &Personality,
        headline: Headline,
    ) -> HeadlineReport {
        let report = |outcome, findings| HeadlineReport {
            index,
            headline: headline.clone(),
            outcome,
            findings,
        };

        if self.history.lock().await.contains(&headline) {
            tracing::info!("Skipping duplicate: {}...", headline.preview(LOG_HEADLINE_CHARS));
            self.events.emit(BatchEvent::HeadlineSkipped {
                index,
                headline: headline.to_string(),
            });
            return report(HeadlineOutcome::Deduped, 0);
        }

        tracing::info!(
            "Processing Headline {index}/{total}: {}...",
            headline.preview(LOG_HEADLINE_CHARS)
        );
        self.events.emit(BatchEvent::HeadlineStarted {
            index,
            total,
            headline: headline.to_string(),
        });

        // Analyze
        let analysis = self
            .analyzer
            .analyze(&headline, &personality.prompt_modifier)
            .await;
        self.events.emit(BatchEvent::Analyzed {
            index,
            query_count: analysis.queries.len(),
            has_thesis: !analysis.thesis.is_empty(),
        });

        // Research
        let findings = if analysis.queries.is_empty() {
            tracing::info!(index, "No research queries, skipping research");
            Vec::new()
        } else {
            self.retriever.retrieve(&analysis.queries).await
        };
        self.events.emit(BatchEvent::Researched {
            index,
            findings: findings.len(),
        });
        let digest = if analysis.queries.is_empty() {
            String::new()
        } else {
            format_citations(&findings)
        };

        // Draft
        let draft = match self
            .generator
            .generate(
                &headline,
                &personality.prompt_modifier,
                &analysis.thesis,
                &digest,
            )
            .await
        {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(index, error = %e, "Draft failed, headline left for the next run");
                self.events.emit(BatchEvent::DraftFailed {
                    index,
                    reason: e.to_string(),
                });
                return report(
                    HeadlineOutcome::DraftFailed {
                        reason: e.to_string(),
                    },
                    findings.len(),
                );
            }
        };
        let content_chars = draft.html_content.chars().count();
        tracing::info!(index, title = %draft.title, content_chars, "Generated story");
        self.events.emit(BatchEvent::Drafted {
            index,
            title: draft.title.clone(),
            content_chars,
        });

        // Image
        let mut image = self.images.direct(&draft.title, &personality.style).await;
        self.events.emit(BatchEvent::ImageAttempted {
            index,
            image_url: image.as_ref().map(|a| a.remote_url.clone()),
        });

        let Some(publisher) = &self.publisher else {
            let preview: String = draft.html_content.chars().take(PREVIEW_CHARS).collect();
            tracing::info!(index, title = %draft.title, "Dry run enabled. Skipping publication.");
            self.events.emit(BatchEvent::Previewed {
                index,
                title: draft.title.clone(),
            });
            return report(
                HeadlineOutcome::Previewed {
                    title: draft.title,
                    content_chars,
                    preview,
                    image_url: image.map(|a| a.remote_url),
                },
                findings.len(),
            );
        };

        // Publish
        if let Some(asset) = image.as_mut() {
            let url = asset.remote_url.clone();
            match self
                .config
                .retry
                .run("upload_media", || publisher.upload_media(&url))
                .await
            {
                Ok(id) => asset.uploaded_media_id = Some(id),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Media upload failed, publishing without featured image")
                }
            }
        }
        let featured_media = image.as_ref().and_then(|a| a.uploaded_media_id);

        let payload = PostPayload::new(&draft.title, &draft.html_content, self.config.post_status)
            .with_featured_media(featured_media);
        let result: PublishResult = self
            .config
            .retry
            .run("create_post", || publisher.create_post(&payload))
            .await
            .into();

        let outcome = match result {
            PublishResult::Published { permalink } => {
                tracing::info!(index, permalink = %permalink, "Published");
                self.events.emit(BatchEvent::Published {
                    index,
                    permalink: permalink.clone(),
                });
                HeadlineOutcome::Published {
                    title: draft.title,
                    permalink,
                    featured_media,
                }
            }
            PublishResult::Failed { reason } => {
                tracing::warn!(index, reason = %reason, "Publish failed; marked processed despite publish failure");
                self.events.emit(BatchEvent::PublishFailed {
                    index,
                    reason: reason.clone(),
                });
                HeadlineOutcome::PublishFailed {
                    title: draft.title,
                    reason,
                }
            }
        };

        let mut history = self.history.lock().await;
        if let Err(e) = history.add_and_persist(headline.clone()).await {
            tracing::error!(index, path = %history.path().display(), error = %e, "Failed to save history");
        }
        self.events.emit(BatchEvent::HistoryUpdated {
            index,
            history_size: history.len(),
        });
        drop(history);

        report(outcome, findings.len())
    }
}
