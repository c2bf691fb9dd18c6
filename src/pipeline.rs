//! Collect-then-classify orchestration.
//!
//! [`Pipeline`] wires a [`Store`], a content source and a completion
//! provider together and owns the single-flight run state: at most one
//! full pass runs at a time, whether started from the CLI or from
//! `POST /api/scrape`. Stages can also be run on their own.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::classify::{ClassifyOptions, ClassifyStats, Classifier};
use crate::collect::{CollectOptions, CollectStats, Collector};
use crate::config::{split_list, Config};
use crate::filter::PainFilter;
use crate::llm::{create_provider, CompletionProvider};
use crate::sources::{create_source, ContentSource};
use crate::store::Store;

/// What the last full pass produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Completed {
        collect: CollectStats,
        classify: ClassifyStats,
    },
    Failed {
        error: String,
    },
}

/// Snapshot served by `GET /api/scrape/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunState {
    pub running: bool,
    pub last_result: Option<RunOutcome>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

impl StartOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartOutcome::Started => "started",
            StartOutcome::AlreadyRunning => "already_running",
        }
    }
}

/// Marks a pass as in progress. Dropping it without [`RunGuard::finish`]
/// still returns the state to idle.
pub struct RunGuard {
    state: Arc<Mutex<RunState>>,
}

impl RunGuard {
    pub fn finish(self, outcome: RunOutcome) {
        let mut state = lock(&self.state);
        state.last_result = Some(outcome);
        state.finished_at = Some(chrono::Utc::now().timestamp());
        state.running = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.running {
            state.running = false;
            state.finished_at = Some(chrono::Utc::now().timestamp());
        }
    }
}

fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    store: Store,
    state: Arc<Mutex<RunState>>,
    source: Option<Arc<dyn ContentSource>>,
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl Pipeline {
    pub fn new(config: Config, store: Store) -> Self {
        Self {
            config,
            store,
            state: Arc::new(Mutex::new(RunState::default())),
            source: None,
            provider: None,
        }
    }

    /// Use `source` instead of building one from configuration.
    pub fn with_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use `provider` instead of resolving one from the environment.
    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one collection pass.
    pub async fn collect(
        &self,
        subreddits: &[String],
        limit: usize,
        public: bool,
    ) -> Result<CollectStats> {
        let source = match &self.source {
            Some(source) => source.clone(),
            None => create_source(&self.config, public)?,
        };
        let collector = Collector::new(
            self.store.clone(),
            source,
            PainFilter::from_config(&self.config.collector),
            CollectOptions::from_config(&self.config.collector, public),
        );
        collector.collect(subreddits, limit).await
    }

    /// Classify one batch. Returns zeros without touching the provider
    /// when nothing is pending.
    pub async fn classify(&self, batch_size: usize) -> Result<ClassifyStats> {
        if self.store.count_unclassified().await? == 0 {
            tracing::info!("no unclassified items");
            return Ok(ClassifyStats::default());
        }

        let provider = self.resolve_provider()?;
        self.classify_with(provider, batch_size).await
    }

    /// The injected provider, or one built from configuration and the
    /// environment. Missing keys are reported here.
    fn resolve_provider(&self) -> Result<Arc<dyn CompletionProvider>> {
        match &self.provider {
            Some(provider) => Ok(provider.clone()),
            None => Ok(Arc::from(create_provider(&self.config.classifier)?)),
        }
    }

    async fn classify_with(
        &self,
        provider: Arc<dyn CompletionProvider>,
        batch_size: usize,
    ) -> Result<ClassifyStats> {
        let classifier = Classifier::new(
            self.store.clone(),
            provider,
            ClassifyOptions::from_config(&self.config.classifier),
        );
        classifier.classify(batch_size).await
    }

    /// Claim the run slot. `None` if a pass is already in progress.
    pub fn try_begin(&self) -> Option<RunGuard> {
        let mut state = lock(&self.state);
        if state.running {
            return None;
        }
        state.running = true;
        state.started_at = Some(chrono::Utc::now().timestamp());
        state.finished_at = None;
        Some(RunGuard {
            state: self.state.clone(),
        })
    }

    pub fn status(&self) -> RunState {
        lock(&self.state).clone()
    }

    /// Collect then classify in the foreground, holding the run slot.
    pub async fn run(
        &self,
        subreddits: &[String],
        limit: usize,
        public: bool,
        batch_size: usize,
    ) -> Result<(CollectStats, ClassifyStats)> {
        let guard = self
            .try_begin()
            .ok_or_else(|| anyhow!("a pipeline run is already in progress"))?;

        let result = self.execute(subreddits, limit, public, batch_size).await;
        guard.finish(outcome_of(&result));
        result
    }

    /// Start a full pass on the runtime and return immediately.
    pub fn start_background(&self) -> StartOutcome {
        let Some(guard) = self.try_begin() else {
            return StartOutcome::AlreadyRunning;
        };

        let pipeline = self.clone();
        tokio::spawn(async move {
            let collector = &pipeline.config.collector;
            let server = &pipeline.config.server;
            let result = pipeline
                .execute(
                    &collector.subreddits,
                    collector.limit,
                    server.background_public,
                    server.background_batch_size,
                )
                .await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "background run failed");
            }
            guard.finish(outcome_of(&result));
        });

        StartOutcome::Started
    }

    async fn execute(
        &self,
        subreddits: &[String],
        limit: usize,
        public: bool,
        batch_size: usize,
    ) -> Result<(CollectStats, ClassifyStats)> {
        // Credentials for both stages are checked before any fetch
        let provider = self.resolve_provider()?;
        let collected = self.collect(subreddits, limit, public).await?;
        let classified = self.classify_with(provider, batch_size).await?;
        Ok((collected, classified))
    }
}

// ============ CLI entry points ============

fn resolve_subreddits(config: &Config, sources: Option<&str>) -> Vec<String> {
    match sources {
        Some(raw) => split_list(raw),
        None => config.collector.subreddits.clone(),
    }
}

fn print_collect(stats: &CollectStats, public: bool) {
    println!("collect {}", if public { "reddit-public" } else { "reddit-api" });
    println!("  subreddits: {}", stats.sources_collected);
    println!("  items found: {}", stats.found);
    println!("  items matched: {}", stats.matched);
    println!("  source errors: {}", stats.source_errors);
}

fn print_classify(stats: &ClassifyStats) {
    println!("classify");
    println!("  analyzed: {}", stats.analyzed);
    println!("  fallback: {}", stats.fallback);
    println!("  failed: {}", stats.failed);
}

/// `pph collect`
pub async fn run_collect(
    config: &Config,
    sources: Option<&str>,
    limit: Option<usize>,
    public: bool,
) -> Result<()> {
    let subreddits = resolve_subreddits(config, sources);
    if subreddits.is_empty() {
        bail!("No subreddits to collect. Pass --sources or set collector.subreddits.");
    }
    let limit = limit.unwrap_or(config.collector.limit);

    let store = Store::open(config).await?;
    let pipeline = Pipeline::new(config.clone(), store.clone());
    let result = pipeline.collect(&subreddits, limit, public).await;
    store.close().await;

    print_collect(&result?, public);
    println!("ok");
    Ok(())
}

/// `pph classify`
pub async fn run_classify(config: &Config, batch_size: Option<usize>) -> Result<()> {
    let batch_size = batch_size.unwrap_or(config.classifier.batch_size);

    let store = Store::open(config).await?;
    let pipeline = Pipeline::new(config.clone(), store.clone());
    let result = pipeline.classify(batch_size).await;
    store.close().await;

    print_classify(&result?);
    println!("ok");
    Ok(())
}

/// `pph run`: collect then classify.
pub async fn run_pipeline(
    config: &Config,
    sources: Option<&str>,
    limit: Option<usize>,
    public: bool,
    batch_size: Option<usize>,
) -> Result<()> {
    let subreddits = resolve_subreddits(config, sources);
    if subreddits.is_empty() {
        bail!("No subreddits to collect. Pass --sources or set collector.subreddits.");
    }
    let limit = limit.unwrap_or(config.collector.limit);
    let batch_size = batch_size.unwrap_or(config.classifier.batch_size);

    let store = Store::open(config).await?;
    let pipeline = Pipeline::new(config.clone(), store.clone());
    let result = pipeline.run(&subreddits, limit, public, batch_size).await;
    store.close().await;

    let (collected, classified) = result?;
    print_collect(&collected, public);
    print_classify(&classified);
    println!("ok");
    Ok(())
}

fn outcome_of(result: &Result<(CollectStats, ClassifyStats)>) -> RunOutcome {
    match result {
        Ok((collect, classify)) => RunOutcome::Completed {
            collect: collect.clone(),
            classify: classify.clone(),
        },
        Err(e) => RunOutcome::Failed {
            error: format!("{:#}", e),
        },
    }
}
