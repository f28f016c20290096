// src/pipeline/check.rs

//! Change checking pipeline.
//!
//! Per resource and pass:
//!
//! ```text
//! load state ─▶ check ─┬─ unreachable / non-success ─▶ log, skip
//!                      ├─ unchanged ──────────────────▶ log, skip
//!                      └─ changed ─▶ diff ─▶ notify ─▶ commit
//! ```
//!
//! Nothing a single resource does can abort the pass for the others.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{
    ChangeVerdict, Config, Options, ResourceId, ResourceState, TrackedResource, load_resources,
};
use crate::pipeline::diff::{self, DiffEngine};
use crate::services::{
    ChangeDetector, DispatchResult, NotificationDispatcher, ReqwestFetcher, SmtpNotifier,
};
use crate::storage::{LocalStateStore, StateStore};

/// Terminal state of one resource in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Unreachable(String),
    NonSuccess(u16),
    Unchanged,
    Changed {
        /// `None` when mail delivery is disabled
        dispatch: Option<DispatchResult>,
        /// `false` when simulating or when the commit failed
        committed: bool,
    },
}

impl PassOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::NonSuccess(_))
    }
}

/// What happened to one resource.
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub id: ResourceId,
    pub host: String,
    pub outcome: PassOutcome,
}

/// Result of a whole pass, in resource list order.
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub reports: Vec<ResourceReport>,
    /// Resources dropped because an earlier line had the same id
    pub duplicates: usize,
}

impl PassSummary {
    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::Changed { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(PassOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&PassOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Drives resources through detection, diffing, notification and commit.
pub struct Orchestrator {
    store: Arc<dyn StateStore>,
    detector: ChangeDetector,
    dispatcher: NotificationDispatcher,
    diff: DiffEngine,
    persist: bool,
    notify: bool,
    max_concurrent: usize,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        detector: ChangeDetector,
        dispatcher: NotificationDispatcher,
        config: &Config,
        options: &Options,
    ) -> Self {
        Self {
            store,
            detector,
            dispatcher,
            diff: DiffEngine::new(config.checker.diff_context),
            persist: options.persist(),
            notify: options.notify(),
            max_concurrent: config.checker.max_concurrent.max(1),
        }
    }

    /// Check every resource once.
    ///
    /// Resources sharing an id are checked only once, so concurrent workers
    /// never commit to the same artifacts.
    pub async fn run(&self, resources: &[TrackedResource]) -> PassSummary {
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        let mut unique = Vec::new();
        for resource in resources {
            if seen.insert(resource.id().clone()) {
                unique.push(resource);
            } else {
                duplicates += 1;
                log::warn!(
                    "Skipping duplicate entry for {} (id {})",
                    resource.url,
                    resource.id()
                );
            }
        }

        let mut reports: Vec<(usize, ResourceReport)> = stream::iter(unique.into_iter().enumerate())
            .map(|(index, resource)| async move {
                let outcome = self.process(resource).await;
                (
                    index,
                    ResourceReport {
                        id: resource.id().clone(),
                        host: resource.host().to_string(),
                        outcome,
                    },
                )
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        reports.sort_by_key(|(index, _)| *index);

        PassSummary {
            reports: reports.into_iter().map(|(_, report)| report).collect(),
            duplicates,
        }
    }

    /// Run one resource to a terminal state.
    pub async fn process(&self, resource: &TrackedResource) -> PassOutcome {
        let id = resource.id();
        let host = resource.host();

        let prior = match self.store.load(id).await {
            Ok(state) => state,
            Err(e) => {
                log::error!("{}. Checking {} as if never seen.", e, host);
                ResourceState::empty()
            }
        };
        if prior.is_new() {
            log::info!("Site {} was never checked before.", host);
        }

        match self.detector.check(resource, &prior).await {
            ChangeVerdict::Unreachable(reason) => {
                log::error!("{} could not be checked", host);
                PassOutcome::Unreachable(reason)
            }
            ChangeVerdict::NonSuccess(status) => {
                log::warn!("{} skipped after status {}", host, status);
                PassOutcome::NonSuccess(status)
            }
            ChangeVerdict::Unchanged => {
                log::info!("{} is unchanged", host);
                PassOutcome::Unchanged
            }
            ChangeVerdict::Changed {
                previous,
                current,
                hash,
            } => {
                log::warn!("{} has an update", host);

                let old_label = diff::old_label(self.store.last_modified(id).await);
                let new_label = diff::new_label(Local::now());
                let diff = self.diff.diff(&previous, &current, &old_label, &new_label);

                let dispatch = if self.notify {
                    Some(self.dispatcher.notify(resource, &diff).await)
                } else {
                    log::info!("Mail delivery disabled, not notifying about {}", host);
                    None
                };

                let committed = if self.persist {
                    match self.store.commit(id, &hash, &current).await {
                        Ok(()) => true,
                        Err(e) => {
                            log::error!("{}. Change of {} will be reported again.", e, host);
                            false
                        }
                    }
                } else {
                    log::info!("Simulation, state of {} not saved", host);
                    false
                };

                PassOutcome::Changed {
                    dispatch,
                    committed,
                }
            }
        }
    }
}

/// Run a full pass using the settings and options of this invocation.
///
/// Fails only on configuration problems, before any resource is touched.
pub async fn run_checker(config: &Config, options: &Options) -> Result<PassSummary> {
    config.validate()?;

    if !options.conf_file.exists() {
        return Err(AppError::config(format!(
            "Config file '{}' does not exist",
            options.conf_file.display()
        )));
    }
    let resources = load_resources(&options.conf_file)?;

    let store = LocalStateStore::new(&options.dir);
    store.ensure_dir().await?;

    if options.clean {
        log::warn!("Clean up hash and diff files");
        let removed = store.clear_all().await?;
        log::info!("Removed {} files from {}", removed, store.root().display());
    }

    let fetcher = ReqwestFetcher::from_config(&config.checker)?;
    let notifier = SmtpNotifier::new(&config.mail, Duration::from_secs(config.checker.timeout_secs));
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        ChangeDetector::new(Arc::new(fetcher)),
        NotificationDispatcher::new(Arc::new(notifier), options.from.clone(), &options.tag),
        config,
        options,
    );

    let summary = orchestrator.run(&resources).await;
    log::info!(
        "Pass complete: {} changed, {} unchanged, {} failed",
        summary.changed(),
        summary.unchanged(),
        summary.failed()
    );

    Ok(summary)
}
