//! Idle → Bootstrapping → Attached.
//!
//! [`Bootstrap`] watches the whole document until discovery finds at least
//! one feed. [`Bootstrap::attach`] consumes it, disconnects its observer and
//! hands back one [`AttachedWatcher`] per feed root, so a later unrelated
//! mutation can never attach a second watcher to the same feed.

use crate::config::Config;
use crate::discovery::{find_recommendation_links, DiscoveryOptions, RecommendationGroup};
use crate::dom::{MutationReceiver, NodeId, ObserveOptions, ObserverId, Selector, SelectorError};
use crate::page::Page;
use crate::pipeline::Pipeline;
use crate::retry::{await_condition, RetryPolicy};
use crate::stats::StatsCollector;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherPhase {
    Idle,
    CheckingSignIn,
    NotSignedIn,
    Bootstrapping,
    /// Observing this many feeds.
    Attached(usize),
    /// The page went away.
    Unloaded,
}

pub struct Bootstrap {
    page: Page,
    observer: ObserverId,
    rx: MutationReceiver,
    opts: DiscoveryOptions,
    stats: Arc<StatsCollector>,
}

impl Bootstrap {
    /// Starts observing child-list changes anywhere in the document.
    pub fn start(page: Page, opts: DiscoveryOptions, stats: Arc<StatsCollector>) -> Self {
        let root = page.read(|doc| doc.root());
        let (observer, rx) = page.observe(root, ObserveOptions::subtree());
        Self {
            page,
            observer,
            rx,
            opts,
            stats,
        }
    }

    pub fn discover(&self) -> Vec<RecommendationGroup> {
        self.stats.inc_discovery_runs();
        self.page
            .read(|doc| find_recommendation_links(doc, &self.opts))
    }

    /// Runs discovery now and after every mutation batch until a feed shows
    /// up. `None` if the page is unloaded first.
    pub async fn wait_for_feeds(&mut self) -> Option<Vec<RecommendationGroup>> {
        loop {
            let groups = self.discover();
            if !groups.is_empty() {
                return Some(groups);
            }
            self.rx.recv().await?;
            // Batches that piled up meanwhile need only one more pass.
            while self.rx.try_recv().is_ok() {}
        }
    }

    /// One-way transition to the attached state.
    pub fn attach(self, groups: &[RecommendationGroup]) -> Vec<AttachedWatcher> {
        self.page.disconnect(self.observer);

        let mut roots: Vec<NodeId> = Vec::new();
        for group in groups {
            match self.page.read(|doc| group.root(doc)) {
                Some(root) if !roots.contains(&root) => roots.push(root),
                Some(_) => debug!("Feed {} shares a root already watched", group.key),
                None => {}
            }
        }

        roots
            .into_iter()
            .map(|root| {
                let (observer, rx, existing) =
                    self.page
                        .observe_from(root, ObserveOptions::subtree(), |doc| {
                            doc.element_children(root).collect()
                        });
                self.stats.inc_watchers_attached();
                debug!("Watching recommendations under {:?}", root);
                AttachedWatcher {
                    page: self.page.clone(),
                    root,
                    observer,
                    rx,
                    existing,
                }
            })
            .collect()
    }
}

/// Observes one feed root for the rest of the page's life.
pub struct AttachedWatcher {
    page: Page,
    root: NodeId,
    observer: ObserverId,
    rx: MutationReceiver,
    // Children present when the observer was registered.
    existing: Vec<NodeId>,
}

impl AttachedWatcher {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    /// Tiles already rendered go first, in document order; then every added
    /// element in delivery order. Returns when the page is unloaded.
    pub async fn run(mut self, pipeline: Arc<Pipeline>) {
        for tile in std::mem::take(&mut self.existing) {
            pipeline.process(tile).await;
        }

        while let Some(batch) = self.rx.recv().await {
            for record in batch {
                for node in record.added_nodes {
                    if self.page.read(|doc| doc.is_element(node)) {
                        pipeline.process(node).await;
                    }
                }
            }
        }
        debug!("Watcher for {:?} stopped", self.root);
    }
}

/// Drives a page from load to attached watchers.
pub struct RecommendationWatcher {
    page: Page,
    pipeline: Arc<Pipeline>,
    sign_in: Selector,
    retry: RetryPolicy,
    discovery: DiscoveryOptions,
    phase: watch::Sender<WatcherPhase>,
}

impl RecommendationWatcher {
    pub fn new(page: Page, pipeline: Arc<Pipeline>, config: &Config) -> Result<Self, SelectorError> {
        Ok(Self {
            page,
            pipeline,
            sign_in: Selector::parse(&config.page.sign_in_selector)?,
            retry: RetryPolicy::from_config(&config.page),
            discovery: DiscoveryOptions::from_config(&config.page),
            phase: watch::Sender::new(WatcherPhase::Idle),
        })
    }

    pub fn phase(&self) -> watch::Receiver<WatcherPhase> {
        self.phase.subscribe()
    }

    pub async fn run(self) -> WatcherPhase {
        self.phase.send_replace(WatcherPhase::CheckingSignIn);
        let signed_in = await_condition(
            || self.page.read(|doc| doc.query_selector(&self.sign_in)),
            self.retry,
        )
        .await;
        if let Err(e) = signed_in {
            debug!("Sign-in indicator '{}' missing: {}", self.sign_in, e);
            info!("User is not signed in. Observer not started.");
            return self.finish(WatcherPhase::NotSignedIn);
        }

        self.phase.send_replace(WatcherPhase::Bootstrapping);
        let stats = self.pipeline.context().stats.clone();
        let mut bootstrap = Bootstrap::start(self.page.clone(), self.discovery.clone(), stats);
        let Some(groups) = bootstrap.wait_for_feeds().await else {
            return self.finish(WatcherPhase::Unloaded);
        };

        let watchers = bootstrap.attach(&groups);
        info!(
            "Found {} recommendation feed(s), attached {} watcher(s)",
            groups.len(),
            watchers.len()
        );
        self.phase.send_replace(WatcherPhase::Attached(watchers.len()));

        join_all(
            watchers
                .into_iter()
                .map(|w| w.run(self.pipeline.clone())),
        )
        .await;

        self.finish(WatcherPhase::Unloaded)
    }

    fn finish(&self, phase: WatcherPhase) -> WatcherPhase {
        self.phase.send_replace(phase);
        phase
    }
}
