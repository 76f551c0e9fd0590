use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::Result;
use futures::future::join_all;
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    chain::event_source::EventSource,
    handlers::{
        event::{EventKind, RawEvent},
        registry::HandlerRegistry,
    },
    repositories::repositories::Repositories,
};

/// Outcome of one ingestion cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub persisted: BTreeMap<EventKind, usize>,
    pub failed: BTreeMap<EventKind, usize>,
    /// Kinds that arrived without a subscribed handler.
    pub skipped: Vec<EventKind>,
}

impl CycleReport {
    pub fn persisted_total(&self) -> usize {
        self.persisted.values().sum()
    }

    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }
}

/// Runs ingestion cycles: handlers persist first, observers are notified after.
/// Observer tasks outlive the cycle that started them.
pub struct Facilitator {
    repositories: Arc<Repositories>,
    registry: HandlerRegistry,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Facilitator {
    pub fn new(repositories: Arc<Repositories>, registry: HandlerRegistry) -> Self {
        Self {
            repositories,
            registry,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.registry.kinds()
    }

    /// One ingestion cycle over events grouped by kind.
    pub async fn handle(&self, events: BTreeMap<EventKind, Vec<RawEvent>>) -> CycleReport {
        let mut report = CycleReport::default();

        let mut groups = Vec::new();
        for (kind, batch) in &events {
            match self.registry.get(*kind) {
                Ok(handler) => groups.push((*kind, handler, batch)),
                Err(e) => {
                    warn!("⚠️  Dropping {} {} event(s): {}", batch.len(), kind, e);
                    report.skipped.push(*kind);
                }
            }
        }

        let results = join_all(
            groups
                .iter()
                .map(|(_, handler, batch)| handler.persist(batch.as_slice())),
        )
        .await;

        // Handlers already logged each failed item.
        for ((kind, _, _), persisted) in groups.iter().zip(results) {
            report.persisted.insert(*kind, persisted.persisted_count());
            if !persisted.failures().is_empty() {
                report.failed.insert(*kind, persisted.failures().len());
            }
        }

        self.track(self.repositories.notify().await).await;

        if report.persisted_total() > 0 || report.failed_total() > 0 {
            info!(
                "🔄 Cycle done: {} persisted, {} failed",
                report.persisted_total(),
                report.failed_total()
            );
        }
        report
    }

    /// Re-offers every uncommitted request to the request observers.
    pub async fn resume(&self) -> Result<usize> {
        let pending = self.repositories.request.uncommitted().await?;
        if pending.is_empty() {
            debug!("⏭️  No uncommitted requests to resume");
            return Ok(0);
        }

        info!("♻️  Resuming {} uncommitted request(s)", pending.len());
        let count = pending.len();
        let handles = self.repositories.request.subject().deliver(pending).await;
        self.track(handles).await;
        Ok(count)
    }

    /// Polls one source once; returns whether a range was ingested.
    pub async fn step(&self, source: &EventSource) -> Result<bool> {
        let Some(batch) = source.poll().await? else {
            return Ok(false);
        };

        let events = batch
            .events
            .iter()
            .map(|(kind, events)| (*kind, events.clone()))
            .collect();
        self.handle(events).await;
        source.commit(&batch).await?;

        debug!(
            "📌 {} checkpoint at block {}",
            source.name(),
            batch.to_block
        );
        Ok(true)
    }

    /// Polls every source until the process is stopped. Idle sources wait `poll_interval`.
    pub async fn run(&self, sources: Vec<EventSource>, poll_interval: Duration) -> Result<()> {
        info!(
            "🚀 Facilitator polling {} source(s) every {:?}",
            sources.len(),
            poll_interval
        );

        loop {
            let mut progressed = false;
            for source in &sources {
                match self.step(source).await {
                    Ok(ingested) => progressed |= ingested,
                    Err(e) => error!("❌ {} poll failed: {:#}", source.name(), e),
                }
            }

            if !progressed {
                sleep(poll_interval).await;
            }
        }
    }

    /// Waits for every observer task still running.
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.in_flight.lock().await);
        if handles.is_empty() {
            return;
        }

        info!("⏳ Waiting for {} observer task(s)", handles.len());
        for result in join_all(handles).await {
            Self::report(result);
        }
    }

    /// Reaps finished observer tasks and keeps the new ones without waiting on them.
    async fn track(&self, handles: Vec<JoinHandle<()>>) {
        let finished = {
            let mut in_flight = self.in_flight.lock().await;
            let (finished, running): (Vec<_>, Vec<_>) =
                in_flight.drain(..).partition(|h| h.is_finished());
            *in_flight = running;
            in_flight.extend(handles);
            debug!("🧵 {} observer task(s) in flight", in_flight.len());
            finished
        };

        for handle in finished {
            Self::report(handle.await);
        }
    }

    fn report(result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result {
            error!("❌ Observer task panicked: {}", e);
        }
    }
}
