use std::{collections::HashMap, fmt::Debug, hash::Hash};

use futures::future::join_all;
use tracing::{error, warn};

use crate::{
    handlers::event::{EventFields, EventKind, RawEvent},
    models::error::{FacilitatorError, FacilitatorResult},
};

/// Entities a handler left in the store, plus the items it could not persist.
#[derive(Debug)]
pub struct PersistReport<E> {
    pub persisted: Vec<E>,
    pub failures: Vec<FacilitatorError>,
}

impl<E> Default for PersistReport<E> {
    fn default() -> Self {
        Self {
            persisted: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Parses every event of a batch, logging and collecting the malformed ones.
pub fn parse_events<T>(
    kind: EventKind,
    events: &[RawEvent],
    parse: impl Fn(&EventFields) -> FacilitatorResult<T>,
) -> (Vec<T>, Vec<FacilitatorError>) {
    let mut parsed = Vec::with_capacity(events.len());
    let mut failures = Vec::new();

    for raw in events {
        match parse(&EventFields::new(kind, raw)) {
            Ok(item) => parsed.push(item),
            Err(e) => {
                warn!("⚠️  Skipping {} event: {}", kind, e);
                failures.push(e);
            }
        }
    }

    (parsed, failures)
}

/// Keeps the last item per key, in order of each key's first appearance.
pub fn latest_by_key<T, K>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T>
where
    K: Eq + Hash,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut latest: Vec<T> = Vec::new();

    for item in items {
        match index.get(&key(&item)) {
            Some(&at) => latest[at] = item,
            None => {
                index.insert(key(&item), latest.len());
                latest.push(item);
            }
        }
    }

    latest
}

/// Runs one persistence future per key concurrently and folds the outcomes into a report.
pub async fn persist_each<K, E, F>(
    kind: EventKind,
    items: Vec<(K, F)>,
    mut failures: Vec<FacilitatorError>,
) -> PersistReport<E>
where
    K: Debug,
    F: Future<Output = FacilitatorResult<Option<E>>>,
{
    let (keys, futures): (Vec<K>, Vec<F>) = items.into_iter().unzip();
    let results = join_all(futures).await;

    let mut persisted = Vec::new();
    for (key, result) in keys.into_iter().zip(results) {
        match result {
            Ok(Some(entity)) => persisted.push(entity),
            Ok(None) => {}
            Err(e) => {
                error!("❌ Failed to persist {} for {:?}: {}", kind, key, e);
                failures.push(e);
            }
        }
    }

    PersistReport {
        persisted,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_by_key_keeps_last_item() {
        let items = vec![("a", 1), ("b", 1), ("a", 2), ("c", 1), ("b", 3)];
        let latest = latest_by_key(items, |(k, _)| *k);
        assert_eq!(latest, vec![("a", 2), ("b", 3), ("c", 1)]);
    }

    #[tokio::test]
    async fn test_persist_each_isolates_failures() {
        let items: Vec<(u32, _)> = (1..=3)
            .map(|i| {
                (i, async move {
                    if i == 2 {
                        Err(FacilitatorError::not_found("gateway", i))
                    } else {
                        Ok(Some(i * 10))
                    }
                })
            })
            .collect();

        let report = persist_each(EventKind::GatewayProven, items, Vec::new()).await;
        assert_eq!(report.persisted, vec![10, 30]);
        assert_eq!(report.failures.len(), 1);
    }
}
