use std::{collections::{BTreeMap, HashMap}, sync::Arc};

use anyhow::{Context, Result, anyhow};
use ethers::{
    abi::{Event, RawLog, Token, parse_abi},
    providers::{Http, Middleware, Provider},
    types::{Address, Filter, H256, Log},
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    database::store::CheckpointStore,
    handlers::event::{BLOCK_NUMBER, CONTRACT_ADDRESS, EventKind, RawEvent, TRANSACTION_HASH},
};

/// Events of one polled block range, grouped by kind.
#[derive(Debug, Default)]
pub struct EventBatch {
    pub from_block: u64,
    pub to_block: u64,
    pub events: BTreeMap<EventKind, Vec<RawEvent>>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns logs into raw events using human-readable ABI event fragments.
pub struct EventDecoder {
    events: HashMap<H256, (EventKind, Event)>,
}

impl EventDecoder {
    pub fn new(fragments: &[&str]) -> Result<Self> {
        let abi = parse_abi(fragments).map_err(|e| anyhow!("Invalid event fragment: {}", e))?;

        let mut events = HashMap::new();
        for event in abi.events() {
            let kind = event
                .name
                .parse::<EventKind>()
                .with_context(|| format!("No handler for event {}", event.name))?;
            events.insert(event.signature(), (kind, event.clone()));
        }
        Ok(Self { events })
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self.events.values().map(|(kind, _)| *kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// `None` for logs whose topic is not one of the known events.
    pub fn decode(&self, log: &Log) -> Result<Option<(EventKind, RawEvent)>> {
        let Some((kind, event)) = log.topics.first().and_then(|topic| self.events.get(topic))
        else {
            return Ok(None);
        };

        let decoded = event
            .parse_log(RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            })
            .with_context(|| format!("Failed to decode {} log", kind))?;

        let mut raw = RawEvent::new();
        for param in decoded.params {
            raw.insert(param.name, token_value(param.value));
        }
        raw.insert(CONTRACT_ADDRESS.into(), Value::String(format!("{:?}", log.address)));
        if let Some(block) = log.block_number {
            raw.insert(BLOCK_NUMBER.into(), Value::from(block.as_u64()));
        }
        if let Some(tx_hash) = log.transaction_hash {
            raw.insert(TRANSACTION_HASH.into(), Value::String(format!("{:?}", tx_hash)));
        }

        Ok(Some((*kind, raw)))
    }
}

fn token_value(token: Token) -> Value {
    match token {
        Token::Address(address) => Value::String(format!("{:?}", address)),
        Token::Uint(value) | Token::Int(value) => Value::String(value.to_string()),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Bool(flag) => Value::Bool(flag),
        Token::String(text) => Value::String(text),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.into_iter().map(token_value).collect())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimits {
    pub start_block: u64,
    pub confirmations: u64,
    pub max_block_range: u64,
}

/// Next range to poll: from just after the checkpoint up to the confirmed head, capped.
pub fn next_range(checkpoint: Option<u64>, latest: u64, limits: RangeLimits) -> Option<(u64, u64)> {
    let from = checkpoint.map_or(limits.start_block, |block| block + 1);
    let confirmed = latest.checked_sub(limits.confirmations)?;
    if from > confirmed {
        return None;
    }
    let span = limits.max_block_range.max(1);
    Some((from, confirmed.min(from + span - 1)))
}

/// Polls one chain's contracts for facilitator events.
pub struct EventSource {
    name: String,
    provider: Provider<Http>,
    contracts: Vec<Address>,
    decoder: EventDecoder,
    checkpoints: Arc<dyn CheckpointStore>,
    limits: RangeLimits,
}

impl EventSource {
    pub fn new(
        name: impl Into<String>,
        provider: Provider<Http>,
        contracts: Vec<Address>,
        fragments: &[&str],
        checkpoints: Arc<dyn CheckpointStore>,
        limits: RangeLimits,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            provider,
            contracts,
            decoder: EventDecoder::new(fragments)?,
            checkpoints,
            limits,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetches the next confirmed range, or `None` when the source is caught up.
    pub async fn poll(&self) -> Result<Option<EventBatch>> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| anyhow!("{}: failed to get block number: {}", self.name, e))?
            .as_u64();
        let checkpoint = self.checkpoints.checkpoint(&self.name).await?;

        let Some((from_block, to_block)) = next_range(checkpoint, latest, self.limits) else {
            debug!("⏭️  {} caught up at {}", self.name, latest);
            return Ok(None);
        };

        let filter = Filter::new()
            .address(self.contracts.clone())
            .from_block(from_block)
            .to_block(to_block);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| anyhow!("{}: failed to fetch logs: {}", self.name, e))?;

        let mut batch = EventBatch {
            from_block,
            to_block,
            events: BTreeMap::new(),
        };
        for log in &logs {
            match self.decoder.decode(log) {
                Ok(Some((kind, event))) => batch.events.entry(kind).or_default().push(event),
                Ok(None) => {}
                Err(e) => warn!("⚠️  {}: skipping log {:?}: {:#}", self.name, log.transaction_hash, e),
            }
        }

        info!(
            "📥 {}: {} event(s) in blocks {}..={}",
            self.name,
            batch.len(),
            from_block,
            to_block
        );
        Ok(Some(batch))
    }

    /// Marks `batch` as fully ingested.
    pub async fn commit(&self, batch: &EventBatch) -> Result<()> {
        self.checkpoints
            .save_checkpoint(&self.name, batch.to_block)
            .await
    }
}
