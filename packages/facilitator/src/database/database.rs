use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use ethers::types::{Address, H256, TxHash};
use tracing::info;

use crate::{
    database::{
        model::{
            DbAuxiliaryChain, DbChainTransaction, DbGateway, DbMessage,
            DbMessageTransferRequest, NewChainTransaction, height_column, parse_h256, to_hex,
        },
        store::{
            CheckpointStore, EntityStore, MessageQueries, RequestQueries, TransactionJournal,
            is_pending_confirmation,
        },
    },
    models::{
        model::{AuxiliaryChain, Gateway, Message, MessageStatus, MessageTransferRequest},
        schema::{
            auxiliary_chains, chain_transactions, gateways, indexer_checkpoints,
            message_secrets, message_transfer_requests, messages,
        },
    },
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Debug)]
pub enum DatabaseSetupError {
    DbConnectionError(::r2d2::Error),
    ErrorRunningMigrations,
}

impl std::fmt::Display for DatabaseSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseSetupError::DbConnectionError(e) => {
                write!(f, "Database connection error: {}", e)
            }
            DatabaseSetupError::ErrorRunningMigrations => write!(f, "Error running migrations"),
        }
    }
}

impl std::error::Error for DatabaseSetupError {}

/// PostgreSQL store. Every query runs on the blocking pool.
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    pub fn new(database_url: &str, max_connection: u32) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_connection)
            .build(manager)
            .context("Failed to create database pool")?;

        Ok(Database { pool })
    }

    pub fn run_migrations(pool: &DbPool) -> Result<(), DatabaseSetupError> {
        info!("📊 Running database migrations");
        let mut conn = pool.get().map_err(DatabaseSetupError::DbConnectionError)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|_| DatabaseSetupError::ErrorRunningMigrations)?;
        info!("✅ Migrations completed");
        Ok(())
    }

    pub fn health_check(&self) -> Result<()> {
        let mut conn = self
            .get_connection()
            .context("Database connection failed")?;

        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .context("Database query failed")?;

        Ok(())
    }

    pub fn get_connection(&self) -> Result<DbConnection> {
        self.pool.get().context("Failed to get database connection")
    }

    /// Runs `query` with a pooled connection on tokio's blocking pool.
    async fn blocking<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().context("Failed to get database connection")?;
            query(&mut conn)
        })
        .await
        .map_err(|e| anyhow!("Database task failed: {}", e))?
    }
}

// ==================== Entities ====================

#[async_trait]
impl EntityStore<Message> for Database {
    async fn get(&self, key: &H256) -> Result<Option<Message>> {
        let key = to_hex(key);
        self.blocking(move |conn| {
            messages::table
                .find(key)
                .select(DbMessage::as_select())
                .first::<DbMessage>(conn)
                .optional()
                .context("Failed to get message")?
                .map(DbMessage::into_entity)
                .transpose()
        })
        .await
    }

    async fn put(&self, entity: &Message) -> Result<()> {
        let row = DbMessage::from_entity(entity)?;
        self.blocking(move |conn| {
            diesel::insert_into(messages::table)
                .values(&row)
                .on_conflict(messages::message_hash)
                .do_update()
                .set((&row, messages::updated_at.eq(Utc::now())))
                .execute(conn)
                .context("Failed to upsert message")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EntityStore<MessageTransferRequest> for Database {
    async fn get(&self, key: &H256) -> Result<Option<MessageTransferRequest>> {
        let key = to_hex(key);
        self.blocking(move |conn| {
            message_transfer_requests::table
                .find(key)
                .select(DbMessageTransferRequest::as_select())
                .first::<DbMessageTransferRequest>(conn)
                .optional()
                .context("Failed to get message transfer request")?
                .map(DbMessageTransferRequest::into_entity)
                .transpose()
        })
        .await
    }

    async fn put(&self, entity: &MessageTransferRequest) -> Result<()> {
        let row = DbMessageTransferRequest::from_entity(entity)?;
        self.blocking(move |conn| {
            diesel::insert_into(message_transfer_requests::table)
                .values(&row)
                .on_conflict(message_transfer_requests::request_hash)
                .do_update()
                .set((&row, message_transfer_requests::updated_at.eq(Utc::now())))
                .execute(conn)
                .context("Failed to upsert message transfer request")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EntityStore<Gateway> for Database {
    async fn get(&self, key: &Address) -> Result<Option<Gateway>> {
        let key = to_hex(key);
        self.blocking(move |conn| {
            gateways::table
                .find(key)
                .select(DbGateway::as_select())
                .first::<DbGateway>(conn)
                .optional()
                .context("Failed to get gateway")?
                .map(DbGateway::into_entity)
                .transpose()
        })
        .await
    }

    async fn put(&self, entity: &Gateway) -> Result<()> {
        let row = DbGateway::from_entity(entity)?;
        self.blocking(move |conn| {
            diesel::insert_into(gateways::table)
                .values(&row)
                .on_conflict(gateways::gateway_address)
                .do_update()
                .set((&row, gateways::updated_at.eq(Utc::now())))
                .execute(conn)
                .context("Failed to upsert gateway")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EntityStore<AuxiliaryChain> for Database {
    async fn get(&self, key: &u64) -> Result<Option<AuxiliaryChain>> {
        let key = height_column(*key)?;
        self.blocking(move |conn| {
            auxiliary_chains::table
                .find(key)
                .select(DbAuxiliaryChain::as_select())
                .first::<DbAuxiliaryChain>(conn)
                .optional()
                .context("Failed to get auxiliary chain")?
                .map(DbAuxiliaryChain::into_entity)
                .transpose()
        })
        .await
    }

    async fn put(&self, entity: &AuxiliaryChain) -> Result<()> {
        let row = DbAuxiliaryChain::from_entity(entity)?;
        self.blocking(move |conn| {
            diesel::insert_into(auxiliary_chains::table)
                .values(&row)
                .on_conflict(auxiliary_chains::chain_id)
                .do_update()
                .set((&row, auxiliary_chains::updated_at.eq(Utc::now())))
                .execute(conn)
                .context("Failed to upsert auxiliary chain")?;
            Ok(())
        })
        .await
    }
}

// ==================== Message Queries ====================

#[async_trait]
impl MessageQueries for Database {
    async fn messages_pending_confirmation(
        &self,
        gateway: Address,
        block_height: u64,
    ) -> Result<Vec<Message>> {
        let gateway_column = to_hex(&gateway);
        let height = height_column(block_height)?;

        let rows = self
            .blocking(move |conn| {
                messages::table
                    .filter(messages::gateway_address.eq(gateway_column))
                    .filter(messages::source_status.eq(MessageStatus::Declared.as_str()))
                    .filter(messages::target_status.eq(MessageStatus::Undeclared.as_str()))
                    .filter(messages::hash_lock.is_not_null())
                    .filter(messages::source_declaration_block_height.le(height))
                    .order(messages::source_declaration_block_height.asc())
                    .select(DbMessage::as_select())
                    .load::<DbMessage>(conn)
                    .context("Failed to load messages pending confirmation")
            })
            .await?;

        let messages = rows
            .into_iter()
            .map(DbMessage::into_entity)
            .collect::<Result<Vec<_>>>()?;
        Ok(messages
            .into_iter()
            .filter(|m| is_pending_confirmation(m, gateway, block_height))
            .collect())
    }

    async fn put_secret(&self, message_hash: H256, secret: H256) -> Result<()> {
        let (message_hash, secret) = (to_hex(&message_hash), to_hex(&secret));
        self.blocking(move |conn| {
            diesel::insert_into(message_secrets::table)
                .values((
                    message_secrets::message_hash.eq(&message_hash),
                    message_secrets::secret.eq(&secret),
                    message_secrets::created_at.eq(Utc::now()),
                ))
                .on_conflict(message_secrets::message_hash)
                .do_update()
                .set(message_secrets::secret.eq(&secret))
                .execute(conn)
                .context("Failed to store message secret")?;
            Ok(())
        })
        .await
    }

    async fn get_secret(&self, message_hash: H256) -> Result<Option<H256>> {
        let key = to_hex(&message_hash);
        self.blocking(move |conn| {
            message_secrets::table
                .find(key)
                .select(message_secrets::secret)
                .first::<String>(conn)
                .optional()
                .context("Failed to get message secret")?
                .map(|secret| parse_h256(&secret))
                .transpose()
        })
        .await
    }
}

// ==================== Request Queries ====================

#[async_trait]
impl RequestQueries for Database {
    async fn request_by_message_hash(
        &self,
        message_hash: H256,
    ) -> Result<Option<MessageTransferRequest>> {
        let key = to_hex(&message_hash);
        self.blocking(move |conn| {
            message_transfer_requests::table
                .filter(message_transfer_requests::message_hash.eq(key))
                .select(DbMessageTransferRequest::as_select())
                .first::<DbMessageTransferRequest>(conn)
                .optional()
                .context("Failed to get request by message hash")?
                .map(DbMessageTransferRequest::into_entity)
                .transpose()
        })
        .await
    }

    async fn uncommitted_requests(&self) -> Result<Vec<MessageTransferRequest>> {
        self.blocking(|conn| {
            message_transfer_requests::table
                .filter(message_transfer_requests::message_hash.is_null())
                .order(message_transfer_requests::block_number.asc())
                .select(DbMessageTransferRequest::as_select())
                .load::<DbMessageTransferRequest>(conn)
                .context("Failed to load uncommitted requests")?
                .into_iter()
                .map(DbMessageTransferRequest::into_entity)
                .collect()
        })
        .await
    }
}

// ==================== Chain Transaction Logging ====================

#[async_trait]
impl TransactionJournal for Database {
    async fn record_transaction(
        &self,
        chain_id: u64,
        call_label: &str,
        tx_hash: TxHash,
        status: &str,
    ) -> Result<()> {
        let chain_id = height_column(chain_id)?;
        let (call_label, tx_hash, status) =
            (call_label.to_string(), to_hex(&tx_hash), status.to_string());

        self.blocking(move |conn| {
            let timestamp = Utc::now().timestamp();
            let new_tx = NewChainTransaction {
                chain_id,
                call_label: &call_label,
                tx_hash: &tx_hash,
                status: &status,
                timestamp,
                created_at: Utc::now(),
            };

            diesel::insert_into(chain_transactions::table)
                .values(&new_tx)
                .on_conflict(chain_transactions::tx_hash)
                .do_update()
                .set((
                    chain_transactions::status.eq(&status),
                    chain_transactions::timestamp.eq(timestamp),
                ))
                .execute(conn)
                .context("Failed to log chain transaction")?;
            Ok(())
        })
        .await
    }

    async fn transaction_status(&self, tx_hash: TxHash) -> Result<Option<String>> {
        let key = to_hex(&tx_hash);
        self.blocking(move |conn| {
            let row = chain_transactions::table
                .filter(chain_transactions::tx_hash.eq(key))
                .select(DbChainTransaction::as_select())
                .first::<DbChainTransaction>(conn)
                .optional()
                .context("Failed to get transaction by hash")?;
            Ok(row.map(|tx| tx.status))
        })
        .await
    }
}

// ==================== Indexer Checkpoints ====================

#[async_trait]
impl CheckpointStore for Database {
    async fn checkpoint(&self, source: &str) -> Result<Option<u64>> {
        let source = source.to_string();
        self.blocking(move |conn| {
            let block = indexer_checkpoints::table
                .filter(indexer_checkpoints::chain.eq(source))
                .select(indexer_checkpoints::last_block)
                .first::<i64>(conn)
                .optional()
                .context("Failed to get indexer checkpoint")?;
            Ok(block.and_then(|b| u64::try_from(b).ok()))
        })
        .await
    }

    async fn save_checkpoint(&self, source: &str, block_number: u64) -> Result<()> {
        let source = source.to_string();
        let block = height_column(block_number)?;
        self.blocking(move |conn| {
            diesel::insert_into(indexer_checkpoints::table)
                .values((
                    indexer_checkpoints::chain.eq(&source),
                    indexer_checkpoints::last_block.eq(block),
                    indexer_checkpoints::updated_at.eq(Utc::now()),
                ))
                .on_conflict(indexer_checkpoints::chain)
                .do_update()
                .set((
                    indexer_checkpoints::last_block.eq(block),
                    indexer_checkpoints::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .context("Failed to save indexer checkpoint")?;
            Ok(())
        })
        .await
    }
}
