//! Transaction Database Layer
//!
//! PostgreSQL-backed [`TransactionStore`]. Status writes use atomic CAS
//! on the `status` column; amounts are stored as decimal text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::error::StoreError;
use super::state::TxStatus;
use super::store::TransactionStore;
use super::types::{Page, PageRequest, StatusUpdate, TokenType, TransactionRecord};

const SELECT_COLUMNS: &str = r#"
    id, sender_id, recipient_id, conversation_id, message_id, token_type,
    token_address, token_id, amount, tx_hash, status, status_updated_at,
    block_number, block_hash, receipt, error, completed_at, metadata, created_at
"#;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS transactions_tb (
        id                UUID PRIMARY KEY,
        sender_id         TEXT NOT NULL,
        recipient_id      TEXT NOT NULL,
        conversation_id   TEXT NOT NULL,
        message_id        TEXT,
        token_type        TEXT NOT NULL,
        token_address     TEXT,
        token_id          TEXT,
        amount            TEXT NOT NULL CHECK (amount ~ '^[0-9]+$'),
        tx_hash           TEXT NOT NULL,
        status            TEXT NOT NULL,
        status_updated_at TIMESTAMPTZ NOT NULL,
        block_number      BIGINT,
        block_hash        TEXT,
        receipt           JSONB,
        error             TEXT,
        completed_at      TIMESTAMPTZ,
        metadata          JSONB,
        created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_tx_hash ON transactions_tb (tx_hash)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions_tb (sender_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_recipient ON transactions_tb (recipient_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_conversation ON transactions_tb (conversation_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions_tb (status)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions_tb (created_at)",
];

/// Transaction database operations
/// BIGINT holds block numbers up to i64::MAX
fn block_number_to_db(block_number: Option<u64>) -> Result<Option<i64>, StoreError> {
    block_number
        .map(|n| {
            i64::try_from(n)
                .map_err(|_| StoreError::Corrupt(format!("block number {} exceeds BIGINT", n)))
        })
        .transpose()
}

fn block_number_from_db(block_number: Option<i64>) -> Result<Option<u64>, StoreError> {
    block_number
        .map(|n| {
            u64::try_from(n).map_err(|_| StoreError::Corrupt(format!("negative block number {}", n)))
        })
        .transpose()
}

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and indexes if missing (idempotent)
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("transactions_tb schema ready");
        Ok(())
    }

    /// Newest-first page of rows matching `filter` (one text bind, `$1`)
    async fn fetch_page(
        &self,
        filter: &'static str,
        key: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM transactions_tb WHERE {}",
            filter
        ))
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions_tb
            WHERE {}
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            SELECT_COLUMNS, filter
        ))
        .bind(key)
        .bind(page.limit as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: total.max(0) as u64,
        })
    }

    fn row_to_record(row: &PgRow) -> Result<TransactionRecord, StoreError> {
        let token_type: String = row.try_get("token_type")?;
        let token_type = token_type
            .parse::<TokenType>()
            .map_err(StoreError::Corrupt)?;
        let status: String = row.try_get("status")?;
        let status = status.parse::<TxStatus>().map_err(StoreError::Corrupt)?;
        let block_number = block_number_from_db(row.try_get("block_number")?)?;

        Ok(TransactionRecord {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            recipient_id: row.try_get("recipient_id")?,
            conversation_id: row.try_get("conversation_id")?,
            message_id: row.try_get("message_id")?,
            token_type,
            token_address: row.try_get("token_address")?,
            token_id: row.try_get("token_id")?,
            amount: row.try_get("amount")?,
            tx_hash: row.try_get("tx_hash")?,
            status,
            status_updated_at: row.try_get("status_updated_at")?,
            block_number,
            block_hash: row.try_get("block_hash")?,
            receipt: row.try_get("receipt")?,
            error: row.try_get("error")?,
            completed_at: row.try_get("completed_at")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions_tb
                (id, sender_id, recipient_id, conversation_id, message_id, token_type,
                 token_address, token_id, amount, tx_hash, status, status_updated_at,
                 metadata, created_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(&record.sender_id)
        .bind(&record.recipient_id)
        .bind(&record.conversation_id)
        .bind(&record.message_id)
        .bind(record.token_type.as_str())
        .bind(&record.token_address)
        .bind(&record.token_id)
        .bind(&record.amount)
        .bind(&record.tx_hash)
        .bind(record.status.as_str())
        .bind(record.status_updated_at)
        .bind(&record.metadata)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions_tb WHERE tx_hash = $1",
            SELECT_COLUMNS
        ))
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn apply_status(
        &self,
        expected: TxStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        let block_number = block_number_to_db(update.block_number)?;
        let result = sqlx::query(
            r#"
            UPDATE transactions_tb
            SET status = $1,
                status_updated_at = $2,
                block_number = COALESCE($3, block_number),
                block_hash = COALESCE($4, block_hash),
                receipt = COALESCE($5, receipt),
                error = COALESCE($6, error),
                completed_at = CASE
                    WHEN $7 AND completed_at IS NULL THEN $2
                    ELSE completed_at
                END
            WHERE tx_hash = $8 AND status = $9
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.timestamp)
        .bind(block_number)
        .bind(&update.block_hash)
        .bind(&update.receipt)
        .bind(&update.error)
        .bind(update.status.is_terminal())
        .bind(&update.tx_hash)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_in_flight(
        &self,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let hashes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT tx_hash FROM transactions_tb
            WHERE status <> ALL($1) AND created_at > $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(TxStatus::terminal_names())
        .bind(created_after)
        .fetch_all(&self.pool)
        .await?;

        Ok(hashes)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        self.fetch_page("sender_id = $1 OR recipient_id = $1", user_id, page)
            .await
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        self.fetch_page("conversation_id = $1", conversation_id, page)
            .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
