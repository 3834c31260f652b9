use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, QueryBuilder};
use tracing::{debug, info};

use super::schema::{COLUMN_MIGRATIONS, DIAGNOSTIC_EVENT_CODES, TABLES, TRIGGERS};
use super::MessageStore;
use crate::config::models::MySqlSettings;
use crate::errors::StorageError;
use crate::messages::{AdvertiserMessage, Message, ReceivedData};

// 13 binds per row keeps a chunk well below the placeholder limit.
const ADVERTISER_ROWS_PER_INSERT: usize = 1000;

/// One row of the `advertiser` table.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertiserRow {
    pub logged_time: NaiveDateTime,
    pub measured_time: Option<NaiveDateTime>,
    pub source_address: u32,
    pub destination_address: u32,
    pub source_endpoint: u8,
    pub destination_endpoint: u8,
    pub travel_time_ms: u64,
    pub qos: u8,
    pub message_type: u8,
    pub reserved: u8,
    pub node_address: u32,
    pub value: u8,
    pub payload: String,
}

/// Flattens messages into one row per (node, sample).
pub fn advertiser_rows(messages: &[AdvertiserMessage], logged_time: NaiveDateTime) -> Vec<AdvertiserRow> {
    let mut rows = Vec::new();
    for message in messages {
        let measured_time = message.data.received_at().map(|t| t.naive_utc());
        let payload = hex::encode(&message.data.data_payload);
        for (node_address, record) in &message.advertisers {
            for value in &record.raw {
                rows.push(AdvertiserRow {
                    logged_time,
                    measured_time,
                    source_address: message.data.source_address,
                    destination_address: message.data.destination_address,
                    source_endpoint: message.data.source_endpoint,
                    destination_endpoint: message.data.destination_endpoint,
                    travel_time_ms: message.data.travel_time_ms,
                    qos: message.data.qos,
                    message_type: message.adv_type,
                    reserved: message.reserved,
                    node_address: *node_address,
                    value: *value,
                    payload: payload.clone(),
                });
            }
        }
    }
    rows
}

#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &MySqlSettings) -> Result<Self, StorageError> {
        let url = settings.url().ok_or_else(|| {
            StorageError::Settings("hostname, username, password and database are required".to_string())
        })?;
        info!(
            hostname = ?settings.hostname,
            port = settings.port,
            database = ?settings.database,
            "Connecting to MySQL"
        );
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.workers.max(1) as u32 + 1)
            .connect(&url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates missing tables, migrates old ones and recreates the triggers.
    pub async fn create_tables(&self) -> Result<(), StorageError> {
        for (name, ddl) in TABLES {
            sqlx::raw_sql(ddl).execute(&self.pool).await?;
            debug!(table = %name, "Table ready");
        }

        for migration in COLUMN_MIGRATIONS {
            if !self.has_column(migration.table, migration.column).await? {
                info!(
                    table = %migration.table,
                    column = %migration.column,
                    "Adding missing column"
                );
                sqlx::raw_sql(migration.alter).execute(&self.pool).await?;
            }
        }

        self.populate_event_codes().await?;

        for (name, ddl) in TRIGGERS {
            let drop = format!("DROP TRIGGER IF EXISTS {}", name);
            sqlx::raw_sql(&drop).execute(&self.pool).await?;
            sqlx::raw_sql(ddl).execute(&self.pool).await?;
            debug!(trigger = %name, "Trigger created");
        }

        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?",
        )
        .bind(table)
        .bind(column)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn populate_event_codes(&self) -> Result<(), StorageError> {
        let mut builder: QueryBuilder<MySql> =
            QueryBuilder::new("REPLACE INTO diagnostic_event_codes (code, name, description) ");
        builder.push_values(DIAGNOSTIC_EVENT_CODES, |mut row, (code, name, description)| {
            row.push_bind(*code).push_bind(*name).push_bind(*description);
        });
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Inserts the packet and returns its row id.
    pub async fn put_to_received_packets(&self, data: &ReceivedData) -> Result<u64, StorageError> {
        let num_bytes = u16::try_from(data.data_payload.len()).unwrap_or(u16::MAX);
        let result = sqlx::query(
            "INSERT INTO received_packets (logged_time, launch_time, path_delay_ms, \
             network_address, sink_address, source_address, dest_address, source_endpoint, \
             dest_endpoint, qos, num_bytes, hop_count) \
             VALUES (FROM_UNIXTIME(?), FROM_UNIXTIME(?), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(data.rx_time_ms_epoch as f64 / 1000.0)
        .bind(data.sent_time_ms() as f64 / 1000.0)
        .bind(data.travel_time_ms)
        .bind(data.network_id)
        .bind(data.destination_address)
        .bind(data.source_address)
        .bind(data.destination_address)
        .bind(data.source_endpoint)
        .bind(data.destination_endpoint)
        .bind(data.qos)
        .bind(num_bytes)
        .bind(data.hop_count.unwrap_or(0))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_id())
    }

    /// Inserts every advertiser sample and returns the number of rows written.
    pub async fn put_advertiser(&self, messages: &[AdvertiserMessage]) -> Result<u64, StorageError> {
        let rows = advertiser_rows(messages, Utc::now().naive_utc());
        let mut inserted = 0;
        for chunk in rows.chunks(ADVERTISER_ROWS_PER_INSERT) {
            let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO advertiser (logged_time, measured_time, source_address, \
                 destination_address, source_endpoint, destination_endpoint, travel_time_ms, \
                 qos, message_type, reserved, node_address, value, payload) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.logged_time)
                    .push_bind(row.measured_time)
                    .push_bind(f64::from(row.source_address))
                    .push_bind(row.destination_address)
                    .push_bind(row.source_endpoint)
                    .push_bind(row.destination_endpoint)
                    .push_bind(row.travel_time_ms)
                    .push_bind(row.qos)
                    .push_bind(row.message_type)
                    .push_bind(row.reserved)
                    .push_bind(row.node_address)
                    .push_bind(i64::from(row.value))
                    .push_bind(row.payload.clone());
            });
            inserted += builder.build().execute(&self.pool).await?.rows_affected();
        }
        debug!(rows = inserted, "Stored advertiser samples");
        Ok(inserted)
    }
}

#[async_trait]
impl MessageStore for MySqlStore {
    async fn store(&self, message: &Message) -> Result<(), StorageError> {
        match message {
            Message::Advertiser(advertiser) => {
                self.put_advertiser(std::slice::from_ref(advertiser)).await?;
            }
            Message::Generic(data) => {
                self.put_to_received_packets(data).await?;
            }
        }
        Ok(())
    }
}
