use async_trait::async_trait;
use config::LoaderConfig;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Executor};

pub const WAREHOUSE_PORT: u16 = 5439;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("warehouse statement failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("warehouse rejected the load: {0}")]
    Rejected(String),
}

/// Seam between the load flow and the warehouse so tests can run against an
/// in-memory stand-in.
#[async_trait]
pub trait Warehouse: Send {
    async fn execute(&mut self, sql: &str) -> Result<(), LoadError>;
}

/// One Postgres-protocol connection to the warehouse. Statements run outside
/// any transaction, so table setup and the COPY each commit on their own.
pub struct PgWarehouse {
    connection: PgConnection,
}

impl PgWarehouse {
    pub async fn connect(loader_config: &LoaderConfig) -> Result<Self, LoadError> {
        let options = PgConnectOptions::new()
            .host(&loader_config.warehouse_host)
            .port(WAREHOUSE_PORT)
            .database(&loader_config.warehouse_db)
            .username(&loader_config.credentials.user)
            .password(&loader_config.credentials.password)
            .ssl_mode(PgSslMode::Prefer);

        let connection = PgConnection::connect_with(&options).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn execute(&mut self, sql: &str) -> Result<(), LoadError> {
        self.connection.execute(sql).await?;
        Ok(())
    }
}

/// In-memory warehouse for tests: records every statement and keeps just
/// enough table state to check truncation and the maxerror threshold.
#[derive(Default)]
pub struct MemoryWarehouse {
    pub statements: Vec<String>,
    pub staged_rows: usize,
    incoming_rows: usize,
    malformed_rows: usize,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-existing rows in the staging table, e.g. from a previous run.
    pub fn with_staged_rows(mut self, rows: usize) -> Self {
        self.staged_rows = rows;
        self
    }

    /// What the next COPY would find at the source path.
    pub fn with_incoming(mut self, rows: usize, malformed: usize) -> Self {
        self.incoming_rows = rows;
        self.malformed_rows = malformed;
        self
    }

    fn max_errors(sql: &str) -> Option<usize> {
        let mut tokens = sql.split_whitespace();
        tokens
            .by_ref()
            .find(|token| *token == "maxerror")
            .and_then(|_| tokens.next())
            .and_then(|limit| limit.parse().ok())
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn execute(&mut self, sql: &str) -> Result<(), LoadError> {
        self.statements.push(sql.to_string());

        if sql.starts_with("truncate") {
            self.staged_rows = 0;
        } else if sql.starts_with("copy") {
            let tolerated = Self::max_errors(sql).unwrap_or(0);
            if self.malformed_rows > tolerated {
                return Err(LoadError::Rejected(format!(
                    "{} malformed rows exceed maxerror {tolerated}",
                    self.malformed_rows,
                )));
            }

            self.staged_rows += self.incoming_rows.saturating_sub(self.malformed_rows);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements;

    fn copy() -> String {
        statements::copy_from("s3://b/p/", "us-east-1", "arn:aws:iam::123:role/x")
    }

    #[tokio::test]
    async fn rejects_a_copy_with_more_than_ten_malformed_rows() {
        let mut memory_warehouse = MemoryWarehouse::new().with_incoming(100, 11);

        let load_error = memory_warehouse.execute(&copy()).await.unwrap_err();
        assert!(matches!(load_error, LoadError::Rejected(_)));
    }

    #[tokio::test]
    async fn accepts_a_copy_with_up_to_ten_malformed_rows() {
        let mut memory_warehouse = MemoryWarehouse::new().with_incoming(100, 10);

        memory_warehouse.execute(&copy()).await.unwrap();
        assert_eq!(memory_warehouse.staged_rows, 90);
    }

    #[tokio::test]
    async fn truncate_empties_the_table() {
        let mut memory_warehouse = MemoryWarehouse::new().with_staged_rows(42);

        memory_warehouse.execute(statements::TRUNCATE).await.unwrap();
        assert_eq!(memory_warehouse.staged_rows, 0);
    }

    #[test]
    fn max_errors_reads_the_copy_option() {
        assert_eq!(MemoryWarehouse::max_errors(&copy()), Some(10));
        assert_eq!(MemoryWarehouse::max_errors("truncate table x"), None);
    }
}
