use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use tiberius::error::Error as TdsError;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::query_history::{normalize_row, query_history_sql};
use crate::core::errors::{CaptureError, Result};
use crate::core::models::capture_record::CaptureRecord;
use crate::core::traits::credentials::{AccessToken, CredentialProvider};
use crate::core::traits::source::CaptureSource;

/// Default TDS port of SQL endpoints.
pub const DEFAULT_TDS_PORT: u16 = 1433;

/// SQL Server error number for a rejected login.
const LOGIN_FAILED: u32 = 18456;

type TdsClient = Client<Compat<TcpStream>>;

/// Reads query history straight from the lakehouse SQL endpoint over TDS,
/// authenticating with an Entra ID (AAD) access token.
///
/// Each poll opens a fresh encrypted connection, runs the query-history
/// statement and closes it. The token is fetched from the
/// `CredentialProvider` on every poll so refreshed tokens are picked up.
pub struct TdsQuerySource<C: CredentialProvider> {
    server: String,
    port: u16,
    database: Option<String>,
    timeout: Duration,
    credentials: C,
    runtime: tokio::runtime::Runtime,
}

impl<C: CredentialProvider> TdsQuerySource<C> {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        database: Option<String>,
        timeout: Duration,
        credentials: C,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CaptureError::InvalidConfig {
                detail: format!("failed to create async runtime: {e}"),
            })?;

        Ok(Self {
            server: server.into(),
            port,
            database,
            timeout,
            credentials,
            runtime,
        })
    }

    fn config(&self, token: &AccessToken) -> Config {
        let mut config = Config::new();
        config.host(&self.server);
        config.port(self.port);
        if let Some(database) = &self.database {
            config.database(database);
        }
        config.authentication(AuthMethod::aad_token(token.secret()));
        config.encryption(EncryptionLevel::Required);
        config.application_name("qhlog");
        config
    }

    async fn open_tcp(&self, addr: String) -> Result<TcpStream> {
        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| CaptureError::Transport {
                reason: format!("cannot reach {addr}: {e}"),
            })?;
        tcp.set_nodelay(true)?;
        Ok(tcp)
    }

    async fn connect(&self, token: &AccessToken) -> Result<TdsClient> {
        let config = self.config(token);
        let tcp = self.open_tcp(config.get_addr()).await?;

        match Client::connect(config, tcp.compat_write()).await {
            Ok(client) => Ok(client),
            // Gateways may redirect the session to another node.
            Err(TdsError::Routing { host, port }) => {
                tracing::debug!(%host, port, "endpoint redirected connection");
                let mut config = self.config(token);
                config.host(&host);
                config.port(port);
                let tcp = self.open_tcp(config.get_addr()).await?;
                Client::connect(config, tcp.compat_write())
                    .await
                    .map_err(classify_error)
            }
            Err(e) => Err(classify_error(e)),
        }
    }

    async fn query(&self, token: &AccessToken, n: usize) -> Result<Vec<Row>> {
        let mut client = self.connect(token).await?;
        let rows = client
            .simple_query(query_history_sql(n))
            .await
            .map_err(classify_error)?
            .into_first_result()
            .await
            .map_err(classify_error)?;

        if let Err(e) = client.close().await {
            tracing::debug!(error = %e, "closing TDS connection failed");
        }
        Ok(rows)
    }
}

impl<C: CredentialProvider> CaptureSource for TdsQuerySource<C> {
    fn fetch_top_queries(&self, n: usize) -> Result<Vec<CaptureRecord>> {
        let token = self.credentials.bearer_token()?;

        let rows = self
            .runtime
            .block_on(tokio::time::timeout(self.timeout, self.query(&token, n)))
            .map_err(|_| CaptureError::Transport {
                reason: format!(
                    "query against {}:{} timed out after {}s",
                    self.server,
                    self.port,
                    self.timeout.as_secs()
                ),
            })??;

        Ok(rows
            .into_iter()
            .take(n)
            .map(|row| normalize_row(row_to_map(row)))
            .collect())
    }

    fn name(&self) -> &str {
        "tds"
    }
}

/// Map a driver error to the error taxonomy.
fn classify_error(e: TdsError) -> CaptureError {
    match e {
        TdsError::Server(ref token) if token.code() == LOGIN_FAILED => {
            CaptureError::Authentication {
                reason: format!("login rejected by the SQL endpoint: {e}"),
            }
        }
        TdsError::Io { .. } | TdsError::Tls(_) | TdsError::Routing { .. } => {
            CaptureError::Transport {
                reason: e.to_string(),
            }
        }
        _ => CaptureError::Remote {
            reason: e.to_string(),
        },
    }
}

fn row_to_map(row: Row) -> Map<String, Value> {
    let names: Vec<String> = row
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    names
        .into_iter()
        .zip(row)
        .map(|(name, data)| (name, column_value(data)))
        .collect()
}

/// Convert one column to JSON. Dates become ISO-8601 strings, decimals
/// become numbers, binary becomes a `0x` hex string.
fn column_value(data: ColumnData<'static>) -> Value {
    let value = match data {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::from),
        ColumnData::F32(v) => v.map(|f| Value::from(f64::from(f))),
        ColumnData::F64(v) => v.map(Value::from),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())),
        ColumnData::Numeric(v) => {
            v.map(|n| Value::from(n.value() as f64 / 10f64.powi(i32::from(n.scale()))))
        }
        ColumnData::Binary(v) => v.map(|bytes| {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            Value::String(format!("0x{hex}"))
        }),
        ColumnData::Xml(v) => v.map(|xml| Value::String(xml.into_owned().into_string())),
        other => temporal_value(&other),
    };
    value.unwrap_or(Value::Null)
}

fn temporal_value(data: &ColumnData<'static>) -> Option<Value> {
    if let Ok(Some(at)) = DateTime::<Utc>::from_sql(data) {
        return Some(Value::String(at.to_rfc3339()));
    }
    if let Ok(Some(at)) = NaiveDateTime::from_sql(data) {
        return Some(Value::String(at.format("%Y-%m-%dT%H:%M:%S%.f").to_string()));
    }
    if let Ok(Some(day)) = NaiveDate::from_sql(data) {
        return Some(Value::String(day.to_string()));
    }
    if let Ok(Some(time)) = NaiveTime::from_sql(data) {
        return Some(Value::String(time.to_string()));
    }
    None
}
