use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::auth::BookqAuthSource;
use crate::engine::{
    amount_or_zero, payment_label, payment_status_or_pending, source_label, status_label, Engine,
    EngineError, PropertyNames, QueryContext,
};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct BookqHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<BookqQueryParser>,
}

impl BookqHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(BookqQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Parse, execute and record metrics for one statement.
    async fn run(
        &self,
        engine: Arc<Engine>,
        query: &str,
        format: &Format,
    ) -> PgWireResult<Vec<Response>> {
        let cmd = match sql::parse_sql(query) {
            Ok(cmd) => cmd,
            Err(e) => {
                metrics::counter!(observability::QUERIES_TOTAL, "command" => "invalid", "status" => "error")
                    .increment(1);
                return Err(sql_err(e));
            }
        };
        let label = observability::command_label(&cmd);
        debug!("{label}: {cmd:?}");

        let started = Instant::now();
        let result = self.execute_command(engine, cmd, format).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(
        &self,
        engine: Arc<Engine>,
        cmd: Command,
        format: &Format,
    ) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::SelectBookings { params } => {
                // One snapshot for both the view and the property names.
                let snapshot = engine.snapshot();
                let ctx = QueryContext::current(engine.policy());
                let outcome = engine.query_snapshot(&snapshot, &ctx, &params);
                let names = PropertyNames::new(&snapshot.properties);
                let schema = Arc::new(bookings_schema(format));
                let rows: Vec<PgWireResult<_>> = outcome
                    .view
                    .iter()
                    .map(|b| encode_booking(&schema, b, &names))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectStats => {
                let stats = engine.stats();
                let schema = Arc::new(stats_schema(format));
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&(stats.total_bookings as i64))?;
                encoder.encode_field(&(stats.confirmed_bookings as i64))?;
                encoder.encode_field(&(stats.pending_bookings as i64))?;
                encoder.encode_field(&(stats.checked_in_bookings as i64))?;
                encoder.encode_field(&stats.total_revenue)?;
                encoder.encode_field(&stats.paid_revenue)?;
                encoder.encode_field(&stats.pending_payments)?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectProperties => {
                let properties = engine.properties();
                let schema = Arc::new(properties_schema(format));
                let rows: Vec<PgWireResult<_>> = properties
                    .iter()
                    .map(|p| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&p.id)?;
                        encoder.encode_field(&p.name)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::Refresh => {
                let dir = engine.dir().display().to_string();
                let count = tokio::task::spawn_blocking(move || engine.reload())
                    .await
                    .map_err(|e| PgWireError::ApiError(Box::new(e)))?
                    .map_err(engine_err)?;
                info!("refreshed {dir}: {count} bookings");
                Ok(vec![Response::Execution(Tag::new("REFRESH").with_rows(count))])
            }
        }
    }
}

fn encode_booking(
    schema: &Arc<Vec<FieldInfo>>,
    b: &BookingRecord,
    names: &PropertyNames<'_>,
) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&b.id)?;
    encoder.encode_field(&b.property_id)?;
    encoder.encode_field(&names.display(b.property_id).into_owned())?;
    encoder.encode_field(&b.guest_name)?;
    encoder.encode_field(&b.guest_email)?;
    encoder.encode_field(&b.booking_reference)?;
    encoder.encode_field(&b.check_in)?;
    encoder.encode_field(&b.check_out)?;
    encoder.encode_field(&b.nights())?;
    encoder.encode_field(&amount_or_zero(b.total_amount.as_deref()))?;
    encoder.encode_field(&b.amount_due.as_deref().map(|s| amount_or_zero(Some(s))))?;
    encoder.encode_field(&b.status)?;
    encoder.encode_field(&status_label(b.status.as_deref()))?;
    encoder.encode_field(&payment_status_or_pending(b.payment_status.as_deref()))?;
    encoder.encode_field(&payment_label(b.payment_status.as_deref()))?;
    encoder.encode_field(&b.source)?;
    encoder.encode_field(&source_label(&b.source).to_string())?;
    Ok(encoder.take_row())
}

/// Field infos for `columns`, each in the format the client asked for.
fn fields(columns: &[(&str, Type)], format: &Format) -> Vec<FieldInfo> {
    columns
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| {
            FieldInfo::new(
                (*name).into(),
                None,
                None,
                ty.clone(),
                format.format_for(i),
            )
        })
        .collect()
}

fn bookings_schema(format: &Format) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::INT8),
            ("property_id", Type::INT8),
            ("property", Type::VARCHAR),
            ("guest_name", Type::VARCHAR),
            ("guest_email", Type::VARCHAR),
            ("booking_reference", Type::VARCHAR),
            ("check_in", Type::VARCHAR),
            ("check_out", Type::VARCHAR),
            ("nights", Type::INT8),
            ("total_amount", Type::FLOAT8),
            ("amount_due", Type::FLOAT8),
            ("status", Type::VARCHAR),
            ("status_label", Type::VARCHAR),
            ("payment_status", Type::VARCHAR),
            ("payment_label", Type::VARCHAR),
            ("source", Type::VARCHAR),
            ("source_label", Type::VARCHAR),
        ],
        format,
    )
}

fn stats_schema(format: &Format) -> Vec<FieldInfo> {
    fields(
        &[
            ("total_bookings", Type::INT8),
            ("confirmed_bookings", Type::INT8),
            ("pending_bookings", Type::INT8),
            ("checked_in_bookings", Type::INT8),
            ("total_revenue", Type::FLOAT8),
            ("paid_revenue", Type::FLOAT8),
            ("pending_payments", Type::FLOAT8),
        ],
        format,
    )
}

fn properties_schema(format: &Format) -> Vec<FieldInfo> {
    fields(&[("id", Type::INT8), ("name", Type::VARCHAR)], format)
}

/// Result columns for a statement, judged from the table it reads.
fn schema_for(sql: &str, format: &Format) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        vec![]
    } else if upper.contains("BOOKING_STATS") {
        stats_schema(format)
    } else if upper.contains("BOOKINGS") {
        bookings_schema(format)
    } else if upper.contains("PROPERTIES") {
        properties_schema(format)
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for BookqHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        self.run(engine, query, &Format::UnifiedText).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct BookqQueryParser;

#[async_trait]
impl QueryParser for BookqQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for(stmt, column_format.unwrap_or(&Format::UnifiedText)))
    }
}

#[async_trait]
impl ExtendedQueryHandler for BookqHandler {
    type Statement = String;
    type QueryParser = BookqQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let mut responses = self.run(engine, &sql, &portal.result_column_format).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, schema_for(
            &target.statement,
            &Format::UnifiedText,
        )))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for(
            &target.statement.statement,
            &target.result_column_format,
        )))
    }
}

/// Highest `$N` placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

/// Substitute `$1, $2, ...` with bound parameter values as quoted text.
fn substitute_params(portal: &Portal<String>) -> String {
    let values: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute_values(&portal.statement.statement, &values)
}

/// Single left-to-right pass over the template, so inserted values are never rescanned.
/// Placeholders inside quoted literals and unbound indexes are copied through unchanged.
fn substitute_values(sql: &str, values: &[Option<String>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut in_literal = false;
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
            continue;
        }
        if c != '$' || in_literal {
            out.push(c);
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = j + 1;
            chars.next();
        }
        let bound = sql[start..end]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| values.get(idx));
        match bound {
            Some(Some(text)) => {
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            None => out.push_str(&sql[i..end]),
        }
    }
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct BookqFactory {
    handler: Arc<BookqHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<BookqAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl BookqFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, auth_source: BookqAuthSource) -> Self {
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(BookqHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for BookqFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    auth_source: BookqAuthSource,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(BookqFactory::new(tenant_manager, auth_source));
    pgwire::tokio::process_socket(socket, tls, factory)
        .await
        .map_err(io::Error::other)
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
