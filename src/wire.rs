use std::cmp::Ordering;
use std::fmt::Debug;
use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
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
use ulid::Ulid;

use crate::auth::HousebookAuthSource;
use crate::calendar::now_ms;
use crate::model::*;
use crate::observability;
use crate::sql::{self, CmpOp, Command, Filter, Literal, Table};
use crate::store::{KitchenFilter, ProjectorFilter, Store, StoreError};

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    store: Arc<Store>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(HousebookFactory::new(store, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

pub struct HousebookHandler {
    store: Arc<Store>,
    query_parser: Arc<HousebookQueryParser>,
}

impl HousebookHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            query_parser: Arc::new(HousebookQueryParser),
        }
    }

    /// Parse, execute, and record the query metrics.
    async fn run(&self, query: &str, format: &Format) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd, format).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command, format: &Format) -> PgWireResult<Response> {
        let store = &self.store;
        match cmd {
            Command::InsertResident {
                id,
                name,
                room_number,
                phone,
            } => {
                store
                    .insert_resident(Resident {
                        id,
                        name,
                        room_number,
                        phone,
                        agreed_to_rules: true,
                        created_at: now_ms(),
                    })
                    .await
                    .map_err(store_err)?;
                Ok(inserted())
            }
            Command::GrantAdmin { resident_id } => {
                store.grant_admin(resident_id).await.map_err(store_err)?;
                Ok(inserted())
            }
            Command::RevokeAdmin { resident_id } => {
                let removed = store.revoke_admin(resident_id).await.map_err(store_err)?;
                Ok(deleted(usize::from(removed)))
            }
            Command::BlockResident { resident_id, reason } => {
                store
                    .block_resident(resident_id, reason)
                    .await
                    .map_err(store_err)?;
                Ok(inserted())
            }
            Command::UnblockResident { resident_id } => {
                let removed = store.unblock_resident(resident_id).await.map_err(store_err)?;
                Ok(deleted(usize::from(removed)))
            }
            Command::InsertKitchenBooking {
                id,
                resident_id,
                date,
                slot,
            } => {
                store
                    .insert_kitchen_booking(KitchenBooking {
                        id,
                        resident_id,
                        date,
                        slot,
                        created_at: now_ms(),
                    })
                    .await
                    .map_err(store_err)?;
                Ok(inserted())
            }
            Command::DeleteKitchenBooking { id } => {
                store.delete_kitchen_booking(id).await.map_err(store_err)?;
                Ok(deleted(1))
            }
            Command::InsertProjectorBooking {
                id,
                resident_id,
                start,
                duration_hours,
            } => {
                // Out-of-range durations are left for the store to reject.
                let hours = duration_hours.clamp(1, 24);
                if start.checked_add(i64::from(hours) * HOUR_MS).is_none() {
                    return Err(user_error("22003", format!("start {start} out of range")));
                }
                store
                    .insert_projector_booking(ProjectorBooking {
                        id,
                        resident_id,
                        span: Span::from_hours(start, hours),
                        duration_hours,
                        created_at: now_ms(),
                    })
                    .await
                    .map_err(store_err)?;
                Ok(inserted())
            }
            Command::DeleteProjectorBooking { id } => {
                store.delete_projector_booking(id).await.map_err(store_err)?;
                Ok(deleted(1))
            }
            Command::SetConfig { key, value } => {
                store.set_config(&key, value).await.map_err(store_err)?;
                Ok(inserted())
            }
            Command::Select { table, filters } => {
                let rows = self.select(table, &filters).await?;
                let schema = Arc::new(table_schema(table, format));
                let encoded: Vec<PgWireResult<_>> = rows
                    .into_iter()
                    .map(|row| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        for cell in &row {
                            match cell {
                                Cell::Text(v) => encoder.encode_field(v)?,
                                Cell::Int(v) => encoder.encode_field(v)?,
                                Cell::Bool(v) => encoder.encode_field(v)?,
                            }
                        }
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(encoded))))
            }
        }
    }

    /// Rows of `table` that satisfy every filter, in the table's natural order.
    async fn select(&self, table: Table, filters: &[Filter]) -> PgWireResult<Vec<Vec<Cell>>> {
        let store = &self.store;
        let rows: Vec<Vec<Cell>> = match table {
            Table::Residents => store
                .residents_newest_first()
                .await
                .into_iter()
                .map(|s| {
                    let r = s.resident;
                    vec![
                        Cell::text(r.id),
                        Cell::Text(Some(r.name)),
                        Cell::Text(Some(r.room_number)),
                        Cell::Text(r.phone),
                        Cell::Bool(r.agreed_to_rules),
                        Cell::Int(Some(r.created_at)),
                    ]
                })
                .collect(),
            Table::UserRoles => store
                .admin_grants()
                .await
                .into_iter()
                .map(|(id, granted_at)| {
                    vec![Cell::text(id), Cell::text("admin"), Cell::Int(Some(granted_at))]
                })
                .collect(),
            Table::BlockedUsers => store
                .blocks()
                .await
                .into_iter()
                .map(|b| {
                    vec![
                        Cell::text(b.resident_id),
                        Cell::Text(b.reason),
                        Cell::Int(Some(b.blocked_at)),
                    ]
                })
                .collect(),
            Table::KitchenBookings => store
                .kitchen_bookings(kitchen_pushdown(filters))
                .await
                .map_err(store_err)?
                .into_iter()
                .map(|row| {
                    let b = row.booking;
                    let (name, room) = owner_cells(row.owner);
                    vec![
                        Cell::text(b.id),
                        Cell::text(b.resident_id),
                        Cell::text(b.date.format("%Y-%m-%d")),
                        Cell::text(b.slot),
                        Cell::Int(Some(b.created_at)),
                        name,
                        room,
                    ]
                })
                .collect(),
            Table::ProjectorBookings => store
                .projector_bookings(projector_pushdown(filters))
                .await
                .map_err(store_err)?
                .into_iter()
                .map(|row| {
                    let b = row.booking;
                    let (name, room) = owner_cells(row.owner);
                    vec![
                        Cell::text(b.id),
                        Cell::text(b.resident_id),
                        Cell::Int(Some(b.span.start)),
                        Cell::Int(Some(b.span.end)),
                        Cell::Int(Some(i64::from(b.duration_hours))),
                        Cell::Int(Some(b.created_at)),
                        name,
                        room,
                    ]
                })
                .collect(),
            Table::AdminConfig => store
                .config_entries()
                .await
                .into_iter()
                .map(|e| vec![Cell::Text(Some(e.key)), Cell::Text(Some(e.value)), Cell::Int(Some(e.updated_at))])
                .collect(),
        };

        let columns = table_columns(table);
        let mut bound = Vec::with_capacity(filters.len());
        for filter in filters {
            let idx = columns
                .iter()
                .position(|(name, _)| *name == filter.column)
                .ok_or_else(|| {
                    user_error(
                        "42703",
                        format!("column \"{}\" does not exist in {}", filter.column, table.name()),
                    )
                })?;
            bound.push((idx, filter));
        }

        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let mut keep = true;
            for (idx, filter) in &bound {
                if !row[*idx].satisfies(filter.op, &filter.value)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                kept.push(row);
            }
        }
        Ok(kept)
    }
}

// ── Rows ─────────────────────────────────────────────────────────

enum Cell {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(bool),
}

impl Cell {
    fn text(v: impl ToString) -> Self {
        Cell::Text(Some(v.to_string()))
    }

    /// SQL comparison; any NULL side compares as unknown and fails the filter.
    fn satisfies(&self, op: CmpOp, value: &Literal) -> PgWireResult<bool> {
        let ordering = match (self, value) {
            (_, Literal::Null) | (Cell::Text(None), _) | (Cell::Int(None), _) => None,
            (Cell::Text(Some(s)), lit) => lit.as_text().map(|t| s.as_str().cmp(t.as_str())),
            (Cell::Int(Some(v)), lit) => {
                let n = lit.as_i64().ok_or_else(|| {
                    user_error("22P02", format!("invalid input syntax for type bigint: {lit:?}"))
                })?;
                Some(v.cmp(&n))
            }
            (Cell::Bool(b), lit) => {
                let other = match lit {
                    Literal::Bool(x) => *x,
                    Literal::Text(s) if matches!(s.as_str(), "t" | "true") => true,
                    Literal::Text(s) if matches!(s.as_str(), "f" | "false") => false,
                    _ => {
                        return Err(user_error(
                            "22P02",
                            format!("invalid input syntax for type boolean: {lit:?}"),
                        ));
                    }
                };
                Some(b.cmp(&other))
            }
        };
        Ok(matches!(
            (op, ordering),
            (CmpOp::Eq, Some(Ordering::Equal))
                | (CmpOp::GtEq, Some(Ordering::Greater | Ordering::Equal))
                | (CmpOp::LtEq, Some(Ordering::Less | Ordering::Equal))
        ))
    }
}

fn owner_cells(owner: Option<BookingOwner>) -> (Cell, Cell) {
    match owner {
        Some(o) => (Cell::Text(Some(o.name)), Cell::Text(Some(o.room_number))),
        None => (Cell::Text(None), Cell::Text(None)),
    }
}

/// Narrow the store read with the date and resident filters; the generic
/// row filter still runs afterwards.
fn kitchen_pushdown(filters: &[Filter]) -> KitchenFilter {
    let mut f = KitchenFilter::default();
    for filter in filters {
        let text = filter.value.as_text();
        match filter.column.as_str() {
            "booking_date" => {
                let Some(date) = text.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()) else {
                    continue;
                };
                if matches!(filter.op, CmpOp::GtEq | CmpOp::Eq) {
                    f.from = Some(f.from.map_or(date, |cur| cur.max(date)));
                }
                if matches!(filter.op, CmpOp::LtEq | CmpOp::Eq) {
                    f.to = Some(f.to.map_or(date, |cur| cur.min(date)));
                }
            }
            "resident_id" if filter.op == CmpOp::Eq => {
                f.resident_id = text.and_then(|s| Ulid::from_string(&s).ok()).or(f.resident_id);
            }
            _ => {}
        }
    }
    f
}

fn projector_pushdown(filters: &[Filter]) -> ProjectorFilter {
    let mut f = ProjectorFilter::default();
    for filter in filters {
        match filter.column.as_str() {
            "start" => {
                let Some(at) = filter.value.as_i64() else { continue };
                if matches!(filter.op, CmpOp::GtEq | CmpOp::Eq) {
                    f.from = Some(f.from.map_or(at, |cur| cur.max(at)));
                }
                if matches!(filter.op, CmpOp::LtEq | CmpOp::Eq) {
                    f.to = Some(f.to.map_or(at, |cur| cur.min(at)));
                }
            }
            "resident_id" if filter.op == CmpOp::Eq => {
                f.resident_id = filter
                    .value
                    .as_text()
                    .and_then(|s| Ulid::from_string(&s).ok())
                    .or(f.resident_id);
            }
            _ => {}
        }
    }
    f
}

// ── Schemas ──────────────────────────────────────────────────────

fn table_columns(table: Table) -> Vec<(&'static str, Type)> {
    match table {
        Table::Residents => vec![
            ("id", Type::VARCHAR),
            ("name", Type::VARCHAR),
            ("room_number", Type::VARCHAR),
            ("phone", Type::VARCHAR),
            ("agreed_to_rules", Type::BOOL),
            ("created_at", Type::INT8),
        ],
        Table::UserRoles => vec![
            ("resident_id", Type::VARCHAR),
            ("role", Type::VARCHAR),
            ("granted_at", Type::INT8),
        ],
        Table::BlockedUsers => vec![
            ("resident_id", Type::VARCHAR),
            ("reason", Type::VARCHAR),
            ("blocked_at", Type::INT8),
        ],
        Table::KitchenBookings => vec![
            ("id", Type::VARCHAR),
            ("resident_id", Type::VARCHAR),
            ("booking_date", Type::VARCHAR),
            ("slot_type", Type::VARCHAR),
            ("created_at", Type::INT8),
            ("resident_name", Type::VARCHAR),
            ("room_number", Type::VARCHAR),
        ],
        Table::ProjectorBookings => vec![
            ("id", Type::VARCHAR),
            ("resident_id", Type::VARCHAR),
            ("start", Type::INT8),
            ("end", Type::INT8),
            ("duration_hours", Type::INT8),
            ("created_at", Type::INT8),
            ("resident_name", Type::VARCHAR),
            ("room_number", Type::VARCHAR),
        ],
        Table::AdminConfig => vec![
            ("key", Type::VARCHAR),
            ("value", Type::VARCHAR),
            ("updated_at", Type::INT8),
        ],
    }
}

fn table_schema(table: Table, format: &Format) -> Vec<FieldInfo> {
    table_columns(table)
        .into_iter()
        .enumerate()
        .map(|(idx, (name, ty))| FieldInfo::new(name.into(), None, None, ty, format.format_for(idx)))
        .collect()
}

/// Row description for a statement; empty unless it is a SELECT we can parse.
fn result_schema(statement: &str, format: Option<&Format>) -> Vec<FieldInfo> {
    match sql::parse_sql(statement) {
        Ok(Command::Select { table, .. }) => table_schema(table, format.unwrap_or(&Format::UnifiedText)),
        _ => vec![],
    }
}

fn inserted() -> Response {
    Response::Execution(Tag::new("INSERT").with_rows(1))
}

fn deleted(rows: usize) -> Response {
    Response::Execution(Tag::new("DELETE").with_rows(rows))
}

#[async_trait]
impl SimpleQueryHandler for HousebookHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(query, &Format::UnifiedText).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct HousebookQueryParser;

#[async_trait]
impl QueryParser for HousebookQueryParser {
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
        Ok(result_schema(stmt, column_format))
    }
}

#[async_trait]
impl ExtendedQueryHandler for HousebookHandler {
    type Statement = String;
    type QueryParser = HousebookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        self.run(&sql, &portal.result_column_format).await
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
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement, None),
        ))
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
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
            Some(&target.result_column_format),
        )))
    }
}

/// `$N` placeholders outside quoted text, as (byte range, N).
fn placeholders(sql: &str) -> Vec<(Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                i += 1;
            }
            None if b == b'$' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i].parse::<usize>() {
                    found.push((start..i, n));
                }
            }
            None => i += 1,
        }
    }
    found
}

/// Highest `$N` placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Splice bound values into `sql` as quoted text in a single pass. Bound
/// text is never rescanned, so a value containing `$1` stays literal.
fn bind_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|i| params.get(i)) else {
            continue;
        };
        out.push_str(&sql[last..range.start]);
        match param {
            Some(bytes) => {
                out.push('\'');
                out.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                out.push('\'');
            }
            None => out.push_str("NULL"),
        }
        last = range.end;
    }
    out.push_str(&sql[last..]);
    out
}

fn substitute_params(portal: &Portal<String>) -> String {
    bind_params(&portal.statement.statement, &portal.parameters[..])
}

// ── Factory ──────────────────────────────────────────────────────

pub struct HousebookFactory {
    handler: Arc<HousebookHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<HousebookAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl HousebookFactory {
    pub fn new(store: Arc<Store>, password: String) -> Self {
        let auth_source = HousebookAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(HousebookHandler::new(store)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for HousebookFactory {
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

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

fn store_err(e: StoreError) -> PgWireError {
    user_error(e.sqlstate(), e.to_string())
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(column: &str, op: CmpOp, value: Literal) -> Filter {
        Filter {
            column: column.into(),
            op,
            value,
        }
    }

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM residents"), 0);
        assert_eq!(count_params("SELECT * FROM residents WHERE name = $2 AND room_number = $1"), 2);
        assert_eq!(count_params("INSERT INTO admin_config (key, value) VALUES ($1, $10)"), 10);
    }

    #[test]
    fn placeholders_inside_quotes_are_left_alone() {
        assert_eq!(count_params("SELECT * FROM residents WHERE name = '$3' AND room_number = $1"), 1);
    }

    #[test]
    fn bound_values_are_not_rescanned() {
        let params = [Some("Ann $1".as_bytes()), Some(b"O'Neil $2".as_slice()), None];
        let sql = bind_params(
            "INSERT INTO residents (id, name, room_number, phone) VALUES ($2, $1, $10, $3)",
            &params[..],
        );
        assert_eq!(
            sql,
            "INSERT INTO residents (id, name, room_number, phone) VALUES ('O''Neil $2', 'Ann $1', $10, NULL)"
        );
    }

    #[test]
    fn null_never_matches() {
        let cell = Cell::Text(None);
        assert!(!cell.satisfies(CmpOp::Eq, &Literal::Text("x".into())).unwrap());
        let cell = Cell::text("x");
        assert!(!cell.satisfies(CmpOp::Eq, &Literal::Null).unwrap());
    }

    #[test]
    fn text_and_int_comparisons() {
        let date = Cell::text("2026-11-05");
        assert!(date.satisfies(CmpOp::GtEq, &Literal::Text("2026-11-02".into())).unwrap());
        assert!(!date.satisfies(CmpOp::LtEq, &Literal::Text("2026-11-04".into())).unwrap());

        let start = Cell::Int(Some(1000));
        assert!(start.satisfies(CmpOp::LtEq, &Literal::Int(1000)).unwrap());
        assert!(start.satisfies(CmpOp::Eq, &Literal::Text("1000".into())).unwrap());
        assert!(start.satisfies(CmpOp::GtEq, &Literal::Text("abc".into())).is_err());

        let flag = Cell::Bool(true);
        assert!(flag.satisfies(CmpOp::Eq, &Literal::Text("t".into())).unwrap());
        assert!(!flag.satisfies(CmpOp::Eq, &Literal::Bool(false)).unwrap());
    }

    #[test]
    fn kitchen_pushdown_narrows_window() {
        let id = Ulid::new();
        let f = kitchen_pushdown(&[
            filter("booking_date", CmpOp::GtEq, Literal::Text("2026-11-02".into())),
            filter("booking_date", CmpOp::LtEq, Literal::Text("2026-11-08".into())),
            filter("resident_id", CmpOp::Eq, Literal::Text(id.to_string())),
            filter("slot_type", CmpOp::Eq, Literal::Text("11-14".into())),
        ]);
        assert_eq!(f.from, NaiveDate::from_ymd_opt(2026, 11, 2));
        assert_eq!(f.to, NaiveDate::from_ymd_opt(2026, 11, 8));
        assert_eq!(f.resident_id, Some(id));

        let f = kitchen_pushdown(&[filter("booking_date", CmpOp::Eq, Literal::Text("2026-11-03".into()))]);
        assert_eq!(f.from, f.to);
    }

    #[test]
    fn projector_pushdown_uses_start() {
        let f = projector_pushdown(&[
            filter("start", CmpOp::GtEq, Literal::Int(100)),
            filter("start", CmpOp::GtEq, Literal::Int(50)),
            filter("end", CmpOp::LtEq, Literal::Int(10)),
        ]);
        assert_eq!(f.from, Some(100));
        assert_eq!(f.to, None);
    }

    #[test]
    fn describe_schema_only_for_selects() {
        let schema = result_schema("SELECT * FROM kitchen_bookings WHERE booking_date >= $1", None);
        let names: Vec<_> = schema.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names[..4], ["id", "resident_id", "booking_date", "slot_type"]);
        assert!(result_schema("DELETE FROM kitchen_bookings WHERE id = $1", None).is_empty());
    }
}
