use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// The tables exposed over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Residents,
    UserRoles,
    BlockedUsers,
    KitchenBookings,
    ProjectorBookings,
    AdminConfig,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Residents => "residents",
            Table::UserRoles => "user_roles",
            Table::BlockedUsers => "blocked_users",
            Table::KitchenBookings => "kitchen_bookings",
            Table::ProjectorBookings => "projector_bookings",
            Table::AdminConfig => "admin_config",
        }
    }

    fn from_name(name: &str) -> Result<Self, SqlError> {
        match name {
            "residents" => Ok(Table::Residents),
            "user_roles" => Ok(Table::UserRoles),
            "blocked_users" => Ok(Table::BlockedUsers),
            "kitchen_bookings" => Ok(Table::KitchenBookings),
            "projector_bookings" => Ok(Table::ProjectorBookings),
            "admin_config" => Ok(Table::AdminConfig),
            _ => Err(SqlError::UnknownTable(name.to_string())),
        }
    }
}

/// A literal on the right-hand side of a WHERE comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Literal {
    pub fn as_text(&self) -> Option<String> {
        match self {
            Literal::Null => None,
            Literal::Bool(b) => Some(b.to_string()),
            Literal::Int(n) => Some(n.to_string()),
            Literal::Text(s) => Some(s.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            Literal::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    GtEq,
    LtEq,
}

/// `column op literal`; a SELECT's filters are ANDed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: CmpOp,
    pub value: Literal,
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertResident {
        id: Ulid,
        name: String,
        room_number: String,
        phone: Option<String>,
    },
    GrantAdmin {
        resident_id: Ulid,
    },
    RevokeAdmin {
        resident_id: Ulid,
    },
    BlockResident {
        resident_id: Ulid,
        reason: Option<String>,
    },
    UnblockResident {
        resident_id: Ulid,
    },
    InsertKitchenBooking {
        id: Ulid,
        resident_id: Ulid,
        date: NaiveDate,
        slot: KitchenSlot,
    },
    DeleteKitchenBooking {
        id: Ulid,
    },
    InsertProjectorBooking {
        id: Ulid,
        resident_id: Ulid,
        start: Ms,
        duration_hours: u32,
    },
    DeleteProjectorBooking {
        id: Ulid,
    },
    SetConfig {
        key: String,
        value: String,
    },
    Select {
        table: Table,
        filters: Vec<Filter>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(first) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match first {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = Table::from_name(&insert_table_name(insert)?)?;
    let values = extract_insert_values(insert)?;
    let need = |n: usize| {
        if values.len() < n {
            Err(SqlError::WrongArity(table.name(), n, values.len()))
        } else {
            Ok(())
        }
    };

    match table {
        Table::Residents => {
            need(3)?;
            Ok(Command::InsertResident {
                id: parse_ulid_expr(&values[0])?,
                name: parse_string(&values[1])?,
                room_number: parse_string(&values[2])?,
                phone: values.get(3).map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        Table::UserRoles => {
            need(1)?;
            let role = match values.get(1) {
                Some(expr) => parse_string(expr)?,
                None => "admin".to_string(),
            };
            if role != "admin" {
                return Err(SqlError::InvalidRole(role));
            }
            Ok(Command::GrantAdmin {
                resident_id: parse_ulid_expr(&values[0])?,
            })
        }
        Table::BlockedUsers => {
            need(1)?;
            Ok(Command::BlockResident {
                resident_id: parse_ulid_expr(&values[0])?,
                reason: values.get(1).map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        Table::KitchenBookings => {
            need(4)?;
            let date = parse_string(&values[2])?;
            let slot = parse_string(&values[3])?;
            Ok(Command::InsertKitchenBooking {
                id: parse_ulid_expr(&values[0])?,
                resident_id: parse_ulid_expr(&values[1])?,
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| SqlError::Parse(format!("bad date {date:?}: {e}")))?,
                slot: slot.parse().map_err(|e| SqlError::Parse(format!("{e}")))?,
            })
        }
        Table::ProjectorBookings => {
            need(4)?;
            let hours = parse_i64_expr(&values[3])?;
            Ok(Command::InsertProjectorBooking {
                id: parse_ulid_expr(&values[0])?,
                resident_id: parse_ulid_expr(&values[1])?,
                start: parse_i64_expr(&values[2])?,
                duration_hours: u32::try_from(hours)
                    .map_err(|_| SqlError::Parse(format!("{hours} out of range for duration_hours")))?,
            })
        }
        Table::AdminConfig => {
            need(2)?;
            Ok(Command::SetConfig {
                key: parse_string(&values[0])?,
                value: parse_string(&values[1])?,
            })
        }
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = Table::from_name(&delete_table_name(delete)?)?;

    match table {
        Table::KitchenBookings => Ok(Command::DeleteKitchenBooking {
            id: extract_where_eq(&delete.selection, "id")?,
        }),
        Table::ProjectorBookings => Ok(Command::DeleteProjectorBooking {
            id: extract_where_eq(&delete.selection, "id")?,
        }),
        Table::UserRoles => Ok(Command::RevokeAdmin {
            resident_id: extract_where_eq(&delete.selection, "resident_id")?,
        }),
        Table::BlockedUsers => Ok(Command::UnblockResident {
            resident_id: extract_where_eq(&delete.selection, "resident_id")?,
        }),
        Table::Residents | Table::AdminConfig => {
            Err(SqlError::Unsupported(format!("DELETE FROM {}", table.name())))
        }
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = Table::from_name(&table_factor_name(&from.relation)?)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }
    Ok(Command::Select { table, filters })
}

fn extract_filters(expr: &Expr, out: &mut Vec<Filter>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_filters(inner, out),
        Expr::BinaryOp { left, op, right } => {
            let op = match op {
                ast::BinaryOperator::And => {
                    extract_filters(left, out)?;
                    return extract_filters(right, out);
                }
                ast::BinaryOperator::Eq => CmpOp::Eq,
                ast::BinaryOperator::GtEq => CmpOp::GtEq,
                ast::BinaryOperator::LtEq => CmpOp::LtEq,
                other => return Err(SqlError::Unsupported(format!("operator {other}"))),
            };
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push(Filter {
                column,
                op,
                value: parse_literal(right)?,
            });
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row VALUES".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

/// The ULID in a `WHERE <column> = '…'` clause.
fn extract_where_eq(selection: &Option<Expr>, column: &'static str) -> Result<Ulid, SqlError> {
    match selection.as_ref() {
        Some(Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        }) if expr_column_name(left).as_deref() == Some(column) => parse_ulid_expr(right),
        _ => Err(SqlError::MissingFilter(column)),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_literal(expr: &Expr) -> Result<Literal, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        ..
    } = expr
    {
        return Ok(Literal::Int(parse_i64_expr(expr)?));
    }
    match extract_value(expr) {
        Some(Value::Null) => Ok(Literal::Null),
        Some(Value::Boolean(b)) => Ok(Literal::Bool(*b)),
        Some(Value::Number(s, _)) => Ok(s.parse().map_or_else(|_| Literal::Text(s.clone()), Literal::Int)),
        // Placeholders survive only in statements parsed for Describe.
        Some(Value::SingleQuotedString(s)) | Some(Value::Placeholder(s)) => Ok(Literal::Text(s.clone())),
        Some(other) => Err(SqlError::Parse(format!("unsupported literal {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    parse_string_or_null(expr)?.ok_or_else(|| SqlError::Parse("unexpected NULL".into()))
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: expected {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("invalid role: {0} (only 'admin' exists)")]
    InvalidRole(String),
}
