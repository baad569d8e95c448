use sqlparser::ast::{self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::engine::{filter_value, DateFilter, QueryParams, SortDirection, SortField, SortSpec};
use crate::limits::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    SelectBookings { params: QueryParams },
    SelectStats,
    SelectProperties,
    Refresh,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err(SqlError::Empty);
    }
    let upper = trimmed.to_uppercase();
    if upper == "REFRESH" || upper.starts_with("REFRESH ") {
        let target = trimmed.get(7..).unwrap_or("").trim();
        if target.is_empty() || target.eq_ignore_ascii_case("bookings") {
            return Ok(Command::Refresh);
        }
        return Err(SqlError::UnknownTable(target.to_lowercase()));
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Query(query) => parse_select(query),
        Statement::Insert(_) | Statement::Delete(_) => Err(SqlError::ReadOnly),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "bookings" => {
            let mut params = QueryParams::default();
            if let Some(selection) = &select.selection {
                extract_booking_filters(selection, &mut params)?;
            }
            apply_order_by(query, &mut params)?;
            apply_limit(query, &mut params)?;
            Ok(Command::SelectBookings { params })
        }
        "booking_stats" => Ok(Command::SelectStats),
        "properties" => Ok(Command::SelectProperties),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `col = 'value'` terms joined by AND. Anything else is rejected.
fn extract_booking_filters(expr: &Expr, params: &mut QueryParams) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_booking_filters(inner, params),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            extract_booking_filters(left, params)?;
            extract_booking_filters(right, params)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
            let value = parse_text_or_null(right)?;
            apply_filter(params, &col, value.as_deref())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn apply_filter(params: &mut QueryParams, col: &str, value: Option<&str>) -> Result<(), SqlError> {
    let v = filter_value(value);
    match col {
        "search" => {
            if let Some(s) = &v
                && s.len() > MAX_SEARCH_LEN
            {
                return Err(SqlError::LimitExceeded("search text too long"));
            }
            params.search = v;
        }
        "status" => params.status = v,
        "payment_status" => params.payment_status = v,
        "property_id" => params.property_id = v,
        "source" => params.source = v,
        "dates" => params.dates = value.map_or(DateFilter::All, DateFilter::from_name),
        "tab" => params.tab = v,
        _ => return Err(SqlError::UnknownColumn(col.to_string())),
    }
    Ok(())
}

/// Only the first ORDER BY term counts. Without a direction SQL means ascending.
fn apply_order_by(query: &ast::Query, params: &mut QueryParams) -> Result<(), SqlError> {
    let Some(order_by) = &query.order_by else {
        return Ok(());
    };
    let ast::OrderByKind::Expressions(exprs) = &order_by.kind else {
        return Err(SqlError::Unsupported("ORDER BY ALL".into()));
    };
    let Some(first) = exprs.first() else {
        return Ok(());
    };
    let col = expr_column_name(&first.expr)
        .ok_or_else(|| SqlError::Parse(format!("expected column in ORDER BY, got {}", first.expr)))?;
    let direction = match first.options.asc {
        Some(false) => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    params.sort = SortSpec::new(SortField::from_name(&col), direction);
    Ok(())
}

fn apply_limit(query: &ast::Query, params: &mut QueryParams) -> Result<(), SqlError> {
    let Some(clause) = &query.limit_clause else {
        return Ok(());
    };
    let (limit, offset) = match clause {
        ast::LimitClause::LimitOffset { limit, offset, .. } => {
            (limit.as_ref(), offset.as_ref().map(|o| &o.value))
        }
        ast::LimitClause::OffsetCommaLimit { offset, limit } => (Some(limit), Some(offset)),
    };
    if let Some(limit) = limit {
        let n = parse_usize_expr(limit)?;
        if n > MAX_PAGE_SIZE {
            return Err(SqlError::LimitExceeded("LIMIT too large"));
        }
        params.limit = Some(n);
    }
    if let Some(offset) = offset {
        params.offset = parse_usize_expr(offset)?;
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
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

fn parse_text_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(other) => Err(SqlError::Parse(format!("expected text, got {other:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_usize_expr(expr: &Expr) -> Result<usize, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _) | Value::SingleQuotedString(s)) => s
            .parse()
            .map_err(|e| SqlError::Parse(format!("bad count {s}: {e}"))),
        Some(other) => Err(SqlError::Parse(format!("expected number, got {other:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    ReadOnly,
    LimitExceeded(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown filter column: {c}"),
            SqlError::ReadOnly => write!(f, "bookings are read-only; change them upstream and REFRESH"),
            SqlError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for SqlError {}
