//! SQLite dialect formatter.
//!
//! Renders a [`Query`] tree into SQLite SQL text. Formatting is pure: the
//! input tree is never modified, so rendering the same tree twice yields
//! byte-identical text. Every literal goes through [`Formatter::escape`];
//! identifiers are double-quoted.
//!
//! # Example
//!
//! ```
//! use localsql_core::query::{Expr, Select};
//! use localsql_sqlite::Formatter;
//!
//! let select = Select::from("user")
//!     .select(["id", "name"])
//!     .filter(Expr::field("name").starts_with("Ad"))
//!     .take(5);
//!
//! let sql = Formatter::new().format_select(&select).unwrap();
//! assert_eq!(
//!     sql,
//!     r#"SELECT "id", "name" FROM "user" WHERE LIKE('Ad%', "name", '\') LIMIT 5"#
//! );
//! ```

use chrono::{DateTime, FixedOffset, Local};
use localsql_core::query::{
    Aggregate, ArithmeticOp, CompareOp, DatePart, Delete, Entity, Expr, FieldRef, Function,
    GetDateKind, Insert, JoinKind, JsonArraySource, JsonCompose, JsonObject, Query, Select,
    SelectItem, Update,
};
use localsql_core::{ValidationError, Value};

use crate::error::{Result, SchemaError, SqliteError};
use crate::functions::to_hex;

/// Text layout used for date literals and bound date parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f%:z";

const LIKE_ESCAPE: &str = "'\\'";

const LOCAL_TIMESTAMP: &str = "STRFTIME('%Y-%m-%d %H:%M:%f', DATETIME('now', 'localtime')) || PRINTF('%+.2d:%.2d', ROUND((JULIANDAY('now', 'localtime') - JULIANDAY('now')) * 24), ABS(ROUND((JULIANDAY('now', 'localtime') - JULIANDAY('now')) * 24 * 60) % 60))";

/// Renders query trees as SQLite SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter;

impl Formatter {
    pub fn new() -> Self {
        Self
    }

    /// Renders any statement.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedError`](SqliteError::UnsupportedError) for
    /// unanchored regex patterns, [`SchemaError`](SqliteError::SchemaError)
    /// for unnamed JSON compositions, and
    /// [`ValidationError`](SqliteError::ValidationError) for malformed
    /// function arguments.
    pub fn format(&self, query: &Query) -> Result<String> {
        match query {
            Query::Select(select) => self.format_select(select),
            Query::Insert(insert) => self.format_insert(insert),
            Query::Update(update) => self.format_update(update),
            Query::Delete(delete) => self.format_delete(delete),
        }
    }

    pub fn format_select(&self, select: &Select) -> Result<String> {
        self.select(select, true)
    }

    /// Renders a select. Only a top-level projection names result columns,
    /// so only there must every JSON composition carry a name.
    fn select(&self, select: &Select, top_level: bool) -> Result<String> {
        let mut sql = String::from("SELECT ");
        if select.distinct {
            sql.push_str("DISTINCT ");
        }
        if select.fields.is_empty() {
            sql.push('*');
        } else {
            let items = select
                .fields
                .iter()
                .map(|item| self.select_item(item, top_level))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&items.join(", "));
        }
        if let Some(from) = &select.from {
            sql.push_str(" FROM ");
            sql.push_str(&entity(from));
        }
        for join in &select.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
            };
            sql.push_str(&format!(
                " {keyword} {} ON {}",
                entity(&join.entity),
                self.expr(&join.on)?
            ));
        }
        if let Some(filter) = &select.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(filter)?);
        }
        if !select.group_by.is_empty() {
            let groups = self.expr_list(&select.group_by)?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }
        if !select.order_by.is_empty() {
            let mut orders = Vec::with_capacity(select.order_by.len());
            for order in &select.order_by {
                let direction = if order.descending { "DESC" } else { "ASC" };
                orders.push(format!("{} {direction}", self.expr(&order.expr)?));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }
        match (select.limit, select.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        Ok(sql)
    }

    fn format_insert(&self, insert: &Insert) -> Result<String> {
        let table = quote_identifier(&insert.into);
        if insert.values.is_empty() {
            return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
        }
        let columns = insert
            .values
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<Vec<_>>();
        let mut values = Vec::with_capacity(insert.values.len());
        for (_, value) in &insert.values {
            values.push(self.expr(value)?);
        }
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        ))
    }

    fn format_update(&self, update: &Update) -> Result<String> {
        if update.set.is_empty() {
            return Err(ValidationError::EmptyFieldList(update.table.clone()).into());
        }
        let mut assignments = Vec::with_capacity(update.set.len());
        for (name, value) in &update.set {
            assignments.push(format!("{}={}", quote_identifier(name), self.expr(value)?));
        }
        let mut sql = format!(
            "UPDATE {} SET {}",
            quote_identifier(&update.table),
            assignments.join(", ")
        );
        if let Some(filter) = &update.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(filter)?);
        }
        Ok(sql)
    }

    fn format_delete(&self, delete: &Delete) -> Result<String> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(&delete.from));
        if let Some(filter) = &delete.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(filter)?);
        }
        Ok(sql)
    }

    fn select_item(&self, item: &SelectItem, top_level: bool) -> Result<String> {
        if top_level && matches!(item.expr, Expr::Json(_)) && item.attribute_name().is_none() {
            return Err(SchemaError::AmbiguousJsonAttribute(self.expr(&item.expr)?).into());
        }
        let expr = self.expr(&item.expr)?;
        Ok(match &item.alias {
            Some(alias) => format!("{expr} AS {}", quote_identifier(alias)),
            None => expr,
        })
    }

    fn expr_list(&self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Field(field) => field_ref(field),
            Expr::Value(value) => self.escape(value),
            Expr::Compare { op, left, right } => {
                let left = self.expr(left)?;
                match (op, right.as_ref()) {
                    (CompareOp::Eq, Expr::Value(Value::Null)) => format!("({left} IS NULL)"),
                    (CompareOp::Ne, Expr::Value(Value::Null)) => format!("({left} IS NOT NULL)"),
                    _ => {
                        let op = match op {
                            CompareOp::Eq => "=",
                            CompareOp::Ne => "<>",
                            CompareOp::Gt => ">",
                            CompareOp::Ge => ">=",
                            CompareOp::Lt => "<",
                            CompareOp::Le => "<=",
                        };
                        format!("({left} {op} {})", self.expr(right)?)
                    }
                }
            }
            Expr::And(items) => self.logical(items, "AND", "1")?,
            Expr::Or(items) => self.logical(items, "OR", "0")?,
            Expr::Not(inner) => format!("NOT {}", self.expr(inner)?),
            Expr::IsNull(inner) => format!("({} IS NULL)", self.expr(inner)?),
            Expr::In { expr, list } => {
                if list.is_empty() {
                    "0".to_string()
                } else {
                    format!("({} IN ({}))", self.expr(expr)?, self.expr_list(list)?.join(", "))
                }
            }
            Expr::Arithmetic { op, left, right } => {
                let op = match op {
                    ArithmeticOp::Add => "+",
                    ArithmeticOp::Subtract => "-",
                    ArithmeticOp::Multiply => "*",
                    ArithmeticOp::Divide => "/",
                    ArithmeticOp::Modulo => "%",
                };
                format!("({} {op} {})", self.expr(left)?, self.expr(right)?)
            }
            Expr::Func(function) => self.function(function)?,
            Expr::Aggregate(aggregate) => self.aggregate(aggregate)?,
            Expr::Json(json) => self.json(json)?,
            Expr::Subquery(select) => format!("({})", self.select(select, false)?),
        })
    }

    fn logical(&self, items: &[Expr], keyword: &str, empty: &str) -> Result<String> {
        Ok(match items {
            [] => empty.to_string(),
            [single] => self.expr(single)?,
            _ => format!("({})", self.expr_list(items)?.join(&format!(" {keyword} "))),
        })
    }

    fn function(&self, function: &Function) -> Result<String> {
        Ok(match function {
            Function::Concat(items) => {
                if items.len() < 2 {
                    return Err(ValidationError::TooFewArguments {
                        function: "concat",
                        expected: 2,
                    }
                    .into());
                }
                let parts = items
                    .iter()
                    .map(|item| Ok(format!("IFNULL({},'')", self.expr(item)?)))
                    .collect::<Result<Vec<_>>>()?;
                format!("({})", parts.join(" || "))
            }
            Function::Substring {
                value,
                start,
                length,
            } => match length {
                Some(length) => format!(
                    "SUBSTR({}, {} + 1, {})",
                    self.expr(value)?,
                    self.expr(start)?,
                    self.expr(length)?
                ),
                None => format!("SUBSTR({}, {} + 1)", self.expr(value)?, self.expr(start)?),
            },
            Function::IndexOf(value, search) => {
                format!("(INSTR({}, {})-1)", self.expr(value)?, self.expr(search)?)
            }
            Function::Text(value, search) => {
                format!("((INSTR({}, {})-1)>=0)", self.expr(value)?, self.expr(search)?)
            }
            Function::Length(x) => format!("LENGTH({})", self.expr(x)?),
            Function::Ceiling(x) => format!("CEIL({})", self.expr(x)?),
            Function::Floor(x) => format!("FLOOR({})", self.expr(x)?),
            Function::Round(x) => format!("ROUND({})", self.expr(x)?),
            Function::Trim(x) => format!("TRIM({})", self.expr(x)?),
            Function::ToLower(x) => format!("LOWER({})", self.expr(x)?),
            Function::ToUpper(x) => format!("UPPER({})", self.expr(x)?),
            Function::StartsWith(subject, pattern) => self.like(subject, pattern, false, true)?,
            Function::EndsWith(subject, pattern) => self.like(subject, pattern, true, false)?,
            Function::Contains(subject, pattern) => self.like(subject, pattern, true, true)?,
            Function::Regex(subject, pattern) => {
                let like = regex_to_like(pattern)?;
                format!(
                    "LIKE({}, {}, {LIKE_ESCAPE})",
                    escape_string(&like),
                    self.expr(subject)?
                )
            }
            Function::DatePart(part, x) => {
                let spec = match part {
                    DatePart::Day => "%d",
                    DatePart::Month => "%m",
                    DatePart::Year => "%Y",
                    DatePart::Hour => "%H",
                    DatePart::Minute => "%M",
                    DatePart::Second => "%S",
                };
                format!("CAST(strftime('{spec}', {}) AS INTEGER)", self.expr(x)?)
            }
            Function::Date(x) => format!("date({})", self.expr(x)?),
            Function::IfNull(x, fallback) => {
                format!("IFNULL({}, {})", self.expr(x)?, self.expr(fallback)?)
            }
            Function::ToString(x) => format!("CAST({} AS TEXT)", self.expr(x)?),
            Function::ToInt(x) => format!("CAST({} AS INT)", self.expr(x)?),
            Function::ToLong(x) => format!("CAST({} AS BIGINT)", self.expr(x)?),
            Function::ToDouble(x) => format!("CAST({} AS DECIMAL(19, 8))", self.expr(x)?),
            Function::ToDecimal {
                value,
                precision,
                scale,
            } => format!(
                "CAST({} AS DECIMAL({}, {}))",
                self.expr(value)?,
                precision.unwrap_or(19),
                scale.unwrap_or(8)
            ),
            Function::JsonGet(path) => json_get(path)?,
            Function::Uuid => "uuid4()".to_string(),
            Function::ToGuid(x) => format!("uuid_str(crypto_hash({}))", self.expr(x)?),
            Function::GetDate(GetDateKind::Date) => "date('now')".to_string(),
            Function::GetDate(GetDateKind::DateTime) => {
                "strftime('%F %H:%M:%f+00:00', 'now')".to_string()
            }
            Function::GetDate(GetDateKind::Timestamp) => LOCAL_TIMESTAMP.to_string(),
        })
    }

    fn like(&self, subject: &Expr, pattern: &Expr, leading: bool, trailing: bool) -> Result<String> {
        let subject = self.expr(subject)?;
        if let Expr::Value(Value::Text(text)) = pattern {
            let mut like = String::new();
            if leading {
                like.push('%');
            }
            like.push_str(&escape_like(text));
            if trailing {
                like.push('%');
            }
            return Ok(format!("LIKE({}, {subject}, {LIKE_ESCAPE})", escape_string(&like)));
        }
        let pattern = self.expr(pattern)?;
        let pattern = match (leading, trailing) {
            (true, true) => format!("'%' || {pattern} || '%'"),
            (true, false) => format!("'%' || {pattern}"),
            (false, true) => format!("{pattern} || '%'"),
            (false, false) => pattern,
        };
        Ok(format!("LIKE({pattern}, {subject})"))
    }

    fn aggregate(&self, aggregate: &Aggregate) -> Result<String> {
        Ok(match aggregate {
            Aggregate::Count(None) => "COUNT(*)".to_string(),
            Aggregate::Count(Some(x)) => format!("COUNT({})", self.expr(x)?),
            Aggregate::Min(x) => format!("MIN({})", self.expr(x)?),
            Aggregate::Max(x) => format!("MAX({})", self.expr(x)?),
            Aggregate::Sum(x) => format!("SUM({})", self.expr(x)?),
            Aggregate::Avg(x) => format!("AVG({})", self.expr(x)?),
        })
    }

    fn json(&self, json: &JsonCompose) -> Result<String> {
        match json {
            JsonCompose::Object(object) => self.json_object(object),
            JsonCompose::GroupArray(object) => {
                Ok(format!("json_group_array({})", self.json_object(object)?))
            }
            JsonCompose::Array(JsonArraySource::Field(field)) => Ok(field_ref(field)),
            JsonCompose::Array(JsonArraySource::Value(value)) => {
                Ok(format!("json({})", escape_string(&value.to_json().to_string())))
            }
            JsonCompose::Array(JsonArraySource::Select(select)) => {
                if select.fields.is_empty() {
                    return Err(ValidationError::EmptyFieldList("JSON array".to_string()).into());
                }
                let mut rows = select.as_ref().clone();
                let members = std::mem::take(&mut rows.fields);
                rows.fields
                    .push(SelectItem::new(Expr::json_group_array(JsonObject { members })));
                Ok(format!("({})", self.select(&rows, false)?))
            }
        }
    }

    fn json_object(&self, object: &JsonObject) -> Result<String> {
        let mut pairs = Vec::with_capacity(object.members.len());
        for member in &object.members {
            let value = self.expr(&member.expr)?;
            let key = member
                .attribute_name()
                .ok_or_else(|| SchemaError::AmbiguousJsonAttribute(value.clone()))?;
            pairs.push(format!("{}, {value}", escape_string(key)));
        }
        Ok(format!("json_object({})", pairs.join(", ")))
    }

    /// Renders a literal.
    ///
    /// # Examples
    ///
    /// ```
    /// use localsql_core::Value;
    /// use localsql_sqlite::Formatter;
    ///
    /// let f = Formatter::new();
    /// assert_eq!(f.escape(&Value::Bool(true)), "1");
    /// assert_eq!(f.escape(&Value::Null), "NULL");
    /// assert_eq!(f.escape(&Value::from("it's")), "'it''s'");
    /// assert_eq!(
    ///     f.escape(&Value::Array(vec![Value::from(1), Value::from("a")])),
    ///     r#"'[1,"a"]'"#
    /// );
    /// ```
    pub fn escape(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.is_finite() => f.to_string(),
            Value::Real(_) => "NULL".to_string(),
            Value::Text(text) => escape_string(text),
            Value::Blob(bytes) => format!("X'{}'", to_hex(bytes)),
            Value::DateTime(dt) => escape_string(&format_date(dt)),
            Value::Json(json) => escape_string(&json.to_string()),
            Value::Array(_) if value.is_scalar_array() => escape_string(&value.to_json().to_string()),
            Value::Array(items) => items
                .iter()
                .map(|item| self.escape(item))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Quotes a possibly qualified name: `t.col` becomes `"t"."col"`.
    pub fn escape_name(&self, name: &str) -> String {
        name.split('.')
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Double-quotes one identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal.
///
/// Applies a generic backslash escape first, then rewrites it into SQLite's
/// form in a fixed order: `\'` to `''`, `\"` to `"`, and `\\` to `\`.
pub fn escape_string(value: &str) -> String {
    let mut generic = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        match ch {
            '\\' => generic.push_str("\\\\"),
            '\'' => generic.push_str("\\'"),
            '"' => generic.push_str("\\\""),
            other => generic.push(other),
        }
    }
    let dialect = generic
        .replace("\\'", "''")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\");
    format!("'{dialect}'")
}

/// Formats a date in local time with a numeric offset.
pub fn format_date(value: &DateTime<FixedOffset>) -> String {
    value.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn regex_to_like(pattern: &str) -> Result<String> {
    let anchored_start = pattern.starts_with('^');
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    let anchored_end = body.ends_with('$') && !body.ends_with("\\$");
    let body = if anchored_end {
        &body[..body.len() - 1]
    } else {
        body
    };

    if !anchored_start && !anchored_end {
        return Err(SqliteError::UnsupportedError(format!(
            "unanchored pattern {pattern:?} cannot be expressed with LIKE"
        )));
    }
    if body.chars().any(|c| ".*+?[](){}|\\^$".contains(c)) {
        return Err(SqliteError::UnsupportedError(format!(
            "pattern {pattern:?} uses regex syntax beyond anchors"
        )));
    }

    let mut like = String::with_capacity(body.len() + 2);
    if !anchored_start {
        like.push('%');
    }
    like.push_str(&escape_like(body));
    if !anchored_end {
        like.push('%');
    }
    Ok(like)
}

fn json_get(path: &str) -> Result<String> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(ValidationError::InvalidJsonPath(path.to_string()).into());
    }
    Ok(format!(
        "json_extract({}.{}, {})",
        quote_identifier(parts[0]),
        quote_identifier(parts[1]),
        escape_string(&format!("$.{}", parts[2..].join(".")))
    ))
}

fn field_ref(field: &FieldRef) -> String {
    let name = if field.name == "*" {
        "*".to_string()
    } else {
        quote_identifier(&field.name)
    };
    match &field.collection {
        Some(collection) => format!("{}.{name}", quote_identifier(collection)),
        None => name,
    }
}

fn entity(entity: &Entity) -> String {
    match &entity.alias {
        Some(alias) => format!("{} AS {}", quote_identifier(&entity.name), quote_identifier(alias)),
        None => quote_identifier(&entity.name),
    }
}
