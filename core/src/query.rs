//! Dialect-neutral query expression tree.
//!
//! A [`Query`] describes a statement without committing to any SQL
//! dialect; a dialect formatter renders it to text. The tree is plain data:
//! formatting never mutates it, so the same tree can be rendered any number
//! of times.
//!
//! Builders consume and return `self`. In operand position strings are
//! values (`Expr::field("name").eq("Ada")`); in projection position strings
//! are field names (`Select::from("user").select(["id", "name"])`).
//!
//! # Example
//!
//! ```
//! use localsql_core::query::{Expr, JsonObject, Select};
//!
//! let orders = Select::from("order_line")
//!     .select(["product", "quantity"])
//!     .filter(Expr::qualified("order_line", "order_id").eq(Expr::qualified("o", "id")));
//!
//! let query = Select::from(("order", "o"))
//!     .field(Expr::qualified("o", "id"))
//!     .field(Expr::json_array_of(orders).as_("lines"))
//!     .filter(Expr::qualified("o", "status").eq("open"))
//!     .take(10);
//!
//! assert_eq!(query.json_attributes(), vec!["lines".to_string()]);
//! ```

use crate::value::Value;

/// A complete statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl From<Select> for Query {
    fn from(value: Select) -> Self {
        Self::Select(value)
    }
}

impl From<Insert> for Query {
    fn from(value: Insert) -> Self {
        Self::Insert(value)
    }
}

impl From<Update> for Query {
    fn from(value: Update) -> Self {
        Self::Update(value)
    }
}

impl From<Delete> for Query {
    fn from(value: Delete) -> Self {
        Self::Delete(value)
    }
}

/// A table or view, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub alias: Option<String>,
}

impl Entity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
        }
    }

    pub fn as_(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

impl From<&str> for Entity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<(&str, &str)> for Entity {
    fn from((name, alias): (&str, &str)) -> Self {
        Self::new(name).as_(alias)
    }
}

/// A column reference, optionally qualified by its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub collection: Option<String>,
    pub name: String,
}

/// One projected expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: impl Into<Expr>) -> Self {
        Self {
            expr: expr.into(),
            alias: None,
        }
    }

    /// Name under which this item appears in a result row.
    ///
    /// The alias wins; an unaliased field reference uses its column name.
    /// Any other unaliased expression has no stable name.
    pub fn attribute_name(&self) -> Option<&str> {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => Some(alias),
            (None, Expr::Field(field)) => Some(&field.name),
            _ => None,
        }
    }
}

impl From<Expr> for SelectItem {
    fn from(value: Expr) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SelectItem {
    fn from(value: &str) -> Self {
        Self::new(Expr::field(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub entity: Entity,
    pub on: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub descending: bool,
}

/// A `SELECT` statement. Without [`from`](Self::from) it is a fixed select
/// that evaluates its projection once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub from: Option<Entity>,
    pub distinct: bool,
    pub fields: Vec<SelectItem>,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn from(entity: impl Into<Entity>) -> Self {
        Self {
            from: Some(entity.into()),
            ..Self::default()
        }
    }

    /// A select with no `FROM` clause.
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Appends several projected items.
    pub fn select<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SelectItem>,
    {
        self.fields.extend(items.into_iter().map(Into::into));
        self
    }

    /// Appends one projected item.
    pub fn field(mut self, item: impl Into<SelectItem>) -> Self {
        self.fields.push(item.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Adds a filter, combined with any existing filter using `AND`.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn join(self, entity: impl Into<Entity>, on: Expr) -> Self {
        self.join_with(JoinKind::Inner, entity, on)
    }

    pub fn left_join(self, entity: impl Into<Entity>, on: Expr) -> Self {
        self.join_with(JoinKind::Left, entity, on)
    }

    pub fn right_join(self, entity: impl Into<Entity>, on: Expr) -> Self {
        self.join_with(JoinKind::Right, entity, on)
    }

    fn join_with(mut self, kind: JoinKind, entity: impl Into<Entity>, on: Expr) -> Self {
        self.joins.push(Join {
            kind,
            entity: entity.into(),
            on,
        });
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn order_by(mut self, expr: Expr) -> Self {
        self.order_by.push(OrderBy {
            expr,
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, expr: Expr) -> Self {
        self.order_by.push(OrderBy {
            expr,
            descending: true,
        });
        self
    }

    pub fn take(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Names of projected attributes produced by JSON composition.
    ///
    /// Both the formatter's callers and the result post-processor use this
    /// list, so a column is reparsed as JSON exactly when it was composed as
    /// JSON. Unnamed compositions are skipped here; the formatter rejects
    /// them.
    pub fn json_attributes(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|item| matches!(item.expr, Expr::Json(_)))
            .filter_map(|item| item.attribute_name().map(String::from))
            .collect()
    }
}

/// An `INSERT` of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub into: String,
    pub values: Vec<(String, Expr)>,
}

impl Insert {
    pub fn into(table: &str) -> Self {
        Self {
            into: table.to_string(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, column: &str, value: impl Into<Expr>) -> Self {
        self.values.push((column.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub set: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
}

impl Update {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            set: Vec::new(),
            filter: None,
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<Expr>) -> Self {
        self.set.push((column.to_string(), value.into()));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub from: String,
    pub filter: Option<Expr>,
}

impl Delete {
    pub fn from(table: &str) -> Self {
        Self {
            from: table.to_string(),
            filter: None,
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// Calendar component extracted by the date-part functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Day,
    Month,
    Year,
    Hour,
    Minute,
    Second,
}

/// Flavor of the current-date function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GetDateKind {
    /// Calendar date only.
    Date,
    /// UTC date and time.
    #[default]
    DateTime,
    /// Local date and time with a numeric UTC offset.
    Timestamp,
}

/// Scalar functions understood by every dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Concat(Vec<Expr>),
    /// Zero-based start position.
    Substring {
        value: Box<Expr>,
        start: Box<Expr>,
        length: Option<Box<Expr>>,
    },
    /// Zero-based position of the second operand in the first, `-1` if absent.
    IndexOf(Box<Expr>, Box<Expr>),
    /// Whether the second operand occurs in the first.
    Text(Box<Expr>, Box<Expr>),
    Length(Box<Expr>),
    Ceiling(Box<Expr>),
    Floor(Box<Expr>),
    Round(Box<Expr>),
    Trim(Box<Expr>),
    ToLower(Box<Expr>),
    ToUpper(Box<Expr>),
    StartsWith(Box<Expr>, Box<Expr>),
    EndsWith(Box<Expr>, Box<Expr>),
    Contains(Box<Expr>, Box<Expr>),
    /// Anchored pattern match. Only `^prefix`, `suffix$` and `^exact$`
    /// patterns are supported.
    Regex(Box<Expr>, String),
    DatePart(DatePart, Box<Expr>),
    Date(Box<Expr>),
    IfNull(Box<Expr>, Box<Expr>),
    ToString(Box<Expr>),
    ToInt(Box<Expr>),
    ToLong(Box<Expr>),
    ToDouble(Box<Expr>),
    ToDecimal {
        value: Box<Expr>,
        precision: Option<u32>,
        scale: Option<u32>,
    },
    /// Path of the form `collection.attribute.member[.member…]`.
    JsonGet(String),
    /// Random version 4 UUID.
    Uuid,
    /// Deterministic UUID derived from a content hash of the operand.
    ToGuid(Box<Expr>),
    GetDate(GetDateKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// `None` counts rows.
    Count(Option<Box<Expr>>),
    Min(Box<Expr>),
    Max(Box<Expr>),
    Sum(Box<Expr>),
    Avg(Box<Expr>),
}

/// Members of a composed JSON object, keyed by alias or field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonObject {
    pub members: Vec<SelectItem>,
}

impl JsonObject {
    pub fn new<I, T>(members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SelectItem>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Where the elements of a composed JSON array come from.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonArraySource {
    /// A column already holding JSON array text.
    Field(FieldRef),
    /// One object per row of the select, built from all of its fields.
    Select(Box<Select>),
    /// A literal array.
    Value(Value),
}

/// JSON composition operators.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonCompose {
    Object(JsonObject),
    /// Aggregates one object per row. Holds an object by construction.
    GroupArray(JsonObject),
    Array(JsonArraySource),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(FieldRef),
    Value(Value),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Func(Function),
    Aggregate(Aggregate),
    Json(JsonCompose),
    Subquery(Box<Select>),
}

impl Expr {
    /// A column reference. `"t.col"` is qualified by `t`.
    ///
    /// # Examples
    ///
    /// ```
    /// use localsql_core::query::{Expr, FieldRef};
    ///
    /// assert_eq!(
    ///     Expr::field("u.name"),
    ///     Expr::Field(FieldRef { collection: Some("u".into()), name: "name".into() })
    /// );
    /// ```
    pub fn field(name: &str) -> Self {
        match name.split_once('.') {
            Some((collection, name)) => Self::qualified(collection, name),
            None => Self::Field(FieldRef {
                collection: None,
                name: name.to_string(),
            }),
        }
    }

    pub fn qualified(collection: &str, name: &str) -> Self {
        Self::Field(FieldRef {
            collection: Some(collection.to_string()),
            name: name.to_string(),
        })
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    fn compare(self, op: CompareOp, other: impl Into<Expr>) -> Self {
        Self::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Ne, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Ge, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Le, other)
    }

    /// Conjunction, flattening nested `AND`s.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction, flattening nested `OR`s.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn is_null(self) -> Self {
        Self::IsNull(Box::new(self))
    }

    pub fn in_list<I, T>(self, list: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self::In {
            expr: Box::new(self),
            list: list.into_iter().map(Into::into).collect(),
        }
    }

    fn arithmetic(self, op: ArithmeticOp, other: impl Into<Expr>) -> Self {
        Self::Arithmetic {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    pub fn plus(self, other: impl Into<Expr>) -> Self {
        self.arithmetic(ArithmeticOp::Add, other)
    }

    pub fn minus(self, other: impl Into<Expr>) -> Self {
        self.arithmetic(ArithmeticOp::Subtract, other)
    }

    pub fn times(self, other: impl Into<Expr>) -> Self {
        self.arithmetic(ArithmeticOp::Multiply, other)
    }

    pub fn divided_by(self, other: impl Into<Expr>) -> Self {
        self.arithmetic(ArithmeticOp::Divide, other)
    }

    pub fn modulo(self, other: impl Into<Expr>) -> Self {
        self.arithmetic(ArithmeticOp::Modulo, other)
    }

    /// Wraps the expression as an aliased projection item.
    pub fn as_(self, alias: &str) -> SelectItem {
        SelectItem {
            expr: self,
            alias: Some(alias.to_string()),
        }
    }

    pub fn concat<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Self::Func(Function::Concat(items.into_iter().map(Into::into).collect()))
    }

    pub fn substring(self, start: impl Into<Expr>, length: Option<Expr>) -> Self {
        Self::Func(Function::Substring {
            value: Box::new(self),
            start: Box::new(start.into()),
            length: length.map(Box::new),
        })
    }

    pub fn index_of(self, search: impl Into<Expr>) -> Self {
        Self::Func(Function::IndexOf(Box::new(self), Box::new(search.into())))
    }

    pub fn text(self, search: impl Into<Expr>) -> Self {
        Self::Func(Function::Text(Box::new(self), Box::new(search.into())))
    }

    pub fn length(self) -> Self {
        Self::Func(Function::Length(Box::new(self)))
    }

    pub fn ceiling(self) -> Self {
        Self::Func(Function::Ceiling(Box::new(self)))
    }

    pub fn floor(self) -> Self {
        Self::Func(Function::Floor(Box::new(self)))
    }

    pub fn round(self) -> Self {
        Self::Func(Function::Round(Box::new(self)))
    }

    pub fn trim(self) -> Self {
        Self::Func(Function::Trim(Box::new(self)))
    }

    pub fn to_lower(self) -> Self {
        Self::Func(Function::ToLower(Box::new(self)))
    }

    pub fn to_upper(self) -> Self {
        Self::Func(Function::ToUpper(Box::new(self)))
    }

    pub fn starts_with(self, prefix: impl Into<Expr>) -> Self {
        Self::Func(Function::StartsWith(Box::new(self), Box::new(prefix.into())))
    }

    pub fn ends_with(self, suffix: impl Into<Expr>) -> Self {
        Self::Func(Function::EndsWith(Box::new(self), Box::new(suffix.into())))
    }

    pub fn contains(self, search: impl Into<Expr>) -> Self {
        Self::Func(Function::Contains(Box::new(self), Box::new(search.into())))
    }

    pub fn regex(self, pattern: &str) -> Self {
        Self::Func(Function::Regex(Box::new(self), pattern.to_string()))
    }

    pub fn date_part(self, part: DatePart) -> Self {
        Self::Func(Function::DatePart(part, Box::new(self)))
    }

    pub fn day(self) -> Self {
        self.date_part(DatePart::Day)
    }

    pub fn month(self) -> Self {
        self.date_part(DatePart::Month)
    }

    pub fn year(self) -> Self {
        self.date_part(DatePart::Year)
    }

    pub fn hour(self) -> Self {
        self.date_part(DatePart::Hour)
    }

    pub fn minute(self) -> Self {
        self.date_part(DatePart::Minute)
    }

    pub fn second(self) -> Self {
        self.date_part(DatePart::Second)
    }

    pub fn date(self) -> Self {
        Self::Func(Function::Date(Box::new(self)))
    }

    pub fn if_null(self, fallback: impl Into<Expr>) -> Self {
        Self::Func(Function::IfNull(Box::new(self), Box::new(fallback.into())))
    }

    pub fn to_text(self) -> Self {
        Self::Func(Function::ToString(Box::new(self)))
    }

    pub fn to_int(self) -> Self {
        Self::Func(Function::ToInt(Box::new(self)))
    }

    pub fn to_long(self) -> Self {
        Self::Func(Function::ToLong(Box::new(self)))
    }

    pub fn to_double(self) -> Self {
        Self::Func(Function::ToDouble(Box::new(self)))
    }

    pub fn to_decimal(self, precision: Option<u32>, scale: Option<u32>) -> Self {
        Self::Func(Function::ToDecimal {
            value: Box::new(self),
            precision,
            scale,
        })
    }

    pub fn json_get(path: &str) -> Self {
        Self::Func(Function::JsonGet(path.to_string()))
    }

    pub fn uuid() -> Self {
        Self::Func(Function::Uuid)
    }

    pub fn to_guid(self) -> Self {
        Self::Func(Function::ToGuid(Box::new(self)))
    }

    pub fn get_date(kind: GetDateKind) -> Self {
        Self::Func(Function::GetDate(kind))
    }

    pub fn count_all() -> Self {
        Self::Aggregate(Aggregate::Count(None))
    }

    pub fn count(self) -> Self {
        Self::Aggregate(Aggregate::Count(Some(Box::new(self))))
    }

    pub fn min(self) -> Self {
        Self::Aggregate(Aggregate::Min(Box::new(self)))
    }

    pub fn max(self) -> Self {
        Self::Aggregate(Aggregate::Max(Box::new(self)))
    }

    pub fn sum(self) -> Self {
        Self::Aggregate(Aggregate::Sum(Box::new(self)))
    }

    pub fn avg(self) -> Self {
        Self::Aggregate(Aggregate::Avg(Box::new(self)))
    }

    pub fn json_object<I, T>(members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SelectItem>,
    {
        Self::Json(JsonCompose::Object(JsonObject::new(members)))
    }

    pub fn json_group_array(object: JsonObject) -> Self {
        Self::Json(JsonCompose::GroupArray(object))
    }

    /// A JSON array with one object per row of `select`.
    pub fn json_array_of(select: Select) -> Self {
        Self::Json(JsonCompose::Array(JsonArraySource::Select(Box::new(select))))
    }

    /// A JSON array read from a column holding JSON array text.
    pub fn json_array_field(collection: Option<&str>, name: &str) -> Self {
        Self::Json(JsonCompose::Array(JsonArraySource::Field(FieldRef {
            collection: collection.map(String::from),
            name: name.to_string(),
        })))
    }

    /// A literal JSON array.
    pub fn json_array_value(value: impl Into<Value>) -> Self {
        Self::Json(JsonCompose::Array(JsonArraySource::Value(value.into())))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Self::Value(value.into())
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<FieldRef> for Expr {
    fn from(value: FieldRef) -> Self {
        Self::Field(value)
    }
}

impl From<Function> for Expr {
    fn from(value: Function) -> Self {
        Self::Func(value)
    }
}

impl From<Aggregate> for Expr {
    fn from(value: Aggregate) -> Self {
        Self::Aggregate(value)
    }
}

impl From<JsonCompose> for Expr {
    fn from(value: JsonCompose) -> Self {
        Self::Json(value)
    }
}

impl From<Select> for Expr {
    fn from(value: Select) -> Self {
        Self::Subquery(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_combines_with_and() {
        let select = Select::from("user")
            .filter(Expr::field("age").gt(18))
            .filter(Expr::field("active").eq(true))
            .filter(Expr::field("name").ne("root"));

        match select.filter {
            Some(Expr::And(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected flattened AND, got {other:?}"),
        }
    }

    #[test]
    fn test_projection_strings_are_fields() {
        let select = Select::from("user").select(["id", "u.name"]);
        assert_eq!(select.fields[0].attribute_name(), Some("id"));
        assert_eq!(
            select.fields[1].expr,
            Expr::qualified("u", "name")
        );
    }

    #[test]
    fn test_operand_strings_are_values() {
        let expr = Expr::field("name").eq("Ada");
        match expr {
            Expr::Compare { right, .. } => {
                assert_eq!(*right, Expr::Value(Value::Text("Ada".into())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_json_attributes_lists_only_named_compositions() {
        let select = Select::fixed()
            .field(Expr::json_object(["id"]).as_("item"))
            .field(Expr::json_array_value(Value::Array(vec![1.into()])))
            .field(Expr::field("plain"));
        assert_eq!(select.json_attributes(), vec!["item".to_string()]);
    }
}
