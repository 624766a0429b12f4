//! Bound argument metadata: direction modes, declared SQL types and type handlers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::BytesMut;
use serde::Serialize;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

/// Parameter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SqlMode {
    #[default]
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[serde(rename = "INOUT")]
    InOut,
    /// Output parameter returning a cursor / result set.
    #[serde(rename = "CURSOR")]
    Cursor,
}

impl SqlMode {
    /// Whether a value is sent to the database.
    pub fn is_input(self) -> bool {
        matches!(self, SqlMode::In | SqlMode::InOut)
    }

    /// Whether the database returns a value through this parameter.
    pub fn is_output(self) -> bool {
        matches!(self, SqlMode::Out | SqlMode::InOut | SqlMode::Cursor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SqlMode::In => "IN",
            SqlMode::Out => "OUT",
            SqlMode::InOut => "INOUT",
            SqlMode::Cursor => "CURSOR",
        }
    }
}

impl FromStr for SqlMode {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(SqlMode::In),
            "OUT" => Ok(SqlMode::Out),
            "INOUT" | "IN_OUT" => Ok(SqlMode::InOut),
            "CURSOR" => Ok(SqlMode::Cursor),
            other => Err(TemplateError::config(format!("unknown sql mode: {other}"))),
        }
    }
}

impl fmt::Display for SqlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared semantic type of a parameter (JDBC-style type names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlType {
    Bit,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    NChar,
    Varchar,
    NVarchar,
    LongVarchar,
    Clob,
    Date,
    Time,
    Timestamp,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Array,
    Json,
    Uuid,
    RefCursor,
    Null,
    Other,
}

impl SqlType {
    /// Numeric code as used by `java.sql.Types`, for interop with JDBC-style configuration.
    pub fn code(self) -> i32 {
        match self {
            SqlType::Bit => -7,
            SqlType::Boolean => 16,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Char => 1,
            SqlType::NChar => -15,
            SqlType::Varchar => 12,
            SqlType::NVarchar => -9,
            SqlType::LongVarchar => -1,
            SqlType::Clob => 2005,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::TimestampWithTimezone => 2014,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::LongVarBinary => -4,
            SqlType::Blob => 2004,
            SqlType::Array => 2003,
            SqlType::RefCursor => 2012,
            SqlType::Null => 0,
            SqlType::Json | SqlType::Uuid | SqlType::Other => 1111,
        }
    }

    /// PostgreSQL type used when preparing a statement with declared parameter types.
    pub fn pg_type(self) -> Option<Type> {
        let ty = match self {
            SqlType::Bit | SqlType::Boolean => Type::BOOL,
            SqlType::TinyInt | SqlType::SmallInt => Type::INT2,
            SqlType::Integer => Type::INT4,
            SqlType::BigInt => Type::INT8,
            SqlType::Real => Type::FLOAT4,
            SqlType::Float | SqlType::Double => Type::FLOAT8,
            SqlType::Numeric | SqlType::Decimal => Type::NUMERIC,
            SqlType::Char | SqlType::NChar => Type::BPCHAR,
            SqlType::Varchar | SqlType::NVarchar => Type::VARCHAR,
            SqlType::LongVarchar | SqlType::Clob => Type::TEXT,
            SqlType::Date => Type::DATE,
            SqlType::Time => Type::TIME,
            SqlType::Timestamp => Type::TIMESTAMP,
            SqlType::TimestampWithTimezone => Type::TIMESTAMPTZ,
            SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary | SqlType::Blob => {
                Type::BYTEA
            }
            SqlType::Json => Type::JSONB,
            SqlType::Uuid => Type::UUID,
            SqlType::Array | SqlType::RefCursor | SqlType::Null | SqlType::Other => return None,
        };
        Some(ty)
    }
}

impl FromStr for SqlType {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        let ty = match name.as_str() {
            "BIT" => SqlType::Bit,
            "BOOLEAN" | "BOOL" => SqlType::Boolean,
            "TINYINT" => SqlType::TinyInt,
            "SMALLINT" | "INT2" => SqlType::SmallInt,
            "INTEGER" | "INT" | "INT4" => SqlType::Integer,
            "BIGINT" | "INT8" => SqlType::BigInt,
            "FLOAT" => SqlType::Float,
            "REAL" | "FLOAT4" => SqlType::Real,
            "DOUBLE" | "FLOAT8" => SqlType::Double,
            "NUMERIC" => SqlType::Numeric,
            "DECIMAL" => SqlType::Decimal,
            "CHAR" => SqlType::Char,
            "NCHAR" => SqlType::NChar,
            "VARCHAR" => SqlType::Varchar,
            "NVARCHAR" => SqlType::NVarchar,
            "LONGVARCHAR" | "TEXT" => SqlType::LongVarchar,
            "CLOB" => SqlType::Clob,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" => SqlType::Timestamp,
            "TIMESTAMP_WITH_TIMEZONE" | "TIMESTAMPTZ" => SqlType::TimestampWithTimezone,
            "BINARY" => SqlType::Binary,
            "VARBINARY" => SqlType::VarBinary,
            "LONGVARBINARY" => SqlType::LongVarBinary,
            "BLOB" | "BYTEA" => SqlType::Blob,
            "ARRAY" => SqlType::Array,
            "JSON" | "JSONB" => SqlType::Json,
            "UUID" => SqlType::Uuid,
            "REF_CURSOR" | "CURSOR" => SqlType::RefCursor,
            "NULL" => SqlType::Null,
            "OTHER" => SqlType::Other,
            _ => return Err(TemplateError::config(format!("unknown sql type: {s}"))),
        };
        Ok(ty)
    }
}

/// Conversion strategy applied to a value before it is sent to the database.
pub trait TypeHandler: fmt::Debug + Send + Sync {
    /// Name used to reference the handler from `typeHandler=...`.
    fn name(&self) -> &str;

    /// Convert a bound value into the representation sent to the database.
    fn to_sql_value(&self, value: &Value) -> TemplateResult<Value>;
}

/// Handlers shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinHandler {
    String,
    Integer,
    Float,
    Boolean,
    Json,
    Bytes,
    Uuid,
}

impl BuiltinHandler {
    pub const ALL: [BuiltinHandler; 7] = [
        BuiltinHandler::String,
        BuiltinHandler::Integer,
        BuiltinHandler::Float,
        BuiltinHandler::Boolean,
        BuiltinHandler::Json,
        BuiltinHandler::Bytes,
        BuiltinHandler::Uuid,
    ];

    /// Declared types this handler serves by default.
    fn sql_types(self) -> &'static [SqlType] {
        match self {
            BuiltinHandler::String => &[
                SqlType::Char,
                SqlType::NChar,
                SqlType::Varchar,
                SqlType::NVarchar,
                SqlType::LongVarchar,
                SqlType::Clob,
            ],
            BuiltinHandler::Integer => &[
                SqlType::TinyInt,
                SqlType::SmallInt,
                SqlType::Integer,
                SqlType::BigInt,
            ],
            BuiltinHandler::Float => &[SqlType::Float, SqlType::Real, SqlType::Double],
            BuiltinHandler::Boolean => &[SqlType::Bit, SqlType::Boolean],
            BuiltinHandler::Json => &[SqlType::Json],
            BuiltinHandler::Bytes => &[
                SqlType::Binary,
                SqlType::VarBinary,
                SqlType::LongVarBinary,
                SqlType::Blob,
            ],
            BuiltinHandler::Uuid => &[SqlType::Uuid],
        }
    }
}

fn convert_error(handler: &str, value: &Value) -> TemplateError {
    TemplateError::conversion(format!(
        "{handler} handler cannot convert {} value `{value}`",
        value.kind()
    ))
}

impl TypeHandler for BuiltinHandler {
    fn name(&self) -> &str {
        match self {
            BuiltinHandler::String => "string",
            BuiltinHandler::Integer => "integer",
            BuiltinHandler::Float => "float",
            BuiltinHandler::Boolean => "boolean",
            BuiltinHandler::Json => "json",
            BuiltinHandler::Bytes => "bytes",
            BuiltinHandler::Uuid => "uuid",
        }
    }

    fn to_sql_value(&self, value: &Value) -> TemplateResult<Value> {
        let value = value.plain();
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            BuiltinHandler::String => Ok(Value::Text(value.to_text())),
            BuiltinHandler::Integer => match value {
                Value::Int(_) => Ok(value.clone()),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
                Value::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| convert_error(self.name(), value)),
                _ => Err(convert_error(self.name(), value)),
            },
            BuiltinHandler::Float => match value {
                Value::Float(_) => Ok(value.clone()),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| convert_error(self.name(), value)),
                _ => Err(convert_error(self.name(), value)),
            },
            BuiltinHandler::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "y" | "yes" | "1" => Ok(Value::Bool(true)),
                    "false" | "f" | "n" | "no" | "0" => Ok(Value::Bool(false)),
                    _ => Err(convert_error(self.name(), value)),
                },
                _ => Err(convert_error(self.name(), value)),
            },
            BuiltinHandler::Json => match value {
                Value::Text(s) => Ok(serde_json::from_str::<serde_json::Value>(s)?.into()),
                other => Ok(other.clone()),
            },
            BuiltinHandler::Bytes => match value {
                Value::Bytes(_) => Ok(value.clone()),
                Value::Text(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
                _ => Err(convert_error(self.name(), value)),
            },
            BuiltinHandler::Uuid => match value {
                Value::Uuid(_) => Ok(value.clone()),
                Value::Text(s) => uuid::Uuid::parse_str(s.trim())
                    .map(Value::Uuid)
                    .map_err(|_| convert_error(self.name(), value)),
                _ => Err(convert_error(self.name(), value)),
            },
        }
    }
}

/// Type handlers addressable by name and by declared type.
#[derive(Debug, Clone, Default)]
pub struct TypeHandlerRegistry {
    by_name: HashMap<String, Arc<dyn TypeHandler>>,
    by_type: HashMap<SqlType, Arc<dyn TypeHandler>>,
}

impl TypeHandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the [`BuiltinHandler`]s.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for builtin in BuiltinHandler::ALL {
            let handler: Arc<dyn TypeHandler> = Arc::new(builtin);
            for ty in builtin.sql_types() {
                registry.by_type.insert(*ty, handler.clone());
            }
            registry.register(handler);
        }
        registry
    }

    /// Register a handler under its (case-insensitive) name.
    pub fn register(&mut self, handler: Arc<dyn TypeHandler>) {
        self.by_name
            .insert(handler.name().to_ascii_lowercase(), handler);
    }

    /// Make `handler` the default for a declared type.
    pub fn register_for_type(&mut self, sql_type: SqlType, handler: Arc<dyn TypeHandler>) {
        self.by_type.insert(sql_type, handler);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn TypeHandler>> {
        self.by_name.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    pub fn find_for_type(&self, sql_type: SqlType) -> Option<Arc<dyn TypeHandler>> {
        self.by_type.get(&sql_type).cloned()
    }
}

/// A bound argument: value plus direction, declared type and conversion strategy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SqlArg {
    /// Originating expression (or synthetic name such as `arg0`).
    pub name: Option<String>,
    pub value: Value,
    pub mode: SqlMode,
    #[serde(rename = "sqlType")]
    pub sql_type: Option<SqlType>,
    /// Free-form application type name (`javaType=` in templates).
    #[serde(rename = "valueType")]
    pub value_type: Option<String>,
    #[serde(skip)]
    pub handler: Option<Arc<dyn TypeHandler>>,
}

impl SqlArg {
    /// An `IN` argument with no metadata.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// An `IN` argument tagged with its originating expression.
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(value).with_name(name)
    }

    /// An `OUT` argument with a declared type.
    pub fn out(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: Some(name.into()),
            mode: SqlMode::Out,
            sql_type: Some(sql_type),
            ..Self::default()
        }
    }

    /// An `INOUT` argument with a declared type.
    pub fn in_out(name: impl Into<String>, value: impl Into<Value>, sql_type: SqlType) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
            mode: SqlMode::InOut,
            sql_type: Some(sql_type),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: SqlMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Name of the attached handler, if any.
    pub fn handler_name(&self) -> Option<&str> {
        self.handler.as_deref().map(TypeHandler::name)
    }

    /// The value that is sent to the database, after the handler (if any) is applied.
    pub fn bind_value(&self) -> TemplateResult<Value> {
        match &self.handler {
            Some(handler) => handler.to_sql_value(&self.value),
            None => Ok(self.value.plain().clone()),
        }
    }
}

impl PartialEq for SqlArg {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.mode == other.mode
            && self.sql_type == other.sql_type
            && self.value_type == other.value_type
            && self.handler_name() == other.handler_name()
    }
}

impl ToSql for SqlArg {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match &self.handler {
            Some(handler) => handler.to_sql_value(&self.value)?.to_sql(ty, out),
            None => self.value.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
