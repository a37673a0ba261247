// packages/engine/src/contract/types.rs
//! Type references and dynamic values
//!
//! Every argument and result crossing a proxy boundary is a [`Value`].
//! Operation signatures describe their parameters and return type with
//! [`TypeRef`], which also decides the default value a failed or stubbed
//! operation produces.

use crate::utils::errors::ConversionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// No value
    Void,
    Bool,
    Char,
    I32,
    I64,
    F64,
    Str,
    Bytes,
    List(Box<TypeRef>),
    /// String-keyed map
    Map(Box<TypeRef>),
    /// Value that may be absent
    Optional(Box<TypeRef>),
    /// Named record type, carried as a map of fields
    Object(String),
}

impl TypeRef {
    pub fn list(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    pub fn map(value: TypeRef) -> Self {
        TypeRef::Map(Box::new(value))
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn object(name: impl Into<String>) -> Self {
        TypeRef::Object(name.into())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// Primitive types default to a zero value rather than an absent one
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeRef::Bool | TypeRef::Char | TypeRef::I32 | TypeRef::I64 | TypeRef::F64
        )
    }

    pub fn is_reference(&self) -> bool {
        !self.is_void() && !self.is_primitive()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Char => f.write_str("char"),
            TypeRef::I32 => f.write_str("i32"),
            TypeRef::I64 => f.write_str("i64"),
            TypeRef::F64 => f.write_str("f64"),
            TypeRef::Str => f.write_str("str"),
            TypeRef::Bytes => f.write_str("bytes"),
            TypeRef::List(inner) => write!(f, "list<{}>", inner),
            TypeRef::Map(inner) => write!(f, "map<{}>", inner),
            TypeRef::Optional(inner) => write!(f, "{}?", inner),
            TypeRef::Object(name) => f.write_str(name),
        }
    }
}

/// Dynamic value passed to and returned from handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Result of a void operation
    Unit,
    /// Absent reference
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Default value for a declared type
    ///
    /// Primitives get their zero value, strings and collections are empty,
    /// optional and object references are absent, void yields [`Value::Unit`].
    pub fn default_for(ty: &TypeRef) -> Value {
        match ty {
            TypeRef::Void => Value::Unit,
            TypeRef::Bool => Value::Bool(false),
            TypeRef::Char => Value::Char('\0'),
            TypeRef::I32 | TypeRef::I64 => Value::Int(0),
            TypeRef::F64 => Value::Float(0.0),
            TypeRef::Str => Value::Str(String::new()),
            TypeRef::Bytes => Value::Bytes(Vec::new()),
            TypeRef::List(_) => Value::List(Vec::new()),
            TypeRef::Map(_) => Value::Map(BTreeMap::new()),
            TypeRef::Optional(_) | TypeRef::Object(_) => Value::Null,
        }
    }

    /// Short name of the value's kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert the value to `ty`, checking nested elements
    pub fn conform(self, ty: &TypeRef) -> Result<Value, ConversionError> {
        let mismatch = |found: &Value| ConversionError {
            expected: ty.clone(),
            found: found.kind_name().to_string(),
        };

        match (ty, self) {
            (TypeRef::Void, Value::Unit) => Ok(Value::Unit),
            (TypeRef::Bool, v @ Value::Bool(_)) => Ok(v),
            (TypeRef::Char, v @ Value::Char(_)) => Ok(v),
            (TypeRef::I32, Value::Int(i)) => {
                if i32::try_from(i).is_ok() {
                    Ok(Value::Int(i))
                } else {
                    Err(ConversionError {
                        expected: ty.clone(),
                        found: format!("int {} out of range", i),
                    })
                }
            }
            (TypeRef::I64, v @ Value::Int(_)) => Ok(v),
            (TypeRef::F64, v @ Value::Float(_)) => Ok(v),
            (TypeRef::F64, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (TypeRef::Str, v @ Value::Str(_)) => Ok(v),
            (TypeRef::Bytes, v @ Value::Bytes(_)) => Ok(v),
            (TypeRef::List(element), Value::List(items)) => items
                .into_iter()
                .map(|item| item.conform(element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (TypeRef::Map(element), Value::Map(entries)) => entries
                .into_iter()
                .map(|(key, item)| item.conform(element).map(|item| (key, item)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Map),
            (TypeRef::Optional(_), Value::Null) => Ok(Value::Null),
            (TypeRef::Optional(inner), v) => v.conform(inner),
            (TypeRef::Object(_), v @ (Value::Null | Value::Map(_))) => Ok(v),
            (_, v) => Err(mismatch(&v)),
        }
    }

    /// Whether the value would conform to `ty`
    pub fn accepts(&self, ty: &TypeRef) -> bool {
        self.clone().conform(ty).is_ok()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Value::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    /// Plain JSON rendering; unit becomes null, bytes an array of numbers
    fn from(value: &Value) -> Self {
        match value {
            Value::Unit | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Char(c) => serde_json::Value::String(c.to_string()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::from(bytes.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), serde_json::Value::from(item)))
                    .collect(),
            ),
        }
    }
}

/// Conversion of Rust values into [`Value`]
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion of [`Value`] back into Rust values
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn unexpected(expected: TypeRef, value: &Value) -> ConversionError {
    ConversionError {
        expected,
        found: value.kind_name().to_string(),
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Unit
    }
}

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(unexpected(TypeRef::Void, &other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(unexpected(TypeRef::Bool, &other)),
        }
    }
}

impl IntoValue for char {
    fn into_value(self) -> Value {
        Value::Char(self)
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Char(c) => Ok(c),
            other => Err(unexpected(TypeRef::Char, &other)),
        }
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.conform(&TypeRef::I32)? {
            Value::Int(i) => i32::try_from(i).map_err(|_| ConversionError {
                expected: TypeRef::I32,
                found: format!("int {} out of range", i),
            }),
            other => Err(unexpected(TypeRef::I32, &other)),
        }
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(unexpected(TypeRef::I64, &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.conform(&TypeRef::F64)? {
            Value::Float(x) => Ok(x),
            other => Err(unexpected(TypeRef::F64, &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(unexpected(TypeRef::Str, &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected(TypeRef::list(TypeRef::Void), &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(key, item)| (key, item.into_value()))
                .collect(),
        )
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| T::from_value(item).map(|item| (key, item)))
                .collect(),
            other => Err(unexpected(TypeRef::map(TypeRef::Void), &other)),
        }
    }
}

/// Build an argument list from Rust values
///
/// ```ignore
/// let args = args!["Ada", 36];
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::contract::types::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::contract::types::IntoValue::into_value($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({
            "name": "Ada",
            "age": 36,
            "score": 1.5,
            "tags": ["a"],
            "boss": null
        });
        let value = Value::from(json.clone());

        let Value::Map(entries) = &value else {
            panic!("expected map, got {}", value);
        };
        assert_eq!(entries["age"], Value::Int(36));
        assert_eq!(entries["score"], Value::Float(1.5));
        assert_eq!(entries["boss"], Value::Null);
        assert!(value.accepts(&TypeRef::object("app.User")));

        assert_eq!(serde_json::Value::from(&value), json);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Value::default_for(&TypeRef::Void), Value::Unit);
        assert_eq!(Value::default_for(&TypeRef::I32), Value::Int(0));
        assert_eq!(Value::default_for(&TypeRef::Bool), Value::Bool(false));
        assert_eq!(Value::default_for(&TypeRef::F64), Value::Float(0.0));
        assert_eq!(Value::default_for(&TypeRef::Str), Value::Str(String::new()));
        assert_eq!(Value::default_for(&TypeRef::object("app.User")), Value::Null);
        assert_eq!(
            Value::default_for(&TypeRef::optional(TypeRef::I64)),
            Value::Null
        );
    }

    #[test]
    fn test_conform_widening_and_narrowing() {
        assert_eq!(Value::Int(3).conform(&TypeRef::F64).unwrap(), Value::Float(3.0));
        assert!(Value::Int(i64::MAX).conform(&TypeRef::I32).is_err());
        assert!(Value::Float(1.5).conform(&TypeRef::I64).is_err());
    }

    #[test]
    fn test_conform_nested() {
        let list = Value::List(vec![Value::Int(1), Value::Null]);
        assert!(list.clone().conform(&TypeRef::list(TypeRef::optional(TypeRef::I32))).is_ok());
        assert!(list.conform(&TypeRef::list(TypeRef::I32)).is_err());

        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Value::Str("user1".to_string()));
        let record = Value::Map(fields);
        assert!(record.accepts(&TypeRef::object("app.User")));
        assert!(record.accepts(&TypeRef::map(TypeRef::Str)));
        assert!(!record.accepts(&TypeRef::map(TypeRef::I64)));
    }

    #[test]
    fn test_rust_conversions() {
        assert_eq!(i32::from_value(Value::Int(7)).unwrap(), 7);
        assert_eq!(String::from_value("hi".into_value()).unwrap(), "hi");
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Vec::<bool>::from_value(vec![true, false].into_value()).unwrap(),
            vec![true, false]
        );
        assert!(bool::from_value(Value::Int(1)).is_err());
    }

    #[test]
    fn test_args_macro() {
        let args = args!["Ada", 36, true];
        assert_eq!(
            args,
            vec![Value::Str("Ada".to_string()), Value::Int(36), Value::Bool(true)]
        );
        assert!(args!().is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeRef::list(TypeRef::optional(TypeRef::Str)).to_string(), "list<str?>");
        assert_eq!(Value::List(vec![Value::Int(1), Value::Null]).to_string(), "[1, null]");
    }

    fn type_ref_strategy() -> impl Strategy<Value = TypeRef> {
        let leaf = prop_oneof![
            Just(TypeRef::Void),
            Just(TypeRef::Bool),
            Just(TypeRef::Char),
            Just(TypeRef::I32),
            Just(TypeRef::I64),
            Just(TypeRef::F64),
            Just(TypeRef::Str),
            Just(TypeRef::Bytes),
            "[A-Z][a-z]{0,8}".prop_map(TypeRef::Object),
        ];
        leaf.prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(TypeRef::list),
                inner.clone().prop_map(TypeRef::map),
                inner.prop_map(TypeRef::optional),
            ]
        })
    }

    proptest! {
        #[test]
        fn default_always_conforms(ty in type_ref_strategy()) {
            let value = Value::default_for(&ty);
            prop_assert_eq!(value.clone().conform(&ty).unwrap(), value);
        }

        #[test]
        fn primitive_defaults_are_never_null(ty in type_ref_strategy()) {
            if ty.is_primitive() {
                prop_assert!(!Value::default_for(&ty).is_null());
            }
        }

        #[test]
        fn i32_conformance_matches_range(i in any::<i64>()) {
            let in_range = i32::try_from(i).is_ok();
            prop_assert_eq!(Value::Int(i).accepts(&TypeRef::I32), in_range);
        }
    }
}
