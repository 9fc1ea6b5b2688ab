//! Typed parameter values.
//!
//! A [`Value`] wraps one raw datum together with the generation metadata the
//! engine understands: negativity, weight, and an ordered alias list. Values
//! are built through named constructors (`Value::string`, `Value::int32`, ...)
//! so every conversion is visible at the call site.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Weight assigned to values that were not explicitly weighted.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Declared type of a value, shared by every value of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Number,
    Enum,
    ComplexObject,
}

impl ValueType {
    /// Whether `<`, `<=`, `>` and `>=` are meaningful for this type.
    pub fn supports_relational(self) -> bool {
        matches!(self, Self::String | Self::Number)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Enum => "Enum",
            Self::ComplexObject => "ComplexObject",
        };
        f.write_str(name)
    }
}

/// The concrete kind of raw datum a value carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    String,
    Int32,
    Int64,
    Char,
    Bool,
    Enum,
    Guid,
    Bytes,
    Null,
    Object,
}

impl ValueKind {
    /// The declared type values of this kind belong to.
    pub fn value_type(self) -> ValueType {
        match self {
            Self::String => ValueType::String,
            Self::Int32 | Self::Int64 | Self::Char => ValueType::Number,
            Self::Enum | Self::Bool => ValueType::Enum,
            Self::Guid | Self::Bytes | Self::Null | Self::Object => ValueType::ComplexObject,
        }
    }
}

/// A named member of an enumeration, e.g. `FontStyle::Italic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumTag {
    /// Name of the enumeration type.
    pub type_name: String,
    /// Member name. Flag combinations use `", "` separators.
    pub name: String,
}

impl EnumTag {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

/// Shared reference to an arbitrary object used as a value.
///
/// Identity is the allocation: two `ObjectRef`s are equal only when they
/// point at the same object.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        Self(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn Any + Send + Sync>) -> Self {
        Self(object)
    }

    /// Borrow the object as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both references point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.addr())
    }
}

/// The raw datum behind a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Char(char),
    Bool(bool),
    Enum(EnumTag),
    Guid(Uuid),
    Bytes(Vec<u8>),
    Null,
    Object(ObjectRef),
}

impl RawValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Char(_) => ValueKind::Char,
            Self::Bool(_) => ValueKind::Bool,
            Self::Enum(_) => ValueKind::Enum,
            Self::Guid(_) => ValueKind::Guid,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Null => ValueKind::Null,
            Self::Object(_) => ValueKind::Object,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.kind().value_type()
    }
}

impl PartialOrd for RawValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RawValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use RawValue::*;
        match (self, other) {
            (String(a), String(b)) => a.cmp(b),
            (Int32(a), Int32(b)) => a.cmp(b),
            (Int64(a), Int64(b)) => a.cmp(b),
            (Int32(a), Int64(b)) => i64::from(*a).cmp(b).then(Ordering::Less),
            (Int64(a), Int32(b)) => a.cmp(&i64::from(*b)).then(Ordering::Greater),
            (Char(a), Char(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Enum(a), Enum(b)) => a.cmp(b),
            (Guid(a), Guid(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Null, Null) => Ordering::Equal,
            (Object(a), Object(b)) => a.addr().cmp(&b.addr()),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int32(n) => write!(f, "{n}"),
            Self::Int64(n) => write!(f, "{n}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Enum(tag) => f.write_str(&tag.name),
            Self::Guid(g) => write!(f, "{g}"),
            Self::Bytes(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Null => f.write_str("null"),
            Self::Object(obj) => write!(f, "{obj:?}"),
        }
    }
}

/// A legal value of a parameter.
///
/// Equality and hashing consider the raw datum and negativity only; weight
/// and aliases are generation hints and do not change what a value *is*.
#[derive(Debug, Clone)]
pub struct Value {
    raw: RawValue,
    negative: bool,
    weight: u32,
    aliases: Vec<Value>,
}

impl Value {
    /// Create a value from a raw datum.
    pub fn from_raw(raw: RawValue) -> Self {
        Self {
            raw,
            negative: false,
            weight: DEFAULT_WEIGHT,
            aliases: Vec::new(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::from_raw(RawValue::String(value.into()))
    }

    pub fn int32(value: i32) -> Self {
        Self::from_raw(RawValue::Int32(value))
    }

    pub fn int64(value: i64) -> Self {
        Self::from_raw(RawValue::Int64(value))
    }

    /// A character value. Characters are numbers for typing purposes but are
    /// rendered as text.
    pub fn character(value: char) -> Self {
        Self::from_raw(RawValue::Char(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::from_raw(RawValue::Bool(value))
    }

    pub fn enumeration(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_raw(RawValue::Enum(EnumTag::new(type_name, name)))
    }

    pub fn guid(value: Uuid) -> Self {
        Self::from_raw(RawValue::Guid(value))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::from_raw(RawValue::Bytes(value.into()))
    }

    pub fn null() -> Self {
        Self::from_raw(RawValue::Null)
    }

    /// Wrap an arbitrary object. The value keeps a shared reference to it.
    pub fn object<T: Any + Send + Sync>(object: T) -> Self {
        Self::from_raw(RawValue::Object(ObjectRef::new(object)))
    }

    pub fn object_ref(object: ObjectRef) -> Self {
        Self::from_raw(RawValue::Object(object))
    }

    /// Create the negative counterpart of `value`.
    ///
    /// Aliases are negated along with their owner. Fails if `value` is
    /// already negative.
    pub fn create_negative_option(value: Value) -> Result<Value, ValidationError> {
        value.negative()
    }

    /// Mark this value (and its aliases) negative.
    pub fn negative(mut self) -> Result<Self, ValidationError> {
        if self.negative {
            return Err(ValidationError::DoubleNegation(self.raw.to_string()));
        }
        self.negative = true;
        for alias in &mut self.aliases {
            alias.negative = true;
        }
        Ok(self)
    }

    /// Set the generation weight. Weights start at 1.
    pub fn with_weight(mut self, weight: u32) -> Result<Self, ValidationError> {
        if weight < DEFAULT_WEIGHT {
            return Err(ValidationError::InvalidWeight(weight));
        }
        self.weight = weight;
        Ok(self)
    }

    /// Attach an alias, consuming and returning the value.
    pub fn with_alias(mut self, alias: Value) -> Result<Self, ValidationError> {
        self.add_alias(alias)?;
        Ok(self)
    }

    /// Attach an alias.
    ///
    /// The alias must share this value's type and negativity, must not be
    /// a complex object, and must carry no aliases itself.
    pub fn add_alias(&mut self, alias: Value) -> Result<(), ValidationError> {
        if alias.has_aliases() {
            return Err(ValidationError::NestedAlias);
        }
        if alias.value_type() == ValueType::ComplexObject
            || self.value_type() == ValueType::ComplexObject
        {
            return Err(ValidationError::ComplexAlias);
        }
        if alias.value_type() != self.value_type() {
            return Err(ValidationError::TypeMismatch {
                expected: self.value_type(),
                actual: alias.value_type(),
            });
        }
        if alias.negative != self.negative {
            return Err(ValidationError::AliasMismatch);
        }
        self.aliases.push(alias);
        Ok(())
    }

    pub fn raw(&self) -> &RawValue {
        &self.raw
    }

    pub fn kind(&self) -> ValueKind {
        self.raw.kind()
    }

    pub fn value_type(&self) -> ValueType {
        self.raw.value_type()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn aliases(&self) -> &[Value] {
        &self.aliases
    }

    pub fn has_aliases(&self) -> bool {
        !self.aliases.is_empty()
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.raw {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content of an `Int32` or `Int64` value.
    pub fn as_i64(&self) -> Option<i64> {
        match self.raw {
            RawValue::Int32(n) => Some(i64::from(n)),
            RawValue::Int64(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.raw {
            RawValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumTag> {
        match &self.raw {
            RawValue::Enum(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn downcast_object<T: Any>(&self) -> Option<&T> {
        match &self.raw {
            RawValue::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.negative == other.negative && self.raw == other.raw
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.negative.hash(state);
        self.raw.hash(state);
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw
            .cmp(&other.raw)
            .then(self.negative.cmp(&other.negative))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("~")?;
        }
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_declared_types() {
        assert_eq!(Value::string("a").value_type(), ValueType::String);
        assert_eq!(Value::int32(1).value_type(), ValueType::Number);
        assert_eq!(Value::int64(1).value_type(), ValueType::Number);
        assert_eq!(Value::character('x').value_type(), ValueType::Number);
        assert_eq!(Value::boolean(true).value_type(), ValueType::Enum);
        assert_eq!(
            Value::enumeration("Color", "Red").value_type(),
            ValueType::Enum
        );
        assert_eq!(Value::null().value_type(), ValueType::ComplexObject);
        assert_eq!(Value::bytes(vec![1, 2]).value_type(), ValueType::ComplexObject);
        assert_eq!(Value::object(42u8).value_type(), ValueType::ComplexObject);
    }

    #[test]
    fn test_equality_ignores_weight_and_aliases() {
        let plain = Value::string("red");
        let dressed = Value::string("red")
            .with_weight(5)
            .unwrap()
            .with_alias(Value::string("crimson"))
            .unwrap();

        assert_eq!(plain, dressed);

        let mut set = HashSet::new();
        set.insert(plain);
        assert!(set.contains(&dressed));
    }

    #[test]
    fn test_equality_includes_negativity_and_kind() {
        let positive = Value::string("x");
        let negative = Value::string("x").negative().unwrap();
        assert_ne!(positive, negative);
        assert_ne!(Value::int32(1), Value::int64(1));
    }

    #[test]
    fn test_double_negation_fails() {
        let once = Value::create_negative_option(Value::int32(-1)).unwrap();
        assert!(once.is_negative());

        let err = Value::create_negative_option(once).unwrap_err();
        assert!(matches!(err, ValidationError::DoubleNegation(_)));
    }

    #[test]
    fn test_negation_carries_aliases() {
        let value = Value::string("a")
            .with_alias(Value::string("b"))
            .unwrap()
            .negative()
            .unwrap();
        assert!(value.aliases().iter().all(Value::is_negative));
    }

    #[test]
    fn test_alias_rules() {
        let nested = Value::string("b").with_alias(Value::string("c")).unwrap();
        assert_eq!(
            Value::string("a").with_alias(nested).unwrap_err(),
            ValidationError::NestedAlias
        );

        assert!(matches!(
            Value::string("a").with_alias(Value::int32(1)).unwrap_err(),
            ValidationError::TypeMismatch { .. }
        ));

        assert_eq!(
            Value::string("a")
                .with_alias(Value::string("b").negative().unwrap())
                .unwrap_err(),
            ValidationError::AliasMismatch
        );

        assert_eq!(
            Value::null().with_alias(Value::null()).unwrap_err(),
            ValidationError::ComplexAlias
        );
    }

    #[test]
    fn test_weight_must_be_positive() {
        assert_eq!(
            Value::int32(3).with_weight(0).unwrap_err(),
            ValidationError::InvalidWeight(0)
        );
        assert_eq!(Value::int32(3).with_weight(7).unwrap().weight(), 7);
    }

    #[test]
    fn test_object_identity() {
        let shared = ObjectRef::new(String::from("payload"));
        let a = Value::object_ref(shared.clone());
        let b = Value::object_ref(shared);
        let c = Value::object(String::from("payload"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a.downcast_object::<String>().map(String::as_str),
            Some("payload")
        );
    }

    #[test]
    fn test_ordering_is_by_content() {
        let mut values = vec![Value::int32(3), Value::int32(1), Value::int32(2)];
        values.sort();
        let numbers: Vec<_> = values.iter().filter_map(Value::as_i64).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
