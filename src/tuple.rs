//! Generated test cases.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use crate::model::{Value, ValueKind};

/// One column of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleField {
    pub parameter: String,
    pub value: Value,
}

/// A single generated test case: one resolved value per parameter.
///
/// Fields keep the engine's column order for positional access. Equality,
/// ordering and hashing look at the fields sorted by parameter name, so two
/// tuples with the same bindings compare equal whatever their column order.
#[derive(Debug, Clone)]
pub struct Tuple {
    fields: Vec<TupleField>,
    negative: bool,
}

impl Tuple {
    pub fn new(fields: Vec<TupleField>) -> Self {
        let negative = fields.iter().any(|f| f.value.is_negative());
        Self { fields, negative }
    }

    pub fn fields(&self) -> &[TupleField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any bound value is negative.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.parameter.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|f| &f.value)
    }

    /// Value bound to the parameter called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.parameter == name)
            .map(|f| &f.value)
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|f| &f.value)
    }

    /// First value of the given kind, in column order.
    pub fn by_kind(&self, kind: ValueKind) -> Option<&Value> {
        self.all_of_kind(kind).next()
    }

    pub fn all_of_kind(&self, kind: ValueKind) -> impl Iterator<Item = &Value> {
        self.values().filter(move |v| v.kind() == kind)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    fn sorted(&self) -> Vec<&TupleField> {
        let mut fields: Vec<&TupleField> = self.fields.iter().collect();
        fields.sort();
        fields
    }
}

impl Index<usize> for Tuple {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.fields[index].value
    }
}

impl Index<&str> for Tuple {
    type Output = Value;

    fn index(&self, name: &str) -> &Self::Output {
        match self.get(name) {
            Some(value) => value,
            None => panic!("tuple has no parameter named '{name}'"),
        }
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.sorted() == other.sorted()
    }
}

impl Eq for Tuple {}

impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted().hash(state);
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted().cmp(&other.sorted())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", field.parameter, field.value)?;
        }
        Ok(())
    }
}
