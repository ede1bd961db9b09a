//! Materialized document types.

use std::fmt;

use indexmap::IndexMap;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// A resolved attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i32),
    Float(f32),
    Boolean(bool),
    String(String),
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Integer(v) => serializer.serialize_i32(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::String(v) => serializer.serialize_str(v),
        }
    }
}

struct ValueVisitor {}

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a 32 bit integer, a float, a boolean or a string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        i32::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i32::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Value::Float(v as f32))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Value::String(v))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor {})
    }
}

/// An entry of a [`Node`]
///
/// Attributes map to a single value, child elements always map to a list even when there is
/// only one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Value(Value),
    Children(Vec<Node>),
}

/// One materialized element: its attributes and its children grouped by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node {
    fields: IndexMap<String, Field>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any entry with the same key
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), Field::Value(value));
    }

    /// Append a child to the list under `key`
    ///
    /// An attribute stored under the same key is replaced by the list.
    pub fn push_child(&mut self, key: impl Into<String>, child: Node) {
        let field = self
            .fields
            .entry(key.into())
            .or_insert_with(|| Field::Children(Vec::new()));

        match field {
            Field::Children(children) => children.push(child),
            Field::Value(_) => *field = Field::Children(vec![child]),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Get an attribute value
    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key)? {
            Field::Value(value) => Some(value),
            Field::Children(_) => None,
        }
    }

    /// Get the children stored under `key`
    pub fn children(&self, key: &str) -> &[Node] {
        match self.fields.get(key) {
            Some(Field::Children(children)) => children,
            _ => &[],
        }
    }

    /// Iterate over the attributes, in insertion order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().filter_map(|(key, field)| match field {
            Field::Value(value) => Some((key.as_str(), value)),
            Field::Children(_) => None,
        })
    }

    /// Iterate over every child, group by group
    pub fn all_children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.fields
            .iter()
            .filter_map(|(key, field)| match field {
                Field::Children(children) => Some((key.as_str(), children)),
                Field::Value(_) => None,
            })
            .flat_map(|(key, children)| children.iter().map(move |child| (key, child)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(key, field)| (key.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A top-level unit of the document
///
/// Whether a name occurs once or several times is decided when the document is partitioned.
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    Single(Node),
    Multiple(Vec<Node>),
}

impl Unit {
    /// Whether the unit is written as a directory of numbered files
    pub fn is_directory(&self) -> bool {
        matches!(self, Unit::Multiple(_))
    }

    /// The nodes of this unit, in order
    pub fn nodes(&self) -> &[Node] {
        match self {
            Unit::Single(node) => std::slice::from_ref(node),
            Unit::Multiple(nodes) => nodes,
        }
    }
}

impl From<Vec<Node>> for Unit {
    fn from(mut nodes: Vec<Node>) -> Self {
        if nodes.len() == 1 {
            if let Some(node) = nodes.pop() {
                return Unit::Single(node);
            }
        }
        Unit::Multiple(nodes)
    }
}

/// The partitioned document: top-level units keyed by name, in table order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    units: IndexMap<String, Unit>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, unit: Unit) -> Option<Unit> {
        self.units.insert(name.into(), unit)
    }

    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Unit)> {
        self.units.iter().map(|(name, unit)| (name.as_str(), unit))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl FromIterator<(String, Unit)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Unit)>>(iter: T) -> Self {
        Document {
            units: iter.into_iter().collect(),
        }
    }
}
