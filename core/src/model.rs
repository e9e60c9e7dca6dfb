//! Entity/type model consulted by the predicate compiler.

use crate::value::ValueType;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Dotted property reference relative to an entity root, e.g. `address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    pub segments: SmallVec<[String; 3]>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn dot_path(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dot_path())
    }
}

impl From<&str> for PropertyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Navigability of a resolved property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ValueType),
    Association(String),
    /// Collection-valued property with the element type.
    Collection(ValueType),
}

impl PropertyKind {
    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyKind::Collection(_))
    }

    /// Type a single comparison against this property works with.
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyKind::Scalar(t) | PropertyKind::Collection(t) => *t,
            PropertyKind::Association(_) => ValueType::Any,
        }
    }
}

pub trait EntityModel: Send + Sync {
    fn has_entity(&self, entity: &str) -> bool;

    /// Resolves a (possibly nested) path starting at `entity`.
    fn property(&self, entity: &str, path: &PropertyPath) -> Option<PropertyKind>;

    fn id_properties(&self, entity: &str) -> Vec<PropertyPath>;
}

#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: String,
    properties: Vec<(String, PropertyKind)>,
    ids: Vec<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            ids: Vec::new(),
        }
    }

    pub fn id(mut self, name: &str, value_type: ValueType) -> Self {
        self.ids.push(name.to_string());
        self.property(name, value_type)
    }

    pub fn property(mut self, name: &str, value_type: ValueType) -> Self {
        self.properties
            .push((name.to_string(), PropertyKind::Scalar(value_type)));
        self
    }

    pub fn collection(mut self, name: &str, element: ValueType) -> Self {
        self.properties
            .push((name.to_string(), PropertyKind::Collection(element)));
        self
    }

    pub fn association(mut self, name: &str, target: &str) -> Self {
        self.properties.push((
            name.to_string(),
            PropertyKind::Association(target.to_string()),
        ));
        self
    }

    fn get(&self, name: &str) -> Option<&PropertyKind> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, kind)| kind)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }
}

/// In-memory entity model.
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    entities: HashMap<String, EntityDef>,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.add(entity);
        self
    }

    pub fn add(&mut self, entity: EntityDef) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

impl EntityModel for EntitySchema {
    fn has_entity(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    fn property(&self, entity: &str, path: &PropertyPath) -> Option<PropertyKind> {
        let mut current = self.entities.get(entity)?;
        let mut segments = path.segments.iter().peekable();

        while let Some(segment) = segments.next() {
            let kind = current.get(segment)?;
            if segments.peek().is_none() {
                return Some(kind.clone());
            }
            match kind {
                PropertyKind::Association(target) => current = self.entities.get(target)?,
                _ => return None,
            }
        }

        None
    }

    fn id_properties(&self, entity: &str) -> Vec<PropertyPath> {
        self.entities
            .get(entity)
            .map(|e| e.ids.iter().map(|id| PropertyPath::parse(id)).collect())
            .unwrap_or_default()
    }
}
