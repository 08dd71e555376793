//! Core schema elements and type definitions.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Schema is a list of named types describing how documents merge.
///
/// Types are indexed by name on first lookup, so a Schema should be treated
/// as immutable once built.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDef>,

    #[serde(skip)]
    type_map: OnceCell<HashMap<String, usize>>,
}

impl Clone for Schema {
    fn clone(&self) -> Self {
        Schema::with_types(self.types.clone())
    }
}

/// TypeDef represents a named type in a schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    /// Every top level type must have a unique name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(flatten)]
    pub atom: Atom,
}

/// TypeRef either refers to a named type or declares an inlined type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "namedType")]
    pub named_type: Option<String>,

    #[serde(flatten)]
    pub inlined: Box<Atom>,

    /// Overrides the element relationship of the referred map or list type.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "elementRelationship"
    )]
    pub element_relationship: Option<ElementRelationship>,
}

impl TypeRef {
    /// Creates a reference to a named type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            named_type: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Atom is the smallest piece of the type system. Each populated field is a
/// kind of value the node may hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Atom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<List>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Map>,
}

/// Scalar represents a leaf value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Numeric,
    String,
    Boolean,
    Untyped,
}

/// ElementRelationship describes how the items of a container relate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRelationship {
    /// Lists only: items are identified by their key fields, or by their own
    /// value when the list declares no keys.
    Associative,
    /// The container is replaced as a whole.
    Atomic,
    /// Items are merged independently (default for maps).
    #[default]
    Separable,
}

/// How a list field merges, in `x-kubernetes-list-type` terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStrategy {
    /// The overlay list replaces the base list.
    Atomic,
    /// Items are matched by the listed key fields.
    Map(Vec<String>),
    /// Items are unique leaf values.
    Set,
}

/// Map describes a struct with known fields, a string-keyed map of
/// homogeneous values, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Map {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<StructField>,

    /// Type of fields not listed in `fields`.
    #[serde(default, rename = "elementType")]
    pub element_type: TypeRef,

    #[serde(
        default,
        skip_serializing_if = "is_default_element_relationship",
        rename = "elementRelationship"
    )]
    pub element_relationship: ElementRelationship,

    #[serde(skip)]
    field_map: OnceCell<HashMap<String, usize>>,
}

fn is_default_element_relationship(er: &ElementRelationship) -> bool {
    *er == ElementRelationship::Separable
}

/// StructField pairs a field name with a field type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructField {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, rename = "type")]
    pub field_type: TypeRef,
}

/// List represents a sequence of elements of the same type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct List {
    #[serde(default, rename = "elementType")]
    pub element_type: TypeRef,

    #[serde(default, rename = "elementRelationship")]
    pub element_relationship: ElementRelationship,

    /// Key fields of the element map type, for associative lists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

/// SchemaError reports a merge schema that cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("failed to parse merge schema: {0}")]
    Parse(String),

    #[error("{context}: no type found matching {name:?}")]
    UnknownType { context: String, name: String },

    #[error("{context}: duplicate type name {name:?}")]
    DuplicateType { context: String, name: String },

    #[error("{context}: list key {key:?} is declared more than once")]
    DuplicateListKey { context: String, key: String },

    #[error("{context}: keyed list elements must be maps")]
    KeyedListOfNonMaps { context: String },

    #[error("{context}: list keys are only valid for associative lists")]
    KeysOnNonAssociativeList { context: String },
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn with_types(types: Vec<TypeDef>) -> Self {
        Schema {
            types,
            type_map: OnceCell::new(),
        }
    }

    /// Parses a schema from YAML and checks it.
    pub fn from_yaml(yaml: &str) -> Result<Schema, SchemaError> {
        let schema: Schema =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.check()?;
        Ok(schema)
    }

    /// Returns the names of all types in declaration order.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    /// Returns the referenced TypeDef, if it exists.
    pub fn find_named_type(&self, name: &str) -> Option<&TypeDef> {
        let map = self.type_map.get_or_init(|| {
            self.types
                .iter()
                .enumerate()
                .map(|(i, t)| (t.name.clone(), i))
                .collect()
        });
        map.get(name).map(|&i| &self.types[i])
    }

    /// Returns the atom referenced, whether it is inline or named, with any
    /// element relationship override applied.
    pub fn resolve(&self, tr: &TypeRef) -> Option<Atom> {
        let mut atom = match tr.named_type {
            Some(ref named) => self.find_named_type(named)?.atom.clone(),
            None => (*tr.inlined).clone(),
        };

        if let Some(er) = tr.element_relationship {
            if let Some(ref mut map) = atom.map {
                map.element_relationship = er;
            }
            if let Some(ref mut list) = atom.list {
                list.element_relationship = er;
            }
        }
        Some(atom)
    }

    /// Checks that every named reference resolves and that every keyed list
    /// is well formed.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        for td in &self.types {
            if !seen.insert(td.name.as_str()) {
                return Err(SchemaError::DuplicateType {
                    context: "types".to_string(),
                    name: td.name.clone(),
                });
            }
        }
        for td in &self.types {
            self.check_atom(&td.atom, &td.name)?;
        }
        Ok(())
    }

    fn check_type_ref(&self, tr: &TypeRef, context: &str) -> Result<(), SchemaError> {
        match tr.named_type {
            Some(ref name) => {
                if self.find_named_type(name).is_none() {
                    return Err(SchemaError::UnknownType {
                        context: context.to_string(),
                        name: name.clone(),
                    });
                }
                Ok(())
            }
            None => self.check_atom(&tr.inlined, context),
        }
    }

    fn check_atom(&self, atom: &Atom, context: &str) -> Result<(), SchemaError> {
        if let Some(ref map) = atom.map {
            for field in &map.fields {
                self.check_type_ref(&field.field_type, &format!("{}.{}", context, field.name))?;
            }
            self.check_type_ref(&map.element_type, &format!("{}.*", context))?;
        }
        if let Some(ref list) = atom.list {
            let item_context = format!("{}[]", context);
            self.check_type_ref(&list.element_type, &item_context)?;

            if !list.keys.is_empty() {
                if list.element_relationship != ElementRelationship::Associative {
                    return Err(SchemaError::KeysOnNonAssociativeList {
                        context: context.to_string(),
                    });
                }
                let mut keys = BTreeSet::new();
                for key in &list.keys {
                    if !keys.insert(key.as_str()) {
                        return Err(SchemaError::DuplicateListKey {
                            context: context.to_string(),
                            key: key.clone(),
                        });
                    }
                }
                let element = self.resolve(&list.element_type);
                if !element.map(|a| a.is_map()).unwrap_or(false) {
                    return Err(SchemaError::KeyedListOfNonMaps {
                        context: context.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Map {
    pub fn new() -> Self {
        Map::default()
    }

    pub fn with_fields(fields: Vec<StructField>) -> Self {
        Map {
            fields,
            ..Default::default()
        }
    }

    /// Returns the referenced StructField, if it exists.
    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        let map = self.field_map.get_or_init(|| {
            self.fields
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect()
        });
        map.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the type of the named field, falling back to the element type.
    pub fn field_type(&self, name: &str) -> &TypeRef {
        match self.find_field(name) {
            Some(field) => &field.field_type,
            None => &self.element_type,
        }
    }
}

impl List {
    /// Returns the merge strategy this list declares.
    ///
    /// Separable lists have no element identity and merge atomically.
    pub fn strategy(&self) -> ListStrategy {
        match self.element_relationship {
            ElementRelationship::Associative if self.keys.is_empty() => ListStrategy::Set,
            ElementRelationship::Associative => ListStrategy::Map(self.keys.clone()),
            ElementRelationship::Atomic | ElementRelationship::Separable => ListStrategy::Atomic,
        }
    }
}

impl Atom {
    pub fn is_scalar(&self) -> bool {
        self.scalar.is_some()
    }

    pub fn is_list(&self) -> bool {
        self.list.is_some()
    }

    pub fn is_map(&self) -> bool {
        self.map.is_some()
    }

    /// True when the atom constrains nothing and the value's own shape
    /// decides how it merges.
    pub fn is_empty(&self) -> bool {
        self.scalar.is_none() && self.list.is_none() && self.map.is_none()
    }
}
