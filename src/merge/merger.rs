//! Apply-style structural merge of two documents.

use super::conflict::MergeConflict;
use crate::fieldpath::{Path, PathElement};
use crate::schema::{
    crd_merge_schema, Atom, ElementRelationship, List, ListStrategy, Map as SchemaMap, Schema,
    SchemaError, TypeRef, CRD_ROOT_TYPE,
};
use crate::value::{Field, FieldList, Map, Value};
use std::collections::{HashMap, HashSet};

/// Merger applies overlay documents on top of a base document.
///
/// Scalars are last-writer-wins, maps merge per field and lists follow the
/// strategy the schema declares for them. The merger holds no state besides
/// its schema, so one instance can be shared by every merge in a run.
#[derive(Debug, Clone)]
pub struct Merger {
    schema: Schema,
    root: TypeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Scalar,
    List,
    Map,
}

fn kind_of(v: &Value) -> Option<Kind> {
    match v {
        Value::Null => None,
        Value::List(_) => Some(Kind::List),
        Value::Map(_) => Some(Kind::Map),
        _ => Some(Kind::Scalar),
    }
}

fn describe(atom: &Atom) -> String {
    let mut kinds = Vec::new();
    if atom.is_scalar() {
        kinds.push("scalar");
    }
    if atom.is_list() {
        kinds.push("list");
    }
    if atom.is_map() {
        kinds.push("map");
    }
    kinds.join(" or ")
}

impl Merger {
    /// Creates a merger for documents of the given root type.
    pub fn new(schema: Schema, root: TypeRef) -> Result<Merger, SchemaError> {
        schema.check()?;
        if schema.resolve(&root).is_none() {
            return Err(SchemaError::UnknownType {
                context: "root".to_string(),
                name: root.named_type.clone().unwrap_or_default(),
            });
        }
        Ok(Merger { schema, root })
    }

    /// Creates a merger using the built-in CustomResourceDefinition schema.
    pub fn for_crds() -> Result<Merger, SchemaError> {
        Merger::new(crd_merge_schema()?, TypeRef::named(CRD_ROOT_TYPE))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Merges `overlay` onto `base` and returns the result.
    ///
    /// Neither input is modified. The operation is not commutative: where
    /// both documents set the same scalar, the overlay wins.
    pub fn merge(&self, base: &Value, overlay: &Value) -> Result<Value, MergeConflict> {
        self.merge_values(base, overlay, &self.root, &Path::new())
    }

    /// Folds `overlays` onto `seed` from left to right.
    pub fn merge_all<'a, I>(&self, seed: Value, overlays: I) -> Result<Value, MergeConflict>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        overlays
            .into_iter()
            .try_fold(seed, |acc, overlay| self.merge(&acc, overlay))
    }

    fn merge_values(
        &self,
        lhs: &Value,
        rhs: &Value,
        type_ref: &TypeRef,
        path: &Path,
    ) -> Result<Value, MergeConflict> {
        let rhs_kind = match kind_of(rhs) {
            Some(kind) => kind,
            None => return Ok(lhs.clone()),
        };
        if let Some(lhs_kind) = kind_of(lhs) {
            if lhs_kind != rhs_kind {
                return Err(MergeConflict::TypeMismatch {
                    path: path.clone(),
                    base: lhs.kind_name(),
                    overlay: rhs.kind_name(),
                });
            }
        }

        // The schema is checked on construction, so only an empty inline
        // type can fail to constrain the value.
        let atom = self.schema.resolve(type_ref).unwrap_or_default();
        let deduced = atom.is_empty();

        match rhs {
            Value::Map(rhs_map) => {
                let map = match atom.map {
                    Some(map) => map,
                    None if deduced => SchemaMap::new(),
                    None => return Err(self.schema_mismatch(&atom, rhs, path)),
                };
                if map.element_relationship == ElementRelationship::Atomic {
                    return Ok(rhs.clone());
                }
                self.merge_maps(lhs.as_map(), rhs_map, &map, path)
            }
            Value::List(rhs_items) => {
                let list = match atom.list {
                    Some(list) => list,
                    None if deduced => List::default(),
                    None => return Err(self.schema_mismatch(&atom, rhs, path)),
                };
                let lhs_items = lhs.as_list().map(Vec::as_slice).unwrap_or(&[]);
                match list.strategy() {
                    ListStrategy::Atomic => Ok(rhs.clone()),
                    ListStrategy::Map(keys) => {
                        self.merge_keyed_lists(lhs_items, rhs_items, &list, &keys, path)
                    }
                    ListStrategy::Set => Ok(merge_sets(lhs_items, rhs_items)),
                }
            }
            _ => {
                if !deduced && !atom.is_scalar() {
                    return Err(self.schema_mismatch(&atom, rhs, path));
                }
                Ok(rhs.clone())
            }
        }
    }

    fn schema_mismatch(&self, atom: &Atom, actual: &Value, path: &Path) -> MergeConflict {
        MergeConflict::SchemaMismatch {
            path: path.clone(),
            expected: describe(atom),
            actual: actual.kind_name(),
        }
    }

    fn merge_maps(
        &self,
        lhs: Option<&Map>,
        rhs: &Map,
        schema: &SchemaMap,
        path: &Path,
    ) -> Result<Value, MergeConflict> {
        let mut result = lhs.cloned().unwrap_or_default();

        for (key, rhs_val) in rhs.iter() {
            let field_path = path.with(PathElement::field_name(key.clone()));
            let lhs_val = result.delete(key).unwrap_or_default();
            let merged = self.merge_values(&lhs_val, rhs_val, schema.field_type(key), &field_path)?;
            result.set(key.clone(), merged);
        }

        Ok(Value::Map(result))
    }

    /// Items are matched by key. Matched items merge recursively, base order
    /// is kept and overlay-only items are appended in overlay order.
    fn merge_keyed_lists(
        &self,
        lhs: &[Value],
        rhs: &[Value],
        list: &List,
        keys: &[String],
        path: &Path,
    ) -> Result<Value, MergeConflict> {
        let mut result: Vec<Value> = Vec::with_capacity(lhs.len() + rhs.len());
        let mut positions: HashMap<FieldList, usize> = HashMap::new();

        for (i, item) in lhs.iter().enumerate() {
            let key = item_key(item, keys, &path.with(PathElement::index(i)))?;
            if positions.insert(key.clone(), result.len()).is_some() {
                return Err(MergeConflict::DuplicateKey {
                    path: path.with(PathElement::Key(key)),
                });
            }
            result.push(item.clone());
        }

        let mut seen = HashSet::new();
        for (i, item) in rhs.iter().enumerate() {
            let key = item_key(item, keys, &path.with(PathElement::index(i)))?;
            let item_path = path.with(PathElement::Key(key.clone()));
            if !seen.insert(key.clone()) {
                return Err(MergeConflict::DuplicateKey { path: item_path });
            }

            match positions.get(&key) {
                Some(&pos) => {
                    let base = std::mem::take(&mut result[pos]);
                    result[pos] = self.merge_values(&base, item, &list.element_type, &item_path)?;
                }
                None => {
                    let merged =
                        self.merge_values(&Value::Null, item, &list.element_type, &item_path)?;
                    positions.insert(key, result.len());
                    result.push(merged);
                }
            }
        }

        Ok(Value::List(result))
    }
}

/// Union of two sets. Items are compared as whole values, base order is
/// kept and newly introduced overlay items are appended in overlay order.
fn merge_sets(lhs: &[Value], rhs: &[Value]) -> Value {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(lhs.len() + rhs.len());

    for item in lhs.iter().chain(rhs) {
        if seen.insert(item) {
            result.push(item.clone());
        }
    }

    Value::List(result)
}

/// Builds the identity of a keyed-list element from its key fields.
fn item_key(item: &Value, keys: &[String], path: &Path) -> Result<FieldList, MergeConflict> {
    let map = item.as_map().ok_or_else(|| MergeConflict::NotAMap {
        path: path.clone(),
        actual: item.kind_name(),
    })?;

    let mut fields = Vec::with_capacity(keys.len());
    for key in keys {
        match map.get(key) {
            Some(value) if !value.is_null() => fields.push(Field {
                name: key.clone(),
                value: value.clone(),
            }),
            _ => {
                return Err(MergeConflict::MissingKey {
                    path: path.clone(),
                    key: key.clone(),
                })
            }
        }
    }
    Ok(FieldList::with_fields(fields))
}
