//! Merge schema for CustomResourceDefinition documents.

use super::elements::{Schema, SchemaError};

/// Name of the root type in [`CRD_MERGE_SCHEMA_YAML`].
pub const CRD_ROOT_TYPE: &str = "customResourceDefinition";

/// CRD_MERGE_SCHEMA_YAML declares how the fields of a CustomResourceDefinition
/// merge when several partial manifests are applied on top of each other.
///
/// Anything not named here is deduced from the value: maps merge per field,
/// lists are atomic and scalars are replaced.
pub const CRD_MERGE_SCHEMA_YAML: &str = r#"types:
- name: customResourceDefinition
  map:
    fields:
    - name: metadata
      type:
        namedType: objectMeta
    - name: spec
      type:
        namedType: customResourceDefinitionSpec
    elementType:
      namedType: __untyped_deduced_
- name: objectMeta
  map:
    fields:
    - name: annotations
      type:
        map:
          elementType:
            scalar: untyped
    - name: labels
      type:
        map:
          elementType:
            scalar: untyped
    - name: managedFields
      type:
        list:
          elementType:
            namedType: __untyped_atomic_
          elementRelationship: atomic
    elementType:
      namedType: __untyped_deduced_
- name: customResourceDefinitionSpec
  map:
    fields:
    - name: versions
      type:
        list:
          elementType:
            namedType: customResourceDefinitionVersion
          elementRelationship: associative
          keys:
          - name
    elementType:
      namedType: __untyped_deduced_
- name: customResourceDefinitionVersion
  map:
    fields:
    - name: schema
      type:
        map:
          fields:
          - name: openAPIV3Schema
            type:
              namedType: jsonSchemaProps
          elementType:
            namedType: __untyped_deduced_
    - name: additionalPrinterColumns
      type:
        list:
          elementType:
            namedType: __untyped_atomic_
          elementRelationship: atomic
    - name: selectableFields
      type:
        list:
          elementType:
            namedType: __untyped_atomic_
          elementRelationship: atomic
    elementType:
      namedType: __untyped_deduced_
- name: jsonSchemaProps
  map:
    fields:
    - name: properties
      type:
        map:
          elementType:
            namedType: jsonSchemaProps
    - name: patternProperties
      type:
        map:
          elementType:
            namedType: jsonSchemaProps
    - name: definitions
      type:
        map:
          elementType:
            namedType: jsonSchemaProps
    - name: items
      type:
        namedType: jsonSchemaProps
    - name: required
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: associative
    - name: enum
      type:
        list:
          elementType:
            namedType: __untyped_atomic_
          elementRelationship: associative
    - name: allOf
      type:
        list:
          elementType:
            namedType: jsonSchemaProps
          elementRelationship: atomic
    - name: anyOf
      type:
        list:
          elementType:
            namedType: jsonSchemaProps
          elementRelationship: atomic
    - name: oneOf
      type:
        list:
          elementType:
            namedType: jsonSchemaProps
          elementRelationship: atomic
    - name: default
      type:
        namedType: __untyped_atomic_
    - name: example
      type:
        namedType: __untyped_atomic_
    - name: x-kubernetes-list-map-keys
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: atomic
    - name: x-kubernetes-validations
      type:
        list:
          elementType:
            namedType: validationRule
          elementRelationship: associative
          keys:
          - rule
    elementType:
      namedType: __untyped_deduced_
- name: validationRule
  map:
    elementType:
      namedType: __untyped_deduced_
- name: __untyped_atomic_
  scalar: untyped
  list:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
  map:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
- name: __untyped_deduced_
  scalar: untyped
  list:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
  map:
    elementType:
      namedType: __untyped_deduced_
    elementRelationship: separable
"#;

/// Parses the built-in CRD merge schema.
pub fn crd_merge_schema() -> Result<Schema, SchemaError> {
    Schema::from_yaml(CRD_MERGE_SCHEMA_YAML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ListStrategy, TypeRef};

    #[test]
    fn test_crd_schema_parses_and_checks() {
        let schema = crd_merge_schema().unwrap();
        assert!(schema.type_names().contains(&CRD_ROOT_TYPE));
    }

    #[test]
    fn test_crd_schema_list_strategies() {
        let schema = crd_merge_schema().unwrap();

        let spec = schema.resolve(&TypeRef::named("customResourceDefinitionSpec")).unwrap();
        let versions = schema
            .resolve(spec.map.as_ref().unwrap().field_type("versions"))
            .unwrap();
        assert_eq!(
            versions.list.unwrap().strategy(),
            ListStrategy::Map(vec!["name".to_string()])
        );

        let props = schema.resolve(&TypeRef::named("jsonSchemaProps")).unwrap();
        let props = props.map.unwrap();
        let strategy = |field: &str| {
            schema
                .resolve(props.field_type(field))
                .unwrap()
                .list
                .unwrap()
                .strategy()
        };
        assert_eq!(strategy("required"), ListStrategy::Set);
        assert_eq!(strategy("enum"), ListStrategy::Set);
        assert_eq!(strategy("allOf"), ListStrategy::Atomic);
        assert_eq!(
            strategy("x-kubernetes-validations"),
            ListStrategy::Map(vec!["rule".to_string()])
        );
    }
}
