use super::*;
use crate::bind::MethodArguments;
use crate::binding::{BindingKind, EscapeCharacter, LikeKind};
use crate::error::CompileError;
use crate::method::{MethodParameter, MethodSignature};
use crate::model::{EntityDef, EntitySchema};
use crate::value::{Value, ValueType};
use pretty_assertions::assert_eq;

fn schema() -> EntitySchema {
    EntitySchema::new().with_entity(
        EntityDef::new("User")
            .id("id", ValueType::Integer)
            .property("name", ValueType::Text)
            .property("age", ValueType::Integer)
            .property("active", ValueType::Boolean)
            .collection("tags", ValueType::Text),
    )
}

fn compile(
    method: &str,
    parameters: &[(&str, ValueType)],
    arguments: Option<&MethodArguments>,
) -> Result<CriteriaQuery, CompileError> {
    let schema = schema();
    let signature = parameters.iter().fold(
        MethodSignature::new("User", method),
        |signature, (name, value_type)| signature.param(MethodParameter::value(name, *value_type)),
    );
    let tree = parse_method_name(method, "User", &schema)?;
    PredicateCompiler::new(&schema, EscapeCharacter::default()).compile(
        &tree,
        &signature,
        arguments.map(|a| a as &dyn crate::bind::ArgumentAccessor),
    )
}

fn predicate(query: &CriteriaQuery) -> String {
    query
        .predicate
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[test]
fn test_end_to_end_containing_ignore_case() {
    let query = compile(
        "findByAgeGreaterThanAndNameContainingIgnoreCase",
        &[("age", ValueType::Integer), ("name", ValueType::Text)],
        None,
    )
    .unwrap();

    assert_eq!(predicate(&query), "age > ?1 and upper(name) like upper(?2)");

    let bindings = query.bindings();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].kind(), BindingKind::Plain);
    assert_eq!(bindings[1].kind(), BindingKind::Like(LikeKind::Containing));
    assert_eq!(
        bindings[1].prepare(Value::from("Jo"), EscapeCharacter::default()),
        Value::from("%Jo%")
    );
}

#[test]
fn test_collection_containing_is_membership() {
    let query = compile("findByTagsContaining", &[("tag", ValueType::Text)], None).unwrap();
    assert_eq!(predicate(&query), "?1 member of tags");
    assert!(query.parameters[0].no_wildcard);
    assert_eq!(query.bindings()[0].kind(), BindingKind::Plain);

    let negated = compile("findByTagsNotContaining", &[("tag", ValueType::Text)], None).unwrap();
    assert_eq!(predicate(&negated), "?1 not member of tags");
}

#[test]
fn test_starting_with_wildcards_argument() {
    let query = compile("findByNameStartingWith", &[("prefix", ValueType::Text)], None).unwrap();
    assert_eq!(predicate(&query), "name like ?1");
    assert_eq!(
        query.bindings()[0].prepare(Value::from("ab"), EscapeCharacter::default()),
        Value::from("ab%")
    );
}

#[test]
fn test_null_argument_degrades_to_is_null() {
    let arguments = MethodArguments::positional([Value::Null]);
    let query = compile("findByName", &[("name", ValueType::Text)], Some(&arguments)).unwrap();
    assert_eq!(predicate(&query), "name is null");
    assert!(query.bindings().is_empty());

    let arguments = MethodArguments::positional([Value::Optional(None)]);
    let negated = compile("findByNameNot", &[("name", ValueType::Text)], Some(&arguments)).unwrap();
    assert_eq!(predicate(&negated), "name is not null");
}

#[test]
fn test_null_argument_on_comparison_keeps_placeholder() {
    let arguments = MethodArguments::positional([Value::Null]);
    let query = compile("findByAgeGreaterThan", &[("age", ValueType::Integer)], Some(&arguments)).unwrap();
    assert_eq!(predicate(&query), "age > ?1");
    assert!(!query.parameters[0].is_null_placeholder);
    assert_eq!(query.bindings().len(), 1);

    let arguments = MethodArguments::positional([Value::Optional(None)]);
    let like = compile("findByNameContaining", &[("name", ValueType::Text)], Some(&arguments)).unwrap();
    assert_eq!(predicate(&like), "name like ?1");
    assert_eq!(like.bindings()[0].kind(), BindingKind::Like(LikeKind::Containing));
}

#[test]
fn test_operators_without_arguments() {
    let query = compile("findByActiveTrueAndNameIsNotNullOrTagsIsEmpty", &[], None).unwrap();
    assert_eq!(
        predicate(&query),
        "active = true and name is not null or tags is empty"
    );
}

#[test]
fn test_between_and_in() {
    let query = compile(
        "findByAgeBetweenAndNameIn",
        &[
            ("low", ValueType::Integer),
            ("high", ValueType::Integer),
            ("names", ValueType::Collection),
        ],
        None,
    )
    .unwrap();
    assert_eq!(predicate(&query), "age between ?1 and ?2 and name in ?3");
    assert_eq!(query.bindings()[2].kind(), BindingKind::In);
}

#[test]
fn test_in_requires_collection_argument() {
    assert!(matches!(
        compile("findByNameIn", &[("name", ValueType::Text)], None),
        Err(CompileError::ArgumentType { position: 1, .. })
    ));
}

#[test]
fn test_argument_count_mismatch() {
    assert_eq!(
        compile("findByAgeBetween", &[("low", ValueType::Integer)], None),
        Err(CompileError::ArgumentCount {
            method: "findByAgeBetween".to_string(),
            expected: 2,
            actual: 1,
        })
    );
    assert!(matches!(
        compile("findByActiveTrue", &[("extra", ValueType::Integer)], None),
        Err(CompileError::ArgumentCount { expected: 0, actual: 1, .. })
    ));
}

#[test]
fn test_unsupported_keywords_rejected() {
    assert!(matches!(
        compile("findByNameRegex", &[("pattern", ValueType::Text)], None),
        Err(CompileError::UnsupportedKeyword { .. })
    ));
}

#[test]
fn test_is_empty_requires_collection() {
    assert_eq!(
        compile("findByNameIsEmpty", &[], None),
        Err(CompileError::NotACollection("name".to_string()))
    );
}

#[test]
fn test_explicit_ignore_case_on_number_fails() {
    assert!(matches!(
        compile("findByAgeIgnoreCase", &[("age", ValueType::Integer)], None),
        Err(CompileError::IgnoreCaseNotSupported { .. })
    ));

    let query = compile(
        "findByAgeAndNameAllIgnoreCase",
        &[("age", ValueType::Integer), ("name", ValueType::Text)],
        None,
    )
    .unwrap();
    assert_eq!(predicate(&query), "age = ?1 and upper(name) = upper(?2)");
}

#[test]
fn test_shape_specialisation() {
    let count = compile("countDistinctByActiveTrue", &[], None).unwrap();
    assert_eq!(count.selection, Selection::Count { distinct: true });

    let exists = compile("existsByName", &[("name", ValueType::Text)], None).unwrap();
    assert_eq!(exists.max_results, Some(1));
    assert!(matches!(exists.selection, Selection::Identifiers(ref ids) if ids.len() == 1));

    let delete = compile("deleteByAgeLessThanOrderByName", &[("age", ValueType::Integer)], None).unwrap();
    assert!(!delete.order.is_sorted());

    let top = compile("findTop2ByActiveFalseOrderByAgeDesc", &[], None).unwrap();
    assert_eq!(
        top.to_string(),
        "select User from User where active = false order by age desc limit 2"
    );
}
