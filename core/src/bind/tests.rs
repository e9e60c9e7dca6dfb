use super::*;
use crate::backend::memory::{Commit, CommitTarget};
use crate::backend::{MemoryBackend, QueryBackend, Row};
use crate::binding::EscapeCharacter;
use crate::error::{BindError, QueryError};
use crate::paging::{Limit, Pageable};
use crate::template::DeclaredQuery;
use crate::value::Value;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn binder(query: &DeclaredQuery) -> ParameterBinder {
    ParameterBinder::for_declared(query, Arc::new(ArgumentExpressionEvaluator))
}

fn context() -> BindContext {
    BindContext::new(EscapeCharacter::default())
}

fn named(name: &str, value: Value) -> Commit {
    Commit {
        target: CommitTarget::Named(name.to_string()),
        value,
    }
}

#[tokio::test]
async fn test_commits_follow_declaration_order() {
    let declared =
        DeclaredQuery::parse("select u from User u where u.age > :age and u.name like %:name%")
            .unwrap();
    let backend = MemoryBackend::new();
    let mut query = backend.create_query(declared.text(), false).unwrap();
    let arguments = MethodArguments::named([("name", Value::from("J_o")), ("age", Value::Integer(30))]);

    binder(&declared)
        .bind(query.as_mut(), &arguments, &context(), ErrorPolicy::Strict)
        .await
        .unwrap();

    assert_eq!(
        backend.commits(),
        vec![
            named("age", Value::Integer(30)),
            named("name", Value::from("%J\\_o%")),
        ]
    );
}

#[tokio::test]
async fn test_optional_like_argument_is_wildcarded() {
    let declared = DeclaredQuery::parse("select u from User u where u.name like %:name%").unwrap();
    let backend = MemoryBackend::new();
    let mut query = backend.create_query(declared.text(), false).unwrap();
    let arguments = MethodArguments::named([("name", Value::from(Some("o")))]);

    binder(&declared)
        .bind(query.as_mut(), &arguments, &context(), ErrorPolicy::Strict)
        .await
        .unwrap();

    assert_eq!(backend.commits(), vec![named("name", Value::from("%o%"))]);
}

#[tokio::test]
async fn test_positional_arguments_bind_by_position() {
    let declared = DeclaredQuery::parse("select u from User u where u.name = ?2 and u.age in ?1").unwrap();
    let backend = MemoryBackend::new();
    let mut query = backend.create_query(declared.text(), false).unwrap();
    let arguments = MethodArguments::positional([
        Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
        Value::Optional(Some(Box::new(Value::from("Jo")))),
    ]);

    binder(&declared)
        .bind(query.as_mut(), &arguments, &context(), ErrorPolicy::Strict)
        .await
        .unwrap();

    let commits = backend.commits();
    assert_eq!(commits[0].target, CommitTarget::Position(2));
    assert_eq!(commits[0].value, Value::from("Jo"));
    assert_eq!(commits[1].target, CommitTarget::Position(1));
    assert_eq!(
        commits[1].value,
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    );
}

#[tokio::test]
async fn test_strict_policy_propagates_and_lenient_skips() {
    let declared =
        DeclaredQuery::parse("select u from User u where u.name = :name and u.age = :age").unwrap();
    let backend = MemoryBackend::new();
    let arguments = MethodArguments::named([("name", Value::from("Jo")), ("age", Value::Integer(3))]);

    // The target query no longer mentions :age.
    let mut strict = backend
        .create_query("select u from User u where u.name = :name", false)
        .unwrap();
    let result = binder(&declared)
        .bind(strict.as_mut(), &arguments, &context(), ErrorPolicy::Strict)
        .await;
    assert_eq!(
        result,
        Err(QueryError::Bind(BindError::UnknownName("age".to_string())))
    );

    backend.clear_commits();
    let mut lenient = backend
        .create_query("select u from User u where u.name = :name", false)
        .unwrap();
    binder(&declared)
        .bind(lenient.as_mut(), &arguments, &context(), ErrorPolicy::Lenient)
        .await
        .unwrap();
    assert_eq!(backend.commits(), vec![named("name", Value::from("Jo"))]);
}

#[tokio::test]
async fn test_resolution_failures_ignore_policy() {
    let declared = DeclaredQuery::parse("select u from User u where u.name = :name").unwrap();
    let backend = MemoryBackend::new();
    let mut query = backend.create_query(declared.text(), false).unwrap();

    let unnamed = MethodArguments::positional([Value::from("Jo")]);
    let result = binder(&declared)
        .bind(query.as_mut(), &unnamed, &context(), ErrorPolicy::Lenient)
        .await;
    assert_eq!(
        result,
        Err(QueryError::Bind(BindError::ParameterNeedsName("name".to_string())))
    );

    let other = MethodArguments::named([("first", Value::from("Jo"))]);
    let result = binder(&declared)
        .bind(query.as_mut(), &other, &context(), ErrorPolicy::Lenient)
        .await;
    assert!(matches!(result, Err(QueryError::Bind(BindError::MissingArgument(_)))));
}

#[tokio::test]
async fn test_expressions_are_evaluated() {
    let declared =
        DeclaredQuery::parse("select u from User u where u.name = :#{upper(#name)} and u.age = :age")
            .unwrap();
    let backend = MemoryBackend::new();
    let mut query = backend.create_query(declared.text(), false).unwrap();
    let arguments = MethodArguments::named([("name", Value::from("jo")), ("age", Value::Integer(3))]);

    binder(&declared)
        .bind(query.as_mut(), &arguments, &context(), ErrorPolicy::Strict)
        .await
        .unwrap();

    assert_eq!(backend.commits()[0], named("__rx_expr_0", Value::from("JO")));
}

#[tokio::test]
async fn test_cancelled_binding_stops_before_commit() {
    let declared = DeclaredQuery::parse("select u from User u where u.name = :name").unwrap();
    let backend = MemoryBackend::new();
    let mut query = backend.create_query(declared.text(), false).unwrap();
    let arguments = MethodArguments::named([("name", Value::from("Jo"))]);

    let token = CancellationToken::new();
    token.cancel();
    let result = binder(&declared)
        .bind(
            query.as_mut(),
            &arguments,
            &context().with_cancellation(token),
            ErrorPolicy::Strict,
        )
        .await;

    assert_eq!(result, Err(QueryError::Cancelled));
    assert!(backend.commits().is_empty());
}

#[tokio::test]
async fn test_paging_and_static_limit_overshoot() {
    let backend = MemoryBackend::new();
    let mut query = backend.create_query("select u from User u", false).unwrap();

    let arguments = MethodArguments::positional(Vec::new()).with_pageable(Pageable::of(2, 10));
    apply_paging(query.as_mut(), &arguments, None, false);
    assert_eq!((query.first_result(), query.max_results()), (20, Some(10)));

    let mut limited = backend.create_query("select u from User u", false).unwrap();
    apply_paging(limited.as_mut(), &arguments, Some(4), false);
    assert_eq!((limited.first_result(), limited.max_results()), (14, Some(4)));

    let mut capped = backend.create_query("select u from User u", false).unwrap();
    let arguments = MethodArguments::positional(Vec::new()).with_limit(Limit::Max(3));
    apply_paging(capped.as_mut(), &arguments, None, false);
    assert_eq!((capped.first_result(), capped.max_results()), (0, Some(3)));
}

#[tokio::test]
async fn test_huge_page_saturates_offset() {
    let backend = MemoryBackend::new();
    backend.stub_rows("select u from User u", vec![Row::new()]);
    let mut query = backend.create_query("select u from User u", false).unwrap();
    let arguments = MethodArguments::positional(Vec::new()).with_pageable(Pageable::of(usize::MAX, 10));

    apply_paging(query.as_mut(), &arguments, Some(4), false);
    assert_eq!((query.first_result(), query.max_results()), (usize::MAX - 6, Some(4)));
    assert!(query.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_paging_expression_suppresses_window() {
    let backend = MemoryBackend::new();
    let mut query = backend.create_query("select u from User u", false).unwrap();
    let arguments = MethodArguments::positional(Vec::new()).with_pageable(Pageable::of(1, 5));

    apply_paging(query.as_mut(), &arguments, None, true);
    assert_eq!((query.first_result(), query.max_results()), (0, None));
}
