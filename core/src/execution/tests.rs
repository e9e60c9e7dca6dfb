use super::*;
use crate::backend::{MemoryBackend, QueryBackend, Row};
use crate::derive::{CriteriaQuery, Selection};
use crate::paging::Sort;
use crate::value::Value;
use pretty_assertions::assert_eq;

fn user(id: i64, name: &str) -> Row {
    Row::from([
        ("id".to_string(), Value::Integer(id)),
        ("name".to_string(), Value::from(name)),
    ])
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.insert_row("User", user(1, "Ann"));
    backend.insert_row("User", user(2, "Bob"));
    backend
}

fn all_users() -> CriteriaQuery {
    CriteriaQuery {
        entity: "User".to_string(),
        predicate: None,
        selection: Selection::Entity,
        distinct: false,
        order: Sort::unsorted(),
        max_results: None,
        parameters: Vec::new(),
    }
}

#[test]
fn test_strategy_precedence() {
    let all = QueryShape {
        modifying: true,
        delete: true,
        exists: true,
        collection: true,
    };
    assert_eq!(ExecutionStrategy::select(all), ExecutionStrategy::Modifying);
    assert_eq!(
        ExecutionStrategy::select(QueryShape { modifying: false, ..all }),
        ExecutionStrategy::Delete { return_rows: true }
    );
    assert_eq!(
        ExecutionStrategy::select(QueryShape {
            modifying: false,
            delete: false,
            ..all
        }),
        ExecutionStrategy::Exists
    );
    assert_eq!(
        ExecutionStrategy::select(QueryShape {
            collection: true,
            ..QueryShape::default()
        }),
        ExecutionStrategy::Collection
    );
    assert_eq!(
        ExecutionStrategy::select(QueryShape::default()),
        ExecutionStrategy::Single
    );
}

#[tokio::test]
async fn test_single_rejects_multiple_rows() {
    let backend = backend();
    let mut query = backend.create_criteria_query(&all_users()).unwrap();
    let result = ExecutionStrategy::Single
        .execute(query.as_mut(), &backend, "User")
        .await;
    assert!(matches!(result, Err(crate::error::QueryError::Execution(_))));

    let mut query = backend.create_criteria_query(&all_users()).unwrap();
    query.set_max_results(1);
    let output = ExecutionStrategy::Single
        .execute(query.as_mut(), &backend, "User")
        .await
        .unwrap();
    assert_eq!(output, QueryOutput::Row(Some(user(1, "Ann"))));
}

#[tokio::test]
async fn test_exists_and_delete() {
    let backend = backend();
    let mut query = backend.create_criteria_query(&all_users()).unwrap();
    let output = ExecutionStrategy::Exists
        .execute(query.as_mut(), &backend, "User")
        .await
        .unwrap();
    assert_eq!(output, QueryOutput::Exists(true));

    let mut query = backend.create_criteria_query(&all_users()).unwrap();
    let output = ExecutionStrategy::Delete { return_rows: false }
        .execute(query.as_mut(), &backend, "User")
        .await
        .unwrap();
    assert_eq!(output, QueryOutput::Affected(2));
    assert!(backend.scan_table("User").is_empty());

    let mut query = backend.create_criteria_query(&all_users()).unwrap();
    let output = ExecutionStrategy::Exists
        .execute(query.as_mut(), &backend, "User")
        .await
        .unwrap();
    assert_eq!(output, QueryOutput::Exists(false));
}

#[tokio::test]
async fn test_modifying_reports_stubbed_count() {
    let backend = MemoryBackend::new();
    backend.stub_update("update User u set u.active = false", 7);
    let mut query = backend
        .create_query("update User u set u.active = false", false)
        .unwrap();
    let output = ExecutionStrategy::Modifying
        .execute(query.as_mut(), &backend, "User")
        .await
        .unwrap();
    assert_eq!(output.into_count().unwrap(), 7);
}

#[test]
fn test_count_extraction() {
    let row = Row::from([("count".to_string(), Value::Integer(4))]);
    assert_eq!(QueryOutput::Row(Some(row.clone())).into_count().unwrap(), 4);
    assert_eq!(QueryOutput::Rows(vec![row]).into_count().unwrap(), 4);
    assert!(QueryOutput::Rows(vec![user(1, "Ann")]).into_count().is_err());
}
