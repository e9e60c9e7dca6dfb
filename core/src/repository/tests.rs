use super::*;
use crate::backend::memory::{Commit, CommitTarget};
use crate::backend::{MemoryBackend, Row};
use crate::bind::{Argument, MethodArguments};
use crate::method::{MethodParameter, ReturnKind};
use crate::model::{EntityDef, EntitySchema};
use crate::paging::{Order, Pageable};
use crate::value::{Value, ValueType};
use futures::future::join_all;
use pretty_assertions::assert_eq;

fn schema() -> Arc<dyn EntityModel> {
    Arc::new(
        EntitySchema::new().with_entity(
            EntityDef::new("User")
                .id("id", ValueType::Integer)
                .property("name", ValueType::Text)
                .property("age", ValueType::Integer)
                .property("active", ValueType::Boolean)
                .collection("tags", ValueType::Text),
        ),
    )
}

fn user(id: i64, name: Option<&str>, age: i64, active: bool, tags: &[&str]) -> Row {
    Row::from([
        ("id".to_string(), Value::Integer(id)),
        ("name".to_string(), name.map(Value::from).unwrap_or(Value::Null)),
        ("age".to_string(), Value::Integer(age)),
        ("active".to_string(), Value::Boolean(active)),
        (
            "tags".to_string(),
            Value::List(tags.iter().map(|t| Value::from(*t)).collect()),
        ),
    ])
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.insert_row("User", user(1, Some("Ann"), 30, true, &["a"]));
    backend.insert_row("User", user(2, Some("John"), 25, true, &["b"]));
    backend.insert_row("User", user(3, Some("Jo"), 12, false, &[]));
    backend.insert_row("User", user(4, Some("Bob"), 40, true, &["a", "b"]));
    backend.insert_row("User", user(5, None, 50, false, &[]));
    backend
}

fn ids(output: QueryOutput) -> Vec<i64> {
    let rows = match output {
        QueryOutput::Rows(rows) => rows,
        QueryOutput::Row(row) => row.into_iter().collect(),
        other => panic!("expected rows, got {}", other),
    };
    rows.iter()
        .map(|row| match row["id"] {
            Value::Integer(id) => id,
            ref other => panic!("unexpected id {}", other),
        })
        .collect()
}

fn derived(signature: MethodSignature) -> QueryMethod {
    QueryMethod::derived(signature, schema(), &EngineConfig::default()).unwrap()
}

async fn run(method: &QueryMethod, backend: &MemoryBackend, arguments: Vec<Argument>) -> QueryOutput {
    let arguments = MethodArguments::bind(method.signature(), arguments).unwrap();
    method
        .execute(backend, &arguments, CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_derived_end_to_end() {
    let backend = backend();
    let method = derived(
        MethodSignature::new("User", "findByAgeGreaterThanAndNameContainingIgnoreCase")
            .param(MethodParameter::value("age", ValueType::Integer))
            .param(MethodParameter::value("name", ValueType::Text)),
    );
    assert_eq!(method.strategy(), ExecutionStrategy::Collection);

    let output = run(&method, &backend, vec![Value::Integer(18).into(), Value::from("Jo").into()]).await;

    assert_eq!(ids(output), vec![2]);
    assert_eq!(
        backend.commits(),
        vec![
            Commit {
                target: CommitTarget::Slot(1),
                value: Value::Integer(18)
            },
            Commit {
                target: CommitTarget::Slot(2),
                value: Value::from("%Jo%")
            },
        ]
    );
}

#[tokio::test]
async fn test_null_argument_matches_missing_values() {
    let backend = backend();
    let method = derived(
        MethodSignature::new("User", "findByName").param(MethodParameter::value("name", ValueType::Text)),
    );

    let output = run(&method, &backend, vec![Value::Null.into()]).await;
    assert_eq!(ids(output), vec![5]);

    let output = run(&method, &backend, vec![Value::from("Bob").into()]).await;
    assert_eq!(ids(output), vec![4]);
}

#[tokio::test]
async fn test_null_comparison_argument_matches_nothing() {
    let backend = backend();
    let method = derived(
        MethodSignature::new("User", "findByAgeGreaterThan")
            .param(MethodParameter::value("age", ValueType::Integer)),
    );

    let output = run(&method, &backend, vec![Value::Null.into()]).await;
    assert_eq!(ids(output), Vec::<i64>::new());
    assert_eq!(
        backend.commits(),
        vec![Commit {
            target: CommitTarget::Slot(1),
            value: Value::Null
        }]
    );
}

#[tokio::test]
async fn test_optional_containing_argument_is_wildcarded() {
    let backend = backend();
    let method = derived(
        MethodSignature::new("User", "findByNameContaining")
            .param(MethodParameter::value("name", ValueType::Text)),
    );

    let output = run(&method, &backend, vec![Value::from(Some("o")).into()]).await;
    assert_eq!(ids(output), vec![2, 3, 4]);
    assert_eq!(backend.commits()[0].value, Value::from("%o%"));
}

#[tokio::test]
async fn test_collection_membership() {
    let backend = backend();
    let method = derived(
        MethodSignature::new("User", "findByTagsContaining")
            .param(MethodParameter::value("tag", ValueType::Text)),
    );
    let output = run(&method, &backend, vec![Value::from("b").into()]).await;
    assert_eq!(ids(output), vec![2, 4]);
}

#[tokio::test]
async fn test_count_exists_and_delete_shapes() {
    let backend = backend();

    let count = derived(MethodSignature::new("User", "countByActiveTrue"));
    assert_eq!(run(&count, &backend, Vec::new()).await, QueryOutput::Count(3));

    let exists = derived(
        MethodSignature::new("User", "existsByName").param(MethodParameter::value("name", ValueType::Text)),
    );
    assert_eq!(exists.strategy(), ExecutionStrategy::Exists);
    assert_eq!(
        run(&exists, &backend, vec![Value::from("Bob").into()]).await,
        QueryOutput::Exists(true)
    );

    let delete = derived(
        MethodSignature::new("User", "deleteByAgeLessThan")
            .param(MethodParameter::value("age", ValueType::Integer)),
    );
    let output = run(&delete, &backend, vec![Value::Integer(18).into()]).await;
    assert_eq!(ids(output), vec![3]);
    assert_eq!(backend.scan_table("User").len(), 4);

    assert_eq!(
        run(&exists, &backend, vec![Value::from("Jo").into()]).await,
        QueryOutput::Exists(false)
    );
}

#[tokio::test]
async fn test_single_result_shape() {
    let backend = backend();
    let method = derived(
        MethodSignature::new("User", "findByAge")
            .param(MethodParameter::value("age", ValueType::Integer))
            .returning(ReturnKind::One),
    );
    assert_eq!(method.strategy(), ExecutionStrategy::Single);
    assert_eq!(ids(run(&method, &backend, vec![Value::Integer(40).into()]).await), vec![4]);
    assert_eq!(
        run(&method, &backend, vec![Value::Integer(41).into()]).await,
        QueryOutput::Row(None)
    );
}

#[tokio::test]
async fn test_paging_sorting_and_static_limits() {
    let backend = backend();
    let paged = derived(MethodSignature::new("User", "findByActiveTrue").param(MethodParameter::pageable()));
    let page = Pageable::Paged {
        page: 1,
        size: 1,
        sort: Sort::by([Order::desc("age")]),
    };
    assert_eq!(ids(run(&paged, &backend, vec![Argument::Pageable(page)]).await), vec![1]);

    let arguments = MethodArguments::bind(paged.signature(), vec![Argument::Pageable(Pageable::of(0, 2))]).unwrap();
    assert_eq!(
        paged
            .count(&backend, &arguments, CancellationToken::new())
            .await
            .unwrap(),
        3
    );

    let top = derived(MethodSignature::new("User", "findTop2ByActiveTrueOrderByAgeDesc"));
    assert_eq!(ids(run(&top, &backend, Vec::new()).await), vec![4, 1]);
}

#[tokio::test]
async fn test_declared_query_and_count() {
    let backend = MemoryBackend::new();
    let signature = MethodSignature::new("User", "findOlderThan")
        .param(MethodParameter::value("age", ValueType::Integer))
        .param(MethodParameter::pageable());
    let method = QueryMethod::declared(
        signature,
        "select u from #{#entityName} u where u.age > :age order by u.name",
        DeclaredOptions::default(),
        &EngineConfig::default(),
    )
    .unwrap();

    let text = "select u from User u where u.age > :age order by u.name";
    assert_eq!(method.declared_query().unwrap().text(), text);
    backend.stub_rows(text, vec![user(1, Some("Ann"), 30, true, &[]), user(4, Some("Bob"), 40, true, &[])]);
    backend.stub_rows(
        "select count(u) from User u where u.age > :age",
        vec![Row::from([("count".to_string(), Value::Integer(12))])],
    );

    let arguments = MethodArguments::bind(
        method.signature(),
        vec![Value::Integer(18).into(), Argument::Pageable(Pageable::of(0, 1))],
    )
    .unwrap();

    let output = method
        .execute(&backend, &arguments, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ids(output), vec![1]);

    let total = method
        .count(&backend, &arguments, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(total, 12);
    assert_eq!(
        backend.commits().last(),
        Some(&Commit {
            target: CommitTarget::Named("age".to_string()),
            value: Value::Integer(18)
        })
    );
}

#[tokio::test]
async fn test_declared_modifying_query() {
    let backend = MemoryBackend::new();
    let method = QueryMethod::declared(
        MethodSignature::new("User", "deactivate")
            .param(MethodParameter::value("age", ValueType::Integer))
            .modifying(),
        "update User u set u.active = false where u.age < ?1",
        DeclaredOptions::default(),
        &EngineConfig::default(),
    )
    .unwrap();
    backend.stub_update("update User u set u.active = false where u.age < ?1", 2);

    assert_eq!(method.strategy(), ExecutionStrategy::Modifying);
    assert_eq!(
        run(&method, &backend, vec![Value::Integer(18).into()]).await,
        QueryOutput::Affected(2)
    );
}

#[tokio::test]
async fn test_compile_errors_surface_at_declaration() {
    let repository = Repository::new(Arc::new(MemoryBackend::new()), schema(), EngineConfig::default());
    assert!(matches!(
        repository.derive(MethodSignature::new("User", "findByShoeSize")),
        Err(CompileError::UnknownProperty { .. })
    ));
    assert!(matches!(
        repository.declare(
            MethodSignature::new("User", "broken"),
            "select u from User u where u.a = ? and u.b = ?1",
            DeclaredOptions::default(),
        ),
        Err(CompileError::MixedParameterStyles(_))
    ));
    assert_eq!(repository.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_concurrent_invocations_share_one_compilation() {
    let backend = Arc::new(backend());
    let repository = Arc::new(Repository::new(backend, schema(), EngineConfig::default()));
    let signature = MethodSignature::new("User", "findByAgeGreaterThanEqual")
        .param(MethodParameter::value("age", ValueType::Integer));
    let key = signature.key();
    repository.derive(signature.clone()).unwrap();

    let calls = (0..16).map(|i| {
        let repository = Arc::clone(&repository);
        let key = key.clone();
        let signature = signature.clone();
        tokio::spawn(async move {
            let age = if i % 2 == 0 { 30 } else { 45 };
            let arguments = MethodArguments::bind(&signature, vec![Value::Integer(age).into()]).unwrap();
            let output = repository
                .invoke(&key, &arguments, CancellationToken::new())
                .await
                .unwrap();
            (age, ids(output).len())
        })
    });

    for result in join_all(calls).await {
        let (age, found) = result.unwrap();
        assert_eq!(found, if age == 30 { 3 } else { 1 });
    }

    let stats = repository.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (16, 1, 1));

    let missing = MethodSignature::new("User", "findNothing").key();
    let arguments = MethodArguments::positional(Vec::new());
    assert!(matches!(
        repository.invoke(&missing, &arguments, CancellationToken::new()).await,
        Err(QueryError::Execution(_))
    ));
}
