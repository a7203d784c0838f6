mod support;

use std::sync::Arc;

use graphstate_core::{MemoryOp, Namespace, StoreError, Value};
use graphstate_cypher::schema::{CREATE_MEMORY_CONSTRAINT_CYPHER, SEARCH_MEMORY_CYPHER};
use graphstate_cypher::MemoryStore;
use serde_json::json;
use support::{codec, syntax_error, Exercise, FakeGraph};

async fn store() -> (Arc<FakeGraph>, MemoryStore<Arc<FakeGraph>>) {
    let graph = Arc::new(FakeGraph::new());
    let store = MemoryStore::new(graph.clone(), codec()).await;
    (graph, store)
}

fn namespace() -> Namespace {
    Namespace::new(["user-42", "memories"]).unwrap()
}

fn note(content: &str, kind: &str) -> Value {
    [("content", content), ("type", kind)].into_iter().collect()
}

async fn seed_tutoring_notes(store: &MemoryStore<Arc<FakeGraph>>) {
    let ns = namespace();
    store
        .put(&ns, "joins", &note("SQL joins are important", "concept"))
        .await
        .unwrap();
    store
        .put(
            &ns,
            "normalization",
            &note("Normalization reduces redundancy", "concept"),
        )
        .await
        .unwrap();
    store
        .put(&ns, "exercise", &note("Practice exercise", "practice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn construction_bootstraps_memory_schema() {
    let (graph, _store) = store().await;
    assert_eq!(graph.schema()[0], CREATE_MEMORY_CONSTRAINT_CYPHER);
}

#[tokio::test]
async fn put_then_get_round_trips_structured_values() {
    let (graph, store) = store().await;
    let exercise = Exercise::new("Write an inner join", "practice");

    store
        .put(&namespace(), "ex-1", &Value::structured(exercise.clone()))
        .await
        .unwrap();

    let value = store.get(&namespace(), "ex-1").await.unwrap().unwrap();
    assert_eq!(value.downcast_ref::<Exercise>(), Some(&exercise));

    let node = graph.memory_node("user-42/memories", "ex-1").unwrap();
    assert_eq!(node["type"], "practice");
}

#[tokio::test]
async fn get_on_missing_key_is_not_found() {
    let (_graph, store) = store().await;
    assert_eq!(store.get(&namespace(), "nope").await.unwrap(), None);
}

#[tokio::test]
async fn type_tag_defaults_to_general() {
    let (_graph, store) = store().await;
    store
        .put(&namespace(), "plain", &Value::from("just text"))
        .await
        .unwrap();

    let item = store.get_item(&namespace(), "plain").await.unwrap().unwrap();
    assert_eq!(item.kind, "general");
    assert_eq!(item.namespace, namespace());
    assert_eq!(item.key, "plain");
}

#[tokio::test]
async fn repeated_put_preserves_created_at_and_refreshes_updated_at() {
    let (graph, store) = store().await;
    store
        .put(&namespace(), "k", &Value::from("first"))
        .await
        .unwrap();
    let first = store.get_item(&namespace(), "k").await.unwrap().unwrap();

    store
        .put(&namespace(), "k", &Value::from("second"))
        .await
        .unwrap();
    let second = store.get_item(&namespace(), "k").await.unwrap().unwrap();

    assert_eq!(graph.memory_count(), 1);
    assert_eq!(second.value, Value::from("second"));
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(first.created_at, first.updated_at);
}

#[tokio::test]
async fn delete_reports_removed_count_and_is_idempotent() {
    let (_graph, store) = store().await;
    store
        .put(&namespace(), "k", &Value::from("gone soon"))
        .await
        .unwrap();

    assert_eq!(store.delete(&namespace(), "k").await.unwrap(), 1);
    assert_eq!(store.get(&namespace(), "k").await.unwrap(), None);
    assert_eq!(store.delete(&namespace(), "k").await.unwrap(), 0);
}

#[tokio::test]
async fn list_returns_keys_most_recently_updated_first() {
    let (_graph, store) = store().await;
    for key in ["a", "b", "c"] {
        store
            .put(&namespace(), key, &Value::from(key))
            .await
            .unwrap();
    }
    store
        .put(&namespace(), "a", &Value::from("touched"))
        .await
        .unwrap();

    let other = Namespace::new(["user-7", "memories"]).unwrap();
    store.put(&other, "z", &Value::from("z")).await.unwrap();

    assert_eq!(store.list(&namespace()).await.unwrap(), ["a", "c", "b"]);
    assert_eq!(store.list(&other).await.unwrap(), ["z"]);
}

#[tokio::test]
async fn search_matches_case_insensitively_within_namespace() {
    let (_graph, store) = store().await;
    seed_tutoring_notes(&store).await;
    let other = Namespace::new(["user-7", "memories"]).unwrap();
    store
        .put(&other, "joins", &note("SQL elsewhere", "concept"))
        .await
        .unwrap();

    let hits = store.search(&namespace(), "sql", 5, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "joins");
    assert_eq!(
        hits[0].1.get("content"),
        Some(&Value::from("SQL joins are important"))
    );
}

#[tokio::test]
async fn search_type_filter_excludes_other_types() {
    let (_graph, store) = store().await;
    seed_tutoring_notes(&store).await;

    let hits = store
        .search(&namespace(), "sql", 5, Some("practice"))
        .await
        .unwrap();
    assert!(hits.is_empty());

    let hits = store
        .search(&namespace(), "EXERCISE", 5, Some("practice"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "exercise");
}

#[tokio::test]
async fn search_is_recent_first_and_capped() {
    let (graph, store) = store().await;
    seed_tutoring_notes(&store).await;

    let hits = store.search(&namespace(), "e", 2, None).await.unwrap();
    let keys: Vec<&str> = hits.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, ["exercise", "normalization"]);

    let before = graph.executed_count(SEARCH_MEMORY_CYPHER);
    assert!(store
        .search(&namespace(), "sql", 0, None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(graph.executed_count(SEARCH_MEMORY_CYPHER), before);
}

#[tokio::test]
async fn retired_categories_are_normalized_on_read_only() {
    let (graph, store) = store().await;
    let stored = json!({
        "__kind__": "structured",
        "type_id": "tutor.Exercise",
        "data": {"content": "drill: write three joins", "category": "drill"}
    })
    .to_string();
    graph.insert_memory_node(
        "user-42/memories",
        "legacy",
        [
            ("value".to_string(), json!(stored)),
            ("type".to_string(), json!("drill")),
            ("updated_at".to_string(), json!("2023-01-01T00:00:00.000000Z")),
        ]
        .into_iter()
        .collect(),
    );

    for _ in 0..2 {
        let value = store.get(&namespace(), "legacy").await.unwrap().unwrap();
        let exercise = value.downcast_ref::<Exercise>().unwrap();
        assert_eq!(exercise.category, "practice");
        assert_eq!(exercise.content, "drill: write three joins");
    }
    assert_eq!(
        graph.memory_node("user-42/memories", "legacy").unwrap()["value"],
        json!(stored)
    );
}

#[tokio::test]
async fn malformed_stored_text_is_returned_as_is() {
    let (graph, store) = store().await;
    graph.insert_memory_node(
        "user-42/memories",
        "broken",
        [("value".to_string(), json!("{\"content\": "))]
            .into_iter()
            .collect(),
    );

    let value = store.get(&namespace(), "broken").await.unwrap().unwrap();
    assert_eq!(value, Value::from("{\"content\": "));
}

#[tokio::test]
async fn list_namespaces_honours_segment_prefixes() {
    let (_graph, store) = store().await;
    for segments in [
        vec!["user-1", "memories"],
        vec!["user-1", "profile"],
        vec!["user-10", "memories"],
        vec!["user-2"],
    ] {
        let ns = Namespace::new(segments).unwrap();
        store.put(&ns, "k", &Value::from(1)).await.unwrap();
    }

    let all = store.list_namespaces(None).await.unwrap();
    assert_eq!(all.len(), 4);

    let prefix = Namespace::new(["user-1"]).unwrap();
    let under: Vec<String> = store
        .list_namespaces(Some(&prefix))
        .await
        .unwrap()
        .iter()
        .map(Namespace::joined)
        .collect();
    assert_eq!(under, ["user-1/memories", "user-1/profile"]);
}

#[tokio::test]
async fn batch_operations_are_rejected() {
    let (graph, store) = store().await;
    let before = graph.executed().len();

    let err = store
        .batch(vec![MemoryOp::Get {
            namespace: namespace(),
            key: "k".to_string(),
        }])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Unsupported(_)));
    assert_eq!(graph.executed().len(), before);
}

#[tokio::test]
async fn failures_name_operation_and_identity() {
    let (graph, store) = store().await;
    graph.fail_next(syntax_error("MATCH"));

    let err = store.delete(&namespace(), "k").await.unwrap_err();
    assert_eq!(
        err.to_string().split(": ").next(),
        Some("memory.delete failed for namespace=user-42/memories key=k")
    );
}

#[tokio::test]
async fn unencodable_values_never_reach_the_backend() {
    let (graph, store) = store().await;
    let value: Value = [("__kind__", "structured")].into_iter().collect();

    let err = store.put(&namespace(), "k", &value).await.unwrap_err();
    assert!(matches!(err, StoreError::Encode { field: "value", .. }));
    assert_eq!(graph.memory_count(), 0);
    assert!(matches!(
        store.put(&namespace(), "", &Value::Null).await,
        Err(StoreError::InvalidIdentity(_))
    ));
}
