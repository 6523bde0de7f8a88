//! Tests for catalogue queries and backend construction.

use std::time::Duration;

use jdbc_source::{BackendKind, FilterSelection, QueryExecutor, SourceDescriptor, SourceModel};
use test_utils::{
    memory_descriptor, memory_source, memory_source_with, temp_test_dir, write_temp_file,
    FILTER_ID, ROOT_FILTER, SUB_FILTER_ID,
};

// ============================================================================
// Filter tree
// ============================================================================

#[tokio::test]
async fn test_full_tree_from_fixture() {
    let (source, _) = memory_source();
    let tree = source.get_filters(&FilterSelection::default()).walk().await.unwrap();

    let ids: Vec<_> = tree.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![ROOT_FILTER, "overig"]);

    let waterstanden = &tree[0].children[0];
    assert_eq!(waterstanden.id, FILTER_ID);
    assert_eq!(waterstanden.children[0].id, SUB_FILTER_ID);
    assert!(waterstanden.children[0].is_leaf());
}

#[tokio::test]
async fn test_configured_root_with_custom_filter() {
    let mut descriptor = memory_descriptor();
    descriptor.usecustomfilter = true;
    descriptor.filter_tree_root = Some(FILTER_ID.to_string());
    let (source, _) = memory_source_with(descriptor);

    let tree = source.get_filters(&FilterSelection::default());
    assert_eq!(tree.root_id(), Some(FILTER_ID));

    let top = tree.walk().await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, SUB_FILTER_ID);
}

#[tokio::test]
async fn test_request_can_disable_custom_filter() {
    let mut descriptor = memory_descriptor();
    descriptor.usecustomfilter = true;
    descriptor.filter_tree_root = Some(FILTER_ID.to_string());
    let (source, _) = memory_source_with(descriptor);

    let tree = source.get_filters(&FilterSelection {
        usecustomfilter: Some(false),
        root_override: None,
    });
    assert_eq!(tree.root_id(), None);
    assert_eq!(tree.walk().await.unwrap().len(), 2);
}

// ============================================================================
// Backend construction
// ============================================================================

#[tokio::test]
async fn test_memory_backend_from_dataset_file_with_query_cache() {
    let dir = temp_test_dir();
    let path = write_temp_file(
        dir.path(),
        "dataset.yaml",
        r#"
filters:
  - { id: root, name: Root, parentid: "-999" }
  - { id: child, name: Child, parentid: root }
parameters:
  - { id: P, name: Param, unit: m }
entries:
  - { filter_id: child, parameter_id: P, location_id: L, location_name: Loc, longitude: 5.0, latitude: 52.0 }
"#,
    );

    let mut descriptor = SourceDescriptor::new("demo", "Demo", BackendKind::Memory);
    descriptor.dataset = Some(path);
    let source = SourceModel::connect(descriptor, Some(Duration::from_secs(60))).unwrap();

    assert_eq!(source.executor().backend_name(), "memory");
    let locations = source.get_locations("child", Some("P")).await.unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, "Loc");

    let tree = source.get_filters(&FilterSelection::default()).walk().await.unwrap();
    assert_eq!(tree[0].children[0].id, "child");
}

#[test]
fn test_missing_dataset_file_is_config_error() {
    let mut descriptor = SourceDescriptor::new("demo", "Demo", BackendKind::Memory);
    descriptor.dataset = Some("/nonexistent/dataset.yaml".into());

    let err = SourceModel::connect(descriptor, None).err().unwrap();
    assert_eq!(err.kind(), "ConfigError");
}
