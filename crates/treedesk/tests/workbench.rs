use std::sync::Arc;

use serde_json::json;
use treedesk::app::gateway::{ExternalToolGateway, GatewayOptions};
use treedesk::app::session::{EditorOptions, SessionKind, STARTER_DIAGRAM};
use treedesk::app::tree::PathTree;
use treedesk::app::view::{Presentation, ViewState};
use treedesk::app::workbench::Workbench;
use treedesk::domain::errors::{SessionError, TreeError};
use treedesk::domain::model::NodeTemplate;
use treedesk::infra::tools::BuiltinToolLoader;

const SCENARIO: &str = r#"{
  "A": {
    "type": "folder",
    "children": {
      "B": { "type": "document", "editorData": { "blocks": [] } }
    }
  }
}"#;

fn workbench(tree: PathTree) -> Workbench {
    let gateway = Arc::new(ExternalToolGateway::new(
        BuiltinToolLoader::new(),
        GatewayOptions::default(),
    ));
    Workbench::new(tree, gateway, EditorOptions::default())
}

async fn scenario_bench() -> Workbench {
    let mut bench = workbench(PathTree::new());
    bench.import_snapshot(SCENARIO).await.expect("scenario snapshot");
    bench
}

#[tokio::test]
async fn add_remove_rename_scenario() {
    let mut bench = scenario_bench().await;
    let template = NodeTemplate::document().with_editor_data(json!({ "blocks": [] }));

    let added = bench.add("A", "B", &template).unwrap();
    assert_eq!(added, "A/B (1)");

    assert!(bench.remove("A/B").await);
    assert_eq!(
        bench.tree().resolve("A/B").unwrap_err(),
        TreeError::NotFound("A/B".into())
    );

    let renamed = bench.rename("A/B (1)", "C").unwrap();
    assert_eq!(renamed, "A/C");
    assert!(bench.tree().resolve("A/B (1)").is_err());
    assert!(bench.tree().resolve("A/C").is_ok());
    assert_eq!(bench.search("a/c", None).len(), 1);
}

#[tokio::test]
async fn cancel_leaves_document_untouched_and_save_commits_tool_output() {
    let mut bench = scenario_bench().await;
    let stored = json!({
        "blocks": [
            { "type": "paragraph", "data": { "text": "keep" } },
            { "type": "embed", "data": { "url": "https://example.com" } }
        ]
    });
    let path = bench
        .add("A", "Notes", &NodeTemplate::document().with_editor_data(stored.clone()))
        .unwrap();

    bench.select(&path).await;
    bench.enter_edit(&path).await.unwrap();
    bench.cancel().await;
    assert_eq!(bench.tree().resolve(&path).unwrap().editor_data(), Some(&stored));

    bench.enter_edit(&path).await.unwrap();
    let committed = bench.save().await.unwrap();
    assert_eq!(committed.kind, SessionKind::Document);
    assert_eq!(
        bench.tree().resolve(&path).unwrap().editor_data(),
        Some(&json!({ "blocks": [{ "type": "paragraph", "data": { "text": "keep" } }] }))
    );
    assert!(bench.session().is_none());
}

#[tokio::test]
async fn switching_documents_discards_without_writing() {
    let mut bench = scenario_bench().await;
    let first = "A/B";
    let second = bench.add("A", "Other", &NodeTemplate::document()).unwrap();
    let before = bench.export_snapshot();

    bench.select(first).await;
    bench.enter_edit(first).await.unwrap();
    bench.select(&second).await;

    assert!(bench.session().is_none());
    assert_eq!(bench.export_snapshot(), before);
    assert_eq!(bench.view().state(), ViewState::ShowingDocument);
}

#[tokio::test]
async fn malformed_snapshot_keeps_previous_tree() {
    let mut bench = workbench(PathTree::with_default_layout());
    let before = bench.export_snapshot();

    for broken in [
        "",
        "[]",
        r#"{"X": {"type": "spreadsheet"}}"#,
        r#"{"X": {"type": "folder", "children": {"a/b": {"type": "folder"}}}}"#,
    ] {
        let err = bench.import_snapshot(broken).await.unwrap_err();
        assert!(matches!(err, TreeError::MalformedImport(_)), "{broken}: {err}");
        assert_eq!(bench.export_snapshot(), before);
    }
}

#[tokio::test]
async fn diagram_lifecycle_persists_into_node() {
    let mut bench = workbench(PathTree::with_default_layout());
    let path = "Workspace/Processes/Onboarding";
    bench.select(path).await;
    bench.enter_edit(path).await.unwrap();

    let exported = bench.export_diagram().await.unwrap();
    assert!(exported.contains("StartEvent_1"));
    let stored = bench.tree().resolve(path).unwrap().content().cloned();
    assert_eq!(stored.and_then(|content| content.xml), Some(exported));

    let err = bench.import_diagram("<definitions><process>").await.unwrap_err();
    assert!(matches!(err, SessionError::MalformedImport(_)));

    bench
        .import_diagram("<definitions><process id=\"P\"/></definitions>")
        .await
        .unwrap();
    assert!(matches!(
        bench.view().presentation(),
        Presentation::Process { xml: Some(xml), .. } if xml.contains("id=\"P\"")
    ));

    bench.reset_diagram().await.unwrap();
    let stored = bench.tree().resolve(path).unwrap().content().cloned();
    assert_eq!(
        stored.and_then(|content| content.xml).as_deref(),
        Some(STARTER_DIAGRAM)
    );
}

#[tokio::test]
async fn editing_folders_is_rejected() {
    let mut bench = workbench(PathTree::with_default_layout());
    let err = bench.enter_edit("Workspace/Documents").await.unwrap_err();
    assert!(matches!(err, SessionError::WrongType { .. }));
    assert!(bench.session().is_none());
}
