use actix_web::{test, web, App};
use async_trait::async_trait;
use codedesk::enrich::{enrich_forest, ContentFetcher};
use codedesk::error::ApiError;
use codedesk::github::GitHubClient;
use codedesk::handlers;
use codedesk::llm::ChatBackend;
use codedesk::models::{EntryKind, NodeKind, RepoEntry, RepoInfo};
use codedesk::session::AppState;
use codedesk::tree::{build_tree, find_node};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

struct CannedBackend(String);

#[async_trait]
impl ChatBackend for CannedBackend {
    async fn complete(&self, _msg: &str, _ctx: &str) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

struct MapFetcher(HashMap<String, String>);

#[async_trait]
impl ContentFetcher for MapFetcher {
    async fn fetch(&self, path: &str) -> Result<String, ApiError> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::LocalIo(format!("no such file: {}", path)))
    }
}

fn blob(path: &str) -> RepoEntry {
    RepoEntry {
        path: path.to_string(),
        kind: EntryKind::Blob,
        size: Some(10),
    }
}

fn folder(path: &str) -> RepoEntry {
    RepoEntry {
        path: path.to_string(),
        kind: EntryKind::Tree,
        size: None,
    }
}

#[tokio::test]
async fn import_order_does_not_matter_end_to_end() {
    // Child listed before its parent; builder must still nest it.
    let entries = vec![blob("a/b.txt"), folder("a")];
    let tree = build_tree(&entries);

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "a");
    assert_eq!(tree[0].kind, NodeKind::Folder);
    let file = find_node(&tree, "a/b.txt").expect("nested file missing");
    assert_eq!(file.name, "b.txt");

    let fetcher = MapFetcher([("a/b.txt".to_string(), "hello".to_string())].into());
    let enriched = enrich_forest(&tree, &fetcher).await;
    assert_eq!(
        find_node(&enriched, "a/b.txt").unwrap().content.as_deref(),
        Some("hello")
    );
}

#[actix_web::test]
async fn chat_turn_then_apply_updates_workspace_over_http() {
    let reply = "Here are both files.\n\
                 ```txt\n// CREATE: a.txt\nhello\n```\n\
                 ```txt\n// FILE: b.txt\nworld\n```\n";
    let state = web::Data::new(AppState::new(
        GitHubClient::new(None),
        Arc::new(CannedBackend(reply.to_string())),
    ));

    {
        let mut files = build_tree(&[blob("b.txt")]);
        files[0].content = Some("old".to_string());
        let mut ws = state.workspace.write().await;
        ws.install_import(
            RepoInfo {
                owner: "o".into(),
                repo: "r".into(),
                branch: "main".into(),
            },
            files,
        );
    }

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(handlers::connect)
            .service(handlers::chat)
            .service(handlers::apply_code_change)
            .service(handlers::get_file_content)
            .service(handlers::get_messages),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(serde_json::json!({ "message": "make the files" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    let changes = body["codeChanges"].as_array().expect("changes array");
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["filePath"], "a.txt");
    assert_eq!(changes[0]["action"], "create");
    assert_eq!(changes[1]["filePath"], "b.txt");
    assert_eq!(changes[1]["action"], "modify");
    let message_id = body["messageId"].as_u64().expect("message id");

    // Accept the modify; the create stays pending.
    let req = test::TestRequest::post()
        .uri("/api/changes/apply")
        .set_json(serde_json::json!({ "messageId": message_id, "changeIndex": 1 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["change"]["applied"], true);

    let req = test::TestRequest::get()
        .uri("/api/file?path=b.txt")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["content"], "world");

    // The unaccepted create never touched the tree.
    let req = test::TestRequest::get()
        .uri("/api/file?path=a.txt")
        .to_request();
    let resp = test::call_service(
        &app,
        req,
    )
    .await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    let ws = state.workspace.read().await;
    assert_eq!(ws.messages.len(), 2);
    assert!(!ws.messages[1].changes[0].applied);
    assert!(ws.messages[1].changes[1].applied);
}
