use crate::enrich::enrich_forest;
use crate::error::ApiError;
use crate::exec::run_command;
use crate::github::RepoContentFetcher;
use crate::models::{
    ApplyRequest, ChatRequest, ExecuteRequest, FileQuery, ImportRequest, NodeKind, PushRequest,
    RepoInfo,
};
use crate::session::{run_turn, AppState};
use crate::tree::{build_tree, collect_files, find_node};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::{debug, info, warn};
use rust_embed::RustEmbed;
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;

#[derive(RustEmbed)]
#[folder = "public/"]
struct Asset;

#[get("/api/connect")]
pub async fn connect() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": "Connection successful" }))
}

#[post("/api/import")]
pub async fn import_repo(
    state: web::Data<AppState>,
    req: web::Json<ImportRequest>,
) -> Result<HttpResponse, ApiError> {
    let repo = RepoInfo {
        owner: req.owner.clone(),
        repo: req.repo.clone(),
        branch: req.branch.clone(),
    };
    if repo.owner.is_empty() || repo.repo.is_empty() {
        return Err(ApiError::BadRequest("Owner and repo are required".to_string()));
    }
    info!("Importing {}/{}@{}", repo.owner, repo.repo, repo.branch);
    let start_time = Instant::now();

    let entries = state.github.fetch_repo_tree(&repo).await?;
    let tree = build_tree(&entries);
    let fetcher = RepoContentFetcher {
        client: state.github.clone(),
        repo: repo.clone(),
    };
    let enriched = enrich_forest(&tree, &fetcher).await;

    let mut ws = state.workspace.write().await;
    ws.install_import(repo.clone(), enriched.clone());

    info!(
        "Imported {}/{} ({} entries) in {:.2?}",
        repo.owner,
        repo.repo,
        entries.len(),
        start_time.elapsed()
    );
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "files": enriched,
        "repoInfo": repo,
    })))
}

#[get("/api/file")]
pub async fn get_file_content(
    state: web::Data<AppState>,
    query: web::Query<FileQuery>,
) -> Result<HttpResponse, ApiError> {
    let path = query
        .path
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Path is required".to_string()))?;
    debug!("Reading workspace file: {}", path);

    let ws = state.workspace.read().await;
    let node = find_node(&ws.files, path)
        .filter(|n| n.kind == NodeKind::File)
        .ok_or_else(|| ApiError::NotFound(format!("no file at '{}'", path)))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "content": node.content.clone().unwrap_or_default(),
    })))
}

#[post("/api/chat")]
pub async fn chat(
    state: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    info!("Chat turn started");
    let start_time = Instant::now();

    let reply = run_turn(&state, &req.message, req.current_file.as_deref()).await?;

    info!("Chat turn finished in {:.2?}", start_time.elapsed());
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "response": reply.content,
        "messageId": reply.id,
        "codeChanges": reply.changes,
    })))
}

#[get("/api/messages")]
pub async fn get_messages(state: web::Data<AppState>) -> HttpResponse {
    let ws = state.workspace.read().await;
    HttpResponse::Ok().json(json!({ "success": true, "messages": ws.messages }))
}

#[post("/api/changes/apply")]
pub async fn apply_code_change(
    state: web::Data<AppState>,
    req: web::Json<ApplyRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut ws = state.workspace.write().await;
    let applied = ws.accept_change(req.message_id, req.change_index)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "change": applied,
        "files": ws.files,
    })))
}

#[post("/api/push")]
pub async fn push_repo(
    state: web::Data<AppState>,
    req: web::Json<PushRequest>,
) -> Result<HttpResponse, ApiError> {
    let start_time = Instant::now();
    let (repo, files) = {
        let ws = state.workspace.read().await;
        let repo = ws
            .repo
            .clone()
            .ok_or_else(|| ApiError::BadRequest("no repository imported".to_string()))?;
        (repo, collect_files(&ws.files))
    };
    if files.is_empty() {
        return Err(ApiError::BadRequest("nothing to push".to_string()));
    }

    let sha = state.github.push_files(&repo, &req.message, &files).await?;

    info!("Push finished in {:.2?}", start_time.elapsed());
    Ok(HttpResponse::Ok().json(json!({ "success": true, "sha": sha })))
}

#[get("/api/repos")]
pub async fn list_repos(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let repos = state.github.list_repos().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "repos": repos })))
}

#[post("/api/execute")]
pub async fn execute(req: web::Json<ExecuteRequest>) -> Result<HttpResponse, ApiError> {
    if req.program.trim().is_empty() {
        return Err(ApiError::BadRequest("Program is required".to_string()));
    }
    let cwd = req.cwd.as_ref().map(PathBuf::from);
    let output = run_command(&req.program, &req.args, cwd.as_deref()).await?;
    if output.exit_code != Some(0) {
        warn!(
            "Command '{}' exited with {:?}",
            req.program, output.exit_code
        );
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "output": output })))
}

pub async fn static_handler(req: HttpRequest) -> HttpResponse {
    let path = req.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };
    debug!("Serving static asset: {}", path);

    match Asset::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            HttpResponse::Ok()
                .content_type(mime.as_ref())
                .body(content.data.into_owned())
        }
        None => HttpResponse::NotFound().body("404 Not Found"),
    }
}
