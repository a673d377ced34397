use log::info;
use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::task::spawn_blocking;

use crate::api::{AppError, AppResult, AppState};
use crate::operations::browse::{DirectoryListing, browse_directory};
use crate::operations::scan::scan_directory;
use crate::utils::resolve_directory;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub files: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BrowseRequest {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub success: bool,
    #[serde(flatten)]
    pub listing: DirectoryListing,
}

/// A missing or blank directory falls back to the configured default.
fn requested_or_default(requested: Option<String>, state: &AppState) -> String {
    requested
        .filter(|raw| !raw.trim().is_empty())
        .unwrap_or_else(|| state.config.fallback_directory())
}

#[post("/scan", data = "<request>")]
pub async fn scan(state: &State<AppState>, request: Json<ScanRequest>) -> AppResult<Json<ScanResponse>> {
    let start_time = Instant::now();
    let raw = requested_or_default(request.into_inner().directory, state);
    let directory =
        resolve_directory(&raw).map_err(|err| AppError::new(Status::BadRequest, err))?;

    let files = spawn_blocking({
        let directory = directory.clone();
        move || scan_directory(&directory)
    })
    .await?
    .map_err(|err| AppError::new(err.status(), err))?;

    info!(
        duration = &*format!("{:?}", start_time.elapsed());
        "Scanned {:?}: {} images", directory, files.len()
    );
    Ok(Json(ScanResponse {
        success: true,
        files,
    }))
}

#[post("/browse", data = "<request>")]
pub async fn browse(
    state: &State<AppState>,
    request: Json<BrowseRequest>,
) -> AppResult<Json<BrowseResponse>> {
    let raw = requested_or_default(request.into_inner().path, state);
    let listing = spawn_blocking(move || browse_directory(&raw))
        .await?
        .map_err(|err| AppError::new(Status::BadRequest, err))?;

    Ok(Json(BrowseResponse {
        success: true,
        listing,
    }))
}

pub fn generate_directory_routes() -> Vec<rocket::Route> {
    routes![scan, browse]
}
