use log::info;
use rocket::State;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;

use crate::api::{AppError, AppResult, AppState};
use crate::models::request::BatchRequest;
use crate::workflow::flows::process_workflow;

/// Run a batch and stream its progress as server-sent events.
///
/// Validation happens before the stream opens so a bad request is a plain 400.
/// Once streaming, the last frame is always a `complete` or `error` event.
#[post("/process", data = "<request>")]
pub async fn process(
    state: &State<AppState>,
    request: Json<BatchRequest>,
) -> AppResult<EventStream![]> {
    let request = request.into_inner();
    request.validate().map_err(AppError::bad_request)?;
    info!("Accepted batch of {} files in {:?}", request.files.len(), request.directory);

    let mut rx = process_workflow(state.backend.clone(), request);
    Ok(EventStream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield Event::json(&event);
            if terminal {
                break;
            }
        }
    })
}

pub fn generate_process_routes() -> Vec<rocket::Route> {
    routes![process]
}
