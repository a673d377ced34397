pub mod handlers;

use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::operations::imaging::ImageBackend;
use crate::operations::scan::ScanError;

/// Managed state shared by every route.
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn ImageBackend>,
}

#[derive(Debug)]
pub struct AppError {
    pub status: Status,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn new(status: Status, error: impl Into<anyhow::Error>) -> Self {
        AppError {
            status,
            error: error.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::new(Status::BadRequest, anyhow::Error::msg(message.into()))
    }
}

#[rocket::async_trait]
impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'o> {
        let outer_msg = self.error.to_string();

        let chain: Vec<String> = self.error.chain().map(|e| e.to_string()).collect();

        let body = json!({
            "error": outer_msg,
            "chain": chain,
        })
        .to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl<E> From<E> for AppError
where
    anyhow::Error: From<E>,
{
    fn from(err: E) -> Self {
        AppError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err),
        }
    }
}

impl ScanError {
    pub fn status(&self) -> Status {
        match self {
            ScanError::NotADirectory(_) => Status::BadRequest,
            ScanError::PermissionDenied(_) => Status::Forbidden,
            ScanError::Io { .. } => Status::InternalServerError,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
