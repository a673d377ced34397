use rocket::fs::NamedFile;
use rocket::http::Status;

use crate::api::{AppError, AppResult};
use crate::operations::media::resolve_media_file;

/// Raw bytes of one image in `dir`, for the preview grid.
#[get("/image?<dir>&<file>")]
pub async fn image(dir: &str, file: &str) -> AppResult<NamedFile> {
    let path =
        resolve_media_file(dir, file).map_err(|err| AppError::new(Status::NotFound, err))?;
    NamedFile::open(&path)
        .await
        .map_err(|err| AppError::new(Status::NotFound, err))
}

pub fn generate_media_routes() -> Vec<rocket::Route> {
    routes![image]
}
