#[macro_use]
extern crate rocket;

pub mod api;
pub mod bootstrap;
pub mod common;
pub mod config;
pub mod models;
pub mod operations;
pub mod utils;
pub mod workflow;

use rocket::{Build, Rocket};
use std::sync::Arc;

use api::AppState;
use api::handlers::directory::generate_directory_routes;
use api::handlers::media::generate_media_routes;
use api::handlers::process::generate_process_routes;
use common::DEFAULT_PORT;
use config::AppConfig;
use operations::imaging::{ImageBackend, backend_from_config};

/// Rocket instance with the backend selected by `config`.
pub fn build_rocket(config: AppConfig) -> Rocket<Build> {
    let backend = backend_from_config(&config);
    build_rocket_with_backend(config, backend)
}

pub fn build_rocket_with_backend(config: AppConfig, backend: Arc<dyn ImageBackend>) -> Rocket<Build> {
    let figment = rocket::Config::figment().join(("port", DEFAULT_PORT));

    rocket::custom(figment)
        .manage(AppState { config, backend })
        .mount("/", generate_directory_routes())
        .mount("/", generate_media_routes())
        .mount("/", generate_process_routes())
}
