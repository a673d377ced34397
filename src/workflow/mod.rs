pub mod batch;
pub mod flows;
pub mod stream;
