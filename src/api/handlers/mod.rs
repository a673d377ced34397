pub mod directory;
pub mod media;
pub mod process;
