pub mod batch;
pub mod catalog;
pub mod generators;
pub mod image_prep;
pub mod runpod;
pub mod status;
pub mod storage;
pub mod watcher;
