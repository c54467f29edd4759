pub mod catalog;
pub mod garment;
pub mod job;
pub mod metadata;
