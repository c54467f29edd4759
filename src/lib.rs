//! Garment Catalog Pipeline
//!
//! This library renders garment photos into on-model images through a RunPod
//! serverless endpoint, tracks each garment through a batch, and lays the
//! results out into a print-ready PDF catalog. Intake and delivery go through
//! Cloudflare R2 object storage.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
