//! Data models for the photo service.
//!
//! `PhotoRecord` maps to the metadata table via `sqlx::FromRow` and to
//! PostgREST rows via `serde`; the remaining types are HTTP bodies.

pub mod photo;
