//! Photo upload, listing and deletion over HTTP, backed by an object-storage
//! bucket and a metadata table (Supabase, or local disk + SQLite).

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
