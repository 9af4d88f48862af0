//! Backend seams and the photo workflow built on top of them.

pub mod local_storage;
pub mod object_storage;
pub mod photo_repository;
pub mod photo_service;
pub mod sqlite_repository;
pub mod supabase;
