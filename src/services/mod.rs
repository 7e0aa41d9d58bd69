// src/services/mod.rs
pub mod date_normalizer;
pub mod directory_service;
pub mod record_mapper;
pub mod session_service;
