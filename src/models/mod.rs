// src/models/mod.rs
pub mod member;
