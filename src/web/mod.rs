// src/web/mod.rs
pub mod admin_handlers;
pub mod auth_handlers;
pub mod live_handlers;
pub mod member_handlers;
pub mod mw_admin;
pub mod mw_auth;
pub mod routes;
