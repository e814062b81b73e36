//! AnimeFlow
//!
//! Anime catalog service: accounts with role-based staff permissions,
//! favorites and settings, plus the crawler that fills the catalog from
//! the source site.

pub mod auth;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod db;
pub mod error;
pub mod models;
pub mod parser;
pub mod roles;
pub mod routes;
pub mod scraper;
pub mod settings;
