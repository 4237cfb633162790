//! DevSpace - developer blog backend
//!
//! Core functionality for the DevSpace blog: unique slugs for post titles,
//! markdown-or-plain-text content rendering, tag ranking for the tag cloud,
//! and the JSON API that exposes them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
