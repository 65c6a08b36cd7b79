//! Client-side data layer for a JSON:API contents backend.
//!
//! Documents are parsed into typed entities and relationship edges
//! ([`jsonapi`], [`adapters`]), merged as batches into a shared relational
//! cache ([`cache`]), and exposed as paginated, live-updating listings
//! ([`repository`]).

pub mod adapters;
pub mod cache;
pub mod config;
pub mod entities;
pub mod error;
pub mod jsonapi;
pub mod repository;
pub mod service;
