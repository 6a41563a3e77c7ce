//! Eduforge Server Library
//!
//! Asynchronous generation pipeline for AI-written educational content.
//! This module exposes the server components for testing purposes.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod models;
pub mod poller;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod worker;
