//! Data Transfer Objects for the HTTP API
//!
//! This module contains DTOs exchanged between the orchestrator and its
//! clients (CLI, frontend). DTOs are lightweight views of domain entities
//! optimized for network transfer.

pub mod pipeline;
pub mod project;
pub mod run;
