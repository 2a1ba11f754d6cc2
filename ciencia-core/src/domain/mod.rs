//! Core domain types
//!
//! This module contains the core domain structures used across CiencIA services.
//! These types are shared between the orchestrator (for persistence and the
//! HTTP API) and the runner (for run execution).

pub mod pipeline;
pub mod project;
pub mod run;
