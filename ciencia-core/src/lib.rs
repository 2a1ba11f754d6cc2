//! CiencIA Core
//!
//! Core types shared by the CiencIA services.
//!
//! This crate contains:
//! - Domain types: Core business entities (Project, Pipeline, Run)
//! - DTOs: Data transfer objects exchanged over the HTTP API

pub mod domain;
pub mod dto;
