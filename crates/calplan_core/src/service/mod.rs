//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into front-end level flows.
//! - Keep front ends decoupled from persistence ordering details.

pub mod planner_service;
