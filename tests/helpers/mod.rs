//! Shared fixtures and assertions for integration tests.

#![allow(dead_code)]

pub mod result_assertions;
pub mod source_fixtures;
