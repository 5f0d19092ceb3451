//! Shared fixtures for the integration tests

pub mod metadata_fixtures;
pub mod mock_client;
