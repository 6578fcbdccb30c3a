//! Integration tests for Lintgate
//!
//! These tests drive the public API end to end: fixture files through the
//! linters, hook messages through the executor, and configuration files
//! through the loader and the linting engine.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/python_fixtures.rs"]
mod python_fixtures;

#[path = "integration/document_fixtures.rs"]
mod document_fixtures;

#[path = "integration/hook_pipeline.rs"]
mod hook_pipeline;

#[path = "integration/config_overrides.rs"]
mod config_overrides;

#[path = "integration/settings_install.rs"]
mod settings_install;

#[path = "integration/custom_linter.rs"]
mod custom_linter;

#[path = "integration/external_tools.rs"]
mod external_tools;
