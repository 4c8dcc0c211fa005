//! Integration tests for the risk-gated pipeline

mod common;
mod concurrency_test;
mod config_test;
mod emergency_test;
mod pipeline_test;
