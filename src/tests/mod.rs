//! tests/mod.rs

mod workflow_tests;
