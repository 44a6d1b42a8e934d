//! tutorgrade-core — Exam orchestration, LLM grading, and tutoring reports.
//!
//! This crate defines the data model, the collaborator traits for grading
//! backends and the question store, and the exam flow built on top of them.

pub mod authoring;
pub mod bank;
pub mod engine;
pub mod error;
pub mod grading;
pub mod model;
pub mod parser;
pub mod report;
pub mod statistics;
pub mod traits;
