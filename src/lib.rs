//! auto-caption - Asynchronous caption generation pipeline
//!
//! Turns video files into subtitle tracks: audio is handed to an external
//! speech-recognition service, the result is optionally translated through a
//! provider fallback chain, and the cues are written out as SRT. Jobs run on
//! a bounded worker pool and report progress through a task registry.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod segment;
pub mod service;
pub mod subtitle;
pub mod task;
pub mod transcribe;
pub mod translate;
pub mod worker;
