//! Prime Directive - freeze, switch and resume work across repositories.
//!
//! This crate provides the core functionality for the `pd` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - YAML repository registry and path resolution
//! - [`detect`] - Map a working directory to a configured repository
//! - [`capture`] - Git, terminal and active-task collectors
//! - [`ai`] - Ollama / OpenAI providers and the monthly budget ledger
//! - [`sitrep`] - SITREP generation with provider fallback
//! - [`freeze`] - Capture and persist a context snapshot
//! - [`switch`] - Freeze-current / warp-to-target orchestration
//! - [`workspace`] - tmux sessions and editor launching
//! - [`daemon`] - Inactivity-driven auto-freeze
//! - [`model`] - Data types (Repository, ContextSnapshot, usage entries)
//! - [`storage`] - SQLite snapshot store
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ai;
pub mod capture;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod detect;
pub mod error;
pub mod freeze;
pub mod model;
pub mod sitrep;
pub mod storage;
pub mod switch;
pub mod workspace;

pub use error::{Error, Result};
