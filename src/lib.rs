#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod lifecycle;
pub mod locate;
pub mod logging;
pub mod paths;
pub mod progress;
pub mod provider;
pub mod provision;
pub mod remote;
pub mod vm_state;
pub mod wait;
