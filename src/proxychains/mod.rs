//! proxychains integration
//!
//! This module provides functionality for:
//! - Projecting selected proxies to proxychains entry lines
//! - Rewriting proxychains.conf with backup and restore
//! - Launching applications through the proxychains wrapper

pub mod conf;
pub mod launcher;

pub use conf::{conf_line, conf_lines, rewrite_conf, ProxychainsConf, DEFAULT_CONF_PATH};
pub use launcher::{Launcher, DEFAULT_LAUNCHER_BINARY};
