//! Common utilities for tools running inside the execution container.
//!
//! Everything here logs to stderr: the container's stdout carries user
//! program output and the artifact report, and must stay free of log lines.

pub mod log;
