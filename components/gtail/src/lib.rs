//! gtail follows a Graylog server's search API from the terminal, printing
//! newly arrived log messages the way `tail -f` follows a file.
//!
//! The polling protocol lives in [`poller`]; [`streams`] resolves stream names
//! to server ids and [`render`] formats messages for display.

pub mod cli;
pub mod graylog;
pub mod helpers;
pub mod instrumentation;
pub mod poller;
pub mod render;
pub mod runtime;
pub mod streams;
