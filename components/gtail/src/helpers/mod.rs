//! Small building blocks shared by the CLI and the runtime.

pub mod converters;
pub mod load_config;
pub mod shutdown;
pub mod time_args;
pub mod token;
