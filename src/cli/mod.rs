//! CLI argument parsing and validation.

mod args;

pub use args::{
    Args, Command, ConsoleArgs, DEFAULT_REFERENCE_AUDIO, DEFAULT_REFERENCE_TEXT, Device,
    Reference, ReferenceError, ServeArgs,
};
