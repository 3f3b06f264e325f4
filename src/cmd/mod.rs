//! Operator subcommands beyond the main daemon.

pub mod send_once;
