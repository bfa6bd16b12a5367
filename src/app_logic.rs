/*
 * The application logic layer: `LibrarySession` orchestrates the core services for
 * every library workflow, and `commands` maps the command line onto it.
 * Unit tests for `LibrarySession` are in `library_tests.rs`.
 */
pub mod commands;
pub mod library;


pub use commands::{Cli, run};
