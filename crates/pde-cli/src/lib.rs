//! Library wrapper around the `pde` binary.
//!
//! `cargo test -p pde-cli --lib` typechecks the command implementations without building the
//! binary test suite, so the binary crate root is compiled here as a module.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;
