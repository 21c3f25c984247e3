// tests/integration/main.rs
//
// End-to-end tests that go through `Weave.toml` files on disk.

mod cli_run;
mod error_handling;
