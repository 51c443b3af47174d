//! daybook CLI binary.
//!
//! All logic lives in the library; main.rs only invokes `cli::run()` and
//! maps its result to a process exit code.

#[tokio::main]
async fn main() -> std::process::ExitCode {
    daybook::cli::run().await
}
