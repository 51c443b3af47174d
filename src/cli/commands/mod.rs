pub mod classify;
pub mod export;
pub mod import;
pub mod run;
pub mod search;

/// Prints a value as pretty JSON to stdout. Every subcommand's success path
/// goes through this so scripting against daybook's output is uniform.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
