pub mod connection;
pub mod format;

use std::io::{stdin, stdout, IsTerminal, Write};

use anyhow::{Context, Result};

/// Whether the process can prompt the user at all.
pub fn is_interactive() -> bool {
    stdin().is_terminal()
}

/// Ask a yes/no question on the terminal. Defaults to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
