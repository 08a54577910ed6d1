//! Shell completion scripts, generated from the clap command tree.

use std::io::Write;

use clap::Command;
use clap_complete::{generate, Shell};

/// Write the completion script for `shell` to `out`.
pub fn run(shell: Shell, cmd: &mut Command, out: &mut dyn Write) -> anyhow::Result<()> {
    let name = cmd.get_name().to_string();
    generate(shell, cmd, name, out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_names_binary_and_subcommands() {
        let mut cmd = Command::new("apidiff")
            .subcommand(Command::new("diff"))
            .subcommand(Command::new("symbols"));

        let mut out = Vec::new();
        run(Shell::Fish, &mut cmd, &mut out).unwrap();
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("complete -c apidiff"));
        assert!(script.contains("symbols"));
    }
}
