use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::Cli;
use crate::error::CliError;

/// Write the completion script for `shell` to `output_path`, or stdout.
pub fn run_completions(shell: Shell, output_path: Option<&Path>) -> Result<(), CliError> {
    match output_path {
        Some(path) => {
            write_script(shell, &mut File::create(path)?)?;
            println!("{}", path.display());
        }
        None => write_script(shell, &mut io::stdout().lock())?,
    }
    Ok(())
}

fn write_script(shell: Shell, out: &mut dyn Write) -> io::Result<()> {
    let mut command = Cli::command();
    let bin = command.get_name().to_owned();
    clap_complete::generate(shell, &mut command, bin, out);
    out.flush()
}
