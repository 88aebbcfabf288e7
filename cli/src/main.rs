use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Read;

#[derive(Parser, Debug)]
#[command(version, about = "Workbench logic engine driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Command script to run (defaults to standard input)
    #[arg(required = false)]
    file: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command script headlessly and print JSON replies
    Run {
        /// Script file; standard input when omitted
        file: Option<String>,
    },
    /// Start the interactive REPL
    Repl,
}

fn read_input(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading script {}", path))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading standard input")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();
    match args.command {
        Some(Commands::Repl) => {
            cli::repl::start();
            Ok(())
        }
        Some(Commands::Run { file }) => {
            let input = read_input(file.as_deref())?;
            println!("{}", cli::driver::run_script(&input));
            Ok(())
        }
        None => match args.file {
            Some(file) => {
                let input = read_input(Some(&file))?;
                println!("{}", cli::driver::run_script(&input));
                Ok(())
            }
            None => {
                cli::repl::start();
                Ok(())
            }
        },
    }
}
