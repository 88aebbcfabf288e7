//! Interactive loop over the same JSON command surface as the headless
//! driver, plus a few colon conveniences for inspecting the theory.

use kernel::theory::Theory;
use kernel::{render_formula, render_func_expr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::driver::{apply_command, Command};

const HISTORY_FILE: &str = ".workbench_history";

pub fn start() {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to initialize readline: {}", e);
            return;
        }
    };
    if rl.load_history(HISTORY_FILE).is_err() {
        // No history yet.
    }

    let mut theory = Theory::new();
    println!("Workbench REPL — one JSON command per line.");
    println!("Try :help for the colon commands, :quit to leave.");

    loop {
        match rl.readline("wb> ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                if let Some(colon) = line.strip_prefix(':') {
                    if !colon_command(&theory, colon) {
                        break;
                    }
                    continue;
                }
                match serde_json::from_str::<Command>(&line) {
                    Ok(command) => {
                        let reply = apply_command(&mut theory, command);
                        println!("{}", reply);
                    }
                    Err(e) => println!("parse error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }
    let _ = rl.save_history(HISTORY_FILE);
}

/// Handle a `:command`; returns false when the loop should exit.
fn colon_command(theory: &Theory, input: &str) -> bool {
    match input.trim() {
        "quit" | "exit" | "q" => return false,
        "help" => {
            println!(":state      dump the theory as JSON");
            println!(":summary    one line per entity");
            println!(":quit       leave the REPL");
        }
        "state" => match serde_json::to_string_pretty(theory) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("serialization error: {}", e),
        },
        "summary" => summary(theory),
        other => println!("unknown colon command :{} (try :help)", other),
    }
    true
}

fn summary(theory: &Theory) {
    for sort in theory.sorts() {
        let ctors: Vec<&str> = theory
            .constructors_of(&sort.id)
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();
        println!("sort {} [{}]  {}", sort.name, sort.id, ctors.join(", "));
    }
    for judgment in theory.judgments() {
        let rules = theory.rules_for(&judgment.id).len();
        println!(
            "judgment {} [{}]  {} rule(s)",
            judgment.name, judgment.id, rules
        );
    }
    for func in theory.functions() {
        let status = if func.terminates {
            "terminates".to_string()
        } else {
            format!(
                "does not terminate: {}",
                func.termination_error.as_deref().unwrap_or("unknown")
            )
        };
        let body = func
            .cases
            .first()
            .map(|c| render_func_expr(theory, &c.body))
            .unwrap_or_default();
        println!("function {} [{}]  {} ({})", func.name, func.id, status, body);
    }
    for property in theory.properties() {
        println!(
            "property {} [{}]  {}",
            property.name,
            property.id,
            render_formula(theory, &property.statement)
        );
    }
    for proof in theory.proofs() {
        println!(
            "proof [{}] of [{}]  {:?}, {} open goal(s)",
            proof.id,
            proof.property,
            proof.status,
            proof.open_goals.len()
        );
    }
}
