//! Driver-level coverage: the JSON command surface builds a theory,
//! answers queries, and the script runner replies line by line.

use cli::driver::{apply_command, run_script, ArgSpec, Command, JudgmentArgSpec};
use kernel::theory::Theory;
use kernel::{CtorId, JudgmentId, MetaVarId, Pattern, SortId, Term};
use serde_json::Value;
use std::rc::Rc;

fn id_of(reply: &Value) -> String {
    reply["ok"]["id"]
        .as_str()
        .unwrap_or_else(|| panic!("expected an id in {}", reply))
        .to_string()
}

#[test]
fn driver_builds_a_theory_and_derives() {
    let mut theory = Theory::new();

    let reply = apply_command(
        &mut theory,
        Command::CreateSort {
            name: "ℕ".to_string(),
            kind: "inductive".to_string(),
            atom_prefix: None,
            is_binder: false,
        },
    );
    let nat = SortId(id_of(&reply));

    let reply = apply_command(
        &mut theory,
        Command::CreateConstructor {
            sort: nat.clone(),
            name: "Z".to_string(),
            args: vec![],
        },
    );
    let zero = CtorId(id_of(&reply));

    let reply = apply_command(
        &mut theory,
        Command::CreateConstructor {
            sort: nat.clone(),
            name: "S".to_string(),
            args: vec![ArgSpec {
                sort: nat.clone(),
                label: Some("n".to_string()),
                is_binder: false,
                binds_in: vec![],
            }],
        },
    );
    let succ = CtorId(id_of(&reply));

    let reply = apply_command(
        &mut theory,
        Command::CreateJudgment {
            name: "even".to_string(),
            symbol: "even".to_string(),
            args: vec![JudgmentArgSpec {
                sort: nat.clone(),
                label: None,
            }],
            separators: vec![String::new(), " even".to_string()],
        },
    );
    let even = JudgmentId(id_of(&reply));

    let reply = apply_command(
        &mut theory,
        Command::CreateMetaVariable {
            name: "n".to_string(),
            sort: nat.clone(),
        },
    );
    let mv = MetaVarId(id_of(&reply));

    let reply = apply_command(
        &mut theory,
        Command::CreateRule {
            name: "E-Zero".to_string(),
            judgment: even.clone(),
        },
    );
    let rule = id_of(&reply);
    let reply = apply_command(
        &mut theory,
        Command::UpdateRule {
            id: kernel::RuleId(rule),
            name: None,
            conclusion_args: Some(vec![Pattern::Ctor {
                ctor: zero.clone(),
                args: vec![],
            }]),
        },
    );
    assert_eq!(reply["ok"], Value::Bool(true));

    let z = Term::Ctor {
        ctor: zero.clone(),
        args: vec![],
    };
    let reply = apply_command(
        &mut theory,
        Command::Derive {
            judgment: even.clone(),
            terms: vec![z.clone()],
        },
    );
    assert_eq!(reply["ok"]["rendered"], "E-Zero");

    let one = Term::Ctor {
        ctor: succ.clone(),
        args: vec![Rc::new(z.clone())],
    };
    let reply = apply_command(
        &mut theory,
        Command::Derive {
            judgment: even.clone(),
            terms: vec![one.clone()],
        },
    );
    assert!(
        reply["error"]["message"]
            .as_str()
            .expect("error message")
            .contains("no derivation"),
        "{}",
        reply
    );

    // Pattern queries go through the same surface.
    let reply = apply_command(
        &mut theory,
        Command::MatchPattern {
            term: one,
            pattern: Pattern::Ctor {
                ctor: succ.clone(),
                args: vec![Pattern::MetaVar(mv.clone())],
            },
        },
    );
    assert_eq!(reply["ok"]["matched"], Value::Bool(true));

    let reply = apply_command(
        &mut theory,
        Command::RenderTerm {
            term: Term::Ctor {
                ctor: succ,
                args: vec![Rc::new(Term::Ctor {
                    ctor: zero,
                    args: vec![],
                })],
            },
        },
    );
    assert_eq!(reply["ok"]["rendered"], "S(Z)");
}

#[test]
fn run_script_replies_per_line_and_emits_the_post_state() {
    let create_nat = serde_json::to_string(&Command::CreateSort {
        name: "ℕ".to_string(),
        kind: "inductive".to_string(),
        atom_prefix: None,
        is_binder: false,
    })
    .expect("serialize");
    let create_names = serde_json::to_string(&Command::CreateSort {
        name: "Name".to_string(),
        kind: "atom".to_string(),
        atom_prefix: Some("x".to_string()),
        is_binder: true,
    })
    .expect("serialize");
    let script = format!(
        "# a comment and a blank line are skipped\n\n{}\nthis is not json\n{}\n",
        create_nat, create_names
    );

    let output = run_script(&script);
    let lines: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).expect("each reply is JSON"))
        .collect();
    assert_eq!(lines.len(), 4, "two replies, one parse error, one state");
    assert!(lines[0]["ok"]["id"].is_string());
    assert_eq!(lines[1]["error"]["kind"], "parse");
    assert!(lines[2]["ok"]["id"].is_string());

    let state = &lines[3]["state"];
    assert_eq!(
        state["sorts"].as_object().expect("sorts map").len(),
        2,
        "both sorts are in the post-state"
    );
    // The post-state deserializes back into a theory.
    let theory: Theory = serde_json::from_value(state.clone()).expect("state round-trips");
    assert_eq!(theory.sorts().count(), 2);
}
