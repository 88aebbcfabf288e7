//! The headless driver: one JSON command per input line, one JSON reply
//! per line, and the serialized post-state at end of stream.
//!
//! Command errors are data, not process failures — every line gets a
//! reply and the driver keeps going.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::rc::Rc;

use kernel::formula::Formula;
use kernel::proof::Tactic;
use kernel::theory::{CtorArgSpec, Theory};
use kernel::{
    render_derivation, render_formula, render_func_expr, render_term, CondId, CtorId, Error,
    FuncExpr, FuncId, FuncReturnType, FuncValue, GoalId, InstanceId, JudgmentId, MetaVarId,
    Pattern, ProofId, PropertyId, RuleId, SideTest, SortId, SortKind, Term,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpec {
    pub sort: SortId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_binder: bool,
    #[serde(default)]
    pub binds_in: Vec<usize>,
}

impl From<ArgSpec> for CtorArgSpec {
    fn from(spec: ArgSpec) -> CtorArgSpec {
        CtorArgSpec {
            sort: spec.sort,
            label: spec.label,
            is_binder: spec.is_binder,
            binds_in: spec.binds_in,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentArgSpec {
    pub sort: SortId,
    #[serde(default)]
    pub label: Option<String>,
}

/// The wire format of the command surface. Tagged by `cmd`, field names
/// in snake case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    CreateSort {
        name: String,
        kind: String,
        #[serde(default)]
        atom_prefix: Option<String>,
        #[serde(default)]
        is_binder: bool,
    },
    UpdateSort {
        id: SortId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        atom_prefix: Option<String>,
        #[serde(default)]
        is_binder: Option<bool>,
    },
    DeleteSort {
        id: SortId,
    },
    CreateConstructor {
        sort: SortId,
        name: String,
        #[serde(default)]
        args: Vec<ArgSpec>,
    },
    UpdateConstructor {
        id: CtorId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        args: Option<Vec<ArgSpec>>,
    },
    DeleteConstructor {
        id: CtorId,
    },
    CreateJudgment {
        name: String,
        symbol: String,
        args: Vec<JudgmentArgSpec>,
        separators: Vec<String>,
    },
    UpdateJudgment {
        id: JudgmentId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        symbol: Option<String>,
        #[serde(default)]
        args: Option<Vec<JudgmentArgSpec>>,
        #[serde(default)]
        separators: Option<Vec<String>>,
    },
    DeleteJudgment {
        id: JudgmentId,
    },
    CreateMetaVariable {
        name: String,
        sort: SortId,
    },
    DeleteMetaVariable {
        id: MetaVarId,
    },
    CreateRule {
        name: String,
        judgment: JudgmentId,
    },
    UpdateRule {
        id: RuleId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        conclusion_args: Option<Vec<Pattern>>,
    },
    UpdateRulePosition {
        id: RuleId,
        x: f64,
        y: f64,
    },
    DeleteRule {
        id: RuleId,
    },
    AddPremise {
        rule: RuleId,
        judgment: JudgmentId,
        args: Vec<Pattern>,
    },
    RemovePremise {
        rule: RuleId,
        premise: InstanceId,
    },
    AddSideCondition {
        rule: RuleId,
        func: FuncId,
        arg: Pattern,
        test: SideTest,
    },
    UpdateSideCondition {
        rule: RuleId,
        condition: CondId,
        func: FuncId,
        arg: Pattern,
        test: SideTest,
    },
    RemoveSideCondition {
        rule: RuleId,
        condition: CondId,
    },
    CreateFunction {
        name: String,
        principal_sort: SortId,
        #[serde(default)]
        extra_args: Vec<(String, SortId)>,
        return_type: FuncReturnType,
    },
    UpdateFunction {
        id: FuncId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        extra_args: Option<Vec<(String, SortId)>>,
        #[serde(default)]
        return_type: Option<FuncReturnType>,
    },
    UpdateFuncCase {
        func: FuncId,
        ctor: CtorId,
        bound_vars: Vec<String>,
        body: FuncExpr,
    },
    DeleteFunction {
        id: FuncId,
    },
    CreateProperty {
        name: String,
        statement: Formula,
    },
    DeleteProperty {
        id: PropertyId,
    },
    StartProof {
        property: PropertyId,
    },
    ApplyTactic {
        proof: ProofId,
        goal: GoalId,
        tactic: Tactic,
    },
    DeleteProof {
        id: ProofId,
    },
    EnumerateTerms {
        sort: SortId,
        max_depth: usize,
    },
    MatchPattern {
        term: Term,
        pattern: Pattern,
    },
    Derive {
        judgment: JudgmentId,
        terms: Vec<Term>,
    },
    AnalyzeSyntaxDirected {
        judgment: JudgmentId,
    },
    EnumerateExamples {
        judgment: JudgmentId,
    },
    Evaluate {
        func: FuncId,
        term: Term,
        #[serde(default)]
        extra: Vec<FuncValue>,
    },
    CheckTermination {
        func: FuncId,
    },
    IsGoalTrivial {
        goal: Formula,
        #[serde(default)]
        hypotheses: Vec<Formula>,
    },
    RenderTerm {
        term: Term,
    },
    RenderFormula {
        formula: Formula,
    },
    RenderFuncExpr {
        expr: FuncExpr,
    },
    GenerateRandomTerm {
        sort: SortId,
        max_depth: usize,
        seed: u64,
    },
    ResetAtomCounter {
        #[serde(default)]
        sort: Option<SortId>,
    },
}

fn parse_sort_kind(kind: &str, atom_prefix: Option<String>) -> Result<SortKind, Error> {
    match kind {
        "inductive" => Ok(SortKind::Inductive),
        "atom" => Ok(SortKind::Atom {
            prefix: atom_prefix.unwrap_or_else(|| "x".to_string()),
        }),
        other => Err(Error::ShapeMismatch {
            context: "sort kind".to_string(),
            expected: "inductive or atom".to_string(),
            found: other.to_string(),
        }),
    }
}

fn ok(value: Value) -> Value {
    json!({ "ok": value })
}

fn err(error: Error) -> Value {
    json!({
        "error": {
            "kind": serde_json::to_value(&error).unwrap_or(Value::Null),
            "message": error.to_string(),
        }
    })
}

/// Apply one command and describe the outcome as a JSON value.
pub fn apply_command(theory: &mut Theory, command: Command) -> Value {
    match run_command(theory, command) {
        Ok(value) => ok(value),
        Err(e) => err(e),
    }
}

fn run_command(theory: &mut Theory, command: Command) -> Result<Value, Error> {
    match command {
        Command::CreateSort {
            name,
            kind,
            atom_prefix,
            is_binder,
        } => {
            let kind = parse_sort_kind(&kind, atom_prefix)?;
            let id = theory.create_sort(&name, kind, is_binder)?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateSort {
            id,
            name,
            kind,
            atom_prefix,
            is_binder,
        } => {
            let kind = match kind {
                Some(k) => Some(parse_sort_kind(&k, atom_prefix)?),
                None => None,
            };
            theory.update_sort(&id, name.as_deref(), kind, is_binder)?;
            Ok(Value::Bool(true))
        }
        Command::DeleteSort { id } => {
            theory.delete_sort(&id)?;
            Ok(Value::Bool(true))
        }
        Command::CreateConstructor { sort, name, args } => {
            let id = theory.create_constructor(
                &sort,
                &name,
                args.into_iter().map(Into::into).collect(),
            )?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateConstructor { id, name, args } => {
            theory.update_constructor(
                &id,
                name.as_deref(),
                args.map(|a| a.into_iter().map(Into::into).collect()),
            )?;
            Ok(Value::Bool(true))
        }
        Command::DeleteConstructor { id } => {
            theory.delete_constructor(&id)?;
            Ok(Value::Bool(true))
        }
        Command::CreateJudgment {
            name,
            symbol,
            args,
            separators,
        } => {
            let id = theory.create_judgment(
                &name,
                &symbol,
                args.into_iter().map(|a| (a.sort, a.label)).collect(),
                separators,
            )?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateJudgment {
            id,
            name,
            symbol,
            args,
            separators,
        } => {
            theory.update_judgment(
                &id,
                name.as_deref(),
                symbol.as_deref(),
                args.map(|a| a.into_iter().map(|a| (a.sort, a.label)).collect()),
                separators,
            )?;
            Ok(Value::Bool(true))
        }
        Command::DeleteJudgment { id } => {
            theory.delete_judgment(&id)?;
            Ok(Value::Bool(true))
        }
        Command::CreateMetaVariable { name, sort } => {
            let id = theory.create_metavar(&name, &sort)?;
            Ok(json!({ "id": id }))
        }
        Command::DeleteMetaVariable { id } => {
            theory.delete_metavar(&id)?;
            Ok(Value::Bool(true))
        }
        Command::CreateRule { name, judgment } => {
            let id = theory.create_rule(&name, &judgment)?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateRule {
            id,
            name,
            conclusion_args,
        } => {
            theory.update_rule(&id, name.as_deref(), conclusion_args)?;
            Ok(Value::Bool(true))
        }
        Command::UpdateRulePosition { id, x, y } => {
            theory.update_rule_position(&id, x, y)?;
            Ok(Value::Bool(true))
        }
        Command::DeleteRule { id } => {
            theory.delete_rule(&id)?;
            Ok(Value::Bool(true))
        }
        Command::AddPremise {
            rule,
            judgment,
            args,
        } => {
            let id = theory.add_premise(&rule, &judgment, args)?;
            Ok(json!({ "id": id }))
        }
        Command::RemovePremise { rule, premise } => {
            theory.remove_premise(&rule, &premise)?;
            Ok(Value::Bool(true))
        }
        Command::AddSideCondition {
            rule,
            func,
            arg,
            test,
        } => {
            let id = theory.add_side_condition(&rule, &func, arg, test)?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateSideCondition {
            rule,
            condition,
            func,
            arg,
            test,
        } => {
            theory.update_side_condition(&rule, &condition, &func, arg, test)?;
            Ok(Value::Bool(true))
        }
        Command::RemoveSideCondition { rule, condition } => {
            theory.remove_side_condition(&rule, &condition)?;
            Ok(Value::Bool(true))
        }
        Command::CreateFunction {
            name,
            principal_sort,
            extra_args,
            return_type,
        } => {
            let id = theory.create_function(&name, &principal_sort, extra_args, return_type)?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateFunction {
            id,
            name,
            extra_args,
            return_type,
        } => {
            theory.update_function(&id, name.as_deref(), extra_args, return_type)?;
            Ok(Value::Bool(true))
        }
        Command::UpdateFuncCase {
            func,
            ctor,
            bound_vars,
            body,
        } => {
            theory.update_func_case(&func, &ctor, bound_vars, body)?;
            let f = theory.func(&func)?;
            Ok(json!({
                "terminates": f.terminates,
                "termination_error": f.termination_error,
            }))
        }
        Command::DeleteFunction { id } => {
            theory.delete_function(&id)?;
            Ok(Value::Bool(true))
        }
        Command::CreateProperty { name, statement } => {
            let id = theory.create_property(&name, statement)?;
            Ok(json!({ "id": id }))
        }
        Command::DeleteProperty { id } => {
            theory.delete_property(&id)?;
            Ok(Value::Bool(true))
        }
        Command::StartProof { property } => {
            let id = theory.start_proof(&property)?;
            let proof = theory.proof(&id)?;
            Ok(json!({ "id": id, "root": proof.root }))
        }
        Command::ApplyTactic {
            proof,
            goal,
            tactic,
        } => {
            let produced = theory.apply_tactic(&proof, &goal, tactic)?;
            let status = theory.proof(&proof)?.status;
            Ok(json!({ "produced": produced, "status": status }))
        }
        Command::DeleteProof { id } => {
            theory.delete_proof(&id)?;
            Ok(Value::Bool(true))
        }
        Command::EnumerateTerms { sort, max_depth } => {
            let terms = theory.enumerate_terms(&sort, max_depth)?;
            let rendered: Vec<String> = terms.iter().map(|t| render_term(theory, t)).collect();
            Ok(json!({ "terms": terms, "rendered": rendered }))
        }
        Command::MatchPattern { term, pattern } => {
            let term = Rc::new(term);
            match kernel::match_pattern(&term, &pattern) {
                Some(bindings) => Ok(json!({ "matched": true, "bindings": bindings })),
                None => Ok(json!({ "matched": false })),
            }
        }
        Command::Derive { judgment, terms } => {
            let terms: Vec<Rc<Term>> = terms.into_iter().map(Rc::new).collect();
            let derivation = theory.derive(&judgment, &terms)?;
            Ok(json!({
                "derivation": derivation,
                "rendered": render_derivation(&derivation),
            }))
        }
        Command::AnalyzeSyntaxDirected { judgment } => {
            Ok(serde_json::to_value(theory.analyze_syntax_directed(&judgment)?)
                .unwrap_or(Value::Null))
        }
        Command::EnumerateExamples { judgment } => {
            Ok(serde_json::to_value(theory.enumerate_examples(&judgment)?).unwrap_or(Value::Null))
        }
        Command::Evaluate { func, term, extra } => {
            let value = theory.evaluate(&func, &Rc::new(term), &extra)?;
            Ok(json!({ "value": value }))
        }
        Command::CheckTermination { func } => {
            let f = theory.func(&func)?;
            Ok(json!({
                "terminates": f.terminates,
                "termination_error": f.termination_error,
            }))
        }
        Command::IsGoalTrivial { goal, hypotheses } => {
            Ok(json!({ "trivial": kernel::is_goal_trivial(&goal, &hypotheses) }))
        }
        Command::RenderTerm { term } => Ok(json!({ "rendered": render_term(theory, &term) })),
        Command::RenderFormula { formula } => {
            Ok(json!({ "rendered": render_formula(theory, &formula) }))
        }
        Command::RenderFuncExpr { expr } => {
            Ok(json!({ "rendered": render_func_expr(theory, &expr) }))
        }
        Command::GenerateRandomTerm {
            sort,
            max_depth,
            seed,
        } => {
            let term = theory.generate_random_term(&sort, max_depth, seed)?;
            Ok(json!({ "term": term, "rendered": render_term(theory, &term) }))
        }
        Command::ResetAtomCounter { sort } => {
            theory.reset_atom_counter(sort.as_ref());
            Ok(Value::Bool(true))
        }
    }
}

/// Run a full command script: one JSON command per line, blank lines and
/// `#` comments ignored. Returns one reply line per command plus a final
/// `{"state": …}` line.
pub fn run_script(input: &str) -> String {
    let mut theory = Theory::new();
    let mut out = Vec::new();
    for (lineno, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let reply = match serde_json::from_str::<Command>(line) {
            Ok(command) => {
                debug!("line {}: {:?}", lineno + 1, command);
                apply_command(&mut theory, command)
            }
            Err(e) => json!({
                "error": { "kind": "parse", "message": format!("line {}: {}", lineno + 1, e) }
            }),
        };
        out.push(reply.to_string());
    }
    let state = json!({ "state": theory });
    out.push(state.to_string());
    out.join("\n")
}
