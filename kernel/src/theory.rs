//! The registry: single owner of every entity, the command surface the
//! front end drives, and the referential-integrity cascades.
//!
//! Mutating commands validate first and only then touch the containers, so
//! a rejected command leaves the theory exactly as it was, and a deletion
//! cascade either completes entirely or does not start.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::ast::{
    ArgId, CondId, Constructor, ConstructorArg, CtorId, FuncCase, FuncExpr, FuncId, FuncPredicate,
    FuncReturnType, FuncValue, GoalId, InferenceRule, InstanceId, Judgment, JudgmentArg,
    JudgmentId, JudgmentInstance, MetaVarId, MetaVariable, Pattern, Property, PropertyId, ProofId,
    RecursiveFunc, RuleId, SideCondition, SideTest, Sort, SortId, SortKind, Term,
};
use crate::derivation::{self, Derivation, ExampleTable, SyntaxAnalysis};
use crate::error::{Error, Result};
use crate::formula::{Formula, FormulaExpr};
use crate::func;
use crate::pattern;
use crate::proof::{Proof, ProofGoal, ProofStatus, ProofStep, Tactic};
use crate::tactic;

/// Argument specification handed to `create_constructor`; `binds_in`
/// indexes sibling arguments by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorArgSpec {
    pub sort: SortId,
    pub label: Option<String>,
    pub is_binder: bool,
    pub binds_in: Vec<usize>,
}

/// The metamodel and all proof state. One of these per workbench session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Theory {
    next_id: u64,
    sorts: BTreeMap<SortId, Sort>,
    ctors: BTreeMap<CtorId, Constructor>,
    judgments: BTreeMap<JudgmentId, Judgment>,
    metavars: BTreeMap<MetaVarId, MetaVariable>,
    rules: BTreeMap<RuleId, InferenceRule>,
    funcs: BTreeMap<FuncId, RecursiveFunc>,
    properties: BTreeMap<PropertyId, Property>,
    proofs: BTreeMap<ProofId, Proof>,
    atom_counters: BTreeMap<SortId, u64>,
}

impl Theory {
    pub fn new() -> Theory {
        Theory::default()
    }

    fn bump_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn bump_atom_counter(&mut self, sort: &SortId) -> u64 {
        let counter = self.atom_counters.entry(sort.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn reset_atom_counter(&mut self, sort: Option<&SortId>) {
        match sort {
            Some(s) => {
                self.atom_counters.remove(s);
            }
            None => self.atom_counters.clear(),
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn sort(&self, id: &SortId) -> Result<&Sort> {
        self.sorts.get(id).ok_or_else(|| Error::not_found("sort", id))
    }

    pub fn ctor(&self, id: &CtorId) -> Result<&Constructor> {
        self.ctors
            .get(id)
            .ok_or_else(|| Error::not_found("constructor", id))
    }

    pub fn judgment(&self, id: &JudgmentId) -> Result<&Judgment> {
        self.judgments
            .get(id)
            .ok_or_else(|| Error::not_found("judgment", id))
    }

    pub fn metavar(&self, id: &MetaVarId) -> Result<&MetaVariable> {
        self.metavars
            .get(id)
            .ok_or_else(|| Error::not_found("meta-variable", id))
    }

    pub fn rule(&self, id: &RuleId) -> Result<&InferenceRule> {
        self.rules.get(id).ok_or_else(|| Error::not_found("rule", id))
    }

    pub fn func(&self, id: &FuncId) -> Result<&RecursiveFunc> {
        self.funcs
            .get(id)
            .ok_or_else(|| Error::not_found("function", id))
    }

    pub fn property(&self, id: &PropertyId) -> Result<&Property> {
        self.properties
            .get(id)
            .ok_or_else(|| Error::not_found("property", id))
    }

    pub fn proof(&self, id: &ProofId) -> Result<&Proof> {
        self.proofs
            .get(id)
            .ok_or_else(|| Error::not_found("proof", id))
    }

    pub fn sorts(&self) -> impl Iterator<Item = &Sort> {
        self.sorts.values()
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Constructor> {
        self.ctors.values()
    }

    pub fn judgments(&self) -> impl Iterator<Item = &Judgment> {
        self.judgments.values()
    }

    pub fn metavars(&self) -> impl Iterator<Item = &MetaVariable> {
        self.metavars.values()
    }

    pub fn rules(&self) -> impl Iterator<Item = &InferenceRule> {
        self.rules.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &RecursiveFunc> {
        self.funcs.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn proofs(&self) -> impl Iterator<Item = &Proof> {
        self.proofs.values()
    }

    /// Constructors of a sort in registration order (ids are minted from a
    /// monotone counter, so key order is creation order).
    pub fn constructors_of(&self, sort: &SortId) -> Vec<&Constructor> {
        self.ctors.values().filter(|c| &c.sort == sort).collect()
    }

    /// Rules concluding a judgment, in registration order.
    pub fn rules_for(&self, judgment: &JudgmentId) -> Vec<&InferenceRule> {
        self.rules
            .values()
            .filter(|r| &r.conclusion.judgment == judgment)
            .collect()
    }

    // ------------------------------------------------------------------
    // Sorts
    // ------------------------------------------------------------------

    pub fn create_sort(&mut self, name: &str, kind: SortKind, is_binder: bool) -> Result<SortId> {
        if name.is_empty() {
            return Err(Error::shape("sort", "a non-empty name", "an empty string"));
        }
        if let SortKind::Atom { prefix } = &kind {
            if prefix.is_empty() {
                return Err(Error::shape("sort", "a non-empty atom prefix", "an empty string"));
            }
        }
        let id = SortId::mint(self.bump_id());
        self.sorts.insert(
            id.clone(),
            Sort {
                id: id.clone(),
                name: name.to_string(),
                kind,
                is_binder,
            },
        );
        Ok(id)
    }

    pub fn update_sort(
        &mut self,
        id: &SortId,
        name: Option<&str>,
        kind: Option<SortKind>,
        is_binder: Option<bool>,
    ) -> Result<()> {
        let current = self.sort(id)?;
        if let Some(new_kind) = &kind {
            let switching = std::mem::discriminant(new_kind) != std::mem::discriminant(&current.kind);
            if switching && !self.constructors_of(id).is_empty() {
                return Err(Error::shape(
                    "sort update",
                    "no constructors before changing the kind",
                    format!("{} constructors", self.constructors_of(id).len()),
                ));
            }
            if switching
                && matches!(new_kind, SortKind::Atom { .. })
                && self.funcs.values().any(|f| &f.principal_sort == id)
            {
                return Err(Error::shape(
                    "sort update",
                    "no functions over the sort before making it an atom sort",
                    "at least one function".to_string(),
                ));
            }
        }
        let sort = self.sorts.get_mut(id).ok_or_else(|| Error::not_found("sort", id))?;
        if let Some(n) = name {
            sort.name = n.to_string();
        }
        if let Some(k) = kind {
            sort.kind = k;
        }
        if let Some(b) = is_binder {
            sort.is_binder = b;
        }
        self.recompute_all_functions();
        Ok(())
    }

    pub fn delete_sort(&mut self, id: &SortId) -> Result<()> {
        self.sort(id)?;
        let mut cascade = Cascade::default();
        cascade.sorts.insert(id.clone());
        self.apply_cascade(cascade);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn create_constructor(
        &mut self,
        sort: &SortId,
        name: &str,
        args: Vec<CtorArgSpec>,
    ) -> Result<CtorId> {
        let s = self.sort(sort)?;
        if s.is_atom() {
            return Err(Error::shape(
                "constructor",
                "an inductive sort",
                format!("atom sort {}", s.name),
            ));
        }
        for spec in &args {
            self.sort(&spec.sort)?;
            for &target in &spec.binds_in {
                if target >= args.len() {
                    return Err(Error::shape(
                        "constructor",
                        format!("binds_in indices below {}", args.len()),
                        format!("{}", target),
                    ));
                }
            }
        }
        let id = CtorId::mint(self.bump_id());
        let arg_ids: Vec<ArgId> = args.iter().map(|_| ArgId::mint(self.bump_id())).collect();
        let args: Vec<ConstructorArg> = args
            .into_iter()
            .zip(&arg_ids)
            .map(|(spec, arg_id)| ConstructorArg {
                id: arg_id.clone(),
                sort: spec.sort,
                label: spec.label,
                is_binder: spec.is_binder,
                binds_in: spec.binds_in.iter().map(|&i| arg_ids[i].clone()).collect(),
            })
            .collect();
        let ctor = Constructor {
            id: id.clone(),
            sort: sort.clone(),
            name: name.to_string(),
            args,
        };
        self.ctors.insert(id.clone(), ctor);
        self.stub_cases_for_new_ctor(&id);
        self.recompute_all_functions();
        Ok(id)
    }

    pub fn update_constructor(
        &mut self,
        id: &CtorId,
        name: Option<&str>,
        args: Option<Vec<CtorArgSpec>>,
    ) -> Result<()> {
        self.ctor(id)?;
        if let Some(specs) = &args {
            for spec in specs {
                self.sort(&spec.sort)?;
                for &target in &spec.binds_in {
                    if target >= specs.len() {
                        return Err(Error::shape(
                            "constructor update",
                            format!("binds_in indices below {}", specs.len()),
                            format!("{}", target),
                        ));
                    }
                }
            }
        }
        if let Some(n) = name {
            let ctor = self.ctors.get_mut(id).ok_or_else(|| Error::not_found("constructor", id))?;
            ctor.name = n.to_string();
        }
        if let Some(specs) = args {
            let arg_ids: Vec<ArgId> = specs.iter().map(|_| ArgId::mint(self.bump_id())).collect();
            let new_args: Vec<ConstructorArg> = specs
                .into_iter()
                .zip(&arg_ids)
                .map(|(spec, arg_id)| ConstructorArg {
                    id: arg_id.clone(),
                    sort: spec.sort,
                    label: spec.label,
                    is_binder: spec.is_binder,
                    binds_in: spec.binds_in.iter().map(|&i| arg_ids[i].clone()).collect(),
                })
                .collect();
            let ctor = self.ctors.get_mut(id).ok_or_else(|| Error::not_found("constructor", id))?;
            ctor.args = new_args;
            // Cases over this constructor are re-stubbed: their old bound
            // variables no longer line up with the new argument list.
            self.restub_cases_for_ctor(id);
        }
        self.recompute_all_functions();
        Ok(())
    }

    pub fn delete_constructor(&mut self, id: &CtorId) -> Result<()> {
        self.ctor(id)?;
        let mut cascade = Cascade::default();
        cascade.ctors.insert(id.clone());
        self.apply_cascade(cascade);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Judgments
    // ------------------------------------------------------------------

    pub fn create_judgment(
        &mut self,
        name: &str,
        symbol: &str,
        arg_sorts: Vec<(SortId, Option<String>)>,
        separators: Vec<String>,
    ) -> Result<JudgmentId> {
        if separators.len() != arg_sorts.len() + 1 {
            return Err(Error::shape(
                "judgment",
                format!("{} separators", arg_sorts.len() + 1),
                format!("{}", separators.len()),
            ));
        }
        for (sort, _) in &arg_sorts {
            self.sort(sort)?;
        }
        let id = JudgmentId::mint(self.bump_id());
        self.judgments.insert(
            id.clone(),
            Judgment {
                id: id.clone(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                arg_sorts: arg_sorts
                    .into_iter()
                    .map(|(sort, label)| JudgmentArg { sort, label })
                    .collect(),
                separators,
            },
        );
        Ok(id)
    }

    pub fn update_judgment(
        &mut self,
        id: &JudgmentId,
        name: Option<&str>,
        symbol: Option<&str>,
        arg_sorts: Option<Vec<(SortId, Option<String>)>>,
        separators: Option<Vec<String>>,
    ) -> Result<()> {
        let current = self.judgment(id)?;
        let arg_len = arg_sorts
            .as_ref()
            .map(|a| a.len())
            .unwrap_or(current.arg_sorts.len());
        let sep_len = separators
            .as_ref()
            .map(|s| s.len())
            .unwrap_or(current.separators.len());
        if sep_len != arg_len + 1 {
            return Err(Error::shape(
                "judgment update",
                format!("{} separators", arg_len + 1),
                format!("{}", sep_len),
            ));
        }
        if let Some(new_args) = &arg_sorts {
            let referenced = self
                .rules
                .values()
                .any(|r| &r.conclusion.judgment == id || r.premises.iter().any(|p| &p.judgment == id));
            if referenced {
                return Err(Error::shape(
                    "judgment update",
                    "no rules referencing the judgment before changing its arguments",
                    "at least one rule".to_string(),
                ));
            }
            for (sort, _) in new_args {
                self.sort(sort)?;
            }
        }
        let judgment = self
            .judgments
            .get_mut(id)
            .ok_or_else(|| Error::not_found("judgment", id))?;
        if let Some(n) = name {
            judgment.name = n.to_string();
        }
        if let Some(s) = symbol {
            judgment.symbol = s.to_string();
        }
        if let Some(args) = arg_sorts {
            judgment.arg_sorts = args
                .into_iter()
                .map(|(sort, label)| JudgmentArg { sort, label })
                .collect();
        }
        if let Some(seps) = separators {
            judgment.separators = seps;
        }
        Ok(())
    }

    pub fn delete_judgment(&mut self, id: &JudgmentId) -> Result<()> {
        self.judgment(id)?;
        let mut cascade = Cascade::default();
        cascade.judgments.insert(id.clone());
        self.apply_cascade(cascade);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Meta-variables
    // ------------------------------------------------------------------

    pub fn create_metavar(&mut self, name: &str, sort: &SortId) -> Result<MetaVarId> {
        self.sort(sort)?;
        let id = MetaVarId::mint(self.bump_id());
        self.metavars.insert(
            id.clone(),
            MetaVariable {
                id: id.clone(),
                name: name.to_string(),
                sort: sort.clone(),
            },
        );
        Ok(id)
    }

    /// Deleting a meta-variable turns its pattern leaves into holes; the
    /// holding rules stay and are flagged by the completeness check.
    pub fn delete_metavar(&mut self, id: &MetaVarId) -> Result<()> {
        self.metavar(id)?;
        self.metavars.remove(id);
        let gone: BTreeSet<MetaVarId> = std::iter::once(id.clone()).collect();
        for rule in self.rules.values_mut() {
            erase_metavars_in_rule(rule, &gone);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// A new rule concludes the judgment with all-hole patterns; the
    /// editor fills them in through `update_rule`.
    pub fn create_rule(&mut self, name: &str, judgment: &JudgmentId) -> Result<RuleId> {
        let arity = self.judgment(judgment)?.arg_sorts.len();
        let id = RuleId::mint(self.bump_id());
        let conclusion = JudgmentInstance {
            id: InstanceId::mint(self.bump_id()),
            judgment: judgment.clone(),
            args: vec![Pattern::Hole; arity],
        };
        self.rules.insert(
            id.clone(),
            InferenceRule {
                id: id.clone(),
                name: name.to_string(),
                premises: Vec::new(),
                side_conditions: Vec::new(),
                conclusion,
                position: (0.0, 0.0),
            },
        );
        Ok(id)
    }

    pub fn update_rule(
        &mut self,
        id: &RuleId,
        name: Option<&str>,
        conclusion_args: Option<Vec<Pattern>>,
    ) -> Result<()> {
        let rule = self.rule(id)?;
        if let Some(args) = &conclusion_args {
            let judgment = self.judgment(&rule.conclusion.judgment)?;
            if args.len() != judgment.arg_sorts.len() {
                return Err(Error::shape(
                    "rule conclusion",
                    format!("{} argument patterns", judgment.arg_sorts.len()),
                    format!("{}", args.len()),
                ));
            }
            for (arg, pat) in judgment.arg_sorts.iter().zip(args) {
                pattern::validate_pattern(self, &arg.sort, pat)?;
            }
        }
        let rule = self.rules.get_mut(id).ok_or_else(|| Error::not_found("rule", id))?;
        if let Some(n) = name {
            rule.name = n.to_string();
        }
        if let Some(args) = conclusion_args {
            rule.conclusion.args = args;
        }
        Ok(())
    }

    pub fn update_rule_position(&mut self, id: &RuleId, x: f64, y: f64) -> Result<()> {
        let rule = self.rules.get_mut(id).ok_or_else(|| Error::not_found("rule", id))?;
        rule.position = (x, y);
        Ok(())
    }

    pub fn delete_rule(&mut self, id: &RuleId) -> Result<()> {
        self.rule(id)?;
        self.rules.remove(id);
        Ok(())
    }

    pub fn add_premise(
        &mut self,
        rule: &RuleId,
        judgment: &JudgmentId,
        args: Vec<Pattern>,
    ) -> Result<InstanceId> {
        self.rule(rule)?;
        let j = self.judgment(judgment)?;
        if args.len() != j.arg_sorts.len() {
            return Err(Error::shape(
                "premise",
                format!("{} argument patterns for {}", j.arg_sorts.len(), j.name),
                format!("{}", args.len()),
            ));
        }
        for (arg, pat) in j.arg_sorts.iter().zip(&args) {
            pattern::validate_pattern(self, &arg.sort, pat)?;
        }
        let id = InstanceId::mint(self.bump_id());
        let instance = JudgmentInstance {
            id: id.clone(),
            judgment: judgment.clone(),
            args,
        };
        let rule = self.rules.get_mut(rule).ok_or_else(|| Error::not_found("rule", rule))?;
        rule.premises.push(instance);
        Ok(id)
    }

    pub fn remove_premise(&mut self, rule: &RuleId, premise: &InstanceId) -> Result<()> {
        let r = self.rules.get_mut(rule).ok_or_else(|| Error::not_found("rule", rule))?;
        let before = r.premises.len();
        r.premises.retain(|p| &p.id != premise);
        if r.premises.len() == before {
            return Err(Error::not_found("premise", premise));
        }
        Ok(())
    }

    pub fn add_side_condition(
        &mut self,
        rule: &RuleId,
        func: &FuncId,
        arg: Pattern,
        test: SideTest,
    ) -> Result<CondId> {
        self.rule(rule)?;
        self.validate_side_condition(func, &arg, &test)?;
        let id = CondId::mint(self.bump_id());
        let cond = SideCondition {
            id: id.clone(),
            func: func.clone(),
            arg,
            test,
        };
        let r = self.rules.get_mut(rule).ok_or_else(|| Error::not_found("rule", rule))?;
        r.side_conditions.push(cond);
        Ok(id)
    }

    pub fn update_side_condition(
        &mut self,
        rule: &RuleId,
        cond: &CondId,
        func: &FuncId,
        arg: Pattern,
        test: SideTest,
    ) -> Result<()> {
        self.rule(rule)?;
        self.validate_side_condition(func, &arg, &test)?;
        let r = self.rules.get_mut(rule).ok_or_else(|| Error::not_found("rule", rule))?;
        let slot = r
            .side_conditions
            .iter_mut()
            .find(|c| &c.id == cond)
            .ok_or_else(|| Error::not_found("side condition", cond))?;
        slot.func = func.clone();
        slot.arg = arg;
        slot.test = test;
        Ok(())
    }

    pub fn remove_side_condition(&mut self, rule: &RuleId, cond: &CondId) -> Result<()> {
        let r = self.rules.get_mut(rule).ok_or_else(|| Error::not_found("rule", rule))?;
        let before = r.side_conditions.len();
        r.side_conditions.retain(|c| &c.id != cond);
        if r.side_conditions.len() == before {
            return Err(Error::not_found("side condition", cond));
        }
        Ok(())
    }

    fn validate_side_condition(&self, func: &FuncId, arg: &Pattern, test: &SideTest) -> Result<()> {
        let f = self.func(func)?;
        if !f.extra_args.is_empty() {
            return Err(Error::shape(
                "side condition",
                "a single-argument function",
                format!("{} with {} extra arguments", f.name, f.extra_args.len()),
            ));
        }
        pattern::validate_pattern(self, &f.principal_sort, arg)?;
        match test {
            SideTest::Eq(_)
            | SideTest::Neq(_)
            | SideTest::Lt(_)
            | SideTest::Leq(_)
            | SideTest::Gt(_)
            | SideTest::Geq(_) => {
                if f.return_type != FuncReturnType::Int {
                    return Err(Error::shape(
                        "side condition",
                        "an integer-valued function",
                        f.name.clone(),
                    ));
                }
            }
            SideTest::IsEmpty | SideTest::NotEmpty => {
                if !matches!(f.return_type, FuncReturnType::Set { .. }) {
                    return Err(Error::shape(
                        "side condition",
                        "a set-valued function",
                        f.name.clone(),
                    ));
                }
            }
            SideTest::In(element) | SideTest::NotIn(element) => match &f.return_type {
                FuncReturnType::Set { element_sort } => {
                    pattern::validate_pattern(self, element_sort, element)?;
                }
                _ => {
                    return Err(Error::shape(
                        "side condition",
                        "a set-valued function",
                        f.name.clone(),
                    ))
                }
            },
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Create a function with one stub case per constructor of the
    /// principal sort. Bodies start as the return type's neutral value and
    /// are filled in with `update_func_case`.
    pub fn create_function(
        &mut self,
        name: &str,
        principal_sort: &SortId,
        extra_args: Vec<(String, SortId)>,
        return_type: FuncReturnType,
    ) -> Result<FuncId> {
        let s = self.sort(principal_sort)?;
        if s.is_atom() {
            return Err(Error::shape(
                "function",
                "an inductive principal sort",
                format!("atom sort {}", s.name),
            ));
        }
        for (_, sort) in &extra_args {
            self.sort(sort)?;
        }
        let id = FuncId::mint(self.bump_id());
        let cases = self
            .constructors_of(principal_sort)
            .into_iter()
            .map(|ctor| self.stub_case(ctor, &return_type))
            .collect();
        let mut func = RecursiveFunc {
            id: id.clone(),
            name: name.to_string(),
            principal_sort: principal_sort.clone(),
            extra_args,
            return_type,
            cases,
            terminates: false,
            termination_error: None,
        };
        self.store_termination(&mut func);
        self.funcs.insert(id.clone(), func);
        Ok(id)
    }

    pub fn update_function(
        &mut self,
        id: &FuncId,
        name: Option<&str>,
        extra_args: Option<Vec<(String, SortId)>>,
        return_type: Option<FuncReturnType>,
    ) -> Result<()> {
        self.func(id)?;
        if let Some(extra) = &extra_args {
            for (_, sort) in extra {
                self.sort(sort)?;
            }
        }
        {
            let func = self.funcs.get_mut(id).ok_or_else(|| Error::not_found("function", id))?;
            if let Some(n) = name {
                func.name = n.to_string();
            }
            if let Some(extra) = extra_args {
                func.extra_args = extra;
            }
            if let Some(ret) = return_type {
                func.return_type = ret;
            }
        }
        self.recompute_function(id);
        Ok(())
    }

    pub fn update_func_case(
        &mut self,
        id: &FuncId,
        ctor: &CtorId,
        bound_vars: Vec<String>,
        body: FuncExpr,
    ) -> Result<()> {
        let func = self.func(id)?;
        let c = self.ctor(ctor)?;
        if c.sort != func.principal_sort {
            return Err(Error::shape(
                "function case",
                format!("a constructor of {}", func.principal_sort),
                format!("{} of {}", c.name, c.sort),
            ));
        }
        if bound_vars.len() != c.args.len() {
            return Err(Error::shape(
                "function case",
                format!("{} bound variables for {}", c.args.len(), c.name),
                format!("{}", bound_vars.len()),
            ));
        }
        let mut known: BTreeSet<String> = bound_vars.iter().cloned().collect();
        known.extend(func.extra_args.iter().map(|(n, _)| n.clone()));
        self.validate_func_expr(&body, &known)?;
        let func = self.funcs.get_mut(id).ok_or_else(|| Error::not_found("function", id))?;
        let case = func
            .cases
            .iter_mut()
            .find(|case| &case.ctor == ctor)
            .ok_or_else(|| Error::not_found("function case", ctor))?;
        case.bound_vars = bound_vars;
        case.body = body;
        self.recompute_function(id);
        Ok(())
    }

    pub fn delete_function(&mut self, id: &FuncId) -> Result<()> {
        self.func(id)?;
        let mut cascade = Cascade::default();
        cascade.funcs.insert(id.clone());
        self.apply_cascade(cascade);
        Ok(())
    }

    fn validate_func_expr(&self, expr: &FuncExpr, known: &BTreeSet<String>) -> Result<()> {
        match expr {
            FuncExpr::Int(_) | FuncExpr::EmptySet => Ok(()),
            FuncExpr::Var(name) => {
                if known.contains(name) {
                    Ok(())
                } else {
                    Err(Error::shape(
                        "function body",
                        "a bound variable or extra argument",
                        name.clone(),
                    ))
                }
            }
            FuncExpr::Singleton(e) => self.validate_func_expr(e, known),
            FuncExpr::Call { func, args } => {
                let f = self.func(func)?;
                if args.len() != f.arity() {
                    return Err(Error::shape(
                        "function body",
                        format!("{} arguments to {}", f.arity(), f.name),
                        format!("{}", args.len()),
                    ));
                }
                for a in args {
                    self.validate_func_expr(a, known)?;
                }
                Ok(())
            }
            FuncExpr::Ctor { ctor, args } => {
                let c = self.ctor(ctor)?;
                if args.len() != c.args.len() {
                    return Err(Error::shape(
                        "function body",
                        format!("{} arguments to {}", c.args.len(), c.name),
                        format!("{}", args.len()),
                    ));
                }
                for a in args {
                    self.validate_func_expr(a, known)?;
                }
                Ok(())
            }
            FuncExpr::Binop { lhs, rhs, .. } => {
                self.validate_func_expr(lhs, known)?;
                self.validate_func_expr(rhs, known)
            }
            FuncExpr::If { cond, then, els } => {
                self.validate_func_pred(cond, known)?;
                self.validate_func_expr(then, known)?;
                self.validate_func_expr(els, known)
            }
        }
    }

    fn validate_func_pred(&self, pred: &FuncPredicate, known: &BTreeSet<String>) -> Result<()> {
        match pred {
            FuncPredicate::Cmp { lhs, rhs, .. }
            | FuncPredicate::AtomEq(lhs, rhs)
            | FuncPredicate::AtomNeq(lhs, rhs) => {
                self.validate_func_expr(lhs, known)?;
                self.validate_func_expr(rhs, known)
            }
            FuncPredicate::In { element, set } => {
                self.validate_func_expr(element, known)?;
                self.validate_func_expr(set, known)
            }
            FuncPredicate::IsEmpty(e) => self.validate_func_expr(e, known),
            FuncPredicate::And(a, b) | FuncPredicate::Or(a, b) => {
                self.validate_func_pred(a, known)?;
                self.validate_func_pred(b, known)
            }
            FuncPredicate::Not(p) => self.validate_func_pred(p, known),
        }
    }

    fn stub_case(&self, ctor: &Constructor, return_type: &FuncReturnType) -> FuncCase {
        let mut taken = BTreeSet::new();
        let bound_vars = ctor
            .args
            .iter()
            .map(|arg| {
                let base = arg.label.clone().unwrap_or_else(|| {
                    self.sorts
                        .get(&arg.sort)
                        .and_then(|s| s.name.chars().next())
                        .map(|c| c.to_lowercase().to_string())
                        .unwrap_or_else(|| "x".to_string())
                });
                let mut name = base.clone();
                let mut k = 1;
                while taken.contains(&name) {
                    name = format!("{}{}", base, k);
                    k += 1;
                }
                taken.insert(name.clone());
                name
            })
            .collect();
        let body = match return_type {
            FuncReturnType::Int => FuncExpr::Int(0),
            FuncReturnType::Set { .. } => FuncExpr::EmptySet,
            FuncReturnType::Inductive { sort } => self
                .constructors_of(sort)
                .into_iter()
                .find(|c| c.args.is_empty())
                .map(|c| FuncExpr::Ctor {
                    ctor: c.id.clone(),
                    args: vec![],
                })
                .unwrap_or(FuncExpr::Int(0)),
        };
        FuncCase {
            ctor: ctor.id.clone(),
            bound_vars,
            body,
        }
    }

    fn stub_cases_for_new_ctor(&mut self, ctor: &CtorId) {
        let Some(c) = self.ctors.get(ctor).cloned() else {
            return;
        };
        let affected: Vec<FuncId> = self
            .funcs
            .values()
            .filter(|f| f.principal_sort == c.sort && f.case_for(ctor).is_none())
            .map(|f| f.id.clone())
            .collect();
        for id in affected {
            let stub = {
                let f = &self.funcs[&id];
                self.stub_case(&c, &f.return_type)
            };
            if let Some(f) = self.funcs.get_mut(&id) {
                f.cases.push(stub);
            }
        }
    }

    fn restub_cases_for_ctor(&mut self, ctor: &CtorId) {
        let Some(c) = self.ctors.get(ctor).cloned() else {
            return;
        };
        let affected: Vec<FuncId> = self
            .funcs
            .values()
            .filter(|f| f.case_for(ctor).is_some())
            .map(|f| f.id.clone())
            .collect();
        for id in affected {
            let stub = {
                let f = &self.funcs[&id];
                self.stub_case(&c, &f.return_type)
            };
            if let Some(f) = self.funcs.get_mut(&id) {
                if let Some(slot) = f.cases.iter_mut().find(|case| &case.ctor == ctor) {
                    *slot = stub;
                }
            }
        }
    }

    fn store_termination(&self, func: &mut RecursiveFunc) {
        match func::check_termination(self, func) {
            Ok(()) => {
                func.terminates = true;
                func.termination_error = None;
            }
            Err(e) => {
                func.terminates = false;
                func.termination_error = Some(e.to_string());
            }
        }
    }

    fn recompute_function(&mut self, id: &FuncId) {
        if let Some(mut func) = self.funcs.get(id).cloned() {
            self.store_termination(&mut func);
            self.funcs.insert(id.clone(), func);
        }
    }

    fn recompute_all_functions(&mut self) {
        let ids: Vec<FuncId> = self.funcs.keys().cloned().collect();
        for id in ids {
            self.recompute_function(&id);
        }
    }

    // ------------------------------------------------------------------
    // Properties and proofs
    // ------------------------------------------------------------------

    pub fn create_property(&mut self, name: &str, statement: Formula) -> Result<PropertyId> {
        self.validate_formula(&statement)?;
        let id = PropertyId::mint(self.bump_id());
        self.properties.insert(
            id.clone(),
            Property {
                id: id.clone(),
                name: name.to_string(),
                statement,
            },
        );
        Ok(id)
    }

    pub fn delete_property(&mut self, id: &PropertyId) -> Result<()> {
        self.property(id)?;
        self.properties.remove(id);
        self.proofs.retain(|_, p| &p.property != id);
        Ok(())
    }

    /// Start (or restart) the proof of a property: one root goal holding
    /// the statement with an empty context.
    pub fn start_proof(&mut self, property: &PropertyId) -> Result<ProofId> {
        let statement = self.property(property)?.statement.clone();
        self.proofs.retain(|_, p| &p.property != property);
        let proof_id = ProofId::mint(self.bump_id());
        let goal_id = GoalId::mint(self.bump_id());
        let root = ProofGoal {
            id: goal_id.clone(),
            variables: Vec::new(),
            hypotheses: Vec::new(),
            goal: statement,
        };
        let mut goals = BTreeMap::new();
        goals.insert(goal_id.clone(), root);
        self.proofs.insert(
            proof_id.clone(),
            Proof {
                id: proof_id.clone(),
                property: property.clone(),
                goals,
                root: goal_id.clone(),
                open_goals: vec![goal_id],
                steps: Vec::new(),
                status: ProofStatus::Incomplete,
            },
        );
        Ok(proof_id)
    }

    /// Apply a tactic to an open goal. On success the goal leaves the
    /// frontier, the produced goals join it in order, and a step is
    /// logged; on failure the proof is untouched.
    pub fn apply_tactic(
        &mut self,
        proof_id: &ProofId,
        goal_id: &GoalId,
        tactic: Tactic,
    ) -> Result<Vec<GoalId>> {
        let proof = self.proof(proof_id)?;
        if !proof.is_open(goal_id) {
            return Err(Error::tactic(
                tactic.name(),
                format!("goal {} is not open", goal_id),
            ));
        }
        let goal = proof
            .goals
            .get(goal_id)
            .cloned()
            .ok_or_else(|| Error::not_found("goal", goal_id))?;
        let produced = tactic::run_tactic(self, &goal, &tactic)?;
        debug!(
            "tactic {} on {}: {} new goals",
            tactic.name(),
            goal_id,
            produced.len()
        );
        let new_goals: Vec<ProofGoal> = produced
            .into_iter()
            .map(|g| ProofGoal {
                id: GoalId::mint(self.bump_id()),
                variables: g.variables,
                hypotheses: g.hypotheses,
                goal: g.goal,
            })
            .collect();
        let ids: Vec<GoalId> = new_goals.iter().map(|g| g.id.clone()).collect();
        let proof = self
            .proofs
            .get_mut(proof_id)
            .ok_or_else(|| Error::not_found("proof", proof_id))?;
        proof.open_goals.retain(|g| g != goal_id);
        for g in new_goals {
            proof.open_goals.push(g.id.clone());
            proof.goals.insert(g.id.clone(), g);
        }
        proof.steps.push(ProofStep {
            goal: goal_id.clone(),
            tactic,
            produced: ids.clone(),
        });
        proof.status = if proof.open_goals.is_empty() {
            ProofStatus::Complete
        } else {
            ProofStatus::Incomplete
        };
        Ok(ids)
    }

    pub fn delete_proof(&mut self, id: &ProofId) -> Result<()> {
        self.proof(id)?;
        self.proofs.remove(id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn derive(&self, judgment: &JudgmentId, terms: &[Rc<Term>]) -> Result<Derivation> {
        derivation::derive(self, judgment, terms)
    }

    pub fn analyze_syntax_directed(&self, judgment: &JudgmentId) -> Result<SyntaxAnalysis> {
        derivation::analyze_syntax_directed(self, judgment)
    }

    pub fn enumerate_examples(&self, judgment: &JudgmentId) -> Result<ExampleTable> {
        derivation::enumerate_examples(self, judgment)
    }

    pub fn enumerate_terms(&self, sort: &SortId, max_depth: usize) -> Result<Vec<Rc<Term>>> {
        crate::term::enumerate_terms(self, sort, max_depth)
    }

    pub fn evaluate(
        &self,
        func: &FuncId,
        principal: &Rc<Term>,
        extra: &[FuncValue],
    ) -> Result<FuncValue> {
        func::evaluate(self, func, principal, extra)
    }

    pub fn rule_complete(&self, rule: &RuleId) -> Result<bool> {
        Ok(pattern::is_rule_complete(self.rule(rule)?))
    }

    // ------------------------------------------------------------------
    // Formula validation
    // ------------------------------------------------------------------

    fn validate_formula(&self, formula: &Formula) -> Result<()> {
        match formula {
            Formula::True | Formula::False => Ok(()),
            Formula::Forall { sort, body, .. } | Formula::Exists { sort, body, .. } => {
                self.sort(sort)?;
                self.validate_formula(body)
            }
            Formula::Implies(l, r) | Formula::And(l, r) | Formula::Or(l, r) => {
                self.validate_formula(l)?;
                self.validate_formula(r)
            }
            Formula::Not(f) => self.validate_formula(f),
            Formula::Judgment { judgment, args } => {
                let j = self.judgment(judgment)?;
                if args.len() != j.arg_sorts.len() {
                    return Err(Error::shape(
                        "formula",
                        format!("{} arguments to {}", j.arg_sorts.len(), j.name),
                        format!("{}", args.len()),
                    ));
                }
                for a in args {
                    self.validate_formula_expr(a)?;
                }
                Ok(())
            }
            Formula::TermEq(l, r) | Formula::TermNeq(l, r) | Formula::SetEq(l, r) => {
                self.validate_formula_expr(l)?;
                self.validate_formula_expr(r)
            }
            Formula::Num { lhs, rhs, .. } => {
                self.validate_formula_expr(lhs)?;
                self.validate_formula_expr(rhs)
            }
            Formula::SetIn { element, set } => {
                self.validate_formula_expr(element)?;
                self.validate_formula_expr(set)
            }
        }
    }

    fn validate_formula_expr(&self, expr: &FormulaExpr) -> Result<()> {
        match expr {
            FormulaExpr::Var(_) | FormulaExpr::Int(_) | FormulaExpr::EmptySet => Ok(()),
            FormulaExpr::Ctor { ctor, args } => {
                let c = self.ctor(ctor)?;
                if args.len() != c.args.len() {
                    return Err(Error::shape(
                        "formula",
                        format!("{} arguments to {}", c.args.len(), c.name),
                        format!("{}", args.len()),
                    ));
                }
                for a in args {
                    self.validate_formula_expr(a)?;
                }
                Ok(())
            }
            FormulaExpr::FuncApp { func, args } => {
                let f = self.func(func)?;
                if args.len() != f.arity() {
                    return Err(Error::shape(
                        "formula",
                        format!("{} arguments to {}", f.arity(), f.name),
                        format!("{}", args.len()),
                    ));
                }
                for a in args {
                    self.validate_formula_expr(a)?;
                }
                Ok(())
            }
            FormulaExpr::Arith { lhs, rhs, .. } => {
                self.validate_formula_expr(lhs)?;
                self.validate_formula_expr(rhs)
            }
        }
    }

    // ------------------------------------------------------------------
    // Deletion cascades
    // ------------------------------------------------------------------

    /// Grow the deletion set to its transitive closure, then remove
    /// everything in one pass. Anything left afterwards references only
    /// live entities (meta-variable leaves degrade to holes).
    fn apply_cascade(&mut self, mut cascade: Cascade) {
        loop {
            let mut grew = false;

            for ctor in self.ctors.values() {
                if cascade.ctors.contains(&ctor.id) {
                    continue;
                }
                if cascade.sorts.contains(&ctor.sort)
                    || ctor.args.iter().any(|a| cascade.sorts.contains(&a.sort))
                {
                    cascade.ctors.insert(ctor.id.clone());
                    grew = true;
                }
            }
            for mv in self.metavars.values() {
                if !cascade.metavars.contains(&mv.id) && cascade.sorts.contains(&mv.sort) {
                    cascade.metavars.insert(mv.id.clone());
                    grew = true;
                }
            }
            for judgment in self.judgments.values() {
                if cascade.judgments.contains(&judgment.id) {
                    continue;
                }
                if judgment
                    .arg_sorts
                    .iter()
                    .any(|a| cascade.sorts.contains(&a.sort))
                {
                    cascade.judgments.insert(judgment.id.clone());
                    grew = true;
                }
            }
            for func in self.funcs.values() {
                if cascade.funcs.contains(&func.id) {
                    continue;
                }
                let signature_gone = cascade.sorts.contains(&func.principal_sort)
                    || func
                        .extra_args
                        .iter()
                        .any(|(_, s)| cascade.sorts.contains(s))
                    || match &func.return_type {
                        FuncReturnType::Int => false,
                        FuncReturnType::Set { element_sort } => {
                            cascade.sorts.contains(element_sort)
                        }
                        FuncReturnType::Inductive { sort } => cascade.sorts.contains(sort),
                    };
                let body_gone = func.cases.iter().any(|case| {
                    // A case whose constructor disappears is simply
                    // dropped; a body mentioning a dead id sinks the
                    // whole function.
                    func_expr_mentions(&case.body, &cascade)
                        && !cascade.ctors.contains(&case.ctor)
                });
                if signature_gone || body_gone {
                    cascade.funcs.insert(func.id.clone());
                    grew = true;
                }
            }
            for rule in self.rules.values() {
                if cascade.rules.contains(&rule.id) {
                    continue;
                }
                let judgment_gone = cascade.judgments.contains(&rule.conclusion.judgment)
                    || rule
                        .premises
                        .iter()
                        .any(|p| cascade.judgments.contains(&p.judgment));
                let pattern_gone = rule
                    .conclusion
                    .args
                    .iter()
                    .chain(rule.premises.iter().flat_map(|p| p.args.iter()))
                    .any(|p| pattern_mentions_any_ctor(p, &cascade.ctors));
                if judgment_gone || pattern_gone {
                    cascade.rules.insert(rule.id.clone());
                    grew = true;
                }
            }
            for property in self.properties.values() {
                if !cascade.properties.contains(&property.id)
                    && formula_mentions(&property.statement, &cascade)
                {
                    cascade.properties.insert(property.id.clone());
                    grew = true;
                }
            }

            if !grew {
                break;
            }
        }

        debug!(
            "cascade: {} sorts, {} ctors, {} judgments, {} rules, {} funcs, {} properties",
            cascade.sorts.len(),
            cascade.ctors.len(),
            cascade.judgments.len(),
            cascade.rules.len(),
            cascade.funcs.len(),
            cascade.properties.len()
        );

        self.proofs
            .retain(|_, p| !cascade.properties.contains(&p.property));
        self.properties
            .retain(|id, _| !cascade.properties.contains(id));
        self.rules.retain(|id, _| !cascade.rules.contains(id));
        self.funcs.retain(|id, _| !cascade.funcs.contains(id));
        self.metavars.retain(|id, _| !cascade.metavars.contains(id));
        self.judgments
            .retain(|id, _| !cascade.judgments.contains(id));
        self.ctors.retain(|id, _| !cascade.ctors.contains(id));
        self.sorts.retain(|id, _| !cascade.sorts.contains(id));
        for sort in &cascade.sorts {
            self.atom_counters.remove(sort);
        }

        // Surviving functions lose their cases over deleted constructors;
        // surviving rules degrade dead meta-variables to holes. Remaining
        // side conditions calling a deleted function are dropped.
        for func in self.funcs.values_mut() {
            func.cases.retain(|case| !cascade.ctors.contains(&case.ctor));
        }
        for rule in self.rules.values_mut() {
            erase_metavars_in_rule(rule, &cascade.metavars);
            rule.side_conditions.retain(|c| {
                !cascade.funcs.contains(&c.func)
                    && !pattern_mentions_any_ctor(&c.arg, &cascade.ctors)
                    && !match &c.test {
                        SideTest::In(p) | SideTest::NotIn(p) => {
                            pattern_mentions_any_ctor(p, &cascade.ctors)
                        }
                        _ => false,
                    }
            });
        }
        self.recompute_all_functions();
    }
}

#[derive(Debug, Default)]
struct Cascade {
    sorts: BTreeSet<SortId>,
    ctors: BTreeSet<CtorId>,
    judgments: BTreeSet<JudgmentId>,
    metavars: BTreeSet<MetaVarId>,
    rules: BTreeSet<RuleId>,
    funcs: BTreeSet<FuncId>,
    properties: BTreeSet<PropertyId>,
}

fn pattern_mentions_any_ctor(pattern: &Pattern, ctors: &BTreeSet<CtorId>) -> bool {
    match pattern {
        Pattern::Hole | Pattern::MetaVar(_) => false,
        Pattern::Ctor { ctor, args } => {
            ctors.contains(ctor) || args.iter().any(|a| pattern_mentions_any_ctor(a, ctors))
        }
    }
}

fn erase_metavars_in_rule(rule: &mut InferenceRule, gone: &BTreeSet<MetaVarId>) {
    for p in rule
        .conclusion
        .args
        .iter_mut()
        .chain(rule.premises.iter_mut().flat_map(|p| p.args.iter_mut()))
    {
        erase_metavars_in_pattern(p, gone);
    }
    for cond in &mut rule.side_conditions {
        erase_metavars_in_pattern(&mut cond.arg, gone);
        match &mut cond.test {
            SideTest::In(p) | SideTest::NotIn(p) => erase_metavars_in_pattern(p, gone),
            _ => {}
        }
    }
}

fn erase_metavars_in_pattern(pattern: &mut Pattern, gone: &BTreeSet<MetaVarId>) {
    match pattern {
        Pattern::MetaVar(mv) if gone.contains(mv) => *pattern = Pattern::Hole,
        Pattern::Ctor { args, .. } => {
            for a in args {
                erase_metavars_in_pattern(a, gone);
            }
        }
        _ => {}
    }
}

fn func_expr_mentions(expr: &FuncExpr, cascade: &Cascade) -> bool {
    match expr {
        FuncExpr::Int(_) | FuncExpr::EmptySet | FuncExpr::Var(_) => false,
        FuncExpr::Singleton(e) => func_expr_mentions(e, cascade),
        FuncExpr::Call { func, args } => {
            cascade.funcs.contains(func) || args.iter().any(|a| func_expr_mentions(a, cascade))
        }
        FuncExpr::Ctor { ctor, args } => {
            cascade.ctors.contains(ctor) || args.iter().any(|a| func_expr_mentions(a, cascade))
        }
        FuncExpr::Binop { lhs, rhs, .. } => {
            func_expr_mentions(lhs, cascade) || func_expr_mentions(rhs, cascade)
        }
        FuncExpr::If { cond, then, els } => {
            func_pred_mentions(cond, cascade)
                || func_expr_mentions(then, cascade)
                || func_expr_mentions(els, cascade)
        }
    }
}

fn func_pred_mentions(pred: &FuncPredicate, cascade: &Cascade) -> bool {
    match pred {
        FuncPredicate::Cmp { lhs, rhs, .. }
        | FuncPredicate::AtomEq(lhs, rhs)
        | FuncPredicate::AtomNeq(lhs, rhs) => {
            func_expr_mentions(lhs, cascade) || func_expr_mentions(rhs, cascade)
        }
        FuncPredicate::In { element, set } => {
            func_expr_mentions(element, cascade) || func_expr_mentions(set, cascade)
        }
        FuncPredicate::IsEmpty(e) => func_expr_mentions(e, cascade),
        FuncPredicate::And(a, b) | FuncPredicate::Or(a, b) => {
            func_pred_mentions(a, cascade) || func_pred_mentions(b, cascade)
        }
        FuncPredicate::Not(p) => func_pred_mentions(p, cascade),
    }
}

fn formula_mentions(formula: &Formula, cascade: &Cascade) -> bool {
    match formula {
        Formula::True | Formula::False => false,
        Formula::Forall { sort, body, .. } | Formula::Exists { sort, body, .. } => {
            cascade.sorts.contains(sort) || formula_mentions(body, cascade)
        }
        Formula::Implies(l, r) | Formula::And(l, r) | Formula::Or(l, r) => {
            formula_mentions(l, cascade) || formula_mentions(r, cascade)
        }
        Formula::Not(f) => formula_mentions(f, cascade),
        Formula::Judgment { judgment, args } => {
            cascade.judgments.contains(judgment)
                || args.iter().any(|a| formula_expr_mentions(a, cascade))
        }
        Formula::TermEq(l, r) | Formula::TermNeq(l, r) | Formula::SetEq(l, r) => {
            formula_expr_mentions(l, cascade) || formula_expr_mentions(r, cascade)
        }
        Formula::Num { lhs, rhs, .. } => {
            formula_expr_mentions(lhs, cascade) || formula_expr_mentions(rhs, cascade)
        }
        Formula::SetIn { element, set } => {
            formula_expr_mentions(element, cascade) || formula_expr_mentions(set, cascade)
        }
    }
}

fn formula_expr_mentions(expr: &FormulaExpr, cascade: &Cascade) -> bool {
    match expr {
        FormulaExpr::Var(_) | FormulaExpr::Int(_) | FormulaExpr::EmptySet => false,
        FormulaExpr::Ctor { ctor, args } => {
            cascade.ctors.contains(ctor) || args.iter().any(|a| formula_expr_mentions(a, cascade))
        }
        FormulaExpr::FuncApp { func, args } => {
            cascade.funcs.contains(func) || args.iter().any(|a| formula_expr_mentions(a, cascade))
        }
        FormulaExpr::Arith { lhs, rhs, .. } => {
            formula_expr_mentions(lhs, cascade) || formula_expr_mentions(rhs, cascade)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nat(theory: &mut Theory) -> (SortId, CtorId, CtorId) {
        let nat = theory
            .create_sort("ℕ", SortKind::Inductive, false)
            .expect("sort");
        let zero = theory.create_constructor(&nat, "Z", vec![]).expect("Z");
        let succ = theory
            .create_constructor(
                &nat,
                "S",
                vec![CtorArgSpec {
                    sort: nat.clone(),
                    label: Some("n".to_string()),
                    is_binder: false,
                    binds_in: vec![],
                }],
            )
            .expect("S");
        (nat, zero, succ)
    }

    #[test]
    fn judgment_separator_invariant_is_enforced() {
        let mut theory = Theory::new();
        let (nat, _, _) = nat(&mut theory);
        let err = theory
            .create_judgment("even", "even", vec![(nat.clone(), None)], vec![String::new()])
            .expect_err("one separator is too few");
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        theory
            .create_judgment(
                "even",
                "even",
                vec![(nat, None)],
                vec![String::new(), " even".to_string()],
            )
            .expect("prefix and suffix");
    }

    #[test]
    fn deleting_a_sort_cascades_to_everything_built_on_it() {
        let mut theory = Theory::new();
        let (nat, _zero, succ) = nat(&mut theory);
        let even = theory
            .create_judgment(
                "even",
                "even",
                vec![(nat.clone(), None)],
                vec![String::new(), " even".to_string()],
            )
            .expect("judgment");
        let mv = theory.create_metavar("n", &nat).expect("metavar");
        let rule = theory.create_rule("E-Zero", &even).expect("rule");
        theory
            .update_rule(&rule, None, Some(vec![Pattern::MetaVar(mv.clone())]))
            .expect("conclusion");
        let func = theory
            .create_function("size", &nat, vec![], FuncReturnType::Int)
            .expect("function");
        let prop = theory
            .create_property(
                "size-nonneg",
                Formula::Num {
                    op: crate::ast::CmpOp::Geq,
                    lhs: FormulaExpr::FuncApp {
                        func: func.clone(),
                        args: vec![FormulaExpr::var("n")],
                    },
                    rhs: FormulaExpr::Int(0),
                },
            )
            .expect("property");
        theory.start_proof(&prop).expect("proof");

        theory.delete_sort(&nat).expect("delete");
        assert!(theory.sort(&nat).is_err());
        assert!(theory.ctor(&succ).is_err());
        assert!(theory.judgment(&even).is_err());
        assert!(theory.metavar(&mv).is_err());
        assert!(theory.rule(&rule).is_err());
        assert!(theory.func(&func).is_err());
        assert!(theory.property(&prop).is_err());
        assert_eq!(theory.proofs().count(), 0);
    }

    #[test]
    fn deleting_a_metavar_degrades_patterns_to_holes() {
        let mut theory = Theory::new();
        let (nat, _, succ) = nat(&mut theory);
        let even = theory
            .create_judgment(
                "even",
                "even",
                vec![(nat.clone(), None)],
                vec![String::new(), " even".to_string()],
            )
            .expect("judgment");
        let mv = theory.create_metavar("n", &nat).expect("metavar");
        let rule = theory.create_rule("E-Succ", &even).expect("rule");
        theory
            .update_rule(
                &rule,
                None,
                Some(vec![Pattern::Ctor {
                    ctor: succ,
                    args: vec![Pattern::MetaVar(mv.clone())],
                }]),
            )
            .expect("conclusion");
        assert!(theory.rule_complete(&rule).expect("complete"));
        theory.delete_metavar(&mv).expect("delete metavar");
        assert!(theory.rule(&rule).is_ok(), "rule survives");
        assert!(!theory.rule_complete(&rule).expect("now incomplete"));
    }

    #[test]
    fn new_constructor_stubs_cases_and_flags_functions() {
        let mut theory = Theory::new();
        let (nat, _, _) = nat(&mut theory);
        let size = theory
            .create_function("size", &nat, vec![], FuncReturnType::Int)
            .expect("function");
        assert!(theory.func(&size).expect("f").terminates);
        assert_eq!(theory.func(&size).expect("f").cases.len(), 2);
        // A third constructor appears; the function grows a stub case and
        // stays total.
        theory
            .create_constructor(
                &nat,
                "D",
                vec![CtorArgSpec {
                    sort: nat.clone(),
                    label: None,
                    is_binder: false,
                    binds_in: vec![],
                }],
            )
            .expect("D");
        let f = theory.func(&size).expect("f");
        assert_eq!(f.cases.len(), 3);
        assert!(f.terminates);
    }

    #[test]
    fn serde_round_trip_is_identity() {
        let mut theory = Theory::new();
        let (nat, _zero, _succ) = nat(&mut theory);
        theory
            .create_judgment(
                "even",
                "even",
                vec![(nat.clone(), None)],
                vec![String::new(), " even".to_string()],
            )
            .expect("judgment");
        theory
            .create_function("size", &nat, vec![], FuncReturnType::Int)
            .expect("function");
        let json = serde_json::to_string(&theory).expect("serialize");
        let back: Theory = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(theory, back);
    }

    #[test]
    fn rejected_commands_leave_the_theory_unchanged() {
        let mut theory = Theory::new();
        let (nat, _, _) = nat(&mut theory);
        let snapshot = theory.clone();
        let missing = SortId("sort-999999".to_string());
        assert!(theory
            .create_judgment(
                "j",
                "j",
                vec![(missing.clone(), None)],
                vec![String::new(), String::new()]
            )
            .is_err());
        assert!(theory.delete_sort(&missing).is_err());
        assert!(theory
            .create_function("f", &missing, vec![], FuncReturnType::Int)
            .is_err());
        assert_eq!(theory, snapshot);
        let _ = nat;
    }
}
