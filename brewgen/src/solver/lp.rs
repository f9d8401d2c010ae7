//! CPLEX/SCIP LP text export of a [`CpModel`].

use crate::solver::linear::{Constraint, LinearExpr, Sense, VarId};
use crate::solver::model::CpModel;
use crate::solver::search::ObjSense;

/// Renders the model, optionally with a single-variable objective.
pub fn emit_lp(model: &CpModel, objective: Option<(VarId, ObjSense)>) -> String {
    let name = |v: VarId| var_name(model, v);
    let mut out = String::new();
    out.push_str(&format!("\\ model {}\n", sanitize(model.name())));
    let (sense, obj) = match objective {
        Some((v, s)) => (s, LinearExpr::from_var(v, 1)),
        None => (ObjSense::Minimize, LinearExpr::zero()),
    };
    match sense {
        ObjSense::Minimize => out.push_str("Minimize\n obj: "),
        ObjSense::Maximize => out.push_str("Maximize\n obj: "),
    }
    out.push_str(&fmt_lin(&obj, &name));
    out.push('\n');

    out.push_str("Subject To\n");
    for (i, c) in model.constraints().iter().enumerate() {
        out.push_str(&fmt_constraint(i, c, &name));
    }

    out.push_str("Bounds\n");
    for (i, v) in model.vars.iter().enumerate() {
        if !v.is_bool {
            out.push_str(&format!(" {} <= {} <= {}\n", v.lo, name(VarId(i)), v.hi));
        }
    }
    out.push_str("General\n");
    for (i, _) in model.vars.iter().enumerate().filter(|(_, v)| !v.is_bool) {
        out.push_str(&format!(" {}\n", name(VarId(i))));
    }
    out.push_str("Binary\n");
    for (i, _) in model.vars.iter().enumerate().filter(|(_, v)| v.is_bool) {
        out.push_str(&format!(" {}\n", name(VarId(i))));
    }
    out.push_str("End\n");
    out
}

fn fmt_constraint(i: usize, c: &Constraint, name: &dyn Fn(VarId) -> String) -> String {
    let (lo, hi) = c.var_bounds();
    let rhs = match c.sense {
        Sense::Ge => lo,
        _ => hi,
    }
    .unwrap_or_default();
    let lhs = fmt_lin(&LinearExpr::weighted(c.expr.terms()), name);
    let guard = match c.enforce {
        Some(l) => format!("{} = {} -> ", name(l.var), u8::from(l.positive)),
        None => String::new(),
    };
    format!(
        " c{}_{}: {}{} {} {}\n",
        i,
        sanitize(&c.name),
        guard,
        lhs,
        fmt_sense(c.sense),
        rhs
    )
}

fn var_name(model: &CpModel, v: VarId) -> String {
    format!("{}_{}", sanitize(&model.var(v).name), v.index())
}

fn fmt_sense(s: Sense) -> &'static str {
    match s {
        Sense::Le => "<=",
        Sense::Ge => ">=",
        Sense::Eq => "=",
    }
}

fn fmt_lin(e: &LinearExpr, name: &dyn Fn(VarId) -> String) -> String {
    let mut parts: Vec<String> = vec![];
    for (v, c) in e.terms() {
        parts.push(format!("{:+} {}", c, name(v)));
    }
    if parts.is_empty() {
        parts.push("+0".to_string());
    }
    if e.constant() != 0 {
        parts.push(format!("{:+}", e.constant()));
    }
    parts.join(" ")
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
