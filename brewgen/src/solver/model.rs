use crate::solver::linear::{Constraint, LinearExpr, Sense, VarId};

#[derive(Clone, Debug)]
pub struct VarDef {
    pub name: String,
    pub lo: i64,
    pub hi: i64,
    pub is_bool: bool,
}

/// Integer constraint model: bounded variables plus linear, possibly
/// half-reified, constraints.
#[derive(Clone, Debug, Default)]
pub struct CpModel {
    pub(crate) name: String,
    pub(crate) vars: Vec<VarDef>,
    pub(crate) constraints: Vec<Constraint>,
    /// Variables the search branches on first, in this order.
    pub(crate) decision_vars: Vec<VarId>,
}

impl CpModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_int_var(&mut self, lo: i64, hi: i64, name: impl Into<String>) -> VarId {
        self.vars.push(VarDef {
            name: name.into(),
            lo,
            hi,
            is_bool: false,
        });
        VarId(self.vars.len() - 1)
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> VarId {
        self.vars.push(VarDef {
            name: name.into(),
            lo: 0,
            hi: 1,
            is_bool: true,
        });
        VarId(self.vars.len() - 1)
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        sense: Sense,
        rhs: i64,
    ) -> &mut Constraint {
        self.constraints.push(Constraint {
            name: name.into(),
            expr,
            sense,
            rhs,
            enforce: None,
        });
        let last = self.constraints.len() - 1;
        &mut self.constraints[last]
    }

    pub fn add_eq(&mut self, name: impl Into<String>, expr: LinearExpr, rhs: i64) -> &mut Constraint {
        self.add(name, expr, Sense::Eq, rhs)
    }

    pub fn add_le(&mut self, name: impl Into<String>, expr: LinearExpr, rhs: i64) -> &mut Constraint {
        self.add(name, expr, Sense::Le, rhs)
    }

    pub fn add_ge(&mut self, name: impl Into<String>, expr: LinearExpr, rhs: i64) -> &mut Constraint {
        self.add(name, expr, Sense::Ge, rhs)
    }

    /// `lo <= expr <= hi` as a pair of constraints named `{name}_lo` / `{name}_hi`.
    pub fn add_range(&mut self, name: &str, expr: LinearExpr, lo: i64, hi: i64) {
        if lo == hi {
            self.add_eq(name.to_string(), expr, lo);
            return;
        }
        self.add_ge(format!("{name}_lo"), expr.clone(), lo);
        self.add_le(format!("{name}_hi"), expr, hi);
    }

    /// Branch on these variables first.
    pub fn add_decision_strategy(&mut self, vars: &[VarId]) {
        for v in vars {
            if !self.decision_vars.contains(v) {
                self.decision_vars.push(*v);
            }
        }
    }

    pub fn var(&self, v: VarId) -> &VarDef {
        &self.vars[v.0]
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}
