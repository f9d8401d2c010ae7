use std::collections::BTreeMap;
use std::fmt;

/// Handle to a model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Literal "this boolean is 1".
    pub fn lit(self) -> Literal {
        Literal {
            var: self,
            positive: true,
        }
    }

    /// Literal "this boolean is 0".
    pub fn not(self) -> Literal {
        Literal {
            var: self,
            positive: false,
        }
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A boolean variable or its negation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    pub var: VarId,
    pub positive: bool,
}

/// `sum(coeff * var) + constant` over integer coefficients.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearExpr {
    pub(crate) terms: BTreeMap<VarId, i64>,
    pub(crate) constant: i64,
}

impl LinearExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_const(v: i64) -> Self {
        let mut e = Self::zero();
        e.constant = v;
        e
    }

    pub fn from_var(v: VarId, c: i64) -> Self {
        let mut e = Self::zero();
        e.add_term(v, c);
        e
    }

    /// Plain sum of variables.
    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        Self::weighted(vars.into_iter().map(|v| (v, 1)))
    }

    pub fn weighted<I: IntoIterator<Item = (VarId, i64)>>(terms: I) -> Self {
        let mut e = Self::zero();
        for (v, c) in terms {
            e.add_term(v, c);
        }
        e
    }

    pub fn add_term(&mut self, v: VarId, c: i64) {
        if c == 0 {
            return;
        }
        let entry = self.terms.entry(v).or_insert(0);
        *entry += c;
        if *entry == 0 {
            self.terms.remove(&v);
        }
    }

    pub fn add_inplace(&mut self, other: &LinearExpr) {
        self.constant += other.constant;
        for (v, c) in other.terms.iter() {
            self.add_term(*v, *c);
        }
    }

    pub fn sub_inplace(&mut self, other: &LinearExpr) {
        self.constant -= other.constant;
        for (v, c) in other.terms.iter() {
            self.add_term(*v, -*c);
        }
    }

    pub fn add(mut self, other: LinearExpr) -> Self {
        self.add_inplace(&other);
        self
    }

    pub fn sub(mut self, other: LinearExpr) -> Self {
        self.sub_inplace(&other);
        self
    }

    pub fn scale(&self, k: i64) -> Self {
        let mut e = Self::from_const(self.constant * k);
        for (v, c) in self.terms.iter() {
            e.add_term(*v, c * k);
        }
        e
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, i64)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }

    pub fn constant(&self) -> i64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// `expr <sense> rhs`, optionally enforced only when `enforce` holds.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: i64,
    pub enforce: Option<Literal>,
}

impl Constraint {
    /// Half-reification: the constraint only has to hold when `lit` is true.
    pub fn only_enforce_if(&mut self, lit: Literal) -> &mut Self {
        self.enforce = Some(lit);
        self
    }

    /// Bounds on the variable part once the constant is moved to the right.
    pub(crate) fn var_bounds(&self) -> (Option<i128>, Option<i128>) {
        let r = self.rhs as i128 - self.expr.constant as i128;
        match self.sense {
            Sense::Eq => (Some(r), Some(r)),
            Sense::Le => (None, Some(r)),
            Sense::Ge => (Some(r), None),
        }
    }
}
