//! Clauses: disjunctions of literals.

use std::fmt;
use std::ops;

use crate::assignment::{Assignment, VarMap};
use crate::domain::Var;

/// A disjunction of literals, stored as a mapping from variables to signs.
///
/// A variable mapping to `true` is a positive literal, one mapping to
/// `false` a negative literal. Put another way, the value a variable maps to
/// is the assignment to that variable which would satisfy the clause.
///
/// Because the backing store is a mapping, a clause cannot hold a variable
/// in both polarities; such a clause would be vacuously true and the
/// producers in this crate never need one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Clause {
    map: VarMap,
}

impl Clause {
    /// Creates the empty clause, which no assignment satisfies.
    pub fn new() -> Clause {
        Clause::default()
    }

    /// The clause that rules out exactly the given assignment: every sign is
    /// the flip of the assigned value.
    pub fn blocking(assign: &Assignment) -> Clause {
        assign.iter().map(|(var, value)| (var, !value)).collect()
    }

    /// Evaluates the clause on an assignment.
    ///
    /// True iff at least one variable of the clause has the same value in
    /// the assignment. Variables of the assignment that the clause does not
    /// mention are ignored; the empty clause yields false, the identity
    /// element of disjunction.
    pub fn eval(&self, assign: &Assignment) -> bool {
        self.map
            .iter()
            .any(|(var, sign)| assign.get(var) == Some(sign))
    }

    #[inline]
    pub fn contains(&self, var: Var) -> bool {
        self.map.contains(var)
    }

    #[inline]
    pub fn get(&self, var: Var) -> Option<bool> {
        self.map.get(var)
    }

    pub fn set(&mut self, var: Var, sign: bool) {
        self.map.set(var, sign);
    }

    /// The variables in reference order.
    #[inline]
    pub fn vars(&self) -> &[Var] {
        self.map.vars()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The literals as `(variable, sign)` pairs in reference order.
    pub fn iter(&self) -> impl Iterator<Item = (Var, bool)> + '_ {
        self.map.iter()
    }
}

/// Flips all signs in the clause, preserving the variable order.
impl ops::Not for &Clause {
    type Output = Clause;

    fn not(self) -> Clause {
        self.iter().map(|(var, sign)| (var, !sign)).collect()
    }
}

impl ops::Not for Clause {
    type Output = Clause;

    fn not(self) -> Clause {
        !&self
    }
}

impl ops::Index<Var> for Clause {
    type Output = bool;

    /// Panics if the variable is not part of the clause.
    fn index(&self, var: Var) -> &bool {
        &self.map[var]
    }
}

impl From<VarMap> for Clause {
    fn from(map: VarMap) -> Clause {
        Clause { map }
    }
}

impl FromIterator<(Var, bool)> for Clause {
    fn from_iter<I: IntoIterator<Item = (Var, bool)>>(iter: I) -> Clause {
        Clause {
            map: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Clause {
    /// Signed 1-based variable numbers, negative literals negative.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.map, f)
    }
}

/// Evaluates the conjunction of the given clauses.
///
/// With no clause at all the result is true, the identity element of
/// conjunction.
pub fn eval_conjunction<'a>(
    clauses: impl IntoIterator<Item = &'a Clause>,
    assign: &Assignment,
) -> bool {
    clauses.into_iter().all(|clause| clause.eval(assign))
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;
    use proptest::{collection::SizeRange, prelude::*};

    pub fn clause(vars: usize, len: impl Into<SizeRange>) -> impl Strategy<Value = Clause> {
        let vars = vars.max(1);
        proptest::collection::vec((0..vars, any::<bool>()), len).prop_map(|lits| {
            lits.into_iter()
                .map(|(index, sign)| (Var::from_index(index), sign))
                .collect()
        })
    }

    pub fn cnf(
        vars: usize,
        clauses: impl Into<SizeRange>,
        len: impl Into<SizeRange> + Clone,
    ) -> impl Strategy<Value = Vec<Clause>> {
        proptest::collection::vec(clause(vars, len), clauses)
    }
}
