//! The Tseitin transform: equisatisfiable CNF of linear size.

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::assignment::Assignment;
use crate::clause::Clause;
use crate::domain::{Domain, Var};
use crate::expr::{Expr, Node};
use crate::formula::{eval_cursor, Formula, UndefinedVariable};

/// Lazily enumerates the clauses of the Tseitin transform of a formula.
///
/// The transform assigns a fresh variable to every distinct subformula —
/// distinct under structural equality, so equal subtrees share their
/// variable — and emits, per subformula, a clause template stating that the
/// fresh variable is equivalent to its node applied to the operands'
/// variables. A unit clause forcing the root variable comes first, making
/// the whole CNF equisatisfiable with the formula.
///
/// The auxiliary variables live in a domain owned by this producer,
/// available through [`aux_domain`](Tseitin::aux_domain); their names embed
/// the infix form of the originating subformula. Clauses taken from this
/// stream reference that domain only, so they must not outlive it.
///
/// [`lift`](Tseitin::lift) and [`project`](Tseitin::project) translate
/// assignments between the source domain and the auxiliary domain; they see
/// the subformulas discovered so far, so they are meant to be used once the
/// stream is exhausted.
pub struct Tseitin {
    source: Formula,
    aux: Arc<Domain>,
    cache: FxHashMap<Expr, Var>,
    subtrees: Vec<Expr>,
    pos: usize,
    pending: VecDeque<Clause>,
}

impl Tseitin {
    pub(crate) fn new(source: &Formula) -> Tseitin {
        let mut tseitin = Tseitin {
            source: source.clone(),
            aux: Arc::new(Domain::new()),
            cache: FxHashMap::default(),
            subtrees: Vec::new(),
            pos: 0,
            pending: VecDeque::new(),
        };
        debug!("tseitin: transforming {} nodes", source.expr().len());
        // Require that the root node be true.
        let root = tseitin.var_for(source.expr().clone());
        tseitin.emit(&[(root, true)]);
        tseitin
    }

    /// The domain of the auxiliary variables.
    pub fn aux_domain(&self) -> &Arc<Domain> {
        &self.aux
    }

    /// The formula being transformed.
    pub fn source(&self) -> &Formula {
        &self.source
    }

    /// Translates an assignment over the source domain into one over the
    /// auxiliary domain by evaluating each subformula.
    pub fn lift(&self, assign: &Assignment) -> Result<Assignment, UndefinedVariable> {
        let mut lifted = Vec::with_capacity(self.subtrees.len());
        for (index, subtree) in self.subtrees.iter().enumerate() {
            let value = eval_cursor(subtree.cursor(), assign)?;
            lifted.push((Var::from_index(index), value));
        }
        Ok(lifted.into_iter().collect())
    }

    /// Translates an assignment over the auxiliary domain back to the source
    /// domain, copying the values of the variable subformulas.
    pub fn project(&self, assign: &Assignment) -> Assignment {
        let mut projected = Vec::new();
        for (index, subtree) in self.subtrees.iter().enumerate() {
            if let Node::Var(source_var) = subtree.root() {
                if let Some(value) = assign.get(Var::from_index(index)) {
                    projected.push((source_var, value));
                }
            }
        }
        projected.into_iter().collect()
    }

    /// The auxiliary variable of a subformula, allocating a fresh one for a
    /// subformula not seen before.
    fn var_for(&mut self, subtree: Expr) -> Var {
        if let Some(&var) = self.cache.get(&subtree) {
            return var;
        }
        let name = format!("Tseitin[{}]", subtree.to_infix(self.source.domain()));
        let var = self
            .aux
            .define(name)
            .expect("the producer-owned auxiliary domain accepts new variables");
        debug_assert_eq!(var.index(), self.subtrees.len());
        self.cache.insert(subtree.clone(), var);
        self.subtrees.push(subtree);
        var
    }

    fn emit(&mut self, literals: &[(Var, bool)]) {
        self.pending.push_back(literals.iter().copied().collect());
    }
}

impl Iterator for Tseitin {
    type Item = Clause;

    fn next(&mut self) -> Option<Clause> {
        loop {
            if let Some(clause) = self.pending.pop_front() {
                return Some(clause);
            }
            if self.pos >= self.source.expr().len() {
                return None;
            }

            let cursor = self.source.expr().cursor_at(self.pos);
            let node = cursor.node();
            let subtree = cursor.materialize();
            let operands: Vec<Expr> =
                cursor.operands().iter().map(|op| op.materialize()).collect();
            self.pos += 1;

            // Each node kind has its own CNF template encoding
            // `(op a b) = c`. Some clauses below are conditional on a != b:
            // a clause cannot hold the same variable in both polarities, and
            // whenever that would happen the clause is vacuously true.
            let c = self.var_for(subtree);
            match node {
                Node::Const(value) => {
                    self.emit(&[(c, value)]);
                }
                Node::Var(_) => {
                    // The fresh variable stands in for the source variable
                    // directly; no clauses needed.
                }
                Node::Not => {
                    let a = self.var_for(operands.into_iter().next().unwrap());
                    self.emit(&[(a, false), (c, false)]);
                    self.emit(&[(a, true), (c, true)]);
                }
                _ => {
                    let mut operands = operands.into_iter();
                    let a = self.var_for(operands.next().unwrap());
                    let b = self.var_for(operands.next().unwrap());
                    match node {
                        Node::And => {
                            self.emit(&[(a, false), (b, false), (c, true)]);
                            self.emit(&[(a, true), (c, false)]);
                            self.emit(&[(b, true), (c, false)]);
                        }
                        Node::Or => {
                            self.emit(&[(a, true), (b, true), (c, false)]);
                            self.emit(&[(a, false), (c, true)]);
                            self.emit(&[(b, false), (c, true)]);
                        }
                        Node::Impl => {
                            if a != b {
                                self.emit(&[(a, false), (b, true), (c, false)]);
                            }
                            self.emit(&[(a, true), (c, true)]);
                            self.emit(&[(b, false), (c, true)]);
                        }
                        Node::Eqv => {
                            self.emit(&[(a, false), (b, false), (c, true)]);
                            self.emit(&[(a, true), (b, true), (c, true)]);
                            if a != b {
                                self.emit(&[(a, true), (b, false), (c, false)]);
                                self.emit(&[(a, false), (b, true), (c, false)]);
                            }
                        }
                        Node::Xor => {
                            self.emit(&[(a, false), (b, false), (c, false)]);
                            self.emit(&[(a, true), (b, true), (c, false)]);
                            if a != b {
                                self.emit(&[(a, true), (b, false), (c, true)]);
                                self.emit(&[(a, false), (b, true), (c, true)]);
                            }
                        }
                        _ => unreachable!(),
                    }
                }
            }
        }
    }
}
