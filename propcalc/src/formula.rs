//! Formulas: expressions bound to a domain.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::assignment::Assignment;
use crate::clause::Clause;
use crate::cnf::Cnf;
use crate::domain::{Domain, Var};
use crate::expr::{Cursor, Expr, Node};
use crate::parser::{self, ParseError};
use crate::truthtable::Truthtable;
use crate::tseitin::Tseitin;

/// Two formulas from different domains were combined.
///
/// Carries the operator symbol and both domains for diagnosis.
#[derive(Debug, Error)]
#[error("operands of `{op}` belong to different domains")]
pub struct DomainMismatch {
    pub op: &'static str,
    pub lhs: Arc<Domain>,
    pub rhs: Arc<Domain>,
}

/// Evaluation reached a variable the assignment does not define.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("variable {var} has no value in the assignment")]
pub struct UndefinedVariable {
    pub var: Var,
}

/// A propositional formula: an expression whose variables live in a shared
/// domain.
///
/// Formulas are immutable once constructed. The connective methods build new
/// formulas and refuse to combine operands bound to different domains.
#[derive(Clone)]
pub struct Formula {
    expr: Expr,
    domain: Arc<Domain>,
}

impl Formula {
    /// Parses an infix formula against the given domain.
    ///
    /// See the [parser module](crate::parser) for the accepted syntax.
    pub fn parse(input: &str, domain: &Arc<Domain>) -> Result<Formula, ParseError> {
        Ok(Formula {
            expr: parser::parse(input, domain)?,
            domain: domain.clone(),
        })
    }

    pub(crate) fn from_expr(expr: Expr, domain: Arc<Domain>) -> Formula {
        Formula { expr, domain }
    }

    /// Converts a clause into the disjunction of its literals.
    ///
    /// The empty clause becomes `\F`, the identity element of disjunction.
    pub fn from_clause(clause: &Clause, domain: &Arc<Domain>) -> Formula {
        Formula {
            expr: clause_expr(clause),
            domain: domain.clone(),
        }
    }

    /// Converts a sequence of clauses into the conjunction of their
    /// disjunctions.
    ///
    /// An empty sequence becomes `\T`, the identity element of conjunction.
    pub fn from_clauses(
        clauses: impl IntoIterator<Item = Clause>,
        domain: &Arc<Domain>,
    ) -> Formula {
        let mut exprs: Vec<Expr> = clauses.into_iter().map(|cl| clause_expr(&cl)).collect();
        let expr = match exprs.pop() {
            None => Expr::leaf(Node::Const(true)),
            Some(last) => exprs
                .into_iter()
                .rev()
                .fold(last, |acc, expr| Expr::binary(Node::And, expr, acc)),
        };
        Formula {
            expr,
            domain: domain.clone(),
        }
    }

    /// The underlying expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// The domain the formula's variables live in.
    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    /// The variables occurring in the formula, ordered by their number.
    pub fn vars(&self) -> Vec<Var> {
        let mut pile = FxHashSet::default();
        for node in self.expr.nodes() {
            if let Node::Var(var) = node {
                pile.insert(*var);
            }
        }
        self.domain.sort(pile)
    }

    /// The all-false assignment over [`vars`](Formula::vars).
    pub fn assignment(&self) -> Assignment {
        Assignment::from_vars(self.vars())
    }

    /// Evaluates the formula on the given assignment.
    ///
    /// Conjunction, disjunction and implication short-circuit, so evaluation
    /// under a partial assignment can succeed; it fails with
    /// [`UndefinedVariable`] as soon as an unassigned variable is actually
    /// needed.
    pub fn eval(&self, assign: &Assignment) -> Result<bool, UndefinedVariable> {
        eval_cursor(self.expr.cursor(), assign)
    }

    /// Substitutes the (partial) assignment into the formula and folds
    /// constants.
    ///
    /// The result is either a sole constant or a formula without constant
    /// nodes and without the assigned variables. Negation chains collapse by
    /// parity, so no two `~` are ever left adjacent.
    pub fn simplify(&self, assign: &Assignment) -> Formula {
        Formula {
            expr: simplify_cursor(self.expr.cursor(), assign),
            domain: self.domain.clone(),
        }
    }

    /// Negates the formula.
    pub fn not(&self) -> Formula {
        Formula {
            expr: Expr::unary(Node::Not, self.expr.clone()),
            domain: self.domain.clone(),
        }
    }

    pub fn and(&self, rhs: &Formula) -> Result<Formula, DomainMismatch> {
        self.combine(Node::And, rhs)
    }

    pub fn or(&self, rhs: &Formula) -> Result<Formula, DomainMismatch> {
        self.combine(Node::Or, rhs)
    }

    pub fn implies(&self, rhs: &Formula) -> Result<Formula, DomainMismatch> {
        self.combine(Node::Impl, rhs)
    }

    pub fn eqv(&self, rhs: &Formula) -> Result<Formula, DomainMismatch> {
        self.combine(Node::Eqv, rhs)
    }

    pub fn xor(&self, rhs: &Formula) -> Result<Formula, DomainMismatch> {
        self.combine(Node::Xor, rhs)
    }

    fn combine(&self, op: Node, rhs: &Formula) -> Result<Formula, DomainMismatch> {
        if !Arc::ptr_eq(&self.domain, &rhs.domain) {
            return Err(DomainMismatch {
                op: op.symbol(),
                lhs: self.domain.clone(),
                rhs: rhs.domain.clone(),
            });
        }
        Ok(Formula {
            expr: Expr::binary(op, self.expr.clone(), rhs.expr.clone()),
            domain: self.domain.clone(),
        })
    }

    /// The truth table of the formula.
    pub fn truthtable(&self) -> Truthtable {
        Truthtable::new(self)
    }

    /// A clause stream of a CNF equivalent to the formula, computed by truth
    /// tables of the root conjunction's subtrees.
    pub fn cnf(&self) -> Cnf {
        Cnf::new(self)
    }

    /// A clause stream of the Tseitin transform of the formula: an
    /// equisatisfiable CNF of linear size over an auxiliary domain.
    pub fn tseitin(&self) -> Tseitin {
        Tseitin::new(self)
    }

    pub fn to_infix(&self) -> String {
        self.expr.to_infix(&self.domain)
    }

    pub fn to_prefix(&self) -> String {
        self.expr.to_prefix(&self.domain)
    }

    pub fn to_postfix(&self) -> String {
        self.expr.to_postfix(&self.domain)
    }
}

/// Structural equality of formulas over the identical domain.
impl PartialEq for Formula {
    fn eq(&self, other: &Formula) -> bool {
        Arc::ptr_eq(&self.domain, &other.domain) && self.expr == other.expr
    }
}

impl Eq for Formula {}

/// Parses against the library-owned global default domain.
impl FromStr for Formula {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Formula, ParseError> {
        Formula::parse(input, &Domain::global())
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_infix())
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_infix())
    }
}

fn clause_expr(clause: &Clause) -> Expr {
    let mut lits: Vec<Expr> = clause
        .iter()
        .map(|(var, sign)| {
            let leaf = Expr::leaf(Node::Var(var));
            if sign {
                leaf
            } else {
                Expr::unary(Node::Not, leaf)
            }
        })
        .collect();
    match lits.pop() {
        None => Expr::leaf(Node::Const(false)),
        Some(last) => lits
            .into_iter()
            .rev()
            .fold(last, |acc, lit| Expr::binary(Node::Or, lit, acc)),
    }
}

/// Evaluates the subtree under the cursor, short-circuiting where the
/// connective allows it.
pub(crate) fn eval_cursor(
    cursor: Cursor,
    assign: &Assignment,
) -> Result<bool, UndefinedVariable> {
    match cursor.node() {
        Node::Const(value) => Ok(value),
        Node::Var(var) => assign.get(var).ok_or(UndefinedVariable { var }),
        Node::Not => Ok(!eval_cursor(cursor.operands()[0], assign)?),
        node => {
            let operands = cursor.operands();
            let (lhs, rhs) = (operands[0], operands[1]);
            match node {
                Node::And => Ok(eval_cursor(lhs, assign)? && eval_cursor(rhs, assign)?),
                Node::Or => Ok(eval_cursor(lhs, assign)? || eval_cursor(rhs, assign)?),
                Node::Impl => Ok(!eval_cursor(lhs, assign)? || eval_cursor(rhs, assign)?),
                Node::Eqv => Ok(eval_cursor(lhs, assign)? == eval_cursor(rhs, assign)?),
                Node::Xor => Ok(eval_cursor(lhs, assign)? != eval_cursor(rhs, assign)?),
                _ => unreachable!(),
            }
        }
    }
}

fn constant(expr: &Expr) -> Option<bool> {
    match expr.root() {
        Node::Const(value) => Some(value),
        _ => None,
    }
}

/// Negates an already simplified expression, collapsing negation chains by
/// parity: a simplified operand exposes at most one `~` at its root, which
/// the new `~` either cancels or complements.
fn negate(expr: Expr) -> Expr {
    match expr.root() {
        Node::Const(value) => Expr::leaf(Node::Const(!value)),
        Node::Not => expr.cursor().operands()[0].materialize(),
        _ => Expr::unary(Node::Not, expr),
    }
}

fn simplify_cursor(cursor: Cursor, assign: &Assignment) -> Expr {
    let node = cursor.node();
    match node {
        Node::Const(_) => Expr::leaf(node),
        Node::Var(var) => match assign.get(var) {
            Some(value) => Expr::leaf(Node::Const(value)),
            None => Expr::leaf(node),
        },
        Node::Not => negate(simplify_cursor(cursor.operands()[0], assign)),
        _ => {
            let operands = cursor.operands();
            let lhs = simplify_cursor(operands[0], assign);
            let rhs = simplify_cursor(operands[1], assign);
            simplify_binary(node, lhs, rhs)
        }
    }
}

fn simplify_binary(op: Node, lhs: Expr, rhs: Expr) -> Expr {
    match op {
        Node::And => match (constant(&lhs), constant(&rhs)) {
            (Some(true), _) => rhs,
            (Some(false), _) | (_, Some(false)) => Expr::leaf(Node::Const(false)),
            (_, Some(true)) => lhs,
            _ => Expr::binary(op, lhs, rhs),
        },
        Node::Or => match (constant(&lhs), constant(&rhs)) {
            (Some(false), _) => rhs,
            (Some(true), _) | (_, Some(true)) => Expr::leaf(Node::Const(true)),
            (_, Some(false)) => lhs,
            _ => Expr::binary(op, lhs, rhs),
        },
        Node::Impl => match (constant(&lhs), constant(&rhs)) {
            (Some(true), _) => rhs,
            (Some(false), _) | (_, Some(true)) => Expr::leaf(Node::Const(true)),
            (_, Some(false)) => negate(lhs),
            _ => Expr::binary(op, lhs, rhs),
        },
        Node::Eqv => match (constant(&lhs), constant(&rhs)) {
            (Some(true), _) => rhs,
            (Some(false), _) => negate(rhs),
            (_, Some(true)) => lhs,
            (_, Some(false)) => negate(lhs),
            _ => Expr::binary(op, lhs, rhs),
        },
        Node::Xor => match (constant(&lhs), constant(&rhs)) {
            (Some(false), _) => rhs,
            (Some(true), _) => negate(rhs),
            (_, Some(false)) => lhs,
            (_, Some(true)) => negate(lhs),
            _ => Expr::binary(op, lhs, rhs),
        },
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Arc<Domain> {
        Arc::new(Domain::new())
    }

    #[test]
    fn composition_in_the_same_domain() {
        let domain = domain();
        let f = Formula::parse("a & b", &domain).unwrap();
        let g = Formula::parse("c", &domain).unwrap();

        assert_eq!(f.not().to_postfix(), "[a] [b] & ~");
        assert_eq!(f.and(&g).unwrap().to_postfix(), "[a] [b] & [c] &");
        assert_eq!(f.or(&g).unwrap().to_postfix(), "[a] [b] & [c] |");
        assert_eq!(f.implies(&g).unwrap().to_postfix(), "[a] [b] & [c] >");
        assert_eq!(f.eqv(&g).unwrap().to_postfix(), "[a] [b] & [c] =");
        assert_eq!(f.xor(&g).unwrap().to_postfix(), "[a] [b] & [c] ^");
    }

    #[test]
    fn composition_across_domains_fails() {
        let f = Formula::parse("a", &domain()).unwrap();
        let g = Formula::parse("a", &domain()).unwrap();
        let err = f.and(&g).unwrap_err();
        assert_eq!(err.op, "&");
        assert!(Arc::ptr_eq(&err.lhs, f.domain()));
        assert!(Arc::ptr_eq(&err.rhs, g.domain()));
        assert!(f.implies(&g).is_err());
    }

    #[test]
    fn shared_variables_are_counted_once() {
        let domain = domain();
        let f = Formula::parse("3 | 3_4 & ~xyz -> a25 = [_]", &domain).unwrap();
        let g = Formula::parse("[12|47] & ([xyz] ^ [Once upon a Time...])", &domain).unwrap();
        assert_eq!(f.vars().len(), 5);
        assert_eq!(g.vars().len(), 3);
        assert_eq!(f.and(&g).unwrap().vars().len(), 7);
    }

    #[test]
    fn eval_short_circuits() {
        let domain = domain();
        let f = Formula::parse("x -> y -> z", &domain).unwrap();
        let x = domain.resolve("x").unwrap();
        let y = domain.resolve("y").unwrap();
        let z = domain.resolve("z").unwrap();

        let partial: Assignment = [(x, false)].into_iter().collect();
        assert_eq!(f.eval(&partial), Ok(true));

        let total: Assignment = [(x, true), (y, true), (z, false)].into_iter().collect();
        assert_eq!(f.eval(&total), Ok(false));

        let undefined: Assignment = [(y, false)].into_iter().collect();
        assert_eq!(f.eval(&undefined), Err(UndefinedVariable { var: x }));
    }

    #[test]
    fn simplify_folds_constants() {
        let domain = domain();
        let f = Formula::parse("x -> y -> z", &domain).unwrap();
        let x = domain.resolve("x").unwrap();
        let y = domain.resolve("y").unwrap();

        let partial: Assignment = [(x, false)].into_iter().collect();
        assert_eq!(f.simplify(&partial).to_postfix(), "\\T");

        let other: Assignment = [(y, true)].into_iter().collect();
        assert_eq!(f.simplify(&other).to_postfix(), "[x] [z] > >");

        // No assignment: the formula only rebuilds.
        assert_eq!(f.simplify(&Assignment::new()).to_postfix(), f.to_postfix());
    }

    #[test]
    fn simplify_reduction_table() {
        let domain = domain();
        let t = domain.resolve("t").unwrap();
        let f = domain.resolve("f").unwrap();
        let partial: Assignment = [(t, true), (f, false)].into_iter().collect();

        let simplified = |input: &str| {
            Formula::parse(input, &domain)
                .unwrap()
                .simplify(&partial)
                .to_postfix()
        };

        assert_eq!(simplified("a & t"), "[a]");
        assert_eq!(simplified("a & f"), "\\F");
        assert_eq!(simplified("f & a"), "\\F");
        assert_eq!(simplified("a | f"), "[a]");
        assert_eq!(simplified("a | t"), "\\T");
        assert_eq!(simplified("t > a"), "[a]");
        assert_eq!(simplified("f > a"), "\\T");
        assert_eq!(simplified("a > t"), "\\T");
        assert_eq!(simplified("a > f"), "[a] ~");
        assert_eq!(simplified("t = a"), "[a]");
        assert_eq!(simplified("f = a"), "[a] ~");
        assert_eq!(simplified("a = f"), "[a] ~");
        assert_eq!(simplified("f ^ a"), "[a]");
        assert_eq!(simplified("t ^ a"), "[a] ~");
        assert_eq!(simplified("~t"), "\\F");
        assert_eq!(simplified("~~~~a"), "[a]");
        assert_eq!(simplified("~~~a"), "[a] ~");
        assert_eq!(simplified("~a > f"), "[a]");
    }

    #[test]
    fn clause_conversions() {
        let domain = domain();
        domain.unpack(3).unwrap();

        let empty = Formula::from_clause(&Clause::new(), &domain);
        assert_eq!(empty.to_postfix(), "\\F");

        let clause: Clause = [(Var::from_number(1), true), (Var::from_number(3), false)]
            .into_iter()
            .collect();
        let f = Formula::from_clause(&clause, &domain);
        assert_eq!(f.to_postfix(), "[1] [3] ~ |");

        let none = Formula::from_clauses([], &domain);
        assert_eq!(none.to_postfix(), "\\T");

        let g = Formula::from_clauses([clause.clone(), Clause::new()], &domain);
        assert_eq!(g.to_postfix(), "[1] [3] ~ | \\F &");
    }

    #[test]
    fn stringification_of_a_large_formula() {
        let domain = domain();
        let input = "(ab&3 | x&a34) -> (\\T ^ x) -> (y = x) <-> (ab | cd ^ a34)";
        let f = Formula::parse(input, &domain).unwrap();

        assert_eq!(
            f.to_postfix(),
            "[ab] [3] & [x] [a34] & | \\T [x] ^ [y] [x] = > > [ab] [cd] | [a34] ^ ="
        );
        assert_eq!(
            f.to_prefix(),
            "= > | & [ab] [3] & [x] [a34] > ^ \\T [x] = [y] [x] ^ | [ab] [cd] [a34]"
        );
        assert_eq!(
            f.to_infix(),
            "[ab] & [3] | [x] & [a34] > (\\T ^ [x]) > ([y] = [x]) = [ab] | [cd] ^ [a34]"
        );
        assert_eq!(f.vars().len(), 6);
    }

    #[test]
    fn infix_roundtrips() {
        let domain = domain();
        for input in [
            "~a & b",
            "~(a & b)",
            "(a & b) -> c = d",
            "(a & b) -> (c = d)",
            "((a & b) -> c) = d",
            "a = b ^ c = d",
            "a ^ b = c ^ d",
            "a = b > c = d",
            "a > b = c > d",
            "(ab&3 | x&a34) -> (\\T ^ x) -> (y = x) <-> (ab | cd ^ a34)",
        ] {
            let f = Formula::parse(input, &domain).unwrap();
            let again = Formula::parse(&f.to_infix(), &domain).unwrap();
            assert_eq!(f.to_infix(), again.to_infix(), "input: {input}");
            assert_eq!(f.to_postfix(), again.to_postfix(), "input: {input}");
        }
    }

    #[test]
    fn from_str_uses_the_global_domain() {
        let f: Formula = "p26 & q26".parse().unwrap();
        let g: Formula = "q26".parse().unwrap();
        assert!(f.and(&g).is_ok());
        assert!(Arc::ptr_eq(f.domain(), &Domain::global()));
    }

    mod properties {
        use super::*;
        use crate::expr::strategy;
        use proptest::prelude::*;

        fn bound(expr: &Expr) -> Formula {
            let domain = Arc::new(Domain::new());
            let max = expr
                .nodes()
                .iter()
                .filter_map(|node| match node {
                    Node::Var(var) => Some(var.number()),
                    _ => None,
                })
                .max();
            if let Some(max) = max {
                domain.unpack(max).unwrap();
            }
            Formula::from_expr(expr.clone(), domain)
        }

        proptest! {
            #[test]
            fn parse_of_infix_preserves_postfix(expr in strategy::expr(4, 5)) {
                let f = bound(&expr);
                let again = Formula::parse(&f.to_infix(), f.domain()).unwrap();
                prop_assert_eq!(f.to_postfix(), again.to_postfix());
                prop_assert_eq!(f.to_prefix(), again.to_prefix());
            }

            #[test]
            fn simplify_is_sound(expr in strategy::expr(4, 5)) {
                let f = bound(&expr);
                let vars = f.vars();
                let (fixed, free): (Vec<_>, Vec<_>) =
                    vars.iter().partition(|var| var.index() % 2 == 0);

                let partial: Assignment =
                    fixed.iter().map(|&&var| (var, true)).collect();
                let simplified = f.simplify(&partial);

                let mut total = Assignment::from_vars(free.iter().copied().copied());
                loop {
                    let mut whole = total.clone();
                    for &&var in fixed.iter() {
                        whole.set(var, true);
                    }
                    prop_assert_eq!(
                        simplified.eval(&whole).unwrap(),
                        f.eval(&whole).unwrap()
                    );
                    total.advance();
                    if total.overflown() {
                        break;
                    }
                }
            }
        }
    }
}
