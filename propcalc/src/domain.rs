//! Variables and the domain that owns them.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use thiserror::Error;

/// The backing type used to represent variables.
pub type VarIdx = u32;

/// The 1-based number of a variable within its domain.
///
/// This is the encoding used by the DIMACS CNF format, where the sign of an
/// integer selects a polarity and its absolute value selects a variable.
/// A `VarNr` of zero never denotes a variable.
pub type VarNr = usize;

/// A boolean variable.
///
/// A variable is an opaque handle into the [`Domain`] that created it.
/// Internally it is a 0-based index. For user IO a 1-based number (the
/// [`VarNr`]) is used, to allow denoting negated variables by negative
/// integers as in the DIMACS CNF format.
///
/// Handles from different domains must not be mixed; the library checks this
/// where it can (see [`DomainMismatch`](crate::formula::DomainMismatch)).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var {
    index: VarIdx,
}

impl Var {
    /// Creates a variable from its 1-based number.
    ///
    /// The parameter must be positive.
    #[inline]
    pub fn from_number(number: VarNr) -> Var {
        debug_assert!(number > 0);
        Var::from_index(number - 1)
    }

    /// Creates a variable from a 0-based index.
    #[inline]
    pub fn from_index(index: usize) -> Var {
        Var {
            index: index as VarIdx,
        }
    }

    /// The 1-based number of this variable, as used in the DIMACS CNF
    /// encoding.
    #[inline]
    pub fn number(self) -> VarNr {
        (self.index + 1) as VarNr
    }

    /// The 0-based index of this variable.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// Uses the 1-based number.
impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Uses the 1-based number.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Possible failures of domain operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The domain is frozen and the request would have created a variable.
    #[error("domain is frozen")]
    Frozen,
    /// A variable number of zero was passed to [`Domain::unpack`].
    #[error("variable number must be at least 1")]
    InvalidVarNr,
}

#[derive(Default)]
struct Registry {
    names: Vec<String>,
    by_name: FxHashMap<String, Var>,
    frozen: bool,
}

impl Registry {
    /// Appends a new variable under `name`. If the name is already bound,
    /// name lookup keeps answering with the older variable.
    fn new_variable(&mut self, name: String) -> Result<Var, DomainError> {
        if self.frozen {
            return Err(DomainError::Frozen);
        }
        let var = Var::from_index(self.names.len());
        self.by_name.entry(name.clone()).or_insert(var);
        self.names.push(name);
        Ok(var)
    }
}

/// The universe of variables a group of related formulas ranges over.
///
/// A domain allocates variables and keeps track of them. It maintains a
/// bijection between variable names, [`Var`] handles and 1-based [`VarNr`]
/// numbers, which gives the library's algorithms a total order on the
/// universe.
///
/// For each new name that is [`resolve`](Domain::resolve)d, a new variable is
/// allocated and recorded, so subsequent resolves of the same name answer
/// with the same handle. A request to [`unpack`](Domain::unpack) a high
/// variable number allocates all missing variables up to that number; their
/// names are the decimal representations of their respective numbers. The
/// domain always answers consistently, which makes it usable as the default
/// domain wherever no particular domain is required, such as when reading a
/// generic DIMACS CNF file.
///
/// All operations take an internal lock; a domain shared through an [`Arc`]
/// is safe to use from several threads. [`freeze`](Domain::freeze) makes the
/// domain reject any further variable creation until
/// [`thaw`](Domain::thaw)ed.
#[derive(Default)]
pub struct Domain {
    registry: Mutex<Registry>,
}

impl Domain {
    /// Creates an empty domain.
    pub fn new() -> Domain {
        Domain::default()
    }

    /// The library-owned default domain, backing
    /// [`Formula::from_str`](std::str::FromStr).
    ///
    /// Formulas that should not share variables with unrelated code must be
    /// parsed against an explicit domain instead.
    pub fn global() -> Arc<Domain> {
        static GLOBAL: OnceLock<Arc<Domain>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Domain::new())).clone()
    }

    /// Returns the variable with the given name, creating it if necessary.
    ///
    /// Fails with [`DomainError::Frozen`] if the name is unknown and the
    /// domain is frozen.
    pub fn resolve(&self, name: &str) -> Result<Var, DomainError> {
        let mut registry = self.registry.lock().unwrap();
        if let Some(&var) = registry.by_name.get(name) {
            return Ok(var);
        }
        registry.new_variable(name.to_owned())
    }

    /// Converts a variable to its 1-based number.
    #[inline]
    pub fn pack(&self, var: Var) -> VarNr {
        debug_assert!(var.index() < self.size());
        var.number()
    }

    /// Converts a 1-based number to a variable.
    ///
    /// Missing variables up to `nr` are created in order, named by the
    /// decimal representation of their number. Fails with
    /// [`DomainError::InvalidVarNr`] for `nr == 0` and with
    /// [`DomainError::Frozen`] if variables would have to be created on a
    /// frozen domain.
    pub fn unpack(&self, nr: VarNr) -> Result<Var, DomainError> {
        if nr == 0 {
            return Err(DomainError::InvalidVarNr);
        }
        let mut registry = self.registry.lock().unwrap();
        while registry.names.len() < nr {
            let name = (registry.names.len() + 1).to_string();
            registry.new_variable(name)?;
        }
        Ok(Var::from_number(nr))
    }

    /// The name of a variable of this domain.
    ///
    /// Panics if the variable does not belong to this domain.
    pub fn name(&self, var: Var) -> String {
        self.registry.lock().unwrap().names[var.index()].clone()
    }

    /// All variables of the domain, ordered by their number.
    pub fn list(&self) -> Vec<Var> {
        let registry = self.registry.lock().unwrap();
        (0..registry.names.len()).map(Var::from_index).collect()
    }

    /// Size of the domain's universe.
    pub fn size(&self) -> usize {
        self.registry.lock().unwrap().names.len()
    }

    /// Takes a set of variables and returns them ordered by their number.
    pub fn sort(&self, vars: impl IntoIterator<Item = Var>) -> Vec<Var> {
        let mut sorted: Vec<Var> = vars.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
    }

    /// Marks the domain as immutable. No more variables will be created.
    pub fn freeze(&self) {
        self.registry.lock().unwrap().frozen = true;
    }

    /// Undoes [`freeze`](Domain::freeze).
    pub fn thaw(&self) {
        self.registry.lock().unwrap().frozen = false;
    }

    /// Appends a fresh variable under `name`, even when the name is taken.
    ///
    /// [`resolve`](Domain::resolve) keeps answering with the oldest variable
    /// of a name. The Tseitin producer needs this to hand out distinct
    /// auxiliary variables for structurally distinct subformulas whose
    /// rendered names collide.
    pub(crate) fn define(&self, name: String) -> Result<Var, DomainError> {
        self.registry.lock().unwrap().new_variable(name)
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let registry = self.registry.lock().unwrap();
        f.debug_struct("Domain")
            .field("size", &registry.names.len())
            .field("frozen", &registry.frozen)
            .finish()
    }
}
