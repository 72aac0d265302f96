//! "Exactly k mines among these cells" constraints, and the
//! deduplicating store that holds them.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::grid::{Cell, CellMap, CellSet};
use crate::{Error, SolveResult, Val};

/// What a constraint says about its cells without any search.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Triviality {
    /// No mines required: every member cell is safe.
    AllSafe,
    /// As many mines required as there are cells: every member is a mine.
    AllMines,
    /// Anything in between.
    Undetermined,
}

/// One linear equality over a set of cells: exactly `required` of
/// `cells` are mines.
///
/// A constraint is created from one opened numbered cell and its
/// unopened neighbors, shrinks as member cells become known, and is
/// discarded once trivial. Equality is structural: same mine count and
/// same cell set, independent of insertion order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Constraint {
    required: usize,
    cells: CellSet,
}

impl Constraint {
    pub fn new(cells: CellSet, required: usize) -> SolveResult<Self> {
        if required > cells.len() {
            return Err(Error::InvalidConstraint {
                required,
                cells: cells.len(),
            });
        }
        Ok(Constraint { required, cells })
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn cells(&self) -> &CellSet {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Check the constraint against a partial assignment.
    ///
    /// A constraint with any still-unassigned member cannot be
    /// falsified yet and reports satisfied. Once every member is
    /// assigned, the values must sum to the required count.
    pub fn is_satisfied(&self, assignment: &CellMap<Val>) -> bool {
        let mut sum = 0;
        for cell in self.cells.iter() {
            match assignment.get(cell) {
                Some(&value) => sum += value as usize,
                None => return true,
            }
        }
        sum == self.required
    }

    /// Drop a cell whose value became known, keeping the equation
    /// consistent by subtracting the value from the required count.
    pub fn remove_cell(&mut self, cell: Cell, value: Val) -> SolveResult<()> {
        if !self.cells.remove(cell) {
            return Ok(());
        }
        self.required = self.required.checked_sub(value as usize).ok_or({
            Error::InvalidConstraint {
                required: 0,
                cells: self.cells.len(),
            }
        })?;
        if self.required > self.cells.len() {
            return Err(Error::InvalidConstraint {
                required: self.required,
                cells: self.cells.len(),
            });
        }
        Ok(())
    }

    pub fn triviality(&self) -> Triviality {
        if self.required == 0 {
            Triviality::AllSafe
        } else if self.required == self.cells.len() {
            Triviality::AllMines
        } else {
            Triviality::Undetermined
        }
    }

    /// Hash of the constraint's structure, independent of the order
    /// the cells were inserted in.
    pub fn structural_hash(&self) -> u64 {
        let mut acc: u64 = 0;
        for cell in self.cells.iter() {
            let mut hasher = DefaultHasher::new();
            cell.hash(&mut hasher);
            acc = acc.wrapping_add(hasher.finish());
        }
        acc ^ (self.required as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
    }
}

/// A shared handle to a constraint.
///
/// The same constraint is indexed against every cell it references, so
/// resolving one cell must be visible through all of them.
pub type ConstraintRef = Rc<RefCell<Constraint>>;

const INITIAL_BUCKETS: usize = 101;
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

/// A set of constraints bucketed by structural hash.
///
/// Simplification frequently derives algebraically identical
/// constraints from different opened cells; `add` drops those
/// duplicates so they are not propagated twice. The table doubles its
/// bucket count once the load factor exceeds 3/4.
///
/// Member constraints mutate as cells become known, which changes
/// their hash. The engine keeps the keys in sync by removing a handle
/// before mutating it and re-adding it afterwards.
#[derive(Debug)]
pub struct ConstraintStore {
    buckets: Vec<Vec<ConstraintRef>>,
    len: usize,
}

impl ConstraintStore {
    pub fn new() -> Self {
        ConstraintStore {
            buckets: vec![Vec::new(); INITIAL_BUCKETS],
            len: 0,
        }
    }

    fn bucket(&self, constraint: &Constraint) -> usize {
        (constraint.structural_hash() % self.buckets.len() as u64) as usize
    }

    /// Insert a constraint handle. A structural duplicate is a no-op
    /// and reports `false`.
    pub fn add(&mut self, constraint: ConstraintRef) -> bool {
        let idx = self.bucket(&constraint.borrow());
        {
            let new = constraint.borrow();
            if self.buckets[idx]
                .iter()
                .any(|stored| *stored.borrow() == *new)
            {
                return false;
            }
        }
        self.buckets[idx].push(constraint);
        self.len += 1;
        if self.len * MAX_LOAD_DEN > self.buckets.len() * MAX_LOAD_NUM {
            self.grow();
        }
        true
    }

    /// Remove the given handle (by identity, not structure).
    pub fn remove(&mut self, constraint: &ConstraintRef) -> bool {
        let idx = self.bucket(&constraint.borrow());
        let position = self.buckets[idx]
            .iter()
            .position(|stored| Rc::ptr_eq(stored, constraint));
        match position {
            Some(at) => {
                self.buckets[idx].remove(at);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Check for a structurally equal member.
    pub fn contains(&self, constraint: &Constraint) -> bool {
        let idx = self.bucket(constraint);
        self.buckets[idx]
            .iter()
            .any(|stored| *stored.borrow() == *constraint)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintRef> + '_ {
        self.buckets.iter().flatten()
    }

    fn grow(&mut self) {
        let doubled = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, vec![Vec::new(); doubled]);
        for constraint in old.into_iter().flatten() {
            let idx = self.bucket(&constraint.borrow());
            self.buckets[idx].push(constraint);
        }
    }
}

impl Default for ConstraintStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep clone: the copies get fresh handles, so mutating the original
/// store's constraints leaves the clone untouched.
impl Clone for ConstraintStore {
    fn clone(&self) -> Self {
        let buckets = self
            .buckets
            .iter()
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|c| Rc::new(RefCell::new(c.borrow().clone())))
                    .collect()
            })
            .collect();
        ConstraintStore {
            buckets,
            len: self.len,
        }
    }
}

/*--------------------------------------------------------------*/
