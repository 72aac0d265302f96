//! The constraint engine: per-cell domains, incremental constraint
//! simplification, propagation to a fixed point, and the exhaustive
//! backtracking search that computes mine probabilities.

use std::cell::RefCell;
use std::rc::Rc;

use crate::board::BoardView;
use crate::constraint::{Constraint, ConstraintRef, ConstraintStore, Triviality};
use crate::grid::{Cell, CellMap, CellSet};
use crate::{Error, SolveResult, Val, MINE, SAFE};

/// The feasible values of one cell, a subset of {`SAFE`, `MINE`}.
///
/// Never empty. A domain shrinks monotonically from both values down
/// to a singleton and never grows back; a singleton domain is what
/// "known" means.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Domain(u8);

impl Domain {
    fn full() -> Self {
        Domain(0b11)
    }

    pub fn contains(self, value: Val) -> bool {
        self.0 & (1 << value) != 0
    }

    pub fn is_known(self) -> bool {
        self.0.count_ones() == 1
    }

    /// The fixed value, once the domain is a singleton.
    pub fn value(self) -> Option<Val> {
        match self.0 {
            0b01 => Some(SAFE),
            0b10 => Some(MINE),
            _ => None,
        }
    }

    fn exclude(&mut self, value: Val) {
        self.0 &= !(1 << value);
    }

    /// Iterate the feasible values, `SAFE` first.
    pub fn iter(self) -> impl Iterator<Item = Val> {
        [SAFE, MINE].into_iter().filter(move |&v| self.contains(v))
    }
}

/// Budget for one exhaustive search.
///
/// The search is exponential in the number of undetermined cells by
/// design, so a budget bounds how long a single call may run. A
/// consumed budget is not an error: the search reports itself
/// incomplete, commits no certainties, and the caller falls back to
/// whatever probabilities were tallied before the cutoff.
#[derive(Copy, Clone, Debug)]
pub struct SearchLimits {
    /// Maximum number of visited search nodes.
    pub max_steps: u64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_steps: 1 << 20,
        }
    }
}

/// What the most recent exhaustive search did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SearchStats {
    /// Number of satisfying assignments found.
    pub solutions: u64,
    /// Number of search nodes visited.
    pub steps: u64,
    /// Whether the search ran to exhaustion within its budget.
    pub complete: bool,
}

/// The constraint satisfaction engine for one game session.
///
/// Cells move through a one-way state machine: unknown (domain
/// {`SAFE`, `MINE`}), then safe or mine once a constraint, an external
/// notification, or a unanimous search verdict fixes them. Newly fixed
/// cells are queued until the decision layer consumes them.
///
/// # Examples
///
/// ```
/// use minesweeper_solver::{Cell, CellSet, ConstraintEngine};
///
/// let mut engine = ConstraintEngine::new(4, 4);
/// let mut cells = CellSet::new(4, 4);
/// cells.add(Cell::new(0, 0));
/// cells.add(Cell::new(1, 0));
/// engine.add_constraint(&cells, 0).unwrap();
/// assert!(engine.domain(Cell::new(0, 0)).is_known());
/// ```
pub struct ConstraintEngine {
    width: usize,
    height: usize,
    domains: CellMap<Domain>,
    index: CellMap<Vec<ConstraintRef>>,
    store: ConstraintStore,
    safe_queue: CellSet,
    mine_queue: CellSet,
    limits: SearchLimits,
    stats: Option<SearchStats>,
}

impl ConstraintEngine {
    /// Allocate an engine for a board where every cell is unopened.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_limits(width, height, SearchLimits::default())
    }

    pub fn with_limits(width: usize, height: usize, limits: SearchLimits) -> Self {
        let mut domains = CellMap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                domains.insert(Cell::new(x, y), Domain::full());
            }
        }

        ConstraintEngine {
            width,
            height,
            domains,
            index: CellMap::new(width, height),
            store: ConstraintStore::new(),
            safe_queue: CellSet::new(width, height),
            mine_queue: CellSet::new(width, height),
            limits,
            stats: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn domain(&self, cell: Cell) -> Domain {
        self.domains[cell]
    }

    /// The registered nontrivial constraints.
    pub fn constraints(&self) -> &ConstraintStore {
        &self.store
    }

    /// How many registered constraints reference a cell.
    pub fn indexed_constraints(&self, cell: Cell) -> usize {
        self.index.get(cell).map_or(0, Vec::len)
    }

    pub fn last_search_stats(&self) -> Option<SearchStats> {
        self.stats
    }

    /// Register "exactly `required` of `cells` are mines".
    ///
    /// Cells that are already known are dropped up front, their values
    /// subtracted from the count, so only undetermined cells remain.
    /// If the simplified constraint is trivial it is resolved on the
    /// spot instead of being stored. Returns whether a nontrivial
    /// constraint was stored (`false` also on a structural duplicate).
    pub fn add_constraint(&mut self, cells: &CellSet, required: usize) -> SolveResult<bool> {
        let mut remaining = CellSet::new(self.width, self.height);
        let mut required = required;
        for cell in cells.iter() {
            match self.domains[cell].value() {
                Some(value) => {
                    required =
                        required
                            .checked_sub(value as usize)
                            .ok_or(Error::InvalidConstraint {
                                required: 0,
                                cells: cells.len(),
                            })?;
                }
                None => {
                    remaining.add(cell);
                }
            }
        }
        if required > remaining.len() {
            return Err(Error::InvalidConstraint {
                required,
                cells: remaining.len(),
            });
        }

        if remaining.is_empty() {
            return Ok(false);
        }
        if required == 0 {
            for cell in remaining.iter() {
                self.reduce_domain(cell, MINE)?;
            }
            return Ok(false);
        }
        if required == remaining.len() {
            for cell in remaining.iter() {
                self.reduce_domain(cell, SAFE)?;
            }
            return Ok(false);
        }

        let constraint = Constraint::new(remaining, required)?;
        let members: Vec<Cell> = constraint.cells().iter().collect();
        let handle: ConstraintRef = Rc::new(RefCell::new(constraint));
        if !self.store.add(handle.clone()) {
            log::trace!("dropped duplicate constraint over {} cells", members.len());
            return Ok(false);
        }
        for cell in members {
            match self.index.get_mut(cell) {
                Some(list) => list.push(handle.clone()),
                None => {
                    self.index.insert(cell, vec![handle.clone()]);
                }
            }
        }
        Ok(true)
    }

    /// Exclude a value from a cell's domain, fixing the cell to the
    /// other value.
    ///
    /// Idempotent on a cell that is already fixed away from `excluded`;
    /// excluding the value the cell is fixed *to* is a
    /// [`Error::Contradiction`]. On a fresh collapse the cell is queued
    /// for the decision layer and dropped from every constraint that
    /// references it, which may make those constraints trivial.
    pub fn reduce_domain(&mut self, cell: Cell, excluded: Val) -> SolveResult<()> {
        let domain = &mut self.domains[cell];
        if let Some(fixed) = domain.value() {
            return if fixed == excluded {
                Err(Error::Contradiction(cell))
            } else {
                Ok(())
            };
        }
        domain.exclude(excluded);
        let fixed = if excluded == MINE { SAFE } else { MINE };
        if fixed == SAFE {
            self.safe_queue.add(cell);
        } else {
            self.mine_queue.add(cell);
        }
        log::debug!(
            "cell {} deduced {}",
            cell,
            if fixed == MINE { "mine" } else { "safe" }
        );

        // Handles are keyed by their current structure, so each one
        // leaves the store while it mutates and re-enters afterwards.
        let attached = self.index.remove(cell).unwrap_or_default();
        for handle in attached {
            let stored = self.store.remove(&handle);
            handle.borrow_mut().remove_cell(cell, fixed)?;
            if stored && !handle.borrow().is_empty() {
                self.store.add(handle);
            }
        }
        Ok(())
    }

    /// One resolution sweep over the stored constraints.
    ///
    /// Every constraint whose [`Triviality`] is decided is removed and
    /// its cells resolved through [`ConstraintEngine::reduce_domain`].
    /// Returns whether anything was resolved; resolving one constraint
    /// can make others trivial, so the caller loops until `false`
    /// (or calls [`ConstraintEngine::propagate`]).
    pub fn update_constraints(&mut self) -> SolveResult<bool> {
        let decided: Vec<ConstraintRef> = self
            .store
            .iter()
            .filter(|handle| handle.borrow().triviality() != Triviality::Undetermined)
            .cloned()
            .collect();

        let mut resolved = false;
        for handle in decided {
            if !self.store.remove(&handle) {
                continue;
            }
            let (cells, verdict) = {
                let constraint = handle.borrow();
                (
                    constraint.cells().iter().collect::<Vec<Cell>>(),
                    constraint.triviality(),
                )
            };
            let excluded = match verdict {
                Triviality::AllSafe => MINE,
                Triviality::AllMines => SAFE,
                Triviality::Undetermined => {
                    self.store.add(handle);
                    continue;
                }
            };
            for cell in cells {
                self.reduce_domain(cell, excluded)?;
            }
            resolved = true;
        }
        Ok(resolved)
    }

    /// Run [`ConstraintEngine::update_constraints`] to its fixed point.
    pub fn propagate(&mut self) -> SolveResult<()> {
        while self.update_constraints()? {}
        Ok(())
    }

    /// Pop a cell that is provably safe and still unopened.
    pub fn safe_square<B: BoardView>(&mut self, board: &B) -> Option<Cell> {
        while let Some(cell) = self.safe_queue.pop() {
            if !board.is_opened(cell) {
                return Some(cell);
            }
        }
        None
    }

    /// Pop a cell that is provably a mine and not yet flagged.
    pub fn flaggable_square<B: BoardView>(&mut self, board: &B) -> Option<Cell> {
        while let Some(cell) = self.mine_queue.pop() {
            if !board.is_flagged(cell) {
                return Some(cell);
            }
        }
        None
    }

    /// Compute the mine percentage of every cell in `interest`.
    ///
    /// Already-known cells are reported directly as 0 or 100 without
    /// search. The undetermined remainder is enumerated exhaustively;
    /// a cell that is a mine in none or in all of the solutions is
    /// committed as a certainty via
    /// [`ConstraintEngine::reduce_domain`], which shrinks every later
    /// search. Percentages truncate: `100 * mines / solutions`,
    /// rounded toward zero.
    ///
    /// An empty interest set yields an empty map with no search. A
    /// complete search that finds no solution at all reports
    /// [`Error::Unsatisfiable`].
    pub fn find_safe_solutions(&mut self, interest: &CellSet) -> SolveResult<CellMap<u8>> {
        self.stats = None;
        let mut summary = CellMap::new(self.width, self.height);
        if interest.is_empty() {
            return Ok(summary);
        }

        // Row-major order keeps the search deterministic regardless of
        // how the interest set was assembled.
        let mut assignment: CellMap<Val> = CellMap::new(self.width, self.height);
        let mut order: Vec<Cell> = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = Cell::new(x, y);
                if !interest.contains(cell) {
                    continue;
                }
                match self.domains[cell].value() {
                    Some(value) => {
                        summary.insert(cell, if value == MINE { 100 } else { 0 });
                        assignment.insert(cell, value);
                    }
                    None => order.push(cell),
                }
            }
        }
        if order.is_empty() {
            return Ok(summary);
        }

        let mut search = Search {
            domains: &self.domains,
            index: &self.index,
            order: &order,
            assignment,
            tally: CellMap::new(self.width, self.height),
            total: 0,
            steps: 0,
            max_steps: self.limits.max_steps,
            complete: true,
        };
        for &cell in &order {
            search.tally.insert(cell, 0);
        }
        search.run(0);

        let Search {
            tally,
            total,
            steps,
            complete,
            ..
        } = search;
        self.stats = Some(SearchStats {
            solutions: total,
            steps,
            complete,
        });
        log::debug!(
            "search over {} cells visited {} nodes, {} solutions, complete: {}",
            order.len(),
            steps,
            total,
            complete
        );

        if total == 0 {
            if complete {
                return Err(Error::Unsatisfiable);
            }
            log::warn!("search budget consumed before any solution was found");
            return Ok(summary);
        }

        for cell in order {
            let mines = tally[cell];
            if complete && mines == 0 {
                self.reduce_domain(cell, MINE)?;
                summary.insert(cell, 0);
            } else if complete && mines == total {
                self.reduce_domain(cell, SAFE)?;
                summary.insert(cell, 100);
            } else {
                summary.insert(cell, (mines * 100 / total) as u8);
            }
        }
        Ok(summary)
    }
}

/// One depth-first enumeration of the undetermined cells of interest.
///
/// The assignment buffer is shared across the whole search tree rather
/// than copied per branch; every frame undoes its own entry on the way
/// out, whether it recursed, pruned, or exhausted its values. Memory
/// stays proportional to the cell count no matter how many solutions
/// exist, because full assignments are tallied and forgotten.
struct Search<'a> {
    domains: &'a CellMap<Domain>,
    index: &'a CellMap<Vec<ConstraintRef>>,
    order: &'a [Cell],
    assignment: CellMap<Val>,
    tally: CellMap<u64>,
    total: u64,
    steps: u64,
    max_steps: u64,
    complete: bool,
}

impl Search<'_> {
    fn run(&mut self, depth: usize) {
        if self.steps >= self.max_steps {
            self.complete = false;
            return;
        }
        self.steps += 1;

        if depth == self.order.len() {
            self.record();
            return;
        }

        let cell = self.order[depth];
        for value in self.domains[cell].iter() {
            self.assignment.insert(cell, value);
            if self.consistent(cell) {
                self.run(depth + 1);
            }
        }
        self.assignment.remove(cell);
    }

    /// Tally a full assignment without materializing it.
    fn record(&mut self) {
        self.total += 1;
        for &cell in self.order {
            if self.assignment[cell] == MINE {
                self.tally[cell] += 1;
            }
        }
    }

    /// Check only the constraints indexed on the cell that was just
    /// assigned. A constraint with an unassigned member cannot be
    /// falsified yet.
    fn consistent(&self, cell: Cell) -> bool {
        match self.index.get(cell) {
            Some(list) => list
                .iter()
                .all(|handle| handle.borrow().is_satisfied(&self.assignment)),
            None => true,
        }
    }
}

/*--------------------------------------------------------------*/
