//! The decision layer: owns one engine per game and turns its
//! deductions into concrete moves.

use itertools::Itertools;

use crate::board::BoardView;
use crate::engine::{ConstraintEngine, SearchLimits};
use crate::grid::{Cell, CellMap, CellSet};
use crate::{SolveResult, MINE};

/// What the advisor wants done on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MoveKind {
    Open,
    Flag,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Move {
    pub kind: MoveKind,
    pub cell: Cell,
}

impl Move {
    pub fn open(cell: Cell) -> Self {
        Move {
            kind: MoveKind::Open,
            cell,
        }
    }

    pub fn flag(cell: Cell) -> Self {
        Move {
            kind: MoveKind::Flag,
            cell,
        }
    }
}

struct Session {
    engine: ConstraintEngine,
    number_cells: CellSet,
}

/// Recommends one move at a time for a running game.
///
/// Per move the advisor feeds the engine everything the board newly
/// revealed, propagates, and prefers (in order): a queued provably
/// safe cell, a queued provable mine to flag, a cell the exhaustive
/// search shows safe in every solution, and finally the least likely
/// mine it can find, marking that last case as a guess.
pub struct Advisor {
    session: Option<Session>,
    limits: SearchLimits,
    was_guess: bool,
}

impl Advisor {
    pub fn new() -> Self {
        Self::with_limits(SearchLimits::default())
    }

    /// An advisor whose engines search under the given budget.
    pub fn with_limits(limits: SearchLimits) -> Self {
        Advisor {
            session: None,
            limits,
            was_guess: false,
        }
    }

    /// Whether the most recent move relied on guesswork.
    pub fn was_guess(&self) -> bool {
        self.was_guess
    }

    /// Decide the next move for the current board state.
    ///
    /// A detected engine/board inconsistency does not kill the game:
    /// the move degrades to a guess and the error is logged.
    pub fn advise<B: BoardView>(&mut self, board: &B) -> Move {
        self.was_guess = false;
        if let Some(session) = self.session.as_mut() {
            return match session.next_move(board) {
                Ok((mv, guess)) => {
                    self.was_guess = guess;
                    mv
                }
                Err(err) => {
                    log::warn!(
                        "inconsistent solver state ({}), falling back to a guess",
                        err
                    );
                    self.was_guess = true;
                    fallback_move(board)
                }
            };
        }

        self.session = Some(Session {
            engine: ConstraintEngine::with_limits(board.width(), board.height(), self.limits),
            number_cells: CellSet::new(board.width(), board.height()),
        });
        first_move(board)
    }

    /// Mine percentages for the whole frontier of the current board,
    /// computed with a throwaway engine. The per-game engine is left
    /// untouched. A board with nothing opened yields an empty map.
    pub fn survey<B: BoardView>(&self, board: &B) -> SolveResult<CellMap<u8>> {
        let mut engine = ConstraintEngine::with_limits(board.width(), board.height(), self.limits);
        let mut interest = CellSet::new(board.width(), board.height());
        for cell in board.opened_cells() {
            engine.reduce_domain(cell, MINE)?;
        }
        for cell in board.opened_cells() {
            if board.neighbor_mines(cell) == 0 {
                continue;
            }
            let constrained = unopened_neighbors(board, cell);
            interest.add_all(&constrained);
            engine.add_constraint(&constrained, board.neighbor_mines(cell) as usize)?;
        }
        engine.propagate()?;
        engine.find_safe_solutions(&interest)
    }
}

impl Default for Advisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    fn next_move<B: BoardView>(&mut self, board: &B) -> SolveResult<(Move, bool)> {
        let mut interest = CellSet::new(board.width(), board.height());
        for cell in board.opened_cells() {
            self.engine.reduce_domain(cell, MINE)?;
        }
        for cell in board.opened_cells() {
            if board.neighbor_mines(cell) == 0 {
                continue;
            }
            let constrained = unopened_neighbors(board, cell);
            interest.add_all(&constrained);
            if self.number_cells.add(cell) {
                self.engine
                    .add_constraint(&constrained, board.neighbor_mines(cell) as usize)?;
            }
        }

        self.engine.propagate()?;
        if let Some(cell) = self.engine.safe_square(board) {
            return Ok((Move::open(cell), false));
        }
        if let Some(cell) = self.engine.flaggable_square(board) {
            return Ok((Move::flag(cell), false));
        }

        let summary = self.engine.find_safe_solutions(&interest)?;
        // A truncated search can report 0% for a cell it never saw as
        // a mine, without that being a proof. Only a complete search
        // justifies the certainly-safe shortcut.
        let exhaustive = self
            .engine
            .last_search_stats()
            .map_or(true, |stats| stats.complete);
        if exhaustive {
            for (cell, &percent) in summary.iter() {
                if percent == 0 {
                    return Ok((Move::open(cell), false));
                }
            }
        }

        let mut frontier_percent_sum = 0usize;
        for &percent in summary.values() {
            if percent < 100 {
                frontier_percent_sum += percent as usize;
            }
        }

        // Guesswork from here on. Cells with no adjacent number are
        // only characterized by the global mine count.
        let mut mystery = CellSet::new(board.width(), board.height());
        for y in 0..board.height() {
            for x in 0..board.width() {
                let cell = Cell::new(x, y);
                if !board.is_opened(cell) && !interest.contains(cell) {
                    mystery.add(cell);
                }
            }
        }

        let mut candidate = Cell::new(0, 0);
        let mut lowest = 100usize;
        if let Some(&first) = mystery.cells().first() {
            let mystery_mines = board
                .unflagged_mines()
                .saturating_sub(frontier_percent_sum / 100);
            lowest = mystery_mines * 100 / mystery.len();
            candidate = first;
        }
        for (cell, &percent) in summary.iter() {
            if percent as usize <= lowest {
                lowest = percent as usize;
                candidate = cell;
            }
        }
        Ok((Move::open(candidate), true))
    }
}

/// Open near the top-left corner, leaving room to learn from the
/// guaranteed opening area; retreat diagonally on tiny boards.
fn first_move<B: BoardView>(board: &B) -> Move {
    for i in (1..=2isize).rev() {
        if board.within_board(i, i) {
            return Move::open(Cell::new(i as usize, i as usize));
        }
    }
    Move::open(Cell::new(0, 0))
}

/// Last resort when the engine reported an inconsistency: any cell the
/// board still allows opening.
fn fallback_move<B: BoardView>(board: &B) -> Move {
    for y in 0..board.height() {
        for x in 0..board.width() {
            let cell = Cell::new(x, y);
            if !board.is_opened(cell) && !board.is_flagged(cell) {
                return Move::open(cell);
            }
        }
    }
    Move::open(Cell::new(0, 0))
}

/// The unopened cells in the 3x3 block around a numbered cell: the
/// cells its number constrains.
fn unopened_neighbors<B: BoardView>(board: &B, cell: Cell) -> CellSet {
    let mut neighbors = CellSet::new(board.width(), board.height());
    for (dx, dy) in (-1isize..=1).cartesian_product(-1isize..=1) {
        let x = cell.x as isize + dx;
        let y = cell.y as isize + dy;
        if board.within_board(x, y) {
            let candidate = Cell::new(x as usize, y as usize);
            if !board.is_opened(candidate) {
                neighbors.add(candidate);
            }
        }
    }
    neighbors
}
