//! Advisor scenarios against a scripted board implementation.

use minesweeper_solver::{Advisor, BoardView, Cell, Move, MoveKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A minimal game board: opening a zero-count cell floods its
/// neighborhood, opening a mine loses. No win/loss state machine
/// beyond what the tests need.
struct TestBoard {
    width: usize,
    height: usize,
    mines: Vec<bool>,
    opened: Vec<bool>,
    flagged: Vec<bool>,
}

impl TestBoard {
    fn new(width: usize, height: usize, mine_cells: &[(usize, usize)]) -> Self {
        let mut board = TestBoard {
            width,
            height,
            mines: vec![false; width * height],
            opened: vec![false; width * height],
            flagged: vec![false; width * height],
        };
        for &(x, y) in mine_cells {
            board.mines[y * width + x] = true;
        }
        board
    }

    fn offset(&self, cell: Cell) -> usize {
        cell.y * self.width + cell.x
    }

    fn neighbors(&self, cell: Cell) -> Vec<Cell> {
        let mut cells = Vec::new();
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let x = cell.x as isize + dx;
                let y = cell.y as isize + dy;
                if self.within_board(x, y) {
                    cells.push(Cell::new(x as usize, y as usize));
                }
            }
        }
        cells
    }

    /// Open a cell, flooding out from zero-count cells. Returns false
    /// when a mine was hit.
    fn open(&mut self, cell: Cell) -> bool {
        if self.mines[self.offset(cell)] {
            return false;
        }
        let mut pending = vec![cell];
        while let Some(cell) = pending.pop() {
            let offset = self.offset(cell);
            if self.opened[offset] {
                continue;
            }
            self.opened[offset] = true;
            if self.neighbor_mines(cell) == 0 {
                pending.extend(
                    self.neighbors(cell)
                        .into_iter()
                        .filter(|&c| !self.opened[self.offset(c)]),
                );
            }
        }
        true
    }

    fn flag(&mut self, cell: Cell) {
        let offset = self.offset(cell);
        self.flagged[offset] = true;
    }

    /// Returns false when the move lost the game.
    fn apply(&mut self, mv: Move) -> bool {
        match mv.kind {
            MoveKind::Open => self.open(mv.cell),
            MoveKind::Flag => {
                self.flag(mv.cell);
                true
            }
        }
    }

    fn is_won(&self) -> bool {
        self.mines
            .iter()
            .zip(&self.opened)
            .all(|(&mine, &opened)| mine || opened)
    }
}

impl BoardView for TestBoard {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn is_opened(&self, cell: Cell) -> bool {
        self.opened[self.offset(cell)]
    }

    fn is_flagged(&self, cell: Cell) -> bool {
        self.flagged[self.offset(cell)]
    }

    fn neighbor_mines(&self, cell: Cell) -> u8 {
        self.neighbors(cell)
            .into_iter()
            .filter(|&c| self.mines[self.offset(c)])
            .count() as u8
    }

    fn opened_cells(&self) -> Vec<Cell> {
        (0..self.width * self.height)
            .filter(|&offset| self.opened[offset])
            .map(|offset| Cell::new(offset % self.width, offset / self.width))
            .collect()
    }

    fn unflagged_mines(&self) -> usize {
        let mines = self.mines.iter().filter(|&&m| m).count();
        let flags = self.flagged.iter().filter(|&&f| f).count();
        mines.saturating_sub(flags)
    }
}

/*--------------------------------------------------------------*/

#[test]
fn first_move_opens_the_third_diagonal_cell() {
    init_logging();
    let board = TestBoard::new(10, 10, &[(9, 9)]);
    let mut advisor = Advisor::new();
    assert_eq!(advisor.advise(&board), Move::open(Cell::new(2, 2)));
    assert!(!advisor.was_guess());
}

#[test]
fn first_move_retreats_diagonally_on_tiny_boards() {
    init_logging();
    let tiny = TestBoard::new(2, 2, &[(0, 1)]);
    assert_eq!(Advisor::new().advise(&tiny), Move::open(Cell::new(1, 1)));

    let single = TestBoard::new(1, 1, &[]);
    assert_eq!(Advisor::new().advise(&single), Move::open(Cell::new(0, 0)));
}

#[test]
fn flags_a_forced_mine() {
    init_logging();
    let mut board = TestBoard::new(5, 1, &[(4, 0)]);
    let mut advisor = Advisor::new();
    advisor.advise(&board);
    assert!(board.open(Cell::new(0, 0)));
    // The flood stops at the 1 next to the mine, whose only unopened
    // neighbor must hold it.
    assert!(board.is_opened(Cell::new(3, 0)));
    assert!(!board.is_opened(Cell::new(4, 0)));

    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::flag(Cell::new(4, 0)));
    assert!(!advisor.was_guess());
}

/// Four numbers over one hidden row: 1 2 1 1 below a row whose unique
/// mine arrangement only falls out of the exhaustive search.
fn hidden_row_board() -> TestBoard {
    let mut board = TestBoard::new(4, 2, &[(0, 0), (2, 0)]);
    for x in 0..4 {
        assert!(board.open(Cell::new(x, 1)));
    }
    board
}

#[test]
fn search_finds_the_only_consistent_row() {
    init_logging();
    let mut board = hidden_row_board();
    let mut advisor = Advisor::new();
    advisor.advise(&board);

    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::open(Cell::new(1, 0)));
    assert!(!advisor.was_guess());
    assert!(board.apply(mv));

    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::open(Cell::new(3, 0)));
    assert!(board.apply(mv));
    assert!(board.is_won());

    // With every safe cell open, the committed mines get flagged.
    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::flag(Cell::new(2, 0)));
    board.apply(mv);
    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::flag(Cell::new(0, 0)));
    assert!(!advisor.was_guess());
}

#[test]
fn survey_reports_the_whole_frontier() {
    init_logging();
    let board = hidden_row_board();
    let advisor = Advisor::new();
    let summary = advisor.survey(&board).unwrap();
    assert_eq!(summary[Cell::new(0, 0)], 100);
    assert_eq!(summary[Cell::new(1, 0)], 0);
    assert_eq!(summary[Cell::new(2, 0)], 100);
    assert_eq!(summary[Cell::new(3, 0)], 0);
}

#[test]
fn survey_is_empty_before_anything_is_opened() {
    init_logging();
    let board = TestBoard::new(6, 6, &[(5, 5)]);
    let summary = Advisor::new().survey(&board).unwrap();
    assert!(summary.is_empty());
}

#[test]
fn even_odds_force_a_frontier_guess() {
    init_logging();
    let mut board = TestBoard::new(3, 1, &[(0, 0)]);
    let mut advisor = Advisor::new();
    advisor.advise(&board);
    assert!(board.open(Cell::new(1, 0)));

    // One mine behind two cells: nothing is provable, so the advisor
    // guesses among the 50% cells.
    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::open(Cell::new(2, 0)));
    assert!(advisor.was_guess());
}

#[test]
fn long_odds_prefer_a_mystery_cell() {
    init_logging();
    let mut board = TestBoard::new(3, 3, &[(1, 1)]);
    let mut advisor = Advisor::new();
    advisor.advise(&board);
    assert!(board.open(Cell::new(0, 0)));

    // The three frontier cells carry 33% each; the five cells with no
    // adjacent number share one expected mine, 20% each.
    let mv = advisor.advise(&board);
    assert_eq!(mv, Move::open(Cell::new(2, 0)));
    assert!(advisor.was_guess());
}

#[test]
fn plays_a_seeded_game_legally_to_the_end() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(6332);
    let mut mines = Vec::new();
    while mines.len() < 10 {
        let cell = (rng.random_range(0..9usize), rng.random_range(0..9usize));
        // Keep the guaranteed opening area around the first move clear.
        let shielded = cell.0 <= 3 && cell.1 <= 3;
        if !shielded && !mines.contains(&cell) {
            mines.push(cell);
        }
    }
    let mut board = TestBoard::new(9, 9, &mines);
    let mut advisor = Advisor::new();

    let mut moves = 0;
    let mut lost = false;
    while !board.is_won() && !lost {
        moves += 1;
        assert!(moves <= 200, "game did not terminate");

        let mv = advisor.advise(&board);
        assert!(mv.cell.x < 9 && mv.cell.y < 9);
        match mv.kind {
            MoveKind::Open => assert!(!board.is_opened(mv.cell)),
            MoveKind::Flag => assert!(!board.is_flagged(mv.cell)),
        }
        lost = !board.apply(mv);
    }
    println!(
        "seeded game: {} moves, {}",
        moves,
        if lost { "lost on a guess" } else { "won" }
    );
}
