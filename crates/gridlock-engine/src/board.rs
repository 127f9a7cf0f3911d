//! The game board: coordinates, tiles, items, and reachability.
//!
//! A [`GameMap`] is the coordinate-indexed tile lookup — the one place in
//! the engine that needs keyed access by position. Occupancy is not stored
//! here; pawns own their positions and the caller passes an occupied-set
//! into path queries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A board position. Origin is the top-left corner; `x` grows rightward,
/// `y` grows downward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal neighbors.
    pub fn neighbors(self) -> [Coord; 4] {
        [
            Coord::new(self.x, self.y - 1),
            Coord::new(self.x - 1, self.y),
            Coord::new(self.x + 1, self.y),
            Coord::new(self.x, self.y + 1),
        ]
    }

    /// Orthogonal adjacency (Manhattan distance exactly 1).
    pub fn is_adjacent(self, other: Coord) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A pickup that modifies its holder's combat rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    /// +2 attack.
    Sword,
    /// +2 defense.
    Shield,
    /// +1 attack, +1 defense.
    Charm,
}

impl Item {
    pub fn attack_bonus(self) -> i32 {
        match self {
            Item::Sword => 2,
            Item::Shield => 0,
            Item::Charm => 1,
        }
    }

    pub fn defense_bonus(self) -> i32 {
        match self {
            Item::Sword => 0,
            Item::Shield => 2,
            Item::Charm => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Terrain and tiles
// ---------------------------------------------------------------------------

/// What a tile is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Floor,
    Wall,
    /// What's left of a broken wall. Walkable.
    Rubble,
    Door {
        open: bool,
    },
    /// A spawn tile. Walkable; pawns are placed on these at game start.
    Start,
}

impl Terrain {
    /// Whether a pawn can stand on (and path through) this terrain.
    pub fn is_walkable(self) -> bool {
        match self {
            Terrain::Floor | Terrain::Rubble | Terrain::Start => true,
            Terrain::Door { open } => open,
            Terrain::Wall => false,
        }
    }
}

/// One board cell: terrain plus at most one loose item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub item: Option<Item>,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            item: None,
        }
    }

    pub fn with_item(terrain: Terrain, item: Item) -> Self {
        Self {
            terrain,
            item: Some(item),
        }
    }
}

// ---------------------------------------------------------------------------
// Map errors
// ---------------------------------------------------------------------------

/// Errors raised while parsing or validating a map.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MapError {
    /// The map has no tiles.
    #[error("map is empty")]
    Empty,

    /// An unrecognized character in a map sketch.
    #[error("unknown tile {0:?} at {1}")]
    UnknownTile(char, Coord),

    /// Not enough start tiles for the requested player count.
    #[error("map has {have} start tiles, needs {need}")]
    NotEnoughStartTiles { have: usize, need: usize },
}

// ---------------------------------------------------------------------------
// GameMap
// ---------------------------------------------------------------------------

/// The immutable-shape, mutable-content board for one game.
///
/// Tiles are keyed by coordinate; keys are unique by construction. The
/// geometry (width/height, which coords exist) never changes after load —
/// only terrain (doors, broken walls) and loose items do.
#[derive(Debug, Clone, PartialEq)]
pub struct GameMap {
    name: String,
    width: i32,
    height: i32,
    tiles: HashMap<Coord, Tile>,
}

impl GameMap {
    /// Builds a map from a character sketch, one string per row:
    ///
    /// ```text
    /// #  wall          .  floor        *  rubble
    /// +  closed door   /  open door    S  start tile
    /// s  sword         b  shield       c  charm     (all on floor)
    /// ```
    pub fn parse(name: &str, rows: &[&str]) -> Result<Self, MapError> {
        let mut tiles = HashMap::new();
        let mut width = 0i32;

        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let at = Coord::new(x as i32, y as i32);
                let tile = match ch {
                    '#' => Tile::new(Terrain::Wall),
                    '.' => Tile::new(Terrain::Floor),
                    '*' => Tile::new(Terrain::Rubble),
                    '+' => Tile::new(Terrain::Door { open: false }),
                    '/' => Tile::new(Terrain::Door { open: true }),
                    'S' => Tile::new(Terrain::Start),
                    's' => Tile::with_item(Terrain::Floor, Item::Sword),
                    'b' => Tile::with_item(Terrain::Floor, Item::Shield),
                    'c' => Tile::with_item(Terrain::Floor, Item::Charm),
                    other => return Err(MapError::UnknownTile(other, at)),
                };
                tiles.insert(at, tile);
                width = width.max(x as i32 + 1);
            }
        }

        if tiles.is_empty() {
            return Err(MapError::Empty);
        }

        Ok(Self {
            name: name.to_string(),
            width,
            height: rows.len() as i32,
            tiles,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile(&self, at: Coord) -> Option<&Tile> {
        self.tiles.get(&at)
    }

    pub fn tile_mut(&mut self, at: Coord) -> Option<&mut Tile> {
        self.tiles.get_mut(&at)
    }

    /// Iterates all tiles in unspecified order.
    pub fn tiles(&self) -> impl Iterator<Item = (Coord, &Tile)> {
        self.tiles.iter().map(|(c, t)| (*c, t))
    }

    /// Whether `at` exists and its terrain is walkable.
    pub fn is_walkable(&self, at: Coord) -> bool {
        self.tiles
            .get(&at)
            .is_some_and(|t| t.terrain.is_walkable())
    }

    /// Start tiles in row-major order (deterministic spawn placement).
    pub fn start_tiles(&self) -> Vec<Coord> {
        let mut starts: Vec<Coord> = self
            .tiles
            .iter()
            .filter(|(_, t)| t.terrain == Terrain::Start)
            .map(|(c, _)| *c)
            .collect();
        starts.sort_by_key(|c| (c.y, c.x));
        starts
    }

    /// Checks the map can host `players` pawns.
    pub fn validate(&self, players: usize) -> Result<(), MapError> {
        let have = self.start_tiles().len();
        if have < players {
            return Err(MapError::NotEnoughStartTiles {
                have,
                need: players,
            });
        }
        Ok(())
    }

    /// BFS shortest-path cost from `from` to `to`, stepping only on
    /// walkable, unoccupied tiles, capped at `max_cost` steps.
    ///
    /// Returns `None` when `to` is unreachable within the cap. `from`
    /// itself may be occupied (it's the mover's own tile); `to` must not
    /// be — the caller rejects occupied destinations separately so it can
    /// report `Occupied` rather than `OutOfRange`.
    pub fn path_cost(
        &self,
        from: Coord,
        to: Coord,
        max_cost: u32,
        occupied: &HashSet<Coord>,
    ) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        if !self.is_walkable(to) {
            return None;
        }

        let mut frontier = VecDeque::new();
        let mut cost: HashMap<Coord, u32> = HashMap::new();
        frontier.push_back(from);
        cost.insert(from, 0);

        while let Some(at) = frontier.pop_front() {
            let here = cost[&at];
            if here >= max_cost {
                continue;
            }
            for next in at.neighbors() {
                if cost.contains_key(&next) || !self.is_walkable(next) {
                    continue;
                }
                if occupied.contains(&next) && next != to {
                    continue;
                }
                cost.insert(next, here + 1);
                if next == to {
                    return Some(here + 1);
                }
                frontier.push_back(next);
            }
        }

        None
    }
}

// =========================================================================
// Tests
// =========================================================================
