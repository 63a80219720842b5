//! Emoji picker palette and grid navigation.

pub const COLUMNS: usize = 10;

pub const PALETTE: [&str; 60] = [
    "😀", "😃", "😄", "😁", "😅", "😂", "🤣", "😊", "😇", "🙂",
    "😉", "😌", "😍", "🥰", "😘", "😗", "😙", "😚", "😋", "😛",
    "😝", "😜", "🤪", "🤨", "🧐", "🤓", "😎", "🤩", "🥳", "😏",
    "😒", "😞", "😔", "😟", "😕", "🙁", "😣", "😖", "😫", "😩",
    "👍", "👎", "👌", "✌️", "🤞", "🤟", "🤘", "🤙", "👈", "👉",
    "❤️", "🧡", "💛", "💚", "💙", "💜", "🖤", "🤍", "🤎", "💔",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Default)]
pub struct EmojiPicker {
    pub open: bool,
    cursor: usize,
}

impl EmojiPicker {
    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &'static str {
        PALETTE[self.cursor]
    }

    /// Moves within the grid. Left/right wrap across row ends; up/down
    /// wrap between the first and last row of the same column.
    pub fn step(&mut self, direction: Direction) {
        let len = PALETTE.len();
        let rows = len.div_ceil(COLUMNS);
        let (row, col) = (self.cursor / COLUMNS, self.cursor % COLUMNS);
        self.cursor = match direction {
            Direction::Left => (self.cursor + len - 1) % len,
            Direction::Right => (self.cursor + 1) % len,
            Direction::Up => ((row + rows - 1) % rows) * COLUMNS + col,
            Direction::Down => ((row + 1) % rows) * COLUMNS + col,
        }
        .min(len - 1);
    }

    /// Returns the highlighted emoji and closes the picker.
    pub fn pick(&mut self) -> &'static str {
        self.open = false;
        self.current()
    }
}
