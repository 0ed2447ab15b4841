use crate::error::Position;

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Character reader with line/column tracking and one character of
/// lookback; the grammar never needs more. `pos()` is the position of the
/// next character to be read. Tabs advance the column to the next
/// multiple-of-8 boundary.
pub struct Reader {
    chars: Vec<char>,
    cursor: usize,
    pos: Position,
    prev_pos: Position,
}

impl Reader {
    pub fn new(text: &str) -> Self {
        Reader {
            chars: text.chars().collect(),
            cursor: 0,
            pos: Position::default(),
            prev_pos: Position::default(),
        }
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.cursor).copied()
    }

    pub fn read(&mut self) -> Option<char> {
        let c = *self.chars.get(self.cursor)?;
        self.cursor += 1;
        self.prev_pos = self.pos;
        match c {
            '\n' => {
                self.pos.line += 1;
                self.pos.column = 0;
            }
            '\t' => {
                self.pos.column = self.pos.column - self.pos.column % 8 + 8;
            }
            _ => self.pos.column += 1,
        }
        Some(c)
    }

    /// Push the last-read character back, restoring its position.
    pub fn unread(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.pos = self.prev_pos;
        }
    }

    pub fn read_while(&mut self, mut keep: impl FnMut(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.read() {
            if !keep(c) {
                self.unread();
                break;
            }
            s.push(c);
        }
        s
    }

    pub fn skip_whitespace(&mut self) {
        self.read_while(char::is_whitespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_line_and_column() {
        let mut r = Reader::new("ab\ncd");
        assert_eq!(r.pos(), Position { line: 0, column: 0 });
        r.read();
        r.read();
        assert_eq!(r.pos(), Position { line: 0, column: 2 });
        r.read(); // newline
        assert_eq!(r.pos(), Position { line: 1, column: 0 });
        r.read();
        assert_eq!(r.pos(), Position { line: 1, column: 1 });
    }

    #[test]
    fn tab_advances_to_next_tab_stop() {
        let mut r = Reader::new("ab\tc");
        r.read();
        r.read();
        r.read(); // tab at column 2
        assert_eq!(r.pos(), Position { line: 0, column: 8 });
        r.read();
        assert_eq!(r.pos(), Position { line: 0, column: 9 });
    }

    #[test]
    fn unread_restores_the_previous_position() {
        let mut r = Reader::new("x\ny");
        r.read();
        r.read();
        assert_eq!(r.pos(), Position { line: 1, column: 0 });
        r.unread();
        assert_eq!(r.pos(), Position { line: 0, column: 1 });
        assert_eq!(r.read(), Some('\n'));
    }

    #[test]
    fn read_while_stops_at_the_first_reject() {
        let mut r = Reader::new("abc123 x");
        let word = r.read_while(|c| c.is_alphanumeric());
        assert_eq!(word, "abc123");
        assert_eq!(r.read(), Some(' '));
    }
}
