use ratatui::layout::Rect;

/// Minimal multi-line text buffer backing the form's text fields.
/// Columns are counted in chars, not bytes.
#[derive(Debug, Clone)]
pub struct Editor {
    pub lines: Vec<String>,
    pub cursor_line: usize,
    pub cursor_col: usize,
    pub scroll_offset: usize,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_line: 0,
            cursor_col: 0,
            scroll_offset: 0,
        }
    }

    /// Buffer holding `content` with the cursor at its end
    pub fn from_string(content: &str) -> Self {
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        let cursor_line = lines.len() - 1;
        let cursor_col = lines[cursor_line].chars().count();
        Self {
            lines,
            cursor_line,
            cursor_col,
            scroll_offset: 0,
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn byte_index(line: &str, col: usize) -> usize {
        line.char_indices().nth(col).map(|(i, _)| i).unwrap_or(line.len())
    }

    fn line_len(&self, line: usize) -> usize {
        self.lines[line].chars().count()
    }

    pub fn insert_char(&mut self, ch: char) {
        let line = &mut self.lines[self.cursor_line];
        let at = Self::byte_index(line, self.cursor_col);
        line.insert(at, ch);
        self.cursor_col += 1;
    }

    /// Backspace: delete before the cursor, joining lines at column 0
    pub fn delete_char(&mut self) {
        if self.cursor_col > 0 {
            let line = &mut self.lines[self.cursor_line];
            let at = Self::byte_index(line, self.cursor_col - 1);
            line.remove(at);
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            let current = self.lines.remove(self.cursor_line);
            self.cursor_line -= 1;
            self.cursor_col = self.line_len(self.cursor_line);
            self.lines[self.cursor_line].push_str(&current);
        }
    }

    pub fn insert_newline(&mut self) {
        let line = &mut self.lines[self.cursor_line];
        let at = Self::byte_index(line, self.cursor_col);
        let rest = line.split_off(at);
        self.cursor_line += 1;
        self.lines.insert(self.cursor_line, rest);
        self.cursor_col = 0;
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.cursor_col = self.line_len(self.cursor_line);
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_col < self.line_len(self.cursor_line) {
            self.cursor_col += 1;
        } else if self.cursor_line + 1 < self.lines.len() {
            self.cursor_line += 1;
            self.cursor_col = 0;
        }
    }

    /// Returns false when already on the first line
    pub fn move_cursor_up(&mut self) -> bool {
        if self.cursor_line == 0 {
            return false;
        }
        self.cursor_line -= 1;
        self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_line));
        true
    }

    /// Returns false when already on the last line
    pub fn move_cursor_down(&mut self) -> bool {
        if self.cursor_line + 1 >= self.lines.len() {
            return false;
        }
        self.cursor_line += 1;
        self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_line));
        true
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor_col = self.line_len(self.cursor_line);
    }

    /// Keep the cursor line inside a viewport of `viewport_height` lines
    pub fn update_scroll(&mut self, viewport_height: usize) {
        let height = viewport_height.max(1);
        if self.cursor_line < self.scroll_offset {
            self.scroll_offset = self.cursor_line;
        } else if self.cursor_line >= self.scroll_offset + height {
            self.scroll_offset = self.cursor_line + 1 - height;
        }
    }

    pub fn visible_lines(&self, viewport_height: usize) -> &[String] {
        let end = (self.scroll_offset + viewport_height).min(self.lines.len());
        &self.lines[self.scroll_offset.min(end)..end]
    }

    /// Terminal position of the cursor when the buffer is drawn in `area`
    pub fn cursor_screen_pos(&self, area: Rect) -> Option<(u16, u16)> {
        let row = self.cursor_line.checked_sub(self.scroll_offset)?;
        if row >= area.height as usize {
            return None;
        }
        let col = (self.cursor_col as u16).min(area.width.saturating_sub(1));
        Some((area.x + col, area.y + row as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_and_backspace() {
        let mut editor = Editor::new();
        for ch in "héllo".chars() {
            editor.insert_char(ch);
        }
        editor.delete_char();
        assert_eq!(editor.text(), "héll");
        editor.move_cursor_home();
        editor.move_cursor_right();
        editor.move_cursor_right();
        editor.delete_char();
        assert_eq!(editor.text(), "hll");
    }

    #[test]
    fn test_newline_split_and_join() {
        let mut editor = Editor::from_string("ab");
        editor.move_cursor_left();
        editor.insert_newline();
        assert_eq!(editor.lines, vec!["a", "b"]);
        editor.delete_char();
        assert_eq!(editor.text(), "ab");
        assert_eq!(editor.cursor_col, 1);
    }

    #[test]
    fn test_vertical_movement_clamps_column() {
        let mut editor = Editor::from_string("long line\nab");
        assert!(editor.move_cursor_up());
        assert!(!editor.move_cursor_up());
        editor.move_cursor_end();
        assert!(editor.move_cursor_down());
        assert_eq!(editor.cursor_col, 2);
        assert!(!editor.move_cursor_down());
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let mut editor = Editor::from_string("1\n2\n3\n4\n5");
        editor.update_scroll(2);
        assert_eq!(editor.scroll_offset, 3);
        assert_eq!(editor.visible_lines(2), ["4".to_string(), "5".to_string()]);
        let pos = editor.cursor_screen_pos(Rect::new(10, 5, 20, 2));
        assert_eq!(pos, Some((11, 6)));
    }
}
