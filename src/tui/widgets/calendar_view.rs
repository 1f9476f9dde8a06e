use chrono::Datelike;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::calendar::{self, GridCell};
use crate::models::{PlanningEntry, Thumbnail};
use crate::tui::app::App;
use crate::tui::widgets::color::{parse_color, Palette};
use crate::tui::widgets::truncate;

/// Marker appended to a card that carries an image or link
pub fn thumbnail_marker(entry: &PlanningEntry) -> &'static str {
    match entry.thumbnail() {
        Some(Thumbnail::Embedded(_)) => " ▣",
        Some(Thumbnail::Link(_)) => " ↗",
        None => "",
    }
}

/// Compact card text: business icon, type icon, title
pub fn card_label(entry: &PlanningEntry) -> String {
    format!(
        "{}{} {}{}",
        entry.fields.business.icon(),
        entry.fields.post_type.icon(),
        entry.title().unwrap_or("Untitled Idea"),
        thumbnail_marker(entry)
    )
}

/// Range of cards drawn in a cell with `room` lines, scrolled so the
/// selected card stays visible. One line is kept for "+N more" on overflow.
pub fn card_window(count: usize, room: usize, selected: Option<usize>) -> std::ops::Range<usize> {
    if count <= room {
        return 0..count;
    }
    let shown = room.saturating_sub(1);
    let start = match selected {
        Some(index) if shown > 0 && index >= shown => (index + 1 - shown).min(count - shown),
        _ => 0,
    };
    start..start + shown
}

pub fn render_calendar(f: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let week_start = app.config.week_start();
    let cells = app.ui.month.grid(week_start);
    let weeks = cells.len().div_ceil(7).max(1);

    let mut rows = vec![Constraint::Length(1)];
    rows.extend(std::iter::repeat_n(Constraint::Fill(1), weeks));
    let row_areas = Layout::vertical(rows).split(area);
    let columns = Layout::horizontal([Constraint::Ratio(1, 7); 7]);

    let base = Style::default().fg(palette.fg).bg(palette.bg);
    for (header, column) in calendar::weekday_headers(week_start)
        .into_iter()
        .zip(columns.split(row_areas[0]).iter())
    {
        let style = base.add_modifier(Modifier::BOLD);
        f.render_widget(Paragraph::new(header).style(style), *column);
    }

    let entries = app.all_entries();
    for (week, row_area) in cells.chunks(7).zip(row_areas.iter().skip(1)) {
        for (cell, cell_area) in week.iter().zip(columns.split(*row_area).iter()) {
            render_cell(f, *cell_area, cell, entries, app, palette);
        }
    }
}

fn render_cell(f: &mut Frame, area: Rect, cell: &GridCell, entries: &[PlanningEntry], app: &App, palette: &Palette) {
    let GridCell::Day(date) = cell else {
        return;
    };
    // One column gap between days
    let area = Rect::new(area.x, area.y, area.width.saturating_sub(1), area.height);
    let width = area.width as usize;
    let is_selected = *date == app.ui.selected_date;
    let is_today = *date == app.ui.today;

    let base = Style::default().fg(palette.fg).bg(palette.bg);
    let mut day_style = base.add_modifier(Modifier::BOLD);
    if is_today {
        day_style = day_style.fg(palette.today_fg);
    }
    if is_selected {
        day_style = day_style.fg(palette.highlight_fg).bg(palette.highlight_bg);
    }

    let day_entries = calendar::entries_for_cell(cell, entries);
    let day_text = format!("{:<width$}", date.day(), width = width);
    let mut lines = vec![Line::from(Span::styled(day_text, day_style))];

    let room = (area.height as usize).saturating_sub(1);
    let selected = is_selected.then_some(app.ui.entry_index);
    let window = card_window(day_entries.len(), room, selected);
    let hidden = day_entries.len() - window.len();

    for index in window {
        let entry = day_entries[index];
        let mut style = base.fg(parse_color(entry.fields.business.theme()));
        if selected == Some(index) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::from(Span::styled(truncate(&card_label(entry), width), style)));
    }
    if hidden > 0 && room > 0 {
        let more = format!("+{} more", hidden);
        lines.push(Line::from(Span::styled(truncate(&more, width), base.add_modifier(Modifier::DIM))));
    }

    f.render_widget(Paragraph::new(lines).style(base), area);
}
