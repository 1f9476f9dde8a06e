use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, size as terminal_size};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::io;
use std::time::Duration;

use crate::config::KeyBindings;
use crate::tui::app::{App, FormField, Mode, ViewMode};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::utils::parse_key_binding;

/// Guard that ensures terminal state is restored even on panic.
/// Without it a crash leaves the user's terminal in raw mode.
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Restore on normal exit; the guard does nothing on drop afterwards
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Already in a cleanup path, errors are ignored
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

/// Reject unparseable bindings before the terminal is taken over
pub fn validate_key_bindings(bindings: &KeyBindings) -> Result<(), TuiError> {
    let all: [(&'static str, &str); 14] = [
        ("quit", &bindings.quit),
        ("new", &bindings.new),
        ("new_any", &bindings.new_any),
        ("plan_blog", &bindings.plan_blog),
        ("edit", &bindings.edit),
        ("save", &bindings.save),
        ("delete", &bindings.delete),
        ("attach_image", &bindings.attach_image),
        ("remove_image", &bindings.remove_image),
        ("toggle_view", &bindings.toggle_view),
        ("prev_month", &bindings.prev_month),
        ("next_month", &bindings.next_month),
        ("today", &bindings.today),
        ("help", &bindings.help),
    ];
    for (action, binding) in all {
        parse_key_binding(binding).map_err(|reason| TuiError::KeyBindingError { action, reason })?;
    }
    Ok(())
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    validate_key_bindings(&app.config.key_bindings)?;

    // Check size before entering the alternate screen so the error is readable
    let (width, height) = terminal_size()?;
    let min_width = Layout::MIN_WIDTH + 2;
    let min_height = Layout::MIN_HEIGHT + 2;
    if width < min_width || height < min_height {
        return Err(TuiError::TerminalTooSmall {
            width,
            height,
            min_width,
            min_height,
        });
    }

    let mut guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        app.tick();

        let size = terminal.size()?;
        let layout = Layout::calculate(Rect::new(0, 0, size.width, size.height));
        terminal.draw(|f| crate::tui::render::render(f, &mut app, &layout))?;

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                // Only Press events; Windows also reports releases
                Event::Key(key_event) if key_event.kind == KeyEventKind::Press => {
                    if handle_key_event(&mut app, key_event) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    guard.restore()?;
    app.shutdown()?;
    Ok(())
}

fn matches_binding(binding: &str, key_event: &KeyEvent) -> bool {
    parse_key_binding(binding)
        .map(|parsed| parsed.matches(key_event))
        .unwrap_or(false)
}

/// Returns true when the user asked to quit
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> bool {
    match app.ui.mode {
        Mode::Help => {
            handle_help_mode(app, key_event);
            false
        }
        Mode::ConfirmDelete => {
            handle_delete_confirmation(app, key_event);
            false
        }
        Mode::Form => {
            handle_form_mode(app, key_event);
            false
        }
        Mode::View => handle_view_mode(app, key_event),
    }
}

fn handle_help_mode(app: &mut App, key_event: KeyEvent) {
    if key_event.code == KeyCode::Esc
        || matches_binding(&app.config.key_bindings.help, &key_event)
        || matches_binding(&app.config.key_bindings.quit, &key_event)
    {
        app.exit_help_mode();
    }
}

fn handle_delete_confirmation(app: &mut App, key_event: KeyEvent) {
    match key_event.code {
        KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
            app.modals.delete_modal_selection = 1 - app.modals.delete_modal_selection.min(1);
        }
        KeyCode::Char('y') => {
            app.modals.delete_modal_selection = 0;
            app.confirm_delete();
        }
        KeyCode::Enter => app.confirm_delete(),
        KeyCode::Esc | KeyCode::Char('n') => app.cancel_delete(),
        _ => {}
    }
}

fn handle_view_mode(app: &mut App, key_event: KeyEvent) -> bool {
    let bindings = app.config.key_bindings.clone();

    if matches_binding(&bindings.quit, &key_event) {
        return true;
    }
    if matches_binding(&bindings.help, &key_event) {
        app.enter_help_mode();
        return false;
    }
    // Nothing to act on until the first snapshot arrives
    if app.is_loading() {
        return false;
    }

    if matches_binding(&bindings.toggle_view, &key_event) {
        app.toggle_view();
    } else if matches_binding(&bindings.prev_month, &key_event) {
        app.shift_month(-1);
    } else if matches_binding(&bindings.next_month, &key_event) {
        app.shift_month(1);
    } else if matches_binding(&bindings.today, &key_event) {
        app.go_to_today();
    } else if matches_binding(&bindings.new, &key_event) {
        app.open_new_on_selected_day();
    } else if matches_binding(&bindings.new_any, &key_event) {
        app.open_new_idea();
    } else if matches_binding(&bindings.plan_blog, &key_event) {
        app.open_plan_blog();
    } else if matches_binding(&bindings.edit, &key_event) {
        app.open_edit_selected();
    } else if matches_binding(&bindings.delete, &key_event) {
        app.request_delete();
    } else {
        match app.ui.view {
            ViewMode::Calendar => handle_calendar_navigation(app, key_event),
            ViewMode::List => handle_list_navigation(app, key_event),
        }
    }
    false
}

fn handle_calendar_navigation(app: &mut App, key_event: KeyEvent) {
    match key_event.code {
        KeyCode::Left | KeyCode::Char('h') => app.move_selected_day(-1),
        KeyCode::Right | KeyCode::Char('l') => app.move_selected_day(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selected_day(-7),
        KeyCode::Down | KeyCode::Char('j') => app.move_selected_day(7),
        KeyCode::Tab => app.cycle_day_entry(),
        _ => {}
    }
}

fn handle_list_navigation(app: &mut App, key_event: KeyEvent) {
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_list_selection(-1),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => app.move_list_selection(1),
        KeyCode::PageUp => app.move_list_selection(-10),
        KeyCode::PageDown => app.move_list_selection(10),
        _ => {}
    }
}

fn handle_form_mode(app: &mut App, key_event: KeyEvent) {
    let bindings = app.config.key_bindings.clone();

    if key_event.code == KeyCode::Esc {
        app.close_form();
        return;
    }
    if matches_binding(&bindings.save, &key_event) {
        app.save_form();
        return;
    }
    if matches_binding(&bindings.delete, &key_event) {
        app.request_delete();
        return;
    }
    if matches_binding(&bindings.remove_image, &key_event) {
        app.remove_image();
        return;
    }
    if matches_binding(&bindings.attach_image, &key_event) {
        app.attach_image();
        return;
    }
    if matches_binding(&bindings.help, &key_event) {
        app.enter_help_mode();
        return;
    }

    let Some(form) = app.form.entry_form.as_mut() else {
        return;
    };

    match key_event.code {
        KeyCode::Tab => {
            form.next_field();
            return;
        }
        KeyCode::BackTab => {
            form.prev_field();
            return;
        }
        _ => {}
    }

    // Choice fields: Business, Type, Status
    if form.editor(form.current_field).is_none() {
        match key_event.code {
            KeyCode::Left => {
                form.cycle_choice(false);
            }
            KeyCode::Right | KeyCode::Char(' ') => {
                form.cycle_choice(true);
            }
            KeyCode::Up => form.prev_field(),
            KeyCode::Down | KeyCode::Enter => form.next_field(),
            _ => {}
        }
        return;
    }

    let multi_line = form.current_field == FormField::Content;
    let is_image_path = form.current_field == FormField::ImagePath;
    let Some(editor) = form.current_editor_mut() else {
        return;
    };

    match key_event.code {
        KeyCode::Char(ch) if !key_event.modifiers.contains(KeyModifiers::CONTROL) => editor.insert_char(ch),
        KeyCode::Backspace => editor.delete_char(),
        KeyCode::Left => editor.move_cursor_left(),
        KeyCode::Right => editor.move_cursor_right(),
        KeyCode::Home => editor.move_cursor_home(),
        KeyCode::End => editor.move_cursor_end(),
        KeyCode::Enter if multi_line => editor.insert_newline(),
        KeyCode::Enter if is_image_path => {
            app.attach_image();
            return;
        }
        KeyCode::Enter => form.next_field(),
        KeyCode::Up => {
            if !editor.move_cursor_up() {
                form.prev_field();
            }
        }
        KeyCode::Down => {
            if !editor.move_cursor_down() {
                form.next_field();
            }
        }
        _ => {}
    }
    form.sync_draft();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::Services;
    use chrono::NaiveDate;

    fn app() -> App {
        let mut services = Services::open_in_memory("content_posts").unwrap();
        services.sign_in(None).unwrap();
        let mut app = App::new(Config::default(), services, None);
        app.tick();
        app.select_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        app
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut App, ch: char) -> bool {
        handle_key_event(app, KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn test_quit_from_view() {
        let mut app = app();
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_typing_q_in_form_does_not_quit() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.ui.mode, Mode::Form);
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.form.entry_form.as_ref().unwrap().draft.title, "q");
    }

    #[test]
    fn test_calendar_keys_move_selection() {
        let mut app = app();
        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.ui.selected_date, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
        press(&mut app, KeyCode::Up);
        assert_eq!(app.ui.selected_date, NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        press(&mut app, KeyCode::Char(']'));
        assert_eq!(app.ui.selected_date, NaiveDate::from_ymd_opt(2025, 4, 9).unwrap());
        press(&mut app, KeyCode::Char('v'));
        assert_eq!(app.ui.view, ViewMode::List);
    }

    #[test]
    fn test_create_entry_with_keyboard() {
        let mut app = app();
        press(&mut app, KeyCode::Char('N'));
        type_text(&mut app, "Spring tips");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "line one");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "line two");
        ctrl(&mut app, 's');
        assert_eq!(app.ui.mode, Mode::View);

        app.tick();
        let entry = app.selected_entry().unwrap();
        assert_eq!(entry.title(), Some("Spring tips"));
        assert_eq!(entry.fields.content.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_choice_fields_cycle_with_arrows() {
        let mut app = app();
        press(&mut app, KeyCode::Char('N'));
        // Title -> Status
        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::Right);
        let form = app.form.entry_form.as_ref().unwrap();
        assert_eq!(form.current_field, FormField::Status);
        assert_eq!(form.draft.status, crate::models::Status::Drafting);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.form.entry_form.as_ref().unwrap().draft.status, crate::models::Status::Published);
    }

    #[test]
    fn test_escape_closes_form_and_delete_needs_confirmation() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        ctrl(&mut app, 's');
        app.tick();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.ui.mode, Mode::Form);

        ctrl(&mut app, 'd');
        assert_eq!(app.ui.mode, Mode::ConfirmDelete);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.ui.mode, Mode::Form);

        ctrl(&mut app, 'd');
        press(&mut app, KeyCode::Char('y'));
        app.tick();
        assert!(app.all_entries().is_empty());

        press(&mut app, KeyCode::Char('N'));
        press(&mut app, KeyCode::Esc);
        assert!(app.form.entry_form.is_none());
    }

    #[test]
    fn test_delete_from_view_mode_asks_first() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Doomed");
        ctrl(&mut app, 's');
        app.tick();
        assert_eq!(app.ui.mode, Mode::View);

        ctrl(&mut app, 'd');
        assert_eq!(app.ui.mode, Mode::ConfirmDelete);
        assert_eq!(app.modals.delete_modal_selection, 1);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.ui.mode, Mode::View);
        app.tick();
        assert_eq!(app.all_entries().len(), 1);

        ctrl(&mut app, 'd');
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.ui.mode, Mode::View);
        app.tick();
        assert!(app.all_entries().is_empty());
    }

    #[test]
    fn test_help_toggles() {
        let mut app = app();
        press(&mut app, KeyCode::F(1));
        assert_eq!(app.ui.mode, Mode::Help);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.ui.mode, Mode::View);
    }

    #[test]
    fn test_invalid_binding_is_rejected() {
        let mut bindings = KeyBindings::default();
        assert!(validate_key_bindings(&bindings).is_ok());
        bindings.save = "Ctrl+Banana".to_string();
        assert!(matches!(
            validate_key_bindings(&bindings),
            Err(TuiError::KeyBindingError { action: "save", .. })
        ));
    }
}
