use chrono::{Datelike, Duration, NaiveDate};
use ratatui::widgets::ListState;
use std::path::PathBuf;
use std::time::Instant;

use crate::calendar::{self, MonthCursor};
use crate::config::Config;
use crate::database::{DatabaseError, Snapshot};
use crate::models::{EntryDraft, EntryId, PlanningEntry, PostType, Status};
use crate::normalizer::{ImageJob, JobStatus};
use crate::services::Services;
use crate::session::AuthError;
use crate::tui::widgets::editor::Editor;

pub const SAVE_FAILED_MESSAGE: &str = "Failed to save. Check your connection.";
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete. Check your connection.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Calendar,
    List,
}

impl ViewMode {
    fn from_config(value: &str) -> Self {
        match value {
            "List" => ViewMode::List,
            _ => ViewMode::Calendar,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Calendar => "Calendar",
            ViewMode::List => "List",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    View,
    Form,
    ConfirmDelete,
    Help,
}

/// What opened the form; decides its title and which content types it offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOrigin {
    /// A day picked on the calendar: location posts only
    Day,
    NewIdea,
    /// Type fixed to monthly blog, dated the 1st of the viewed month
    MonthlyBlog,
    Edit,
}

impl FormOrigin {
    pub fn title(self) -> &'static str {
        match self {
            FormOrigin::Edit => "Edit Content",
            FormOrigin::MonthlyBlog => "New Monthly Blog",
            FormOrigin::Day | FormOrigin::NewIdea => "New Content Idea",
        }
    }

    pub fn type_locked(self) -> bool {
        matches!(self, FormOrigin::Day | FormOrigin::MonthlyBlog)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Business,
    Date,
    Type,
    Status,
    Title,
    Content,
    ImagePath,
    ExternalLink,
}

impl FormField {
    pub const ALL: [FormField; 8] = [
        FormField::Business,
        FormField::Date,
        FormField::Type,
        FormField::Status,
        FormField::Title,
        FormField::Content,
        FormField::ImagePath,
        FormField::ExternalLink,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Business => "Business",
            FormField::Date => "Date",
            FormField::Type => "Content Type",
            FormField::Status => "Status",
            FormField::Title => "Title",
            FormField::Content => "Notes",
            FormField::ImagePath => "Image file",
            FormField::ExternalLink => "External link",
        }
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn step(self, forward: bool) -> Self {
        let len = Self::ALL.len();
        let index = self.position();
        let next = if forward { (index + 1) % len } else { (index + len - 1) % len };
        Self::ALL[next]
    }
}

/// Open entry form. The draft is replaced wholesale on every change and only
/// validated on save.
pub struct EntryForm {
    pub origin: FormOrigin,
    pub draft: EntryDraft,
    pub current_field: FormField,
    pub date: Editor,
    pub title: Editor,
    pub content: Editor,
    pub image_path: Editor,
    pub external_link: Editor,
    pub image_job: Option<ImageJob>,
    initial: EntryDraft,
}

impl EntryForm {
    pub fn new(origin: FormOrigin, draft: EntryDraft) -> Self {
        Self {
            origin,
            current_field: FormField::Title,
            date: Editor::from_string(&draft.date),
            title: Editor::from_string(&draft.title),
            content: Editor::from_string(&draft.content),
            image_path: Editor::new(),
            external_link: Editor::from_string(&draft.external_link),
            image_job: None,
            initial: draft.clone(),
            draft,
        }
    }

    pub fn title(&self) -> &'static str {
        self.origin.title()
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.initial
    }

    pub fn is_compressing(&self) -> bool {
        self.image_job.is_some()
    }

    pub fn editor(&self, field: FormField) -> Option<&Editor> {
        match field {
            FormField::Date => Some(&self.date),
            FormField::Title => Some(&self.title),
            FormField::Content => Some(&self.content),
            FormField::ImagePath => Some(&self.image_path),
            FormField::ExternalLink => Some(&self.external_link),
            FormField::Business | FormField::Type | FormField::Status => None,
        }
    }

    pub fn current_editor_mut(&mut self) -> Option<&mut Editor> {
        match self.current_field {
            FormField::Date => Some(&mut self.date),
            FormField::Title => Some(&mut self.title),
            FormField::Content => Some(&mut self.content),
            FormField::ImagePath => Some(&mut self.image_path),
            FormField::ExternalLink => Some(&mut self.external_link),
            FormField::Business | FormField::Type | FormField::Status => None,
        }
    }

    /// Fold the text fields back into a fresh draft
    pub fn sync_draft(&mut self) {
        self.draft = self
            .draft
            .clone()
            .with_date(self.date.text())
            .with_title(self.title.text())
            .with_content(self.content.text())
            .with_external_link(self.external_link.text());
    }

    /// Cycle the choice under the cursor. Returns false on text fields and
    /// on a locked content type.
    pub fn cycle_choice(&mut self, forward: bool) -> bool {
        let draft = self.draft.clone();
        self.draft = match self.current_field {
            FormField::Business => {
                let business = draft.business.next();
                draft.with_business(business)
            }
            FormField::Type if !self.origin.type_locked() => {
                let post_type = draft.post_type.next();
                draft.with_post_type(post_type)
            }
            FormField::Status => {
                let status = if forward {
                    draft.status.next()
                } else {
                    previous_status(draft.status)
                };
                draft.with_status(status)
            }
            _ => return false,
        };
        true
    }

    pub fn next_field(&mut self) {
        self.current_field = self.current_field.step(true);
    }

    pub fn prev_field(&mut self) {
        self.current_field = self.current_field.step(false);
    }
}

fn previous_status(status: Status) -> Status {
    let len = Status::ALL.len();
    (1..len).fold(status, |s, _| s.next())
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub view: ViewMode,
    pub mode: Mode,
    pub month: MonthCursor,
    pub selected_date: NaiveDate,
    /// Index into the selected day's entries
    pub entry_index: usize,
    pub list_state: ListState,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct ModalState {
    pub delete_confirmation: Option<EntryId>,
    /// 0 = Delete, 1 = Cancel
    pub delete_modal_selection: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StatusState {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

#[derive(Default)]
pub struct FormState {
    pub entry_form: Option<EntryForm>,
}

pub struct App {
    // Core infrastructure
    pub config: Config,
    pub services: Services,

    /// Latest pushed snapshot, sorted by date. None until the first push.
    pub entries: Option<Snapshot>,
    pub auth_error: Option<String>,

    // Grouped state
    pub ui: UiState,
    pub form: FormState,
    pub modals: ModalState,
    pub status: StatusState,
}

impl App {
    pub fn new(config: Config, services: Services, auth_error: Option<AuthError>) -> Self {
        let today = crate::utils::today();
        let view = ViewMode::from_config(&config.default_view);
        let mut app = Self {
            config,
            services,
            entries: None,
            auth_error: auth_error.map(|e| e.to_string()),
            ui: UiState {
                view,
                mode: Mode::View,
                month: MonthCursor::containing(today),
                selected_date: today,
                entry_index: 0,
                list_state: ListState::default(),
                today,
            },
            form: FormState::default(),
            modals: ModalState::default(),
            status: StatusState::default(),
        };
        if let Some(message) = app.auth_error.clone() {
            app.set_status_message(message);
        }
        app
    }

    /// One turn of background work: session and snapshot pushes, the image
    /// job, and the status timeout
    pub fn tick(&mut self) {
        self.check_status_message_timeout();
        match self.services.pump() {
            Ok(Some(snapshot)) => self.apply_snapshot(snapshot),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "failed to refresh entries");
                self.set_status_message(format!("Sync error: {}", e));
            }
        }
        self.poll_image_job();
    }

    pub fn apply_snapshot(&mut self, mut snapshot: Snapshot) {
        calendar::sort_by_date(&mut snapshot);
        tracing::debug!(entries = snapshot.len(), "snapshot received");
        self.entries = Some(snapshot);
        self.clamp_selection();
    }

    pub fn is_loading(&self) -> bool {
        self.services.identity().is_none() || self.entries.is_none()
    }

    pub fn all_entries(&self) -> &[PlanningEntry] {
        self.entries.as_deref().unwrap_or(&[])
    }

    pub fn day_entries(&self) -> Vec<&PlanningEntry> {
        calendar::entries_for_date(self.ui.selected_date, self.all_entries())
    }

    pub fn selected_entry(&self) -> Option<&PlanningEntry> {
        match self.ui.view {
            ViewMode::Calendar => self.day_entries().get(self.ui.entry_index).copied(),
            ViewMode::List => self.ui.list_state.selected().and_then(|i| self.all_entries().get(i)),
        }
    }

    fn clamp_selection(&mut self) {
        let day_count = self.day_entries().len();
        if self.ui.entry_index >= day_count {
            self.ui.entry_index = 0;
        }
        let total = self.all_entries().len();
        match self.ui.list_state.selected() {
            _ if total == 0 => self.ui.list_state.select(None),
            None => self.ui.list_state.select(Some(0)),
            Some(i) if i >= total => self.ui.list_state.select(Some(total - 1)),
            Some(_) => {}
        }
    }

    // Navigation

    pub fn select_date(&mut self, date: NaiveDate) {
        self.ui.selected_date = date;
        if !self.ui.month.contains(date) {
            self.ui.month = MonthCursor::containing(date);
        }
        self.ui.entry_index = 0;
    }

    pub fn move_selected_day(&mut self, days: i64) {
        if let Some(date) = self.ui.selected_date.checked_add_signed(Duration::days(days)) {
            self.select_date(date);
        }
    }

    /// Change the viewed month, keeping the day of month where it exists
    pub fn shift_month(&mut self, delta: i32) {
        self.ui.month = self.ui.month.shift(delta);
        self.ui.selected_date = self.ui.month.clamp_day(self.ui.selected_date.day());
        self.ui.entry_index = 0;
    }

    pub fn go_to_today(&mut self) {
        self.ui.today = crate::utils::today();
        self.select_date(self.ui.today);
    }

    pub fn toggle_view(&mut self) {
        self.ui.view = match self.ui.view {
            ViewMode::Calendar => ViewMode::List,
            ViewMode::List => ViewMode::Calendar,
        };
        self.clamp_selection();
    }

    pub fn cycle_day_entry(&mut self) {
        let count = self.day_entries().len();
        if count > 0 {
            self.ui.entry_index = (self.ui.entry_index + 1) % count;
        }
    }

    pub fn move_list_selection(&mut self, delta: i32) {
        let total = self.all_entries().len();
        if total == 0 {
            return;
        }
        let current = self.ui.list_state.selected().unwrap_or(0) as i64;
        let next = (current + delta as i64).clamp(0, total as i64 - 1);
        self.ui.list_state.select(Some(next as usize));
    }

    // Form lifecycle

    fn open_form(&mut self, origin: FormOrigin, draft: EntryDraft) {
        if let Some(previous) = self.form.entry_form.take() {
            if previous.is_dirty() {
                tracing::debug!(form = previous.title(), "discarding unsaved draft");
            }
        }
        self.form.entry_form = Some(EntryForm::new(origin, draft));
        self.ui.mode = Mode::Form;
    }

    pub fn open_new_on_selected_day(&mut self) {
        let draft = EntryDraft::for_date(self.ui.selected_date, Some(PostType::LocationPost));
        self.open_form(FormOrigin::Day, draft);
    }

    pub fn open_new_idea(&mut self) {
        let draft = EntryDraft::for_date(self.ui.selected_date, None);
        self.open_form(FormOrigin::NewIdea, draft);
    }

    pub fn open_plan_blog(&mut self) {
        let draft = EntryDraft::for_date(self.ui.month.first_day(), Some(PostType::MonthlyBlog));
        self.open_form(FormOrigin::MonthlyBlog, draft);
    }

    pub fn open_edit_selected(&mut self) {
        match self.selected_entry().map(EntryDraft::from_entry) {
            Some(draft) => self.open_form(FormOrigin::Edit, draft),
            None => self.set_status_message("No content selected".to_string()),
        }
    }

    /// Close the form. An in-flight image job is dropped with it.
    pub fn close_form(&mut self) {
        if let Some(form) = self.form.entry_form.take() {
            if form.is_compressing() {
                tracing::debug!("image job cancelled");
            }
        }
        self.ui.mode = Mode::View;
    }

    pub fn attach_image(&mut self) {
        let Some(form) = self.form.entry_form.as_mut() else {
            return;
        };
        let path = form.image_path.text().trim().to_string();
        if path.is_empty() {
            self.set_status_message("Enter an image file path first".to_string());
            return;
        }
        let path = crate::utils::expand_path(&path);
        tracing::debug!(path = %path.display(), "compressing image");
        form.image_job = Some(ImageJob::spawn(path));
    }

    /// Apply a finished image job. A failure leaves the prior image untouched.
    pub fn poll_image_job(&mut self) {
        let Some(form) = self.form.entry_form.as_mut() else {
            return;
        };
        let Some(job) = form.image_job.as_ref() else {
            return;
        };
        let result = match job.poll() {
            JobStatus::Pending => return,
            JobStatus::Done(result) => result,
        };
        let source: PathBuf = job.source.clone();
        form.image_job = None;

        match result {
            Ok(image) => {
                form.draft = form.draft.clone().with_image(image.data_url);
                form.image_path = Editor::new();
                let message = format!("Image attached ({} KB)", image.encoded_bytes.div_ceil(1024));
                self.set_status_message(message);
            }
            Err(e) => {
                tracing::warn!(path = %source.display(), error = %e, "image rejected");
                self.set_status_message(e.to_string());
            }
        }
    }

    pub fn remove_image(&mut self) {
        if let Some(form) = self.form.entry_form.as_mut() {
            form.draft = form.draft.clone().without_image();
        }
    }

    /// Validate and persist the form. It closes only once the store accepted
    /// the write; the list itself updates from the next pushed snapshot.
    pub fn save_form(&mut self) {
        let Some(form) = self.form.entry_form.as_mut() else {
            return;
        };
        form.sync_draft();
        let fields = match form.draft.validate() {
            Ok(fields) => fields,
            Err(e) => {
                self.set_status_message(e.to_string());
                return;
            }
        };
        let id = form.draft.id.clone();

        match self.services.save(id.as_ref(), &fields) {
            Ok(true) => {
                self.close_form();
                self.set_status_message("Saved".to_string());
            }
            Ok(false) => {}
            Err(e) => {
                log_backend_failure("save", id.as_ref(), &e);
                self.set_status_message(SAVE_FAILED_MESSAGE.to_string());
            }
        }
    }

    /// Ask for confirmation before deleting the entry open in the form, or
    /// the selected entry when no form is open
    pub fn request_delete(&mut self) {
        let id = match self.form.entry_form.as_ref() {
            Some(form) => form.draft.id.clone(),
            None => self.selected_entry().map(|entry| entry.id.clone()),
        };
        if let Some(id) = id {
            self.modals.delete_confirmation = Some(id);
            self.modals.delete_modal_selection = 1;
            self.ui.mode = Mode::ConfirmDelete;
        }
    }

    pub fn cancel_delete(&mut self) {
        self.modals.delete_confirmation = None;
        self.ui.mode = if self.form.entry_form.is_some() { Mode::Form } else { Mode::View };
    }

    /// Run the option highlighted in the confirmation popup
    pub fn confirm_delete(&mut self) {
        let Some(id) = self.modals.delete_confirmation.take() else {
            return;
        };
        if self.modals.delete_modal_selection != 0 {
            self.cancel_delete();
            return;
        }
        match self.services.delete(&id) {
            Ok(true) => {
                self.close_form();
                self.set_status_message("Deleted".to_string());
            }
            Ok(false) => self.cancel_delete(),
            Err(e) => {
                log_backend_failure("delete", Some(&id), &e);
                self.cancel_delete();
                self.set_status_message(DELETE_FAILED_MESSAGE.to_string());
            }
        }
    }

    pub fn enter_help_mode(&mut self) {
        self.ui.mode = Mode::Help;
    }

    pub fn exit_help_mode(&mut self) {
        self.ui.mode = if self.form.entry_form.is_some() { Mode::Form } else { Mode::View };
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    pub fn check_status_message_timeout(&mut self) {
        if let Some(time) = self.status.message_time {
            if time.elapsed().as_secs() >= self.config.status_message_secs {
                self.clear_status_message();
            }
        }
    }

    /// End the session and release the store
    pub fn shutdown(mut self) -> Result<(), DatabaseError> {
        self.close_form();
        self.services.shutdown()
    }
}

fn log_backend_failure(operation: &str, id: Option<&EntryId>, error: &DatabaseError) {
    match id {
        Some(id) => tracing::error!(operation, id = %id, error = %error, "backend operation failed"),
        None => tracing::error!(operation, error = %error, "backend operation failed"),
    }
}
