use chrono::{Datelike, NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::calendar::{self, GridCell, MonthCursor};
use crate::database::{Database, DatabaseError};
use crate::models::{Business, DraftError, EntryDraft, EntryId, PlanningEntry, PostType, Status, Thumbnail};
use crate::normalizer::{self, ImageError};
use crate::services::Services;

#[derive(Parser)]
#[command(name = "ccal")]
#[command(about = "Content Calendar - plan blog and location posts with your team")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Pre-issued sign-in token
    #[arg(long, env = "CCAL_AUTH_TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Add a content idea
    Add(AddArgs),
    /// List content ideas sorted by date
    List {
        /// Only show this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
    },
    /// Delete a content idea by ID
    Delete {
        id: String,
    },
    /// Issue a sign-in token for a collaborator
    IssueToken {
        /// Display name of the collaborator
        name: String,
    },
    /// Resize and re-encode an image the way attachments are stored
    Normalize {
        input: PathBuf,
        output: PathBuf,
    },
    /// Print a month grid with the number of ideas per day
    Grid {
        /// Month to print (YYYY-MM)
        month: String,
    },
}

#[derive(Args)]
pub struct AddArgs {
    /// Date (YYYY-MM-DD)
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub title: Option<String>,
    /// Notes
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long, default_value = "HOWDY", value_parser = ["HOWDY", "PINK"])]
    pub business: String,
    #[arg(long = "type", default_value = "GMB", value_parser = ["BLOG", "GMB"])]
    pub post_type: String,
    #[arg(long, default_value = "IDEA", value_parser = ["IDEA", "DRAFTING", "IN_REVIEW", "APPROVED", "PUBLISHED"])]
    pub status: String,
    /// Image file to attach
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// External media link
    #[arg(long)]
    pub link: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Invalid entry: {0}")]
    DraftError(#[from] DraftError),
    #[error("Image error: {0}")]
    ImageError(#[from] ImageError),
    #[error("Failed to parse month '{0}', expected YYYY-MM")]
    MonthParseError(String),
    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not signed in")]
    NotSignedIn,
}

/// Parse "YYYY-MM" into a month cursor
pub fn parse_month(value: &str) -> Result<MonthCursor, CliError> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .map(MonthCursor::containing)
        .map_err(|_| CliError::MonthParseError(value.to_string()))
}

/// Handle the add command
pub fn handle_add(args: AddArgs, services: &Services) -> Result<(), CliError> {
    let date = crate::models::parse_date_key(args.date.trim())
        .map_err(|_| DraftError::InvalidDate(args.date.clone()))?;

    let mut draft = EntryDraft::for_date(date, Some(PostType::from_key(&args.post_type)))
        .with_business(Business::from_key(&args.business))
        .with_status(Status::from_key(&args.status).unwrap_or(Status::Idea))
        .with_title(args.title.unwrap_or_default())
        .with_content(args.content.unwrap_or_default())
        .with_external_link(args.link.unwrap_or_default());

    if let Some(path) = args.image {
        let image = normalizer::normalize_file(&path)?;
        println!("Image compressed to {}x{} ({} bytes)", image.width, image.height, image.encoded_bytes);
        draft = draft.with_image(image.data_url);
    }

    let fields = draft.validate()?;
    if !services.save(None, &fields)? {
        return Err(CliError::NotSignedIn);
    }
    println!("Content idea added for {}", fields.date);
    Ok(())
}

/// Handle the list command
pub fn handle_list(month: Option<String>, services: &Services) -> Result<(), CliError> {
    let cursor = month.as_deref().map(parse_month).transpose()?;
    let mut entries = services.database().snapshot(services.collection())?;
    if let Some(cursor) = cursor {
        entries.retain(|e| {
            crate::models::parse_date_key(e.date())
                .map(|d| cursor.contains(d))
                .unwrap_or(false)
        });
    }
    calendar::sort_by_date(&mut entries);

    if entries.is_empty() {
        println!("No content yet");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry_line(entry));
    }
    Ok(())
}

/// Handle the delete command
pub fn handle_delete(id: String, services: &Services) -> Result<(), CliError> {
    let id = EntryId::new(id);
    if !services.delete(&id)? {
        return Err(CliError::NotSignedIn);
    }
    println!("Deleted {}", id);
    Ok(())
}

/// Handle the issue-token command
pub fn handle_issue_token(name: String, database: &Database) -> Result<(), CliError> {
    let (token, identity) = database.issue_token(&name)?;
    println!("Token for {} ({}):", identity.display(), identity.uid);
    println!("{}", token);
    Ok(())
}

/// Handle the normalize command
pub fn handle_normalize(input: PathBuf, output: PathBuf) -> Result<(), CliError> {
    let image = normalizer::normalize_file(&input)?;
    let bytes = normalizer::decode_data_url(&image.data_url).unwrap_or_default();
    fs::write(&output, bytes).map_err(|source| CliError::WriteError {
        path: output.clone(),
        source,
    })?;
    println!(
        "Wrote {} ({}x{}, {} bytes)",
        output.display(),
        image.width,
        image.height,
        image.encoded_bytes
    );
    Ok(())
}

/// Handle the grid command
pub fn handle_grid(month: String, week_start: Weekday, services: &Services) -> Result<(), CliError> {
    let cursor = parse_month(&month)?;
    let entries = services.database().snapshot(services.collection())?;
    print!("{}", render_grid(cursor, week_start, &entries));
    Ok(())
}

/// One line per entry: date, business, type, status, title and media marker
pub fn format_entry_line(entry: &PlanningEntry) -> String {
    let fields = &entry.fields;
    let media = match entry.thumbnail() {
        Some(Thumbnail::Embedded(_)) => " [image]",
        Some(Thumbnail::Link(_)) => " [link]",
        None => "",
    };
    format!(
        "{}  {:<18} {:<10} {:<10} {}{}  ({})",
        fields.date,
        fields.business.label(),
        fields.post_type.badge(),
        fields.status.map(Status::label).unwrap_or("-"),
        entry.title().unwrap_or("Untitled Post"),
        media,
        entry.id
    )
}

/// Text month grid; each day shows its number and the count of ideas on it
pub fn render_grid(cursor: MonthCursor, week_start: Weekday, entries: &[PlanningEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:^42}", cursor.label());
    for header in calendar::weekday_headers(week_start) {
        let _ = write!(out, "{:<6}", header);
    }
    out.push('\n');

    for week in cursor.grid(week_start).chunks(7) {
        for cell in week {
            let text = match cell {
                GridCell::Blank => String::new(),
                GridCell::Day(date) => {
                    let count = calendar::entries_for_cell(cell, entries).len();
                    match count {
                        0 => date.day().to_string(),
                        n => format!("{}({})", date.day(), n),
                    }
                }
            };
            let _ = write!(out, "{:<6}", text);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditStamp, EntryFields};

    fn entry(id: &str, date: &str, title: Option<&str>) -> PlanningEntry {
        PlanningEntry {
            id: EntryId::new(id),
            fields: EntryFields {
                title: title.map(str::to_string),
                content: None,
                post_type: PostType::MonthlyBlog,
                business: Business::PinkShark,
                status: None,
                date: date.to_string(),
                image_data: None,
                external_link: Some("https://example.com/a.jpg".to_string()),
            },
            audit: AuditStamp::default(),
        }
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-03").unwrap(), MonthCursor::new(2025, 2));
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("March").is_err());
    }

    #[test]
    fn test_format_entry_line_uses_fallbacks() {
        let line = format_entry_line(&entry("abc", "2025-03-01", None));
        assert!(line.starts_with("2025-03-01"));
        assert!(line.contains("Pink Shark"));
        assert!(line.contains("Blog Post"));
        assert!(line.contains("Untitled Post"));
        assert!(line.contains("[link]"));
        assert!(line.ends_with("(abc)"));
    }

    #[test]
    fn test_render_grid_counts_entries() {
        let entries = vec![
            entry("a", "2025-03-15", None),
            entry("b", "2025-03-15", None),
            entry("c", "2025-04-15", None),
        ];
        let grid = render_grid(MonthCursor::new(2025, 2), Weekday::Sun, &entries);
        let lines: Vec<&str> = grid.lines().collect();
        assert!(lines[0].contains("March 2025"));
        assert!(lines[1].starts_with("Sun"));
        assert!(grid.contains("15(2)"));
        assert!(!grid.contains("(1)"));
        // March 2025 starts on a Saturday
        assert!(lines[2].trim_start().starts_with('1'));
        assert_eq!(lines[2].len(), 42);
    }

    #[test]
    fn test_add_requires_session() {
        let services = Services::open_in_memory("content_posts").unwrap();
        let args = AddArgs {
            date: "2025-03-15".into(),
            title: Some("Hi".into()),
            content: None,
            business: "PINK".into(),
            post_type: "BLOG".into(),
            status: "IDEA".into(),
            image: None,
            link: None,
        };
        assert!(matches!(handle_add(args, &services), Err(CliError::NotSignedIn)));
    }

    #[test]
    fn test_add_persists_entry() {
        let mut services = Services::open_in_memory("content_posts").unwrap();
        services.sign_in(None).unwrap();
        let args = AddArgs {
            date: "2025-03-05".into(),
            title: Some("Spring".into()),
            content: Some("notes".into()),
            business: "PINK".into(),
            post_type: "BLOG".into(),
            status: "DRAFTING".into(),
            image: None,
            link: None,
        };
        handle_add(args, &services).unwrap();
        let snapshot = services.database().snapshot(services.collection()).unwrap();
        assert_eq!(snapshot.len(), 1);
        let fields = &snapshot[0].fields;
        assert_eq!(fields.date, "2025-03-05");
        assert_eq!(fields.business, Business::PinkShark);
        assert_eq!(fields.post_type, PostType::MonthlyBlog);
        assert_eq!(fields.status, Some(Status::Drafting));
    }
}
