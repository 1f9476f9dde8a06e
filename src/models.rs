use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Date format shared by writes and calendar lookups. Entries join to
/// calendar cells by string equality on this format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a calendar date as an entry date key (YYYY-MM-DD)
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse an entry date key back into a calendar date
pub fn parse_date_key(key: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(key, DATE_FORMAT)
}

/// Opaque document identifier assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum Business {
    #[default]
    Howdy,
    PinkShark,
}

impl Business {
    pub const ALL: [Business; 2] = [Business::Howdy, Business::PinkShark];

    /// Resolve a stored key. Unknown keys fall back to the default business
    /// so old or malformed documents stay viewable.
    pub fn from_key(key: &str) -> Self {
        match key {
            "HOWDY" => Business::Howdy,
            "PINK" => Business::PinkShark,
            _ => Business::default(),
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Business::Howdy => "HOWDY",
            Business::PinkShark => "PINK",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Business::Howdy => "Howdy, Sore Loser",
            Business::PinkShark => "Pink Shark",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Business::Howdy => "🤠",
            Business::PinkShark => "🦈",
        }
    }

    /// Accent color name used by the TUI for cards and the form border
    pub fn theme(self) -> &'static str {
        match self {
            Business::Howdy => "green",
            Business::PinkShark => "lightmagenta",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Business::Howdy => Business::PinkShark,
            Business::PinkShark => Business::Howdy,
        }
    }
}

impl From<Value> for Business {
    fn from(value: Value) -> Self {
        value.as_str().map(Business::from_key).unwrap_or_default()
    }
}

impl From<Business> for String {
    fn from(business: Business) -> Self {
        business.key().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum PostType {
    MonthlyBlog,
    #[default]
    LocationPost,
}

impl PostType {
    pub const ALL: [PostType; 2] = [PostType::MonthlyBlog, PostType::LocationPost];

    /// Resolve a stored key, falling back to a location post for anything unknown
    pub fn from_key(key: &str) -> Self {
        match key {
            "BLOG" => PostType::MonthlyBlog,
            "GMB" => PostType::LocationPost,
            _ => PostType::default(),
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PostType::MonthlyBlog => "BLOG",
            PostType::LocationPost => "GMB",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PostType::MonthlyBlog => "Monthly Blog",
            PostType::LocationPost => "GMB Post",
        }
    }

    /// Label used on list-view badges
    pub fn badge(self) -> &'static str {
        match self {
            PostType::MonthlyBlog => "Blog Post",
            PostType::LocationPost => "GMB Post",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            PostType::MonthlyBlog => "📄",
            PostType::LocationPost => "📍",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            PostType::MonthlyBlog => "blue",
            PostType::LocationPost => "green",
        }
    }

    pub fn next(self) -> Self {
        match self {
            PostType::MonthlyBlog => PostType::LocationPost,
            PostType::LocationPost => PostType::MonthlyBlog,
        }
    }
}

impl From<Value> for PostType {
    fn from(value: Value) -> Self {
        value.as_str().map(PostType::from_key).unwrap_or_default()
    }
}

impl From<PostType> for String {
    fn from(post_type: PostType) -> Self {
        post_type.key().to_string()
    }
}

/// Workflow status. Documents written by older clients carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String")]
pub enum Status {
    Idea,
    Drafting,
    InReview,
    Approved,
    Published,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Idea,
        Status::Drafting,
        Status::InReview,
        Status::Approved,
        Status::Published,
    ];

    /// Unknown keys resolve to no status rather than an error
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "IDEA" => Some(Status::Idea),
            "DRAFTING" => Some(Status::Drafting),
            "IN_REVIEW" => Some(Status::InReview),
            "APPROVED" => Some(Status::Approved),
            "PUBLISHED" => Some(Status::Published),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Status::Idea => "IDEA",
            Status::Drafting => "DRAFTING",
            Status::InReview => "IN_REVIEW",
            Status::Approved => "APPROVED",
            Status::Published => "PUBLISHED",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Idea => "Idea",
            Status::Drafting => "Drafting",
            Status::InReview => "In Review",
            Status::Approved => "Approved",
            Status::Published => "Published",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Status::Idea => "gray",
            Status::Drafting => "yellow",
            Status::InReview => "lightblue",
            Status::Approved => "lightgreen",
            Status::Published => "magenta",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Status::Idea => Status::Drafting,
            Status::Drafting => Status::InReview,
            Status::InReview => Status::Approved,
            Status::Approved => Status::Published,
            Status::Published => Status::Idea,
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.key().to_string()
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<Status>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(Status::from_key))
}

/// Text field that tolerates null and non-string values written by other clients
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_text(deserializer)?.unwrap_or_default())
}

/// Editable fields of an entry, as written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFields {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub post_type: PostType,
    #[serde(default)]
    pub business: Business,
    #[serde(default, deserialize_with = "deserialize_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: String,
    #[serde(rename = "imageUrl", default, deserialize_with = "deserialize_text")]
    pub image_data: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub external_link: Option<String>,
}

/// Audit fields stamped by the store, never by the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStamp {
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanningEntry {
    pub id: EntryId,
    pub fields: EntryFields,
    pub audit: AuditStamp,
}

/// Visual reference shown next to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thumbnail<'a> {
    Embedded(&'a str),
    Link(&'a str),
}

impl PlanningEntry {
    pub fn title(&self) -> Option<&str> {
        self.fields.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn date(&self) -> &str {
        &self.fields.date
    }

    /// Embedded image data takes precedence over an external link
    pub fn thumbnail(&self) -> Option<Thumbnail<'_>> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.is_empty())
        }
        if let Some(data) = non_empty(&self.fields.image_data) {
            Some(Thumbnail::Embedded(data))
        } else {
            non_empty(&self.fields.external_link).map(Thumbnail::Link)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Date is required")]
    MissingDate,
    #[error("Date must be in YYYY-MM-DD format: {0}")]
    InvalidDate(String),
}

/// Immutable form state. Each field change produces a new draft; the draft is
/// turned into stored fields only on submit.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub id: Option<EntryId>,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub business: Business,
    pub status: Status,
    pub date: String,
    pub image_data: Option<String>,
    pub external_link: String,
}

impl EntryDraft {
    /// Draft for a new entry on the given day
    pub fn for_date(date: NaiveDate, initial_type: Option<PostType>) -> Self {
        Self {
            id: None,
            title: String::new(),
            content: String::new(),
            post_type: initial_type.unwrap_or_default(),
            business: Business::default(),
            status: Status::Idea,
            date: date_key(date),
            image_data: None,
            external_link: String::new(),
        }
    }

    /// Draft bound to an existing entry
    pub fn from_entry(entry: &PlanningEntry) -> Self {
        let fields = &entry.fields;
        Self {
            id: Some(entry.id.clone()),
            title: fields.title.clone().unwrap_or_default(),
            content: fields.content.clone().unwrap_or_default(),
            post_type: fields.post_type,
            business: fields.business,
            status: fields.status.unwrap_or(Status::Idea),
            date: fields.date.clone(),
            image_data: fields.image_data.clone().filter(|d| !d.is_empty()),
            external_link: fields.external_link.clone().unwrap_or_default(),
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self { title: title.into(), ..self }
    }

    pub fn with_content(self, content: impl Into<String>) -> Self {
        Self { content: content.into(), ..self }
    }

    pub fn with_post_type(self, post_type: PostType) -> Self {
        Self { post_type, ..self }
    }

    pub fn with_business(self, business: Business) -> Self {
        Self { business, ..self }
    }

    pub fn with_status(self, status: Status) -> Self {
        Self { status, ..self }
    }

    pub fn with_date(self, date: impl Into<String>) -> Self {
        Self { date: date.into(), ..self }
    }

    pub fn with_image(self, data_url: String) -> Self {
        Self { image_data: Some(data_url), ..self }
    }

    pub fn without_image(self) -> Self {
        Self { image_data: None, ..self }
    }

    pub fn with_external_link(self, link: impl Into<String>) -> Self {
        Self { external_link: link.into(), ..self }
    }

    /// Validate and produce the fields to persist
    pub fn validate(&self) -> Result<EntryFields, DraftError> {
        let date = self.date.trim();
        if date.is_empty() {
            return Err(DraftError::MissingDate);
        }
        let parsed = parse_date_key(date).map_err(|_| DraftError::InvalidDate(date.to_string()))?;

        let optional = |s: &str| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        Ok(EntryFields {
            title: optional(&self.title),
            content: optional(&self.content),
            post_type: self.post_type,
            business: self.business,
            status: Some(self.status),
            // Re-format so the stored key always matches the grid's formatting
            date: date_key(parsed),
            image_data: self.image_data.clone(),
            external_link: optional(&self.external_link),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(fields: EntryFields) -> PlanningEntry {
        PlanningEntry {
            id: EntryId::new("doc-1"),
            fields,
            audit: AuditStamp::default(),
        }
    }

    #[test]
    fn test_unknown_business_and_type_fall_back_to_defaults() {
        let json = r#"{"title":"Old","type":"TWEET","business":"ACME","date":"2024-01-02"}"#;
        let fields: EntryFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.business, Business::Howdy);
        assert_eq!(fields.post_type, PostType::LocationPost);
        assert_eq!(fields.status, None);
    }

    #[test]
    fn test_missing_enum_fields_fall_back_to_defaults() {
        let fields: EntryFields = serde_json::from_str(r#"{"date":"2024-01-02"}"#).unwrap();
        assert_eq!(fields.business, Business::Howdy);
        assert_eq!(fields.post_type, PostType::LocationPost);
        assert!(fields.title.is_none());
    }

    #[test]
    fn test_null_and_non_string_values_fall_back() {
        let json = r#"{"title":7,"content":null,"type":null,"business":3,"status":false,"date":null,"imageUrl":null}"#;
        let fields: EntryFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.business, Business::Howdy);
        assert_eq!(fields.post_type, PostType::LocationPost);
        assert_eq!(fields.status, None);
        assert_eq!(fields.title.as_deref(), Some("7"));
        assert!(fields.content.is_none());
        assert_eq!(fields.date, "");
        assert!(fields.image_data.is_none());
    }

    #[test]
    fn test_unknown_status_resolves_to_none() {
        let json = r#"{"date":"2024-01-02","status":"ARCHIVED"}"#;
        let fields: EntryFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.status, None);

        let json = r#"{"date":"2024-01-02","status":"IN_REVIEW"}"#;
        let fields: EntryFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.status, Some(Status::InReview));
    }

    #[test]
    fn test_fields_serialize_with_storage_keys() {
        let fields = EntryFields {
            title: Some("Spring".into()),
            content: None,
            post_type: PostType::MonthlyBlog,
            business: Business::PinkShark,
            status: Some(Status::Approved),
            date: "2025-03-15".into(),
            image_data: None,
            external_link: Some("https://drive.example/x".into()),
        };
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value["type"], "BLOG");
        assert_eq!(value["business"], "PINK");
        assert_eq!(value["status"], "APPROVED");
        assert_eq!(value["externalLink"], "https://drive.example/x");
    }

    #[test]
    fn test_thumbnail_prefers_embedded_image() {
        let mut fields = EntryDraft::for_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), None)
            .validate()
            .unwrap();
        fields.image_data = Some("data:image/jpeg;base64,AAAA".into());
        fields.external_link = Some("https://example.com/a.png".into());
        let entry = entry_with(fields.clone());
        assert_eq!(entry.thumbnail(), Some(Thumbnail::Embedded("data:image/jpeg;base64,AAAA")));

        fields.image_data = None;
        let entry = entry_with(fields.clone());
        assert_eq!(entry.thumbnail(), Some(Thumbnail::Link("https://example.com/a.png")));

        fields.external_link = None;
        assert_eq!(entry_with(fields).thumbnail(), None);
    }

    #[test]
    fn test_draft_changes_produce_new_values() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let original = EntryDraft::for_date(date, Some(PostType::MonthlyBlog));
        let edited = original.clone().with_title("Tips").with_business(Business::PinkShark);

        assert_eq!(original.title, "");
        assert_eq!(original.business, Business::Howdy);
        assert_eq!(edited.title, "Tips");
        assert_eq!(edited.business, Business::PinkShark);
        assert_eq!(edited.post_type, PostType::MonthlyBlog);
    }

    #[test]
    fn test_draft_defaults_for_new_entry() {
        let draft = EntryDraft::for_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), None);
        assert!(draft.id.is_none());
        assert_eq!(draft.date, "2025-03-15");
        assert_eq!(draft.post_type, PostType::LocationPost);
        assert_eq!(draft.business, Business::Howdy);
        assert_eq!(draft.status, Status::Idea);
    }

    #[test]
    fn test_validate_rejects_bad_dates() {
        let draft = EntryDraft::for_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), None);
        assert_eq!(draft.clone().with_date("  ").validate(), Err(DraftError::MissingDate));
        assert!(matches!(
            draft.clone().with_date("2025-02-30").validate(),
            Err(DraftError::InvalidDate(_))
        ));
        assert!(matches!(
            draft.with_date("15/03/2025").validate(),
            Err(DraftError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_validate_trims_empty_text_to_none() {
        let draft = EntryDraft::for_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), None)
            .with_title("   ")
            .with_content(" notes ")
            .with_external_link("");
        let fields = draft.validate().unwrap();
        assert_eq!(fields.title, None);
        assert_eq!(fields.content.as_deref(), Some("notes"));
        assert_eq!(fields.external_link, None);
        assert_eq!(fields.status, Some(Status::Idea));
    }

    #[test]
    fn test_validate_normalizes_unpadded_date() {
        let draft = EntryDraft::for_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), None)
            .with_date("2025-3-5");
        assert_eq!(draft.validate().unwrap().date, "2025-03-05");
    }

    #[test]
    fn test_draft_from_entry_keeps_identifier() {
        let fields = EntryFields {
            title: Some("Launch".into()),
            content: None,
            post_type: PostType::MonthlyBlog,
            business: Business::PinkShark,
            status: None,
            date: "2025-03-15".into(),
            image_data: Some(String::new()),
            external_link: None,
        };
        let entry = entry_with(fields);
        let draft = EntryDraft::from_entry(&entry);
        assert_eq!(draft.id, Some(EntryId::new("doc-1")));
        assert_eq!(draft.status, Status::Idea);
        assert_eq!(draft.image_data, None);
        assert_eq!(draft.title, "Launch");
    }
}
