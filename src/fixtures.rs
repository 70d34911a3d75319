//! Fixture loading
//!
//! Loads a declarative YAML dataset into the database. Each top-level key has
//! the form `Type(symbolicName)`; entries are inserted in document order and
//! may reference any earlier entry by its symbolic name.
//!
//! ```yaml
//! User(bob):
//!     email:      bob@gmail.com
//!     password:   secret
//!     fullname:   Bob
//!
//! Post(firstBobPost):
//!     title:      About the model layer
//!     postedAt:   2009-06-14
//!     author:     bob
//!     tags:       [model]
//! ```
//!
//! The whole document is validated before anything is written, so a broken
//! reference or a bad date leaves the database untouched. Rows are then
//! inserted in a single transaction: a database error such as a duplicate
//! email rolls back the entire load.

use crate::config::format_yaml_error;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateCommentInput, CreatePostInput, User};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use sqlx::{MySql, Sqlite, Transaction};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Tables in deletion order, children first
const TABLES: [&str; 5] = ["post_tags", "comments", "posts", "tags", "users"];

/// Error type for fixture loading
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to read fixture file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse fixtures: {0}")]
    Parse(String),

    #[error("Invalid fixture key '{0}', expected Type(name)")]
    InvalidKey(String),

    #[error("Unknown model type '{0}'")]
    UnknownType(String),

    #[error("Duplicate fixture entry '{0}'")]
    DuplicateEntry(String),

    #[error("{entry}: missing field '{field}'")]
    MissingField { entry: String, field: String },

    #[error("{entry}: invalid value for '{field}'")]
    InvalidValue { entry: String, field: String },

    #[error("{entry}: unresolved reference '{reference}'")]
    UnresolvedReference { entry: String, reference: String },

    #[error("{entry}: invalid date '{value}'")]
    InvalidDate { entry: String, value: String },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Number of rows inserted by a fixture load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixtureSummary {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub tags: usize,
}

impl fmt::Display for FixtureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} posts, {} comments, {} tags",
            self.users, self.posts, self.comments, self.tags
        )
    }
}

/// A validated fixture entry, references still symbolic
#[derive(Debug, Clone, PartialEq)]
enum Record {
    User {
        symbol: String,
        email: String,
        password: String,
        fullname: String,
        is_admin: bool,
    },
    Tag {
        symbol: String,
        name: String,
    },
    Post {
        symbol: String,
        author: String,
        title: String,
        content: String,
        posted_at: Option<DateTime<Utc>>,
        tags: Vec<String>,
    },
    Comment {
        post: String,
        author: String,
        content: String,
        posted_at: Option<DateTime<Utc>>,
    },
}

/// Load the fixture file at `path`
pub async fn load_models(
    pool: &DynDatabasePool,
    path: impl AsRef<Path>,
) -> Result<FixtureSummary, FixtureError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| FixtureError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::info!("Loading fixtures from {}", path.display());
    load_models_from_str(pool, &content).await
}

/// Load fixtures from a YAML string
pub async fn load_models_from_str(
    pool: &DynDatabasePool,
    yaml: &str,
) -> Result<FixtureSummary, FixtureError> {
    let records = parse_records(yaml)?;
    let summary = insert_records(pool, &records).await?;

    tracing::info!("Loaded fixtures: {}", summary);
    Ok(summary)
}

/// Delete every row of every model table
pub async fn delete_database(pool: &DynDatabasePool) -> Result<(), FixtureError> {
    for table in TABLES {
        pool.execute(&format!("DELETE FROM {}", table)).await?;
    }
    tracing::debug!("Deleted all model rows");
    Ok(())
}

fn parse_records(yaml: &str) -> Result<Vec<Record>, FixtureError> {
    let document: Value =
        serde_yaml::from_str(yaml).map_err(|e| FixtureError::Parse(format_yaml_error(&e)))?;

    let entries = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(entries) => entries,
        _ => {
            return Err(FixtureError::Parse(
                "top level must be a mapping of Type(name) entries".to_string(),
            ))
        }
    };

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for (key, body) in &entries {
        let key = key
            .as_str()
            .ok_or_else(|| FixtureError::InvalidKey(format!("{:?}", key)))?;
        let (kind, symbol) = parse_key(key)?;

        let empty = Mapping::new();
        let body = match body {
            Value::Mapping(fields) => fields,
            Value::Null => &empty,
            _ => {
                return Err(FixtureError::Parse(format!(
                    "{}: entry body must be a mapping",
                    key
                )))
            }
        };

        let is_defined =
            |kind: &str, symbol: &str| seen.contains(&(kind.to_string(), symbol.to_string()));
        let record = match kind {
            "User" => Record::User {
                symbol: symbol.to_string(),
                email: required_str(body, key, "email")?,
                password: required_str(body, key, "password")?,
                fullname: required_str(body, key, "fullname")?,
                is_admin: optional_bool(body, key, "isAdmin")?.unwrap_or(false),
            },
            "Tag" => Record::Tag {
                symbol: symbol.to_string(),
                name: required_str(body, key, "name")?,
            },
            "Post" => {
                let author = required_str(body, key, "author")?;
                if !is_defined("User", &author) {
                    return Err(unresolved(key, &author));
                }
                let tags = string_list(body, key, "tags")?;
                if let Some(missing) = tags.iter().find(|t| !is_defined("Tag", t)) {
                    return Err(unresolved(key, missing));
                }
                Record::Post {
                    symbol: symbol.to_string(),
                    author,
                    title: required_str(body, key, "title")?,
                    content: required_str(body, key, "content")?,
                    posted_at: optional_date(body, key, "postedAt")?,
                    tags,
                }
            }
            "Comment" => {
                let post = required_str(body, key, "post")?;
                if !is_defined("Post", &post) {
                    return Err(unresolved(key, &post));
                }
                Record::Comment {
                    post,
                    author: required_str(body, key, "author")?,
                    content: required_str(body, key, "content")?,
                    posted_at: optional_date(body, key, "postedAt")?,
                }
            }
            other => return Err(FixtureError::UnknownType(other.to_string())),
        };

        if !seen.insert((kind.to_string(), symbol.to_string())) {
            return Err(FixtureError::DuplicateEntry(key.to_string()));
        }
        records.push(record);
    }

    Ok(records)
}

async fn insert_records(
    pool: &DynDatabasePool,
    records: &[Record],
) -> Result<FixtureSummary, FixtureError> {
    let mut tx = FixtureTransaction::begin(pool).await?;

    let mut user_ids: HashMap<&str, i64> = HashMap::new();
    let mut post_ids: HashMap<&str, i64> = HashMap::new();
    let mut tag_ids: HashMap<&str, i64> = HashMap::new();
    let mut summary = FixtureSummary::default();

    for record in records {
        match record {
            Record::User {
                symbol,
                email,
                password,
                fullname,
                is_admin,
            } => {
                let user = User::new(email, password, fullname).with_admin(*is_admin);
                user_ids.insert(symbol, tx.insert_user(&user).await?);
                summary.users += 1;
            }
            Record::Tag { symbol, name } => {
                let id = match tx.tag_id(name).await? {
                    Some(existing) => existing,
                    None => {
                        summary.tags += 1;
                        tx.insert_tag(name).await?
                    }
                };
                tag_ids.insert(symbol, id);
            }
            Record::Post {
                symbol,
                author,
                title,
                content,
                posted_at,
                tags,
            } => {
                let input = CreatePostInput {
                    author_id: lookup(&user_ids, author)?,
                    title: title.clone(),
                    content: content.clone(),
                    posted_at: *posted_at,
                };
                let post_id = tx.insert_post(&input).await?;
                for tag in tags {
                    tx.tag_post(post_id, lookup(&tag_ids, tag)?).await?;
                }
                post_ids.insert(symbol, post_id);
                summary.posts += 1;
            }
            Record::Comment {
                post,
                author,
                content,
                posted_at,
            } => {
                let mut input = CreateCommentInput::new(lookup(&post_ids, post)?, author, content);
                input.posted_at = *posted_at;
                tx.insert_comment(&input).await?;
                summary.comments += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(summary)
}

/// An open transaction on either backend. Dropping it without `commit`
/// rolls back every row written through it.
enum FixtureTransaction {
    Sqlite(Transaction<'static, Sqlite>),
    Mysql(Transaction<'static, MySql>),
}

impl FixtureTransaction {
    async fn begin(pool: &DynDatabasePool) -> Result<Self> {
        tracing::debug!("Beginning fixture transaction");
        let tx = match pool.backend() {
            Backend::Sqlite(pool) => {
                Self::Sqlite(pool.begin().await.context("Failed to begin transaction")?)
            }
            Backend::Mysql(pool) => {
                Self::Mysql(pool.begin().await.context("Failed to begin transaction")?)
            }
        };
        Ok(tx)
    }

    async fn commit(self) -> Result<()> {
        let result = match self {
            Self::Sqlite(tx) => tx.commit().await,
            Self::Mysql(tx) => tx.commit().await,
        };
        result.context("Failed to commit fixtures")
    }

    async fn insert_user(&mut self, user: &User) -> Result<i64> {
        let id = match self {
            Self::Sqlite(tx) => sqlx::query(INSERT_USER)
                .bind(&user.email)
                .bind(&user.password)
                .bind(&user.fullname)
                .bind(user.is_admin)
                .bind(user.created_at)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert user {}", user.email))?
                .last_insert_rowid(),
            Self::Mysql(tx) => sqlx::query(INSERT_USER)
                .bind(&user.email)
                .bind(&user.password)
                .bind(&user.fullname)
                .bind(user.is_admin)
                .bind(user.created_at)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert user {}", user.email))?
                .last_insert_id() as i64,
        };
        Ok(id)
    }

    async fn tag_id(&mut self, name: &str) -> Result<Option<i64>> {
        let sql = "SELECT id FROM tags WHERE name = ?";
        let id = match self {
            Self::Sqlite(tx) => sqlx::query_scalar::<_, i64>(sql)
                .bind(name)
                .fetch_optional(&mut **tx)
                .await
                .context("Failed to look up tag")?,
            Self::Mysql(tx) => sqlx::query_scalar::<_, i64>(sql)
                .bind(name)
                .fetch_optional(&mut **tx)
                .await
                .context("Failed to look up tag")?,
        };
        Ok(id)
    }

    async fn insert_tag(&mut self, name: &str) -> Result<i64> {
        let sql = "INSERT INTO tags (name, created_at) VALUES (?, ?)";
        let now = Utc::now();
        let id = match self {
            Self::Sqlite(tx) => sqlx::query(sql)
                .bind(name)
                .bind(now)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert tag {}", name))?
                .last_insert_rowid(),
            Self::Mysql(tx) => sqlx::query(sql)
                .bind(name)
                .bind(now)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert tag {}", name))?
                .last_insert_id() as i64,
        };
        Ok(id)
    }

    async fn insert_post(&mut self, input: &CreatePostInput) -> Result<i64> {
        let sql = "INSERT INTO posts (author_id, title, content, posted_at) VALUES (?, ?, ?, ?)";
        let posted_at = input.posted_at.unwrap_or_else(Utc::now);
        let id = match self {
            Self::Sqlite(tx) => sqlx::query(sql)
                .bind(input.author_id)
                .bind(&input.title)
                .bind(&input.content)
                .bind(posted_at)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert post {}", input.title))?
                .last_insert_rowid(),
            Self::Mysql(tx) => sqlx::query(sql)
                .bind(input.author_id)
                .bind(&input.title)
                .bind(&input.content)
                .bind(posted_at)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert post {}", input.title))?
                .last_insert_id() as i64,
        };
        Ok(id)
    }

    async fn tag_post(&mut self, post_id: i64, tag_id: i64) -> Result<()> {
        match self {
            Self::Sqlite(tx) => {
                sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to tag post")?;
            }
            Self::Mysql(tx) => {
                sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to tag post")?;
            }
        }
        Ok(())
    }

    async fn insert_comment(&mut self, input: &CreateCommentInput) -> Result<()> {
        let sql = "INSERT INTO comments (post_id, author, content, posted_at) VALUES (?, ?, ?, ?)";
        let posted_at = input.posted_at.unwrap_or_else(Utc::now);
        match self {
            Self::Sqlite(tx) => {
                sqlx::query(sql)
                    .bind(input.post_id)
                    .bind(&input.author)
                    .bind(&input.content)
                    .bind(posted_at)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to insert comment")?;
            }
            Self::Mysql(tx) => {
                sqlx::query(sql)
                    .bind(input.post_id)
                    .bind(&input.author)
                    .bind(&input.content)
                    .bind(posted_at)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to insert comment")?;
            }
        }
        Ok(())
    }
}

const INSERT_USER: &str =
    "INSERT INTO users (email, password, fullname, is_admin, created_at) VALUES (?, ?, ?, ?, ?)";

fn lookup(ids: &HashMap<&str, i64>, symbol: &str) -> Result<i64, FixtureError> {
    ids.get(symbol)
        .copied()
        .ok_or_else(|| unresolved("fixtures", symbol))
}

fn unresolved(entry: &str, reference: &str) -> FixtureError {
    FixtureError::UnresolvedReference {
        entry: entry.to_string(),
        reference: reference.to_string(),
    }
}

/// Split `Type(name)` into its two parts
fn parse_key(key: &str) -> Result<(&str, &str), FixtureError> {
    let invalid = || FixtureError::InvalidKey(key.to_string());

    let key = key.trim();
    let open = key.find('(').ok_or_else(invalid)?;
    let inner = key[open + 1..].strip_suffix(')').ok_or_else(invalid)?;

    let kind = key[..open].trim();
    let symbol = inner.trim();
    if kind.is_empty() || symbol.is_empty() {
        return Err(invalid());
    }
    Ok((kind, symbol))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_str(body: &Mapping, entry: &str, field: &str) -> Result<String, FixtureError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(FixtureError::MissingField {
            entry: entry.to_string(),
            field: field.to_string(),
        }),
        // Folded blocks carry a trailing newline
        Some(value) => scalar_to_string(value)
            .map(|s| s.trim_end().to_string())
            .ok_or_else(|| FixtureError::InvalidValue {
                entry: entry.to_string(),
                field: field.to_string(),
            }),
    }
}

fn optional_bool(body: &Mapping, entry: &str, field: &str) -> Result<Option<bool>, FixtureError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(FixtureError::InvalidValue {
            entry: entry.to_string(),
            field: field.to_string(),
        }),
    }
}

fn string_list(body: &Mapping, entry: &str, field: &str) -> Result<Vec<String>, FixtureError> {
    let invalid = || FixtureError::InvalidValue {
        entry: entry.to_string(),
        field: field.to_string(),
    };

    match body.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| scalar_to_string(item).ok_or_else(invalid))
            .collect(),
        Some(value) => scalar_to_string(value).map(|s| vec![s]).ok_or_else(invalid),
    }
}

fn optional_date(
    body: &Mapping,
    entry: &str,
    field: &str,
) -> Result<Option<DateTime<Utc>>, FixtureError> {
    let value = match body.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => scalar_to_string(value).unwrap_or_default(),
    };

    parse_date(&value)
        .map(Some)
        .ok_or_else(|| FixtureError::InvalidDate {
            entry: entry.to_string(),
            value,
        })
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and RFC 3339. Naive values are
/// taken as UTC.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
