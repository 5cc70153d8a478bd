//! Sort and identifier lookup for workspace and session listings.
//!
//! Each entity kind has a fixed registry of named sort keys. A key maps an
//! entity to a [`SortValue`]; sorting never falls back to a default key.

use crate::error::{ChatlogError, Result};
use crate::extractors::{SessionSummary, Workspace};
use chrono::{DateTime, Utc};

/// Kind of entity a listing holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Workspace,
    Session,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Workspace => write!(f, "workspace"),
            EntityKind::Session => write!(f, "session"),
        }
    }
}

/// Extracted key value. Missing values sort before present ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Missing,
    Text(String),
    Number(u64),
    Time(DateTime<Utc>),
}

impl SortValue {
    fn text(value: Option<&str>) -> Self {
        value
            .map(|s| SortValue::Text(s.to_lowercase()))
            .unwrap_or(SortValue::Missing)
    }

    fn time(value: Option<DateTime<Utc>>) -> Self {
        value.map(SortValue::Time).unwrap_or(SortValue::Missing)
    }
}

/// A registered sort attribute.
pub struct SortKey<T: 'static> {
    pub name: &'static str,
    pub description: &'static str,
    /// Alternative spellings accepted on input
    pub aliases: &'static [&'static str],
    extract: fn(&T) -> SortValue,
}

impl<T: 'static> SortKey<T> {
    pub fn value(&self, item: &T) -> SortValue {
        (self.extract)(item)
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Something that can be listed, sorted and looked up by id.
pub trait Entity: Sized + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn sort_keys() -> &'static [SortKey<Self>];
}

static WORKSPACE_KEYS: &[SortKey<Workspace>] = &[
    SortKey {
        name: "id",
        description: "storage folder name",
        aliases: &[],
        extract: workspace_id,
    },
    SortKey {
        name: "folder",
        description: "project folder path",
        aliases: &["path"],
        extract: workspace_folder,
    },
    SortKey {
        name: "created",
        description: "creation time of the workspace metadata",
        aliases: &["createDate"],
        extract: workspace_created,
    },
    SortKey {
        name: "updated",
        description: "newest change to metadata or session files",
        aliases: &["lastUpdate"],
        extract: workspace_updated,
    },
    SortKey {
        name: "sessions",
        description: "number of chat sessions",
        aliases: &[],
        extract: workspace_sessions,
    },
];

static SESSION_KEYS: &[SortKey<SessionSummary>] = &[
    SortKey {
        name: "id",
        description: "session identifier",
        aliases: &[],
        extract: session_id,
    },
    SortKey {
        name: "title",
        description: "custom title or first request",
        aliases: &[],
        extract: session_title,
    },
    SortKey {
        name: "created",
        description: "session creation time",
        aliases: &["createDate"],
        extract: session_created,
    },
    SortKey {
        name: "updated",
        description: "time of the last message",
        aliases: &["lastUpdate"],
        extract: session_updated,
    },
    SortKey {
        name: "turns",
        description: "number of request/response turns",
        aliases: &["length"],
        extract: session_turns,
    },
    SortKey {
        name: "size",
        description: "request and response characters",
        aliases: &[],
        extract: session_size,
    },
];

fn workspace_id(w: &Workspace) -> SortValue {
    SortValue::text(Some(w.id.as_str()))
}

fn workspace_folder(w: &Workspace) -> SortValue {
    SortValue::text(w.folder.as_deref())
}

fn workspace_created(w: &Workspace) -> SortValue {
    SortValue::time(w.created)
}

fn workspace_updated(w: &Workspace) -> SortValue {
    SortValue::time(w.last_update)
}

fn workspace_sessions(w: &Workspace) -> SortValue {
    SortValue::Number(w.session_count() as u64)
}

fn session_id(s: &SessionSummary) -> SortValue {
    SortValue::text(Some(s.id.as_str()))
}

fn session_title(s: &SessionSummary) -> SortValue {
    SortValue::text(s.title.as_deref())
}

fn session_created(s: &SessionSummary) -> SortValue {
    SortValue::time(s.created)
}

fn session_updated(s: &SessionSummary) -> SortValue {
    SortValue::time(s.last_update)
}

fn session_turns(s: &SessionSummary) -> SortValue {
    SortValue::Number(s.turns as u64)
}

fn session_size(s: &SessionSummary) -> SortValue {
    SortValue::Number(s.size as u64)
}

impl Entity for Workspace {
    const KIND: EntityKind = EntityKind::Workspace;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_keys() -> &'static [SortKey<Self>] {
        WORKSPACE_KEYS
    }
}

impl Entity for SessionSummary {
    const KIND: EntityKind = EntityKind::Session;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_keys() -> &'static [SortKey<Self>] {
        SESSION_KEYS
    }
}

/// Registered key names for an entity kind, in registry order.
pub fn list_sort_keys(kind: EntityKind) -> Vec<&'static str> {
    describe_sort_keys(kind).into_iter().map(|(name, _)| name).collect()
}

/// Registered key names with their one-line descriptions.
pub fn describe_sort_keys(kind: EntityKind) -> Vec<(&'static str, &'static str)> {
    match kind {
        EntityKind::Workspace => WORKSPACE_KEYS.iter().map(|k| (k.name, k.description)).collect(),
        EntityKind::Session => SESSION_KEYS.iter().map(|k| (k.name, k.description)).collect(),
    }
}

/// Look up a sort key by name (case-insensitive, aliases accepted).
pub fn find_sort_key<T: Entity>(name: &str) -> Result<&'static SortKey<T>> {
    T::sort_keys()
        .iter()
        .find(|k| k.matches(name.trim()))
        .ok_or_else(|| ChatlogError::UnknownSortKey {
            kind: T::KIND,
            key: name.to_string(),
            valid: list_sort_keys(T::KIND),
        })
}

/// Stable sort by a named key.
///
/// Equal keys keep their input order in both directions.
pub fn sort<T: Entity>(items: Vec<T>, key: &str, descending: bool) -> Result<Vec<T>> {
    let key = find_sort_key::<T>(key)?;

    let mut keyed: Vec<(SortValue, T)> = items
        .into_iter()
        .map(|item| (key.value(&item), item))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = a.cmp(b);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

/// A key name plus direction, e.g. `updated` or `-updated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: String,
    pub descending: bool,
}

impl SortSpec {
    /// Parse a textual spec; a leading `-` means descending.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        match spec.strip_prefix('-') {
            Some(key) => Self {
                key: key.to_string(),
                descending: true,
            },
            None => Self {
                key: spec.to_string(),
                descending: false,
            },
        }
    }

    /// Flip the direction (the CLI's `--reverse`).
    pub fn reversed(self, reverse: bool) -> Self {
        Self {
            descending: self.descending != reverse,
            ..self
        }
    }

    pub fn apply<T: Entity>(&self, items: Vec<T>) -> Result<Vec<T>> {
        sort(items, &self.key, self.descending)
    }
}

/// Canonical form of a user-supplied identifier fragment.
pub fn normalize_fragment(fragment: &str) -> String {
    fragment.trim().trim_end_matches('.').to_lowercase()
}

/// Resolve an identifier fragment to exactly one entity.
///
/// The fragment is trimmed, lower-cased and stripped of trailing dots so
/// shortened ids like `3fa2b1...` can be pasted back. Two or more matches are
/// always ambiguous, even when one of them equals the fragment.
pub fn resolve<'a, T: Entity>(items: &'a [T], fragment: &str) -> Result<&'a T> {
    let index = resolve_index(items.iter().map(|item| item.id()), T::KIND, fragment)?;
    Ok(&items[index])
}

/// Resolve a fragment against bare ids, such as session file stems.
pub fn resolve_id<'a>(ids: &'a [String], kind: EntityKind, fragment: &str) -> Result<&'a str> {
    let index = resolve_index(ids.iter().map(String::as_str), kind, fragment)?;
    Ok(&ids[index])
}

fn resolve_index<'a>(
    ids: impl Iterator<Item = &'a str>,
    kind: EntityKind,
    fragment: &str,
) -> Result<usize> {
    let needle = normalize_fragment(fragment);
    if needle.is_empty() {
        return Err(ChatlogError::IdentifierNotFound {
            kind,
            fragment: fragment.to_string(),
        });
    }

    let matches: Vec<(usize, &str)> = ids
        .enumerate()
        .filter(|(_, id)| id.to_lowercase().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(ChatlogError::IdentifierNotFound {
            kind,
            fragment: fragment.to_string(),
        }),
        [(index, _)] => Ok(*index),
        many => Err(ChatlogError::AmbiguousIdentifier {
            kind,
            fragment: fragment.to_string(),
            candidates: many.iter().map(|(_, id)| id.to_string()).collect(),
        }),
    }
}
