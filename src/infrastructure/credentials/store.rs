//! Line-preserving reader/writer for the shared credentials file.
//!
//! Only the values of the targeted keys are ever rewritten. Every other byte
//! of the file (comments, spacing, separators, line endings, unknown keys and
//! other sections) is written back exactly as it was read.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::domain::errors::StoreError;
use crate::domain::models::{Credentials, ProfileEntry};

pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const SESSION_TOKEN: &str = "aws_session_token";

/// Section holding inherited defaults; never treated as a profile.
const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Section(&'a str),
    Entry { key: &'a str, value: &'a str },
    Other,
}

fn strip_terminator(raw: &str) -> &str {
    raw.trim_end_matches(['\n', '\r'])
}

/// Byte offset of the first `=` or `:` in `content`.
fn separator_index(content: &str) -> Option<usize> {
    content.find(['=', ':'])
}

fn parse_line(raw: &str) -> Line<'_> {
    let content = strip_terminator(raw);
    let trimmed = content.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
        return Line::Other;
    }
    // Indented lines are continuations of the previous value.
    if content.starts_with([' ', '\t']) && !trimmed.starts_with('[') {
        return Line::Other;
    }
    // The header runs to the last `]` and keeps its inner spacing.
    if let Some(header) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.rfind(']').map(|end| &rest[..end]))
        .filter(|header| !header.is_empty())
    {
        return Line::Section(header);
    }
    match separator_index(content) {
        Some(idx) => Line::Entry {
            key: content[..idx].trim(),
            value: content[idx + 1..].trim(),
        },
        None => Line::Other,
    }
}

/// Rewrite the value part of `raw`, keeping the key, separator, spacing and
/// line terminator untouched.
fn replace_value(raw: &str, new_value: &str) -> String {
    let content = strip_terminator(raw);
    let terminator = &raw[content.len()..];
    let Some(idx) = separator_index(content) else {
        return raw.to_string();
    };

    let after_sep = &content[idx + 1..];
    let leading = after_sep.len() - after_sep.trim_start().len();
    let value_start = idx + 1 + leading;
    let value_end = content.trim_end().len();

    if value_start >= value_end {
        // `key =` with nothing after it.
        return format!("{} {new_value}{terminator}", content.trim_end());
    }
    format!(
        "{}{new_value}{}{terminator}",
        &content[..value_start],
        &content[value_end..]
    )
}

/// In-memory copy of a credentials file.
#[derive(Debug, Clone)]
pub struct CredentialsStore {
    path: PathBuf,
    contents: String,
}

impl CredentialsStore {
    /// Read the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Self { path, contents }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(path)),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Build a store from text without touching the filesystem.
    pub fn from_contents(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    fn lines(&self) -> Vec<&str> {
        self.contents.split_inclusive('\n').collect()
    }

    /// Line range `[header, end)` of the first section called `name`.
    fn section_span(lines: &[&str], name: &str) -> Option<(usize, usize)> {
        let header = lines
            .iter()
            .position(|l| matches!(parse_line(l), Line::Section(s) if s == name))?;
        let end = lines[header + 1..]
            .iter()
            .position(|l| matches!(parse_line(l), Line::Section(_)))
            .map_or(lines.len(), |offset| header + 1 + offset);
        Some((header, end))
    }

    /// Section names in file order, first occurrence only.
    pub fn section_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for line in self.lines() {
            if let Line::Section(name) = parse_line(line) {
                if name != DEFAULT_SECTION && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Look up a profile section.
    pub fn profile(&self, name: &str) -> Option<ProfileEntry> {
        let lines = self.lines();
        let (header, end) = Self::section_span(&lines, name)?;

        let mut entry = ProfileEntry {
            name: name.to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        };
        for line in &lines[header + 1..end] {
            if let Line::Entry { key, value } = parse_line(line) {
                let slot = if key.eq_ignore_ascii_case(ACCESS_KEY_ID) {
                    &mut entry.access_key_id
                } else if key.eq_ignore_ascii_case(SECRET_ACCESS_KEY) {
                    &mut entry.secret_access_key
                } else if key.eq_ignore_ascii_case(SESSION_TOKEN) {
                    &mut entry.session_token
                } else {
                    continue;
                };
                *slot = Some(value.to_string());
            }
        }
        Some(entry)
    }

    /// Every profile section in file order.
    pub fn profiles(&self) -> Vec<ProfileEntry> {
        self.section_names()
            .iter()
            .filter_map(|name| self.profile(name))
            .collect()
    }

    /// Names of the profiles with a non-empty access key id.
    pub fn configured_profiles(&self) -> Vec<String> {
        self.profiles()
            .into_iter()
            .filter(ProfileEntry::has_access_key)
            .map(|p| p.name)
            .collect()
    }

    /// Replace the key pair of `profile` in memory.
    ///
    /// Existing `aws_access_key_id` / `aws_secret_access_key` lines are
    /// rewritten in place; missing ones are inserted after the section's last
    /// entry. Nothing outside those two values changes.
    pub fn set_credentials(&mut self, profile: &str, credentials: &Credentials) -> Result<(), StoreError> {
        let lines = self.lines();
        let (header, end) = Self::section_span(&lines, profile)
            .ok_or_else(|| StoreError::MissingSection(profile.to_string()))?;

        let updates = [
            (ACCESS_KEY_ID, credentials.access_key_id.as_str()),
            (SECRET_ACCESS_KEY, credentials.secret_access_key.as_str()),
        ];
        let mut found = [false; 2];
        let mut out: Vec<String> = lines.iter().map(|l| (*l).to_string()).collect();
        let mut last_entry = header;

        for (idx, line) in lines.iter().enumerate().take(end).skip(header + 1) {
            if let Line::Entry { key, .. } = parse_line(line) {
                last_entry = idx;
                for (slot, (name, value)) in updates.iter().enumerate() {
                    if key.eq_ignore_ascii_case(name) {
                        out[idx] = replace_value(line, value);
                        found[slot] = true;
                    }
                }
            }
        }

        let newline = if lines[header].ends_with("\r\n") { "\r\n" } else { "\n" };
        let missing: Vec<String> = updates
            .iter()
            .zip(found)
            .filter(|(_, present)| !present)
            .map(|((name, value), _)| format!("{name} = {value}{newline}"))
            .collect();

        if !missing.is_empty() {
            if !out[last_entry].ends_with('\n') {
                out[last_entry].push_str(newline);
            }
            for (offset, line) in missing.into_iter().enumerate() {
                out.insert(last_entry + 1 + offset, line);
            }
        }

        self.contents = out.concat();
        Ok(())
    }

    /// Write the store back to its path.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_with(&AtomicWriter)
    }

    pub fn save_with(&self, writer: &dyn StoreWriter) -> Result<(), StoreError> {
        writer
            .write(&self.path, &self.contents)
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Persists the text of a credentials file.
pub trait StoreWriter: Send + Sync {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Writes into a temporary file next to the target and renames it over the
/// target. A failed write leaves the previous file untouched.
///
/// A symlinked target is resolved first so the link itself survives, and the
/// previous file's permissions are carried over.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter;

impl StoreWriter for AtomicWriter {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        match fs::metadata(&target) {
            Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|err| err.error)?;
        Ok(())
    }
}
