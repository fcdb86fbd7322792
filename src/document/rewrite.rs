//! In-place edits to the backend block of a local document.
//!
//! Edits are line based so everything outside the touched line stays byte
//! for byte what it was, including comments and line endings. Writes are
//! guarded by a sibling `.bak` copy that is restored if the write fails.

use super::local::BACKEND_NAME;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static BACKEND_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*backend\s+"([^"]*)"\s*\{"#).expect("Invalid regex"));

static ORGANIZATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([ \t]*)organization\s*=").expect("Invalid regex"));

static DOCUMENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*document\s*=").expect("Invalid regex"));

static DOCUMENT_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[ \t]*document\s*=\s*"([^"]*)""#).expect("Invalid regex"));

/// Line-by-line brace tracking that skips strings, comments and heredocs.
#[derive(Debug, Default)]
struct Scanner {
    depth: i32,
    in_comment: bool,
    /// Closing marker of the heredoc being skipped
    heredoc: Option<String>,
}

impl Scanner {
    /// Whether the next line starts outside any block comment or heredoc.
    fn in_code(&self) -> bool {
        !self.in_comment && self.heredoc.is_none()
    }

    fn feed(&mut self, line: &str) {
        if let Some(marker) = &self.heredoc {
            if line.trim() == marker.as_str() {
                self.heredoc = None;
            }
            return;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut in_string = false;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if self.in_comment {
                if c == '*' && next == Some('/') {
                    self.in_comment = false;
                    i += 1;
                }
            } else if in_string {
                match c {
                    '\\' => i += 1,
                    '"' => in_string = false,
                    _ => {}
                }
            } else {
                match (c, next) {
                    ('"', _) => in_string = true,
                    ('#', _) | ('/', Some('/')) => break,
                    ('/', Some('*')) => {
                        self.in_comment = true;
                        i += 1;
                    }
                    ('<', Some('<')) => {
                        let rest: String = chars[i + 2..].iter().collect();
                        let rest = rest.strip_prefix('-').unwrap_or(&rest);
                        let marker: String = rest
                            .chars()
                            .take_while(|c| c.is_alphanumeric() || *c == '_')
                            .collect();
                        if !marker.is_empty() {
                            // The rest of the opening line belongs to the heredoc
                            self.heredoc = Some(marker);
                            break;
                        }
                        i += 1;
                    }
                    ('{', _) => self.depth += 1,
                    ('}', _) => self.depth -= 1,
                    _ => {}
                }
            }
            i += 1;
        }
    }
}

/// Where things sit inside the backend block, as line indexes.
struct BlockLayout {
    organization: Option<usize>,
    document: Option<usize>,
    /// Block is still open after the organization line
    open_after_organization: bool,
}

/// Find the top-level `backend "tmcloud"` block and its attribute lines.
///
/// Headers nested in other blocks, inside comments or heredocs, or naming a
/// different backend are not candidates.
fn locate(lines: &[&str]) -> Result<BlockLayout> {
    let mut scanner = Scanner::default();
    let mut header = None;
    for (index, line) in lines.iter().enumerate() {
        let candidate = scanner.depth == 0
            && scanner.in_code()
            && BACKEND_HEADER
                .captures(line)
                .is_some_and(|c| &c[1] == BACKEND_NAME);
        scanner.feed(line);
        if candidate {
            header = Some(index);
            break;
        }
    }
    let header = header.ok_or_else(|| {
        Error::Parse(format!("no top-level backend \"{}\" block found", BACKEND_NAME))
    })?;

    let mut layout = BlockLayout {
        organization: None,
        document: None,
        open_after_organization: false,
    };

    for (index, line) in lines.iter().enumerate().skip(header + 1) {
        if scanner.depth <= 0 {
            break;
        }
        let at_top = scanner.depth == 1 && scanner.in_code();
        scanner.feed(line);

        if !at_top {
            continue;
        }
        // An organization line that opens a heredoc or comment is no anchor
        if layout.organization.is_none() && ORGANIZATION_LINE.is_match(line) && scanner.in_code() {
            layout.organization = Some(index);
            layout.open_after_organization = scanner.depth > 0;
        }
        if layout.document.is_none() && DOCUMENT_LINE.is_match(line) {
            layout.document = Some(index);
        }
    }

    Ok(layout)
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// The declared value as written: the string literal's content, or the
/// expression text when the value is not a plain string.
fn declared_value(line: &str) -> String {
    if let Some(value) = DOCUMENT_LITERAL.captures(line).and_then(|c| c.get(1)) {
        return value.as_str().to_string();
    }
    line.split_once('=')
        .map(|(_, rhs)| rhs.trim().to_string())
        .unwrap_or_default()
}

/// Swap the literal on the document line for `slug`.
///
/// A value that is not a string literal cannot be edited safely and is
/// reported as [`Error::AlreadySet`].
fn set_document_value(lines: &[&str], doc_index: usize, slug: &str) -> Result<String> {
    let line = lines[doc_index];
    let value = DOCUMENT_LITERAL
        .captures(line)
        .and_then(|c| c.get(1))
        .ok_or_else(|| Error::AlreadySet(declared_value(line)))?;

    let mut output = String::with_capacity(lines.iter().map(|l| l.len()).sum::<usize>() + slug.len());
    for (index, current) in lines.iter().enumerate() {
        if index == doc_index {
            output.push_str(&line[..value.start()]);
            output.push_str(slug);
            output.push_str(&line[value.end()..]);
        } else {
            output.push_str(current);
        }
    }
    Ok(output)
}

/// Add a `document = "<slug>"` line after the organization line.
///
/// An empty `document = ""` is filled in place. Any other declaration fails
/// with [`Error::AlreadySet`], leaving the text untouched.
pub fn insert_document_line(text: &str, slug: &str) -> Result<String> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let layout = locate(&lines)?;

    if let Some(index) = layout.document {
        let existing = declared_value(lines[index]);
        if existing.is_empty() {
            return set_document_value(&lines, index, slug);
        }
        return Err(Error::AlreadySet(existing));
    }

    let org_index = layout.organization.ok_or_else(|| {
        Error::Parse("backend block has no organization line of its own".to_string())
    })?;
    let org_line = lines[org_index];
    let indent = ORGANIZATION_LINE
        .captures(org_line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");

    let mut output = String::with_capacity(text.len() + slug.len() + 32);
    for (index, line) in lines.iter().enumerate() {
        if index == org_index && layout.open_after_organization {
            output.push_str(line);
            if !line.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&format!("{}document = \"{}\"{}", indent, slug, line_ending(line)));
        } else if index == org_index {
            // Organization line also closes the block
            output.push_str(&format!("{}document = \"{}\"{}", indent, slug, line_ending(line)));
            output.push_str(line);
        } else {
            output.push_str(line);
        }
    }
    Ok(output)
}

/// Point the block's `document` line at `slug`, adding the line if absent.
pub fn replace_document_line(text: &str, slug: &str) -> Result<String> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let layout = locate(&lines)?;

    match layout.document {
        Some(doc_index) => set_document_value(&lines, doc_index, slug),
        None => insert_document_line(text, slug),
    }
}

/// Applies backend-block edits to files on disk.
#[derive(Clone)]
pub struct BackendRewriter {
    fs: Arc<dyn FileSystem>,
}

impl BackendRewriter {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn backup_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        path.with_file_name(name)
    }

    /// Record `slug` as the document short-name of the file at `path`.
    pub fn insert_document(&self, path: &Path, slug: &str) -> Result<()> {
        self.apply(path, |text| insert_document_line(text, slug))
    }

    /// Replace the document short-name of the file at `path` with `slug`.
    pub fn replace_document(&self, path: &Path, slug: &str) -> Result<()> {
        self.apply(path, |text| replace_document_line(text, slug))
    }

    fn apply(&self, path: &Path, edit: impl FnOnce(&str) -> Result<String>) -> Result<()> {
        let original = self.fs.read(path).map_err(|e| Error::io(path, e))?;
        let text = std::str::from_utf8(&original)
            .map_err(|e| Error::Parse(format!("{} is not valid UTF-8: {}", path.display(), e)))?;

        // Compute the edit before touching the disk
        let updated = edit(text)?;
        if updated.as_bytes() == original.as_slice() {
            return Ok(());
        }

        let backup = Self::backup_path(path);
        self.fs
            .copy(path, &backup)
            .map_err(|e| Error::io(&backup, e))?;

        if let Err(write_err) = self.fs.write(path, updated.as_bytes()) {
            tracing::warn!("Write to {} failed, restoring backup", path.display());
            match self.fs.copy(&backup, path) {
                Ok(()) => {
                    if let Err(e) = self.fs.remove(&backup) {
                        tracing::warn!("Failed to remove backup {}: {}", backup.display(), e);
                    }
                }
                Err(restore_err) => {
                    tracing::error!(
                        "Failed to restore {} from {}: {}",
                        path.display(),
                        backup.display(),
                        restore_err
                    );
                }
            }
            return Err(Error::io(path, write_err));
        }

        if let Err(e) = self.fs.remove(&backup) {
            tracing::warn!("Failed to remove backup {}: {}", backup.display(), e);
        }
        tracing::info!("Updated backend block in {}", path.display());
        Ok(())
    }
}
