//! Ordered patch sets.
//!
//! A patch set is every `*.patch` file directly inside a module's patch
//! directory, sorted by file name. `git format-patch` numbers its output
//! (`0001-...`), so name order is application order.

use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Extension of patch files.
pub const PATCH_EXTENSION: &str = "patch";

static NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-").expect("valid regex"));

static SUBJECT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[PATCH[^\]]*\]\s*").expect("valid regex"));

static INDEX_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^index [0-9a-f]+\.\.[0-9a-f]+( \d+)?$").expect("valid regex"));

/// A single patch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    /// Full path.
    pub path: PathBuf,
    /// File name, e.g. `0001-Add-config.patch`.
    pub file_name: String,
    /// 1-based position in the set.
    pub index: usize,
    /// Numeric prefix of the file name, if any.
    pub number: Option<u32>,
    /// Commit subject without the `[PATCH]` tag.
    pub subject: String,
    /// Author from the `From:` header.
    pub author: Option<String>,
}

impl PatchFile {
    /// Read a patch file's headers.
    pub fn read(path: &Path, index: usize) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let content = String::from_utf8_lossy(&bytes);
        let headers = parse_headers(&content);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let number = NUMBER_PREFIX
            .captures(&file_name)
            .and_then(|c| c[1].parse().ok());

        Ok(Self {
            path: path.to_path_buf(),
            subject: headers.subject.unwrap_or_else(|| file_name.clone()),
            author: headers.author,
            file_name,
            index,
            number,
        })
    }
}

/// The ordered patches of one directory.
#[derive(Debug, Clone, Default)]
pub struct PatchSet {
    dir: PathBuf,
    exists: bool,
    patches: Vec<PatchFile>,
}

impl PatchSet {
    /// Load a patch set. A missing directory is an empty set.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            log::debug!("Patch directory {} does not exist", dir.display());
            return Ok(Self {
                dir: dir.to_path_buf(),
                exists: false,
                patches: Vec::new(),
            });
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == PATCH_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let patches = paths
            .iter()
            .enumerate()
            .map(|(i, path)| PatchFile::read(path, i + 1))
            .collect::<Result<Vec<_>>>()?;

        log::debug!("Loaded {} patches from {}", patches.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            exists: true,
            patches,
        })
    }

    /// Load a patch set whose directory must exist.
    pub fn load_existing(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::PatchDirMissing(dir.to_path_buf()));
        }
        Self::load(dir)
    }

    /// Directory the set was loaded from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory existed.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Patches in application order.
    #[must_use]
    pub fn patches(&self) -> &[PatchFile] {
        &self.patches
    }

    /// Number of patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Iterate patches in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PatchFile> {
        self.patches.iter()
    }
}

impl<'a> IntoIterator for &'a PatchSet {
    type Item = &'a PatchFile;
    type IntoIter = std::slice::Iter<'a, PatchFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}

/// Headers extracted from an mbox-style patch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PatchHeaders {
    /// `Subject:` with folded lines joined and the `[PATCH]` tag removed.
    pub subject: Option<String>,
    /// `From:` value.
    pub author: Option<String>,
}

/// Parse the mail headers at the top of a patch (up to the first blank line).
pub fn parse_headers(content: &str) -> PatchHeaders {
    let mut headers = PatchHeaders::default();
    let mut subject: Option<String> = None;
    let mut in_subject = false;

    for line in content.lines() {
        if line.is_empty() {
            break;
        }
        if in_subject && line.starts_with([' ', '\t']) {
            if let Some(s) = subject.as_mut() {
                s.push(' ');
                s.push_str(line.trim());
            }
            continue;
        }
        in_subject = false;

        if let Some(value) = line.strip_prefix("Subject:") {
            subject = Some(value.trim().to_string());
            in_subject = true;
        } else if let Some(value) = line.strip_prefix("From:") {
            headers.author = Some(value.trim().to_string());
        }
    }

    headers.subject = subject.map(|s| SUBJECT_TAG.replace(&s, "").into_owned());
    headers
}

/// Drop lines that change between two renderings of the same commit.
///
/// Removes the leading `From <sha> <date>` mbox separator and the
/// `index <a>..<b>` blob lines.
pub fn normalize(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for (i, line) in content.lines().enumerate() {
        if i == 0 && line.starts_with("From ") {
            continue;
        }
        if INDEX_LINE.is_match(line) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// blake3 hash of the normalized patch content.
#[must_use]
pub fn content_hash(content: &str) -> blake3::Hash {
    blake3::hash(normalize(content).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001
From: Jane Dev <jane@example.com>
Date: Sat, 6 Mar 2021 12:00:00 +0000
Subject: [PATCH] Optimize entity tracker by skipping
 inactive chunks

diff --git a/src/Tracker.java b/src/Tracker.java
index 1a2b3c4d5e..6f7a8b9c0d 100644
--- a/src/Tracker.java
+++ b/src/Tracker.java
@@ -1 +1 @@
-old
+new
";

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_parse_headers_folds_subject() {
        let headers = parse_headers(SAMPLE);
        assert_eq!(
            headers.subject.as_deref(),
            Some("Optimize entity tracker by skipping inactive chunks")
        );
        assert_eq!(headers.author.as_deref(), Some("Jane Dev <jane@example.com>"));
    }

    #[test]
    fn test_parse_headers_strips_numbered_tag() {
        let headers = parse_headers("Subject: [PATCH 2/7] Add thing\n\nbody");
        assert_eq!(headers.subject.as_deref(), Some("Add thing"));
    }

    #[test]
    fn test_parse_headers_ignores_body() {
        let headers = parse_headers("From: a\n\nSubject: not a header\n");
        assert_eq!(headers.subject, None);
    }

    #[test]
    fn test_normalize_drops_volatile_lines() {
        let other = SAMPLE
            .replace("1a2b3c4d5e..6f7a8b9c0d", "ffffffffff..eeeeeeeeee")
            .replacen(
                "From 0000000000000000000000000000000000000000",
                "From 1234567890abcdef1234567890abcdef12345678",
                1,
            );
        assert_eq!(normalize(SAMPLE), normalize(&other));
        assert_eq!(content_hash(SAMPLE), content_hash(&other));
        assert!(!normalize(SAMPLE).contains("index "));
    }

    #[test]
    fn test_content_hash_detects_real_changes() {
        let changed = SAMPLE.replace("+new", "+newer");
        assert_ne!(content_hash(SAMPLE), content_hash(&changed));
    }

    #[test]
    fn test_load_orders_by_name_and_filters() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "0002-Second.patch", "Subject: [PATCH] Second\n\n");
        write(tmp.path(), "0001-First.patch", "Subject: [PATCH] First\n\n");
        write(tmp.path(), "0010-Tenth.patch", "Subject: [PATCH] Tenth\n\n");
        write(tmp.path(), "README.md", "not a patch");
        fs::create_dir(tmp.path().join("0003-dir.patch")).unwrap();

        let set = PatchSet::load(tmp.path()).unwrap();
        assert!(set.exists());
        let names: Vec<_> = set.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["0001-First.patch", "0002-Second.patch", "0010-Tenth.patch"]
        );
        assert_eq!(set.patches()[2].index, 3);
        assert_eq!(set.patches()[2].number, Some(10));
        assert_eq!(set.patches()[0].subject, "First");
    }

    #[test]
    fn test_subject_falls_back_to_file_name() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "custom.patch", "--- a\n+++ b\n");
        let set = PatchSet::load(tmp.path()).unwrap();
        assert_eq!(set.patches()[0].subject, "custom.patch");
        assert_eq!(set.patches()[0].number, None);
    }

    #[test]
    fn test_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("patches").join("api");

        let set = PatchSet::load(&missing).unwrap();
        assert!(!set.exists());
        assert!(set.is_empty());

        assert!(matches!(
            PatchSet::load_existing(&missing),
            Err(Error::PatchDirMissing(_))
        ));
    }
}
