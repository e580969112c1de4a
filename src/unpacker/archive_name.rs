use crate::config::NestedMode;
use crate::error::{Result, UnpackError};
use regex::Regex;
use std::ffi::OsStr;
use std::fmt;
use std::str::FromStr;

/// A validated `<identifier>.<extension>` file name.
///
/// The identifier names the directory the archive unpacks into, so it must be
/// a single non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    file_name: String,
    identifier: String,
    extension: String,
}

impl ArchiveName {
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(UnpackError::name_format(name, "name is empty"));
        }

        if name.contains('/') || name.contains('\\') {
            return Err(UnpackError::name_format(
                name,
                "name must not contain path separators",
            ));
        }

        let (identifier, extension) = name
            .split_once('.')
            .ok_or_else(|| UnpackError::name_format(name, "missing '.' before the extension"))?;

        if extension.contains('.') {
            return Err(UnpackError::name_format(
                name,
                "expected exactly one '.' separating name and extension",
            ));
        }

        if identifier.is_empty() {
            return Err(UnpackError::name_format(name, "name before '.' is empty"));
        }

        if extension.is_empty() {
            return Err(UnpackError::name_format(name, "extension is empty"));
        }

        Ok(Self {
            file_name: name.to_string(),
            identifier: identifier.to_string(),
            extension: extension.to_string(),
        })
    }

    /// Parse a directory entry name; non UTF-8 names are rejected.
    pub fn from_os_str(name: &OsStr) -> Result<Self> {
        let name = name
            .to_str()
            .ok_or_else(|| UnpackError::name_format(name.to_string_lossy(), "name is not valid UTF-8"))?;
        Self::parse(name)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl FromStr for ArchiveName {
    type Err = UnpackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Decides which top-level archives hold nested per-class archives.
#[derive(Debug, Clone)]
pub enum SplitSelector {
    All,
    Matching(Regex),
}

impl SplitSelector {
    pub fn new(mode: NestedMode, pattern: &str) -> Result<Self> {
        match mode {
            NestedMode::All => Ok(SplitSelector::All),
            NestedMode::MatchingSplits => Ok(SplitSelector::Matching(Regex::new(pattern)?)),
        }
    }

    pub fn bears_nested_archives(&self, archive: &ArchiveName) -> bool {
        match self {
            SplitSelector::All => true,
            SplitSelector::Matching(pattern) => pattern.is_match(archive.file_name()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SplitSelector::All => "all archives".to_string(),
            SplitSelector::Matching(pattern) => format!("archives matching '{}'", pattern),
        }
    }
}
