//! Where migration scripts come from, and how their filenames are read.
//!
//! A [ScriptSource] is a read-only, flat store of named scripts. The migrator only
//! ever looks at the root of a source, and relies on [ScriptSource::list] returning
//! names in ascending order: that order is the order scripts are applied in.

use crate::core::{Direction, Script, Version};
use crate::error::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

static UP_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^([\w-]+)\.up\.sql$").expect("up pattern is valid"));
static DOWN_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^([\w-]+)\.down\.sql$").expect("down pattern is valid"));

/// A read-only store of migration scripts.
pub trait ScriptSource: Send + Sync {
    /// Names of the entries at the root of the source, sorted ascending.
    fn list(&self) -> Result<Vec<String>, Error>;

    /// The full content of the named entry.
    fn read(&self, name: &str) -> Result<String, Error>;
}

impl<S: ScriptSource + ?Sized> ScriptSource for Box<S> {
    fn list(&self) -> Result<Vec<String>, Error> {
        (**self).list()
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        (**self).read(name)
    }
}

/// Parse the version out of a script filename, if it is a script for `direction`.
pub fn parse_script_name(name: &str, direction: Direction) -> Option<Version> {
    let pattern = match direction {
        Direction::Up => &UP_SCRIPT,
        Direction::Down => &DOWN_SCRIPT,
    };
    pattern
        .captures(name)
        .map(|captures| Version::new(&captures[1]))
}

/// List the scripts in `source` for `direction`, in the order the source lists them.
/// Entries that don't match the direction's filename pattern are skipped.
pub fn list_scripts(source: &dyn ScriptSource, direction: Direction) -> Result<Vec<Script>, Error> {
    let scripts = source
        .list()?
        .into_iter()
        .filter_map(|name| {
            let version = parse_script_name(&name, direction)?;
            Some(Script {
                name,
                version,
                direction,
            })
        })
        .collect();
    Ok(scripts)
}

/// Scripts stored as files directly inside a directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScriptSource for DirSource {
    fn list(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            // follows symlinks, like read does
            if !fs::metadata(entry.path())?.is_file() {
                continue;
            }
            // non-UTF-8 names can never match a script pattern
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        Ok(fs::read_to_string(self.root.join(name))?)
    }
}

/// Scripts held in memory, keyed by filename.
///
/// ```
/// use sqlmigrate::MemorySource;
///
/// let source = MemorySource::new()
///     .with_script("1.up.sql", "create table users (id integer primary key)")
///     .with_script("1.down.sql", "drop table users");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scripts: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.scripts.insert(name.into(), content.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            scripts: iter
                .into_iter()
                .map(|(name, content)| (name.into(), content.into()))
                .collect(),
        }
    }
}

impl ScriptSource for MemorySource {
    fn list(&self) -> Result<Vec<String>, Error> {
        Ok(self.scripts.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ScriptNotFound(name.to_string()))
    }
}

/// Scripts compiled into the binary with [rust_embed].
///
/// Only files at the root of the embedded folder are visible, so point the
/// `#[folder]` attribute at the scripts directory itself.
///
/// ```ignore
/// #[derive(rust_embed::RustEmbed)]
/// #[folder = "migrations/"]
/// struct Migrations;
///
/// let source = sqlmigrate::EmbeddedSource::<Migrations>::new();
/// ```
#[cfg(feature = "embed")]
#[cfg_attr(docsrs, doc(cfg(feature = "embed")))]
pub struct EmbeddedSource<E> {
    _assets: std::marker::PhantomData<fn() -> E>,
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> EmbeddedSource<E> {
    pub fn new() -> Self {
        Self {
            _assets: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> Default for EmbeddedSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> ScriptSource for EmbeddedSource<E> {
    fn list(&self) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = E::iter()
            .filter(|path| !path.contains('/'))
            .map(|path| path.into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        let file = E::get(name).ok_or_else(|| Error::ScriptNotFound(name.to_string()))?;
        String::from_utf8(file.data.into_owned())
            .map_err(|e| Error::Generic(format!("script {name} is not valid UTF-8: {e}")))
    }
}
