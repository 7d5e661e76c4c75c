use cargo_toml::Manifest;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::validator::{ENTRY_SOURCE, METADATA_SOURCE};

/// Written into the output directory after every successful build
pub const BUILD_MARKER: &str = ".gdk-build-stamp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl SourceFile {
    fn inspect(path: PathBuf) -> Self {
        let modified = modified_time(&path);
        Self { path, modified }
    }

    pub fn exists(&self) -> bool {
        self.modified.is_some()
    }
}

/// A directory under the modules root, as seen on one discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCandidate {
    /// Directory basename
    pub name: String,
    pub dir: PathBuf,
    pub entry: SourceFile,
    pub metadata: SourceFile,
    /// `target/<profile>` inside the module
    pub output_dir: PathBuf,
    pub marker_modified: Option<SystemTime>,
    /// File name of the compiled library, e.g. `libchess.so`
    pub library_file_name: String,
    /// Newest modification time among `Cargo.toml` and everything under `src/`
    pub newest_source: Option<SystemTime>,
}

impl ModuleCandidate {
    pub fn inspect(dir: &Path, profile: &str) -> Option<Self> {
        let name = dir.file_name()?.to_str()?.to_string();
        let output_dir = dir.join("target").join(profile);
        let lib_name = library_crate_name(dir).unwrap_or_else(|| name.replace('-', "_"));

        Some(Self {
            entry: SourceFile::inspect(dir.join(ENTRY_SOURCE)),
            metadata: SourceFile::inspect(dir.join(METADATA_SOURCE)),
            marker_modified: modified_time(&output_dir.join(BUILD_MARKER)),
            library_file_name: library_file_name(&lib_name),
            newest_source: newest_source_time(dir),
            output_dir,
            dir: dir.to_path_buf(),
            name,
        })
    }

    pub fn has_required_sources(&self) -> bool {
        self.entry.exists() && self.metadata.exists()
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.library_file_name)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.output_dir.join(BUILD_MARKER)
    }

    /// Whether the module must be (re)built before it can be loaded.
    ///
    /// True when the output directory, the library or the build marker is
    /// missing, or when any source file is newer than the marker.
    pub fn needs_compilation(&self) -> bool {
        if !self.output_dir.is_dir() || !self.artifact_path().is_file() {
            return true;
        }
        let Some(marker) = self.marker_modified else {
            return true;
        };
        match self.newest_source {
            Some(source) => source > marker,
            None => false,
        }
    }

    /// Record a successful build
    pub fn write_build_marker(&mut self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        let stamp = chrono::Utc::now().to_rfc3339();
        std::fs::write(self.marker_path(), stamp)?;
        self.marker_modified = modified_time(&self.marker_path());
        Ok(())
    }
}

/// Platform file name of a dynamic library
pub fn library_file_name(lib_name: &str) -> String {
    format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        lib_name,
        std::env::consts::DLL_SUFFIX
    )
}

/// `[lib] name`, or the package name with dashes replaced
fn library_crate_name(dir: &Path) -> Option<String> {
    let manifest_path = dir.join("Cargo.toml");
    if !manifest_path.is_file() {
        return None;
    }
    let manifest = match Manifest::from_path(&manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::debug!("Failed to parse {:?}: {}", manifest_path, e);
            return None;
        }
    };

    if let Some(name) = manifest.lib.as_ref().and_then(|lib| lib.name.clone()) {
        return Some(name);
    }
    manifest
        .package
        .as_ref()
        .map(|package| package.name.replace('-', "_"))
}

fn newest_source_time(dir: &Path) -> Option<SystemTime> {
    let manifest = modified_time(&dir.join("Cargo.toml"));
    let sources = WalkDir::new(dir.join("src"))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok()?.modified().ok());

    sources.chain(manifest).max()
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}
