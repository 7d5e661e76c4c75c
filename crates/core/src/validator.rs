//! Structural validation of module candidates
//!
//! A cheap pre-filter run before the build tool: it parses the two required
//! source files and checks that they declare the plugin capability impls.
//! Passing it does not guarantee the module compiles.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    parser::RustParser,
};

/// Entry source file, relative to the module directory
pub const ENTRY_SOURCE: &str = "src/lib.rs";

/// Metadata source file, relative to the module directory
pub const METADATA_SOURCE: &str = "src/metadata.rs";

pub const ENTRY_TRAIT: &str = "GameModule";
pub const METADATA_TRAIT: &str = "GameMetadata";

/// Accessors every `GameMetadata` impl must define
pub const REQUIRED_METADATA_METHODS: &[&str] = &[
    "game_name",
    "game_version",
    "game_description",
    "game_author",
    "min_players",
    "max_players",
    "min_difficulty",
    "max_difficulty",
    "estimated_duration_minutes",
    "required_resources",
    "supports_online_multiplayer",
    "supports_local_multiplayer",
    "supports_single_player",
];

/// The first check a candidate failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    MissingSource(PathBuf),
    UnreadableSource(PathBuf),
    MissingEntryImpl,
    MissingStruct,
    MissingMetadataImpl,
    MissingMetadataMethod(String),
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::MissingSource(path) => {
                write!(f, "missing source file {}", path.display())
            }
            ValidationFailure::UnreadableSource(path) => {
                write!(f, "cannot read source file {}", path.display())
            }
            ValidationFailure::MissingEntryImpl => {
                write!(f, "{ENTRY_SOURCE} has no `impl {ENTRY_TRAIT} for ...`")
            }
            ValidationFailure::MissingStruct => {
                write!(f, "{ENTRY_SOURCE} declares no struct")
            }
            ValidationFailure::MissingMetadataImpl => {
                write!(f, "{METADATA_SOURCE} has no `impl {METADATA_TRAIT} for ...`")
            }
            ValidationFailure::MissingMetadataMethod(method) => {
                write!(f, "{METADATA_SOURCE} does not define `{method}`")
            }
        }
    }
}

/// What a successful validation found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub entry_type: String,
    pub metadata_type: String,
    /// The entry file parsed with syntax errors; the build will decide
    pub has_syntax_errors: bool,
}

pub struct StructuralValidator {
    parser: RustParser,
}

impl StructuralValidator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: RustParser::new()?,
        })
    }

    /// Both required sources exist under `dir`
    pub fn has_required_sources(dir: &Path) -> bool {
        dir.join(ENTRY_SOURCE).is_file() && dir.join(METADATA_SOURCE).is_file()
    }

    pub fn validate(
        &mut self,
        dir: &Path,
    ) -> std::result::Result<ValidationReport, ValidationFailure> {
        let result = self.run_checks(dir);
        match &result {
            Ok(report) => tracing::debug!(
                "{:?} passed structural validation (entry: {}, metadata: {})",
                dir,
                report.entry_type,
                report.metadata_type
            ),
            Err(failure) => tracing::info!("Skipping {:?}: {}", dir, failure),
        }
        result
    }

    /// Like [`validate`](Self::validate) but as a crate error
    pub fn check(&mut self, dir: &Path) -> Result<ValidationReport> {
        self.validate(dir).map_err(|failure| Error::ValidationError {
            dir: dir.to_path_buf(),
            failure,
        })
    }

    fn run_checks(
        &mut self,
        dir: &Path,
    ) -> std::result::Result<ValidationReport, ValidationFailure> {
        let entry_path = dir.join(ENTRY_SOURCE);
        let metadata_path = dir.join(METADATA_SOURCE);
        for path in [&entry_path, &metadata_path] {
            if !path.is_file() {
                return Err(ValidationFailure::MissingSource(path.clone()));
            }
        }

        let entry_source = read_source(&entry_path)?;
        let entry = self
            .parser
            .outline(&entry_source)
            .map_err(|_| ValidationFailure::UnreadableSource(entry_path.clone()))?;
        let entry_impl = entry
            .find_impl(ENTRY_TRAIT)
            .ok_or(ValidationFailure::MissingEntryImpl)?;
        if !entry.has_struct() {
            return Err(ValidationFailure::MissingStruct);
        }

        let metadata_source = read_source(&metadata_path)?;
        let metadata = self
            .parser
            .outline(&metadata_source)
            .map_err(|_| ValidationFailure::UnreadableSource(metadata_path.clone()))?;
        let metadata_impl = metadata
            .find_impl(METADATA_TRAIT)
            .ok_or(ValidationFailure::MissingMetadataImpl)?;
        if let Some(missing) = REQUIRED_METADATA_METHODS
            .iter()
            .find(|method| !metadata_impl.defines(method))
        {
            return Err(ValidationFailure::MissingMetadataMethod(
                missing.to_string(),
            ));
        }

        Ok(ValidationReport {
            entry_type: entry_impl.self_type.clone(),
            metadata_type: metadata_impl.self_type.clone(),
            has_syntax_errors: entry.has_errors || metadata.has_errors,
        })
    }
}

fn read_source(path: &Path) -> std::result::Result<String, ValidationFailure> {
    std::fs::read_to_string(path)
        .map_err(|_| ValidationFailure::UnreadableSource(path.to_path_buf()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::fs;

    pub const ENTRY: &str = r#"
use gdk_api::{GameModule, GameMetadata, GameSurface, Message, ModuleError, Scene};

mod metadata;

pub struct Chess {
    info: metadata::ChessInfo,
}

impl GameModule for Chess {
    fn game_id(&self) -> String { "chess".to_string() }
    fn metadata(&self) -> &dyn GameMetadata { &self.info }
    fn launch(
        &mut self,
        _surface: &mut dyn GameSurface,
        _config: Option<&Message>,
    ) -> Result<Scene, ModuleError> {
        Ok(Scene::new("Chess"))
    }
    fn stop(&mut self) {}
    fn handle_message(&mut self, message: &Message) -> Message { message.clone() }
}
"#;

    pub fn metadata_source(skip: Option<&str>) -> String {
        let mut source = String::from("use gdk_api::GameMetadata;\n\npub struct ChessInfo;\n\nimpl GameMetadata for ChessInfo {\n");
        for method in REQUIRED_METADATA_METHODS {
            if Some(*method) == skip {
                continue;
            }
            source.push_str(&format!("    fn {method}(&self) -> u32 {{ 0 }}\n"));
        }
        source.push_str("}\n");
        source
    }

    /// Write a module with a valid entry and metadata file
    pub fn write_module(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(
            dir.join("Cargo.toml"),
            format!("[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nedition = \"2024\"\n\n[lib]\ncrate-type = [\"cdylib\"]\n"),
        )
        .unwrap();
        fs::write(dir.join(ENTRY_SOURCE), ENTRY).unwrap();
        fs::write(dir.join(METADATA_SOURCE), metadata_source(None)).unwrap();
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_valid_module_passes() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_module(temp_dir.path(), "chess");

        let mut validator = StructuralValidator::new().unwrap();
        let report = validator.validate(&dir).unwrap();
        assert_eq!(report.entry_type, "Chess");
        assert_eq!(report.metadata_type, "ChessInfo");
        assert!(!report.has_syntax_errors);
    }

    #[test]
    fn test_missing_metadata_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_module(temp_dir.path(), "chess");
        fs::remove_file(dir.join(METADATA_SOURCE)).unwrap();

        let mut validator = StructuralValidator::new().unwrap();
        assert_eq!(
            validator.validate(&dir),
            Err(ValidationFailure::MissingSource(dir.join(METADATA_SOURCE)))
        );
        assert!(!StructuralValidator::has_required_sources(&dir));
    }

    #[test]
    fn test_entry_without_impl_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_module(temp_dir.path(), "chess");
        fs::write(
            dir.join(ENTRY_SOURCE),
            "// impl GameModule for Chess\npub struct Chess;\n",
        )
        .unwrap();

        let mut validator = StructuralValidator::new().unwrap();
        assert_eq!(
            validator.validate(&dir),
            Err(ValidationFailure::MissingEntryImpl)
        );
    }

    #[test]
    fn test_entry_without_struct_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_module(temp_dir.path(), "chess");
        fs::write(
            dir.join(ENTRY_SOURCE),
            "pub enum Chess { A }\nimpl GameModule for Chess {}\n",
        )
        .unwrap();

        let mut validator = StructuralValidator::new().unwrap();
        assert_eq!(
            validator.validate(&dir),
            Err(ValidationFailure::MissingStruct)
        );
    }

    #[test]
    fn test_metadata_missing_accessor_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_module(temp_dir.path(), "chess");
        fs::write(
            dir.join(METADATA_SOURCE),
            metadata_source(Some("supports_single_player")),
        )
        .unwrap();

        let mut validator = StructuralValidator::new().unwrap();
        assert_eq!(
            validator.validate(&dir),
            Err(ValidationFailure::MissingMetadataMethod(
                "supports_single_player".to_string()
            ))
        );
    }

    #[test]
    fn test_metadata_impl_of_other_trait_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_module(temp_dir.path(), "chess");
        fs::write(
            dir.join(METADATA_SOURCE),
            "pub struct ChessInfo;\nimpl Default for ChessInfo { fn default() -> Self { ChessInfo } }\n",
        )
        .unwrap();

        let mut validator = StructuralValidator::new().unwrap();
        let err = validator.check(&dir).unwrap_err();
        assert!(matches!(
            err,
            Error::ValidationError {
                failure: ValidationFailure::MissingMetadataImpl,
                ..
            }
        ));
    }
}
