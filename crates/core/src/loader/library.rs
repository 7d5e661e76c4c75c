//! Loading module artifacts and instantiating their game types

use gdk_api::{
    API_CRATE_VERSION, GameModule, MODULE_API_VERSION, MODULE_DECLARATION_SYMBOL,
    ModuleDeclaration,
};
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::candidate::ModuleCandidate;
use crate::error::{Error, Result};

/// Directory under a module's output directory holding per-attempt copies
/// of its library
pub const LOAD_DIR: &str = ".gdk-load";

static LOAD_GENERATION: AtomicU64 = AtomicU64::new(0);

/// A live game object together with what keeps its code loaded
pub struct PluginInstance {
    // Declared before `library` so the game is dropped while its code is
    // still mapped
    game: Box<dyn GameModule>,
    module_name: String,
    library: Option<Arc<ModuleLibrary>>,
}

impl PluginInstance {
    /// An instance whose code is compiled into the launcher itself
    pub fn builtin(module_name: impl Into<String>, game: Box<dyn GameModule>) -> Self {
        Self {
            game,
            module_name: module_name.into(),
            library: None,
        }
    }

    fn from_library(
        module_name: &str,
        game: Box<dyn GameModule>,
        library: Arc<ModuleLibrary>,
    ) -> Self {
        Self {
            game,
            module_name: module_name.to_string(),
            library: Some(library),
        }
    }

    /// Name of the module directory the instance came from
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn game(&self) -> &dyn GameModule {
        self.game.as_ref()
    }

    pub fn game_mut(&mut self) -> &mut dyn GameModule {
        self.game.as_mut()
    }

    /// The build artifact the instance was loaded from
    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_deref().map(ModuleLibrary::source_path)
    }

    pub fn is_builtin(&self) -> bool {
        self.library.is_none()
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("module_name", &self.module_name)
            .field("game_id", &self.game.game_id())
            .field("library_path", &self.library_path())
            .finish()
    }
}

/// Creates a [`PluginInstance`] for a candidate that passed validation and build
pub trait ModuleFactory: Send + Sync {
    fn instantiate(&self, candidate: &ModuleCandidate) -> Result<PluginInstance>;
}

/// Builds the per-attempt search path for module libraries
#[derive(Debug, Clone, Default)]
pub struct LibraryLoaderFactory {
    shared_dirs: Vec<PathBuf>,
}

impl LibraryLoaderFactory {
    pub fn new(shared_dirs: Vec<PathBuf>) -> Self {
        Self { shared_dirs }
    }

    pub fn shared_dirs(&self) -> &[PathBuf] {
        &self.shared_dirs
    }

    /// The module's own output directory (when it exists), then the shared
    /// directories in configuration order
    pub fn for_candidate(&self, candidate: &ModuleCandidate) -> ModuleLibraryLoader {
        let mut search_path = Vec::with_capacity(self.shared_dirs.len() + 1);
        if candidate.output_dir.is_dir() {
            search_path.push(candidate.output_dir.clone());
        }
        search_path.extend(self.shared_dirs.iter().cloned());

        ModuleLibraryLoader {
            module_name: candidate.name.clone(),
            file_name: candidate.library_file_name.clone(),
            search_path,
            load_dir: candidate.output_dir.join(LOAD_DIR),
        }
    }
}

/// Resolves and opens one module's library. One loader per load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLibraryLoader {
    pub module_name: String,
    pub file_name: String,
    pub search_path: Vec<PathBuf>,
    /// Where the private copy of the library is written before opening it
    pub load_dir: PathBuf,
}

impl ModuleLibraryLoader {
    /// First directory on the search path containing the library
    pub fn resolve(&self) -> Option<PathBuf> {
        self.search_path
            .iter()
            .map(|dir| dir.join(&self.file_name))
            .find(|path| path.is_file())
    }

    /// Copy the resolved library to a fresh file and open the copy.
    ///
    /// The dynamic loader hands back an already mapped image when asked for
    /// a path (or file) it has open, so a rebuilt artifact is only read
    /// again under a name no live instance holds.
    pub fn open(&self) -> Result<ModuleLibrary> {
        let source_path = self.resolve().ok_or_else(|| {
            Error::LibraryError(format!(
                "{} not found for module '{}' (searched {:?})",
                self.file_name, self.module_name, self.search_path
            ))
        })?;

        std::fs::create_dir_all(&self.load_dir)?;
        let generation = LOAD_GENERATION.fetch_add(1, Ordering::Relaxed);
        let copy_path = self.load_dir.join(format!(
            "{}-{}-{}",
            std::process::id(),
            generation,
            self.file_name
        ));
        std::fs::copy(&source_path, &copy_path)?;
        let copy = LoadCopy(copy_path);

        tracing::debug!(
            "Opening {:?} as {:?} for module '{}'",
            source_path,
            copy.0,
            self.module_name
        );
        // SAFETY: loading a module runs its initializers; modules are trusted
        // code built from the modules directory.
        let library = unsafe { Library::new(&copy.0) }.map_err(|e| {
            Error::LibraryError(format!("Failed to load {}: {e}", source_path.display()))
        })?;
        Ok(ModuleLibrary {
            library,
            source_path,
            copy,
        })
    }
}

/// An opened private copy of a module library
pub struct ModuleLibrary {
    // Closed before `copy` removes the file
    library: Library,
    source_path: PathBuf,
    copy: LoadCopy,
}

impl ModuleLibrary {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

impl fmt::Debug for ModuleLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLibrary")
            .field("source_path", &self.source_path)
            .field("loaded_path", &self.copy.0)
            .finish()
    }
}

struct LoadCopy(PathBuf);

impl Drop for LoadCopy {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            tracing::debug!("Cannot remove library copy {:?}: {}", self.0, e);
        }
    }
}

/// Libraries currently held open, keyed by module name
#[derive(Clone, Default)]
pub struct LibraryRegistry {
    libraries: Arc<Mutex<HashMap<String, LoadedLibrary>>>,
}

#[derive(Clone)]
struct LoadedLibrary {
    library: Arc<ModuleLibrary>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the registry's handle for a module. Instances created from it
    /// keep the code mapped until they are dropped too.
    pub fn unload(&self, module: &str) -> bool {
        let removed = self.lock().remove(module).is_some();
        if removed {
            tracing::debug!("Unloaded library of module '{}'", module);
        }
        removed
    }

    /// Register a freshly opened library, releasing any previous one
    pub fn replace(&self, module: &str, library: Arc<ModuleLibrary>) {
        self.lock()
            .insert(module.to_string(), LoadedLibrary { library });
    }

    pub fn is_loaded(&self, module: &str) -> bool {
        self.lock().contains_key(module)
    }

    pub fn library_path(&self, module: &str) -> Option<PathBuf> {
        self.lock()
            .get(module)
            .map(|loaded| loaded.library.source_path().to_path_buf())
    }

    pub fn loaded_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LoadedLibrary>> {
        self.libraries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for LibraryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryRegistry")
            .field("modules", &self.loaded_modules())
            .finish()
    }
}

/// Loads modules from their compiled `cdylib`
#[derive(Debug, Clone)]
pub struct DylibFactory {
    loaders: LibraryLoaderFactory,
    registry: LibraryRegistry,
}

impl DylibFactory {
    pub fn new(loaders: LibraryLoaderFactory, registry: LibraryRegistry) -> Self {
        Self { loaders, registry }
    }

    pub fn registry(&self) -> &LibraryRegistry {
        &self.registry
    }
}

impl ModuleFactory for DylibFactory {
    fn instantiate(&self, candidate: &ModuleCandidate) -> Result<PluginInstance> {
        // Instances from the previous attempt keep their own copy alive
        self.registry.unload(&candidate.name);

        let loader = self.loaders.for_candidate(candidate);
        let library = Arc::new(loader.open()?);

        let game = create_game(&library.library, library.source_path())?;
        self.registry.replace(&candidate.name, library.clone());

        tracing::info!(
            "Loaded module '{}' from {:?} (game id '{}')",
            candidate.name,
            library.source_path(),
            game.game_id()
        );
        Ok(PluginInstance::from_library(&candidate.name, game, library))
    }
}

fn create_game(library: &Library, path: &Path) -> Result<Box<dyn GameModule>> {
    // SAFETY: the symbol is the `ModuleDeclaration` static exported by
    // `gdk_api::export_game_module!`; the pointer stays valid while
    // `library` is loaded.
    let declaration: &ModuleDeclaration = unsafe {
        let symbol: Symbol<*const ModuleDeclaration> =
            library.get(MODULE_DECLARATION_SYMBOL).map_err(|e| {
                Error::PluginError(format!(
                    "{} does not export a game module: {e}",
                    path.display()
                ))
            })?;
        let pointer = *symbol;
        if pointer.is_null() {
            return Err(Error::PluginError(format!(
                "{} exports a null module declaration",
                path.display()
            )));
        }
        &*pointer
    };

    check_declaration(declaration, path)?;

    catch_unwind(AssertUnwindSafe(|| (declaration.create)())).map_err(|_| {
        Error::PluginError(format!(
            "constructor of the game in {} panicked",
            path.display()
        ))
    })
}

/// The declaration was produced by the same contract the launcher speaks
pub fn check_declaration(declaration: &ModuleDeclaration, path: &Path) -> Result<()> {
    if declaration.api_version != MODULE_API_VERSION {
        return Err(Error::PluginError(format!(
            "{}: module api_version {} does not match launcher api_version {}",
            path.display(),
            declaration.api_version,
            MODULE_API_VERSION
        )));
    }
    if declaration.api_crate_version != API_CRATE_VERSION {
        return Err(Error::PluginError(format!(
            "{}: module built against gdk-api {}, launcher uses {}",
            path.display(),
            declaration.api_crate_version,
            API_CRATE_VERSION
        )));
    }
    Ok(())
}

type Constructor = Arc<dyn Fn() -> Box<dyn GameModule> + Send + Sync>;

/// Instantiates games compiled into the launcher, keyed by module name.
///
/// Used for built-in games and to exercise discovery without a toolchain.
#[derive(Clone, Default)]
pub struct BuiltinFactory {
    constructors: HashMap<String, Constructor>,
}

impl BuiltinFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module<F>(mut self, module: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn GameModule> + Send + Sync + 'static,
    {
        self.constructors
            .insert(module.into(), Arc::new(constructor));
        self
    }
}

impl ModuleFactory for BuiltinFactory {
    fn instantiate(&self, candidate: &ModuleCandidate) -> Result<PluginInstance> {
        let constructor = self
            .constructors
            .get(&candidate.name)
            .ok_or_else(|| Error::ModuleNotFound(candidate.name.clone()))?;
        let game = catch_unwind(AssertUnwindSafe(|| constructor())).map_err(|_| {
            Error::PluginError(format!(
                "constructor of built-in module '{}' panicked",
                candidate.name
            ))
        })?;
        Ok(PluginInstance::builtin(&candidate.name, game))
    }
}

impl fmt::Debug for BuiltinFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("BuiltinFactory")
            .field("modules", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::testing::EchoGame;
    use crate::validator::fixtures::write_module;
    use std::fs;
    use tempfile::TempDir;

    fn candidate(root: &Path, name: &str) -> ModuleCandidate {
        let dir = write_module(root, name);
        ModuleCandidate::inspect(&dir, "release").unwrap()
    }

    #[test]
    fn test_search_path_skips_missing_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let candidate = candidate(temp_dir.path(), "chess");
        let shared = vec![temp_dir.path().join("runtime/lib"), temp_dir.path().join("shared/lib")];

        let loader = LibraryLoaderFactory::new(shared.clone()).for_candidate(&candidate);
        assert_eq!(loader.search_path, shared);
        assert_eq!(loader.resolve(), None);
        assert!(matches!(loader.open(), Err(Error::LibraryError(_))));
    }

    #[test]
    fn test_module_output_dir_is_searched_first() {
        let temp_dir = TempDir::new().unwrap();
        let candidate = candidate(temp_dir.path(), "chess");
        let shared_dir = temp_dir.path().join("shared/lib");
        fs::create_dir_all(&shared_dir).unwrap();
        fs::create_dir_all(&candidate.output_dir).unwrap();
        fs::write(shared_dir.join(&candidate.library_file_name), b"").unwrap();

        let factory = LibraryLoaderFactory::new(vec![shared_dir.clone()]);
        let loader = factory.for_candidate(&candidate);
        assert_eq!(loader.search_path[0], candidate.output_dir);
        assert_eq!(loader.resolve(), Some(shared_dir.join(&candidate.library_file_name)));

        fs::write(candidate.artifact_path(), b"").unwrap();
        assert_eq!(loader.resolve(), Some(candidate.artifact_path()));
    }

    #[test]
    fn test_garbage_library_fails_to_load() {
        let temp_dir = TempDir::new().unwrap();
        let candidate = candidate(temp_dir.path(), "chess");
        fs::create_dir_all(&candidate.output_dir).unwrap();
        fs::write(candidate.artifact_path(), b"not a shared object").unwrap();

        let factory = DylibFactory::new(LibraryLoaderFactory::default(), LibraryRegistry::new());
        let err = factory.instantiate(&candidate).unwrap_err();
        assert!(matches!(err, Error::LibraryError(_)));
        assert!(!factory.registry().is_loaded("chess"));

        // The private copy does not outlive the failed attempt
        let load_dir = candidate.output_dir.join(LOAD_DIR);
        assert_eq!(fs::read_dir(load_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_each_open_uses_a_fresh_copy() {
        let temp_dir = TempDir::new().unwrap();
        let candidate = candidate(temp_dir.path(), "chess");
        fs::create_dir_all(&candidate.output_dir).unwrap();
        fs::write(candidate.artifact_path(), b"not a shared object").unwrap();

        let loader = LibraryLoaderFactory::default().for_candidate(&candidate);
        assert_eq!(loader.load_dir, candidate.output_dir.join(LOAD_DIR));
        assert!(loader.open().is_err());
        assert!(loader.open().is_err());

        // Artifact untouched, copies gone
        assert_eq!(fs::read(candidate.artifact_path()).unwrap(), b"not a shared object");
        assert_eq!(fs::read_dir(&loader.load_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_declaration_version_checks() {
        fn create() -> Box<dyn GameModule> {
            Box::new(EchoGame::new("echo"))
        }
        let path = Path::new("libecho.so");

        let good = ModuleDeclaration {
            api_version: MODULE_API_VERSION,
            api_crate_version: API_CRATE_VERSION,
            create,
        };
        assert!(check_declaration(&good, path).is_ok());

        let wrong_abi = ModuleDeclaration {
            api_version: MODULE_API_VERSION + 1,
            ..good
        };
        assert!(matches!(
            check_declaration(&wrong_abi, path),
            Err(Error::PluginError(_))
        ));

        let wrong_crate = ModuleDeclaration {
            api_crate_version: "0.0.0-other",
            api_version: MODULE_API_VERSION,
            create,
        };
        assert!(check_declaration(&wrong_crate, path).is_err());
    }

    #[test]
    fn test_builtin_factory() {
        let temp_dir = TempDir::new().unwrap();
        let chess = candidate(temp_dir.path(), "chess");
        let go = candidate(temp_dir.path(), "go");

        let factory =
            BuiltinFactory::new().with_module("chess", || Box::new(EchoGame::new("chess")));
        let instance = factory.instantiate(&chess).unwrap();
        assert_eq!(instance.module_name(), "chess");
        assert_eq!(instance.game().game_id(), "chess");
        assert!(instance.is_builtin());

        assert!(matches!(
            factory.instantiate(&go),
            Err(Error::ModuleNotFound(name)) if name == "go"
        ));
    }

    #[test]
    fn test_builtin_constructor_panic_is_caught() {
        let temp_dir = TempDir::new().unwrap();
        let chess = candidate(temp_dir.path(), "chess");
        let factory = BuiltinFactory::new().with_module("chess", || panic!("no board"));
        assert!(matches!(
            factory.instantiate(&chess),
            Err(Error::PluginError(_))
        ));
    }
}
