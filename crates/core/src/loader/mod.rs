//! Module discovery: validate, build and instantiate every candidate under
//! the modules directory

pub mod candidate;
pub mod failures;
pub mod library;

#[cfg(test)]
pub(crate) mod testing;

pub use candidate::{BUILD_MARKER, ModuleCandidate, SourceFile, library_file_name};
pub use failures::{BuildFailure, FailureTracker};
pub use library::{
    BuiltinFactory, DylibFactory, LOAD_DIR, LibraryLoaderFactory, LibraryRegistry,
    ModuleFactory, ModuleLibrary, ModuleLibraryLoader, PluginInstance,
};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    build::{CommandBuilder, ModuleBuilder},
    config::LauncherConfig,
    error::{Error, Result},
    validator::{StructuralValidator, ValidationFailure},
};

/// Where a candidate ended up on one discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    StructurallyInvalid(ValidationFailure),
    /// Failed to build recently; not retried until the cooldown ends
    CoolingDown { remaining: Duration },
    BuildFailed { exit_code: Option<i32> },
    /// Instantiated; `built` tells whether this pass compiled it
    Loaded { built: bool },
    InstantiationFailed(String),
    TimedOut,
    Cancelled,
}

impl CandidateOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, CandidateOutcome::Loaded { .. })
    }
}

impl fmt::Display for CandidateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOutcome::StructurallyInvalid(failure) => write!(f, "invalid: {failure}"),
            CandidateOutcome::CoolingDown { remaining } => {
                write!(f, "build failed recently, retry in {}s", remaining.as_secs())
            }
            CandidateOutcome::BuildFailed { exit_code } => match exit_code {
                Some(code) => write!(f, "build failed (exit code {code})"),
                None => write!(f, "build failed"),
            },
            CandidateOutcome::Loaded { built: true } => write!(f, "built and loaded"),
            CandidateOutcome::Loaded { built: false } => write!(f, "loaded"),
            CandidateOutcome::InstantiationFailed(reason) => write!(f, "load failed: {reason}"),
            CandidateOutcome::TimedOut => write!(f, "timed out"),
            CandidateOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
    pub name: String,
    pub dir: PathBuf,
    pub outcome: CandidateOutcome,
}

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Instances in candidate order
    pub instances: Vec<PluginInstance>,
    pub outcomes: Vec<ModuleOutcome>,
    pub cancelled: bool,
}

impl DiscoveryReport {
    pub fn outcome(&self, name: &str) -> Option<&CandidateOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.outcome)
    }

    pub fn loaded_names(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.module_name()).collect()
    }
}

/// Discovery knobs taken from [`LauncherConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    pub profile: String,
    pub skip_dirs: Vec<String>,
    pub batch_timeout: Duration,
    pub module_timeout: Duration,
}

impl LoaderSettings {
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            profile: config.build.profile.clone(),
            skip_dirs: config.skip_dirs.clone(),
            batch_timeout: config.batch_timeout(),
            module_timeout: config.module_timeout(),
        }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self::from_config(&LauncherConfig::default())
    }
}

/// Why the pipeline stopped before producing an instance
enum Rejection {
    Invalid(ValidationFailure),
    CoolingDown(Duration),
    BuildFailed(Option<i32>),
    Instantiation(Error),
    TimedOut,
    Cancelled,
}

impl Rejection {
    fn into_outcome(self) -> CandidateOutcome {
        match self {
            Rejection::Invalid(failure) => CandidateOutcome::StructurallyInvalid(failure),
            Rejection::CoolingDown(remaining) => CandidateOutcome::CoolingDown { remaining },
            Rejection::BuildFailed(exit_code) => CandidateOutcome::BuildFailed { exit_code },
            Rejection::Instantiation(err) => CandidateOutcome::InstantiationFailed(err.to_string()),
            Rejection::TimedOut => CandidateOutcome::TimedOut,
            Rejection::Cancelled => CandidateOutcome::Cancelled,
        }
    }

    fn into_error(self, candidate: &ModuleCandidate) -> Error {
        match self {
            Rejection::Invalid(failure) => Error::ValidationError {
                dir: candidate.dir.clone(),
                failure,
            },
            Rejection::CoolingDown(_) => Error::BuildError {
                module: candidate.name.clone(),
                code: None,
            },
            Rejection::BuildFailed(code) => Error::BuildError {
                module: candidate.name.clone(),
                code,
            },
            Rejection::Instantiation(err) => err,
            Rejection::TimedOut => Error::Timeout(candidate.name.clone()),
            Rejection::Cancelled => {
                Error::Other(format!("loading '{}' was cancelled", candidate.name))
            }
        }
    }
}

type WorkerResult = std::result::Result<(PluginInstance, bool), Rejection>;

/// Turns module directories into plugin instances.
///
/// Clones share the builder, the factory and the failure tracker.
#[derive(Clone)]
pub struct ModuleLoader {
    settings: LoaderSettings,
    builder: Arc<dyn ModuleBuilder>,
    factory: Arc<dyn ModuleFactory>,
    failures: FailureTracker,
}

impl ModuleLoader {
    pub fn new(
        settings: LoaderSettings,
        builder: Arc<dyn ModuleBuilder>,
        factory: Arc<dyn ModuleFactory>,
        failures: FailureTracker,
    ) -> Self {
        Self {
            settings,
            builder,
            factory,
            failures,
        }
    }

    /// The real pipeline: the configured build command and `cdylib` loading
    pub fn from_config(config: &LauncherConfig) -> Self {
        let loaders = LibraryLoaderFactory::new(config.shared_library_dirs());
        Self::new(
            LoaderSettings::from_config(config),
            Arc::new(CommandBuilder::from_config(&config.build)),
            Arc::new(DylibFactory::new(loaders, LibraryRegistry::new())),
            FailureTracker::new(config.failure_cooldown()),
        )
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    pub fn builder(&self) -> &dyn ModuleBuilder {
        self.builder.as_ref()
    }

    /// Immediate subdirectories of `root` that may hold modules, sorted by name
    pub fn candidates(&self, root: &Path) -> Vec<ModuleCandidate> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read modules directory {:?}: {}", root, e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| !self.is_skipped(name))
            })
            .collect();
        dirs.sort();

        dirs.iter()
            .filter_map(|dir| ModuleCandidate::inspect(dir, &self.settings.profile))
            .collect()
    }

    fn is_skipped(&self, name: &str) -> bool {
        name.starts_with('.') || self.settings.skip_dirs.iter().any(|skip| skip == name)
    }

    pub fn needs_compilation(&self, candidate: &ModuleCandidate) -> bool {
        candidate.needs_compilation()
    }

    /// Discover and instantiate every loadable module under `root`
    pub fn discover(&self, root: &Path) -> Vec<PluginInstance> {
        self.discover_with_report(root, &CancellationToken::new())
            .instances
    }

    pub fn discover_with_report(&self, root: &Path, cancel: &CancellationToken) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        if !root.is_dir() {
            tracing::warn!("Modules directory {:?} does not exist", root);
            return report;
        }

        let candidates = self.candidates(root);
        tracing::info!("Discovering {} module candidate(s) in {:?}", candidates.len(), root);

        let batch_deadline = Instant::now() + self.settings.batch_timeout;
        let mut pending = candidates.into_iter();

        while let Some(candidate) = pending.next() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.push(&candidate, CandidateOutcome::Cancelled);
                for rest in pending.by_ref() {
                    report.push(&rest, CandidateOutcome::Cancelled);
                }
                tracing::info!("Discovery in {:?} cancelled", root);
                break;
            }

            let now = Instant::now();
            if now >= batch_deadline {
                let abandoned: Vec<ModuleCandidate> =
                    std::iter::once(candidate).chain(pending.by_ref()).collect();
                tracing::warn!(
                    "Discovery exceeded {:?}; abandoning {} remaining module(s)",
                    self.settings.batch_timeout,
                    abandoned.len()
                );
                for rest in &abandoned {
                    report.push(rest, CandidateOutcome::TimedOut);
                }
                break;
            }

            let wait = self
                .settings
                .module_timeout
                .min(batch_deadline.saturating_duration_since(now));
            let outcome = match self.run_with_deadline(&candidate, cancel, wait) {
                Ok((instance, built)) => {
                    report.instances.push(instance);
                    CandidateOutcome::Loaded { built }
                }
                Err(rejection) => rejection.into_outcome(),
            };
            if outcome == CandidateOutcome::Cancelled {
                report.cancelled = true;
            }
            report.push(&candidate, outcome);
        }

        tracing::info!(
            "Discovery finished: {} of {} module(s) loaded",
            report.instances.len(),
            report.outcomes.len()
        );
        report
    }

    /// Run the whole pipeline for one directory, ignoring the cooldown
    pub fn load_one(&self, dir: &Path) -> Result<PluginInstance> {
        let candidate = ModuleCandidate::inspect(dir, &self.settings.profile)
            .ok_or_else(|| Error::ModuleNotFound(dir.display().to_string()))?;
        self.run_pipeline(candidate.clone(), &CancellationToken::new(), false)
            .map(|(instance, _)| instance)
            .map_err(|rejection| rejection.into_error(&candidate))
    }

    /// The worker is abandoned, not interrupted, when `wait` runs out; a
    /// late result is dropped with the channel.
    fn run_with_deadline(
        &self,
        candidate: &ModuleCandidate,
        cancel: &CancellationToken,
        wait: Duration,
    ) -> WorkerResult {
        let (tx, rx) = mpsc::channel();
        let loader = self.clone();
        let worker_candidate = candidate.clone();
        let worker_cancel = cancel.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("gdk-load-{}", candidate.name))
            .spawn(move || {
                let result = loader.run_pipeline(worker_candidate, &worker_cancel, true);
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            tracing::warn!("Cannot start worker for module '{}': {}", candidate.name, e);
            return Err(Rejection::Instantiation(Error::IoError(e)));
        }

        match rx.recv_timeout(wait) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Module '{}' did not finish within {:?}; abandoning it",
                    candidate.name,
                    wait
                );
                Err(Rejection::TimedOut)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::warn!("Worker for module '{}' panicked", candidate.name);
                Err(Rejection::Instantiation(Error::PluginError(format!(
                    "worker for '{}' panicked",
                    candidate.name
                ))))
            }
        }
    }

    fn run_pipeline(
        &self,
        mut candidate: ModuleCandidate,
        cancel: &CancellationToken,
        respect_cooldown: bool,
    ) -> WorkerResult {
        let name = candidate.name.clone();

        let mut validator = StructuralValidator::new().map_err(Rejection::Instantiation)?;
        validator
            .validate(&candidate.dir)
            .map_err(Rejection::Invalid)?;

        if respect_cooldown {
            if let Some(remaining) = self.failures.remaining_cooldown(&name) {
                tracing::info!(
                    "Skipping module '{}': build failed recently (retry in {}s)",
                    name,
                    remaining.as_secs()
                );
                return Err(Rejection::CoolingDown(remaining));
            }
        }

        let mut built = false;
        if self.needs_compilation(&candidate) {
            tracing::debug!("Module '{}' needs compilation", name);
            if cancel.is_cancelled() {
                return Err(Rejection::Cancelled);
            }
            self.build(&mut candidate)?;
            built = true;
        } else {
            tracing::debug!("Module '{}' is up to date", name);
        }

        if cancel.is_cancelled() {
            return Err(Rejection::Cancelled);
        }

        match self.factory.instantiate(&candidate) {
            Ok(instance) => Ok((instance, built)),
            Err(e) => {
                tracing::warn!("Failed to instantiate module '{}': {}", name, e);
                Err(Rejection::Instantiation(e))
            }
        }
    }

    fn build(&self, candidate: &mut ModuleCandidate) -> std::result::Result<(), Rejection> {
        let (exit_code, summary) = match self.builder.build(candidate) {
            Ok(output) if output.success => {
                self.failures.clear(&candidate.name);
                if let Err(e) = candidate.write_build_marker() {
                    tracing::warn!(
                        "Cannot write build marker for '{}': {}",
                        candidate.name,
                        e
                    );
                }
                return Ok(());
            }
            Ok(output) => (
                output.exit_code,
                output
                    .failure_lines()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!("Cannot run build for module '{}': {}", candidate.name, e);
                (None, vec![e.to_string()])
            }
        };

        self.failures.record(BuildFailure {
            module: candidate.name.clone(),
            exit_code,
            summary,
            failed_at: Instant::now(),
        });
        Err(Rejection::BuildFailed(exit_code))
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("settings", &self.settings)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl DiscoveryReport {
    fn push(&mut self, candidate: &ModuleCandidate, outcome: CandidateOutcome) {
        self.outcomes.push(ModuleOutcome {
            name: candidate.name.clone(),
            dir: candidate.dir.clone(),
            outcome,
        });
    }
}
