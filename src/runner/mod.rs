//! Model generation: render, run the engine, read the tuples back.
//!
//! A run goes through these steps:
//!
//! 1. Render the model and derive the cache key from flags, model text and
//!    seed rows.
//! 2. Serve the execution from the cache when the settings allow it.
//! 3. Otherwise write the model to a temp file and run the engine.
//! 4. Classify stderr: the used seed is recorded, warnings go through the
//!    warning policy, anything else fails the run.
//! 5. Store the execution in the cache and map the table onto tuples.
//!
//! Cache problems never fail a generation; they are logged and the run
//! proceeds uncached.

mod async_runner;
#[cfg(test)]
pub(crate) mod fake;

pub use async_runner::AsyncRunner;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::cache::{CacheKey, CacheStore, ExecutionInformation};
use crate::engine::{
    parse_diagnostics, parse_table, Engine, EngineLocator, EngineOutput, ProcessEngine,
    TempModelFile,
};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::settings::Settings;
use crate::tuple::Tuple;
use crate::writer::ModelWriter;

/// Tuples generated for a model, with the execution they came from.
#[derive(Debug, Clone)]
pub struct Generation {
    pub tuples: Vec<Tuple>,
    pub execution: ExecutionInformation,
    /// Whether the engine was skipped.
    pub from_cache: bool,
}

/// An engine execution on raw model text.
#[derive(Debug, Clone)]
pub struct Execution {
    pub info: ExecutionInformation,
    pub from_cache: bool,
}

/// Flags and cache key for one run.
pub(crate) struct Invocation {
    args: Vec<String>,
    flags: String,
    key: CacheKey,
}

impl Invocation {
    pub(crate) fn prepare(settings: &Settings, text: &str) -> Result<Self> {
        let args = settings.engine_args();
        let flags = args.join(" ");
        let seed_rows = match settings.seed_file {
            Some(ref path) => Some(
                std::fs::read(path)
                    .map_err(|e| Error::io(format!("reading seed file {}", path.display()), e))?,
            ),
            None => None,
        };
        let key = CacheKey::generate(&flags, text, seed_rows.as_deref());
        Ok(Self { args, flags, key })
    }

    pub(crate) fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn cached(
        &self,
        cache: Option<&CacheStore>,
        settings: &Settings,
    ) -> Option<ExecutionInformation> {
        if !settings.can_cache() {
            return None;
        }
        match cache?.get(&self.key) {
            Ok(Some(info)) => {
                tracing::debug!(key = %self.key, "cache hit");
                Some(info)
            }
            Ok(None) => {
                tracing::debug!(key = %self.key, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache lookup failed, running uncached");
                None
            }
        }
    }

    /// Turn raw engine output into an execution record.
    pub(crate) fn interpret(
        &self,
        settings: &Settings,
        model_file: &Path,
        output: EngineOutput,
    ) -> Result<ExecutionInformation> {
        let diagnostics = parse_diagnostics(&output.stderr);

        if diagnostics.has_errors() {
            return Err(Error::engine(diagnostics.errors.join("\n")));
        }
        if !output.success() {
            return Err(Error::engine(match output.status {
                Some(code) => format!("engine exited with status {code}"),
                None => "engine was terminated by a signal".to_string(),
            }));
        }
        for warning in &diagnostics.warnings {
            settings.report_warning(warning)?;
        }

        let random_seed = if settings.randomize {
            diagnostics.used_seed.or(settings.random_seed)
        } else {
            None
        };

        Ok(ExecutionInformation {
            source_file_name: model_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            generated_at: Utc::now(),
            options_used: self.flags.clone(),
            table: parse_table(&output.stdout),
            random_seed,
            seed_was_random: settings.randomize && settings.random_seed.is_none(),
            warnings: diagnostics.warnings,
        })
    }

    pub(crate) fn store(
        &self,
        cache: Option<&CacheStore>,
        settings: &Settings,
        info: &ExecutionInformation,
    ) {
        let Some(cache) = cache.filter(|_| settings.can_cache()) else {
            return;
        };
        if let Err(e) = cache.insert(&self.key, info.clone()) {
            tracing::warn!(error = %e, "failed to store execution in cache");
        }
    }
}

pub(crate) fn save_cache(cache: Option<&CacheStore>) -> Result<()> {
    match cache {
        Some(cache) => cache.save().map(|_| ()),
        None => Ok(()),
    }
}

/// Generates tuples through a blocking [`Engine`].
///
/// Call [`Runner::close`] when done to persist the cache; dropping an
/// unclosed runner saves too, logging any failure.
pub struct Runner<E: Engine = ProcessEngine> {
    engine: E,
    settings: Settings,
    cache: Option<Arc<CacheStore>>,
    closed: bool,
}

impl Runner<ProcessEngine> {
    /// Locate the engine from the environment.
    ///
    /// Fails with [`Error::EngineNotFound`] before any model is touched.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_locator(settings, &EngineLocator::from_env())
    }

    pub fn with_locator(settings: Settings, locator: &EngineLocator) -> Result<Self> {
        let binary = locator.locate()?;
        Ok(Self::with_engine(ProcessEngine::new(binary), settings))
    }
}

impl<E: Engine> Runner<E> {
    pub fn with_engine(engine: E, settings: Settings) -> Self {
        Self {
            engine,
            settings,
            cache: None,
            closed: false,
        }
    }

    /// Attach a cache store, typically from a [`crate::CacheRegistry`].
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> Option<&Arc<CacheStore>> {
        self.cache.as_ref()
    }

    /// Generate tuples for `model`.
    pub fn run(&self, model: &Model) -> Result<Generation> {
        let lookup = model.lookup_context(&self.settings)?;
        let text = ModelWriter::new(&lookup, &self.settings).write(model)?;
        let execution = self.run_text(&text)?;
        let tuples = lookup.tuples(&execution.info.table)?;
        Ok(Generation {
            tuples,
            execution: execution.info,
            from_cache: execution.from_cache,
        })
    }

    pub fn generate(&self, model: &Model) -> Result<Vec<Tuple>> {
        self.run(model).map(|g| g.tuples)
    }

    /// Run already-rendered model text, returning the raw table.
    pub fn run_text(&self, text: &str) -> Result<Execution> {
        let invocation = Invocation::prepare(&self.settings, text)?;
        let cache = self.cache.as_deref();

        if let Some(info) = invocation.cached(cache, &self.settings) {
            return Ok(Execution {
                info,
                from_cache: true,
            });
        }

        let file = TempModelFile::create(text)?;
        let output = self.engine.run(file.path(), invocation.args())?;
        let info = invocation.interpret(&self.settings, file.path(), output)?;
        drop(file);

        invocation.store(cache, &self.settings, &info);
        Ok(Execution {
            info,
            from_cache: false,
        })
    }

    /// Persist the cache and release the runner.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        save_cache(self.cache.as_deref())
    }
}

impl<E: Engine> Drop for Runner<E> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = save_cache(self.cache.as_deref()) {
            tracing::warn!(error = %e, "failed to save cache on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeEngine;
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::error::ValidationError;
    use crate::model::{Constraint, Parameter, Value};
    use crate::settings::WarningPolicy;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn two_by_two() -> Model {
        let mut model = Model::new();
        model
            .add_parameter(
                Parameter::with_values("A", [Value::string("x"), Value::string("y")]).unwrap(),
            )
            .unwrap();
        model
            .add_parameter(
                Parameter::with_values("B", [Value::string("1"), Value::string("2")]).unwrap(),
            )
            .unwrap();
        model
    }

    fn pairs(tuples: &[Tuple]) -> BTreeSet<(String, String)> {
        tuples
            .iter()
            .map(|t| {
                (
                    t.get_str("A").unwrap().to_string(),
                    t.get_str("B").unwrap().to_string(),
                )
            })
            .collect()
    }

    fn expected_pairs() -> BTreeSet<(String, String)> {
        [("x", "1"), ("x", "2"), ("y", "1"), ("y", "2")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_generate_resolves_every_tuple() {
        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default());
        let tuples = runner.generate(&two_by_two()).unwrap();

        assert_eq!(tuples.len(), 4);
        assert_eq!(pairs(&tuples), expected_pairs());
        assert_eq!(runner.engine().calls(), 1);
    }

    #[test]
    fn test_model_file_is_first_argument_and_removed() {
        let settings = Settings::default().with_order(3).with_case_sensitive(true);
        let runner = Runner::with_engine(FakeEngine::cartesian(), settings);
        runner.generate(&two_by_two()).unwrap();

        let (path, args) = runner.engine().last_call().unwrap();
        assert_eq!(args, vec!["/o:3".to_string(), "/c".to_string()]);
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("pict-model-"));
        assert!(!path.exists());
    }

    #[test]
    fn test_cache_hit_skips_engine() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CacheRegistry::new();
        let cache = registry.open(dir.path().join("cache.db")).unwrap();
        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default())
            .with_cache(Arc::clone(&cache));

        let first = runner.run(&two_by_two()).unwrap();
        let second = runner.run(&two_by_two()).unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(runner.engine().calls(), 1);
        assert_eq!(pairs(&first.tuples), pairs(&second.tuples));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_cache_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default())
            .with_cache(CacheRegistry::new().open(&path).unwrap());
        runner.generate(&two_by_two()).unwrap();
        runner.close().unwrap();

        // A fresh registry stands in for a new process.
        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default())
            .with_cache(CacheRegistry::new().open(&path).unwrap());
        let generation = runner.run(&two_by_two()).unwrap();
        assert!(generation.from_cache);
        assert_eq!(runner.engine().calls(), 0);
    }

    #[test]
    fn test_drop_saves_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default())
                .with_cache(CacheRegistry::new().open(&path).unwrap());
            runner.generate(&two_by_two()).unwrap();
        }
        assert_eq!(CacheStore::load(&path).len().unwrap(), 1);
    }

    #[test]
    fn test_changed_settings_miss_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheRegistry::new()
            .open(dir.path().join("cache.db"))
            .unwrap();

        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default())
            .with_cache(Arc::clone(&cache));
        runner.generate(&two_by_two()).unwrap();

        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default().exhaustive())
            .with_cache(Arc::clone(&cache));
        assert!(!runner.run(&two_by_two()).unwrap().from_cache);
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_unseeded_random_runs_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheRegistry::new()
            .open(dir.path().join("cache.db"))
            .unwrap();
        let settings = Settings::default().randomized();
        assert!(!settings.can_cache());

        let runner =
            Runner::with_engine(FakeEngine::cartesian(), settings).with_cache(Arc::clone(&cache));
        let first = runner.run(&two_by_two()).unwrap();
        let second = runner.run(&two_by_two()).unwrap();

        assert!(!first.from_cache && !second.from_cache);
        assert_eq!(runner.engine().calls(), 2);
        assert!(cache.is_empty().unwrap());
        assert!(first.execution.seed_was_random);
        assert_eq!(first.execution.random_seed, Some(FakeEngine::RANDOM_SEED));
    }

    #[test]
    fn test_seeded_run_records_seed() {
        let runner = Runner::with_engine(
            FakeEngine::cartesian(),
            Settings::default().with_random_seed(42),
        );
        let generation = runner.run(&two_by_two()).unwrap();
        assert_eq!(generation.execution.random_seed, Some(42));
        assert!(!generation.execution.seed_was_random);
        assert_eq!(generation.execution.options_used, "/r:42");
    }

    #[test]
    fn test_warnings_reach_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let settings = Settings::default()
            .with_warning_handler(move |msg| sink.lock().unwrap().push(msg.to_string()));
        let engine = FakeEngine::cartesian().with_stderr("Warning: value 'x' is unused\n  in A\n");

        let runner = Runner::with_engine(engine, settings);
        let generation = runner.run(&two_by_two()).unwrap();

        assert_eq!(generation.tuples.len(), 4);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Warning: value 'x' is unused\nin A".to_string()]
        );
        assert_eq!(generation.execution.warnings.len(), 1);
    }

    #[test]
    fn test_throw_policy_fails_generation() {
        let settings = Settings::default().with_warning_policy(WarningPolicy::THROW);
        let engine = FakeEngine::cartesian().with_stderr("Warning: restrictive constraints\n");
        let err = Runner::with_engine(engine, settings)
            .generate(&two_by_two())
            .unwrap_err();
        assert!(matches!(err, Error::EngineWarning { .. }));
    }

    #[test]
    fn test_unexpected_stderr_is_engine_error() {
        let engine = FakeEngine::cartesian().with_stderr("Input Error: bad model\n");
        let err = Runner::with_engine(engine, Settings::default())
            .generate(&two_by_two())
            .unwrap_err();
        match err {
            Error::Engine { message } => assert_eq!(message, "Input Error: bad model"),
            other => panic!("expected Engine error, got {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_exit_is_engine_error() {
        let engine = FakeEngine::cartesian().with_status(Some(3));
        let err = Runner::with_engine(engine, Settings::default())
            .generate(&two_by_two())
            .unwrap_err();
        assert!(matches!(err, Error::Engine { ref message } if message.contains("status 3")));
    }

    #[test]
    fn test_failed_runs_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheRegistry::new()
            .open(dir.path().join("cache.db"))
            .unwrap();
        let engine = FakeEngine::cartesian().with_stderr("Input Error: bad model\n");
        let runner = Runner::with_engine(engine, Settings::default()).with_cache(Arc::clone(&cache));

        assert!(runner.generate(&two_by_two()).is_err());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_undeclared_output_token_is_integrity_error() {
        let engine = FakeEngine::fixed("A\tB\nz\t1\n");
        let err = Runner::with_engine(engine, Settings::default())
            .generate(&two_by_two())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ResultIntegrity { ref parameter, ref token, .. } if parameter == "A" && token == "z"
        ));
    }

    #[test]
    fn test_missing_output_column_is_integrity_error() {
        let engine = FakeEngine::fixed("A\nx\ny\n");
        let err = Runner::with_engine(engine, Settings::default())
            .generate(&two_by_two())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ResultIntegrity { ref parameter, .. } if parameter == "B"
        ));
    }

    #[test]
    fn test_validation_errors_skip_engine() {
        let ghost = Parameter::with_values("Ghost", [Value::int32(1)]).unwrap();
        let mut model = two_by_two();
        model.add_constraint(ghost.equal(Value::int32(1)).unwrap());

        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default());
        let err = runner.generate(&model).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownParameter(_))
        ));
        assert_eq!(runner.engine().calls(), 0);
    }

    #[test]
    fn test_seed_file_contents_change_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = dir.path().join("seeds.txt");
        std::fs::write(&seeds, "A\nx\n").unwrap();
        let cache = CacheRegistry::new()
            .open(dir.path().join("cache.db"))
            .unwrap();
        let settings = Settings::default().with_seed_file(&seeds);

        let runner =
            Runner::with_engine(FakeEngine::cartesian(), settings).with_cache(Arc::clone(&cache));
        runner.generate(&two_by_two()).unwrap();
        std::fs::write(&seeds, "A\ny\n").unwrap();
        assert!(!runner.run(&two_by_two()).unwrap().from_cache);
        assert_eq!(runner.engine().calls(), 2);
    }

    #[test]
    fn test_missing_seed_file_is_io_error() {
        let settings = Settings::default().with_seed_file("/nonexistent/seeds.txt");
        let err = Runner::with_engine(FakeEngine::cartesian(), settings)
            .generate(&two_by_two())
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_unwritable_cache_does_not_fail_generation() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cache = Arc::new(CacheStore::load(blocker.join("cache.db")));

        let runner = Runner::with_engine(FakeEngine::cartesian(), Settings::default())
            .with_cache(cache);
        assert_eq!(runner.generate(&two_by_two()).unwrap().len(), 4);
        assert!(runner.close().is_err());
    }

    #[test]
    fn test_missing_engine_fails_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let locator = EngineLocator::default()
            .with_search_dir(dir.path())
            .without_path_lookup();
        let err = Runner::with_locator(Settings::default(), &locator).err().unwrap();
        assert!(matches!(err, Error::EngineNotFound { .. }));
    }

    mod real_engine {
        //! Scenarios against the real engine.

        use super::*;

        fn runner() -> Runner {
            Runner::new(Settings::default().with_cache_enabled(false)).unwrap()
        }

        #[test]
        #[ignore = "requires the pict engine on PATH"]
        fn test_pairs_of_two_parameters() {
            let tuples = runner().generate(&two_by_two()).unwrap();
            assert_eq!(tuples.len(), 4);
            assert_eq!(pairs(&tuples), expected_pairs());
        }

        #[test]
        #[ignore = "requires the pict engine on PATH"]
        fn test_not_equal_constraint_excludes_value() {
            let a = Parameter::with_values("A", [Value::int32(1), Value::int32(2), Value::int32(3)])
                .unwrap();
            let b = Parameter::with_values("B", [Value::string("p"), Value::string("q")]).unwrap();
            let mut model = Model::new();
            model.add_constraint(a.not_equal(Value::int32(2)).unwrap());
            model.add_parameter(a).unwrap();
            model.add_parameter(b).unwrap();

            let tuples = runner().generate(&model).unwrap();
            assert!(!tuples.is_empty());
            assert!(tuples.iter().all(|t| t.get_i64("A") != Some(2)));
        }

        #[test]
        #[ignore = "requires the pict engine on PATH"]
        fn test_if_then_rule_holds() {
            let a = Parameter::with_values("A", [Value::int32(1), Value::int32(2)]).unwrap();
            let b = Parameter::with_values("B", [Value::string("yes"), Value::string("no")])
                .unwrap();
            let mut model = Model::new();
            model.add_constraint(Constraint::if_then(
                a.equal(Value::int32(1)).unwrap(),
                b.equal(Value::string("yes")).unwrap(),
            )
            .unwrap());
            model.add_parameter(a).unwrap();
            model.add_parameter(b).unwrap();

            let tuples = runner().generate(&model).unwrap();
            for tuple in tuples.iter().filter(|t| t.get_i64("A") == Some(1)) {
                assert_eq!(tuple.get_str("B"), Some("yes"));
            }
        }

        #[test]
        #[ignore = "requires the pict engine on PATH"]
        fn test_unseeded_random_generation() {
            let runner = Runner::new(Settings::default().randomized()).unwrap();
            let generation = runner.run(&two_by_two()).unwrap();
            assert!(generation.execution.random_seed.is_some());
            assert!(!generation.from_cache);
        }
    }
}
