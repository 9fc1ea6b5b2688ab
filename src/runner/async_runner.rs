//! Async generation.

use std::sync::Arc;

use super::{save_cache, Execution, Generation, Invocation};
use crate::cache::CacheStore;
use crate::engine::{AsyncEngine, EngineLocator, TempModelFile, TokioProcessEngine};
use crate::error::Result;
use crate::model::Model;
use crate::settings::Settings;
use crate::tuple::Tuple;
use crate::writer::ModelWriter;

/// [`super::Runner`] over an [`AsyncEngine`].
///
/// Shares the cache and output handling with the blocking runner; use it
/// with [`TokioProcessEngine::with_timeout`] to bound a hung engine.
pub struct AsyncRunner<E: AsyncEngine = TokioProcessEngine> {
    engine: E,
    settings: Settings,
    cache: Option<Arc<CacheStore>>,
    closed: bool,
}

impl AsyncRunner<TokioProcessEngine> {
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_locator(settings, &EngineLocator::from_env())
    }

    pub fn with_locator(settings: Settings, locator: &EngineLocator) -> Result<Self> {
        let binary = locator.locate()?;
        Ok(Self::with_engine(TokioProcessEngine::new(binary), settings))
    }
}

impl<E: AsyncEngine> AsyncRunner<E> {
    pub fn with_engine(engine: E, settings: Settings) -> Self {
        Self {
            engine,
            settings,
            cache: None,
            closed: false,
        }
    }

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

    pub async fn run(&self, model: &Model) -> Result<Generation> {
        let lookup = model.lookup_context(&self.settings)?;
        let text = ModelWriter::new(&lookup, &self.settings).write(model)?;
        let execution = self.run_text(&text).await?;
        let tuples = lookup.tuples(&execution.info.table)?;
        Ok(Generation {
            tuples,
            execution: execution.info,
            from_cache: execution.from_cache,
        })
    }

    pub async fn generate(&self, model: &Model) -> Result<Vec<Tuple>> {
        self.run(model).await.map(|g| g.tuples)
    }

    pub async fn run_text(&self, text: &str) -> Result<Execution> {
        let invocation = Invocation::prepare(&self.settings, text)?;

        if let Some(info) = invocation.cached(self.cache.as_deref(), &self.settings) {
            return Ok(Execution {
                info,
                from_cache: true,
            });
        }

        let file = TempModelFile::create(text)?;
        let output = self.engine.run(file.path(), invocation.args()).await?;
        let info = invocation.interpret(&self.settings, file.path(), output)?;
        drop(file);

        invocation.store(self.cache.as_deref(), &self.settings, &info);
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

impl<E: AsyncEngine> Drop for AsyncRunner<E> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = save_cache(self.cache.as_deref()) {
            tracing::warn!(error = %e, "failed to save cache on drop");
        }
    }
}
