//! Generation settings.
//!
//! [`Settings`] carries everything that changes what the engine produces
//! (order, delimiters, randomization) plus how this crate treats the run
//! (caching, warning handling). The engine flag string derived from it is
//! part of every cache key.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Default covering order.
pub const DEFAULT_ORDER: usize = 2;
pub const DEFAULT_VALUE_DELIMITER: char = ',';
pub const DEFAULT_ALIAS_DELIMITER: char = '|';
pub const DEFAULT_NEGATIVE_PREFIX: char = '~';

bitflags! {
    /// What to do with warnings the engine prints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WarningPolicy: u8 {
        /// Invoke the registered warning handler.
        const RAISE = 0b0001;
        /// Write the warning to the diagnostic log.
        const LOG = 0b0010;
        /// Fail the generation with [`Error::EngineWarning`].
        const THROW = 0b0100;
    }
}

impl WarningPolicy {
    /// Drop warnings silently.
    pub const IGNORE: Self = Self::empty();
}

impl Default for WarningPolicy {
    fn default() -> Self {
        Self::RAISE | Self::LOG
    }
}

/// Callback invoked for engine warnings under [`WarningPolicy::RAISE`].
pub type WarningHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for one generation.
#[derive(Clone)]
pub struct Settings {
    /// Covering order; 0 means exhaustive.
    pub order: usize,
    /// Separator between declared values.
    pub value_delimiter: char,
    /// Separator between a value and its aliases.
    pub alias_delimiter: char,
    /// Prefix marking negative values.
    pub negative_prefix: char,
    pub case_sensitive: bool,
    pub randomize: bool,
    /// Seed for randomized generation; `None` lets the engine pick one.
    pub random_seed: Option<i64>,
    pub cache_enabled: bool,
    pub warning_policy: WarningPolicy,
    /// Seeding file passed to the engine.
    pub seed_file: Option<PathBuf>,
    warning_handler: Option<WarningHandler>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            value_delimiter: DEFAULT_VALUE_DELIMITER,
            alias_delimiter: DEFAULT_ALIAS_DELIMITER,
            negative_prefix: DEFAULT_NEGATIVE_PREFIX,
            case_sensitive: false,
            randomize: false,
            random_seed: None,
            cache_enabled: true,
            warning_policy: WarningPolicy::default(),
            seed_file: None,
            warning_handler: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("order", &self.order)
            .field("value_delimiter", &self.value_delimiter)
            .field("alias_delimiter", &self.alias_delimiter)
            .field("negative_prefix", &self.negative_prefix)
            .field("case_sensitive", &self.case_sensitive)
            .field("randomize", &self.randomize)
            .field("random_seed", &self.random_seed)
            .field("cache_enabled", &self.cache_enabled)
            .field("warning_policy", &self.warning_policy)
            .field("seed_file", &self.seed_file)
            .field("warning_handler", &self.warning_handler.is_some())
            .finish()
    }
}

impl Settings {
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Cover every combination of every parameter.
    pub fn exhaustive(self) -> Self {
        self.with_order(0)
    }

    pub fn with_value_delimiter(mut self, delimiter: char) -> Self {
        self.value_delimiter = delimiter;
        self
    }

    pub fn with_alias_delimiter(mut self, delimiter: char) -> Self {
        self.alias_delimiter = delimiter;
        self
    }

    pub fn with_negative_prefix(mut self, prefix: char) -> Self {
        self.negative_prefix = prefix;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Randomize with an engine-chosen seed. Results will not be cached.
    pub fn randomized(mut self) -> Self {
        self.randomize = true;
        self.random_seed = None;
        self
    }

    /// Randomize with a fixed seed.
    pub fn with_random_seed(mut self, seed: i64) -> Self {
        self.randomize = true;
        self.random_seed = Some(seed);
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.warning_policy = policy;
        self
    }

    pub fn with_seed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_file = Some(path.into());
        self
    }

    pub fn with_warning_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.warning_handler = Some(Arc::new(handler));
        self
    }

    /// Whether results may be served from and stored in the cache.
    ///
    /// Unseeded randomized runs are not reproducible, so they never are.
    pub fn can_cache(&self) -> bool {
        self.cache_enabled && (!self.randomize || self.random_seed.is_some())
    }

    /// Engine command-line flags, excluding the model file argument.
    pub fn engine_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match self.order {
            0 => args.push("/o:max".to_string()),
            DEFAULT_ORDER => {}
            order => args.push(format!("/o:{order}")),
        }
        if self.value_delimiter != DEFAULT_VALUE_DELIMITER {
            args.push(format!("/d:{}", self.value_delimiter));
        }
        if self.alias_delimiter != DEFAULT_ALIAS_DELIMITER {
            args.push(format!("/a:{}", self.alias_delimiter));
        }
        if self.negative_prefix != DEFAULT_NEGATIVE_PREFIX {
            args.push(format!("/n:{}", self.negative_prefix));
        }
        if self.case_sensitive {
            args.push("/c".to_string());
        }
        if self.randomize {
            match self.random_seed {
                Some(seed) => args.push(format!("/r:{seed}")),
                None => args.push("/r".to_string()),
            }
        }
        if let Some(ref path) = self.seed_file {
            args.push(format!("/e:{}", path.display()));
        }
        args
    }

    /// The flags joined by spaces; this is the settings half of a cache key.
    pub fn flag_string(&self) -> String {
        self.engine_args().join(" ")
    }

    /// Route one engine warning through the warning policy.
    pub fn report_warning(&self, message: &str) -> Result<()> {
        let policy = self.warning_policy;
        if policy.contains(WarningPolicy::LOG) {
            tracing::warn!(target: "pict_core::engine", "{}", message);
        }
        if policy.contains(WarningPolicy::RAISE) {
            if let Some(ref handler) = self.warning_handler {
                handler(message);
            }
        }
        if policy.contains(WarningPolicy::THROW) {
            return Err(Error::EngineWarning {
                message: message.to_string(),
            });
        }
        Ok(())
    }
}
