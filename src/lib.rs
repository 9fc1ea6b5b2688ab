//! # pict-core
//!
//! Typed pairwise (N-wise) test-input generation on top of the PICT engine.
//!
//! ## Core Components
//!
//! - **Model**: Parameters, typed values, aliases, weights, constraints and
//!   sub-models
//! - **Lookup**: The mapping between values and the tokens the engine sees
//! - **Writer**: Renders models into the engine's input language
//! - **Runner**: Invokes the engine and turns its output back into tuples
//! - **Cache**: Content-addressed, file-backed store of past executions
//!
//! ## Example
//!
//! ```rust,ignore
//! use pict_core::{CacheRegistry, Constraint, Model, Parameter, Runner, Settings, Value};
//!
//! let os = Parameter::with_values("OS", [Value::string("Win"), Value::string("Mac")])?;
//! let ram = Parameter::with_values("RAM", [Value::int32(4), Value::int32(8)])?;
//!
//! let mut model = Model::new();
//! model.add_constraint(Constraint::if_then(
//!     os.equal(Value::string("Mac"))?,
//!     ram.greater_than(Value::int32(4))?,
//! )?);
//! model.add_parameter(os)?;
//! model.add_parameter(ram)?;
//!
//! let registry = CacheRegistry::new();
//! let runner = Runner::new(Settings::default())?.with_cache(registry.open("pict-cache.db")?);
//! for tuple in runner.generate(&model)? {
//!     println!("{tuple}");
//! }
//! runner.close()?;
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod model;
mod proptest;
pub mod runner;
pub mod seed;
pub mod settings;
pub mod tuple;
pub mod writer;

// Re-exports for convenience
pub use cache::{CacheKey, CacheRegistry, CacheStore, ExecutionInformation};
pub use engine::{
    AsyncEngine, Engine, EngineLocator, EngineOutput, ProcessEngine, TokioProcessEngine,
};
pub use error::{Error, Result, ValidationError};
pub use lookup::LookupContext;
pub use model::{
    CompareOp, Constraint, EnumTag, Model, ObjectRef, Operand, ParamRef, Parameter, RawValue,
    Rule, SubModel, Value, ValueKind, ValueType,
};
pub use runner::{AsyncRunner, Execution, Generation, Runner};
pub use seed::SeedRows;
pub use settings::{Settings, WarningHandler, WarningPolicy};
pub use tuple::{Tuple, TupleField};
pub use writer::{render_model, ModelWriter};
