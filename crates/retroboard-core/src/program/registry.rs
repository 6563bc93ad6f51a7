//! Name → factory mapping for visual programs.
//!
//! The registry is built once at startup and then shared read-only (behind an
//! `Arc`) by the manager and the control transport.  There is no global
//! registry: whoever wires the process decides which programs exist.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use super::{Program, ProgramContext};

/// Builds a program instance bound to a display and a configuration.
pub type ProgramFactory = Box<dyn Fn(ProgramContext) -> Box<dyn Program> + Send + Sync>;

/// Registered programs, keyed by their unique name.
#[derive(Default)]
pub struct ProgramRegistry {
    factories: BTreeMap<String, ProgramFactory>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`.  A second registration with the same
    /// name replaces the first.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(ProgramContext) -> Box<dyn Program> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            warn!(program = %name, "program registered twice; keeping the latest factory");
        } else {
            info!(program = %name, "registered program");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Constructs a new instance of `name`, or `None` if it is not registered.
    pub fn build(&self, name: &str, context: ProgramContext) -> Option<Box<dyn Program>> {
        self.factories.get(name).map(|factory| factory(context))
    }
}

impl fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("programs", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplaySurface;
    use crate::program::{ProgramConfig, RuntimeError, SetupError, StopHandle};
    use serde_json::Value;

    struct Blank {
        config: ProgramConfig,
    }

    impl Program for Blank {
        fn setup(&mut self, _surface: &mut dyn DisplaySurface) -> Result<(), SetupError> {
            Ok(())
        }
        fn advance(&mut self, _surface: &mut dyn DisplaySurface) -> Result<(), RuntimeError> {
            Ok(())
        }
        fn config(&self) -> ProgramConfig {
            self.config.clone()
        }
        fn update_config(&mut self, key: &str, value: Value) {
            self.config.insert(key.to_string(), value);
        }
    }

    fn context() -> ProgramContext {
        let (_handle, stop) = StopHandle::pair();
        let mut config = ProgramConfig::new();
        config.insert("marker".to_string(), Value::from(7));
        ProgramContext {
            width: 8,
            height: 4,
            config,
            stop,
        }
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = ProgramRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_register_and_build() {
        // Arrange
        let mut registry = ProgramRegistry::new();
        registry.register("blank", |ctx| Box::new(Blank { config: ctx.config }));

        // Act
        let program = registry.build("blank", context()).expect("registered");

        // Assert
        assert!(registry.contains("blank"));
        assert_eq!(program.config()["marker"], Value::from(7));
    }

    #[test]
    fn test_build_unknown_returns_none() {
        let registry = ProgramRegistry::new();
        assert!(registry.build("missing", context()).is_none());
    }

    #[test]
    fn test_names_are_sorted_and_unique() {
        let mut registry = ProgramRegistry::new();
        registry
            .register("stars", |ctx| Box::new(Blank { config: ctx.config }))
            .register("clock", |ctx| Box::new(Blank { config: ctx.config }))
            .register("stars", |ctx| Box::new(Blank { config: ctx.config }));
        assert_eq!(registry.names(), vec!["clock".to_string(), "stars".to_string()]);
        assert_eq!(registry.len(), 2);
    }
}
