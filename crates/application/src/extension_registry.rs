//! Named extension points with handlers validated at registration.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use casewell_core::{AppError, AppResult};
use serde_json::{Map, Value};
use tracing::warn;

/// Arguments passed to extension handlers.
pub type ExtensionArgs = Map<String, Value>;

/// Extension handler callback.
pub type ExtensionHandler = Arc<dyn Fn(&ExtensionArgs) -> AppResult<Option<Value>> + Send + Sync>;

/// Argument carrying the domain a contribution is requested for.
pub const DOMAIN_ARG: &str = "domain";

/// Declared extension point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPoint {
    name: String,
    providing_args: BTreeSet<String>,
}

impl ExtensionPoint {
    /// Returns the point name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the arguments every call provides.
    #[must_use]
    pub fn providing_args(&self) -> &BTreeSet<String> {
        &self.providing_args
    }
}

/// Handler registration for one extension point.
#[derive(Clone)]
pub struct Extension {
    point: String,
    consumed_args: BTreeSet<String>,
    accepts_any_args: bool,
    domains: Option<BTreeSet<String>>,
    handler: ExtensionHandler,
}

impl Extension {
    /// Creates a handler consuming exactly the listed arguments.
    #[must_use]
    pub fn new<I, S, F>(point: impl Into<String>, consumed_args: I, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&ExtensionArgs) -> AppResult<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            point: point.into(),
            consumed_args: consumed_args.into_iter().map(Into::into).collect(),
            accepts_any_args: false,
            domains: None,
            handler: Arc::new(handler),
        }
    }

    /// Lets the handler receive every provided argument.
    #[must_use]
    pub fn accepting_any_args(mut self) -> Self {
        self.accepts_any_args = true;
        self
    }

    /// Limits the handler to the listed domains.
    #[must_use]
    pub fn for_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    fn should_call(&self, args: &ExtensionArgs) -> bool {
        let Some(domains) = &self.domains else {
            return true;
        };

        args.get(DOMAIN_ARG)
            .and_then(Value::as_str)
            .is_some_and(|domain| domains.contains(domain))
    }

    fn handler_args(&self, args: &ExtensionArgs) -> ExtensionArgs {
        if self.accepts_any_args {
            return args.clone();
        }

        args.iter()
            .filter(|(name, _)| self.consumed_args.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Registry mapping extension points to ordered handlers.
///
/// Points and handlers are registered during startup; after [`lock`] the
/// registry only dispatches.
///
/// [`lock`]: ExtensionRegistry::lock
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    points: BTreeMap<String, ExtensionPoint>,
    extensions: BTreeMap<String, Vec<Extension>>,
    locked: bool,
}

impl ExtensionRegistry {
    /// Creates an empty, unlocked registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an extension point.
    pub fn define_point<I, S>(&mut self, name: impl Into<String>, providing_args: I) -> AppResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        self.ensure_unlocked(name.as_str())?;
        if self.points.contains_key(&name) {
            return Err(AppError::Conflict(format!(
                "extension point '{name}' is already defined"
            )));
        }

        self.points.insert(
            name.clone(),
            ExtensionPoint {
                name,
                providing_args: providing_args.into_iter().map(Into::into).collect(),
            },
        );
        Ok(())
    }

    /// Registers a handler after validating its arguments against the point.
    pub fn register(&mut self, extension: Extension) -> AppResult<()> {
        self.ensure_unlocked(extension.point.as_str())?;
        let point = self.points.get(&extension.point).ok_or_else(|| {
            AppError::Validation(format!(
                "extension point '{}' is not defined",
                extension.point
            ))
        })?;

        let unknown: Vec<&str> = extension
            .consumed_args
            .difference(&point.providing_args)
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(AppError::Validation(format!(
                "extension for '{}' expects arguments the point does not provide: {}",
                point.name,
                unknown.join(", ")
            )));
        }

        if !extension.accepts_any_args {
            let unconsumed: Vec<&str> = point
                .providing_args
                .difference(&extension.consumed_args)
                .map(String::as_str)
                .collect();
            if !unconsumed.is_empty() {
                return Err(AppError::Validation(format!(
                    "extension for '{}' does not consume provided arguments: {}",
                    point.name,
                    unconsumed.join(", ")
                )));
            }
        }

        self.extensions
            .entry(extension.point.clone())
            .or_default()
            .push(extension);
        Ok(())
    }

    /// Stops accepting definitions and registrations.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Returns whether the registry is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns the declared point with the given name.
    #[must_use]
    pub fn point(&self, name: &str) -> Option<&ExtensionPoint> {
        self.points.get(name)
    }

    /// Calls every matching handler in registration order.
    ///
    /// Handlers returning nothing are skipped; failing handlers are logged and skipped.
    pub fn contributions(&self, point_name: &str, args: &ExtensionArgs) -> AppResult<Vec<Value>> {
        let point = self.points.get(point_name).ok_or_else(|| {
            AppError::Validation(format!("extension point '{point_name}' is not defined"))
        })?;

        if let Some(missing) = point
            .providing_args
            .iter()
            .find(|name| !args.contains_key(name.as_str()))
        {
            return Err(AppError::Validation(format!(
                "extension point '{point_name}' requires argument '{missing}'"
            )));
        }

        let mut results = Vec::new();
        for extension in self.extensions.get(point_name).into_iter().flatten() {
            if !extension.should_call(args) {
                continue;
            }

            match (extension.handler)(&extension.handler_args(args)) {
                Ok(Some(value)) => results.push(value),
                Ok(None) => {}
                Err(error) => {
                    warn!(point = point_name, %error, "extension handler failed");
                }
            }
        }

        Ok(results)
    }

    fn ensure_unlocked(&self, name: &str) -> AppResult<()> {
        if self.locked {
            return Err(AppError::Conflict(format!(
                "extension registry is locked; cannot change '{name}'"
            )));
        }
        Ok(())
    }
}
