//! Step registry - maps step descriptions to handlers

use crate::core::Step;
use async_trait::async_trait;
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, trace};

/// Token that turns a description into a template
pub const PLACEHOLDER: &str = "'${string}'";

/// What the placeholder matches: one single-quoted alphabetic word
const PLACEHOLDER_PATTERN: &str = "('[A-Za-z]+')";

/// Error types for step registration and lookup
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Step description '{0}' already exists")]
    Duplicate(String),

    #[error("Step '{0}' is not registered in step list")]
    NotFound(String),

    #[error("Step description '{description}' is not a valid pattern")]
    InvalidPattern {
        description: String,
        #[source]
        source: regex::Error,
    },
}

/// The code behind a step description.
///
/// Handlers read what they need from the step and report the outcome with
/// [`Step::set_passed`]. Returning an error fails the step as well.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()>;
}

/// Future returned by closure handlers
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Adapter turning a closure into a [`StepHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> StepHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Step) -> HandlerFuture<'a> + Send + Sync,
{
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        (self.0)(step).await
    }
}

/// Wrap a closure as a step handler.
///
/// ```ignore
/// engine.register_step("Check the cache", handler_fn(|step| Box::pin(async move {
///     step.set_passed();
///     Ok(())
/// })))?;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Step) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    FnHandler(f)
}

/// How a registered description is matched
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact string match
    Literal,
    /// Description with a placeholder, compiled to an anchored pattern
    Template(Regex),
}

/// A registered step
#[derive(Clone)]
pub struct StepEntry {
    pub key: String,
    pub matcher: Matcher,
    handler: Arc<dyn StepHandler>,
}

impl StepEntry {
    fn matches(&self, description: &str) -> bool {
        match &self.matcher {
            Matcher::Literal => self.key == description,
            Matcher::Template(pattern) => pattern.is_match(description),
        }
    }

    fn is_template(&self) -> bool {
        matches!(self.matcher, Matcher::Template(_))
    }
}

/// Registry of step handlers.
///
/// Templates are tried in registration order, so the first registered
/// template that matches a description wins.
#[derive(Clone, Default)]
pub struct StepRegistry {
    entries: Vec<StepEntry>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a description.
    ///
    /// A description containing [`PLACEHOLDER`] becomes a template: the
    /// placeholder matches any single-quoted alphabetic word and the rest of
    /// the description is taken as a regular expression. Anything else is
    /// registered literally.
    pub fn register<H>(&mut self, description: &str, handler: H) -> Result<(), RegistryError>
    where
        H: StepHandler + 'static,
    {
        self.register_arc(description, Arc::new(handler))
    }

    pub fn register_arc(
        &mut self,
        description: &str,
        handler: Arc<dyn StepHandler>,
    ) -> Result<(), RegistryError> {
        let matcher = if description.contains(PLACEHOLDER) {
            let source = format!("^{}$", description.replace(PLACEHOLDER, PLACEHOLDER_PATTERN));
            let pattern = Regex::new(&source).map_err(|source| RegistryError::InvalidPattern {
                description: description.to_string(),
                source,
            })?;
            Matcher::Template(pattern)
        } else {
            Matcher::Literal
        };

        let is_template = matches!(matcher, Matcher::Template(_));
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.key == description && e.is_template() == is_template);
        if duplicate {
            let err = RegistryError::Duplicate(description.to_string());
            error!("{}", err);
            return Err(err);
        }

        trace!(step = description, is_template, "Registered step");
        self.entries.push(StepEntry {
            key: description.to_string(),
            matcher,
            handler,
        });
        Ok(())
    }

    /// Find the handler for a step description.
    ///
    /// Descriptions containing a single quote are matched against the
    /// templates, anything else is looked up literally.
    pub fn resolve(&self, description: &str) -> Result<Arc<dyn StepHandler>, RegistryError> {
        let templated = description.contains('\'');
        trace!(step = description, templated, "Resolving step");

        self.entries
            .iter()
            .filter(|e| e.is_template() == templated)
            .find(|e| e.matches(description))
            .map(|e| e.handler.clone())
            .ok_or_else(|| {
                let err = RegistryError::NotFound(description.to_string());
                error!(templated, "{}", err);
                err
            })
    }

    /// Registered descriptions in registration order
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
