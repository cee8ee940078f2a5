use butterfly_extensions::Template;
use indexmap::IndexMap;
use std::sync::Arc;

/// Factory producing a fresh template instance per run.
pub type TemplateFactory = Arc<dyn Fn() -> Template + Send + Sync>;

/// Builder used to register extension templates before execution.
pub struct ExtensionRegistryBuilder {
    templates: IndexMap<String, TemplateFactory>,
}

impl Default for ExtensionRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistryBuilder {
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Template + Send + Sync + 'static,
    {
        if self.templates.contains_key(name) {
            panic!("duplicate template registered: {}", name);
        }
        self.templates.insert(name.to_string(), Arc::new(factory));
        self
    }

    pub fn build(self) -> ExtensionRegistry {
        ExtensionRegistry {
            inner: Arc::new(self.templates),
        }
    }
}

/// Immutable registry of named templates, read-only at execution time.
#[derive(Clone)]
pub struct ExtensionRegistry {
    inner: Arc<IndexMap<String, TemplateFactory>>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        ExtensionRegistryBuilder::new().build()
    }

    pub fn builder() -> ExtensionRegistryBuilder {
        ExtensionRegistryBuilder::new()
    }

    /// Instantiate a fresh copy of the named template.
    pub fn get(&self, name: &str) -> Option<Template> {
        self.inner.get(name).map(|factory| factory())
    }

    /// Registered template names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.inner.keys().map(String::as_str).collect()
    }
}
