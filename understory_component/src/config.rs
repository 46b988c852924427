// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document configuration.

use core::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use understory_object::{LiveArray, Metrics, Object, ObjectMap};

use crate::{EditTextFactory, FixedAdvanceMeasure, TextMeasurement};

/// Supplies live arrays for `data` values of the form `{"type": name, ...}`.
pub trait DataSourceProvider: fmt::Debug {
    /// Creates the backing array for the given source description, or `None` if it is invalid.
    fn create(&self, source: &Object) -> Option<Rc<LiveArray>>;

    /// The host displayed item `index`; the provider may fetch more items.
    fn ensure(&self, index: usize);
}

/// Settings for inflating a document.
///
/// ```rust
/// use understory_component::RootConfig;
/// use understory_object::Metrics;
///
/// let config = RootConfig::new(Metrics::new(800.0, 600.0))
///     .with_agent("MyHost", "1.0")
///     .with_provenance(true);
/// assert_eq!(config.metrics().width, 800.0);
/// ```
#[derive(Clone)]
pub struct RootConfig {
    metrics: Metrics,
    agent_name: String,
    agent_version: String,
    text_measurement: Rc<dyn TextMeasurement>,
    edit_text_factory: Option<Rc<dyn EditTextFactory>>,
    data_sources: HashMap<String, Rc<dyn DataSourceProvider>>,
    track_provenance: bool,
}

impl fmt::Debug for RootConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&String> = self.data_sources.keys().collect();
        sources.sort();
        f.debug_struct("RootConfig")
            .field("metrics", &self.metrics)
            .field("agent_name", &self.agent_name)
            .field("agent_version", &self.agent_version)
            .field("text_measurement", &self.text_measurement)
            .field("edit_text_factory", &self.edit_text_factory)
            .field("data_sources", &sources)
            .field("track_provenance", &self.track_provenance)
            .finish()
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self::new(Metrics::default())
    }
}

impl RootConfig {
    /// A configuration for the given viewport with the fixed-advance text measurer.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            agent_name: "understory".to_owned(),
            agent_version: env!("CARGO_PKG_VERSION").to_owned(),
            text_measurement: Rc::new(FixedAdvanceMeasure),
            edit_text_factory: None,
            data_sources: HashMap::new(),
            track_provenance: false,
        }
    }

    /// Replaces the viewport metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the agent reported in `environment`.
    #[must_use]
    pub fn with_agent(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self.agent_version = version.into();
        self
    }

    /// Replaces the text measurer.
    #[must_use]
    pub fn with_text_measurement(mut self, measurement: Rc<dyn TextMeasurement>) -> Self {
        self.text_measurement = measurement;
        self
    }

    /// Installs a native text field factory. Without one, `EditText` has no host field.
    #[must_use]
    pub fn with_edit_text_factory(mut self, factory: Rc<dyn EditTextFactory>) -> Self {
        self.edit_text_factory = Some(factory);
        self
    }

    /// Registers a data source under `name`.
    #[must_use]
    pub fn with_data_source(
        mut self,
        name: impl Into<String>,
        provider: Rc<dyn DataSourceProvider>,
    ) -> Self {
        self.data_sources.insert(name.into(), provider);
        self
    }

    /// Records each component's document path in its serialized form.
    #[must_use]
    pub fn with_provenance(mut self, track: bool) -> Self {
        self.track_provenance = track;
        self
    }

    /// Viewport metrics.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The text measurer.
    #[must_use]
    pub fn text_measurement(&self) -> &Rc<dyn TextMeasurement> {
        &self.text_measurement
    }

    /// The text field factory, if any.
    #[must_use]
    pub fn edit_text_factory(&self) -> Option<&Rc<dyn EditTextFactory>> {
        self.edit_text_factory.as_ref()
    }

    /// The data source registered under `name`.
    #[must_use]
    pub fn data_source(&self, name: &str) -> Option<&Rc<dyn DataSourceProvider>> {
        self.data_sources.get(name)
    }

    /// Returns `true` if components record their document path.
    #[must_use]
    pub fn track_provenance(&self) -> bool {
        self.track_provenance
    }

    /// The `environment` map published to documents.
    #[must_use]
    pub fn environment(&self) -> Object {
        let mut environment = ObjectMap::new();
        environment.insert("agentName".into(), Object::from(self.agent_name.as_str()));
        environment.insert("agentVersion".into(), Object::from(self.agent_version.as_str()));
        environment.insert("allowOpenURL".into(), Object::from(false));
        environment.insert("layoutDirection".into(), Object::from("LTR"));
        Object::from(environment)
    }
}
