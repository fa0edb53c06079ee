//! Audit logger: renders records through a compiled template into a sink

use crate::config::LoggerConfig;
use crate::error::Result;
use crate::sink::LogSink;
use crate::template::{CompiledTemplate, FieldRegistry};
use crate::types::AuditRecord;
use std::fmt;
use std::sync::Arc;

/// Writes audit records somewhere
pub trait AuditLogger: Send + Sync {
    fn log(&self, record: &AuditRecord) -> Result<()>;
}

/// Renders each record with a [`CompiledTemplate`] and appends the line to a sink
///
/// The template is fixed for the logger's lifetime; a configuration
/// reload builds a new logger.
#[derive(Clone)]
pub struct TemplateLogger {
    template: Arc<CompiledTemplate>,
    sink: Arc<dyn LogSink>,
}

impl TemplateLogger {
    pub fn new(template: CompiledTemplate, sink: Arc<dyn LogSink>) -> Self {
        Self {
            template: Arc::new(template),
            sink,
        }
    }

    /// Compile the configured format with the built-in fields
    ///
    /// Fails on unknown fields, bad time patterns or bad zones.
    pub fn from_config(config: &LoggerConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let registry = FieldRegistry::from_config(config)?;
        let template = CompiledTemplate::compile(&config.log_format, &registry)?;
        Ok(Self::new(template, sink))
    }

    pub fn render(&self, record: &AuditRecord) -> String {
        self.template.render(record)
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }
}

impl fmt::Debug for TemplateLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateLogger")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl AuditLogger for TemplateLogger {
    fn log(&self, record: &AuditRecord) -> Result<()> {
        let line = self.render(record);
        self.sink.append(&line)
    }
}
