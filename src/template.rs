//! Log template compiler
//!
//! A format string mixes literal text, fields and conditional blocks:
//!
//! ```text
//! user:${USER}, client:${CLIENT}{?, executed from batch:${BATCH_ID}?}
//! ```
//!
//! `${FIELD}` is replaced by the field's value. `{?prefix${FIELD}suffix?}`
//! renders `prefix`, the value and `suffix` only when the field has a
//! non-empty value, and nothing otherwise.
//!
//! The string is lexed once into [`Instruction`]s and compiled into a
//! [`CompiledTemplate`]: literal parts interleaved with positional slots,
//! plus one extractor per slot. Unknown fields are rejected at compile
//! time so rendering never fails.

use crate::config::LoggerConfig;
use crate::error::{AuditError, Result};
use crate::timestamp::TimestampFormat;
use crate::types::AuditRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Rendered in place of a mandatory field that has no value
const ABSENT: &str = "null";

/// Field value extractor
pub type FieldFn = Arc<dyn Fn(&AuditRecord) -> Option<String> + Send + Sync>;

type SlotFn = Box<dyn Fn(&AuditRecord) -> String + Send + Sync>;

/// One lexed element of a format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<'a> {
    Literal(&'a str),
    Field(&'a str),
    Conditional {
        prefix: &'a str,
        field: &'a str,
        suffix: &'a str,
    },
}

/// Split a format string into instructions in a single left-to-right pass
///
/// An unterminated `${` or an incomplete `{?...?}` block is kept as
/// literal text.
pub fn lex(format: &str) -> Vec<Instruction<'_>> {
    let mut instructions = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < format.len() {
        let rest = &format[pos..];
        let matched = if rest.starts_with("${") {
            lex_field(rest)
        } else if rest.starts_with("{?") {
            lex_conditional(rest)
        } else {
            None
        };

        match matched {
            Some((instruction, consumed)) => {
                if literal_start < pos {
                    instructions.push(Instruction::Literal(&format[literal_start..pos]));
                }
                instructions.push(instruction);
                pos += consumed;
                literal_start = pos;
            }
            None => {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if literal_start < format.len() {
        instructions.push(Instruction::Literal(&format[literal_start..]));
    }
    instructions
}

/// `${NAME}` at the start of `s`
fn lex_field(s: &str) -> Option<(Instruction<'_>, usize)> {
    let body = &s[2..];
    let end = body.find('}')?;
    Some((Instruction::Field(&body[..end]), 2 + end + 1))
}

/// `{?prefix${NAME}suffix?}` at the start of `s`
fn lex_conditional(s: &str) -> Option<(Instruction<'_>, usize)> {
    let body = &s[2..];
    let field_start = body.find("${")?;
    let after_open = &body[field_start + 2..];
    let field_end = after_open.find('}')?;
    let after_field = &after_open[field_end + 1..];
    let suffix_end = after_field.find("?}")?;

    let instruction = Instruction::Conditional {
        prefix: &body[..field_start],
        field: &after_open[..field_end],
        suffix: &after_field[..suffix_end],
    };
    let consumed = 2 + field_start + 2 + field_end + 1 + suffix_end + 2;
    Some((instruction, consumed))
}

/// Named field extractors available to format strings
#[derive(Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<String, FieldFn>,
}

impl FieldRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in fields: `CLIENT`, `USER`, `BATCH_ID`, `STATUS`,
    /// `OPERATION` and `TIMESTAMP` rendered with `timestamp`
    pub fn standard(timestamp: TimestampFormat) -> Self {
        let mut registry = Self::new();
        registry.register("CLIENT", |r| Some(r.client_address.to_string()));
        registry.register("USER", |r| Some(r.user.to_string()));
        registry.register("BATCH_ID", |r| r.batch_id.map(|id| id.to_string()));
        registry.register("STATUS", |r| Some(r.status.to_string()));
        registry.register("OPERATION", |r| Some(r.operation.clone()));
        registry.register("TIMESTAMP", move |r| Some(timestamp.format(r.timestamp)));
        registry
    }

    /// Built-in fields with the timestamp settings from `config`
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        let timestamp = TimestampFormat::new(
            config.time_format.as_deref(),
            config.time_zone.as_deref(),
        )?;
        Ok(Self::standard(timestamp))
    }

    /// Add or replace a field
    pub fn register(
        &mut self,
        name: impl Into<String>,
        extractor: impl Fn(&AuditRecord) -> Option<String> + Send + Sync + 'static,
    ) {
        self.fields.insert(name.into(), Arc::new(extractor));
    }

    pub fn get(&self, name: &str) -> Result<FieldFn> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| AuditError::UnknownField(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

enum Part {
    Literal(String),
    Slot,
}

/// Immutable render plan built from a format string
///
/// Safe to share across threads; rendering takes no locks.
pub struct CompiledTemplate {
    format: String,
    parts: Vec<Part>,
    slots: Vec<SlotFn>,
    literal_len: usize,
}

impl CompiledTemplate {
    /// Compile `format` against the fields in `registry`
    pub fn compile(format: &str, registry: &FieldRegistry) -> Result<Self> {
        let mut parts = Vec::new();
        let mut slots: Vec<SlotFn> = Vec::new();
        let mut literal_len = 0;

        for instruction in lex(format) {
            match instruction {
                Instruction::Literal(text) => {
                    literal_len += text.len();
                    parts.push(Part::Literal(text.to_string()));
                }
                Instruction::Field(name) => {
                    let field = registry.get(name)?;
                    slots.push(Box::new(move |r: &AuditRecord| {
                        field(r).unwrap_or_else(|| ABSENT.to_string())
                    }));
                    parts.push(Part::Slot);
                }
                Instruction::Conditional {
                    prefix,
                    field,
                    suffix,
                } => {
                    let field = registry.get(field)?;
                    slots.push(text_if_present(field.clone(), prefix.to_string()));
                    slots.push(value_or_empty(field.clone()));
                    slots.push(text_if_present(field, suffix.to_string()));
                    parts.extend([Part::Slot, Part::Slot, Part::Slot]);
                }
            }
        }

        tracing::debug!(format = %format, slots = slots.len(), "Log template compiled");
        Ok(Self {
            format: format.to_string(),
            parts,
            slots,
            literal_len,
        })
    }

    /// Render `record` into a log line
    pub fn render(&self, record: &AuditRecord) -> String {
        let mut line = String::with_capacity(self.literal_len + 16 * self.slots.len());
        let mut slots = self.slots.iter();
        for part in &self.parts {
            match part {
                Part::Literal(text) => line.push_str(text),
                Part::Slot => {
                    if let Some(slot) = slots.next() {
                        line.push_str(&slot(record));
                    }
                }
            }
        }
        line
    }

    /// The source format string
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Number of positional slots in the skeleton
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("format", &self.format)
            .field("slots", &self.slots.len())
            .finish()
    }
}

fn value_or_empty(field: FieldFn) -> SlotFn {
    Box::new(move |r: &AuditRecord| field(r).unwrap_or_default())
}

fn text_if_present(field: FieldFn, text: String) -> SlotFn {
    Box::new(move |r: &AuditRecord| match field(r) {
        Some(value) if !value.is_empty() => text.clone(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;
    use crate::types::{Permission, Status};
    use std::net::{IpAddr, Ipv4Addr};

    fn record() -> AuditRecord {
        AuditRecord::new(
            "cassandra",
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
            ResourceId::table("ks", "tbl"),
            [Permission::Select],
            "SELECT * FROM ks.tbl",
        )
        .unwrap()
        .with_timestamp(1_551_365_423_123)
    }

    fn registry() -> FieldRegistry {
        FieldRegistry::standard(TimestampFormat::Raw)
    }

    fn render(format: &str, record: &AuditRecord) -> String {
        CompiledTemplate::compile(format, &registry())
            .unwrap()
            .render(record)
    }

    #[test]
    fn test_lex_mixed() {
        assert_eq!(
            lex("a${X}b{?p${Y}s?}c"),
            vec![
                Instruction::Literal("a"),
                Instruction::Field("X"),
                Instruction::Literal("b"),
                Instruction::Conditional {
                    prefix: "p",
                    field: "Y",
                    suffix: "s"
                },
                Instruction::Literal("c"),
            ]
        );
    }

    #[test]
    fn test_lex_incomplete_markers_are_literal() {
        assert_eq!(lex("cost ${"), vec![Instruction::Literal("cost ${")]);
        assert_eq!(
            lex("{?no field?}"),
            vec![Instruction::Literal("{?no field?}")]
        );
        // Unclosed conditional: the inner field is still a field
        assert_eq!(
            lex("{?a${X}b"),
            vec![
                Instruction::Literal("{?a"),
                Instruction::Field("X"),
                Instruction::Literal("b"),
            ]
        );
    }

    #[test]
    fn test_lex_non_ascii_literals() {
        assert_eq!(
            lex("användare→${USER}…"),
            vec![
                Instruction::Literal("användare→"),
                Instruction::Field("USER"),
                Instruction::Literal("…"),
            ]
        );
    }

    #[test]
    fn test_lex_empty() {
        assert!(lex("").is_empty());
    }

    #[test]
    fn test_fields() {
        assert_eq!(
            render("client=${CLIENT}, user=${USER}", &record()),
            "client=1.2.3.4, user=cassandra"
        );
        assert_eq!(
            render("${STATUS} ${OPERATION} @${TIMESTAMP}", &record().with_status(Status::Failed)),
            "FAILED SELECT * FROM ks.tbl @1551365423123"
        );
    }

    #[test]
    fn test_conditional_without_value() {
        assert_eq!(
            render("{?batch-id=${BATCH_ID}, ?}op=${OPERATION}", &record()),
            "op=SELECT * FROM ks.tbl"
        );
    }

    #[test]
    fn test_conditional_with_value() {
        let batch = uuid::Uuid::new_v4();
        assert_eq!(
            render("{?batch-id=${BATCH_ID}, ?}op=${OPERATION}", &record().with_batch_id(batch)),
            format!("batch-id={}, op=SELECT * FROM ks.tbl", batch)
        );
    }

    #[test]
    fn test_conditional_slot_layout() {
        let template =
            CompiledTemplate::compile("${USER}{?, batch:${BATCH_ID}?}", &registry()).unwrap();
        assert_eq!(template.slot_count(), 4);
        assert_eq!(template.format(), "${USER}{?, batch:${BATCH_ID}?}");
    }

    #[test]
    fn test_conditional_treats_empty_as_absent() {
        let mut registry = registry();
        registry.register("EMPTY", |_| Some(String::new()));
        let template = CompiledTemplate::compile("[{?x=${EMPTY};?}]", &registry).unwrap();
        assert_eq!(template.render(&record()), "[]");
    }

    #[test]
    fn test_mandatory_absent_field() {
        assert_eq!(render("batch=${BATCH_ID}", &record()), "batch=null");
    }

    #[test]
    fn test_literal_braces_untouched() {
        assert_eq!(render("{} {user} ${USER} {}", &record()), "{} {user} cassandra {}");
    }

    #[test]
    fn test_unknown_field_fails_compile() {
        let err = CompiledTemplate::compile("${USER} ${NOPE}", &registry()).unwrap_err();
        assert!(matches!(err, AuditError::UnknownField(ref f) if f == "NOPE"));

        let err = CompiledTemplate::compile("{?x${MISSING}?}", &registry()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_custom_field() {
        let mut registry = registry();
        registry.register("RESOURCE", |r| Some(r.resource.to_string()));
        let template = CompiledTemplate::compile("on ${RESOURCE}", &registry).unwrap();
        assert_eq!(template.render(&record()), "on data/ks/tbl");
    }

    #[test]
    fn test_registry_names() {
        assert_eq!(
            registry().names(),
            vec!["BATCH_ID", "CLIENT", "OPERATION", "STATUS", "TIMESTAMP", "USER"]
        );
    }

    #[test]
    fn test_from_config_formats_timestamp() {
        let config = LoggerConfig {
            time_format: Some("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()),
            time_zone: Some("UTC".to_string()),
            ..LoggerConfig::default()
        };
        let registry = FieldRegistry::from_config(&config).unwrap();
        let template = CompiledTemplate::compile("${TIMESTAMP}", &registry).unwrap();
        assert_eq!(template.render(&record()), "2019-02-28T14:50:23.123Z");
    }

    #[test]
    fn test_default_format() {
        let template =
            CompiledTemplate::compile(crate::config::DEFAULT_LOG_FORMAT, &registry()).unwrap();
        assert_eq!(
            template.render(&record()),
            "client:'1.2.3.4'|user:'cassandra'|status:'ATTEMPT'|operation:'SELECT * FROM ks.tbl'"
        );
    }

    #[test]
    fn test_template_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledTemplate>();
    }
}
