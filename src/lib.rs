//! argbind - typed command-line argument binding.
//!
//! A [`Schema`] describes positional values, named options, switches and one
//! optional catch-all multi-value slot, each bound to a field of a target
//! type through a [`Field`] accessor. Parsing fills a fresh target or returns
//! every problem found as [`ParseErrors`]. Slots can be conditionally required
//! through [`DependencySet`] rules over other slots' converted values, and a
//! [`VerbSet`] dispatches to one of several schemas by the first token.
//!
//! The [`config`] and [`dynamic`] modules compile the same engine from a JSON
//! description, which the `argbind` binary uses to emit sourceable shell
//! variables for scripts.

pub mod config;
pub mod convert;
pub mod dependency;
pub mod dynamic;
pub mod error;
pub mod help;
pub mod output;
pub mod parser;
pub mod schema;
pub mod tokenizer;
pub mod verbs;

pub use config::{ArgConfig, ArgType, Config, ConfigError, ValueType};
pub use convert::{ConversionFailure, Converted, ConverterPanic, FailureStage};
pub use dependency::{DependencyRule, DependencySet, Nullable, Rule, RulePolarity};
pub use dynamic::{ArgValue, ArgValues, Invocation, Program};
pub use error::{BuildError, ErrorCode, ParseError, ParseErrors};
pub use help::{
    generate_help, generate_schema_help, generate_usage, generate_verb_help, generate_verbs_help,
    generate_version,
};
pub use output::{generate_error_output, generate_help_output, generate_output};
pub use parser::ParseResult;
pub use schema::{
    Field, HelpTokens, MultiValueSlot, Requiredness, Schema, SchemaBuilder, Slot, SlotInfo,
    SlotKind, SwitchSlot,
};
pub use tokenizer::{tokenize, Tokens};
pub use verbs::{VerbInfo, VerbSet, VerbSetBuilder};
