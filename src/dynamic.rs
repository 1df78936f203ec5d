//! Compiling a JSON [`Config`] into engine schemas over string-keyed values.

use crate::config::{ArgConfig, ArgType, Config, ConfigError, DependencyConfig, ValueType};
use crate::convert::Accumulator;
use crate::dependency::{DependencySet, Nullable, Rule};
use crate::parser::ParseResult;
use crate::schema::{Field, MultiValueSlot, Schema, SchemaBuilder, Slot, SwitchSlot};
use crate::tokenizer::tokenize;
use crate::verbs::{VerbSet, VerbSetBuilder};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A converted argument value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgValue {
    /// Absent with no default.
    #[default]
    Null,
    Text(String),
    Int(i64),
    Bool(bool),
    /// Elements of a multi-value argument.
    List(Vec<ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the rendered value equals `text`. Null matches nothing.
    pub fn matches_text(&self, text: &str) -> bool {
        !self.is_null() && self.to_string() == text
    }
}

impl Nullable for ArgValue {
    fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => Ok(()),
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// Argument values keyed by name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgValues {
    entries: Vec<(String, ArgValue)>,
}

impl ArgValues {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Insert or replace the value for `name`.
    pub fn set(&mut self, name: &str, value: ArgValue) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reorder to `names`, with `Null` for every name never set.
    fn complete(mut self, names: &[String]) -> Self {
        let entries = names
            .iter()
            .map(|name| {
                let value = self
                    .entries
                    .iter_mut()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| std::mem::take(value))
                    .unwrap_or_default();
                (name.clone(), value)
            })
            .collect();
        self.entries = entries;
        self
    }
}

impl<'a> IntoIterator for &'a ArgValues {
    type Item = (&'a str, &'a ArgValue);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a ArgValue)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// The result of parsing with a compiled [`Program`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The selected verb, when the config declares verbs.
    pub verb: Option<String>,
    /// Every declared argument of the invoked schema, in declaration order.
    pub values: ArgValues,
}

/// A config compiled into either a single schema or a verb set.
pub enum Program {
    Single {
        schema: Schema<ArgValues>,
        names: Vec<String>,
    },
    Verbs(VerbSet<Invocation>),
}

impl Program {
    /// Validate `config` and build its schemas.
    pub fn compile(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        if config.verbs.is_empty() {
            let schema = compile_schema(config, config.display_name(), &config.args)?;
            let names = config.args.iter().map(|arg| arg.name.clone()).collect();
            debug!(name = config.display_name(), "compiled schema");
            return Ok(Program::Single { schema, names });
        }

        let help = &config.help_flag;
        let mut builder = VerbSetBuilder::new(config.display_name());
        builder = if help.is_disabled() {
            builder.without_help()
        } else {
            builder.help_tokens(help.short_token().as_deref(), help.long_token().as_deref())
        };
        for verb in &config.verbs {
            let schema = compile_schema(config, &verb.name, &verb.args)?;
            let names: Vec<String> = verb.args.iter().map(|arg| arg.name.clone()).collect();
            let name = verb.name.clone();
            builder = builder.verb(&verb.name, &verb.help, schema, move |values: ArgValues| {
                Invocation {
                    verb: Some(name.clone()),
                    values: values.complete(&names),
                }
            });
        }
        debug!(name = config.display_name(), verbs = config.verbs.len(), "compiled verbs");
        Ok(Program::Verbs(builder.build()?))
    }

    pub fn parse<I, S>(&self, args: I) -> ParseResult<Invocation>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Program::Single { schema, names } => schema.parse(args).map(|values| Invocation {
                verb: None,
                values: values.complete(names),
            }),
            Program::Verbs(verbs) => verbs.parse(args),
        }
    }

    pub fn parse_line(&self, line: &str) -> ParseResult<Invocation> {
        let tokens: Vec<String> = tokenize(line).collect();
        self.parse(tokens)
    }
}

fn compile_schema(
    config: &Config,
    name: &str,
    args: &[ArgConfig],
) -> Result<Schema<ArgValues>, ConfigError> {
    let mut builder = SchemaBuilder::new(name);
    let help = &config.help_flag;
    builder = if help.is_disabled() {
        builder.without_help()
    } else {
        builder.help_tokens(help.short_token().as_deref(), help.long_token().as_deref())
    };

    for arg in args {
        builder = match arg.arg_type {
            ArgType::Value | ArgType::Option => builder.arg(compile_slot(arg)?),
            ArgType::Switch => builder.switch(compile_switch(arg)),
            ArgType::MultiValue => builder.multi_value(compile_multi(arg)?),
        };
    }
    Ok(builder.build()?)
}

fn compile_slot(arg: &ArgConfig) -> Result<Slot<ArgValues, ArgValue>, ConfigError> {
    let field = value_field(&arg.name);
    let mut slot = match arg.arg_type {
        ArgType::Value => Slot::value(&arg.name, field),
        _ => {
            let mut slot = Slot::option(&arg.name, field);
            if let Some(short) = arg.short_token() {
                slot = slot.short(short);
            }
            if let Some(long) = arg.long_token() {
                slot = slot.long(long);
            }
            slot
        }
    };

    let value_type = arg.value_type;
    slot = slot
        .help(&arg.help)
        .converter(move |raw| convert(value_type, raw));
    if let Some(choices) = &arg.choices {
        slot = slot.validator(choice_validator(choices));
    }
    if let Some(default) = &arg.default {
        slot = slot.default_value(convert_default(arg, default)?);
    }
    if arg.required {
        slot = slot.required();
    }
    if !arg.dependencies.is_empty() {
        slot = slot.dependencies(compile_dependencies(&arg.dependencies));
    }
    Ok(slot)
}

fn compile_switch(arg: &ArgConfig) -> SwitchSlot<ArgValues> {
    let key = arg.name.clone();
    let set_key = arg.name.clone();
    let field = Field::new(
        &arg.name,
        move |values: &ArgValues| values.get(&key) == Some(&ArgValue::Bool(true)),
        move |values: &mut ArgValues, value: bool| values.set(&set_key, ArgValue::Bool(value)),
    );

    let mut slot = SwitchSlot::new(&arg.name, field)
        .help(&arg.help)
        .default_value(false);
    if let Some(short) = arg.short_token() {
        slot = slot.short(short);
    }
    if let Some(long) = arg.long_token() {
        slot = slot.long(long);
    }
    if arg.required {
        slot = slot.required();
    }
    if !arg.dependencies.is_empty() {
        slot = slot.dependencies(compile_dependencies(&arg.dependencies));
    }
    slot
}

fn compile_multi(
    arg: &ArgConfig,
) -> Result<MultiValueSlot<ArgValues, ArgValue, ArgValue>, ConfigError> {
    let value_type = arg.value_type;
    let accumulator: Accumulator<ArgValue, ArgValue> = Arc::new(ArgValue::List);
    let mut slot = MultiValueSlot::with_accumulator(&arg.name, value_field(&arg.name), accumulator)
        .help(&arg.help)
        .converter(move |raw| convert(value_type, raw));
    for prefix in &arg.ignore_prefixes {
        slot = slot.ignore_prefix(prefix);
    }
    if let Some(choices) = &arg.choices {
        slot = slot.validator(choice_validator(choices));
    }
    if let Some(default) = &arg.default {
        let items = tokenize(default)
            .map(|token| convert_default(arg, &token))
            .collect::<Result<Vec<_>, _>>()?;
        slot = slot.default_value(ArgValue::List(items));
    }
    if arg.required {
        slot = slot.required();
    }
    if !arg.dependencies.is_empty() {
        slot = slot.dependencies(compile_dependencies(&arg.dependencies));
    }
    Ok(slot)
}

/// Accessor for the named entry of an [`ArgValues`].
fn value_field(name: &str) -> Field<ArgValues, ArgValue> {
    let key = name.to_string();
    let set_key = name.to_string();
    Field::new(
        name,
        move |values: &ArgValues| values.get(&key).cloned().unwrap_or_default(),
        move |values: &mut ArgValues, value| values.set(&set_key, value),
    )
}

fn convert(value_type: ValueType, raw: &str) -> Result<ArgValue, String> {
    match value_type {
        ValueType::String => Ok(ArgValue::Text(raw.to_string())),
        ValueType::Int => raw
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| "expected an integer".to_string()),
        ValueType::Bool => match raw {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            _ => Err("expected 'true' or 'false'".to_string()),
        },
    }
}

fn choice_validator(choices: &[String]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
    let choices = choices.to_vec();
    move |raw: &str| {
        if choices.iter().any(|choice| choice == raw) {
            None
        } else {
            Some(format!("expected one of: {}", choices.join(", ")))
        }
    }
}

/// Defaults pass through the same checks as user input.
fn convert_default(arg: &ArgConfig, raw: &str) -> Result<ArgValue, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDefault {
        arg: arg.name.clone(),
        value: raw.to_string(),
        reason,
    };
    if let Some(choices) = &arg.choices {
        if let Some(reason) = choice_validator(choices)(raw) {
            return Err(invalid(reason));
        }
    }
    convert(arg.value_type, raw).map_err(invalid)
}

fn compile_dependencies(dependencies: &[DependencyConfig]) -> DependencySet<ArgValues> {
    dependencies
        .iter()
        .fold(DependencySet::new(), |set, dependency| {
            set.rule(compile_rule(dependency))
        })
}

/// Every predicate present in the config is assigned, so the builder sees a
/// missing or doubled predicate exactly as written.
fn compile_rule(dependency: &DependencyConfig) -> Rule<ArgValues, ArgValue> {
    // validate() guarantees exactly one polarity
    let (target, required) = dependency.target().unwrap_or_default();
    let field = value_field(target);
    let mut rule = if required {
        Rule::required_if(field)
    } else {
        Rule::must_not_appear_if(field)
    };

    if let Some(expected) = dependency.equals.clone() {
        rule = rule.when(move |value: &ArgValue| value.matches_text(&expected));
    }
    if let Some(expected) = dependency.not_equals.clone() {
        rule = rule.when_not(move |value: &ArgValue| value.matches_text(&expected));
    }
    if let Some(options) = dependency.one_of.clone() {
        rule = rule.when(move |value: &ArgValue| options.iter().any(|o| value.matches_text(o)));
    }
    if let Some(options) = dependency.not_one_of.clone() {
        rule = rule.when_not(move |value: &ArgValue| options.iter().any(|o| value.matches_text(o)));
    }
    match dependency.is_null {
        Some(true) => rule = rule.is_null(),
        Some(false) => rule = rule.is_not_null(),
        None => {}
    }
    if let Some(message) = &dependency.message {
        rule = rule.with_message(message);
    }
    rule
}
