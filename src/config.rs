//! JSON configuration for argbind schemas declared by shell scripts.

use crate::error::BuildError;
use crate::output::to_shell_var_name;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Prefix used for exported variables when the config sets none.
pub const DEFAULT_PREFIX: &str = "ARGBIND_";

/// Errors that can occur during config parsing, validation and compilation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse JSON config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("duplicate argument name: {0}")]
    DuplicateName(String),

    #[error("duplicate verb name: {0}")]
    DuplicateVerbName(String),

    #[error("'args' and 'verbs' cannot both be set")]
    ArgsAndVerbs,

    #[error("invalid short option '{0}': must be a single ASCII letter or digit")]
    InvalidShortOption(String),

    #[error("invalid long option '{0}': must be non-empty, without whitespace or a leading '-'")]
    InvalidLongOption(String),

    #[error("invalid help flag '{0}'")]
    InvalidHelpFlag(String),

    #[error("positional argument '{0}' cannot have 'short' or 'long'")]
    NamedPositional(String),

    #[error("'choices' on argument '{0}' is empty: must have at least one valid value")]
    EmptyChoices(String),

    #[error("'choices' on argument '{0}' has duplicate value: {1}")]
    DuplicateChoice(String, String),

    #[error("'{1}' cannot be used with switch type on argument '{0}'")]
    NotAllowedOnSwitch(String, &'static str),

    #[error("'ignore_prefixes' on argument '{0}' is only allowed on multi_value arguments")]
    IgnorePrefixesNotMulti(String),

    #[error("argument '{0}' cannot be both 'required' and have 'dependencies'")]
    RequiredWithDependencies(String),

    #[error(
        "dependency {1} on argument '{0}' must set exactly one of 'required_if' or 'must_not_appear_if'"
    )]
    InvalidPolarity(String, usize),

    #[error("invalid default '{value}' for argument '{arg}': {reason}")]
    InvalidDefault {
        arg: String,
        value: String,
        reason: String,
    },

    #[error("arguments '{0}' and '{1}' both export as {2}")]
    VariableClash(String, String, String),

    #[error("argument '{0}' exports as VERB, which holds the selected verb")]
    ReservedVariable(String),

    #[error("invalid schema: {0}")]
    Build(#[from] BuildError),
}

/// The kind of argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    /// A positional value, filled in declaration order
    Value,
    /// A named option taking the next token (e.g., --output file.txt)
    Option,
    /// A named boolean switch (e.g., --verbose)
    Switch,
    /// Positional tokens left over after every value is filled
    MultiValue,
}

/// How argument values are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Any string value (default, no conversion)
    #[default]
    String,
    /// Signed 64-bit integer
    Int,
    /// Boolean (strict "true" or "false" only)
    Bool,
}

/// Tokens that request help. Omitting the object keeps `-?` and `--help`;
/// an object with neither field disables help.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HelpFlag {
    pub short: Option<char>,
    pub long: Option<String>,
}

impl Default for HelpFlag {
    fn default() -> Self {
        Self {
            short: Some('?'),
            long: Some("help".to_string()),
        }
    }
}

impl HelpFlag {
    pub fn short_token(&self) -> Option<String> {
        self.short.map(|c| format!("-{}", c))
    }

    pub fn long_token(&self) -> Option<String> {
        self.long.as_ref().map(|l| format!("--{}", l))
    }

    pub fn is_disabled(&self) -> bool {
        self.short.is_none() && self.long.is_none()
    }
}

/// A conditional requiredness rule on an argument.
///
/// Exactly one of `required_if` / `must_not_appear_if` names the argument
/// whose value is tested. The predicate fields are handed to the engine as
/// given, so setting none or several is reported when the schema is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencyConfig {
    pub required_if: Option<String>,
    pub must_not_appear_if: Option<String>,
    pub equals: Option<String>,
    pub not_equals: Option<String>,
    pub one_of: Option<Vec<String>>,
    pub not_one_of: Option<Vec<String>>,
    /// `true` applies when the value is null, `false` when it is not.
    pub is_null: Option<bool>,
    pub message: Option<String>,
}

impl DependencyConfig {
    /// The tested argument, and whether the rule demands presence.
    pub fn target(&self) -> Option<(&str, bool)> {
        match (&self.required_if, &self.must_not_appear_if) {
            (Some(name), None) => Some((name, true)),
            (None, Some(name)) => Some((name, false)),
            _ => None,
        }
    }
}

/// A long name usable after `--`.
fn is_valid_long(long: &str) -> bool {
    !long.is_empty() && !long.starts_with('-') && !long.contains(char::is_whitespace)
}

/// Configuration for a single argument.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgConfig {
    /// The name of the argument (used for the exported variable)
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    /// Short option character (e.g., 'v' for -v)
    pub short: Option<char>,
    /// Long option name without dashes (e.g., "verbose" for --verbose)
    pub long: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Default value if not provided; split into tokens for multi_value
    pub default: Option<String>,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub value_type: ValueType,
    /// Allowed raw values
    pub choices: Option<Vec<String>>,
    /// Leftover tokens with these prefixes are rejected (multi_value only)
    #[serde(default)]
    pub ignore_prefixes: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
}

impl ArgConfig {
    /// Get the effective long option for this argument.
    /// Returns the specified long option, or falls back to the argument name
    /// for named arguments that have no short option.
    pub fn effective_long(&self) -> Option<&str> {
        if self.long.is_some() {
            return self.long.as_deref();
        }
        if self.is_named() && self.short.is_none() {
            return Some(&self.name);
        }
        None
    }

    pub fn short_token(&self) -> Option<String> {
        self.short.map(|c| format!("-{}", c))
    }

    pub fn long_token(&self) -> Option<String> {
        self.effective_long().map(|l| format!("--{}", l))
    }

    pub fn is_named(&self) -> bool {
        matches!(self.arg_type, ArgType::Option | ArgType::Switch)
    }
}

/// Configuration for a verb.
#[derive(Debug, Clone, Deserialize)]
pub struct VerbConfig {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub args: Vec<ArgConfig>,
}

/// Top-level configuration for a script.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name of the script
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Exported variable prefix (default: "ARGBIND_")
    pub prefix: Option<String>,
    #[serde(default)]
    pub help_flag: HelpFlag,
    #[serde(default)]
    pub args: Vec<ArgConfig>,
    #[serde(default)]
    pub verbs: Vec<VerbConfig>,
}

impl Config {
    /// Parse a JSON string into a Config.
    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks that need the engine (predicate counts, dependency targets,
    /// token clashes) are left to schema building.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.args.is_empty() && !self.verbs.is_empty() {
            return Err(ConfigError::ArgsAndVerbs);
        }

        if let Some(short) = self.help_flag.short {
            if short.is_whitespace() || short == '-' {
                return Err(ConfigError::InvalidHelpFlag(short.to_string()));
            }
        }
        if let Some(long) = &self.help_flag.long {
            if !is_valid_long(long) {
                return Err(ConfigError::InvalidHelpFlag(long.clone()));
            }
        }

        Self::validate_args(&self.args, false)?;

        let mut verb_names = HashSet::new();
        for verb in &self.verbs {
            if !verb_names.insert(&verb.name) {
                return Err(ConfigError::DuplicateVerbName(verb.name.clone()));
            }
            Self::validate_args(&verb.args, true)?;
        }

        Ok(())
    }

    /// Validate one schema's arguments. With `in_verb`, `VERB` is taken by
    /// the selected verb's variable.
    fn validate_args(args: &[ArgConfig], in_verb: bool) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut variables: HashMap<String, &str> = HashMap::new();
        for arg in args {
            if !names.insert(&arg.name) {
                return Err(ConfigError::DuplicateName(arg.name.clone()));
            }

            let variable = to_shell_var_name(&arg.name);
            if in_verb && variable == "VERB" {
                return Err(ConfigError::ReservedVariable(arg.name.clone()));
            }
            if let Some(other) = variables.insert(variable.clone(), &arg.name) {
                return Err(ConfigError::VariableClash(
                    other.to_string(),
                    arg.name.clone(),
                    variable,
                ));
            }

            Self::validate_arg(arg)?;
        }
        Ok(())
    }

    /// Validate a single argument configuration.
    /// Named arguments without short or long use their name as the long option.
    fn validate_arg(arg: &ArgConfig) -> Result<(), ConfigError> {
        if let Some(short) = arg.short {
            if !short.is_ascii_alphanumeric() {
                return Err(ConfigError::InvalidShortOption(short.to_string()));
            }
        }

        if let Some(long) = arg.effective_long() {
            if !is_valid_long(long) {
                return Err(ConfigError::InvalidLongOption(long.to_string()));
            }
        }

        if !arg.is_named() && (arg.short.is_some() || arg.long.is_some()) {
            return Err(ConfigError::NamedPositional(arg.name.clone()));
        }

        if arg.arg_type == ArgType::Switch {
            if arg.choices.is_some() {
                return Err(ConfigError::NotAllowedOnSwitch(arg.name.clone(), "choices"));
            }
            if arg.value_type != ValueType::String {
                return Err(ConfigError::NotAllowedOnSwitch(arg.name.clone(), "value_type"));
            }
            if arg.default.is_some() {
                return Err(ConfigError::NotAllowedOnSwitch(arg.name.clone(), "default"));
            }
        }

        if !arg.ignore_prefixes.is_empty() && arg.arg_type != ArgType::MultiValue {
            return Err(ConfigError::IgnorePrefixesNotMulti(arg.name.clone()));
        }

        Self::validate_choices(arg)?;

        if !arg.dependencies.is_empty() {
            if arg.required {
                return Err(ConfigError::RequiredWithDependencies(arg.name.clone()));
            }
            for (idx, dependency) in arg.dependencies.iter().enumerate() {
                if dependency.target().is_none() {
                    return Err(ConfigError::InvalidPolarity(arg.name.clone(), idx + 1));
                }
            }
        }

        Ok(())
    }

    /// Validate choices field on an argument.
    fn validate_choices(arg: &ArgConfig) -> Result<(), ConfigError> {
        if let Some(ref choices) = arg.choices {
            if choices.is_empty() {
                return Err(ConfigError::EmptyChoices(arg.name.clone()));
            }

            let mut seen = HashSet::new();
            for choice in choices {
                if !seen.insert(choice) {
                    return Err(ConfigError::DuplicateChoice(
                        arg.name.clone(),
                        choice.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Get the effective prefix, using the default if none is set.
    pub fn effective_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    /// Name used in usage lines and error output.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("script")
    }
}
