//! Dispatch to one of several schemas by the first token.

use crate::error::{BuildError, ErrorCode, ParseError, ParseErrors};
use crate::parser::ParseResult;
use crate::schema::{HelpTokens, Schema, SlotInfo};
use crate::tokenizer::tokenize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Read-only description of a registered verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbInfo {
    pub name: String,
    pub help: String,
    pub slots: Vec<SlotInfo>,
}

/// A verb with its schema's target type erased behind the mapping to `R`.
trait Verb<R>: Send + Sync {
    fn info(&self) -> &VerbInfo;

    fn resolve(&self, tokens: &[String]) -> ParseResult<R>;
}

struct MappedVerb<T, F> {
    info: VerbInfo,
    schema: Schema<T>,
    map: F,
}

impl<T, R, F> Verb<R> for MappedVerb<T, F>
where
    T: Default,
    F: Fn(T) -> R + Send + Sync,
{
    fn info(&self) -> &VerbInfo {
        &self.info
    }

    fn resolve(&self, tokens: &[String]) -> ParseResult<R> {
        self.schema.resolve(tokens).map(&self.map)
    }
}

/// A frozen set of verbs, each resolving to a common result type `R`.
pub struct VerbSet<R> {
    name: String,
    verbs: Vec<Box<dyn Verb<R>>>,
    index: HashMap<String, usize>,
    help: Option<HelpTokens>,
}

impl<R> VerbSet<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verb metadata in registration order.
    pub fn verbs(&self) -> impl Iterator<Item = &VerbInfo> {
        self.verbs.iter().map(|verb| verb.info())
    }

    pub fn verb(&self, name: &str) -> Option<&VerbInfo> {
        self.index.get(name).map(|&idx| self.verbs[idx].info())
    }

    pub fn help_tokens(&self) -> Option<&HelpTokens> {
        self.help.as_ref()
    }

    /// Select a verb with the first token and resolve the rest with its schema.
    ///
    /// Errors from the selected schema carry the verb's name.
    pub fn parse<I, S>(&self, args: I) -> ParseResult<R>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.dispatch(&tokens)
    }

    pub fn parse_line(&self, line: &str) -> ParseResult<R> {
        let tokens: Vec<String> = tokenize(line).collect();
        self.dispatch(&tokens)
    }

    fn dispatch(&self, tokens: &[String]) -> ParseResult<R> {
        let Some((first, rest)) = tokens.split_first() else {
            return Err(ParseErrors::single(ParseError::new(
                ErrorCode::InvalidVerb,
                "no verb specified",
            )));
        };

        if self.help.as_ref().is_some_and(|help| help.matches(first)) {
            debug!(verbs = %self.name, "help requested");
            return Err(ParseErrors::single(ParseError::help_requested()));
        }

        let Some(&idx) = self.index.get(first.as_str()) else {
            debug!(verb = %first, "invalid verb");
            return Err(ParseErrors::single(ParseError::new(
                ErrorCode::InvalidVerb,
                format!("invalid verb: {}", first),
            )));
        };

        let verb = &self.verbs[idx];
        debug!(verb = %verb.info().name, "selected verb");
        verb.resolve(rest)
            .map_err(|errors| errors.in_verb(&verb.info().name))
    }
}

impl<R> fmt::Debug for VerbSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerbSet")
            .field("name", &self.name)
            .field("verbs", &self.verbs().collect::<Vec<_>>())
            .field("help", &self.help)
            .finish()
    }
}

/// Collects verbs and freezes them into a [`VerbSet`].
pub struct VerbSetBuilder<R> {
    name: String,
    verbs: Vec<Box<dyn Verb<R>>>,
    help: Option<HelpTokens>,
}

impl<R: 'static> VerbSetBuilder<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbs: Vec::new(),
            help: Some(HelpTokens::default()),
        }
    }

    /// Register a verb whose schema result is mapped into `R`.
    pub fn verb<T, F>(
        mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        schema: Schema<T>,
        map: F,
    ) -> Self
    where
        T: Default + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let info = VerbInfo {
            name: name.into(),
            help: help.into(),
            slots: schema.slots().cloned().collect(),
        };
        self.verbs.push(Box::new(MappedVerb { info, schema, map }));
        self
    }

    /// Replace the help tokens recognized in place of a verb.
    pub fn help_tokens(mut self, short: Option<&str>, long: Option<&str>) -> Self {
        self.help = Some(HelpTokens::new(short, long));
        self
    }

    pub fn without_help(mut self) -> Self {
        self.help = None;
        self
    }

    pub fn build(self) -> Result<VerbSet<R>, BuildError> {
        if self.verbs.is_empty() {
            return Err(BuildError::NoVerbs);
        }

        let mut index = HashMap::new();
        for (idx, verb) in self.verbs.iter().enumerate() {
            let info = verb.info();
            if info.help.trim().is_empty() {
                return Err(BuildError::MissingHelp(info.name.clone()));
            }
            if index.insert(info.name.clone(), idx).is_some() {
                return Err(BuildError::DuplicateVerb(info.name.clone()));
            }
        }

        Ok(VerbSet {
            name: self.name,
            verbs: self.verbs,
            index,
            help: self.help,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::schema::{MultiValueSlot, SchemaBuilder, Slot, SwitchSlot};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Add {
        path: String,
        force: bool,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Remove {
        paths: Vec<String>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Log {
        limit: i64,
    }

    #[derive(Debug, PartialEq)]
    enum Command {
        Add(Add),
        Remove(Remove),
        Log(Log),
    }

    fn add_schema() -> Schema<Add> {
        SchemaBuilder::new("add")
            .arg(
                Slot::value("path", field!(Add, path))
                    .help("Path to add")
                    .required(),
            )
            .switch(
                SwitchSlot::new("force", field!(Add, force))
                    .short("-f")
                    .help("Overwrite"),
            )
            .build()
            .unwrap()
    }

    fn remove_schema() -> Schema<Remove> {
        SchemaBuilder::new("rm")
            .multi_value(
                MultiValueSlot::new("paths", field!(Remove, paths))
                    .help("Paths to remove")
                    .required(),
            )
            .build()
            .unwrap()
    }

    fn log_schema() -> Schema<Log> {
        SchemaBuilder::new("log")
            .arg(
                Slot::option("limit", field!(Log, limit))
                    .short("-n")
                    .help("Entries to show")
                    .default_value(10)
                    .converter(|raw| raw.parse::<i64>()),
            )
            .build()
            .unwrap()
    }

    fn verbs() -> VerbSet<Command> {
        VerbSetBuilder::new("vcs")
            .verb("add", "Add a file", add_schema(), Command::Add)
            .verb("rm", "Remove files", remove_schema(), Command::Remove)
            .verb("log", "Show history", log_schema(), Command::Log)
            .build()
            .unwrap()
    }

    #[test]
    fn test_each_verb_dispatches_to_its_schema() {
        let verbs = verbs();
        assert_eq!(
            verbs.parse(["add", "-f", "a.txt"]).unwrap(),
            Command::Add(Add {
                path: "a.txt".to_string(),
                force: true
            })
        );
        assert_eq!(
            verbs.parse(["rm", "a", "b"]).unwrap(),
            Command::Remove(Remove {
                paths: vec!["a".to_string(), "b".to_string()]
            })
        );
        assert_eq!(
            verbs.parse_line("log -n 3").unwrap(),
            Command::Log(Log { limit: 3 })
        );
        assert_eq!(
            verbs.parse(["log"]).unwrap(),
            Command::Log(Log { limit: 10 })
        );
    }

    #[test]
    fn test_error_no_verb() {
        let errors = verbs().parse(Vec::<String>::new()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].code(), ErrorCode::InvalidVerb);
        assert_eq!(errors.errors()[0].message(), "no verb specified");
        assert_eq!(errors.verb(), None);
    }

    #[test]
    fn test_error_invalid_verb() {
        let errors = verbs().parse(["push", "origin"]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].message(), "invalid verb: push");
    }

    #[test]
    fn test_help_as_first_token_has_no_verb() {
        let errors = verbs().parse(["--help", "add"]).unwrap_err();
        assert!(errors.is_help_requested());
        assert_eq!(errors.verb(), None);
    }

    #[test]
    fn test_errors_carry_verb_name() {
        let errors = verbs().parse(["add"]).unwrap_err();
        assert_eq!(errors.verb(), Some("add"));
        assert_eq!(errors.errors()[0].code(), ErrorCode::MissingRequiredValue);

        let errors = verbs().parse(["log", "-?"]).unwrap_err();
        assert!(errors.is_help_requested());
        assert_eq!(errors.verb(), Some("log"));
    }

    #[test]
    fn test_metadata() {
        let verbs = verbs();
        let names: Vec<&str> = verbs.verbs().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["add", "rm", "log"]);
        assert_eq!(verbs.verb("rm").unwrap().slots.len(), 1);
        assert!(verbs.verb("push").is_none());
        assert_eq!(verbs.name(), "vcs");
    }

    #[test]
    fn test_build_errors() {
        let result = VerbSetBuilder::<Command>::new("vcs").build();
        assert!(matches!(result, Err(BuildError::NoVerbs)));

        let result = VerbSetBuilder::new("vcs")
            .verb("add", "Add", add_schema(), Command::Add)
            .verb("add", "Again", add_schema(), Command::Add)
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateVerb(name)) if name == "add"));

        let result = VerbSetBuilder::new("vcs")
            .verb("add", " ", add_schema(), Command::Add)
            .build();
        assert!(matches!(result, Err(BuildError::MissingHelp(name)) if name == "add"));
    }

    #[test]
    fn test_verb_set_is_send_and_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<VerbSet<Command>>();
    }
}
