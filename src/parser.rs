//! Resolution of command-line tokens against a [`Schema`].

use crate::convert::{ConversionFailure, FailureStage};
use crate::dependency::RulePolarity;
use crate::error::{ErrorCode, ParseError, ParseErrors};
use crate::schema::{Requiredness, Schema, SlotInfo, SlotKind};
use crate::tokenizer::tokenize;
use tracing::debug;

/// Result of resolving tokens: the populated target or every error found.
pub type ParseResult<T> = Result<T, ParseErrors>;

impl<T: Default> Schema<T> {
    /// Resolve pre-tokenized arguments.
    ///
    /// Returns a single `HelpRequested` error if a help token is present
    /// anywhere. Otherwise every token and every slot is checked and all
    /// errors are returned together.
    pub fn parse<I, S>(&self, args: I) -> ParseResult<T>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.resolve(&tokens)
    }

    /// Tokenize `line` (honoring quotes) and resolve the tokens.
    pub fn parse_line(&self, line: &str) -> ParseResult<T> {
        let tokens: Vec<String> = tokenize(line).collect();
        self.resolve(&tokens)
    }

    pub(crate) fn resolve(&self, tokens: &[String]) -> ParseResult<T> {
        if let Some(help) = &self.help {
            if tokens.iter().any(|token| help.matches(token)) {
                debug!(schema = %self.name, "help requested");
                return Err(ParseErrors::single(ParseError::help_requested()));
            }
        }

        let mut parser = Parser::new(self);
        parser.scan(tokens);
        parser.finish()
    }
}

/// Internal parser state.
struct Parser<'a, T> {
    schema: &'a Schema<T>,
    /// Raw tokens assigned to each slot; `None` when the slot never appeared.
    raw: Vec<Option<Vec<String>>>,
    errors: Vec<ParseError>,
    positional_index: usize,
}

impl<'a, T: Default> Parser<'a, T> {
    fn new(schema: &'a Schema<T>) -> Self {
        Self {
            schema,
            raw: vec![None; schema.slots.len()],
            errors: Vec::new(),
            positional_index: 0,
        }
    }

    /// Classify and assign every token in a single left-to-right pass.
    fn scan(&mut self, tokens: &[String]) {
        let mut tokens = tokens.iter();

        while let Some(token) = tokens.next() {
            let Some(&idx) = self.schema.names.get(token.as_str()) else {
                self.parse_positional(token);
                continue;
            };

            let info = self.schema.slots[idx].info();
            if info.kind == SlotKind::Switch {
                debug!(switch = %info.name, "matched switch");
                self.raw[idx] = Some(Vec::new());
                continue;
            }

            match tokens.next() {
                Some(value) => {
                    debug!(option = %info.name, %value, "matched option");
                    self.raw[idx] = Some(vec![value.clone()]);
                }
                None => self.errors.push(ParseError::new(
                    ErrorCode::MissingOptionValue,
                    format!("missing value for option: {}", token),
                )),
            }
        }
    }

    fn parse_positional(&mut self, token: &str) {
        if let Some(&idx) = self.schema.values.get(self.positional_index) {
            debug!(value = %self.schema.slots[idx].info().name, token, "matched value");
            self.raw[idx] = Some(vec![token.to_string()]);
            self.positional_index += 1;
            return;
        }

        if let Some(idx) = self.schema.multi {
            let info = self.schema.slots[idx].info();
            let ignored = info
                .ignored_prefixes
                .iter()
                .any(|prefix| token.starts_with(prefix.as_str()));
            if !ignored {
                self.raw[idx].get_or_insert_with(Vec::new).push(token.to_string());
                return;
            }
        }

        debug!(token, "unexpected argument");
        self.errors.push(ParseError::new(
            ErrorCode::UnexpectedArgument,
            format!("unexpected argument: {}", token),
        ));
    }

    /// Convert assigned values, substitute defaults, then check dependency rules.
    fn finish(mut self) -> ParseResult<T> {
        let schema = self.schema;
        let slots = &schema.slots;
        let mut target = T::default();
        let mut got_value = vec![false; slots.len()];
        let mut failed = vec![false; slots.len()];

        for (idx, slot) in slots.iter().enumerate() {
            let info = slot.info();
            match self.raw[idx].take() {
                Some(raw) => {
                    got_value[idx] = true;
                    if let Err(failure) = slot.bind(&mut target, &raw) {
                        failed[idx] = true;
                        self.errors.push(conversion_error(info, failure));
                    }
                }
                None if info.requiredness == Requiredness::Required => {
                    failed[idx] = true;
                    self.errors.push(missing_required(info));
                }
                None => slot.bind_default(&mut target),
            }
        }

        // Every slot now holds its final value; rules may read any of them.
        for (idx, slot) in slots.iter().enumerate() {
            if failed[idx] {
                continue;
            }
            let Some(dependencies) = slot.dependencies() else {
                continue;
            };
            let unresolved = |field: &str| {
                schema
                    .fields
                    .get(field)
                    .is_some_and(|&other| failed[other])
            };
            if let Some(rule) = dependencies.evaluate(&target, got_value[idx], unresolved) {
                debug!(slot = %slot.info().name, field = rule.field(), "dependency violated");
                let code = match rule.polarity() {
                    RulePolarity::Required => ErrorCode::DependencyRequired,
                    RulePolarity::MustNotAppear => ErrorCode::DependencyMustNotAppear,
                };
                self.errors.push(ParseError::new(code, rule.message()));
            }
        }

        match ParseErrors::from_vec(self.errors) {
            Some(errors) => Err(errors),
            None => Ok(target),
        }
    }
}

fn missing_required(info: &SlotInfo) -> ParseError {
    let code = match info.kind {
        SlotKind::Value => ErrorCode::MissingRequiredValue,
        SlotKind::Option => ErrorCode::MissingRequiredOption,
        SlotKind::Switch => ErrorCode::MissingRequiredSwitch,
        SlotKind::MultiValue => ErrorCode::MissingRequiredMultiValue,
    };
    ParseError::new(
        code,
        format!(
            "missing required {}: {}",
            info.kind.noun(),
            info.display_name()
        ),
    )
}

fn conversion_error(info: &SlotInfo, failure: ConversionFailure) -> ParseError {
    let code = match (info.kind, failure.stage) {
        (SlotKind::Value, FailureStage::Conversion) => ErrorCode::ValueFailedConversion,
        (SlotKind::Value, FailureStage::Validation) => ErrorCode::ValueFailedValidation,
        (SlotKind::MultiValue, FailureStage::Conversion) => ErrorCode::MultiValueFailedConversion,
        (SlotKind::MultiValue, FailureStage::Validation) => ErrorCode::MultiValueFailedValidation,
        // switches never convert; they share the option codes
        (_, FailureStage::Conversion) => ErrorCode::OptionFailedConversion,
        (_, FailureStage::Validation) => ErrorCode::OptionFailedValidation,
    };
    let message = format!(
        "invalid value '{}' for {}: {}",
        failure.raw,
        info.display_name(),
        failure.message
    );
    match failure.cause {
        Some(cause) => ParseError::with_cause(code, message, cause),
        None => ParseError::new(code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{DependencySet, Rule};
    use crate::field;
    use crate::schema::{MultiValueSlot, SchemaBuilder, Slot, SwitchSlot};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Args {
        input: String,
        output: Option<String>,
        count: u32,
        verbose: bool,
        files: Vec<String>,
    }

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    fn builder() -> SchemaBuilder<Args> {
        SchemaBuilder::new("test")
            .arg(Slot::value("input", field!(Args, input)).help("Input file"))
            .arg(
                Slot::option("output", field!(Args, output))
                    .short("-o")
                    .long("--output")
                    .help("Output file"),
            )
            .arg(
                Slot::option("count", field!(Args, count))
                    .short("-c")
                    .long("--count")
                    .help("Repeat count")
                    .default_value(1)
                    .converter(|raw| raw.parse::<u32>()),
            )
            .switch(
                SwitchSlot::new("verbose", field!(Args, verbose))
                    .short("-v")
                    .long("--verbose")
                    .help("Verbose output"),
            )
    }

    fn codes(result: ParseResult<Args>) -> Vec<ErrorCode> {
        result
            .unwrap_err()
            .errors()
            .iter()
            .map(|e| e.code())
            .collect()
    }

    #[test]
    fn test_parse_switch_long() {
        let schema = builder().build().unwrap();
        let result = schema.parse(args(&["--verbose"])).unwrap();
        assert!(result.verbose);
    }

    #[test]
    fn test_parse_switch_default_false() {
        let schema = builder().build().unwrap();
        let result = schema.parse(args(&[])).unwrap();
        assert!(!result.verbose);
        assert_eq!(result.count, 1);
        assert_eq!(result.output, None);
    }

    #[test]
    fn test_parse_option_short_and_long() {
        let schema = builder().build().unwrap();
        let result = schema.parse(args(&["-o", "file.txt"])).unwrap();
        assert_eq!(result.output, Some("file.txt".to_string()));
        let result = schema.parse(args(&["--count", "7"])).unwrap();
        assert_eq!(result.count, 7);
    }

    #[test]
    fn test_repeated_option_keeps_last_value() {
        let schema = builder().build().unwrap();
        let result = schema.parse(args(&["-c", "2", "--count", "5"])).unwrap();
        assert_eq!(result.count, 5);
    }

    #[test]
    fn test_parse_mixed_args_in_any_order() {
        let schema = builder().build().unwrap();
        let expected = Args {
            input: "v".to_string(),
            output: Some("x".to_string()),
            count: 1,
            verbose: true,
            files: vec![],
        };
        assert_eq!(schema.parse(["v", "-o", "x", "-v"]).unwrap(), expected);
        assert_eq!(schema.parse(["-v", "-o", "x", "v"]).unwrap(), expected);
        assert_eq!(schema.parse(["-o", "x", "v", "-v"]).unwrap(), expected);
    }

    #[test]
    fn test_option_value_may_look_like_a_name() {
        let schema = builder().build().unwrap();
        let result = schema.parse(args(&["-o", "-v"])).unwrap();
        assert_eq!(result.output, Some("-v".to_string()));
        assert!(!result.verbose);
    }

    #[test]
    fn test_error_missing_option_value() {
        let schema = builder().build().unwrap();
        let errors = schema.parse(args(&["in", "--output"])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].code(), ErrorCode::MissingOptionValue);
        assert_eq!(
            errors.errors()[0].message(),
            "missing value for option: --output"
        );
    }

    #[test]
    fn test_error_unexpected_arguments_are_all_reported() {
        let schema = builder().build().unwrap();
        let errors = schema.parse(args(&["in", "extra", "--unknown"])).unwrap_err();
        let messages: Vec<&str> = errors.errors().iter().map(|e| e.message()).collect();
        assert_eq!(
            messages,
            vec!["unexpected argument: extra", "unexpected argument: --unknown"]
        );
    }

    #[test]
    fn test_unknown_named_token_fills_value_slot() {
        let schema = builder().build().unwrap();
        let result = schema.parse(args(&["--unknown"])).unwrap();
        assert_eq!(result.input, "--unknown");
    }

    #[test]
    fn test_error_missing_required() {
        let schema = SchemaBuilder::new("test")
            .arg(
                Slot::value("input", field!(Args, input))
                    .help("Input file")
                    .required(),
            )
            .arg(
                Slot::option("output", field!(Args, output))
                    .long("--output")
                    .help("Output file")
                    .required(),
            )
            .build()
            .unwrap();
        let errors = schema.parse(args(&[])).unwrap_err();
        assert_eq!(
            errors
                .errors()
                .iter()
                .map(|e| (e.code(), e.message()))
                .collect::<Vec<_>>(),
            vec![
                (ErrorCode::MissingRequiredValue, "missing required value: input"),
                (
                    ErrorCode::MissingRequiredOption,
                    "missing required option: --output"
                ),
            ]
        );
    }

    #[test]
    fn test_error_conversion_failure_keeps_cause() {
        let schema = builder().build().unwrap();
        let errors = schema.parse(args(&["-c", "many"])).unwrap_err();
        let error = &errors.errors()[0];
        assert_eq!(error.code(), ErrorCode::OptionFailedConversion);
        assert_eq!(
            error.message(),
            "invalid value 'many' for --count: invalid digit found in string"
        );
        assert!(error.cause().is_some());
    }

    #[test]
    fn test_error_validation_failure() {
        let schema = SchemaBuilder::new("test")
            .arg(
                Slot::value("input", field!(Args, input))
                    .help("Input file")
                    .validator(|raw| (!raw.ends_with(".txt")).then(|| "expected a .txt file".into())),
            )
            .build()
            .unwrap();
        assert_eq!(
            codes(schema.parse(args(&["in.csv"]))),
            vec![ErrorCode::ValueFailedValidation]
        );
        assert_eq!(schema.parse(args(&["in.txt"])).unwrap().input, "in.txt");
    }

    #[test]
    fn test_errors_from_both_phases_are_aggregated() {
        let schema = builder().build().unwrap();
        assert_eq!(
            codes(schema.parse(args(&["in", "stray", "-c", "x"]))),
            vec![
                ErrorCode::UnexpectedArgument,
                ErrorCode::OptionFailedConversion
            ]
        );
    }

    #[test]
    fn test_help_short_circuits() {
        let schema = builder().build().unwrap();
        let errors = schema.parse(args(&["stray", "more", "-c", "x", "--help"])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].code(), ErrorCode::HelpRequested);
        assert_eq!(errors.errors()[0].message(), "");

        let errors = schema.parse(args(&["-?"])).unwrap_err();
        assert!(errors.is_help_requested());
    }

    #[test]
    fn test_custom_and_disabled_help_tokens() {
        let schema = builder().help_tokens(Some("-h"), None).build().unwrap();
        assert!(schema.parse(args(&["-h"])).unwrap_err().is_help_requested());
        assert_eq!(schema.parse(args(&["--help"])).unwrap().input, "--help");

        let schema = builder().without_help().build().unwrap();
        assert_eq!(schema.parse(args(&["-?"])).unwrap().input, "-?");
    }

    #[test]
    fn test_multi_value_absorbs_leftovers() {
        let schema = builder()
            .multi_value(
                MultiValueSlot::new("files", field!(Args, files))
                    .help("Extra files")
                    .ignore_prefix("-"),
            )
            .build()
            .unwrap();
        let result = schema.parse(args(&["in", "a", "-v", "b"])).unwrap();
        assert_eq!(result.input, "in");
        assert_eq!(result.files, vec!["a", "b"]);
        assert!(result.verbose);

        let errors = schema.parse(args(&["in", "a", "-x"])).unwrap_err();
        assert_eq!(errors.errors()[0].message(), "unexpected argument: -x");
    }

    #[test]
    fn test_multi_value_element_failure() {
        #[derive(Debug, Default)]
        struct Numbers {
            values: Vec<i64>,
        }
        let schema = SchemaBuilder::new("sum")
            .multi_value(
                MultiValueSlot::new("values", field!(Numbers, values))
                    .help("Numbers to sum")
                    .required()
                    .converter(|raw| raw.parse::<i64>()),
            )
            .build()
            .unwrap();
        assert_eq!(schema.parse(["1", "2", "3"]).unwrap().values, vec![1, 2, 3]);

        let errors = schema.parse(["1", "two", "three"]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.errors()[0].code(),
            ErrorCode::MultiValueFailedConversion
        );
        assert!(errors.errors()[0].message().starts_with("invalid value 'two'"));

        let errors = schema.parse(Vec::<String>::new()).unwrap_err();
        assert_eq!(
            errors.errors()[0].code(),
            ErrorCode::MissingRequiredMultiValue
        );
    }

    #[test]
    fn test_dependency_sees_defaulted_values() {
        let schema = builder()
            .arg(
                Slot::option("files", field!(Args, files))
                    .long("--files")
                    .help("Comma separated files")
                    .converter(|raw| -> Result<Vec<String>, String> {
                        Ok(raw.split(',').map(str::to_string).collect())
                    })
                    .dependencies(
                        DependencySet::new()
                            .rule(Rule::required_if(field!(Args, count)).is_equal_to(1)),
                    ),
            )
            .build()
            .unwrap();
        // count defaults to 1, so --files becomes required
        let errors = schema.parse(args(&["in"])).unwrap_err();
        assert_eq!(errors.errors()[0].code(), ErrorCode::DependencyRequired);
        assert_eq!(
            errors.errors()[0].message(),
            "--files is required because of the value of count"
        );
        assert!(schema.parse(args(&["in", "-c", "2"])).is_ok());
        assert!(schema.parse(args(&["in", "--files", "a,b"])).is_ok());
    }

    #[test]
    fn test_dependency_skipped_when_field_failed() {
        let schema = builder()
            .arg(
                Slot::option("files", field!(Args, files))
                    .long("--files")
                    .help("Comma separated files")
                    .converter(|raw| -> Result<Vec<String>, String> {
                        Ok(vec![raw.to_string()])
                    })
                    .dependencies(
                        DependencySet::new()
                            .rule(Rule::required_if(field!(Args, count)).when(|_| true)),
                    ),
            )
            .build()
            .unwrap();
        assert_eq!(
            codes(schema.parse(args(&["in", "-c", "bad"]))),
            vec![ErrorCode::OptionFailedConversion]
        );
    }

    #[test]
    fn test_parse_line_uses_tokenizer() {
        let schema = builder().build().unwrap();
        let result = schema.parse_line("\"my input\" -o 'out file' -v").unwrap();
        assert_eq!(result.input, "my input");
        assert_eq!(result.output, Some("out file".to_string()));
        assert!(result.verbose);
    }

    #[test]
    fn test_schema_serves_concurrent_parses() {
        let schema = std::sync::Arc::new(builder().build().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let schema = std::sync::Arc::clone(&schema);
                std::thread::spawn(move || {
                    let count = i.to_string();
                    schema.parse(["in", "-c", count.as_str()]).unwrap().count
                })
            })
            .collect();
        let mut counts: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        counts.sort();
        assert_eq!(counts, vec![0, 1, 2, 3]);
    }
}
