//! Slot descriptors and the builder that freezes them into a [`Schema`].

use crate::convert::{self, Accumulator, ConversionFailure, Converter, Pipeline, Validator};
use crate::dependency::DependencySet;
use crate::error::{BoxError, BuildError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default short help token.
pub const DEFAULT_HELP_SHORT: &str = "-?";
/// Default long help token.
pub const DEFAULT_HELP_LONG: &str = "--help";

/// Typed accessor for one field of the result type `T`.
///
/// The name identifies the field for dependency rules. Use the [`field!`]
/// macro for plain struct fields.
///
/// [`field!`]: crate::field
pub struct Field<T, V> {
    name: String,
    get: Arc<dyn Fn(&T) -> V + Send + Sync>,
    set: Arc<dyn Fn(&mut T, V) + Send + Sync>,
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T, V> Field<T, V> {
    pub fn new<G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, target: &T) -> V {
        (self.get)(target)
    }

    pub fn set(&self, target: &mut T, value: V) {
        (self.set)(target, value)
    }
}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Build a [`Field`] for a named struct field: `field!(Args, output)`.
#[macro_export]
macro_rules! field {
    ($ty:ty, $name:ident) => {
        $crate::Field::new(
            stringify!($name),
            |target: &$ty| target.$name.clone(),
            |target: &mut $ty, value| target.$name = value,
        )
    };
}

/// The four kinds of argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Positional, matched by declaration order.
    Value,
    /// Named, consumes the following token.
    Option,
    /// Named, consumes nothing.
    Switch,
    /// Catch-all for positional tokens left over.
    MultiValue,
}

impl SlotKind {
    pub fn is_named(self) -> bool {
        matches!(self, SlotKind::Option | SlotKind::Switch)
    }

    pub(crate) fn noun(self) -> &'static str {
        match self {
            SlotKind::Value => "value",
            SlotKind::Option => "option",
            SlotKind::Switch => "switch",
            SlotKind::MultiValue => "values",
        }
    }
}

/// Whether a slot must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requiredness {
    Required,
    #[default]
    Optional,
    /// Decided by the slot's dependency rules after all slots are assigned.
    HasDependencies,
}

/// Read-only description of a slot, for help rendering and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub kind: SlotKind,
    pub name: String,
    pub help: String,
    pub short: Option<String>,
    pub long: Option<String>,
    pub requiredness: Requiredness,
    /// Name of the bound field.
    pub field: String,
    pub ignored_prefixes: Vec<String>,
    pub has_default: bool,
}

impl SlotInfo {
    fn new(kind: SlotKind, name: impl Into<String>, field: &str) -> Self {
        Self {
            kind,
            name: name.into(),
            help: String::new(),
            short: None,
            long: None,
            requiredness: Requiredness::Optional,
            field: field.to_string(),
            ignored_prefixes: Vec::new(),
            has_default: false,
        }
    }

    /// Tokens that select this slot on the command line.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.short.iter().chain(self.long.iter()).map(String::as_str)
    }

    /// The name used in error messages: the long token, then the short
    /// token, then the declared name.
    pub fn display_name(&self) -> &str {
        self.long
            .as_deref()
            .or(self.short.as_deref())
            .unwrap_or(&self.name)
    }
}

/// A slot with its value type erased, as stored in a [`Schema`].
pub(crate) trait Binding<T>: Send + Sync {
    fn info(&self) -> &SlotInfo;

    /// Convert `raw` and store it in `target`.
    fn bind(&self, target: &mut T, raw: &[String]) -> Result<(), ConversionFailure>;

    /// Store the declared default, if any.
    fn bind_default(&self, target: &mut T);

    fn dependencies(&self) -> Option<&DependencySet<T>>;

    fn dependencies_mut(&mut self) -> Option<&mut DependencySet<T>>;
}

/// Settings shared by every slot builder.
struct SlotCommon<T> {
    info: SlotInfo,
    validator: Option<Validator>,
    dependencies: Option<DependencySet<T>>,
}

impl<T> SlotCommon<T> {
    fn new(kind: SlotKind, name: impl Into<String>, field: &str) -> Self {
        Self {
            info: SlotInfo::new(kind, name, field),
            validator: None,
            dependencies: None,
        }
    }

    fn required(&mut self) {
        self.info.requiredness = Requiredness::Required;
        self.dependencies = None;
    }

    fn optional(&mut self) {
        self.info.requiredness = Requiredness::Optional;
        self.dependencies = None;
    }

    fn dependencies(&mut self, set: DependencySet<T>) {
        self.info.requiredness = Requiredness::HasDependencies;
        self.dependencies = Some(set);
    }
}

fn boxed_converter<V, F, E>(converter: F) -> Converter<V>
where
    V: 'static,
    F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    Arc::new(move |raw: &str| -> Result<V, BoxError> { converter(raw).map_err(Into::into) })
}

fn boxed_validator<F>(validator: F) -> Validator
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    Arc::new(validator)
}

/// A single-valued slot: a positional value or a named option.
pub struct Slot<T, V> {
    common: SlotCommon<T>,
    field: Field<T, V>,
    default: Option<V>,
    converter: Option<Converter<V>>,
}

impl<T: 'static, V: Clone + Send + Sync + 'static> Slot<T, V> {
    /// A positional slot, filled in declaration order.
    pub fn value(name: impl Into<String>, field: Field<T, V>) -> Self {
        Self::new(SlotKind::Value, name, field)
    }

    /// A named slot; give it at least one of [`short`](Self::short) or
    /// [`long`](Self::long).
    pub fn option(name: impl Into<String>, field: Field<T, V>) -> Self {
        Self::new(SlotKind::Option, name, field)
    }

    fn new(kind: SlotKind, name: impl Into<String>, field: Field<T, V>) -> Self {
        Self {
            common: SlotCommon::new(kind, name, field.name()),
            field,
            default: None,
            converter: None,
        }
    }

    /// Exact short token, e.g. `-o`.
    pub fn short(mut self, token: impl Into<String>) -> Self {
        self.common.info.short = Some(token.into());
        self
    }

    /// Exact long token, e.g. `--output`.
    pub fn long(mut self, token: impl Into<String>) -> Self {
        self.common.info.long = Some(token.into());
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.common.info.help = text.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.common.required();
        self
    }

    pub fn optional(mut self) -> Self {
        self.common.optional();
        self
    }

    /// Value stored when the slot is absent.
    pub fn default_value(mut self, value: V) -> Self {
        self.default = Some(value);
        self.common.info.has_default = true;
        self
    }

    /// Make requiredness depend on other slots' values.
    pub fn dependencies(mut self, set: DependencySet<T>) -> Self {
        self.common.dependencies(set);
        self
    }

    pub fn converter<F, E>(mut self, converter: F) -> Self
    where
        F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        self.converter = Some(boxed_converter(converter));
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.common.validator = Some(boxed_validator(validator));
        self
    }

    pub fn info(&self) -> &SlotInfo {
        &self.common.info
    }

    pub(crate) fn into_binding(self) -> Result<Box<dyn Binding<T>>, BuildError> {
        let pipeline = Pipeline::resolve(self.converter, self.common.validator)
            .ok_or_else(|| BuildError::MissingConverter(self.common.info.name.clone()))?;
        Ok(Box::new(ScalarBinding {
            info: self.common.info,
            field: self.field,
            default: self.default,
            pipeline,
            dependencies: self.common.dependencies,
        }))
    }
}

struct ScalarBinding<T, V> {
    info: SlotInfo,
    field: Field<T, V>,
    default: Option<V>,
    pipeline: Pipeline<V>,
    dependencies: Option<DependencySet<T>>,
}

impl<T, V> Binding<T> for ScalarBinding<T, V>
where
    T: 'static,
    V: Clone + Send + Sync + 'static,
{
    fn info(&self) -> &SlotInfo {
        &self.info
    }

    fn bind(&self, target: &mut T, raw: &[String]) -> Result<(), ConversionFailure> {
        // a repeated option keeps its last value
        let token = raw.last().map(String::as_str).unwrap_or_default();
        let value = self.pipeline.convert(token).into_result()?;
        self.field.set(target, value);
        Ok(())
    }

    fn bind_default(&self, target: &mut T) {
        if let Some(default) = &self.default {
            self.field.set(target, default.clone());
        }
    }

    fn dependencies(&self) -> Option<&DependencySet<T>> {
        self.dependencies.as_ref()
    }

    fn dependencies_mut(&mut self) -> Option<&mut DependencySet<T>> {
        self.dependencies.as_mut()
    }
}

/// A named boolean slot that takes no value token.
pub struct SwitchSlot<T> {
    common: SlotCommon<T>,
    field: Field<T, bool>,
    default: Option<bool>,
}

impl<T: 'static> SwitchSlot<T> {
    pub fn new(name: impl Into<String>, field: Field<T, bool>) -> Self {
        Self {
            common: SlotCommon::new(SlotKind::Switch, name, field.name()),
            field,
            default: None,
        }
    }

    pub fn short(mut self, token: impl Into<String>) -> Self {
        self.common.info.short = Some(token.into());
        self
    }

    pub fn long(mut self, token: impl Into<String>) -> Self {
        self.common.info.long = Some(token.into());
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.common.info.help = text.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.common.required();
        self
    }

    pub fn default_value(mut self, value: bool) -> Self {
        self.default = Some(value);
        self.common.info.has_default = true;
        self
    }

    pub fn dependencies(mut self, set: DependencySet<T>) -> Self {
        self.common.dependencies(set);
        self
    }

    pub fn info(&self) -> &SlotInfo {
        &self.common.info
    }

    pub(crate) fn into_binding(self) -> Box<dyn Binding<T>> {
        Box::new(SwitchBinding {
            info: self.common.info,
            field: self.field,
            default: self.default,
            dependencies: self.common.dependencies,
        })
    }
}

struct SwitchBinding<T> {
    info: SlotInfo,
    field: Field<T, bool>,
    default: Option<bool>,
    dependencies: Option<DependencySet<T>>,
}

impl<T: 'static> Binding<T> for SwitchBinding<T> {
    fn info(&self) -> &SlotInfo {
        &self.info
    }

    fn bind(&self, target: &mut T, _raw: &[String]) -> Result<(), ConversionFailure> {
        self.field.set(target, true);
        Ok(())
    }

    fn bind_default(&self, target: &mut T) {
        if let Some(default) = self.default {
            self.field.set(target, default);
        }
    }

    fn dependencies(&self) -> Option<&DependencySet<T>> {
        self.dependencies.as_ref()
    }

    fn dependencies_mut(&mut self) -> Option<&mut DependencySet<T>> {
        self.dependencies.as_mut()
    }
}

/// The catch-all slot: converts each leftover positional token to `E` and
/// folds them into `C`.
pub struct MultiValueSlot<T, E, C> {
    common: SlotCommon<T>,
    field: Field<T, C>,
    default: Option<C>,
    converter: Option<Converter<E>>,
    accumulator: Accumulator<E, C>,
}

impl<T, E, C> MultiValueSlot<T, E, C>
where
    T: 'static,
    E: 'static,
    C: FromIterator<E> + Clone + Send + Sync + 'static,
{
    /// A slot collecting its elements with `FromIterator`.
    pub fn new(name: impl Into<String>, field: Field<T, C>) -> Self {
        Self::with_accumulator(name, field, convert::collect())
    }
}

impl<T, E, C> MultiValueSlot<T, E, C>
where
    T: 'static,
    E: 'static,
    C: Clone + Send + Sync + 'static,
{
    /// A slot folding its elements with a custom accumulator.
    pub fn with_accumulator(
        name: impl Into<String>,
        field: Field<T, C>,
        accumulator: Accumulator<E, C>,
    ) -> Self {
        Self {
            common: SlotCommon::new(SlotKind::MultiValue, name, field.name()),
            field,
            default: None,
            converter: None,
            accumulator,
        }
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.common.info.help = text.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.common.required();
        self
    }

    pub fn default_value(mut self, value: C) -> Self {
        self.default = Some(value);
        self.common.info.has_default = true;
        self
    }

    /// Tokens starting with `prefix` are reported as unexpected instead of
    /// being absorbed.
    pub fn ignore_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.common.info.ignored_prefixes.push(prefix.into());
        self
    }

    pub fn dependencies(mut self, set: DependencySet<T>) -> Self {
        self.common.dependencies(set);
        self
    }

    /// Converter applied to each element.
    pub fn converter<F, Err>(mut self, converter: F) -> Self
    where
        F: Fn(&str) -> Result<E, Err> + Send + Sync + 'static,
        Err: Into<BoxError> + 'static,
    {
        self.converter = Some(boxed_converter(converter));
        self
    }

    /// Validator applied to each element before conversion.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.common.validator = Some(boxed_validator(validator));
        self
    }

    pub fn info(&self) -> &SlotInfo {
        &self.common.info
    }

    pub(crate) fn into_binding(self) -> Result<Box<dyn Binding<T>>, BuildError> {
        let pipeline = Pipeline::resolve(self.converter, self.common.validator)
            .ok_or_else(|| BuildError::MissingConverter(self.common.info.name.clone()))?;
        Ok(Box::new(MultiBinding {
            info: self.common.info,
            field: self.field,
            default: self.default,
            pipeline,
            accumulator: self.accumulator,
            dependencies: self.common.dependencies,
        }))
    }
}

struct MultiBinding<T, E, C> {
    info: SlotInfo,
    field: Field<T, C>,
    default: Option<C>,
    pipeline: Pipeline<E>,
    accumulator: Accumulator<E, C>,
    dependencies: Option<DependencySet<T>>,
}

impl<T, E, C> Binding<T> for MultiBinding<T, E, C>
where
    T: 'static,
    E: 'static,
    C: Clone + Send + Sync + 'static,
{
    fn info(&self) -> &SlotInfo {
        &self.info
    }

    fn bind(&self, target: &mut T, raw: &[String]) -> Result<(), ConversionFailure> {
        let elements = self.pipeline.convert_all(raw).into_result()?;
        self.field.set(target, (self.accumulator)(elements));
        Ok(())
    }

    fn bind_default(&self, target: &mut T) {
        if let Some(default) = &self.default {
            self.field.set(target, default.clone());
        }
    }

    fn dependencies(&self) -> Option<&DependencySet<T>> {
        self.dependencies.as_ref()
    }

    fn dependencies_mut(&mut self) -> Option<&mut DependencySet<T>> {
        self.dependencies.as_mut()
    }
}

/// The reserved tokens that short-circuit a parse with a help request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpTokens {
    pub short: Option<String>,
    pub long: Option<String>,
}

impl HelpTokens {
    pub fn new(short: Option<&str>, long: Option<&str>) -> Self {
        Self {
            short: short.map(str::to_string),
            long: long.map(str::to_string),
        }
    }

    pub fn matches(&self, token: &str) -> bool {
        self.short.as_deref() == Some(token) || self.long.as_deref() == Some(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.short.iter().chain(self.long.iter()).map(String::as_str)
    }
}

impl Default for HelpTokens {
    fn default() -> Self {
        Self::new(Some(DEFAULT_HELP_SHORT), Some(DEFAULT_HELP_LONG))
    }
}

/// An immutable, validated set of slots for one command.
///
/// A schema is built once and may serve any number of concurrent parses;
/// see [`Schema::parse`].
pub struct Schema<T> {
    pub(crate) name: String,
    pub(crate) slots: Vec<Box<dyn Binding<T>>>,
    /// Value slot indices in declaration order.
    pub(crate) values: Vec<usize>,
    pub(crate) multi: Option<usize>,
    /// Short and long tokens of named slots.
    pub(crate) names: HashMap<String, usize>,
    /// Bound field names.
    pub(crate) fields: HashMap<String, usize>,
    pub(crate) help: Option<HelpTokens>,
}

impl<T> Schema<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot metadata in declaration order.
    pub fn slots(&self) -> impl Iterator<Item = &SlotInfo> {
        self.slots.iter().map(|slot| slot.info())
    }

    pub fn help_tokens(&self) -> Option<&HelpTokens> {
        self.help.as_ref()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("slots", &self.slots().collect::<Vec<_>>())
            .field("help", &self.help)
            .finish()
    }
}

/// Collects slots and freezes them into a [`Schema`] with [`build`](Self::build).
pub struct SchemaBuilder<T> {
    name: String,
    slots: Vec<Box<dyn Binding<T>>>,
    help: Option<HelpTokens>,
    errors: Vec<BuildError>,
}

impl<T: 'static> SchemaBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            help: Some(HelpTokens::default()),
            errors: Vec::new(),
        }
    }

    /// Add a value or option slot.
    pub fn arg<V: Clone + Send + Sync + 'static>(mut self, slot: Slot<T, V>) -> Self {
        match slot.into_binding() {
            Ok(binding) => self.slots.push(binding),
            Err(err) => self.errors.push(err),
        }
        self
    }

    pub fn switch(mut self, slot: SwitchSlot<T>) -> Self {
        self.slots.push(slot.into_binding());
        self
    }

    pub fn multi_value<E, C>(mut self, slot: MultiValueSlot<T, E, C>) -> Self
    where
        E: 'static,
        C: Clone + Send + Sync + 'static,
    {
        match slot.into_binding() {
            Ok(binding) => self.slots.push(binding),
            Err(err) => self.errors.push(err),
        }
        self
    }

    /// Replace the reserved help tokens.
    pub fn help_tokens(mut self, short: Option<&str>, long: Option<&str>) -> Self {
        self.help = Some(HelpTokens::new(short, long));
        self
    }

    /// Disable the help short-circuit entirely.
    pub fn without_help(mut self) -> Self {
        self.help = None;
        self
    }

    /// Validate the slots and freeze them.
    pub fn build(self) -> Result<Schema<T>, BuildError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        if self.slots.is_empty() {
            return Err(BuildError::EmptySchema(self.name));
        }

        let mut slots = self.slots;
        let mut values = Vec::new();
        let mut multi: Option<usize> = None;
        let mut names = HashMap::new();
        let mut fields = HashMap::new();

        let reserved: Vec<&str> = self.help.iter().flat_map(HelpTokens::tokens).collect();

        for (idx, slot) in slots.iter().enumerate() {
            let info = slot.info();
            if info.help.trim().is_empty() {
                return Err(BuildError::MissingHelp(info.name.clone()));
            }
            match info.kind {
                SlotKind::Value => values.push(idx),
                SlotKind::MultiValue => {
                    if let Some(first) = multi {
                        return Err(BuildError::MultipleMultiValues(
                            slots[first].info().name.clone(),
                            info.name.clone(),
                        ));
                    }
                    multi = Some(idx);
                }
                SlotKind::Option | SlotKind::Switch => {
                    if info.short.is_none() && info.long.is_none() {
                        return Err(BuildError::MissingName(info.name.clone()));
                    }
                    for token in info.tokens() {
                        if reserved.contains(&token)
                            || names.insert(token.to_string(), idx).is_some()
                        {
                            return Err(BuildError::DuplicateName(token.to_string()));
                        }
                    }
                }
            }
            fields.entry(info.field.clone()).or_insert(idx);
        }
        for slot in &mut slots {
            let owner = slot.info().display_name().to_string();
            let own_field = slot.info().field.clone();
            if let Some(set) = slot.dependencies_mut() {
                set.finalize(&owner, &own_field, &fields)?;
            }
        }

        Ok(Schema {
            name: self.name,
            slots,
            values,
            multi,
            names,
            fields,
            help: self.help,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Rule;
    use crate::field;

    #[derive(Debug, Default, Clone)]
    struct Args {
        input: String,
        count: u32,
        verbose: bool,
        files: Vec<String>,
    }

    fn input() -> Slot<Args, String> {
        Slot::value("input", field!(Args, input)).help("Input file")
    }

    fn count() -> Slot<Args, u32> {
        Slot::option("count", field!(Args, count))
            .short("-c")
            .long("--count")
            .help("How many")
            .converter(|raw| raw.parse::<u32>())
    }

    #[test]
    fn test_build_collects_metadata() {
        let schema = SchemaBuilder::new("tool")
            .arg(input().required())
            .arg(count().default_value(3))
            .switch(
                SwitchSlot::new("verbose", field!(Args, verbose))
                    .short("-v")
                    .help("Chatty"),
            )
            .multi_value(
                MultiValueSlot::new("files", field!(Args, files))
                    .help("Files")
                    .ignore_prefix("-"),
            )
            .build()
            .unwrap();

        let infos: Vec<&SlotInfo> = schema.slots().collect();
        assert_eq!(infos.len(), 4);
        assert_eq!(infos[0].kind, SlotKind::Value);
        assert_eq!(infos[0].requiredness, Requiredness::Required);
        assert_eq!(infos[1].display_name(), "--count");
        assert!(infos[1].has_default);
        assert_eq!(infos[2].display_name(), "-v");
        assert_eq!(infos[3].ignored_prefixes, vec!["-".to_string()]);
        assert_eq!(schema.help_tokens(), Some(&HelpTokens::default()));
        assert_eq!(schema.name(), "tool");
    }

    #[test]
    fn test_error_on_empty_schema() {
        let result = SchemaBuilder::<Args>::new("empty").build();
        assert!(matches!(result, Err(BuildError::EmptySchema(name)) if name == "empty"));
    }

    #[test]
    fn test_error_on_missing_help() {
        let result = SchemaBuilder::new("tool")
            .arg(Slot::value("input", field!(Args, input)))
            .build();
        assert!(matches!(result, Err(BuildError::MissingHelp(name)) if name == "input"));
    }

    #[test]
    fn test_error_on_missing_converter() {
        let result = SchemaBuilder::new("tool")
            .arg(
                Slot::option("count", field!(Args, count))
                    .long("--count")
                    .help("How many"),
            )
            .build();
        assert!(matches!(result, Err(BuildError::MissingConverter(name)) if name == "count"));
    }

    #[test]
    fn test_error_on_duplicate_names() {
        let result = SchemaBuilder::new("tool")
            .arg(count())
            .switch(
                SwitchSlot::new("verbose", field!(Args, verbose))
                    .short("-c")
                    .help("Clash"),
            )
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateName(name)) if name == "-c"));
    }

    #[test]
    fn test_error_on_clash_with_help_token() {
        let result = SchemaBuilder::new("tool")
            .switch(
                SwitchSlot::new("verbose", field!(Args, verbose))
                    .long("--help")
                    .help("Clash"),
            )
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateName(name)) if name == "--help"));

        let schema = SchemaBuilder::new("tool")
            .switch(
                SwitchSlot::new("verbose", field!(Args, verbose))
                    .long("--help")
                    .help("No clash without help"),
            )
            .without_help()
            .build();
        assert!(schema.is_ok());
    }

    #[test]
    fn test_error_on_unnamed_option() {
        let result = SchemaBuilder::new("tool")
            .switch(SwitchSlot::new("verbose", field!(Args, verbose)).help("Chatty"))
            .build();
        assert!(matches!(result, Err(BuildError::MissingName(name)) if name == "verbose"));
    }

    #[test]
    fn test_error_on_second_multi_value() {
        let result = SchemaBuilder::new("tool")
            .multi_value(MultiValueSlot::new("a", field!(Args, files)).help("A"))
            .multi_value(MultiValueSlot::new("b", field!(Args, files)).help("B"))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MultipleMultiValues(first, second)) if first == "a" && second == "b"
        ));
    }

    #[test]
    fn test_error_on_invalid_dependency() {
        let result = SchemaBuilder::new("tool")
            .arg(input())
            .arg(count().dependencies(
                DependencySet::new().rule(Rule::required_if(field!(Args, input))),
            ))
            .build();
        assert!(matches!(result, Err(BuildError::MissingPredicate { .. })));

        let result = SchemaBuilder::new("tool")
            .arg(count())
            .arg(input().dependencies(
                DependencySet::new()
                    .rule(Rule::required_if(field!(Args, verbose)).is_equal_to(true)),
            ))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::UnknownDependencyField { field, .. }) if field == "verbose"
        ));
    }

    #[test]
    fn test_dependencies_set_requiredness() {
        let slot = input().dependencies(
            DependencySet::new().rule(Rule::required_if(field!(Args, count)).is_equal_to(1)),
        );
        assert_eq!(slot.info().requiredness, Requiredness::HasDependencies);
        assert_eq!(slot.required().info().requiredness, Requiredness::Required);
    }

    #[test]
    fn test_schema_is_send_and_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Schema<Args>>();
    }
}
