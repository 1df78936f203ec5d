//! Conditional requiredness: rules over other slots' converted values.

use crate::error::BuildError;
use crate::schema::Field;
use std::collections::HashMap;
use std::fmt;

/// Whether a rule demands presence or absence when it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePolarity {
    /// The owning argument must appear.
    Required,
    /// The owning argument must not appear.
    MustNotAppear,
}

/// Values that have a notion of "no value", for `is_null` predicates.
pub trait Nullable {
    fn is_null(&self) -> bool;
}

impl<U> Nullable for Option<U> {
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

type ValuePredicate<V> = Box<dyn Fn(&V) -> bool + Send + Sync>;
type TargetPredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A typed dependency rule under construction.
///
/// Exactly one predicate must be assigned; a second assignment is kept as an
/// error and reported when the schema is built.
pub struct Rule<T, V> {
    polarity: RulePolarity,
    field: Field<T, V>,
    predicate: Option<(ValuePredicate<V>, bool)>,
    predicate_count: usize,
    message: Option<String>,
}

impl<T: 'static, V: 'static> Rule<T, V> {
    /// The owning argument is required when the predicate on `field` applies.
    pub fn required_if(field: Field<T, V>) -> Self {
        Self::new(RulePolarity::Required, field)
    }

    /// The owning argument must not appear when the predicate on `field` applies.
    pub fn must_not_appear_if(field: Field<T, V>) -> Self {
        Self::new(RulePolarity::MustNotAppear, field)
    }

    fn new(polarity: RulePolarity, field: Field<T, V>) -> Self {
        Self {
            polarity,
            field,
            predicate: None,
            predicate_count: 0,
            message: None,
        }
    }

    fn assign(mut self, predicate: ValuePredicate<V>, applies_when: bool) -> Self {
        self.predicate_count += 1;
        if self.predicate.is_none() {
            self.predicate = Some((predicate, applies_when));
        }
        self
    }

    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.assign(Box::new(predicate), true)
    }

    pub fn when_not<F>(self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.assign(Box::new(predicate), false)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: 'static, V: PartialEq + Send + Sync + 'static> Rule<T, V> {
    pub fn is_equal_to(self, expected: V) -> Self {
        self.assign(Box::new(move |value: &V| *value == expected), true)
    }

    pub fn is_not_equal_to(self, expected: V) -> Self {
        self.assign(Box::new(move |value: &V| *value == expected), false)
    }
}

impl<T: 'static, V: Nullable + 'static> Rule<T, V> {
    pub fn is_null(self) -> Self {
        self.assign(Box::new(|value: &V| value.is_null()), true)
    }

    pub fn is_not_null(self) -> Self {
        self.assign(Box::new(|value: &V| value.is_null()), false)
    }
}

/// A rule with its value type erased, evaluated against the whole target.
pub struct DependencyRule<T> {
    polarity: RulePolarity,
    field: String,
    test: Option<TargetPredicate<T>>,
    applies_when: bool,
    predicate_count: usize,
    message: String,
}

impl<T: 'static, V: 'static> From<Rule<T, V>> for DependencyRule<T> {
    fn from(rule: Rule<T, V>) -> Self {
        let Rule {
            polarity,
            field,
            predicate,
            predicate_count,
            message,
        } = rule;
        let name = field.name().to_string();
        let (test, applies_when) = match predicate {
            Some((predicate, applies_when)) => {
                let test: TargetPredicate<T> =
                    Box::new(move |target: &T| predicate(&field.get(target)));
                (Some(test), applies_when)
            }
            None => (None, true),
        };
        Self {
            polarity,
            field: name,
            test,
            applies_when,
            predicate_count,
            message: message.unwrap_or_default(),
        }
    }
}

impl<T> DependencyRule<T> {
    pub fn polarity(&self) -> RulePolarity {
        self.polarity
    }

    /// Name of the field this rule reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the rule's condition holds for `target`.
    pub fn applies(&self, target: &T) -> bool {
        self.test
            .as_ref()
            .is_some_and(|test| test(target) == self.applies_when)
    }

    /// Whether the owning slot's presence satisfies this rule.
    pub fn is_satisfied(&self, target: &T, got_value: bool) -> bool {
        if !self.applies(target) {
            return true;
        }
        match self.polarity {
            RulePolarity::Required => got_value,
            RulePolarity::MustNotAppear => !got_value,
        }
    }
}

impl<T> fmt::Debug for DependencyRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRule")
            .field("polarity", &self.polarity)
            .field("field", &self.field)
            .field("applies_when", &self.applies_when)
            .field("message", &self.message)
            .finish()
    }
}

/// Ordered rules deciding whether an argument is required.
pub struct DependencySet<T> {
    rules: Vec<DependencyRule<T>>,
}

impl<T: 'static> DependencySet<T> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rule<V: 'static>(mut self, rule: Rule<T, V>) -> Self {
        self.rules.push(rule.into());
        self
    }
}

impl<T: 'static> Default for DependencySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DependencySet<T> {
    pub fn rules(&self) -> &[DependencyRule<T>] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every rule once and fill in default messages.
    ///
    /// `owner` is the owning slot's display name, `own_field` its field, and
    /// `fields` every field name bound in the schema.
    pub(crate) fn finalize(
        &mut self,
        owner: &str,
        own_field: &str,
        fields: &HashMap<String, usize>,
    ) -> Result<(), BuildError> {
        if self.rules.is_empty() {
            return Err(BuildError::EmptyDependencySet(owner.to_string()));
        }
        for rule in &mut self.rules {
            if rule.predicate_count == 0 {
                return Err(BuildError::MissingPredicate {
                    slot: owner.to_string(),
                    field: rule.field.clone(),
                });
            }
            if rule.predicate_count > 1 {
                return Err(BuildError::PredicateAlreadyAssigned {
                    slot: owner.to_string(),
                    field: rule.field.clone(),
                });
            }
            if rule.field == own_field {
                return Err(BuildError::SelfDependency(owner.to_string()));
            }
            if !fields.contains_key(&rule.field) {
                return Err(BuildError::UnknownDependencyField {
                    slot: owner.to_string(),
                    field: rule.field.clone(),
                });
            }
            if rule.message.is_empty() {
                rule.message = match rule.polarity {
                    RulePolarity::Required => {
                        format!("{} is required because of the value of {}", owner, rule.field)
                    }
                    RulePolarity::MustNotAppear => format!(
                        "{} must not appear because of the value of {}",
                        owner, rule.field
                    ),
                };
            }
        }
        Ok(())
    }

    /// Evaluate the rules in order and return the first violated one.
    ///
    /// Rules reading a field for which `unresolved` returns true have no
    /// final value to test and are skipped.
    pub fn evaluate<F>(&self, target: &T, got_value: bool, unresolved: F) -> Option<&DependencyRule<T>>
    where
        F: Fn(&str) -> bool,
    {
        self.rules
            .iter()
            .filter(|rule| !unresolved(&rule.field))
            .find(|rule| !rule.is_satisfied(target, got_value))
    }
}

impl<T> fmt::Debug for DependencySet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.rules).finish()
    }
}
