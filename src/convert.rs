//! The per-slot conversion pipeline: validate, convert, accumulate.

use crate::error::{BoxError, Cause};
use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Fallible transform from a raw token to a typed value.
pub type Converter<V> = Arc<dyn Fn(&str) -> Result<V, BoxError> + Send + Sync>;

/// Pre-conversion check: `None` passes, `Some(message)` fails.
pub type Validator = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Folds converted elements into the collection a multi-value slot targets.
pub type Accumulator<E, C> = Arc<dyn Fn(Vec<E>) -> C + Send + Sync>;

/// Cause attached to a failure when a converter or validator panicked.
#[derive(Debug, Error)]
#[error("converter panicked: {0}")]
pub struct ConverterPanic(pub String);

/// Which stage of the pipeline rejected a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Validation,
    Conversion,
}

/// Why a raw value could not be converted.
#[derive(Debug, Clone)]
pub struct ConversionFailure {
    pub stage: FailureStage,
    /// The raw token that failed.
    pub raw: String,
    pub message: String,
    pub cause: Option<Cause>,
}

/// Outcome of running the pipeline on raw input.
#[derive(Debug, Clone)]
pub enum Converted<V> {
    Success(V),
    Failure(ConversionFailure),
}

impl<V> Converted<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, Converted::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Converted<U> {
        match self {
            Converted::Success(v) => Converted::Success(f(v)),
            Converted::Failure(failure) => Converted::Failure(failure),
        }
    }

    pub fn into_result(self) -> Result<V, ConversionFailure> {
        match self {
            Converted::Success(v) => Ok(v),
            Converted::Failure(failure) => Err(failure),
        }
    }
}

/// An optional validator followed by a converter.
pub struct Pipeline<V> {
    validator: Option<Validator>,
    converter: Converter<V>,
}

impl<V> Clone for Pipeline<V> {
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            converter: Arc::clone(&self.converter),
        }
    }
}

impl<V: 'static> Pipeline<V> {
    pub fn new(converter: Converter<V>, validator: Option<Validator>) -> Self {
        Self {
            validator,
            converter,
        }
    }

    /// Build a pipeline from an optional converter, falling back to the
    /// identity conversion when `V` is string-typed.
    pub fn resolve(converter: Option<Converter<V>>, validator: Option<Validator>) -> Option<Self> {
        let converter = converter.or_else(identity_converter::<V>)?;
        Some(Self::new(converter, validator))
    }

    /// Run validation then conversion on a single raw token.
    pub fn convert(&self, raw: &str) -> Converted<V> {
        if let Some(validator) = &self.validator {
            match panic::catch_unwind(AssertUnwindSafe(|| validator(raw))) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    return Converted::Failure(ConversionFailure {
                        stage: FailureStage::Validation,
                        raw: raw.to_string(),
                        message,
                        cause: None,
                    })
                }
                Err(payload) => return panicked(FailureStage::Validation, raw, payload),
            }
        }

        match panic::catch_unwind(AssertUnwindSafe(|| (self.converter)(raw))) {
            Ok(Ok(value)) => {
                trace!(raw, "converted");
                Converted::Success(value)
            }
            Ok(Err(err)) => Converted::Failure(ConversionFailure {
                stage: FailureStage::Conversion,
                raw: raw.to_string(),
                message: err.to_string(),
                cause: Some(Arc::from(err)),
            }),
            Err(payload) => panicked(FailureStage::Conversion, raw, payload),
        }
    }

    /// Convert every raw token, stopping at the first failure.
    pub fn convert_all(&self, raws: &[String]) -> Converted<Vec<V>> {
        let mut values = Vec::with_capacity(raws.len());
        for raw in raws {
            match self.convert(raw) {
                Converted::Success(value) => values.push(value),
                Converted::Failure(failure) => return Converted::Failure(failure),
            }
        }
        Converted::Success(values)
    }
}

fn panicked<V>(stage: FailureStage, raw: &str, payload: Box<dyn Any + Send>) -> Converted<V> {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    let cause = ConverterPanic(message);
    Converted::Failure(ConversionFailure {
        stage,
        raw: raw.to_string(),
        message: cause.to_string(),
        cause: Some(Arc::new(cause)),
    })
}

/// The converter used when a slot declares none. Only `String` and
/// `Option<String>` targets have one.
pub fn identity_converter<V: 'static>() -> Option<Converter<V>> {
    let target = TypeId::of::<V>();
    if target == TypeId::of::<String>() {
        Some(Arc::new(|raw: &str| downcast::<V>(Box::new(raw.to_string()))))
    } else if target == TypeId::of::<Option<String>>() {
        Some(Arc::new(|raw: &str| {
            downcast::<V>(Box::new(Some(raw.to_string())))
        }))
    } else {
        None
    }
}

fn downcast<V: 'static>(value: Box<dyn Any>) -> Result<V, BoxError> {
    value
        .downcast::<V>()
        .map(|v| *v)
        .map_err(|_| BoxError::from("identity conversion to a non-string type"))
}

/// Accumulator collecting elements into any `FromIterator` collection:
/// `Vec`, `VecDeque`, `BTreeSet`, `HashSet`, `Box<[E]>` and so on.
pub fn collect<E, C>() -> Accumulator<E, C>
where
    E: 'static,
    C: FromIterator<E> + 'static,
{
    Arc::new(|elements: Vec<E>| -> C { elements.into_iter().collect() })
}
