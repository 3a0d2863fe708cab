//! # Declarative validation for heterogeneous parameter lists.
//!
//! Events travel with a positional list of type-erased [`Param`]s, and a
//! position may be absent. Handlers declare the shape they expect with a
//! [`ParamSpec`] — a list of [`Assertion`]s applied position by position —
//! and extract typed values with [`assert_and_store`] or [`map_param`].
//!
//! ```
//! use eventbus::{assert_and_store, param, ParamSpec};
//!
//! let params = vec![param("report.txt".to_string()), param(3u64)];
//! let mut name: Option<String> = None;
//! let mut spec = ParamSpec::new(1, vec![assert_and_store(&mut name)]);
//! assert!(spec.check(&params).is_ok());
//! drop(spec);
//! assert_eq!(name.as_deref(), Some("report.txt"));
//! ```
//!
//! Length mismatches are tolerated on purpose: assertions beyond the
//! parameter list are ignored, and so are parameters beyond the assertion
//! list — callers may leave trailing optional positions unspecified. Only
//! the `min_params` floor is enforced.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// One type-erased event parameter.
///
/// Cloning is cheap (the value is shared). The concrete type name is
/// recorded at construction so mismatch errors can name expected vs actual.
#[derive(Clone)]
pub struct Param {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Param {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Param {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// True when the stored value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the stored value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Name of the stored value's concrete type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Param<{}>", self.type_name)
    }
}

/// A positional parameter list; `None` marks an absent position.
pub type Params = Vec<Option<Param>>;

/// Wraps a value as a present parameter.
pub fn param<T: Any + Send + Sync>(value: T) -> Option<Param> {
    Some(Param::new(value))
}

/// Builds a [`Params`] list from values: `params!["msg", 5u32]`.
///
/// Every listed value is present; splice `None` in manually for absent
/// positions.
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::param($value)),+]
    };
}

fn join_errors(errs: &[ParamError]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single failed parameter assertion.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The parameter's dynamic type didn't match the expectation.
    #[error("unexpected parameter type: expected {expected}, but got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },

    /// A required position held no parameter.
    #[error("unexpected parameter type: parameter {0} is absent")]
    Absent(usize),

    /// The parameter list was shorter than the declared minimum.
    #[error("not enough parameters: expected at least {0}")]
    NotEnough(usize),

    /// Every alternative of an [`any_pass`] failed.
    #[error("no assertion passed: [{}]", join_errors(.0))]
    NonePassed(Vec<ParamError>),
}

/// All assertion failures accumulated by one [`ParamSpec::check`] run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_errors(.0))]
pub struct ParamErrors(pub Vec<ParamError>);

impl ParamErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamError> {
        self.0.iter()
    }
}

impl From<ParamError> for ParamErrors {
    fn from(err: ParamError) -> Self {
        ParamErrors(vec![err])
    }
}

/// Validates one parameter at a position.
///
/// Assertions compose with [`all_of`] and [`any_pass`], and may capture
/// mutable bindings (see [`assert_and_store`]), hence `FnMut` and the
/// lifetime.
pub type Assertion<'a> = Box<dyn FnMut(usize, Option<&Param>) -> Result<(), ParamError> + Send + 'a>;

/// Asserts that the parameter's dynamic type is `T`.
pub fn is_type<T: Any>() -> Assertion<'static> {
    Box::new(|_pos, p| match p {
        Some(p) if p.is::<T>() => Ok(()),
        Some(p) => Err(ParamError::UnexpectedType {
            expected: type_name::<T>(),
            actual: p.type_name(),
        }),
        None => Err(ParamError::UnexpectedType {
            expected: type_name::<T>(),
            actual: "none",
        }),
    })
}

/// Asserts that the position holds a parameter.
pub fn not_absent() -> Assertion<'static> {
    Box::new(|pos, p| match p {
        Some(_) => Ok(()),
        None => Err(ParamError::Absent(pos)),
    })
}

/// Applies `inner` only when the position holds a parameter.
pub fn optional(mut inner: Assertion<'_>) -> Assertion<'_> {
    Box::new(move |pos, p| match p {
        None => Ok(()),
        some => inner(pos, some),
    })
}

/// No-op assertion; placeholder for positions that need no validation.
pub fn pass() -> Assertion<'static> {
    Box::new(|_pos, _p| Ok(()))
}

/// Chains assertions; stops at the first failure.
pub fn all_of(mut assertions: Vec<Assertion<'_>>) -> Assertion<'_> {
    Box::new(move |pos, p| {
        for assertion in assertions.iter_mut() {
            assertion(pos, p)?;
        }
        Ok(())
    })
}

/// Succeeds when any alternative passes; otherwise reports every failure.
///
/// Useful when a position legitimately holds one of several types.
pub fn any_pass(mut assertions: Vec<Assertion<'_>>) -> Assertion<'_> {
    Box::new(move |pos, p| {
        let mut errs = Vec::new();
        for assertion in assertions.iter_mut() {
            match assertion(pos, p) {
                Ok(()) => return Ok(()),
                Err(err) => errs.push(err),
            }
        }
        if errs.is_empty() {
            return Ok(());
        }
        Err(ParamError::NonePassed(errs))
    })
}

/// Asserts presence and type, then binds a clone of the value into `slot`.
pub fn assert_and_store<T: Any + Clone + Send + Sync>(slot: &mut Option<T>) -> Assertion<'_> {
    Box::new(move |pos, p| {
        let param = p.ok_or(ParamError::Absent(pos))?;
        let value = param
            .downcast_ref::<T>()
            .ok_or_else(|| ParamError::UnexpectedType {
                expected: type_name::<T>(),
                actual: param.type_name(),
            })?;
        *slot = Some(value.clone());
        Ok(())
    })
}

/// Positional validator over a whole parameter list.
///
/// The assertion at position 0 applies to the parameter at position 0, and
/// so on. Running the same spec twice over the same input yields the same
/// errors and the same bindings.
pub struct ParamSpec<'a> {
    min_params: usize,
    assertions: Vec<Assertion<'a>>,
}

impl<'a> ParamSpec<'a> {
    pub fn new(min_params: usize, assertions: Vec<Assertion<'a>>) -> Self {
        ParamSpec {
            min_params,
            assertions,
        }
    }

    /// Applies the assertions, accumulating every failure.
    ///
    /// A list shorter than `min_params` fails immediately without running
    /// any assertion.
    pub fn check(&mut self, params: &[Option<Param>]) -> Result<(), ParamErrors> {
        if params.len() < self.min_params {
            return Err(ParamError::NotEnough(self.min_params).into());
        }
        let mut errs = Vec::new();
        let positions = self.assertions.len().min(params.len());
        for (pos, assertion) in self.assertions.iter_mut().take(positions).enumerate() {
            if let Err(err) = assertion(pos, params[pos].as_ref()) {
                errs.push(err);
            }
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(ParamErrors(errs))
        }
    }
}

/// Maps a single parameter to a target binding; the common handler case.
pub fn map_param<T: Any + Clone + Send + Sync>(
    target: &mut Option<T>,
    params: &[Option<Param>],
) -> Result<(), ParamErrors> {
    ParamSpec::new(1, vec![assert_and_store(target)]).check(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_param_binds_the_value() {
        let params = params!["hello".to_string()];
        let mut target: Option<String> = None;
        map_param(&mut target, &params).expect("valid param");
        assert_eq!(target.as_deref(), Some("hello"));
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let params = params![5i64];
        let mut target: Option<String> = None;
        let errs = map_param(&mut target, &params).expect_err("mismatch");
        assert_eq!(errs.len(), 1);
        let msg = errs.to_string();
        assert!(msg.contains("String"), "got: {msg}");
        assert!(msg.contains("i64"), "got: {msg}");
        assert_eq!(target, None);
    }

    #[test]
    fn too_few_params_fails_fast() {
        let mut a: Option<u32> = None;
        let mut b: Option<u32> = None;
        let mut spec = ParamSpec::new(
            2,
            vec![assert_and_store(&mut a), assert_and_store(&mut b)],
        );
        let errs = spec.check(&params![1u32]).expect_err("too few");
        assert_eq!(errs.0, vec![ParamError::NotEnough(2)]);
    }

    #[test]
    fn surplus_assertions_and_params_are_ignored() {
        // More assertions than params: trailing assertion never runs.
        let mut spec = ParamSpec::new(0, vec![is_type::<u32>(), is_type::<String>()]);
        assert!(spec.check(&params![1u32]).is_ok());

        // More params than assertions: trailing params unchecked.
        let mut spec = ParamSpec::new(0, vec![is_type::<u32>()]);
        assert!(spec.check(&params![1u32, "ignored"]).is_ok());
    }

    #[test]
    fn optional_allows_absence() {
        let mut spec = ParamSpec::new(0, vec![optional(is_type::<String>())]);
        assert!(spec.check(&[None]).is_ok());
        assert!(spec.check(&params![5u8]).is_err());
        assert!(spec.check(&params!["ok".to_string()]).is_ok());
    }

    #[test]
    fn absent_position_is_reported() {
        let mut spec = ParamSpec::new(1, vec![not_absent()]);
        let errs = spec.check(&[None]).expect_err("absent");
        assert_eq!(errs.0, vec![ParamError::Absent(0)]);
    }

    #[test]
    fn any_pass_accepts_either_type() {
        let mut spec = ParamSpec::new(
            1,
            vec![any_pass(vec![is_type::<u32>(), is_type::<String>()])],
        );
        assert!(spec.check(&params![7u32]).is_ok());
        assert!(spec.check(&params!["seven".to_string()]).is_ok());

        let errs = spec.check(&params![7.0f64]).expect_err("neither");
        assert!(matches!(errs.0[0], ParamError::NonePassed(ref inner) if inner.len() == 2));
    }

    #[test]
    fn all_of_stops_at_first_failure() {
        let mut spec = ParamSpec::new(
            1,
            vec![all_of(vec![not_absent(), is_type::<String>()])],
        );
        let errs = spec.check(&[None]).expect_err("absent");
        assert_eq!(errs.0, vec![ParamError::Absent(0)]);
    }

    #[test]
    fn pass_skips_a_position() {
        let mut spec = ParamSpec::new(2, vec![pass(), is_type::<bool>()]);
        assert!(spec.check(&params![1u8, true]).is_ok());
    }

    #[test]
    fn rerunning_a_spec_is_idempotent() {
        let params = params![9u64, "tag".to_string()];
        let mut num: Option<u64> = None;
        let mut tag: Option<String> = None;
        {
            let mut spec = ParamSpec::new(
                2,
                vec![assert_and_store(&mut num), assert_and_store(&mut tag)],
            );
            assert!(spec.check(&params).is_ok());
            assert!(spec.check(&params).is_ok());
        }
        assert_eq!(num, Some(9));
        assert_eq!(tag.as_deref(), Some("tag"));

        let bad = params![9u64, 5u32];
        let mut spec = ParamSpec::new(2, vec![is_type::<u64>(), is_type::<String>()]);
        let first = spec.check(&bad).expect_err("mismatch");
        let second = spec.check(&bad).expect_err("mismatch");
        assert_eq!(first, second);
    }

    #[test]
    fn params_macro_handles_mixed_values() {
        let list = params![1u8, "two", 3.0f32];
        assert_eq!(list.len(), 3);
        assert!(list[0].as_ref().expect("present").is::<u8>());
        assert!(list[1].as_ref().expect("present").is::<&str>());

        let empty = params![];
        assert!(empty.is_empty());
    }
}
