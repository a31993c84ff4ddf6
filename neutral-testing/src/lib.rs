//! Internal testing utilities for the neutral-codegen crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for writing table-driven tests.
///
/// Define a `Debug` struct, conventionally named `Case`, holding the inputs
/// and expected outputs of one case. Put the cases in any collection and call
/// `test_each` with the test body. Every case is run even if earlier ones
/// panic. If any case fails, `test_each` panics with the number of failures
/// and the debug representation of each failing case.
///
/// ```
/// use neutral_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     shape: Vec<usize>,
///     elements: usize,
/// }
///
/// let cases = [
///     Case { shape: vec![2, 3, 4], elements: 24 },
///     Case { shape: vec![], elements: 1 },
/// ];
///
/// cases.test_each(|case| {
///     assert_eq!(case.shape.iter().product::<usize>(), case.elements);
/// });
/// ```
///
/// Cases and captured values must be unwind safe. Fields which are not (eg.
/// anything with interior mutability) should be constructed inside the test
/// body instead, or wrapped in [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Run `test` with a reference to each case, catching panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes an owned
    /// clone of each case.
    fn test_each_clone(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe;
}

fn check_failures<T: Debug>(failures: &[T]) {
    assert!(
        failures.is_empty(),
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        check_failures(&failures);
    }

    fn test_each_clone(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| {
                let owned = case.clone();
                std::panic::catch_unwind(move || test(owned)).is_err()
            })
            .collect();
        check_failures(&failures);
    }
}

#[cfg(test)]
mod tests {
    use super::TestCases;

    #[derive(Clone, Debug)]
    struct Case {
        axis: usize,
    }

    #[test]
    fn test_all_cases_pass() {
        let cases = [Case { axis: 0 }, Case { axis: 1 }];
        cases.clone().test_each(|case| assert!(case.axis < 2));
        cases.test_each_clone(|case| assert!(case.axis < 2));
    }

    #[test]
    #[should_panic(expected = "1 test cases failed")]
    fn test_reports_failing_cases() {
        let cases = [Case { axis: 0 }, Case { axis: 3 }];
        cases.test_each(|case| assert!(case.axis < 2, "axis out of range"));
    }

    #[test]
    #[should_panic(expected = "2 test cases failed")]
    fn test_clone_reports_failing_cases() {
        let cases = [Case { axis: 5 }, Case { axis: 3 }];
        cases.test_each_clone(|case| assert!(case.axis < 2, "axis out of range"));
    }
}
