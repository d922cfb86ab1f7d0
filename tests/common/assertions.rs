//! Assertion macros for results and messages
//!
//! Failures print the full value so a broken reconciliation or a wrong
//! error variant is readable straight from the test output.

/// Unwrap an `Ok`, panicking with the error otherwise
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => panic!("expected Ok, got Err({:?})", error),
        }
    };
}

/// Check that a result failed with an error matching `$pattern`
#[macro_export]
macro_rules! assert_err {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Err(other) => panic!(
                "expected Err({}), got Err({:?})",
                stringify!($pattern),
                other
            ),
            Ok(value) => panic!("expected Err({}), got Ok({:?})", stringify!($pattern), value),
        }
    };
}

/// Check that a message mentions `$needle`
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {{
        let haystack: &str = $haystack.as_ref();
        assert!(
            haystack.contains($needle),
            "'{}' does not mention '{}'",
            haystack,
            $needle
        );
    }};
}
