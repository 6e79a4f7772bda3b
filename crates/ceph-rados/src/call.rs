//! The checked-call base every fallible native invocation goes through.

use crate::errors::{RadosError, Result};

/// Run a unit of work producing a native status code and translate the
/// outcome.
///
/// Non-negative results pass through unchanged. Negative results raise the
/// error variant the classifier selects for the code, carrying the caller's
/// formatted context. A fault from the unit of work itself (marshaling, not
/// a status code) is wrapped into [`RadosError::Unexpected`] with the fault's
/// type name and message preserved.
///
/// This is the single choke point between the wrappers and their callers; no
/// negative status code is ever returned to a caller as a success value.
pub fn handle_code<N, E, F, C>(work: F, context: C) -> Result<N>
where
    N: Into<i64> + Copy,
    E: std::error::Error,
    F: FnOnce() -> std::result::Result<N, E>,
    C: FnOnce() -> String,
{
    let value = match work() {
        Ok(value) => value,
        Err(fault) => {
            return Err(RadosError::Unexpected {
                type_name: short_type_name::<E>().to_owned(),
                message: fault.to_string(),
            });
        }
    };

    let code = value.into();
    if code < 0 {
        return Err(RadosError::from_status(context(), code as i32));
    }
    Ok(value)
}

/// The unqualified name of `T`, matching how the fault is reported.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn returning(code: i32) -> Result<i32> {
        handle_code(
            || Ok::<i32, Infallible>(code),
            || "error message".to_owned(),
        )
    }

    #[test]
    fn zero_passes_through() {
        assert_eq!(returning(0).unwrap(), 0);
    }

    #[test]
    fn positive_value_passes_through() {
        assert_eq!(returning(42).unwrap(), 42);
    }

    #[test]
    fn classified_codes_select_their_variant() {
        assert!(matches!(returning(-1), Err(RadosError::Permission(_))));
        assert!(matches!(returning(-2), Err(RadosError::NotFound(_))));
        assert!(matches!(returning(-22), Err(RadosError::InvalidArgument(_))));
        assert!(matches!(returning(-30), Err(RadosError::ReadOnly(_))));
        assert!(matches!(returning(-33), Err(RadosError::OutOfDomain(_))));
        assert!(matches!(
            returning(-106),
            Err(RadosError::AlreadyConnected(_))
        ));
        assert!(matches!(returning(-110), Err(RadosError::TimedOut(_))));
        assert!(matches!(returning(-115), Err(RadosError::InProgress(_))));
    }

    #[test]
    fn classified_errors_carry_the_code() {
        for code in [-1, -2, -22, -30, -33, -106, -110, -115] {
            let err = returning(code).unwrap_err();
            assert_eq!(err.code(), Some(code));
        }
    }

    #[test]
    fn unclassified_code_is_generic_with_full_message() {
        let err = returning(-131).unwrap_err();
        assert!(matches!(err, RadosError::Other(_)));
        assert_eq!(
            err.to_string(),
            "error message; ENOTRECOVERABLE: State not recoverable (-131)"
        );
    }

    #[test]
    fn unknown_code_message_names_the_value() {
        let err = returning(-250).unwrap_err();
        assert!(matches!(err, RadosError::Other(_)));
        assert!(err.to_string().contains("-250"));
    }

    #[test]
    fn fault_from_work_is_wrapped() {
        #[derive(Debug, thiserror::Error)]
        #[error("fail")]
        struct BrokenMarshal;

        let err = handle_code(
            || Err::<i32, BrokenMarshal>(BrokenMarshal),
            || "error message".to_owned(),
        )
        .unwrap_err();

        match err {
            RadosError::Unexpected { type_name, message } => {
                assert_eq!(type_name, "BrokenMarshal");
                assert_eq!(message, "fail");
            }
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }

    #[test]
    fn context_is_not_built_on_success() {
        let result = handle_code(
            || Ok::<i32, Infallible>(7),
            || unreachable!("context must be lazy"),
        );
        assert_eq!(result.unwrap(), 7);
    }
}
