// Error taxonomy
//
// Most failures travel as anyhow::Error. The variants here are the ones a
// caller may want to match on, recovered with `err.downcast_ref::<CounterError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CounterError {
    /// The operation only makes sense for an individual user.
    /// Role counters are derived aggregates and stay read-only.
    #[error("unsupported operation: cannot {operation} a counter bound to {subject}")]
    UnsupportedOperation {
        operation: &'static str,
        subject: String,
    },

    /// The count is already at its largest representable value.
    #[error("login counter for {subject} cannot go past {max}", max = u64::MAX)]
    CounterOverflow { subject: String },

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

impl CounterError {
    pub fn unsupported(operation: &'static str, subject: impl ToString) -> Self {
        CounterError::UnsupportedOperation {
            operation,
            subject: subject.to_string(),
        }
    }

    /// True when `err` carries an `UnsupportedOperation` anywhere in its chain.
    pub fn is_unsupported(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<CounterError>(),
                Some(CounterError::UnsupportedOperation { .. })
            )
        })
    }
}
