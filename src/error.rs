use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    #[error("expiry {expiry} precedes last accepted expiry {last}")]
    NonMonotonicInsert { expiry: u64, last: u64 },

    #[error("timer handle is stale")]
    StaleHandle,
}

/// A rejected insert. Hands the timer back to the caller untouched.
#[derive(thiserror::Error)]
#[error("{error}")]
pub struct InsertError<T> {
    pub error: TimerError,
    pub timer: T,
}

impl<T> InsertError<T> {
    pub fn into_inner(self) -> T {
        self.timer
    }
}

impl<T> Debug for InsertError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
