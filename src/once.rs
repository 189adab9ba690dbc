//! One-time, process-wide initialization of optional facilities.

use std::fmt;
use std::sync::OnceLock;

use crate::log::debug;
use crate::Result;


/// The observable state of a [`OnceFallible`].
#[cfg(test)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum State {
    /// Initialization has not been attempted yet.
    Uninitialized,
    /// Initialization succeeded and a value is available.
    Available,
    /// Initialization failed; it will never be retried.
    Unavailable,
}


/// A cell that attempts a fallible initialization exactly once.
///
/// Concurrent first callers block until the one initialization
/// attempt finishes; nobody duplicates the work. A failed attempt is
/// remembered just like a successful one, turning every later access
/// into a cheap check.
pub(crate) struct OnceFallible<T> {
    // Invariant: written to at most once.
    inner: OnceLock<Option<T>>,
}

impl<T> OnceFallible<T> {
    /// Create a new, uninitialized cell.
    pub(crate) const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Retrieve the contained value, attempting initialization with `f`
    /// if that has not happened before.
    ///
    /// `what` describes the facility being initialized and is only used
    /// for diagnostics.
    pub(crate) fn get_or_init<F>(&self, what: &str, f: F) -> Option<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.inner
            .get_or_init(|| match f() {
                Ok(value) => Some(value),
                Err(err) => {
                    debug!("{what} is unavailable: {err:#}");
                    None
                }
            })
            .as_ref()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> State {
        match self.inner.get() {
            None => State::Uninitialized,
            Some(Some(..)) => State::Available,
            Some(None) => State::Unavailable,
        }
    }
}

impl<T> Default for OnceFallible<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for OnceFallible<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_tuple("OnceFallible");
        match self.inner.get() {
            Some(Some(v)) => d.field(v),
            Some(None) => d.field(&format_args!("<unavailable>")),
            None => d.field(&format_args!("<uninit>")),
        };
        d.finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Barrier;
    use std::thread;

    use test_log::test;

    use crate::Error;


    /// Check that a successful initialization is cached.
    #[test]
    fn cache_success() {
        let cell = OnceFallible::new();
        assert_eq!(cell.state(), State::Uninitialized);

        let value = cell.get_or_init("answer", || Ok(42));
        assert_eq!(value, Some(&42));
        assert_eq!(cell.state(), State::Available);

        let value = cell.get_or_init("answer", || unreachable!());
        assert_eq!(value, Some(&42));
    }

    /// Check that a failed initialization is cached and never retried.
    #[test]
    fn cache_failure() {
        let attempts = AtomicUsize::new(0);
        let cell = OnceFallible::<u32>::new();

        for _ in 0..16 {
            let value = cell.get_or_init("nothing", || {
                let _prev = attempts.fetch_add(1, Ordering::Relaxed);
                Err(Error::with_not_found("no such facility"))
            });
            assert_eq!(value, None);
        }

        assert_eq!(attempts.load(Ordering::Relaxed), 1);
        assert_eq!(cell.state(), State::Unavailable);
    }

    /// Make sure that racing first callers see a single initialization.
    #[test]
    fn concurrent_initialization() {
        const THREADS: usize = 8;

        let attempts = AtomicUsize::new(0);
        let cell = OnceFallible::<usize>::new();
        let barrier = Barrier::new(THREADS);

        let () = thread::scope(|s| {
            for _ in 0..THREADS {
                let _handle = s.spawn(|| {
                    let _wait = barrier.wait();
                    let value = cell.get_or_init("counter", || {
                        Ok(attempts.fetch_add(1, Ordering::Relaxed) + 1)
                    });
                    assert_eq!(value, Some(&1));
                });
            }
        });

        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    /// Exercise the `Debug` representation in all states.
    #[test]
    fn debug_repr() {
        let cell = OnceFallible::<u8>::default();
        assert_eq!(format!("{cell:?}"), "OnceFallible(<uninit>)");

        let _value = cell.get_or_init("byte", || Ok(7));
        assert_eq!(format!("{cell:?}"), "OnceFallible(7)");

        let cell = OnceFallible::<u8>::new();
        let _value = cell.get_or_init("byte", || Err(Error::with_not_found("")));
        assert_eq!(format!("{cell:?}"), "OnceFallible(<unavailable>)");
    }
}
