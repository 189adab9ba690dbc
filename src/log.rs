//! Logging shims.
//!
//! With the `tracing` feature enabled, the macros in this module are
//! those of the `tracing` crate. Otherwise they evaluate nothing and
//! compile down to no-ops, while still type checking their arguments.

#[cfg(feature = "tracing")]
pub(crate) use tracing::debug;
#[cfg(feature = "tracing")]
pub(crate) use tracing::instrument;
#[cfg(feature = "tracing")]
pub(crate) use tracing::trace;
#[cfg(feature = "tracing")]
pub(crate) use tracing::warn;

#[cfg(not(feature = "tracing"))]
mod noop {
    macro_rules! noop {
        ($($args:tt)*) => {{
            if false {
                let _ = format_args!($($args)*);
            }
        }};
    }

    pub(crate) use noop as debug;
    pub(crate) use noop as trace;
    pub(crate) use noop as warn;
}

#[cfg(not(feature = "tracing"))]
pub(crate) use noop::debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop::trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop::warn;
