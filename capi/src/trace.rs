use std::ffi::c_char;
use std::ffi::CStr;
use std::io;
use std::mem;

use tracing::subscriber::set_global_default as set_global_subscriber;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

use crate::set_last_err;
use crate::sourceinfo_err;
#[cfg(doc)]
use crate::sourceinfo_err_last;


/// The verbosity of the diagnostics reported to a
/// [`sourceinfo_trace_cb`].
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum sourceinfo_trace_lvl {
    /// Report unexpected conditions only, such as a truncated line
    /// table walk or a section using an unsupported compression.
    SOURCEINFO_LVL_WARN,
    /// Additionally report backend initialization outcomes and lookups
    /// that came back empty handed.
    SOURCEINFO_LVL_DEBUG,
    /// Report everything, including each call to
    /// [`sourceinfo_resolve`][crate::sourceinfo_resolve].
    SOURCEINFO_LVL_TRACE,
}

impl From<sourceinfo_trace_lvl> for LevelFilter {
    fn from(other: sourceinfo_trace_lvl) -> Self {
        match other {
            sourceinfo_trace_lvl::SOURCEINFO_LVL_WARN => LevelFilter::WARN,
            sourceinfo_trace_lvl::SOURCEINFO_LVL_DEBUG => LevelFilter::DEBUG,
            sourceinfo_trace_lvl::SOURCEINFO_LVL_TRACE => LevelFilter::TRACE,
        }
    }
}


/// The signature of a callback function as passed to
/// [`sourceinfo_trace`].
///
/// The callback receives one NUL terminated diagnostic message per
/// invocation, without trailing newline. The string is only valid for
/// the duration of the call.
pub type sourceinfo_trace_cb = extern "C" fn(*const c_char);


/// Create a filter admitting the events and spans of the library
/// itself up to the given level, and nothing of anybody else's.
fn library_filter(lvl: sourceinfo_trace_lvl) -> EnvFilter {
    let level = LevelFilter::from(lvl);
    EnvFilter::new(format!("off,sourceinfo={level},sourceinfo_c={level}"))
}


/// Create a subscriber formatting the library's diagnostics into
/// writers created by `make_writer`.
fn subscriber<W>(lvl: sourceinfo_trace_lvl, make_writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    FmtSubscriber::builder()
        .event_format(fmt::format().compact())
        .with_env_filter(library_filter(lvl))
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .without_time()
        .with_writer(make_writer)
        .finish()
}


/// A writer collecting the formatted representation of a single event
/// and handing it to a callback once complete.
struct EventWriter<F>
where
    F: FnMut(&CStr),
{
    buf: Vec<u8>,
    emit: F,
}

impl<F> EventWriter<F>
where
    F: FnMut(&CStr),
{
    fn new(emit: F) -> Self {
        Self {
            buf: Vec::new(),
            emit,
        }
    }
}

impl<F> io::Write for EventWriter<F>
where
    F: FnMut(&CStr),
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let () = self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<F> Drop for EventWriter<F>
where
    F: FnMut(&CStr),
{
    fn drop(&mut self) {
        let mut buf = mem::take(&mut self.buf);
        while buf.last() == Some(&b'\n') {
            let _nl = buf.pop();
        }
        if buf.is_empty() {
            return
        }

        // A file path may contain anything; a NUL byte would cut the
        // message short.
        let () = buf.retain(|b| *b != b'\0');
        let () = buf.push(b'\0');
        // SAFETY: `buf` contains exactly one NUL byte, at its end.
        let msg = unsafe { CStr::from_bytes_with_nul_unchecked(&buf) };
        let () = (self.emit)(msg);
    }
}


/// Report the library's diagnostics to a callback.
///
/// Every diagnostic message emitted by the library at or above `lvl`
/// results in one invocation of `cb`. Spans, such as the one covering
/// a [`sourceinfo_resolve`][crate::sourceinfo_resolve] call, are
/// reported when entered and closed. Messages of other components of
/// the process are not reported.
///
/// The callback may be invoked from any thread calling into the
/// library, including concurrently.
///
/// This function installs a process-wide `tracing` subscriber and can
/// succeed at most once. Later invocations have no effect and set the
/// thread's last error to [`sourceinfo_err::ALREADY_EXISTS`]. Use
/// [`sourceinfo_err_last`] to retrieve it.
///
/// # Notes
/// - the format of messages is unspecified and subject to change; it is
///   meant for human consumption and not programmatic evaluation
#[no_mangle]
pub extern "C" fn sourceinfo_trace(lvl: sourceinfo_trace_lvl, cb: sourceinfo_trace_cb) {
    let subscriber = subscriber(lvl, move || EventWriter::new(move |msg: &CStr| cb(msg.as_ptr())));

    let err = set_global_subscriber(subscriber)
        .map(|()| sourceinfo_err::OK)
        .unwrap_or(sourceinfo_err::ALREADY_EXISTS);
    let () = set_last_err(err);
}
