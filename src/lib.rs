#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod cfg;
mod config;
mod error;
pub mod helper;
mod image;
#[cfg_attr(
    any(
        not(feature = "dwarf"),
        all(feature = "core-symbolication", target_os = "macos")
    ),
    allow(dead_code)
)]
mod linetab;
mod location;
mod log;
#[cfg(feature = "dwarf")]
mod mmap;
mod once;
#[cfg_attr(
    not(all(feature = "core-symbolication", target_os = "macos")),
    allow(dead_code)
)]
mod symbolicator;
mod util;

pub use crate::config::configure;
pub use crate::config::Config;
pub use crate::config::CURRENT_IMAGE_ONLY_ENV;
pub use crate::error::Error;
pub use crate::error::ErrorKind;
pub use crate::error::Result;
pub use crate::image::ImageIdentity;
pub use crate::location::SourceLocation;

use crate::error::ErrorExt;
use crate::error::IntoError;
use crate::location::Sink;


/// A type representing addresses.
pub type Addr = u64;


/// Resolve an instruction address to source code locations.
///
/// Locations are written to `locations`, whose length determines the
/// maximum number of locations produced. Depending on the backend in
/// use, an address may resolve to multiple locations, one per frame of
/// an inlining chain, innermost first. If there are more frames than
/// fit, the last slot receives the outermost one.
///
/// The number of locations written is returned. Slots beyond that
/// count are left untouched. A return value of `0` indicates that no
/// information is available for the address, which is a regular
/// outcome and not an error.
///
/// The first call fixes the process-wide [`Config`] and initializes
/// the backend; later calls reuse the outcome of this initialization,
/// even if it failed.
///
/// ```no_run
/// # use sourceinfo::Addr;
/// # use sourceinfo::SourceLocation;
/// let addr = main as fn() as usize as Addr;
/// let mut locations = [SourceLocation::default(), SourceLocation::default()];
/// let count = sourceinfo::resolve(addr, &mut locations);
/// for location in &locations[..count] {
///     println!("{location:?}");
/// }
/// # fn main() {}
/// ```
#[cfg_attr(feature = "tracing", crate::log::instrument(skip_all, fields(addr = format_args!("{addr:#x}"), capacity = locations.len())))]
pub fn resolve(addr: Addr, locations: &mut [SourceLocation]) -> usize {
    if locations.is_empty() {
        return 0
    }

    // The configuration is fixed by the first symbolization attempt,
    // irrespective of the backend in use.
    let _config = config::config();
    let mut sink = Sink::new(locations);
    backend(addr, &mut sink)
}

#[cfg(all(feature = "core-symbolication", target_os = "macos"))]
fn backend(addr: Addr, sink: &mut Sink<'_>) -> usize {
    symbolicator::resolve(addr, sink)
}

#[cfg(all(
    feature = "dwarf",
    not(all(feature = "core-symbolication", target_os = "macos"))
))]
fn backend(addr: Addr, sink: &mut Sink<'_>) -> usize {
    linetab::resolve(addr, sink)
}

#[cfg(not(any(
    feature = "dwarf",
    all(feature = "core-symbolication", target_os = "macos")
)))]
fn backend(_addr: Addr, _sink: &mut Sink<'_>) -> usize {
    0
}
