//! Source location lookup through a symbolication service of the
//! operating system.
//!
//! The service is modeled by the [`Symbolicator`] trait, which
//! captures the three queries we need: find the "owner" (the image) of
//! an address, find the symbol containing the address, and enumerate
//! the source information records attached to that symbol.
//! [`resolver`] condenses these records into a single location.

pub(crate) mod resolver;

cfg_core_symbolication! {
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    mod binding;
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    mod block;
}

use std::ops::ControlFlow;
use std::ops::Range;
use std::path::Path;

use crate::location::Sink;
use crate::Addr;


/// A source information record as reported by a [`Symbolicator`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SourceInfo<'info> {
    /// The address range covered by the record.
    pub range: Range<Addr>,
    /// The path to the source file.
    pub path: Option<&'info Path>,
    /// The line number, with `0` meaning "unknown".
    pub line: u32,
    /// The column number, with `0` meaning "unknown".
    pub column: u32,
}


/// The queries a symbolication service has to answer.
///
/// Owner and symbol objects are only valid for the duration of a
/// single address lookup and are never stored.
pub(crate) trait Symbolicator {
    /// The type representing the owner (image) of a symbol.
    type Owner;
    /// The type representing a symbol.
    type Symbol;

    /// Find the owner of the symbol containing `addr`.
    fn symbol_owner(&self, addr: Addr) -> Option<Self::Owner>;

    /// Find the symbol containing `addr` inside of `owner`.
    fn symbol(&self, owner: &Self::Owner, addr: Addr) -> Option<Self::Symbol>;

    /// Report all source information records of `symbol` to `f`, in
    /// the order dictated by the service, until `f` breaks.
    fn for_each_source_info(
        &self,
        symbol: &Self::Symbol,
        f: &mut dyn FnMut(&SourceInfo<'_>) -> ControlFlow<()>,
    );
}


/// Resolve `addr` using `symbolicator`, writing the result to `sink`.
///
/// At most a single location is produced and only locations with a
/// known file are reported.
pub(crate) fn write<S>(symbolicator: &S, addr: Addr, sink: &mut Sink<'_>) -> usize
where
    S: Symbolicator + ?Sized,
{
    let location = resolver::resolve(symbolicator, addr);
    if location.file.is_none() {
        return 0
    }

    if let Some(slot) = sink.next_slot() {
        *slot = location;
    }
    sink.len()
}


/// Resolve `addr` using the system's symbolication service.
#[cfg(all(feature = "core-symbolication", target_os = "macos"))]
pub(crate) fn resolve(addr: Addr, sink: &mut Sink<'_>) -> usize {
    match binding::Binding::get() {
        Some(binding) => write(binding, addr, sink),
        None => 0,
    }
}
