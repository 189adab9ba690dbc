//! Source location lookup based on the line tables contained in the
//! binary itself.
//!
//! Unlike the OS backed lookup, a line table walk reports a location
//! for every frame of an inlining chain, innermost first.

cfg_dwarf! {
    mod dwarf;
}

use std::ops::ControlFlow;
use std::path::Path;

use crate::location::Sink;
use crate::log::debug;
use crate::log::warn;
use crate::Addr;
use crate::Result;


/// The factor by which the number of records received may exceed the
/// capacity of the sink before the walk is cut short.
const VALVE_FACTOR: usize = 10;


/// A single record produced by a line table walk.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct LineRecord<'rec> {
    pub file: Option<&'rec Path>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub no_debug_info: bool,
}


/// A source of line table records.
pub(crate) trait LineWalk {
    /// Report the records for `addr` to `f`, innermost first, until
    /// there are no more or `f` breaks.
    fn walk(&self, addr: Addr, f: &mut dyn FnMut(&LineRecord<'_>) -> ControlFlow<()>)
        -> Result<()>;
}


/// Collect the records `walker` reports for `addr` into `sink`.
///
/// Once the sink is full, every further record replaces the last
/// one written. A walk reporting more than ten times as many records
/// as fit is stopped.
pub(crate) fn collect<W>(walker: &W, addr: Addr, sink: &mut Sink<'_>) -> usize
where
    W: LineWalk + ?Sized,
{
    let capacity = sink.capacity();
    if capacity == 0 {
        return 0
    }

    let limit = capacity.saturating_mul(VALVE_FACTOR);
    let mut received = 0usize;
    let result = walker.walk(addr, &mut |record| {
        received += 1;
        if let Some(slot) = sink.next_slot() {
            let () = slot.assign(record.file, record.line, record.column, record.no_debug_info);
        }

        if received > limit {
            warn!("stopping line table walk for {addr:#x} after {received} records");
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    if let Err(err) = result {
        debug!("line table walk for {addr:#x} failed: {err:#}");
    }
    sink.len()
}


/// Resolve `addr` using the line tables of the image containing this
/// library.
#[cfg(feature = "dwarf")]
pub(crate) fn resolve(addr: Addr, sink: &mut Sink<'_>) -> usize {
    match dwarf::Engine::get() {
        Some(engine) => collect(engine, addr, sink),
        None => 0,
    }
}
