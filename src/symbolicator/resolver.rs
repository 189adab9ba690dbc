use std::ops::ControlFlow;
use std::ops::RangeInclusive;
use std::path::Path;
use std::path::PathBuf;

use crate::log::trace;
use crate::Addr;
use crate::SourceLocation;

use super::SourceInfo;
use super::Symbolicator;


/// The approximate extent of the outermost (non-inlined) function, in
/// source lines.
#[derive(Debug, PartialEq)]
struct Outline {
    file: Option<PathBuf>,
    lines: RangeInclusive<u32>,
}

impl Outline {
    /// Derive the outline from a symbol's source information records.
    ///
    /// The first record with a known line starts the range and
    /// determines the file, every later one moves its end.
    fn collect<S>(symbolicator: &S, symbol: &S::Symbol) -> Option<Self>
    where
        S: Symbolicator + ?Sized,
    {
        let mut outline = None::<Self>;
        let () = symbolicator.for_each_source_info(symbol, &mut |info| {
            if info.line == 0 {
                return ControlFlow::Continue(())
            }

            if let Some(outline) = outline.as_mut() {
                outline.lines = *outline.lines.start()..=info.line;
                return ControlFlow::Continue(())
            }

            outline = Some(Self {
                file: info.path.map(Path::to_path_buf),
                lines: info.line..=info.line,
            });
            ControlFlow::Continue(())
        });
        outline
    }

    fn covers(&self, info: &SourceInfo<'_>) -> bool {
        info.path == self.file.as_deref() && self.lines.contains(&info.line)
    }
}


/// Resolve `addr` to a single source location.
///
/// Inlined code makes a symbol report records for multiple source
/// files and line ranges. We attribute the address to the outermost
/// function: among the records inside the outline, the one covering
/// the address wins. If none covers it, the last one inside the
/// outline is used.
///
/// An unknown location is returned if the address does not belong to
/// a symbol.
pub(crate) fn resolve<S>(symbolicator: &S, addr: Addr) -> SourceLocation
where
    S: Symbolicator + ?Sized,
{
    let mut location = SourceLocation::default();

    let Some(owner) = symbolicator.symbol_owner(addr) else {
        trace!("no symbol owner found for {addr:#x}");
        return location
    };
    let Some(symbol) = symbolicator.symbol(&owner, addr) else {
        trace!("no symbol found for {addr:#x}");
        return location
    };
    let Some(outline) = Outline::collect(symbolicator, &symbol) else {
        trace!("symbol containing {addr:#x} has no line information");
        return location
    };

    let () = symbolicator.for_each_source_info(&symbol, &mut |info| {
        if info.line == 0 || !outline.covers(info) {
            return ControlFlow::Continue(())
        }

        location.line = SourceLocation::number(info.line);
        location.column = SourceLocation::number(info.column);

        if info.range.contains(&addr) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    location.file = outline.file;
    location
}
