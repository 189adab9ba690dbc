use std::path::Path;
use std::path::PathBuf;


/// A resolved source code location.
///
/// A default constructed `SourceLocation` represents an unknown
/// location, which is distinguishable from any actual resolution result
/// (see [`SourceLocation::is_unknown`]).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceLocation {
    /// The path to the source file, if known.
    pub file: Option<PathBuf>,
    /// The 1-based line number, if known.
    pub line: Option<u32>,
    /// The 1-based column number, if known.
    pub column: Option<u32>,
    /// Set if the location was synthesized without full debug
    /// information, e.g., because the address could be attributed to a
    /// function but not to a line.
    pub no_debug_info: bool,
}

impl SourceLocation {
    /// Check whether this object represents an unknown location.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.file.is_none() && self.line.is_none() && self.column.is_none() && !self.no_debug_info
    }

    /// Convert a backend provided line or column number into our
    /// representation, mapping `0` to "unknown".
    #[inline]
    pub(crate) fn number(value: u32) -> Option<u32> {
        (value != 0).then_some(value)
    }

    /// Fill in the location from backend data.
    ///
    /// `file` is copied, because backend buffers are only valid for the
    /// duration of a callback.
    pub(crate) fn assign(
        &mut self,
        file: Option<&Path>,
        line: Option<u32>,
        column: Option<u32>,
        no_debug_info: bool,
    ) {
        match (&mut self.file, file) {
            // Reuse the existing allocation, if any.
            (Some(dst), Some(src)) => {
                let () = dst.clear();
                let () = dst.push(src);
            }
            (dst, src) => *dst = src.map(Path::to_path_buf),
        }
        self.line = line;
        self.column = column;
        self.no_debug_info = no_debug_info;
    }
}


/// A write cursor over a caller provided, fixed capacity buffer of
/// [`SourceLocation`] objects.
///
/// The buffer is never resized. Once it is full, every additional
/// location replaces the last slot, so that the last location received
/// (typically the outermost, non-inlined frame) is preserved over an
/// arbitrary inlined one.
#[derive(Debug)]
pub(crate) struct Sink<'buf> {
    slots: &'buf mut [SourceLocation],
    cursor: usize,
}

impl<'buf> Sink<'buf> {
    pub(crate) fn new(slots: &'buf mut [SourceLocation]) -> Self {
        Self { slots, cursor: 0 }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of slots written so far.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.cursor
    }

    /// Retrieve the next slot to write to, advancing the cursor.
    ///
    /// Returns `None` only if the buffer has no capacity at all.
    pub(crate) fn next_slot(&mut self) -> Option<&mut SourceLocation> {
        if self.cursor == self.slots.len() {
            self.cursor = self.cursor.checked_sub(1)?;
        }

        let slot = self.slots.get_mut(self.cursor)?;
        self.cursor += 1;
        Some(slot)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;


    fn loc(line: u32) -> SourceLocation {
        SourceLocation {
            file: Some(PathBuf::from("main.kt")),
            line: Some(line),
            column: None,
            no_debug_info: false,
        }
    }


    /// Check that default constructed locations are "unknown" and that
    /// any bit of information makes them known.
    #[test]
    fn unknown_location() {
        let location = SourceLocation::default();
        assert!(location.is_unknown());

        let location = SourceLocation {
            no_debug_info: true,
            ..Default::default()
        };
        assert!(!location.is_unknown());

        assert!(!loc(1).is_unknown());
    }

    /// Check that `assign` overwrites all attributes.
    #[test]
    fn location_assignment() {
        let mut location = loc(3);
        let () = location.assign(Some(Path::new("/src/lib.kt")), Some(9), Some(2), false);
        assert_eq!(location.file.as_deref(), Some(Path::new("/src/lib.kt")));
        assert_eq!(location.line, Some(9));
        assert_eq!(location.column, Some(2));

        let () = location.assign(None, None, None, true);
        assert_eq!(location.file, None);
        assert_eq!(location.line, None);
        assert!(location.no_debug_info);

        assert_eq!(SourceLocation::number(0), None);
        assert_eq!(SourceLocation::number(7), Some(7));
    }

    /// Make sure that a sink without capacity never hands out slots.
    #[test]
    fn empty_sink() {
        let mut sink = Sink::new(&mut []);
        assert_eq!(sink.capacity(), 0);
        assert!(sink.next_slot().is_none());
        assert_eq!(sink.len(), 0);
    }

    /// Check that an overflowing sink keeps replacing its last slot.
    #[test]
    fn sink_overflow() {
        let mut slots = vec![SourceLocation::default(); 2];
        let mut sink = Sink::new(&mut slots);

        for line in 1..=5 {
            *sink.next_slot().unwrap() = loc(line);
        }
        assert_eq!(sink.len(), 2);
        assert_eq!(slots, vec![loc(1), loc(5)]);
    }

    /// Check that a sink only touches the slots it hands out.
    #[test]
    fn sink_partial_use() {
        let mut slots = vec![SourceLocation::default(); 4];
        let mut sink = Sink::new(&mut slots);
        *sink.next_slot().unwrap() = loc(1);
        assert_eq!(sink.len(), 1);

        assert_eq!(slots[0], loc(1));
        assert!(slots[1..].iter().all(SourceLocation::is_unknown));
    }
}
