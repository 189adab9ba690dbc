use std::ffi::c_char;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt as _;
use std::ptr;

use sourceinfo::resolve;
use sourceinfo::Addr;
use sourceinfo::SourceLocation;

use crate::set_last_err;
use crate::slice_from_user_array_mut;
use crate::sourceinfo_err;
#[cfg(doc)]
use crate::sourceinfo_err_last;


/// A resolved source code location.
///
/// A location with `file` set to `NULL`, `line` and `column` set to
/// `0`, and `no_debug_info` unset is unknown.
#[repr(C)]
#[derive(Debug)]
pub struct sourceinfo_location {
    /// The NUL terminated path to the source file or `NULL` if it is
    /// unknown.
    ///
    /// The string is owned by the library and released by
    /// [`sourceinfo_locations_free`].
    pub file: *mut c_char,
    /// The 1-based line number or `0` if it is unknown.
    pub line: u32,
    /// The 1-based column number or `0` if it is unknown.
    pub column: u32,
    /// Set if the location was synthesized without full debug
    /// information.
    pub no_debug_info: bool,
    /// Unused member available for future expansion. Must be
    /// initialized to zero.
    pub reserved: [u8; 7],
}

impl Default for sourceinfo_location {
    fn default() -> Self {
        Self {
            file: ptr::null_mut(),
            line: 0,
            column: 0,
            no_debug_info: false,
            reserved: [0; 7],
        }
    }
}

impl From<SourceLocation> for sourceinfo_location {
    fn from(other: SourceLocation) -> Self {
        let SourceLocation {
            file,
            line,
            column,
            no_debug_info,
        } = other;

        // A path containing a NUL byte can't be represented and is
        // reported as unknown.
        let file = file
            .and_then(|file| CString::new(file.into_os_string().as_bytes()).ok())
            .map(CString::into_raw)
            .unwrap_or_else(ptr::null_mut);

        Self {
            file,
            line: line.unwrap_or_default(),
            column: column.unwrap_or_default(),
            no_debug_info,
            reserved: [0; 7],
        }
    }
}


/// Resolve an instruction address to source code locations.
///
/// Up to `capacity` locations are written to the array pointed to by
/// `locations`, innermost inlined frame first. If more locations are
/// available than fit, the last slot receives the outermost one. The
/// number of locations written is returned; slots beyond it are left
/// untouched. A return value of `0` indicates that no information is
/// available for the address.
///
/// Previous contents of the written slots are overwritten without
/// being released. The written locations have to be released using
/// [`sourceinfo_locations_free`].
///
/// The function sets the thread's last error to
/// [`sourceinfo_err::INVALID_INPUT`] if `locations` is `NULL` while
/// `capacity` is not zero and to [`sourceinfo_err::OK`] otherwise. Use
/// [`sourceinfo_err_last`] to retrieve it.
///
/// # Safety
/// - `locations` needs to point to an array of at least `capacity`
///   valid and writable [`sourceinfo_location`] objects
#[no_mangle]
pub unsafe extern "C" fn sourceinfo_resolve(
    addr: Addr,
    locations: *mut sourceinfo_location,
    capacity: usize,
) -> usize {
    if locations.is_null() && capacity != 0 {
        let () = set_last_err(sourceinfo_err::INVALID_INPUT);
        return 0
    }
    let () = set_last_err(sourceinfo_err::OK);

    if capacity == 0 {
        return 0
    }

    let mut resolved = vec![SourceLocation::default(); capacity];
    let count = resolve(addr, &mut resolved);
    // SAFETY: The caller guarantees that `locations` points to
    //         `capacity` valid objects.
    let slots = unsafe { slice_from_user_array_mut(locations, capacity) };
    for (slot, location) in slots.iter_mut().zip(resolved.into_iter().take(count)) {
        *slot = sourceinfo_location::from(location);
    }
    count
}


/// Release the resources associated with `count` locations written by
/// [`sourceinfo_resolve`].
///
/// The locations themselves are owned by the caller and are reset to
/// the unknown state.
///
/// # Safety
/// - `locations` needs to point to `count` locations as written by
///   [`sourceinfo_resolve`]
/// - the locations must not have been freed already
#[no_mangle]
pub unsafe extern "C" fn sourceinfo_locations_free(
    locations: *mut sourceinfo_location,
    count: usize,
) {
    if locations.is_null() {
        return
    }

    // SAFETY: The caller guarantees that `locations` points to `count`
    //         valid objects.
    let slots = unsafe { slice_from_user_array_mut(locations, count) };
    for slot in slots {
        if !slot.file.is_null() {
            // SAFETY: Non-NULL file names were created via
            //         `CString::into_raw` in `sourceinfo_resolve`.
            let _file = unsafe { CString::from_raw(slot.file) };
        }
        *slot = sourceinfo_location::default();
    }
}
