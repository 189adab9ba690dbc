//! C API bindings for the library.
//!
//! The bindings allow a runtime's stack trace formatting code, which
//! is typically not written in Rust, to resolve instruction addresses
//! to source code locations:
//! ```c
//! struct sourceinfo_location locations[4] = {0};
//! size_t count = sourceinfo_resolve(addr, locations, 4);
//! for (size_t i = 0; i < count; i++) {
//!   printf("%s:%u:%u\n", locations[i].file, locations[i].line, locations[i].column);
//! }
//! sourceinfo_locations_free(locations, count);
//! ```

#![allow(
    clippy::collapsible_if,
    clippy::fn_to_numeric_cast,
    clippy::let_and_return,
    clippy::let_unit_value
)]
#![deny(unsafe_op_in_unsafe_fn)]


#[allow(non_camel_case_types)]
mod error;
mod helper;
#[allow(non_camel_case_types)]
mod resolve;
#[allow(non_camel_case_types)]
mod trace;

use std::ptr::NonNull;
use std::slice;

pub use error::*;
pub use helper::*;
pub use resolve::*;
pub use trace::*;


/// "Safely" create a mutable slice from a user provided array.
///
/// # Safety
/// The caller needs to make sure that `items` is `NULL` with
/// `num_items` being zero or that it points to `num_items` properly
/// aligned and initialized objects that are not aliased otherwise.
pub(crate) unsafe fn slice_from_user_array_mut<'t, T>(
    items: *mut T,
    num_items: usize,
) -> &'t mut [T] {
    let items = if items.is_null() {
        // `slice::from_raw_parts_mut` requires a properly aligned
        // non-NULL pointer. Craft one.
        NonNull::dangling().as_ptr()
    } else {
        items
    };
    unsafe { slice::from_raw_parts_mut(items, num_items) }
}
