use std::ptr;

use sourceinfo::helper::read_build_id;

use crate::set_last_err;
use crate::sourceinfo_err;
#[cfg(doc)]
use crate::sourceinfo_err_last;


/// Read the build ID of the binary image containing the library.
///
/// On macOS this is the image's 16 byte `LC_UUID`, elsewhere the
/// contents of the GNU build ID note (typically 20 bytes). Build IDs
/// are reported as "raw" bytes. If you need a hexadecimal
/// representation, a post processing step is necessary.
///
/// On success and when a build ID present, the function returns a
/// pointer to the "raw" build ID bytes and `len`, if provided, is set
/// to the build ID's length. The resulting buffer should be released
/// using [`sourceinfo_build_id_free`] once it is no longer needed.
///
/// On error, the function returns `NULL` and sets the thread's last
/// error to indicate the problem encountered. Use
/// [`sourceinfo_err_last`] to retrieve this error.
///
/// Similarly, if no build ID is present `NULL` is returned and the last
/// error will be set to [`sourceinfo_err::OK`].
///
/// # Safety
/// - `len` needs to be `NULL` or point to valid writable memory
#[no_mangle]
pub unsafe extern "C" fn sourceinfo_read_build_id(len: *mut usize) -> *mut u8 {
    let result = read_build_id();
    let err = result
        .as_ref()
        .map(|_| sourceinfo_err::OK)
        .unwrap_or_else(|err| err.kind().into());
    let () = set_last_err(err);

    // NB: We don't specify what `len` is set to in case of
    //     error, so we don't even attempt to change it below.

    match result {
        Err(..) => ptr::null_mut(),
        Ok(build_id) => {
            if !len.is_null() {
                let n = build_id
                    .as_ref()
                    .map(|build_id| build_id.len())
                    .unwrap_or_default();
                // SAFETY: If `len` is not `NULL`, the caller must
                //         ensure that it points to valid writable
                //         memory.
                let () = unsafe { len.write(n) };
            }

            let Some(build_id) = build_id else {
                return ptr::null_mut()
            };

            let len = build_id.len();
            // SAFETY: `malloc` is always safe to call.
            let dst = unsafe { libc::malloc(len) }.cast::<u8>();
            if dst.is_null() {
                let () = set_last_err(sourceinfo_err::OUT_OF_MEMORY);
            } else {
                // SAFETY: `build_id` is trivially valid and `dst` is
                //         coming from a `malloc` already checked for
                //         `NULL`; hence, it is valid as well here. Both
                //         buffers are `len` bytes in size.
                let () = unsafe { ptr::copy_nonoverlapping(build_id.as_ptr(), dst, len) };
            }
            dst
        }
    }
}

/// Release a build ID as returned by [`sourceinfo_read_build_id`].
///
/// # Safety
/// - `build_id` needs to be `NULL` or a pointer returned by
///   [`sourceinfo_read_build_id`] that was not freed already
#[no_mangle]
pub unsafe extern "C" fn sourceinfo_build_id_free(build_id: *mut u8) {
    // SAFETY: The caller guarantees that the pointer was returned by
    //         `malloc` or is `NULL`.
    let () = unsafe { libc::free(build_id.cast()) };
}
