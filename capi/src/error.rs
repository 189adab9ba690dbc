use std::cell::Cell;
use std::ffi::c_char;

use sourceinfo::ErrorKind;


/// An enum providing a rough classification of errors.
///
/// C ABI compatible version of [`sourceinfo::ErrorKind`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct sourceinfo_err(i16);

impl sourceinfo_err {
    /// The operation was successful.
    pub const OK: Self = Self(0);
    /// An entity was not found, often a file.
    pub const NOT_FOUND: Self = Self(-2);
    /// The operation lacked the necessary privileges to complete.
    pub const PERMISSION_DENIED: Self = Self(-1);
    /// An entity already exists.
    pub const ALREADY_EXISTS: Self = Self(-17);
    /// Data not valid for the operation were encountered.
    pub const INVALID_DATA: Self = Self(-22);
    /// This operation is unsupported on this platform.
    pub const UNSUPPORTED: Self = Self(-95);
    /// An operation could not be completed, because it failed
    /// to allocate enough memory.
    pub const OUT_OF_MEMORY: Self = Self(-12);
    /// A parameter was incorrect.
    pub const INVALID_INPUT: Self = Self(-256);
    /// An error returned when an operation could not be completed
    /// because an "end of file" was reached prematurely.
    pub const UNEXPECTED_EOF: Self = Self(-258);
    /// DWARF input data was invalid.
    pub const INVALID_DWARF: Self = Self(-259);
    /// A custom error that does not fall under any other kind.
    pub const OTHER: Self = Self(-260);
}

impl From<ErrorKind> for sourceinfo_err {
    fn from(other: ErrorKind) -> Self {
        match other {
            ErrorKind::NotFound => Self::NOT_FOUND,
            ErrorKind::PermissionDenied => Self::PERMISSION_DENIED,
            ErrorKind::AlreadyExists => Self::ALREADY_EXISTS,
            ErrorKind::InvalidInput => Self::INVALID_INPUT,
            ErrorKind::InvalidData => Self::INVALID_DATA,
            ErrorKind::InvalidDwarf => Self::INVALID_DWARF,
            ErrorKind::Unsupported => Self::UNSUPPORTED,
            ErrorKind::UnexpectedEof => Self::UNEXPECTED_EOF,
            _ => Self::OTHER,
        }
    }
}


thread_local! {
    /// The error reported by the last fallible API function invoked.
    static LAST_ERR: Cell<sourceinfo_err> = const { Cell::new(sourceinfo_err::OK) };
}

/// Retrieve the error reported by the last fallible API function invoked.
#[no_mangle]
pub extern "C" fn sourceinfo_err_last() -> sourceinfo_err {
    LAST_ERR.with(Cell::get)
}

/// Set the error reported by the last fallible API function invoked.
pub(crate) fn set_last_err(err: sourceinfo_err) {
    LAST_ERR.with(|cell| cell.set(err))
}


/// Retrieve a textual representation of the error code.
///
/// The returned string is statically allocated and must not be freed.
#[no_mangle]
pub extern "C" fn sourceinfo_err_str(err: sourceinfo_err) -> *const c_char {
    let bytes: &'static [u8] = match err {
        sourceinfo_err::OK => b"success\0",
        sourceinfo_err::NOT_FOUND => ErrorKind::NotFound.as_bytes(),
        sourceinfo_err::PERMISSION_DENIED => ErrorKind::PermissionDenied.as_bytes(),
        sourceinfo_err::ALREADY_EXISTS => ErrorKind::AlreadyExists.as_bytes(),
        sourceinfo_err::INVALID_INPUT => ErrorKind::InvalidInput.as_bytes(),
        sourceinfo_err::INVALID_DATA => ErrorKind::InvalidData.as_bytes(),
        sourceinfo_err::INVALID_DWARF => ErrorKind::InvalidDwarf.as_bytes(),
        sourceinfo_err::UNSUPPORTED => ErrorKind::Unsupported.as_bytes(),
        sourceinfo_err::UNEXPECTED_EOF => ErrorKind::UnexpectedEof.as_bytes(),
        sourceinfo_err::OUT_OF_MEMORY => b"out of memory\0",
        _ => ErrorKind::Other.as_bytes(),
    };
    bytes.as_ptr().cast()
}
