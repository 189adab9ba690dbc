use std::borrow::Borrow;
use std::borrow::Cow;
use std::error;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io;
use std::str;


/// A result type using our [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;


/// An enum providing a rough classification of errors.
///
/// The variants of this type partly resemble those of
/// [`std::io::Error`], because these are the most common sources of
/// error that the crate concerns itself with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An entity was not found, often a file.
    NotFound,
    /// The operation lacked the necessary privileges to complete.
    PermissionDenied,
    /// An entity already exists.
    AlreadyExists,
    /// A parameter was incorrect.
    InvalidInput,
    /// Data not valid for the operation were encountered.
    InvalidData,
    /// DWARF input data was invalid.
    InvalidDwarf,
    /// This operation is unsupported on this platform.
    Unsupported,
    /// An operation could not be completed, because an "end of file"
    /// was reached prematurely.
    UnexpectedEof,
    /// A custom error that does not fall under any other kind.
    Other,
}

impl ErrorKind {
    /// Retrieve a NUL terminated textual representation of the kind.
    #[doc(hidden)]
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::NotFound => b"entity not found\0",
            Self::PermissionDenied => b"permission denied\0",
            Self::AlreadyExists => b"entity already exists\0",
            Self::InvalidInput => b"invalid input parameter\0",
            Self::InvalidData => b"invalid data\0",
            Self::InvalidDwarf => b"invalid DWARF\0",
            Self::Unsupported => b"unsupported\0",
            Self::UnexpectedEof => b"unexpected end of file\0",
            Self::Other => b"other error\0",
        }
    }

    fn as_str(&self) -> &'static str {
        let bytes = self.as_bytes();
        // SAFETY: All textual representations are ASCII.
        unsafe { str::from_utf8_unchecked(&bytes[..bytes.len() - 1]) }
    }
}


impl From<io::ErrorKind> for ErrorKind {
    fn from(other: io::ErrorKind) -> Self {
        match other {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::InvalidInput => Self::InvalidInput,
            io::ErrorKind::InvalidData => Self::InvalidData,
            io::ErrorKind::Unsupported => Self::Unsupported,
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Other,
        }
    }
}


enum ErrorImpl {
    Io(io::Error),
    #[cfg(feature = "dwarf")]
    Dwarf(gimli::Error),
    Basic {
        kind: ErrorKind,
        message: Cow<'static, str>,
    },
    Context {
        context: Cow<'static, str>,
        source: Box<ErrorImpl>,
    },
}

impl ErrorImpl {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(error) => error.kind().into(),
            #[cfg(feature = "dwarf")]
            Self::Dwarf(..) => ErrorKind::InvalidDwarf,
            Self::Basic { kind, .. } => *kind,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Render the error's own message, excluding any sources.
    fn fmt_self(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Io(error) => Display::fmt(error, f),
            #[cfg(feature = "dwarf")]
            Self::Dwarf(error) => Display::fmt(error, f),
            Self::Basic { kind, message } => {
                if message.is_empty() {
                    f.write_str(kind.as_str())
                } else {
                    f.write_str(message)
                }
            }
            Self::Context { context, .. } => f.write_str(context),
        }
    }

    fn source(&self) -> Option<&ErrorImpl> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}


/// The error type used by the library.
///
/// Errors carry a [kind][ErrorKind] as well as an optional chain of
/// context messages. The alternate representation (`{:#}`) prints the
/// entire chain.
pub struct Error {
    error: Box<ErrorImpl>,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            error: Box::new(ErrorImpl::Basic {
                kind,
                message: message.into(),
            }),
        }
    }

    pub(crate) fn with_not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub(crate) fn with_already_exists(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub(crate) fn with_invalid_data<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(ErrorKind::InvalidData, message.to_string())
    }

    pub(crate) fn with_unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Retrieve a rough error classification in the form of an
    /// [`ErrorKind`].
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    fn layer_context(self, context: Cow<'static, str>) -> Self {
        Self {
            error: Box::new(ErrorImpl::Context {
                context,
                source: self.error,
            }),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut error = Some(&*self.error);
        let mut first = true;
        while let Some(e) = error {
            if !first {
                f.write_str("\n\nCaused by:\n    ")?;
            }
            let () = e.fmt_self(f)?;
            first = false;
            error = e.source();
        }
        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let () = self.error.fmt_self(f)?;

        if f.alternate() {
            let mut error = self.error.source();
            while let Some(e) = error {
                f.write_str(": ")?;
                let () = e.fmt_self(f)?;
                error = e.source();
            }
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.error.borrow() {
            ErrorImpl::Io(error) => error.source(),
            #[cfg(feature = "dwarf")]
            ErrorImpl::Dwarf(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(other: io::Error) -> Self {
        Self {
            error: Box::new(ErrorImpl::Io(other)),
        }
    }
}

#[cfg(feature = "dwarf")]
impl From<gimli::Error> for Error {
    fn from(other: gimli::Error) -> Self {
        Self {
            error: Box::new(ErrorImpl::Dwarf(other)),
        }
    }
}


/// A trait providing ergonomic chaining capabilities to [`Error`].
pub(crate) trait ErrorExt: private::Sealed {
    /// The output type produced by [`context`](Self::context) and
    /// [`with_context`](Self::with_context).
    type Output;

    /// Add context to this error.
    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>;

    /// Add context to this error, using a closure for lazy evaluation.
    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C;
}

impl ErrorExt for Error {
    type Output = Error;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        self.layer_context(context.into())
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        self.layer_context(f().into())
    }
}

impl<T, E> ErrorExt for Result<T, E>
where
    E: ErrorExt,
{
    type Output = Result<T, E::Output>;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(err.context(context)),
        }
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(err.with_context(f)),
        }
    }
}

impl ErrorExt for io::Error {
    type Output = Error;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        Error::from(self).context(context)
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        Error::from(self).with_context(f)
    }
}


/// A trait providing conversion shortcuts for creating `Error`
/// instances.
pub(crate) trait IntoError<T>: private::Sealed
where
    Self: Sized,
{
    fn ok_or_invalid_data<C, F>(self, f: F) -> Result<T, Error>
    where
        C: ToString,
        F: FnOnce() -> C;
}

impl<T> IntoError<T> for Option<T> {
    #[inline]
    fn ok_or_invalid_data<C, F>(self, f: F) -> Result<T, Error>
    where
        C: ToString,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::with_invalid_data(f()))
    }
}


mod private {
    use super::Error;

    pub trait Sealed {}

    impl<T> Sealed for Option<T> {}
    impl<T, E> Sealed for Result<T, E> {}
    impl Sealed for Error {}
    impl Sealed for std::io::Error {}
}
