//! Identification of the loaded binary image containing this library.

#[allow(non_camel_case_types)]
#[cfg_attr(
    not(any(target_os = "linux", target_os = "android", target_os = "freebsd")),
    allow(dead_code)
)]
pub(crate) mod elf;
#[allow(non_camel_case_types)]
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) mod macho;

use std::ops::Range;
use std::path::PathBuf;

use crate::Addr;
use crate::Result;


/// A loaded binary image, as found in the process' address space.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Image {
    /// The path to the image's file, if known.
    pub path: Option<PathBuf>,
    /// The difference between the addresses at which the image is
    /// loaded and those stated in the file.
    pub bias: Addr,
    /// The (relocated) address range covered by the image's code.
    pub text: Range<Addr>,
    /// The image's build ID, if it carries one.
    pub build_id: Option<Vec<u8>>,
}

impl Image {
    /// Find the loaded image containing `addr`.
    ///
    /// `Ok(None)` is returned if no image contains the address or if
    /// the image lacks an executable code segment.
    pub(crate) fn containing(addr: Addr) -> Result<Option<Self>> {
        locate(addr)
    }

    /// Find the loaded image containing this library.
    pub(crate) fn current() -> Result<Option<Self>> {
        let addr = Self::current as fn() -> Result<Option<Self>> as usize as Addr;
        Self::containing(addr)
    }

    /// Convert the image into its identity, which requires a build ID.
    pub(crate) fn into_identity(self) -> Option<ImageIdentity> {
        let Self {
            path,
            bias,
            text,
            build_id,
        } = self;

        Some(ImageIdentity {
            path,
            bias,
            text,
            build_id: build_id?,
            _non_exhaustive: (),
        })
    }
}


/// The identity of a loaded binary image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageIdentity {
    /// The path to the image's file, if known.
    pub path: Option<PathBuf>,
    /// The difference between the addresses at which the image is
    /// loaded and those stated in its file.
    pub bias: Addr,
    /// The address range spanned by the image's executable code
    /// segment, as loaded into the process.
    pub text: Range<Addr>,
    /// The image's unique build identifier.
    ///
    /// This is the 16 byte `LC_UUID` on Mach-O systems and the contents
    /// of the GNU build ID note (typically 20 bytes) for ELF.
    pub build_id: Vec<u8>,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub(crate) _non_exhaustive: (),
}

impl ImageIdentity {
    /// Identify the loaded image containing this library.
    ///
    /// `Ok(None)` is returned if the image could not be found or if it
    /// lacks a code segment or build identifier.
    pub fn current() -> Result<Option<Self>> {
        let image = Image::current()?;
        Ok(image.and_then(Image::into_identity))
    }
}


#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
use elf::locate;
#[cfg(target_os = "macos")]
use macho::locate;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "macos"
)))]
fn locate(_addr: Addr) -> Result<Option<Image>> {
    use crate::Error;

    Err(Error::with_unsupported(
        "locating loaded images is not supported on this platform",
    ))
}
