//! Helpers for retrieving information about the binary image
//! containing this library.
//!
//! Crash reports and profiles are commonly tagged with the build ID of
//! the binary they were captured in, so that the matching debug
//! information can be retrieved later on.
//!
//! ```no_run
//! let build_id = sourceinfo::helper::read_build_id().unwrap();
//! if let Some(build_id) = build_id {
//!     let hex = build_id.iter().map(|b| format!("{b:02x}")).collect::<String>();
//!     println!("build ID: {hex}");
//! }
//! ```

use crate::image::ImageIdentity;
use crate::Result;


/// Read the build ID of the binary image containing this library.
///
/// On macOS this is the image's `LC_UUID` and elsewhere the contents
/// of the GNU build ID note. `Ok(None)` is returned if the image does
/// not carry a build ID.
#[cfg_attr(feature = "tracing", crate::log::instrument)]
pub fn read_build_id() -> Result<Option<Vec<u8>>> {
    let identity = current_image()?;
    Ok(identity.map(|identity| identity.build_id))
}

/// Identify the binary image containing this library.
///
/// See [`ImageIdentity::current`].
#[inline]
pub fn current_image() -> Result<Option<ImageIdentity>> {
    ImageIdentity::current()
}


#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::image::Image;


    /// Check that the build ID helper is consistent with the image's
    /// description.
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn build_id_consistency() {
        let image = Image::current().unwrap().unwrap();
        let build_id = read_build_id().unwrap();
        assert_eq!(build_id, image.build_id);

        if let Some(identity) = current_image().unwrap() {
            assert_eq!(Some(identity.build_id), build_id);
            assert_eq!(identity.path, Image::current().unwrap().unwrap().path);
        }
    }
}
