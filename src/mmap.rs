use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap as Mapping;
use memmap2::MmapOptions;

use crate::Error;
use crate::ErrorExt as _;
use crate::Result;


/// A read-only memory mapping of an entire file.
#[derive(Debug)]
pub(crate) struct Mmap {
    /// The actual memory mapping, absent for empty files.
    mapping: Option<Mapping>,
}

impl Mmap {
    /// Memory map the file at the provided `path`.
    pub(crate) fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        Self::map(&file)
    }

    /// Map the provided file into memory, in its entirety.
    pub(crate) fn map(file: &File) -> Result<Self> {
        let len = libc::size_t::try_from(file.metadata()?.len())
            .map_err(Error::with_invalid_data)
            .context("file is too large to mmap")?;

        // The kernel does not allow mmap'ing a region of size 0. We
        // want to enable this case transparently, though.
        let mapping = if len == 0 {
            None
        } else {
            Some(unsafe { MmapOptions::new().len(len).map(file) }?)
        };
        Ok(Self { mapping })
    }
}

impl Deref for Mmap {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.mapping.as_deref().unwrap_or(&[])
    }
}
