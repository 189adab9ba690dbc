use std::borrow::Cow;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::mem;
use std::ops::ControlFlow;
use std::ops::Deref as _;
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;
use std::sync::TryLockError;

use addr2line::Context;
use gimli::Dwarf;
use gimli::EndianSlice;
use gimli::NativeEndian;
use gimli::SectionId;

use crate::image::elf::ElfFile;
use crate::image::Image;
use crate::log::debug;
use crate::log::warn;
use crate::mmap::Mmap;
use crate::once::OnceFallible;
use crate::Addr;
use crate::Error;
use crate::ErrorExt as _;
use crate::ErrorKind;
use crate::Result;
use crate::SourceLocation;

use super::LineRecord;
use super::LineWalk;


/// The gimli reader type we use.
type R<'dat> = EndianSlice<'dat, NativeEndian>;


fn load_section(
    elf: &ElfFile<'static>,
    id: SectionId,
    decompressed: &mut Vec<Box<[u8]>>,
) -> Result<R<'static>> {
    let Some(shdr) = elf.find_section(id.name()) else {
        // Make sure to return empty data if a section does not exist.
        return Ok(EndianSlice::new(&[], NativeEndian))
    };

    let data = match elf.section_data(shdr) {
        Ok(Cow::Borrowed(data)) => data,
        Ok(Cow::Owned(data)) => {
            let data = data.into_boxed_slice();
            // SAFETY: The heap allocation backing `data` does not move
            //         when the box is, and it is kept alive alongside the
            //         DWARF context referencing it.
            let slice = unsafe { mem::transmute::<&[u8], &'static [u8]>(&data) };
            let () = decompressed.push(data);
            slice
        }
        Err(err) if err.kind() == ErrorKind::Unsupported => {
            warn!("ignoring section `{}`: {err}", id.name());
            &[]
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read section `{}`", id.name()))
        }
    };
    Ok(EndianSlice::new(data, NativeEndian))
}


/// A line table engine for a single ELF image.
pub(crate) struct Engine {
    /// The DWARF context.
    /// SAFETY: We must not hand out references with a 'static lifetime to
    ///         this member. Furthermore, this member has to be listed
    ///         before `_decompressed` and `_mmap` to make sure we never
    ///         end up with a dangling reference.
    context: Mutex<Context<R<'static>>>,
    /// The (relocated) address range of the image's code.
    text: Range<Addr>,
    /// The image's load bias.
    bias: Addr,
    /// Decompressed section data referenced by `context`.
    _decompressed: Vec<Box<[u8]>>,
    /// The memory mapped image file referenced by `context`.
    _mmap: Mmap,
}

impl Engine {
    /// Retrieve the engine for the image containing this library,
    /// attempting its creation on first use.
    pub(crate) fn get() -> Option<&'static Self> {
        static ENGINE: OnceFallible<Engine> = OnceFallible::new();

        ENGINE.get_or_init("DWARF line table engine", || {
            let image = Image::current()?
                .ok_or_else(|| Error::with_not_found("failed to find image containing library"))?;
            Self::open(image)
        })
    }

    /// Create an engine for the provided loaded image.
    pub(crate) fn open(image: Image) -> Result<Self> {
        let Image {
            path, bias, text, ..
        } = image;
        let path = path.ok_or_else(|| Error::with_not_found("path of image is unknown"))?;
        debug!("creating line table engine for `{}`", path.display());

        let mmap = Mmap::open(&path)?;
        // We transmute the mmap's lifetime to static here as that is a
        // necessity for self-referentiality.
        // SAFETY: We never hand out any 'static references to mapped
        //         data.
        let data = unsafe { mem::transmute::<&[u8], &'static [u8]>(mmap.deref()) };
        let elf = ElfFile::parse(data)
            .with_context(|| format!("failed to parse ELF file `{}`", path.display()))?;

        let mut decompressed = Vec::new();
        let dwarf = Dwarf::load(|id| load_section(&elf, id, &mut decompressed))?;
        let context = Context::from_dwarf(dwarf)?;

        let slf = Self {
            context: Mutex::new(context),
            text,
            bias,
            _decompressed: decompressed,
            _mmap: mmap,
        };
        Ok(slf)
    }
}

impl LineWalk for Engine {
    fn walk(
        &self,
        addr: Addr,
        f: &mut dyn FnMut(&LineRecord<'_>) -> ControlFlow<()>,
    ) -> Result<()> {
        if !self.text.contains(&addr) {
            return Ok(())
        }

        // Resolution may happen on a thread handling a crash of another
        // one that is stuck inside the engine. Never wait for it.
        let context = match self.context.try_lock() {
            Ok(context) => context,
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("line table engine is busy; skipping lookup of {addr:#x}");
                return Ok(())
            }
        };
        let file_addr = addr.wrapping_sub(self.bias);
        let mut frames = context.find_frames(file_addr).skip_all_loads()?;

        while let Some(frame) = frames.next()? {
            let record = match (&frame.location, &frame.function) {
                (Some(location), _) => LineRecord {
                    file: location.file.map(Path::new),
                    line: location.line.and_then(SourceLocation::number),
                    column: location.column.and_then(SourceLocation::number),
                    no_debug_info: location.line.is_none(),
                },
                // The frame could be attributed to a function only.
                (None, Some(_function)) => LineRecord {
                    no_debug_info: true,
                    ..Default::default()
                },
                (None, None) => continue,
            };

            if f(&record).is_break() {
                return Ok(())
            }
        }
        Ok(())
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Engine")
            .field("text", &format_args!("{:#x}..{:#x}", self.text.start, self.text.end))
            .field("bias", &format_args!("{:#x}", self.bias))
            .finish()
    }
}
