use std::ops::Range;
use std::path::PathBuf;

use crate::util::align_up;
use crate::util::Pod;
use crate::util::ReadRaw as _;
use crate::Addr;
use crate::Error;
use crate::Result;

use super::Image;

#[cfg(feature = "dwarf")]
pub(crate) use self::file::ElfFile;


const EI_NIDENT: usize = 16;
pub(crate) const ELFMAG: [u8; 4] = *b"\x7fELF";
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS64: u8 = 2;
#[cfg(target_endian = "little")]
const ELFDATA_NATIVE: u8 = 1;
#[cfg(target_endian = "big")]
const ELFDATA_NATIVE: u8 = 2;

type Elf64_Addr = u64;
type Elf64_Half = u16;
type Elf64_Off = u64;
type Elf64_Word = u32;
type Elf64_Xword = u64;

pub(crate) const PT_LOAD: u32 = 1;
pub(crate) const PT_NOTE: u32 = 4;
pub(crate) const PF_X: u32 = 1;

pub(crate) const NT_GNU_BUILD_ID: Elf64_Word = 3;


#[derive(Debug)]
#[repr(C)]
pub(crate) struct Elf64_Ehdr {
    pub e_ident: [u8; EI_NIDENT], /* ELF "magic number" */
    pub e_type: Elf64_Half,
    pub e_machine: Elf64_Half,
    pub e_version: Elf64_Word,
    pub e_entry: Elf64_Addr, /* Entry point virtual address */
    pub e_phoff: Elf64_Off,  /* Program header table file offset */
    pub e_shoff: Elf64_Off,  /* Section header table file offset */
    pub e_flags: Elf64_Word,
    pub e_ehsize: Elf64_Half,
    pub e_phentsize: Elf64_Half,
    pub e_phnum: Elf64_Half,
    pub e_shentsize: Elf64_Half,
    pub e_shnum: Elf64_Half,
    pub e_shstrndx: Elf64_Half,
}

// SAFETY: `Elf64_Ehdr` is valid for any bit pattern.
unsafe impl Pod for Elf64_Ehdr {}

#[derive(Debug)]
#[repr(C)]
pub(crate) struct Elf64_Nhdr {
    pub n_namesz: Elf64_Word,
    pub n_descsz: Elf64_Word,
    pub n_type: Elf64_Word,
}

// SAFETY: `Elf64_Nhdr` is valid for any bit pattern.
unsafe impl Pod for Elf64_Nhdr {}


/// The parts of a program header that we care about.
///
/// Program headers of a loaded image are handed to us by the dynamic
/// linker in the native word size, so we normalize them into this
/// type.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Segment {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl Segment {
    /// The segment's range of (unrelocated) virtual addresses.
    #[inline]
    fn vaddr_range(&self) -> Range<u64> {
        self.p_vaddr..self.p_vaddr.saturating_add(self.p_memsz)
    }
}


/// Find the first loadable executable segment.
pub(crate) fn code_segment(segments: &[Segment]) -> Option<&Segment> {
    segments
        .iter()
        .find(|segment| segment.p_type == PT_LOAD && segment.p_flags & PF_X != 0)
}

/// Search a buffer of ELF notes for a GNU build ID.
///
/// `align` is the alignment of the note segment; notes are padded to
/// either four or eight bytes.
pub(crate) fn find_build_id(mut notes: &[u8], align: u64) -> Option<&[u8]> {
    let align = if align == 8 { 8 } else { 4 };

    while !notes.is_empty() {
        let header = notes.read_pod::<Elf64_Nhdr>()?;
        let namesz = usize::try_from(header.n_namesz).ok()?;
        let descsz = usize::try_from(header.n_descsz).ok()?;

        let name = notes.read_slice(namesz)?;
        let pad = align_up(namesz, align)? - namesz;
        // The last note may not be padded.
        let _pad = notes.advance(pad.min(notes.len()));

        let desc = notes.read_slice(descsz)?;
        let pad = align_up(descsz, align)? - descsz;
        let _pad = notes.advance(pad.min(notes.len()));

        if header.n_type == NT_GNU_BUILD_ID && name == b"GNU\0" {
            return Some(desc)
        }
    }
    None
}

/// Describe an image loaded at `bias` based on its program headers.
///
/// `read` is used for accessing the memory backing a segment.
pub(crate) fn describe<'mem, F>(
    path: Option<PathBuf>,
    bias: Addr,
    segments: &[Segment],
    read: F,
) -> Result<Option<Image>>
where
    F: Fn(&Segment) -> &'mem [u8],
{
    // The first loaded segment usually maps the ELF header. Use it to
    // double check that we are looking at what we think we are.
    if let Some(first) = segments.iter().find(|segment| segment.p_type == PT_LOAD) {
        if first.p_offset == 0 {
            let data = read(first);
            if !data.starts_with(&ELFMAG) {
                return Err(Error::with_invalid_data(format!(
                    "image at {:#x} does not start with ELF magic",
                    bias.wrapping_add(first.p_vaddr)
                )))
            }
        }
    }

    let Some(code) = code_segment(segments) else {
        return Ok(None)
    };

    let build_id = segments
        .iter()
        .filter(|segment| segment.p_type == PT_NOTE)
        .find_map(|segment| find_build_id(read(segment), segment.p_align))
        .map(<[u8]>::to_vec);

    let code = code.vaddr_range();
    let image = Image {
        path,
        bias,
        text: bias.wrapping_add(code.start)..bias.wrapping_add(code.end),
        build_id,
    };
    Ok(Some(image))
}


#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
mod locate {
    use std::env;
    use std::ffi::c_int;
    use std::ffi::c_void;
    use std::ffi::CStr;
    use std::slice;

    use crate::util::bytes_to_path;

    use super::*;


    struct Search {
        addr: Addr,
        result: Option<Result<Option<Image>>>,
    }

    unsafe extern "C" fn visit(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut c_void,
    ) -> c_int {
        // SAFETY: `data` is the `Search` object we passed to
        //         `dl_iterate_phdr`.
        let search = unsafe { &mut *data.cast::<Search>() };
        // SAFETY: The dynamic linker hands us a valid object.
        let info = unsafe { &*info };

        let bias = Addr::from(info.dlpi_addr);
        let phdrs = if info.dlpi_phdr.is_null() {
            &[][..]
        } else {
            // SAFETY: The dynamic linker guarantees `dlpi_phnum` valid
            //         program headers.
            unsafe { slice::from_raw_parts(info.dlpi_phdr, usize::from(info.dlpi_phnum)) }
        };
        let segments = phdrs
            .iter()
            .map(|phdr| Segment {
                p_type: phdr.p_type,
                p_flags: phdr.p_flags,
                p_offset: u64::from(phdr.p_offset),
                p_vaddr: u64::from(phdr.p_vaddr),
                p_memsz: u64::from(phdr.p_memsz),
                p_align: u64::from(phdr.p_align),
            })
            .collect::<Vec<_>>();

        let contained = segments.iter().any(|segment| {
            let range = segment.vaddr_range();
            segment.p_type == PT_LOAD
                && (bias.wrapping_add(range.start)..bias.wrapping_add(range.end))
                    .contains(&search.addr)
        });
        if !contained {
            return 0
        }

        // The main executable is reported without a name.
        let path = if info.dlpi_name.is_null() || unsafe { *info.dlpi_name } == 0 {
            env::current_exe().ok()
        } else {
            // SAFETY: `dlpi_name` is a valid NUL terminated string.
            let name = unsafe { CStr::from_ptr(info.dlpi_name) };
            Some(bytes_to_path(name.to_bytes()).to_path_buf())
        };

        let read = |segment: &Segment| -> &[u8] {
            let start = bias.wrapping_add(segment.p_vaddr) as usize;
            // SAFETY: Segments of a loaded image stay mapped for as long as
            //         the image is loaded, which holds for the duration of
            //         the callback.
            unsafe { slice::from_raw_parts(start as *const u8, segment.p_memsz as usize) }
        };

        search.result = Some(describe(path, bias, &segments, read));
        // Stop iterating.
        1
    }

    /// Find the loaded image containing `addr`.
    pub(crate) fn locate(addr: Addr) -> Result<Option<Image>> {
        let mut search = Search { addr, result: None };
        let _rc = unsafe {
            libc::dl_iterate_phdr(Some(visit), (&mut search as *mut Search).cast::<c_void>())
        };
        search.result.unwrap_or(Ok(None))
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub(crate) use locate::locate;


#[cfg(feature = "dwarf")]
pub(crate) mod file {
    use std::borrow::Cow;
    use std::ffi::CStr;
    use std::mem::size_of;

    use crate::log::warn;
    use crate::util::Pod;
    use crate::util::ReadRaw as _;
    use crate::Error;
    use crate::ErrorExt as _;
    use crate::IntoError as _;
    use crate::Result;

    use super::Elf64_Addr;
    use super::Elf64_Ehdr;
    use super::Elf64_Off;
    use super::Elf64_Word;
    use super::Elf64_Xword;
    use super::ELFCLASS64;
    use super::ELFDATA_NATIVE;
    use super::ELFMAG;
    use super::EI_CLASS;
    use super::EI_DATA;

    const SHN_UNDEF: usize = 0;
    const SHN_XINDEX: u16 = 0xffff;
    const SHT_NOBITS: Elf64_Word = 8;
    const SHF_COMPRESSED: Elf64_Xword = 1 << 11;
    const ELFCOMPRESS_ZLIB: Elf64_Word = 1;
    const ELFCOMPRESS_ZSTD: Elf64_Word = 2;


    #[derive(Clone, Debug)]
    #[repr(C)]
    pub(crate) struct Elf64_Shdr {
        pub sh_name: Elf64_Word,       /* Section name, index in string tbl */
        pub sh_type: Elf64_Word,       /* Type of section */
        pub sh_flags: Elf64_Xword,     /* Miscellaneous section attributes */
        pub sh_addr: Elf64_Addr,       /* Section virtual addr at execution */
        pub sh_offset: Elf64_Off,      /* Section file offset */
        pub sh_size: Elf64_Xword,      /* Size of section in bytes */
        pub sh_link: Elf64_Word,       /* Index of another section */
        pub sh_info: Elf64_Word,       /* Additional section information */
        pub sh_addralign: Elf64_Xword, /* Section alignment */
        pub sh_entsize: Elf64_Xword,   /* Entry size if section holds table */
    }

    // SAFETY: `Elf64_Shdr` is valid for any bit pattern.
    unsafe impl Pod for Elf64_Shdr {}

    #[derive(Debug)]
    #[repr(C)]
    struct Elf64_Chdr {
        ch_type: Elf64_Word,
        ch_reserved: Elf64_Word,
        ch_size: Elf64_Xword,
        ch_addralign: Elf64_Xword,
    }

    // SAFETY: `Elf64_Chdr` is valid for any bit pattern.
    unsafe impl Pod for Elf64_Chdr {}


    /// A minimal parser for the section table of an ELF file in memory.
    #[derive(Debug)]
    pub(crate) struct ElfFile<'data> {
        data: &'data [u8],
        shdrs: Box<[Elf64_Shdr]>,
        shstrtab: &'data [u8],
    }

    impl<'data> ElfFile<'data> {
        pub(crate) fn parse(data: &'data [u8]) -> Result<Self> {
            let ehdr = { data }
                .read_pod::<Elf64_Ehdr>()
                .ok_or_invalid_data(|| "failed to read ELF header")?;
            if ehdr.e_ident[..ELFMAG.len()] != ELFMAG {
                return Err(Error::with_invalid_data("encountered unexpected ELF magic"))
            }
            if ehdr.e_ident[EI_CLASS] != ELFCLASS64 {
                return Err(Error::with_unsupported("only 64 bit ELF files are supported"))
            }
            if ehdr.e_ident[EI_DATA] != ELFDATA_NATIVE {
                return Err(Error::with_unsupported(
                    "ELF files of non-native byte order are not supported",
                ))
            }

            let shdrs = Self::parse_shdrs(data, &ehdr).context("failed to read section headers")?;
            let shstrndx = if ehdr.e_shstrndx == SHN_XINDEX {
                shdrs.first().map(|shdr| shdr.sh_link as usize).unwrap_or(SHN_UNDEF)
            } else {
                usize::from(ehdr.e_shstrndx)
            };

            let shstrtab = match shdrs.get(shstrndx) {
                Some(shdr) if shstrndx != SHN_UNDEF => Self::raw_data(data, shdr)?,
                _ => &[],
            };

            let slf = Self {
                data,
                shdrs,
                shstrtab,
            };
            Ok(slf)
        }

        fn parse_shdrs(data: &[u8], ehdr: &Elf64_Ehdr) -> Result<Box<[Elf64_Shdr]>> {
            if ehdr.e_shoff == 0 {
                return Ok(Box::default())
            }

            let offset = usize::try_from(ehdr.e_shoff).map_err(Error::with_invalid_data)?;
            let mut table = data
                .get(offset..)
                .ok_or_invalid_data(|| "section header offset out of bounds")?;

            // The real number of sections is stored in the first section
            // header if it does not fit into `e_shnum`.
            let count = if ehdr.e_shnum == 0 {
                let first = { table }
                    .read_pod::<Elf64_Shdr>()
                    .ok_or_invalid_data(|| "failed to read first section header")?;
                usize::try_from(first.sh_size).map_err(Error::with_invalid_data)?
            } else {
                usize::from(ehdr.e_shnum)
            };

            let () = table
                .ensure(count.saturating_mul(size_of::<Elf64_Shdr>()))
                .ok_or_invalid_data(|| format!("ELF file does not contain {count} section headers"))?;

            let shdrs = (0..count)
                .map(|_| table.read_pod::<Elf64_Shdr>())
                .collect::<Option<Box<[_]>>>()
                .ok_or_invalid_data(|| "failed to read section header")?;
            Ok(shdrs)
        }

        fn raw_data(data: &'data [u8], shdr: &Elf64_Shdr) -> Result<&'data [u8]> {
            if shdr.sh_type == SHT_NOBITS {
                return Ok(&[])
            }

            let start = usize::try_from(shdr.sh_offset).map_err(Error::with_invalid_data)?;
            let size = usize::try_from(shdr.sh_size).map_err(Error::with_invalid_data)?;
            let end = start
                .checked_add(size)
                .ok_or_invalid_data(|| "section size overflows")?;
            data.get(start..end)
                .ok_or_invalid_data(|| format!("section data {start:#x}..{end:#x} out of bounds"))
        }

        fn section_name(&self, shdr: &Elf64_Shdr) -> Option<&'data CStr> {
            let name = self.shstrtab.get(shdr.sh_name as usize..)?;
            CStr::from_bytes_until_nul(name).ok()
        }

        /// Find the section with the given name.
        pub(crate) fn find_section(&self, name: &str) -> Option<&Elf64_Shdr> {
            self.shdrs
                .iter()
                .skip(1)
                .find(|shdr| self.section_name(shdr).map(CStr::to_bytes) == Some(name.as_bytes()))
        }

        /// Retrieve the (decompressed, if necessary) data of a section.
        pub(crate) fn section_data(&self, shdr: &Elf64_Shdr) -> Result<Cow<'data, [u8]>> {
            let mut data = Self::raw_data(self.data, shdr)?;
            if shdr.sh_flags & SHF_COMPRESSED == 0 {
                return Ok(Cow::Borrowed(data))
            }

            let chdr = data
                .read_pod::<Elf64_Chdr>()
                .ok_or_invalid_data(|| "failed to read compression header")?;
            let size = usize::try_from(chdr.ch_size).map_err(Error::with_invalid_data)?;
            let decompressed = match chdr.ch_type {
                ELFCOMPRESS_ZLIB => decompress_zlib(data, size)?,
                ELFCOMPRESS_ZSTD => decompress_zstd(data, size)?,
                ty => {
                    warn!("encountered unsupported section compression type {ty}");
                    return Err(Error::with_unsupported(format!(
                        "section compression type {ty} is not supported"
                    )))
                }
            };

            if decompressed.len() != size {
                return Err(Error::with_invalid_data(format!(
                    "decompressed section has unexpected size {} (expected {size})",
                    decompressed.len()
                )))
            }
            Ok(Cow::Owned(decompressed))
        }
    }


    #[cfg(feature = "zlib")]
    fn decompress_zlib(data: &[u8], size: usize) -> Result<Vec<u8>> {
        miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(data, size).map_err(|err| {
            Error::with_invalid_data(format!("failed to decompress zlib section: {err}"))
        })
    }

    #[cfg(not(feature = "zlib"))]
    fn decompress_zlib(_data: &[u8], _size: usize) -> Result<Vec<u8>> {
        Err(Error::with_unsupported(
            "zlib compressed sections require the `zlib` feature",
        ))
    }

    #[cfg(feature = "zstd")]
    fn decompress_zstd(data: &[u8], size: usize) -> Result<Vec<u8>> {
        zstd::bulk::decompress(data, size).context("failed to decompress zstd section")
    }

    #[cfg(not(feature = "zstd"))]
    fn decompress_zstd(_data: &[u8], _size: usize) -> Result<Vec<u8>> {
        Err(Error::with_unsupported(
            "zstd compressed sections require the `zstd` feature",
        ))
    }


    #[cfg(test)]
    pub(crate) mod tests {
        use super::*;

        use std::env::current_exe;
        use std::fs::read as read_file;

        use test_log::test;

        use crate::ErrorKind;


        /// Serialize a section header.
        fn shdr_bytes(shdr: &Elf64_Shdr) -> Vec<u8> {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&shdr.sh_name.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_type.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_flags.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_addr.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_offset.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_size.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_link.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_info.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_addralign.to_ne_bytes());
            bytes.extend_from_slice(&shdr.sh_entsize.to_ne_bytes());
            bytes
        }

        /// Create an in-memory ELF file containing the provided sections,
        /// each given as (name, flags, data).
        pub(crate) fn build_elf(sections: &[(&str, u64, &[u8])]) -> Vec<u8> {
            const EHDR_SIZE: usize = 64;

            let mut shstrtab = vec![0u8];
            let mut names = Vec::new();
            for name in sections.iter().map(|(name, ..)| *name).chain([".shstrtab"]) {
                names.push(shstrtab.len() as u32);
                shstrtab.extend_from_slice(name.as_bytes());
                shstrtab.push(0);
            }

            let mut body = Vec::new();
            let mut shdrs = vec![Elf64_Shdr {
                sh_name: 0,
                sh_type: 0,
                sh_flags: 0,
                sh_addr: 0,
                sh_offset: 0,
                sh_size: 0,
                sh_link: 0,
                sh_info: 0,
                sh_addralign: 0,
                sh_entsize: 0,
            }];
            let contents = sections
                .iter()
                .map(|(_, flags, data)| (*flags, *data))
                .chain([(0, shstrtab.as_slice())]);
            for ((flags, data), name) in contents.zip(&names) {
                let offset = EHDR_SIZE + body.len();
                body.extend_from_slice(data);
                shdrs.push(Elf64_Shdr {
                    sh_name: *name,
                    sh_type: 1,
                    sh_flags: flags,
                    sh_addr: 0,
                    sh_offset: offset as u64,
                    sh_size: data.len() as u64,
                    sh_link: 0,
                    sh_info: 0,
                    sh_addralign: 1,
                    sh_entsize: 0,
                });
            }

            let shoff = (EHDR_SIZE + body.len()) as u64;
            let mut elf = Vec::new();
            let mut ident = [0u8; 16];
            ident[..4].copy_from_slice(&ELFMAG);
            ident[EI_CLASS] = ELFCLASS64;
            ident[EI_DATA] = ELFDATA_NATIVE;
            ident[6] = 1;
            elf.extend_from_slice(&ident);
            elf.extend_from_slice(&1u16.to_ne_bytes()); // e_type
            elf.extend_from_slice(&62u16.to_ne_bytes()); // e_machine
            elf.extend_from_slice(&1u32.to_ne_bytes()); // e_version
            elf.extend_from_slice(&0u64.to_ne_bytes()); // e_entry
            elf.extend_from_slice(&0u64.to_ne_bytes()); // e_phoff
            elf.extend_from_slice(&shoff.to_ne_bytes()); // e_shoff
            elf.extend_from_slice(&0u32.to_ne_bytes()); // e_flags
            elf.extend_from_slice(&(EHDR_SIZE as u16).to_ne_bytes()); // e_ehsize
            elf.extend_from_slice(&0u16.to_ne_bytes()); // e_phentsize
            elf.extend_from_slice(&0u16.to_ne_bytes()); // e_phnum
            elf.extend_from_slice(&(size_of::<Elf64_Shdr>() as u16).to_ne_bytes());
            elf.extend_from_slice(&(shdrs.len() as u16).to_ne_bytes());
            elf.extend_from_slice(&((shdrs.len() - 1) as u16).to_ne_bytes());
            assert_eq!(elf.len(), EHDR_SIZE);

            elf.extend_from_slice(&body);
            for shdr in &shdrs {
                elf.extend_from_slice(&shdr_bytes(shdr));
            }
            elf
        }

        /// Prefix `data` with a compression header of the given type.
        pub(crate) fn compressed(ch_type: u32, size: usize, data: &[u8]) -> Vec<u8> {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&ch_type.to_ne_bytes());
            bytes.extend_from_slice(&0u32.to_ne_bytes());
            bytes.extend_from_slice(&(size as u64).to_ne_bytes());
            bytes.extend_from_slice(&1u64.to_ne_bytes());
            bytes.extend_from_slice(data);
            bytes
        }


        /// Check that we can look up sections by name in a synthetic ELF
        /// file.
        #[test]
        fn section_lookup() {
            let elf = build_elf(&[(".text", 0, b"\x90\x90"), (".debug_line", 0, b"lines")]);
            let file = ElfFile::parse(&elf).unwrap();

            let shdr = file.find_section(".debug_line").unwrap();
            assert_eq!(&*file.section_data(shdr).unwrap(), b"lines");

            let shdr = file.find_section(".text").unwrap();
            assert_eq!(&*file.section_data(shdr).unwrap(), b"\x90\x90");

            assert!(file.find_section(".debug_info").is_none());
            assert!(file.find_section("").is_none());
        }

        /// Make sure that zlib compressed sections are inflated.
        #[cfg(feature = "zlib")]
        #[test]
        fn zlib_section_decompression() {
            let content = b"the quick brown fox jumps over the lazy dog".repeat(8);
            let deflated = miniz_oxide::deflate::compress_to_vec_zlib(&content, 6);
            let section = compressed(ELFCOMPRESS_ZLIB, content.len(), &deflated);
            let elf = build_elf(&[(".debug_str", SHF_COMPRESSED, &section)]);

            let file = ElfFile::parse(&elf).unwrap();
            let shdr = file.find_section(".debug_str").unwrap();
            let data = file.section_data(shdr).unwrap();
            assert_eq!(&*data, content.as_slice());
        }

        /// Check that we report unsupported compression types and size
        /// mismatches.
        #[test]
        fn bogus_compression() {
            let section = compressed(42, 4, b"abcd");
            let elf = build_elf(&[(".debug_str", SHF_COMPRESSED, &section)]);
            let file = ElfFile::parse(&elf).unwrap();
            let shdr = file.find_section(".debug_str").unwrap();
            let err = file.section_data(shdr).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported);

            // Too short to even hold a compression header.
            let elf = build_elf(&[(".debug_str", SHF_COMPRESSED, b"abcd")]);
            let file = ElfFile::parse(&elf).unwrap();
            let shdr = file.find_section(".debug_str").unwrap();
            let err = file.section_data(shdr).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData);
        }

        /// Make sure that we reject data that is not an ELF file.
        #[test]
        fn invalid_elf() {
            let err = ElfFile::parse(b"\x7fELF").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData);

            let mut elf = build_elf(&[]);
            elf[0] = b'E';
            let err = ElfFile::parse(&elf).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData);

            let mut elf = build_elf(&[]);
            elf[EI_CLASS] = 1;
            let err = ElfFile::parse(&elf).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported);

            // Section header table pointing past the end of the file.
            let mut elf = build_elf(&[]);
            let () = elf.truncate(elf.len() - 1);
            let err = ElfFile::parse(&elf).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData);
        }

        /// Check that we can parse the running test binary.
        #[cfg(target_os = "linux")]
        #[test]
        fn parse_own_executable() {
            let data = read_file(current_exe().unwrap()).unwrap();
            let file = ElfFile::parse(&data).unwrap();
            let shdr = file.find_section(".text").unwrap();
            assert_ne!(shdr.sh_size, 0);
        }
    }
}
