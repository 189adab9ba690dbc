use std::mem::size_of;
use std::ops::Range;

use crate::util::Pod;
use crate::util::ReadRaw as _;
use crate::Error;
use crate::IntoError as _;
use crate::Result;

const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_MAGIC: u32 = 0xfeed_face;

const LC_SEGMENT_64: u32 = 0x19;
const LC_UUID: u32 = 0x1b;

/// The name of the segment containing an image's executable code.
const TEXT_SEGMENT: &[u8] = b"__TEXT";


#[derive(Debug)]
#[repr(C)]
pub(crate) struct mach_header_64 {
    pub magic: u32,
    pub cputype: i32,
    pub cpusubtype: i32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

// SAFETY: `mach_header_64` is valid for any bit pattern.
unsafe impl Pod for mach_header_64 {}

#[derive(Debug)]
#[repr(C)]
struct load_command {
    cmd: u32,
    cmdsize: u32,
}

// SAFETY: `load_command` is valid for any bit pattern.
unsafe impl Pod for load_command {}

#[derive(Debug)]
#[repr(C)]
struct segment_command_64 {
    cmd: u32,
    cmdsize: u32,
    segname: [u8; 16],
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    maxprot: i32,
    initprot: i32,
    nsects: u32,
    flags: u32,
}

// SAFETY: `segment_command_64` is valid for any bit pattern.
unsafe impl Pod for segment_command_64 {}

#[derive(Debug)]
#[repr(C)]
struct uuid_command {
    cmd: u32,
    cmdsize: u32,
    uuid: [u8; 16],
}

// SAFETY: `uuid_command` is valid for any bit pattern.
unsafe impl Pod for uuid_command {}


/// Information gathered from a Mach-O image's load commands.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct LoadCommands {
    /// The (unslid) virtual address range of the `__TEXT` segment.
    pub text: Option<Range<u64>>,
    /// The image's UUID.
    pub uuid: Option<[u8; 16]>,
}


/// Read and validate a 64 bit Mach-O header.
pub(crate) fn parse_header(mut data: &[u8]) -> Result<mach_header_64> {
    let header = data
        .read_pod::<mach_header_64>()
        .ok_or_invalid_data(|| "failed to read Mach-O header")?;
    match header.magic {
        MH_MAGIC_64 => Ok(header),
        MH_MAGIC => Err(Error::with_unsupported("32 bit Mach-O images are not supported")),
        magic => Err(Error::with_invalid_data(format!(
            "encountered unexpected Mach-O magic {magic:#x}"
        ))),
    }
}

/// Walk the load commands of the Mach-O image whose header and load
/// commands are contained in `data`.
pub(crate) fn parse_load_commands(data: &[u8]) -> Result<LoadCommands> {
    let header = parse_header(data)?;
    let size = usize::try_from(header.sizeofcmds).map_err(Error::with_invalid_data)?;
    let mut cmds = data
        .get(size_of::<mach_header_64>()..)
        .and_then(|cmds| cmds.get(..size))
        .ok_or_invalid_data(|| "Mach-O load commands are out of bounds")?;

    let mut result = LoadCommands::default();
    for _ in 0..header.ncmds {
        let lc = { cmds }
            .read_pod::<load_command>()
            .ok_or_invalid_data(|| "failed to read load command")?;
        let cmdsize = usize::try_from(lc.cmdsize).map_err(Error::with_invalid_data)?;
        if cmdsize < size_of::<load_command>() {
            return Err(Error::with_invalid_data(format!(
                "encountered load command with invalid size {cmdsize}"
            )))
        }

        let mut cmd = cmds
            .read_slice(cmdsize)
            .ok_or_invalid_data(|| "load command exceeds load command area")?;
        match lc.cmd {
            LC_SEGMENT_64 => {
                let segment = cmd
                    .read_pod::<segment_command_64>()
                    .ok_or_invalid_data(|| "failed to read segment load command")?;
                let name = segment.segname.split(|b| *b == 0).next().unwrap_or_default();
                if name == TEXT_SEGMENT && result.text.is_none() {
                    let end = segment
                        .vmaddr
                        .checked_add(segment.vmsize)
                        .ok_or_invalid_data(|| "__TEXT segment size overflows")?;
                    result.text = Some(segment.vmaddr..end);
                }
            }
            LC_UUID => {
                let uuid = cmd
                    .read_pod::<uuid_command>()
                    .ok_or_invalid_data(|| "failed to read UUID load command")?;
                result.uuid = Some(uuid.uuid);
            }
            _ => (),
        }
    }
    Ok(result)
}


#[cfg(target_os = "macos")]
mod locate {
    use std::ffi::c_void;
    use std::ffi::CStr;
    use std::mem::MaybeUninit;
    use std::slice;

    use crate::image::Image;
    use crate::util::bytes_to_path;
    use crate::Addr;

    use super::*;


    /// Find the loaded image containing `addr`.
    pub(crate) fn locate(addr: Addr) -> Result<Option<Image>> {
        let mut info = MaybeUninit::<libc::Dl_info>::zeroed();
        let rc = unsafe { libc::dladdr(addr as usize as *const c_void, info.as_mut_ptr()) };
        if rc == 0 {
            return Ok(None)
        }

        // SAFETY: `dladdr` initialized the object on success.
        let info = unsafe { info.assume_init() };
        if info.dli_fbase.is_null() {
            return Ok(None)
        }

        let base = info.dli_fbase.cast::<u8>().cast_const();
        // SAFETY: `dli_fbase` points to the image's header, which is
        //         mapped for as long as the image is loaded.
        let header = unsafe { slice::from_raw_parts(base, size_of::<mach_header_64>()) };
        let header = parse_header(header)?;
        let len = size_of::<mach_header_64>() + header.sizeofcmds as usize;
        // SAFETY: Load commands directly follow the header and are
        //         mapped as well.
        let data = unsafe { slice::from_raw_parts(base, len) };

        let LoadCommands { text, uuid } = parse_load_commands(data)?;
        let Some(text) = text else {
            return Ok(None)
        };

        // The `__TEXT` segment starts with the Mach-O header.
        let base = base as usize as Addr;
        let bias = base.wrapping_sub(text.start);
        let path = if info.dli_fname.is_null() {
            None
        } else {
            // SAFETY: `dli_fname` is a valid NUL terminated string.
            let name = unsafe { CStr::from_ptr(info.dli_fname) };
            Some(bytes_to_path(name.to_bytes()).to_path_buf())
        };

        let image = Image {
            path,
            bias,
            text: base..base + (text.end - text.start),
            build_id: uuid.map(|uuid| uuid.to_vec()),
        };
        Ok(Some(image))
    }
}

#[cfg(target_os = "macos")]
pub(crate) use locate::locate;
