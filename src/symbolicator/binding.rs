//! Dynamic binding to the system's `CoreSymbolication` framework.
//!
//! The framework is private and not guaranteed to be present, so it is
//! loaded at run time. All entry points we use have to be available
//! for the binding to be used at all.

use std::ffi::c_char;
use std::ffi::c_int;
use std::ffi::c_void;
use std::ffi::CStr;
use std::ffi::CString;
use std::mem;
use std::ops::ControlFlow;
use std::ops::Range;
use std::os::unix::ffi::OsStrExt as _;
use std::ptr;

use crate::config::config;
use crate::log::debug;
use crate::log::warn;
use crate::once::OnceFallible;
use crate::util::bytes_to_path;
use crate::Addr;
use crate::Config;
use crate::Error;
use crate::ErrorExt as _;
use crate::ImageIdentity;
use crate::Result;

use super::block::with_block;
use super::block::Block;
use super::SourceInfo;
use super::Symbolicator;


/// The well-known location of the framework.
pub(crate) const CORE_SYMBOLICATION_PATH: &CStr =
    c"/System/Library/PrivateFrameworks/CoreSymbolication.framework/CoreSymbolication";

/// A timestamp meaning "the current state of the process".
const K_CS_NOW: u64 = 0x8000_0000_0000_0000;


/// The generic handle type of the framework.
///
/// Handles are only ever checked for "null-ness" using `CSIsNull`.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub(crate) struct CSTypeRef {
    cs_cpp_data: *mut c_void,
    cs_cpp_obj: *mut c_void,
}

#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub(crate) struct CSRange {
    location: u64,
    length: u64,
}

#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub(crate) struct CSArchitecture {
    cpu_type: c_int,
    cpu_subtype: c_int,
}

#[derive(Debug)]
#[repr(C)]
pub(crate) struct CSBinaryRelocationInformation {
    base: u64,
    extent: u64,
    name: [u8; 17],
}

#[derive(Debug)]
#[repr(C)]
pub(crate) struct CSBinaryImageInformation {
    base: u64,
    extent: u64,
    uuid: [u8; 16],
    arch: *const c_char,
    path: *const c_char,
    relocations: *mut CSBinaryRelocationInformation,
    relocation_count: u32,
    flags: u32,
}


type CSIsNull = unsafe extern "C" fn(CSTypeRef) -> u8;
type CSSymbolicatorCreateWithPid = unsafe extern "C" fn(libc::pid_t) -> CSTypeRef;
type CSSymbolicatorCreateWithBinaryImageList =
    unsafe extern "C" fn(*mut CSBinaryImageInformation, u32, u32, *mut c_void) -> CSTypeRef;
type CSSymbolicatorGetSymbolOwnerWithAddressAtTime =
    unsafe extern "C" fn(CSTypeRef, u64, u64) -> CSTypeRef;
type CSSymbolOwnerGetSymbolWithAddress = unsafe extern "C" fn(CSTypeRef, u64) -> CSTypeRef;
type CSSymbolForeachSourceInfo =
    unsafe extern "C" fn(CSTypeRef, *mut Block<CSTypeRef>) -> c_int;
type CSSourceInfoGetPath = unsafe extern "C" fn(CSTypeRef) -> *const c_char;
type CSSourceInfoGetLineNumber = unsafe extern "C" fn(CSTypeRef) -> u32;
type CSSourceInfoGetColumn = unsafe extern "C" fn(CSTypeRef) -> u32;
type CSSourceInfoGetRange = unsafe extern "C" fn(CSTypeRef) -> CSRange;
type CSArchitectureGetCurrent = unsafe extern "C" fn() -> CSArchitecture;
type CSArchitectureGetFamilyName = unsafe extern "C" fn(CSArchitecture) -> *const c_char;


/// An abstraction over the dynamic loader.
pub(crate) trait Loader {
    /// Open the library at `path`, returning an opaque handle.
    fn open(&self, path: &CStr) -> Result<*mut c_void>;
    /// Look up the symbol `name` in the library referenced by `handle`.
    fn symbol(&self, handle: *mut c_void, name: &CStr) -> Result<*mut c_void>;
}

/// The system's dynamic loader.
#[derive(Debug)]
pub(crate) struct Dl;

impl Dl {
    fn last_error() -> String {
        // SAFETY: `dlerror` is always safe to call.
        let err = unsafe { libc::dlerror() };
        if err.is_null() {
            "unknown error".to_string()
        } else {
            // SAFETY: `dlerror` returns a valid NUL terminated string.
            unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
        }
    }
}

impl Loader for Dl {
    fn open(&self, path: &CStr) -> Result<*mut c_void> {
        // SAFETY: `path` is a valid NUL terminated string.
        let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(Error::with_not_found(format!(
                "failed to open `{}`: {}",
                path.to_string_lossy(),
                Self::last_error()
            )))
        }
        Ok(handle)
    }

    fn symbol(&self, handle: *mut c_void, name: &CStr) -> Result<*mut c_void> {
        // SAFETY: `handle` was returned by `dlopen` and `name` is a
        //         valid NUL terminated string.
        let sym = unsafe { libc::dlsym(handle, name.as_ptr()) };
        if sym.is_null() {
            return Err(Error::with_not_found(format!(
                "symbol `{}` not found: {}",
                name.to_string_lossy(),
                Self::last_error()
            )))
        }
        Ok(sym)
    }
}


macro_rules! bind {
    ($loader:expr, $handle:expr, $name:ident) => {{
        let name = concat!(stringify!($name), "\0");
        let name = CStr::from_bytes_with_nul(name.as_bytes()).map_err(Error::with_invalid_data)?;
        let sym = $loader.symbol($handle, name)?;
        // SAFETY: The framework's symbol of this name has the signature
        //         described by the type of the same name.
        unsafe { mem::transmute::<*mut c_void, $name>(sym) }
    }};
}


/// The bound entry points of the framework along with a symbolicator
/// for the current process.
#[derive(Debug)]
pub(crate) struct Binding {
    symbolicator: CSTypeRef,
    stack_block_isa: *const c_void,
    is_null: CSIsNull,
    symbol_owner_at_time: CSSymbolicatorGetSymbolOwnerWithAddressAtTime,
    symbol_with_address: CSSymbolOwnerGetSymbolWithAddress,
    foreach_source_info: CSSymbolForeachSourceInfo,
    source_info_path: CSSourceInfoGetPath,
    source_info_line: CSSourceInfoGetLineNumber,
    source_info_column: CSSourceInfoGetColumn,
    source_info_range: CSSourceInfoGetRange,
}

// SAFETY: The symbolicator is never mutated by us and the framework's
//         query functions may be used from any thread.
unsafe impl Send for Binding {}
// SAFETY: See above.
unsafe impl Sync for Binding {}

impl Binding {
    /// Retrieve the process-wide binding, attempting its creation on
    /// first use.
    pub(crate) fn get() -> Option<&'static Self> {
        static BINDING: OnceFallible<Binding> = OnceFallible::new();

        BINDING.get_or_init("CoreSymbolication", || Self::open(&Dl, config()))
    }

    /// Bind to the framework using `loader` and create a symbolicator.
    pub(crate) fn open(loader: &dyn Loader, config: &Config) -> Result<Self> {
        let handle = loader.open(CORE_SYMBOLICATION_PATH)?;

        let is_null = bind!(loader, handle, CSIsNull);
        let create_with_pid = bind!(loader, handle, CSSymbolicatorCreateWithPid);
        let create_with_images = bind!(loader, handle, CSSymbolicatorCreateWithBinaryImageList);
        let symbol_owner_at_time = bind!(loader, handle, CSSymbolicatorGetSymbolOwnerWithAddressAtTime);
        let symbol_with_address = bind!(loader, handle, CSSymbolOwnerGetSymbolWithAddress);
        let foreach_source_info = bind!(loader, handle, CSSymbolForeachSourceInfo);
        let source_info_path = bind!(loader, handle, CSSourceInfoGetPath);
        let source_info_line = bind!(loader, handle, CSSourceInfoGetLineNumber);
        let source_info_column = bind!(loader, handle, CSSourceInfoGetColumn);
        let source_info_range = bind!(loader, handle, CSSourceInfoGetRange);
        let arch_current = bind!(loader, handle, CSArchitectureGetCurrent);
        let arch_family_name = bind!(loader, handle, CSArchitectureGetFamilyName);
        let stack_block_isa = loader
            .symbol(handle, c"_NSConcreteStackBlock")?
            .cast_const();

        let symbolicator = if config.current_image_only {
            let identity = ImageIdentity::current()
                .context("failed to identify current image")?
                .ok_or_else(|| Error::with_not_found("failed to identify current image"))?;
            // SAFETY: The function takes no arguments and returns a
            //         pointer to a static string.
            let arch = unsafe { arch_family_name(arch_current()) };
            let info = image_info(&identity, arch)?;
            debug!("creating symbolicator for {identity:?}");
            // SAFETY: `info` is a valid image list of length one.
            unsafe { create_with_images(info, 1, 0, ptr::null_mut()) }
        } else {
            // SAFETY: `getpid` is always safe to call.
            let pid = unsafe { libc::getpid() };
            // SAFETY: The function is safe to call with any PID.
            unsafe { create_with_pid(pid) }
        };

        // SAFETY: `is_null` is safe to call with any handle.
        if unsafe { is_null(symbolicator) } != 0 {
            warn!("failed to create CoreSymbolication symbolicator");
            return Err(Error::with_not_found("failed to create symbolicator"))
        }

        let slf = Self {
            symbolicator,
            stack_block_isa,
            is_null,
            symbol_owner_at_time,
            symbol_with_address,
            foreach_source_info,
            source_info_path,
            source_info_line,
            source_info_column,
            source_info_range,
        };
        Ok(slf)
    }

    #[inline]
    fn non_null(&self, handle: CSTypeRef) -> Option<CSTypeRef> {
        // SAFETY: `is_null` is safe to call with any handle.
        (unsafe { (self.is_null)(handle) } == 0).then_some(handle)
    }

    /// Convert a source info handle into our representation.
    fn source_info<'info>(&self, info: CSTypeRef) -> SourceInfo<'info> {
        // SAFETY: `info` is a valid source info handle for the duration
        //         of the enclosing enumeration.
        let (path, line, column, range) = unsafe {
            (
                (self.source_info_path)(info),
                (self.source_info_line)(info),
                (self.source_info_column)(info),
                (self.source_info_range)(info),
            )
        };
        let path = if path.is_null() {
            None
        } else {
            // SAFETY: The path is a valid NUL terminated string for at
            //         least as long as the enumeration.
            Some(bytes_to_path(unsafe { CStr::from_ptr(path) }.to_bytes()))
        };

        SourceInfo {
            range: range.location..range.location.saturating_add(range.length),
            path,
            line,
            column,
        }
    }
}

impl Symbolicator for Binding {
    type Owner = CSTypeRef;
    type Symbol = CSTypeRef;

    fn symbol_owner(&self, addr: Addr) -> Option<Self::Owner> {
        // SAFETY: The symbolicator is valid and the function accepts
        //         any address.
        let owner = unsafe { (self.symbol_owner_at_time)(self.symbolicator, addr, K_CS_NOW) };
        self.non_null(owner)
    }

    fn symbol(&self, owner: &Self::Owner, addr: Addr) -> Option<Self::Symbol> {
        // SAFETY: `owner` is a valid, non-null owner handle.
        let symbol = unsafe { (self.symbol_with_address)(*owner, addr) };
        self.non_null(symbol)
    }

    fn for_each_source_info(
        &self,
        symbol: &Self::Symbol,
        f: &mut dyn FnMut(&SourceInfo<'_>) -> ControlFlow<()>,
    ) {
        let mut visit = |info: CSTypeRef| f(&self.source_info(info));
        let _count = with_block(self.stack_block_isa, &mut visit, |block| {
            // SAFETY: `symbol` is a valid, non-null symbol handle and the
            //         block stays alive for the duration of the call.
            unsafe { (self.foreach_source_info)(*symbol, block) }
        });
    }
}


/// Create the description of a single image for the purpose of
/// creating a symbolicator from an image list.
///
/// The returned object is leaked, as the framework may refer to it for
/// the lifetime of the symbolicator, which is never destroyed.
fn image_info(
    identity: &ImageIdentity,
    arch: *const c_char,
) -> Result<*mut CSBinaryImageInformation> {
    let uuid = <[u8; 16]>::try_from(identity.build_id.as_slice()).map_err(|_err| {
        Error::with_invalid_data(format!(
            "build ID of length {} is not a valid UUID",
            identity.build_id.len()
        ))
    })?;

    let path = identity
        .path
        .as_deref()
        .map(|path| CString::new(path.as_os_str().as_bytes()))
        .transpose()
        .map_err(Error::with_invalid_data)?
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut());

    let Range { start, end } = identity.text;
    let mut name = [0; 17];
    let () = name[..6].copy_from_slice(b"__TEXT");

    let relocation = Box::leak(Box::new(CSBinaryRelocationInformation {
        base: start,
        extent: end - start,
        name,
    }));
    let info = Box::leak(Box::new(CSBinaryImageInformation {
        base: start,
        extent: end - start,
        uuid,
        arch,
        path,
        relocations: relocation,
        relocation_count: 1,
        flags: 0,
    }));
    Ok(info)
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    use test_log::test;

    use crate::once::State;
    use crate::symbolicator::block::tests::call;
    use crate::symbolicator::resolver::resolve;
    use crate::ErrorKind;


    const NON_NULL: CSTypeRef = CSTypeRef {
        cs_cpp_data: ptr::null_mut(),
        cs_cpp_obj: 1 as *mut c_void,
    };
    const NULL: CSTypeRef = CSTypeRef {
        cs_cpp_data: ptr::null_mut(),
        cs_cpp_obj: ptr::null_mut(),
    };

    /// The source info records served by our fake framework, as
    /// (line, column, address range).
    const RECORDS: [(u32, u32, u64, u64); 4] = [
        (10, 1, 0x1000, 0x10),
        (15, 2, 0x1010, 0x10),
        (12, 3, 0x1020, 0x10),
        (20, 4, 0x1030, 0x10),
    ];

    fn record(info: CSTypeRef) -> (u32, u32, u64, u64) {
        RECORDS[info.cs_cpp_obj as usize - 1]
    }

    unsafe extern "C" fn is_null(handle: CSTypeRef) -> u8 {
        handle.cs_cpp_obj.is_null().into()
    }

    unsafe extern "C" fn create_with_pid(_pid: libc::pid_t) -> CSTypeRef {
        NON_NULL
    }

    unsafe extern "C" fn create_with_images(
        info: *mut CSBinaryImageInformation,
        count: u32,
        _flags: u32,
        _notification: *mut c_void,
    ) -> CSTypeRef {
        let info = unsafe { &*info };
        if count == 1 && info.relocation_count == 1 {
            NON_NULL
        } else {
            NULL
        }
    }

    unsafe extern "C" fn symbol_owner_at_time(_sym: CSTypeRef, addr: u64, time: u64) -> CSTypeRef {
        assert_eq!(time, K_CS_NOW);
        if (0x1000..0x2000).contains(&addr) {
            NON_NULL
        } else {
            NULL
        }
    }

    unsafe extern "C" fn symbol_with_address(_owner: CSTypeRef, addr: u64) -> CSTypeRef {
        if (0x1000..0x1040).contains(&addr) {
            NON_NULL
        } else {
            NULL
        }
    }

    unsafe extern "C" fn foreach_source_info(_symbol: CSTypeRef, block: *mut Block<CSTypeRef>) -> c_int {
        for i in 0..RECORDS.len() {
            let info = CSTypeRef {
                cs_cpp_data: ptr::null_mut(),
                cs_cpp_obj: (i + 1) as *mut c_void,
            };
            let _rc = unsafe { call(block, info) };
        }
        RECORDS.len() as c_int
    }

    unsafe extern "C" fn source_info_path(_info: CSTypeRef) -> *const c_char {
        c"/src/Main.kt".as_ptr()
    }

    unsafe extern "C" fn source_info_line(info: CSTypeRef) -> u32 {
        record(info).0
    }

    unsafe extern "C" fn source_info_column(info: CSTypeRef) -> u32 {
        record(info).1
    }

    unsafe extern "C" fn source_info_range(info: CSTypeRef) -> CSRange {
        let (_, _, location, length) = record(info);
        CSRange { location, length }
    }

    unsafe extern "C" fn arch_current() -> CSArchitecture {
        CSArchitecture {
            cpu_type: 0,
            cpu_subtype: 0,
        }
    }

    unsafe extern "C" fn arch_family_name(_arch: CSArchitecture) -> *const c_char {
        c"x86_64".as_ptr()
    }

    static STACK_BLOCK: u8 = 0;


    /// A loader serving our fake framework.
    #[derive(Debug, Default)]
    struct Fake {
        /// The names of entry points to report as missing.
        missing: Vec<&'static str>,
        /// The number of attempts to open the library.
        opened: Cell<usize>,
    }

    impl Fake {
        fn symbols() -> HashMap<&'static str, *mut c_void> {
            HashMap::from([
                ("CSIsNull", is_null as *mut c_void),
                ("CSSymbolicatorCreateWithPid", create_with_pid as *mut c_void),
                ("CSSymbolicatorCreateWithBinaryImageList", create_with_images as *mut c_void),
                ("CSSymbolicatorGetSymbolOwnerWithAddressAtTime", symbol_owner_at_time as *mut c_void),
                ("CSSymbolOwnerGetSymbolWithAddress", symbol_with_address as *mut c_void),
                ("CSSymbolForeachSourceInfo", foreach_source_info as *mut c_void),
                ("CSSourceInfoGetPath", source_info_path as *mut c_void),
                ("CSSourceInfoGetLineNumber", source_info_line as *mut c_void),
                ("CSSourceInfoGetColumn", source_info_column as *mut c_void),
                ("CSSourceInfoGetRange", source_info_range as *mut c_void),
                ("CSArchitectureGetCurrent", arch_current as *mut c_void),
                ("CSArchitectureGetFamilyName", arch_family_name as *mut c_void),
                ("_NSConcreteStackBlock", ptr::addr_of!(STACK_BLOCK).cast_mut().cast()),
            ])
        }
    }

    impl Loader for Fake {
        fn open(&self, path: &CStr) -> Result<*mut c_void> {
            assert_eq!(path, CORE_SYMBOLICATION_PATH);
            let () = self.opened.set(self.opened.get() + 1);
            Ok(0x42 as *mut c_void)
        }

        fn symbol(&self, handle: *mut c_void, name: &CStr) -> Result<*mut c_void> {
            assert_eq!(handle, 0x42 as *mut c_void);
            let name = name.to_str().unwrap();
            if self.missing.contains(&name) {
                return Err(Error::with_not_found(format!("symbol `{name}` not found")))
            }
            Self::symbols()
                .get(name)
                .copied()
                .ok_or_else(|| Error::with_not_found(format!("unexpected symbol `{name}`")))
        }
    }

    /// A loader that is unable to open anything.
    #[derive(Debug, Default)]
    struct Absent {
        opened: Cell<usize>,
    }

    impl Loader for Absent {
        fn open(&self, _path: &CStr) -> Result<*mut c_void> {
            let () = self.opened.set(self.opened.get() + 1);
            Err(Error::with_not_found("no such library"))
        }

        fn symbol(&self, _handle: *mut c_void, _name: &CStr) -> Result<*mut c_void> {
            unreachable!()
        }
    }


    /// Check that we can bind to a framework and resolve addresses
    /// through it.
    #[test]
    fn bind_and_resolve() {
        let binding = Binding::open(&Fake::default(), &Config::default()).unwrap();

        let location = resolve(&binding, 0x1024);
        assert_eq!(location.file, Some(PathBuf::from("/src/Main.kt")));
        assert_eq!(location.line, Some(12));
        assert_eq!(location.column, Some(3));

        assert!(resolve(&binding, 0x1040).is_unknown());
        assert!(resolve(&binding, 0x3000).is_unknown());
    }

    /// Make sure that a single missing entry point renders the binding
    /// unusable.
    #[test]
    fn missing_entry_point() {
        let loader = Fake {
            missing: vec!["CSSourceInfoGetColumn"],
            ..Default::default()
        };
        let cell = OnceFallible::<Binding>::new();
        let binding = cell.get_or_init("fake", || Binding::open(&loader, &Config::default()));
        assert!(binding.is_none());
        assert_eq!(cell.state(), State::Unavailable);

        let err = Binding::open(&loader, &Config::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("CSSourceInfoGetColumn"), "{err}");
    }

    /// Check that a failure to load the framework is cached.
    #[test]
    fn load_failure_caching() {
        let loader = Absent::default();
        let cell = OnceFallible::<Binding>::new();

        for _ in 0..10 {
            let binding = cell.get_or_init("absent", || Binding::open(&loader, &Config::default()));
            assert!(binding.is_none());
        }
        assert_eq!(loader.opened.get(), 1);
    }

    /// Check that we honor the "current image only" configuration.
    #[test]
    fn current_image_only() {
        let loader = Fake::default();
        let config = Config::default().with_current_image_only(true);
        let result = Binding::open(&loader, &config);

        // Whether the current image carries a build ID usable as UUID
        // depends on the toolchain; either way we must not end up with
        // a half-initialized binding.
        match ImageIdentity::current() {
            Ok(Some(identity)) if identity.build_id.len() == 16 => assert!(result.is_ok()),
            _ => assert!(result.is_err()),
        }
        assert_eq!(loader.opened.get(), 1);
    }

    /// Check that we describe an image correctly.
    #[test]
    fn image_description() {
        let identity = ImageIdentity {
            path: Some(PathBuf::from("/usr/lib/libapp.dylib")),
            bias: 0,
            text: 0x1_0000..0x1_8000,
            build_id: (0..16).collect(),
            _non_exhaustive: (),
        };
        let arch = c"arm64".as_ptr();
        let info = image_info(&identity, arch).unwrap();
        let info = unsafe { &*info };
        assert_eq!(info.base, 0x1_0000);
        assert_eq!(info.extent, 0x8000);
        assert_eq!(info.uuid.to_vec(), identity.build_id);
        assert_eq!(info.arch, arch);
        assert_eq!(unsafe { CStr::from_ptr(info.path) }, c"/usr/lib/libapp.dylib");
        assert_eq!(info.relocation_count, 1);

        let relocation = unsafe { &*info.relocations };
        assert_eq!(relocation.base, 0x1_0000);
        assert_eq!(relocation.extent, 0x8000);
        let name = unsafe { CStr::from_ptr(relocation.name.as_ptr().cast()) };
        assert_eq!(name, c"__TEXT");

        let identity = ImageIdentity {
            build_id: vec![1; 20],
            ..identity
        };
        let err = image_info(&identity, arch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    /// Check that the framework is not available on systems other than
    /// macOS.
    #[cfg(not(target_os = "macos"))]
    #[test]
    fn unavailable_framework() {
        let err = Dl.open(CORE_SYMBOLICATION_PATH).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(Binding::open(&Dl, &Config::default()).is_err());
    }

    /// Check that we can bind to the actual framework on macOS.
    #[cfg(target_os = "macos")]
    #[test]
    fn system_framework() {
        let binding = Binding::get().unwrap();
        let addr = system_framework as fn() as usize as Addr;
        // We may or may not find debug information, but the address is
        // certainly owned by an image.
        assert!(binding.symbol_owner(addr).is_some());
    }
}
