//! A minimal implementation of the block ABI used by Apple's C
//! extensions, sufficient for handing a Rust closure to a C API
//! expecting a block that it invokes synchronously.

use std::ffi::c_int;
use std::ffi::c_ulong;
use std::ffi::c_void;
use std::mem::size_of;
use std::ops::ControlFlow;


#[repr(C)]
struct Descriptor {
    reserved: c_ulong,
    size: c_ulong,
}

/// The state shared between a block and its invocations.
struct Visitor<'visit, A> {
    visit: &'visit mut dyn FnMut(A) -> ControlFlow<()>,
    /// Set once `visit` asked to stop; later invocations are ignored.
    done: bool,
}

/// A block literal taking a single argument of type `A` and returning
/// an `int`.
///
/// The block captures a single pointer (to its [`Visitor`]) and has no
/// copy or dispose helpers. It must not outlive the call it is passed
/// to.
#[repr(C)]
pub(crate) struct Block<A> {
    isa: *const c_void,
    flags: c_int,
    reserved: c_int,
    invoke: unsafe extern "C" fn(*mut Block<A>, A) -> c_int,
    descriptor: *const Descriptor,
    visitor: *mut c_void,
}

unsafe extern "C" fn invoke<A>(block: *mut Block<A>, arg: A) -> c_int {
    // SAFETY: The caller passes in the block it invokes, which is one
    //         created by `with_block` and still alive.
    let block = unsafe { &*block };
    // SAFETY: `visitor` points to the `Visitor` object living in
    //         `with_block`'s stack frame.
    let visitor = unsafe { &mut *block.visitor.cast::<Visitor<'_, A>>() };
    if !visitor.done {
        visitor.done = (visitor.visit)(arg).is_break();
    }
    0
}

/// Create a block forwarding its invocations to `visit` and hand it to
/// `f`.
///
/// `isa` is the block's class, typically `_NSConcreteStackBlock`.
pub(crate) fn with_block<A, F, R>(
    isa: *const c_void,
    visit: &mut dyn FnMut(A) -> ControlFlow<()>,
    f: F,
) -> R
where
    F: FnOnce(*mut Block<A>) -> R,
{
    let mut visitor = Visitor { visit, done: false };
    let descriptor = Descriptor {
        reserved: 0,
        size: size_of::<Block<A>>() as c_ulong,
    };
    let mut block = Block {
        isa,
        flags: 0,
        reserved: 0,
        invoke: invoke::<A>,
        descriptor: &descriptor,
        visitor: (&mut visitor as *mut Visitor<'_, A>).cast(),
    };
    f(&mut block)
}
