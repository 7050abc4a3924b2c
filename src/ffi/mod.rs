//! Raw `libftdi` ABI.
//!
//! This module contains the fixed-layout records shared with the native library and the
//! table of native entry points. Most users will not need to use this module directly, and
//! should instead use [`Context`](crate::Context).
//!
//! The native library is loaded at runtime the first time a [`Context`](crate::Context) is
//! created. The resulting [`NativeApi`] table is bound once per process and is read-only
//! thereafter.
#![allow(non_camel_case_types, missing_docs)]

pub(crate) mod loader;
#[cfg(test)]
pub(crate) mod mock;

use std::{
    ffi::{c_char, c_int, c_uchar, c_uint, c_void, CStr},
    sync::OnceLock,
};

use libloading::Library;

use crate::{FtdiError, Result};

/// Mirror of libftdi's `struct ftdi_context`.
///
/// The layout must match the native library field-for-field since fields are read and
/// written in place. Internal fields are kept even though they are never exposed.
#[repr(C)]
#[derive(Debug)]
pub struct ftdi_context {
    /// libusb's context.
    pub usb_ctx: *mut c_void,
    /// libusb's device handle. Non-null while the device is open.
    pub usb_dev: *mut c_void,
    /// USB read timeout in milliseconds.
    pub usb_read_timeout: c_int,
    /// USB write timeout in milliseconds.
    pub usb_write_timeout: c_int,
    /// Chip type (`enum ftdi_chip_type`).
    pub type_: c_int,
    pub baudrate: c_int,
    pub bitbang_enabled: c_uchar,
    pub readbuffer: *mut c_uchar,
    pub readbuffer_offset: c_uint,
    pub readbuffer_remaining: c_uint,
    pub readbuffer_chunksize: c_uint,
    pub writebuffer_chunksize: c_uint,
    /// Needed for filtering modem status bytes every n packets.
    pub max_packet_size: c_uint,
    /// USB interface number, `0..=3`.
    pub interface: c_int,
    /// Interface selector, `1..=4` (`INTERFACE_A` through `INTERFACE_D`).
    pub index: c_int,
    pub in_ep: c_int,
    pub out_ep: c_int,
    pub bitbang_mode: c_uchar,
    /// Decoded EEPROM structure. Never touched by this crate.
    pub eeprom: *mut c_void,
    /// Description of the last error. Points to a static string owned by the library.
    pub error_str: *const c_char,
    /// `enum ftdi_module_detach_mode`.
    pub module_detach_mode: c_int,
}

/// Mirror of libftdi's `struct ftdi_version_info`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ftdi_version_info {
    pub major: c_int,
    pub minor: c_int,
    pub micro: c_int,
    pub version_str: *const c_char,
    pub snapshot_str: *const c_char,
}

pub type NewFn = unsafe extern "C" fn() -> *mut ftdi_context;
pub type FreeFn = unsafe extern "C" fn(*mut ftdi_context);
pub type StatusFn = unsafe extern "C" fn(*mut ftdi_context) -> c_int;
pub type UsbOpenFn = unsafe extern "C" fn(*mut ftdi_context, c_int, c_int) -> c_int;
pub type UsbOpenDescFn = unsafe extern "C" fn(
    *mut ftdi_context,
    c_int,
    c_int,
    *const c_char,
    *const c_char,
) -> c_int;
pub type UsbOpenDescIndexFn = unsafe extern "C" fn(
    *mut ftdi_context,
    c_int,
    c_int,
    *const c_char,
    *const c_char,
    c_uint,
) -> c_int;
pub type UsbOpenStringFn = unsafe extern "C" fn(*mut ftdi_context, *const c_char) -> c_int;
pub type IntArgFn = unsafe extern "C" fn(*mut ftdi_context, c_int) -> c_int;
pub type LinePropertyFn = unsafe extern "C" fn(*mut ftdi_context, c_int, c_int, c_int) -> c_int;
pub type LineProperty2Fn =
    unsafe extern "C" fn(*mut ftdi_context, c_int, c_int, c_int, c_int) -> c_int;
pub type BitmodeFn = unsafe extern "C" fn(*mut ftdi_context, c_uchar, c_uchar) -> c_int;
pub type ReadDataFn = unsafe extern "C" fn(*mut ftdi_context, *mut c_uchar, c_int) -> c_int;
pub type WriteDataFn = unsafe extern "C" fn(*mut ftdi_context, *const c_uchar, c_int) -> c_int;
pub type GetChunksizeFn = unsafe extern "C" fn(*mut ftdi_context, *mut c_uint) -> c_int;
pub type SetChunksizeFn = unsafe extern "C" fn(*mut ftdi_context, c_uint) -> c_int;
pub type ByteOutFn = unsafe extern "C" fn(*mut ftdi_context, *mut c_uchar) -> c_int;
pub type ByteInFn = unsafe extern "C" fn(*mut ftdi_context, c_uchar) -> c_int;
pub type LibraryVersionFn = unsafe extern "C" fn() -> ftdi_version_info;

/// Table of native entry points.
///
/// Required entry points are present in every libftdi 1.x release. Optional entry points
/// are `None` when the loaded library does not export them.
pub struct NativeApi {
    /// Keeps the shared library mapped for as long as the function pointers are in use.
    pub(crate) library: Option<Library>,

    pub ftdi_new: NewFn,
    pub ftdi_free: FreeFn,
    pub ftdi_usb_open: UsbOpenFn,
    pub ftdi_usb_open_desc: UsbOpenDescFn,
    pub ftdi_usb_open_desc_index: UsbOpenDescIndexFn,
    pub ftdi_usb_reset: StatusFn,
    pub ftdi_usb_close: StatusFn,
    pub ftdi_set_baudrate: IntArgFn,
    pub ftdi_set_line_property: LinePropertyFn,
    pub ftdi_set_line_property2: LineProperty2Fn,
    pub ftdi_setflowctrl: IntArgFn,
    pub ftdi_set_bitmode: BitmodeFn,
    pub ftdi_read_data: ReadDataFn,
    pub ftdi_read_data_get_chunksize: GetChunksizeFn,
    pub ftdi_read_data_set_chunksize: SetChunksizeFn,
    pub ftdi_write_data: WriteDataFn,
    pub ftdi_write_data_get_chunksize: GetChunksizeFn,
    pub ftdi_write_data_set_chunksize: SetChunksizeFn,
    pub ftdi_read_pins: ByteOutFn,
    pub ftdi_set_interface: IntArgFn,
    pub ftdi_get_library_version: LibraryVersionFn,

    pub ftdi_usb_open_string: Option<UsbOpenStringFn>,
    pub ftdi_set_latency_timer: Option<ByteInFn>,
    pub ftdi_get_latency_timer: Option<ByteOutFn>,
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("loaded", &self.library.is_some())
            .field("usb_open_string", &self.ftdi_usb_open_string.is_some())
            .field("latency_timer", &self.ftdi_set_latency_timer.is_some())
            .finish_non_exhaustive()
    }
}

static NATIVE_API: OnceLock<Result<NativeApi>> = OnceLock::new();

/// Get the process-wide native table, loading the library on first use.
///
/// A failed load is remembered; later calls return the same error without retrying.
pub fn api() -> Result<&'static NativeApi> {
    match NATIVE_API.get_or_init(loader::load) {
        Ok(api) => Ok(api),
        Err(e) => Err(e.clone()),
    }
}

/// Check whether the native library could be loaded.
#[must_use]
pub fn is_available() -> bool {
    api().is_ok()
}

/// Copy a C string owned by the library, mapping null to an empty string.
///
/// # Safety
///
/// `value` must be null or point to a null-terminated string.
pub(crate) unsafe fn owned_string(value: *const c_char) -> String {
    if value.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(value) }
            .to_string_lossy()
            .into_owned()
    }
}

pub(crate) fn unsupported<T>(symbol: &'static str) -> Result<T> {
    Err(FtdiError::Unsupported(symbol))
}
