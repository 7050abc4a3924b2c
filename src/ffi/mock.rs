//! In-process stand-in for libftdi used by the unit tests.
//!
//! Each context allocated by the stub is a [`MockDevice`] whose first field is the
//! `ftdi_context` record, so the binding reads and writes it exactly as it would a real one.
//! The simulated device is an FT232R loopback: bytes written in serial mode are read back,
//! bytes written in bitbang mode drive the pins.

use std::{
    cell::Cell,
    collections::VecDeque,
    ffi::{c_char, c_int, c_uchar, c_uint, c_void, CStr},
    ptr::{self, NonNull},
};

use super::{ftdi_context, ftdi_version_info, NativeApi, NewFn};

pub(crate) const VENDOR: u16 = 0x0403;
pub(crate) const PRODUCT: u16 = 0x6001;
pub(crate) const DESCRIPTION: &str = "FT232R USB UART";
pub(crate) const SERIAL: &str = "A12345";

thread_local! {
    static FREED: Cell<usize> = const { Cell::new(0) };
}

/// Number of contexts released by `ftdi_free` on the current thread.
pub(crate) fn freed() -> usize {
    FREED.with(Cell::get)
}

#[repr(C)]
pub(crate) struct MockDevice {
    pub context: ftdi_context,
    pub rx: VecDeque<u8>,
    pub pins: u8,
    pub line: Option<(c_int, c_int, c_int, c_int)>,
    pub flow: c_int,
    pub latency: c_uchar,
    pub bitmask: c_uchar,
    /// Entry point of the last open attempt.
    pub opened_by: Option<&'static str>,
}

/// A context record in the state `ftdi_init` leaves it, minus the USB context.
pub(crate) fn blank_context() -> ftdi_context {
    ftdi_context {
        usb_ctx: ptr::null_mut(),
        usb_dev: ptr::null_mut(),
        usb_read_timeout: 5000,
        usb_write_timeout: 5000,
        type_: 1,
        baudrate: -1,
        bitbang_enabled: 0,
        readbuffer: ptr::null_mut(),
        readbuffer_offset: 0,
        readbuffer_remaining: 0,
        readbuffer_chunksize: 4096,
        writebuffer_chunksize: 4096,
        max_packet_size: 0,
        interface: 0,
        index: 1,
        in_ep: 0x02,
        out_ep: 0x81,
        bitbang_mode: 1,
        eeprom: ptr::null_mut(),
        error_str: ptr::null(),
        module_detach_mode: 0,
    }
}

/// Access the simulated device behind a context pointer.
///
/// # Safety
///
/// `context` must have been allocated by [`mock_new`] and not yet freed.
pub(crate) unsafe fn device<'a>(context: *mut ftdi_context) -> &'a mut MockDevice {
    unsafe { &mut *context.cast::<MockDevice>() }
}

/// Native table backed by the stub.
pub(crate) fn api() -> &'static NativeApi {
    table(mock_new, true)
}

/// Native table whose allocator always fails.
pub(crate) fn failing_alloc_api() -> &'static NativeApi {
    table(mock_new_null, true)
}

/// Native table of a libftdi build without the optional entry points.
pub(crate) fn minimal_api() -> &'static NativeApi {
    table(mock_new, false)
}

fn table(ftdi_new: NewFn, optional: bool) -> &'static NativeApi {
    Box::leak(Box::new(NativeApi {
        library: None,
        ftdi_new,
        ftdi_free: mock_free,
        ftdi_usb_open: mock_usb_open,
        ftdi_usb_open_desc: mock_usb_open_desc,
        ftdi_usb_open_desc_index: mock_usb_open_desc_index,
        ftdi_usb_reset: mock_usb_reset,
        ftdi_usb_close: mock_usb_close,
        ftdi_set_baudrate: mock_set_baudrate,
        ftdi_set_line_property: mock_set_line_property,
        ftdi_set_line_property2: mock_set_line_property2,
        ftdi_setflowctrl: mock_setflowctrl,
        ftdi_set_bitmode: mock_set_bitmode,
        ftdi_read_data: mock_read_data,
        ftdi_read_data_get_chunksize: mock_read_data_get_chunksize,
        ftdi_read_data_set_chunksize: mock_read_data_set_chunksize,
        ftdi_write_data: mock_write_data,
        ftdi_write_data_get_chunksize: mock_write_data_get_chunksize,
        ftdi_write_data_set_chunksize: mock_write_data_set_chunksize,
        ftdi_read_pins: mock_read_pins,
        ftdi_set_interface: mock_set_interface,
        ftdi_get_library_version: mock_get_library_version,
        ftdi_usb_open_string: optional.then_some(mock_usb_open_string as _),
        ftdi_set_latency_timer: optional.then_some(mock_set_latency_timer as _),
        ftdi_get_latency_timer: optional.then_some(mock_get_latency_timer as _),
    }))
}

fn fail(device: &mut MockDevice, code: c_int, message: &'static CStr) -> c_int {
    device.context.error_str = message.as_ptr();
    code
}

fn is_open(device: &MockDevice) -> bool {
    !device.context.usb_dev.is_null()
}

unsafe fn optional_str<'a>(value: *const c_char) -> Option<&'a str> {
    if value.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(value) }.to_str().ok()
    }
}

fn chip_for(vendor: c_int, product: c_int) -> Option<c_int> {
    if vendor != c_int::from(VENDOR) {
        return None;
    }
    match product {
        0x6001 => Some(3),
        0x6010 => Some(4),
        0x6011 => Some(5),
        0x6014 => Some(6),
        0x6015 => Some(7),
        _ => None,
    }
}

fn claim(device: &mut MockDevice, chip: c_int) -> c_int {
    device.context.usb_dev = NonNull::<c_void>::dangling().as_ptr();
    device.context.type_ = chip;
    device.context.baudrate = 9600;
    device.context.max_packet_size = 64;
    0
}

unsafe extern "C" fn mock_new() -> *mut ftdi_context {
    let device = Box::new(MockDevice {
        context: blank_context(),
        rx: VecDeque::new(),
        pins: 0,
        line: None,
        flow: 0,
        latency: 16,
        bitmask: 0,
        opened_by: None,
    });
    Box::into_raw(device).cast()
}

unsafe extern "C" fn mock_new_null() -> *mut ftdi_context {
    ptr::null_mut()
}

unsafe extern "C" fn mock_free(context: *mut ftdi_context) {
    drop(unsafe { Box::from_raw(context.cast::<MockDevice>()) });
    FREED.with(|freed| freed.set(freed.get() + 1));
}

unsafe extern "C" fn mock_usb_open(
    context: *mut ftdi_context,
    vendor: c_int,
    product: c_int,
) -> c_int {
    unsafe {
        open_matching(
            context,
            "ftdi_usb_open",
            vendor,
            product,
            ptr::null(),
            ptr::null(),
            0,
        )
    }
}

unsafe extern "C" fn mock_usb_open_desc(
    context: *mut ftdi_context,
    vendor: c_int,
    product: c_int,
    description: *const c_char,
    serial: *const c_char,
) -> c_int {
    unsafe {
        open_matching(
            context,
            "ftdi_usb_open_desc",
            vendor,
            product,
            description,
            serial,
            0,
        )
    }
}

unsafe extern "C" fn mock_usb_open_desc_index(
    context: *mut ftdi_context,
    vendor: c_int,
    product: c_int,
    description: *const c_char,
    serial: *const c_char,
    index: c_uint,
) -> c_int {
    unsafe {
        open_matching(
            context,
            "ftdi_usb_open_desc_index",
            vendor,
            product,
            description,
            serial,
            index,
        )
    }
}

unsafe fn open_matching(
    context: *mut ftdi_context,
    entry_point: &'static str,
    vendor: c_int,
    product: c_int,
    description: *const c_char,
    serial: *const c_char,
    index: c_uint,
) -> c_int {
    let device = unsafe { device(context) };
    device.opened_by = Some(entry_point);
    let description = unsafe { optional_str(description) };
    let serial = unsafe { optional_str(serial) };
    match chip_for(vendor, product) {
        Some(chip)
            if index == 0
                && description.map_or(true, |d| d == DESCRIPTION)
                && serial.map_or(true, |s| s == SERIAL) =>
        {
            claim(device, chip)
        }
        _ => fail(device, -3, c"device not found"),
    }
}

unsafe extern "C" fn mock_usb_open_string(
    context: *mut ftdi_context,
    descriptor: *const c_char,
) -> c_int {
    let device = unsafe { device(context) };
    device.opened_by = Some("ftdi_usb_open_string");
    let Some(descriptor) = (unsafe { optional_str(descriptor) }) else {
        return fail(device, -11, c"illegal description format");
    };
    let mut parts = descriptor.split(':');
    let kind = parts.next().unwrap_or_default();
    let ids: Vec<_> = parts.collect();
    let parse = |s: &str| c_int::from_str_radix(s.trim_start_matches("0x"), 16).ok();
    match (kind, ids.as_slice()) {
        ("i", [vendor, product]) | ("i", [vendor, product, _]) => {
            match (parse(*vendor), parse(*product)) {
                (Some(vendor), Some(product)) => match chip_for(vendor, product) {
                    Some(chip) => claim(device, chip),
                    None => fail(device, -3, c"device not found"),
                },
                _ => fail(device, -11, c"illegal description format"),
            }
        }
        ("s", [vendor, product, serial]) => match (parse(*vendor), parse(*product)) {
            (Some(vendor), Some(product)) => match chip_for(vendor, product) {
                Some(chip) if *serial == SERIAL => claim(device, chip),
                _ => fail(device, -3, c"device not found"),
            },
            _ => fail(device, -11, c"illegal description format"),
        },
        ("d", [_]) => fail(device, -3, c"device not found"),
        _ => fail(device, -11, c"illegal description format"),
    }
}

unsafe extern "C" fn mock_usb_reset(context: *mut ftdi_context) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -2, c"USB device unavailable");
    }
    device.rx.clear();
    0
}

unsafe extern "C" fn mock_usb_close(context: *mut ftdi_context) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -1, c"usb_release failed");
    }
    device.context.usb_dev = ptr::null_mut();
    0
}

unsafe extern "C" fn mock_set_baudrate(context: *mut ftdi_context, baudrate: c_int) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -3, c"USB device unavailable");
    }
    if baudrate <= 0 {
        return fail(device, -1, c"Silly baudrate <= 0.");
    }
    if baudrate > 3_000_000 {
        return fail(
            device,
            -1,
            c"Unsupported baudrate. Note: bitbang baudrates are automatically multiplied by 4",
        );
    }
    device.context.baudrate = baudrate;
    0
}

unsafe extern "C" fn mock_set_line_property(
    context: *mut ftdi_context,
    bits: c_int,
    stop_bits: c_int,
    parity: c_int,
) -> c_int {
    unsafe { mock_set_line_property2(context, bits, stop_bits, parity, 0) }
}

unsafe extern "C" fn mock_set_line_property2(
    context: *mut ftdi_context,
    bits: c_int,
    stop_bits: c_int,
    parity: c_int,
    break_type: c_int,
) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -2, c"USB device unavailable");
    }
    device.line = Some((bits, stop_bits, parity, break_type));
    0
}

unsafe extern "C" fn mock_setflowctrl(context: *mut ftdi_context, flow: c_int) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -2, c"USB device unavailable");
    }
    device.flow = flow;
    0
}

unsafe extern "C" fn mock_set_bitmode(
    context: *mut ftdi_context,
    bitmask: c_uchar,
    mode: c_uchar,
) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -2, c"USB device unavailable");
    }
    device.bitmask = bitmask;
    device.context.bitbang_mode = mode;
    device.context.bitbang_enabled = c_uchar::from(mode != 0);
    0
}

unsafe extern "C" fn mock_read_data(
    context: *mut ftdi_context,
    buf: *mut c_uchar,
    size: c_int,
) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -666, c"USB device unavailable");
    }
    let count = device.rx.len().min(usize::try_from(size).unwrap_or(0));
    for (i, byte) in device.rx.drain(..count).enumerate() {
        unsafe { *buf.add(i) = byte };
    }
    c_int::try_from(count).unwrap_or(c_int::MAX)
}

unsafe extern "C" fn mock_write_data(
    context: *mut ftdi_context,
    buf: *const c_uchar,
    size: c_int,
) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -666, c"USB device unavailable");
    }
    let data = unsafe { std::slice::from_raw_parts(buf, usize::try_from(size).unwrap_or(0)) };
    if device.context.bitbang_enabled != 0 {
        if let Some(last) = data.last() {
            device.pins = last & device.bitmask;
        }
    } else {
        device.rx.extend(data);
    }
    size
}

unsafe extern "C" fn mock_read_data_get_chunksize(
    context: *mut ftdi_context,
    chunksize: *mut c_uint,
) -> c_int {
    let device = unsafe { device(context) };
    unsafe { *chunksize = device.context.readbuffer_chunksize };
    0
}

unsafe extern "C" fn mock_read_data_set_chunksize(
    context: *mut ftdi_context,
    chunksize: c_uint,
) -> c_int {
    unsafe { device(context) }.context.readbuffer_chunksize = chunksize;
    0
}

unsafe extern "C" fn mock_write_data_get_chunksize(
    context: *mut ftdi_context,
    chunksize: *mut c_uint,
) -> c_int {
    let device = unsafe { device(context) };
    unsafe { *chunksize = device.context.writebuffer_chunksize };
    0
}

unsafe extern "C" fn mock_write_data_set_chunksize(
    context: *mut ftdi_context,
    chunksize: c_uint,
) -> c_int {
    unsafe { device(context) }.context.writebuffer_chunksize = chunksize;
    0
}

unsafe extern "C" fn mock_read_pins(context: *mut ftdi_context, pins: *mut c_uchar) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -2, c"USB device unavailable");
    }
    unsafe { *pins = device.pins };
    0
}

unsafe extern "C" fn mock_set_interface(context: *mut ftdi_context, interface: c_int) -> c_int {
    let device = unsafe { device(context) };
    let index = match interface {
        0 | 1 => 1,
        2..=4 => interface,
        _ => return fail(device, -2, c"Unknown interface"),
    };
    if is_open(device) && device.context.index != index {
        return fail(
            device,
            -3,
            c"Interface can not be changed on an already open device",
        );
    }
    device.context.interface = index - 1;
    device.context.index = index;
    0
}

unsafe extern "C" fn mock_set_latency_timer(context: *mut ftdi_context, latency: c_uchar) -> c_int {
    let device = unsafe { device(context) };
    if latency < 1 {
        return fail(device, -1, c"latency out of range. Only valid for 1-255");
    }
    if !is_open(device) {
        return fail(device, -3, c"USB device unavailable");
    }
    device.latency = latency;
    0
}

unsafe extern "C" fn mock_get_latency_timer(
    context: *mut ftdi_context,
    latency: *mut c_uchar,
) -> c_int {
    let device = unsafe { device(context) };
    if !is_open(device) {
        return fail(device, -2, c"USB device unavailable");
    }
    unsafe { *latency = device.latency };
    0
}

unsafe extern "C" fn mock_get_library_version() -> ftdi_version_info {
    ftdi_version_info {
        major: 1,
        minor: 5,
        micro: 0,
        version_str: c"1.5".as_ptr(),
        snapshot_str: c"v1.5-stub".as_ptr(),
    }
}
