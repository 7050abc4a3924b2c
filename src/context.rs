use std::{
    ffi::{c_int, c_uchar, c_uint, CString},
    fmt::Debug,
    io,
    ops::{Deref, DerefMut},
    ptr::{self, NonNull},
    time::Duration,
};

use log::{debug, trace, warn};

use crate::{
    error::{transfer_len, try_ftdi},
    ffi::{self, NativeApi},
    BitMode, BreakType, ChipType, DataBits, FlowControl, FtdiError, Interface, ModuleDetachMode,
    Parity, Result, StopBits,
};

/// An owned libftdi context.
///
/// The context is the primary interface for talking to an FTDI chip. It owns exactly one
/// native context, which is released by [`Context::dispose`] or, failing that, when the
/// context is dropped. Once disposed, every operation returns [`FtdiError::Disposed`].
///
/// A context may be moved between threads but never shared; libftdi does no locking of
/// its own.
///
/// # Example
///
/// ```no_run
/// use ftdi_context::{BitMode, Context};
///
/// let mut context = Context::new()?;
/// let mut device = context.open_session(0x0403, 0x6001)?;
/// device.set_baudrate(115_200)?;
/// device.write_data(b"hello")?;
/// let reply = device.read_data()?;
/// # Ok::<(), ftdi_context::FtdiError>(())
/// ```
pub struct Context {
    /// Native context returned by `ftdi_new`. `None` once disposed.
    handle: Option<NonNull<ffi::ftdi_context>>,
    api: &'static NativeApi,
    /// Copy of the native error text, taken after the last failing call.
    last_error: String,
}

// The native context holds no thread-affine state. Sharing is still ruled out since
// `NonNull` keeps the type `!Sync`.
unsafe impl Send for Context {}

impl Context {
    /// Allocate a new libftdi context.
    ///
    /// The native library is loaded on first use.
    pub fn new() -> Result<Self> {
        Self::with_api(ffi::api()?)
    }

    pub(crate) fn with_api(api: &'static NativeApi) -> Result<Self> {
        let handle = NonNull::new(unsafe { (api.ftdi_new)() }).ok_or(FtdiError::Initialization)?;
        debug!("allocated libftdi context {handle:p}");
        Ok(Self {
            handle: Some(handle),
            api,
            last_error: String::new(),
        })
    }

    /// Release the native context.
    ///
    /// Calling this more than once is harmless; the native context is freed exactly once.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("freeing libftdi context {handle:p}");
            unsafe { (self.api.ftdi_free)(handle.as_ptr()) };
        }
    }

    /// Check whether [`Context::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.handle.is_none()
    }

    /// Get the raw context pointer.
    ///
    /// Although not recommended for typical users, it may be used with the entry points
    /// in the [ffi] module. The pointer is invalidated by [`Context::dispose`].
    pub fn as_raw(&self) -> Result<*mut ffi::ftdi_context> {
        self.handle.map(NonNull::as_ptr).ok_or(FtdiError::Disposed)
    }

    /// Description of the last failure reported by libftdi.
    ///
    /// This is a copy refreshed after every failing native call, so it remains valid
    /// after the context is disposed.
    #[must_use]
    pub fn error_string(&self) -> &str {
        &self.last_error
    }

    fn record(&self) -> Result<&ffi::ftdi_context> {
        // SAFETY: the handle stays valid until disposed, and `&self` rules out
        // concurrent native calls.
        Ok(unsafe { &*self.as_raw()? })
    }

    fn record_mut(&mut self) -> Result<&mut ffi::ftdi_context> {
        Ok(unsafe { &mut *self.as_raw()? })
    }

    /// Forward a native call and check its status.
    fn call<F>(&mut self, name: &str, f: F) -> Result<c_int>
    where
        F: FnOnce(&NativeApi, *mut ffi::ftdi_context) -> c_int,
    {
        let context = self.as_raw()?;
        let status = f(self.api, context);
        trace!("{name} returned {status}");
        try_ftdi!(context, status).inspect_err(|e| {
            if let FtdiError::Status { message, .. } = e {
                self.last_error.clone_from(message);
            }
        })
    }

    /// Open the first device with the given vendor and product IDs.
    pub fn usb_open(&mut self, vendor: u16, product: u16) -> Result<()> {
        self.call("ftdi_usb_open", |api, context| unsafe {
            (api.ftdi_usb_open)(context, vendor.into(), product.into())
        })?;
        debug!("opened device {vendor:04x}:{product:04x}");
        Ok(())
    }

    /// Open the first device with the given vendor and product IDs, description and serial.
    ///
    /// `None` matches any description or serial.
    pub fn usb_open_desc(
        &mut self,
        vendor: u16,
        product: u16,
        description: Option<&str>,
        serial: Option<&str>,
    ) -> Result<()> {
        let description = optional_c_string("description", description)?;
        let serial = optional_c_string("serial", serial)?;
        self.call("ftdi_usb_open_desc", |api, context| unsafe {
            (api.ftdi_usb_open_desc)(
                context,
                vendor.into(),
                product.into(),
                optional_ptr(description.as_ref()),
                optional_ptr(serial.as_ref()),
            )
        })?;
        debug!("opened device {vendor:04x}:{product:04x}");
        Ok(())
    }

    /// Open the `index`-th matching device, counting from zero.
    pub fn usb_open_desc_index(
        &mut self,
        vendor: u16,
        product: u16,
        description: Option<&str>,
        serial: Option<&str>,
        index: u32,
    ) -> Result<()> {
        let description = optional_c_string("description", description)?;
        let serial = optional_c_string("serial", serial)?;
        self.call("ftdi_usb_open_desc_index", |api, context| unsafe {
            (api.ftdi_usb_open_desc_index)(
                context,
                vendor.into(),
                product.into(),
                optional_ptr(description.as_ref()),
                optional_ptr(serial.as_ref()),
                c_uint::from(index),
            )
        })?;
        debug!("opened device {vendor:04x}:{product:04x} #{index}");
        Ok(())
    }

    /// Open a device described by a libftdi device string.
    ///
    /// Accepted forms are `d:<bus>/<device>`, `i:<vendor>:<product>[:<index>]` and
    /// `s:<vendor>:<product>:<serial>`.
    pub fn usb_open_string(&mut self, descriptor: &str) -> Result<()> {
        let Some(open_string) = self.api.ftdi_usb_open_string else {
            return ffi::unsupported("ftdi_usb_open_string");
        };
        let descriptor_c = CString::new(descriptor)
            .map_err(|_| FtdiError::invalid_argument("device string contains a nul byte"))?;
        self.call("ftdi_usb_open_string", |_, context| unsafe {
            open_string(context, descriptor_c.as_ptr())
        })?;
        debug!("opened device {descriptor}");
        Ok(())
    }

    /// Open the first device with the given IDs for the lifetime of the returned guard.
    ///
    /// The device is closed when the guard is dropped, whichever way the scope is left.
    pub fn open_session(&mut self, vendor: u16, product: u16) -> Result<UsbSession<'_>> {
        self.usb_open(vendor, product)?;
        Ok(UsbSession { context: self })
    }

    /// Reset the device.
    pub fn usb_reset(&mut self) -> Result<()> {
        self.call("ftdi_usb_reset", |api, context| unsafe {
            (api.ftdi_usb_reset)(context)
        })?;
        Ok(())
    }

    /// Close the device.
    ///
    /// Closing never fails. A failure reported by libftdi, such as closing a device that
    /// is not open, is logged and recorded in [`Context::error_string`]. Closing a disposed
    /// context does nothing.
    pub fn usb_close(&mut self) {
        if self.is_disposed() {
            return;
        }
        match self.call("ftdi_usb_close", |api, context| unsafe {
            (api.ftdi_usb_close)(context)
        }) {
            Ok(_) => debug!("closed device"),
            Err(e) => warn!("ignoring failure to close device: {e}"),
        }
    }

    /// Check whether a device is currently open.
    #[must_use]
    pub fn is_usb_open(&self) -> bool {
        self.record().is_ok_and(|record| !record.usb_dev.is_null())
    }

    /// Get the baud rate last accepted by libftdi.
    ///
    /// This is `-1` until a device has been opened.
    pub fn baudrate(&self) -> Result<i32> {
        Ok(self.record()?.baudrate)
    }

    /// Set the chip baud rate.
    pub fn set_baudrate(&mut self, baudrate: i32) -> Result<()> {
        if baudrate <= 0 {
            return Err(FtdiError::invalid_argument(format!(
                "baud rate must be positive, got {baudrate}"
            )));
        }
        self.call("ftdi_set_baudrate", |api, context| unsafe {
            (api.ftdi_set_baudrate)(context, baudrate)
        })?;
        Ok(())
    }

    /// Set the RS232 line characteristics. The break condition is switched off.
    pub fn set_line_property(
        &mut self,
        bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<()> {
        self.call("ftdi_set_line_property", |api, context| unsafe {
            (api.ftdi_set_line_property)(context, bits.into(), stop_bits.into(), parity.into())
        })?;
        Ok(())
    }

    /// Set the RS232 line characteristics including the break condition.
    pub fn set_line_property2(
        &mut self,
        bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
        break_type: BreakType,
    ) -> Result<()> {
        self.call("ftdi_set_line_property2", |api, context| unsafe {
            (api.ftdi_set_line_property2)(
                context,
                bits.into(),
                stop_bits.into(),
                parity.into(),
                break_type.into(),
            )
        })?;
        Ok(())
    }

    /// Set the flow control setting, returning the value passed in.
    pub fn set_flow_control(&mut self, flow: FlowControl) -> Result<FlowControl> {
        self.call("ftdi_setflowctrl", |api, context| unsafe {
            (api.ftdi_setflowctrl)(context, flow.bits())
        })?;
        Ok(flow)
    }

    /// Enable or disable a bitbang mode.
    ///
    /// Bits set in `bitmask` configure the corresponding pins as outputs.
    pub fn set_bitmode(&mut self, bitmask: u8, mode: BitMode) -> Result<()> {
        self.call("ftdi_set_bitmode", |api, context| unsafe {
            (api.ftdi_set_bitmode)(context, bitmask, mode.into())
        })?;
        Ok(())
    }

    /// Check whether a bitbang mode is active.
    pub fn bitbang_enabled(&self) -> Result<bool> {
        Ok(self.record()?.bitbang_enabled != 0)
    }

    /// Get the read buffer chunk size.
    pub fn read_chunk_size(&mut self) -> Result<u32> {
        let mut chunk_size: c_uint = 0;
        self.call("ftdi_read_data_get_chunksize", |api, context| unsafe {
            (api.ftdi_read_data_get_chunksize)(context, &mut chunk_size)
        })?;
        Ok(chunk_size)
    }

    /// Set the read buffer chunk size, returning the value passed in. The default is 4096.
    pub fn set_read_chunk_size(&mut self, chunk_size: u32) -> Result<u32> {
        check_chunk_size(chunk_size)?;
        self.call("ftdi_read_data_set_chunksize", |api, context| unsafe {
            (api.ftdi_read_data_set_chunksize)(context, chunk_size)
        })?;
        Ok(chunk_size)
    }

    /// Get the write buffer chunk size.
    pub fn write_chunk_size(&mut self) -> Result<u32> {
        let mut chunk_size: c_uint = 0;
        self.call("ftdi_write_data_get_chunksize", |api, context| unsafe {
            (api.ftdi_write_data_get_chunksize)(context, &mut chunk_size)
        })?;
        Ok(chunk_size)
    }

    /// Set the write buffer chunk size, returning the value passed in. The default is 4096.
    pub fn set_write_chunk_size(&mut self, chunk_size: u32) -> Result<u32> {
        check_chunk_size(chunk_size)?;
        self.call("ftdi_write_data_set_chunksize", |api, context| unsafe {
            (api.ftdi_write_data_set_chunksize)(context, chunk_size)
        })?;
        Ok(chunk_size)
    }

    /// Read up to one read chunk of data.
    ///
    /// Returns once at least one byte is available or the latency timer expires. The
    /// modem status bytes are stripped by libftdi. An empty vector means no data was
    /// available, not the end of a stream.
    pub fn read_data(&mut self) -> Result<Vec<u8>> {
        let chunk_size = self.read_chunk_size()?;
        let mut buf = vec![0; chunk_size as usize];
        let count = self.read_into(&mut buf)?;
        buf.truncate(count);
        Ok(buf)
    }

    /// Read into `buf`, returning the number of bytes read.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.as_raw()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let size = transfer_len(buf.len())?;
        let count = self.call("ftdi_read_data", |api, context| unsafe {
            (api.ftdi_read_data)(context, buf.as_mut_ptr(), size)
        })?;
        trace!("read {count} of {size} bytes");
        Ok(count as usize)
    }

    /// Write data, returning the number of bytes written.
    ///
    /// A short write is not an error.
    pub fn write_data(&mut self, data: impl AsRef<[u8]>) -> Result<usize> {
        let data = data.as_ref();
        self.as_raw()?;
        if data.is_empty() {
            return Ok(0);
        }
        let size = transfer_len(data.len())?;
        let count = self.call("ftdi_write_data", |api, context| unsafe {
            (api.ftdi_write_data)(context, data.as_ptr(), size)
        })?;
        trace!("wrote {count} of {size} bytes");
        Ok(count as usize)
    }

    /// Read the pin levels directly, bypassing the read buffer. Useful in bitbang mode.
    pub fn read_pins(&mut self) -> Result<u8> {
        let mut pins: c_uchar = 0;
        self.call("ftdi_read_pins", |api, context| unsafe {
            (api.ftdi_read_pins)(context, &mut pins)
        })?;
        Ok(pins)
    }

    /// Get the selected interface.
    pub fn interface(&self) -> Result<Interface> {
        let index = self.record()?.index;
        Interface::try_from(index).map_err(|_| FtdiError::UnknownValue {
            field: "index",
            value: index,
        })
    }

    /// Select the interface of a multi-interface chip, returning the value passed in.
    ///
    /// [`Interface::Any`] selects interface A. The interface cannot be changed while a
    /// device is open.
    pub fn set_interface(&mut self, interface: Interface) -> Result<Interface> {
        self.call("ftdi_set_interface", |api, context| unsafe {
            (api.ftdi_set_interface)(context, interface.into())
        })?;
        Ok(interface)
    }

    /// Get the chip type detected when the device was opened.
    pub fn chip_type(&self) -> Result<ChipType> {
        let value = self.record()?.type_;
        ChipType::try_from(value).map_err(|_| FtdiError::UnknownValue {
            field: "type",
            value,
        })
    }

    /// Get the maximum USB packet size of the open device.
    pub fn max_packet_size(&self) -> Result<u32> {
        Ok(self.record()?.max_packet_size)
    }

    /// Get the USB read timeout.
    pub fn usb_read_timeout(&self) -> Result<Duration> {
        Ok(millis(self.record()?.usb_read_timeout))
    }

    /// Set the USB read timeout used by subsequent transfers.
    pub fn set_usb_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.record_mut()?.usb_read_timeout = timeout_millis(timeout)?;
        Ok(())
    }

    /// Get the USB write timeout.
    pub fn usb_write_timeout(&self) -> Result<Duration> {
        Ok(millis(self.record()?.usb_write_timeout))
    }

    /// Set the USB write timeout used by subsequent transfers.
    pub fn set_usb_write_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.record_mut()?.usb_write_timeout = timeout_millis(timeout)?;
        Ok(())
    }

    /// Get the kernel driver detach mode.
    pub fn module_detach_mode(&self) -> Result<ModuleDetachMode> {
        let value = self.record()?.module_detach_mode;
        ModuleDetachMode::try_from(value).map_err(|_| FtdiError::UnknownValue {
            field: "module_detach_mode",
            value,
        })
    }

    /// Set the kernel driver detach mode. Takes effect on the next open.
    pub fn set_module_detach_mode(&mut self, mode: ModuleDetachMode) -> Result<()> {
        self.record_mut()?.module_detach_mode = mode.into();
        Ok(())
    }

    /// Get the latency timer in milliseconds.
    pub fn latency_timer(&mut self) -> Result<u8> {
        let Some(get_latency_timer) = self.api.ftdi_get_latency_timer else {
            return ffi::unsupported("ftdi_get_latency_timer");
        };
        let mut latency: c_uchar = 0;
        self.call("ftdi_get_latency_timer", |_, context| unsafe {
            get_latency_timer(context, &mut latency)
        })?;
        Ok(latency)
    }

    /// Set the latency timer in milliseconds, `1..=255`.
    pub fn set_latency_timer(&mut self, latency: u8) -> Result<()> {
        let Some(set_latency_timer) = self.api.ftdi_set_latency_timer else {
            return ffi::unsupported("ftdi_set_latency_timer");
        };
        if latency == 0 {
            return Err(FtdiError::invalid_argument("latency timer must be 1..=255"));
        }
        self.call("ftdi_set_latency_timer", |_, context| unsafe {
            set_latency_timer(context, latency)
        })?;
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Context");
        match self.record() {
            Ok(record) => s.field("native", record),
            Err(_) => s.field("native", &"disposed"),
        };
        s.field("last_error", &self.last_error).finish()
    }
}

/// Reads go through [`Context::read_into`].
///
/// A return value of zero means no data was available when the latency timer expired,
/// so adapters which treat zero as end-of-file will stop early.
impl io::Read for Context {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_data(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A device opened by [`Context::open_session`].
///
/// Dereferences to the [`Context`] and closes the device when dropped.
#[derive(Debug)]
pub struct UsbSession<'a> {
    context: &'a mut Context,
}

impl Deref for UsbSession<'_> {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for UsbSession<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for UsbSession<'_> {
    fn drop(&mut self) {
        self.context.usb_close();
    }
}

fn optional_c_string(what: &str, value: Option<&str>) -> Result<Option<CString>> {
    value
        .map(|value| {
            CString::new(value)
                .map_err(|_| FtdiError::invalid_argument(format!("{what} contains a nul byte")))
        })
        .transpose()
}

fn optional_ptr(value: Option<&CString>) -> *const std::ffi::c_char {
    value.map_or(ptr::null(), |value| value.as_ptr())
}

fn check_chunk_size(chunk_size: u32) -> Result<()> {
    if chunk_size == 0 || c_int::try_from(chunk_size).is_err() {
        return Err(FtdiError::invalid_argument(format!(
            "chunk size must be 1..={}, got {chunk_size}",
            c_int::MAX
        )));
    }
    Ok(())
}

fn millis(value: c_int) -> Duration {
    Duration::from_millis(u64::try_from(value).unwrap_or(0))
}

fn timeout_millis(timeout: Duration) -> Result<c_int> {
    c_int::try_from(timeout.as_millis())
        .map_err(|_| FtdiError::invalid_argument(format!("timeout {timeout:?} is too long")))
}
