//! [libftdi](https://www.intra2net.com/en/developer/libftdi/) is an open source driver library
//! for FTDI's USB-serial converter chips (FT232R, FT2232H, FT4232H, FT232H, ...). It talks
//! to the chips through libusb and supports serial I/O as well as the various bitbang modes.
//!
//! This crate provides a safe, idiomatic Rust wrapper around libftdi's context API.
//!
//! # Disclaimer
//!
//! This crate is unofficial and is not affiliated with FTDI or Intra2net in any way.
//!
//! # What This Crate Does
//!
//! Every method of [`Context`] forwards to exactly one libftdi function:
//! - Opening and closing devices by vendor/product ID, description, serial and index
//! - Baud rate, line properties and flow control
//! - Bitbang modes and direct pin reads
//! - Chunked data reads and writes
//! - Interface selection on multi-interface chips
//!
//! USB transfers, EEPROM handling and the MPSSE protocol all stay inside libftdi.
//!
//! # Requirements
//!
//! libftdi 1.x must be installed at runtime. The 0.x series is refused since its context
//! record has a different layout.
//! The library is located and loaded the first time a [`Context`] is created; set
//! `FTDI_LIBRARY_PATH` to load a specific file instead of searching the default names.
//! Nothing is linked at build time, so the crate builds without libftdi present.
//!
//! # Error Handling
//!
//! libftdi reports failure through negative status codes, together with a description
//! stored in the context. Both are surfaced through [`FtdiError::Status`]. Arguments
//! that cannot be valid are rejected with [`FtdiError::InvalidArgument`] before any native
//! call is made. Nothing is retried.
//!
//! # Resource Management
//!
//! A [`Context`] owns one native context. Release it explicitly with
//! [`Context::dispose`]; dropping the context does the same if that has not happened.
//! Devices can be scoped in the same way with [`Context::open_session`], which closes the
//! device on every exit path.
//!
//! # Simple Example
//!
//! ```no_run
//! use ftdi_context::{Context, DataBits, Parity, StopBits};
//!
//! let mut context = Context::new().expect("failed to create context");
//! let mut device = context
//!     .open_session(0x0403, 0x6001)
//!     .expect("failed to open device");
//!
//! device.set_baudrate(115_200).expect("failed to set baud rate");
//! device
//!     .set_line_property(DataBits::Eight, StopBits::One, Parity::None)
//!     .expect("failed to set line property");
//!
//! device.write_data(b"ping").expect("failed to write");
//! let reply = device.read_data().expect("failed to read");
//! println!("{reply:?}");
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::cargo, missing_docs)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod context;
mod error;
pub mod ffi;
pub mod prelude;
mod types;

pub use context::{Context, UsbSession};
pub use error::{FtdiError, Result};
pub use types::{
    BitMode, BreakType, ChipType, DataBits, FlowControl, Interface, ModuleDetachMode, Parity,
    StopBits,
};

/// Get the version of the loaded libftdi.
pub fn library_version() -> Result<Version> {
    Ok(Version::from_api(ffi::api()?))
}

/// libftdi version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: i32,
    minor: i32,
    micro: i32,
    version: String,
    snapshot: String,
}

impl Version {
    fn from_api(api: &ffi::NativeApi) -> Self {
        let info = unsafe { (api.ftdi_get_library_version)() };
        Self {
            major: info.major,
            minor: info.minor,
            micro: info.micro,
            version: unsafe { ffi::owned_string(info.version_str) },
            snapshot: unsafe { ffi::owned_string(info.snapshot_str) },
        }
    }

    /// Major version number.
    #[must_use]
    pub fn major(&self) -> i32 {
        self.major
    }

    /// Minor version number.
    #[must_use]
    pub fn minor(&self) -> i32 {
        self.minor
    }

    /// Micro version number.
    #[must_use]
    pub fn micro(&self) -> i32 {
        self.micro
    }

    /// Version string, e.g. `"1.5"`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Git snapshot the library was built from, if known.
    #[must_use]
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }
}
