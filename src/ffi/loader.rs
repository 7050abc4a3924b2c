//! Locating and binding the native library.

use std::{env, ffi::OsString};

use libloading::{Library, Symbol};
use log::{debug, warn};

use super::{ftdi_version_info, NativeApi};
use crate::{FtdiError, Result};

/// Environment variable overriding the library search.
pub const LIBRARY_PATH_ENV: &str = "FTDI_LIBRARY_PATH";

// Only libftdi1 names. The 0.x `libftdi` has a different `ftdi_context` layout.
#[cfg(target_os = "windows")]
const CANDIDATES: [&str; 2] = ["libftdi1.dll", "ftdi1.dll"];
#[cfg(target_os = "macos")]
const CANDIDATES: [&str; 2] = ["libftdi1.2.dylib", "libftdi1.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CANDIDATES: [&str; 2] = ["libftdi1.so.2", "libftdi1.so"];

/// Library names to try, in order.
///
/// An explicit override replaces the platform defaults entirely.
pub(crate) fn candidates(override_path: Option<OsString>) -> Vec<OsString> {
    match override_path {
        Some(path) if !path.is_empty() => vec![path],
        _ => CANDIDATES.iter().map(OsString::from).collect(),
    }
}

/// Load libftdi from `FTDI_LIBRARY_PATH` or the platform default names.
pub(crate) fn load() -> Result<NativeApi> {
    load_from(candidates(env::var_os(LIBRARY_PATH_ENV)))
}

/// Load the first candidate that is a libftdi 1.x exporting every required entry point.
pub(crate) fn load_from(candidates: Vec<OsString>) -> Result<NativeApi> {
    let mut last_error = String::from("no candidate libraries");
    for candidate in candidates {
        // SAFETY: loading libftdi runs no initialisation routines with preconditions.
        match unsafe { Library::new(&candidate) } {
            Ok(library) => match unsafe { bind(library) } {
                Ok(api) => {
                    debug!("loaded libftdi from {}", candidate.to_string_lossy());
                    return Ok(api);
                }
                Err(e) => {
                    warn!("{} is not a usable libftdi: {e}", candidate.to_string_lossy());
                    last_error = e.to_string();
                }
            },
            Err(e) => {
                debug!("could not load {}: {e}", candidate.to_string_lossy());
                last_error = e.to_string();
            }
        }
    }
    Err(FtdiError::Library(last_error))
}

macro_rules! required {
    ($library:expr, $name:literal) => {
        *$library
            .get(concat!($name, "\0").as_bytes())
            .map_err(|e| FtdiError::Library(format!("missing symbol {}: {e}", $name)))?
    };
}

macro_rules! optional {
    ($library:expr, $name:literal) => {
        $library
            .get(concat!($name, "\0").as_bytes())
            .ok()
            .map(|symbol: Symbol<_>| *symbol)
    };
}

/// Bind every entry point from `library`.
///
/// # Safety
///
/// The library must be a libftdi build whose exported symbols have the signatures
/// declared in [`NativeApi`].
unsafe fn bind(library: Library) -> Result<NativeApi> {
    let mut api = NativeApi {
        library: None,
        ftdi_new: required!(library, "ftdi_new"),
        ftdi_free: required!(library, "ftdi_free"),
        ftdi_usb_open: required!(library, "ftdi_usb_open"),
        ftdi_usb_open_desc: required!(library, "ftdi_usb_open_desc"),
        ftdi_usb_open_desc_index: required!(library, "ftdi_usb_open_desc_index"),
        ftdi_usb_reset: required!(library, "ftdi_usb_reset"),
        ftdi_usb_close: required!(library, "ftdi_usb_close"),
        ftdi_set_baudrate: required!(library, "ftdi_set_baudrate"),
        ftdi_set_line_property: required!(library, "ftdi_set_line_property"),
        ftdi_set_line_property2: required!(library, "ftdi_set_line_property2"),
        ftdi_setflowctrl: required!(library, "ftdi_setflowctrl"),
        ftdi_set_bitmode: required!(library, "ftdi_set_bitmode"),
        ftdi_read_data: required!(library, "ftdi_read_data"),
        ftdi_read_data_get_chunksize: required!(library, "ftdi_read_data_get_chunksize"),
        ftdi_read_data_set_chunksize: required!(library, "ftdi_read_data_set_chunksize"),
        ftdi_write_data: required!(library, "ftdi_write_data"),
        ftdi_write_data_get_chunksize: required!(library, "ftdi_write_data_get_chunksize"),
        ftdi_write_data_set_chunksize: required!(library, "ftdi_write_data_set_chunksize"),
        ftdi_read_pins: required!(library, "ftdi_read_pins"),
        ftdi_set_interface: required!(library, "ftdi_set_interface"),
        ftdi_get_library_version: required!(library, "ftdi_get_library_version"),
        ftdi_usb_open_string: optional!(library, "ftdi_usb_open_string"),
        ftdi_set_latency_timer: optional!(library, "ftdi_set_latency_timer"),
        ftdi_get_latency_timer: optional!(library, "ftdi_get_latency_timer"),
    };
    check_version(&unsafe { (api.ftdi_get_library_version)() })?;
    api.library = Some(library);
    Ok(api)
}

/// Refuse libraries whose `ftdi_context` layout differs from [`ftdi_context`](super::ftdi_context).
pub(crate) fn check_version(info: &ftdi_version_info) -> Result<()> {
    if info.major < 1 {
        return Err(FtdiError::Library(format!(
            "libftdi {}.{} is not supported, 1.x is required",
            info.major, info.minor
        )));
    }
    Ok(())
}
