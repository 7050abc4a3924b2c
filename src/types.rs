//! Enumerations mirrored from libftdi.
//!
//! Discriminants are the native ABI values and are passed to the library unchanged.
//! Conversions from raw integers are checked, so an out-of-domain value such as nine data
//! bits is rejected before any native call is made:
//!
//! ```
//! use ftdi_context::{DataBits, FtdiError};
//!
//! assert_eq!(DataBits::try_from(8).unwrap(), DataBits::Eight);
//! let err = FtdiError::from(DataBits::try_from(9).unwrap_err());
//! assert!(matches!(err, FtdiError::InvalidArgument(_)));
//! ```

use std::ffi::c_int;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// FTDI chip type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ChipType {
    /// FT8U232AM.
    Am = 0,
    /// FT232BM and FT245BM.
    Bm = 1,
    /// FT2232C/D/L.
    Ft2232C = 2,
    /// FT232R and FT245R.
    R = 3,
    /// FT2232H.
    Ft2232H = 4,
    /// FT4232H.
    Ft4232H = 5,
    /// FT232H.
    Ft232H = 6,
    /// FT230X and the rest of the X series.
    Ft230X = 7,
}

/// Number of data bits per frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum DataBits {
    /// 7 data bits.
    Seven = 7,
    /// 8 data bits.
    Eight = 8,
}

/// Number of stop bits per frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum StopBits {
    /// 1 stop bit.
    One = 0,
    /// 1.5 stop bits.
    OneAndHalf = 1,
    /// 2 stop bits.
    Two = 2,
}

/// Parity mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Parity {
    /// No parity bit.
    None = 0,
    /// Odd parity.
    Odd = 1,
    /// Even parity.
    Even = 2,
    /// Parity bit always set.
    Mark = 3,
    /// Parity bit always clear.
    Space = 4,
}

/// Break condition on the TX line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum BreakType {
    /// Normal operation.
    Off = 0,
    /// Hold TX low.
    On = 1,
}

/// Bitbang mode, see [`Context::set_bitmode`](crate::Context::set_bitmode).
///
/// Unlike the other enumerations these are single-bit values, matching the mode byte sent
/// to the chip.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BitMode {
    /// Switch off bitbang mode, back to regular serial/FIFO.
    Reset = 0x00,
    /// Classical asynchronous bitbang mode.
    Bitbang = 0x01,
    /// Multi-protocol synchronous serial engine, available on 2232x chips.
    Mpsse = 0x02,
    /// Synchronous bitbang mode.
    SyncBb = 0x04,
    /// MCU host bus emulation mode.
    Mcu = 0x08,
    /// Fast opto-isolated serial interface mode.
    Opto = 0x10,
    /// Bitbang on CBUS pins of R-type chips.
    Cbus = 0x20,
    /// Single channel synchronous 245 FIFO mode.
    SyncFf = 0x40,
}

/// Port interface for chips with multiple interfaces.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Interface {
    /// Whichever interface the chip has first; same as [`Interface::A`].
    Any = 0,
    /// Interface A.
    A = 1,
    /// Interface B.
    B = 2,
    /// Interface C, FT4232H only.
    C = 3,
    /// Interface D, FT4232H only.
    D = 4,
}

/// What libftdi does when a kernel driver is already bound to the device at open time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ModuleDetachMode {
    /// Detach the kernel driver on open.
    AutoDetach = 0,
    /// Leave the kernel driver bound.
    DontDetach = 1,
    /// Detach on open and reattach on close. Needs libftdi 1.5 or later.
    AutoDetachReattach = 2,
}

bitflags::bitflags! {
    /// Flow control setting.
    ///
    /// The handshake flags occupy the high byte of the value passed to the chip, hence the
    /// `<< 8`. An empty set disables flow control.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct FlowControl: c_int {
        /// RTS/CTS hardware handshaking.
        const RTS_CTS = 0x1 << 8;
        /// DTR/DSR hardware handshaking.
        const DTR_DSR = 0x2 << 8;
        /// XON/XOFF software handshaking.
        const XON_XOFF = 0x4 << 8;
    }
}

impl FlowControl {
    /// No handshaking.
    pub const DISABLED: Self = Self::empty();
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::DISABLED
    }
}
