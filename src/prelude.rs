//! Public prelude of the crate containing the most commonly used types and functions.

pub use crate::{
    BitMode, Context, DataBits, FlowControl, FtdiError, Interface, Parity, Result, StopBits,
};
