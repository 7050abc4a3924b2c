//! Toggle all data pins of an FT232R in bitbang mode.
use std::{thread, time::Duration};

use ftdi_context::{BitMode, Context, Result};

fn main() -> Result<()> {
    env_logger::init();
    let mut context = Context::new()?;
    let mut device = context.open_session(0x0403, 0x6001)?;

    device.set_bitmode(0xff, BitMode::Bitbang)?;
    let result = (|| -> Result<()> {
        for _ in 0..10 {
            device.write_data([0xffu8])?;
            thread::sleep(Duration::from_millis(500));
            device.write_data([0x00u8])?;
            thread::sleep(Duration::from_millis(500));
        }
        Ok(())
    })();
    device.set_bitmode(0xff, BitMode::Reset)?;
    result
}
