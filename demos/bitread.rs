//! Print the pin levels of an FT232R in bitbang mode twice a second.
use std::{thread, time::Duration};

use ftdi_context::{BitMode, Context, Result};

fn main() -> Result<()> {
    env_logger::init();
    let mut context = Context::new()?;
    let mut device = context.open_session(0x0403, 0x6001)?;

    device.set_bitmode(0x00, BitMode::Bitbang)?;
    for _ in 0..100 {
        match device.read_pins() {
            Ok(pins) => println!("{pins:#010b}"),
            Err(e) => {
                eprintln!("{e}");
                break;
            }
        }
        thread::sleep(Duration::from_millis(500));
    }
    device.set_bitmode(0x00, BitMode::Reset)
}
