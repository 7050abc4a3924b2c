//! Open an FT232R, set the baud rate and print the native context.
use ftdi_context::{library_version, Context};

const BAUD_RATE: i32 = 250_000;

fn main() {
    env_logger::init();
    match library_version() {
        Ok(version) => println!("libftdi {}", version.version()),
        Err(e) => eprintln!("{e}"),
    }

    let mut context = match Context::new() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    match context.open_session(0x0403, 0x6001) {
        Ok(mut device) => match device.set_baudrate(BAUD_RATE) {
            Ok(()) => println!("Context is:\n{:#?}", *device),
            Err(e) => eprintln!("{e}"),
        },
        Err(e) => eprintln!("{e}"),
    }

    context.dispose();
}
