use std::thread;
use std::time::Duration;

use ads1232::{Ads1232, Config, Rate};
use rppal::gpio::Gpio;
use rppal::hal::Delay;

// BCM pin assignments for the scale board.
const DOUT_PIN: u8 = 5;
const SCLK_PIN: u8 = 6;
const PDWN_PIN: u8 = 13;
const SPEED_PIN: u8 = 19;

// Counts per gram for the 5kg load cell, found by weighing a known mass.
const COUNTS_PER_GRAM: f32 = 412.3;

fn main() -> Result<(), anyhow::Error> {
    let gpio = Gpio::new()?;

    // The Pi reads DOUT fine with the internal pull-up on, unlike the
    // ESP8266 parts that need it left floating.
    let dout = gpio.get(DOUT_PIN)?.into_input_pullup();
    let sclk = gpio.get(SCLK_PIN)?.into_output();
    let pdwn = gpio.get(PDWN_PIN)?.into_output();
    let speed = gpio.get(SPEED_PIN)?.into_output();

    let mut adc = Ads1232::try_new(
        dout,
        sclk,
        pdwn,
        speed,
        Delay::new(),
        Rate::Sps10,
        Config::default(),
    )
    .expect("failed to bring up the ADS1232");

    adc.set_scale(COUNTS_PER_GRAM);

    println!("taring, keep the platform empty...");
    adc.tare(10, true).expect("tare failed");

    loop {
        match adc.get_units(5, false) {
            Ok(grams) => println!("{grams:.1} g"),
            Err(err) => eprintln!("read failed: {err:?}"),
        }

        thread::sleep(Duration::from_millis(500));
    }
}
