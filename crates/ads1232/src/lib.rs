//! Provides a driver for the Texas Instruments ADS1232 24-bit delta-sigma ADC via the `embedded-hal` ecosystem.
//!
//! The chip speaks a bit-banged two-wire protocol: results are clocked out of
//! DOUT one bit per SCLK pulse, with two further control lines for power-down
//! and output-rate selection. On top of the raw protocol the driver layers
//! sample averaging and a linear tare/scale calibration, so applications can
//! work in physical units.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Slack added to every conversion wait, in milliseconds. Conversions
/// sometimes take longer than the datasheet claims.
const WAIT_MARGIN_MS: u32 = 600;

/// Time the chip needs to finish its internal offset-calibration routine
/// before the next conversion may be requested.
const CAL_SETTLE_SPS80_MS: u32 = 100;
const CAL_SETTLE_SPS10_MS: u32 = 800;

/// Output data rate, selected via the SPEED pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rate {
    /// 10 samples per second, lowest noise.
    Sps10,
    /// 80 samples per second, faster but noisier.
    Sps80,
}

/// Electrical pacing options, chosen by the caller for its target platform.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Insert a ~1µs settle delay after every pin transition. Required on
    /// cores fast enough that back-to-back GPIO writes would outrun the
    /// chip's timing windows; slow parts can turn it off.
    pub settle_delay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { settle_delay: true }
    }
}

/// Errors that can occur while talking to the ADS1232.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// A pin operation failed.
    Pin(E),
    /// DOUT never went high (busy) within the wait budget.
    TimeoutWaitingHigh,
    /// DOUT never went low (ready) within the wait budget.
    TimeoutWaitingLow,
    /// Averaging over zero samples, or unit conversion with a zero scale.
    DivideByZero,
}

/// Worst-case time until the next conversion is ready, per datasheet, plus a
/// fixed safety margin. Calibrating reads get a longer base because the chip
/// settles internally after the calibration command.
fn wait_budget_ms(rate: Rate, calibrating: bool) -> u32 {
    let base = match (rate, calibrating) {
        (Rate::Sps80, true) => 150,
        (Rate::Sps10, true) => 850,
        (Rate::Sps80, false) => 20,
        (Rate::Sps10, false) => 150,
    };
    base + WAIT_MARGIN_MS
}

/// ADS1232 driver.
///
/// Owns the chip's four interface pins and a delay provider. DOUT must be
/// configured as an input before construction; whether to enable a pull-up on
/// it is a platform decision (most parts are happiest with one, while the
/// ESP8266 misreads mid-scale codes when DOUT is pulled up).
///
/// All reads are blocking and busy-poll DOUT with a coarse ~1ms sleep; the
/// driver assumes exclusive, uninterrupted control of the signal lines for
/// the duration of each call.
pub struct Ads1232<DOUT, SCLK, PDWN, SPEED, DELAY> {
    dout: DOUT,
    sclk: SCLK,
    pdwn: PDWN,
    speed: SPEED,
    delay: DELAY,
    rate: Rate,
    settle_delay: bool,
    offset: f32,
    scale: f32,
}

impl<DOUT, SCLK, PDWN, SPEED, DELAY, E> Ads1232<DOUT, SCLK, PDWN, SPEED, DELAY>
where
    DOUT: InputPin<Error = E>,
    SCLK: OutputPin<Error = E>,
    PDWN: OutputPin<Error = E>,
    SPEED: OutputPin<Error = E>,
    DELAY: DelayNs,
{
    /// Binds the interface pins, applies `rate` and wakes the chip into
    /// conversion mode.
    ///
    /// The calibration starts out as the identity (offset 0, scale 1) until
    /// [`tare`](Self::tare) and [`set_scale`](Self::set_scale) are used.
    pub fn try_new(
        dout: DOUT,
        sclk: SCLK,
        pdwn: PDWN,
        speed: SPEED,
        delay: DELAY,
        rate: Rate,
        config: Config,
    ) -> Result<Self, Error<E>> {
        let mut adc = Self {
            dout,
            sclk,
            pdwn,
            speed,
            delay,
            rate,
            settle_delay: config.settle_delay,
            offset: 0.0,
            scale: 1.0,
        };

        adc.set_rate(rate)?;
        adc.power_up()?;

        Ok(adc)
    }

    /// Brings the chip out of suspend and back into conversion mode.
    pub fn power_up(&mut self) -> Result<(), Error<E>> {
        self.pdwn.set_high().map_err(Error::Pin)?;
        self.settle();

        // SCLK held low takes the chip out of suspend.
        self.sclk.set_low().map_err(Error::Pin)?;
        self.settle();

        Ok(())
    }

    /// Puts the chip into its low-power suspend state.
    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        self.pdwn.set_low().map_err(Error::Pin)?;
        self.settle();

        self.sclk.set_high().map_err(Error::Pin)?;
        self.settle();

        Ok(())
    }

    /// Whether DOUT currently reads low, which the chip asserts once a
    /// conversion result is available.
    ///
    /// This is a point-in-time poll: a low line may also be a stale result
    /// that was clocked out long ago. [`read`](Self::read) does its own,
    /// stricter readiness handshake.
    pub fn is_ready(&mut self) -> Result<bool, Error<E>> {
        self.dout.is_low().map_err(Error::Pin)
    }

    /// Drives the SPEED pin for `rate` and records it for the wait-budget
    /// arithmetic.
    pub fn set_rate(&mut self, rate: Rate) -> Result<(), Error<E>> {
        self.rate = rate;

        match rate {
            Rate::Sps10 => self.speed.set_low().map_err(Error::Pin)?,
            Rate::Sps80 => self.speed.set_high().map_err(Error::Pin)?,
        }
        self.settle();

        Ok(())
    }

    /// The currently selected output data rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Clocks one conversion result out of the chip, sign-extended to `i32`.
    ///
    /// Blocks the calling thread for up to the rate-dependent wait budget,
    /// polling DOUT at ~1ms intervals; an in-progress read cannot be
    /// cancelled short of the timeout expiring. Timeouts are recoverable and
    /// the caller may simply retry.
    ///
    /// A `calibrating` read additionally triggers the chip's internal offset
    /// calibration and then blocks for the (substantial) calibration settle
    /// time. Its own result predates the calibration; only the reads that
    /// follow reflect it.
    pub fn read(&mut self, calibrating: bool) -> Result<i32, Error<E>> {
        let budget_ms = wait_budget_ms(self.rate, calibrating);

        // A high-to-low transition on DOUT means the chip has finished a
        // conversion (datasheet page 13). Testing the level at a single
        // instant is unsafe: a line that is already low may be a result that
        // was consumed long ago. Only an observed busy-then-ready transition
        // guarantees a fresh one.
        self.wait_for_dout(true, budget_ms, Error::TimeoutWaitingHigh)?;
        self.wait_for_dout(false, budget_ms, Error::TimeoutWaitingLow)?;

        // Shift in 24 bits, MSB first, sampling DOUT while SCLK is high.
        let mut raw: u32 = 0;
        for _ in 0..24 {
            self.sclk.set_high().map_err(Error::Pin)?;
            self.settle();

            raw = (raw << 1) | u32::from(self.dout.is_high().map_err(Error::Pin)?);

            self.sclk.set_low().map_err(Error::Pin)?;
            self.settle();
        }

        if calibrating {
            // Two extra pulses start the offset-calibration cycle.
            self.pulse_sclk()?;
            self.pulse_sclk()?;

            // The chip must finish calibrating before the next conversion is
            // requested.
            match self.rate {
                Rate::Sps80 => self.delay.delay_ms(CAL_SETTLE_SPS80_MS),
                Rate::Sps10 => self.delay.delay_ms(CAL_SETTLE_SPS10_MS),
            }
        }

        // Bit 23 is the sign bit. Shift it up to bit 31 and arithmetic-shift
        // back down to extend it.
        let value = ((raw << 8) as i32) >> 8;

        if !calibrating {
            // DOUT is left high or low depending on the last bit shifted out.
            // One more pulse returns it to its default (high) state.
            self.pulse_sclk()?;
        }

        Ok(value)
    }

    /// Averages `samples` conversions into an `f32`.
    ///
    /// With `calibrating` set, one calibrating read is issued first and its
    /// value discarded, since it predates the calibration; the averaged reads
    /// that follow are plain. Fails with [`Error::DivideByZero`] before
    /// touching any line when `samples` is zero, and forwards the first read
    /// error otherwise.
    pub fn read_average(&mut self, samples: u8, calibrating: bool) -> Result<f32, Error<E>> {
        if samples == 0 {
            return Err(Error::DivideByZero);
        }

        if calibrating {
            self.read(true)?;
        }

        let mut sum: i64 = 0;
        for _ in 0..samples {
            sum += i64::from(self.read(false)?);
            self.delay.delay_ms(1);
        }

        Ok(sum as f32 / f32::from(samples))
    }

    /// Averaged reading with the tare offset subtracted.
    pub fn get_value(&mut self, samples: u8, calibrating: bool) -> Result<f32, Error<E>> {
        Ok(self.read_average(samples, calibrating)? - self.offset)
    }

    /// Offset-corrected reading converted to caller units by the configured
    /// scale. Fails with [`Error::DivideByZero`] when the scale is zero.
    pub fn get_units(&mut self, samples: u8, calibrating: bool) -> Result<f32, Error<E>> {
        let value = self.get_value(samples, calibrating)?;

        if self.scale == 0.0 {
            return Err(Error::DivideByZero);
        }

        Ok(value / self.scale)
    }

    /// Captures the current raw average as the new offset, so that the
    /// present physical load reads as zero.
    pub fn tare(&mut self, samples: u8, calibrating: bool) -> Result<(), Error<E>> {
        let average = self.read_average(samples, calibrating)?;
        self.set_offset(average);
        Ok(())
    }

    /// Set the divisor that maps offset-corrected readings to caller units.
    /// Not validated here; a zero scale fails at [`get_units`](Self::get_units).
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the baseline subtracted from averaged readings.
    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset;
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Release the interface pins and the delay provider.
    pub fn free(self) -> (DOUT, SCLK, PDWN, SPEED, DELAY) {
        (self.dout, self.sclk, self.pdwn, self.speed, self.delay)
    }

    /// Poll DOUT at ~1ms until it reads `level`, bounded by `budget_ms`.
    fn wait_for_dout(&mut self, level: bool, budget_ms: u32, err: Error<E>) -> Result<(), Error<E>> {
        let mut waited_ms = 0;
        loop {
            if self.dout.is_high().map_err(Error::Pin)? == level {
                return Ok(());
            }
            if waited_ms > budget_ms {
                return Err(err);
            }
            self.delay.delay_ms(1);
            waited_ms += 1;
        }
    }

    /// Pulse SCLK high then low without sampling DOUT.
    fn pulse_sclk(&mut self) -> Result<(), Error<E>> {
        self.sclk.set_high().map_err(Error::Pin)?;
        self.settle();
        self.sclk.set_low().map_err(Error::Pin)?;
        self.settle();
        Ok(())
    }

    fn settle(&mut self) {
        if self.settle_delay {
            self.delay.delay_us(1);
        }
    }
}
