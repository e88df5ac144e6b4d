//! `ChannelRouter` presents several identical chips as one device with a flat channel range.
//!
//! Global channel `g` lives on chip `g / channels_per_chip` as local channel
//! `g % channels_per_chip`. Indices are checked: a channel or chip id outside the group is
//! reported as a `GroupError` instead of touching the bus.

use tracing::{debug, warn};

use crate::chip::{OutputDriver, PwmChip, PwmEdge};
use crate::error::{GroupBuildError, GroupError};

///Location of a global channel inside the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    ///Index of the owning chip.
    pub chip: usize,
    ///Channel number as known to the owning chip.
    pub local: u8,
}

///Owns a fixed set of chips and routes or broadcasts operations to them.
pub struct ChannelRouter<C> {
    channels_per_chip: u8,
    chips: Vec<C>,
}

impl<C: PwmChip> ChannelRouter<C> {
    ///Builds one chip per address with `make_chip`. No bus I/O happens until `begin`.
    pub fn new<F>(
        channels_per_chip: u8,
        addresses: &[u8],
        make_chip: F,
    ) -> Result<Self, GroupBuildError>
    where
        F: FnMut(u8) -> C,
    {
        let chips = addresses.iter().copied().map(make_chip).collect();
        Self::from_chips(channels_per_chip, chips)
    }

    ///Takes ownership of already constructed chips. Chip `i` of the vec becomes chip id `i`.
    pub fn from_chips(channels_per_chip: u8, chips: Vec<C>) -> Result<Self, GroupBuildError> {
        let mut errs = Vec::new();
        if chips.is_empty() {
            errs.push("a chip group needs at least one chip".to_string());
        }
        if channels_per_chip == 0 {
            errs.push("channels per chip must be at least 1".to_string());
        } else if channels_per_chip > C::CHANNELS {
            errs.push(format!(
                "channels per chip is {} but the chip only has {} channels",
                channels_per_chip,
                C::CHANNELS
            ));
        }
        if chips.len() * channels_per_chip as usize > u16::MAX as usize {
            errs.push(format!(
                "{} chips with {} channels each exceed the addressable channel range",
                chips.len(),
                channels_per_chip
            ));
        }
        if !errs.is_empty() {
            return Err(GroupBuildError::messages(&errs));
        }

        debug!(
            "built chip group with {} chips, {} channels each",
            chips.len(),
            channels_per_chip
        );
        Ok(Self {
            channels_per_chip,
            chips,
        })
    }

    pub fn num_chips(&self) -> usize {
        self.chips.len()
    }

    pub fn channels_per_chip(&self) -> u8 {
        self.channels_per_chip
    }

    ///Total number of channels across every chip.
    pub fn num_channels(&self) -> u16 {
        self.chips.len() as u16 * self.channels_per_chip as u16
    }

    ///Finds the chip and local channel that own global `channel`.
    pub fn resolve(&self, channel: u16) -> Result<ChannelAddress, GroupError<C::Error>> {
        let total = self.num_channels();
        if channel >= total {
            return Err(GroupError::ChannelOutOfRange { channel, total });
        }
        let per_chip = self.channels_per_chip as u16;
        Ok(ChannelAddress {
            chip: (channel / per_chip) as usize,
            local: (channel % per_chip) as u8,
        })
    }

    pub fn chips(&self) -> &[C] {
        &self.chips
    }

    pub fn chip(&self, id: usize) -> Option<&C> {
        self.chips.get(id)
    }

    pub fn chip_mut(&mut self, id: usize) -> Option<&mut C> {
        self.chips.get_mut(id)
    }

    ///The chip owning global `channel`, along with the channel number on that chip.
    pub fn driver_for(&mut self, channel: u16) -> Result<(&mut C, u8), GroupError<C::Error>> {
        let addr = self.resolve(channel)?;
        Ok((&mut self.chips[addr.chip], addr.local))
    }

    ///Gives the chips back, releasing the group.
    pub fn into_chips(self) -> Vec<C> {
        self.chips
    }

    ///Sets up every chip. Returns true only if all chips succeeded; a failing chip does not
    ///stop the remaining chips from being set up.
    pub fn begin(&mut self, prescale: Option<u8>) -> bool {
        let mut status = true;
        for (id, chip) in self.chips.iter_mut().enumerate() {
            if let Err(err) = chip.begin(prescale) {
                warn!("chip {} failed to begin: {:?}", id, err);
                status = false;
            }
        }
        debug!("chip group begin finished, success: {}", status);
        status
    }

    pub fn reset(&mut self) -> Result<(), GroupError<C::Error>> {
        self.broadcast("reset", |chip| chip.reset())
    }

    pub fn sleep(&mut self) -> Result<(), GroupError<C::Error>> {
        self.broadcast("sleep", |chip| chip.sleep())
    }

    pub fn wakeup(&mut self) -> Result<(), GroupError<C::Error>> {
        self.broadcast("wakeup", |chip| chip.wakeup())
    }

    pub fn set_ext_clk(&mut self, prescale: u8) -> Result<(), GroupError<C::Error>> {
        self.broadcast("set_ext_clk", |chip| chip.set_ext_clk(prescale))
    }

    ///Sets the same output frequency on every chip, up to ~1.6 kHz.
    pub fn set_pwm_freq(&mut self, freq_hz: f32) -> Result<(), GroupError<C::Error>> {
        self.broadcast("set_pwm_freq", |chip| chip.set_pwm_freq(freq_hz))
    }

    pub fn set_output_mode(&mut self, driver: OutputDriver) -> Result<(), GroupError<C::Error>> {
        self.broadcast("set_output_mode", |chip| chip.set_output_mode(driver))
    }

    pub fn get_pwm(&mut self, channel: u16, edge: PwmEdge) -> Result<u16, GroupError<C::Error>> {
        self.routed(channel, |chip, local| chip.get_pwm(local, edge))
    }

    pub fn set_pwm(&mut self, channel: u16, on: u16, off: u16) -> Result<(), GroupError<C::Error>> {
        self.routed(channel, |chip, local| chip.set_pwm(local, on, off))
    }

    ///Sets the channel active for `value` ticks out of 4096, 0 being fully off and 4095 fully on.
    pub fn set_pin(
        &mut self,
        channel: u16,
        value: u16,
        invert: bool,
    ) -> Result<(), GroupError<C::Error>> {
        self.routed(channel, |chip, local| chip.set_pin(local, value, invert))
    }

    pub fn write_microseconds(
        &mut self,
        channel: u16,
        micros: u16,
    ) -> Result<(), GroupError<C::Error>> {
        self.routed(channel, |chip, local| chip.write_microseconds(local, micros))
    }

    ///Reads the prescale of chip 0. All chips are assumed to share one clock configuration.
    pub fn read_prescale(&mut self) -> Result<u8, GroupError<C::Error>> {
        self.read_prescale_of(0)
    }

    pub fn read_prescale_of(&mut self, id: usize) -> Result<u8, GroupError<C::Error>> {
        let chip = self.checked_chip(id)?;
        chip.read_prescale()
            .map_err(|source| GroupError::Chip { chip: id, source })
    }

    pub fn oscillator_frequency(&self, id: usize) -> Result<u32, GroupError<C::Error>> {
        match self.chips.get(id) {
            Some(chip) => Ok(chip.oscillator_frequency()),
            None => Err(GroupError::ChipOutOfRange {
                chip: id,
                count: self.chips.len(),
            }),
        }
    }

    ///Sets the tracked oscillator frequency of every chip.
    pub fn set_oscillator_frequency(&mut self, freq_hz: u32) {
        for chip in self.chips.iter_mut() {
            chip.set_oscillator_frequency(freq_hz);
        }
    }

    ///Sets the tracked oscillator frequency of chip `id` only.
    pub fn set_oscillator_frequency_of(
        &mut self,
        id: usize,
        freq_hz: u32,
    ) -> Result<(), GroupError<C::Error>> {
        self.checked_chip(id)?.set_oscillator_frequency(freq_hz);
        Ok(())
    }

    fn checked_chip(&mut self, id: usize) -> Result<&mut C, GroupError<C::Error>> {
        let count = self.chips.len();
        self.chips
            .get_mut(id)
            .ok_or(GroupError::ChipOutOfRange { chip: id, count })
    }

    fn routed<T, F>(&mut self, channel: u16, op: F) -> Result<T, GroupError<C::Error>>
    where
        F: FnOnce(&mut C, u8) -> Result<T, C::Error>,
    {
        let addr = self.resolve(channel)?;
        op(&mut self.chips[addr.chip], addr.local)
            .map_err(|source| GroupError::Chip { chip: addr.chip, source })
    }

    //visits every chip, then reports the first failure
    fn broadcast<F>(&mut self, name: &str, mut op: F) -> Result<(), GroupError<C::Error>>
    where
        F: FnMut(&mut C) -> Result<(), C::Error>,
    {
        let mut first_err = None;
        for (id, chip) in self.chips.iter_mut().enumerate() {
            if let Err(source) = op(chip) {
                warn!("{} failed on chip {}: {:?}", name, id, source);
                if first_err.is_none() {
                    first_err = Some(GroupError::Chip { chip: id, source });
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
