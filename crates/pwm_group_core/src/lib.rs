//!Core library for driving several identical PWM chips as one device.
//!
//! `PwmChip` describes what a single chip can do. `ChannelRouter` owns a fixed set of chips,
//! numbers their channels contiguously and either routes an operation to the chip owning a
//! channel or broadcasts it to every chip.

use tokio::sync::mpsc;

pub mod chip;
pub mod error;
pub mod router;

pub use chip::{OutputDriver, PwmChip, PwmEdge};
pub use error::{GroupBuildError, GroupError};
pub use router::{ChannelAddress, ChannelRouter};

///Sending half of a named value stream. Whatever task owns the receiver applies the values.
pub struct Output<T> {
    pub tx: mpsc::Sender<T>,
}

impl<T> Output<T> {
    pub fn new() -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }
    pub fn sink(&self) -> mpsc::Sender<T> {
        self.tx.clone()
    }
}
