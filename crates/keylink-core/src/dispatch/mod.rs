//! Reliable command dispatch over a lossy one-way radio.
//!
//! [`Dispatcher`] is the single owner of the retry state. Every interaction goes
//! through [`Dispatcher::handle`] with a [`DispatchMessage`], so the firmware can
//! run it as an actor fed by one inbox: commands from the control loop and
//! delivery reports from the radio never interleave.

use core::fmt::Debug;

use log::{debug, info, warn};

use crate::{
    command::{Command, WIRE_LEN},
    settings::PairingAddress,
};

pub const MAX_RETRY: u8 = 24;

/// Radio link capable of starting a unicast transmission.
///
/// `transmit` only reports whether the send could be initiated; the delivery
/// status arrives later as [`DispatchMessage::Result`]. Links that start the
/// send asynchronously report a late refusal through
/// [`Dispatcher::on_initiation_failed`] instead.
pub trait Transport {
    type Error: Debug;

    fn transmit(&mut self, peer: &PairingAddress, payload: &[u8; WIRE_LEN])
    -> Result<(), Self::Error>;
}

/// Where the control loop hands finished commands (the dispatcher inbox).
pub trait CommandSink {
    type Error: Debug;

    fn submit(&mut self, command: Command) -> Result<(), Self::Error>;
}

/// Messages accepted by the dispatcher actor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchMessage {
    Send(Command),
    Result(bool),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// Payload handed to the transport; a delivery report is expected.
    Transmitted,
    /// The transport refused to start the send. Not retried.
    InitiationFailed,
    Delivered,
    Retried { attempt: u8 },
    /// Retry bound reached; the payload is abandoned.
    Dropped,
    /// Delivery report with nothing ever sent.
    Ignored,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchStats {
    pub delivered: u32,
    pub retried: u32,
    pub dropped: u32,
    pub initiation_failures: u32,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    peer: PairingAddress,
    retry_count: u8,
    last_sent: Option<Command>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub const fn new(peer: PairingAddress) -> Self {
        Self {
            peer,
            retry_count: 0,
            last_sent: None,
            stats: DispatchStats {
                delivered: 0,
                retried: 0,
                dropped: 0,
                initiation_failures: 0,
            },
        }
    }

    pub const fn peer(&self) -> PairingAddress {
        self.peer
    }

    pub const fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub const fn last_sent(&self) -> Option<Command> {
        self.last_sent
    }

    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn handle<T: Transport>(
        &mut self,
        message: DispatchMessage,
        transport: &mut T,
    ) -> DispatchOutcome {
        match message {
            DispatchMessage::Send(command) => self.send(command, transport),
            DispatchMessage::Result(delivered) => self.on_send_result(delivered, transport),
        }
    }

    /// Transmits `command` and remembers it as the payload to retry.
    ///
    /// A command arriving while an earlier one is still being retried replaces
    /// it; the retry counter keeps running.
    pub fn send<T: Transport>(&mut self, command: Command, transport: &mut T) -> DispatchOutcome {
        self.last_sent = Some(command);
        debug!(
            "dispatch: send key={} action={}",
            command.key.raw(),
            command.action.as_str()
        );
        self.transmit(command, transport)
    }

    pub fn on_send_result<T: Transport>(
        &mut self,
        delivered: bool,
        transport: &mut T,
    ) -> DispatchOutcome {
        let Some(command) = self.last_sent else {
            return DispatchOutcome::Ignored;
        };

        if delivered {
            self.retry_count = 0;
            self.stats.delivered = self.stats.delivered.saturating_add(1);
            return DispatchOutcome::Delivered;
        }

        if self.retry_count < MAX_RETRY {
            self.retry_count += 1;
            self.stats.retried = self.stats.retried.saturating_add(1);
            debug!(
                "dispatch: delivery failed; retry {}/{} key={}",
                self.retry_count,
                MAX_RETRY,
                command.key.raw()
            );
            return match self.transmit(command, transport) {
                DispatchOutcome::Transmitted => DispatchOutcome::Retried {
                    attempt: self.retry_count,
                },
                other => other,
            };
        }

        self.retry_count = 0;
        self.stats.dropped = self.stats.dropped.saturating_add(1);
        warn!(
            "dispatch: dropped key={} action={} after {} retries",
            command.key.raw(),
            command.action.as_str(),
            MAX_RETRY
        );
        DispatchOutcome::Dropped
    }

    /// The link accepted a payload but could not put it on air. Like a refused
    /// `transmit`, this is not retried and leaves the retry counter alone.
    pub fn on_initiation_failed(&mut self) -> DispatchOutcome {
        self.stats.initiation_failures = self.stats.initiation_failures.saturating_add(1);
        DispatchOutcome::InitiationFailed
    }

    fn transmit<T: Transport>(&mut self, command: Command, transport: &mut T) -> DispatchOutcome {
        match transport.transmit(&self.peer, &command.to_wire()) {
            Ok(()) => DispatchOutcome::Transmitted,
            Err(err) => {
                info!("dispatch: transmit to {} failed: {:?}", self.peer, err);
                self.on_initiation_failed()
            }
        }
    }
}

#[cfg(test)]
mod tests;
