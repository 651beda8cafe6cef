//! ESP-NOW transport and the dispatcher actor.
//!
//! The control loop only ever pushes commands into [`DispatchChannel`]. One
//! future ([`run_dispatcher`]) owns the [`Dispatcher`] and the link, and is the
//! only place that touches retry state.

use core::convert::Infallible;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use esp_radio::esp_now::{EspNow, EspNowError, EspNowWifiInterface, PeerInfo};
use log::{debug, info};

use keylink_core::{
    command::{Command, WIRE_LEN},
    dispatch::{CommandSink, DispatchMessage, DispatchOutcome, Dispatcher, Transport},
    settings::PairingAddress,
};

pub const INBOX_DEPTH: usize = 4;

pub type DispatchChannel = Channel<CriticalSectionRawMutex, Command, INBOX_DEPTH>;

#[derive(Debug)]
pub enum LinkError {
    PeerRegistration(EspNowError),
}

/// What became of the payload staged on the link.
#[derive(Debug)]
pub enum LinkStatus {
    /// The MAC layer reported the delivery status.
    Delivered(bool),
    /// The radio refused to start the send.
    NotStarted(EspNowError),
}

/// Unicast ESP-NOW link to the paired receiver.
///
/// `transmit` only stages the payload. [`EspNowLink::complete`] puts it on air
/// and yields to the executor until the send callback fires.
pub struct EspNowLink<'d> {
    esp_now: EspNow<'d>,
    staged: Option<(PairingAddress, [u8; WIRE_LEN])>,
}

impl<'d> EspNowLink<'d> {
    pub fn new(mut esp_now: EspNow<'d>, peer: PairingAddress) -> Result<Self, LinkError> {
        if !peer.is_unset() && !esp_now.peer_exists(&peer.octets()) {
            esp_now
                .add_peer(PeerInfo {
                    interface: EspNowWifiInterface::Sta,
                    peer_address: peer.octets(),
                    lmk: None,
                    channel: None,
                    encrypt: false,
                })
                .map_err(LinkError::PeerRegistration)?;
            info!("radio: peer {} registered", peer);
        }

        Ok(Self {
            esp_now,
            staged: None,
        })
    }

    /// Sends the staged payload, if any, and waits for its delivery status.
    pub async fn complete(&mut self) -> Option<LinkStatus> {
        let (peer, payload) = self.staged.take()?;
        let address = peer.octets();

        Some(match self.esp_now.send_async(&address, &payload).await {
            Ok(()) => LinkStatus::Delivered(true),
            Err(EspNowError::SendFailed) => LinkStatus::Delivered(false),
            Err(err) => LinkStatus::NotStarted(err),
        })
    }
}

impl Transport for EspNowLink<'_> {
    type Error = Infallible;

    /// A payload staged while another is waiting replaces it.
    fn transmit(
        &mut self,
        peer: &PairingAddress,
        payload: &[u8; WIRE_LEN],
    ) -> Result<(), Self::Error> {
        self.staged = Some((*peer, *payload));
        Ok(())
    }
}

/// Control-loop side of the dispatcher inbox.
#[derive(Clone, Copy)]
pub struct DispatchInbox {
    channel: &'static DispatchChannel,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct InboxFull;

impl DispatchInbox {
    pub const fn new(channel: &'static DispatchChannel) -> Self {
        Self { channel }
    }
}

impl CommandSink for DispatchInbox {
    type Error = InboxFull;

    fn submit(&mut self, command: Command) -> Result<(), Self::Error> {
        self.channel.try_send(command).map_err(|_| InboxFull)
    }
}

/// Dispatcher actor: handles one message at a time, forever.
///
/// While a send is on air the actor awaits its status, which lets the control
/// loop keep running. Commands queued meanwhile are handled right after the
/// status, so the newest one takes over the retry slot.
pub async fn run_dispatcher(
    mut dispatcher: Dispatcher,
    mut link: EspNowLink<'_>,
    inbox: &'static DispatchChannel,
) -> ! {
    info!("radio: dispatcher ready peer={}", dispatcher.peer());

    loop {
        let command = inbox.receive().await;
        let outcome = dispatcher.handle(DispatchMessage::Send(command), &mut link);
        report(&dispatcher, outcome);

        while let Some(status) = link.complete().await {
            let outcome = match status {
                LinkStatus::Delivered(delivered) => {
                    dispatcher.handle(DispatchMessage::Result(delivered), &mut link)
                }
                LinkStatus::NotStarted(err) => {
                    info!("radio: send to {} not started: {:?}", dispatcher.peer(), err);
                    dispatcher.on_initiation_failed()
                }
            };
            report(&dispatcher, outcome);

            while let Ok(command) = inbox.try_receive() {
                let outcome = dispatcher.handle(DispatchMessage::Send(command), &mut link);
                report(&dispatcher, outcome);
            }
        }
    }
}

fn report(dispatcher: &Dispatcher, outcome: DispatchOutcome) {
    match outcome {
        DispatchOutcome::Dropped => {
            let stats = dispatcher.stats();
            info!(
                "radio: delivered={} retried={} dropped={} init_failures={}",
                stats.delivered, stats.retried, stats.dropped, stats.initiation_failures
            );
        }
        other => debug!("radio: {:?}", other),
    }
}
