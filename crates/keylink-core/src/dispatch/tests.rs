use super::*;
use crate::command::{Action, KeyId};

const PEER: PairingAddress = PairingAddress([0x24, 0x6F, 0x28, 0x01, 0x02, 0x03]);

#[derive(Default)]
struct RecordingTransport {
    sent: Vec<(PairingAddress, [u8; WIRE_LEN])>,
    refuse: bool,
}

impl Transport for RecordingTransport {
    type Error = &'static str;

    fn transmit(
        &mut self,
        peer: &PairingAddress,
        payload: &[u8; WIRE_LEN],
    ) -> Result<(), Self::Error> {
        if self.refuse {
            return Err("not ready");
        }
        self.sent.push((*peer, *payload));
        Ok(())
    }
}

#[test]
fn send_transmits_wire_payload_to_peer() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();

    let outcome = dispatcher.handle(
        DispatchMessage::Send(Command::new(KeyId(4), Action::LearnSignal)),
        &mut radio,
    );

    assert_eq!(outcome, DispatchOutcome::Transmitted);
    assert_eq!(radio.sent, vec![(PEER, [4, 1])]);
}

#[test]
fn failures_are_retried_up_to_the_bound_then_dropped() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();
    let _ = dispatcher.send(Command::send(KeyId(9)), &mut radio);

    for attempt in 1..=MAX_RETRY {
        let outcome = dispatcher.handle(DispatchMessage::Result(false), &mut radio);
        assert_eq!(outcome, DispatchOutcome::Retried { attempt });
        assert_eq!(dispatcher.retry_count(), attempt);
    }
    assert_eq!(radio.sent.len(), 1 + MAX_RETRY as usize);
    assert!(radio.sent.iter().all(|(_, payload)| *payload == [9, 0]));

    let outcome = dispatcher.handle(DispatchMessage::Result(false), &mut radio);
    assert_eq!(outcome, DispatchOutcome::Dropped);
    assert_eq!(dispatcher.retry_count(), 0);
    assert_eq!(radio.sent.len(), 1 + MAX_RETRY as usize);
    assert_eq!(dispatcher.stats().dropped, 1);
}

#[test]
fn success_resets_the_retry_counter() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();
    let _ = dispatcher.send(Command::send(KeyId(1)), &mut radio);

    for _ in 0..3 {
        let _ = dispatcher.on_send_result(false, &mut radio);
    }
    assert_eq!(dispatcher.retry_count(), 3);

    assert_eq!(
        dispatcher.on_send_result(true, &mut radio),
        DispatchOutcome::Delivered
    );
    assert_eq!(dispatcher.retry_count(), 0);
    assert_eq!(dispatcher.stats().delivered, 1);
    assert_eq!(dispatcher.stats().retried, 3);
}

#[test]
fn retry_resends_the_most_recent_command() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();

    let _ = dispatcher.send(Command::send(KeyId(1)), &mut radio);
    let _ = dispatcher.send(Command::send(KeyId(2)), &mut radio);
    let _ = dispatcher.on_send_result(false, &mut radio);

    assert_eq!(radio.sent.last().map(|(_, payload)| *payload), Some([2, 0]));
    assert_eq!(dispatcher.last_sent(), Some(Command::send(KeyId(2))));
}

#[test]
fn initiation_failure_is_reported_and_not_retried() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport {
        refuse: true,
        ..Default::default()
    };

    assert_eq!(
        dispatcher.send(Command::send(KeyId(3)), &mut radio),
        DispatchOutcome::InitiationFailed
    );
    assert!(radio.sent.is_empty());
    assert_eq!(dispatcher.stats().initiation_failures, 1);
    assert_eq!(dispatcher.retry_count(), 0);
}

#[test]
fn result_without_a_send_is_ignored() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();

    assert_eq!(
        dispatcher.on_send_result(false, &mut radio),
        DispatchOutcome::Ignored
    );
    assert!(radio.sent.is_empty());
}

#[test]
fn refused_retransmit_keeps_the_incremented_counter() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();
    let _ = dispatcher.send(Command::send(KeyId(5)), &mut radio);
    let _ = dispatcher.on_send_result(false, &mut radio);
    assert_eq!(dispatcher.retry_count(), 1);

    radio.refuse = true;
    assert_eq!(
        dispatcher.on_send_result(false, &mut radio),
        DispatchOutcome::InitiationFailed
    );
    assert_eq!(dispatcher.retry_count(), 2);
    assert_eq!(dispatcher.stats().retried, 2);
    assert_eq!(dispatcher.stats().initiation_failures, 1);
    assert_eq!(radio.sent.len(), 2);

    // The next delivery report still retries the same payload.
    radio.refuse = false;
    assert_eq!(
        dispatcher.on_send_result(false, &mut radio),
        DispatchOutcome::Retried { attempt: 3 }
    );
    assert_eq!(radio.sent.last().map(|(_, payload)| *payload), Some([5, 0]));
}

#[test]
fn late_initiation_failure_is_counted_without_touching_retries() {
    let mut dispatcher = Dispatcher::new(PEER);
    let mut radio = RecordingTransport::default();
    let _ = dispatcher.send(Command::send(KeyId(6)), &mut radio);
    let _ = dispatcher.on_send_result(false, &mut radio);

    assert_eq!(
        dispatcher.on_initiation_failed(),
        DispatchOutcome::InitiationFailed
    );
    assert_eq!(dispatcher.retry_count(), 1);
    assert_eq!(dispatcher.stats().initiation_failures, 1);
    assert_eq!(dispatcher.last_sent(), Some(Command::send(KeyId(6))));
}
