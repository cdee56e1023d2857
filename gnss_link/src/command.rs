//! Synchronous command/acknowledgement handshake over the asynchronous link.
//!
//! A command is assembled into a UBX frame and handed to the I/O loop through
//! the write queue. The binary frame queue is then polled until the receiver
//! acknowledges, rejects or the timeout expires. Only one command can be
//! outstanding: [`CommandChannel`] methods take `&mut self`, and a command is
//! refused while frames from an earlier exchange are still queued.

use std::{
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    error::LinkError,
    ubx::{
        assemble,
        packets::{AckAck, AckNak, UbxPacketCreator},
        UbxFrame,
    },
};

/// How a command exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AckOutcome {
    Acknowledged,
    Rejected,
    TimedOut,
}

impl AckOutcome {
    pub fn is_confirmed(self) -> bool {
        self == AckOutcome::Acknowledged
    }
}

/// The command currently awaiting its acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub class: u8,
    pub msg_id: u8,
}

impl PendingCommand {
    pub fn new(class: u8, msg_id: u8) -> Self {
        Self { class, msg_id }
    }

    /// Classify `frame` as the answer to this command, `None` if unrelated
    pub fn answer(&self, frame: &UbxFrame) -> Option<AckOutcome> {
        if let Some(ack) = AckAck::from_frame(frame) {
            return (ack.class == self.class && ack.msg_id == self.msg_id)
                .then_some(AckOutcome::Acknowledged);
        }
        if let Some(nak) = AckNak::from_frame(frame) {
            return (nak.class == self.class && nak.msg_id == self.msg_id)
                .then_some(AckOutcome::Rejected);
        }
        None
    }
}

pub struct CommandChannel {
    frames: Receiver<UbxFrame>,
    writes: Sender<Vec<u8>>,
    poll_interval: Duration,
}

impl CommandChannel {
    pub fn new(
        frames: Receiver<UbxFrame>,
        writes: Sender<Vec<u8>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            frames,
            writes,
            poll_interval,
        }
    }

    /// Send a command and wait for its acknowledgement.
    ///
    /// `Ok(false)` covers both a rejection and a timeout. Errors are fatal:
    /// frames left over from an earlier exchange, an oversized payload or a
    /// stopped I/O loop.
    pub fn send_and_confirm(
        &mut self,
        class: u8,
        msg_id: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<bool, LinkError> {
        Ok(self.exchange(class, msg_id, payload, timeout)?.is_confirmed())
    }

    /// Like [`send_and_confirm`](Self::send_and_confirm), for typed packets
    pub fn send_packet<P: UbxPacketCreator>(
        &mut self,
        packet: &P,
        timeout: Duration,
    ) -> Result<AckOutcome, LinkError> {
        self.exchange(P::CLASS, P::ID, &packet.payload_bytes(), timeout)
    }

    /// Send bytes that expect no acknowledgement, such as NMEA commands
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<(), LinkError> {
        self.writes.send(bytes).map_err(|_| LinkError::Disconnected)
    }

    pub fn exchange(
        &mut self,
        class: u8,
        msg_id: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<AckOutcome, LinkError> {
        let pending = self.frames.len();
        if pending > 0 {
            return Err(LinkError::CommandOutstanding { pending });
        }
        let bytes = assemble(class, msg_id, payload)?;
        debug!("Sending command class {:#04x} id {:#04x}", class, msg_id);
        self.send_raw(bytes)?;

        let outcome = self.await_answer(PendingCommand::new(class, msg_id), timeout)?;
        match outcome {
            AckOutcome::Acknowledged => {
                info!("Command {:#04x}/{:#04x} acknowledged", class, msg_id)
            },
            AckOutcome::Rejected => {
                warn!("Command {:#04x}/{:#04x} rejected", class, msg_id)
            },
            AckOutcome::TimedOut => warn!(
                "No acknowledgement for command {:#04x}/{:#04x} within {:?}",
                class, msg_id, timeout
            ),
        }
        Ok(outcome)
    }

    fn await_answer(
        &self,
        command: PendingCommand,
        timeout: Duration,
    ) -> Result<AckOutcome, LinkError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => match command.answer(&frame) {
                    Some(outcome) => return Ok(outcome),
                    None => warn!(
                        "Unrelated frame class {:#04x} id {:#04x} while awaiting acknowledgement",
                        frame.class(),
                        frame.msg_id()
                    ),
                },
                Err(TryRecvError::Empty) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(AckOutcome::TimedOut);
                    }
                    thread::sleep(self.poll_interval.min(deadline - now));
                },
                Err(TryRecvError::Disconnected) => return Err(LinkError::Disconnected),
            }
        }
    }
}
