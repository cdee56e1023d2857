//! Application-side facade: position fixes and receiver configuration.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, info};

use crate::{
    command::{AckOutcome, CommandChannel},
    error::LinkError,
    io_loop::{LinkStats, LinkStatsSnapshot},
    nmea::{pubx_rate_command, Fix, Sentence},
    ubx::packets::{CfgMsg, CfgNav5, CfgRst, NmeaStdMessage, UbxPacketCreator},
};

/// One step of the startup configuration and how the receiver answered
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StartupStep {
    pub name: String,
    pub outcome: AckOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StartupReport {
    pub steps: Vec<StartupStep>,
}

impl StartupReport {
    pub fn all_confirmed(&self) -> bool {
        self.steps.iter().all(|step| step.outcome.is_confirmed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &StartupStep> {
        self.steps.iter().filter(|step| !step.outcome.is_confirmed())
    }
}

pub struct GnssReader {
    sentences: Receiver<Sentence>,
    commands: CommandChannel,
    stats: Arc<LinkStats>,
    ack_timeout: Duration,
    latest: Option<Fix>,
}

impl GnssReader {
    pub fn new(
        sentences: Receiver<Sentence>,
        commands: CommandChannel,
        stats: Arc<LinkStats>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            sentences,
            commands,
            stats,
            ack_timeout,
            latest: None,
        }
    }

    /// Drain queued sentences without blocking and return the newest fix.
    ///
    /// Older fixes drained in the same call are superseded. When nothing new
    /// arrived the previously returned fix is returned again. Fails with
    /// [`LinkError::Disconnected`] once the queue is empty and the I/O loop
    /// is gone.
    pub fn latest_fix(&mut self) -> Result<Option<Fix>, LinkError> {
        let mut drained = 0usize;
        loop {
            match self.sentences.try_recv() {
                Ok(Sentence::Gga(fix)) => {
                    drained += 1;
                    self.latest = Some(fix);
                },
                Ok(other) => {
                    drained += 1;
                    debug!(
                        "Unhandled sentence {}{}",
                        other.talker(),
                        other.kind().formatter()
                    );
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) if drained == 0 => {
                    return Err(LinkError::Disconnected)
                },
                Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(self.latest.clone())
    }

    /// Disable every standard sentence except GGA, then switch the receiver
    /// to the airborne dynamic model.
    ///
    /// Every step is attempted once regardless of earlier failures, the
    /// report tells which ones were not acknowledged.
    pub fn run_startup_configuration(&mut self) -> Result<StartupReport, LinkError> {
        let mut report = StartupReport::default();
        for message in NmeaStdMessage::NON_FIX {
            let outcome = self
                .commands
                .send_packet(&CfgMsg::disable_nmea(message), self.ack_timeout)?;
            report.steps.push(StartupStep {
                name: format!("disable {}", message.name()),
                outcome,
            });
        }
        let outcome = self
            .commands
            .send_packet(&CfgNav5::flight_mode(), self.ack_timeout)?;
        report.steps.push(StartupStep {
            name: "flight mode".to_string(),
            outcome,
        });
        if report.all_confirmed() {
            info!("Startup configuration complete");
        }
        Ok(report)
    }

    /// Hardware reset of the receiver, including battery backed memory
    pub fn reboot(&mut self) -> Result<bool, LinkError> {
        let reset = CfgRst::hardware_reset();
        Ok(self
            .commands
            .send_packet(&reset, self.ack_timeout)?
            .is_confirmed())
    }

    /// Set the rate of every non-fix sentence with `$PUBX,40` commands.
    ///
    /// NMEA commands are not acknowledged, this only queues them.
    pub fn set_non_fix_rates(&self, rate: u8) -> Result<(), LinkError> {
        for message in NmeaStdMessage::NON_FIX {
            self.send_raw(pubx_rate_command(message, rate).into_bytes())?;
        }
        Ok(())
    }

    /// Queue arbitrary bytes for the receiver
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<(), LinkError> {
        self.commands.send_raw(bytes)
    }

    pub fn send_packet<P: UbxPacketCreator>(
        &mut self,
        packet: &P,
    ) -> Result<AckOutcome, LinkError> {
        self.commands.send_packet(packet, self.ack_timeout)
    }

    pub fn commands(&mut self) -> &mut CommandChannel {
        &mut self.commands
    }

    pub fn stats(&self) -> LinkStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }
}
