use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{error, info};

use crate::{
    command::CommandChannel,
    config::LinkConfig,
    error::{LinkError, QueueKind},
    io_loop::{IoLoop, LinkStats, LinkStatsSnapshot},
    queue::{read_queue, write_queue},
    reader::GnssReader,
    transport::Transport,
};

/// Wires a transport, the queues and the I/O loop to a [`GnssReader`]
pub struct GnssLink;

impl GnssLink {
    /// Build both halves without starting a thread.
    ///
    /// The caller drives the returned [`IoLoop`], which is what tests and
    /// single threaded simulations do.
    pub fn build<T: Transport>(
        mut transport: T,
        config: &LinkConfig,
    ) -> Result<(IoLoop<T>, GnssReader), LinkError> {
        // a zero sized crossbeam channel never accepts a `try_send`
        for (queue, capacity) in [
            (QueueKind::Sentence, config.sentence_queue_capacity),
            (QueueKind::Frame, config.frame_queue_capacity),
        ] {
            if capacity == 0 {
                return Err(LinkError::ZeroCapacity { queue });
            }
        }
        transport.set_timeout(config.read_timeout)?;
        let (sentence_tx, sentence_rx) =
            read_queue(QueueKind::Sentence, config.sentence_queue_capacity);
        let (frame_tx, frame_rx) = read_queue(QueueKind::Frame, config.frame_queue_capacity);
        let (write_tx, write_rx) = write_queue();
        let stats = Arc::new(LinkStats::default());

        let io_loop = IoLoop::new(transport, sentence_tx, frame_tx, write_rx, stats.clone())
            .with_timing(config.frame_timeout, config.idle_sleep);
        let commands = CommandChannel::new(frame_rx, write_tx, config.ack_poll_interval);
        let reader = GnssReader::new(sentence_rx, commands, stats, config.ack_timeout);
        Ok((io_loop, reader))
    }

    /// Start the I/O loop on its own thread
    pub fn spawn<T>(
        transport: T,
        config: &LinkConfig,
    ) -> Result<(GnssReader, IoHandle), LinkError>
    where
        T: Transport + 'static,
    {
        let (io_loop, reader) = Self::build(transport, config)?;
        let stats = io_loop.stats();
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();
        let thread = thread::Builder::new()
            .name("gnss-io".to_string())
            .spawn(move || io_loop.run(&thread_cancel))?;
        info!("GNSS link started");
        Ok((
            reader,
            IoHandle {
                cancel,
                stats,
                thread: Some(thread),
            },
        ))
    }
}

/// Controls a running I/O loop. Dropping the handle stops the loop.
pub struct IoHandle {
    cancel: Arc<AtomicBool>,
    stats: Arc<LinkStats>,
    thread: Option<JoinHandle<Result<LinkStatsSnapshot, LinkError>>>,
}

impl IoHandle {
    /// Request the loop to stop after its current iteration
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Shared flag that stops the loop when set, e.g. from a signal handler
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn stats(&self) -> LinkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for the loop to end and return its result
    pub fn join(mut self) -> Result<LinkStatsSnapshot, LinkError> {
        self.join_thread()
    }

    /// Cancel, then join
    pub fn shutdown(self) -> Result<LinkStatsSnapshot, LinkError> {
        self.cancel();
        self.join()
    }

    fn join_thread(&mut self) -> Result<LinkStatsSnapshot, LinkError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| {
                LinkError::Io(io::Error::new(io::ErrorKind::Other, "I/O thread panicked"))
            })?,
            None => Ok(self.stats.snapshot()),
        }
    }
}

impl Drop for IoHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel();
            if let Err(e) = self.join_thread() {
                error!("I/O loop ended with error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    #[test]
    fn build_applies_config() {
        let (transport, handle) = MemoryTransport::new();
        let config = LinkConfig::default()
            .with_read_timeout(Duration::from_millis(25))
            .with_ack_timeout(Duration::from_millis(300));
        let (_io_loop, reader) = GnssLink::build(transport, &config).unwrap();
        assert_eq!(handle.timeout(), Duration::from_millis(25));
        assert_eq!(reader.ack_timeout(), Duration::from_millis(300));
    }

    #[test]
    fn zero_capacity_is_refused() {
        let (transport, handle) = MemoryTransport::new();
        let config = LinkConfig::default().with_queue_capacity(0);
        match GnssLink::spawn(transport, &config) {
            Err(LinkError::ZeroCapacity { queue }) => assert_eq!(queue, QueueKind::Sentence),
            Err(e) => panic!("unexpected {}", e),
            Ok(_) => panic!("zero capacity accepted"),
        }
        assert!(handle.timeout_history().is_empty());

        let (transport, _handle) = MemoryTransport::new();
        let config = LinkConfig {
            frame_queue_capacity: 0,
            ..LinkConfig::default()
        };
        assert!(matches!(
            GnssLink::build(transport, &config),
            Err(LinkError::ZeroCapacity {
                queue: QueueKind::Frame
            })
        ));
    }

    #[test]
    fn shutdown_stops_thread() {
        let (transport, handle) = MemoryTransport::new();
        handle.push_incoming(b"$GPTXT,01,01,02,u-blox ag - www.u-blox.com*50\r\n");
        let config = LinkConfig::default().with_idle_sleep(Duration::from_millis(1));
        let (mut reader, io) = GnssLink::spawn(transport, &config).unwrap();
        assert!(!io.is_finished());
        let cancel = io.cancel_flag();
        assert!(!cancel.load(Ordering::Relaxed));
        let stats = io.shutdown().unwrap();
        assert!(cancel.load(Ordering::Relaxed));
        assert!(stats.sentences <= 1);
        // queue senders are gone with the loop
        let _ = reader.latest_fix();
        assert!(matches!(reader.latest_fix(), Err(LinkError::Disconnected)));
    }
}
