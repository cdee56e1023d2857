//! The only owner of the transport.
//!
//! Each iteration first writes every queued command, then attempts a single
//! frame read and routes the decoded result to the sentence or frame queue.
//! Undecodable data is dropped and counted, a full read queue stops the loop.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, error, info, trace};

use crate::{
    constants::NMEA_SYNC_CHAR,
    error::{DecodeError, LinkError},
    framing::{read_frame, RawFrame},
    nmea::Sentence,
    queue::ReadQueueSender,
    transport::Transport,
    ubx::UbxFrame,
};

/// Counters updated by the I/O loop, readable from any thread
#[derive(Debug, Default)]
pub struct LinkStats {
    sentences: AtomicU64,
    frames: AtomicU64,
    discarded: AtomicU64,
    timeouts: AtomicU64,
    bytes_written: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    /// NMEA sentences delivered to the sentence queue
    pub sentences: u64,
    /// UBX frames delivered to the frame queue
    pub frames: u64,
    /// Lines or frames dropped because they failed to decode
    pub discarded: u64,
    /// Reads abandoned because the transport timed out mid-frame
    pub timeouts: u64,
    pub bytes_written: u64,
}

impl LinkStats {
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            sentences: self.sentences.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Result of a single read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Nothing was waiting on the transport
    Idle,
    Sentence,
    Frame,
    Discarded,
    TimedOut,
}

pub struct IoLoop<T> {
    transport: T,
    sentences: ReadQueueSender<Sentence>,
    frames: ReadQueueSender<UbxFrame>,
    writes: Receiver<Vec<u8>>,
    stats: Arc<LinkStats>,
    frame_timeout: Duration,
    idle_sleep: Duration,
}

impl<T: Transport> IoLoop<T> {
    pub fn new(
        transport: T,
        sentences: ReadQueueSender<Sentence>,
        frames: ReadQueueSender<UbxFrame>,
        writes: Receiver<Vec<u8>>,
        stats: Arc<LinkStats>,
    ) -> Self {
        Self {
            transport,
            sentences,
            frames,
            writes,
            stats,
            frame_timeout: Duration::from_secs(10),
            idle_sleep: Duration::from_millis(100),
        }
    }

    pub fn with_timing(mut self, frame_timeout: Duration, idle_sleep: Duration) -> Self {
        self.frame_timeout = frame_timeout;
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    /// Run until `cancel` is set or a fatal error occurs.
    ///
    /// Consumes the loop so the queue senders drop on exit, which is how
    /// consumers observe that the loop is gone.
    pub fn run(mut self, cancel: &AtomicBool) -> Result<LinkStatsSnapshot, LinkError> {
        info!(
            "I/O loop started, {} queue holds {}, {} queue holds {}",
            self.sentences.kind(),
            self.sentences.capacity(),
            self.frames.kind(),
            self.frames.capacity()
        );
        while !cancel.load(Ordering::Relaxed) {
            if let Err(e) = self.iterate() {
                error!("I/O loop stopped: {}", e);
                return Err(e);
            }
        }
        let stats = self.stats.snapshot();
        info!(
            sentences = stats.sentences,
            frames = stats.frames,
            discarded = stats.discarded,
            "I/O loop stopped"
        );
        Ok(stats)
    }

    /// One iteration: drain writes, read once, back off when idle
    pub fn iterate(&mut self) -> Result<ReadOutcome, LinkError> {
        self.drain_writes()?;
        let outcome = self.read_once()?;
        if outcome == ReadOutcome::Idle && !self.idle_sleep.is_zero() {
            thread::sleep(self.idle_sleep);
        }
        Ok(outcome)
    }

    /// Write every queued chunk in FIFO order, returns the number written
    pub fn drain_writes(&mut self) -> Result<usize, LinkError> {
        let mut count = 0;
        loop {
            let data = match self.writes.try_recv() {
                Ok(data) => data,
                // a disconnected write queue only means no more commands
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(count),
            };
            debug!("Write {} bytes: {:02x?}", data.len(), data);
            self.transport.write_all(&data)?;
            LinkStats::bump(&self.stats.bytes_written, data.len() as u64);
            count += 1;
        }
    }

    /// Attempt to read and route one frame
    pub fn read_once(&mut self) -> Result<ReadOutcome, LinkError> {
        let raw = match read_frame(&mut self.transport, self.frame_timeout) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(ReadOutcome::Idle),
            Err(e) if e.is_timeout() => {
                debug!("Read abandoned: {}", e);
                LinkStats::bump(&self.stats.timeouts, 1);
                return Ok(ReadOutcome::TimedOut);
            },
            Err(e) => return Err(e.into()),
        };
        match self.route(raw) {
            Ok(outcome) => Ok(outcome),
            Err(Routed::Decode(e)) => {
                debug!("Discarded: {}", e);
                LinkStats::bump(&self.stats.discarded, 1);
                Ok(ReadOutcome::Discarded)
            },
            Err(Routed::Fatal(e)) => Err(e),
        }
    }

    fn route(&mut self, raw: RawFrame) -> Result<ReadOutcome, Routed> {
        match raw {
            RawFrame::Ubx(bytes) => {
                let frame = UbxFrame::parse(&bytes).map_err(DecodeError::from)?;
                debug!(
                    "UBX frame class {:#04x} id {:#04x}, {} payload bytes",
                    frame.class(),
                    frame.msg_id(),
                    frame.payload().len()
                );
                self.frames.push(frame)?;
                LinkStats::bump(&self.stats.frames, 1);
                Ok(ReadOutcome::Frame)
            },
            RawFrame::Line(line) => {
                if line.first() != Some(&NMEA_SYNC_CHAR) {
                    trace!("Non-sentence line: {:02x?}", line);
                    return Err(DecodeError::NonSentenceLine.into());
                }
                let sentence = Sentence::decode(&line).map_err(DecodeError::from)?;
                debug!(
                    "NMEA {}{}",
                    sentence.talker(),
                    sentence.kind().formatter()
                );
                self.sentences.push(sentence)?;
                LinkStats::bump(&self.stats.sentences, 1);
                Ok(ReadOutcome::Sentence)
            },
        }
    }
}

enum Routed {
    Decode(DecodeError),
    Fatal(LinkError),
}

impl From<DecodeError> for Routed {
    fn from(e: DecodeError) -> Self {
        Routed::Decode(e)
    }
}

impl From<LinkError> for Routed {
    fn from(e: LinkError) -> Self {
        Routed::Fatal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::QueueKind,
        queue::{read_queue, write_queue},
        transport::{MemoryHandle, MemoryTransport},
        ubx::assemble,
    };
    use crossbeam_channel::Sender;

    const GGA: &[u8] =
        b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B\r\n";
    const ACK: [u8; 10] = [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x01, 0x0f, 0x38];

    struct Fixture {
        io: IoLoop<MemoryTransport>,
        handle: MemoryHandle,
        sentences: Receiver<Sentence>,
        frames: Receiver<UbxFrame>,
        writes: Sender<Vec<u8>>,
    }

    fn fixture(capacity: usize) -> Fixture {
        let (transport, handle) = MemoryTransport::new();
        let (sentence_tx, sentences) = read_queue(QueueKind::Sentence, capacity);
        let (frame_tx, frames) = read_queue(QueueKind::Frame, capacity);
        let (writes, write_rx) = write_queue();
        let io = IoLoop::new(
            transport,
            sentence_tx,
            frame_tx,
            write_rx,
            Arc::new(LinkStats::default()),
        )
        .with_timing(Duration::from_secs(10), Duration::ZERO);
        Fixture {
            io,
            handle,
            sentences,
            frames,
            writes,
        }
    }

    #[test]
    fn routes_sentences_and_frames() {
        let mut f = fixture(10);
        f.handle.push_incoming(GGA);
        f.handle.push_incoming(&ACK);
        assert_eq!(f.io.iterate().unwrap(), ReadOutcome::Sentence);
        assert_eq!(f.io.iterate().unwrap(), ReadOutcome::Frame);
        assert_eq!(f.io.iterate().unwrap(), ReadOutcome::Idle);

        let sentence = f.sentences.try_recv().unwrap();
        assert_eq!(sentence.fix().unwrap().satellites, 8);
        let frame = f.frames.try_recv().unwrap();
        assert_eq!((frame.class(), frame.msg_id()), (0x05, 0x01));

        let stats = f.io.stats().snapshot();
        assert_eq!(stats.sentences, 1);
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.discarded, 0);
    }

    #[test]
    fn corrupt_data_is_discarded() {
        let mut f = fixture(10);
        let mut bad_ack = ACK;
        bad_ack[9] ^= 0xff;
        f.handle.push_incoming(&bad_ack);
        f.handle.push_incoming(b"hello\r\n");
        f.handle.push_incoming(b"$GPGGA,bad*00\r\n");
        f.handle.push_incoming(GGA);
        for _ in 0..3 {
            assert_eq!(f.io.iterate().unwrap(), ReadOutcome::Discarded);
        }
        assert_eq!(f.io.iterate().unwrap(), ReadOutcome::Sentence);
        assert!(f.frames.is_empty());
        assert_eq!(f.sentences.len(), 1);
        assert_eq!(f.io.stats().snapshot().discarded, 3);
    }

    #[test]
    fn partial_frame_times_out() {
        let mut f = fixture(10);
        f.handle.push_incoming(&ACK[..5]);
        assert_eq!(f.io.iterate().unwrap(), ReadOutcome::TimedOut);
        assert_eq!(f.io.stats().snapshot().timeouts, 1);
        assert_eq!(f.io.iterate().unwrap(), ReadOutcome::Idle);
    }

    #[test]
    fn writes_go_out_before_reading() {
        let mut f = fixture(10);
        let command = assemble(0x06, 0x24, &[0; 36]).unwrap();
        f.writes.send(command.clone()).unwrap();
        f.writes.send(vec![1, 2, 3]).unwrap();
        assert_eq!(f.io.drain_writes().unwrap(), 2);
        assert_eq!(f.handle.written(), vec![command.clone(), vec![1, 2, 3]]);
        assert_eq!(
            f.io.stats().snapshot().bytes_written,
            command.len() as u64 + 3
        );
    }

    #[test]
    fn full_queue_is_fatal() {
        let mut f = fixture(2);
        for _ in 0..3 {
            f.handle.push_incoming(GGA);
        }
        f.io.iterate().unwrap();
        f.io.iterate().unwrap();
        match f.io.iterate() {
            Err(LinkError::QueueOverflow { queue, capacity }) => {
                assert_eq!(queue, QueueKind::Sentence);
                assert_eq!(capacity, 2);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn write_failure_is_fatal() {
        let mut f = fixture(2);
        f.handle.fail_writes(std::io::ErrorKind::BrokenPipe);
        f.writes.send(vec![1]).unwrap();
        assert!(matches!(f.io.iterate(), Err(LinkError::Io(_))));
    }

    #[test]
    fn run_stops_on_cancel() {
        let f = fixture(2);
        let cancel = AtomicBool::new(true);
        assert_eq!(f.io.run(&cancel).unwrap(), LinkStatsSnapshot::default());
        assert!(matches!(
            f.sentences.try_recv(),
            Err(TryRecvError::Disconnected)
        ));
    }
}
