//! End-to-end tests: a simulated receiver behind a `MemoryTransport`, the I/O
//! loop on its own thread and the application side polling a `GnssReader`.

use std::{
    thread,
    time::{Duration, Instant},
};

use gnss_link::{
    AckAck, AckNak, AckOutcome, CfgMsg, CfgNav5, GnssLink, GnssReader, LinkConfig, LinkError,
    MemoryTransport, NmeaStdMessage, QueueKind, UbxFrame, UbxPacketCreator,
};

const GGA_NO_FIX: &[u8] = b"$GNGGA,003156.00,,,,,0,00,99.99,,,,,,*79\r\n";
const GGA_FIX: &[u8] =
    b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B\r\n";
const GSV: &[u8] = b"$GPGSV,1,1,01,05,40,083,46*40\r\n";

fn fast_config() -> LinkConfig {
    LinkConfig::default()
        .with_idle_sleep(Duration::from_millis(1))
        .with_ack_poll_interval(Duration::from_millis(1))
        .with_ack_timeout(Duration::from_secs(5))
}

/// Replies to every UBX command with an acknowledgement
fn acknowledging_device(written: &[u8]) -> Option<Vec<u8>> {
    let frame = UbxFrame::parse(written).ok()?;
    Some(
        AckAck {
            class: frame.class(),
            msg_id: frame.msg_id(),
        }
        .into_packet_bytes(),
    )
}

fn rejecting_device(written: &[u8]) -> Option<Vec<u8>> {
    let frame = UbxFrame::parse(written).ok()?;
    Some(
        AckNak {
            class: frame.class(),
            msg_id: frame.msg_id(),
        }
        .into_packet_bytes(),
    )
}

/// Poll until a fix shows up or the deadline passes
fn wait_for_fix(reader: &mut GnssReader) -> Option<gnss_link::Fix> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(fix) = reader.latest_fix().unwrap() {
            return Some(fix);
        }
        thread::sleep(Duration::from_millis(2));
    }
    None
}

#[test]
fn startup_configuration_is_acknowledged() {
    let (transport, device) = MemoryTransport::with_responder(acknowledging_device);
    let (mut reader, io) = GnssLink::spawn(transport, &fast_config()).unwrap();

    let report = reader.run_startup_configuration().unwrap();
    assert!(report.all_confirmed());
    let names: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "disable GLL",
            "disable GSA",
            "disable GSV",
            "disable RMC",
            "disable VTG",
            "flight mode"
        ]
    );

    let mut expected: Vec<Vec<u8>> = NmeaStdMessage::NON_FIX
        .iter()
        .map(|m| CfgMsg::disable_nmea(*m).into_packet_bytes())
        .collect();
    expected.push(CfgNav5::flight_mode().into_packet_bytes());
    assert_eq!(device.written(), expected);

    let stats = io.shutdown().unwrap();
    assert_eq!(stats.frames, 6);
    assert_eq!(
        stats.bytes_written,
        expected.iter().map(|f| f.len() as u64).sum::<u64>()
    );
}

#[test]
fn rejected_steps_are_reported() {
    let (transport, _device) = MemoryTransport::with_responder(rejecting_device);
    let (mut reader, io) = GnssLink::spawn(transport, &fast_config()).unwrap();

    let report = reader.run_startup_configuration().unwrap();
    assert_eq!(report.steps.len(), 6);
    assert!(report
        .steps
        .iter()
        .all(|step| step.outcome == AckOutcome::Rejected));
    assert!(!reader
        .commands()
        .send_and_confirm(0x06, 0x24, &[0; 36], Duration::from_secs(5))
        .unwrap());
    io.shutdown().unwrap();
}

#[test]
fn silent_device_times_out() {
    let (transport, device) = MemoryTransport::new();
    let config = fast_config().with_ack_timeout(Duration::from_millis(30));
    let (mut reader, io) = GnssLink::spawn(transport, &config).unwrap();

    let start = Instant::now();
    assert!(!reader.reboot().unwrap());
    assert!(start.elapsed() >= Duration::from_millis(30));
    io.shutdown().unwrap();
    assert_eq!(device.written().len(), 1);
}

#[test]
fn fixes_are_read_between_commands() {
    let (transport, device) = MemoryTransport::with_responder(|written: &[u8]| {
        // the receiver keeps talking while it answers
        let mut reply = GSV.to_vec();
        reply.extend(acknowledging_device(written)?);
        reply.extend_from_slice(GGA_FIX);
        Some(reply)
    });
    device.push_incoming(GGA_NO_FIX);
    let (mut reader, io) = GnssLink::spawn(transport, &fast_config()).unwrap();

    let first = wait_for_fix(&mut reader).unwrap();
    assert!(!first.is_valid());
    assert_eq!(first.latitude, None);

    assert!(reader
        .commands()
        .send_and_confirm(0x06, 0x24, &[0; 36], Duration::from_secs(5))
        .unwrap());

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut fix = first;
    while !fix.is_valid() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
        fix = reader.latest_fix().unwrap().unwrap();
    }
    assert!(fix.is_valid());
    assert_eq!(fix.satellites, 8);

    let stats = io.shutdown().unwrap();
    assert_eq!(stats.sentences, 3);
    assert_eq!(stats.frames, 1);
}

#[test]
fn garbage_does_not_stall_the_link() {
    let (transport, device) = MemoryTransport::new();
    device.push_incoming(b"\xff\xfe garbage\r\n");
    device.push_incoming(b"$GPGGA,broken*00\r\n");
    device.push_incoming(&[0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x01, 0x00, 0x00]);
    device.push_incoming(GGA_FIX);
    let (mut reader, io) = GnssLink::spawn(transport, &fast_config()).unwrap();

    let fix = wait_for_fix(&mut reader).unwrap();
    assert!(fix.is_valid());
    let stats = io.shutdown().unwrap();
    assert_eq!(stats.discarded, 3);
    assert_eq!(stats.frames, 0);
}

#[test]
fn stalled_consumer_stops_the_loop() {
    let (transport, device) = MemoryTransport::new();
    for _ in 0..3 {
        device.push_incoming(GGA_FIX);
    }
    let config = fast_config().with_queue_capacity(2);
    let (mut reader, io) = GnssLink::spawn(transport, &config).unwrap();

    match io.join() {
        Err(LinkError::QueueOverflow { queue, capacity }) => {
            assert_eq!(queue, QueueKind::Sentence);
            assert_eq!(capacity, 2);
        },
        other => panic!("unexpected {:?}", other),
    }
    // what was queued before the failure is still delivered
    assert!(reader.latest_fix().unwrap().is_some());
    assert!(matches!(reader.latest_fix(), Err(LinkError::Disconnected)));
    assert!(matches!(
        reader.run_startup_configuration(),
        Err(LinkError::Disconnected)
    ));
}

#[test]
fn pubx_commands_are_written_verbatim() {
    let (transport, device) = MemoryTransport::new();
    let (reader, io) = GnssLink::spawn(transport, &fast_config()).unwrap();

    reader.set_non_fix_rates(0).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while device.written().len() < 5 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    io.shutdown().unwrap();

    let written = device.written();
    assert_eq!(written.len(), 5);
    assert_eq!(written[2], b"$PUBX,40,GSV,0,0,0,0*59\r\n".to_vec());
}
