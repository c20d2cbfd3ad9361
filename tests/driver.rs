use std::collections::VecDeque;
use std::io;
use ubetterbms_lib::parser::ParserState;
use ubetterbms_lib::protocol::{ResponseFrame, REQUEST_LENGTH, STATUS_ERROR};
use ubetterbms_lib::scheduler::SchedulerState;
use ubetterbms_lib::{Snapshot, Transport, UbetterBms};

const INFO: [u8; 25] = [
    0x14, 0x82, // 52.50 V
    0xff, 0x9c, // -1.00 A
    0x0f, 0xa0, // 40000 mAh
    0x13, 0x88, // 50000 mAh
    0x00, 0x03, // cycles
    0x2c, 0x6f, // 2022-03-15
    0x00, 0x00, 0x00, 0x00, // balancing
    0x00, 0x00, // protection
    0x10, // 1.6
    0x50, // 80 %
    0x03, // both FETs on
    0x04, // strings
    0x01, // NTC count
    0x0b, 0xb9, // 27.0 C
];
const CELLS: [u8; 8] = [0x0c, 0xe4, 0x0c, 0xe5, 0x0c, 0xe3, 0x0c, 0xe6];
const VERSION: &[u8] = b"UBT-1.2";

/// Simulated BMS. When `replies` is set it answers every read request it
/// receives; otherwise the test queues bytes itself.
#[derive(Default)]
struct Device {
    replies: bool,
    requests: Vec<u8>,
    pending: VecDeque<u8>,
}

impl Device {
    fn replying() -> Self {
        Self {
            replies: true,
            ..Default::default()
        }
    }

    fn queue(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }
}

impl Transport for Device {
    fn write(&mut self, tx_buffer: &[u8]) -> io::Result<()> {
        assert_eq!(tx_buffer.len(), REQUEST_LENGTH);
        self.requests.extend_from_slice(tx_buffer);
        if self.replies {
            let payload = match tx_buffer[2] {
                0x03 => &INFO[..],
                0x04 => &CELLS[..],
                0x05 => VERSION,
                other => panic!("unexpected command {other:#04X}"),
            };
            let reply = ResponseFrame::new(tx_buffer[2], payload).unwrap();
            self.pending.extend(reply.to_bytes());
        }
        Ok(())
    }

    fn read(&mut self, rx_buffer: &mut [u8]) -> io::Result<usize> {
        let size = rx_buffer.len().min(self.pending.len());
        for (dst, src) in rx_buffer.iter_mut().zip(self.pending.drain(..size)) {
            *dst = src;
        }
        Ok(size)
    }
}

fn info_reply() -> Vec<u8> {
    ResponseFrame::new(0x03, &INFO).unwrap().to_bytes()
}

/// Steps until the cycle is at `state`.
fn step_to(bms: &mut UbetterBms<Device>, state: SchedulerState) {
    while bms.scheduler_state() != state {
        bms.scheduler_step().unwrap();
    }
}

#[test]
fn full_cycle_fills_every_group() {
    let mut bms = UbetterBms::new(Device::replying());
    bms.initialize().unwrap();
    for _ in 0..6 {
        bms.scheduler_step().unwrap();
    }
    assert_eq!(bms.scheduler_state(), SchedulerState::InfoRequest);

    let snapshot = bms.snapshot();
    assert_eq!(snapshot.total_voltage, 52.5);
    assert_eq!(snapshot.current, -1.0);
    assert_eq!(snapshot.residual_capacity, 40000);
    assert_eq!(snapshot.nominal_capacity, 50000);
    assert_eq!(snapshot.cycles, 3);
    assert_eq!(snapshot.production_date.year, 2022);
    assert_eq!(snapshot.software_version.to_string(), "1.6");
    assert_eq!(snapshot.remaining_capacity_percent, 80);
    assert!(snapshot.fet.charge && snapshot.fet.discharge);
    assert_eq!(snapshot.strings, 4);
    assert_eq!(snapshot.ntc_count, 1);
    assert_eq!(snapshot.temperatures, [27.0, 0.0, 0.0, 0.0]);
    assert!(snapshot.protection.active().is_empty());
    assert_eq!(snapshot.cell_voltages, vec![3300, 3301, 3299, 3302]);
    assert_eq!(snapshot.version_string(), "UBT-1.2");
    assert_eq!(bms.parser_state(), ParserState::AwaitStart);
}

#[test]
fn silent_device_only_sees_requests() {
    let mut bms = UbetterBms::new(Device::default());
    let mut visited = Vec::new();
    for _ in 0..6 {
        visited.push(bms.scheduler_state());
        bms.scheduler_step().unwrap();
    }
    assert_eq!(
        visited,
        [
            SchedulerState::InfoRequest,
            SchedulerState::InfoResponse,
            SchedulerState::VersRequest,
            SchedulerState::VersResponse,
            SchedulerState::CellRequest,
            SchedulerState::CellResponse,
        ]
    );
    assert_eq!(bms.snapshot(), Snapshot::default());
    let requests = &bms.into_inner().requests;
    assert_eq!(requests.len(), 3 * REQUEST_LENGTH);
    assert_eq!(requests[2], 0x03);
    assert_eq!(requests[9], 0x05);
    assert_eq!(requests[16], 0x04);
}

#[test]
fn info_reply_split_anywhere_gives_same_snapshot() {
    let reply = info_reply();

    let mut reference = UbetterBms::new(Device::default());
    step_to(&mut reference, SchedulerState::InfoResponse);
    reference.transport_mut().queue(&reply);
    reference.scheduler_step().unwrap();
    let expected = reference.snapshot();
    assert_ne!(expected, Snapshot::default());

    for split in 1..reply.len() {
        let mut bms = UbetterBms::new(Device::default());
        step_to(&mut bms, SchedulerState::InfoResponse);
        bms.transport_mut().queue(&reply[..split]);
        bms.scheduler_step().unwrap();
        assert_eq!(bms.snapshot(), Snapshot::default(), "split at {split}");

        // the tail arrives in the next info cycle
        step_to(&mut bms, SchedulerState::InfoResponse);
        bms.transport_mut().queue(&reply[split..]);
        bms.scheduler_step().unwrap();
        assert_eq!(bms.snapshot(), expected, "split at {split}");
        assert_eq!(bms.parser_state(), ParserState::AwaitStart);
    }
}

#[test]
fn corrupted_reply_is_dropped_and_parser_recovers() {
    let mut reply = info_reply();
    reply[10] ^= 0x01;

    let mut bms = UbetterBms::new(Device::default());
    step_to(&mut bms, SchedulerState::InfoResponse);
    bms.transport_mut().queue(&reply);
    bms.scheduler_step().unwrap();
    assert_eq!(bms.snapshot(), Snapshot::default());
    assert_eq!(bms.parser_state(), ParserState::AwaitStart);

    step_to(&mut bms, SchedulerState::InfoResponse);
    bms.transport_mut().queue(&info_reply());
    bms.scheduler_step().unwrap();
    assert_eq!(bms.snapshot().total_voltage, 52.5);
}

#[test]
fn error_status_reply_is_ignored() {
    let mut reply = info_reply();
    reply[2] = STATUS_ERROR;

    let mut bms = UbetterBms::new(Device::default());
    step_to(&mut bms, SchedulerState::InfoResponse);
    bms.transport_mut().queue(&reply);
    bms.scheduler_step().unwrap();
    assert_eq!(bms.snapshot(), Snapshot::default());
    assert_eq!(bms.parser_state(), ParserState::AwaitStart);
}

#[test]
fn reply_for_other_command_is_ignored() {
    let mut bms = UbetterBms::new(Device::default());
    step_to(&mut bms, SchedulerState::VersResponse);
    bms.transport_mut().queue(&info_reply());
    bms.scheduler_step().unwrap();
    assert_eq!(bms.snapshot(), Snapshot::default());

    // a cell reply picked up in the cell step still lands
    step_to(&mut bms, SchedulerState::CellResponse);
    bms.transport_mut()
        .queue(&ResponseFrame::new(0x04, &CELLS).unwrap().to_bytes());
    bms.scheduler_step().unwrap();
    assert_eq!(bms.snapshot().cell_voltages.len(), 4);
    assert_eq!(bms.snapshot().total_voltage, 0.0);
}

#[test]
fn info_reply_without_ntc_fields_is_decoded() {
    let reply = ResponseFrame::new(0x03, &INFO[..22]).unwrap().to_bytes();
    assert_eq!(reply.len(), 22 + 7);

    for split in 0..reply.len() {
        let mut bms = UbetterBms::new(Device::default());
        step_to(&mut bms, SchedulerState::InfoResponse);
        bms.transport_mut().queue(&reply[..split]);
        bms.scheduler_step().unwrap();

        step_to(&mut bms, SchedulerState::InfoResponse);
        bms.transport_mut().queue(&reply[split..]);
        bms.scheduler_step().unwrap();

        let snapshot = bms.snapshot();
        assert_eq!(snapshot.total_voltage, 52.5, "split at {split}");
        assert_eq!(snapshot.current, -1.0);
        assert_eq!(snapshot.residual_capacity, 40000);
        assert_eq!(snapshot.nominal_capacity, 50000);
        assert_eq!(snapshot.production_date.month, 3);
        assert_eq!(snapshot.software_version.to_string(), "1.6");
        assert!(snapshot.fet.charge && snapshot.fet.discharge);
        assert_eq!(snapshot.strings, 4);
        assert_eq!(snapshot.ntc_count, 0);
        assert_eq!(snapshot.temperatures, [0.0; 4]);
        assert_eq!(bms.parser_state(), ParserState::AwaitStart);
    }
}
