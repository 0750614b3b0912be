//! Register transaction client against the simulated board.
//!
//! Covers the retry contract (same bytes, same packet id on every attempt),
//! the failure taxonomy, and the composite set-IP workflow.

use std::{
    net::{Ipv4Addr, UdpSocket},
    num::NonZeroU32,
    time::Duration,
};

use proptest::prelude::*;
use sitcp_core::{
    BoardRegisters, RbcpClient, RbcpConfig, RbcpError, RetryPolicy, transport::UdpLink,
};
use sitcp_harness::{Fault, SimBoard};
use sitcp_proto::{Command, ProtocolError};

fn config(attempts: u32) -> RbcpConfig {
    RbcpConfig {
        retry: RetryPolicy::attempts(NonZeroU32::new(attempts).unwrap()),
        timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

fn client(board: SimBoard) -> RbcpClient<SimBoard> {
    RbcpClient::new(board, config(3))
}

#[test]
fn silent_board_exhausts_exactly_max_attempts() {
    let board = SimBoard::new().with_faults([Fault::Drop; 8]);
    let mut client = RbcpClient::new(board, config(5));

    let err = client.read(0x0, 4).unwrap_err();

    assert!(matches!(err, RbcpError::Transaction { attempts: 5, .. }));
    assert!(matches!(err.root(), RbcpError::Timeout(_)));

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 5);
    assert!(requests.iter().all(|r| r.packet_id == 1));
}

#[test]
fn id_mismatch_is_retried_with_same_id() {
    let board = SimBoard::new().with_faults([Fault::WrongId]);
    let mut client = client(board);

    client.write(0x40, &[0x12]).unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[test]
fn garbage_and_truncated_replies_are_retried() {
    let board = SimBoard::new().with_faults([Fault::Garbage, Fault::Truncate]);
    let mut client = client(board);
    client.transport_mut().poke(0x80, &[9, 8, 7, 6]);

    assert_eq!(client.read(0x80, 4).unwrap(), vec![9, 8, 7, 6]);
    assert_eq!(client.transport().requests().len(), 3);
}

#[test]
fn bus_error_on_every_attempt_is_terminal() {
    let board = SimBoard::new().with_bus_error_at(0x1000);
    let mut client = client(board);

    let err = client.read(0x1000, 1).unwrap_err();

    assert!(matches!(err, RbcpError::Transaction { attempts: 3, .. }));
    assert!(matches!(
        err.root(),
        RbcpError::Protocol(ProtocolError::BusError { address: 0x1000, .. })
    ));
}

#[test]
fn write_then_read_round_trip() {
    let mut client = client(SimBoard::new());

    let ack = client.write(0x2000, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    assert_eq!(ack, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(client.read(0x2000, 4).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(client.read(0x2001, 2).unwrap(), vec![0xAD, 0xBE]);
}

#[test]
fn write_verified_reads_back() {
    let mut client = client(SimBoard::new());

    client.write_verified(0x30, &[1, 2, 3]).unwrap();

    assert_eq!(client.transport().count(Command::Write), 1);
    assert_eq!(client.transport().count(Command::Read), 1);
}

#[test]
fn packet_ids_advance_per_request_and_wrap() {
    let mut client = client(SimBoard::new());

    for _ in 0..300 {
        client.write_u8(0x10, 0xAA).unwrap();
    }

    let ids: Vec<u8> = client.transport().requests().iter().map(|r| r.packet_id).collect();
    assert_eq!(ids[0], 1);
    assert_eq!(ids[254], 255);
    assert_eq!(ids[255], 0);
    assert_eq!(ids[256], 1);
}

#[test]
fn set_device_ip_writes_and_verifies() {
    let registers = BoardRegisters::default();
    let mut board = SimBoard::new();
    board.poke(registers.interlock, &[0x01]);
    let mut client = client(board);

    let ip = Ipv4Addr::new(192, 168, 10, 20);
    client.set_device_ip(ip).unwrap();

    let board = client.transport();
    assert_eq!(board.peek(registers.interlock, 1), vec![0x00]);
    assert_eq!(board.peek(registers.ip_address, 4), vec![192, 168, 10, 20]);

    let commands: Vec<_> = board.requests().iter().filter_map(|r| r.command()).collect();
    assert_eq!(commands, vec![Command::Write, Command::Write, Command::Read]);
    assert_eq!(client.read_device_ip().unwrap(), ip);
}

#[test]
fn set_device_ip_stops_when_address_write_fails() {
    let registers = BoardRegisters::default();
    let mut board = SimBoard::new().with_bus_error_at(registers.ip_address + 2);
    board.poke(registers.interlock, &[0x01]);
    let mut client = client(board);

    let err = client.set_device_ip(Ipv4Addr::new(10, 0, 0, 2)).unwrap_err();

    assert!(matches!(err.root(), RbcpError::Protocol(ProtocolError::BusError { .. })));

    let board = client.transport();
    // One interlock write, then the address write's attempts run out
    assert_eq!(board.count(Command::Write), 1 + 3);
    assert_eq!(board.count(Command::Read), 0);
    // Interlock stays cleared: the workflow does not roll back
    assert_eq!(board.peek(registers.interlock, 1), vec![0x00]);
    assert_eq!(board.peek(registers.ip_address, 4), vec![0; 4]);
}

#[test]
fn set_device_ip_readback_mismatch_is_terminal() {
    let registers = BoardRegisters::default();
    let mut board = SimBoard::new().with_read_only_at(registers.ip_address + 3);
    board.poke(registers.interlock, &[0x01]);
    let mut client = client(board);

    let err = client.set_device_ip(Ipv4Addr::new(10, 0, 0, 2)).unwrap_err();

    // Terminal on the first mismatch, not wrapped in a retry failure
    assert!(
        matches!(
            &err,
            RbcpError::Verification { address, written, readback }
                if *address == registers.ip_address
                    && written[..] == [10u8, 0, 0, 2]
                    && readback[..] == [10u8, 0, 0, 0]
        ),
        "{err:?}"
    );

    let board = client.transport();
    assert_eq!(board.count(Command::Write), 2);
    assert_eq!(board.count(Command::Read), 1);
    assert_eq!(board.peek(registers.interlock, 1), vec![0x00]);
}

#[test]
fn lossy_board_with_enough_attempts() {
    let board = SimBoard::with_seed(42).with_drop_rate(0.3);
    let mut client = RbcpClient::new(board, config(12));

    for i in 0u8..50 {
        client.write_u8(0x500 + u32::from(i), i).unwrap();
    }
    for i in 0u8..50 {
        assert_eq!(client.read(0x500 + u32::from(i), 1).unwrap(), vec![i]);
    }
}

#[test]
fn rbcp_port_register_is_big_endian() {
    let registers = BoardRegisters::default();
    let mut board = SimBoard::new();
    board.poke(registers.rbcp_port, &[0x12, 0x34]);
    let mut client = client(board);

    assert_eq!(client.read_rbcp_port().unwrap(), 4660);
}

#[test]
fn udp_round_trip_against_board_thread() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let endpoint = server.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let mut board = SimBoard::new();
        let mut buf = [0u8; 512];
        for _ in 0..2 {
            let (len, from) = server.recv_from(&mut buf).unwrap();
            if let Some(reply) = board.handle(&buf[..len]) {
                server.send_to(&reply, from).unwrap();
            }
        }
    });

    let link = UdpLink::bind("127.0.0.1:0").unwrap();
    let mut client = RbcpClient::new(
        link,
        RbcpConfig { endpoint, timeout: Duration::from_secs(2), ..Default::default() },
    );

    client.write(0xFFFF_0000, &[0xCA, 0xFE]).unwrap();
    assert_eq!(client.read(0xFFFF_0000, 2).unwrap(), vec![0xCA, 0xFE]);
    handle.join().unwrap();
}

proptest! {
    #[test]
    fn any_write_reads_back(
        address in any::<u32>(),
        data in proptest::collection::vec(any::<u8>(), 1..=255),
    ) {
        let mut client = client(SimBoard::new());

        prop_assert_eq!(client.write(address, &data).unwrap(), data.clone());
        prop_assert_eq!(client.read(address, data.len()).unwrap(), data);
    }

    #[test]
    fn validation_failures_never_reach_the_wire(len in 256usize..1024) {
        let mut client = client(SimBoard::new());

        prop_assert!(matches!(client.read(0, len), Err(RbcpError::Validation(_))));
        prop_assert!(matches!(client.write(0, &vec![0; len]), Err(RbcpError::Validation(_))));
        prop_assert!(client.transport().requests().is_empty());
    }
}
