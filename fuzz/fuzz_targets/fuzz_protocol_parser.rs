//! Fuzz target: `Parser::push`
//!
//! Drives arbitrary byte sequences into the resumable command parser and
//! asserts that it never panics, that every decoded command respects the
//! wire limits, and that splitting the input never changes the result.
//! The leading bytes are also stuffed into a SetData frame, which must
//! decode back to exactly those bytes.
//!
//! cargo fuzz run fuzz_protocol_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use reflow::rpc::protocol::{Command, MAX_DATA_LEN, MAX_FRAME, START_BYTE, stuff_into};
use reflow::rpc::Parser;

fn decode_all(chunks: &[&[u8]]) -> Vec<Command> {
    let mut parser = Parser::new();
    let mut out = Vec::new();
    for chunk in chunks {
        parser.feed(chunk, |c| out.push(c));
    }
    out
}

fuzz_target!(|data: &[u8]| {
    let whole = decode_all(&[data]);

    for cmd in &whole {
        match cmd {
            Command::SetData { data, .. } => {
                assert!(!data.is_empty() && data.len() <= MAX_DATA_LEN);
            }
            Command::GetData { len, .. } => {
                assert!(*len != 0 && *len as usize <= MAX_DATA_LEN);
            }
            _ => {}
        }
    }

    // Resumability: any split point yields the same commands.
    if !data.is_empty() {
        let split = data[0] as usize % data.len();
        let (head, tail) = data.split_at(split);
        // Compared as text: NaN payloads are not equal to themselves.
        assert_eq!(
            format!("{:?}", decode_all(&[head, tail])),
            format!("{:?}", whole)
        );
    }

    // Stuffing: any user data survives framing.
    let user = &data[..data.len().min(MAX_DATA_LEN)];
    if !user.is_empty() {
        let mut frame: heapless::Vec<u8, MAX_FRAME> = heapless::Vec::new();
        frame.extend_from_slice(&[START_BYTE, b'M']).unwrap();
        stuff_into(&mut frame, &[0x00, 0x01, user.len() as u8]).unwrap();
        stuff_into(&mut frame, user).unwrap();
        assert_eq!(frame.iter().filter(|b| **b == START_BYTE).count(), 1);
        match decode_all(&[&frame]).as_slice() {
            [Command::SetData { address: 0x0100, data: got }] => assert_eq!(&got[..], user),
            other => panic!("stuffed frame decoded as {other:?}"),
        }
    }
});
