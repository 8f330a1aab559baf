// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::BufMut;
use hex_literal::hex;
use zserv_client_rs::models::{
    command::ZCommand,
    header::{FrameBuilder, FrameError, HEADER_LEN, MARKER, VERSION, ZservHeader, empty_frame},
};

#[test]
fn empty_frame_is_exactly_a_header() {
    let frame = empty_frame(ZCommand::RouterIdAdd);
    assert_eq!(frame.len(), HEADER_LEN);
    assert_eq!(&frame[..], &hex!("0006 ff02 0014")[..]);
}

#[test]
fn builder_patches_length_last() -> Result<()> {
    let mut fb = FrameBuilder::new(ZCommand::Hello);
    fb.body_mut().put_u8(9);
    let frame = fb.finish()?;

    assert_eq!(&frame[..], &hex!("0007 ff02 0017 09")[..]);
    let hdr = ZservHeader::parse(&frame)?;
    assert_eq!(hdr.frame_len(), frame.len());
    assert_eq!(hdr.marker, MARKER);
    assert_eq!(hdr.version, VERSION);
    assert_eq!(hdr.command.get(), ZCommand::Hello.as_u16());
    Ok(())
}

#[test]
fn parse_rejects_bad_marker() {
    let bytes = hex!("0006 fe02 0014");
    assert_eq!(ZservHeader::parse(&bytes), Err(FrameError::BadMarker(0xFE)));
}

#[test]
fn parse_rejects_bad_version() {
    let bytes = hex!("0006 ff03 0014");
    assert_eq!(ZservHeader::parse(&bytes), Err(FrameError::BadVersion(3)));
}

#[test]
fn parse_rejects_length_below_header() {
    let bytes = hex!("0005 ff02 0014");
    assert_eq!(ZservHeader::parse(&bytes), Err(FrameError::BadLength(5)));
}

#[test]
fn parse_rejects_short_input() {
    let bytes = hex!("0006 ff02 00");
    assert_eq!(ZservHeader::parse(&bytes), Err(FrameError::Truncated(5)));
}

#[test]
fn unknown_command_codes_still_frame_correctly() -> Result<()> {
    // Forward compatibility: the header parses even when the command
    // is unknown; dropping the frame is the dispatcher's call.
    let bytes = hex!("0006 ff02 7fff");
    let hdr = ZservHeader::parse(&bytes)?;
    assert_eq!(hdr.command.get(), 0x7FFF);
    assert!(ZCommand::from_u16(hdr.command.get()).is_none());
    Ok(())
}
