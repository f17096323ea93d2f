#![allow(missing_docs)]

use std::io::{self, Cursor};

use nullpipe::{
    Blocking, ConfigError, PaginationError, PumpError, PumpOptions, PumpReport, SharedBuf, Sinks,
    StreamPump,
    pagination::{decode_chunks, encode_chunks},
};
use rstest::rstest;

fn relay(options: PumpOptions, input: &[u8]) -> Result<(Vec<u8>, PumpReport), PumpError> {
    let out = SharedBuf::new();
    let sinks = Sinks::new().with_pass_through(out.clone());
    let report = StreamPump::new(options, Blocking(Cursor::new(input.to_vec())), sinks)?
        .with_progress_writer(io::sink())
        .run()?;
    Ok((out.contents(), report))
}

fn sample(len: usize) -> Vec<u8> {
    b"lorem null-page- ipsum null-page-e dolor "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

#[rstest]
#[case::tiny(10, 66)]
#[case::exact_buffer(1000, 1000)]
#[case::many_buffers(50_000, 333)]
fn write_then_read_pagination(#[case] len: usize, #[case] buffer_size: usize) {
    let payload = sample(len);
    let writer = PumpOptions {
        pass_through: true,
        write_pagination: true,
        buffer_size,
        ..Default::default()
    };
    let (framed, _) = relay(writer, &payload).unwrap();
    assert_eq!(framed, encode_chunks([payload.as_slice()]));

    let reader = PumpOptions {
        pass_through: true,
        read_pagination: true,
        digest: true,
        buffer_size,
        ..Default::default()
    };
    let (out, report) = relay(reader, &framed).unwrap();
    assert_eq!(out, payload);
    assert_eq!(report.bytes_read, framed.len() as u64);
    assert_eq!(report.bytes_released, payload.len() as u64);
    assert_eq!(
        report.digest.unwrap().to_string(),
        format!("{:x}", md5::compute(&payload))
    );
}

#[test]
fn reencoding_a_paginated_stream() {
    let payload = sample(4096);
    let framed = encode_chunks([payload.as_slice()]);
    let options = PumpOptions {
        pass_through: true,
        read_pagination: true,
        write_pagination: true,
        ..Default::default()
    };
    let (out, _) = relay(options, &framed).unwrap();
    assert_eq!(out, framed);
    assert_eq!(decode_chunks([out.as_slice()]).unwrap(), payload);
}

#[test]
fn stop_after_on_a_paginated_stream_is_truncation() {
    let framed = encode_chunks([sample(500).as_slice()]);
    let options = PumpOptions {
        pass_through: true,
        read_pagination: true,
        stop_after: 200,
        ..Default::default()
    };
    let err = relay(options, &framed).unwrap_err();
    assert!(matches!(err, PumpError::Pagination(PaginationError::MissingEnd)));
}

#[test]
fn unpaginated_input_is_rejected_by_reader() {
    let options = PumpOptions {
        pass_through: true,
        read_pagination: true,
        ..Default::default()
    };
    let err = relay(options, b"plain text").unwrap_err();
    assert!(matches!(err, PumpError::Pagination(PaginationError::MissingStart)));
    assert_eq!(err.to_string(), "did not get pagination start");
}

#[test]
fn read_all_matches_streaming() {
    let payload = sample(10_000);
    let streaming = PumpOptions {
        pass_through: true,
        write_pagination: true,
        buffer_size: 128,
        ..Default::default()
    };
    let read_all = PumpOptions {
        read_all: true,
        ..streaming.clone()
    };
    let (a, _) = relay(streaming, &payload).unwrap();
    let (b, _) = relay(read_all, &payload).unwrap();
    assert_eq!(a, b);
}

#[test]
fn invalid_options_are_reported_before_running() {
    let options = PumpOptions {
        buffer_size: 10,
        ..Default::default()
    };
    let err = relay(options, b"").unwrap_err();
    assert!(matches!(
        err,
        PumpError::Config(ConfigError::BufferTooSmall { size: 10, .. })
    ));
}
