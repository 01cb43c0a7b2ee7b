//! Purpose: Contract tests for the public framer surface over real byte sources.
//! Exports: Integration tests only.
//! Role: Exercise encoder/decoder against files, pipes, and mixed record types.
//! Invariants: Tests only use `jsonframe::api`, never internal modules.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use jsonframe::api::records::{Reading, StartVmRequest};
use jsonframe::api::{
    ErrorKind, Event, FrameStyle, Measurement, Presence, StreamDecoder, StreamEncoder, pipe,
    sample_events,
};

#[test]
fn file_backed_stream_round_trips_in_order() {
    let mut file = tempfile::tempfile().expect("tempfile");
    {
        let mut encoder = StreamEncoder::new(&mut file);
        let written = encoder.encode_all(sample_events().iter()).expect("encode");
        assert_eq!(written, 6);
    }
    file.seek(SeekFrom::Start(0)).expect("rewind");

    let mut decoder = StreamDecoder::buffered(file);
    let decoded = decoder
        .records::<Event>()
        .collect::<Result<Vec<_>, _>>()
        .expect("decode");
    assert_eq!(decoded, sample_events());
    assert_eq!(decoder.records_read(), 6);
}

#[test]
fn hand_written_file_with_blank_lines_decodes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("events.jsonl");
    let mut file = File::create(&path).expect("create");
    write!(
        file,
        "\n\t{{\"type\":\"click\",\"x\":100,\"y\":200}}\n\n\t{{\"type\":\"move\",\"x\":101,\"y\":202}}\n\t"
    )
    .expect("write");
    drop(file);

    let mut decoder = StreamDecoder::buffered(File::open(&path).expect("open"));
    let first: Event = decoder.next_record().expect("first").expect("some");
    let second: Event = decoder.next_record().expect("second").expect("some");
    assert_eq!(first, Event::new("click", 100.0, 200.0));
    assert_eq!(second, Event::new("move", 101.0, 202.0));
    assert!(decoder.next_record::<Event>().expect("end").is_none());
}

#[test]
fn measurements_inside_records_use_the_scalar_codec() {
    let readings = [
        Reading {
            name: "rod".to_string(),
            value: Measurement::meters(2.1),
        },
        Reading {
            name: "pipe".to_string(),
            value: Measurement::inches(0.75),
        },
    ];
    let mut encoder = StreamEncoder::with_style(Vec::new(), FrameStyle::Lines);
    encoder.encode_all(readings.iter()).expect("encode");
    let bytes = encoder.into_inner();
    assert_eq!(
        String::from_utf8_lossy(&bytes),
        "{\"name\":\"rod\",\"value\":\"2.100000meter\"}\n{\"name\":\"pipe\",\"value\":\"0.750000inch\"}\n"
    );

    let mut decoder = StreamDecoder::new(bytes.as_slice());
    let decoded = decoder
        .records::<Reading>()
        .collect::<Result<Vec<_>, _>>()
        .expect("decode");
    assert_eq!(decoded, readings);
}

#[test]
fn bad_scalar_terminates_stream_with_scalar_kind() {
    let input = r#"{"name":"a","value":"1meter"}{"name":"b","value":"meter"}{"name":"c","value":"2inch"}"#;
    let mut decoder = StreamDecoder::new(input.as_bytes());
    assert!(decoder.next_record::<Reading>().expect("first").is_some());
    let err = decoder.next_record::<Reading>().expect_err("bad scalar");
    assert_eq!(err.kind(), ErrorKind::MalformedScalar);
    assert!(decoder.next_record::<Reading>().expect("after").is_none());
}

#[test]
fn presence_distinguishes_zero_from_absent() {
    let input = br#"{"image":"alpine"} {"image":"alpine","count":0} {"image":"alpine","count":4}"#;
    let mut decoder = StreamDecoder::new(&input[..]);
    let counts = decoder
        .records::<StartVmRequest>()
        .map(|request| request.expect("decode").count)
        .collect::<Vec<_>>();
    assert_eq!(
        counts,
        [Presence::Absent, Presence::Present(0), Presence::Present(4)]
    );
}

#[test]
fn pipe_connects_producer_and_consumer_threads() {
    let (writer, reader) = pipe(2);
    let producer = std::thread::spawn(move || {
        let mut encoder = StreamEncoder::with_style(writer, FrameStyle::Lines);
        for n in 0..200 {
            encoder
                .encode(&Event::new("move", f64::from(n), 0.0))
                .expect("encode");
        }
        encoder.records_written()
    });

    let mut decoder = StreamDecoder::new(reader);
    let mut expected = 0.0;
    for event in decoder.records::<Event>() {
        let event = event.expect("decode");
        assert_eq!(event.x, expected);
        expected += 1.0;
    }
    assert_eq!(producer.join().expect("join"), 200);
    assert_eq!(decoder.records_read(), 200);
}

#[test]
fn dropped_consumer_fails_producer_with_io() {
    let (writer, reader) = pipe(1);
    drop(reader);
    let mut encoder = StreamEncoder::new(writer);
    let err = encoder
        .encode(&Event::new("click", 1.0, 1.0))
        .expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn independent_decoders_do_not_affect_each_other() {
    let good = r#"{"type":"click","x":1,"y":1}{"type":"move","x":2,"y":2}"#;
    let bad = r#"{"type":"click","x":"oops"}"#;
    let mut good_decoder = StreamDecoder::new(good.as_bytes());
    let mut bad_decoder = StreamDecoder::new(bad.as_bytes());

    assert!(good_decoder.next_record::<Event>().expect("good").is_some());
    assert!(bad_decoder.next_record::<Event>().is_err());
    assert!(good_decoder.next_record::<Event>().expect("good").is_some());
}
