mod common;

use common::{BoardEvent, MockBoard, MockUart, RecordingSink, UartEvent, ch};
use railcom::config::{Ch1Listen, Config};
use railcom::core::ChannelSet;
use railcom::cutout::{CutoutDecoder, CutoutPhase};
use railcom::hw::Direction;
use railcom::occupancy::RollingOccupancy;
use railcom::trace::TraceCounters;
use railcom::Feedback;

type Decoder<const N: usize> = CutoutDecoder<MockUart, MockBoard, RecordingSink, N, TraceCounters>;

fn make_decoder<const N: usize>(sink: RecordingSink, config: Config) -> Decoder<N> {
    let uarts = core::array::from_fn(|_| MockUart::new());
    let mut decoder =
        CutoutDecoder::with_trace(uarts, MockBoard::default(), sink, TraceCounters::new(), config);
    decoder.enable();
    decoder
}

fn uart<const N: usize>(decoder: &mut Decoder<N>, channel: u8) -> &mut MockUart {
    decoder.uart_mut(ch(channel)).unwrap()
}

fn feedback(channel: u8, ch1: &[u8], ch2: &[u8]) -> Feedback {
    let mut feedback = Feedback::new(ch(channel), 0);
    for byte in ch1 {
        feedback.add_ch1_data(*byte).unwrap();
    }
    for byte in ch2 {
        feedback.add_ch2_data(*byte).unwrap();
    }
    feedback
}

#[test]
fn test_single_channel_feedback() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());

    decoder.start(true);
    uart(&mut decoder, 0).receive(&[0x82]);
    decoder.middle();
    uart(&mut decoder, 0).receive(&[0x55, 0xaa]);
    decoder.end();

    let sink = decoder.sink();
    assert_eq!(sink.committed, [feedback(0, &[0x82], &[0x55, 0xaa])]);
    assert_eq!(sink.pending_signals, 1);
    assert_eq!(decoder.trace().empty_deliveries, 0);
}

#[test]
fn test_corrupted_byte_still_delivers_record() {
    let mut decoder = make_decoder::<1>(RecordingSink::default(), Config::default());

    decoder.start(false);
    decoder.middle();
    uart(&mut decoder, 0).receive_corrupted(0x5a);
    decoder.end();

    let sink = decoder.sink();
    assert_eq!(sink.committed, [feedback(0, &[], &[])]);
    assert_eq!(sink.pending_signals, 1);
    // A channel record, not the empty delivery
    assert_eq!(decoder.trace().records, 1);
    assert_eq!(decoder.trace().empty_deliveries, 0);
    assert_eq!(decoder.trace().framing_errors, 1);
}

#[test]
fn test_silent_cutout_delivers_empty_record() {
    let mut decoder = make_decoder::<3>(RecordingSink::default(), Config::default());

    decoder.start(true);
    decoder.middle();
    decoder.end();

    let sink = decoder.sink();
    assert_eq!(sink.committed, [feedback(0, &[], &[])]);
    assert_eq!(sink.pending_signals, 1);
    assert_eq!(decoder.trace().empty_deliveries, 1);
    assert_eq!(decoder.phase(), CutoutPhase::Idle);
}

#[test]
fn test_no_cutout_matches_silent_cutout() {
    let mut decoder = make_decoder::<3>(RecordingSink::default(), Config::default());

    decoder.start(true);
    decoder.none();

    let sink = decoder.sink();
    assert_eq!(sink.committed, [feedback(0, &[], &[])]);
    assert_eq!(sink.pending_signals, 1);
    assert_eq!(decoder.trace().no_cutouts, 1);

    decoder.none();
    assert_eq!(decoder.sink().committed.len(), 2);
    assert_eq!(decoder.sink().pending_signals, 2);
}

#[test]
fn test_pool_exhaustion_drops_other_channels() {
    let mut decoder = make_decoder::<3>(RecordingSink::with_alloc_limit(1), Config::default());

    decoder.start(true);
    for channel in 0..3 {
        uart(&mut decoder, channel).receive(&[0x0f]);
    }
    decoder.middle();
    for channel in 0..3 {
        uart(&mut decoder, channel).receive(&[0x10 + channel, 0x20 + channel]);
    }
    decoder.end();

    let sink = decoder.sink();
    assert_eq!(sink.committed, [feedback(0, &[0x0f], &[0x10, 0x20])]);
    assert_eq!(sink.pending_signals, 1);
    assert_eq!(decoder.trace().alloc_failures, 4);

    // Dropped bytes stay in the receivers and are flushed by the next cutout
    assert!(!uart(&mut decoder, 1).rx.is_empty());
    decoder.start(true);
    assert!(uart(&mut decoder, 1).rx.is_empty());
    assert!(uart(&mut decoder, 2).rx.is_empty());
}

#[test]
fn test_stale_bytes_are_flushed() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());

    uart(&mut decoder, 1).receive(&[0xff, 0x00]);
    decoder.start(false);
    decoder.middle();
    decoder.end();

    let sink = decoder.sink();
    assert_eq!(sink.committed, [feedback(0, &[], &[])]);
    assert_eq!(sink.allocs, 1);
}

#[test]
fn test_flush_clears_stale_framing_error() {
    let mut decoder = make_decoder::<1>(RecordingSink::default(), Config::default());

    uart(&mut decoder, 0).receive(&[0x11]);
    uart(&mut decoder, 0).receive_corrupted(0x5a);
    uart(&mut decoder, 0).events.clear();
    decoder.start(true);

    let rx = uart(&mut decoder, 0);
    assert!(rx.rx.is_empty());
    assert!(!rx.framing_error);
    assert_eq!(
        rx.events,
        [
            UartEvent::Direction(Direction::Receive),
            UartEvent::ClearFramingError,
        ]
    );

    decoder.middle();
    uart(&mut decoder, 0).receive(&[0x22]);
    decoder.end();
    assert_eq!(decoder.sink().committed, [feedback(0, &[], &[0x22])]);
}

#[test]
fn test_framing_error_in_window_1_restarts_receiver() {
    let mut decoder = make_decoder::<1>(RecordingSink::default(), Config::default());

    decoder.start(true);
    uart(&mut decoder, 0).receive(&[0x0f]);
    uart(&mut decoder, 0).receive_corrupted(0x99);
    uart(&mut decoder, 0).receive(&[0xf0]);
    uart(&mut decoder, 0).events.clear();
    decoder.middle();

    let rx = uart(&mut decoder, 0);
    assert_eq!(
        rx.events,
        [
            UartEvent::Direction(Direction::Idle),
            UartEvent::ClearFramingError,
            UartEvent::Disable,
            UartEvent::Direction(Direction::Receive),
            UartEvent::Enable,
        ]
    );
    assert!(!rx.framing_error);

    decoder.end();
    assert_eq!(decoder.sink().committed, [feedback(0, &[0x0f, 0xf0], &[])]);
}

#[test]
fn test_framing_error_in_window_2_keeps_listening() {
    let mut decoder = make_decoder::<1>(RecordingSink::default(), Config::default());

    decoder.start(true);
    decoder.middle();
    uart(&mut decoder, 0).receive(&[0x11]);
    uart(&mut decoder, 0).receive_corrupted(0xe0);
    uart(&mut decoder, 0).receive(&[0x22]);
    uart(&mut decoder, 0).events.clear();
    decoder.end();

    let rx = uart(&mut decoder, 0);
    assert_eq!(
        rx.events,
        [
            UartEvent::ClearFramingError,
            UartEvent::Direction(Direction::Idle),
        ]
    );

    assert_eq!(decoder.sink().committed, [feedback(0, &[], &[0x11, 0x22])]);
    assert_eq!(decoder.trace().ch2_bytes, 2);
    assert_eq!(decoder.trace().collision_patterns, 0);
}

#[test]
fn test_corrupted_bytes_never_reach_payload() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());

    decoder.start(true);
    uart(&mut decoder, 0).receive_corrupted(0xa1);
    uart(&mut decoder, 1).receive(&[0xa2]);
    decoder.middle();
    uart(&mut decoder, 0).receive_corrupted(0xb1);
    uart(&mut decoder, 0).receive(&[0xb2]);
    uart(&mut decoder, 1).receive_corrupted(0xb3);
    decoder.end();

    let committed = &decoder.sink().committed;
    assert_eq!(
        committed,
        &[feedback(0, &[], &[0xb2]), feedback(1, &[0xa2], &[])]
    );
    for byte in [0xa1, 0xb1, 0xb3] {
        assert!(
            committed
                .iter()
                .all(|f| !f.ch1.contains(&byte) && !f.ch2.contains(&byte))
        );
    }
    assert_eq!(decoder.sink().pending_signals, 2);
}

#[test]
fn test_record_handle_cleared_after_commit() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());

    decoder.start(true);
    uart(&mut decoder, 1).receive(&[0x0f]);
    decoder.middle();
    assert_eq!(decoder.open_records(), ChannelSet::new_eq(ch(1)));

    decoder.end();
    assert_eq!(decoder.open_records(), ChannelSet::NONE);

    // The next cutout allocates a fresh record
    decoder.start(true);
    decoder.middle();
    uart(&mut decoder, 1).receive(&[0x33]);
    decoder.end();

    let sink = decoder.sink();
    assert_eq!(sink.allocs, 2);
    assert_eq!(
        sink.committed,
        [feedback(1, &[0x0f], &[]), feedback(1, &[], &[0x33])]
    );
}

#[test]
fn test_unfinished_cutout_discards_record() {
    let mut decoder = make_decoder::<1>(RecordingSink::default(), Config::default());

    decoder.start(true);
    uart(&mut decoder, 0).receive(&[0x0f]);
    decoder.middle();
    decoder.start(true);
    assert_eq!(decoder.sink().discarded, 1);
    assert_eq!(decoder.open_records(), ChannelSet::NONE);

    decoder.middle();
    decoder.end();
    assert_eq!(decoder.sink().committed, [feedback(0, &[], &[])]);
}

#[test]
fn test_no_cutout_discards_open_record() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());

    decoder.start(true);
    uart(&mut decoder, 1).receive(&[0x0f]);
    decoder.middle();
    assert_eq!(decoder.open_records(), ChannelSet::new_eq(ch(1)));

    decoder.none();
    assert_eq!(decoder.open_records(), ChannelSet::NONE);
    assert_eq!(decoder.phase(), CutoutPhase::Idle);

    let sink = decoder.sink();
    assert_eq!(sink.discarded, 1);
    assert_eq!(sink.committed, [feedback(0, &[], &[])]);
    assert_eq!(sink.pending_signals, 1);
}

#[test]
fn test_ch1_listen_policy() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());
    decoder.start(false);
    assert_eq!(uart(&mut decoder, 0).direction, Direction::Idle);
    decoder.middle();
    assert_eq!(uart(&mut decoder, 0).direction, Direction::Receive);
    decoder.end();
    assert_eq!(uart(&mut decoder, 0).direction, Direction::Idle);

    decoder.start(true);
    assert_eq!(uart(&mut decoder, 1).direction, Direction::Receive);
    decoder.none();

    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::new(Ch1Listen::Always));
    decoder.start(false);
    assert_eq!(uart(&mut decoder, 1).direction, Direction::Receive);
    decoder.none();

    let board = MockBoard {
        need_ch1: true,
        ..Default::default()
    };
    let uarts = [MockUart::new(), MockUart::new()];
    let mut decoder = CutoutDecoder::new(uarts, board, RecordingSink::default(), Config::default());
    decoder.start(false);
    assert_eq!(decoder.uart(ch(0)).unwrap().direction, Direction::Receive);
}

#[test]
fn test_board_hooks() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());

    decoder.start(true);
    decoder.middle();
    decoder.end();

    assert_eq!(
        decoder.board().events,
        [
            BoardEvent::EnableMeasurement { active_high: false },
            BoardEvent::MiddleHook,
            BoardEvent::DisableMeasurement,
        ]
    );
}

#[test]
fn test_enable_disable() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());
    assert!(uart(&mut decoder, 0).enabled);
    assert_eq!(uart(&mut decoder, 1).direction, Direction::Idle);

    decoder.disable();
    assert!(!uart(&mut decoder, 0).enabled);
    assert!(!uart(&mut decoder, 1).enabled);
}

#[test]
fn test_feedback_key_is_recorded() {
    let mut decoder = make_decoder::<2>(RecordingSink::default(), Config::default());
    decoder.set_feedback_key(0xdcc0_0003);

    decoder.start(true);
    uart(&mut decoder, 1).receive(&[0x0f]);
    decoder.middle();
    decoder.end();
    decoder.none();

    let committed = &decoder.sink().committed;
    assert_eq!(committed.len(), 2);
    assert!(committed.iter().all(|f| f.feedback_key == 0xdcc0_0003));
}

#[test]
fn test_occupancy_sample() {
    let mut decoder = make_decoder::<3>(RecordingSink::default(), Config::default());
    let mut occupancy = RollingOccupancy::<4>::new();

    let board = MockBoard {
        sample: ChannelSet::from_bits(0b1111_0101),
        ..Default::default()
    };
    let uarts = [MockUart::new(), MockUart::new(), MockUart::new()];
    let mut decoder_with_sample =
        CutoutDecoder::new(uarts, board, RecordingSink::default(), Config::default());

    decoder_with_sample.sample_occupancy(&mut occupancy);
    assert_eq!(occupancy.last_sample(), Some(ChannelSet::from_bits(0b101)));
    assert_eq!(
        decoder_with_sample.board().events,
        [
            BoardEvent::EnableMeasurement { active_high: true },
            BoardEvent::Sample,
            BoardEvent::DisableMeasurement,
        ]
    );

    // Sampling does not disturb the cutout state
    decoder.start(true);
    decoder.sample_occupancy(&mut occupancy);
    assert_eq!(decoder.phase(), CutoutPhase::BeforeMiddle);
    assert_eq!(occupancy.occupied(), ChannelSet::from_bits(0b101));
}

#[test]
fn test_collision_pattern_counted() {
    let mut decoder = make_decoder::<1>(RecordingSink::default(), Config::default());

    decoder.start(true);
    decoder.middle();
    uart(&mut decoder, 0).receive(&[0xe0, 0x0f]);
    decoder.end();

    let trace = decoder.trace();
    assert_eq!(trace.cutouts, 1);
    assert_eq!(trace.ch2_bytes, 2);
    assert_eq!(trace.collision_patterns, 1);
    assert_eq!(trace.records, 1);
}
