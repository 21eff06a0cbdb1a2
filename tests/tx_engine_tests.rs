//! TX Engine Tests
//!
//! Drives the async TX playback engine against the simulated carrier timer
//! and checks what the output pin would have played.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test tx_engine_tests

mod sim;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::yield_now;
use sim::{Sim, SimCapture, TxCall};
use subghz_firmware::config::TX_MAX_TICKS;
use subghz_firmware::engine::{
    CarrierLimits, EngineState, LevelDurationSource, SignalPort, TickConverter, TxStats,
};
use subghz_firmware::types::{LevelDuration, Pulse, TxData};

const IR_CARRIER: u32 = 38_000;
const SUBGHZ_CARRIER: u32 = 433_920_000;

type Port<'a> = SignalPort<'a, sim::SimTx, SimCapture>;

fn ir_port<'a>(sim: &Sim) -> Port<'a> {
    SignalPort::new(sim.tx(), SimCapture::new(), CarrierLimits::INFRARED)
}

/// Source that plays `samples` once, then reports errors
fn once(samples: Vec<TxData>) -> impl FnMut() -> TxData + Send {
    let mut samples = samples.into_iter();
    move || samples.next().unwrap_or(TxData::Error)
}

/// Cycles a sample plays once split into entries
fn played_cycles(cycles: u64) -> u64 {
    let ticks = cycles - 1;
    let max = u64::from(TX_MAX_TICKS);
    if ticks > max {
        ticks + ticks.div_ceil(max)
    } else {
        cycles
    }
}

/// Step the simulator until the engine halts, yielding between updates
async fn drive(sim: &Sim, port: &Port<'_>, states: &mut Vec<EngineState>) {
    while sim.step(port) {
        let state = port.state();
        if states.last() != Some(&state) {
            states.push(state);
        }
        yield_now().await;
    }
}

// =============================================================================
// Contract Tests
// =============================================================================

#[test]
#[should_panic(expected = "no data callback registered")]
fn test_start_without_source_panics() {
    let sim = Sim::new();
    let port = ir_port(&sim);
    port.start_async_tx(IR_CARRIER, 0.33);
}

#[test]
#[should_panic(expected = "duty cycle")]
fn test_start_with_zero_duty_panics() {
    let sim = Sim::new();
    let mut source = once(vec![]);
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.start_async_tx(IR_CARRIER, 0.0);
}

#[test]
#[should_panic(expected = "outside port limits")]
fn test_start_outside_limits_panics() {
    let sim = Sim::new();
    let mut source = once(vec![]);
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.start_async_tx(SUBGHZ_CARRIER, 0.5);
}

#[test]
#[should_panic(expected = "requires state Idle")]
fn test_start_twice_panics() {
    let sim = Sim::new();
    let mut source = || TxData::Ok(Pulse::mark(263));
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.start_async_tx(IR_CARRIER, 0.33);
    port.start_async_tx(IR_CARRIER, 0.33);
}

#[test]
#[should_panic(expected = "requires an active transmit session")]
fn test_stop_while_idle_panics() {
    let sim = Sim::new();
    let port = ir_port(&sim);
    block_on(port.stop_async_tx());
}

#[test]
#[should_panic(expected = "requires state Idle")]
fn test_callback_swap_while_running_panics() {
    let sim = Sim::new();
    let mut source = || TxData::Ok(Pulse::mark(263));
    let mut other = || TxData::Wait;
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.start_async_tx(IR_CARRIER, 0.33);
    port.set_tx_data_callback(&mut other);
}

// =============================================================================
// Playback Tests
// =============================================================================

#[test]
fn test_start_configures_hardware_in_order() {
    let sim = Sim::new();
    let mut source = || TxData::Ok(Pulse::mark(263));
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.start_async_tx(IR_CARRIER, 0.33);

    assert_eq!(port.state(), EngineState::AsyncTx);
    assert_eq!(
        sim.calls(),
        vec![
            TxCall::ConfigureCarrier(IR_CARRIER),
            TxCall::ConfigureStreams,
            TxCall::LoadPolarity(201),
            TxCall::LoadPeriods(200),
            TxCall::Start,
        ]
    );
    assert!((sim.state().duty - 0.33).abs() < f32::EPSILON);
}

#[test]
fn test_single_packet_plays_and_terminates() {
    let sim = Sim::new();
    let sent = AtomicUsize::new(0);
    let mut source = once(vec![
        TxData::Ok(Pulse::mark(263)),
        TxData::Ok(Pulse::space(526)),
        TxData::Ok(Pulse::mark(263)),
        TxData::LastDone(Pulse::space(526)),
    ]);
    let mut on_sent = || {
        sent.fetch_add(1, Ordering::Relaxed);
    };
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.set_tx_signal_sent_callback(&mut on_sent);

    port.start_async_tx(IR_CARRIER, 0.33);
    let mut states = Vec::new();
    block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));

    assert_eq!(sim.runs(), vec![(true, 10), (false, 20), (true, 10), (false, 20)]);
    assert!(!sim.output_is_mark());
    assert_eq!(sent.load(Ordering::Relaxed), 1);
    assert_eq!(port.state(), EngineState::Idle);
    assert_eq!(
        states,
        vec![EngineState::AsyncTx, EngineState::AsyncTxStopInProgress, EngineState::AsyncTxStopped]
    );

    let calls = sim.calls();
    assert_eq!(calls.last(), Some(&TxCall::Release));
    assert!(calls.contains(&TxCall::Halt));
    // flush buffer: two entries
    assert!(calls.contains(&TxCall::LoadPeriods(2)));

    let stats = port.last_tx_stats();
    assert_eq!(stats.mark_us, 526);
    assert_eq!(stats.space_us, 1_052);
}

#[test]
fn test_complete_flag_visible_before_release() {
    let sim = Sim::new();
    let mut source = once(vec![TxData::Ok(Pulse::mark(263)), TxData::LastDone(Pulse::space(263))]);
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);

    port.start_async_tx(IR_CARRIER, 0.5);
    assert!(!port.is_async_tx_complete());
    sim.run(&port, 1_000);

    assert!(port.is_async_tx_complete());
    assert_eq!(port.state(), EngineState::AsyncTxStopped);
    assert!(!sim.calls().contains(&TxCall::Release));

    block_on(port.wait_tx_termination());
    assert_eq!(port.state(), EngineState::Idle);
    assert!(!port.is_busy());
    assert_eq!(sim.calls().last(), Some(&TxCall::Release));
}

#[test]
fn test_wait_plays_single_cycle_spaces() {
    let sim = Sim::new();
    let mut calls = 0;
    let mut source = move || {
        calls += 1;
        match calls {
            1 => TxData::Ok(Pulse::mark(263)),
            2..=6 => TxData::Wait,
            _ => TxData::LastDone(Pulse::space(263)),
        }
    };
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);

    port.start_async_tx(IR_CARRIER, 0.33);
    let mut states = Vec::new();
    block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));

    // the first wait only ends the pre-rolled fill, whose padding space it
    // becomes; each later wait plays one space of its own
    assert_eq!(sim.runs(), vec![(true, 10), (false, 1 + 4 + 10)]);
}

#[test]
fn test_stop_request_finishes_current_packet() {
    let sim = Sim::new();
    let sent = AtomicUsize::new(0);
    let mut index = 0usize;
    let mut source = move || {
        index += 1;
        match index % 4 {
            1 | 3 => TxData::Ok(Pulse::mark(263)),
            2 => TxData::Ok(Pulse::space(263)),
            _ => TxData::Done(Pulse::space(526)),
        }
    };
    let mut on_sent = || {
        sent.fetch_add(1, Ordering::Relaxed);
    };
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);
    port.set_tx_signal_sent_callback(&mut on_sent);

    port.start_async_tx(IR_CARRIER, 0.33);
    for _ in 0..37 {
        assert!(sim.step(&port));
    }
    assert_eq!(port.state(), EngineState::AsyncTx);

    let mut states = Vec::new();
    block_on(join(port.stop_async_tx(), drive(&sim, &port, &mut states)));

    let segments = sim.state().segments.clone();
    assert_eq!(segments.len() % 4, 0, "stopped mid-packet: {segments:?}");
    for packet in segments.chunks(4) {
        assert_eq!(packet, &[(true, 10), (false, 10), (true, 10), (false, 20)]);
    }
    assert_eq!(sent.load(Ordering::Relaxed), segments.len() / 4);
    assert_eq!(states.first(), Some(&EngineState::AsyncTxStopRequested));
    assert_eq!(states.last(), Some(&EngineState::AsyncTxStopped));
    assert_eq!(port.state(), EngineState::Idle);
}

#[test]
fn test_stop_after_final_samples_queued_lets_them_finish() {
    let sim = Sim::new();
    let mut source = once(vec![
        TxData::Ok(Pulse::mark(263)),
        TxData::Ok(Pulse::space(263)),
        TxData::LastDone(Pulse::mark(263)),
    ]);
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);

    port.start_async_tx(IR_CARRIER, 0.33);
    let mut states = Vec::new();
    block_on(join(port.stop_async_tx(), drive(&sim, &port, &mut states)));

    assert_eq!(sim.runs(), vec![(true, 10), (false, 10), (true, 10)]);
    assert_eq!(port.state(), EngineState::Idle);
}

#[test]
fn test_long_samples_split_and_conserve_cycles() {
    let sim = Sim::new();
    let mut source = once(vec![
        TxData::Ok(Pulse::mark(500)),
        TxData::Ok(Pulse::space(1_000_000)),
        TxData::LastDone(Pulse::space(200)),
    ]);
    let port: Port<'_> = SignalPort::new(sim.tx(), SimCapture::new(), CarrierLimits::SUB_GHZ);
    port.set_tx_data_callback(&mut source);

    port.start_async_tx(SUBGHZ_CARRIER, 0.5);
    let mut states = Vec::new();
    block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));

    let ticks = TickConverter::for_carrier(SUBGHZ_CARRIER);
    let mark = played_cycles(ticks.cycles(500));
    let space = played_cycles(ticks.cycles(1_000_000)) + played_cycles(ticks.cycles(200));
    assert_eq!(sim.runs(), vec![(true, mark), (false, space)]);
    assert!(!sim.output_is_mark());
    assert_eq!(
        states,
        vec![
            EngineState::AsyncTx,
            EngineState::AsyncTxLast,
            EngineState::AsyncTxStopInProgress,
            EngineState::AsyncTxStopped,
        ]
    );
    assert_eq!(port.state(), EngineState::Idle);
}

#[test]
fn test_level_duration_source_ends_on_end_marker() {
    let sim = Sim::new();
    let mut step = 0;
    let mut source = LevelDurationSource::new(move || {
        step += 1;
        match step {
            1 => LevelDuration::make(true, 263),
            2 => LevelDuration::make(false, 526),
            3 => LevelDuration::Reset,
            4 => LevelDuration::make(true, 263),
            _ => LevelDuration::End,
        }
    });
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);

    port.start_async_tx(IR_CARRIER, 0.33);
    let mut states = Vec::new();
    block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));

    assert_eq!(sim.runs(), vec![(true, 10), (false, 20), (true, 10)]);
}

// =============================================================================
// Callback Re-entry Tests
// =============================================================================

#[test]
fn test_signal_sent_callback_can_query_port() {
    let sim = Sim::new();
    let port = ir_port(&sim);
    let seen = Mutex::new(Vec::new());
    let mut on_sent = || seen.lock().unwrap().push((port.state(), port.last_tx_stats()));
    let mut source = once(vec![
        TxData::Done(Pulse::mark(263)),
        TxData::LastDone(Pulse::space(526)),
    ]);
    port.set_tx_data_callback(&mut source);
    port.set_tx_signal_sent_callback(&mut on_sent);

    port.start_async_tx(IR_CARRIER, 0.33);
    let mut states = Vec::new();
    block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|&(_, stats)| stats == TxStats::default()));
    assert_eq!(seen[0].0, EngineState::AsyncTxLast);
    assert_eq!(port.last_tx_stats(), TxStats { mark_us: 263, space_us: 526 });
}

#[test]
fn test_producer_can_query_port() {
    let sim = Sim::new();
    let port = ir_port(&sim);
    let mut calls = 0;
    let mut source = || {
        // previous session's stats stay readable while this one plays
        assert_eq!(port.last_tx_stats(), TxStats::default());
        calls += 1;
        if calls < 450 {
            TxData::Ok(Pulse::new(calls % 2 == 1, 263))
        } else {
            TxData::LastDone(Pulse::space(263))
        }
    };
    port.set_tx_data_callback(&mut source);

    port.start_async_tx(IR_CARRIER, 0.33);
    let mut states = Vec::new();
    block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));

    // refills past the first buffer ran from the half-transfer interrupt
    assert!(sim.calls().iter().filter(|c| matches!(c, TxCall::LoadPeriods(200))).count() >= 2);
    assert_eq!(sim.runs().len(), 450);
    assert_eq!(port.state(), EngineState::Idle);
}

#[test]
fn test_port_can_run_consecutive_sessions() {
    let sim = Sim::new();
    let mut index = 0usize;
    let mut source = move || {
        index += 1;
        if index % 2 == 1 {
            TxData::Ok(Pulse::mark(263))
        } else {
            TxData::LastDone(Pulse::space(263))
        }
    };
    let port = ir_port(&sim);
    port.set_tx_data_callback(&mut source);

    for session in 1..=2 {
        port.start_async_tx(IR_CARRIER, 0.33);
        let mut states = Vec::new();
        block_on(join(port.wait_tx_termination(), drive(&sim, &port, &mut states)));
        assert_eq!(port.state(), EngineState::Idle);
        assert_eq!(sim.runs().len(), session * 2);
    }
    let starts = sim.calls().iter().filter(|c| **c == TxCall::Start).count();
    assert_eq!(starts, 2);
}
