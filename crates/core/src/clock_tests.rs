// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::epoch();
    assert_eq!(clock.epoch_ms(), 0);
    clock.advance(Duration::milliseconds(1500));
    assert_eq!(clock.epoch_ms(), 1500);
}

#[test]
fn iso_is_rfc3339_utc() {
    let clock = FakeClock::epoch();
    assert_eq!(clock.iso(), "1970-01-01T00:00:00.000Z");
}

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.epoch_ms();
    let b = clock.epoch_ms();
    assert!(b >= a);
}
