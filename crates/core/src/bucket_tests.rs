// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    pending  = { Bucket::Pending, "pending" },
    current  = { Bucket::Current, "current" },
    complete = { Bucket::Complete, "complete" },
    rejected = { Bucket::Rejected, "rejected" },
)]
fn dir_name_round_trips(bucket: Bucket, name: &str) {
    assert_eq!(bucket.dir_name(), name);
    assert_eq!(name.parse::<Bucket>().unwrap(), bucket);
    assert_eq!(bucket.to_string(), name);
}

#[test]
fn flat_buckets() {
    assert!(Bucket::Pending.is_flat());
    assert!(Bucket::Rejected.is_flat());
    assert!(!Bucket::Current.is_flat());
    assert!(!Bucket::Complete.is_flat());
}

#[test]
fn unknown_bucket_errors() {
    assert!("archive".parse::<Bucket>().is_err());
}
