//! Integration tests demonstrating the testing utilities.

use ironstream::testing::*;
use ironstream::*;
use std::collections::BTreeMap;

#[test]
fn test_builder_split_keeps_every_record() {
    let parts = RecordBundleBuilder::<u8>::new().every(0, 5, &[1, 2, 3, 4, 5, 6, 7]).build_split(3);
    assert_eq!(parts.len(), 3);
    assert_eq!(parts.iter().map(|b| b.len()).sum::<usize>(), 7);
    assert_eq!(parts[0].min_ts(), 0);
    assert_eq!(parts[1].min_ts(), 5);
}

#[test]
fn test_split_into_more_parts_than_records() {
    let parts = split_round_robin(records_at(&[1]).records().to_vec(), 4);
    assert_eq!(parts.len(), 4);
    assert_eq!(parts.iter().filter(|b| b.is_empty()).count(), 3);
}

#[test]
fn test_unordered_comparison() {
    assert_collections_unordered_equal(&[3, 1, 2, 1], &[1, 1, 2, 3]);
}

#[test]
#[should_panic(expected = "Collection content mismatch")]
fn test_unordered_comparison_counts_duplicates() {
    assert_collections_unordered_equal(&[1, 1, 2], &[1, 2, 2]);
}

#[test]
#[should_panic(expected = "Window set mismatch")]
fn test_windows_equal_detects_missing_window() {
    let actual = BTreeMap::from([(Window::new(0, 10), vec![1])]);
    assert_windows_equal(&actual, &[(Window::new(0, 10), vec![1]), (Window::new(10, 10), vec![2])]);
}

#[test]
fn test_word_records_fixture() {
    let words = word_records("Hello hello world", 100, 10);
    let ts: Vec<i64> = words.iter().map(|r| r.ts).collect();
    assert_eq!(ts, vec![100, 110, 120]);
    assert_eq!(words.records()[1].value, ("hello".to_string(), 1));
}

#[test]
fn test_ip_flow_fixture() {
    let flows = ip_flow_records(10, 3, 1_000);
    let pairs: std::collections::HashSet<IpPair> = flows.iter().map(|r| r.value.0).collect();
    assert_eq!(pairs.len(), 3);
    assert_eq!(flows.min_ts(), 1_000);
    assert_eq!(IpPair::new([10, 0, 0, 1], [192, 168, 1, 1]).to_string(), "10.0.0.1->192.168.1.1");
}
