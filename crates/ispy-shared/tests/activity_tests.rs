//! Activity log capacity and ordering tests.

use ispy_shared::activity::{ActivityItem, ActivityKind, ActivityLog};

fn item(n: usize) -> ActivityItem {
    ActivityItem::new(format!("entry {}", n), "", ActivityKind::Info)
}

#[test]
fn test_log_never_exceeds_capacity() {
    let mut log = ActivityLog::new(10);
    for n in 0..25 {
        log.push(item(n));
        assert!(log.len() <= 10);
    }
    assert_eq!(log.len(), 10);
}

#[test]
fn test_eleventh_insert_evicts_oldest() {
    let mut log = ActivityLog::new(10);
    for n in 1..=10 {
        log.push(item(n));
    }
    assert!(log.iter().any(|i| i.title == "entry 1"));

    log.push(item(11));

    assert_eq!(log.len(), 10);
    assert!(!log.iter().any(|i| i.title == "entry 1"));
    let titles: Vec<String> = log.iter().map(|i| i.title.clone()).collect();
    let expected: Vec<String> = (2..=11).rev().map(|n| format!("entry {}", n)).collect();
    assert_eq!(titles, expected);
}

#[test]
fn test_clear() {
    let mut log = ActivityLog::default();
    log.push(item(1));
    log.clear();
    assert!(log.is_empty());
    assert_eq!(log.capacity(), 10);
}
