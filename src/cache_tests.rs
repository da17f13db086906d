use super::*;
use crate::conditions::{Conditions, Threshold};
use crate::time::ManualClock;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Fd {
    id: u32,
    stuck: bool,
}

impl Fd {
    fn ok(id: u32) -> Self { Self { id, stuck: false } }
    fn stuck(id: u32) -> Self { Self { id, stuck: true } }
}

impl Openable for Fd {
    fn close(&mut self) -> Result<(), CloseError> {
        if self.stuck { Err(CloseError::Other(format!("fd {} busy", self.id))) } else { Ok(()) }
    }
}

fn cache_at_epoch() -> (Arc<ManualClock>, DescriptorCache<String, Fd>) {
    let clock = Arc::new(ManualClock::at_epoch());
    let cache = DescriptorCache::with_clock(clock.clone());
    (clock, cache)
}

#[test]
fn insert_reports_new_replaced_unchanged() {
    let (_clock, cache) = cache_at_epoch();
    assert!(cache.insert("a".into(), Fd::ok(1)).inserted.is_new());
    assert!(cache.insert("a".into(), Fd::ok(1)).inserted.is_unchanged());
    match cache.insert("a".into(), Fd::ok(2)).inserted {
        Inserted::Replaced(old) => assert_eq!(old.id, 1),
        other => panic!("expected replace, got {:?}", other),
    }
    assert_eq!(cache.len(), 1);
}

#[test]
fn on_insert_pass_evicts_old_entries() {
    let (clock, cache) = cache_at_epoch();
    let cache = cache.with_policy(AutoclosePolicy::new(Conditions::older_than(Duration::from_secs(60))), true);

    cache.insert("a".into(), Fd::ok(1));
    clock.set_secs(30);
    cache.insert("b".into(), Fd::ok(2));
    clock.set_secs(100);
    let outcome = cache.insert("c".into(), Fd::ok(3));

    let report = outcome.autoclose.expect("pass ran").unwrap();
    assert_eq!(report.closed_keys, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains_key("c"));
}

#[test]
fn no_pass_without_insert_trigger() {
    let (clock, cache) = cache_at_epoch();
    let cache = cache.with_policy(AutoclosePolicy::new(Conditions::older_than(Duration::from_secs(1))), false);
    cache.insert("a".into(), Fd::ok(1));
    clock.set_secs(10);
    let outcome = cache.insert("b".into(), Fd::ok(2));
    assert!(outcome.autoclose.is_none());
    assert_eq!(cache.len(), 2);

    let report = cache.autoclose().unwrap().unwrap();
    assert_eq!(report.closed_keys, vec!["a".to_string()]);
}

#[test]
fn bad_bounds_on_insert_keep_the_entry() {
    let (_clock, cache) = cache_at_epoch();
    let policy = AutoclosePolicy::new(Conditions::older_than(Duration::ZERO))
        .with_bounds(Threshold::Count(5), Threshold::Fraction(0.5))
        .unwrap();
    let cache = cache.with_policy(policy, true);
    let outcome = cache.insert("a".into(), Fd::ok(1));
    assert_eq!(outcome.autoclose_error().map(|e| e.code()), Some("invalid_bounds"));
    assert!(cache.contains_key("a"));
}

#[test]
fn bad_bounds_on_insert_still_hand_back_the_replaced_value() {
    let (_clock, cache) = cache_at_epoch();
    let policy = AutoclosePolicy::new(Conditions::older_than(Duration::ZERO))
        .with_bounds(Threshold::Count(5), Threshold::Fraction(0.5))
        .unwrap();
    let cache = cache.with_policy(policy, true);
    cache.insert("a".into(), Fd::ok(1));

    let outcome = cache.insert("a".into(), Fd::ok(2));
    assert!(outcome.autoclose_error().is_some());
    match outcome.inserted {
        Inserted::Replaced(old) => assert_eq!(old.id, 1),
        other => panic!("expected replace, got {:?}", other),
    }
    assert_eq!(cache.lookup("a").map(|f| f.id), Some(2));
}

#[test]
fn policy_can_be_swapped_and_cleared() {
    let (_clock, cache) = cache_at_epoch();
    assert!(cache.policy().is_none());
    assert!(cache.autoclose().unwrap().is_none());

    let policy = AutoclosePolicy::new(Conditions::newer_than(Duration::from_secs(5)));
    cache.set_policy(Some(policy.clone()));
    assert_eq!(cache.policy(), Some(policy));
    cache.clear_policy();
    assert!(cache.policy().is_none());

    cache.set_autoclose_on_insert(true);
    assert!(cache.autoclose_on_insert());
}

#[test]
fn close_keeps_failures_registered() {
    let (_clock, cache) = cache_at_epoch();
    cache.insert("ok".into(), Fd::ok(1));
    cache.insert("busy".into(), Fd::stuck(2));

    assert!(cache.close("ok").unwrap().is_ok());
    assert!(!cache.contains_key("ok"));

    let err = cache.close("busy").unwrap().unwrap_err();
    assert_eq!(err.code(), "close_failed");
    assert!(cache.contains_key("busy"));

    assert!(cache.close("missing").is_none());
}

#[test]
fn close_all_is_best_effort() {
    let (_clock, cache) = cache_at_epoch();
    cache.insert("a".into(), Fd::ok(1));
    cache.insert("b".into(), Fd::stuck(2));
    cache.insert("c".into(), Fd::ok(3));

    let report = cache.close_all();
    assert_eq!(report.candidates, 3);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.closed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.closed_keys, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains_key("b"));
}

#[test]
fn snapshot_orders_by_priority() {
    let (clock, cache) = cache_at_epoch();
    for (i, k) in ["a", "b", "c"].iter().enumerate() {
        clock.set_secs(i as i64 * 10);
        cache.insert(k.to_string(), Fd::ok(i as u32));
    }
    clock.set_secs(30);
    assert_eq!(cache.lookup("a").map(|f| f.id), Some(0));

    let added: Vec<String> = cache.snapshot(Priority::Added).into_iter().map(|i| i.key).collect();
    assert_eq!(added, vec!["a", "b", "c"]);

    let used = cache.snapshot(Priority::Used);
    let keys: Vec<&str> = used.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["b", "c", "a"]);
    let positions: Vec<usize> = used.iter().map(|i| i.position).collect();
    assert_eq!(positions, vec![1, 2, 0]);
}

#[test]
fn info_reports_position_and_times() {
    let (clock, cache) = cache_at_epoch();
    cache.insert("a".into(), Fd::ok(1));
    clock.set_secs(10);
    let t_b = clock.now();
    cache.insert("b".into(), Fd::ok(2));
    clock.set_secs(20);
    cache.with_value("b", |f| f.id).unwrap();

    let info = cache.info("b").unwrap();
    assert_eq!(info.position, 1);
    assert_eq!(info.added_at, t_b);
    assert_eq!(info.used_at, clock.now());
    assert!(cache.info("zzz").is_none());

    cache.remove("a").unwrap();
    assert_eq!(cache.info("b").unwrap().position, 0);
}

#[test]
fn from_config_wires_policy_and_trigger() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_epoch());

    let cache: DescriptorCache<String, Fd> = DescriptorCache::from_config(&AutocloseConfig::default(), clock.clone()).unwrap();
    assert!(cache.policy().is_some());
    assert!(cache.autoclose_on_insert());

    let off = AutocloseConfig { enabled: false, ..Default::default() };
    let cache: DescriptorCache<String, Fd> = DescriptorCache::from_config(&off, clock.clone()).unwrap();
    assert!(cache.policy().is_none());
    assert!(!cache.autoclose_on_insert());

    let inverted = AutocloseConfig { min: 4.0, max: 1.0, ..Default::default() };
    let err = DescriptorCache::<String, Fd>::from_config(&inverted, clock).unwrap_err();
    assert_eq!(err.code(), "invalid_bounds");
}

#[test]
fn with_registry_exposes_positional_access() {
    let (_clock, cache) = cache_at_epoch();
    cache.insert("a".into(), Fd::ok(1));
    cache.insert("b".into(), Fd::ok(2));
    let first = cache.with_registry(|reg| reg.at(0).0.clone());
    assert_eq!(first, "a");
    let removed = cache.with_registry(|reg| reg.remove_at(0));
    assert_eq!(removed.0, "a");
    assert_eq!(cache.len(), 1);
}
