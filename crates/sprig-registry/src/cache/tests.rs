//! Unit tests for the version-list cache

use super::*;

fn name(s: &str) -> PackageName {
    PackageName::new(s).unwrap()
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn listing() -> BTreeMap<Version, String> {
    [("2.31", "2.31"), ("2.32.3", "2.32.3"), ("3.0rc1", "3.0rc1")]
        .into_iter()
        .map(|(version, spelling)| (v(version), spelling.to_string()))
        .collect()
}

#[test]
fn test_cache_entry_creation() {
    let entry = CacheEntry::new(listing());

    assert_eq!(entry.versions.len(), 3);
    assert_eq!(entry.ttl, Duration::from_secs(3600)); // 1 hour default
    assert!(entry.is_fresh());
}

#[test]
fn test_insert_and_get() {
    let cache = MetadataCache::new();
    cache.insert(name("requests"), listing());

    assert_eq!(
        cache.get(&name("Requests")),
        Some(vec![v("2.31.0"), v("2.32.3"), v("3.0.0-rc.1")])
    );
    assert_eq!(cache.get(&name("urllib3")), None);
}

#[test]
fn test_spelling_is_the_listed_one() {
    let cache = MetadataCache::new();
    cache.insert(name("requests"), listing());

    assert_eq!(
        cache.spelling(&name("requests"), &v("2.31.0")).as_deref(),
        Some("2.31")
    );
    assert_eq!(
        cache.spelling(&name("requests"), &v("3.0.0-rc.1")).as_deref(),
        Some("3.0rc1")
    );
    assert_eq!(cache.spelling(&name("requests"), &v("1.0")), None);
    assert_eq!(cache.spelling(&name("idna"), &v("3.7")), None);
}

#[test]
fn test_expired_entries_are_evicted_on_read() {
    let cache = MetadataCache::new();
    let mut entry = CacheEntry::new(listing());
    entry.ttl = Duration::ZERO;
    cache.cache.insert(name("requests"), entry);

    assert_eq!(cache.spelling(&name("requests"), &v("2.31")), None);
    assert!(cache.cache.is_empty());
    assert_eq!(cache.get(&name("requests")), None);
}
