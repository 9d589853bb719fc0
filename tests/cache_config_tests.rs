//! Environment-driven cache configuration
//!
//! These tests mutate process environment variables, so they are
//! serialized on a shared key.

use pomo::cache::{BACKEND_ENV, CAPACITY_ENV, CacheBackend, CacheConfig, ConfigError, RuleCache};
use serial_test::serial;

struct EnvGuard {
	keys: Vec<&'static str>,
}

impl EnvGuard {
	fn set(pairs: &[(&'static str, &str)]) -> Self {
		for (key, value) in pairs {
			// SAFETY: tests on this key are serialized, so no other
			// thread touches the environment concurrently.
			unsafe { std::env::set_var(key, value) };
		}
		Self {
			keys: pairs.iter().map(|(key, _)| *key).collect(),
		}
	}
}

impl Drop for EnvGuard {
	fn drop(&mut self) {
		for key in &self.keys {
			unsafe { std::env::remove_var(key) };
		}
	}
}

#[test]
#[serial(cache_env)]
fn defaults_apply_when_env_is_unset() {
	let _guard = EnvGuard::set(&[]);
	unsafe {
		std::env::remove_var(BACKEND_ENV);
		std::env::remove_var(CAPACITY_ENV);
	}
	let config = CacheConfig::from_env().unwrap();
	assert_eq!(config.backend(), CacheBackend::Lru);
	assert_eq!(config.capacity(), 256);
}

#[test]
#[serial(cache_env)]
fn backend_and_capacity_are_read_from_env() {
	let _guard = EnvGuard::set(&[(BACKEND_ENV, "memoize"), (CAPACITY_ENV, "32")]);
	let config = CacheConfig::from_env().unwrap();
	assert_eq!(config.backend(), CacheBackend::Memoize);
	assert_eq!(config.capacity(), 32);
}

#[test]
#[serial(cache_env)]
fn legacy_weak_spelling_is_accepted() {
	let _guard = EnvGuard::set(&[(BACKEND_ENV, "weak")]);
	let config = CacheConfig::from_env().unwrap();
	assert_eq!(config.backend(), CacheBackend::Memoize);
}

#[test]
#[serial(cache_env)]
fn unknown_backend_is_an_error_not_a_fallback() {
	let _guard = EnvGuard::set(&[(BACKEND_ENV, "redis")]);
	assert!(matches!(
		CacheConfig::from_env(),
		Err(ConfigError::UnknownBackend(value)) if value == "redis"
	));
}

#[test]
#[serial(cache_env)]
fn zero_capacity_is_an_error() {
	let _guard = EnvGuard::set(&[(CAPACITY_ENV, "0")]);
	assert!(matches!(
		CacheConfig::from_env(),
		Err(ConfigError::InvalidCapacity(_))
	));
}

#[test]
#[serial(cache_env)]
fn negative_capacity_is_an_error() {
	let _guard = EnvGuard::set(&[(CAPACITY_ENV, "-4")]);
	assert!(matches!(
		CacheConfig::from_env(),
		Err(ConfigError::InvalidCapacity(_))
	));
}

#[test]
#[serial(cache_env)]
fn from_env_builds_a_working_cache() {
	let _guard = EnvGuard::set(&[(BACKEND_ENV, "lru"), (CAPACITY_ENV, "2")]);
	let cache = RuleCache::from_env().unwrap();

	cache.get_or_compile("n == 1").unwrap();
	cache.get_or_compile("n == 2").unwrap();
	cache.get_or_compile("n == 3").unwrap();
	assert_eq!(cache.len(), 2);
}
