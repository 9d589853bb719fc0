//! Caching for compiled plural-rule expressions
//!
//! Plural selection is the hottest path in the runtime, so the compiled
//! expression trees are memoized keyed by the raw expression string.
//! Three backends are available: `none` recompiles on every call (for
//! debugging and benchmarks), `memoize` keeps an unbounded, eviction-free
//! map, and `lru` keeps a bounded map evicting the least-recently-used
//! entry. The backend and LRU capacity are read once at startup, either
//! from an explicit [`CacheConfig`] or from the environment.
//!
//! Caching never changes semantics: for a fixed backend and expression
//! string, `get_or_compile` always returns a tree that evaluates
//! identically to a fresh compile of that string.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::plural::{self, CompileError, PluralExpr, PluralRule};

/// Environment variable selecting the cache backend (`none`, `memoize`
/// or `lru`).
pub const BACKEND_ENV: &str = "POMO_PLURAL_CACHE";

/// Environment variable overriding the LRU capacity.
pub const CAPACITY_ENV: &str = "POMO_PLURAL_CACHE_CAPACITY";

/// Default LRU capacity.
pub const DEFAULT_LRU_CAPACITY: usize = 256;

/// Errors from cache configuration.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	#[error("unrecognized cache backend {0:?} (expected one of: none, memoize, lru)")]
	UnknownBackend(String),

	#[error("cache capacity must be a positive integer, got {0:?}")]
	InvalidCapacity(String),
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
	/// Always recompile; retain nothing.
	None,
	/// Unbounded map, entries persist for the process lifetime.
	Memoize,
	/// Bounded map with least-recently-used eviction.
	#[default]
	Lru,
}

impl std::str::FromStr for CacheBackend {
	type Err = ConfigError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"none" => Ok(Self::None),
			// "weak" is the historical name for the unbounded backend.
			"memoize" | "weak" => Ok(Self::Memoize),
			"lru" => Ok(Self::Lru),
			_ => Err(ConfigError::UnknownBackend(raw.to_string())),
		}
	}
}

/// Rule cache configuration.
///
/// # Examples
///
/// ```
/// use pomo::cache::{CacheBackend, CacheConfig, RuleCache};
///
/// let config = CacheConfig::new()
///     .with_backend(CacheBackend::Lru)
///     .with_capacity(64);
/// let cache = RuleCache::new(config).unwrap();
/// let expr = cache.get_or_compile("n != 1").unwrap();
/// assert_eq!(expr.evaluate(3).unwrap(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	backend: CacheBackend,
	capacity: usize,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			backend: CacheBackend::default(),
			capacity: DEFAULT_LRU_CAPACITY,
		}
	}
}

impl CacheConfig {
	/// Create a configuration with the default backend and capacity.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the backend.
	pub fn with_backend(mut self, backend: CacheBackend) -> Self {
		self.backend = backend;
		self
	}

	/// Set the LRU capacity. Only meaningful for [`CacheBackend::Lru`];
	/// validated by [`RuleCache::new`].
	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity;
		self
	}

	/// Read the configuration from `POMO_PLURAL_CACHE` and
	/// `POMO_PLURAL_CACHE_CAPACITY`, falling back to defaults for unset
	/// variables. Set-but-invalid values are configuration errors, never
	/// silent fallbacks.
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut config = Self::default();
		if let Ok(raw) = std::env::var(BACKEND_ENV) {
			config.backend = raw.parse()?;
		}
		if let Ok(raw) = std::env::var(CAPACITY_ENV) {
			let capacity: usize = raw
				.trim()
				.parse()
				.map_err(|_| ConfigError::InvalidCapacity(raw.clone()))?;
			if capacity == 0 {
				return Err(ConfigError::InvalidCapacity(raw));
			}
			config.capacity = capacity;
		}
		Ok(config)
	}

	/// The configured backend.
	pub fn backend(&self) -> CacheBackend {
		self.backend
	}

	/// The configured LRU capacity.
	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

#[derive(Debug)]
struct LruSlot {
	expr: Arc<PluralExpr>,
	last_used: u64,
}

#[derive(Debug)]
enum State {
	None,
	Memoize(HashMap<String, Arc<PluralExpr>>),
	Lru {
		entries: HashMap<String, LruSlot>,
		capacity: usize,
		tick: u64,
	},
}

/// Memoizing store for compiled plural expressions.
///
/// Safe to share across threads; concurrent `get_or_compile` calls for
/// the same expression may race to compile, but the first completed
/// insert wins and every caller receives a complete, valid tree.
#[derive(Debug)]
pub struct RuleCache {
	state: RwLock<State>,
}

impl Default for RuleCache {
	/// An LRU cache with the default capacity.
	fn default() -> Self {
		Self {
			state: RwLock::new(State::Lru {
				entries: HashMap::new(),
				capacity: DEFAULT_LRU_CAPACITY,
				tick: 0,
			}),
		}
	}
}

impl RuleCache {
	/// Build a cache from a configuration.
	///
	/// Returns [`ConfigError::InvalidCapacity`] for an `lru` backend
	/// with capacity zero.
	pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
		let state = match config.backend {
			CacheBackend::None => State::None,
			CacheBackend::Memoize => State::Memoize(HashMap::new()),
			CacheBackend::Lru => {
				if config.capacity == 0 {
					return Err(ConfigError::InvalidCapacity("0".to_string()));
				}
				State::Lru {
					entries: HashMap::new(),
					capacity: config.capacity,
					tick: 0,
				}
			}
		};
		Ok(Self {
			state: RwLock::new(state),
		})
	}

	/// Build a cache configured from the environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::new(CacheConfig::from_env()?)
	}

	/// The backend this cache was built with.
	pub fn backend(&self) -> CacheBackend {
		match self.state.read() {
			Ok(state) => match &*state {
				State::None => CacheBackend::None,
				State::Memoize(_) => CacheBackend::Memoize,
				State::Lru { .. } => CacheBackend::Lru,
			},
			Err(_) => CacheBackend::None,
		}
	}

	/// Number of retained entries.
	pub fn len(&self) -> usize {
		match self.state.read() {
			Ok(state) => match &*state {
				State::None => 0,
				State::Memoize(map) => map.len(),
				State::Lru { entries, .. } => entries.len(),
			},
			Err(_) => 0,
		}
	}

	/// Whether the cache retains no entries.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Return the compiled tree for an expression, compiling it on a
	/// miss. The raw expression string is the cache key.
	pub fn get_or_compile(&self, expr_src: &str) -> Result<Arc<PluralExpr>, CompileError> {
		if let Some(hit) = self.lookup(expr_src) {
			return Ok(hit);
		}
		// Compile outside the lock; racing callers may duplicate this
		// work but never observe a torn entry.
		let compiled = Arc::new(plural::compile(expr_src)?);
		Ok(self.insert(expr_src, compiled))
	}

	/// Parse a full `nplurals=..; plural=..` declaration, sourcing the
	/// expression tree from the cache.
	pub fn rule_from_declaration(&self, declaration: &str) -> Result<PluralRule, CompileError> {
		let (nplurals, expr_src) = plural::split_declaration(declaration)?;
		let expr = self.get_or_compile(expr_src)?;
		Ok(PluralRule::from_parts(nplurals, expr))
	}

	fn lookup(&self, expr_src: &str) -> Option<Arc<PluralExpr>> {
		// LRU lookups bump recency, so they need the write lock.
		match &*self.state.read().ok()? {
			State::None => return None,
			State::Memoize(map) => return map.get(expr_src).cloned(),
			State::Lru { .. } => {}
		}

		let mut state = self.state.write().ok()?;
		if let State::Lru { entries, tick, .. } = &mut *state {
			*tick += 1;
			let slot = entries.get_mut(expr_src)?;
			slot.last_used = *tick;
			return Some(Arc::clone(&slot.expr));
		}
		None
	}

	fn insert(&self, expr_src: &str, compiled: Arc<PluralExpr>) -> Arc<PluralExpr> {
		// A poisoned lock bypasses caching rather than panicking.
		let Ok(mut state) = self.state.write() else {
			return compiled;
		};
		match &mut *state {
			State::None => compiled,
			State::Memoize(map) => {
				// First writer wins under a compile race.
				Arc::clone(
					map.entry(expr_src.to_string())
						.or_insert(compiled),
				)
			}
			State::Lru {
				entries,
				capacity,
				tick,
			} => {
				*tick += 1;
				if let Some(slot) = entries.get_mut(expr_src) {
					slot.last_used = *tick;
					return Arc::clone(&slot.expr);
				}
				if entries.len() >= *capacity
					&& let Some(evict) = entries
						.iter()
						.min_by_key(|(_, slot)| slot.last_used)
						.map(|(key, _)| key.clone())
				{
					entries.remove(&evict);
				}
				entries.insert(
					expr_src.to_string(),
					LruSlot {
						expr: Arc::clone(&compiled),
						last_used: *tick,
					},
				);
				compiled
			}
		}
	}
}
