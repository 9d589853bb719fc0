//! Process-wide default catalog and loader conveniences
//!
//! This is the thin top layer over the core: a default catalog behind a
//! `RwLock`, `gettext`/`ngettext` free functions against it, and
//! `translation()`, which walks `<localedir>/<lang>/LC_MESSAGES/` for
//! `.mo` (preferred) or `.po` files and merges what it finds. The
//! shared rule cache lives here too; core construction APIs take a
//! cache by reference instead of reaching for a global.

use std::path::Path;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::cache::{CacheConfig, RuleCache};
use crate::catalog::{BuildError, Catalog};
use crate::mo::DecodeError;
use crate::po_parser::{self, PoParseError};

/// Errors from loading catalog files.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("failed to read catalog file: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to decode .mo catalog: {0}")]
	Decode(#[from] DecodeError),

	#[error("failed to parse .po catalog: {0}")]
	Parse(#[from] PoParseError),

	#[error("failed to build catalog: {0}")]
	Build(#[from] BuildError),
}

static DEFAULT_CATALOG: Lazy<RwLock<Arc<Catalog>>> =
	Lazy::new(|| RwLock::new(Arc::new(Catalog::new())));

static DEFAULT_RULE_CACHE: Lazy<RuleCache> = Lazy::new(|| {
	let config = CacheConfig::from_env().unwrap_or_else(|error| {
		// Lazy can't propagate the error; applications wanting a hard
		// startup failure call RuleCache::from_env() themselves.
		tracing::error!(%error, "invalid rule cache configuration, using defaults");
		CacheConfig::default()
	});
	match RuleCache::new(config) {
		Ok(cache) => cache,
		Err(error) => {
			tracing::error!(%error, "invalid rule cache configuration, using defaults");
			RuleCache::default()
		}
	}
});

/// The process-wide rule cache used by the convenience entry points.
pub fn default_rule_cache() -> &'static RuleCache {
	&DEFAULT_RULE_CACHE
}

/// Install a catalog as the process-wide default, returning the
/// previous one.
pub fn set_default_catalog(catalog: Catalog) -> Arc<Catalog> {
	let next = Arc::new(catalog);
	match DEFAULT_CATALOG.write() {
		Ok(mut current) => std::mem::replace(&mut *current, next),
		Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
	}
}

fn default_catalog() -> Arc<Catalog> {
	match DEFAULT_CATALOG.read() {
		Ok(current) => Arc::clone(&current),
		Err(poisoned) => Arc::clone(&poisoned.into_inner()),
	}
}

/// Translate `msgid` against the default catalog.
pub fn gettext(msgid: &str) -> String {
	default_catalog().gettext(msgid).to_string()
}

/// Plural-aware translation against the default catalog.
pub fn ngettext(singular: &str, plural: &str, n: u64) -> String {
	default_catalog().ngettext(singular, plural, n).to_string()
}

/// Load translations for a domain from a locale directory.
///
/// For each language, `<localedir>/<lang>/LC_MESSAGES/<domain>.mo` is
/// tried first, then the `.po` source. Languages with neither file are
/// skipped; I/O and format errors propagate immediately, with no
/// retries.
///
/// # Examples
///
/// ```no_run
/// use pomo::translation::translation;
///
/// let catalog = translation("myapp", "./locale", &["ru", "en"]).unwrap();
/// println!("{}", catalog.gettext("Hello"));
/// ```
pub fn translation(
	domain: &str,
	localedir: impl AsRef<Path>,
	languages: &[&str],
) -> Result<Catalog, LoadError> {
	let cache = default_rule_cache();
	let mut catalog = Catalog::new();

	for lang in languages {
		let messages_dir = localedir.as_ref().join(lang).join("LC_MESSAGES");

		let mo_path = messages_dir.join(format!("{domain}.mo"));
		if mo_path.is_file() {
			let bytes = std::fs::read(&mo_path)?;
			catalog.merge(Catalog::from_mo_bytes_with_cache(&bytes, cache)?);
			continue;
		}

		let po_path = messages_dir.join(format!("{domain}.po"));
		if po_path.is_file() {
			let file = std::fs::File::open(&po_path)?;
			let entries = po_parser::parse_po_reader(file)?;
			catalog.merge(Catalog::from_po_entries_with_cache(entries, cache)?);
		}
	}

	Ok(catalog)
}
