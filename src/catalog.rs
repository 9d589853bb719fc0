//! In-memory message catalog
//!
//! A [`Catalog`] maps msgids to resolved messages and owns the plural
//! rule extracted from the catalog header. It is built once from parsed
//! `.po` entries or decoded `.mo` bytes and is read-only from the
//! perspective of concurrent `gettext`/`ngettext` callers; mutation
//! (`bulk_update`, `merge`) takes `&mut self`, so the borrow checker
//! keeps mutation and concurrent reads apart.
//!
//! Lookup failures never panic and never raise: following the gettext
//! convention they echo the caller's literal strings, and the degraded
//! path emits a `tracing` diagnostic so it stays observable.

use std::collections::{BTreeMap, HashMap};

use crate::cache::RuleCache;
use crate::mo::{self, DecodeError, MoRecord};
use crate::plural::{CompileError, PluralRule};
use crate::po_parser::PoEntry;

/// Errors from catalog construction.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
	#[error("invalid Plural-Forms header: {0}")]
	InvalidPluralForms(#[from] CompileError),

	#[error(transparent)]
	Decode(#[from] DecodeError),
}

/// Errors from a plural-aware lookup, reported by
/// [`Catalog::ngettext_checked`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
	#[error("entry {msgid:?} has no plural variant {index}")]
	MissingPluralVariant { msgid: String, index: usize },

	#[error("plural rule failed for {msgid:?}: {source}")]
	PluralIndex {
		msgid: String,
		#[source]
		source: crate::plural::EvalError,
	},
}

/// A resolved message: the singular translation plus any plural
/// variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	msgid: String,
	singular: String,
	plural: Option<String>,
	translations: BTreeMap<usize, String>,
	comments: Vec<String>,
}

impl Message {
	/// The source-string key.
	pub fn msgid(&self) -> &str {
		&self.msgid
	}

	/// The singular translation (falls back to the msgid when the entry
	/// was untranslated).
	pub fn singular(&self) -> &str {
		&self.singular
	}

	/// The plural source string, when the entry declares plurals.
	pub fn plural(&self) -> Option<&str> {
		self.plural.as_deref()
	}

	/// Plural variants indexed by plural-form index.
	pub fn translations(&self) -> &BTreeMap<usize, String> {
		&self.translations
	}

	/// Raw comment lines carried by the source entry.
	pub fn comments(&self) -> &[String] {
		&self.comments
	}

	fn from_entry(entry: PoEntry) -> Self {
		let singular = match entry.msgstr {
			Some(msgstr) if !msgstr.is_empty() => msgstr,
			_ => entry.msgid.clone(),
		};
		Self {
			msgid: entry.msgid,
			singular,
			plural: entry.msgid_plural,
			translations: entry.msgstr_plural,
			comments: entry.comments,
		}
	}
}

/// In-memory translation table plus the resolved plural rule.
///
/// # Examples
///
/// ```
/// use pomo::catalog::Catalog;
/// use pomo::po_parser::PoEntry;
///
/// let catalog = Catalog::from_po_entries(vec![
///     PoEntry::singular("Hello", "Bonjour"),
///     PoEntry::plural("item", "items", ["article", "articles"]),
/// ]).unwrap();
///
/// assert_eq!(catalog.gettext("Hello"), "Bonjour");
/// assert_eq!(catalog.gettext("Missing"), "Missing");
/// assert_eq!(catalog.ngettext("item", "items", 1), "article");
/// assert_eq!(catalog.ngettext("item", "items", 5), "articles");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Catalog {
	messages: HashMap<String, Message>,
	header: BTreeMap<String, String>,
	header_raw: String,
	rule: PluralRule,
	explicit_rule: bool,
}

impl Catalog {
	/// An empty catalog with the universal plural rule.
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a catalog from parsed `.po` entries, compiling the plural
	/// rule without a cache.
	///
	/// Later entries overwrite earlier ones with the same msgid, the
	/// same last-write-wins rule [`Catalog::bulk_update`] applies.
	pub fn from_po_entries(entries: Vec<PoEntry>) -> Result<Self, BuildError> {
		let mut catalog = Self::new();
		catalog.apply_entries(entries, None)?;
		Ok(catalog)
	}

	/// Build a catalog from parsed `.po` entries, sourcing compiled
	/// plural expressions from the given cache.
	pub fn from_po_entries_with_cache(
		entries: Vec<PoEntry>,
		cache: &RuleCache,
	) -> Result<Self, BuildError> {
		let mut catalog = Self::new();
		catalog.apply_entries(entries, Some(cache))?;
		Ok(catalog)
	}

	/// Build a catalog from `.mo` bytes.
	pub fn from_mo_bytes(bytes: &[u8]) -> Result<Self, BuildError> {
		let records = mo::read_mo(bytes)?;
		Self::from_po_entries(records_to_entries(records))
	}

	/// Build a catalog from `.mo` bytes, using a rule cache.
	pub fn from_mo_bytes_with_cache(bytes: &[u8], cache: &RuleCache) -> Result<Self, BuildError> {
		let records = mo::read_mo(bytes)?;
		Self::from_po_entries_with_cache(records_to_entries(records), cache)
	}

	/// Merge another entry set into this catalog.
	///
	/// Entries overwrite whole messages by msgid, never field by field.
	/// The plural rule is re-derived only when the incoming set carries
	/// a header entry.
	pub fn bulk_update(&mut self, entries: Vec<PoEntry>) -> Result<(), BuildError> {
		self.apply_entries(entries, None)
	}

	/// Merge the messages of another catalog into this one; the other
	/// catalog wins on key conflicts. An explicit plural rule is
	/// inherited when this catalog still has the default.
	pub fn merge(&mut self, other: Catalog) {
		self.messages.extend(other.messages);
		if !self.explicit_rule && other.explicit_rule {
			self.rule = other.rule;
			self.header = other.header;
			self.header_raw = other.header_raw;
			self.explicit_rule = true;
		}
	}

	fn apply_entries(
		&mut self,
		entries: Vec<PoEntry>,
		cache: Option<&RuleCache>,
	) -> Result<(), BuildError> {
		for entry in entries {
			if entry.is_header() {
				self.load_header(&entry, cache)?;
				continue;
			}
			let message = Message::from_entry(entry);
			self.messages.insert(message.msgid.clone(), message);
		}
		Ok(())
	}

	fn load_header(&mut self, entry: &PoEntry, cache: Option<&RuleCache>) -> Result<(), BuildError> {
		// .mo plural-aware headers keep the body in msgstr_plural[0].
		let body = entry
			.msgstr
			.clone()
			.or_else(|| entry.msgstr_plural.get(&0).cloned())
			.unwrap_or_default();
		self.header = parse_header_fields(&body);
		self.header_raw = body;

		match self.header.get("Plural-Forms") {
			Some(declaration) => {
				self.rule = match cache {
					Some(cache) => cache.rule_from_declaration(declaration)?,
					None => PluralRule::parse(declaration)?,
				};
				self.explicit_rule = true;
			}
			None => {
				// Missing Plural-Forms is the one sanctioned default:
				// the universal two-form rule.
				self.rule = PluralRule::default();
				self.explicit_rule = false;
			}
		}
		Ok(())
	}

	/// Translate a msgid, echoing it back when untranslated.
	pub fn gettext<'a>(&'a self, msgid: &'a str) -> &'a str {
		let Some(message) = self.messages.get(msgid) else {
			return msgid;
		};
		if message.translations.is_empty() {
			return &message.singular;
		}
		message
			.translations
			.get(&0)
			.map_or(&message.singular, String::as_str)
	}

	/// Plural-aware translation.
	///
	/// Absent entries fall back to the literal arguments under the
	/// universal rule. A present entry whose plural rule faults, or
	/// which lacks the selected variant, degrades the same way and logs
	/// a warning; use [`Catalog::ngettext_checked`] to observe the
	/// failure directly.
	pub fn ngettext<'a>(&'a self, singular: &'a str, plural: &'a str, n: u64) -> &'a str {
		match self.ngettext_checked(singular, plural, n) {
			Ok(translated) => translated,
			Err(error) => {
				tracing::warn!(%error, n, "plural lookup degraded to literal arguments");
				if n == 1 { singular } else { plural }
			}
		}
	}

	/// Plural-aware translation, reporting degradation instead of
	/// silently falling back.
	pub fn ngettext_checked<'a>(
		&'a self,
		singular: &'a str,
		plural: &'a str,
		n: u64,
	) -> Result<&'a str, LookupError> {
		// The plural lookup key is the singular source string.
		let Some(message) = self.messages.get(singular) else {
			return Ok(if n == 1 { singular } else { plural });
		};
		let index = self
			.rule
			.plural_index(n)
			.map_err(|source| LookupError::PluralIndex {
				msgid: message.msgid.clone(),
				source,
			})?;
		message
			.translations
			.get(&index)
			.map(String::as_str)
			.ok_or_else(|| LookupError::MissingPluralVariant {
				msgid: message.msgid.clone(),
				index,
			})
	}

	/// Parsed header fields (`Language`, `Content-Type`, ...).
	pub fn header(&self) -> &BTreeMap<String, String> {
		&self.header
	}

	/// Raw header body, exactly as carried by the `msgid ""` entry.
	pub fn header_raw(&self) -> &str {
		&self.header_raw
	}

	/// The `Language` header field, when present.
	pub fn language(&self) -> Option<&str> {
		self.header.get("Language").map(String::as_str)
	}

	/// The catalog's plural rule (universal two-form when the header
	/// declared none).
	pub fn plural_rule(&self) -> &PluralRule {
		&self.rule
	}

	/// Number of plural forms the catalog's rule selects among.
	pub fn nplurals(&self) -> usize {
		self.rule.nplurals()
	}

	/// Look up a resolved message by msgid.
	pub fn get(&self, msgid: &str) -> Option<&Message> {
		self.messages.get(msgid)
	}

	/// Iterate over all resolved messages (header excluded).
	pub fn messages(&self) -> impl Iterator<Item = &Message> {
		self.messages.values()
	}

	/// Number of translatable messages.
	pub fn len(&self) -> usize {
		self.messages.len()
	}

	/// Whether the catalog holds no translatable messages.
	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}
}

/// Convert raw `.mo` records into entries, splitting NUL-joined plural
/// sets.
fn records_to_entries(records: Vec<MoRecord>) -> Vec<PoEntry> {
	records
		.into_iter()
		.map(|record| {
			if let Some((msgid, msgid_plural)) = record.msgid.split_once('\u{0}') {
				PoEntry {
					msgid: msgid.to_string(),
					msgid_plural: Some(msgid_plural.to_string()),
					msgstr: None,
					msgstr_plural: record
						.msgstr
						.split('\u{0}')
						.enumerate()
						.map(|(index, form)| (index, form.to_string()))
						.collect(),
					comments: Vec::new(),
				}
			} else {
				PoEntry {
					msgid: record.msgid,
					msgid_plural: None,
					msgstr: Some(record.msgstr),
					msgstr_plural: BTreeMap::new(),
					comments: Vec::new(),
				}
			}
		})
		.collect()
}

fn parse_header_fields(body: &str) -> BTreeMap<String, String> {
	let mut fields = BTreeMap::new();
	for line in body.lines() {
		if let Some((name, value)) = line.split_once(':') {
			let name = name.trim();
			if !name.is_empty() {
				fields.insert(name.to_string(), value.trim().to_string());
			}
		}
	}
	fields
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	const RUSSIAN_HEADER: &str = "Language: ru\nContent-Type: text/plain; charset=UTF-8\n\
		Plural-Forms: nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 \
		&& (n%100<10 || n%100>=20) ? 1 : 2);\n";

	fn header_entry(body: &str) -> PoEntry {
		PoEntry::singular("", body)
	}

	fn russian_catalog() -> Catalog {
		Catalog::from_po_entries(vec![
			header_entry(RUSSIAN_HEADER),
			PoEntry::plural(
				"%d file",
				"%d files",
				["%d файл", "%d файла", "%d файлов"],
			),
		])
		.unwrap()
	}

	#[test]
	fn gettext_returns_translation() {
		let catalog =
			Catalog::from_po_entries(vec![PoEntry::singular("Hello", "Bonjour")]).unwrap();
		assert_eq!(catalog.gettext("Hello"), "Bonjour");
	}

	#[test]
	fn gettext_echoes_missing_keys() {
		let catalog = Catalog::new();
		assert_eq!(catalog.gettext("Missing"), "Missing");
	}

	#[test]
	fn gettext_falls_back_to_msgid_for_empty_msgstr() {
		let catalog =
			Catalog::from_po_entries(vec![PoEntry::singular("Hello", "")]).unwrap();
		assert_eq!(catalog.gettext("Hello"), "Hello");
	}

	#[test]
	fn ngettext_uses_universal_rule_without_header() {
		let catalog = Catalog::new();
		assert_eq!(catalog.ngettext("apple", "apples", 1), "apple");
		assert_eq!(catalog.ngettext("apple", "apples", 3), "apples");
		assert_eq!(catalog.ngettext("apple", "apples", 0), "apples");
	}

	#[rstest]
	#[case(1, "%d файл")]
	#[case(2, "%d файла")]
	#[case(5, "%d файлов")]
	#[case(11, "%d файлов")]
	#[case(21, "%d файл")]
	fn ngettext_follows_the_header_rule(#[case] n: u64, #[case] expected: &str) {
		let catalog = russian_catalog();
		assert_eq!(catalog.ngettext("%d file", "%d files", n), expected);
	}

	#[test]
	fn ngettext_plural_key_is_the_singular() {
		let catalog = russian_catalog();
		// Looking up by the plural source string misses the entry.
		assert_eq!(catalog.ngettext("%d files", "%d files!", 1), "%d files");
	}

	#[test]
	fn missing_variant_degrades_to_literals() {
		let catalog = Catalog::from_po_entries(vec![
			header_entry(RUSSIAN_HEADER),
			PoEntry::plural("%d file", "%d files", ["%d файл", "%d файла"]),
		])
		.unwrap();
		// Index 2 is missing: degrade, do not panic.
		assert_eq!(catalog.ngettext("%d file", "%d files", 5), "%d files");
		assert_eq!(
			catalog.ngettext_checked("%d file", "%d files", 5),
			Err(LookupError::MissingPluralVariant {
				msgid: "%d file".to_string(),
				index: 2
			})
		);
	}

	#[test]
	fn out_of_range_rule_result_degrades() {
		// A rule that maps every n >= 2 outside [0, nplurals).
		let catalog = Catalog::from_po_entries(vec![
			header_entry("Plural-Forms: nplurals=2; plural=n;\n"),
			PoEntry::plural("a", "as", ["x", "y"]),
		])
		.unwrap();
		assert_eq!(catalog.ngettext("a", "as", 1), "y");
		assert_eq!(catalog.ngettext("a", "as", 7), "as");
		assert!(matches!(
			catalog.ngettext_checked("a", "as", 7),
			Err(LookupError::PluralIndex { .. })
		));
	}

	#[test]
	fn invalid_plural_forms_is_a_build_error() {
		let result = Catalog::from_po_entries(vec![header_entry(
			"Plural-Forms: nplurals=2; plural=(n / 2);\n",
		)]);
		assert!(matches!(result, Err(BuildError::InvalidPluralForms(_))));
	}

	#[test]
	fn header_fields_are_parsed() {
		let catalog = russian_catalog();
		assert_eq!(catalog.language(), Some("ru"));
		assert_eq!(
			catalog.header().get("Content-Type").map(String::as_str),
			Some("text/plain; charset=UTF-8")
		);
		assert_eq!(catalog.nplurals(), 3);
	}

	#[test]
	fn header_is_not_a_translatable_key() {
		let catalog = russian_catalog();
		assert!(catalog.get("").is_none());
		assert_eq!(catalog.gettext(""), "");
	}

	#[test]
	fn duplicate_msgids_last_write_wins() {
		let catalog = Catalog::from_po_entries(vec![
			PoEntry::singular("key", "first"),
			PoEntry::singular("key", "second"),
		])
		.unwrap();
		assert_eq!(catalog.gettext("key"), "second");
		assert_eq!(catalog.len(), 1);
	}

	#[test]
	fn bulk_update_overwrites_whole_entries() {
		let mut catalog = Catalog::from_po_entries(vec![PoEntry::plural(
			"item",
			"items",
			["article", "articles"],
		)])
		.unwrap();
		catalog
			.bulk_update(vec![PoEntry::singular("item", "élément")])
			.unwrap();
		// The plural variants are gone; the overwrite is not field-wise.
		let message = catalog.get("item").unwrap();
		assert!(message.translations().is_empty());
		assert_eq!(catalog.gettext("item"), "élément");
	}

	#[test]
	fn bulk_update_rederives_rule_only_with_new_header() {
		let mut catalog = russian_catalog();
		catalog
			.bulk_update(vec![PoEntry::singular("Hello", "Привет")])
			.unwrap();
		assert_eq!(catalog.nplurals(), 3);

		catalog
			.bulk_update(vec![header_entry(
				"Plural-Forms: nplurals=2; plural=(n != 1);\n",
			)])
			.unwrap();
		assert_eq!(catalog.nplurals(), 2);
	}

	#[test]
	fn merge_prefers_other_on_conflict_and_inherits_rule() {
		let mut base = Catalog::from_po_entries(vec![PoEntry::singular("key", "mine")])
			.unwrap();
		let other = Catalog::from_po_entries(vec![
			header_entry(RUSSIAN_HEADER),
			PoEntry::singular("key", "theirs"),
		])
		.unwrap();
		base.merge(other);
		assert_eq!(base.gettext("key"), "theirs");
		assert_eq!(base.nplurals(), 3);
	}

	#[test]
	fn merge_keeps_existing_explicit_rule() {
		let mut base = Catalog::from_po_entries(vec![header_entry(RUSSIAN_HEADER)]).unwrap();
		let other = Catalog::from_po_entries(vec![header_entry(
			"Plural-Forms: nplurals=2; plural=(n != 1);\n",
		)])
		.unwrap();
		base.merge(other);
		assert_eq!(base.nplurals(), 3);
	}

	#[test]
	fn mo_roundtrip_reconstructs_the_catalog() {
		let original = russian_catalog();
		let bytes = mo::write_mo(&original);
		let reloaded = Catalog::from_mo_bytes(&bytes).unwrap();

		assert_eq!(reloaded.nplurals(), 3);
		assert_eq!(reloaded.language(), Some("ru"));
		for n in [1, 2, 5, 11, 21] {
			assert_eq!(
				reloaded.ngettext("%d file", "%d files", n),
				original.ngettext("%d file", "%d files", n),
				"n={n}"
			);
		}
	}

	#[test]
	fn construction_with_cache_matches_ad_hoc_compile() {
		let cache = RuleCache::new(crate::cache::CacheConfig::new()).unwrap();
		let entries = || {
			vec![
				header_entry(RUSSIAN_HEADER),
				PoEntry::plural("%d file", "%d files", ["a", "b", "c"]),
			]
		};
		let cached = Catalog::from_po_entries_with_cache(entries(), &cache).unwrap();
		let plain = Catalog::from_po_entries(entries()).unwrap();
		for n in 0..200 {
			assert_eq!(
				cached.plural_rule().plural_index(n),
				plain.plural_rule().plural_index(n)
			);
		}
		assert_eq!(cache.len(), 1);
	}
}
