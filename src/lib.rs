//! GNU gettext catalog runtime
//!
//! `pomo` loads gettext-style message catalogs — `.po` text sources and
//! binary `.mo` files — resolves translated strings by key, and selects
//! among plural variants using the per-locale rule declared in the
//! catalog's `Plural-Forms` header. Plural expressions are compiled
//! into a closed AST and interpreted; catalog headers are data, never
//! code, so untrusted files cannot inject behavior.
//!
//! # Example
//!
//! ```
//! use pomo::{Catalog, PoEntry};
//!
//! let catalog = Catalog::from_po_entries(vec![
//!     PoEntry::singular(
//!         "",
//!         "Language: ru\nPlural-Forms: nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 \
//!          : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2);\n",
//!     ),
//!     PoEntry::plural("%d file", "%d files", ["%d файл", "%d файла", "%d файлов"]),
//! ]).unwrap();
//!
//! assert_eq!(catalog.ngettext("%d file", "%d files", 21), "%d файл");
//! assert_eq!(catalog.ngettext("%d file", "%d files", 5), "%d файлов");
//! ```

pub mod cache;
pub mod catalog;
pub mod mo;
pub mod plural;
pub mod po_parser;
pub mod translation;

pub use cache::{CacheBackend, CacheConfig, ConfigError, RuleCache};
pub use catalog::{BuildError, Catalog, LookupError, Message};
pub use mo::{DecodeError, MoRecord, read_mo, write_mo, write_mo_file};
pub use plural::{CompileError, EvalError, PluralExpr, PluralRule, compile};
pub use po_parser::{PoEntry, PoParseError, parse_po_reader, parse_po_str};
pub use translation::{
	LoadError, default_rule_cache, gettext, ngettext, set_default_catalog, translation,
};
