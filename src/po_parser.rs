//! Gettext `.po` text catalog parser
//!
//! Parses the human-editable catalog format into [`PoEntry`] records:
//! keyword lines (`msgid`, `msgid_plural`, `msgstr`, `msgstr[N]`),
//! multiline string continuations, and the usual escape sequences.
//! Comment lines are collected verbatim on the entry they precede; the
//! runtime never interprets them.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

/// Errors from `.po` parsing.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PoParseError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("syntax error at line {line}: {message}")]
	Syntax { line: usize, message: String },
}

/// One translatable unit as written in a `.po` file.
///
/// Exactly one of `msgstr` or a non-empty `msgstr_plural` is populated
/// for well-formed entries; the catalog builder enforces the
/// distinction. `msgid == ""` is the header entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoEntry {
	pub msgid: String,
	pub msgid_plural: Option<String>,
	pub msgstr: Option<String>,
	pub msgstr_plural: BTreeMap<usize, String>,
	pub comments: Vec<String>,
}

impl PoEntry {
	/// A singular entry.
	pub fn singular(msgid: impl Into<String>, msgstr: impl Into<String>) -> Self {
		Self {
			msgid: msgid.into(),
			msgstr: Some(msgstr.into()),
			..Self::default()
		}
	}

	/// A plural entry with variants indexed from zero.
	pub fn plural(
		msgid: impl Into<String>,
		msgid_plural: impl Into<String>,
		forms: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			msgid: msgid.into(),
			msgid_plural: Some(msgid_plural.into()),
			msgstr_plural: forms
				.into_iter()
				.enumerate()
				.map(|(index, form)| (index, form.into()))
				.collect(),
			..Self::default()
		}
	}

	/// Whether this is the header entry (`msgid == ""`).
	pub fn is_header(&self) -> bool {
		self.msgid.is_empty()
	}
}

/// Which string the next bare continuation line appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
	Msgid,
	MsgidPlural,
	Msgstr,
	MsgstrIndexed(usize),
}

/// Parse `.po` source text.
///
/// # Examples
///
/// ```
/// use pomo::po_parser::parse_po_str;
///
/// let entries = parse_po_str(
///     "msgid \"Hello\"\nmsgstr \"Bonjour\"\n",
/// ).unwrap();
/// assert_eq!(entries[0].msgid, "Hello");
/// assert_eq!(entries[0].msgstr.as_deref(), Some("Bonjour"));
/// ```
pub fn parse_po_str(source: &str) -> Result<Vec<PoEntry>, PoParseError> {
	parse_po_reader(source.as_bytes())
}

/// Parse `.po` content from a reader.
pub fn parse_po_reader<R: Read>(reader: R) -> Result<Vec<PoEntry>, PoParseError> {
	let reader = BufReader::new(reader);
	let mut entries = Vec::new();
	let mut current: Option<PoEntry> = None;
	let mut pending_comments: Vec<String> = Vec::new();
	let mut field: Option<Field> = None;

	for (index, line) in reader.lines().enumerate() {
		let line_no = index + 1;
		let line = line?;
		let trimmed = line.trim();

		if trimmed.is_empty() {
			continue;
		}

		if trimmed.starts_with('#') {
			// A comment opens the next entry; flush the current one.
			if field.is_some()
				&& let Some(entry) = current.take()
			{
				entries.push(entry);
				field = None;
			}
			pending_comments.push(trimmed.to_string());
			continue;
		}

		if let Some(value) = keyword_value(trimmed, "msgid_plural") {
			let entry = current.as_mut().ok_or_else(|| PoParseError::Syntax {
				line: line_no,
				message: "msgid_plural before msgid".to_string(),
			})?;
			entry.msgid_plural = Some(unescape(value));
			field = Some(Field::MsgidPlural);
		} else if let Some(value) = keyword_value(trimmed, "msgid") {
			if let Some(entry) = current.take() {
				entries.push(entry);
			}
			let mut entry = PoEntry {
				msgid: unescape(value),
				..PoEntry::default()
			};
			entry.comments = std::mem::take(&mut pending_comments);
			current = Some(entry);
			field = Some(Field::Msgid);
		} else if let Some((plural_index, value)) = indexed_msgstr(trimmed) {
			let entry = current.as_mut().ok_or_else(|| PoParseError::Syntax {
				line: line_no,
				message: "msgstr[] before msgid".to_string(),
			})?;
			entry.msgstr_plural.insert(plural_index, unescape(value));
			field = Some(Field::MsgstrIndexed(plural_index));
		} else if let Some(value) = keyword_value(trimmed, "msgstr") {
			let entry = current.as_mut().ok_or_else(|| PoParseError::Syntax {
				line: line_no,
				message: "msgstr before msgid".to_string(),
			})?;
			entry.msgstr = Some(unescape(value));
			field = Some(Field::Msgstr);
		} else if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
			let fragment = unescape(&trimmed[1..trimmed.len() - 1]);
			let entry = current.as_mut().ok_or_else(|| PoParseError::Syntax {
				line: line_no,
				message: "continuation line outside an entry".to_string(),
			})?;
			match field {
				Some(Field::Msgid) => entry.msgid.push_str(&fragment),
				Some(Field::MsgidPlural) => {
					if let Some(plural) = entry.msgid_plural.as_mut() {
						plural.push_str(&fragment);
					}
				}
				Some(Field::Msgstr) => {
					if let Some(msgstr) = entry.msgstr.as_mut() {
						msgstr.push_str(&fragment);
					}
				}
				Some(Field::MsgstrIndexed(plural_index)) => {
					entry
						.msgstr_plural
						.entry(plural_index)
						.or_default()
						.push_str(&fragment);
				}
				None => {
					return Err(PoParseError::Syntax {
						line: line_no,
						message: "continuation line outside an entry".to_string(),
					});
				}
			}
		} else {
			let keyword = trimmed
				.split_whitespace()
				.next()
				.unwrap_or(trimmed)
				.to_string();
			return Err(PoParseError::Syntax {
				line: line_no,
				message: format!("unsupported line starting with {keyword:?}"),
			});
		}
	}

	if let Some(entry) = current.take() {
		entries.push(entry);
	}

	Ok(entries)
}

/// Extract the quoted value of `keyword "value"` lines.
fn keyword_value<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
	let rest = line.strip_prefix(keyword)?;
	// Reject prefixes of longer keywords (`msgid` vs `msgid_plural`).
	if !rest.starts_with([' ', '\t', '"']) {
		return None;
	}
	let rest = rest.trim();
	if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
		Some(&rest[1..rest.len() - 1])
	} else {
		None
	}
}

/// Extract `(index, value)` from `msgstr[N] "value"` lines.
fn indexed_msgstr(line: &str) -> Option<(usize, &str)> {
	let rest = line.strip_prefix("msgstr[")?;
	let close = rest.find(']')?;
	let index: usize = rest[..close].parse().ok()?;
	let rest = rest[close + 1..].trim();
	if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
		Some((index, &rest[1..rest.len() - 1]))
	} else {
		None
	}
}

fn unescape(raw: &str) -> String {
	let mut result = String::with_capacity(raw.len());
	let mut chars = raw.chars();
	while let Some(ch) = chars.next() {
		if ch != '\\' {
			result.push(ch);
			continue;
		}
		match chars.next() {
			Some('n') => result.push('\n'),
			Some('t') => result.push('\t'),
			Some('r') => result.push('\r'),
			Some('"') => result.push('"'),
			Some('\\') => result.push('\\'),
			Some('0') => result.push('\u{0}'),
			Some(other) => {
				result.push('\\');
				result.push(other);
			}
			None => result.push('\\'),
		}
	}
	result
}
