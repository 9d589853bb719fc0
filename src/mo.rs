//! GNU gettext binary catalog (`.mo`) reader and writer
//!
//! Layout (all fields 32-bit): magic, format revision, message count,
//! offset of the original-string table, offset of the translated-string
//! table, hash table size, hash table offset. Each table holds `count`
//! `(length, offset)` pairs pointing into a NUL-terminated string pool.
//! A msgid containing an embedded NUL encodes a plural set
//! (`singular\x00plural`), and its msgstr joins the ordered plural
//! variants with NULs.
//!
//! The reader accepts both byte orders, selected by the magic number.
//! The writer emits little-endian, revision 0, and no hash table
//! (size 0), which is valid per the format since readers fall back to
//! searching the sorted key table.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::catalog::Catalog;

/// Magic number of a little-endian `.mo` file.
pub const MAGIC: u32 = 0x950412de;

/// The magic as seen when the file was written with the opposite byte
/// order.
pub const MAGIC_SWAPPED: u32 = 0xde120495;

const HEADER_LEN: usize = 7 * 4;
const TABLE_ENTRY_LEN: usize = 8;

/// Errors from decoding `.mo` bytes.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("bad magic number {found:#010x}")]
	BadMagic { found: u32 },

	#[error("truncated file: need {needed} bytes at offset {offset}, file has {len}")]
	Truncated {
		offset: usize,
		needed: usize,
		len: usize,
	},

	#[error("string at offset {offset} is not valid UTF-8")]
	InvalidEncoding {
		offset: usize,
		#[source]
		source: std::str::Utf8Error,
	},
}

/// One raw record from a `.mo` file. Embedded NULs are preserved;
/// splitting plural sets apart is the catalog's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoRecord {
	pub msgid: String,
	pub msgstr: String,
}

struct Reader<'a> {
	bytes: &'a [u8],
	big_endian: bool,
}

impl<'a> Reader<'a> {
	fn u32_at(&self, offset: usize) -> Result<u32, DecodeError> {
		let end = offset.checked_add(4).ok_or(DecodeError::Truncated {
			offset,
			needed: 4,
			len: self.bytes.len(),
		})?;
		let slice = self
			.bytes
			.get(offset..end)
			.ok_or(DecodeError::Truncated {
				offset,
				needed: 4,
				len: self.bytes.len(),
			})?;
		let raw: [u8; 4] = slice.try_into().map_err(|_| DecodeError::Truncated {
			offset,
			needed: 4,
			len: self.bytes.len(),
		})?;
		Ok(if self.big_endian {
			u32::from_be_bytes(raw)
		} else {
			u32::from_le_bytes(raw)
		})
	}

	fn str_at(&self, offset: usize, length: usize) -> Result<&'a str, DecodeError> {
		let end = offset.checked_add(length).ok_or(DecodeError::Truncated {
			offset,
			needed: length,
			len: self.bytes.len(),
		})?;
		let slice = self
			.bytes
			.get(offset..end)
			.ok_or(DecodeError::Truncated {
				offset,
				needed: length,
				len: self.bytes.len(),
			})?;
		std::str::from_utf8(slice).map_err(|source| DecodeError::InvalidEncoding {
			offset,
			source,
		})
	}
}

/// Decode `.mo` bytes into the ordered sequence of raw records.
///
/// Invalid UTF-8 in any string is an error; bytes are never lossily
/// replaced.
pub fn read_mo(bytes: &[u8]) -> Result<Vec<MoRecord>, DecodeError> {
	if bytes.len() < HEADER_LEN {
		return Err(DecodeError::Truncated {
			offset: 0,
			needed: HEADER_LEN,
			len: bytes.len(),
		});
	}

	let raw_magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
	let big_endian = match raw_magic {
		MAGIC => false,
		MAGIC_SWAPPED => true,
		found => return Err(DecodeError::BadMagic { found }),
	};
	let reader = Reader { bytes, big_endian };

	let _revision = reader.u32_at(4)?;
	let count = reader.u32_at(8)? as usize;
	let orig_table = reader.u32_at(12)? as usize;
	let trans_table = reader.u32_at(16)? as usize;

	let mut records = Vec::with_capacity(count);
	for i in 0..count {
		let orig_entry = orig_table + i * TABLE_ENTRY_LEN;
		let trans_entry = trans_table + i * TABLE_ENTRY_LEN;

		let id_len = reader.u32_at(orig_entry)? as usize;
		let id_off = reader.u32_at(orig_entry + 4)? as usize;
		let str_len = reader.u32_at(trans_entry)? as usize;
		let str_off = reader.u32_at(trans_entry + 4)? as usize;

		records.push(MoRecord {
			msgid: reader.str_at(id_off, id_len)?.to_string(),
			msgstr: reader.str_at(str_off, str_len)?.to_string(),
		});
	}

	Ok(records)
}

/// Encode a catalog as little-endian `.mo` bytes.
///
/// Entries are emitted in msgid byte order, as the format requires for
/// binary-searchable key tables. A catalog without a header entry gets
/// a minimal synthesized one so standard readers can still discover the
/// charset and plural rule.
pub fn write_mo(catalog: &Catalog) -> Vec<u8> {
	// BTreeMap gives the msgid-sorted order directly.
	let mut items: BTreeMap<String, String> = BTreeMap::new();
	items.insert(String::new(), header_body(catalog));

	for message in catalog.messages() {
		if let Some(plural) = message.plural() {
			let msgid = format!("{}\u{0}{}", message.msgid(), plural);
			let mut forms = Vec::with_capacity(catalog.nplurals());
			for index in 0..catalog.nplurals() {
				let form = message.translations().get(&index).cloned().unwrap_or_else(|| {
					// Pad under-translated plural sets instead of
					// emitting short records.
					if index == 0 {
						message.singular().to_string()
					} else {
						plural.to_string()
					}
				});
				forms.push(form);
			}
			items.insert(msgid, forms.join("\u{0}"));
		} else {
			items.insert(
				message.msgid().to_string(),
				message.singular().to_string(),
			);
		}
	}

	encode(&items)
}

/// Write a catalog to a `.mo` file.
pub fn write_mo_file(path: impl AsRef<Path>, catalog: &Catalog) -> std::io::Result<()> {
	let bytes = write_mo(catalog);
	let mut file = std::fs::File::create(path)?;
	file.write_all(&bytes)
}

fn header_body(catalog: &Catalog) -> String {
	if !catalog.header_raw().is_empty() {
		return catalog.header_raw().to_string();
	}

	// Synthesized minimal header, field-for-field what untranslated
	// catalogs have always carried.
	let mut body = String::new();
	body.push_str("Project-Id-Version: pomo 1.0\n");
	body.push_str("MIME-Version: 1.0\n");
	body.push_str("Content-Transfer-Encoding: 8bit\n");
	body.push_str("Content-Type: text/plain; charset=UTF-8\n");
	if let Some(language) = catalog.language() {
		body.push_str(&format!("Language: {language}\n"));
	}
	let plural_expr = match catalog.nplurals() {
		1 => "0",
		_ => "(n != 1)",
	};
	body.push_str(&format!(
		"Plural-Forms: nplurals={}; plural={};\n",
		catalog.nplurals(),
		plural_expr
	));
	body
}

fn encode(items: &BTreeMap<String, String>) -> Vec<u8> {
	let count = items.len();
	let orig_table = HEADER_LEN;
	let trans_table = orig_table + count * TABLE_ENTRY_LEN;
	let pool_start = trans_table + count * TABLE_ENTRY_LEN;

	let mut orig_entries: Vec<(u32, u32)> = Vec::with_capacity(count);
	let mut trans_entries: Vec<(u32, u32)> = Vec::with_capacity(count);
	let mut pool: Vec<u8> = Vec::new();

	for msgid in items.keys() {
		let bytes = msgid.as_bytes();
		orig_entries.push((bytes.len() as u32, (pool_start + pool.len()) as u32));
		pool.extend_from_slice(bytes);
		pool.push(0);
	}
	for msgstr in items.values() {
		let bytes = msgstr.as_bytes();
		trans_entries.push((bytes.len() as u32, (pool_start + pool.len()) as u32));
		pool.extend_from_slice(bytes);
		pool.push(0);
	}

	let mut out = Vec::with_capacity(pool_start + pool.len());
	for field in [
		MAGIC,
		0, // revision
		count as u32,
		orig_table as u32,
		trans_table as u32,
		0, // hash table size
		0, // hash table offset
	] {
		out.extend_from_slice(&field.to_le_bytes());
	}
	for (length, offset) in orig_entries.iter().chain(trans_entries.iter()) {
		out.extend_from_slice(&length.to_le_bytes());
		out.extend_from_slice(&offset.to_le_bytes());
	}
	out.extend_from_slice(&pool);
	out
}
