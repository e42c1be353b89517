//! `Chunk` ↔ byte stream, per the fixed wire layout: magic marker, version
//! triple, branch name, commit hash, compilation timestamp, source SHA-256,
//! a tagged constants table terminated by a sentinel byte, then the code
//! section. Plain big-endian byte packing throughout — the layout is
//! spec-fixed, not a Rust-type-driven encoding, so there is no `serde`
//! round trip here, only a writer/reader pair mirroring the big-endian
//! helpers `core::chunk::Chunk` already uses for its own operands.

use core::chunk::{ClassConst, Chunk, ConstValue, FunctionConst, StrModifier};
use core::errors::{Diagnostic, Stage};
use sha2::{Digest, Sha256};

/// Upper bound on how eagerly a `Vec::with_capacity` trusts an untrusted
/// length prefix read from an artifact, so a corrupt count can't itself
/// trigger a huge allocation before the byte-truncation check would catch it.
const MAX_TRUSTED_PREALLOC: usize = 4096;

const MAGIC: &[u8; 13] = b"JAPL_BYTECODE";
const CONSTS_END: u8 = 0x59;

const TAG_IDENTIFIER: u8 = 0x00;
const TAG_NUMBER: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_LIST: u8 = 0x03;
const TAG_SET: u8 = 0x04;
const TAG_DICT: u8 = 0x05;
const TAG_TUPLE: u8 = 0x06;
const TAG_FUNCTION: u8 = 0x07;
const TAG_CLASS: u8 = 0x08;
const TAG_VAR: u8 = 0x09;
const TAG_NAN: u8 = 0x0A;
const TAG_INF: u8 = 0x0B;
const TAG_TRUE: u8 = 0x0C;
const TAG_FALSE: u8 = 0x0D;
const TAG_NIL: u8 = 0x0F;
const TAG_LAMBDA: u8 = 0x10;

const MOD_PLAIN: u8 = 0x00;
const MOD_BYTE: u8 = 0x01;
const MOD_FORMAT: u8 = 0x02;

/// Header fields supplied by the caller — the serializer has no VCS access
/// of its own, so the branch/commit/timestamp a `dump` is stamped with are
/// the caller's responsibility (the CLI reads them from its environment).
pub struct DumpMetadata<'a> {
  pub branch: &'a str,
  pub commit_hash: &'a str,
  pub timestamp: i64,
}

/// Everything recovered from an artifact's header on `load`, ahead of the
/// constants/code body.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
  pub version: (u8, u8, u8),
  pub branch: String,
  pub commit_hash: String,
  pub timestamp: i64,
  pub source_sha256: [u8; 32],
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedArtifact {
  pub metadata: Metadata,
  pub chunk: Chunk,
}

/// Serializes `chunk` into a `.japlc` artifact. Fails only on a few
/// constraints the in-memory model does not itself enforce: a branch name
/// over 255 bytes, a commit hash that isn't exactly 40 ASCII hex digits, or
/// a section (code, or any sized constant) exceeding the `u24` width the
/// format allots it.
pub fn dump(chunk: &Chunk, source_text: &str, filename: &str, meta: &DumpMetadata) -> Result<Vec<u8>, Diagnostic> {
  let mut w = Writer::new();
  w.bytes(MAGIC);
  w.u8(core::VERSION.0);
  w.u8(core::VERSION.1);
  w.u8(core::VERSION.2);

  let branch_bytes = meta.branch.as_bytes();
  if branch_bytes.len() > u8::MAX as usize {
    return Err(malformed(filename, "branch name exceeds 255 bytes"));
  }
  w.u8(branch_bytes.len() as u8);
  w.bytes(branch_bytes);

  if meta.commit_hash.len() != 40 || !meta.commit_hash.bytes().all(|b| b.is_ascii_hexdigit()) {
    return Err(malformed(filename, "commit hash width mismatch: expected 40 ASCII hex characters"));
  }
  w.bytes(meta.commit_hash.as_bytes());

  w.i64(meta.timestamp);

  let digest: [u8; 32] = Sha256::digest(source_text.as_bytes()).into();
  w.bytes(&digest);

  write_chunk_body(&mut w, chunk, filename)?;
  Ok(w.buf)
}

/// Parses an artifact previously produced by [`dump`]. Truncation anywhere
/// in the stream, an unrecognized constant tag, or a missing magic marker
/// all yield a single `malformed bytecode`-flavored diagnostic.
pub fn load(bytes: &[u8], filename: &str) -> Result<LoadedArtifact, Diagnostic> {
  let mut r = Reader::new(bytes, filename);

  let marker = r.bytes(MAGIC.len())?;
  if marker != MAGIC {
    return Err(malformed(filename, "missing JAPL_BYTECODE magic marker"));
  }

  let version = (r.u8()?, r.u8()?, r.u8()?);

  let branch_len = r.u8()? as usize;
  let branch = String::from_utf8(r.bytes(branch_len)?.to_vec()).map_err(|_| malformed(filename, "branch name is not valid UTF-8"))?;

  let commit_hash = String::from_utf8(r.bytes(40)?.to_vec()).map_err(|_| malformed(filename, "commit hash is not valid ASCII"))?;

  let timestamp = r.i64()?;

  let mut source_sha256 = [0u8; 32];
  source_sha256.copy_from_slice(r.bytes(32)?);

  let chunk = read_chunk_body(&mut r)?;

  Ok(LoadedArtifact { metadata: Metadata { version, branch, commit_hash, timestamp, source_sha256 }, chunk })
}

/// Hashes `source_text` the same way [`dump`] does, for a caller comparing
/// a reloaded artifact's `source_sha256` against current source without
/// re-running `dump`.
pub fn source_digest(source_text: &str) -> [u8; 32] {
  Sha256::digest(source_text.as_bytes()).into()
}

/// Whether a previously loaded artifact's header matches the current
/// source, branch, commit, and interpreter version — the comparison
/// primitive `spec.md §6` leaves cache-freshness *policy* (age windows,
/// directory layout) to an external collaborator.
pub fn cache_is_fresh(metadata: &Metadata, source_text: &str, branch: &str, commit_hash: &str) -> bool {
  metadata.version == core::VERSION
    && metadata.branch == branch
    && metadata.commit_hash == commit_hash
    && metadata.source_sha256 == source_digest(source_text)
}

fn write_chunk_body(w: &mut Writer, chunk: &Chunk, filename: &str) -> Result<(), Diagnostic> {
  for value in &chunk.consts {
    write_const(w, value, filename)?;
  }
  w.u8(CONSTS_END);

  if chunk.code.len() > core::chunk::MAX_U24 {
    return Err(malformed(filename, "code section exceeds the maximum encodable size"));
  }
  w.u24(chunk.code.len() as u32);
  w.bytes(&chunk.code);
  Ok(())
}

fn read_chunk_body(r: &mut Reader) -> Result<Chunk, Diagnostic> {
  let mut chunk = Chunk::new(false);
  loop {
    if r.peek_u8()? == CONSTS_END {
      r.u8()?;
      break;
    }
    chunk.consts.push(read_const(r)?);
  }

  let code_len = r.u24()? as usize;
  chunk.code = r.bytes(code_len)?.to_vec();
  Ok(chunk)
}

fn write_sized_str(w: &mut Writer, s: &str, filename: &str) -> Result<(), Diagnostic> {
  let bytes = s.as_bytes();
  if bytes.len() > core::chunk::MAX_U24 {
    return Err(malformed(filename, "string constant exceeds the maximum encodable size"));
  }
  w.u24(bytes.len() as u32);
  w.bytes(bytes);
  Ok(())
}

fn read_sized_str(r: &mut Reader) -> Result<String, Diagnostic> {
  let len = r.u24()? as usize;
  String::from_utf8(r.bytes(len)?.to_vec()).map_err(|_| malformed(r.filename, "string constant is not valid UTF-8"))
}

fn write_const(w: &mut Writer, value: &ConstValue, filename: &str) -> Result<(), Diagnostic> {
  match value {
    ConstValue::Number(lexeme) => {
      w.u8(TAG_NUMBER);
      write_sized_str(w, lexeme, filename)?;
    }
    ConstValue::Str { value, modifier } => {
      w.u8(TAG_STRING);
      w.u8(match modifier {
        StrModifier::Plain => MOD_PLAIN,
        StrModifier::Byte => MOD_BYTE,
        StrModifier::Format => MOD_FORMAT,
      });
      write_sized_str(w, value, filename)?;
    }
    ConstValue::Identifier(name) => {
      w.u8(TAG_IDENTIFIER);
      write_sized_str(w, name, filename)?;
    }
    ConstValue::Var(name) => {
      w.u8(TAG_VAR);
      write_sized_str(w, name, filename)?;
    }
    ConstValue::List(items) => write_seq(w, TAG_LIST, items, filename)?,
    ConstValue::Set(items) => write_seq(w, TAG_SET, items, filename)?,
    ConstValue::Tuple(items) => write_seq(w, TAG_TUPLE, items, filename)?,
    ConstValue::Dict(pairs) => {
      w.u8(TAG_DICT);
      if pairs.len() * 2 > core::chunk::MAX_U24 {
        return Err(malformed(filename, "dict constant exceeds the maximum encodable element count"));
      }
      w.u24((pairs.len() * 2) as u32);
      for (k, v) in pairs {
        write_const(w, k, filename)?;
        write_const(w, v, filename)?;
      }
    }
    ConstValue::Function(f) => {
      w.u8(TAG_FUNCTION);
      write_function(w, f, filename)?;
    }
    ConstValue::Lambda(f) => {
      w.u8(TAG_LAMBDA);
      write_function(w, f, filename)?;
    }
    ConstValue::Class(c) => {
      w.u8(TAG_CLASS);
      write_class(w, c, filename)?;
    }
    ConstValue::True => w.u8(TAG_TRUE),
    ConstValue::False => w.u8(TAG_FALSE),
    ConstValue::Nil => w.u8(TAG_NIL),
    ConstValue::Nan => w.u8(TAG_NAN),
    ConstValue::Inf => w.u8(TAG_INF),
  }
  Ok(())
}

fn read_const(r: &mut Reader) -> Result<ConstValue, Diagnostic> {
  let tag = r.u8()?;
  Ok(match tag {
    TAG_NUMBER => ConstValue::Number(read_sized_str(r)?),
    TAG_STRING => {
      let modifier = match r.u8()? {
        MOD_PLAIN => StrModifier::Plain,
        MOD_BYTE => StrModifier::Byte,
        MOD_FORMAT => StrModifier::Format,
        _ => return Err(malformed(r.filename, "unrecognized string modifier tag")),
      };
      ConstValue::Str { value: read_sized_str(r)?, modifier }
    }
    TAG_IDENTIFIER => ConstValue::Identifier(read_sized_str(r)?),
    TAG_VAR => ConstValue::Var(read_sized_str(r)?),
    TAG_LIST => ConstValue::List(read_seq(r)?),
    TAG_SET => ConstValue::Set(read_seq(r)?),
    TAG_TUPLE => ConstValue::Tuple(read_seq(r)?),
    TAG_DICT => {
      let count = r.u24()? as usize;
      if count % 2 != 0 {
        return Err(malformed(r.filename, "dict constant has an odd element count"));
      }
      let mut pairs = Vec::with_capacity(count / 2);
      for _ in 0..count / 2 {
        let k = read_const(r)?;
        let v = read_const(r)?;
        pairs.push((k, v));
      }
      ConstValue::Dict(pairs)
    }
    TAG_FUNCTION => ConstValue::Function(read_function(r)?),
    TAG_LAMBDA => ConstValue::Lambda(read_function(r)?),
    TAG_CLASS => ConstValue::Class(read_class(r)?),
    TAG_TRUE => ConstValue::True,
    TAG_FALSE => ConstValue::False,
    TAG_NIL => ConstValue::Nil,
    TAG_NAN => ConstValue::Nan,
    TAG_INF => ConstValue::Inf,
    _ => return Err(malformed(r.filename, format!("unrecognized constant tag 0x{tag:02X}"))),
  })
}

fn write_seq(w: &mut Writer, tag: u8, items: &[ConstValue], filename: &str) -> Result<(), Diagnostic> {
  w.u8(tag);
  if items.len() > core::chunk::MAX_U24 {
    return Err(malformed(filename, "collection constant exceeds the maximum encodable element count"));
  }
  w.u24(items.len() as u32);
  for item in items {
    write_const(w, item, filename)?;
  }
  Ok(())
}

fn read_seq(r: &mut Reader) -> Result<Vec<ConstValue>, Diagnostic> {
  let count = r.u24()? as usize;
  let mut items = Vec::with_capacity(count.min(MAX_TRUSTED_PREALLOC));
  for _ in 0..count {
    items.push(read_const(r)?);
  }
  Ok(items)
}

fn write_function(w: &mut Writer, f: &FunctionConst, filename: &str) -> Result<(), Diagnostic> {
  write_sized_str(w, &f.name, filename)?;
  w.u8(f.min_arity);
  w.u8(f.max_arity);
  write_chunk_body(w, &f.chunk, filename)
}

fn read_function(r: &mut Reader) -> Result<FunctionConst, Diagnostic> {
  let name = read_sized_str(r)?;
  let min_arity = r.u8()?;
  let max_arity = r.u8()?;
  let chunk = read_chunk_body(r)?;
  Ok(FunctionConst { name, min_arity, max_arity, chunk })
}

fn write_class(w: &mut Writer, c: &ClassConst, filename: &str) -> Result<(), Diagnostic> {
  write_sized_str(w, &c.name, filename)?;

  if c.parents.len() > core::chunk::MAX_U24 {
    return Err(malformed(filename, "class constant exceeds the maximum encodable parent count"));
  }
  w.u24(c.parents.len() as u32);
  for parent in &c.parents {
    write_sized_str(w, parent, filename)?;
  }

  if c.methods.len() > core::chunk::MAX_U24 {
    return Err(malformed(filename, "class constant exceeds the maximum encodable method count"));
  }
  w.u24(c.methods.len() as u32);
  for method in &c.methods {
    write_function(w, method, filename)?;
  }
  Ok(())
}

fn read_class(r: &mut Reader) -> Result<ClassConst, Diagnostic> {
  let name = read_sized_str(r)?;

  let parent_count = r.u24()? as usize;
  let mut parents = Vec::with_capacity(parent_count.min(MAX_TRUSTED_PREALLOC));
  for _ in 0..parent_count {
    parents.push(read_sized_str(r)?);
  }

  let method_count = r.u24()? as usize;
  let mut methods = Vec::with_capacity(method_count.min(MAX_TRUSTED_PREALLOC));
  for _ in 0..method_count {
    methods.push(read_function(r)?);
  }

  Ok(ClassConst { name, parents, methods })
}

fn malformed(filename: &str, message: impl Into<String>) -> Diagnostic {
  Diagnostic::new(Stage::Serializing, filename, 0, "", message)
}

/// Append-only byte buffer with the big-endian operand widths the wire
/// format uses, mirroring `core::chunk::Chunk`'s own `write_u16`/`write_u24`
/// helpers but without a line table (an artifact has no source positions).
struct Writer {
  buf: Vec<u8>,
}

impl Writer {
  fn new() -> Self {
    Writer { buf: Vec::new() }
  }

  fn u8(&mut self, byte: u8) {
    self.buf.push(byte);
  }

  fn bytes(&mut self, bytes: &[u8]) {
    self.buf.extend_from_slice(bytes);
  }

  fn u24(&mut self, value: u32) {
    let b = value.to_be_bytes();
    self.buf.extend_from_slice(&[b[1], b[2], b[3]]);
  }

  fn i64(&mut self, value: i64) {
    self.buf.extend_from_slice(&value.to_be_bytes());
  }
}

/// Cursor over the artifact byte slice. Every read past the end of `bytes`
/// is reported as the same `malformed bytecode` diagnostic rather than
/// panicking — an artifact is untrusted input.
struct Reader<'a> {
  bytes: &'a [u8],
  pos: usize,
  filename: &'a str,
}

impl<'a> Reader<'a> {
  fn new(bytes: &'a [u8], filename: &'a str) -> Self {
    Reader { bytes, pos: 0, filename }
  }

  fn bytes(&mut self, n: usize) -> Result<&'a [u8], Diagnostic> {
    let end = self.pos.checked_add(n).ok_or_else(|| malformed(self.filename, "malformed bytecode: length overflow"))?;
    if end > self.bytes.len() {
      return Err(malformed(self.filename, "malformed bytecode: unexpected end of stream"));
    }
    let slice = &self.bytes[self.pos..end];
    self.pos = end;
    Ok(slice)
  }

  fn u8(&mut self) -> Result<u8, Diagnostic> {
    Ok(self.bytes(1)?[0])
  }

  fn peek_u8(&mut self) -> Result<u8, Diagnostic> {
    self.bytes.get(self.pos).copied().ok_or_else(|| malformed(self.filename, "malformed bytecode: unexpected end of stream"))
  }

  fn u24(&mut self) -> Result<u32, Diagnostic> {
    let b = self.bytes(3)?;
    Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
  }

  fn i64(&mut self) -> Result<i64, Diagnostic> {
    let b = self.bytes(8)?;
    Ok(i64::from_be_bytes(b.try_into().unwrap()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use core::chunk::{Chunk, ConstValue, FunctionConst, StrModifier};

  fn sample_meta() -> DumpMetadata<'static> {
    DumpMetadata { branch: "main", commit_hash: &"a".repeat(40), timestamp: 1_700_000_000 }
  }

  #[test]
  fn round_trips_scalar_constants() {
    let mut chunk = Chunk::new(false);
    chunk.consts.push(ConstValue::Number("42".to_string()));
    chunk.consts.push(ConstValue::Str { value: "hi".to_string(), modifier: StrModifier::Plain });
    chunk.consts.push(ConstValue::True);
    chunk.consts.push(ConstValue::Nil);
    chunk.consts.push(ConstValue::Identifier("x".to_string()));
    chunk.consts.push(ConstValue::Var("x".to_string()));
    chunk.code = vec![0, 1, 2, 3];

    let bytes = dump(&chunk, "var x = 42;", "main.jpl", &sample_meta()).unwrap();
    let loaded = load(&bytes, "main.jpl").unwrap();

    assert_eq!(loaded.chunk.code, chunk.code);
    assert_eq!(loaded.chunk.consts, chunk.consts);
    assert_eq!(loaded.metadata.version, core::VERSION);
    assert_eq!(loaded.metadata.branch, "main");
    assert_eq!(loaded.metadata.source_sha256, source_digest("var x = 42;"));
  }

  #[test]
  fn round_trips_nested_collections_and_function() {
    let mut inner = Chunk::new(false);
    inner.consts.push(ConstValue::Number("1".to_string()));
    inner.code = vec![9, 9];

    let mut chunk = Chunk::new(false);
    chunk.consts.push(ConstValue::List(vec![ConstValue::Number("1".to_string()), ConstValue::Number("2".to_string())]));
    chunk.consts.push(ConstValue::Dict(vec![(ConstValue::Str { value: "k".to_string(), modifier: StrModifier::Plain }, ConstValue::True)]));
    chunk.consts.push(ConstValue::Function(FunctionConst { name: "f".to_string(), min_arity: 0, max_arity: 1, chunk: inner }));
    chunk.code = vec![1, 2, 3];

    let bytes = dump(&chunk, "fun f(a) { return 1; }", "main.jpl", &sample_meta()).unwrap();
    let loaded = load(&bytes, "main.jpl").unwrap();

    assert_eq!(loaded.chunk, chunk);
  }

  #[test]
  fn rejects_truncated_stream() {
    let chunk = Chunk::new(false);
    let mut bytes = dump(&chunk, "", "main.jpl", &sample_meta()).unwrap();
    bytes.truncate(bytes.len() - 5);
    assert!(load(&bytes, "main.jpl").is_err());
  }

  #[test]
  fn rejects_bad_commit_hash_width() {
    let chunk = Chunk::new(false);
    let meta = DumpMetadata { branch: "main", commit_hash: "short", timestamp: 0 };
    assert!(dump(&chunk, "", "main.jpl", &meta).is_err());
  }

  #[test]
  fn rejects_missing_magic_marker() {
    let garbage = vec![0u8; 64];
    assert!(load(&garbage, "main.jpl").is_err());
  }

  #[test]
  fn cache_freshness_tracks_source_and_branch() {
    let chunk = Chunk::new(false);
    let bytes = dump(&chunk, "same", "main.jpl", &sample_meta()).unwrap();
    let loaded = load(&bytes, "main.jpl").unwrap();

    assert!(cache_is_fresh(&loaded.metadata, "same", "main", &"a".repeat(40)));
    assert!(!cache_is_fresh(&loaded.metadata, "different", "main", &"a".repeat(40)));
    assert!(!cache_is_fresh(&loaded.metadata, "same", "other-branch", &"a".repeat(40)));
  }
}
