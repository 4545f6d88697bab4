//! Package URL codec.
//!
//! Parses `pkg:type/namespace/name@version?key=value#subpath` into a
//! [`PackageInput`] and renders hydrated [`PackageNode`]s back. Components
//! are percent-decoded on parse and percent-encoded on render.

use crate::{
  Error, Result,
  package::{PackageInput, PackageNode, Qualifier},
};

const SCHEME: &str = "pkg:";

/// Parse a package URL.
pub fn parse(purl: &str) -> Result<PackageInput> {
  let invalid = |reason: &str| Error::InvalidPurl {
    purl:   purl.to_owned(),
    reason: reason.to_owned(),
  };

  let rest = match purl.get(..SCHEME.len()) {
    Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &purl[SCHEME.len()..],
    _ => return Err(invalid("missing pkg: scheme")),
  };
  let rest = rest.trim_start_matches('/');

  let (rest, subpath) = match rest.split_once('#') {
    Some((head, sub)) => {
      let segments = sub
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(unescape)
        .collect::<Result<Vec<_>>>()?;
      (head, (!segments.is_empty()).then(|| segments.join("/")))
    }
    None => (rest, None),
  };

  let (rest, qualifiers) = match rest.split_once('?') {
    Some((head, query)) => (head, parse_qualifiers(query)?),
    None => (rest, Vec::new()),
  };

  let (path, version) = match rest.rsplit_once('@') {
    Some((head, v)) if !v.is_empty() => (head, Some(unescape(v)?)),
    Some(_) => return Err(invalid("empty version after '@'")),
    None => (rest, None),
  };

  let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
  if segments.len() < 2 {
    return Err(invalid("expected at least a type and a name"));
  }
  let package_type = segments.remove(0).to_ascii_lowercase();
  let name = segments
    .pop()
    .map(unescape)
    .transpose()?
    .ok_or_else(|| invalid("missing name"))?;
  let namespace = segments
    .into_iter()
    .map(unescape)
    .collect::<Result<Vec<_>>>()?
    .join("/");

  Ok(PackageInput {
    package_type,
    namespace: Some(namespace),
    name,
    version,
    qualifiers,
    subpath,
  })
}

fn parse_qualifiers(query: &str) -> Result<Vec<Qualifier>> {
  let mut qualifiers = Vec::new();
  for pair in query.split('&').filter(|p| !p.is_empty()) {
    let Some((key, value)) = pair.split_once('=') else {
      return Err(Error::InvalidPurl {
        purl:   query.to_owned(),
        reason: format!("qualifier {pair:?} has no value"),
      });
    };
    if value.is_empty() {
      continue;
    }
    qualifiers.push(Qualifier::new(key.to_ascii_lowercase(), unescape(value)?));
  }
  qualifiers.sort();
  Ok(qualifiers)
}

/// Render a hydrated package node as a package URL.
pub fn render(node: &PackageNode) -> String {
  let mut out = format!("{SCHEME}{}/", node.package_type);
  for segment in node.namespace.split('/').filter(|s| !s.is_empty()) {
    out.push_str(&escape(segment));
    out.push('/');
  }
  out.push_str(&escape(&node.name));

  if let Some(version) = &node.version {
    if !version.version.is_empty() {
      out.push('@');
      out.push_str(&escape(&version.version));
    }
    if !version.qualifiers.is_empty() {
      out.push('?');
      let pairs: Vec<String> = version
        .qualifiers
        .iter()
        .map(|q| format!("{}={}", q.key, escape(&q.value)))
        .collect();
      out.push_str(&pairs.join("&"));
    }
    if !version.subpath.is_empty() {
      out.push('#');
      let segments: Vec<String> = version.subpath.split('/').map(escape).collect();
      out.push_str(&segments.join("/"));
    }
  }
  out
}

// ─── Percent encoding ────────────────────────────────────────────────────────

/// Percent-encode everything outside the unreserved set (plus `:`).
pub fn escape(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for byte in raw.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' => {
        out.push(byte as char)
      }
      other => out.push_str(&format!("%{other:02X}")),
    }
  }
  out
}

/// Decode `%XX` escapes.
pub fn unescape(encoded: &str) -> Result<String> {
  let bytes = encoded.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'%' {
      let hex = encoded
        .get(i + 1..i + 3)
        .and_then(|h| u8::from_str_radix(h, 16).ok())
        .ok_or_else(|| Error::InvalidPurl {
          purl:   encoded.to_owned(),
          reason: format!("malformed percent escape at byte {i}"),
        })?;
      out.push(hex);
      i += 3;
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }
  String::from_utf8(out).map_err(|_| Error::InvalidPurl {
    purl:   encoded.to_owned(),
    reason: "escapes do not decode to UTF-8".into(),
  })
}
