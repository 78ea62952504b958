//! Canonical JSON emission.
//!
//! Output is written into an in-memory `String`, so writes cannot fail.
//! Values JSON cannot carry exactly are wrapped in single-key envelope
//! objects (`{"_int":"…"}`, `{"_ts":"…"}`, …). User-supplied map keys
//! starting with `_` gain an extra `_` so they never look like an
//! envelope tag.

use std::fmt::Write as _;

/// Types that can render themselves as canonical JSON.
pub trait ToJson {
    fn write_json(&self, out: &mut String);

    fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }
}

impl<T: ToJson + ?Sized> ToJson for &T {
    fn write_json(&self, out: &mut String) {
        (**self).write_json(out);
    }
}

impl ToJson for str {
    fn write_json(&self, out: &mut String) {
        write_str(out, self);
    }
}

impl ToJson for String {
    fn write_json(&self, out: &mut String) {
        write_str(out, self);
    }
}

impl ToJson for bool {
    fn write_json(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }
}

impl ToJson for f64 {
    fn write_json(&self, out: &mut String) {
        write_f64(out, *self);
    }
}

/// Writes a JSON string literal.
///
/// Escapes `"`, `\`, CR, LF and TAB by name and every other code point
/// below 0x20 as `\u00XX`.
pub fn write_str(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            },
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Writes a double as its shortest round-trip decimal.
///
/// JSON has no literal for NaN or the infinities; those are written as
/// the strings `"NaN"`, `"+Inf"` and `"-Inf"`.
pub fn write_f64(out: &mut String, v: f64) {
    match serde_json::Number::from_f64(v) {
        Some(n) => {
            let _ = write!(out, "{n}");
        },
        None if v.is_nan() => out.push_str("\"NaN\""),
        None if v > 0.0 => out.push_str("\"+Inf\""),
        None => out.push_str("\"-Inf\""),
    }
}

/// Writes a single-key envelope `{"<tag>":"<body>"}`.
pub fn write_envelope(out: &mut String, tag: &str, body: std::fmt::Arguments<'_>) {
    let _ = write!(out, "{{\"{tag}\":\"{body}\"}}");
}

/// Writes a JSON object through `f`.
pub fn map(out: &mut String, f: impl FnOnce(&mut MapWriter<'_>)) {
    out.push('{');
    let mut m = MapWriter { out, count: 0 };
    f(&mut m);
    m.out.push('}');
}

/// Writes a JSON array through `f`.
pub fn array(out: &mut String, f: impl FnOnce(&mut ArrayWriter<'_>)) {
    out.push('[');
    let mut a = ArrayWriter { out, count: 0 };
    f(&mut a);
    a.out.push(']');
}

/// Incremental writer for the members of one JSON object.
pub struct MapWriter<'a> {
    out: &'a mut String,
    count: usize,
}

impl MapWriter<'_> {
    /// Writes a member key and the `:` separator.
    pub fn key(&mut self, k: &str) {
        if self.count != 0 {
            self.out.push(',');
        }
        self.count += 1;
        if k.starts_with('_') {
            let mut escaped = String::with_capacity(k.len() + 1);
            escaped.push('_');
            escaped.push_str(k);
            write_str(self.out, &escaped);
        } else {
            write_str(self.out, k);
        }
        self.out.push(':');
    }

    pub fn pair<V: ToJson + ?Sized>(&mut self, k: &str, v: &V) {
        self.key(k);
        v.write_json(self.out);
    }

    pub fn submap(&mut self, k: &str, f: impl FnOnce(&mut MapWriter<'_>)) {
        self.key(k);
        map(self.out, f);
    }

    pub fn array(&mut self, k: &str, f: impl FnOnce(&mut ArrayWriter<'_>)) {
        self.key(k);
        array(self.out, f);
    }
}

/// Incremental writer for the items of one JSON array.
pub struct ArrayWriter<'a> {
    out: &'a mut String,
    count: usize,
}

impl ArrayWriter<'_> {
    fn separator(&mut self) {
        if self.count != 0 {
            self.out.push(',');
        }
        self.count += 1;
    }

    pub fn item<V: ToJson + ?Sized>(&mut self, v: &V) {
        self.separator();
        v.write_json(self.out);
    }

    pub fn submap(&mut self, f: impl FnOnce(&mut MapWriter<'_>)) {
        self.separator();
        map(self.out, f);
    }
}
