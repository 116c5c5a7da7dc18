//! Character-encoding detection for CSV uploads.
//!
//! Detection is a heuristic over a fixed candidate set ([`TextEncoding::PRIORITY`]):
//!
//! - a byte-order mark decides immediately
//! - BOM-less UTF-16 is recognized by its alternating NUL-byte pattern
//! - empty and pure-ASCII input is UTF-8
//! - bytes that validate as UTF-8 are UTF-8, ranked above any single-byte guess
//! - otherwise each single-byte code page is scored, and the highest confidence wins; ties go to
//!   the earlier entry in [`TextEncoding::PRIORITY`]
//!
//! Single-byte code pages are scored on the text they would produce: how many non-ASCII
//! characters are letters rather than symbols or control characters, and whether neighbouring
//! characters form plausible pairs (no long runs of accented letters in Latin text, no Latin and
//! Cyrillic letters mixed inside one word). Short or binary-like samples can be misdetected; the
//! decoding step then fails with [`crate::IngestionError::MalformedInput`].

use std::borrow::Cow;
use std::fmt;

use encoding_rs::Encoding;
use serde::{Serialize, Serializer};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

const MAX_UTF8_CONFIDENCE: f32 = 0.99;
/// Valid UTF-8 with any multi-byte sequence always beats a single-byte guess.
const MIN_UTF8_CONFIDENCE: f32 = MAX_SINGLE_BYTE_CONFIDENCE + 0.01;
const MAX_UTF16_CONFIDENCE: f32 = 0.95;
const MAX_SINGLE_BYTE_CONFIDENCE: f32 = 0.9;

/// Minimum share of 2-byte units whose high byte is NUL to call a BOM-less stream UTF-16.
const UTF16_NUL_RATIO: f32 = 0.3;
/// Samples shorter than this many units need [`SHORT_UTF16_NUL_RATIO`] instead.
const SHORT_UTF16_UNITS: usize = 32;
const SHORT_UTF16_NUL_RATIO: f32 = 0.5;
/// Fewer units than this are never guessed as BOM-less UTF-16.
const MIN_UTF16_UNITS: usize = 4;

/// Text encodings the CSV ingestor can detect and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// UTF-8 with a leading byte-order mark.
    Utf8Bom,
    Utf8,
    Utf16Le,
    Utf16Be,
    /// Western European; superset of ISO-8859-1.
    Windows1252,
    /// Central European.
    Iso8859_2,
    /// Cyrillic.
    Windows1251,
}

impl TextEncoding {
    /// Candidate set in tie-break order.
    pub const PRIORITY: [TextEncoding; 7] = [
        Self::Utf8Bom,
        Self::Utf8,
        Self::Utf16Le,
        Self::Utf16Be,
        Self::Windows1252,
        Self::Iso8859_2,
        Self::Windows1251,
    ];

    const SINGLE_BYTE: [TextEncoding; 3] = [Self::Windows1252, Self::Iso8859_2, Self::Windows1251];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8Bom => "UTF-8-SIG",
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Windows1252 => "windows-1252",
            Self::Iso8859_2 => "ISO-8859-2",
            Self::Windows1251 => "windows-1251",
        }
    }

    /// Resolve a WHATWG label (`"latin1"`, `"utf-16le"`, `"cp1251"`, ...) or `"utf-8-sig"`.
    ///
    /// Returns `None` for encodings outside the candidate set.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("utf-8-sig") || trimmed.eq_ignore_ascii_case("utf_8_sig") {
            return Some(Self::Utf8Bom);
        }
        let enc = Encoding::for_label(trimmed.as_bytes())?;
        Self::PRIORITY
            .into_iter()
            .filter(|c| *c != Self::Utf8Bom)
            .find(|c| c.encoding() == enc)
    }

    /// The `encoding_rs` codec backing this encoding.
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            Self::Utf8Bom | Self::Utf8 => encoding_rs::UTF_8,
            Self::Utf16Le => encoding_rs::UTF_16LE,
            Self::Utf16Be => encoding_rs::UTF_16BE,
            Self::Windows1252 => encoding_rs::WINDOWS_1252,
            Self::Iso8859_2 => encoding_rs::ISO_8859_2,
            Self::Windows1251 => encoding_rs::WINDOWS_1251,
        }
    }

    fn bom(&self) -> &'static [u8] {
        match self {
            Self::Utf8Bom | Self::Utf8 => UTF8_BOM,
            Self::Utf16Le => UTF16LE_BOM,
            Self::Utf16Be => UTF16BE_BOM,
            _ => &[],
        }
    }

    /// Decode `bytes` strictly, dropping a leading BOM that belongs to this encoding.
    ///
    /// Returns `None` if any byte sequence is malformed.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        let bom = self.bom();
        let body = if !bom.is_empty() && bytes.starts_with(bom) {
            &bytes[bom.len()..]
        } else {
            bytes
        };
        self.encoding()
            .decode_without_bom_handling_and_without_replacement(body)
    }

    fn is_cyrillic(&self) -> bool {
        matches!(self, Self::Windows1251)
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Best-effort encoding label with a confidence in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncodingGuess {
    pub encoding: TextEncoding,
    pub confidence: f32,
}

impl EncodingGuess {
    /// Build a guess; `confidence` is clamped to `0.0..=1.0`.
    pub fn new(encoding: TextEncoding, confidence: f32) -> Self {
        Self {
            encoding,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn label(&self) -> &'static str {
        self.encoding.label()
    }
}

/// Guess the text encoding of `bytes`.
///
/// Never fails: the worst case is a low-confidence guess.
pub fn detect_encoding(bytes: &[u8]) -> EncodingGuess {
    if let Some(enc) = bom_encoding(bytes) {
        return EncodingGuess::new(enc, 1.0);
    }
    if let Some(guess) = detect_utf16_without_bom(bytes) {
        return guess;
    }
    if bytes.is_ascii() {
        return EncodingGuess::new(TextEncoding::Utf8, 1.0);
    }

    if let Some(n) = utf8_multibyte_sequences(bytes) {
        return EncodingGuess::new(TextEncoding::Utf8, utf8_confidence(n));
    }

    let scored: Vec<EncodingGuess> = TextEncoding::SINGLE_BYTE
        .into_iter()
        .map(|enc| EncodingGuess::new(enc, single_byte_confidence(enc, bytes)))
        .collect();
    pick_best(&scored)
}

/// Highest confidence wins; ties go to the candidate earlier in [`TextEncoding::PRIORITY`].
fn pick_best(scored: &[EncodingGuess]) -> EncodingGuess {
    let rank = |e: TextEncoding| {
        TextEncoding::PRIORITY
            .iter()
            .position(|p| *p == e)
            .unwrap_or(usize::MAX)
    };

    let Some((first, rest)) = scored.split_first() else {
        return EncodingGuess::new(TextEncoding::Utf8, 0.0);
    };
    let mut best = *first;
    for g in rest {
        let better = g.confidence > best.confidence + f32::EPSILON
            || ((g.confidence - best.confidence).abs() <= f32::EPSILON
                && rank(g.encoding) < rank(best.encoding));
        if better {
            best = *g;
        }
    }
    best
}

fn bom_encoding(bytes: &[u8]) -> Option<TextEncoding> {
    if bytes.starts_with(UTF8_BOM) {
        Some(TextEncoding::Utf8Bom)
    } else if bytes.starts_with(UTF16LE_BOM) {
        Some(TextEncoding::Utf16Le)
    } else if bytes.starts_with(UTF16BE_BOM) {
        Some(TextEncoding::Utf16Be)
    } else {
        None
    }
}

fn detect_utf16_without_bom(bytes: &[u8]) -> Option<EncodingGuess> {
    let units = bytes.len() / 2;
    if units < MIN_UTF16_UNITS {
        return None;
    }

    let mut even_nul = 0usize;
    let mut odd_nul = 0usize;
    for pair in bytes.chunks_exact(2) {
        if pair[0] == 0 {
            even_nul += 1;
        }
        if pair[1] == 0 {
            odd_nul += 1;
        }
    }

    let even = even_nul as f32 / units as f32;
    let odd = odd_nul as f32 / units as f32;
    // ASCII text in UTF-16LE puts the NUL high byte second; UTF-16BE puts it first.
    let (enc, ratio, other) = if odd >= even {
        (TextEncoding::Utf16Le, odd, even)
    } else {
        (TextEncoding::Utf16Be, even, odd)
    };
    let min_ratio = if units < SHORT_UTF16_UNITS {
        SHORT_UTF16_NUL_RATIO
    } else {
        UTF16_NUL_RATIO
    };
    if ratio < min_ratio || other > ratio / 4.0 {
        return None;
    }

    // ASCII with stray NULs decodes to text full of control characters.
    let text = decode_utf16_prefix(enc, bytes)?;
    if text.chars().any(is_binary_control) {
        return None;
    }

    Some(EncodingGuess::new(
        enc,
        (0.5 + ratio / 2.0).min(MAX_UTF16_CONFIDENCE),
    ))
}

/// Strictly decode the whole 2-byte units of a UTF-16 sample.
///
/// An odd trailing byte and a lead surrogate cut off by the end of the sample are ignored.
fn decode_utf16_prefix(enc: TextEncoding, bytes: &[u8]) -> Option<String> {
    let mut whole = &bytes[..bytes.len() & !1];
    if let Some(last) = whole.rchunks_exact(2).next() {
        let unit = match enc {
            TextEncoding::Utf16Be => u16::from_be_bytes([last[0], last[1]]),
            _ => u16::from_le_bytes([last[0], last[1]]),
        };
        if (0xD800..=0xDBFF).contains(&unit) {
            whole = &whole[..whole.len() - 2];
        }
    }
    enc.decode(whole).map(Cow::into_owned)
}

/// C0 controls other than tab, line feed, form feed and carriage return.
pub(crate) fn is_binary_control(c: char) -> bool {
    c <= '\u{1F}' && !matches!(c, '\t' | '\n' | '\u{0C}' | '\r')
}

/// Number of multi-byte sequences if `bytes` is valid UTF-8.
///
/// A sequence cut off by the end of the sample is tolerated.
fn utf8_multibyte_sequences(bytes: &[u8]) -> Option<usize> {
    let valid = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => {
            // Incomplete trailing sequence; `valid_up_to` is a char boundary.
            std::str::from_utf8(&bytes[..e.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };
    Some(valid.chars().filter(|c| !c.is_ascii()).count())
}

fn utf8_confidence(multibyte: usize) -> f32 {
    if multibyte == 0 {
        return 1.0;
    }
    let exp = multibyte.min(16) as i32;
    (1.0 - 0.25f32.powi(exp)).clamp(MIN_UTF8_CONFIDENCE, MAX_UTF8_CONFIDENCE)
}

fn single_byte_confidence(enc: TextEncoding, bytes: &[u8]) -> f32 {
    let (text, _) = enc.encoding().decode_without_bom_handling(bytes);
    let chars: Vec<char> = text.chars().collect();

    let mut total = 0.0f32;
    let mut score = 0.0f32;
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii() {
            continue;
        }
        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();
        total += 1.0;
        score += char_weight(enc, c, prev, next);
    }

    if total == 0.0 {
        return 0.0;
    }
    (score / total) * MAX_SINGLE_BYTE_CONFIDENCE
}

/// Plausibility of a non-ASCII character given its neighbours, in `0.0..=1.0`.
fn char_weight(enc: TextEncoding, c: char, prev: Option<char>, next: Option<char>) -> f32 {
    if c.is_control() || c == char::REPLACEMENT_CHARACTER {
        return 0.0;
    }

    let non_ascii_letter = |x: Option<char>| x.is_some_and(|x| !x.is_ascii() && x.is_alphabetic());
    let ascii_letter = |x: Option<char>| x.is_some_and(|x| x.is_ascii_alphabetic());

    if !c.is_alphabetic() {
        // A symbol glued to an accented letter is the typical shape of mis-decoded UTF-8.
        return if non_ascii_letter(prev) { 0.2 } else { 0.5 };
    }

    if enc.is_cyrillic() {
        if !is_cyrillic(c) {
            return 0.3;
        }
        if ascii_letter(prev) || ascii_letter(next) {
            return 0.4;
        }
        return 1.0;
    }

    if is_cyrillic(c) {
        return 0.3;
    }
    if non_ascii_letter(prev) && non_ascii_letter(next) {
        return 0.4;
    }
    if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase()) {
        return 0.5;
    }
    1.0
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_confidence_grows_with_evidence() {
        assert!(utf8_confidence(1) < utf8_confidence(3));
        assert!(utf8_confidence(1) > MAX_SINGLE_BYTE_CONFIDENCE);
        assert_eq!(utf8_confidence(40), MAX_UTF8_CONFIDENCE);
    }

    #[test]
    fn short_samples_with_stray_nuls_are_not_utf16() {
        assert_eq!(detect_utf16_without_bom(b"a\n\x00\n"), None);
        assert_eq!(detect_utf16_without_bom(b"ab\x00c"), None);
        assert_eq!(detect_utf16_without_bom(b"a\x00\x00\x00b\x00\x01\x00"), None);
    }

    #[test]
    fn utf16_sample_cut_inside_a_unit_or_surrogate_pair() {
        let mut bytes = Vec::new();
        for unit in "id,name\n1,\u{1F600}".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        // Drop the trail surrogate and one more byte.
        let cut = &bytes[..bytes.len() - 1];
        assert_eq!(
            detect_utf16_without_bom(cut).map(|g| g.encoding),
            Some(TextEncoding::Utf16Le)
        );
        let cut = &bytes[..bytes.len() - 3];
        assert_eq!(
            detect_utf16_without_bom(cut).map(|g| g.encoding),
            Some(TextEncoding::Utf16Le)
        );
    }

    #[test]
    fn truncated_utf8_sequence_still_counts_as_utf8() {
        let bytes = "naïve ü".as_bytes();
        let cut = &bytes[..bytes.len() - 1];
        assert_eq!(utf8_multibyte_sequences(cut), Some(1));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(utf8_multibyte_sequences(b"caf\xe9 noir"), None);
    }

    #[test]
    fn tie_prefers_priority_order() {
        let scored = [
            EncodingGuess::new(TextEncoding::Iso8859_2, 0.9),
            EncodingGuess::new(TextEncoding::Windows1252, 0.9),
        ];
        assert_eq!(pick_best(&scored).encoding, TextEncoding::Windows1252);
    }

    #[test]
    fn control_characters_score_zero() {
        assert_eq!(char_weight(TextEncoding::Iso8859_2, '\u{0096}', Some('a'), None), 0.0);
    }
}
