//! Character encoding detection for uploaded files.
//!
//! Detection runs in three stages over a bounded leading sample:
//! a byte-order mark is decisive; otherwise a statistical detector guesses
//! and its guess is scored by decoding the sample; if the score is too low
//! an ordered list of fallback encodings is probed. The result is never an
//! error: when nothing fits, UTF-8 is assumed.

use encoding_rs::{DecoderResult, EUC_JP, Encoding, ISO_2022_JP, SHIFT_JIS, UTF_8};
use serde::Serialize;
use serde::ser::SerializeStruct;
use tracing::{debug, warn};

/// Leading bytes inspected for encoding detection.
pub const ENCODING_SAMPLE_BYTES: usize = 10_000;

/// Minimum confidence for accepting the statistical guess.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Probed in order when the statistical guess is not confident.
///
/// `cp932` resolves to the same decoder as `shift_jis`.
const FALLBACK_ENCODINGS: [(&str, &Encoding); 5] = [
    ("utf-8", UTF_8),
    ("shift_jis", SHIFT_JIS),
    ("cp932", SHIFT_JIS),
    ("euc-jp", EUC_JP),
    ("iso-2022-jp", ISO_2022_JP),
];

/// How the encoding was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ByteOrderMark,
    Ascii,
    Statistical,
    Fallback,
    Default,
}

/// Result of encoding detection.
#[derive(Debug, Clone)]
pub struct DetectedEncoding {
    pub encoding: &'static Encoding,
    /// Lower-case label, e.g. `utf-8` or `shift_jis`.
    pub name: String,
    pub confidence: f64,
    pub method: DetectionMethod,
}

impl DetectedEncoding {
    fn new(encoding: &'static Encoding, confidence: f64, method: DetectionMethod) -> Self {
        Self {
            encoding,
            name: encoding.name().to_ascii_lowercase(),
            confidence,
            method,
        }
    }

    fn utf8_default() -> Self {
        Self::new(UTF_8, 0.0, DetectionMethod::Default)
    }

    pub fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }
}

impl Serialize for DetectedEncoding {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("DetectedEncoding", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("confidence", &self.confidence)?;
        state.serialize_field("method", &self.method)?;
        state.end()
    }
}

/// Detect the character encoding of a byte buffer.
pub fn detect_encoding(bytes: &[u8]) -> DetectedEncoding {
    let truncated = bytes.len() > ENCODING_SAMPLE_BYTES;
    let sample = &bytes[..bytes.len().min(ENCODING_SAMPLE_BYTES)];

    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        debug!("Encoding {} from byte-order mark", encoding.name());
        return DetectedEncoding::new(encoding, 1.0, DetectionMethod::ByteOrderMark);
    }

    if sample.is_ascii() {
        return DetectedEncoding::new(UTF_8, 1.0, DetectionMethod::Ascii);
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, !truncated);
    let guess = detector.guess(None, true);
    let confidence = decode_confidence(guess, sample, truncated);
    debug!(
        "Statistical encoding guess {} (confidence {:.2})",
        guess.name(),
        confidence
    );

    if confidence >= CONFIDENCE_THRESHOLD {
        return DetectedEncoding::new(guess, confidence, DetectionMethod::Statistical);
    }

    match probe_fallbacks(sample, truncated) {
        Some((label, encoding)) => {
            debug!("Encoding {} accepted by fallback probe", label);
            DetectedEncoding {
                encoding,
                name: label.to_string(),
                confidence,
                method: DetectionMethod::Fallback,
            }
        }
        None => {
            warn!("No candidate encoding decodes the sample, assuming utf-8");
            DetectedEncoding::utf8_default()
        }
    }
}

/// First fallback encoding that decodes the sample without error.
pub(crate) fn probe_fallbacks(
    sample: &[u8],
    truncated: bool,
) -> Option<(&'static str, &'static Encoding)> {
    FALLBACK_ENCODINGS
        .iter()
        .find(|(_, encoding)| decodes_cleanly(encoding, sample, truncated))
        .map(|(label, encoding)| (*label, *encoding))
}

/// Whether `bytes` decode without malformed sequences.
///
/// A truncated sample may end inside a multi-byte sequence; that tail is
/// not counted as an error.
fn decodes_cleanly(encoding: &'static Encoding, bytes: &[u8], truncated: bool) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(bytes.len()) else {
        return false;
    };
    let mut out = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(bytes, &mut out, !truncated);
    matches!(result, DecoderResult::InputEmpty)
}

/// Share of decoded characters that look like text.
///
/// Replacement characters and non-whitespace control characters count
/// against the guess. Delimited text always carries ASCII separators or
/// line breaks, so a sample without a single ASCII byte scores zero.
fn decode_confidence(encoding: &'static Encoding, sample: &[u8], truncated: bool) -> f64 {
    if !sample.iter().any(u8::is_ascii) {
        return 0.0;
    }

    let (text, _) = encoding.decode_without_bom_handling(sample);
    let mut total = 0usize;
    let mut clean = 0usize;
    for c in text.chars() {
        total += 1;
        let is_control = c.is_control() && !matches!(c, '\t' | '\n' | '\r');
        if c != char::REPLACEMENT_CHARACTER && !is_control {
            clean += 1;
        }
    }

    // A cut multi-byte tail decodes as one replacement character.
    if truncated && text.ends_with(char::REPLACEMENT_CHARACTER) {
        clean += 1;
    }

    if total == 0 {
        0.0
    } else {
        clean as f64 / total as f64
    }
}

/// Decode a whole buffer to UTF-8, honouring a byte-order mark.
///
/// Returns `None` when the bytes are malformed for the encoding.
pub(crate) fn decode_to_string(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) => (bom_encoding, &bytes[bom_len..]),
        None => (encoding, bytes),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
}
