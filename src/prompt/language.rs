//! Script-density language guess for prompt selection.
//!
//! Scripts are checked in the order of [`SCRIPTS`] and the first whose share
//! of the alphabetic characters exceeds [`SCRIPT_THRESHOLD`] wins. Text
//! shorter than [`MIN_DETECTION_CHARS`] characters is always English.

use serde::Serialize;
use std::ops::RangeInclusive;

use crate::env::defaults::FALLBACK_LANGUAGE;

pub const MIN_DETECTION_CHARS: usize = 10;

pub const SCRIPT_THRESHOLD: f64 = 0.3;

const CHINESE: RangeInclusive<char> = '\u{4E00}'..='\u{9FFF}';

/// Language code and script range, in tie-break order
pub const SCRIPTS: [(&str, RangeInclusive<char>); 5] = [
    ("zh", CHINESE),
    ("ja", '\u{3040}'..='\u{30FF}'),
    ("ko", '\u{AC00}'..='\u{D7A3}'),
    ("ru", '\u{0400}'..='\u{04FF}'),
    ("ar", '\u{0600}'..='\u{06FF}'),
];

pub fn detect(text: &str) -> &'static str {
    if text.chars().count() < MIN_DETECTION_CHARS {
        return FALLBACK_LANGUAGE;
    }

    let alphabetic = text.chars().filter(|c| c.is_alphabetic()).count();
    if alphabetic == 0 {
        return FALLBACK_LANGUAGE;
    }

    for (code, range) in SCRIPTS.iter() {
        let hits = text.chars().filter(|c| range.contains(c)).count();
        if hits as f64 / alphabetic as f64 > SCRIPT_THRESHOLD {
            return *code;
        }
    }

    FALLBACK_LANGUAGE
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub language: &'static str,
    pub confidence: f64,
    pub chinese_chars: usize,
    pub total_chars: usize,
}

/// [`detect`] plus a confidence derived from the share of Chinese characters
/// among the non-whitespace characters.
pub fn detect_with_confidence(text: &str) -> DetectionReport {
    let language = detect(text);
    let chinese_chars = text.chars().filter(|c| CHINESE.contains(c)).count();
    let total_chars = text.chars().filter(|c| !c.is_whitespace()).count();

    let confidence = if total_chars == 0 {
        0.0
    } else {
        let ratio = chinese_chars as f64 / total_chars as f64;
        let share = if language == "zh" { ratio } else { 1.0 - ratio };
        (share * 2.0).min(1.0)
    };

    DetectionReport {
        language,
        confidence,
        chinese_chars,
        total_chars,
    }
}
