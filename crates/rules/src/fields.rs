//! Per-field rules
//!
//! Every rule is a named pure function over normalized text. Rules for a field
//! form an ordered list and the first one yielding a value wins; name rules
//! instead fill given name and surname slot by slot.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::gazetteer;
use crate::normalize::{fold_dotted_i, is_name_word, tokens};
use crate::DocumentType;

/// How many words after a label are searched for its value
const LABEL_WINDOW: usize = 5;

#[derive(Debug, Deserialize)]
struct LabelConfig {
    #[allow(dead_code)]
    version: String,
    given_name_labels: Vec<String>,
    surname_labels: Vec<String>,
    birth_place_labels: Vec<String>,
    header_words: Vec<String>,
}

struct Labels {
    given: Vec<Vec<String>>,
    surname: Vec<Vec<String>>,
    birth_place: Vec<Vec<String>>,
    /// Header words plus every word of every label, dotted İ folded
    stop_words: HashSet<String>,
}

static LABELS: Lazy<Labels> = Lazy::new(|| {
    let config: LabelConfig =
        serde_json::from_str(include_str!("../data/labels.json")).expect("Failed to parse labels.json");

    let split = |labels: &[String]| -> Vec<Vec<String>> {
        labels
            .iter()
            .map(|l| tokens(l).into_iter().map(str::to_string).collect())
            .collect()
    };
    let given = split(&config.given_name_labels);
    let surname = split(&config.surname_labels);
    let birth_place = split(&config.birth_place_labels);

    let stop_words = config
        .header_words
        .iter()
        .cloned()
        .chain(given.iter().chain(&surname).chain(&birth_place).flatten().cloned())
        .map(|word| fold_dotted_i(&word))
        .collect();

    Labels {
        given,
        surname,
        birth_place,
        stop_words,
    }
});

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static PASSPORT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]\d{8,9}").expect("valid regex"));
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[.\-/](\d{1,2})[.\-/](\d{4})").expect("valid regex"));

/// A named extraction rule
pub struct FieldRule<T> {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<T>,
}

/// First rule in order that yields a value, with that rule's name
pub fn first_match<T>(rules: &[FieldRule<T>], text: &str) -> Option<(&'static str, T)> {
    rules.iter().find_map(|rule| (rule.apply)(text).map(|value| (rule.name, value)))
}

/// Partial name result; a rule may fill either slot or both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub given: Option<String>,
    pub surname: Option<String>,
}

impl NameParts {
    pub fn is_complete(&self) -> bool {
        self.given.is_some() && self.surname.is_some()
    }
}

/// Run name rules in order, filling only empty slots; stop once both are filled.
pub fn run_name_rules(rules: &[FieldRule<NameParts>], text: &str) -> NameParts {
    let mut parts = NameParts::default();
    for rule in rules {
        if parts.is_complete() {
            break;
        }
        if let Some(found) = (rule.apply)(text) {
            if parts.given.is_none() && found.given.is_some() {
                log::debug!("[Rules] given name from {}", rule.name);
                parts.given = found.given;
            }
            if parts.surname.is_none() && found.surname.is_some() {
                log::debug!("[Rules] surname from {}", rule.name);
                parts.surname = found.surname;
            }
        }
    }
    parts
}

// ============================================================================
// Identifier
// ============================================================================

pub fn eleven_digit_run(text: &str) -> Option<String> {
    DIGIT_RUN
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|run| run.len() == 11)
        .map(str::to_string)
}

pub fn passport_number(text: &str) -> Option<String> {
    PASSPORT_NUMBER.find(text).map(|m| m.as_str().to_string())
}

const NATIONAL_ID_NUMBER_RULES: &[FieldRule<String>] = &[FieldRule {
    name: "eleven_digit_run",
    apply: eleven_digit_run,
}];

const PASSPORT_NUMBER_RULES: &[FieldRule<String>] = &[FieldRule {
    name: "letter_and_digits",
    apply: passport_number,
}];

pub fn identifier_rules(document_type: DocumentType) -> &'static [FieldRule<String>] {
    match document_type {
        DocumentType::NationalId => NATIONAL_ID_NUMBER_RULES,
        DocumentType::Passport => PASSPORT_NUMBER_RULES,
    }
}

// ============================================================================
// Names
// ============================================================================

/// First name word within [`LABEL_WINDOW`] words after any of `labels`.
///
/// Header words and the label's own words are skipped; a word belonging to
/// some other label ends the search for that occurrence.
fn value_after_label(words: &[&str], labels: &[Vec<String>]) -> Option<String> {
    let own: HashSet<String> = labels.iter().flatten().map(|l| fold_dotted_i(l)).collect();

    for label in labels {
        if label.is_empty() || label.len() > words.len() {
            continue;
        }
        for start in 0..=(words.len() - label.len()) {
            let matched = label
                .iter()
                .zip(&words[start..])
                .all(|(l, w)| l == w || fold_dotted_i(l) == fold_dotted_i(w));
            if !matched {
                continue;
            }
            for word in words[start + label.len()..].iter().take(LABEL_WINDOW) {
                let folded = fold_dotted_i(word);
                let stop = LABELS.stop_words.contains(&folded);
                if is_name_word(word) && !stop {
                    return Some(word.to_string());
                }
                if stop && !own.contains(&folded) && is_label_word(&folded) {
                    break;
                }
            }
        }
    }
    None
}

/// `folded` must already have dotted İ folded
fn is_label_word(folded: &str) -> bool {
    LABELS
        .given
        .iter()
        .chain(&LABELS.surname)
        .chain(&LABELS.birth_place)
        .flatten()
        .any(|l| fold_dotted_i(l) == folded)
}

fn is_stop_word(word: &str) -> bool {
    LABELS.stop_words.contains(&fold_dotted_i(word))
}

pub fn given_name_label(text: &str) -> Option<NameParts> {
    value_after_label(&tokens(text), &LABELS.given).map(|given| NameParts {
        given: Some(given),
        surname: None,
    })
}

pub fn surname_label(text: &str) -> Option<NameParts> {
    value_after_label(&tokens(text), &LABELS.surname).map(|surname| NameParts {
        given: None,
        surname: Some(surname),
    })
}

/// First two adjacent name words, neither a label nor a header word
pub fn capitalized_pair(text: &str) -> Option<NameParts> {
    let words = tokens(text);
    words
        .windows(2)
        .find(|pair| {
            pair.iter().all(|w| is_name_word(w) && !is_stop_word(w))
        })
        .map(|pair| NameParts {
            given: Some(pair[0].to_string()),
            surname: Some(pair[1].to_string()),
        })
}

const NATIONAL_ID_NAME_RULES: &[FieldRule<NameParts>] = &[
    FieldRule {
        name: "given_name_label",
        apply: given_name_label,
    },
    FieldRule {
        name: "surname_label",
        apply: surname_label,
    },
    FieldRule {
        name: "capitalized_pair",
        apply: capitalized_pair,
    },
];

const PASSPORT_NAME_RULES: &[FieldRule<NameParts>] = &[
    FieldRule {
        name: "surname_label",
        apply: surname_label,
    },
    FieldRule {
        name: "given_name_label",
        apply: given_name_label,
    },
    FieldRule {
        name: "capitalized_pair",
        apply: capitalized_pair,
    },
];

pub fn name_rules(document_type: DocumentType) -> &'static [FieldRule<NameParts>] {
    match document_type {
        DocumentType::NationalId => NATIONAL_ID_NAME_RULES,
        DocumentType::Passport => PASSPORT_NAME_RULES,
    }
}

// ============================================================================
// Birth date / place
// ============================================================================

/// `D.M.YYYY`, `D-M-YYYY` or `D/M/YYYY`, zero-padded to `DD.MM.YYYY`
pub fn day_month_year(text: &str) -> Option<String> {
    DATE.captures(text)
        .map(|caps| format!("{:0>2}.{:0>2}.{}", &caps[1], &caps[2], &caps[3]))
}

pub const BIRTH_DATE_RULES: &[FieldRule<String>] = &[FieldRule {
    name: "day_month_year",
    apply: day_month_year,
}];

pub fn labelled_birth_place(text: &str) -> Option<String> {
    let value = value_after_label(&tokens(text), &LABELS.birth_place)?;
    gazetteer::lookup_containing(&value).map(str::to_string)
}

pub fn mentioned_place(text: &str) -> Option<String> {
    gazetteer::first_mentioned(text).map(str::to_string)
}

pub const BIRTH_PLACE_RULES: &[FieldRule<String>] = &[
    FieldRule {
        name: "labelled_birth_place",
        apply: labelled_birth_place,
    },
    FieldRule {
        name: "mentioned_place",
        apply: mentioned_place,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleven_digit_run_requires_exact_length() {
        assert_eq!(eleven_digit_run("NO 123456789012 12345678901"), Some("12345678901".into()));
        assert_eq!(eleven_digit_run("1234567890"), None);
        assert_eq!(eleven_digit_run("TC12345678901X"), Some("12345678901".into()));
    }

    #[test]
    fn test_passport_number() {
        assert_eq!(passport_number("PASAPORT NO U12345678"), Some("U12345678".into()));
        assert_eq!(passport_number("U123456789 X"), Some("U123456789".into()));
        assert_eq!(passport_number("U1234567"), None);
    }

    #[test]
    fn test_day_month_year_pads() {
        assert_eq!(day_month_year("5.3.2020"), Some("05.03.2020".into()));
        assert_eq!(day_month_year("15-11-1990"), Some("15.11.1990".into()));
        assert_eq!(day_month_year("DOĞUM 1/2/1985"), Some("01.02.1985".into()));
        assert_eq!(day_month_year("1990"), None);
    }

    #[test]
    fn test_label_rules() {
        let text = "SOYADI / SURNAME YILMAZ ADI / GIVEN NAME(S) AHMET";
        assert_eq!(surname_label(text).unwrap().surname.as_deref(), Some("YILMAZ"));
        assert_eq!(given_name_label(text).unwrap().given.as_deref(), Some("AHMET"));
    }

    #[test]
    fn test_label_inside_longer_word_is_not_a_label() {
        // ADI inside SOYADI must not anchor a given name
        assert_eq!(given_name_label("SOYADI YILMAZ"), None);
    }

    #[test]
    fn test_label_value_stops_at_other_label() {
        assert_eq!(given_name_label("ADI SOYADI YILMAZ"), None);
    }

    #[test]
    fn test_label_matches_without_turkish_casing() {
        assert_eq!(labelled_birth_place("DOĞUM YERI IZMIR"), Some("İZMİR".into()));
    }

    #[test]
    fn test_capitalized_pair_skips_headers() {
        let parts = capitalized_pair("T.C. KIMLIK KARTI AHMET YILMAZ 12345678901").unwrap();
        assert_eq!(parts.given.as_deref(), Some("AHMET"));
        assert_eq!(parts.surname.as_deref(), Some("YILMAZ"));
        assert_eq!(capitalized_pair("REPUBLIC OF TURKEY 123"), None);
    }

    #[test]
    fn test_mixed_case_headers_are_not_names() {
        // "Son Geçerlilik" uppercases to GEÇERLILIK, not GEÇERLİLİK
        let text = crate::normalize::normalize(
            "Türkiye Cumhuriyeti Kimlik Kartı\nT.C. Kimlik No 12345678901\nSon Geçerlilik 01.01.2030\nAhmet Yılmaz",
        );
        let parts = capitalized_pair(&text).unwrap();
        assert_eq!(parts.given.as_deref(), Some("AHMET"));
        assert_eq!(parts.surname.as_deref(), Some("YILMAZ"));
        assert!(is_stop_word("VERILDIĞI"));
        assert!(is_stop_word("CUMHURIYETI"));
    }

    #[test]
    fn test_runner_fills_only_empty_slots() {
        let parts = run_name_rules(name_rules(DocumentType::NationalId), "ADI MEHMET KAYA DEMIR");
        assert_eq!(parts.given.as_deref(), Some("MEHMET"));
        assert_eq!(parts.surname.as_deref(), Some("KAYA"));
    }

    #[test]
    fn test_first_match_reports_rule() {
        let (rule, place) = first_match(BIRTH_PLACE_RULES, "DOĞUM YERİ ANKARA İZMİR").unwrap();
        assert_eq!(rule, "labelled_birth_place");
        assert_eq!(place, "ANKARA");

        let (rule, place) = first_match(BIRTH_PLACE_RULES, "AHMET İZMİR").unwrap();
        assert_eq!(rule, "mentioned_place");
        assert_eq!(place, "İZMİR");
    }
}
