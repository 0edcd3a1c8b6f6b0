//! Text normalization applied before any field rule runs

/// Turkish capitals outside A-Z
const TURKISH_CAPITALS: [char; 6] = ['Ç', 'Ğ', 'İ', 'Ö', 'Ş', 'Ü'];

/// Punctuation kept for dates, document numbers and labels like `NAME(S)`
const KEPT_PUNCTUATION: [char; 5] = ['.', '-', '/', '(', ')'];

pub fn is_letter(c: char) -> bool {
    c.is_ascii_uppercase() || TURKISH_CAPITALS.contains(&c)
}

fn is_allowed(c: char) -> bool {
    is_letter(c) || c.is_ascii_digit() || c.is_whitespace() || KEPT_PUNCTUATION.contains(&c)
}

/// Uppercase, replace characters outside the allow-list with spaces, collapse
/// whitespace runs and trim.
pub fn normalize(raw: &str) -> String {
    let upper = raw.to_uppercase();
    let replaced: String = upper
        .chars()
        .map(|c| if is_allowed(c) { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Words of normalized text. `/` separates bilingual labels such as
/// `SOYADI/SURNAME`, so it splits words too.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split(|c: char| c.is_whitespace() || c == '/')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Letters only, at least two of them
pub fn is_name_word(token: &str) -> bool {
    token.chars().count() >= 2 && token.chars().all(is_letter)
}

/// Fold dotted capital İ onto I so OCR output without Turkish casing still
/// matches Turkish spellings.
pub fn fold_dotted_i(text: &str) -> String {
    text.replace('İ', "I")
}
