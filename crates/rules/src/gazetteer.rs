//! Embedded list of known birth places

use once_cell::sync::Lazy;

use crate::normalize::fold_dotted_i;

struct Place {
    name: &'static str,
    folded: String,
}

static PLACES: Lazy<Vec<Place>> = Lazy::new(|| {
    include_str!("../data/places.txt")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|name| Place {
            name,
            folded: fold_dotted_i(name),
        })
        .collect()
});

/// Place names in lookup order
pub fn places() -> impl Iterator<Item = &'static str> {
    PLACES.iter().map(|p| p.name)
}

/// First place whose name contains `token` or is contained in it.
///
/// Matching is loose; short tokens can hit the wrong place.
pub fn lookup_containing(token: &str) -> Option<&'static str> {
    let token = fold_dotted_i(token);
    if token.is_empty() {
        return None;
    }
    PLACES
        .iter()
        .find(|p| p.folded.contains(&token) || token.contains(&p.folded))
        .map(|p| p.name)
}

/// First place, in list order, appearing anywhere in `text`
pub fn first_mentioned(text: &str) -> Option<&'static str> {
    let text = fold_dotted_i(text);
    PLACES.iter().find(|p| text.contains(&p.folded)).map(|p| p.name)
}
