//! Content-safety gate applied to every generated text before it is returned.
//!
//! A plain banned-phrase match: the text is lowercased and reduced to
//! alphanumeric words, and a phrase matches only on whole-word boundaries
//! ("bombastic" does not match "bomb").

const BANNED_PHRASES: &[&str] = &[
    "bomb",
    "explosives",
    "terrorist",
    "terrorism",
    "suicide",
    "self harm",
    "kill yourself",
    "hate speech",
    "racial slur",
    "pornography",
    "nazi",
];

/// `" word word word "`: padded so every phrase check can use surrounding spaces.
fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + 2);
    normalized.push(' ');
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        normalized.push_str(&word.to_lowercase());
        normalized.push(' ');
    }
    normalized
}

/// `false` when the text contains any banned phrase.
pub fn is_safe(text: &str) -> bool {
    let normalized = normalize(text);
    !BANNED_PHRASES
        .iter()
        .any(|phrase| normalized.contains(&format!(" {phrase} ")))
}
