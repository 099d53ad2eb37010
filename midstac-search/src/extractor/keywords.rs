//! Keyword phrases: whatever is left of the request once spatial, temporal
//! and limit expressions have been masked out and filler words dropped.

/// Conversational and catalog-generic words that never make a useful keyword.
const FILLER_WORDS: &[&str] = &[
    "find", "show", "get", "give", "search", "searching", "look", "looking", "list", "want",
    "need", "like", "would", "could", "can", "please", "data", "dataset", "datasets", "imagery",
    "image", "images", "product", "products", "collection", "collections", "granule", "granules",
    "result", "results", "record", "records", "information", "info", "available", "related",
    "year", "years", "month", "months", "day", "days", "week", "weeks", "events", "episodes",
    "period", "periods", "time",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "for", "about", "on", "in", "over", "at", "near", "around", "across",
    "within", "with", "from", "to", "and", "or", "me", "i", "i'm", "i'd", "you", "my", "we", "us",
    "our", "some", "any", "all", "that", "this", "these", "those", "which", "what", "where",
    "when", "is", "are", "was", "were", "be", "there", "it", "its", "by", "between", "during",
    "since", "after", "before", "until", "through", "into", "per", "via", "as", "than", "do",
    "does", "have", "has",
];

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '\'' | '.' | '/' | '+')
}

fn flush<'a>(phrases: &mut Vec<Vec<&'a str>>, current: &mut Vec<&'a str>) {
    if !current.is_empty() {
        phrases.push(std::mem::take(current));
    }
}

fn is_dropped(token: &str) -> bool {
    let lower = token.to_lowercase();
    FILLER_WORDS.contains(&lower.as_str()) || STOPWORDS.contains(&lower.as_str())
}

/// Split `text` into keyword phrases.
///
/// Kept tokens that are adjacent (separated only by whitespace) form one
/// phrase. Dropped words, punctuation and masked regions end a phrase.
/// Phrases made only of digits are discarded and duplicates are removed
/// case-insensitively, keeping the first spelling.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut phrases: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let mut rest = text;
    while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
        rest = &rest[start..];
        let len = rest.find(|c: char| !is_token_char(c)).unwrap_or(rest.len());
        if len == 0 {
            // Punctuation or a masked character.
            flush(&mut phrases, &mut current);
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            rest = &rest[skip..];
            continue;
        }
        let raw = &rest[..len];
        rest = &rest[len..];

        let ends_sentence = raw.ends_with('.');
        let token = raw.trim_matches(|c: char| matches!(c, '.' | '-' | '\'' | '/'));
        if token.is_empty() || is_dropped(token) {
            flush(&mut phrases, &mut current);
        } else {
            current.push(token);
        }
        if ends_sentence {
            flush(&mut phrases, &mut current);
        }
    }
    flush(&mut phrases, &mut current);

    let mut seen: Vec<String> = Vec::new();
    let mut keywords = Vec::new();
    for tokens in phrases {
        if tokens.iter().all(|t| t.chars().all(|c| c.is_ascii_digit())) {
            continue;
        }
        let phrase = tokens.join(" ");
        let lower = phrase.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        keywords.push(phrase);
    }
    keywords
}
