//! Word tokenizer shared by indexing and querying.
//!
//! Text is split on Unicode word boundaries (UAX #29), punctuation and
//! whitespace are dropped, and every token is lowercased. Documents and
//! queries go through the same function, so a query token matches a document
//! token exactly when their lowercase word forms are equal.
//!
//! ```
//! use kiosk::keyword_index::tokenizer::tokenize;
//!
//! assert_eq!(tokenize("Dark Down Jacket: warm coat"), vec!["dark", "down", "jacket", "warm", "coat"]);
//! ```

use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into lowercase word tokens, in order, keeping duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|word| word.to_lowercase()).collect()
}

/// Distinct query tokens in first-seen order.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Render the query as a Postgres `tsquery` requiring every term.
///
/// `"warm coat"` becomes `"warm & coat"`. Tokens are already stripped of
/// punctuation, so no tsquery operator can leak in from user input.
pub fn and_query(text: &str) -> String {
    query_terms(text).join(" & ")
}
