use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SCRUB: Regex = Regex::new(r"[^\p{L}\p{N}\s]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Normalize text for indexing and querying: NFKC, lowercase, strip
/// punctuation to spaces, drop stopwords, stem what remains.
///
/// Pure and total. Empty input yields an empty string. The build and query
/// paths must both go through this function; keyword scores are only
/// meaningful when the two sides agree on token forms.
pub fn normalize(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    let scrubbed = SCRUB.replace_all(&lowered, " ");
    let mut out: Vec<String> = Vec::new();
    for token in scrubbed.split_whitespace() {
        if STOPWORDS.contains(token) {
            continue;
        }
        let stem = STEMMER.stem(token);
        if stem.is_empty() {
            // Reduction produced nothing; keep the surface form.
            out.push(token.to_string());
        } else {
            out.push(stem.to_string());
        }
    }
    out.join(" ")
}

/// Normalized tokens of `text` as a set.
pub fn terms(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
