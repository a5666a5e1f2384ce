//! Lexical context checks used to reject implausible matches

use serde::{Deserialize, Serialize};

/// When a bare 3-4 digit number counts as a payment security code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityCodeRules {
    /// How many characters before the match are searched for a trigger
    pub lookback_chars: usize,

    /// Trigger words, matched case-insensitively
    pub triggers: Vec<String>,
}

impl Default for SecurityCodeRules {
    fn default() -> Self {
        Self {
            lookback_chars: 40,
            triggers: ["cvv", "cvc", "security code", "code de sécurité", "cryptogramme"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SecurityCodeRules {
    /// Accept `text[start..end]` as a security code.
    ///
    /// Requires that the match is not part of a longer digit run and that a
    /// trigger word appears in the lookback window.
    pub fn accepts(&self, text: &str, start: usize, end: usize) -> bool {
        !touches_digit(text, start, end) && self.has_trigger_before(text, start)
    }

    pub fn has_trigger_before(&self, text: &str, start: usize) -> bool {
        if self.lookback_chars == 0 || !text.is_char_boundary(start) {
            return false;
        }
        let prefix = &text[..start];
        let window_start = prefix
            .char_indices()
            .rev()
            .nth(self.lookback_chars - 1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let window = prefix[window_start..].to_lowercase();

        self.triggers
            .iter()
            .any(|t| !t.is_empty() && window.contains(&t.to_lowercase()))
    }
}

/// Whether the span is glued to another digit on either side
pub fn touches_digit(text: &str, start: usize, end: usize) -> bool {
    let before = text.get(..start).and_then(|s| s.chars().next_back());
    let after = text.get(end..).and_then(|s| s.chars().next());
    before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit())
}

/// Whether the value is a bare 3 or 4 digit number
pub fn is_short_number(value: &str) -> bool {
    let value = value.trim();
    (3..=4).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

/// Common French words that are never sensitive on their own
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    // Greetings
    "salut", "bonjour", "bonsoir", "au revoir", "à bientôt",
    // Pronouns and articles
    "je", "tu", "il", "elle", "nous", "vous", "ils", "elles", "le", "la", "les", "un", "une",
    "des", "du", "de", "d'", "ce", "cette", "ces", "mon", "ma", "mes", "ton", "ta", "tes", "son",
    "sa", "ses", "notre", "nos", "votre", "vos", "leur", "leurs",
    // Frequent verbs
    "être", "avoir", "faire", "dire", "aller", "voir", "savoir", "pouvoir", "falloir", "vouloir",
    "venir", "prendre", "donner", "est", "sont", "ai", "as", "a", "avons", "avez", "ont", "suis",
    "es", "sommes", "êtes",
    // Conjunctions and prepositions
    "et", "ou", "mais", "donc", "or", "ni", "car", "dans", "sur", "avec", "sans", "pour", "par",
    "contre", "sous", "vers", "chez", "depuis", "pendant", "avant", "après",
    // Expressions
    "c'est", "ce sont", "il y a", "voilà", "voici", "oui", "non", "peut-être", "bien", "mal",
    "très", "plus", "moins",
    // Time
    "hier", "aujourd'hui", "demain", "maintenant", "toujours", "jamais", "souvent", "parfois",
    "quelquefois", "encore", "déjà",
    // Small numbers
    "deux", "trois", "quatre", "cinq", "six", "sept", "huit", "neuf", "dix",
];

/// Values that are never a plausible instance of the given field
const SUSPICIOUS_VALUES: &[(&str, &[&str])] = &[
    (
        "address",
        &[
            "salut", "bonjour", "bonsoir", "hello", "hi", "oui", "non", "peut-être", "ok",
            "d'accord", "merci", "s'il vous plaît", "excusez-moi",
        ],
    ),
    (
        "company",
        &[
            "c'est", "ce sont", "il y a", "voilà", "voici", "je", "tu", "il", "elle", "nous",
            "vous", "ils", "elles", "le", "la", "les", "un", "une", "des", "du", "de",
        ],
    ),
    (
        "name",
        &["le", "la", "les", "un", "une", "des", "et", "ou", "mais", "donc", "car"],
    ),
];

/// Whether `value` is a known false positive for `field`
pub fn is_suspicious(field: &str, value: &str) -> bool {
    let value = value.trim().to_lowercase();
    SUSPICIOUS_VALUES
        .iter()
        .find(|(name, _)| *name == field)
        .is_some_and(|(_, values)| values.contains(&value.as_str()))
}
