//! Entity label canonicalization
//!
//! Detectors and operators use many spellings for the same entity category
//! (`EMAIL`, `mail`, `e-mail`, `COURRIEL`, ...). Everything stored in the
//! configuration and exchanged with detectors uses the canonical label.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Canonical labels, aligned with the usual NER/analyzer vocabularies
pub const CANONICAL_ENTITIES: &[&str] = &[
    "CREDIT_CARD",
    "DATE_TIME",
    "EMAIL_ADDRESS",
    "IBAN",
    "IP_ADDRESS",
    "LOCATION",
    "ORGANIZATION",
    "PERSON",
    "PHONE_NUMBER",
    "URL",
    "US_SSN",
];

/// Synonym -> canonical label (keys uppercase, `-` already folded to `_`)
const SYNONYMS: &[(&str, &str)] = &[
    // Email
    ("EMAIL", "EMAIL_ADDRESS"),
    ("MAIL", "EMAIL_ADDRESS"),
    ("COURRIEL", "EMAIL_ADDRESS"),
    ("E_MAIL", "EMAIL_ADDRESS"),
    ("E_MAIL_ADDRESS", "EMAIL_ADDRESS"),
    // Phone
    ("PHONE", "PHONE_NUMBER"),
    ("TELEPHONE", "PHONE_NUMBER"),
    ("MOBILE", "PHONE_NUMBER"),
    ("TÉLÉPHONE", "PHONE_NUMBER"),
    ("NUMERO_TELEPHONE", "PHONE_NUMBER"),
    ("NUMÉRO_TÉLÉPHONE", "PHONE_NUMBER"),
    // Credit card
    ("CREDIT_CARD_NUMBER", "CREDIT_CARD"),
    ("CARD_NUMBER", "CREDIT_CARD"),
    ("CB", "CREDIT_CARD"),
    ("NUMERO_CARTE", "CREDIT_CARD"),
    ("NUMÉRO_CARTE", "CREDIT_CARD"),
    ("CARTE_BANCAIRE", "CREDIT_CARD"),
    // SSN
    ("SOCIAL_SECURITY_NUMBER", "US_SSN"),
    ("SOCIAL_SECURITY", "US_SSN"),
    ("SSN", "US_SSN"),
    ("SECURITE_SOCIALE", "US_SSN"),
    ("NUMERO_SECURITE_SOCIALE", "US_SSN"),
    ("NUMÉRO_SÉCURITÉ_SOCIALE", "US_SSN"),
    // Date
    ("DATE_OF_BIRTH", "DATE_TIME"),
    ("BIRTH_DATE", "DATE_TIME"),
    ("DOB", "DATE_TIME"),
    ("DATE", "DATE_TIME"),
    // Person
    ("PERSON_NAME", "PERSON"),
    ("FULL_NAME", "PERSON"),
    ("NAME", "PERSON"),
    ("PER", "PERSON"),
    ("PERSONNE", "PERSON"),
    ("NOM", "PERSON"),
    ("PRENOM", "PERSON"),
    ("PRÉNOM", "PERSON"),
    // Location / address
    ("ADDRESS", "LOCATION"),
    ("PLACE", "LOCATION"),
    ("LOC", "LOCATION"),
    ("GPE", "LOCATION"),
    ("ADRESSE", "LOCATION"),
    ("ADRESSE_POSTALE", "LOCATION"),
    ("LOCALISATION", "LOCATION"),
    ("VILLE", "LOCATION"),
    ("CODE_POSTAL", "LOCATION"),
    // Organization
    ("ORG", "ORGANIZATION"),
    ("COMPANY", "ORGANIZATION"),
    ("ENTREPRISE", "ORGANIZATION"),
    ("SOCIETE", "ORGANIZATION"),
    ("SOCIÉTÉ", "ORGANIZATION"),
    // Bank
    ("BANK_ACCOUNT", "IBAN"),
    ("IBAN_CODE", "IBAN"),
    // Web
    ("WEBSITE", "URL"),
    ("LINK", "URL"),
    ("SITE", "URL"),
    ("SITE_WEB", "URL"),
    ("LIEN", "URL"),
    // IP
    ("IP", "IP_ADDRESS"),
    ("ADRESSE_IP", "IP_ADDRESS"),
];

static ENTITY_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    CANONICAL_ENTITIES
        .iter()
        .map(|label| (*label, *label))
        .chain(SYNONYMS.iter().copied())
        .collect()
});

/// Result of canonicalizing a free-form label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    /// Canonical label, or the input unchanged when unknown
    pub label: String,

    /// Whether the label belongs to the known vocabulary
    pub is_known: bool,
}

/// Normalize an entity label to the canonical vocabulary.
///
/// Trims, uppercases and folds `-` to `_` before lookup. Unknown labels are
/// returned unchanged with `is_known = false`; callers creating NER or
/// hybrid fields must reject them.
pub fn canonicalize(label: &str) -> Canonical {
    let key = label.trim().to_uppercase().replace('-', "_");
    if key.is_empty() {
        return Canonical {
            label: String::new(),
            is_known: false,
        };
    }

    match ENTITY_MAPPING.get(key.as_str()) {
        Some(canonical) => Canonical {
            label: (*canonical).to_string(),
            is_known: true,
        },
        None => Canonical {
            label: label.to_string(),
            is_known: false,
        },
    }
}

/// Whether `label` is already a canonical label (no synonym folding)
pub fn is_canonical(label: &str) -> bool {
    CANONICAL_ENTITIES.contains(&label)
}

/// Supported vocabulary listing
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SupportedEntities {
    pub canonical: Vec<String>,
    pub synonyms: Vec<String>,
}

/// List the canonical labels, and optionally every accepted synonym
pub fn list_supported_entities(include_synonyms: bool) -> SupportedEntities {
    let canonical = CANONICAL_ENTITIES.iter().map(|s| s.to_string()).collect();
    let mut synonyms: Vec<String> = if include_synonyms {
        SYNONYMS.iter().map(|(synonym, _)| synonym.to_string()).collect()
    } else {
        Vec::new()
    };
    synonyms.sort();

    SupportedEntities {
        canonical,
        synonyms,
    }
}
