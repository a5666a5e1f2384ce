//! Default guard types and shared patterns

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use piiguard_core::{
    GuardConfigStore, Result,
    guard::{DetectionMode, NewFieldDefinition, NewGuardType, NewRegexPattern},
};

/// Seed entry for a shared regex pattern
#[derive(Debug, Clone, Copy)]
pub struct PatternSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub pattern: &'static str,
    pub description: &'static str,
    pub example: &'static str,
    pub flags: &'static str,
}

/// Seed entry for a field; `rule` is the pattern name or entity type
#[derive(Debug, Clone, Copy)]
pub struct FieldSeed {
    pub field_name: &'static str,
    pub display_name: &'static str,
    pub mode: DetectionMode,
    pub rule: &'static str,
    pub example: &'static str,
}

/// Seed entry for a guard type and its fields
#[derive(Debug, Clone, Copy)]
pub struct GuardSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub fields: &'static [FieldSeed],
}

const fn regex_field(
    field_name: &'static str,
    display_name: &'static str,
    pattern: &'static str,
    example: &'static str,
) -> FieldSeed {
    FieldSeed {
        field_name,
        display_name,
        mode: DetectionMode::Regex,
        rule: pattern,
        example,
    }
}

const fn ner_field(
    field_name: &'static str,
    display_name: &'static str,
    entity_type: &'static str,
    example: &'static str,
) -> FieldSeed {
    FieldSeed {
        field_name,
        display_name,
        mode: DetectionMode::Ner,
        rule: entity_type,
        example,
    }
}

pub const DEFAULT_PATTERNS: &[PatternSeed] = &[
    PatternSeed {
        name: "email",
        display_name: "E-mail",
        pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        description: "Adresse e-mail standard",
        example: "john.doe@mail.com",
        flags: "i",
    },
    PatternSeed {
        name: "french_phone",
        display_name: "Téléphone FR",
        pattern: r"(?:\+33\s?|0)[1-9](?:[ .-]?\d{2}){4}",
        description: "Numéro FR divers formats",
        example: "+33 6 12 34 56 78",
        flags: "",
    },
    PatternSeed {
        name: "ip_address",
        display_name: "Adresse IP",
        pattern: r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b",
        description: "IPv4",
        example: "192.168.1.10",
        flags: "",
    },
    PatternSeed {
        name: "date_generic",
        display_name: "Date (générique)",
        pattern: r"\b(?:\d{4}[-/]\d{2}[-/]\d{2}|\d{2}/\d{2}/\d{4})\b",
        description: "aaaa-mm-jj ou jj/mm/aaaa",
        example: "1990-07-12",
        flags: "",
    },
    PatternSeed {
        name: "fr_nir",
        display_name: "NIR France",
        pattern: r"\b[12]\s?\d{2}\s?\d{2}\s?\d{2}\s?\d{3}\s?\d{3}\s?\d{2}\b",
        description: "Sécurité sociale FR",
        example: "1 94 02 75 123 456 19",
        flags: "",
    },
    PatternSeed {
        name: "passport_generic",
        display_name: "Passeport (générique)",
        pattern: r"\b[A-Z]{2}\d{7}\b",
        description: "Passeport simplifié",
        example: "FR1234567",
        flags: "",
    },
    PatternSeed {
        name: "driver_license_generic",
        display_name: "Permis (générique)",
        pattern: r"\b[0-9A-Z]{12,16}\b",
        description: "Permis format large",
        example: "AB123456789012",
        flags: "i",
    },
    PatternSeed {
        name: "credit_card",
        display_name: "Carte bancaire",
        pattern: r"\b(?:\d[ -]*?){13,19}\b",
        description: "Numéro carte (brut)",
        example: "4532 9876 1122 4456",
        flags: "",
    },
    PatternSeed {
        name: "expiry_mm_yy",
        display_name: "Expiration MM/YY",
        pattern: r"\b(0[1-9]|1[0-2])/(\d{2})\b",
        description: "Date expiration carte",
        example: "08/27",
        flags: "",
    },
    PatternSeed {
        name: "cvv_3_4",
        display_name: "CVV 3-4",
        pattern: r"\b\d{3,4}\b",
        description: "Code sécurité carte",
        example: "381",
        flags: "",
    },
    PatternSeed {
        name: "iban",
        display_name: "IBAN (UE)",
        pattern: r"\b[A-Z]{2}[0-9A-Z]{13,30}\b",
        description: "IBAN compact",
        example: "FR7630006000011234567890189",
        flags: "",
    },
    PatternSeed {
        name: "account_number_generic",
        display_name: "Compte (générique)",
        pattern: r"\b\d{8,16}\b",
        description: "Numéro de compte simple",
        example: "0123456789",
        flags: "",
    },
];

pub const DEFAULT_GUARDS: &[GuardSeed] = &[
    GuardSeed {
        name: "InfoPerso",
        display_name: "Données de Contact",
        description: "Informations de contact et localisation",
        icon: "📍",
        color: "#3498db",
        fields: &[
            regex_field("email", "Adresse e-mail", "email", "marie.dubois@exemple.fr"),
            regex_field("phone", "Téléphone", "french_phone", "06 12 34 56 78"),
            ner_field("address", "Adresse postale", "LOCATION", "12 rue de la Paix, Paris"),
            ner_field("company", "Entreprise", "ORGANIZATION", "Acme SARL"),
            regex_field("ip_address", "Adresse IP", "ip_address", "192.168.1.10"),
        ],
    },
    GuardSeed {
        name: "TypeA",
        display_name: "Données Personnelles Identifiantes",
        description: "Identité personnelle",
        icon: "🆔",
        color: "#e74c3c",
        fields: &[
            ner_field("name", "Nom & Prénom", "PERSON", "Marie Dubois"),
            regex_field("birth_date", "Date de naissance", "date_generic", "1990-07-12"),
            regex_field("social_security", "N° Sécurité Sociale (FR)", "fr_nir", "1 94 02 75 123 456 19"),
            regex_field("passport", "Passeport", "passport_generic", "FR1234567"),
            regex_field("driver_license", "Permis de conduire", "driver_license_generic", "AB123456789012"),
        ],
    },
    GuardSeed {
        name: "TypeB",
        display_name: "Données Financières",
        description: "Informations bancaires et paiement",
        icon: "💳",
        color: "#f39c12",
        fields: &[
            regex_field("credit_card", "Carte bancaire", "credit_card", "4532 9876 1122 4456"),
            regex_field("expiry_date", "Date d'expiration", "expiry_mm_yy", "08/27"),
            regex_field("cvv", "Code de sécurité (CVV)", "cvv_3_4", "381"),
            regex_field("iban", "IBAN", "iban", "FR7630006000011234567890189"),
            regex_field("account_number", "N° de compte", "account_number_generic", "0123456789"),
        ],
    },
];

/// What a seeding run added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub patterns_added: Vec<String>,
    pub guards_created: Vec<String>,
    pub fields_created: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.patterns_added.is_empty() && self.guards_created.is_empty() && self.fields_created == 0
    }
}

impl PatternSeed {
    fn to_input(self) -> NewRegexPattern {
        let mut input = NewRegexPattern::new(self.name, self.display_name, self.pattern)
            .with_flags(self.flags)
            .with_examples([self.example]);
        input.description = self.description.to_string();
        input
    }
}

impl GuardSeed {
    fn to_input(self) -> NewGuardType {
        NewGuardType {
            name: self.name.to_string(),
            display_name: self.display_name.to_string(),
            description: self.description.to_string(),
            icon: Some(self.icon.to_string()),
            color: Some(self.color.to_string()),
        }
    }
}

impl FieldSeed {
    fn to_input(self) -> NewFieldDefinition {
        let input = match self.mode {
            DetectionMode::Ner => NewFieldDefinition::ner(self.field_name, self.display_name, self.rule),
            _ => NewFieldDefinition::regex(self.field_name, self.display_name, self.rule),
        };
        input.with_example(self.example)
    }
}

/// Install the default patterns, guard types and fields.
///
/// Safe to run repeatedly: rows that already exist are left untouched and
/// only the missing ones are reported.
pub async fn seed_defaults(store: &dyn GuardConfigStore) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let existing_patterns: HashSet<String> = store
        .list_regex_patterns()
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    for seed in DEFAULT_PATTERNS {
        if existing_patterns.contains(seed.name) {
            continue;
        }
        store.create_regex_pattern(seed.to_input()).await?;
        report.patterns_added.push(seed.name.to_string());
    }

    let existing_guards: HashSet<String> = store
        .list_guard_types()
        .await?
        .into_iter()
        .map(|g| g.name)
        .collect();
    for guard in DEFAULT_GUARDS {
        if !existing_guards.contains(guard.name) {
            store.create_guard_type(guard.to_input()).await?;
            report.guards_created.push(guard.name.to_string());
        }

        let existing_fields: HashSet<String> = store
            .list_active_fields_for(guard.name)
            .await?
            .into_iter()
            .map(|f| f.field_name)
            .collect();
        for field in guard.fields {
            if existing_fields.contains(field.field_name) {
                debug!("Field '{}' already present on '{}'", field.field_name, guard.name);
                continue;
            }
            store.create_field_definition(guard.name, field.to_input()).await?;
            report.fields_created += 1;
        }
    }

    info!(
        "Seeded defaults: {} patterns, {} guard types, {} fields",
        report.patterns_added.len(),
        report.guards_created.len(),
        report.fields_created
    );
    Ok(report)
}
