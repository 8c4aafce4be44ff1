//! Language policy table.
//!
//! Maps a target-language identifier to the writing instruction appended to
//! every generation prompt. Adding a language means adding a row.

/// One supported language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguagePolicy {
    /// Canonical name, e.g. "Arabic"
    pub name: &'static str,

    /// ISO 639-1 code
    pub code: &'static str,

    /// Phrasing and script instruction for the generator
    pub instruction: &'static str,
}

const LANGUAGES: &[LanguagePolicy] = &[
    LanguagePolicy {
        name: "English",
        code: "en",
        instruction: "Write entirely in natural, fluent English.",
    },
    LanguagePolicy {
        name: "Arabic",
        code: "ar",
        instruction: "Write entirely in Modern Standard Arabic using Arabic script, \
            with natural right-to-left phrasing. Do not mix in Latin-script words \
            except for brand names and hashtags.",
    },
    LanguagePolicy {
        name: "French",
        code: "fr",
        instruction: "Write entirely in French with correct accents and typographic \
            spacing before ? ! : ;.",
    },
    LanguagePolicy {
        name: "Spanish",
        code: "es",
        instruction: "Write entirely in neutral Spanish, using opening ¿ and ¡ marks.",
    },
    LanguagePolicy {
        name: "German",
        code: "de",
        instruction: "Write entirely in German, capitalizing nouns and using the \
            informal 'du' form for the audience.",
    },
    LanguagePolicy {
        name: "Portuguese",
        code: "pt",
        instruction: "Write entirely in Portuguese with correct diacritics.",
    },
    LanguagePolicy {
        name: "Italian",
        code: "it",
        instruction: "Write entirely in Italian with correct accents.",
    },
    LanguagePolicy {
        name: "Turkish",
        code: "tr",
        instruction: "Write entirely in Turkish using the Turkish alphabet \
            (ç, ğ, ı, ö, ş, ü).",
    },
    LanguagePolicy {
        name: "Hindi",
        code: "hi",
        instruction: "Write entirely in Hindi using Devanagari script.",
    },
    LanguagePolicy {
        name: "Urdu",
        code: "ur",
        instruction: "Write entirely in Urdu using Nastaliq-style Arabic script.",
    },
    LanguagePolicy {
        name: "Indonesian",
        code: "id",
        instruction: "Write entirely in Indonesian (Bahasa Indonesia).",
    },
];

impl LanguagePolicy {
    /// Entry used for unrecognized identifiers
    pub fn default_policy() -> &'static LanguagePolicy {
        &LANGUAGES[0]
    }

    /// Look up by name or code (case-insensitive); unknown ids get the default
    pub fn lookup(id: &str) -> &'static LanguagePolicy {
        Self::find(id).unwrap_or_else(Self::default_policy)
    }

    /// Exact lookup without fallback
    pub fn find(id: &str) -> Option<&'static LanguagePolicy> {
        let id = id.trim();
        LANGUAGES
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(id) || l.code.eq_ignore_ascii_case(id))
    }

    /// Every supported language
    pub fn all() -> &'static [LanguagePolicy] {
        LANGUAGES
    }
}
