use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Narration languages the voiceover agent can target
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    #[default]
    Vi,
    Zh,
    Ja,
    Ko,
    Es,
    Fr,
    De,
    Pt,
    Th,
}

pub struct LanguageInfo {
    pub code: LanguageCode,
    pub name: &'static str,
    pub native: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo {
        code: LanguageCode::En,
        name: "English",
        native: "English",
    },
    LanguageInfo {
        code: LanguageCode::Vi,
        name: "Vietnamese",
        native: "Tiếng Việt",
    },
    LanguageInfo {
        code: LanguageCode::Zh,
        name: "Chinese",
        native: "中文",
    },
    LanguageInfo {
        code: LanguageCode::Ja,
        name: "Japanese",
        native: "日本語",
    },
    LanguageInfo {
        code: LanguageCode::Ko,
        name: "Korean",
        native: "한국어",
    },
    LanguageInfo {
        code: LanguageCode::Es,
        name: "Spanish",
        native: "Español",
    },
    LanguageInfo {
        code: LanguageCode::Fr,
        name: "French",
        native: "Français",
    },
    LanguageInfo {
        code: LanguageCode::De,
        name: "German",
        native: "Deutsch",
    },
    LanguageInfo {
        code: LanguageCode::Pt,
        name: "Portuguese",
        native: "Português",
    },
    LanguageInfo {
        code: LanguageCode::Th,
        name: "Thai",
        native: "ไทย",
    },
];

impl LanguageCode {
    pub fn info(self) -> &'static LanguageInfo {
        // Table order matches declaration order
        &SUPPORTED_LANGUAGES[self as usize]
    }

    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Vi => "vi",
            LanguageCode::Zh => "zh",
            LanguageCode::Ja => "ja",
            LanguageCode::Ko => "ko",
            LanguageCode::Es => "es",
            LanguageCode::Fr => "fr",
            LanguageCode::De => "de",
            LanguageCode::Pt => "pt",
            LanguageCode::Th => "th",
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn native(self) -> &'static str {
        self.info().native
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|lang| lang.code.code() == wanted || lang.name.to_lowercase() == wanted)
            .map(|lang| lang.code)
            .ok_or_else(|| {
                let codes: Vec<&str> = SUPPORTED_LANGUAGES.iter().map(|l| l.code.code()).collect();
                format!(
                    "unsupported language '{}' (expected one of: {})",
                    s,
                    codes.join(", ")
                )
            })
    }
}
