//! Intent enumeration and the static intent → category table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classified purpose of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Food,
    Parking,
    /// Pharmacies, clinics, dentists, drugstores
    Medical,
    Shopping,
    EnglishLearning,
    Beauty,
    Lifestyle,
    /// A named brand or store ("肯塔基美語在哪")
    BrandSpecific,
    /// Questions about the store database itself
    CoverageStats,
    Directions,
    SelfIntro,
    /// Pure acknowledgements ("好", "謝謝")
    Confirmation,
    VagueChat,
    OutOfScope,
    /// Nothing matched
    General,
}

impl Intent {
    pub const ALL: [Intent; 15] = [
        Intent::Food,
        Intent::Parking,
        Intent::Medical,
        Intent::Shopping,
        Intent::EnglishLearning,
        Intent::Beauty,
        Intent::Lifestyle,
        Intent::BrandSpecific,
        Intent::CoverageStats,
        Intent::Directions,
        Intent::SelfIntro,
        Intent::Confirmation,
        Intent::VagueChat,
        Intent::OutOfScope,
        Intent::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Food => "FOOD",
            Intent::Parking => "PARKING",
            Intent::Medical => "MEDICAL",
            Intent::Shopping => "SHOPPING",
            Intent::EnglishLearning => "ENGLISH_LEARNING",
            Intent::Beauty => "BEAUTY",
            Intent::Lifestyle => "LIFESTYLE",
            Intent::BrandSpecific => "BRAND_SPECIFIC",
            Intent::CoverageStats => "COVERAGE_STATS",
            Intent::Directions => "DIRECTIONS",
            Intent::SelfIntro => "SELF_INTRO",
            Intent::Confirmation => "CONFIRMATION",
            Intent::VagueChat => "VAGUE_CHAT",
            Intent::OutOfScope => "OUT_OF_SCOPE",
            Intent::General => "GENERAL",
        }
    }

    /// Store categories this intent retrieves from
    pub fn categories(&self) -> &'static [&'static str] {
        CATEGORY_BY_INTENT
            .iter()
            .find(|(intent, _)| intent == self)
            .map(|(_, categories)| *categories)
            .unwrap_or(&[])
    }

    /// Intents answered from the store catalogue by category
    pub fn is_category_intent(&self) -> bool {
        !self.categories().is_empty()
    }

    /// Intents that honour an all-partners request. A brand question keeps
    /// its name lookup; statistics, self-intro and out-of-scope never list.
    pub fn accepts_partner_listing(&self) -> bool {
        !matches!(
            self,
            Intent::BrandSpecific | Intent::CoverageStats | Intent::SelfIntro | Intent::OutOfScope
        )
    }

    /// Intents whose reply may list stores
    pub fn lists_stores(&self) -> bool {
        self.is_category_intent() || *self == Intent::BrandSpecific
    }

    /// Human label used in reply templates
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Food => "美食餐廳",
            Intent::Parking => "停車場",
            Intent::Medical => "醫療院所",
            Intent::Shopping => "購物商家",
            Intent::EnglishLearning => "英語學習機構",
            Intent::Beauty => "美容美髮店家",
            Intent::Lifestyle => "生活服務",
            Intent::BrandSpecific => "指定商家",
            Intent::CoverageStats => "商家統計",
            Intent::Directions => "交通資訊",
            Intent::SelfIntro => "自我介紹",
            Intent::Confirmation => "確認",
            Intent::VagueChat => "閒聊",
            Intent::OutOfScope => "服務範圍外",
            Intent::General => "一般詢問",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == wanted)
            .ok_or_else(|| format!("unknown intent '{}'", s))
    }
}

/// Static lookup from intent to store categories.
pub const CATEGORY_BY_INTENT: &[(Intent, &[&str])] = &[
    (Intent::Food, &["餐飲美食"]),
    (Intent::Parking, &["停車場"]),
    (Intent::Medical, &["醫療保健"]),
    (Intent::Shopping, &["購物"]),
    (Intent::EnglishLearning, &["教育培訓"]),
    (Intent::Beauty, &["美容美髮"]),
    (Intent::Lifestyle, &["生活服務", "休閒娛樂"]),
];

/// Medical sub-types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MedicalKind {
    #[serde(rename = "藥局")]
    Pharmacy,
    #[serde(rename = "診所")]
    Clinic,
    #[serde(rename = "牙醫")]
    Dentist,
    #[serde(rename = "藥妝")]
    Drugstore,
}

impl MedicalKind {
    pub fn label(&self) -> &'static str {
        match self {
            MedicalKind::Pharmacy => "藥局",
            MedicalKind::Clinic => "診所",
            MedicalKind::Dentist => "牙醫",
            MedicalKind::Drugstore => "藥妝",
        }
    }
}

impl fmt::Display for MedicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
