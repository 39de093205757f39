//! Disease Knowledge Base
//!
//! Static mapping from disease name to crop, severity, symptoms and treatment
//! guidance. Loaded once per process, immutable. The `confidence` field is a
//! baseline percentage used only when no model produced a real value.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Disease severity tier. Open for forward compatibility: unknown strings
/// round-trip through `Other` instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    High,
    Medium,
    None,
    Other(String),
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "High" => Severity::High,
            "Medium" => Severity::Medium,
            "None" => Severity::None,
            _ => Severity::Other(s),
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        match s {
            Severity::High => "High".to_string(),
            Severity::Medium => "Medium".to_string(),
            Severity::None => "None".to_string(),
            Severity::Other(v) => v,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::None => write!(f, "None"),
            Severity::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Treatment guidance for one disease
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentInfo {
    pub chemical: String,
    pub organic: String,
    pub prevention: String,
}

/// One disease class and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub crop: String,
    pub severity: Severity,
    pub symptoms: String,
    pub treatment: TreatmentInfo,
    /// Baseline confidence percentage
    pub confidence: u32,
}

fn record(
    crop: &str,
    severity: Severity,
    symptoms: &str,
    chemical: &str,
    organic: &str,
    prevention: &str,
    confidence: u32,
) -> DiseaseRecord {
    DiseaseRecord {
        crop: crop.to_string(),
        severity,
        symptoms: symptoms.to_string(),
        treatment: TreatmentInfo {
            chemical: chemical.to_string(),
            organic: organic.to_string(),
            prevention: prevention.to_string(),
        },
        confidence,
    }
}

// BTreeMap keeps the key set in deterministic order for the demo fallback
// and the candidate-label fallback list.
static DISEASE_DB: Lazy<BTreeMap<&'static str, DiseaseRecord>> = Lazy::new(|| {
    let mut db = BTreeMap::new();
    db.insert(
        "Bacterial Leaf Blight",
        record(
            "Rice",
            Severity::High,
            "Water-soaked lesions along leaf margins that turn yellow, then greyish-white as they dry out.",
            "Spray copper oxychloride 50% WP at 2.5 g/l at first symptom.",
            "Apply fresh cow dung slurry on affected patches; drain standing water.",
            "Use certified seed, avoid excess nitrogen, keep field bunds weed-free.",
            88,
        ),
    );
    db.insert(
        "Early Blight",
        record(
            "Potato",
            Severity::Medium,
            "Dark brown spots with concentric rings on older leaves, often surrounded by a yellow halo.",
            "Mancozeb 75% WP at 2 g/l, repeated at 10-day intervals.",
            "Neem oil spray (3%) on both leaf surfaces weekly.",
            "Rotate crops for 2-3 seasons; remove volunteer plants and infected debris.",
            85,
        ),
    );
    db.insert(
        "Healthy",
        record(
            "Any",
            Severity::None,
            "No visible lesions, spots or discoloration; uniform green leaf surface.",
            "None required.",
            "None required.",
            "Continue regular scouting and balanced fertilization.",
            95,
        ),
    );
    db.insert(
        "Late Blight",
        record(
            "Tomato",
            Severity::High,
            "Large irregular grey-green water-soaked patches that brown rapidly; white mold on leaf undersides in humid weather.",
            "Metalaxyl + mancozeb combination spray at 2.5 g/l as soon as detected.",
            "Bordeaux mixture (1%) before the rains set in.",
            "Avoid overhead irrigation in the evening; destroy infected plants immediately.",
            90,
        ),
    );
    db.insert(
        "Leaf Rust",
        record(
            "Wheat",
            Severity::Medium,
            "Small round orange-brown pustules scattered on the upper leaf surface.",
            "Propiconazole 25% EC at 1 ml/l at pustule appearance.",
            "Sulfur dust application in the early morning.",
            "Grow resistant varieties; sow early to escape peak rust season.",
            86,
        ),
    );
    db.insert(
        "Leaf Spot",
        record(
            "Maize",
            Severity::Medium,
            "Long rectangular tan lesions running parallel to the leaf veins.",
            "Carbendazim 50% WP at 1 g/l at first sign.",
            "Trichoderma-enriched compost around the root zone.",
            "Bury crop residue after harvest; avoid dense planting.",
            84,
        ),
    );
    db.insert(
        "Powdery Mildew",
        record(
            "Grape",
            Severity::Medium,
            "White powdery fungal growth on leaves and young shoots; leaves curl and drop early.",
            "Wettable sulfur 80% WP at 2 g/l at 15-day intervals.",
            "Potassium bicarbonate spray (5 g/l) with a drop of soap.",
            "Prune for airflow through the canopy; avoid late-evening irrigation.",
            87,
        ),
    );
    db
});

/// Ordered key set of the knowledge base
pub fn disease_names() -> Vec<&'static str> {
    DISEASE_DB.keys().copied().collect()
}

/// Look up metadata for a disease name
pub fn lookup(name: &str) -> Option<&'static DiseaseRecord> {
    DISEASE_DB.get(name)
}

/// Synthetic record for a model label with no mapped metadata. The model's
/// numeric confidence is retained so the UI can still render a result.
pub fn unknown_record(confidence: u32) -> DiseaseRecord {
    record(
        "Unknown",
        Severity::Medium,
        "Model prediction with no mapped metadata",
        "-",
        "-",
        "-",
        confidence,
    )
}
