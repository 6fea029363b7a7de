//! User profile: diagnostic facts plus curriculum progress

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of a curriculum session (1-based, as shown to users)
pub type SessionId = u32;

const MCI_DIAGNOSIS: &str = "Mild Cognitive Impairment";
const DEFAULT_ACE_TOTAL: u32 = 98;

/// A clinician named on the assessment report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinician {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferralInfo {
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssessmentInfo {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub clinicians: Vec<Clinician>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Addenbrooke's Cognitive Examination results
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AceIii {
    /// Display form, e.g. "98/100"
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub domain_performance: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssessmentResults {
    #[serde(rename = "ACE_III", default)]
    pub ace_iii: Option<AceIii>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-user profile. Fields the engine does not interpret are kept in `extra`
/// so a load/update cycle never drops them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub referral_info: Option<ReferralInfo>,
    #[serde(default)]
    pub assessment_info: Option<AssessmentInfo>,
    #[serde(default)]
    pub assessment_results: Option<AssessmentResults>,
    #[serde(default)]
    pub completed_sessions: BTreeSet<SessionId>,
    /// Keyed by the session id's decimal form; integer map keys do not
    /// survive `#[serde(flatten)]` deserialization.
    #[serde(default)]
    pub session_scores: BTreeMap<String, u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// The diagnostic profile new users are seeded with
    pub fn default_diagnostic() -> Self {
        let domains = [
            ("Memory", "25/26"),
            ("Fluency", "13/14"),
            ("Language", "26/26"),
            ("Visuospatial", "16/16"),
            ("Attention and Orientation", "18/18"),
        ];

        let mut referral_extra = Map::new();
        referral_extra.insert(
            "referral_reason".to_string(),
            json!("further investigation and follow-up related to concerns around your cognition (thinking and memory)"),
        );
        referral_extra.insert(
            "referring_provider".to_string(),
            json!("Southwark and Lambeth Memory Service (SLMS)"),
        );

        let mut results_extra = Map::new();
        results_extra.insert(
            "HADS".to_string(),
            json!({ "anxiety": "12/21", "depression": "9/21" }),
        );

        let mut extra = Map::new();
        extra.insert(
            "current_symptoms".to_string(),
            json!({
                "sleep_patterns": ["experience nightmares", "snoring", "occasional talking during sleep"],
                "physical_challenges": [],
                "cognitive_challenges": ["Mild Cognitive Impairment", "Alzheimer's"],
                "instrumental_activities_daily_living": {
                    "transportation": ["trouble finding your way while driving"],
                    "managing_finances": ["difficulties with managing finances"]
                }
            }),
        );
        extra.insert(
            "patient_background".to_string(),
            json!({
                "family_history": {
                    "father": "diagnosed with Alzheimer's in his early 80s",
                    "mother": "diagnosed with vascular dementia and frontotemporal dementia in her 90s"
                },
                "symptom_duration": "more than 10 years",
                "employment_status": "retired",
                "caregiving_history": "been a carer for your poorly mother",
                "previous_occupation": "led the council's work on research and policy"
            }),
        );

        Self {
            user_id: None,
            name: String::new(),
            diagnosis: Some("Mild Cognitive Impairment (F06.7)".to_string()),
            referral_info: Some(ReferralInfo {
                clinic_name: Some("Brain Health Clinic".to_string()),
                extra: referral_extra,
            }),
            assessment_info: Some(AssessmentInfo {
                date: Some("19/Nov/2024".to_string()),
                clinicians: vec![
                    Clinician {
                        name: "Professor Dag Aarsland".to_string(),
                        role: Some("Consultant Psychiatrist".to_string()),
                    },
                    Clinician {
                        name: "Viyash Muniswaran".to_string(),
                        role: Some("Research Assistant".to_string()),
                    },
                ],
                extra: Map::new(),
            }),
            assessment_results: Some(AssessmentResults {
                ace_iii: Some(AceIii {
                    total: Some("98/100".to_string()),
                    domain_performance: domains
                        .iter()
                        .map(|(domain, score)| ((*domain).to_string(), (*score).to_string()))
                        .collect(),
                }),
                extra: results_extra,
            }),
            completed_sessions: BTreeSet::new(),
            session_scores: BTreeMap::new(),
            extra,
        }
    }

    pub fn has_mci(&self) -> bool {
        self.diagnosis
            .as_deref()
            .is_some_and(|d| d.contains(MCI_DIAGNOSIS))
    }

    pub fn diagnosis_text(&self) -> &str {
        self.diagnosis.as_deref().unwrap_or("Not yet recorded")
    }

    pub fn primary_clinician(&self) -> &str {
        self.assessment_info
            .as_ref()
            .and_then(|info| info.clinicians.first())
            .map_or("your doctor", |c| c.name.as_str())
    }

    pub fn clinic_name(&self) -> &str {
        self.referral_info
            .as_ref()
            .and_then(|r| r.clinic_name.as_deref())
            .unwrap_or("Brain Health Clinic")
    }

    pub fn assessment_date(&self) -> &str {
        self.assessment_info
            .as_ref()
            .and_then(|info| info.date.as_deref())
            .unwrap_or("your recent appointment")
    }

    fn ace(&self) -> Option<&AceIii> {
        self.assessment_results
            .as_ref()
            .and_then(|r| r.ace_iii.as_ref())
    }

    /// ACE-III total as displayed on the report ("98/100")
    pub fn ace_total_display(&self) -> &str {
        self.ace()
            .and_then(|a| a.total.as_deref())
            .unwrap_or("98/100")
    }

    /// Leading integer of the ACE-III total, falling back to the seeded score
    pub fn ace_total_score(&self) -> u32 {
        self.ace()
            .and_then(|a| a.total.as_deref())
            .and_then(|t| parse_fraction(t).map(|(score, _)| score))
            .unwrap_or(DEFAULT_ACE_TOTAL)
    }

    /// ACE-III domains ordered from weakest to strongest by score ratio.
    /// Domains whose score cannot be parsed are skipped.
    pub fn domains_by_strength(&self) -> Vec<(&str, &str)> {
        let Some(ace) = self.ace() else {
            return Vec::new();
        };
        let mut scored: Vec<(&str, &str, u32, u32)> = ace
            .domain_performance
            .iter()
            .filter_map(|(domain, score)| {
                parse_fraction(score)
                    .filter(|(_, max)| *max > 0)
                    .map(|(got, max)| (domain.as_str(), score.as_str(), got, max))
            })
            .collect();
        // Compare got_a/max_a against got_b/max_b without floats
        scored.sort_by(|a, b| (u64::from(a.2) * u64::from(b.3)).cmp(&(u64::from(b.2) * u64::from(a.3))));
        scored
            .into_iter()
            .map(|(domain, score, _, _)| (domain, score))
            .collect()
    }

    /// Add a session to the completed set. Returns false if it was already there.
    pub fn mark_session_complete(&mut self, session_id: SessionId) -> bool {
        self.completed_sessions.insert(session_id)
    }

    pub fn is_session_complete(&self, session_id: SessionId) -> bool {
        self.completed_sessions.contains(&session_id)
    }

    pub fn record_score(&mut self, session_id: SessionId, score: u32) {
        self.session_scores.insert(session_id.to_string(), score);
    }

    pub fn score_for(&self, session_id: SessionId) -> Option<u32> {
        self.session_scores.get(&session_id.to_string()).copied()
    }
}

/// Parse "25/26" into (25, 26)
fn parse_fraction(s: &str) -> Option<(u32, u32)> {
    let (got, max) = s.split_once('/')?;
    Some((got.trim().parse().ok()?, max.trim().parse().ok()?))
}
