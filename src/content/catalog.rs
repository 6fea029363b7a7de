//! Built-in curriculum

use super::{ContentRepository, ContentTree, Module, QuizQuestion, Segment, Session};
use crate::profile::{SessionId, UserProfile};
use std::collections::HashMap;

const SESSION_TITLES: [&str; 7] = [
    "Brain Health Fundamentals",
    "Understanding MCI & Early Warning Signs",
    "Cognitive Strategies & Treatment",
    "Mood, Mental Health & Brain Protection",
    "Relaxation, Stress & Sleep",
    "Lifestyle Management",
    "Cognitive Training & Moving Forward",
];

const MCI_OVERVIEW: &str = "Let's explore how MCI affects your brain and what you can do about it.

**Understanding MCI in Context:**

First, let's talk about what MCI really means. MCI is a distinct stage between normal aging and dementia. It's not just \"getting older\" - it's a specific condition that we can identify and manage.

Many people think MCI automatically leads to dementia, but that's not true.

**The Real Trajectory of MCI:**
- About 10-15% of people with MCI progress to dementia each year
- However, 30-50% remain stable for many years (like you have!)
- 10-20% actually improve and return to normal cognition

**Who is More Likely to Progress:**
- Those with memory-specific MCI (amnestic type)
- People with multiple cognitive domains affected
- Those with biomarker evidence (like abnormal brain scans or spinal fluid)
- Individuals with untreated cardiovascular risk factors

**What You Can Do to Prevent Progression:**
- **Physical exercise** - The single most powerful intervention (reduces risk by 30-40%)
- **Cognitive stimulation** - Keep learning and challenging your brain
- **Social engagement** - Maintain meaningful connections
- **Managing health conditions** - Control blood pressure, diabetes, cholesterol
- **Mediterranean/MIND diet** - Protective eating patterns
- **Quality sleep** - 7-8 hours of restorative sleep
- **Stress management** - Chronic stress damages the brain";

/// Content repository backed by in-process tables.
///
/// Personalized variants are keyed on the MCI diagnosis, the only profile
/// attribute the curriculum currently branches on.
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    sessions: Vec<Session>,
    generic: HashMap<SessionId, ContentTree>,
    mci_variants: HashMap<SessionId, ContentTree>,
}

impl StaticContent {
    /// Empty repository with the given session catalog
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            generic: HashMap::new(),
            mci_variants: HashMap::new(),
        }
    }

    pub fn with_content(mut self, session_id: SessionId, tree: ContentTree) -> Self {
        self.generic.insert(session_id, tree);
        self
    }

    pub fn with_mci_variant(mut self, session_id: SessionId, tree: ContentTree) -> Self {
        self.mci_variants.insert(session_id, tree);
        self
    }

    /// The seven-session curriculum
    pub fn builtin() -> Self {
        let sessions = (1..)
            .zip(SESSION_TITLES)
            .map(|(id, title)| Session {
                id,
                title: title.to_string(),
                unlocked: true,
            })
            .collect();

        Self::new(sessions)
            .with_content(
                1,
                ContentTree {
                    title: SESSION_TITLES[0].to_string(),
                    modules: vec![Module::flat(
                        "Understanding Your Brain",
                        "Let's explore the basics of brain health...",
                    )],
                },
            )
            .with_content(
                2,
                ContentTree {
                    title: SESSION_TITLES[1].to_string(),
                    modules: vec![Module::flat(
                        "What is MCI?",
                        "Mild Cognitive Impairment is...",
                    )],
                },
            )
            .with_mci_variant(
                1,
                ContentTree {
                    title: SESSION_TITLES[0].to_string(),
                    modules: vec![Module::segmented(
                        "Understanding MCI and Brain Health",
                        vec![Segment::new(MCI_OVERVIEW)
                            .with_discussion(
                                "Would you like a short quiz to test your knowledge of the information I just shared with you?",
                                vec![
                                    "Yes, test my knowledge".to_string(),
                                    "No, continue to other options".to_string(),
                                ],
                            )
                            .with_quiz(mci_quiz())],
                    )],
                },
            )
    }
}

fn mci_quiz() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion {
            question: "What percentage of people with MCI progress to dementia each year?".to_string(),
            options: vec!["5-10%".into(), "10-15%".into(), "20-30%".into(), "40-50%".into()],
            correct: 1,
            explanation: "About 10-15% of people with MCI progress to dementia each year, which means the majority remain stable.".to_string(),
        },
        QuizQuestion {
            question: "Which intervention has the most powerful effect on reducing dementia risk?".to_string(),
            options: vec![
                "Mediterranean diet".into(),
                "Social engagement".into(),
                "Physical exercise".into(),
                "Sleep quality".into(),
            ],
            correct: 2,
            explanation: "Physical exercise is the single most powerful intervention, reducing dementia risk by 30-40%.".to_string(),
        },
        QuizQuestion {
            question: "What percentage of people with MCI actually improve and return to normal cognition?".to_string(),
            options: vec!["5-10%".into(), "10-20%".into(), "30-40%".into(), "50-60%".into()],
            correct: 1,
            explanation: "10-20% of people with MCI actually improve and return to normal cognition, showing that MCI is not always progressive.".to_string(),
        },
    ]
}

impl ContentRepository for StaticContent {
    fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    fn get_content(&self, session_id: SessionId) -> Option<ContentTree> {
        self.generic.get(&session_id).cloned()
    }

    fn get_personalized_content(
        &self,
        session_id: SessionId,
        profile: &UserProfile,
    ) -> Option<ContentTree> {
        if profile.has_mci() {
            self.mci_variants.get(&session_id).cloned()
        } else {
            None
        }
    }
}
