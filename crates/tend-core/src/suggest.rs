//! Task suggestions
//!
//! Canned task ideas picked by keyword. There is no model behind this:
//! [`suggest`] and [`generate_list`] are static lookups, and [`Suggester`]
//! wraps a [`SuggestionSource`] with loading/error tracking and a short
//! artificial delay so callers can treat it like a remote service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Most suggestions returned by [`suggest`]
pub const MAX_SUGGESTIONS: usize = 4;

/// Most entries returned by [`generate_list`]
pub const MAX_LIST_ITEMS: usize = 8;

/// Phrases offered when any keyword matches
struct KeywordGroup {
    keywords: &'static [&'static str],
    phrases: &'static [&'static str],
}

impl KeywordGroup {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

const SUGGESTION_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        keywords: &["work"],
        phrases: &[
            "Complete project proposal",
            "Schedule team meeting",
            "Review quarterly reports",
            "Update project timeline",
        ],
    },
    KeywordGroup {
        keywords: &["health", "exercise"],
        phrases: &[
            "30-minute morning jog",
            "Drink 8 glasses of water",
            "Schedule doctor appointment",
            "Prepare healthy meals for the week",
        ],
    },
    KeywordGroup {
        keywords: &["learn", "study"],
        phrases: &[
            "Read one chapter of the book",
            "Complete online course module",
            "Practice coding exercises",
            "Take notes on new concepts",
        ],
    },
    KeywordGroup {
        keywords: &["personal", "family"],
        phrases: &[
            "Call family members",
            "Plan weekend activities",
            "Organize personal documents",
            "Clean and organize living space",
        ],
    },
];

const GENERIC_SUGGESTIONS: &[&str] = &[
    "Break task into smaller steps",
    "Set a specific deadline",
    "Research required resources",
    "Create a plan of action",
];

const PLAN_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        keywords: &["project"],
        phrases: &[
            "Define project goals and objectives",
            "Create project timeline",
            "Identify required resources",
            "Assign team roles and responsibilities",
            "Set up project management tools",
            "Schedule regular progress meetings",
            "Prepare project status reports",
            "Conduct project review",
        ],
    },
    KeywordGroup {
        keywords: &["trip", "vacation"],
        phrases: &[
            "Research destination and create itinerary",
            "Book accommodation and flights",
            "Check visa/travel requirements",
            "Pack necessary items",
            "Inform bank of travel dates",
            "Arrange travel insurance",
            "Plan activities and reservations",
            "Prepare emergency contacts list",
        ],
    },
    KeywordGroup {
        keywords: &["study", "exam"],
        phrases: &[
            "Create study schedule",
            "Gather all required materials",
            "Review course syllabus",
            "Form study groups",
            "Take practice tests",
            "Review notes daily",
            "Rest properly before exam",
            "Prepare exam day essentials",
        ],
    },
];

const GENERIC_PLAN: &[&str] = &[
    "Define your main objective",
    "Break down into smaller tasks",
    "Set deadlines for each task",
    "Identify resources needed",
    "Create accountability system",
    "Plan for potential obstacles",
    "Schedule regular review sessions",
    "Celebrate milestones",
];

/// Suggest tasks related to free-text input
///
/// Every matching keyword group contributes its phrases, in table order;
/// with no match the generic list is used. Duplicates are dropped and the
/// result is capped at [`MAX_SUGGESTIONS`].
pub fn suggest(input: &str) -> Vec<String> {
    let lowered = input.to_lowercase();

    let mut phrases: Vec<&str> = SUGGESTION_GROUPS
        .iter()
        .filter(|group| group.matches(&lowered))
        .flat_map(|group| group.phrases.iter().copied())
        .collect();

    if phrases.is_empty() {
        phrases.extend_from_slice(GENERIC_SUGGESTIONS);
    }

    let mut result: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);
    for phrase in phrases {
        if result.len() == MAX_SUGGESTIONS {
            break;
        }
        if !result.iter().any(|p| p == phrase) {
            result.push(phrase.to_string());
        }
    }
    result
}

/// Generate a checklist for a topic
///
/// The first matching topic wins; otherwise a generic plan is returned.
pub fn generate_list(topic: &str) -> Vec<String> {
    let lowered = topic.to_lowercase();

    let phrases = PLAN_GROUPS
        .iter()
        .find(|group| group.matches(&lowered))
        .map(|group| group.phrases)
        .unwrap_or(GENERIC_PLAN);

    phrases
        .iter()
        .take(MAX_LIST_ITEMS)
        .map(|p| p.to_string())
        .collect()
}

/// Failure inside a suggestion source
#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("Suggestion source unavailable: {0}")]
    Unavailable(String),
}

/// Something that can produce task ideas
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Ideas related to free-text input
    async fn suggestions(&self, input: &str) -> Result<Vec<String>, SuggestError>;

    /// A full checklist for a topic
    async fn plan(&self, topic: &str) -> Result<Vec<String>, SuggestError>;
}

/// The built-in keyword tables
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSource;

#[async_trait]
impl SuggestionSource for KeywordSource {
    async fn suggestions(&self, input: &str) -> Result<Vec<String>, SuggestError> {
        Ok(suggest(input))
    }

    async fn plan(&self, topic: &str) -> Result<Vec<String>, SuggestError> {
        Ok(generate_list(topic))
    }
}

/// Observable status of a [`Suggester`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestStatus {
    pub loading: bool,
    pub error: Option<String>,
}

/// Suggestion service with simulated latency
///
/// Never fails: a source error yields an empty list and sets
/// [`SuggestStatus::error`].
pub struct Suggester {
    source: Arc<dyn SuggestionSource>,
    suggest_delay: Duration,
    plan_delay: Duration,
    status: watch::Sender<SuggestStatus>,
}

impl Suggester {
    /// Keyword suggestions with the given delays
    pub fn new(suggest_delay: Duration, plan_delay: Duration) -> Self {
        Self::with_source(Arc::new(KeywordSource), suggest_delay, plan_delay)
    }

    /// Use a custom source
    pub fn with_source(
        source: Arc<dyn SuggestionSource>,
        suggest_delay: Duration,
        plan_delay: Duration,
    ) -> Self {
        let (status, _) = watch::channel(SuggestStatus::default());
        Self {
            source,
            suggest_delay,
            plan_delay,
            status,
        }
    }

    /// Current status
    pub fn status(&self) -> SuggestStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SuggestStatus> {
        self.status.subscribe()
    }

    /// Suggestions for free-text input
    pub async fn suggestions(&self, input: &str) -> Vec<String> {
        self.begin();
        tokio::time::sleep(self.suggest_delay).await;
        let result = self.source.suggestions(input).await;
        self.finish(result, "Failed to generate AI suggestions")
    }

    /// A checklist for a topic
    pub async fn plan(&self, topic: &str) -> Vec<String> {
        self.begin();
        tokio::time::sleep(self.plan_delay).await;
        let result = self.source.plan(topic).await;
        self.finish(result, "Failed to generate AI todo list")
    }

    fn begin(&self) {
        self.status.send_replace(SuggestStatus {
            loading: true,
            error: None,
        });
    }

    fn finish(&self, result: Result<Vec<String>, SuggestError>, failure: &str) -> Vec<String> {
        match result {
            Ok(items) => {
                debug!("Generated {} suggestions", items.len());
                self.status.send_replace(SuggestStatus::default());
                items
            }
            Err(e) => {
                warn!("{}: {}", failure, e);
                self.status.send_replace(SuggestStatus {
                    loading: false,
                    error: Some(failure.to_string()),
                });
                Vec::new()
            }
        }
    }
}
