//! Multi-step product listing conversation.
//!
//! Each conversation is an explicit state machine stored under its session id.
//! Callers own the [`ListingSessions`] store and pass it where it is needed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::ListingFlowError;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStep {
    AwaitingImage,
    AwaitingName,
    AwaitingCategory,
    AwaitingPrice,
    Listed,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    pub image: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
}

/// What the flow asks for next, echoing the value it just accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ListingPrompt {
    ImageReceived { image: String },
    NameReceived { name: String },
    CategoryReceived { category: String },
    Listed { draft: ListingDraft },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSession {
    pub step: ListingStep,
    pub draft: ListingDraft,
}

impl Default for ListingSession {
    fn default() -> Self {
        Self {
            step: ListingStep::AwaitingImage,
            draft: ListingDraft::default(),
        }
    }
}

impl ListingSession {
    /// Consume one user message, interpreted according to the current step.
    pub fn advance(&mut self, input: &str) -> Result<ListingPrompt, ListingFlowError> {
        let value = input.trim();
        if value.is_empty() && self.step != ListingStep::Listed {
            return Err(ListingFlowError::EmptyInput(self.step));
        }

        match self.step {
            ListingStep::AwaitingImage => {
                if !is_image_file(value) {
                    return Err(ListingFlowError::NotAnImage(value.to_string()));
                }
                self.draft.image = Some(value.to_string());
                self.step = ListingStep::AwaitingName;
                Ok(ListingPrompt::ImageReceived {
                    image: value.to_string(),
                })
            }
            ListingStep::AwaitingName => {
                self.draft.name = Some(value.to_string());
                self.step = ListingStep::AwaitingCategory;
                Ok(ListingPrompt::NameReceived {
                    name: value.to_string(),
                })
            }
            ListingStep::AwaitingCategory => {
                self.draft.category = Some(value.to_string());
                self.step = ListingStep::AwaitingPrice;
                Ok(ListingPrompt::CategoryReceived {
                    category: value.to_string(),
                })
            }
            ListingStep::AwaitingPrice => {
                let price = value
                    .parse::<f64>()
                    .ok()
                    .filter(|p| p.is_finite() && *p >= 0.0)
                    .ok_or_else(|| ListingFlowError::InvalidPrice(value.to_string()))?;
                self.draft.price = Some(price);
                self.step = ListingStep::Listed;
                Ok(ListingPrompt::Listed {
                    draft: self.draft.clone(),
                })
            }
            ListingStep::Listed => Err(ListingFlowError::AlreadyListed),
        }
    }
}

fn is_image_file(value: &str) -> bool {
    value
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct ListingSessions {
    sessions: HashMap<String, ListingSession>,
}

impl ListingSessions {
    /// Start (or restart) the conversation for `session_id`.
    pub fn start(&mut self, session_id: impl Into<String>) -> &ListingSession {
        let entry = self.sessions.entry(session_id.into()).or_default();
        *entry = ListingSession::default();
        entry
    }

    pub fn advance(&mut self, session_id: &str, input: &str) -> Result<ListingPrompt, ListingFlowError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| ListingFlowError::UnknownSession(session_id.to_string()))?
            .advance(input)
    }

    pub fn get(&self, session_id: &str) -> Option<&ListingSession> {
        self.sessions.get(session_id)
    }

    pub fn finish(&mut self, session_id: &str) -> Option<ListingSession> {
        self.sessions.remove(session_id)
    }
}
