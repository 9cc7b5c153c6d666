//! Location-aware chat prompt assembly

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Phrases that mark a prompt as being about the user's surroundings
static LOCATION_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(here|this place|nearby|current location)\b").expect("valid regex")
});

/// One chat message in OpenAI format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// `system` or `user`
    pub role: &'static str,
    /// Message text
    pub content: String,
}

/// Whether `prompt` is about `nearby_place`
///
/// True when the prompt refers to the surroundings ("here", "this place",
/// "nearby", "current location") or names the place itself.
#[must_use]
pub fn is_location_related(prompt: &str, nearby_place: Option<&str>) -> bool {
    let Some(place) = nearby_place.filter(|p| !p.trim().is_empty()) else {
        return false;
    };
    LOCATION_PHRASES.is_match(prompt) || prompt.to_lowercase().contains(&place.to_lowercase())
}

/// Build the chat messages for a prompt
///
/// A system message naming the place is added only when the prompt is
/// location related.
#[must_use]
pub fn build_messages(prompt: &str, nearby_place: Option<&str>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);

    if let Some(place) = nearby_place.filter(|_| is_location_related(prompt, nearby_place)) {
        messages.push(ChatMessage {
            role: "system",
            content: format!("User is near {place}. Answer the questions concisely"),
        });
    }

    messages.push(ChatMessage {
        role: "user",
        content: prompt.to_string(),
    });
    messages
}
