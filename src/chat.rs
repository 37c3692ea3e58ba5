//! Chat pipeline: conversation gate, retrieval-backed generation, and
//! escalation.
//!
//! A request flows through three stages:
//!
//! 1. **Length gate** — conversations past the user-turn cap skip
//!    retrieval and generation entirely and get the fixed handoff
//!    message.
//! 2. **Retrieval + generation** — the aggregated context block and the
//!    conversation history go to the hosted model; when retrieval finds
//!    nothing the fixed contact-channel fallback is returned instead of
//!    calling the model with an empty context.
//! 3. **Escalation** — responses matching any uncertainty marker bump
//!    the session's failure counter; three in a row flag the session
//!    for human handoff. Escalation is advisory and never blocks
//!    further queries.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ContactConfig;
use crate::generation::ChatModel;
use crate::knowledge::KnowledgeBase;
use crate::models::{ConversationTurn, Role};
use crate::retrieval::{build_context, ContextBlock};
use crate::session::SessionTracker;

/// Marker phrases that classify a generated response as uncertain.
const UNCERTAIN_MARKERS: [&str; 4] = [
    "i don't know",
    "contact support",
    "unable to answer",
    "not sure",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub should_escalate: bool,
    pub escalation_reason: Option<String>,
    pub links: Vec<Link>,
    pub used_retrieval: bool,
    pub offer_live_agent: bool,
    pub offer_callback: bool,
}

/// Persona and ground rules sent as the system message, ahead of the
/// retrieved reference material.
pub fn system_prompt(contact: &ContactConfig) -> String {
    format!(
        "You are Mitraa, a warm and respectful support assistant for the pilgrimage travel \
platform Oorzaa Yatra.

Personality:
- Respectful, spiritual tone; concise but informative.
- Helpful, patient, and solution-oriented.

Answering rules:
1. Answer only from the reference material below and the conversation so far. Never invent \
yatras, destinations, dates, or prices.
2. Always say \"estimated price\", never \"final price\". Mention that dates are tentative \
where applicable. All pricing is from and to Delhi.
3. Do not guarantee a transport mode until it is officially confirmed; each yatra operates \
only if minimum participants register.
4. Whenever refunds or cancellation come up, state that refunds depend on vendor policies \
(airlines, railways, hotels, or transport providers) and are not solely controlled by \
Oorzaa Yatra. Mega yatras travel by flight, Mid yatras by train, Mini yatras by road, and \
each follows its own vendor's cancellation rules.
5. If asked about confirmation, availability, or exact pricing, explain that these change \
with bookings and offer to connect the user with the team for live details.
6. Never mention internal storage, databases, or where your information comes from; speak \
as a human support agent would.
7. If a specific detail is missing, apologize and direct the user to call {agent} at \
{phone}, WhatsApp {whatsapp}, or visit {website}.

Formatting:
- Use markdown bullet lists and [link text](url) links; never raw HTML.
- When listing upcoming yatras give the name, estimated price, dates exactly as written in \
the reference material, and transport mode.",
        agent = contact.agent_name,
        phone = contact.phone,
        whatsapp = contact.whatsapp,
        website = contact.website,
    )
}

/// Fixed reply once a conversation exceeds the user-turn cap.
pub fn limit_message(contact: &ContactConfig) -> String {
    format!(
        "Namaste!\n\nI notice you have many questions. For detailed assistance and \
personalized guidance, please connect with our support team:\n\n\
- Call us: {} ({})\n\
- WhatsApp: {}\n\
- Email: {}\n\
- Contact form: {}\n\n\
Our team will be happy to help you with all your queries!",
        contact.phone, contact.agent_name, contact.whatsapp_url(), contact.email, contact.contact_url
    )
}

/// Fixed reply when retrieval finds nothing across all collections.
pub fn no_context_fallback(contact: &ContactConfig) -> String {
    format!(
        "Namaste! I apologize, but I don't have that information right now. Please reach \
our support team on WhatsApp at {} or visit {} for assistance. We're happy to help!",
        contact.whatsapp, contact.website
    )
}

/// Case-insensitive substring match against the uncertainty markers.
pub fn is_uncertain(response: &str) -> bool {
    let lower = response.to_lowercase();
    UNCERTAIN_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// User-authored turns in the supplied history.
pub fn count_user_turns(history: &[ConversationTurn]) -> usize {
    history.iter().filter(|t| t.role == Role::User).count()
}

/// Keyword-driven suggested links for the user's message.
pub fn detect_links(message: &str, contact: &ContactConfig) -> Vec<Link> {
    let msg = message.to_lowercase();
    let mut links = Vec::new();

    if ["register", "join", "book", "sign up", "login"]
        .iter()
        .any(|w| msg.contains(w))
    {
        links.push(Link {
            text: "Register/Login".to_string(),
            url: contact.login_url.clone(),
            kind: "registration".to_string(),
            note: None,
        });
    }
    if ["contact", "call", "help", "support"]
        .iter()
        .any(|w| msg.contains(w))
    {
        links.push(Link {
            text: "WhatsApp Support".to_string(),
            url: contact.whatsapp_url(),
            kind: "whatsapp".to_string(),
            note: None,
        });
    }

    links
}

/// Links appended once a session is flagged for human handoff.
fn escalation_links(contact: &ContactConfig) -> Vec<Link> {
    vec![
        Link {
            text: format!("{}: {}", contact.agent_name, contact.phone),
            url: contact.tel_url(),
            kind: "live_agent".to_string(),
            note: Some(
                "For operational coordination, follow-ups, and yatra execution related \
communication."
                    .to_string(),
            ),
        },
        Link {
            text: "Connect with a Human Agent".to_string(),
            url: contact.contact_url.clone(),
            kind: "live_agent".to_string(),
            note: None,
        },
        Link {
            text: "Request a Callback".to_string(),
            url: contact.callback_url.clone(),
            kind: "callback".to_string(),
            note: None,
        },
    ]
}

pub struct ChatService {
    kb: Arc<KnowledgeBase>,
    model: Box<dyn ChatModel>,
    sessions: SessionTracker,
}

impl ChatService {
    pub fn new(kb: Arc<KnowledgeBase>, model: Box<dyn ChatModel>) -> Self {
        let capacity = kb.config().chat.session_capacity;
        Self {
            kb,
            model,
            sessions: SessionTracker::new(capacity),
        }
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let config = self.kb.config();
        let contact = &config.contact;

        let session_id = request
            .session_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // Current message included.
        let user_turns = count_user_turns(&request.conversation_history) + 1;
        if user_turns > config.chat.max_user_turns {
            tracing::info!(
                "Session {} hit the conversation limit ({} user turns)",
                session_id,
                user_turns
            );
            return Ok(ChatResponse {
                response: limit_message(contact),
                session_id,
                should_escalate: true,
                escalation_reason: Some(
                    "Conversation length limit reached; please continue with the support team."
                        .to_string(),
                ),
                links: escalation_links(contact),
                used_retrieval: false,
                offer_live_agent: false,
                offer_callback: false,
            });
        }

        let response_text = match build_context(&self.kb, &request.message).await? {
            ContextBlock::Empty => no_context_fallback(contact),
            ContextBlock::Found(context) => {
                let prompt = format!(
                    "{}\n\nReference material:\n{}",
                    system_prompt(contact),
                    context
                );
                self.model
                    .generate(&prompt, &request.conversation_history, &request.message)
                    .await?
            }
        };

        let failures = self.sessions.record(&session_id, is_uncertain(&response_text));
        let escalate = failures >= config.chat.escalation_threshold;

        let mut links = detect_links(&request.message, contact);
        let mut escalation_reason = None;
        if escalate {
            escalation_reason =
                Some("Complex or unclear query. User may need human support.".to_string());
            links.extend(escalation_links(contact));
        }

        Ok(ChatResponse {
            response: response_text,
            session_id,
            should_escalate: escalate,
            escalation_reason,
            links,
            used_retrieval: true,
            offer_live_agent: escalate,
            offer_callback: escalate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncertainty_markers_match_case_insensitively() {
        assert!(is_uncertain("I'm NOT SURE about that yatra."));
        assert!(is_uncertain("Please contact support for details."));
        assert!(is_uncertain("I don't know the departure time."));
        assert!(is_uncertain("I am unable to answer that."));
        assert!(!is_uncertain("The yatra departs on 17th April."));
    }

    #[test]
    fn fallback_messages_are_not_self_escalating() {
        // The fixed fallbacks must not trip the uncertainty classifier,
        // or a quiet knowledge base would escalate every session.
        let contact = ContactConfig::default();
        assert!(!is_uncertain(&no_context_fallback(&contact)));
        assert!(!is_uncertain(&limit_message(&contact)));
    }

    #[test]
    fn user_turns_count_only_user_roles() {
        let history = vec![
            ConversationTurn {
                role: Role::User,
                content: "hi".into(),
            },
            ConversationTurn {
                role: Role::Assistant,
                content: "namaste".into(),
            },
            ConversationTurn {
                role: Role::User,
                content: "dates?".into(),
            },
        ];
        assert_eq!(count_user_turns(&history), 2);
        assert_eq!(count_user_turns(&[]), 0);
    }

    #[test]
    fn registration_keywords_suggest_the_login_link() {
        let contact = ContactConfig::default();
        let links = detect_links("How do I book a seat?", &contact);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, "registration");
    }

    #[test]
    fn support_keywords_suggest_whatsapp() {
        let contact = ContactConfig::default();
        let links = detect_links("I need help with payment", &contact);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, "whatsapp");
        assert!(links[0].url.starts_with("https://wa.me/"));
    }

    #[test]
    fn unrelated_messages_suggest_nothing() {
        let contact = ContactConfig::default();
        assert!(detect_links("When is the Kedarnath yatra?", &contact).is_empty());
    }
}
