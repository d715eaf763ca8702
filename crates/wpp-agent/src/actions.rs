//! Agent action groups
//!
//! Read-only skills the agent calls back into: calendar events, todos and
//! contacts of the configured user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wpp_core::storage::AttributeValue;
use wpp_core::{prefix, TableStore};

use crate::error::{AgentError, Result};

/// Joins the values returned by a skill
pub const RESULT_SEPARATOR: &str = "\n-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
    pub value: String,
}

/// Callback from the agent runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupEvent {
    pub message_version: String,
    pub action_group: String,
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
}

impl ActionGroupEvent {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "TEXT")]
    pub text: TextBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub response_body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponse,
}

/// Answer to an action-group callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupResponse {
    pub message_version: String,
    pub response: ActionResponse,
}

/// Skill functions exposed to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    CalendarEvents,
    Todos,
    Contacts,
}

impl Skill {
    pub fn from_function(name: &str) -> Option<Self> {
        match name {
            "fetch_calendar_events" => Some(Self::CalendarEvents),
            "fetch_todos" => Some(Self::Todos),
            "fetch_contacts" => Some(Self::Contacts),
            _ => None,
        }
    }

    /// Attribute holding the skill's value on each row
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::CalendarEvents => "events",
            Self::Todos => "todo_details",
            Self::Contacts => "contact_details",
        }
    }
}

/// Runs action-group skills against the agent-data table
pub struct ActionGroupHandler {
    store: Arc<dyn TableStore>,
    partition_key: String,
}

impl ActionGroupHandler {
    pub fn new(store: Arc<dyn TableStore>, user_id: &str) -> Self {
        Self {
            store,
            partition_key: format!("{}{}", prefix::USER, user_id),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub async fn handle(&self, event: &ActionGroupEvent) -> Result<ActionGroupResponse> {
        info!(
            "Action group {} called function {}",
            event.action_group, event.function
        );

        let skill = Skill::from_function(&event.function).ok_or_else(|| {
            warn!("Unknown action group function: {}", event.function);
            AgentError::UnknownFunction(event.function.clone())
        })?;

        let body = match skill {
            Skill::CalendarEvents => {
                let date = event
                    .parameter("date")
                    .ok_or_else(|| AgentError::MissingParameter("date".to_string()))?;
                self.fetch_calendar_events(date).await?
            }
            Skill::Todos => self.fetch_todos().await?,
            Skill::Contacts => self.fetch_contacts().await?,
        };

        Ok(ActionGroupResponse {
            message_version: event.message_version.clone(),
            response: ActionResponse {
                action_group: event.action_group.clone(),
                function: event.function.clone(),
                function_response: FunctionResponse {
                    response_body: ResponseBody {
                        text: TextBody { body },
                    },
                },
            },
        })
    }

    /// Calendar events of one day (`yyyy-mm-dd`)
    pub async fn fetch_calendar_events(&self, date: &str) -> Result<String> {
        let sort_key = format!("{}{}", prefix::DATE, date);
        self.collect(&sort_key, Skill::CalendarEvents).await
    }

    pub async fn fetch_todos(&self) -> Result<String> {
        self.collect(prefix::TODO, Skill::Todos).await
    }

    pub async fn fetch_contacts(&self) -> Result<String> {
        self.collect(prefix::CONTACT, Skill::Contacts).await
    }

    async fn collect(&self, sort_key_portion: &str, skill: Skill) -> Result<String> {
        let items = self
            .store
            .query_by_pk_and_sk_begins_with(&self.partition_key, sort_key_portion)
            .await?;

        let mut values = Vec::new();
        for item in &items {
            match item.get(skill.attribute()) {
                Some(AttributeValue::L(list)) => {
                    values.extend(list.iter().filter_map(AttributeValue::as_s).map(str::to_string))
                }
                Some(AttributeValue::S(value)) => values.push(value.clone()),
                _ => {}
            }
        }

        info!("Found {} values for {}", values.len(), skill.attribute());
        Ok(values.join(RESULT_SEPARATOR))
    }
}
