use serde::{Deserialize, Serialize};

/// Messages arriving from the panel, tagged by their `command` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Inbound {
    Ask {
        text: String,
    },
    GetFileSuggestions {
        query: String,
    },
    #[serde(rename_all = "camelCase")]
    ApplyCode {
        code: String,
        file_path: Option<String>,
    },
}

/// Messages sent back to the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Outbound {
    Response { text: String },
    FileSuggestions { suggestions: Vec<String> },
}
