//! Wire types for the Assistants API (v2)

use serde::{Deserialize, Serialize};

/// A conversation thread
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

/// One assistant turn executing against a thread
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl Run {
    /// Tool calls the run is waiting on, empty unless `requires_action`
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .map_or(&[], |a| a.submit_tool_outputs.tool_calls.as_slice())
    }
}

/// Error attached to a failed run
#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequiredAction {
    pub submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitToolOutputs {
    pub tool_calls: Vec<ToolCall>,
}

/// A function the assistant wants executed
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionInvocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionInvocation {
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
}

/// Result of one tool call, fed back into the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// A message in a thread
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Text of the first content part, when it is text
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        match self.content.first()? {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

/// Paginated list envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

/// A document index
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A file attached to a vector store
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    #[serde(default)]
    pub chunking_strategy: Option<ChunkingStrategy>,
}

/// How files are split before indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Static {
        #[serde(rename = "static")]
        params: StaticChunking,
    },
    Auto,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticChunking {
    pub max_chunk_size_tokens: u32,
    pub chunk_overlap_tokens: u32,
}

/// Request body for adding files to a vector store in one batch
#[derive(Debug, Clone, Serialize)]
pub struct FileBatchRequest {
    pub file_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_strategy: Option<ChunkingStrategy>,
}

/// Status of a file batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileBatchStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileBatch {
    pub id: String,
    pub status: FileBatchStatus,
}

/// An uploaded file
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub id: String,
}

/// Assistant configuration as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub tools: Vec<AssistantTool>,
}

impl Assistant {
    /// Settings of the `file_search` tool, if the assistant has one
    #[must_use]
    pub fn file_search(&self) -> Option<&FileSearchSettings> {
        self.tools.iter().find_map(|tool| match tool {
            AssistantTool::FileSearch { file_search } => Some(file_search.as_ref().unwrap_or(&EMPTY_FILE_SEARCH)),
            _ => None,
        })
    }
}

static EMPTY_FILE_SEARCH: FileSearchSettings = FileSearchSettings {
    max_num_results: None,
    ranking_options: None,
};

/// A tool enabled on an assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantTool {
    FileSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_search: Option<FileSearchSettings>,
    },
    CodeInterpreter,
    Function {
        function: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSearchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_options: Option<RankingOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranker: Option<String>,
    pub score_threshold: f64,
}

/// Partial assistant update
#[derive(Debug, Clone, Serialize)]
pub struct AssistantUpdate {
    pub tools: Vec<AssistantTool>,
    pub tool_resources: ToolResources,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResources {
    pub file_search: FileSearchResources,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSearchResources {
    pub vector_store_ids: Vec<String>,
}
