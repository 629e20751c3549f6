//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assistant_bridge::assistant::types::{
    Assistant, AssistantUpdate, ChunkingStrategy, FileBatch, FileBatchRequest, FileBatchStatus,
    FunctionInvocation, ListResponse, MessageContent, RequiredAction, Run, RunStatus,
    SubmitToolOutputs, TextContent, Thread, ThreadMessage, ToolCall, ToolOutput, UploadedFile,
    VectorStore, VectorStoreFile,
};
use assistant_bridge::assistant::{AssistantApi, RunPoller, VectorStoreApi};
use assistant_bridge::db::{self, SessionRepo, SubmissionRepo};
use assistant_bridge::localtime::DEFAULT_TIMEZONE;
use assistant_bridge::{DbPool, DocumentStore, Error, Result, SessionManager, SessionPolicy, Station};
use async_trait::async_trait;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

#[must_use]
pub fn test_stations() -> Vec<Station> {
    vec![
        Station::new("n6", "News On 6", "asst_n6"),
        Station::new("n9", "News 9", "asst_n9"),
    ]
}

#[must_use]
pub fn session_repo(db: &DbPool) -> SessionRepo {
    SessionRepo::new(DocumentStore::new(db.clone()), DEFAULT_TIMEZONE)
}

#[must_use]
pub fn submission_repo(db: &DbPool) -> SubmissionRepo {
    SubmissionRepo::new(DocumentStore::new(db.clone()))
}

#[must_use]
pub fn session_manager(db: &DbPool) -> SessionManager {
    SessionManager::new(session_repo(db), SessionPolicy::default())
}

/// Poller fast enough for tests
#[must_use]
pub const fn fast_poller() -> RunPoller {
    RunPoller::new(Duration::from_millis(5), Duration::from_millis(500))
}

#[must_use]
pub fn run(id: &str, status: RunStatus) -> Run {
    Run {
        id: id.to_string(),
        thread_id: None,
        status,
        required_action: None,
        last_error: None,
    }
}

/// A run waiting on the given `(call id, function, arguments)` calls
#[must_use]
pub fn requires_action(id: &str, calls: &[(&str, &str, &str)]) -> Run {
    let tool_calls = calls
        .iter()
        .map(|(call_id, name, arguments)| ToolCall {
            id: (*call_id).to_string(),
            function: FunctionInvocation {
                name: (*name).to_string(),
                arguments: (*arguments).to_string(),
            },
        })
        .collect();

    Run {
        required_action: Some(RequiredAction {
            submit_tool_outputs: SubmitToolOutputs { tool_calls },
        }),
        ..run(id, RunStatus::RequiresAction)
    }
}

/// Scripted stand-in for the assistant API
///
/// `retrieve_run` pops statuses from the script and reports `completed` once
/// it runs dry. The latest message is always `reply`.
pub struct MockAssistant {
    script: Mutex<VecDeque<Run>>,
    reply: Mutex<String>,
    threads: AtomicUsize,
    pub runs_created: Mutex<Vec<(String, String)>>,
    pub messages: Mutex<Vec<(String, String)>>,
    pub submitted: Mutex<Vec<ToolOutput>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl MockAssistant {
    #[must_use]
    pub fn new(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            reply: Mutex::new(reply.to_string()),
            threads: AtomicUsize::new(0),
            runs_created: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_script(self, runs: Vec<Run>) -> Self {
        *self.script.lock().unwrap() = runs.into();
        self
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    #[must_use]
    pub fn threads_created(&self) -> usize {
        self.threads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssistantApi for MockAssistant {
    async fn create_thread(&self) -> Result<Thread> {
        let n = self.threads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Thread {
            id: format!("thread_{n}"),
        })
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((thread_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        self.runs_created
            .lock()
            .unwrap()
            .push((thread_id.to_string(), assistant_id.to_string()));
        Ok(run("run_1", RunStatus::Queued))
    }

    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| run(run_id, RunStatus::Completed)))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        self.submitted.lock().unwrap().extend_from_slice(outputs);
        Ok(run(run_id, RunStatus::Queued))
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.cancelled.lock().unwrap().push(run_id.to_string());
        Ok(run(run_id, RunStatus::Cancelling))
    }

    async fn latest_message(&self, _thread_id: &str) -> Result<Option<ThreadMessage>> {
        Ok(Some(ThreadMessage {
            id: "msg_1".to_string(),
            role: "assistant".to_string(),
            content: vec![MessageContent::Text {
                text: TextContent {
                    value: self.reply.lock().unwrap().clone(),
                },
            }],
        }))
    }
}

/// In-memory stand-in for vector store and assistant configuration calls
pub struct MockVectorStore {
    /// Files per store id
    pub files: Mutex<Vec<(String, VectorStoreFile)>>,
    pub assistant: Mutex<Assistant>,
    pub page_size: usize,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<FileBatchRequest>>,
    pub updates: Mutex<Vec<AssistantUpdate>>,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    /// Batch statuses reported before `completed`
    pub batch_script: Mutex<VecDeque<FileBatchStatus>>,
}

impl MockVectorStore {
    #[must_use]
    pub fn new(assistant_id: &str) -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            assistant: Mutex::new(Assistant {
                id: assistant_id.to_string(),
                tools: Vec::new(),
            }),
            page_size: 2,
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            batch_script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn add_file(&self, store_id: &str, file_id: &str, chunking: Option<ChunkingStrategy>) {
        self.files.lock().unwrap().push((
            store_id.to_string(),
            VectorStoreFile {
                id: file_id.to_string(),
                chunking_strategy: chunking,
            },
        ));
    }
}

#[async_trait]
impl VectorStoreApi for MockVectorStore {
    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        after: Option<&str>,
    ) -> Result<ListResponse<VectorStoreFile>> {
        let files: Vec<VectorStoreFile> = self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(store, _)| store == vector_store_id)
            .map(|(_, f)| f.clone())
            .collect();

        let start = after
            .and_then(|id| files.iter().position(|f| f.id == id))
            .map_or(0, |i| i + 1);
        let data: Vec<VectorStoreFile> = files.iter().skip(start).take(self.page_size).cloned().collect();
        let has_more = start + data.len() < files.len();

        Ok(ListResponse {
            last_id: data.last().map(|f| f.id.clone()),
            data,
            has_more,
        })
    }

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore> {
        let mut created = self.created.lock().unwrap();
        let id = format!("vs_new_{}", created.len() + 1);
        created.push(id.clone());
        Ok(VectorStore {
            id,
            name: Some(name.to_string()),
        })
    }

    async fn delete_vector_store(&self, vector_store_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(vector_store_id.to_string());
        Ok(())
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        request: &FileBatchRequest,
    ) -> Result<FileBatch> {
        for id in &request.file_ids {
            self.add_file(vector_store_id, id, request.chunking_strategy);
        }
        self.batches.lock().unwrap().push(request.clone());
        Ok(FileBatch {
            id: "batch_1".to_string(),
            status: FileBatchStatus::InProgress,
        })
    }

    async fn retrieve_file_batch(&self, _vector_store_id: &str, batch_id: &str) -> Result<FileBatch> {
        let status = self
            .batch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FileBatchStatus::Completed);
        Ok(FileBatch {
            id: batch_id.to_string(),
            status,
        })
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        let assistant = self.assistant.lock().unwrap().clone();
        if assistant.id == assistant_id {
            Ok(assistant)
        } else {
            Err(Error::AssistantApi {
                status: 404,
                body: format!("no assistant {assistant_id}"),
            })
        }
    }

    async fn update_assistant(&self, assistant_id: &str, update: &AssistantUpdate) -> Result<Assistant> {
        self.updates.lock().unwrap().push(update.clone());
        let mut assistant = self.assistant.lock().unwrap();
        assistant.id = assistant_id.to_string();
        assistant.tools.clone_from(&update.tools);
        Ok(assistant.clone())
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedFile> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((filename.to_string(), bytes));
        Ok(UploadedFile {
            id: format!("file_{}", uploads.len()),
        })
    }
}
