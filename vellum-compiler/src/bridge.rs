//! Compiler-specific operations over a [`WorkerChannel`].
//!
//! Responses are demultiplexed by correlation id: a routing observer
//! resolves the oneshot future registered at send time. Unsolicited
//! responses (`logger` lines, diagnostics pushed outside a query) are
//! logged here and remain visible to any additional observers registered
//! on the channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use vellum_vfs::ProjectPath;

use crate::channel::{ChannelError, WorkerChannel};
use crate::protocol::{
    CompilerOp, CompilerPayload, CompilerRequest, CompilerResponse, CompletionItem,
    DefinitionLocation, Diagnostic,
};

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Compilation produced diagnostics. Surfaced, never retried here —
    /// retry is the caller's decision after the user edits again.
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Compile(Vec<Diagnostic>),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("worker channel closed before responding")]
    ChannelClosed,

    #[error("unexpected `{0}` response")]
    UnexpectedResponse(&'static str),
}

/// Successful compile result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub pages: usize,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CompilerPayload>>>>;

/// The editor's handle on the background compiler.
pub struct CompilerBridge {
    channel: WorkerChannel<CompilerRequest, CompilerResponse>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl CompilerBridge {
    pub fn new(channel: WorkerChannel<CompilerRequest, CompilerResponse>) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let routing = pending.clone();
        channel.add_observer(move |res: &CompilerResponse| match res.request_id {
            Some(id) => {
                let sender = routing.lock().ok().and_then(|mut map| map.remove(&id));
                match sender {
                    Some(tx) => {
                        let _ = tx.send(res.payload.clone());
                    }
                    None => log::warn!("compiler response for unknown request {id}"),
                }
            }
            None => match &res.payload {
                CompilerPayload::Logger { message } => log::debug!("compiler: {message}"),
                CompilerPayload::Error { diagnostics } => {
                    log::warn!("compiler pushed {} diagnostic(s)", diagnostics.len());
                }
                other => log::debug!("unsolicited `{}` response dropped", other.kind()),
            },
        });

        Self {
            channel,
            pending,
            next_id: AtomicU64::new(1),
        }
    }

    /// The underlying channel, e.g. to attach a logging sink.
    pub fn channel(&self) -> &WorkerChannel<CompilerRequest, CompilerResponse> {
        &self.channel
    }

    /// Point the compiler at the project root.
    pub fn init(&self, root: &ProjectPath) -> Result<(), ChannelError> {
        self.fire(CompilerOp::Init { root: root.rooted() })
    }

    /// Forward a text edit to keep the compiler's view current.
    /// Offsets are codepoints into the file as the compiler last saw it.
    pub fn edit(
        &self,
        file: &ProjectPath,
        text: &str,
        offset_start: usize,
        offset_end: usize,
    ) -> Result<(), ChannelError> {
        self.fire(CompilerOp::Edit {
            file: file.rooted(),
            text: text.to_string(),
            offset_start,
            offset_end,
        })
    }

    pub fn add_file(&self, file: &ProjectPath, content: &str) -> Result<(), ChannelError> {
        self.fire(CompilerOp::AddFile {
            file: file.rooted(),
            content: content.to_string(),
        })
    }

    pub fn move_file(&self, old: &ProjectPath, new: &ProjectPath) -> Result<(), ChannelError> {
        self.fire(CompilerOp::Move {
            old_path: old.rooted(),
            new_path: new.rooted(),
        })
    }

    pub fn set_root(&self, path: &ProjectPath) -> Result<(), ChannelError> {
        self.fire(CompilerOp::SetRoot { path: path.rooted() })
    }

    /// Compile the project. Diagnostics come back as an error value.
    pub async fn compile(&self) -> Result<CompileOutput, BridgeError> {
        match self.request(CompilerOp::Compile).await? {
            CompilerPayload::Compile { pages } => Ok(CompileOutput { pages }),
            CompilerPayload::Error { diagnostics } => Err(BridgeError::Compile(diagnostics)),
            other => Err(BridgeError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn autocomplete(
        &self,
        file: &ProjectPath,
        offset: usize,
    ) -> Result<Vec<CompletionItem>, BridgeError> {
        match self
            .request(CompilerOp::Autocomplete {
                file: file.rooted(),
                offset,
            })
            .await?
        {
            CompilerPayload::Completion { items } => Ok(items),
            other => Err(BridgeError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn definition(
        &self,
        file: &ProjectPath,
        offset: usize,
    ) -> Result<Option<DefinitionLocation>, BridgeError> {
        match self
            .request(CompilerOp::Definition {
                file: file.rooted(),
                offset,
            })
            .await?
        {
            CompilerPayload::Definition { location } => Ok(location),
            other => Err(BridgeError::UnexpectedResponse(other.kind())),
        }
    }

    /// Terminate the compiler. Outstanding requests resolve with
    /// [`BridgeError::ChannelClosed`].
    pub fn dispose(&self) {
        self.channel.dispose();
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }

    fn fire(&self, op: CompilerOp) -> Result<(), ChannelError> {
        self.channel.send(CompilerRequest {
            request_id: None,
            op,
        })
    }

    async fn request(&self, op: CompilerOp) -> Result<CompilerPayload, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, tx);
        }

        if let Err(e) = self.channel.send(CompilerRequest {
            request_id: Some(id),
            op,
        }) {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(BridgeError::Channel(e));
        }

        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }
}
