//! The serial request dispatcher.
//!
//! One loop, one request at a time: receive a frame from the inbound
//! endpoint, split `VERB payload` at the first space, run the model
//! operation, reply on the endpoint matching the verb's namespace.
//! `BR_*` verbs come from the filesystem bridge and get `ACK` / decimal
//! errno / `TRUE`/`FALSE` replies; `OP_*` verbs come from the operator CLI
//! and get message-text replies the CLI prints verbatim.

use crate::model::{FsModel, ModelError, ModelResult};
use crate::transport::{DaemonTransport, TransportError, TransportResult};
use tagfs_core::path;

/// Reply token for successful mutations.
const ACK: &str = "ACK";

/// The request dispatcher.
pub struct Dispatcher {
    model: FsModel,
    transport: DaemonTransport,
    tag_view: bool,
    requests_handled: u64,
}

enum Outcome {
    Continue,
    Shutdown,
}

impl Dispatcher {
    /// Build a dispatcher over a model and a bound transport.
    pub fn new(model: FsModel, transport: DaemonTransport, tag_view: bool) -> Self {
        Self {
            model,
            transport,
            tag_view,
            requests_handled: 0,
        }
    }

    /// Run until a shutdown verb arrives from either producer.
    ///
    /// Malformed frames are dropped; only endpoint failures end the loop
    /// abnormally.
    pub async fn run(&mut self) -> TransportResult<()> {
        loop {
            let frame = match self.transport.recv().await {
                Ok(frame) => frame,
                Err(TransportError::Frame(e)) => {
                    tracing::warn!(error = %e, "dropping malformed frame");
                    continue;
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(request = %frame.payload, "request received");
            match self.dispatch(&frame.payload).await {
                Outcome::Continue => {}
                Outcome::Shutdown => return Ok(()),
            }
        }
    }

    /// Tear down into the model and transport for the shutdown sequence.
    pub fn into_parts(self) -> (FsModel, DaemonTransport) {
        (self.model, self.transport)
    }

    async fn dispatch(&mut self, request: &str) -> Outcome {
        self.requests_handled += 1;
        let (verb, payload) = path::split_once_at(request, ' ');
        match verb {
            "BR_EXIT" | "OP_EXIT" => return Outcome::Shutdown,

            "BR_PING" => self.bridge_reply(ACK.to_string()).await,
            "BR_LOG" => {
                tracing::debug!(bridge = %payload, "bridge log");
                self.bridge_reply(ACK.to_string()).await;
            }

            "BR_GET_PATH" => {
                let result = if self.tag_view {
                    self.model.tagged_file_path(payload).await
                } else {
                    self.model.file_path(payload).await
                };
                self.bridge_path_reply(result).await;
            }
            "BR_GET_PATH_WRITE" => {
                // The tag view is read-only; only default mode hands out
                // writable paths.
                let result = if self.tag_view {
                    Ok(None)
                } else {
                    self.model.file_path(payload).await
                };
                self.bridge_path_reply(result).await;
            }
            "BR_IS_DIR" => {
                let result = if self.tag_view {
                    self.model.tag_exists(payload).await
                } else {
                    self.model.folder_exists(payload).await
                };
                let reply = match result {
                    Ok(true) => "TRUE".to_string(),
                    Ok(false) => "FALSE".to_string(),
                    Err(e) => e.to_errno().to_string(),
                };
                self.bridge_reply(reply).await;
            }
            "BR_READ_DIR" => {
                let result = if self.tag_view {
                    self.model.list_tag_children(payload).await
                } else {
                    self.model.list_folder(payload).await
                };
                match result {
                    Ok(contents) => {
                        if let Err(e) = self.transport.reply_bridge_parts(&contents).await {
                            tracing::warn!(error = %e, "failed to reply to bridge");
                        }
                    }
                    Err(e) => self.bridge_reply(e.to_errno().to_string()).await,
                }
            }
            "BR_MKDIR" => {
                let result = if self.tag_view {
                    self.model.create_tag(payload).await
                } else {
                    self.model.create_folder(payload).await
                };
                self.bridge_ack_reply(result).await;
            }
            "BR_RMDIR" => {
                let result = if self.tag_view {
                    self.model.delete_tag(payload).await
                } else {
                    self.model.delete_folder(payload).await
                };
                self.bridge_ack_reply(result).await;
            }
            "BR_UNLINK" => {
                // In the tag view, unlink detaches the file from its tag
                // instead of deleting it.
                let result = if self.tag_view {
                    self.model.untag_by_tag_path(payload).await
                } else {
                    self.model.delete_file(payload).await.map(|_| ())
                };
                self.bridge_ack_reply(result).await;
            }
            "BR_RENAME" => {
                let (old, new) = path::split_once_at(payload, ',');
                let result = if self.tag_view {
                    self.model.rename_tagged_path(old, new).await
                } else {
                    self.model.rename_path(old, new).await
                };
                self.bridge_ack_reply(result).await;
            }
            "BR_TRUNCATE" => {
                let (len, mounted) = path::split_once_at(payload, ',');
                let result = if self.tag_view {
                    Err(ModelError::Unsupported("tag view is read-only".to_string()))
                } else {
                    match len.parse::<u64>() {
                        Ok(len) => self.model.truncate_file(len, mounted).await,
                        Err(_) => Err(ModelError::Unsupported(format!("bad length: {len}"))),
                    }
                };
                self.bridge_ack_reply(result).await;
            }
            "BR_RELEASE" => {
                let result = if self.tag_view {
                    Ok(())
                } else {
                    self.model.update_file(payload).await
                };
                self.bridge_ack_reply(result).await;
            }
            "BR_CREATE" => {
                let result = if self.tag_view {
                    Err(ModelError::Unsupported("tag view is read-only".to_string()))
                } else {
                    self.model.create_file(payload).await
                };
                let reply = match result {
                    Ok(blob_path) => blob_path.to_string_lossy().into_owned(),
                    Err(e) => e.to_errno().to_string(),
                };
                self.bridge_reply(reply).await;
            }

            "OP_PING" => {
                let reply = format!("{ACK} (requests handled: {})", self.requests_handled);
                self.operator_reply(reply).await;
            }
            "OP_TAG" => {
                let (mounted, tag) = path::split_once_at(payload, ',');
                let reply = match self.model.tag_files(mounted, tag).await {
                    Ok(()) => "File(s) successfully tagged.".to_string(),
                    Err(ModelError::Exists(_)) => {
                        "Failed. Filename conflict with files already tagged with the same tag."
                            .to_string()
                    }
                    Err(_) => "Failed. Either file(s) path or tag is invalid.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_UNTAG" => {
                let (mounted, tag) = path::split_once_at(payload, ',');
                let reply = match self.model.untag_files(mounted, tag).await {
                    Ok(()) => "File(s) successfully untagged.".to_string(),
                    Err(_) => "Failed. Either file(s) path or tag is invalid.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_NEST" => {
                let (child, parent) = path::split_once_at(payload, ',');
                let reply = match self.model.nest_tag(child, parent).await {
                    Ok(()) => "Tag successfully nested.".to_string(),
                    Err(ModelError::Cycle { .. }) => {
                        "Failed. Nesting would form a cycle.".to_string()
                    }
                    Err(ModelError::Exists(_)) => "Failed. Tag is already nested.".to_string(),
                    Err(_) => "Failed. Either tag is invalid.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_UNNEST" => {
                let (child, parent) = path::split_once_at(payload, ',');
                let reply = match self.model.unnest_tag(child, parent).await {
                    Ok(()) => "Tag successfully unnested.".to_string(),
                    Err(_) => "Failed. Either tag is invalid.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_STATS" => {
                let reply = match self.model.stats().await {
                    Ok(stats) => format!("Files: {}, Tags: {}", stats.files, stats.tags),
                    Err(_) => "Failed. Stats unavailable.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_SEARCH" => {
                let (strict, tags) = path::split_once_at(payload, ',');
                let tags = tagfs_core::idlist::split(tags);
                match self.model.search_by_tags(&tags, strict == "1").await {
                    Ok(names) => {
                        if let Err(e) = self.transport.reply_operator_parts(&names).await {
                            tracing::warn!(error = %e, "failed to reply to operator");
                        }
                    }
                    Err(_) => self.operator_reply(String::new()).await,
                }
            }
            "OP_CREATE_TAG" => {
                let reply = match self.model.create_tag(payload).await {
                    Ok(()) => "Tag successfully created.".to_string(),
                    Err(ModelError::Exists(_)) => "Failed. Tag already exists.".to_string(),
                    Err(_) => "Failed. Given tag is invalid.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_DELETE_TAG" => {
                let reply = match self.model.delete_tag(payload).await {
                    Ok(()) => "Tag successfully deleted.".to_string(),
                    Err(ModelError::NotEmpty(_)) => {
                        "Failed. Tag is not empty and has tags and/or files nested under it."
                            .to_string()
                    }
                    Err(_) => "Failed. Given tag is invalid.".to_string(),
                };
                self.operator_reply(reply).await;
            }
            "OP_GET_TAGS" => {
                let reply = match self.model.file_tags_for_path(payload).await {
                    Ok(tags) => tagfs_core::idlist::join(&tags),
                    Err(_) => "Invalid".to_string(),
                };
                self.operator_reply(reply).await;
            }

            unknown => {
                tracing::warn!(verb = %unknown, "unknown request verb");
                if unknown.starts_with("BR_") {
                    self.bridge_reply(libc::EINVAL.to_string()).await;
                } else if unknown.starts_with("OP_") {
                    self.operator_reply("Failed. Unknown request.".to_string()).await;
                }
            }
        }
        Outcome::Continue
    }

    async fn bridge_path_reply(&self, result: ModelResult<Option<std::path::PathBuf>>) {
        let reply = match result {
            Ok(Some(blob_path)) => blob_path.to_string_lossy().into_owned(),
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!(error = %e, "path lookup failed");
                String::new()
            }
        };
        self.bridge_reply(reply).await;
    }

    async fn bridge_ack_reply(&self, result: ModelResult<()>) {
        let reply = match result {
            Ok(()) => ACK.to_string(),
            Err(e) => e.to_errno().to_string(),
        };
        self.bridge_reply(reply).await;
    }

    /// Reply failures never take the daemon down; a vanished peer just
    /// loses its answer.
    async fn bridge_reply(&self, payload: String) {
        if let Err(e) = self.transport.reply_bridge(&payload).await {
            tracing::warn!(error = %e, "failed to reply to bridge");
        }
    }

    async fn operator_reply(&self, payload: String) {
        if let Err(e) = self.transport.reply_operator(&payload).await {
            tracing::warn!(error = %e, "failed to reply to operator");
        }
    }
}
