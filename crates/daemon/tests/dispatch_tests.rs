//! Dispatcher tests over real datagram endpoints.

mod common;

use common::model_at;
use std::path::Path;
use tagfs_core::{Endpoints, FRAME_SIZE, Frame};
use tagfs_daemon::{DaemonTransport, Dispatcher};
use tokio::net::UnixDatagram;
use tempfile::tempdir;

struct Harness {
    endpoints: Endpoints,
    bridge: UnixDatagram,
    operator: UnixDatagram,
    daemon: tokio::task::JoinHandle<()>,
}

impl Harness {
    /// Bind the peer endpoints, then spawn a dispatcher serving a fresh
    /// model out of `root`.
    async fn start(root: &Path, tag_view: bool) -> Self {
        let endpoints = Endpoints::in_dir(root.join("run"));
        tokio::fs::create_dir_all(root.join("run")).await.unwrap();

        let bridge = UnixDatagram::bind(&endpoints.bridge).unwrap();
        let operator = UnixDatagram::bind(&endpoints.operator).unwrap();

        let model = model_at(&root.join("store")).await;
        let transport = DaemonTransport::bind(endpoints.clone()).unwrap();
        let daemon = tokio::spawn(async move {
            let mut dispatcher = Dispatcher::new(model, transport, tag_view);
            dispatcher.run().await.unwrap();
        });

        Self {
            endpoints,
            bridge,
            operator,
            daemon,
        }
    }

    async fn request(&self, sock: &UnixDatagram, payload: &str) -> Vec<String> {
        let frame = Frame::new(payload).unwrap();
        sock.send_to(&frame.encode(), &self.endpoints.daemon)
            .await
            .unwrap();
        let mut parts = Vec::new();
        loop {
            let mut buf = [0u8; FRAME_SIZE];
            let (len, _) = sock.recv_from(&mut buf).await.unwrap();
            let frame = Frame::decode(&buf[..len]).unwrap();
            let is_final = frame.is_final;
            parts.push(frame.payload);
            if is_final {
                return parts;
            }
        }
    }

    async fn bridge_request(&self, payload: &str) -> Vec<String> {
        self.request(&self.bridge, payload).await
    }

    async fn operator_request(&self, payload: &str) -> Vec<String> {
        self.request(&self.operator, payload).await
    }

    async fn shutdown(self) {
        let frame = Frame::new("OP_EXIT").unwrap();
        self.operator
            .send_to(&frame.encode(), &self.endpoints.daemon)
            .await
            .unwrap();
        self.daemon.await.unwrap();
    }
}

#[tokio::test]
async fn bridge_verbs_follow_the_reply_conventions() {
    let temp = tempdir().unwrap();
    let harness = Harness::start(temp.path(), false).await;

    assert_eq!(harness.bridge_request("BR_PING").await, vec!["ACK"]);

    assert_eq!(harness.bridge_request("BR_MKDIR /docs").await, vec!["ACK"]);
    // Expected failures reply with the decimal POSIX code.
    assert_eq!(
        harness.bridge_request("BR_MKDIR /docs").await,
        vec![libc::EEXIST.to_string()]
    );
    assert_eq!(
        harness.bridge_request("BR_MKDIR /missing/sub").await,
        vec![libc::ENOENT.to_string()]
    );

    assert_eq!(harness.bridge_request("BR_IS_DIR /docs").await, vec!["TRUE"]);
    assert_eq!(
        harness.bridge_request("BR_IS_DIR /ghost").await,
        vec!["FALSE"]
    );

    // Create a file, then the listing is a multi-part reply.
    let create = harness.bridge_request("BR_CREATE /docs/a.txt").await;
    assert_eq!(create.len(), 1);
    assert!(create[0].contains("TEMP"), "got {create:?}");
    std::fs::write(&create[0], b"").unwrap();

    let listing = harness.bridge_request("BR_READ_DIR /docs").await;
    assert_eq!(listing, vec!["a.txt"]);

    let root_listing = harness.bridge_request("BR_READ_DIR /").await;
    assert_eq!(root_listing, vec!["docs"]);

    // An empty folder lists as one empty final frame.
    harness.bridge_request("BR_MKDIR /empty").await;
    assert_eq!(harness.bridge_request("BR_READ_DIR /empty").await, vec![""]);

    // Write-release cycle through the wire.
    let blob = harness.bridge_request("BR_GET_PATH_WRITE /docs/a.txt").await;
    std::fs::write(format!("{}.WRITE", blob[0]), b"payload").unwrap();
    assert_eq!(
        harness.bridge_request("BR_RELEASE /docs/a.txt").await,
        vec!["ACK"]
    );
    let blob = harness.bridge_request("BR_GET_PATH /docs/a.txt").await;
    assert_eq!(std::fs::read(&blob[0]).unwrap(), b"payload");

    assert_eq!(
        harness.bridge_request("BR_TRUNCATE 3,/docs/a.txt").await,
        vec!["ACK"]
    );
    assert_eq!(
        harness
            .bridge_request("BR_RENAME /docs/a.txt,/docs/b.txt")
            .await,
        vec!["ACK"]
    );
    assert_eq!(
        harness.bridge_request("BR_UNLINK /docs/b.txt").await,
        vec!["ACK"]
    );

    // A missing file reports back an empty path.
    assert_eq!(
        harness.bridge_request("BR_GET_PATH /docs/b.txt").await,
        vec![""]
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn operator_verbs_reply_with_result_lines() {
    let temp = tempdir().unwrap();
    let harness = Harness::start(temp.path(), false).await;

    let pong = harness.operator_request("OP_PING").await;
    assert!(pong[0].starts_with("ACK"), "got {pong:?}");

    assert_eq!(
        harness.operator_request("OP_CREATE_TAG red").await,
        vec!["Tag successfully created."]
    );
    assert_eq!(
        harness.operator_request("OP_CREATE_TAG red").await,
        vec!["Failed. Tag already exists."]
    );

    // Tag a file and search for it.
    let placeholder = harness.bridge_request("BR_CREATE /x").await;
    std::fs::write(&placeholder[0], b"").unwrap();
    assert_eq!(
        harness.operator_request("OP_TAG /x,red").await,
        vec!["File(s) successfully tagged."]
    );
    assert_eq!(
        harness.operator_request("OP_SEARCH 0,red;").await,
        vec!["x"]
    );
    assert_eq!(
        harness.operator_request("OP_SEARCH 1,red;blue;").await,
        vec![""]
    );
    assert_eq!(
        harness.operator_request("OP_GET_TAGS /x").await,
        vec!["red;"]
    );
    assert_eq!(
        harness.operator_request("OP_GET_TAGS /ghost").await,
        vec!["Invalid"]
    );

    assert_eq!(
        harness.operator_request("OP_DELETE_TAG red").await,
        vec!["Failed. Tag is not empty and has tags and/or files nested under it."]
    );
    assert_eq!(
        harness.operator_request("OP_UNTAG /x,red").await,
        vec!["File(s) successfully untagged."]
    );
    assert_eq!(
        harness.operator_request("OP_DELETE_TAG red").await,
        vec!["Tag successfully deleted."]
    );

    assert_eq!(
        harness.operator_request("OP_CREATE_TAG a").await,
        vec!["Tag successfully created."]
    );
    assert_eq!(
        harness.operator_request("OP_CREATE_TAG b").await,
        vec!["Tag successfully created."]
    );
    assert_eq!(
        harness.operator_request("OP_NEST a,b").await,
        vec!["Tag successfully nested."]
    );
    assert_eq!(
        harness.operator_request("OP_NEST b,a").await,
        vec!["Failed. Nesting would form a cycle."]
    );
    assert_eq!(
        harness.operator_request("OP_UNNEST a,b").await,
        vec!["Tag successfully unnested."]
    );

    let stats = harness.operator_request("OP_STATS").await;
    assert_eq!(stats, vec!["Files: 1, Tags: 2"]);

    harness.shutdown().await;
}

#[tokio::test]
async fn tag_view_dispatch_is_read_only_and_tag_shaped() {
    let temp = tempdir().unwrap();

    // Populate a store in default mode first.
    {
        let mut model = model_at(&temp.path().join("store")).await;
        let placeholder = model.create_file("/x").await.unwrap();
        tokio::fs::write(&placeholder, b"").await.unwrap();
        model.tag_files("/x", "R").await.unwrap();
        model
            .metadata()
            .save(temp.path().join("store").join("metadata").join("fs.db"))
            .await
            .unwrap();
    }

    let harness = Harness::start(temp.path(), true).await;

    assert_eq!(harness.bridge_request("BR_IS_DIR /R").await, vec!["TRUE"]);
    assert_eq!(harness.bridge_request("BR_READ_DIR /R").await, vec!["x"]);

    // Mutating verbs degrade in the tag view.
    assert_eq!(
        harness.bridge_request("BR_TRUNCATE 0,/R/x").await,
        vec![libc::EINVAL.to_string()]
    );
    assert_eq!(
        harness.bridge_request("BR_CREATE /R/y").await,
        vec![libc::EINVAL.to_string()]
    );
    assert_eq!(
        harness.bridge_request("BR_GET_PATH_WRITE /R/x").await,
        vec![""]
    );

    // mkdir creates a tag, unlink untags.
    assert_eq!(harness.bridge_request("BR_MKDIR /G").await, vec!["ACK"]);
    assert_eq!(harness.bridge_request("BR_IS_DIR /G").await, vec!["TRUE"]);
    assert_eq!(harness.bridge_request("BR_UNLINK /R/x").await, vec!["ACK"]);
    assert_eq!(harness.bridge_request("BR_READ_DIR /R").await, vec![""]);

    harness.shutdown().await;
}

#[tokio::test]
async fn unknown_verbs_get_an_error_without_killing_the_loop() {
    let temp = tempdir().unwrap();
    let harness = Harness::start(temp.path(), false).await;

    assert_eq!(
        harness.bridge_request("BR_BOGUS whatever").await,
        vec![libc::EINVAL.to_string()]
    );
    assert_eq!(
        harness.operator_request("OP_BOGUS").await,
        vec!["Failed. Unknown request."]
    );
    // Still alive.
    assert_eq!(harness.bridge_request("BR_PING").await, vec!["ACK"]);

    harness.shutdown().await;
}
