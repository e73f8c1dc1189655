//! Index Service contract and the worker threads that make its calls
//! non-blocking for the coordination core.
//!
//! The core never calls an [`IndexService`] directly. It sends a
//! [`ServiceRequest`] through a [`ServiceHandle`] and later drains the matching
//! [`ServiceResponse`] on its own thread. Responses carry the request id (or
//! search generation) they answer so receivers can drop stale ones.

use crate::model::{FileEntry, IndexEntry, IndexProgress};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

pub trait IndexService: Send + Sync {
    fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>>;
    fn parent_of(&self, path: &Path) -> Result<Option<PathBuf>>;
    fn search_index(&self, query: &str) -> Result<Vec<IndexEntry>>;
    fn start_index_build(&self) -> Result<()>;
    fn index_progress(&self) -> Result<IndexProgress>;
    fn indexed_file_count(&self) -> Result<usize>;
    fn load_persisted_index(&self) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    ListDirectory { request_id: u64, path: PathBuf },
    ParentOf { request_id: u64, path: PathBuf },
    SearchIndex { generation: u64, query: String },
    StartIndexBuild,
    IndexProgress,
    IndexedFileCount,
    LoadPersistedIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    Directory {
        request_id: u64,
        result: Result<Vec<FileEntry>, String>,
    },
    Parent {
        request_id: u64,
        result: Result<Option<PathBuf>, String>,
    },
    SearchResults {
        generation: u64,
        result: Result<Vec<IndexEntry>, String>,
    },
    BuildStarted {
        result: Result<(), String>,
    },
    Progress {
        result: Result<IndexProgress, String>,
    },
    FileCount {
        result: Result<usize, String>,
    },
    PersistedIndex {
        result: Result<bool, String>,
    },
}

/// The core's end of the service connection.
pub struct ServiceHandle {
    tx: Sender<ServiceRequest>,
    rx: Receiver<ServiceResponse>,
}

/// The far end of a detached handle: whoever holds it plays the service.
pub struct ServicePeer {
    pub requests: Receiver<ServiceRequest>,
    pub responses: Sender<ServiceResponse>,
}

impl ServicePeer {
    pub fn drain_requests(&self) -> Vec<ServiceRequest> {
        self.requests.try_iter().collect()
    }

    pub fn respond(&self, response: ServiceResponse) {
        let _ = self.responses.send(response);
    }
}

impl ServiceHandle {
    /// Runs `service` on background worker threads.
    pub fn spawn(service: Arc<dyn IndexService>) -> Self {
        let (tx_req, rx_req) = mpsc::channel::<ServiceRequest>();
        let (tx_res, rx_res) = mpsc::channel::<ServiceResponse>();
        spawn_router(service, rx_req, tx_res);
        Self {
            tx: tx_req,
            rx: rx_res,
        }
    }

    /// A handle with no workers behind it, for hosts that bring their own
    /// transport and for driving the core step by step.
    pub fn detached() -> (Self, ServicePeer) {
        let (tx_req, rx_req) = mpsc::channel::<ServiceRequest>();
        let (tx_res, rx_res) = mpsc::channel::<ServiceResponse>();
        (
            Self {
                tx: tx_req,
                rx: rx_res,
            },
            ServicePeer {
                requests: rx_req,
                responses: tx_res,
            },
        )
    }

    /// Returns false when the workers are gone.
    pub fn send(&self, request: ServiceRequest) -> bool {
        self.tx.send(request).is_ok()
    }

    pub fn try_recv(&self) -> Option<ServiceResponse> {
        match self.rx.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

fn describe(err: anyhow::Error) -> String {
    format!("{err:#}")
}

fn spawn_router(
    service: Arc<dyn IndexService>,
    rx_req: Receiver<ServiceRequest>,
    tx_res: Sender<ServiceResponse>,
) {
    let listing_tx = spawn_listing_worker(Arc::clone(&service), tx_res.clone());
    let search_tx = spawn_search_worker(Arc::clone(&service), tx_res.clone());
    let index_tx = spawn_index_worker(service, tx_res);

    thread::spawn(move || {
        while let Ok(req) = rx_req.recv() {
            let lane = match req {
                ServiceRequest::ListDirectory { .. } | ServiceRequest::ParentOf { .. } => {
                    &listing_tx
                }
                ServiceRequest::SearchIndex { .. } => &search_tx,
                ServiceRequest::StartIndexBuild
                | ServiceRequest::IndexProgress
                | ServiceRequest::IndexedFileCount
                | ServiceRequest::LoadPersistedIndex => &index_tx,
            };
            if lane.send(req).is_err() {
                tracing::warn!("service worker exited; stopping request router");
                break;
            }
        }
    });
}

fn spawn_listing_worker(
    service: Arc<dyn IndexService>,
    tx_res: Sender<ServiceResponse>,
) -> Sender<ServiceRequest> {
    let (tx_req, rx_req) = mpsc::channel::<ServiceRequest>();
    thread::spawn(move || {
        while let Ok(req) = rx_req.recv() {
            let response = match req {
                ServiceRequest::ListDirectory { request_id, path } => ServiceResponse::Directory {
                    request_id,
                    result: service.list_directory(&path).map_err(describe),
                },
                ServiceRequest::ParentOf { request_id, path } => ServiceResponse::Parent {
                    request_id,
                    result: service.parent_of(&path).map_err(describe),
                },
                _ => continue,
            };
            if tx_res.send(response).is_err() {
                break;
            }
        }
    });
    tx_req
}

fn spawn_search_worker(
    service: Arc<dyn IndexService>,
    tx_res: Sender<ServiceResponse>,
) -> Sender<ServiceRequest> {
    let (tx_req, rx_req) = mpsc::channel::<ServiceRequest>();
    thread::spawn(move || {
        while let Ok(mut req) = rx_req.recv() {
            while let Ok(newer) = rx_req.try_recv() {
                req = newer;
            }
            let ServiceRequest::SearchIndex { generation, query } = req else {
                continue;
            };
            let response = ServiceResponse::SearchResults {
                generation,
                result: service.search_index(&query).map_err(describe),
            };
            if tx_res.send(response).is_err() {
                break;
            }
        }
    });
    tx_req
}

fn spawn_index_worker(
    service: Arc<dyn IndexService>,
    tx_res: Sender<ServiceResponse>,
) -> Sender<ServiceRequest> {
    let (tx_req, rx_req) = mpsc::channel::<ServiceRequest>();
    thread::spawn(move || {
        while let Ok(req) = rx_req.recv() {
            let response = match req {
                ServiceRequest::StartIndexBuild => ServiceResponse::BuildStarted {
                    result: service.start_index_build().map_err(describe),
                },
                ServiceRequest::IndexProgress => ServiceResponse::Progress {
                    result: service.index_progress().map_err(describe),
                },
                ServiceRequest::IndexedFileCount => ServiceResponse::FileCount {
                    result: service.indexed_file_count().map_err(describe),
                },
                ServiceRequest::LoadPersistedIndex => ServiceResponse::PersistedIndex {
                    result: service.load_persisted_index().map_err(describe),
                },
                _ => continue,
            };
            if tx_res.send(response).is_err() {
                break;
            }
        }
    });
    tx_req
}
