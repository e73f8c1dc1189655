use crate::model::{folder_label, FileEntry};
use crate::service::{ServiceHandle, ServiceRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const BREADCRUMB_WINDOW: usize = 4;

/// What is currently shown for the active session. Replaced wholesale, never
/// edited in place, so readers holding the `Arc` always see a whole snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryListing {
    pub path: Option<PathBuf>,
    pub entries: Vec<FileEntry>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl DirectoryListing {
    pub fn folder_name(&self) -> String {
        self.path.as_deref().map(folder_label).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreadcrumbSegment {
    pub name: String,
    pub path: PathBuf,
}

/// Every prefix of `path` from the root down, keeping only the last
/// [`BREADCRUMB_WINDOW`] segments.
pub fn breadcrumb_segments(path: &Path) -> Vec<BreadcrumbSegment> {
    let mut segments: Vec<BreadcrumbSegment> = path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| BreadcrumbSegment {
            name: folder_label(p),
            path: p.to_path_buf(),
        })
        .collect();
    segments.reverse();
    let skip = segments.len().saturating_sub(BREADCRUMB_WINDOW);
    segments.split_off(skip)
}

#[derive(Debug)]
pub struct NavigationController {
    listing: Arc<DirectoryListing>,
    next_request_id: u64,
    pending_listing: Option<u64>,
    pending_parent: Option<u64>,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationController {
    pub fn new() -> Self {
        Self {
            listing: Arc::new(DirectoryListing::default()),
            next_request_id: 1,
            pending_listing: None,
            pending_parent: None,
        }
    }

    pub fn listing(&self) -> Arc<DirectoryListing> {
        Arc::clone(&self.listing)
    }

    pub fn is_loading(&self) -> bool {
        self.listing.is_loading
    }

    pub fn has_pending(&self) -> bool {
        self.pending_listing.is_some() || self.pending_parent.is_some()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.saturating_add(1);
        id
    }

    /// Issues a listing request. Any earlier listing or parent lookup still
    /// in flight becomes stale.
    pub fn load_directory(&mut self, path: &Path, service: &ServiceHandle) {
        let request_id = self.next_id();
        self.pending_listing = Some(request_id);
        self.pending_parent = None;
        self.listing = Arc::new(DirectoryListing {
            path: Some(path.to_path_buf()),
            entries: Vec::new(),
            is_loading: true,
            error_message: None,
        });

        let sent = service.send(ServiceRequest::ListDirectory {
            request_id,
            path: path.to_path_buf(),
        });
        if !sent {
            tracing::warn!(path = %path.display(), "directory service is unavailable");
            self.finish_listing(request_id, Err("Directory service is unavailable".to_string()));
        }
    }

    /// Applies a listing response. Returns false for responses to superseded
    /// requests, which are dropped.
    pub fn finish_listing(&mut self, request_id: u64, result: Result<Vec<FileEntry>, String>) -> bool {
        if self.pending_listing != Some(request_id) {
            tracing::debug!(request_id, "dropping stale directory listing");
            return false;
        }
        self.pending_listing = None;
        let path = self.listing.path.clone();
        let listing = match result {
            Ok(entries) => DirectoryListing {
                path,
                entries,
                is_loading: false,
                error_message: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "directory listing failed");
                DirectoryListing {
                    path,
                    entries: Vec::new(),
                    is_loading: false,
                    error_message: Some(error),
                }
            }
        };
        self.listing = Arc::new(listing);
        true
    }

    pub fn request_parent(&mut self, path: &Path, service: &ServiceHandle) {
        let request_id = self.next_id();
        self.pending_parent = Some(request_id);
        let sent = service.send(ServiceRequest::ParentOf {
            request_id,
            path: path.to_path_buf(),
        });
        if !sent {
            tracing::warn!(path = %path.display(), "cannot resolve parent: service unavailable");
            self.pending_parent = None;
        }
    }

    /// Resolves a parent response to the path to navigate to, if any.
    /// Failures are logged and navigation simply does not happen.
    pub fn finish_parent(
        &mut self,
        request_id: u64,
        result: Result<Option<PathBuf>, String>,
    ) -> Option<PathBuf> {
        if self.pending_parent != Some(request_id) {
            tracing::debug!(request_id, "dropping stale parent response");
            return None;
        }
        self.pending_parent = None;
        match result {
            Ok(parent) => parent,
            Err(error) => {
                tracing::warn!(error = %error, "failed to resolve parent folder");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: PathBuf::from("/w").join(name),
            is_directory: false,
        }
    }

    #[test]
    fn breadcrumbs_keep_last_four_cumulative_segments() {
        let segments = breadcrumb_segments(Path::new("/a/b/c/d/e/f"));
        let names: Vec<&str> = segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["c", "d", "e", "f"]);
        let paths: Vec<PathBuf> = segments.into_iter().map(|s| s.path).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/a/b/c"),
                PathBuf::from("/a/b/c/d"),
                PathBuf::from("/a/b/c/d/e"),
                PathBuf::from("/a/b/c/d/e/f"),
            ]
        );
    }

    #[test]
    fn breadcrumbs_for_shallow_path_include_root() {
        let segments = breadcrumb_segments(Path::new("/home/alice"));
        let names: Vec<&str> = segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["/", "home", "alice"]);
    }

    #[test]
    fn load_marks_loading_and_success_replaces_entries() {
        let (service, peer) = ServiceHandle::detached();
        let mut nav = NavigationController::new();
        nav.load_directory(Path::new("/w"), &service);
        assert!(nav.is_loading());
        let Some(ServiceRequest::ListDirectory { request_id, .. }) =
            peer.drain_requests().pop()
        else {
            panic!("expected listing request");
        };

        let before = nav.listing();
        assert!(nav.finish_listing(request_id, Ok(vec![entry("a"), entry("b")])));
        let after = nav.listing();
        assert!(!after.is_loading);
        assert_eq!(after.entries.len(), 2);
        assert_eq!(after.folder_name(), "w");
        // The earlier snapshot is untouched.
        assert!(before.is_loading);
        assert!(before.entries.is_empty());
    }

    #[test]
    fn failure_sets_error_and_clears_loading() {
        let (service, peer) = ServiceHandle::detached();
        let mut nav = NavigationController::new();
        nav.load_directory(Path::new("/locked"), &service);
        let Some(ServiceRequest::ListDirectory { request_id, .. }) =
            peer.drain_requests().pop()
        else {
            panic!("expected listing request");
        };
        assert!(nav.finish_listing(request_id, Err("permission denied".to_string())));
        let listing = nav.listing();
        assert!(!listing.is_loading);
        assert!(listing.entries.is_empty());
        assert_eq!(listing.error_message.as_deref(), Some("permission denied"));
    }

    #[test]
    fn superseded_listing_is_dropped() {
        let (service, peer) = ServiceHandle::detached();
        let mut nav = NavigationController::new();
        nav.load_directory(Path::new("/one"), &service);
        nav.load_directory(Path::new("/two"), &service);
        let ids: Vec<u64> = peer
            .drain_requests()
            .into_iter()
            .filter_map(|r| match r {
                ServiceRequest::ListDirectory { request_id, .. } => Some(request_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(!nav.finish_listing(ids[0], Ok(vec![entry("old")])));
        assert!(nav.is_loading());
        assert!(nav.finish_listing(ids[1], Ok(vec![entry("new")])));
        assert_eq!(nav.listing().path, Some(PathBuf::from("/two")));
    }

    #[test]
    fn unavailable_service_surfaces_error() {
        let (service, peer) = ServiceHandle::detached();
        drop(peer);
        let mut nav = NavigationController::new();
        nav.load_directory(Path::new("/w"), &service);
        let listing = nav.listing();
        assert!(!listing.is_loading);
        assert!(listing.error_message.is_some());
    }

    #[test]
    fn parent_failure_yields_no_navigation() {
        let (service, peer) = ServiceHandle::detached();
        let mut nav = NavigationController::new();
        nav.request_parent(Path::new("/a/b"), &service);
        let Some(ServiceRequest::ParentOf { request_id, .. }) = peer.drain_requests().pop()
        else {
            panic!("expected parent request");
        };
        assert_eq!(nav.finish_parent(request_id, Err("boom".to_string())), None);

        nav.request_parent(Path::new("/a/b"), &service);
        let Some(ServiceRequest::ParentOf { request_id, .. }) = peer.drain_requests().pop()
        else {
            panic!("expected parent request");
        };
        assert_eq!(
            nav.finish_parent(request_id, Ok(Some(PathBuf::from("/a")))),
            Some(PathBuf::from("/a"))
        );
    }

    #[test]
    fn loading_another_folder_drops_outstanding_parent_lookup() {
        let (service, peer) = ServiceHandle::detached();
        let mut nav = NavigationController::new();
        nav.request_parent(Path::new("/w/a/deep"), &service);
        let Some(ServiceRequest::ParentOf { request_id, .. }) = peer.drain_requests().pop()
        else {
            panic!("expected parent request");
        };
        nav.load_directory(Path::new("/w/b"), &service);
        assert_eq!(
            nav.finish_parent(request_id, Ok(Some(PathBuf::from("/w/a")))),
            None
        );
        assert_eq!(nav.listing().path, Some(PathBuf::from("/w/b")));
    }
}
