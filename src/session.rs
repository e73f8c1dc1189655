use crate::model::folder_label;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabColor {
    #[default]
    Blue,
    Green,
    Orange,
    Purple,
    Red,
    Teal,
    #[serde(other)]
    Gray,
}

impl TabColor {
    pub const PALETTE: [TabColor; 7] = [
        TabColor::Blue,
        TabColor::Green,
        TabColor::Orange,
        TabColor::Purple,
        TabColor::Red,
        TabColor::Teal,
        TabColor::Gray,
    ];

    /// Colour handed to the n-th tab when the caller does not pick one.
    pub fn cycle(n: usize) -> Self {
        Self::PALETTE[n % Self::PALETTE.len()]
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            TabColor::Blue => [59, 130, 246],
            TabColor::Green => [34, 197, 94],
            TabColor::Orange => [249, 115, 22],
            TabColor::Purple => [168, 85, 247],
            TabColor::Red => [239, 68, 68],
            TabColor::Teal => [20, 184, 166],
            TabColor::Gray => [148, 163, 184],
        }
    }
}

/// A tab. `display_name` is pinned to the folder the tab was opened on and is
/// not recomputed when `path` moves during browsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub path: PathBuf,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub color: TabColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pinned_path: Option<PathBuf>,
}

impl Session {
    pub fn new(path: PathBuf, color: TabColor) -> Self {
        Self {
            id: SessionId::generate(),
            display_name: folder_label(&path),
            pinned_path: Some(path.clone()),
            path,
            color,
        }
    }

    /// The folder this tab was opened on. Configs written before the field
    /// existed fall back to the current path.
    pub fn pinned_path(&self) -> &Path {
        self.pinned_path.as_deref().unwrap_or(&self.path)
    }
}

/// Sessions plus the active pointer, as written to and read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSessions {
    pub sessions: Vec<Session>,
    pub active_id: Option<SessionId>,
}

/// Ordered tabs and the active one. Every operation on an unknown id is a
/// no-op returning `false`: drag events can race state updates.
#[derive(Debug, Clone, Default)]
pub struct TabSessionStore {
    sessions: Vec<Session>,
    active_id: Option<SessionId>,
}

impl TabSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(persisted: PersistedSessions) -> Self {
        let mut store = Self {
            sessions: persisted.sessions,
            active_id: persisted.active_id,
        };
        let active_known = store
            .active_id
            .as_ref()
            .is_some_and(|id| store.position(id).is_some());
        if !active_known {
            store.active_id = store.sessions.first().map(|s| s.id.clone());
        }
        store
    }

    pub fn snapshot(&self) -> PersistedSessions {
        PersistedSessions {
            sessions: self.sessions.clone(),
            active_id: self.active_id.clone(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_id(&self) -> Option<&SessionId> {
        self.active_id.as_ref()
    }

    pub fn active(&self) -> Option<&Session> {
        self.active_id.as_ref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn position(&self, id: &SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| &s.id == id)
    }

    pub fn open(&mut self, path: PathBuf, color: Option<TabColor>) -> Session {
        let color = color.unwrap_or_else(|| TabColor::cycle(self.sessions.len()));
        let session = Session::new(path, color);
        self.active_id = Some(session.id.clone());
        self.sessions.push(session.clone());
        session
    }

    /// Removes a tab. The last remaining tab is never removed. When the active
    /// tab closes, the tab sliding into its slot (clamped to the new tail)
    /// becomes active.
    pub fn close(&mut self, id: &SessionId) -> bool {
        if self.sessions.len() <= 1 {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };
        self.sessions.remove(index);
        if self.active_id.as_ref() == Some(id) {
            let next = index.min(self.sessions.len() - 1);
            self.active_id = Some(self.sessions[next].id.clone());
        }
        true
    }

    pub fn switch_to(&mut self, id: &SessionId) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.active_id = Some(id.clone());
        true
    }

    pub fn recolor(&mut self, id: &SessionId, color: TabColor) -> bool {
        match self.sessions.iter_mut().find(|s| &s.id == id) {
            Some(session) => {
                session.color = color;
                true
            }
            None => false,
        }
    }

    /// Moves `from` into the slot `to` occupies before the move (splice
    /// semantics). Swapping two neighbours and swapping them back restores
    /// the original order; a longer move is undone by moving the tab back to
    /// its former index.
    pub fn reorder(&mut self, from: &SessionId, to: &SessionId) -> bool {
        if from == to {
            return false;
        }
        let (Some(from_index), Some(to_index)) = (self.position(from), self.position(to)) else {
            return false;
        };
        let moved = self.sessions.remove(from_index);
        self.sessions.insert(to_index, moved);
        true
    }

    pub fn move_to_end(&mut self, from: &SessionId) -> bool {
        let Some(index) = self.position(from) else {
            return false;
        };
        if index + 1 == self.sessions.len() {
            return false;
        }
        let moved = self.sessions.remove(index);
        self.sessions.push(moved);
        true
    }

    /// Moves a tab's browsing location. The pinned name stays put.
    pub fn set_path(&mut self, id: &SessionId, path: PathBuf) -> bool {
        match self.sessions.iter_mut().find(|s| &s.id == id) {
            Some(session) => {
                session.path = path;
                true
            }
            None => false,
        }
    }

    /// Returns a tab to its pinned folder. `false` if it is already there.
    pub fn reset_to_pinned(&mut self, id: &SessionId) -> bool {
        match self.sessions.iter_mut().find(|s| &s.id == id) {
            Some(session) if session.pinned_path() != session.path => {
                session.path = session.pinned_path().to_path_buf();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(names: &[&str]) -> (TabSessionStore, Vec<SessionId>) {
        let mut store = TabSessionStore::new();
        let ids = names
            .iter()
            .map(|name| store.open(PathBuf::from(format!("/work/{name}")), None).id)
            .collect();
        (store, ids)
    }

    fn order(store: &TabSessionStore) -> Vec<String> {
        store
            .sessions()
            .iter()
            .map(|s| s.display_name.clone())
            .collect()
    }

    #[test]
    fn open_appends_and_activates() {
        let (store, ids) = store_with(&["a", "b"]);
        assert_eq!(order(&store), vec!["a", "b"]);
        assert_eq!(store.active_id(), Some(&ids[1]));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn open_on_root_uses_root_marker() {
        let mut store = TabSessionStore::new();
        let session = store.open(PathBuf::from("/"), Some(TabColor::Red));
        assert_eq!(session.display_name, "/");
        assert_eq!(session.color, TabColor::Red);
    }

    #[test]
    fn close_sole_session_is_noop() {
        let (mut store, ids) = store_with(&["only"]);
        assert!(!store.close(&ids[0]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), Some(&ids[0]));
    }

    #[test]
    fn close_active_middle_activates_slot_successor() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        assert!(store.switch_to(&ids[1]));
        assert!(store.close(&ids[1]));
        assert_eq!(order(&store), vec!["A", "C"]);
        assert_eq!(store.active_id(), Some(&ids[2]));
    }

    #[test]
    fn close_active_last_clamps_to_new_tail() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        assert!(store.close(&ids[2]));
        assert_eq!(store.active_id(), Some(&ids[1]));
    }

    #[test]
    fn close_inactive_keeps_active() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        store.switch_to(&ids[2]);
        assert!(store.close(&ids[0]));
        assert_eq!(store.active_id(), Some(&ids[2]));
    }

    #[test]
    fn open_close_sequences_never_empty_the_store() {
        let (mut store, mut ids) = store_with(&["a", "b", "c"]);
        for round in 0..10 {
            if round % 3 == 0 {
                ids.push(store.open(PathBuf::from(format!("/r{round}")), None).id);
            }
            for id in ids.clone() {
                store.close(&id);
            }
            assert!(!store.is_empty());
            assert!(store.active().is_some());
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let (mut store, _) = store_with(&["a", "b"]);
        let ghost = SessionId::from("ghost");
        assert!(!store.close(&ghost));
        assert!(!store.switch_to(&ghost));
        assert!(!store.recolor(&ghost, TabColor::Teal));
        assert!(!store.reorder(&ghost, &ghost));
        assert!(!store.move_to_end(&ghost));
        assert_eq!(order(&store), vec!["a", "b"]);
    }

    #[test]
    fn adjacent_reorder_is_self_inverse() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        assert!(store.reorder(&ids[0], &ids[1]));
        assert_eq!(order(&store), vec!["B", "A", "C"]);
        assert!(store.reorder(&ids[1], &ids[0]));
        assert_eq!(order(&store), vec!["A", "B", "C"]);

        assert!(store.reorder(&ids[2], &ids[1]));
        assert_eq!(order(&store), vec!["A", "C", "B"]);
        assert!(store.reorder(&ids[1], &ids[2]));
        assert_eq!(order(&store), vec!["A", "B", "C"]);
    }

    #[test]
    fn long_reorder_is_undone_by_moving_back_to_former_slot() {
        let (mut store, ids) = store_with(&["A", "B", "C", "D"]);
        assert!(store.reorder(&ids[0], &ids[2]));
        assert_eq!(order(&store), vec!["B", "C", "A", "D"]);
        // "B" now holds A's former slot.
        assert!(store.reorder(&ids[0], &ids[1]));
        assert_eq!(order(&store), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn move_to_end_skips_tail() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        assert!(!store.move_to_end(&ids[2]));
        assert!(store.move_to_end(&ids[0]));
        assert_eq!(order(&store), vec!["B", "C", "A"]);
    }

    #[test]
    fn navigation_keeps_pinned_name() {
        let (mut store, ids) = store_with(&["proj"]);
        assert!(store.set_path(&ids[0], PathBuf::from("/work/proj/src/deep")));
        let session = store.get(&ids[0]).expect("session");
        assert_eq!(session.display_name, "proj");
        assert_eq!(session.pinned_path(), Path::new("/work/proj"));
        assert!(store.reset_to_pinned(&ids[0]));
        assert_eq!(
            store.get(&ids[0]).expect("session").path,
            PathBuf::from("/work/proj")
        );
        assert!(!store.reset_to_pinned(&ids[0]));
    }

    #[test]
    fn from_persisted_repairs_dangling_active_id() {
        let (store, ids) = store_with(&["a", "b"]);
        let mut snapshot = store.snapshot();
        snapshot.active_id = Some(SessionId::from("gone"));
        let restored = TabSessionStore::from_persisted(snapshot);
        assert_eq!(restored.active_id(), Some(&ids[0]));
    }

    #[test]
    fn session_deserializes_without_pinned_path() {
        let raw = r#"{"id":"1","path":"/tmp/x","name":"x","color":"mauve"}"#;
        let session: Session = serde_json::from_str(raw).expect("parse session");
        assert_eq!(session.pinned_path(), Path::new("/tmp/x"));
        assert_eq!(session.color, TabColor::Gray);
    }
}
