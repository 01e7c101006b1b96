use std::collections::BTreeMap;
use std::ops::Bound;

use bully_api::ProcessId;
use thiserror::Error;

use crate::process::PeerHandle;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory must contain at least one process")]
    Empty,
    #[error("duplicate process id: {0}")]
    DuplicateId(ProcessId),
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Fully connected set of peers
///
/// Built once at bootstrap and shared read-only (as `Arc<Directory>`)
/// by every process afterwards. Entries are [`PeerHandle`]s, so holding
/// the directory lets one enqueue into any peer's inbox and read its
/// observables, but never drive its control loop.
#[derive(Debug)]
pub struct Directory {
    peers: BTreeMap<ProcessId, PeerHandle>,
}

impl Directory {
    pub fn new(peers: impl IntoIterator<Item = PeerHandle>) -> DirectoryResult<Self> {
        let mut map = BTreeMap::new();
        for peer in peers {
            let id = peer.id();
            if map.insert(id, peer).is_some() {
                return Err(DirectoryError::DuplicateId(id));
            }
        }

        if map.is_empty() {
            return Err(DirectoryError::Empty);
        }

        Ok(Self { peers: map })
    }

    pub fn get(&self, id: ProcessId) -> Option<&PeerHandle> {
        self.peers.get(&id)
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Every peer with an id strictly greater than `id`, dead or alive
    pub fn higher_than(&self, id: ProcessId) -> impl Iterator<Item = &PeerHandle> {
        self.peers
            .range((Bound::Excluded(id), Bound::Unbounded))
            .map(|(_, peer)| peer)
    }

    /// Every peer except `id`
    pub fn others(&self, id: ProcessId) -> impl Iterator<Item = &PeerHandle> {
        self.peers
            .iter()
            .filter(move |(peer_id, _)| **peer_id != id)
            .map(|(_, peer)| peer)
    }
}
