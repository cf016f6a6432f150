use std::collections::HashMap;

use crate::crypto::CourierPublicKey;
use crate::networking::peer::SessionId;

/// Address recorded for peers we only learned about from an inbound
/// connection and therefore cannot re-dial.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// A locally connected, authenticated client.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub publickey: CourierPublicKey,
    pub session_id: SessionId,
    pub connected_at: u64,
}

/// The local-client directory: public key to record, cross-indexed by
/// session so a transport close can find its record without a scan.
///
/// At most one record exists per public key. The caller that replaces a
/// record is responsible for closing the displaced session first; `insert`
/// only keeps the two indexes consistent.
pub struct ClientDirectory {
    by_key: HashMap<CourierPublicKey, ClientRecord>,
    by_session: HashMap<SessionId, CourierPublicKey>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        ClientDirectory {
            by_key: HashMap::new(),
            by_session: HashMap::new(),
        }
    }

    pub fn insert(&mut self, record: ClientRecord) {
        if let Some(previous) = self.by_key.get(&record.publickey) {
            self.by_session.remove(&previous.session_id);
        }
        self.by_session.insert(record.session_id, record.publickey);
        self.by_key.insert(record.publickey, record);
    }

    pub fn get(&self, publickey: &CourierPublicKey) -> Option<&ClientRecord> {
        self.by_key.get(publickey)
    }

    pub fn contains_key(&self, publickey: &CourierPublicKey) -> bool {
        self.by_key.contains_key(publickey)
    }

    pub fn key_for_session(&self, session_id: &SessionId) -> Option<CourierPublicKey> {
        self.by_session.get(session_id).copied()
    }

    pub fn remove_by_key(&mut self, publickey: &CourierPublicKey) -> Option<ClientRecord> {
        let record = self.by_key.remove(publickey)?;
        self.by_session.remove(&record.session_id);
        Some(record)
    }

    pub fn remove_by_session(&mut self, session_id: &SessionId) -> Option<ClientRecord> {
        let publickey = self.by_session.remove(session_id)?;
        self.by_key.remove(&publickey)
    }

    pub fn records(&self) -> impl Iterator<Item = &ClientRecord> {
        self.by_key.values()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Default for ClientDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// A known relay peer. A record without a session is a "known-about" entry
/// kept so the address stays dialable and discovery can deduplicate.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub publickey: CourierPublicKey,
    pub address: String,
    pub session_id: Option<SessionId>,
}

pub struct PeerDirectory {
    by_key: HashMap<CourierPublicKey, PeerRecord>,
    by_session: HashMap<SessionId, CourierPublicKey>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        PeerDirectory {
            by_key: HashMap::new(),
            by_session: HashMap::new(),
        }
    }

    /// Record a discovered peer without a session. Existing records win: a
    /// peer we already know (possibly with a live session) is not touched.
    pub fn insert_known(&mut self, publickey: CourierPublicKey, address: String) {
        self.by_key.entry(publickey).or_insert(PeerRecord {
            publickey,
            address,
            session_id: None,
        });
    }

    /// Upsert a record and attach an authenticated session to it. The caller
    /// closes any previously attached session first.
    pub fn attach(&mut self, publickey: CourierPublicKey, address: String, session_id: SessionId) {
        if let Some(previous) = self.by_key.get(&publickey) {
            if let Some(old_session) = previous.session_id {
                self.by_session.remove(&old_session);
            }
        }
        self.by_session.insert(session_id, publickey);
        self.by_key.insert(
            publickey,
            PeerRecord {
                publickey,
                address,
                session_id: Some(session_id),
            },
        );
    }

    /// Drop the session from whichever record holds it, keeping the record
    /// itself so the address remains dialable.
    pub fn detach_session(&mut self, session_id: &SessionId) -> Option<CourierPublicKey> {
        let publickey = self.by_session.remove(session_id)?;
        if let Some(record) = self.by_key.get_mut(&publickey) {
            record.session_id = None;
        }
        Some(publickey)
    }

    pub fn get(&self, publickey: &CourierPublicKey) -> Option<&PeerRecord> {
        self.by_key.get(publickey)
    }

    pub fn contains_key(&self, publickey: &CourierPublicKey) -> bool {
        self.by_key.contains_key(publickey)
    }

    pub fn key_for_session(&self, session_id: &SessionId) -> Option<CourierPublicKey> {
        self.by_session.get(session_id).copied()
    }

    pub fn remove_by_key(&mut self, publickey: &CourierPublicKey) -> Option<PeerRecord> {
        let record = self.by_key.remove(publickey)?;
        if let Some(session_id) = record.session_id {
            self.by_session.remove(&session_id);
        }
        Some(record)
    }

    pub fn has_address(&self, address: &str) -> bool {
        self.by_key.values().any(|record| record.address == address)
    }

    pub fn records(&self) -> impl Iterator<Item = &PeerRecord> {
        self.by_key.values()
    }

    /// Sessions currently attached to a peer record, i.e. the broadcast set.
    pub fn attached_sessions(&self) -> Vec<SessionId> {
        self.by_session.keys().copied().collect()
    }

    /// Every (key, address) pair worth advertising: peers whose address we
    /// actually know.
    pub fn addressed_entries(&self) -> Vec<(CourierPublicKey, String)> {
        self.by_key
            .values()
            .filter(|record| record.address != UNKNOWN_ADDRESS)
            .map(|record| (record.publickey, record.address.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(publickey: CourierPublicKey, session_id: SessionId) -> ClientRecord {
        ClientRecord {
            publickey,
            session_id,
            connected_at: 0,
        }
    }

    #[test]
    fn test_client_directory_indexes_stay_consistent() {
        let mut clients = ClientDirectory::new();
        clients.insert(client([1; 32], [10; 32]));
        assert_eq!(clients.key_for_session(&[10; 32]), Some([1; 32]));

        // same key re-authenticates on a new session
        clients.insert(client([1; 32], [11; 32]));
        assert_eq!(clients.len(), 1);
        assert_eq!(clients.key_for_session(&[10; 32]), None);
        assert_eq!(clients.key_for_session(&[11; 32]), Some([1; 32]));

        // a late close of the displaced session must not evict the new record
        assert!(clients.remove_by_session(&[10; 32]).is_none());
        assert!(clients.contains_key(&[1; 32]));

        let removed = clients.remove_by_session(&[11; 32]).unwrap();
        assert_eq!(removed.publickey, [1; 32]);
        assert!(clients.is_empty());
    }

    #[test]
    fn test_peer_directory_detach_keeps_address() {
        let mut peers = PeerDirectory::new();
        peers.attach([1; 32], String::from("ws://10.0.0.1:8080"), [10; 32]);
        assert_eq!(peers.key_for_session(&[10; 32]), Some([1; 32]));

        peers.detach_session(&[10; 32]);
        let record = peers.get(&[1; 32]).unwrap();
        assert_eq!(record.session_id, None);
        assert_eq!(record.address, "ws://10.0.0.1:8080");
        assert!(peers.attached_sessions().is_empty());
    }

    #[test]
    fn test_peer_directory_insert_known_does_not_clobber() {
        let mut peers = PeerDirectory::new();
        peers.attach([1; 32], String::from("ws://10.0.0.1:8080"), [10; 32]);
        peers.insert_known([1; 32], String::from("ws://elsewhere:9"));
        let record = peers.get(&[1; 32]).unwrap();
        assert_eq!(record.address, "ws://10.0.0.1:8080");
        assert_eq!(record.session_id, Some([10; 32]));
    }

    #[test]
    fn test_peer_directory_reattach_drops_old_session_index() {
        let mut peers = PeerDirectory::new();
        peers.attach([1; 32], String::from("ws://10.0.0.1:8080"), [10; 32]);
        peers.attach([1; 32], String::from("ws://10.0.0.1:8080"), [11; 32]);
        assert_eq!(peers.key_for_session(&[10; 32]), None);
        assert_eq!(peers.key_for_session(&[11; 32]), Some([1; 32]));
        assert_eq!(peers.attached_sessions(), vec![[11; 32]]);
    }

    #[test]
    fn test_addressed_entries_skip_unknown() {
        let mut peers = PeerDirectory::new();
        peers.attach([1; 32], String::from(UNKNOWN_ADDRESS), [10; 32]);
        peers.insert_known([2; 32], String::from("ws://10.0.0.2:8080"));
        let entries = peers.addressed_entries();
        assert_eq!(entries, vec![([2; 32], String::from("ws://10.0.0.2:8080"))]);
    }
}
