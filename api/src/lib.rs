use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Process identifier
///
/// Globally unique and totally ordered. Doubles as the election
/// priority: the highest live id wins.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Kind of a message exchanged between processes
#[derive(
    IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Display,
)]
#[repr(u8)]
pub enum MessageKind {
    /// Challenge sent to every process with a higher id
    Election = 0,
    /// Answer to `Election`: "I'm alive and outrank you"
    Ok = 1,
    /// Announcement of the winner, sent to everyone else
    Coordinator = 2,
    /// Explicit hand-off to the highest responder of a round
    YouAreCoordinator = 3,
}

impl MessageKind {
    pub const COUNT: usize = 4;

    pub const ALL: [MessageKind; Self::COUNT] = [
        MessageKind::Election,
        MessageKind::Ok,
        MessageKind::Coordinator,
        MessageKind::YouAreCoordinator,
    ];

    /// Slot of this kind in per-kind tables
    pub fn index(self) -> usize {
        usize::from(u8::from(self))
    }
}

/// A single message
///
/// Never mutated after it was enqueued.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: ProcessId,
}

impl Message {
    pub fn new(kind: MessageKind, sender: ProcessId) -> Self {
        Self { kind, sender }
    }
}

#[test]
fn message_kind_slots() {
    for (i, kind) in MessageKind::ALL.into_iter().enumerate() {
        assert_eq!(kind.index(), i);
        assert_eq!(MessageKind::try_from(u8::from(kind)).unwrap(), kind);
    }
    assert!(MessageKind::try_from(4u8).is_err());
}

#[test]
fn process_id_orders_by_priority() {
    assert!(ProcessId(4) > ProcessId(3));
    assert_eq!(ProcessId::from(7).to_string(), "7");
}
