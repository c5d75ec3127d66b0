use std::collections::HashSet;
use std::sync::Mutex;

use conclave_protocol::{Batcher, Frame};
use tokio::sync::mpsc;

use crate::domain::Id;

/// One connected client, assigned a session id. Owns its own outbound
/// frame channel and its own batching queue, since ordering and the
/// 50 ms/10-message batch window are both per-recipient.
pub(crate) struct Session {
    pub(crate) tx: mpsc::Sender<Frame>,
    pub(crate) batcher: Mutex<Batcher>,
    pub(crate) channel_ids: Mutex<HashSet<Id>>,
}
