use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use dbops_restart_domain::{TaskEvent, TaskId};

pub(crate) type SharedStore = Arc<Mutex<FeedStore>>;

pub(crate) struct FeedStore {
    pub channels: HashMap<TaskId, ChannelData>,
}

pub(crate) struct ChannelData {
    /// Events in emission order. Append-only; never evicted mid-task, so
    /// replay can never reorder or duplicate.
    pub buffer: Vec<TaskEvent>,
    /// Live fan-out senders, one per attached subscriber.
    pub senders: Vec<mpsc::Sender<TaskEvent>>,
    /// Set when the terminal event lands; no further publishes accepted.
    pub sealed: bool,
}

impl FeedStore {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }
}

impl ChannelData {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            senders: Vec::new(),
            sealed: false,
        }
    }
}
