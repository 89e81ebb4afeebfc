use std::collections::VecDeque;

/// Identifies a subscription on an [`EventBus`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

pub type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// Synchronous notification fan-out with a bounded replay log.
///
/// Listeners run in subscription order on the emitting thread. The most
/// recent `retain` events are kept for inspection and draining.
pub struct EventBus<E> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<E>)>,
    log: VecDeque<E>,
    retain: usize,
}

impl<E> EventBus<E> {
    pub fn new(retain: usize) -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
            log: VecDeque::new(),
            retain,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&E) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: E) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        if self.retain == 0 {
            return;
        }
        if self.log.len() == self.retain {
            self.log.pop_front();
        }
        self.log.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.log.iter()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("logged", &self.log.len())
            .field("retain", &self.retain)
            .finish()
    }
}
