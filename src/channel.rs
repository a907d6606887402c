//! The message channel of one browsing context.
//!
//! Every window has a single broadcast inbox. Anything that can reach the
//! window (child frames, extensions, devtools) may post to it, so the
//! channel itself does no trust decisions beyond the sender's target-origin
//! pin. Receivers filter with their own predicates.
//!
//! Delivery is asynchronous: posting only queues an event, and
//! [`MessageBus::run_until_idle`] plays the role of the event loop. A
//! subscriber dropped before its turn never sees the event and nothing
//! reports an error. A handler that re-enters the loop does not see the
//! nested events at once; they wait until its current invocation returns.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::logging::HandshakeLog;
use crate::message::MessageEvent;
use crate::origin::Origin;

type Filter = Box<dyn Fn(&MessageEvent) -> bool>;
type Handler = Box<dyn FnMut(&MessageEvent)>;

struct Slot {
    filter: Filter,
    handler: RefCell<Handler>,
}

/// Live registration on a [`MessageBus`].
///
/// Dropping the subscription unsubscribes; queued events that have not been
/// delivered yet are then silently lost for this subscriber.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _slot: Rc<Slot>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Broadcast inbox of a window whose document has origin `owner`.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use frame_handshake::{MessageBus, MessageEvent, Origin};
///
/// let bus = MessageBus::new(Origin::parse("http://localhost:3000").unwrap());
/// let seen = Rc::new(Cell::new(0));
/// let counter = seen.clone();
/// let _sub = bus.subscribe(|_| true, move |_| counter.set(counter.get() + 1));
///
/// bus.deliver(MessageEvent::new(
///     Origin::parse("http://localhost:3005").unwrap(),
///     serde_json::json!("hello"),
/// ));
/// assert_eq!(seen.get(), 0); // queued, not yet dispatched
/// bus.run_until_idle();
/// assert_eq!(seen.get(), 1);
/// ```
pub struct MessageBus {
    owner: Origin,
    subscribers: RefCell<Vec<Weak<Slot>>>,
    queue: RefCell<VecDeque<MessageEvent>>,
    // events a subscriber could not take because its handler was running
    deferred: RefCell<VecDeque<(Weak<Slot>, MessageEvent)>>,
}

impl MessageBus {
    /// Creates the inbox of a window with the given document origin.
    pub fn new(owner: Origin) -> Self {
        Self {
            owner,
            subscribers: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            deferred: RefCell::new(VecDeque::new()),
        }
    }

    /// Origin of the window that owns this inbox.
    pub fn owner_origin(&self) -> &Origin {
        &self.owner
    }

    /// Registers a subscriber.
    ///
    /// `handler` only runs for events where `filter` returns true.
    pub fn subscribe<F, H>(&self, filter: F, handler: H) -> Subscription
    where
        F: Fn(&MessageEvent) -> bool + 'static,
        H: FnMut(&MessageEvent) + 'static,
    {
        let slot = Rc::new(Slot {
            filter: Box::new(filter),
            handler: RefCell::new(Box::new(handler)),
        });
        self.subscribers.borrow_mut().push(Rc::downgrade(&slot));
        Subscription { _slot: slot }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Queues an event exactly as the transport hands it over.
    ///
    /// The event's origin is whatever the transport stamped; use this to
    /// model messages from other frames or extensions.
    pub fn deliver(&self, event: MessageEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Posts from a context with origin `sender`, pinned to `target_origin`.
    ///
    /// The event is dropped unless `target_origin` equals this window's
    /// origin exactly. Returns whether the event was queued; a real sender
    /// cannot observe this.
    pub(crate) fn post_message(
        &self,
        sender: &Origin,
        data: serde_json::Value,
        target_origin: &Origin,
    ) -> bool {
        if target_origin != &self.owner {
            HandshakeLog::new("bus", &self.owner).debug(format_args!(
                "dropped message from {}: target origin {} does not match window",
                sender, target_origin
            ));
            return false;
        }
        self.deliver(MessageEvent::new(sender.clone(), data));
        true
    }

    /// Number of queued, undelivered events, counting deliveries still
    /// waiting on a busy handler.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len() + self.deferred.borrow().len()
    }

    /// Dispatches queued events until the queue is empty.
    ///
    /// Events queued by handlers during dispatch are delivered in the same
    /// call. If a handler re-enters this method, events addressed to that
    /// handler are held back and delivered once it returns, so no
    /// subscriber misses an event. Returns the number of handler
    /// invocations.
    pub fn run_until_idle(&self) -> usize {
        let mut invocations = 0;
        loop {
            let flushed = self.flush_deferred();
            invocations += flushed;

            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                if flushed == 0 {
                    break;
                }
                continue;
            };

            for slot in self.live_slots() {
                if !(slot.filter)(&event) {
                    continue;
                }
                match slot.handler.try_borrow_mut() {
                    Ok(mut handler) => {
                        handler(&event);
                        invocations += 1;
                    }
                    Err(_) => {
                        HandshakeLog::new("bus", &self.owner).debug(format_args!(
                            "handler busy; deferred delivery from {}",
                            event.origin()
                        ));
                        self.deferred
                            .borrow_mut()
                            .push_back((Rc::downgrade(&slot), event.clone()));
                    }
                }
            }
        }
        invocations
    }

    // Delivers deferred events whose handler is free again. Returns the
    // number of handler invocations.
    fn flush_deferred(&self) -> usize {
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        let mut still_busy = VecDeque::new();
        let mut invocations = 0;

        for (slot, event) in pending {
            // unsubscribed while waiting
            let Some(slot) = slot.upgrade() else { continue };
            let Ok(mut handler) = slot.handler.try_borrow_mut() else {
                still_busy.push_back((Rc::downgrade(&slot), event));
                continue;
            };
            handler(&event);
            invocations += 1;
        }

        // keep the older events ahead of anything deferred meanwhile
        let mut deferred = self.deferred.borrow_mut();
        while let Some(item) = still_busy.pop_back() {
            deferred.push_front(item);
        }
        invocations
    }

    fn live_slots(&self) -> Vec<Rc<Slot>> {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|w| w.strong_count() > 0);
        subscribers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("owner", &self.owner)
            .field("subscribers", &self.subscriber_count())
            .field("pending", &self.pending())
            .finish()
    }
}
