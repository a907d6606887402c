//! Host-page side of the handshake.
//!
//! The [`EmbeddingController`] mounts the collector frame under the
//! provider origin and polices every message arriving on the host window's
//! channel. It never sees raw card data: the only thing that can reach
//! its callback is an [`OpaqueToken`] that passed [`MessageValidator`].
//!
//! # Trust assumptions
//!
//! The checks here are only sound if the serving collaborators attach the
//! headers from [`OriginPolicy`](crate::OriginPolicy). Without
//! `frame-ancestors`, a hostile page could embed the real collector; without
//! `script-src`, injected script on the host page could subscribe to the
//! same channel.
//!
//! # Replay
//!
//! Each message is handled independently. Without nonce binding, a captured
//! valid message replayed later is accepted again.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::audit::{AuditEvent, AuditOutcome, AuditTrail};
use crate::channel::{MessageBus, Subscription};
use crate::config::Deployment;
use crate::error::{OriginError, Rejection};
use crate::logging::HandshakeLog;
use crate::message::{MessageEvent, Nonce};
use crate::origin::Origin;
use crate::token::OpaqueToken;
use crate::validator::MessageValidator;

/// How the controller mounts and what it trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// The one origin allowed to send tokens
    pub collector_origin: Origin,
    /// Path of the collector document under `collector_origin`
    pub frame_path: String,
    /// Id given to the frame element
    pub frame_id: String,
    /// Bind messages to the mounted frame with a nonce in its URL
    pub bind_nonce: bool,
}

impl ControllerConfig {
    /// Configuration for a deployment, without nonce binding.
    pub fn for_deployment(deployment: &Deployment) -> Self {
        Self {
            collector_origin: deployment.provider_origin.clone(),
            frame_path: deployment.frame_path.clone(),
            frame_id: deployment.frame_id.clone(),
            bind_nonce: false,
        }
    }

    /// Enables nonce binding.
    pub fn with_nonce_binding(mut self) -> Self {
        self.bind_nonce = true;
        self
    }
}

/// A frame element ready to be attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameElement {
    /// Element id
    pub id: String,
    /// Absolute URL the frame navigates to
    pub src: String,
}

impl FrameElement {
    /// Origin the frame's document will have.
    pub fn origin(&self) -> Result<Origin, OriginError> {
        Origin::split_url(&self.src).map(|(origin, _)| origin)
    }
}

/// Something a frame can be attached under.
pub trait FrameContainer {
    /// Attaches a frame as the last child.
    fn append_frame(&mut self, frame: FrameElement);
}

/// A plain element holding frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerElement {
    /// Element id
    pub id: String,
    /// Attached frames, in order
    pub frames: Vec<FrameElement>,
}

impl ContainerElement {
    /// Creates an empty container.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frames: Vec::new(),
        }
    }
}

impl FrameContainer for ContainerElement {
    fn append_frame(&mut self, frame: FrameElement) {
        self.frames.push(frame);
    }
}

/// Where the controller is in the current pay action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No token accepted yet
    AwaitingToken,
    /// At least one token accepted
    TokenReceived,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::AwaitingToken => write!(f, "AWAITING_TOKEN"),
            ControllerState::TokenReceived => write!(f, "TOKEN_RECEIVED"),
        }
    }
}

type TokenCallback = Box<dyn FnMut(OpaqueToken)>;

struct Inner {
    owner: Origin,
    frame_id: String,
    validator: MessageValidator,
    state: ControllerState,
    tokens_received: usize,
    audit: Option<Rc<AuditTrail>>,
}

impl Inner {
    fn check(&mut self, event: &MessageEvent) -> Result<OpaqueToken, Rejection> {
        let log = HandshakeLog::new("controller", &self.owner);
        let outcome = self.validator.validate(event);

        match &outcome {
            Ok(_) => {}
            Err(r) if r.is_security_event() => log.warn(format_args!(
                "Security: rejected tokenised card details for frame {}: {}",
                self.frame_id, r
            )),
            Err(r) => log.debug(format_args!("ignored message from {}: {}", event.origin(), r)),
        }

        if let Some(audit) = &self.audit {
            let result = match &outcome {
                Ok(_) => AuditOutcome::Accepted,
                Err(r) => AuditOutcome::from_rejection(r),
            };
            audit.record(AuditEvent::new(
                self.frame_id.clone(),
                event.origin().clone(),
                result,
            ));
        }

        outcome.map(|verified| verified.into_inner())
    }

    fn delivered(&mut self, sender: &Origin) {
        self.state = ControllerState::TokenReceived;
        self.tokens_received += 1;
        HandshakeLog::new("controller", &self.owner)
            .info(format_args!("token received from {}", sender));
    }
}

/// Mounts the collector and relays validated tokens to the host page.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use frame_handshake::{
///     ContainerElement, ControllerConfig, Deployment, EmbeddingController, MessageBus,
///     MessageEvent,
/// };
/// use serde_json::json;
///
/// let deployment = Deployment::default();
/// let bus = MessageBus::new(deployment.merchant_origin.clone());
/// let tokens = Rc::new(RefCell::new(Vec::new()));
/// let sink = tokens.clone();
///
/// let mut controller = EmbeddingController::new(
///     ControllerConfig::for_deployment(&deployment),
///     &bus,
///     move |token| sink.borrow_mut().push(token),
/// );
/// let mut container = ContainerElement::new("payment-gateway-container");
/// let frame = controller.mount(&mut container);
/// assert_eq!(frame.src, "http://localhost:3005/cardFields");
///
/// bus.deliver(MessageEvent::new(
///     deployment.provider_origin.clone(),
///     json!({ "type": "tokenisedCardDetails", "value": "4111111111111111|123" }),
/// ));
/// bus.run_until_idle();
/// assert_eq!(tokens.borrow()[0].as_str(), "4111111111111111|123");
/// ```
pub struct EmbeddingController {
    config: ControllerConfig,
    inner: Rc<RefCell<Inner>>,
    on_token: Rc<RefCell<TokenCallback>>,
    _subscription: Subscription,
}

impl EmbeddingController {
    /// Creates a controller listening on the host window's channel.
    ///
    /// `on_token` runs once per accepted message, with the token exactly
    /// as the collector sent it.
    pub fn new<F>(config: ControllerConfig, bus: &MessageBus, on_token: F) -> Self
    where
        F: FnMut(OpaqueToken) + 'static,
    {
        let inner = Rc::new(RefCell::new(Inner {
            owner: bus.owner_origin().clone(),
            frame_id: config.frame_id.clone(),
            validator: MessageValidator::new(config.collector_origin.clone()),
            state: ControllerState::AwaitingToken,
            tokens_received: 0,
            audit: None,
        }));
        let on_token: Rc<RefCell<TokenCallback>> = Rc::new(RefCell::new(Box::new(on_token)));

        let shape = MessageValidator::new(config.collector_origin.clone());
        let handler_inner = Rc::clone(&inner);
        let handler_callback = Rc::clone(&on_token);
        let subscription = bus.subscribe(
            move |event| shape.is_recognised(event),
            move |event| {
                // Rejections are already logged and audited.
                let _ = dispatch(&handler_inner, &handler_callback, event);
            },
        );

        HandshakeLog::new("controller", bus.owner_origin()).debug(format_args!(
            "listening for tokens from {}",
            config.collector_origin
        ));

        Self {
            config,
            inner,
            on_token,
            _subscription: subscription,
        }
    }

    /// Records every decision into `audit`.
    pub fn with_audit(self, audit: Rc<AuditTrail>) -> Self {
        self.inner.borrow_mut().audit = Some(audit);
        self
    }

    /// Creates the collector frame and attaches it under `container`.
    ///
    /// With nonce binding, every mount generates a fresh nonce, puts it in
    /// the frame URL, and from then on only accepts messages echoing it.
    /// Mounting starts a new pay action, so the state goes back to
    /// [`ControllerState::AwaitingToken`]. Returns a copy of the attached
    /// element.
    pub fn mount(&mut self, container: &mut dyn FrameContainer) -> FrameElement {
        let mut src = self.config.collector_origin.join(&self.config.frame_path);

        if self.config.bind_nonce {
            let nonce = Nonce::generate();
            src.push_str(if src.contains('?') { "&" } else { "?" });
            src.push_str(&format!("nonce={}", nonce));
            let mut inner = self.inner.borrow_mut();
            inner.validator = MessageValidator::new(self.config.collector_origin.clone())
                .with_nonce(nonce);
        }

        let frame = FrameElement {
            id: self.config.frame_id.clone(),
            src,
        };
        container.append_frame(frame.clone());

        let mut inner = self.inner.borrow_mut();
        inner.state = ControllerState::AwaitingToken;
        HandshakeLog::new("controller", &inner.owner)
            .debug(format_args!("mounted frame {} -> {}", frame.id, frame.src));
        frame
    }

    /// Handles one raw channel event.
    ///
    /// Runs the shape check, then the origin check, then the nonce check
    /// if bound. On success the callback runs with the token and the token
    /// is also returned. Rejections are logged and returned, never raised.
    ///
    /// Called from inside the callback, the token is returned but not
    /// relayed, and neither the state nor the count changes.
    pub fn on_message(&self, event: &MessageEvent) -> Result<OpaqueToken, Rejection> {
        dispatch(&self.inner, &self.on_token, event)
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.inner.borrow().state
    }

    /// Number of tokens relayed so far.
    pub fn tokens_received(&self) -> usize {
        self.inner.borrow().tokens_received
    }

    /// The configuration this controller was built with.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

fn dispatch(
    inner: &RefCell<Inner>,
    on_token: &RefCell<TokenCallback>,
    event: &MessageEvent,
) -> Result<OpaqueToken, Rejection> {
    // The borrow on `inner` ends before the callback runs, so the callback
    // may query the controller.
    let token = inner.borrow_mut().check(event)?;
    match on_token.try_borrow_mut() {
        Ok(mut callback) => callback(token.clone()),
        Err(_) => {
            HandshakeLog::new("controller", &inner.borrow().owner).debug(format_args!(
                "token callback is already running; token from {} not relayed",
                event.origin()
            ));
            return Ok(token);
        }
    }
    inner.borrow_mut().delivered(event.origin());
    Ok(token)
}

impl fmt::Debug for EmbeddingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingController")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionKind;
    use serde_json::json;
    use std::cell::Cell;
    use std::io;
    use std::rc::Weak;
    use std::sync::{Arc, Mutex};

    fn setup() -> (Deployment, MessageBus) {
        let d = Deployment::default();
        let bus = MessageBus::new(d.merchant_origin.clone());
        (d, bus)
    }

    fn token_message(value: &str) -> serde_json::Value {
        json!({ "type": "tokenisedCardDetails", "value": value })
    }

    #[test]
    fn mount_attaches_frame_under_container() {
        let (d, bus) = setup();
        let mut controller =
            EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {});
        let mut container = ContainerElement::new("payment-gateway-container");

        let frame = controller.mount(&mut container);
        assert_eq!(container.frames, vec![frame.clone()]);
        assert_eq!(frame.id, "lazorpay-card-fields-iframe");
        assert_eq!(frame.origin().unwrap(), d.provider_origin);
    }

    #[test]
    fn state_moves_to_token_received() {
        let (d, bus) = setup();
        let controller =
            EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {});
        assert_eq!(controller.state(), ControllerState::AwaitingToken);

        let evil = Origin::parse("http://evil.example").unwrap();
        assert!(controller
            .on_message(&MessageEvent::new(evil, token_message("x")))
            .is_err());
        assert_eq!(controller.state(), ControllerState::AwaitingToken);

        let token = controller
            .on_message(&MessageEvent::new(d.provider_origin.clone(), token_message("t")))
            .unwrap();
        assert_eq!(token.as_str(), "t");
        assert_eq!(controller.state(), ControllerState::TokenReceived);
        assert_eq!(controller.state().to_string(), "TOKEN_RECEIVED");
    }

    #[test]
    fn remount_starts_a_new_pay_action() {
        let (d, bus) = setup();
        let mut controller =
            EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {});
        let mut container = ContainerElement::new("c");
        controller.mount(&mut container);
        controller
            .on_message(&MessageEvent::new(d.provider_origin.clone(), token_message("t")))
            .unwrap();
        assert_eq!(controller.state(), ControllerState::TokenReceived);

        controller.mount(&mut container);
        assert_eq!(controller.state(), ControllerState::AwaitingToken);
        assert_eq!(controller.tokens_received(), 1);
    }

    #[test]
    fn bus_filter_keeps_noise_out_of_audit() {
        let (d, bus) = setup();
        let audit = Rc::new(AuditTrail::new());
        let _controller =
            EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {})
                .with_audit(audit.clone());

        bus.deliver(MessageEvent::new(d.provider_origin.clone(), json!("extension noise")));
        bus.deliver(MessageEvent::new(
            Origin::parse("http://evil.example").unwrap(),
            token_message("x"),
        ));
        bus.run_until_idle();

        assert_eq!(audit.len(), 1);
        assert_eq!(audit.count(AuditOutcome::UntrustedOrigin), 1);
    }

    #[test]
    fn nonce_binding_rejects_unbound_messages() {
        let (d, bus) = setup();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let mut controller = EmbeddingController::new(
            ControllerConfig::for_deployment(&d).with_nonce_binding(),
            &bus,
            move |_| f.set(f.get() + 1),
        );
        let mut container = ContainerElement::new("c");
        let frame = controller.mount(&mut container);
        let nonce = Nonce::from_url(&frame.src).unwrap();

        let unbound = controller.on_message(&MessageEvent::new(
            d.provider_origin.clone(),
            token_message("t"),
        ));
        assert_eq!(unbound.unwrap_err().kind, RejectionKind::NonceMismatch);

        let bound = json!({ "type": "tokenisedCardDetails", "value": "t", "nonce": nonce });
        assert!(controller
            .on_message(&MessageEvent::new(d.provider_origin.clone(), bound.clone()))
            .is_ok());
        assert_eq!(fired.get(), 1);

        // a remount rotates the nonce, so the old frame's messages go stale
        controller.mount(&mut container);
        assert!(controller
            .on_message(&MessageEvent::new(d.provider_origin.clone(), bound))
            .is_err());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn callback_runs_once_per_accepted_message() {
        let (d, bus) = setup();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        let _controller = EmbeddingController::new(
            ControllerConfig::for_deployment(&d),
            &bus,
            move |token| {
                assert_eq!(token.as_str(), "t");
                s.set(s.get() + 1);
            },
        );
        bus.deliver(MessageEvent::new(d.provider_origin.clone(), token_message("t")));
        assert_eq!(bus.run_until_idle(), 1);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn dropped_controller_receives_nothing() {
        let (d, bus) = setup();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let controller =
            EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, move |_| {
                f.set(true)
            });
        bus.deliver(MessageEvent::new(d.provider_origin.clone(), token_message("t")));
        drop(controller);

        assert_eq!(bus.run_until_idle(), 0);
        assert!(!fired.get());
    }

    #[test]
    fn callback_reentering_the_bus_sees_every_token() {
        let d = Deployment::default();
        let bus = Rc::new(MessageBus::new(d.merchant_origin.clone()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let weak = Rc::downgrade(&bus);
        let provider = d.provider_origin.clone();
        let controller = EmbeddingController::new(
            ControllerConfig::for_deployment(&d),
            &bus,
            move |token: OpaqueToken| {
                let first = token.as_str() == "first";
                s.borrow_mut().push(token);
                if let (true, Some(bus)) = (first, weak.upgrade()) {
                    bus.deliver(MessageEvent::new(provider.clone(), token_message("second")));
                    bus.run_until_idle();
                }
            },
        );

        bus.deliver(MessageEvent::new(d.provider_origin.clone(), token_message("first")));
        bus.run_until_idle();

        let values: Vec<_> = seen.borrow().iter().map(|t| t.as_str().to_string()).collect();
        assert_eq!(values, ["first", "second"]);
        assert_eq!(controller.tokens_received(), 2);
    }

    #[test]
    fn token_not_relayed_from_inside_the_callback_is_not_counted() {
        let (d, bus) = setup();
        let handle: Rc<RefCell<Weak<EmbeddingController>>> = Rc::new(RefCell::new(Weak::new()));
        let h = handle.clone();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let provider = d.provider_origin.clone();
        let controller = Rc::new(EmbeddingController::new(
            ControllerConfig::for_deployment(&d),
            &bus,
            move |_| {
                f.set(f.get() + 1);
                let nested = h.borrow().upgrade();
                if let Some(controller) = nested {
                    let again = MessageEvent::new(provider.clone(), token_message("again"));
                    assert_eq!(controller.on_message(&again).unwrap().as_str(), "again");
                }
            },
        ));
        *handle.borrow_mut() = Rc::downgrade(&controller);

        controller
            .on_message(&MessageEvent::new(d.provider_origin.clone(), token_message("t")))
            .unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(controller.tokens_received(), 1);
        assert_eq!(controller.state(), ControllerState::TokenReceived);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn only_security_rejections_log_at_warn() {
        let (d, bus) = setup();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let controller =
                EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {});
            let evil = Origin::parse("http://evil.example").unwrap();
            let _ = controller.on_message(&MessageEvent::new(evil, token_message("x")));
            let _ = controller.on_message(&MessageEvent::new(
                d.provider_origin.clone(),
                json!({ "type": "tokenisedCardDetails", "value": 42 }),
            ));
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = |needle: &str| {
            output
                .lines()
                .find(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("no log line with {needle}:\n{output}"))
                .to_string()
        };
        assert!(line("UntrustedOrigin").contains("WARN"));
        assert!(line("MalformedMessage").contains("DEBUG"));
        assert!(!line("MalformedMessage").contains("Security"));
    }
}
