//! End-to-end handshake scenarios across both sites.

use std::cell::RefCell;
use std::rc::Rc;

use frame_handshake::audit::{AuditOutcome, AuditTrail};
use frame_handshake::demo::{run_checkout, run_checkout_in, CheckoutOptions};
use frame_handshake::web::{MerchantSite, ProviderSite, CONTAINER_ID};
use frame_handshake::{
    Browser, ControllerConfig, ControllerState, Deployment, EmbeddingController, Error, FieldName,
    IsolatedCollector, MessageEvent, OpaqueToken, Origin, Page, RefusalKind, RejectionKind,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn browser(d: &Deployment) -> Browser {
    Browser::new()
        .with_site(MerchantSite::new(d))
        .with_site(ProviderSite::new(d))
}

type Received = Rc<RefCell<Vec<OpaqueToken>>>;

struct Checkout {
    page: Page,
    controller: EmbeddingController,
    collector: IsolatedCollector,
    received: Received,
}

fn open_checkout(d: &Deployment, config: ControllerConfig) -> Checkout {
    open_audited_checkout(d, config, Rc::new(AuditTrail::new()))
}

fn open_audited_checkout(
    d: &Deployment,
    config: ControllerConfig,
    audit: Rc<AuditTrail>,
) -> Checkout {
    let browser = browser(d);
    let mut page = browser.open_page(&d.merchant_origin.join("/")).unwrap();
    browser.load_script(&page, &d.sdk_url()).unwrap();

    let received: Received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    let bus = page.bus().clone();
    let mut controller =
        EmbeddingController::new(config, &bus, move |t| sink.borrow_mut().push(t))
            .with_audit(audit);
    let frame = controller.mount(page.container_mut(CONTAINER_ID).unwrap());
    let window = browser.load_frame(&page, &frame).unwrap();
    let collector = IsolatedCollector::new(window, d.merchant_origin.clone());

    Checkout {
        page,
        controller,
        collector,
        received,
    }
}

fn token_message(value: &str) -> serde_json::Value {
    json!({ "type": "tokenisedCardDetails", "value": value })
}

#[test]
fn pay_action_delivers_token_to_callback() {
    init_tracing();
    let d = Deployment::default();
    let mut c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    c.collector.on_input(FieldName::CardNumber, "4111111111111111");
    c.collector.on_input(FieldName::CardCvv, "123");
    c.collector.on_submit().unwrap();
    c.page.bus().run_until_idle();

    assert_eq!(
        *c.received.borrow(),
        vec![OpaqueToken::new("4111111111111111|123")]
    );
    assert_eq!(c.controller.state(), ControllerState::TokenReceived);
}

#[test]
fn card_inputs_are_not_in_the_host_document() {
    let d = Deployment::default();
    let c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    for field in FieldName::ALL {
        assert!(c.collector.window().has_element(field.element_id()));
        assert!(!c.page.has_element(field.element_id()));
    }
    assert!(c.page.has_element(&d.frame_id));
}

#[test]
fn message_from_other_origin_never_fires() {
    init_tracing();
    let d = Deployment::default();
    let c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    c.page.bus().deliver(MessageEvent::new(
        Origin::parse("http://evil.example").unwrap(),
        token_message("4111111111111111|123"),
    ));
    c.page.bus().run_until_idle();

    assert!(c.received.borrow().is_empty());
    assert_eq!(c.controller.state(), ControllerState::AwaitingToken);
}

#[test]
fn unrecognised_type_never_fires() {
    let d = Deployment::default();
    let c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    c.page.bus().deliver(MessageEvent::new(
        d.provider_origin.clone(),
        json!({ "type": "somethingElse", "value": "x" }),
    ));
    c.page.bus().run_until_idle();

    assert!(c.received.borrow().is_empty());
}

#[test]
fn origin_claimed_in_payload_is_ignored() {
    let d = Deployment::default();
    let c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    let event = MessageEvent::new(
        Origin::parse("http://evil.example").unwrap(),
        json!({
            "type": "tokenisedCardDetails",
            "value": "x",
            "origin": "http://localhost:3005",
        }),
    );
    let rejection = c.controller.on_message(&event).unwrap_err();
    assert!(matches!(rejection.kind, RejectionKind::UntrustedOrigin { .. }));
    assert!(c.received.borrow().is_empty());
}

#[test]
fn replayed_message_fires_again() {
    let d = Deployment::default();
    let c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    for _ in 0..2 {
        c.page
            .bus()
            .deliver(MessageEvent::new(d.provider_origin.clone(), token_message("t")));
    }
    c.page.bus().run_until_idle();

    assert_eq!(c.received.borrow().len(), 2);
    assert_eq!(c.controller.tokens_received(), 2);
}

#[test]
fn nonce_binding_accepts_the_mounted_frame_only() {
    init_tracing();
    let d = Deployment::default();
    let audit = Rc::new(AuditTrail::new());
    let mut c = open_audited_checkout(
        &d,
        ControllerConfig::for_deployment(&d).with_nonce_binding(),
        audit.clone(),
    );

    // right origin, but not bound to this mount
    c.page
        .bus()
        .deliver(MessageEvent::new(d.provider_origin.clone(), token_message("t")));
    c.collector.on_input(FieldName::CardNumber, "4111111111111111");
    c.collector.on_input(FieldName::CardCvv, "123");
    c.collector.on_submit().unwrap();
    c.page.bus().run_until_idle();

    assert_eq!(
        *c.received.borrow(),
        vec![OpaqueToken::new("4111111111111111|123")]
    );
    assert_eq!(audit.count(AuditOutcome::NonceMismatch), 1);
    assert_eq!(audit.count(AuditOutcome::Accepted), 1);
}

#[test]
fn hostile_page_cannot_frame_the_collector() {
    init_tracing();
    let real = Deployment::default();
    let evil = Deployment::from_origins("http://evil.example", "http://localhost:3005").unwrap();
    let browser = Browser::new()
        .with_site(MerchantSite::new(&evil))
        .with_site(ProviderSite::new(&real));

    let err = run_checkout_in(
        &browser,
        &evil,
        "4111111111111111",
        "123",
        &CheckoutOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Refused(r) if r.kind == RefusalKind::EmbeddingRefused));
}

#[test]
fn repeated_pay_actions_each_deliver_a_token() {
    let d = Deployment::default();
    let mut c = open_checkout(&d, ControllerConfig::for_deployment(&d));

    c.collector.on_input(FieldName::CardNumber, "4111111111111111");
    c.collector.on_input(FieldName::CardCvv, "123");
    c.collector.on_submit().unwrap();
    c.collector.on_input(FieldName::CardCvv, "456");
    c.collector.on_submit().unwrap();
    c.page.bus().run_until_idle();

    assert_eq!(
        *c.received.borrow(),
        vec![
            OpaqueToken::new("4111111111111111|123"),
            OpaqueToken::new("4111111111111111|456"),
        ]
    );
}

#[test]
fn empty_fields_still_produce_a_token() {
    let tokens = run_checkout(&Deployment::default(), "", "", &CheckoutOptions::default()).unwrap();
    assert_eq!(tokens, vec![OpaqueToken::new("|")]);
}
