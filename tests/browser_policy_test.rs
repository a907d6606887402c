//! Browser enforcement of the headers each site serves.

use frame_handshake::http::{Request, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_SECURITY_POLICY};
use frame_handshake::web::{MerchantSite, ProviderSite, Site, ALLOWED_API_PATH, BLOCKED_API_PATH};
use frame_handshake::{
    Browser, ContainerElement, ControllerConfig, Deployment, EmbeddingController, Error,
    FrameContainer, FrameElement, MessageBus, Origin, OriginPolicy, RefusalKind,
};

fn browser(d: &Deployment) -> Browser {
    Browser::new()
        .with_site(MerchantSite::new(d))
        .with_site(ProviderSite::new(d))
}

fn refusal_kind(result: Result<impl std::fmt::Debug, Error>) -> RefusalKind {
    match result {
        Err(Error::Refused(r)) => r.kind,
        other => panic!("expected a refusal, got {:?}", other),
    }
}

#[test]
fn cross_origin_read_without_cors_is_refused() {
    let d = Deployment::default();
    let b = browser(&d);
    let page = b.open_page(&d.merchant_origin.join("/")).unwrap();

    let blocked = b.fetch_json(&page, &d.provider_origin.join(BLOCKED_API_PATH));
    assert_eq!(refusal_kind(blocked), RefusalKind::ResourceAccessRefused);
}

#[test]
fn cross_origin_read_with_matching_cors_succeeds() {
    let d = Deployment::default();
    let b = browser(&d);
    let page = b.open_page(&d.merchant_origin.join("/")).unwrap();

    let body = b
        .fetch_json(&page, &d.provider_origin.join(ALLOWED_API_PATH))
        .unwrap();
    assert_eq!(
        body["message"],
        "You'll only see this message if you're on allowed origins."
    );
}

#[test]
fn allowed_endpoint_names_exactly_the_merchant() {
    let d = Deployment::default();
    let provider = ProviderSite::new(&d);

    let resp = provider.handle(&Request::get(ALLOWED_API_PATH));
    assert_eq!(
        resp.header(ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("http://localhost:3000")
    );
    let resp = provider.handle(&Request::get(BLOCKED_API_PATH));
    assert_eq!(resp.header(ACCESS_CONTROL_ALLOW_ORIGIN), None);
}

#[test]
fn allowed_endpoint_is_still_closed_to_other_origins() {
    let d = Deployment::default();
    let other = Deployment::from_origins("http://other-shop.example", "http://localhost:3005")
        .unwrap();
    let b = Browser::new()
        .with_site(MerchantSite::new(&other))
        .with_site(ProviderSite::new(&d));
    let page = b.open_page(&other.merchant_origin.join("/")).unwrap();

    let result = b.fetch_json(&page, &d.provider_origin.join(ALLOWED_API_PATH));
    assert_eq!(refusal_kind(result), RefusalKind::ResourceAccessRefused);
}

#[test]
fn stacked_ports_cannot_pose_as_the_merchant() {
    let d = Deployment::default();
    assert!(matches!(
        Deployment::from_origins("http://localhost:3000:80", "http://localhost:3005"),
        Err(e) if e.input() == "http://localhost:3000:80"
    ));

    let b = browser(&d);
    assert!(matches!(
        b.open_page("http://localhost:3000:80/"),
        Err(Error::InvalidOrigin(_))
    ));
    let page = b.open_page(&d.merchant_origin.join("/")).unwrap();
    assert!(matches!(
        b.fetch_json(&page, "http://localhost:3005:80/api/payment-allowed"),
        Err(Error::InvalidOrigin(_))
    ));
}

#[test]
fn page_runs_provider_sdk_but_not_foreign_scripts() {
    let d = Deployment::default();
    let b = browser(&d);
    let page = b.open_page(&d.merchant_origin.join("/")).unwrap();

    assert!(b.load_script(&page, &d.sdk_url()).is_ok());
    let foreign = b.load_script(&page, "http://evil.example/steal.js");
    assert_eq!(refusal_kind(foreign), RefusalKind::ScriptRefused);
}

#[test]
fn page_without_provider_in_script_src_cannot_load_sdk() {
    let d = Deployment::default();
    let mut policy = OriginPolicy::for_deployment(&d);
    policy.script_allow_from.clear();
    let b = Browser::new()
        .with_site(MerchantSite::new(&d).with_policy(policy))
        .with_site(ProviderSite::new(&d));
    let page = b.open_page(&d.merchant_origin.join("/")).unwrap();

    assert_eq!(
        page.csp().to_string(),
        "script-src 'self'; frame-src http://localhost:3005"
    );
    assert_eq!(
        refusal_kind(b.load_script(&page, &d.sdk_url())),
        RefusalKind::ScriptRefused
    );
}

#[test]
fn frame_src_limits_what_the_page_can_embed() {
    let d = Deployment::default();
    let b = browser(&d);
    let mut page = b.open_page(&d.merchant_origin.join("/")).unwrap();

    let rogue = FrameElement {
        id: "rogue".to_string(),
        src: "http://evil.example/cardFields".to_string(),
    };
    page.container_mut("payment-gateway-container")
        .unwrap()
        .append_frame(rogue.clone());
    assert_eq!(
        refusal_kind(b.load_frame(&page, &rogue)),
        RefusalKind::FrameSourceRefused
    );
}

#[test]
fn collector_refuses_unlisted_ancestor() {
    let d = Deployment::default();
    let mut policy = OriginPolicy::for_deployment(&d);
    policy.embed_allow_from = Origin::parse("https://other-shop.example").unwrap();
    let b = Browser::new()
        .with_site(MerchantSite::new(&d))
        .with_site(ProviderSite::new(&d).with_policy(policy));
    let mut page = b.open_page(&d.merchant_origin.join("/")).unwrap();

    let bus = MessageBus::new(d.merchant_origin.clone());
    let mut controller =
        EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {});
    let frame = controller.mount(page.container_mut("payment-gateway-container").unwrap());

    assert_eq!(
        refusal_kind(b.load_frame(&page, &frame)),
        RefusalKind::EmbeddingRefused
    );
}

#[test]
fn collector_document_carries_frame_ancestors() {
    let d = Deployment::default();
    let resp = ProviderSite::new(&d).handle(&Request::get("/cardFields"));
    assert!(resp.is_success());
    assert_eq!(
        resp.header(CONTENT_SECURITY_POLICY),
        Some("frame-ancestors http://localhost:3000")
    );
}

#[test]
fn frames_are_mounted_in_order() {
    let d = Deployment::default();
    let bus = MessageBus::new(d.merchant_origin.clone());
    let mut controller =
        EmbeddingController::new(ControllerConfig::for_deployment(&d), &bus, |_| {});
    let mut container = ContainerElement::new("payment-gateway-container");
    container.append_frame(FrameElement {
        id: "existing".to_string(),
        src: "http://localhost:3000/banner".to_string(),
    });

    controller.mount(&mut container);
    assert_eq!(container.frames.len(), 2);
    assert_eq!(container.frames[1].id, d.frame_id);
}

#[test]
fn unknown_paths_are_not_found() {
    let d = Deployment::default();
    let b = browser(&d);
    assert_eq!(
        refusal_kind(b.open_page(&d.provider_origin.join("/missing"))),
        RefusalKind::NotFound
    );
}
