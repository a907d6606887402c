//! Checkout walkthrough.
//!
//! This example plays both sites and the browser between them:
//! 1. A legitimate pay action: the merchant gets a token, never the card
//! 2. A forged message from another origin is dropped
//! 3. A hostile page tries to frame the real collector
//! 4. Cross-origin reads with and without an Access-Control-Allow-Origin header
//!
//! Run with: `cargo run --example checkout`

use frame_handshake::demo::{run_checkout, CheckoutOptions};
use frame_handshake::web::{MerchantSite, ProviderSite, ALLOWED_API_PATH, BLOCKED_API_PATH};
use frame_handshake::{
    Browser, ContainerElement, ControllerConfig, Deployment, EmbeddingController, Error,
    MessageBus, MessageEvent, Origin,
};
use serde_json::json;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    println!("=== Checkout Example ===\n");
    let deployment = Deployment::default();

    // Scenario 1: the happy path
    println!("--- Scenario 1: Pay ---");
    match run_checkout(
        &deployment,
        "4111111111111111",
        "123",
        &CheckoutOptions { bind_nonce: true },
    ) {
        Ok(tokens) => {
            for token in tokens {
                println!("✓ Merchant received token: {}", token);
            }
        }
        Err(e) => println!("✗ Checkout failed: {}", e),
    }

    // Scenario 2: someone else posts a token-shaped message
    println!("\n--- Scenario 2: Forged Sender ---");
    let bus = MessageBus::new(deployment.merchant_origin.clone());
    let mut controller = EmbeddingController::new(
        ControllerConfig::for_deployment(&deployment),
        &bus,
        |token| println!("✗ Callback fired with {}", token),
    );
    let mut container = ContainerElement::new("payment-gateway-container");
    controller.mount(&mut container);

    let forged = MessageEvent::new(
        Origin::parse("http://evil.example").expect("valid origin"),
        json!({ "type": "tokenisedCardDetails", "value": "stolen" }),
    );
    match controller.on_message(&forged) {
        Ok(_) => println!("✗ Forged message accepted"),
        Err(rejection) => println!("✓ Forged message dropped: {}", rejection),
    }
    println!("  Controller state: {}", controller.state());

    // Scenario 3: a hostile page frames the collector
    println!("\n--- Scenario 3: Hostile Embedder ---");
    let evil = Deployment::from_origins("http://evil.example:3000", "http://localhost:3005")
        .expect("valid origins");
    let browser = Browser::new()
        .with_site(MerchantSite::new(&evil))
        .with_site(ProviderSite::new(&deployment));
    match run_checkout_with(&browser, &evil) {
        Err(Error::Refused(refusal)) => println!("✓ Browser refused: {}", refusal),
        Err(e) => println!("✗ Unexpected error: {}", e),
        Ok(_) => println!("✗ Collector rendered inside a hostile page"),
    }

    // Scenario 4: cross-origin reads
    println!("\n--- Scenario 4: Cross-Origin Reads ---");
    let browser = Browser::new()
        .with_site(MerchantSite::new(&deployment))
        .with_site(ProviderSite::new(&deployment));
    let page = browser
        .open_page(&deployment.merchant_origin.join("/"))
        .expect("merchant page loads");

    for path in [BLOCKED_API_PATH, ALLOWED_API_PATH] {
        let url = deployment.provider_origin.join(path);
        match browser.fetch_json(&page, &url) {
            Ok(body) => println!("✓ {} -> {}", path, body["message"]),
            Err(e) => println!("✓ {} -> {}", path, e),
        }
    }

    println!("\n=== Example Complete ===");
}

fn run_checkout_with(browser: &Browser, deployment: &Deployment) -> Result<(), Error> {
    frame_handshake::demo::run_checkout_in(
        browser,
        deployment,
        "4111111111111111",
        "123",
        &CheckoutOptions::default(),
    )
    .map(|_| ())
}
