//! End-to-end checkout across both sites.
//!
//! This wires every piece together the way the two real sites would:
//!
//! 1. The browser opens the merchant page, which carries its
//!    `script-src`/`frame-src` policy
//! 2. The page loads the provider SDK (allowed by `script-src`)
//! 3. The embedding controller mounts the collector frame (allowed by
//!    `frame-src` on the page and `frame-ancestors` on the frame)
//! 4. The user types into the frame and presses pay
//! 5. The host event loop delivers the token message; the controller
//!    validates it and fires the callback
//!
//! The merchant side never holds the card number or CVV. It can only see
//! the token the callback receives.

use std::cell::RefCell;
use std::rc::Rc;

use crate::browser::Browser;
use crate::collector::IsolatedCollector;
use crate::config::Deployment;
use crate::controller::{ControllerConfig, EmbeddingController};
use crate::error::{Error, Refusal, RefusalKind};
use crate::sensitive::FieldName;
use crate::token::OpaqueToken;
use crate::web::{MerchantSite, ProviderSite, CONTAINER_ID};

/// Options for [`run_checkout`].
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    /// Bind the token message to the mounted frame with a nonce
    pub bind_nonce: bool,
}

/// Runs one pay action and returns the tokens the host page received.
///
/// # Examples
///
/// ```
/// use frame_handshake::demo::{run_checkout, CheckoutOptions};
/// use frame_handshake::Deployment;
///
/// let tokens = run_checkout(
///     &Deployment::default(),
///     "4111111111111111",
///     "123",
///     &CheckoutOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(tokens.len(), 1);
/// assert_eq!(tokens[0].as_str(), "4111111111111111|123");
/// ```
pub fn run_checkout(
    deployment: &Deployment,
    card_number: &str,
    card_cvv: &str,
    options: &CheckoutOptions,
) -> Result<Vec<OpaqueToken>, Error> {
    let browser = Browser::new()
        .with_site(MerchantSite::new(deployment))
        .with_site(ProviderSite::new(deployment));
    run_checkout_in(&browser, deployment, card_number, card_cvv, options)
}

/// Like [`run_checkout`], against caller-provided sites.
///
/// Useful for checking what happens when a site is misconfigured.
pub fn run_checkout_in(
    browser: &Browser,
    deployment: &Deployment,
    card_number: &str,
    card_cvv: &str,
    options: &CheckoutOptions,
) -> Result<Vec<OpaqueToken>, Error> {
    let mut page = browser.open_page(&deployment.merchant_origin.join("/"))?;
    browser.load_script(&page, &deployment.sdk_url())?;

    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    let mut config = ControllerConfig::for_deployment(deployment);
    config.bind_nonce = options.bind_nonce;

    let bus = Rc::clone(page.bus());
    let mut controller =
        EmbeddingController::new(config, &bus, move |token| sink.borrow_mut().push(token));

    let container = page
        .container_mut(CONTAINER_ID)
        .ok_or_else(|| Refusal::new(RefusalKind::NotFound, "payment container missing"))?;
    let frame = controller.mount(container);
    let window = browser.load_frame(&page, &frame)?;

    let mut collector = IsolatedCollector::new(window, deployment.merchant_origin.clone());
    collector.on_input(FieldName::CardNumber, card_number);
    collector.on_input(FieldName::CardCvv, card_cvv);
    collector.on_submit()?;

    bus.run_until_idle();
    drop(controller);

    let tokens = received.borrow().clone();
    Ok(tokens)
}
