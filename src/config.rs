//! Deployment constants owned by the serving collaborators.

use crate::error::OriginError;
use crate::origin::Origin;

/// Port the merchant site listens on.
pub const MERCHANT_PORT: u16 = 3000;
/// Port the payment provider listens on.
pub const PROVIDER_PORT: u16 = 3005;
/// Path of the collector document on the provider origin.
pub const FRAME_PATH: &str = "/cardFields";
/// Path of the embedding-controller script on the provider origin.
pub const SDK_PATH: &str = "/sdk.js";
/// Id given to the mounted frame element.
pub const FRAME_ELEMENT_ID: &str = "lazorpay-card-fields-iframe";

/// Where each party lives.
///
/// `Deployment::default()` is the local two-site setup: the merchant on
/// port 3000 and the provider on port 3005.
///
/// ```
/// use frame_handshake::Deployment;
///
/// let d = Deployment::default();
/// assert_eq!(d.merchant_origin.to_string(), "http://localhost:3000");
/// assert_eq!(d.frame_url(), "http://localhost:3005/cardFields");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Origin of the host page
    pub merchant_origin: Origin,
    /// Origin serving the collector frame and the SDK
    pub provider_origin: Origin,
    /// Path of the collector document
    pub frame_path: String,
    /// Path of the SDK script
    pub sdk_path: String,
    /// Id of the frame element
    pub frame_id: String,
}

impl Deployment {
    /// Creates a deployment with custom origins and the standard paths.
    pub fn new(merchant_origin: Origin, provider_origin: Origin) -> Self {
        Self {
            merchant_origin,
            provider_origin,
            frame_path: FRAME_PATH.to_string(),
            sdk_path: SDK_PATH.to_string(),
            frame_id: FRAME_ELEMENT_ID.to_string(),
        }
    }

    /// Parses both origins.
    pub fn from_origins(merchant: &str, provider: &str) -> Result<Self, OriginError> {
        Ok(Self::new(Origin::parse(merchant)?, Origin::parse(provider)?))
    }

    /// Absolute URL of the collector document.
    pub fn frame_url(&self) -> String {
        self.provider_origin.join(&self.frame_path)
    }

    /// Absolute URL of the SDK script.
    pub fn sdk_url(&self) -> String {
        self.provider_origin.join(&self.sdk_path)
    }
}

impl Default for Deployment {
    fn default() -> Self {
        let local = |port| Origin::from_parts("http".to_string(), "localhost".to_string(), port);
        Self::new(local(MERCHANT_PORT), local(PROVIDER_PORT))
    }
}
