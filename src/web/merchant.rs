//! The merchant's site.

use crate::config::Deployment;
use crate::http::{HttpMethod, Request, Response, CONTENT_SECURITY_POLICY};
use crate::logging::HandshakeLog;
use crate::origin::Origin;
use crate::policy::OriginPolicy;

use super::Site;

/// Id of the element the frame is mounted under.
pub const CONTAINER_ID: &str = "payment-gateway-container";

/// Serves the checkout page.
#[derive(Debug, Clone)]
pub struct MerchantSite {
    origin: Origin,
    sdk_url: String,
    policy: OriginPolicy,
}

impl MerchantSite {
    /// Builds the site for a deployment.
    pub fn new(deployment: &Deployment) -> Self {
        Self {
            origin: deployment.merchant_origin.clone(),
            sdk_url: deployment.sdk_url(),
            policy: OriginPolicy::for_deployment(deployment),
        }
    }

    /// Replaces the header policy.
    pub fn with_policy(mut self, policy: OriginPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn checkout_page(&self) -> Response {
        let body = format!(
            concat!(
                "<!doctype html><html><body>",
                "<div id=\"{}\"></div>",
                "<div id=\"tokenised-details-container\"></div>",
                "<button id=\"call-payment-blocked-api\">Blocked API</button>",
                "<button id=\"call-payment-allowed-api\">Allowed API</button>",
                "<script src=\"{}\"></script>",
                "</body></html>"
            ),
            CONTAINER_ID, self.sdk_url,
        );
        Response::html(body).with_header(CONTENT_SECURITY_POLICY, self.policy.page_csp().to_string())
    }
}

impl Site for MerchantSite {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn handle(&self, request: &Request) -> Response {
        HandshakeLog::new("merchant", &self.origin).debug(format_args!(
            "{} {}",
            request.method,
            request.route()
        ));
        match (request.method, request.route()) {
            (HttpMethod::Get, "/") => self.checkout_page(),
            (HttpMethod::Get, _) => Response::not_found(),
            _ => Response::new(405, "Method Not Allowed"),
        }
    }
}
