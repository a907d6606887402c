//! The payment provider's site.

use serde::Serialize;

use crate::config::Deployment;
use crate::http::{HttpMethod, Request, Response, CONTENT_SECURITY_POLICY};
use crate::logging::HandshakeLog;
use crate::origin::Origin;
use crate::policy::{AccessPolicy, OriginPolicy};
use crate::sensitive::FieldName;

use super::{json_or_500, Site};

/// Endpoint readable from the provider origin only.
pub const BLOCKED_API_PATH: &str = "/api/payment-blocked";
/// Endpoint readable from the merchant origin as well.
pub const ALLOWED_API_PATH: &str = "/api/payment-allowed";

#[derive(Debug, Serialize)]
struct StatusBody {
    message: &'static str,
}

/// Serves the collector frame, the SDK script and two status endpoints.
///
/// ```
/// use frame_handshake::http::{Request, CONTENT_SECURITY_POLICY};
/// use frame_handshake::web::{ProviderSite, Site};
/// use frame_handshake::Deployment;
///
/// let site = ProviderSite::new(&Deployment::default());
/// let resp = site.handle(&Request::get("/cardFields"));
/// assert_eq!(
///     resp.header(CONTENT_SECURITY_POLICY),
///     Some("frame-ancestors http://localhost:3000")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ProviderSite {
    origin: Origin,
    frame_path: String,
    sdk_path: String,
    policy: OriginPolicy,
    blocked_access: AccessPolicy,
    allowed_access: AccessPolicy,
}

impl ProviderSite {
    /// Builds the site for a deployment.
    pub fn new(deployment: &Deployment) -> Self {
        Self {
            origin: deployment.provider_origin.clone(),
            frame_path: deployment.frame_path.clone(),
            sdk_path: deployment.sdk_path.clone(),
            policy: OriginPolicy::for_deployment(deployment),
            blocked_access: AccessPolicy::DenyAll,
            allowed_access: AccessPolicy::AllowOrigin(deployment.merchant_origin.clone()),
        }
    }

    /// Replaces the header policy, e.g. to simulate a misconfiguration.
    pub fn with_policy(mut self, policy: OriginPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn card_fields(&self) -> Response {
        let body = format!(
            concat!(
                "<!doctype html><html><body>",
                "<input id=\"{}\" autocomplete=\"cc-number\">",
                "<input id=\"{}\" autocomplete=\"cc-csc\">",
                "<button id=\"pay-button\">Pay</button>",
                "</body></html>"
            ),
            FieldName::CardNumber.element_id(),
            FieldName::CardCvv.element_id(),
        );
        Response::html(body).with_header(
            CONTENT_SECURITY_POLICY,
            self.policy.collector_csp().to_string(),
        )
    }

    fn with_access(
        &self,
        request: &Request,
        response: Response,
        access: &AccessPolicy,
    ) -> Response {
        if let Some(caller) = &request.origin {
            let log = HandshakeLog::new("provider", &self.origin);
            if access.allows(caller) {
                log.debug(format_args!("granting {} read access to {}", caller, request.route()));
            } else {
                log.debug(format_args!(
                    "no read grant for {} on {}; the browser will withhold the response",
                    caller,
                    request.route()
                ));
            }
        }
        access
            .response_headers()
            .into_iter()
            .fold(response, |resp, (name, value)| resp.with_header(name, value))
    }
}

impl Site for ProviderSite {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn handle(&self, request: &Request) -> Response {
        HandshakeLog::new("provider", &self.origin).debug(format_args!(
            "{} {}",
            request.method,
            request.route()
        ));
        if request.method != HttpMethod::Get {
            return Response::new(405, "Method Not Allowed");
        }

        match request.route() {
            route if route == self.frame_path => self.card_fields(),
            route if route == self.sdk_path => Response::javascript(
                "// embedding controller: mounts the card frame and relays its token\n",
            ),
            BLOCKED_API_PATH => self.with_access(
                request,
                json_or_500(&StatusBody {
                    message: "You'll only see this message if you're on the same origin.",
                }),
                &self.blocked_access,
            ),
            ALLOWED_API_PATH => self.with_access(
                request,
                json_or_500(&StatusBody {
                    message: "You'll only see this message if you're on allowed origins.",
                }),
                &self.allowed_access,
            ),
            _ => Response::not_found(),
        }
    }
}
