//! Declarative origin policies attached by the serving collaborators.
//!
//! The handshake's guarantees hold only while these are configured
//! correctly: the collector must refuse to be framed by anyone but the
//! merchant, and the merchant page must refuse scripts and frames from
//! anywhere but itself and the provider. Nothing in the collector or the
//! controller re-checks these at runtime; the browser enforces them.

use std::fmt;

use crate::config::Deployment;
use crate::http::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY};
use crate::origin::Origin;

/// Who may embed the collector and what the host page may load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    /// The single origin allowed to frame the collector
    pub embed_allow_from: Origin,
    /// Origins whose scripts the host page may run, besides its own
    pub script_allow_from: Vec<Origin>,
    /// Origins the host page may frame
    pub frame_allow_from: Vec<Origin>,
}

impl OriginPolicy {
    /// The policy for a merchant embedding one provider.
    pub fn for_deployment(deployment: &Deployment) -> Self {
        Self {
            embed_allow_from: deployment.merchant_origin.clone(),
            script_allow_from: vec![deployment.provider_origin.clone()],
            frame_allow_from: vec![deployment.provider_origin.clone()],
        }
    }

    /// Anti-embedding directive for the collector document.
    ///
    /// ```
    /// use frame_handshake::{Deployment, OriginPolicy};
    ///
    /// let policy = OriginPolicy::for_deployment(&Deployment::default());
    /// assert_eq!(
    ///     policy.collector_csp().to_string(),
    ///     "frame-ancestors http://localhost:3000"
    /// );
    /// ```
    pub fn collector_csp(&self) -> ContentSecurityPolicy {
        ContentSecurityPolicy::new().with_directive(
            FRAME_ANCESTORS,
            vec![SourceExpr::Origin(self.embed_allow_from.clone())],
        )
    }

    /// Script and frame execution directive for the host page.
    ///
    /// ```
    /// use frame_handshake::{Deployment, OriginPolicy};
    ///
    /// let policy = OriginPolicy::for_deployment(&Deployment::default());
    /// assert_eq!(
    ///     policy.page_csp().to_string(),
    ///     "script-src 'self' http://localhost:3005; frame-src http://localhost:3005"
    /// );
    /// ```
    pub fn page_csp(&self) -> ContentSecurityPolicy {
        let mut scripts = vec![SourceExpr::SelfOrigin];
        scripts.extend(self.script_allow_from.iter().cloned().map(SourceExpr::Origin));
        let frames = if self.frame_allow_from.is_empty() {
            vec![SourceExpr::None]
        } else {
            self.frame_allow_from
                .iter()
                .cloned()
                .map(SourceExpr::Origin)
                .collect()
        };
        ContentSecurityPolicy::new()
            .with_directive(SCRIPT_SRC, scripts)
            .with_directive(FRAME_SRC, frames)
    }
}

/// `frame-ancestors` directive name.
pub const FRAME_ANCESTORS: &str = "frame-ancestors";
/// `script-src` directive name.
pub const SCRIPT_SRC: &str = "script-src";
/// `frame-src` directive name.
pub const FRAME_SRC: &str = "frame-src";
const CHILD_SRC: &str = "child-src";
const DEFAULT_SRC: &str = "default-src";

/// One source expression in a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceExpr {
    /// `'self'`: the origin of the protected document
    SelfOrigin,
    /// `'none'`: matches nothing
    None,
    /// `*`
    Any,
    /// An exact origin
    Origin(Origin),
}

impl SourceExpr {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "'self'" => Some(SourceExpr::SelfOrigin),
            "'none'" => Some(SourceExpr::None),
            "*" => Some(SourceExpr::Any),
            // keywords and scheme/host patterns we do not model
            _ => Origin::parse(token).ok().map(SourceExpr::Origin),
        }
    }

    fn matches(&self, resource: &Origin, self_origin: &Origin) -> bool {
        match self {
            SourceExpr::SelfOrigin => resource == self_origin,
            SourceExpr::None => false,
            SourceExpr::Any => true,
            SourceExpr::Origin(origin) => resource == origin,
        }
    }
}

impl fmt::Display for SourceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceExpr::SelfOrigin => f.write_str("'self'"),
            SourceExpr::None => f.write_str("'none'"),
            SourceExpr::Any => f.write_str("*"),
            SourceExpr::Origin(origin) => write!(f, "{}", origin),
        }
    }
}

/// A parsed `Content-Security-Policy` header.
///
/// Only origin-level source matching is modelled; hashes, nonces and
/// scheme sources are dropped on parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<(String, Vec<SourceExpr>)>,
}

impl ContentSecurityPolicy {
    /// An empty policy, which allows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a directive.
    pub fn with_directive(mut self, name: &str, sources: Vec<SourceExpr>) -> Self {
        self.directives.push((name.to_ascii_lowercase(), sources));
        self
    }

    /// Parses a header value. The first occurrence of a directive wins.
    ///
    /// ```
    /// use frame_handshake::{ContentSecurityPolicy, Origin};
    ///
    /// let csp = ContentSecurityPolicy::parse("frame-ancestors 'self' https://shop.example");
    /// let framed = Origin::parse("https://pay.example").unwrap();
    /// assert!(csp.allows_ancestor(&Origin::parse("https://shop.example").unwrap(), &framed));
    /// assert!(!csp.allows_ancestor(&Origin::parse("https://evil.example").unwrap(), &framed));
    /// ```
    pub fn parse(header: &str) -> Self {
        let mut policy = Self::new();
        for part in header.split(';') {
            let mut tokens = part.split_ascii_whitespace();
            let Some(name) = tokens.next() else { continue };
            if policy.directive(name).is_some() {
                continue;
            }
            let sources = tokens.filter_map(SourceExpr::parse).collect();
            policy = policy.with_directive(name, sources);
        }
        policy
    }

    /// Looks up a directive by name.
    pub fn directive(&self, name: &str) -> Option<&[SourceExpr]> {
        let name = name.to_ascii_lowercase();
        self.directives
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, sources)| sources.as_slice())
    }

    fn allows_with_fallback(&self, chain: &[&str], resource: &Origin, self_origin: &Origin) -> bool {
        match chain.iter().find_map(|name| self.directive(name)) {
            Some(sources) => sources.iter().any(|s| s.matches(resource, self_origin)),
            None => true,
        }
    }

    /// Whether a document at `self_origin` may run a script from `script`.
    pub fn allows_script(&self, script: &Origin, self_origin: &Origin) -> bool {
        self.allows_with_fallback(&[SCRIPT_SRC, DEFAULT_SRC], script, self_origin)
    }

    /// Whether a document at `self_origin` may frame a document from `frame`.
    pub fn allows_frame(&self, frame: &Origin, self_origin: &Origin) -> bool {
        self.allows_with_fallback(&[FRAME_SRC, CHILD_SRC, DEFAULT_SRC], frame, self_origin)
    }

    /// Whether a document at `self_origin` may be framed by `ancestor`.
    ///
    /// `frame-ancestors` has no fallback: without it, anyone may embed.
    pub fn allows_ancestor(&self, ancestor: &Origin, self_origin: &Origin) -> bool {
        self.allows_with_fallback(&[FRAME_ANCESTORS], ancestor, self_origin)
    }
}

impl fmt::Display for ContentSecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, sources)) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(name)?;
            for source in sources {
                write!(f, " {}", source)?;
            }
        }
        Ok(())
    }
}

/// Cross-origin read allowance for a provider endpoint.
///
/// The default is to send no CORS headers at all, which makes every
/// cross-origin read fail in the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Same-origin reads only
    #[default]
    DenyAll,
    /// Reads from exactly one other origin
    AllowOrigin(Origin),
}

impl AccessPolicy {
    /// Whether a page at `caller` may read the response.
    ///
    /// The headers do not depend on the caller; this is what the browser
    /// will conclude from them.
    pub fn allows(&self, caller: &Origin) -> bool {
        match self {
            AccessPolicy::DenyAll => false,
            AccessPolicy::AllowOrigin(origin) => origin == caller,
        }
    }

    /// Response headers implementing the policy.
    pub fn response_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            AccessPolicy::DenyAll => Vec::new(),
            AccessPolicy::AllowOrigin(origin) => vec![
                (ACCESS_CONTROL_ALLOW_ORIGIN, origin.to_string()),
                (VARY, ORIGIN.to_string()),
            ],
        }
    }
}
