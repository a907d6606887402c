//! In-memory model of the browser's enforcement of origin policies.
//!
//! Real pages never observe these checks as errors; an embed that fails
//! `frame-ancestors` shows nothing, and a read that fails CORS yields a
//! network error with no body. Here each refusal is surfaced as a
//! [`Refusal`] so the absence can be asserted on.

use std::fmt;
use std::rc::Rc;

use crate::channel::MessageBus;
use crate::controller::{ContainerElement, FrameElement};
use crate::error::{Error, Refusal, RefusalKind};
use crate::http::{Request, Response, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_SECURITY_POLICY};
use crate::logging::HandshakeLog;
use crate::message::Nonce;
use crate::origin::Origin;
use crate::policy::ContentSecurityPolicy;
use crate::web::Site;

/// Collects `id="..."` attribute values from a document body.
fn element_ids(html: &str) -> Vec<String> {
    html.split("id=\"")
        .skip(1)
        .filter_map(|rest| rest.split_once('"').map(|(id, _)| id.to_string()))
        .collect()
}

fn csp_of(response: &Response) -> ContentSecurityPolicy {
    response
        .header(CONTENT_SECURITY_POLICY)
        .map(ContentSecurityPolicy::parse)
        .unwrap_or_default()
}

/// A top-level document.
///
/// Owns the window's message channel and the element tree of its own
/// origin. Elements inside mounted frames are not reachable from here.
pub struct Page {
    origin: Origin,
    url: String,
    csp: ContentSecurityPolicy,
    bus: Rc<MessageBus>,
    element_ids: Vec<String>,
    containers: Vec<ContainerElement>,
}

impl Page {
    /// Origin of the document.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// URL the page was loaded from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The policy delivered with the document.
    pub fn csp(&self) -> &ContentSecurityPolicy {
        &self.csp
    }

    /// The window's message channel.
    pub fn bus(&self) -> &Rc<MessageBus> {
        &self.bus
    }

    /// Looks up a container element to mount frames under.
    pub fn container_mut(&mut self, id: &str) -> Option<&mut ContainerElement> {
        if !self.element_ids.iter().any(|e| e == id) {
            return None;
        }
        if !self.containers.iter().any(|c| c.id == id) {
            self.containers.push(ContainerElement::new(id));
        }
        self.containers.iter_mut().find(|c| c.id == id)
    }

    /// Whether an element with this id exists in this document.
    ///
    /// Mounted frame elements count; the inputs inside them do not, since
    /// they belong to another origin's document.
    pub fn has_element(&self, id: &str) -> bool {
        self.element_ids.iter().any(|e| e == id)
            || self
                .containers
                .iter()
                .flat_map(|c| c.frames.iter())
                .any(|f| f.id == id)
    }

    /// All frames mounted so far.
    pub fn frames(&self) -> impl Iterator<Item = &FrameElement> {
        self.containers.iter().flat_map(|c| c.frames.iter())
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("origin", &self.origin)
            .field("url", &self.url)
            .field("csp", &self.csp.to_string())
            .finish_non_exhaustive()
    }
}

/// The browsing context created for a frame.
///
/// Its origin comes from the URL it navigated to, not from anything the
/// document inside says about itself.
#[derive(Debug, Clone)]
pub struct FrameWindow {
    origin: Origin,
    location: String,
    element_ids: Vec<String>,
    parent: ParentHandle,
}

impl FrameWindow {
    /// Creates a frame context whose parent window owns `parent_bus`.
    ///
    /// This is the browser's job; [`Browser::load_frame`] is the normal way
    /// to get one.
    pub fn new(origin: Origin, location: impl Into<String>, parent_bus: Rc<MessageBus>) -> Self {
        Self {
            parent: ParentHandle {
                sender: origin.clone(),
                bus: parent_bus,
            },
            origin,
            location: location.into(),
            element_ids: Vec::new(),
        }
    }

    /// Origin of the frame's document.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Full URL the frame navigated to.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Nonce handed over in the frame URL, if any.
    pub fn nonce(&self) -> Option<Nonce> {
        Nonce::from_url(&self.location)
    }

    /// Whether an element with this id exists in the frame's document.
    pub fn has_element(&self, id: &str) -> bool {
        self.element_ids.iter().any(|e| e == id)
    }

    /// Handle to the embedding window.
    pub fn parent(&self) -> &ParentHandle {
        &self.parent
    }
}

/// `window.parent` as seen from inside a frame.
///
/// Messages posted through it are stamped with the frame's origin by the
/// transport; the posting code cannot choose the sender origin.
#[derive(Debug, Clone)]
pub struct ParentHandle {
    sender: Origin,
    bus: Rc<MessageBus>,
}

impl ParentHandle {
    /// Posts `data` to the parent window if its origin is `target_origin`.
    ///
    /// Fire-and-forget: a mismatch drops the message and nothing is
    /// reported back to the sender.
    pub fn post_message(&self, data: serde_json::Value, target_origin: &Origin) {
        self.bus.post_message(&self.sender, data, target_origin);
    }
}

/// Sites reachable by URL, plus the policy checks a browser applies.
///
/// ```
/// use frame_handshake::web::{MerchantSite, ProviderSite};
/// use frame_handshake::{Browser, Deployment, RefusalKind, Error};
///
/// let d = Deployment::default();
/// let browser = Browser::new()
///     .with_site(MerchantSite::new(&d))
///     .with_site(ProviderSite::new(&d));
/// let page = browser.open_page(&d.merchant_origin.join("/")).unwrap();
///
/// let blocked = browser.fetch_json(&page, "http://localhost:3005/api/payment-blocked");
/// assert!(matches!(
///     blocked,
///     Err(Error::Refused(r)) if r.kind == RefusalKind::ResourceAccessRefused
/// ));
/// assert!(browser.fetch_json(&page, "http://localhost:3005/api/payment-allowed").is_ok());
/// ```
#[derive(Default)]
pub struct Browser {
    sites: Vec<Rc<dyn Site>>,
}

impl Browser {
    /// A browser that can reach no sites.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a site reachable.
    pub fn with_site(mut self, site: impl Site + 'static) -> Self {
        self.sites.push(Rc::new(site));
        self
    }

    fn request(&self, url: &str, initiator: Option<&Origin>) -> Result<(Origin, Response), Error> {
        let (origin, path) = Origin::split_url(url)?;
        let site = self
            .sites
            .iter()
            .find(|s| s.origin() == &origin)
            .ok_or_else(|| Refusal::new(RefusalKind::NotFound, format!("no site at {}", origin)))?;

        let mut request = Request::get(path);
        if let Some(initiator) = initiator.filter(|i| **i != origin) {
            request = request.with_origin(initiator.clone());
        }
        Ok((origin, site.handle(&request)))
    }

    fn navigate(&self, url: &str, initiator: Option<&Origin>) -> Result<(Origin, Response), Error> {
        let (origin, response) = self.request(url, initiator)?;
        if !response.is_success() {
            return Err(Refusal::new(
                RefusalKind::NotFound,
                format!("{} answered {}", url, response.status),
            )
            .into());
        }
        Ok((origin, response))
    }

    /// Loads a top-level document and creates its window.
    pub fn open_page(&self, url: &str) -> Result<Page, Error> {
        let (origin, response) = self.navigate(url, None)?;
        HandshakeLog::new("browser", &origin).debug(format_args!("opened {}", url));
        Ok(Page {
            csp: csp_of(&response),
            bus: Rc::new(MessageBus::new(origin.clone())),
            element_ids: element_ids(&response.body),
            containers: Vec::new(),
            url: url.to_string(),
            origin,
        })
    }

    /// Loads a classic script into `page`, subject to its `script-src`.
    pub fn load_script(&self, page: &Page, url: &str) -> Result<Response, Error> {
        let (script_origin, _) = Origin::split_url(url)?;
        if !page.csp.allows_script(&script_origin, &page.origin) {
            HandshakeLog::new("browser", &page.origin)
                .warn(format_args!("script-src refused {}", url));
            return Err(Refusal::new(RefusalKind::ScriptRefused, url).into());
        }
        let (_, response) = self.navigate(url, Some(&page.origin))?;
        Ok(response)
    }

    /// Navigates a mounted frame element and returns its browsing context.
    ///
    /// Two checks apply: the page's `frame-src` must allow the frame's
    /// origin, and the framed document's `frame-ancestors` must allow the
    /// page's origin.
    pub fn load_frame(&self, page: &Page, frame: &FrameElement) -> Result<FrameWindow, Error> {
        let log = HandshakeLog::new("browser", &page.origin);
        let frame_origin = frame.origin()?;

        if !page.csp.allows_frame(&frame_origin, &page.origin) {
            log.warn(format_args!("frame-src refused {}", frame.src));
            return Err(Refusal::new(RefusalKind::FrameSourceRefused, frame.src.clone()).into());
        }

        let (_, response) = self.navigate(&frame.src, Some(&page.origin))?;
        if !csp_of(&response).allows_ancestor(&page.origin, &frame_origin) {
            log.warn(format_args!(
                "{} refused to be framed by {}",
                frame_origin, page.origin
            ));
            return Err(Refusal::new(
                RefusalKind::EmbeddingRefused,
                format!("frame-ancestors of {} excludes {}", frame_origin, page.origin),
            )
            .into());
        }

        let mut window = FrameWindow::new(frame_origin, frame.src.clone(), Rc::clone(&page.bus));
        window.element_ids = element_ids(&response.body);
        Ok(window)
    }

    /// Fetches `url` from script running in `page`.
    ///
    /// Cross-origin responses are only exposed when
    /// `Access-Control-Allow-Origin` is `*` or exactly the page's origin.
    pub fn fetch(&self, page: &Page, url: &str) -> Result<Response, Error> {
        let (origin, response) = self.request(url, Some(&page.origin))?;
        if origin == page.origin {
            return Ok(response);
        }

        let allowed = match response.header(ACCESS_CONTROL_ALLOW_ORIGIN) {
            Some("*") => true,
            Some(value) => value == page.origin.to_string(),
            None => false,
        };
        if !allowed {
            HandshakeLog::new("browser", &page.origin).warn(format_args!(
                "cross-origin read of {} blocked: no matching Access-Control-Allow-Origin",
                url
            ));
            return Err(Refusal::new(RefusalKind::ResourceAccessRefused, url).into());
        }
        Ok(response)
    }

    /// Like [`fetch`](Self::fetch), then parses the body as JSON.
    pub fn fetch_json(&self, page: &Page, url: &str) -> Result<serde_json::Value, Error> {
        let response = self.fetch(page, url)?;
        Ok(serde_json::from_str(&response.body)?)
    }
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sites.iter().map(|s| s.origin().to_string()))
            .finish()
    }
}
