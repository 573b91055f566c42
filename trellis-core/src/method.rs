// HTTP-style method vocabulary shared by the router and application proxies

use crate::Error;
use std::fmt;
use std::str::FromStr;

/// Navigation method. `All` is the registration wildcard and matches any
/// request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    All,
    Get,
    Checkout,
    Connect,
    Copy,
    Delete,
    Head,
    Lock,
    Merge,
    Mkactivity,
    Mkcol,
    Move,
    MSearch,
    Notify,
    Options,
    Patch,
    Post,
    Propfind,
    Proppatch,
    Purge,
    Put,
    Report,
    Search,
    Subscribe,
    Trace,
    Unlock,
    Unsubscribe,
}

impl Method {
    /// Every method the framework recognizes, `All` included.
    pub const VERBS: [Method; 27] = [
        Method::All,
        Method::Get,
        Method::Checkout,
        Method::Connect,
        Method::Copy,
        Method::Delete,
        Method::Head,
        Method::Lock,
        Method::Merge,
        Method::Mkactivity,
        Method::Mkcol,
        Method::Move,
        Method::MSearch,
        Method::Notify,
        Method::Options,
        Method::Patch,
        Method::Post,
        Method::Propfind,
        Method::Proppatch,
        Method::Purge,
        Method::Put,
        Method::Report,
        Method::Search,
        Method::Subscribe,
        Method::Trace,
        Method::Unlock,
        Method::Unsubscribe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::All => "all",
            Method::Get => "get",
            Method::Checkout => "checkout",
            Method::Connect => "connect",
            Method::Copy => "copy",
            Method::Delete => "delete",
            Method::Head => "head",
            Method::Lock => "lock",
            Method::Merge => "merge",
            Method::Mkactivity => "mkactivity",
            Method::Mkcol => "mkcol",
            Method::Move => "move",
            Method::MSearch => "m-search",
            Method::Notify => "notify",
            Method::Options => "options",
            Method::Patch => "patch",
            Method::Post => "post",
            Method::Propfind => "propfind",
            Method::Proppatch => "proppatch",
            Method::Purge => "purge",
            Method::Put => "put",
            Method::Report => "report",
            Method::Search => "search",
            Method::Subscribe => "subscribe",
            Method::Trace => "trace",
            Method::Unlock => "unlock",
            Method::Unsubscribe => "unsubscribe",
        }
    }

    /// Whether a handler registered for `self` should run for a request
    /// carrying `incoming`.
    pub fn accepts(&self, incoming: Method) -> bool {
        *self == Method::All || *self == incoming
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Method::VERBS
            .iter()
            .copied()
            .find(|m| m.as_str() == lowered)
            .ok_or_else(|| Error::UnknownMethod(s.to_string()))
    }
}
