//! Request facet: a read-only view over a [`Context`].

use std::net::IpAddr;

use http::header::HOST;
use http::{HeaderMap, Method, Version};

use crate::config::Config;
use crate::context::Context;
use crate::response::Response;

/// The request side of a context.
///
/// Obtained with [`Context::request`]. Reaches the response facet, the
/// owning context and the application config.
#[derive(Clone, Copy)]
pub struct Request<'a> {
    ctx: &'a Context,
}

impl<'a> Request<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &'a Context { self.ctx }
    pub fn app(&self) -> &'a Config { self.ctx.app() }
    pub fn response(&self) -> Response<'a> { Response::new(self.ctx) }

    pub fn method(&self) -> &'a Method { &self.ctx.req.method }
    pub fn url(&self) -> &'a str { &self.ctx.req.url }
    pub fn original_url(&self) -> &'a str { self.ctx.original_url() }
    pub fn headers(&self) -> &'a HeaderMap { &self.ctx.req.headers }

    pub fn path(&self) -> &'a str { split_url(self.url()).1 }

    /// The raw query string without the leading `?`.
    pub fn querystring(&self) -> &'a str { split_url(self.url()).2.unwrap_or("") }

    /// Case-insensitive header lookup. Non-visible-ASCII values read as absent.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.ctx.req.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn http_version_major(&self) -> u8 {
        match self.ctx.req.version {
            Version::HTTP_09 => 0,
            Version::HTTP_10 | Version::HTTP_11 => 1,
            Version::HTTP_2 => 2,
            _ => 3,
        }
    }

    /// `host:port`, honoring `X-Forwarded-Host` when the proxy is trusted.
    pub fn host(&self) -> &'a str {
        let forwarded = self.app().proxy.then(|| self.header("x-forwarded-host")).flatten();
        let host = forwarded
            .or_else(|| {
                (self.http_version_major() >= 2)
                    .then_some(self.ctx.req.authority.as_deref())
                    .flatten()
            })
            .or_else(|| self.header(HOST.as_str()))
            .unwrap_or("");
        first_value(host)
    }

    /// The host without its port.
    pub fn hostname(&self) -> &'a str {
        let host = self.host();
        if host.starts_with('[') {
            // IPv6 literal: keep the brackets, drop the port.
            return host.find(']').map_or(host, |end| &host[..=end]);
        }
        host.split(':').next().unwrap_or("")
    }

    /// `https` or `http`; `X-Forwarded-Proto` decides when the proxy is trusted.
    pub fn protocol(&self) -> &'a str {
        if !self.app().proxy {
            return "http";
        }
        match self.header("x-forwarded-proto") {
            Some(proto) if !proto.is_empty() => first_value(proto),
            _ => "http",
        }
    }

    pub fn secure(&self) -> bool {
        self.protocol() == "https"
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol(), self.host())
    }

    /// The full URL, built from the original request URL.
    pub fn href(&self) -> String {
        let original = self.original_url();
        if is_absolute(original) {
            return original.to_owned();
        }
        format!("{}{original}", self.origin())
    }

    /// Client addresses from the proxy header, when the proxy is trusted.
    pub fn ips(&self) -> Vec<&'a str> {
        let config = self.app();
        if !config.proxy {
            return Vec::new();
        }
        let Some(value) = self.header(config.proxy_ip_header.as_str()) else {
            return Vec::new();
        };
        let mut ips: Vec<&str> = value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        if config.max_ips_count > 0 && ips.len() > config.max_ips_count {
            ips.drain(..ips.len() - config.max_ips_count);
        }
        ips
    }

    /// The client address: the first proxied address, else the peer address.
    pub fn ip(&self) -> String {
        if let Some(first) = self.ips().first() {
            return (*first).to_owned();
        }
        self.ctx.req.remote_addr.map(|a| a.ip().to_string()).unwrap_or_default()
    }

    /// Subdomain labels, most significant first.
    ///
    /// With the default offset of 2, `tobi.ferrets.example.com` yields
    /// `["ferrets", "tobi"]`.
    pub fn subdomains(&self) -> Vec<&'a str> {
        let hostname = self.hostname();
        let bare = hostname.trim_start_matches('[').trim_end_matches(']');
        if hostname.is_empty() || bare.parse::<IpAddr>().is_ok() {
            return Vec::new();
        }
        hostname.split('.').rev().skip(self.app().subdomain_offset).collect()
    }
}

fn first_value(value: &str) -> &str {
    value.split(',').next().unwrap_or("").trim()
}

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Splits a request URL into `(scheme+authority, path, query)`.
///
/// The fragment, if any, is dropped.
pub(crate) fn split_url(url: &str) -> (&str, &str, Option<&str>) {
    let url = url.split('#').next().unwrap_or("");
    let (prefix, rest) = if is_absolute(url) {
        let after_scheme = url.find("://").map_or(0, |i| i + 3);
        match url[after_scheme..].find(['/', '?']) {
            Some(i) => url.split_at(after_scheme + i),
            None => (url, ""),
        }
    } else {
        ("", url)
    };
    match rest.split_once('?') {
        Some((path, query)) => (prefix, path, Some(query)),
        None => (prefix, rest, None),
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::config::Config;
    use crate::context::tests::{context, context_with};

    fn proxied(headers: &[(&str, &str)]) -> Context {
        let mut builder = http::Request::get("/shop?page=2");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        context_with(Config::default().proxy(true), builder)
    }

    #[test]
    fn split_url_handles_relative_and_absolute_forms() {
        assert_eq!(split_url("/a/b?x=1#top"), ("", "/a/b", Some("x=1")));
        assert_eq!(split_url("/"), ("", "/", None));
        assert_eq!(
            split_url("http://example.com/a?b"),
            ("http://example.com", "/a", Some("b"))
        );
        assert_eq!(split_url("https://example.com"), ("https://example.com", "", None));
    }

    #[test]
    fn path_and_querystring() {
        let ctx = context(Method::GET, "/search?q=rust&page=3");
        let req = ctx.request();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.querystring(), "q=rust&page=3");
        assert_eq!(req.method(), Method::GET);
    }

    #[test]
    fn host_ignores_forwarding_headers_without_proxy() {
        let builder = http::Request::get("/")
            .header("host", "internal:8080")
            .header("x-forwarded-host", "public.example.com")
            .header("x-forwarded-proto", "https");
        let ctx = context_with(Config::default(), builder);
        let req = ctx.request();
        assert_eq!(req.host(), "internal:8080");
        assert_eq!(req.hostname(), "internal");
        assert_eq!(req.protocol(), "http");
        assert!(!req.secure());
    }

    #[test]
    fn host_trusts_forwarding_headers_with_proxy() {
        let ctx = proxied(&[
            ("host", "internal:8080"),
            ("x-forwarded-host", "public.example.com, other.example.com"),
            ("x-forwarded-proto", "https, http"),
        ]);
        let req = ctx.request();
        assert_eq!(req.host(), "public.example.com");
        assert_eq!(req.protocol(), "https");
        assert!(req.secure());
        assert_eq!(req.origin(), "https://public.example.com");
        assert_eq!(req.href(), "https://public.example.com/shop?page=2");
    }

    #[test]
    fn ipv6_hostname_keeps_brackets() {
        let ctx = context_with(Config::default(), http::Request::get("/").header("host", "[::1]:3000"));
        assert_eq!(ctx.request().hostname(), "[::1]");
        assert!(ctx.request().subdomains().is_empty());
    }

    #[test]
    fn missing_host_is_empty() {
        let ctx = context(Method::GET, "/");
        assert_eq!(ctx.request().host(), "");
        assert_eq!(ctx.request().hostname(), "");
        assert!(ctx.request().subdomains().is_empty());
    }

    #[test]
    fn ips_respect_max_count() {
        let builder = http::Request::get("/").header("x-forwarded-for", "1.1.1.1, 2.2.2.2, 3.3.3.3");
        let ctx = context_with(Config::default().proxy(true).max_ips_count(2), builder);
        assert_eq!(ctx.request().ips(), vec!["2.2.2.2", "3.3.3.3"]);
        assert_eq!(ctx.request().ip(), "2.2.2.2");
    }

    #[test]
    fn ip_falls_back_to_peer_address() {
        let mut ctx = context(Method::GET, "/");
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        ctx.req.remote_addr = Some(peer);
        assert!(ctx.request().ips().is_empty());
        assert_eq!(ctx.request().ip(), "10.0.0.9");
    }

    #[test]
    fn subdomains_drop_the_offset() {
        let ctx = context_with(
            Config::default(),
            http::Request::get("/").header("host", "tobi.ferrets.example.com"),
        );
        assert_eq!(ctx.request().subdomains(), vec!["ferrets", "tobi"]);
    }

    #[test]
    fn facets_reach_each_other() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_body("hi");
        let req = ctx.request();
        assert_eq!(req.response().status(), http::StatusCode::OK);
        assert_eq!(req.response().request().url(), "/");
        assert_eq!(req.ctx().original_url(), "/");
    }
}
