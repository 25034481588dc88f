//! Edge routing: middleware definitions and the ingress route, composed per
//! environment.
//!
//! Rules are emitted root first. The edge controller ranks rules by path
//! specificity, so `/metrics` still wins over `/` for metrics requests.

mod crd;

pub use self::crd::{
    IngressRoute, IngressRouteSpec, Middleware, MiddlewareRef, MiddlewareSpec, RateLimit,
    RedirectScheme, Route, RouteTls, ServiceRef,
};
use crate::{
    identity::Identity,
    policy::{EntryPoint, EnvironmentPolicy, RateLimitPolicy, RedirectPolicy},
    service::ServiceEndpoint,
    topology::Topology,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MiddlewareKind {
    RateLimit(RateLimitPolicy),
    SchemeRedirect(RedirectPolicy),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MiddlewareDef {
    pub name: String,
    pub kind: MiddlewareKind,
}

impl MiddlewareDef {
    #[must_use]
    pub fn to_manifest(&self, identity: &Identity) -> Middleware {
        let spec = match &self.kind {
            MiddlewareKind::RateLimit(RateLimitPolicy { average, burst }) => MiddlewareSpec {
                rate_limit: Some(RateLimit { average: *average, burst: *burst }),
                ..MiddlewareSpec::default()
            },
            MiddlewareKind::SchemeRedirect(RedirectPolicy { scheme, permanent }) => {
                MiddlewareSpec {
                    redirect_scheme: Some(RedirectScheme {
                        scheme: scheme.clone(),
                        permanent: *permanent,
                    }),
                    ..MiddlewareSpec::default()
                }
            }
        };
        Middleware { metadata: identity.object_meta(self.name.clone()), spec }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteRule {
    pub host: String,
    pub path_prefix: String,
    /// Middleware names in request-processing order.
    pub chain: Vec<String>,
    pub target_service: String,
    pub target_port: String,
}

impl RouteRule {
    #[must_use]
    pub fn match_expression(&self) -> String {
        format!("Host(`{}`) && PathPrefix(`{}`)", self.host, self.path_prefix)
    }

    fn to_route(&self) -> Route {
        Route {
            match_: self.match_expression(),
            kind: "Rule".to_string(),
            middlewares: self.chain.iter().map(|name| MiddlewareRef { name: name.clone() }).collect(),
            services: vec![ServiceRef {
                name: self.target_service.clone(),
                port: self.target_port.clone(),
            }],
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeRoute {
    pub name: String,
    pub entry_points: Vec<EntryPoint>,
    pub tls: bool,
    pub rules: Vec<RouteRule>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgePlan {
    identity: Identity,
    middlewares: Vec<MiddlewareDef>,
    route: EdgeRoute,
}

impl EdgePlan {
    #[must_use]
    pub fn compose(
        identity: &Identity,
        topology: &Topology,
        policy: &EnvironmentPolicy,
        service: &ServiceEndpoint,
    ) -> Self {
        let rate_limit = MiddlewareDef {
            name: policy.rate_limit_name.resolve(identity),
            kind: MiddlewareKind::RateLimit(policy.rate_limit),
        };
        let redirect = policy.redirect.as_ref().map(|redirect| MiddlewareDef {
            name: redirect_name(&topology.host, identity, redirect),
            kind: MiddlewareKind::SchemeRedirect(redirect.clone()),
        });

        let rules = topology
            .routes
            .iter()
            .map(|target| {
                // Only the catch-all rule redirects; more specific paths are rate limited only.
                let chain = redirect
                    .iter()
                    .filter(|_| target.path_prefix == "/")
                    .chain(std::iter::once(&rate_limit))
                    .map(|middleware| middleware.name.clone())
                    .collect();
                RouteRule {
                    host: topology.host.clone(),
                    path_prefix: target.path_prefix.clone(),
                    chain,
                    target_service: service.name().to_string(),
                    target_port: target.port.clone(),
                }
            })
            .collect();

        let route = EdgeRoute {
            name: identity.name().to_string(),
            entry_points: policy.entry_points.clone(),
            tls: policy.tls,
            rules,
        };
        tracing::debug!(
            "Edge policy {} uses entry points [{}]",
            policy.variant,
            route.entry_points.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );

        let middlewares = redirect.into_iter().chain(std::iter::once(rate_limit)).collect();
        Self { identity: identity.clone(), middlewares, route }
    }

    #[must_use]
    pub fn namespace(&self) -> &str { self.identity.namespace() }

    #[must_use]
    pub fn middlewares(&self) -> &[MiddlewareDef] { &self.middlewares }

    #[must_use]
    pub const fn route(&self) -> &EdgeRoute { &self.route }

    #[must_use]
    pub fn route_manifest(&self) -> IngressRoute {
        let spec = IngressRouteSpec {
            entry_points: self.route.entry_points.iter().map(ToString::to_string).collect(),
            routes: self.route.rules.iter().map(RouteRule::to_route).collect(),
            tls: self.route.tls.then(RouteTls::default),
        };
        IngressRoute { metadata: self.identity.object_meta(self.route.name.clone()), spec }
    }

    /// The rule the edge controller would pick for a request: it must arrive
    /// on one of the route's entry points, match the host exactly, and the
    /// longest matching path prefix wins.
    #[must_use]
    pub fn matching_rule(&self, entry_point: EntryPoint, host: &str, path: &str) -> Option<&RouteRule> {
        if !self.route.entry_points.contains(&entry_point) {
            return None;
        }
        self.route
            .rules
            .iter()
            .filter(|rule| rule.host == host && path.starts_with(&rule.path_prefix))
            .max_by_key(|rule| rule.path_prefix.len())
    }
}

fn redirect_name(host: &str, identity: &Identity, redirect: &RedirectPolicy) -> String {
    let label = host.split('.').next().filter(|label| !label.is_empty()).unwrap_or(identity.name());
    format!("{label}-http-to-{}", redirect.scheme)
}
