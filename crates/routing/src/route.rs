//! Route - recursive drop / match / fan-out node

use std::collections::BTreeSet;
use std::sync::Arc;

use contracts::{KubeEvent, ReceiverRegistry, RouteConfig};
use tracing::trace;

use crate::error::RoutingError;
use crate::rule::Rule;

/// Node of the routing tree
///
/// Evaluation order per node:
/// 1. any matching drop rule stops the event here (children included)
/// 2. every matching match rule with a receiver dispatches to it
/// 3. children are visited only if all match rules matched
#[derive(Debug, Default)]
pub struct Route {
    drop: Vec<Rule>,
    matchers: Vec<Rule>,
    routes: Vec<Route>,
}

impl Route {
    /// Build a node from already compiled parts
    pub fn new(drop: Vec<Rule>, matchers: Vec<Rule>, routes: Vec<Route>) -> Self {
        Self {
            drop,
            matchers,
            routes,
        }
    }

    /// Compile a route tree, failing on the first invalid pattern
    pub fn compile(config: &RouteConfig) -> Result<Self, RoutingError> {
        let drop = config
            .drop
            .iter()
            .map(Rule::compile)
            .collect::<Result<_, _>>()?;
        let matchers = config
            .matchers
            .iter()
            .map(Rule::compile)
            .collect::<Result<_, _>>()?;
        let routes = config
            .routes
            .iter()
            .map(Route::compile)
            .collect::<Result<_, _>>()?;

        Ok(Self::new(drop, matchers, routes))
    }

    /// Route `event` through this subtree, depth-first, left to right
    pub fn process<R>(&self, event: &Arc<KubeEvent>, registry: &R)
    where
        R: ReceiverRegistry + ?Sized,
    {
        if self.drop.iter().any(|rule| rule.matches(event)) {
            trace!(uid = %event.uid(), "Event dropped by rule");
            return;
        }

        let mut matches_all = true;
        for rule in &self.matchers {
            if !rule.matches(event) {
                matches_all = false;
                continue;
            }
            if let Some(receiver) = rule.receiver() {
                registry.send_event(receiver, event);
            }
        }

        if matches_all {
            for route in &self.routes {
                route.process(event, registry);
            }
        }
    }

    /// Every receiver name referenced anywhere in this subtree
    pub fn receivers(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_receivers(&mut names);
        names
    }

    fn collect_receivers<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        names.extend(self.matchers.iter().filter_map(Rule::receiver));
        for route in &self.routes {
            route.collect_receivers(names);
        }
    }

    /// Depth of the deepest leaf (a lone node has depth 1)
    pub fn depth(&self) -> usize {
        1 + self.routes.iter().map(Route::depth).max().unwrap_or(0)
    }
}
