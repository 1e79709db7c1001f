use super::classify::{ProbeReason, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    /// Index into the configured proxy list.
    Proxy(usize),
}

/// One step of the ladder: a route and an index into the identity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub route: Route,
    pub identity: usize,
}

/// Every identity directly, then every identity through each proxy in order.
pub fn attempt_plan(identities: usize, proxies: usize) -> Vec<Attempt> {
    std::iter::once(Route::Direct)
        .chain((0..proxies).map(Route::Proxy))
        .flat_map(|route| (0..identities).map(move |identity| Attempt { route, identity }))
        .collect()
}

/// Walks an attempt plan, tracking the last failure and abandoned proxies.
#[derive(Debug)]
pub struct Ladder {
    plan: std::vec::IntoIter<Attempt>,
    abandoned: Option<Route>,
    last_reason: Option<ProbeReason>,
}

impl Ladder {
    pub fn new(plan: Vec<Attempt>) -> Self {
        Self {
            plan: plan.into_iter(),
            abandoned: None,
            last_reason: None,
        }
    }

    pub fn next_attempt(&mut self) -> Option<Attempt> {
        let abandoned = self.abandoned;
        self.plan
            .by_ref()
            .find(|attempt| Some(attempt.route) != abandoned)
    }

    /// Returns the reason when the verdict ends the ladder.
    pub fn record(&mut self, attempt: Attempt, verdict: Verdict) -> Option<ProbeReason> {
        match verdict {
            Verdict::Alive(reason) => Some(reason),
            Verdict::Failed(reason) => {
                self.last_reason = Some(reason);
                None
            }
            Verdict::Retry => None,
            Verdict::RouteDown(reason) => {
                self.abandoned = Some(attempt.route);
                self.last_reason = Some(reason);
                None
            }
        }
    }

    pub fn into_reason(self) -> ProbeReason {
        self.last_reason
            .unwrap_or(ProbeReason::AllIdentitiesFailed)
    }
}
