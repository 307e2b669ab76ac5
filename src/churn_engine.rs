//! Churn Engine
//!
//! Owns the on/off node partition and the link pool, and applies one round of
//! randomized transitions per call to [`ChurnEngine::step`]. Every transition
//! is published to the engine's [`EventSink`] as it happens.
//!
//! # Round Order
//! 1. Plan counts from the rates and targets in [`MockerConfig`]
//! 2. Switch off random on nodes
//! 3. Switch on random off nodes (each one must get a connection attempt)
//! 4. Bring up links, reusing pooled links before creating new ones
//! 5. Take down random active links (they stay in the pool)

use hashbrown::{HashMap, HashSet};
use indexmap::IndexSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::churn_config::{ConfigError, MockerConfig};
use crate::churn_interface::{ChurnEvent, EventSink, Link, LinkKey, NodeId, Round};

/// Upper bound on link attempts per requested link in one round.
///
/// Attempts that find no destination (or pick a source already targeted this
/// round) count against it, so a saturated graph ends the round early.
pub const LINK_ATTEMPTS_PER_CONN: usize = 4;

// ============================================================================
// Round Planning
// ============================================================================

/// Transition counts requested for one round, before capping by availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickPlan {
    pub nodes_up: usize,
    pub nodes_down: usize,
    pub conns_up: usize,
    pub conns_down: usize,
}

/// Compute the round's transition counts from current population sizes
pub fn plan_tick(
    config: &MockerConfig,
    on_nodes: usize,
    off_nodes: usize,
    active_links: usize,
) -> TickPlan {
    let mut nodes_up = off_nodes / config.switchon_rate;
    let missing = config.nodes_target.saturating_sub(on_nodes);
    if missing > 0 && nodes_up < missing {
        // close a fraction of the gap each round instead of jumping to the target
        nodes_up += (missing - nodes_up) / config.convergence_rate + 1;
    }

    let nodes_down = on_nodes / config.dropout_rate;

    // rates come straight from config files, so products saturate
    let mut conns_up = on_nodes.saturating_mul(config.new_conn_count);
    conns_up -= conns_up / config.conn_fail_rate;
    let missing = config.edge_target().saturating_sub(active_links);
    if missing < conns_up {
        conns_up = missing;
    }

    let conns_down = active_links / config.disconn_rate;

    TickPlan {
        nodes_up,
        nodes_down,
        conns_up,
        conns_down,
    }
}

/// Outcome of a single round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub round: Round,
    pub plan: TickPlan,
    pub nodes_activated: usize,
    pub nodes_deactivated: usize,
    pub links_activated: usize,
    pub links_deactivated: usize,
    /// Links instantiated for the first time (subset of `links_activated`)
    pub links_created: usize,
    /// Link attempts that produced nothing
    pub stalled_attempts: usize,
}

impl TickReport {
    pub fn event_count(&self) -> usize {
        self.nodes_activated + self.nodes_deactivated + self.links_activated + self.links_deactivated
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct ChurnEngine<S: EventSink> {
    config: MockerConfig,
    rng: StdRng,
    sink: S,
    round: Round,

    // node partition, order only matters for random indexing
    on_nodes: IndexSet<NodeId>,
    off_nodes: IndexSet<NodeId>,

    // every link ever created, and the subset currently up
    links: HashMap<LinkKey, Link>,
    on_links: IndexSet<LinkKey>,
}

impl<S: EventSink> ChurnEngine<S> {
    /// Create an engine with all `seed_ids` switched off
    ///
    /// The RNG is seeded from `config.seed`, or from entropy when unset.
    pub fn new<I>(config: MockerConfig, seed_ids: I, sink: S) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let rng = StdRng::from_seed(config.resolve_seed());
        Self::with_rng(config, seed_ids, sink, rng)
    }

    pub fn with_rng<I>(
        config: MockerConfig,
        seed_ids: I,
        sink: S,
        rng: StdRng,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = NodeId>,
    {
        config.validate()?;

        let off_nodes: IndexSet<NodeId> = seed_ids.into_iter().collect();
        log::info!(
            "mocker {}: {} seed nodes, target {} nodes / degree {}, tick {}ms",
            config.id,
            off_nodes.len(),
            config.nodes_target,
            config.degree_target,
            config.update_interval
        );

        Ok(Self {
            config,
            rng,
            sink,
            round: 0,
            on_nodes: IndexSet::new(),
            off_nodes,
            links: HashMap::new(),
            on_links: IndexSet::new(),
        })
    }

    /// Introduce a new identity, switched off. Returns false if already known.
    pub fn add_node(&mut self, id: NodeId) -> bool {
        if self.on_nodes.contains(&id) {
            return false;
        }
        self.off_nodes.insert(id)
    }

    /// Run one round of churn
    pub fn step(&mut self) -> TickReport {
        let c = &self.config;
        log::trace!(
            "mocker {} rates: {}/{}, {} ({}/{})",
            c.id,
            c.switchon_rate,
            c.dropout_rate,
            c.new_conn_count,
            c.conn_fail_rate,
            c.disconn_rate
        );

        let plan = plan_tick(
            &self.config,
            self.on_nodes.len(),
            self.off_nodes.len(),
            self.on_links.len(),
        );
        log::debug!(
            "round {} nodes up: {}, down: {} [on: {}/{}] conns up: {}, down: {} [on: {}/{}({})]",
            self.round,
            plan.nodes_up,
            plan.nodes_down,
            self.on_nodes.len(),
            self.on_nodes.len() + self.off_nodes.len(),
            plan.conns_up,
            plan.conns_down,
            self.on_links.len(),
            self.links.len() - self.on_links.len(),
            self.links.len()
        );

        let mut report = TickReport {
            round: self.round,
            plan,
            ..TickReport::default()
        };

        self.switch_off_nodes(plan.nodes_down, &mut report);
        let must_connect = self.switch_on_nodes(plan.nodes_up, &mut report);
        self.bring_up_links(plan.conns_up, &must_connect, &mut report);
        self.take_down_links(plan.conns_down, &mut report);

        self.round += 1;
        report
    }

    /// Run `rounds` steps back to back, without a timer
    pub fn run_rounds(&mut self, rounds: usize) -> Vec<TickReport> {
        (0..rounds).map(|_| self.step()).collect()
    }

    fn emit(&mut self, event: ChurnEvent) {
        self.sink.log(self.round, event);
    }

    fn switch_off_nodes(&mut self, count: usize, report: &mut TickReport) {
        for _ in 0..count {
            if self.on_nodes.is_empty() {
                break;
            }
            let c = self.rng.gen_range(0..self.on_nodes.len());
            let Some(id) = self.on_nodes.swap_remove_index(c) else {
                break;
            };
            self.emit(ChurnEvent::node_down(id));
            self.off_nodes.insert(id);
            report.nodes_deactivated += 1;
        }
    }

    /// Returns the on-node indices of the nodes switched on this round
    fn switch_on_nodes(&mut self, count: usize, report: &mut TickReport) -> Vec<usize> {
        let mut must_connect = Vec::new();
        for _ in 0..count {
            if self.off_nodes.is_empty() {
                break;
            }
            let c = self.rng.gen_range(0..self.off_nodes.len());
            let Some(id) = self.off_nodes.swap_remove_index(c) else {
                break;
            };
            self.emit(ChurnEvent::node_up(id));
            let (index, _) = self.on_nodes.insert_full(id);
            must_connect.push(index);
            report.nodes_activated += 1;
        }
        must_connect
    }

    fn bring_up_links(&mut self, count: usize, must_connect: &[usize], report: &mut TickReport) {
        if self.on_nodes.len() < 2 {
            return;
        }

        let count = count.max(must_connect.len());
        let budget = count.saturating_mul(LINK_ATTEMPTS_PER_CONN);
        let mut targeted: HashSet<usize> = HashSet::new();
        let mut pending = must_connect.iter();
        let mut made = 0;
        let mut attempts = 0;

        while made < count && attempts < budget {
            attempts += 1;

            let n = match pending.next() {
                Some(&n) => n,
                None => {
                    let n = self.rng.gen_range(0..self.on_nodes.len());
                    if targeted.contains(&n) {
                        report.stalled_attempts += 1;
                        continue;
                    }
                    n
                }
            };

            match self.pick_link(n, &mut targeted, report) {
                Some(key) => {
                    self.on_links.insert(key);
                    let link = self.links[&key];
                    self.emit(ChurnEvent::link_up(&link));
                    report.links_activated += 1;
                    made += 1;
                }
                None => {
                    log::trace!(
                        "round {}: no free partner for node {}",
                        self.round,
                        self.on_nodes[n].short()
                    );
                    report.stalled_attempts += 1;
                }
            }
        }
    }

    /// Find an inactive link from on node `n`, creating it in the pool if new.
    ///
    /// Scans from a random offset at or after `n` and wraps around, so the
    /// first candidate after the offset wins.
    fn pick_link(
        &mut self,
        n: usize,
        targeted: &mut HashSet<usize>,
        report: &mut TickReport,
    ) -> Option<LinkKey> {
        let len = self.on_nodes.len();
        let m = n + self.rng.gen_range(0..len - n);
        let source = self.on_nodes[n];

        for k in (m..len).chain(0..m) {
            if k == n {
                continue;
            }
            let dest = self.on_nodes[k];
            let key = LinkKey::new(source, dest);
            if self.on_links.contains(&key) {
                continue;
            }

            targeted.insert(k);
            if !self.links.contains_key(&key) {
                self.links.insert(
                    key,
                    Link {
                        one: source,
                        other: dest,
                    },
                );
                report.links_created += 1;
            }
            return Some(key);
        }
        None
    }

    fn take_down_links(&mut self, count: usize, report: &mut TickReport) {
        for _ in 0..count {
            if self.on_links.is_empty() {
                break;
            }
            let c = self.rng.gen_range(0..self.on_links.len());
            let Some(key) = self.on_links.swap_remove_index(c) else {
                break;
            };
            let link = self.links[&key];
            self.emit(ChurnEvent::link_down(&link));
            report.links_deactivated += 1;
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Rounds completed so far
    pub fn round(&self) -> Round {
        self.round
    }

    pub fn config(&self) -> &MockerConfig {
        &self.config
    }

    pub fn on_nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.on_nodes.iter()
    }

    pub fn off_nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.off_nodes.iter()
    }

    pub fn on_count(&self) -> usize {
        self.on_nodes.len()
    }

    pub fn off_count(&self) -> usize {
        self.off_nodes.len()
    }

    pub fn is_on(&self, id: &NodeId) -> bool {
        self.on_nodes.contains(id)
    }

    pub fn active_link_count(&self) -> usize {
        self.on_links.len()
    }

    /// Number of links ever created
    pub fn link_pool_len(&self) -> usize {
        self.links.len()
    }

    pub fn is_link_active(&self, a: NodeId, b: NodeId) -> bool {
        self.on_links.contains(&LinkKey::new(a, b))
    }

    /// All pooled links with their current state
    pub fn links(&self) -> impl Iterator<Item = (&Link, bool)> {
        self.links
            .iter()
            .map(|(key, link)| (link, self.on_links.contains(key)))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
