//! Various event sinks for different use cases

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tokio::sync::mpsc;

use crate::churn_interface::{ChurnEvent, EventSink, Round};

// ============================================================================
// Logging Sink
// ============================================================================

/// Writes one log line per event through the `log` facade
pub struct LoggingEventSink {
    enabled: bool,
}

impl LoggingEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for LoggingEventSink {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        if !self.enabled {
            return;
        }
        log::info!("{:>5} {}", round, format_event(&event));
    }
}

/// Human readable one-liner with short node ids
pub fn format_event(event: &ChurnEvent) -> String {
    match event {
        ChurnEvent::NodeUp { id } => format!("NodeUp    {}", id.short()),
        ChurnEvent::NodeDown { id } => format!("NodeDown  {}", id.short()),
        ChurnEvent::LinkUp { one, other } => {
            format!("LinkUp    {} <-> {}", one.short(), other.short())
        }
        ChurnEvent::LinkDown { one, other } => {
            format!("LinkDown  {} <-> {}", one.short(), other.short())
        }
    }
}

// ============================================================================
// CSV Event Sink
// ============================================================================

/// CSV event sink for structured data export
pub struct CsvEventSink {
    writer: BufWriter<File>,
}

impl CsvEventSink {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "round,event_type,node,peer")?;

        Ok(Self { writer })
    }
}

impl EventSink for CsvEventSink {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        let result = match event {
            ChurnEvent::NodeUp { id } | ChurnEvent::NodeDown { id } => {
                writeln!(self.writer, "{},{},{},", round, event.kind(), id)
            }
            ChurnEvent::LinkUp { one, other } | ChurnEvent::LinkDown { one, other } => {
                writeln!(self.writer, "{},{},{},{}", round, event.kind(), one, other)
            }
        };

        if let Err(e) = result {
            log::error!("Error writing to CSV: {}", e);
        }
    }
}

impl Drop for CsvEventSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Collector Event Sink (In-Memory)
// ============================================================================

/// Collects events in memory for programmatic analysis
#[derive(Default)]
pub struct CollectorEventSink {
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub round: Round,
    pub event: ChurnEvent,
}

impl CollectorEventSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn node_ups(&self) -> impl Iterator<Item = &EventRecord> {
        self.events
            .iter()
            .filter(|e| matches!(e.event, ChurnEvent::NodeUp { .. }))
    }

    pub fn node_downs(&self) -> impl Iterator<Item = &EventRecord> {
        self.events
            .iter()
            .filter(|e| matches!(e.event, ChurnEvent::NodeDown { .. }))
    }

    pub fn link_ups(&self) -> impl Iterator<Item = &EventRecord> {
        self.events
            .iter()
            .filter(|e| matches!(e.event, ChurnEvent::LinkUp { .. }))
    }

    pub fn link_downs(&self) -> impl Iterator<Item = &EventRecord> {
        self.events
            .iter()
            .filter(|e| matches!(e.event, ChurnEvent::LinkDown { .. }))
    }

    pub fn in_round(&self, round: Round) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().filter(move |e| e.round == round)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for CollectorEventSink {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        self.events.push(EventRecord { round, event });
    }
}

// ============================================================================
// Channel Sink (Event Feed)
// ============================================================================

/// Publishes events on an unbounded tokio channel.
///
/// Sending never blocks the engine. Once the receiver is gone events are
/// dropped.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(Round, ChurnEvent)>,
    closed: bool,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Round, ChurnEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, closed: false }, rx)
    }
}

impl EventSink for ChannelSink {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        if self.tx.send((round, event)).is_err() && !self.closed {
            log::warn!("event feed receiver dropped, discarding further events");
            self.closed = true;
        }
    }
}

// ============================================================================
// Stats Sink
// ============================================================================

/// Running totals, optionally forwarding to another sink
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChurnTotals {
    pub rounds_seen: usize,
    pub node_ups: usize,
    pub node_downs: usize,
    pub link_ups: usize,
    pub link_downs: usize,
}

pub struct StatsSink<S: EventSink> {
    inner: S,
    totals: ChurnTotals,
    last_round: Option<Round>,
}

impl<S: EventSink> StatsSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            totals: ChurnTotals::default(),
            last_round: None,
        }
    }

    pub fn totals(&self) -> &ChurnTotals {
        &self.totals
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn print_summary(&self) {
        let t = &self.totals;
        println!("Event totals ({} active rounds):", t.rounds_seen);
        println!("  Node up:   {}", t.node_ups);
        println!("  Node down: {}", t.node_downs);
        println!("  Link up:   {}", t.link_ups);
        println!("  Link down: {}", t.link_downs);
    }
}

impl<S: EventSink> EventSink for StatsSink<S> {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        if self.last_round != Some(round) {
            self.totals.rounds_seen += 1;
            self.last_round = Some(round);
        }
        match event {
            ChurnEvent::NodeUp { .. } => self.totals.node_ups += 1,
            ChurnEvent::NodeDown { .. } => self.totals.node_downs += 1,
            ChurnEvent::LinkUp { .. } => self.totals.link_ups += 1,
            ChurnEvent::LinkDown { .. } => self.totals.link_downs += 1,
        }
        self.inner.log(round, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::churn_interface::{Link, NodeId, NoOpSink};

    fn link() -> Link {
        Link {
            one: NodeId([1; 32]),
            other: NodeId([2; 32]),
        }
    }

    #[test]
    fn test_collector_queries() {
        let mut sink = CollectorEventSink::new();
        sink.log(0, ChurnEvent::node_up(NodeId([1; 32])));
        sink.log(0, ChurnEvent::link_up(&link()));
        sink.log(1, ChurnEvent::link_down(&link()));

        assert_eq!(sink.node_ups().count(), 1);
        assert_eq!(sink.link_ups().count(), 1);
        assert_eq!(sink.link_downs().count(), 1);
        assert_eq!(sink.node_downs().count(), 0);
        assert_eq!(sink.in_round(0).count(), 2);

        sink.clear();
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_stats_totals() {
        let mut sink = StatsSink::new(NoOpSink);
        sink.log(3, ChurnEvent::node_up(NodeId([1; 32])));
        sink.log(3, ChurnEvent::node_down(NodeId([2; 32])));
        sink.log(5, ChurnEvent::link_up(&link()));

        let totals = sink.totals();
        assert_eq!(totals.rounds_seen, 2);
        assert_eq!(totals.node_ups, 1);
        assert_eq!(totals.node_downs, 1);
        assert_eq!(totals.link_ups, 1);
        assert_eq!(totals.link_downs, 0);
    }

    #[test]
    fn test_stats_forwards() {
        let mut sink = StatsSink::new(CollectorEventSink::new());
        sink.log(0, ChurnEvent::link_up(&link()));
        assert_eq!(sink.inner().events.len(), 1);
    }

    #[test]
    fn test_pair_fans_out() {
        let mut sink = (CollectorEventSink::new(), StatsSink::new(NoOpSink));
        sink.log(1, ChurnEvent::node_up(NodeId([1; 32])));

        assert_eq!(sink.0.events.len(), 1);
        assert_eq!(sink.1.totals().node_ups, 1);
    }

    #[test]
    fn test_channel_delivers_in_order() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.log(0, ChurnEvent::node_up(NodeId([1; 32])));
        sink.log(0, ChurnEvent::link_up(&link()));

        assert_eq!(rx.try_recv().unwrap().1, ChurnEvent::node_up(NodeId([1; 32])));
        assert_eq!(rx.try_recv().unwrap().1, ChurnEvent::link_up(&link()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_survives_dropped_receiver() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.log(0, ChurnEvent::node_up(NodeId([1; 32])));
        sink.log(0, ChurnEvent::node_up(NodeId([2; 32])));
        assert!(sink.closed);
    }

    #[test]
    fn test_csv_rows() {
        let path = std::env::temp_dir().join(format!("overlay_churn_{}.csv", std::process::id()));
        {
            let mut sink = CsvEventSink::new(&path).unwrap();
            sink.log(2, ChurnEvent::node_up(NodeId([0xab; 32])));
            sink.log(2, ChurnEvent::link_down(&link()));
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "round,event_type,node,peer");
        assert!(lines[1].starts_with("2,NodeUp,abab"));
        assert!(lines[1].ends_with(','));
        assert!(lines[2].starts_with("2,LinkDown,0101"));
    }

    #[test]
    fn test_format_event() {
        let text = format_event(&ChurnEvent::link_up(&link()));
        assert_eq!(text, "LinkUp    01010101 <-> 02020202");
    }
}
