// Bandwidth delta engine: cumulative interface counters to Mbps, peaks, totals
// and the bounded global traffic series.
//
// Skipped ticks: the scheduler never calls `ingest` for a failed poll, so the
// stored counters stay untouched and the next successful tick computes a delta
// over the real elapsed interval (each interface remembers when it was sampled).
//
// The global rate is the sum of per-interface rates over running interfaces
// that already had a stored sample. Lifetime counters of a link that just came
// up or was just discovered never enter it.

use crate::client::{Record, field, field_bool, field_u64};
use crate::models::{InterfaceRate, TrafficPoint, TrafficSample, TrafficTotals};
use crate::ring::BoundedHistory;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cumulative counters for one interface in one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_drops: u64,
    pub tx_drops: u64,
    /// Running and not disabled.
    pub running: bool,
}

impl InterfaceCounters {
    pub fn from_record(r: &Record) -> Self {
        Self {
            name: field(r, "name").to_string(),
            rx_bytes: field_u64(r, "rx-byte"),
            tx_bytes: field_u64(r, "tx-byte"),
            rx_packets: field_u64(r, "rx-packet"),
            tx_packets: field_u64(r, "tx-packet"),
            rx_errors: field_u64(r, "rx-error"),
            tx_errors: field_u64(r, "tx-error"),
            rx_drops: field_u64(r, "rx-drop"),
            tx_drops: field_u64(r, "tx-drop"),
            running: field_bool(r, "running") && !field_bool(r, "disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CounterSample {
    rx_bytes: u64,
    tx_bytes: u64,
    at: Instant,
}

/// Megabits per second between two cumulative byte counters.
/// A counter that went backwards (reboot, wrap) reads as zero, never negative.
pub fn mbps(previous: u64, current: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let delta = current.saturating_sub(previous);
    delta as f64 * 8.0 / 1_000_000.0 / secs
}

pub struct BandwidthEngine {
    interfaces: HashMap<String, CounterSample>,
    primed: bool,
    series: BoundedHistory<TrafficPoint>,
    peak_rx_mbps: f64,
    peak_tx_mbps: f64,
    tick: u64,
}

impl BandwidthEngine {
    pub fn new(series_capacity: usize) -> Self {
        Self {
            interfaces: HashMap::new(),
            primed: false,
            series: BoundedHistory::new(series_capacity),
            peak_rx_mbps: 0.0,
            peak_tx_mbps: 0.0,
            tick: 0,
        }
    }

    pub fn peaks(&self) -> (f64, f64) {
        (self.peak_rx_mbps, self.peak_tx_mbps)
    }

    pub fn series(&self) -> Vec<TrafficPoint> {
        self.series.to_vec()
    }

    /// Whether a counter pair is stored for `name` (primed or later).
    pub fn is_primed(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Fold one successful poll into the engine.
    ///
    /// Returns `None` on the very first poll: counters are only primed and no
    /// rate (not even zero) is emitted. Interfaces seen for the
    /// first time are primed and left out of the per-interface rates.
    pub fn ingest(
        &mut self,
        counters: &[InterfaceCounters],
        is_wan: impl Fn(&str) -> bool,
        at: Instant,
        timestamp: u64,
    ) -> Option<TrafficSample> {
        let mut rates = Vec::with_capacity(counters.len());
        let mut totals = TrafficTotals::default();
        let (mut rx_mbps, mut tx_mbps) = (0.0, 0.0);
        let (mut wan_rx, mut wan_tx) = (0.0, 0.0);

        for c in counters {
            let current = CounterSample {
                rx_bytes: c.rx_bytes,
                tx_bytes: c.tx_bytes,
                at,
            };
            if let Some(prev) = self.interfaces.insert(c.name.clone(), current) {
                let elapsed = at.saturating_duration_since(prev.at);
                let rate = InterfaceRate {
                    name: c.name.clone(),
                    rx_mbps: mbps(prev.rx_bytes, c.rx_bytes, elapsed),
                    tx_mbps: mbps(prev.tx_bytes, c.tx_bytes, elapsed),
                    running: c.running,
                };
                if c.running {
                    rx_mbps += rate.rx_mbps;
                    tx_mbps += rate.tx_mbps;
                }
                if is_wan(&c.name) {
                    wan_rx += rate.rx_mbps;
                    wan_tx += rate.tx_mbps;
                }
                rates.push(rate);
            }

            if c.running {
                totals.rx_packets += c.rx_packets;
                totals.tx_packets += c.tx_packets;
                totals.rx_errors += c.rx_errors;
                totals.tx_errors += c.tx_errors;
                totals.rx_drops += c.rx_drops;
                totals.tx_drops += c.tx_drops;
            }
        }

        if !std::mem::replace(&mut self.primed, true) {
            return None;
        }

        if rx_mbps > self.peak_rx_mbps {
            self.peak_rx_mbps = rx_mbps;
        }
        if tx_mbps > self.peak_tx_mbps {
            self.peak_tx_mbps = tx_mbps;
        }
        self.tick += 1;
        self.series.push_back(TrafficPoint {
            tick: self.tick,
            rx_mbps,
            tx_mbps,
        });

        Some(TrafficSample {
            timestamp,
            rx_mbps,
            tx_mbps,
            peak_rx_mbps: self.peak_rx_mbps,
            peak_tx_mbps: self.peak_tx_mbps,
            wan_rx_mbps: wan_rx,
            wan_tx_mbps: wan_tx,
            interfaces: rates,
            totals,
            history: self.series.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    fn iface(name: &str, rx: u64, tx: u64, running: bool) -> InterfaceCounters {
        InterfaceCounters {
            name: name.into(),
            rx_bytes: rx,
            tx_bytes: tx,
            rx_packets: 10,
            tx_packets: 20,
            rx_errors: 1,
            tx_errors: 2,
            rx_drops: 3,
            tx_drops: 4,
            running,
        }
    }

    fn no_wan(_: &str) -> bool {
        false
    }

    #[test]
    fn mbps_uses_bits_over_elapsed_seconds() {
        assert_eq!(mbps(0, 1_000_000, SEC), 8.0);
        assert_eq!(mbps(0, 1_000_000, Duration::from_secs(2)), 4.0);
        assert_eq!(mbps(5_000, 1_000, SEC), 0.0);
        assert_eq!(mbps(0, 1_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn first_poll_only_primes() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        assert!(e.ingest(&[iface("ether1", 100, 100, true)], no_wan, t0, 0).is_none());
        assert!(e.is_primed("ether1"));
        assert!(e.series().is_empty());
        assert_eq!(e.peaks(), (0.0, 0.0));
    }

    #[test]
    fn second_poll_emits_rates_and_new_interfaces_are_primed_only() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        e.ingest(&[iface("ether1", 0, 0, true)], no_wan, t0, 0);
        let s = e
            .ingest(
                &[
                    iface("ether1", 125_000, 250_000, true),
                    iface("ether2", 9_999, 9_999, true),
                ],
                |n| n == "ether1",
                t0 + SEC,
                1,
            )
            .unwrap();
        assert_eq!(s.interfaces.len(), 1);
        assert_eq!(s.interfaces[0].rx_mbps, 1.0);
        assert_eq!(s.interfaces[0].tx_mbps, 2.0);
        assert_eq!(s.wan_rx_mbps, 1.0);
        assert_eq!(s.wan_tx_mbps, 2.0);
        assert!(e.is_primed("ether2"));
    }

    #[test]
    fn counter_reset_never_goes_negative() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        e.ingest(&[iface("ether1", 10_000_000, 10_000_000, true)], no_wan, t0, 0);
        let s = e
            .ingest(&[iface("ether1", 5, 5, true)], no_wan, t0 + SEC, 1)
            .unwrap();
        assert_eq!(s.rx_mbps, 0.0);
        assert_eq!(s.tx_mbps, 0.0);
        assert!(s.interfaces.iter().all(|r| r.rx_mbps >= 0.0 && r.tx_mbps >= 0.0));
    }

    #[test]
    fn peaks_are_non_decreasing() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        let counters = [0u64, 1_000_000, 1_100_000, 500, 4_000_000, 4_000_100];
        let mut last_peak = (0.0, 0.0);
        for (i, c) in counters.iter().enumerate() {
            let at = t0 + SEC * i as u32;
            if let Some(s) = e.ingest(&[iface("ether1", *c, *c, true)], no_wan, at, i as u64) {
                assert!(s.peak_rx_mbps >= last_peak.0);
                assert!(s.peak_tx_mbps >= last_peak.1);
                last_peak = (s.peak_rx_mbps, s.peak_tx_mbps);
            }
        }
        assert!((last_peak.0 - 31.996).abs() < 1e-9);
    }

    #[test]
    fn totals_only_count_running_interfaces() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        let polls = [iface("ether1", 0, 0, true), iface("ether2", 0, 0, false)];
        e.ingest(&polls, no_wan, t0, 0);
        let s = e.ingest(&polls, no_wan, t0 + SEC, 1).unwrap();
        assert_eq!(s.totals.rx_packets, 10);
        assert_eq!(s.totals.tx_drops, 4);
    }

    #[test]
    fn link_coming_up_does_not_spike_the_global_rate() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        let lifetime = 10_000_000_000;
        e.ingest(
            &[iface("ether1", 0, 0, true), iface("ether2", lifetime, lifetime, false)],
            no_wan,
            t0,
            0,
        );
        let s = e
            .ingest(
                &[
                    iface("ether1", 125_000, 0, true),
                    iface("ether2", lifetime + 125_000, lifetime, true),
                ],
                no_wan,
                t0 + SEC,
                1,
            )
            .unwrap();
        assert_eq!(s.rx_mbps, 2.0);
        assert_eq!(s.tx_mbps, 0.0);
        assert_eq!(e.peaks(), (2.0, 0.0));
    }

    #[test]
    fn newly_seen_running_interface_stays_out_of_the_global_rate() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        e.ingest(&[iface("ether1", 0, 0, true)], no_wan, t0, 0);
        let s = e
            .ingest(
                &[
                    iface("ether1", 125_000, 125_000, true),
                    iface("vlan9", 5_000_000_000, 5_000_000_000, true),
                ],
                no_wan,
                t0 + SEC,
                1,
            )
            .unwrap();
        assert_eq!(s.rx_mbps, 1.0);
        assert_eq!(s.tx_mbps, 1.0);
        assert_eq!(e.peaks(), (1.0, 1.0));

        let s = e
            .ingest(
                &[
                    iface("ether1", 250_000, 250_000, true),
                    iface("vlan9", 5_000_125_000, 5_000_000_000, true),
                ],
                no_wan,
                t0 + SEC * 2,
                2,
            )
            .unwrap();
        assert_eq!(s.rx_mbps, 2.0);
        assert_eq!(s.tx_mbps, 1.0);
    }

    #[test]
    fn link_going_down_keeps_traffic_on_the_remaining_links() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        e.ingest(
            &[iface("ether1", 0, 0, true), iface("ether2", 9_000_000, 9_000_000, true)],
            no_wan,
            t0,
            0,
        );
        let s = e
            .ingest(
                &[
                    iface("ether1", 125_000, 250_000, true),
                    iface("ether2", 9_000_000, 9_000_000, false),
                ],
                no_wan,
                t0 + SEC,
                1,
            )
            .unwrap();
        assert_eq!(s.rx_mbps, 1.0);
        assert_eq!(s.tx_mbps, 2.0);
        assert_eq!(s.interfaces.len(), 2);
    }

    #[test]
    fn series_evicts_exactly_at_capacity() {
        let mut e = BandwidthEngine::new(3);
        let t0 = Instant::now();
        for i in 0..4u32 {
            e.ingest(&[iface("ether1", u64::from(i), 0, true)], no_wan, t0 + SEC * i, 0);
        }
        // Three emitted points, capacity three: nothing evicted yet.
        assert_eq!(e.series().len(), 3);
        assert_eq!(e.series()[0].tick, 1);
        e.ingest(&[iface("ether1", 10, 0, true)], no_wan, t0 + SEC * 4, 0);
        let series = e.series();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].tick, 2);
        assert_eq!(series[2].tick, 4);
    }

    #[test]
    fn longer_gap_divides_by_real_interval() {
        let mut e = BandwidthEngine::new(10);
        let t0 = Instant::now();
        e.ingest(&[iface("ether1", 0, 0, true)], no_wan, t0, 0);
        let s = e
            .ingest(&[iface("ether1", 1_000_000, 0, true)], no_wan, t0 + SEC * 4, 1)
            .unwrap();
        assert_eq!(s.rx_mbps, 2.0);
    }
}
