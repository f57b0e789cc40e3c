//! Prometheus text exposition
//!
//! Every scrape renders the samples of a fresh poll into a throwaway
//! [`prometheus::Registry`], so nothing from an earlier poll can leak into the
//! output: a host that disappeared is simply absent from the next scrape.
//!
//! Each series is written at most once. When two objects produce the same family
//! and label values (two datastores named `datastore1` under the flat strategy,
//! for instance) the first sample is kept and the rest are logged and dropped.

use crate::collectors::PollReport;
use crate::metrics::{Sample, NAMESPACE};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Render a poll plus the `vsphere_up` gauge in Prometheus text format
pub fn render(report: &PollReport) -> anyhow::Result<String> {
    render_samples(&report.samples)
}

pub fn render_samples(samples: &[Sample]) -> anyhow::Result<String> {
    let registry = Registry::new();

    let up = Gauge::with_opts(
        Opts::new("up", "Was the last scrape of vCenter metrics successful").namespace(NAMESPACE),
    )?;
    up.set(1.0);
    registry.register(Box::new(up))?;

    let mut families: HashMap<String, GaugeVec> = HashMap::new();
    let mut seen: HashSet<(&str, &[String])> = HashSet::new();
    for sample in samples {
        if !seen.insert((sample.name(), sample.label_values())) {
            warn!(
                "Dropping duplicate sample of {} with labels {:?}",
                sample.name(),
                sample.label_values()
            );
            continue;
        }

        if !families.contains_key(sample.name()) {
            let desc = sample.desc();
            let label_names: Vec<&str> = desc.label_names.iter().map(String::as_str).collect();
            let family = GaugeVec::new(
                Opts::new(desc.name.clone(), desc.help.clone()),
                &label_names,
            )?;
            registry.register(Box::new(family.clone()))?;
            families.insert(desc.name.clone(), family);
        }

        let family = &families[sample.name()];
        let label_values: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();
        match family.get_metric_with_label_values(&label_values) {
            Ok(gauge) => gauge.set(sample.value()),
            Err(e) => warn!("Dropping sample of {}: {}", sample.name(), e),
        }
    }

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
