//! Free capacity of this cell derived from compute node telemetry.
//!
//! For every workload-size template the calculator counts how many workloads
//! of that size still fit on each eligible host, and sums the counts across
//! hosts. Counts are keyed by the size in MB, so templates sharing a size
//! share a bucket:
//!
//! ```text
//! ram_free.units_by_mb  = { "<memory_mb>": <units>, ... }
//! disk_free.units_by_mb = { "<(root_gb + ephemeral_gb) * 1024>": <units>, ... }
//! ```
//!
//! Directory figures are unvalidated, so all arithmetic saturates at the
//! `i64` bounds.

use std::collections::BTreeMap;

use api_types::Capacities;
use api_types::ComputeNodeRecord;
use api_types::InstanceTypeRecord;
use api_types::ResourceCapacity;
use api_types::DISK_FREE;
use api_types::RAM_FREE;

const MB_PER_GB: i64 = 1024;

/// Free resources of one eligible compute host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTelemetry {
    pub host: String,
    pub free_ram_mb: i64,
    pub free_disk_mb: i64,
}

/// Select hosts whose compute service is registered and enabled.
///
/// Hosts are keyed by service host name; a later node reporting the same host
/// replaces the earlier one.
pub fn eligible_hosts(compute_nodes: &[ComputeNodeRecord]) -> Vec<HostTelemetry> {
    let mut hosts = BTreeMap::new();
    for node in compute_nodes {
        let Some(service) = &node.service else {
            continue;
        };
        if service.disabled {
            continue;
        }
        hosts.insert(
            service.host.clone(),
            HostTelemetry {
                host: service.host.clone(),
                free_ram_mb: node.free_ram_mb,
                free_disk_mb: gb_to_mb(node.free_disk_gb),
            },
        );
    }
    hosts.into_values().collect()
}

fn gb_to_mb(gb: i64) -> i64 {
    gb.saturating_mul(MB_PER_GB)
}

/// Number of workloads of `per_unit` MB fitting into `free` MB, never negative
fn free_units(free: i64, per_unit: i64) -> u64 {
    if per_unit > 0 {
        u64::try_from(free / per_unit).unwrap_or(0)
    } else {
        0
    }
}

/// Compute `ram_free` and `disk_free` for the given hosts and templates.
///
/// Without eligible hosts the result is empty.
pub fn compute_capacities(hosts: &[HostTelemetry], templates: &[InstanceTypeRecord]) -> Capacities {
    if hosts.is_empty() {
        return Capacities::new();
    }

    let mut ram_free = ResourceCapacity::default();
    let mut disk_free = ResourceCapacity::default();

    for host in hosts {
        ram_free.total_mb = ram_free.total_mb.saturating_add(host.free_ram_mb);
        disk_free.total_mb = disk_free.total_mb.saturating_add(host.free_disk_mb);

        for template in templates {
            let memory_mb = template.memory_mb;
            let disk_mb = gb_to_mb(template.root_gb.saturating_add(template.ephemeral_gb));

            let ram_units = ram_free
                .units_by_mb
                .entry(memory_mb.to_string())
                .or_insert(0);
            *ram_units = ram_units.saturating_add(free_units(host.free_ram_mb, memory_mb));
            let disk_units = disk_free
                .units_by_mb
                .entry(disk_mb.to_string())
                .or_insert(0);
            *disk_units = disk_units.saturating_add(free_units(host.free_disk_mb, disk_mb));
        }
    }

    Capacities::from([
        (RAM_FREE.to_string(), ram_free),
        (DISK_FREE.to_string(), disk_free),
    ])
}

/// Add every resource of `source` into `target`, creating missing kinds at zero
pub fn merge_capacities(target: &mut Capacities, source: &Capacities) {
    for (kind, capacity) in source {
        target.entry(kind.clone()).or_default().accumulate(capacity);
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::cells::mock::{compute_node, instance_type};

    fn units(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn two_hosts_one_template() {
        let hosts = eligible_hosts(&[
            compute_node("host1", 4096, 50),
            compute_node("host2", 2048, 20),
        ]);
        let templates = [instance_type(1024, 10, 0)];

        let capacities = compute_capacities(&hosts, &templates);

        let ram = &capacities[RAM_FREE];
        assert_eq!(ram.total_mb, 6144);
        assert_eq!(ram.units_by_mb, units(&[("1024", 6)]));

        let disk = &capacities[DISK_FREE];
        assert_eq!(disk.total_mb, 71680);
        assert_eq!(disk.units_by_mb, units(&[("10240", 7)]));
    }

    #[test]
    fn totals_do_not_depend_on_templates() {
        let hosts = eligible_hosts(&[
            compute_node("host1", 3000, 7),
            compute_node("host2", 1000, 3),
        ]);
        let many = [
            instance_type(512, 1, 0),
            instance_type(2048, 20, 40),
            instance_type(512, 1, 0),
        ];
        let mut reversed = many.clone();
        reversed.reverse();
        let none: [InstanceTypeRecord; 0] = [];

        for templates in [&many[..], &reversed[..], &none[..]] {
            let capacities = compute_capacities(&hosts, templates);
            assert_eq!(capacities[RAM_FREE].total_mb, 4000);
            assert_eq!(capacities[DISK_FREE].total_mb, 10 * 1024);
        }
    }

    #[test]
    fn zero_sized_template_yields_zero_units() {
        let hosts = eligible_hosts(&[compute_node("host1", 4096, 50)]);
        let templates = [instance_type(0, 0, 0)];

        let capacities = compute_capacities(&hosts, &templates);

        assert_eq!(capacities[RAM_FREE].units_by_mb, units(&[("0", 0)]));
        assert_eq!(capacities[DISK_FREE].units_by_mb, units(&[("0", 0)]));
    }

    #[test]
    fn overcommitted_host_is_clamped_to_zero_units() {
        let hosts = eligible_hosts(&[
            compute_node("host1", -2048, -5),
            compute_node("host2", 1024, 10),
        ]);
        let templates = [instance_type(1024, 10, 0)];

        let capacities = compute_capacities(&hosts, &templates);

        assert_eq!(capacities[RAM_FREE].total_mb, -1024);
        assert_eq!(capacities[RAM_FREE].units_by_mb, units(&[("1024", 1)]));
        assert_eq!(capacities[DISK_FREE].units_by_mb, units(&[("10240", 1)]));
    }

    #[test]
    fn identical_sizes_share_a_bucket() {
        let hosts = eligible_hosts(&[compute_node("host1", 4096, 100)]);
        let templates = [
            instance_type(1024, 10, 10),
            instance_type(1024, 20, 0),
            instance_type(2048, 5, 0),
        ];

        let capacities = compute_capacities(&hosts, &templates);

        assert_eq!(
            capacities[RAM_FREE].units_by_mb,
            units(&[("1024", 8), ("2048", 2)])
        );
        assert_eq!(
            capacities[DISK_FREE].units_by_mb,
            units(&[("20480", 10), ("5120", 20)])
        );
    }

    #[test]
    fn disabled_and_orphaned_hosts_are_excluded() {
        let mut disabled = compute_node("host2", 8192, 100);
        if let Some(service) = disabled.service.as_mut() {
            service.disabled = true;
        }
        let mut orphaned = compute_node("host3", 8192, 100);
        orphaned.service = None;

        let hosts = eligible_hosts(&[compute_node("host1", 1024, 10), disabled, orphaned]);

        assert_eq!(
            hosts,
            vec![HostTelemetry {
                host: "host1".to_string(),
                free_ram_mb: 1024,
                free_disk_mb: 10240,
            }]
        );
    }

    #[test]
    fn later_node_for_same_host_wins() {
        let hosts = eligible_hosts(&[
            compute_node("host1", 1024, 10),
            compute_node("host1", 2048, 20),
        ]);

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].free_ram_mb, 2048);
    }

    #[test]
    fn huge_directory_figures_saturate() {
        let hosts = eligible_hosts(&[
            compute_node("host1", i64::MAX, i64::MAX / 512),
            compute_node("host2", 1024, 10),
        ]);
        assert_eq!(hosts[0].free_disk_mb, i64::MAX);

        let templates = [instance_type(1024, i64::MAX, 1)];
        let capacities = compute_capacities(&hosts, &templates);

        assert_eq!(capacities[RAM_FREE].total_mb, i64::MAX);
        assert_eq!(capacities[DISK_FREE].total_mb, i64::MAX);
        assert_eq!(
            capacities[DISK_FREE].units_by_mb,
            units(&[(i64::MAX.to_string().as_str(), 1)])
        );
    }

    #[test]
    fn merge_saturates_child_totals() {
        let mut target = Capacities::from([(
            RAM_FREE.to_string(),
            ResourceCapacity {
                total_mb: i64::MAX,
                units_by_mb: BTreeMap::new(),
            },
        )]);
        let child = Capacities::from([(
            RAM_FREE.to_string(),
            ResourceCapacity {
                total_mb: 1,
                units_by_mb: units(&[("1024", 1)]),
            },
        )]);

        merge_capacities(&mut target, &child);

        assert_eq!(target[RAM_FREE].total_mb, i64::MAX);
        assert_eq!(target[RAM_FREE].units_by_mb, units(&[("1024", 1)]));
    }

    #[test]
    fn no_eligible_hosts_yields_empty_capacities() {
        let capacities = compute_capacities(&[], &[instance_type(1024, 10, 0)]);
        assert!(capacities.is_empty());
    }

    #[test]
    fn merge_adds_nested_figures() {
        let mut target = Capacities::from([(
            RAM_FREE.to_string(),
            ResourceCapacity {
                total_mb: 100,
                units_by_mb: units(&[("10", 5)]),
            },
        )]);
        let child = Capacities::from([
            (
                RAM_FREE.to_string(),
                ResourceCapacity {
                    total_mb: 50,
                    units_by_mb: units(&[("10", 2), ("20", 1)]),
                },
            ),
            (
                DISK_FREE.to_string(),
                ResourceCapacity {
                    total_mb: 2048,
                    units_by_mb: units(&[("1024", 2)]),
                },
            ),
        ]);

        merge_capacities(&mut target, &child);

        assert_eq!(
            target[RAM_FREE],
            ResourceCapacity {
                total_mb: 150,
                units_by_mb: units(&[("10", 7), ("20", 1)]),
            }
        );
        assert_eq!(target[DISK_FREE], child[DISK_FREE]);
    }
}
