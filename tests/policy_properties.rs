//! Property-based tests for the replacement policies
//!
//! Random access traces are replayed through the simulated host and the
//! emitted fault records are checked against a reference model of what
//! each policy must report.


use std::collections::{HashMap, HashSet, VecDeque};

use proptest::prelude::*;
use proptest_strategies::*;
use softmmu::{FaultCause, FaultRecord, PageNumber, Policy, SimHost};

type Host = SimHost<Vec<FaultRecord>>;

fn check_table_invariants(host: &Host) {
    let config = host.mmu().config();
    let resident = host.mmu().resident_pages();
    assert!(resident.len() <= config.frame_count);

    let frames: HashSet<_> = resident.iter().map(|r| r.frame).collect();
    let pages: HashSet<_> = resident.iter().map(|r| r.page).collect();
    assert_eq!(frames.len(), resident.len(), "frame shared by two pages");
    assert_eq!(pages.len(), resident.len(), "page resident twice");
    assert!(frames.iter().all(|f| f.0 < config.frame_count));

    if let Some(table) = host.mmu().third_chance() {
        if !table.is_empty() {
            assert!(table.hand() < table.len());
        }
        assert!(table.last_scan() <= 2 * config.frame_count + 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Tables never exceed capacity and never share frames or pages
    #[test]
    fn capacity_invariant((config, ops) in workload(policy())) {
        let mut host = SimHost::new(&config, Vec::new()).unwrap();
        for (page, offset, access) in ops {
            host.touch(page, offset, access).unwrap();
            check_table_invariants(&host);
        }
    }

    /// An eviction reports write-back exactly when the victim had a
    /// first-write fault since its latest admission
    #[test]
    fn write_back_matches_first_writes((config, ops) in workload(policy())) {
        let mut host = SimHost::new(&config, Vec::new()).unwrap();
        for (page, offset, access) in ops {
            host.touch(page, offset, access).unwrap();
        }

        let mut dirty: HashMap<PageNumber, bool> = HashMap::new();
        for record in host.logger() {
            match record.cause {
                FaultCause::Miss => {
                    prop_assert!(!dirty.contains_key(&record.virt_page));
                    if let Some(victim) = record.evicted_page {
                        let was_dirty = dirty.remove(&victim);
                        prop_assert_eq!(Some(record.write_back), was_dirty);
                    } else {
                        prop_assert!(!record.write_back);
                    }
                    dirty.insert(record.virt_page, false);
                }
                FaultCause::FirstWrite => {
                    let entry = dirty.get_mut(&record.virt_page);
                    prop_assert_eq!(entry.as_deref(), Some(&false));
                    if let Some(flag) = entry {
                        *flag = true;
                    }
                }
                FaultCause::ReferenceReacquire => {
                    prop_assert_eq!(config.policy, Policy::ThirdChance);
                    prop_assert!(dirty.contains_key(&record.virt_page));
                }
            }
        }
    }

    /// FIFO evicts in admission order, whatever the writes in between
    #[test]
    fn fifo_evicts_in_admission_order((config, ops) in workload(Just(Policy::Fifo))) {
        let mut host = SimHost::new(&config, Vec::new()).unwrap();
        for (page, offset, access) in ops {
            host.touch(page, offset, access).unwrap();
        }

        let mut queue: VecDeque<PageNumber> = VecDeque::new();
        for record in host.logger() {
            prop_assert_ne!(record.cause, FaultCause::ReferenceReacquire);
            if record.cause != FaultCause::Miss {
                continue;
            }
            if let Some(victim) = record.evicted_page {
                prop_assert_eq!(queue.len(), config.frame_count);
                prop_assert_eq!(queue.pop_front(), Some(victim));
            }
            queue.push_back(record.virt_page);
        }

        let resident: Vec<_> = host.mmu().resident_pages().iter().map(|r| r.page).collect();
        prop_assert_eq!(resident, Vec::from(queue));
    }

    /// Repeating an access that just completed takes no fault and logs nothing
    #[test]
    fn repeated_access_is_silent((config, ops) in workload(policy())) {
        let mut host = SimHost::new(&config, Vec::new()).unwrap();
        for (page, offset, access) in ops {
            host.touch(page, offset, access).unwrap();
            let logged = host.logger().len();
            let faults = host.mmu().stats().faults;

            prop_assert_eq!(host.touch(page, offset, access).unwrap(), 0);
            prop_assert_eq!(host.logger().len(), logged);
            prop_assert_eq!(host.mmu().stats().faults, faults);
        }
    }

    /// Physical addresses always fall inside the frame pool
    #[test]
    fn physical_addresses_in_pool((config, ops) in workload(policy())) {
        let mut host = SimHost::new(&config, Vec::new()).unwrap();
        for (page, offset, access) in ops {
            host.touch(page, offset, access).unwrap();
            if let Some(record) = host.logger().last() {
                prop_assert!(record.phys_addr < config.frame_count * config.page_size);
            }
        }
    }
}
