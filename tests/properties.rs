use proptest::prelude::*;
use std::net::Ipv4Addr;
use wlansim::clock::{Clock, SimTime, transmission_time};
use wlansim::network::{LinkConfig, NodeRole, Topology};

type Fired = Vec<(SimTime, usize)>;

fn record(clock: &mut Clock<Fired>, at: SimTime, tag: usize) {
    clock
        .schedule(at, move |c, fired: &mut Fired| {
            fired.push((c.now(), tag));
            Ok(())
        })
        .unwrap();
}

proptest! {
    /// Events fire in time order, and same-time events in scheduling order.
    #[test]
    fn dispatch_order_is_time_then_insertion(times in prop::collection::vec(0u64..50, 1..200)) {
        let mut clock = Clock::new();
        for (tag, t) in times.iter().enumerate() {
            record(&mut clock, SimTime::from_micros(*t), tag);
        }

        let mut fired = Vec::new();
        clock.run_until(SimTime::from_millis(1), &mut fired).unwrap();

        prop_assert_eq!(fired.len(), times.len());
        for pair in fired.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        for (at, tag) in &fired {
            prop_assert_eq!(*at, SimTime::from_micros(times[*tag]));
        }
    }

    /// Cancelled events never fire; everything else still does.
    #[test]
    fn cancelled_events_stay_silent(
        plan in prop::collection::vec((0u64..1_000, any::<bool>()), 1..100),
    ) {
        let mut clock = Clock::new();
        let mut expected = Vec::new();
        for (tag, (t, cancel)) in plan.iter().enumerate() {
            let handle = clock
                .schedule(SimTime::from_nanos(*t), move |_, fired: &mut Vec<usize>| {
                    fired.push(tag);
                    Ok(())
                })
                .unwrap();
            if *cancel {
                clock.cancel(handle).unwrap();
                // a second cancel is harmless
                clock.cancel(handle).unwrap();
            } else {
                expected.push(tag);
            }
        }

        let mut fired = Vec::new();
        clock.run_until(SimTime::from_secs(1), &mut fired).unwrap();
        fired.sort_unstable();
        prop_assert_eq!(fired, expected);
        prop_assert_eq!(clock.pending(), 0);
    }

    /// The clock never runs backwards, however the run is chopped up.
    #[test]
    fn stepping_in_slices_matches_one_run(
        times in prop::collection::vec(0u64..10_000, 1..100),
        cut in 0u64..10_000,
    ) {
        let build = || {
            let mut clock = Clock::new();
            for (tag, t) in times.iter().enumerate() {
                record(&mut clock, SimTime::from_nanos(*t), tag);
            }
            clock
        };

        let mut whole = Vec::new();
        build().run_until(SimTime::from_micros(10), &mut whole).unwrap();

        let mut sliced = Vec::new();
        let mut clock = build();
        clock.run_until(SimTime::from_nanos(cut), &mut sliced).unwrap();
        prop_assert_eq!(clock.now(), SimTime::from_nanos(cut));
        clock.run_until(SimTime::from_micros(10), &mut sliced).unwrap();

        prop_assert_eq!(whole, sliced);
    }

    /// Transmission time is the exact bit time rounded up, never zero.
    #[test]
    fn transmission_time_rounds_up(bytes in 1u32..100_000, bps in 1_000u64..10_000_000_000) {
        let t = transmission_time(bytes, bps).as_nanos() as u128;
        let needed = u128::from(bytes) * 8 * 1_000_000_000;
        prop_assert!(t >= 1);
        prop_assert!(t * u128::from(bps) >= needed);
        prop_assert!((t - 1) * u128::from(bps) < needed);
    }

    /// A /24 hands out .1, .2, ... in member order and every address resolves
    /// back to its owner.
    #[test]
    fn segment_addresses_are_sequential(n in 2usize..=254) {
        let mut topo = Topology::new();
        let nodes: Vec<_> = (0..n).map(|_| topo.add_node(NodeRole::Station)).collect();
        let link = topo
            .add_segment(&nodes, LinkConfig::new(54_000_000, SimTime::ZERO))
            .unwrap();
        let ifaces = topo
            .assign_addresses(link, Ipv4Addr::new(192, 168, 7, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();

        prop_assert_eq!(ifaces.len(), n);
        for (i, iface) in ifaces.iter().enumerate() {
            prop_assert_eq!(iface.node, nodes[i]);
            prop_assert_eq!(iface.address, Ipv4Addr::new(192, 168, 7, i as u8 + 1));
            prop_assert_eq!(topo.resolve(iface.address), Some(nodes[i]));
        }
    }

    /// Too many members for the mask fails and leaves the link unaddressed.
    #[test]
    fn oversized_segment_is_rejected(prefix in 25u8..=30, extra in 1usize..4) {
        let capacity = (1usize << (32 - prefix)) - 2;
        let mut topo = Topology::new();
        let nodes: Vec<_> = (0..capacity + extra).map(|_| topo.add_node(NodeRole::Station)).collect();
        let link = topo
            .add_segment(&nodes, LinkConfig::new(1_000_000, SimTime::ZERO))
            .unwrap();

        let mask = Ipv4Addr::from(u32::MAX << (32 - prefix));
        prop_assert!(topo.assign_addresses(link, Ipv4Addr::new(10, 0, 0, 0), mask).is_err());
        prop_assert!(topo.link(link).unwrap().subnet().is_none());
        prop_assert_eq!(topo.resolve(Ipv4Addr::new(10, 0, 0, 1)), None);
    }
}
