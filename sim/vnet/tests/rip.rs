//! RIP routers exchanging messages through captured frames, on a paused
//! clock.
use std::{sync::Arc, time::Duration};
use vnet::applications::{Capture, Router};
use vnet_core::{
    ifaces,
    protocols::ipv4::{Ipv4Mask, Ipv4Net},
    AddressTable, Device,
};

// R0 -- 10.0.12.0/24 -- R1 -- 10.0.23.0/24 -- R2
// with X = 10.0.1.0/24 behind R0 and Y = 10.0.3.0/24 behind R2
struct Chain {
    routers: Vec<Router>,
    captures: Vec<Arc<Capture>>,
}

impl Chain {
    fn new() -> Self {
        let addresses = [
            ([10, 0, 1, 1], [10, 0, 12, 1]),
            ([10, 0, 12, 2], [10, 0, 23, 2]),
            ([10, 0, 23, 3], [10, 0, 3, 3]),
        ];
        let mut routers = vec![];
        let mut captures = vec![];
        for (i, (left, right)) in addresses.into_iter().enumerate() {
            let ifaces = ifaces(
                [("eth0", left, 24), ("eth1", right, 24)],
                [2, 0, 0, 0, i as u8, 0],
            );
            let capture = Arc::new(Capture::new(2));
            let router = Router::new_rip(ifaces, AddressTable::new(), capture.clone());
            router.rip().unwrap().activate();
            routers.push(router);
            captures.push(capture);
        }
        Self { routers, captures }
    }

    /// Delivers frames between neighbors until nobody has anything left to
    /// say. Frames from or to `silent` are lost.
    fn pump(&self, silent: Option<usize>) {
        loop {
            let mut moved = false;
            for (i, capture) in self.captures.iter().enumerate() {
                for (egress, frame) in capture.take() {
                    moved = true;
                    let neighbor = match egress {
                        0 => i.checked_sub(1),
                        _ => Some(i + 1).filter(|&n| n < self.routers.len()),
                    };
                    match neighbor {
                        Some(n) if Some(n) != silent && Some(i) != silent => {
                            let ingress = if egress == 0 { 1 } else { 0 };
                            self.routers[n].handle_packet(&frame, ingress);
                        }
                        _ => {}
                    }
                }
            }
            if !moved {
                return;
            }
        }
    }

    fn metric(&self, router: usize, net: Ipv4Net) -> Option<u32> {
        let table = self.routers[router].rip().unwrap().table();
        table.get(net).map(|route| route.metric)
    }

    fn tick(&self, router: usize) {
        self.routers[router].rip().unwrap().tick();
    }
}

fn net(a: u8, b: u8, c: u8) -> Ipv4Net {
    Ipv4Net::new([a, b, c, 0].into(), Ipv4Mask::from_bitcount(24))
}

#[tokio::test(start_paused = true)]
async fn chain_converges() {
    let chain = Chain::new();
    chain.pump(None);

    assert_eq!(chain.metric(0, net(10, 0, 3)), Some(2));
    assert_eq!(chain.metric(2, net(10, 0, 1)), Some(2));
    assert_eq!(chain.metric(1, net(10, 0, 1)), Some(1));
    assert_eq!(chain.metric(1, net(10, 0, 3)), Some(1));
    assert_eq!(chain.routers[0].rip().unwrap().table().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn periodic_updates_keep_routes_alive() {
    let chain = Chain::new();
    chain.pump(None);
    for _ in 0..6 {
        tokio::time::advance(Duration::from_secs(10)).await;
        for router in 0..3 {
            chain.tick(router);
        }
        chain.pump(None);
    }
    assert_eq!(chain.metric(0, net(10, 0, 3)), Some(2));
    assert_eq!(chain.metric(2, net(10, 0, 1)), Some(2));
}

#[tokio::test(start_paused = true)]
async fn lost_neighbors_are_poisoned_downstream() {
    let chain = Chain::new();
    chain.pump(None);

    // R0 falls silent while R2 keeps its routes at R1 fresh
    tokio::time::advance(Duration::from_secs(20)).await;
    chain.tick(2);
    chain.pump(Some(0));
    assert_eq!(chain.metric(1, net(10, 0, 1)), Some(1));

    tokio::time::advance(Duration::from_secs(11)).await;
    chain.tick(1);
    assert_eq!(chain.metric(1, net(10, 0, 1)), Some(16));
    assert_eq!(chain.metric(1, net(10, 0, 3)), Some(1));
    chain.pump(Some(0));

    assert_eq!(chain.metric(2, net(10, 0, 1)), Some(16));
    assert_eq!(chain.routers[2].rip().unwrap().resolve([10, 0, 1, 1].into()), None);
    // Direct networks are untouched
    assert_eq!(chain.metric(2, net(10, 0, 3)), Some(0));
}
