//! Several hosted processors running the scheduler loop concurrently

mod common;

use std::collections::{HashMap, VecDeque};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use common::{bind_cpu, boot, fork_with, HostKernel};
use prio_kernel::{Channel, Priority, SpinLock};

const NCPU: usize = 4;

fn start_processors(k: &'static HostKernel) {
    for cpu in 0..NCPU {
        thread::Builder::new()
            .name(format!("cpu-{}", cpu))
            .spawn(move || {
                bind_cpu(cpu);
                k.scheduler()
            })
            .unwrap();
    }
}

#[test]
fn test_fork_wait_stress() {
    const CHILDREN: i32 = 24;

    let (tx, rx) = mpsc::channel();
    let k = boot(NCPU, move |k| {
        let mut expected = HashMap::new();
        for i in 0..CHILDREN {
            let pid = fork_with(k, move |k| {
                for _ in 0..(i % 4) {
                    k.yield_now();
                }
                if i % 5 == 0 {
                    // Outlives its parent and is adopted by init
                    fork_with(k, |k| {
                        k.yield_now();
                        k.exit(99)
                    })
                    .unwrap();
                }
                k.exit(i)
            })
            .unwrap();
            if i % 3 == 0 {
                k.setprio(pid, Priority::High).unwrap();
            }
            expected.insert(pid, i);
        }

        let mut reaped = HashMap::new();
        let mut status = 0;
        while let Ok(pid) = k.wait(Some(&mut status)) {
            reaped.insert(pid, status);
        }

        let table = k.snapshot();
        tx.send((expected, reaped, table.count(), table.verify())).unwrap();
    });
    start_processors(k);

    let (expected, reaped, live, verified) = rx
        .recv_timeout(Duration::from_secs(60))
        .expect("init never finished reaping");

    for (pid, code) in &expected {
        assert_eq!(reaped.get(pid), Some(code));
    }
    let orphans: Vec<_> = reaped.iter().filter(|(pid, _)| !expected.contains_key(*pid)).collect();
    assert_eq!(orphans.len(), 5);
    assert!(orphans.iter().all(|(_, code)| **code == 99));
    assert_eq!(live, 1);
    assert_eq!(verified, Ok(()));
}

struct Pipe {
    items: VecDeque<u32>,
    closed: bool,
}

#[test]
fn test_no_lost_wakeups() {
    const ITEMS: u32 = 200;

    let pipe = Arc::new(SpinLock::new(
        "pipe",
        Pipe {
            items: VecDeque::new(),
            closed: false,
        },
    ));
    let (tx, rx) = mpsc::channel();

    let k = boot(NCPU, move |k| {
        let consumer_pipe = pipe.clone();
        fork_with(k, move |k| {
            let chan = Channel::of(&*consumer_pipe);
            let mut sum = 0u64;
            let mut guard = consumer_pipe.lock(k);
            loop {
                while guard.items.is_empty() && !guard.closed {
                    guard = k.sleep(chan, guard);
                }
                match guard.items.pop_front() {
                    Some(item) => sum += u64::from(item),
                    None => break,
                }
            }
            drop(guard);
            tx.send(sum).unwrap();
        })
        .unwrap();

        let producer_pipe = pipe.clone();
        fork_with(k, move |k| {
            let chan = Channel::of(&*producer_pipe);
            for item in 1..=ITEMS {
                let mut guard = producer_pipe.lock(k);
                guard.items.push_back(item);
                k.wakeup(chan);
                drop(guard);
                if item % 10 == 0 {
                    k.yield_now();
                }
            }
            let mut guard = producer_pipe.lock(k);
            guard.closed = true;
            k.wakeup(chan);
        })
        .unwrap();
    });
    start_processors(k);

    let sum = rx
        .recv_timeout(Duration::from_secs(60))
        .expect("consumer never finished");
    assert_eq!(sum, u64::from(ITEMS) * u64::from(ITEMS + 1) / 2);
}
