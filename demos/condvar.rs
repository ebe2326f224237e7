use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;
use synch::{Condvar, Mutex};

struct Shared {
    lock: Mutex,
    cv: Condvar,
    n: AtomicI32,
}

pub fn main() {
    let shared = Arc::new(Shared {
        lock: Mutex::new("demo lock"),
        cv: Condvar::new("demo cv"),
        n: AtomicI32::new(10),
    });

    let s = Arc::clone(&shared);
    let reader_t = thread::spawn(move || {
        s.lock.acquire();
        s.cv.wait_while(&s.lock, || {
            let n = s.n.load(Ordering::Relaxed);
            println!("[R]: Woke up, comparing {n} > 0 = {}", n > 0);
            n > 0
        });
        s.lock.release();
        println!("[R]: EXIT");
    });

    let writer_t = thread::spawn(move || {
        for _ in 0..10 {
            thread::sleep(Duration::from_millis(100));
            let _guard = shared.lock.lock();
            shared.n.fetch_sub(1, Ordering::Relaxed);
            println!("[W]: Sending signal");
            shared.cv.signal(&shared.lock);
        }
        println!("[W]: EXIT");
    });

    writer_t.join().unwrap();
    reader_t.join().unwrap();
}
