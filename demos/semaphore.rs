use std::sync::Arc;
use std::{thread, time::Duration};
use synch::Semaphore;

pub fn main() {
    let semaphore = Arc::new(Semaphore::new("demo", 0));

    let sem1 = Arc::clone(&semaphore);
    let wait_t = thread::spawn(move || {
        for _ in 0..5 {
            sem1.dec();
            println!("Thread 1 decremented");
        }
    });

    let sem2 = Arc::clone(&semaphore);
    let writer_t = thread::spawn(move || {
        for n in [1, 2, 1, 2] {
            println!("Thread 2 increments by {n}");
            for _ in 0..n {
                sem2.inc();
            }
            thread::sleep(Duration::from_millis(100));
        }
    });

    wait_t.join().unwrap();
    writer_t.join().unwrap();

    assert_eq!(semaphore.value(), 1);
}
