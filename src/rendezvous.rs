//! Three-party rendezvous ("whale mating")
//!
//! Three roles meet: a [Male](Role::Male), a [Female](Role::Female) and a
//! [Matchmaker](Role::Matchmaker). Nobody may leave until one member of
//! each of the other two roles is present for them.
//!
//! The last member of a triad to arrive forms the match: it wakes one
//! waiter of each of the other roles and leaves without sleeping. Everybody
//! else sleeps on its role's condition variable. One match releases
//! exactly one member per role, even when several are queued.
//!
//! Wakeups are counted. A match hands a *pending wake* to each of the other
//! two roles before signaling, and a woken member only leaves after taking
//! one. A member that was already picked by a match, but hasn't left yet,
//! is therefore never mistaken for an unmatched one.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace};

use crate::condvar::Condvar;
use crate::error::Result;
use crate::mutex::Mutex;

/// The three roles of a rendezvous
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Needs a female and a matchmaker
    Male,
    /// Needs a male and a matchmaker
    Female,
    /// Needs a male and a female
    Matchmaker,
}

impl Role {
    /// Every role, in index order
    pub const ALL: [Role; 3] = [Role::Male, Role::Female, Role::Matchmaker];

    const fn index(self) -> usize {
        match self {
            Role::Male => 0,
            Role::Female => 1,
            Role::Matchmaker => 2,
        }
    }

    /// The two roles a member of `self` needs to meet
    pub const fn others(self) -> [Role; 2] {
        match self {
            Role::Male => [Role::Female, Role::Matchmaker],
            Role::Female => [Role::Male, Role::Matchmaker],
            Role::Matchmaker => [Role::Male, Role::Female],
        }
    }

    /// The lowercase name of the role
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Male => "male",
            Role::Female => "female",
            Role::Matchmaker => "matchmaker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One counter per role.
///
/// Only read or written while holding the rendezvous lock, which orders
/// the accesses, so relaxed atomics are enough.
#[derive(Default)]
struct Tally([AtomicUsize; 3]);

impl Tally {
    fn get(&self, role: Role) -> usize {
        self.0[role.index()].load(Ordering::Relaxed)
    }

    fn inc(&self, role: Role) {
        self.0[role.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn dec(&self, role: Role) {
        self.0[role.index()].fetch_sub(1, Ordering::Relaxed);
    }

    fn clear(&self) {
        for count in &self.0 {
            count.store(0, Ordering::Relaxed);
        }
    }
}

/// How a member left the rendezvous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The member completed a triad and woke the other two
    FormedMatch,
    /// The member slept until a match picked it
    Matched,
}

/// A three-role rendezvous
///
/// # Example
/// ```
/// use synch::rendezvous::{Rendezvous, Role};
/// use std::sync::Arc;
///
/// let rv = Arc::new(Rendezvous::new());
/// let members = Role::ALL.map(|role| {
///     let rv = Arc::clone(&rv);
///     std::thread::spawn(move || rv.enter(role))
/// });
/// for m in members {
///     m.join().unwrap();
/// }
/// assert_eq!(rv.matches(), 1);
/// ```
pub struct Rendezvous {
    lock: Mutex,
    cvs: [Condvar; 3],
    /* Members inside, from entry until exit */
    population: Tally,
    /* Members inside that no match has picked yet */
    unmatched: Tally,
    /* Wakes handed out by matches and not yet taken */
    pending: Tally,
    matches: AtomicUsize,
}

impl Rendezvous {
    /// Creates an empty rendezvous
    pub fn new() -> Self {
        Self {
            lock: Mutex::new("whalemating lock"),
            cvs: Role::ALL.map(|role| Condvar::new(&format!("{role} cv"))),
            population: Tally::default(),
            unmatched: Tally::default(),
            pending: Tally::default(),
            matches: AtomicUsize::new(0),
        }
    }

    /// Like [new](Self::new), but reports allocation failure
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            lock: Mutex::try_new("whalemating lock")?,
            cvs: [
                Condvar::try_new("male cv")?,
                Condvar::try_new("female cv")?,
                Condvar::try_new("matchmaker cv")?,
            ],
            population: Tally::default(),
            unmatched: Tally::default(),
            pending: Tally::default(),
            matches: AtomicUsize::new(0),
        })
    }

    fn cv(&self, role: Role) -> &Condvar {
        &self.cvs[role.index()]
    }

    /// Enters the rendezvous as `role`, returning once matched with one
    /// member of each other role
    pub fn enter(&self, role: Role) -> Exit {
        let _guard = self.lock.lock();
        self.population.inc(role);
        self.unmatched.inc(role);

        let [a, b] = role.others();
        let exit = if self.unmatched.get(a) > 0 && self.unmatched.get(b) > 0 {
            for r in [role, a, b] {
                self.unmatched.dec(r);
            }
            for other in [a, b] {
                self.pending.inc(other);
                self.cv(other).signal(&self.lock);
            }
            let n = self.matches.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("whalemating: match #{n} formed by a {role}");
            Exit::FormedMatch
        } else {
            trace!("whalemating: {role} waiting");
            self.cv(role).wait_while(&self.lock, || self.pending.get(role) == 0);
            self.pending.dec(role);
            Exit::Matched
        };

        self.population.dec(role);
        exit
    }

    /// Returns the number of `role` members currently inside
    pub fn population(&self, role: Role) -> usize {
        let _guard = self.lock.lock();
        self.population.get(role)
    }

    /// Returns the number of `role` members waiting for a match
    pub fn waiting(&self, role: Role) -> usize {
        let _guard = self.lock.lock();
        self.unmatched.get(role)
    }

    /// Returns the number of matches formed since creation or the last
    /// [reset](Self::reset)
    pub fn matches(&self) -> usize {
        let _guard = self.lock.lock();
        self.matches.load(Ordering::Relaxed)
    }

    /// Zeroes every counter, between runs
    ///
    /// # Panics
    /// If a member is still inside
    pub fn reset(&self) {
        let _guard = self.lock.lock();
        for role in Role::ALL {
            assert_eq!(
                self.population.get(role),
                0,
                "whalemating: reset with {role}s inside"
            );
        }
        self.population.clear();
        self.unmatched.clear();
        self.pending.clear();
        self.matches.store(0, Ordering::Relaxed);
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread::JoinHandle;
    use std::time::Duration;

    fn spawn(rv: &Arc<Rendezvous>, role: Role) -> JoinHandle<Exit> {
        let rv = Arc::clone(rv);
        std::thread::spawn(move || rv.enter(role))
    }

    fn wait_until_waiting(rv: &Rendezvous, role: Role, n: usize) {
        while rv.waiting(role) < n {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn roles() {
        for role in Role::ALL {
            assert!(!role.others().contains(&role));
            assert_eq!(Role::ALL[role.index()], role);
        }
        assert_eq!(Role::Matchmaker.to_string(), "matchmaker");
        assert_eq!(Role::ALL.map(Role::as_str), ["male", "female", "matchmaker"]);
    }

    #[test]
    fn last_arrival_forms_the_match() {
        let rv = Arc::new(Rendezvous::try_new().unwrap());
        let male = spawn(&rv, Role::Male);
        let female = spawn(&rv, Role::Female);
        wait_until_waiting(&rv, Role::Male, 1);
        wait_until_waiting(&rv, Role::Female, 1);

        assert_eq!(rv.enter(Role::Matchmaker), Exit::FormedMatch);
        assert_eq!(male.join().unwrap(), Exit::Matched);
        assert_eq!(female.join().unwrap(), Exit::Matched);
        assert_eq!(rv.matches(), 1);
        for role in Role::ALL {
            assert_eq!(rv.population(role), 0);
        }
    }

    #[test]
    fn one_match_releases_one_member_per_role() {
        let rv = Arc::new(Rendezvous::new());
        let males = (0..3).map(|_| spawn(&rv, Role::Male)).collect::<Vec<_>>();
        let females = (0..3).map(|_| spawn(&rv, Role::Female)).collect::<Vec<_>>();
        wait_until_waiting(&rv, Role::Male, 3);
        wait_until_waiting(&rv, Role::Female, 3);

        rv.enter(Role::Matchmaker);
        /* Two of each are still stranded, waiting for matchmakers */
        while rv.population(Role::Male) > 2 || rv.population(Role::Female) > 2 {
            std::thread::sleep(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(rv.population(Role::Male), 2);
        assert_eq!(rv.population(Role::Female), 2);
        assert_eq!(rv.waiting(Role::Male), 2);

        rv.enter(Role::Matchmaker);
        rv.enter(Role::Matchmaker);
        for h in males.into_iter().chain(females) {
            h.join().unwrap();
        }
        assert_eq!(rv.matches(), 3);
    }

    #[test]
    fn equal_populations_all_finish() {
        const PER_ROLE: usize = 10;
        let rv = Arc::new(Rendezvous::new());
        let handles = (0..PER_ROLE)
            .flat_map(|_| Role::ALL)
            .map(|role| spawn(&rv, role))
            .collect::<Vec<_>>();

        let formed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|exit| *exit == Exit::FormedMatch)
            .count();

        assert_eq!(formed, PER_ROLE);
        assert_eq!(rv.matches(), PER_ROLE);
        for role in Role::ALL {
            assert_eq!(rv.population(role), 0);
            assert_eq!(rv.waiting(role), 0);
        }
    }

    #[test]
    fn reset_between_runs() {
        let rv = Arc::new(Rendezvous::new());
        for _ in 0..2 {
            let handles = Role::ALL.map(|role| spawn(&rv, role));
            for h in handles { h.join().unwrap(); }
            assert_eq!(rv.matches(), 1);
            rv.reset();
            assert_eq!(rv.matches(), 0);
        }
    }
}
