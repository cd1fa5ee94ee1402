use std::sync::{Condvar, Mutex, MutexGuard};

/// FIFO admission gate serializing command traffic to one board.
///
/// Callers take a ticket and are admitted strictly in ticket order, one at a
/// time; the serial channel behind the gate cannot interleave exchanges.
#[derive(Default)]
pub struct CommandGate {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

#[derive(Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// Exclusive admission through a [`CommandGate`]; the next caller is
/// admitted when this is dropped.
pub struct GatePass<'a> {
    gate: &'a CommandGate,
}

fn lock(tickets: &Mutex<Tickets>) -> MutexGuard<'_, Tickets> {
    tickets.lock().unwrap_or_else(|e| e.into_inner())
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue for admission; blocks until every earlier ticket has been
    /// served.
    pub fn enter(&self) -> GatePass<'_> {
        let mut t = lock(&self.tickets);
        let ticket = t.next;
        t.next += 1;
        while t.serving != ticket {
            t = self.turn.wait(t).unwrap_or_else(|e| e.into_inner());
        }
        GatePass { gate: self }
    }

    /// Tickets taken but not yet released, including the holder.
    pub fn pending(&self) -> u64 {
        let t = lock(&self.tickets);
        t.next - t.serving
    }
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        let mut t = lock(&self.gate.tickets);
        t.serving += 1;
        self.gate.turn.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn only_one_holder_at_a_time() {
        let gate = Arc::new(CommandGate::new());
        let inside = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _pass = gate.enter();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("gate thread");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn tickets_are_served_in_take_order() {
        let gate = Arc::new(CommandGate::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        // Hold the gate, then queue two waiters one at a time so their
        // ticket order is known.
        let holder = gate.enter();

        let spawn_waiter = |id: u32, queued_at: u64| {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            let thread_gate = Arc::clone(&gate);
            let h = thread::spawn(move || {
                let _pass = thread_gate.enter();
                order.lock().expect("order lock").push(id);
            });
            while gate.pending() < queued_at {
                thread::sleep(Duration::from_millis(1));
            }
            h
        };
        let first = spawn_waiter(1, 2);
        let second = spawn_waiter(2, 3);

        drop(holder);
        first.join().expect("first waiter");
        second.join().expect("second waiter");

        assert_eq!(*order.lock().expect("order lock"), vec![1, 2]);
    }
}
