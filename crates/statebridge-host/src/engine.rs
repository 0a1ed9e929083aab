//! Path observation over store transitions.
//!
//! Each store notification is handled in two phases. The scan walks a copy of
//! the store's observables, recomputes every accessor and records the ones
//! whose value changed identity; siblings of one combined observation share a
//! single job. Jobs then fire in the order they were first queued, skipping
//! any whose subscription ended in the meantime. No interior borrow is held
//! while a listener runs, so listeners may dispatch, observe or unsubscribe.
//!
//! A transition raised by a listener is not scanned inside the running pass.
//! Its store key is queued and scanned once the pass completes, so every
//! observer receives values in the order the store produced them.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use statebridge_diff::{Value, identical};
use tracing::debug;

use crate::ENGINE_TARGET;
use crate::error::HostError;
use crate::path::StorePath;
use crate::store::StoreSet;
use crate::subscription::Subscription;

/// Receives the current value of an observation.
pub type Listener = Rc<dyn Fn(Option<&Value>)>;

type Liveness = Rc<Cell<bool>>;

/// Labelled siblings delivered as one object.
struct Group {
    latest: RefCell<BTreeMap<String, Option<Value>>>,
    listener: Listener,
    active: Liveness,
}

impl Group {
    /// Absent members appear as `null`.
    fn snapshot(&self) -> Value {
        Value::object(
            self.latest
                .borrow()
                .iter()
                .map(|(label, value)| (label.clone(), value.clone().unwrap_or_default())),
        )
    }
}

enum Target {
    Single(Listener),
    Member { label: String, group: Rc<Group> },
}

struct Observable {
    segments: Vec<String>,
    prev: RefCell<Option<Value>>,
    active: Liveness,
    target: Target,
}

enum Job {
    Single {
        listener: Listener,
        value: Option<Value>,
        active: Liveness,
    },
    Combined(Rc<Group>),
}

impl Job {
    fn is_for(&self, group: &Rc<Group>) -> bool {
        matches!(self, Self::Combined(queued) if Rc::ptr_eq(queued, group))
    }

    fn into_ready(self) -> (Listener, Option<Value>, Liveness) {
        match self {
            Self::Single {
                listener,
                value,
                active,
            } => (listener, value, active),
            Self::Combined(group) => (
                Rc::clone(&group.listener),
                Some(group.snapshot()),
                Rc::clone(&group.active),
            ),
        }
    }
}

type Member = (String, Rc<Observable>);

pub(crate) struct Engine {
    stores: Rc<StoreSet>,
    observables: RefCell<HashMap<String, Vec<Rc<Observable>>>>,
    notifying: Cell<bool>,
    deferred: RefCell<VecDeque<String>>,
}

impl Engine {
    pub(crate) fn new(stores: Rc<StoreSet>) -> Self {
        Self {
            stores,
            observables: RefCell::default(),
            notifying: Cell::new(false),
            deferred: RefCell::default(),
        }
    }

    /// Subscribes to every store; the returned handles detach the engine.
    pub(crate) fn attach(self: &Rc<Self>) -> Vec<Subscription> {
        self.stores
            .iter()
            .map(|(key, store)| {
                let engine = Rc::downgrade(self);
                let store_key = key.to_owned();
                store.subscribe(Rc::new(move || {
                    if let Some(live) = engine.upgrade() {
                        live.notify(&store_key);
                    }
                }))
            })
            .collect()
    }

    /// Observes one store path and delivers its current value immediately.
    pub(crate) fn observe(
        self: &Rc<Self>,
        path: &StorePath,
        listener: &Listener,
    ) -> Result<Subscription, HostError> {
        let (key, store) = self.stores.resolve(path.store.as_deref())?;
        let store_key = key.to_owned();
        let initial = store.state().get_in(&path.segments).cloned();
        let active: Liveness = Rc::new(Cell::new(true));
        let observable = Rc::new(Observable {
            segments: path.segments.clone(),
            prev: RefCell::new(initial.clone()),
            active: Rc::clone(&active),
            target: Target::Single(Rc::clone(listener)),
        });
        self.register(&store_key, &observable);
        debug!(
            target: ENGINE_TARGET,
            store = %store_key,
            path = %path.segments.join("."),
            "observing"
        );
        let subscription = self.teardown(vec![(store_key, observable)], active);
        listener(initial.as_ref());
        Ok(subscription)
    }

    /// Observes labelled store paths together.
    ///
    /// The listener receives an object keyed by label, immediately and then
    /// at most once per transition of any store involved. Every path is
    /// resolved before anything is registered.
    pub(crate) fn observe_group(
        self: &Rc<Self>,
        paths: Vec<(String, StorePath)>,
        listener: &Listener,
    ) -> Result<Subscription, HostError> {
        let mut resolved = Vec::with_capacity(paths.len());
        for (label, path) in paths {
            let (key, store) = self.stores.resolve(path.store.as_deref())?;
            let initial = store.state().get_in(&path.segments).cloned();
            resolved.push((label, key.to_owned(), path.segments, initial));
        }

        let active: Liveness = Rc::new(Cell::new(true));
        let group = Rc::new(Group {
            latest: RefCell::new(
                resolved
                    .iter()
                    .map(|(label, _, _, initial)| (label.clone(), initial.clone()))
                    .collect(),
            ),
            listener: Rc::clone(listener),
            active: Rc::clone(&active),
        });

        let mut members: Vec<Member> = Vec::with_capacity(resolved.len());
        for (label, store_key, segments, initial) in resolved {
            let observable = Rc::new(Observable {
                segments,
                prev: RefCell::new(initial),
                active: Rc::clone(&active),
                target: Target::Member {
                    label,
                    group: Rc::clone(&group),
                },
            });
            self.register(&store_key, &observable);
            members.push((store_key, observable));
        }
        debug!(target: ENGINE_TARGET, members = members.len(), "observing combined paths");

        let subscription = self.teardown(members, active);
        let snapshot = group.snapshot();
        listener(Some(&snapshot));
        Ok(subscription)
    }

    /// Number of registered observables across all stores.
    pub(crate) fn observable_count(&self) -> usize {
        self.observables.borrow().values().map(Vec::len).sum()
    }

    /// Deactivates and forgets every observable.
    pub(crate) fn clear(&self) {
        let drained: Vec<Rc<Observable>> = self
            .observables
            .borrow_mut()
            .drain()
            .flat_map(|(_, list)| list)
            .collect();
        for observable in drained {
            observable.active.set(false);
        }
    }

    fn register(&self, store_key: &str, observable: &Rc<Observable>) {
        self.observables
            .borrow_mut()
            .entry(store_key.to_owned())
            .or_default()
            .push(Rc::clone(observable));
    }

    fn teardown(self: &Rc<Self>, members: Vec<Member>, active: Liveness) -> Subscription {
        let engine = Rc::downgrade(self);
        Subscription::new(move || {
            active.set(false);
            if let Some(live) = engine.upgrade() {
                live.remove(&members);
            }
        })
    }

    fn remove(&self, members: &[Member]) {
        let mut observables = self.observables.borrow_mut();
        for (store_key, member) in members {
            if let Some(list) = observables.get_mut(store_key) {
                list.retain(|observable| !Rc::ptr_eq(observable, member));
            }
        }
    }

    /// Runs a pass for `store_key`, or queues it when a pass is running.
    fn notify(&self, store_key: &str) {
        {
            let mut deferred = self.deferred.borrow_mut();
            if !deferred.iter().any(|key| key == store_key) {
                deferred.push_back(store_key.to_owned());
            }
        }
        if self.notifying.replace(true) {
            debug!(target: ENGINE_TARGET, store = store_key, "deferring nested transition");
            return;
        }
        while let Some(key) = self.next_deferred() {
            self.pass(&key);
        }
        self.notifying.set(false);
    }

    fn next_deferred(&self) -> Option<String> {
        self.deferred.borrow_mut().pop_front()
    }

    fn pass(&self, store_key: &str) {
        let Ok((_, store)) = self.stores.resolve(Some(store_key)) else {
            return;
        };
        let state = store.state();
        let snapshot: Vec<Rc<Observable>> = self
            .observables
            .borrow()
            .get(store_key)
            .cloned()
            .unwrap_or_default();

        let mut jobs: Vec<Job> = Vec::new();
        for observable in &snapshot {
            if !observable.active.get() {
                continue;
            }
            let next = state.get_in(&observable.segments).cloned();
            if identical(observable.prev.borrow().as_ref(), next.as_ref()) {
                continue;
            }
            *observable.prev.borrow_mut() = next.clone();
            match &observable.target {
                Target::Single(listener) => jobs.push(Job::Single {
                    listener: Rc::clone(listener),
                    value: next,
                    active: Rc::clone(&observable.active),
                }),
                Target::Member { label, group } => {
                    group.latest.borrow_mut().insert(label.clone(), next);
                    if !jobs.iter().any(|job| job.is_for(group)) {
                        jobs.push(Job::Combined(Rc::clone(group)));
                    }
                }
            }
        }
        if jobs.is_empty() {
            return;
        }

        debug!(target: ENGINE_TARGET, store = store_key, jobs = jobs.len(), "notifying observers");
        let ready: Vec<_> = jobs.into_iter().map(Job::into_ready).collect();
        for (listener, value, active) in ready {
            if active.get() {
                listener(value.as_ref());
            }
        }
    }
}
