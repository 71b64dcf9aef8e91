//! Lifecycle notification hooks.
//!
//! Host-side code can subscribe to module lifecycle transitions without
//! being a module itself. Pre-transition subscribers can cancel the
//! transition; post-transition subscribers observe its outcome. Every
//! subscriber in a list is always called, even after one has already
//! cancelled, so each sees a consistent picture of the attempt.

use parking_lot::RwLock;

use crate::module::{ModuleInfo, ModuleState};

type Approval = Box<dyn Fn(&ModuleInfo) -> bool + Send + Sync>;
type Outcome = Box<dyn Fn(&ModuleInfo, bool) + Send + Sync>;
type Notice = Box<dyn Fn(&ModuleInfo) + Send + Sync>;
type StateNotice = Box<dyn Fn(&ModuleInfo, ModuleState) + Send + Sync>;

/// Subscriber lists for module lifecycle transitions.
///
/// Held by the [`ModuleManager`](crate::ModuleManager); obtain it through
/// [`ModuleManager::hooks`](crate::ModuleManager::hooks).
#[derive(Default)]
pub struct LifecycleHooks {
    pre_load: RwLock<Vec<Approval>>,
    pre_enable: RwLock<Vec<Approval>>,
    pre_disable: RwLock<Vec<Approval>>,
    post_enable: RwLock<Vec<Outcome>>,
    post_disable: RwLock<Vec<Outcome>>,
    post_dispose: RwLock<Vec<Notice>>,
    status_change: RwLock<Vec<StateNotice>>,
}

impl LifecycleHooks {
    /// Subscribes to installation attempts. Returning `false` cancels the
    /// installation before the module instance is created.
    pub fn on_pre_load<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo) -> bool + Send + Sync + 'static,
    {
        self.pre_load.write().push(Box::new(f));
    }

    /// Subscribes to enable attempts. Returning `false` cancels the enable.
    pub fn on_pre_enable<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo) -> bool + Send + Sync + 'static,
    {
        self.pre_enable.write().push(Box::new(f));
    }

    /// Subscribes to disable attempts. Returning `false` cancels the disable.
    pub fn on_pre_disable<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo) -> bool + Send + Sync + 'static,
    {
        self.pre_disable.write().push(Box::new(f));
    }

    /// Subscribes to completed enables. The flag is `false` when the module's
    /// `on_enable` hook failed.
    pub fn on_post_enable<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo, bool) + Send + Sync + 'static,
    {
        self.post_enable.write().push(Box::new(f));
    }

    /// Subscribes to completed disables. The flag is `false` when the
    /// module's `on_disable` hook failed.
    pub fn on_post_disable<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo, bool) + Send + Sync + 'static,
    {
        self.post_disable.write().push(Box::new(f));
    }

    /// Subscribes to completed disposals.
    pub fn on_post_dispose<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo) + Send + Sync + 'static,
    {
        self.post_dispose.write().push(Box::new(f));
    }

    /// Subscribes to imminent state changes. Fired after the transition is
    /// committed to but before the module's own hook runs; `next` is the
    /// state being entered.
    pub fn on_status_change<F>(&self, f: F)
    where
        F: Fn(&ModuleInfo, ModuleState) + Send + Sync + 'static,
    {
        self.status_change.write().push(Box::new(f));
    }

    pub(crate) fn approve_load(&self, info: &ModuleInfo) -> bool {
        Self::approve(&self.pre_load, info)
    }

    pub(crate) fn approve_enable(&self, info: &ModuleInfo) -> bool {
        Self::approve(&self.pre_enable, info)
    }

    pub(crate) fn approve_disable(&self, info: &ModuleInfo) -> bool {
        Self::approve(&self.pre_disable, info)
    }

    // All subscribers run; one veto is enough to cancel.
    fn approve(list: &RwLock<Vec<Approval>>, info: &ModuleInfo) -> bool {
        let mut approved = true;
        for f in list.read().iter() {
            approved &= f(info);
        }
        approved
    }

    pub(crate) fn notify_status_change(&self, info: &ModuleInfo, next: ModuleState) {
        for f in self.status_change.read().iter() {
            f(info, next);
        }
    }

    pub(crate) fn notify_enabled(&self, info: &ModuleInfo, ok: bool) {
        for f in self.post_enable.read().iter() {
            f(info, ok);
        }
    }

    pub(crate) fn notify_disabled(&self, info: &ModuleInfo, ok: bool) {
        for f in self.post_disable.read().iter() {
            f(info, ok);
        }
    }

    pub(crate) fn notify_disposed(&self, info: &ModuleInfo) {
        for f in self.post_dispose.read().iter() {
            f(info);
        }
    }
}
