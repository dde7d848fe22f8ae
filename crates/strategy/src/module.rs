//! Strategy module contract
//!
//! A strategy module is whatever the framework loads at startup: it exposes
//! a table of exports, some tagged by the registration method that produced
//! them and some plain helpers. Discovery reads this table once.

use crate::callback::{Handler, ScheduleSpec};

/// One exported callable of a strategy module
#[derive(Debug, Clone)]
pub struct Export {
    /// Exported name, used as the callback identity
    pub name: String,
    /// Name of the registration method that produced it (e.g. `"on_bar"`),
    /// `None` for plain helpers
    pub tag: Option<String>,
    pub handler: Option<Handler>,
    pub schedule: Option<ScheduleSpec>,
}

impl Export {
    pub fn tagged(name: impl Into<String>, tag: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            tag: Some(tag.into()),
            handler: Some(handler),
            schedule: None,
        }
    }

    /// A helper with no registration tag; discovery ignores it
    pub fn helper(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            handler: None,
            schedule: None,
        }
    }

    pub fn with_schedule(mut self, schedule: ScheduleSpec) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

/// A loaded strategy
pub trait StrategyModule: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Every exported callable, in declaration order
    fn exports(&self) -> Vec<Export>;
}
