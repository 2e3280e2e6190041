//! Bar-selection state: (SelectionState, SelectionEvent) -> Transition.
//!
//! A single slot holds the current selection and the example records
//! committed for it. Every bar click issues a new [`RequestToken`];
//! completion events carrying any other token are stale and dropped, so the
//! last click always wins.
//!
//! ```text
//!            BarClicked                 ExamplesLoaded(current)
//!   Empty ─────────────► Loading ─────────────────────────► Ready
//!     ▲                    │  FetchFailed(current)            │
//!     │                    ▼                                  │
//!     │     ErrorDismissed Error ◄──────── (prior data kept) ─┘
//!     └──── MetricChanged (from any phase)
//! ```

use serde::Serialize;

use crate::client::ExampleRecord;
use crate::error::FetchError;
use crate::logging::{log, obj, v_int, v_str, Domain, Level};

/// Identifies one chart bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub feature: String,
    pub bucket_index: usize,
    pub system_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Empty,
    Loading,
    Ready,
    Error,
}

/// Records committed for a selection, one list per system.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExamples {
    pub selection: Selection,
    pub records: Vec<Vec<ExampleRecord>>,
}

#[derive(Debug, Clone)]
pub enum SelectionEvent {
    BarClicked(Selection),
    ExamplesLoaded {
        token: RequestToken,
        records: Vec<Vec<ExampleRecord>>,
    },
    FetchFailed {
        token: RequestToken,
        error: FetchError,
    },
    /// Switch which system's examples are shown for the committed selection.
    ActiveSystemChanged(usize),
    /// Active metric tab changed; everything is invalidated.
    MetricChanged,
    ErrorDismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A fetch must be launched for this token.
    FetchRequested(RequestToken),
    Committed,
    /// The fetch for the current token failed; the message is for the user.
    Failed(FetchError),
    /// Completion for a superseded token; nothing changed.
    Stale,
    Cleared,
    /// Event not valid in the current phase; nothing changed.
    Ignored,
    SystemSwitched,
}

#[derive(Debug, Clone)]
pub struct SelectionState {
    phase: Phase,
    /// Selection of the in-flight request while loading.
    pending: Option<Selection>,
    current_token: Option<RequestToken>,
    next_token: u64,
    committed: Option<ResolvedExamples>,
    last_error: Option<FetchError>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Empty,
            pending: None,
            current_token: None,
            next_token: 1,
            committed: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The selection the UI should highlight: the pending one while loading,
    /// otherwise the one whose data is committed.
    pub fn selection(&self) -> Option<&Selection> {
        match self.phase {
            Phase::Loading => self.pending.as_ref(),
            _ => self.committed.as_ref().map(|c| &c.selection),
        }
    }

    pub fn committed(&self) -> Option<&ResolvedExamples> {
        self.committed.as_ref()
    }

    /// Records of the active system of the committed selection.
    pub fn active_examples(&self) -> Option<&[ExampleRecord]> {
        let c = self.committed.as_ref()?;
        c.records.get(c.selection.system_index).map(|r| r.as_slice())
    }

    pub fn current_token(&self) -> Option<RequestToken> {
        self.current_token
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    fn is_current(&self, token: RequestToken) -> bool {
        self.current_token == Some(token)
    }

    fn settled_phase(&self) -> Phase {
        if self.committed.is_some() {
            Phase::Ready
        } else {
            Phase::Empty
        }
    }

    pub fn dispatch(&mut self, event: SelectionEvent) -> Transition {
        let from = self.phase;
        let transition = self.apply(event);
        log(
            Level::Debug,
            Domain::Selection,
            "transition",
            obj(&[
                ("from", v_str(&format!("{:?}", from))),
                ("to", v_str(&format!("{:?}", self.phase))),
                ("outcome", v_str(transition_name(&transition))),
                ("request_token", v_int(self.current_token.map(|t| t.0).unwrap_or(0))),
            ]),
        );
        transition
    }

    fn apply(&mut self, event: SelectionEvent) -> Transition {
        match event {
            SelectionEvent::BarClicked(selection) => {
                let token = RequestToken(self.next_token);
                self.next_token += 1;
                self.current_token = Some(token);
                self.pending = Some(selection);
                self.last_error = None;
                self.phase = Phase::Loading;
                Transition::FetchRequested(token)
            }

            SelectionEvent::ExamplesLoaded { token, records } => {
                if !self.is_current(token) || self.phase != Phase::Loading {
                    return Transition::Stale;
                }
                let Some(selection) = self.pending.take() else {
                    return Transition::Stale;
                };
                self.committed = Some(ResolvedExamples { selection, records });
                self.phase = Phase::Ready;
                Transition::Committed
            }

            SelectionEvent::FetchFailed { token, error } => {
                if !self.is_current(token) || self.phase != Phase::Loading {
                    return Transition::Stale;
                }
                self.pending = None;
                self.last_error = Some(error.clone());
                self.phase = Phase::Error;
                Transition::Failed(error)
            }

            SelectionEvent::ErrorDismissed => {
                if self.phase != Phase::Error {
                    return Transition::Ignored;
                }
                self.last_error = None;
                self.phase = self.settled_phase();
                Transition::Cleared
            }

            SelectionEvent::ActiveSystemChanged(system_index) => {
                if self.phase == Phase::Loading {
                    return Transition::Ignored;
                }
                match self.committed.as_mut() {
                    Some(c) if system_index < c.records.len() => {
                        c.selection.system_index = system_index;
                        Transition::SystemSwitched
                    }
                    _ => Transition::Ignored,
                }
            }

            SelectionEvent::MetricChanged => {
                // dropping the token turns any in-flight completion stale
                self.current_token = None;
                self.pending = None;
                self.committed = None;
                self.last_error = None;
                self.phase = Phase::Empty;
                Transition::Cleared
            }
        }
    }
}

fn transition_name(t: &Transition) -> &'static str {
    match t {
        Transition::FetchRequested(_) => "fetch_requested",
        Transition::Committed => "committed",
        Transition::Failed(_) => "failed",
        Transition::Stale => "stale",
        Transition::Cleared => "cleared",
        Transition::Ignored => "ignored",
        Transition::SystemSwitched => "system_switched",
    }
}
