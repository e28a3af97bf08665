//! Session hooks (§3, §4.1): scripts run on entry into a particular
//! session state, in the order they were added.

use crate::wire::SessionState;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hook {
    pub state: SessionState,
    pub name: String,
    pub body: String,
}

impl Hook {
    pub fn new(state: SessionState, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            state,
            name: name.into(),
            body: body.into(),
        }
    }
}
