use std::fmt;
use serde::{Serialize, Deserialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Waiting for a controller
    New,
    /// A technician was picked
    Assigned,
}

impl Status {
    pub const fn human_name(self) -> &'static str {
        match self {
            Status::New      => "New",
            Status::Assigned => "Assigned",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.human_name())
    }
}
